//! Game rules for Parlor sessions.
//!
//! Each game implements [`GameLogic`](parlor_session::GameLogic) and is
//! otherwise plain data: all persistence and scheduling stays in
//! `parlor-session`.

pub mod bingo;
pub mod squib;

pub use bingo::{Bingo, BingoCard, BingoDelta, BingoParticipant, BingoRound};
pub use squib::{MINIGAMES, Minigame, Squib, SquibDelta, SquibParticipant, SquibRound, SquibStatus};

pub type BingoSession = parlor_session::Session<Bingo>;
pub type SquibSession = parlor_session::Session<Squib>;
