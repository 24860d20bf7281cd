//! Session engine for Parlor's hosted multiplayer games.
//!
//! A session belongs to a guild and moves through
//! [`SessionState`]: created waiting, joined while waiting, run by its host,
//! advanced round by round by a single scheduler task, and finally
//! completed, cancelled, or errored. All cross-round state lives in the
//! [`Store`](parlor_store::Store); the only in-memory state is the task
//! registry enforcing one round loop per session.
//!
//! Games plug in through [`GameLogic`]:
//!
//! - [`SessionManager`] creates, begins, cancels and looks up sessions.
//! - [`JoinController`] admits participants up to the host's [`Capacity`].
//! - [`RoundScheduler`] runs the round loop.
//! - [`ConclusionService`] picks winners and records stats.
//! - [`Projections`] answers status, stats and leaderboard queries.

mod codec;
mod conclusion;
mod error;
mod event;
mod gate;
mod ids;
mod join;
mod logic;
mod manager;
mod projection;
pub mod record;
mod scheduler;
mod state;

pub use codec::{from_document, timestamp, to_document, to_value};
pub use conclusion::{Conclusion, ConclusionService};
pub use error::{DeliveryError, GameError};
pub use event::{Broadcaster, Delivery, EventSink, GameEvent, JoinRejection, Standing, StatsDelta};
pub use gate::{Capacity, EntitlementGate, StaticGate};
pub use ids::{GuildId, SessionId, UserId};
pub use join::{JoinController, JoinReceipt};
pub use logic::GameLogic;
pub use manager::{DEFAULT_MIN_PLAYERS, SessionManager};
pub use projection::{Projections, SessionStatus, StatsRecord, StatsReport};
pub use record::{GameKind, ParticipantRecord, Session, SessionHeader};
pub use scheduler::RoundScheduler;
pub use state::SessionState;
