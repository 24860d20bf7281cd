//! # Parlor
//!
//! Hosted multiplayer games for chat guilds. A host opens a session, players
//! join while it waits, and once the host runs it a background round loop
//! plays it out against the store until someone wins.
//!
//! The [`Engine`] is the command surface a bot front-end calls. Everything
//! it returns is typed: sessions, [`GameEvent`]s, stats records. Rendering
//! them is the caller's job.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use parlor::prelude::*;
//! use tokio::sync::mpsc;
//!
//! # async fn demo() -> Result<(), ParlorError> {
//! let engine = Engine::builder(Bingo)
//!     .config(EngineConfig::default())
//!     .build(MemoryStore::new(), StaticGate::unlimited());
//!
//! let guild = GuildId::from("guild");
//! let host = UserId::from("host");
//! let session = engine.start(&guild, &host, "Host").await?;
//! engine.join(session.id(), &UserId::from("guest"), "Guest").await;
//!
//! let (events, mut rx) = mpsc::unbounded_channel::<Delivery<Bingo>>();
//! engine.run(&guild, &host, Arc::new(events)).await?;
//! while let Some(delivery) = rx.recv().await {
//!     println!("{}", delivery.event.name());
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod engine;
mod error;
pub mod telemetry;

pub use config::EngineConfig;
pub use engine::{Engine, EngineBuilder};
pub use error::ParlorError;

pub use parlor_games as games;
pub use parlor_session as session;
pub use parlor_session::GameEvent;
pub use parlor_store as store;

pub mod prelude {
    pub use crate::{Engine, EngineBuilder, EngineConfig, ParlorError};
    pub use parlor_games::{Bingo, BingoSession, Squib, SquibSession};
    pub use parlor_session::{
        Capacity, Delivery, EntitlementGate, EventSink, GameEvent, GameLogic, GuildId,
        JoinRejection, Session, SessionId, SessionState, StaticGate, UserId,
    };
    pub use parlor_store::{MemoryStore, Store};
    pub use parlor_tick::DeliveryRoute;
}
