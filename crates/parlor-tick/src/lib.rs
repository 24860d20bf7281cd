//! Timing and task plumbing for Parlor round loops.
//!
//! - [`RoundTicker`] paces a session's rounds at a fixed interval and warns
//!   when a round's work eats into it.
//! - [`TaskRegistry`] keeps exactly one live task per key, aborting stale
//!   tasks on replacement and deregistering on completion.
//! - [`InteractionClock`] decides whether outbound messages still ride the
//!   originating interaction or fall back to channel posts.

mod registry;
mod route;
mod ticker;

pub use registry::TaskRegistry;
pub use route::{DEFAULT_INTERACTION_TTL, DeliveryRoute, InteractionClock};
pub use ticker::{RoundTicker, TickConfig, TickInfo, TickMetrics};
