//! Outbound delivery routing for long-running games.
//!
//! A game is started from a chat interaction whose followup token expires
//! after a fixed lifetime. Games routinely outlive it, so once the token is
//! too old, messages go out as plain channel posts instead.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::time::Instant;
use tracing::warn;

/// How long an interaction followup token stays usable (14 minutes).
pub const DEFAULT_INTERACTION_TTL: Duration = Duration::from_secs(14 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryRoute {
    /// Reply through the originating interaction.
    InteractionFollowup,
    /// Post directly to the channel.
    ChannelPost,
}

impl DeliveryRoute {
    /// The route to retry on after a failed delivery, if any.
    pub fn fallback(self) -> Option<DeliveryRoute> {
        match self {
            Self::InteractionFollowup => Some(Self::ChannelPost),
            Self::ChannelPost => None,
        }
    }
}

/// Tracks the age of the interaction that launched a game.
#[derive(Debug)]
pub struct InteractionClock {
    started: Instant,
    ttl: Duration,
    degraded: AtomicBool,
}

impl InteractionClock {
    /// Starts the clock now.
    pub fn start(ttl: Duration) -> Self {
        Self {
            started: Instant::now(),
            ttl,
            degraded: AtomicBool::new(false),
        }
    }

    pub fn age(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn is_expired(&self) -> bool {
        self.age() >= self.ttl
    }

    /// Current route. Logs once when switching to channel posts.
    pub fn route(&self) -> DeliveryRoute {
        if !self.is_expired() {
            return DeliveryRoute::InteractionFollowup;
        }
        if !self.degraded.swap(true, Ordering::Relaxed) {
            warn!(
                age_secs = self.age().as_secs(),
                ttl_secs = self.ttl.as_secs(),
                "interaction token expired, falling back to channel posts"
            );
        }
        DeliveryRoute::ChannelPost
    }
}

impl Default for InteractionClock {
    fn default() -> Self {
        Self::start(DEFAULT_INTERACTION_TTL)
    }
}
