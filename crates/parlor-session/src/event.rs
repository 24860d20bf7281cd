//! Events emitted to the UI collaborator and the sinks that carry them.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use parlor_tick::{DeliveryRoute, InteractionClock};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

use crate::{Capacity, DeliveryError, GameError, GameLogic, SessionId, UserId};

/// One row of a mid-game leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standing {
    pub user_id: UserId,
    pub username: String,
    /// Cells still unmarked; lower is better.
    pub remaining: usize,
}

/// Stats written when a session concludes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsDelta {
    /// Each winner's per-guild win total after this game.
    pub wins: BTreeMap<UserId, u64>,
    /// Stats upserts that failed. The game still concludes.
    pub failed_upserts: usize,
}

/// Why a join was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinRejection {
    NoSession,
    NotJoinable,
    AlreadyJoined,
    Full { capacity: usize },
    Unavailable,
}

impl JoinRejection {
    pub fn from_error(error: &GameError) -> Self {
        match error {
            GameError::NotFound(_) | GameError::NoActiveSession(_) => Self::NoSession,
            GameError::NotJoinable { .. } | GameError::InvalidState { .. } => Self::NotJoinable,
            GameError::AlreadyJoined { .. } => Self::AlreadyJoined,
            GameError::Capacity { capacity, .. } => Self::Full {
                capacity: *capacity,
            },
            _ => Self::Unavailable,
        }
    }
}

/// Events a running or joining session produces.
#[derive(Debug, Clone)]
pub enum GameEvent<G: GameLogic> {
    RoundAdvanced {
        session_id: SessionId,
        round: u64,
        delta: G::Delta,
        narrative: String,
    },
    HalfwayLeaderboard {
        session_id: SessionId,
        ranked: Vec<Standing>,
    },
    GameConcluded {
        session_id: SessionId,
        winners: Vec<G::Participant>,
        stats: StatsDelta,
    },
    JoinAccepted {
        session_id: SessionId,
        user_id: UserId,
        participants: usize,
        capacity: Capacity,
    },
    JoinRejected {
        user_id: UserId,
        reason: JoinRejection,
    },
}

impl<G: GameLogic> GameEvent<G> {
    pub fn name(&self) -> &'static str {
        match self {
            Self::RoundAdvanced { .. } => "round_advanced",
            Self::HalfwayLeaderboard { .. } => "halfway_leaderboard",
            Self::GameConcluded { .. } => "game_concluded",
            Self::JoinAccepted { .. } => "join_accepted",
            Self::JoinRejected { .. } => "join_rejected",
        }
    }
}

/// An event paired with the route it went out on.
#[derive(Debug, Clone)]
pub struct Delivery<G: GameLogic> {
    pub route: DeliveryRoute,
    pub event: GameEvent<G>,
}

/// Where a session's events go: a chat channel, a test channel, ...
pub trait EventSink<G: GameLogic>: Send + Sync + 'static {
    fn deliver(
        &self,
        route: DeliveryRoute,
        event: &GameEvent<G>,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send;
}

impl<G: GameLogic + Clone> EventSink<G> for mpsc::UnboundedSender<Delivery<G>> {
    async fn deliver(&self, route: DeliveryRoute, event: &GameEvent<G>) -> Result<(), DeliveryError> {
        self.send(Delivery {
            route,
            event: event.clone(),
        })
        .map_err(|_| DeliveryError("event channel closed".into()))
    }
}

/// Delivers a session's events on the route the interaction clock picks,
/// retrying once on the fallback route. Failures are logged, never raised.
pub struct Broadcaster<N> {
    sink: Arc<N>,
    clock: InteractionClock,
}

impl<N> Broadcaster<N> {
    pub fn new(sink: Arc<N>, clock: InteractionClock) -> Self {
        Self { sink, clock }
    }

    pub async fn emit<G>(&self, session_id: &SessionId, event: GameEvent<G>)
    where
        G: GameLogic,
        N: EventSink<G>,
    {
        let route = self.clock.route();
        let Err(error) = self.sink.deliver(route, &event).await else {
            return;
        };
        warn!(%session_id, event = event.name(), ?route, %error, "event delivery failed");

        if let Some(fallback) = route.fallback() {
            if let Err(error) = self.sink.deliver(fallback, &event).await {
                warn!(
                    %session_id,
                    event = event.name(),
                    route = ?fallback,
                    %error,
                    "fallback delivery failed, dropping event"
                );
            }
        }
    }
}
