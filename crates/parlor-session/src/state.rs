//! Session lifecycle state machine.

use serde::{Deserialize, Serialize};

/// The lifecycle state of a session, persisted as `current_game_state`.
///
/// ```text
/// Waiting ──run──▶ InProgress ──terminal──▶ Completed
///    │                 │  └──store error──▶ Errored
///    └──cancel──▶ Cancelled ◀──cancel──┘
/// ```
///
/// - **Waiting**: created, accepting joins.
/// - **InProgress**: the round scheduler owns the round fields.
/// - **Completed** / **Cancelled** / **Errored**: terminal. Documents are
///   never deleted, they stay behind as history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[serde(rename = "waiting_for_players")]
    Waiting,
    InProgress,
    Completed,
    Cancelled,
    Errored,
}

impl SessionState {
    /// States that count toward the one-active-session-per-guild rule.
    pub const ACTIVE: [SessionState; 2] = [SessionState::Waiting, SessionState::InProgress];

    /// Returns `true` if the session is accepting new participants.
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::Waiting)
    }

    /// Returns `true` while the session blocks its guild from starting another.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Waiting | Self::InProgress)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }

    /// Returns `true` if moving to `target` is a legal transition.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Waiting, Self::InProgress)
                | (Self::Waiting, Self::Cancelled)
                | (Self::InProgress, Self::Completed)
                | (Self::InProgress, Self::Cancelled)
                | (Self::InProgress, Self::Errored)
        )
    }

    /// The stored string form, for use in filters.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting_for_players",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Errored => "errored",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<SessionState> for serde_json::Value {
    fn from(state: SessionState) -> Self {
        serde_json::Value::String(state.as_str().to_string())
    }
}
