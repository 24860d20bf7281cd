//! Error types for the session layer.

use parlor_store::StoreError;

use crate::{GuildId, SessionId, SessionState, UserId};

/// Errors from session commands.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    /// The guild already has a session waiting or in progress.
    #[error("guild {guild_id} already has active session {session_id}")]
    Conflict {
        guild_id: GuildId,
        session_id: SessionId,
    },

    /// No session with this id exists.
    #[error("session {0} not found")]
    NotFound(SessionId),

    /// The guild has no session waiting or in progress.
    #[error("no active session in guild {0}")]
    NoActiveSession(GuildId),

    /// Joins are only accepted while the session is waiting for players.
    #[error("session {session_id} is {state} and not accepting players")]
    NotJoinable {
        session_id: SessionId,
        state: SessionState,
    },

    #[error("user {user_id} already joined session {session_id}")]
    AlreadyJoined {
        session_id: SessionId,
        user_id: UserId,
    },

    /// The host's capacity is reached.
    #[error("session {session_id} is full ({capacity} players)")]
    Capacity {
        session_id: SessionId,
        capacity: usize,
    },

    /// Only the host may run or cancel a session.
    #[error("user {requester} is not the host of session {session_id}")]
    HostOnly {
        session_id: SessionId,
        requester: UserId,
    },

    #[error("session {session_id} has {have} players, {need} needed")]
    NotEnoughPlayers {
        session_id: SessionId,
        have: usize,
        need: usize,
    },

    /// The command does not apply in the session's current state, e.g.
    /// running a session that is already in progress.
    #[error("session {session_id} is {state}")]
    InvalidState {
        session_id: SessionId,
        state: SessionState,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl GameError {
    /// A sentence safe to show the user. Store failures never leak detail.
    pub fn user_message(&self) -> String {
        match self {
            Self::Conflict { .. } => "A game is already running in this server.".into(),
            Self::NotFound(_) | Self::NoActiveSession(_) => {
                "There is no active game in this server.".into()
            }
            Self::NotJoinable { .. } => "This game is no longer accepting players.".into(),
            Self::AlreadyJoined { .. } => "You have already joined this game.".into(),
            Self::Capacity { capacity, .. } => {
                format!("This game is full ({capacity} players).")
            }
            Self::HostOnly { .. } => "Only the host can do that.".into(),
            Self::NotEnoughPlayers { need, .. } => {
                format!("Not enough players. At least {need} are needed to start.")
            }
            Self::InvalidState { .. } => "The game can't do that right now.".into(),
            Self::Store(_) => "Something went wrong. Please try again later.".into(),
        }
    }
}

/// An outbound event could not be delivered.
#[derive(Debug, thiserror::Error)]
#[error("delivery failed: {0}")]
pub struct DeliveryError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_hides_store_detail() {
        let err = GameError::from(StoreError::Unavailable("10.0.0.3:27017 refused".into()));
        let msg = err.user_message();
        assert!(!msg.contains("27017"));
        assert!(err.to_string().contains("27017"));
    }

    #[test]
    fn test_user_message_not_enough_players_names_minimum() {
        let err = GameError::NotEnoughPlayers {
            session_id: SessionId::from("s"),
            have: 1,
            need: 2,
        };
        assert!(err.user_message().contains('2'));
    }
}
