//! Typed session records and the document fields they map to.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{GameLogic, GuildId, SessionId, SessionState, UserId};

/// Stored field names used in filters and targeted updates.
pub mod field {
    pub const ID: &str = "_id";
    pub const GUILD_ID: &str = "guild_id";
    pub const HOST_USER_ID: &str = "host_user_id";
    pub const STATE: &str = "current_game_state";
    pub const STARTED_AT: &str = "started_at";
    pub const ENDED_AT: &str = "ended_at";
    pub const WINNER_IDS: &str = "winner_user_ids";
    pub const PARTICIPANTS: &str = "participants";
    pub const PARTICIPANT_USER_ID: &str = "participants.user_id";

    pub const USER_ID: &str = "user_id";
    pub const USERNAME: &str = "username";
    pub const GAMES_PLAYED: &str = "games_played";
    pub const WINS: &str = "wins";

    /// Path of a field on the participant at `index`.
    pub fn participant(index: usize, name: &str) -> String {
        format!("{PARTICIPANTS}.{index}.{name}")
    }
}

/// Which game a session plays. Each game keeps its own collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameKind {
    Bingo,
    Squib,
}

impl GameKind {
    pub fn sessions_collection(&self) -> &'static str {
        match self {
            Self::Bingo => "bingo_sessions",
            Self::Squib => "squib_game_sessions",
        }
    }

    /// Per-guild stats, keyed by `(user_id, guild_id)`.
    pub fn stats_collection(&self) -> &'static str {
        match self {
            Self::Bingo => "bingo_stats",
            Self::Squib => "squib_game_stats",
        }
    }

    /// Cross-guild stats, keyed by `user_id`.
    pub fn global_stats_collection(&self) -> &'static str {
        match self {
            Self::Bingo => "bingo_global_stats",
            Self::Squib => "squib_game_global_stats",
        }
    }
}

impl fmt::Display for GameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bingo => write!(f, "Bingo"),
            Self::Squib => write!(f, "Squib Game"),
        }
    }
}

/// Identity of a participant, shared by every game's participant record.
pub trait ParticipantRecord {
    fn user_id(&self) -> &UserId;
    fn username(&self) -> &str;
}

/// Fields every session document carries regardless of game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionHeader {
    #[serde(rename = "_id")]
    pub id: SessionId,
    pub guild_id: GuildId,
    pub host_user_id: UserId,
    /// Human-readable key, `"{guild}_{host}_{unix_ts}"`.
    pub session_key: String,
    #[serde(rename = "current_game_state")]
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default, rename = "winner_user_ids")]
    pub winner_ids: Vec<UserId>,
}

impl SessionHeader {
    pub fn session_key(guild_id: &GuildId, host: &UserId, at: DateTime<Utc>) -> String {
        format!("{guild_id}_{host}_{}", at.timestamp())
    }
}

/// A full session document: header, participants, and the game's round
/// fields flattened alongside.
#[derive(Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Session<G: GameLogic> {
    #[serde(flatten)]
    pub header: SessionHeader,
    pub participants: Vec<G::Participant>,
    #[serde(flatten)]
    pub round: G::Round,
}

impl<G: GameLogic> Session<G> {
    pub fn id(&self) -> &SessionId {
        &self.header.id
    }

    pub fn state(&self) -> SessionState {
        self.header.state
    }

    pub fn is_host(&self, user: &UserId) -> bool {
        self.header.host_user_id == *user
    }

    pub fn participant_index(&self, user: &UserId) -> Option<usize> {
        self.participants.iter().position(|p| p.user_id() == user)
    }

    pub fn contains(&self, user: &UserId) -> bool {
        self.participant_index(user).is_some()
    }
}

impl<G: GameLogic> Clone for Session<G> {
    fn clone(&self) -> Self {
        Self {
            header: self.header.clone(),
            participants: self.participants.clone(),
            round: self.round.clone(),
        }
    }
}

impl<G: GameLogic> fmt::Debug for Session<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("header", &self.header)
            .field("participants", &self.participants)
            .field("round", &self.round)
            .finish()
    }
}
