//! Read-only views: session status, player stats, guild leaderboard.

use std::sync::Arc;

use parlor_store::{Filter, FindOptions, Store};
use serde::{Deserialize, Serialize};

use crate::record::field;
use crate::{
    GameError, GameLogic, GuildId, ParticipantRecord, Session, SessionId, SessionState, UserId,
    codec,
};

/// A stats document, per guild or global.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsRecord {
    pub user_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<GuildId>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub games_played: u64,
    #[serde(default)]
    pub wins: u64,
}

impl StatsRecord {
    /// Wins as a percentage of games played. Zero before the first game.
    pub fn win_rate(&self) -> f64 {
        if self.games_played == 0 {
            0.0
        } else {
            self.wins as f64 / self.games_played as f64 * 100.0
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatus {
    pub session_id: SessionId,
    pub state: SessionState,
    pub host_user_id: UserId,
    pub participants: Vec<String>,
    /// Game-specific progress, e.g. the last called numbers.
    pub progress: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatsReport {
    pub user_id: UserId,
    pub server: Option<StatsRecord>,
    pub global: Option<StatsRecord>,
}

pub struct Projections<G, S> {
    game: Arc<G>,
    store: Arc<S>,
}

impl<G, S> Clone for Projections<G, S> {
    fn clone(&self) -> Self {
        Self {
            game: Arc::clone(&self.game),
            store: Arc::clone(&self.store),
        }
    }
}

impl<G: GameLogic, S: Store> Projections<G, S> {
    pub fn new(game: Arc<G>, store: Arc<S>) -> Self {
        Self { game, store }
    }

    /// Status of the guild's active session.
    pub async fn status(&self, guild_id: &GuildId) -> Result<SessionStatus, GameError> {
        let filter = Filter::new()
            .eq(field::GUILD_ID, guild_id)
            .is_in(field::STATE, SessionState::ACTIVE);
        let document = self
            .store
            .find_one(G::KIND.sessions_collection(), &filter)
            .await?
            .ok_or_else(|| GameError::NoActiveSession(guild_id.clone()))?;
        let session: Session<G> = codec::from_document(document)?;
        Ok(SessionStatus {
            session_id: session.header.id.clone(),
            state: session.state(),
            host_user_id: session.header.host_user_id.clone(),
            participants: session
                .participants
                .iter()
                .map(|p| p.username().to_string())
                .collect(),
            progress: self.game.progress(&session),
        })
    }

    /// A user's stats in this guild and across all guilds.
    pub async fn stats(&self, user_id: &UserId, guild_id: &GuildId) -> Result<StatsReport, GameError> {
        let server = self
            .store
            .find_one(
                G::KIND.stats_collection(),
                &Filter::new()
                    .eq(field::USER_ID, user_id)
                    .eq(field::GUILD_ID, guild_id),
            )
            .await?
            .map(codec::from_document::<StatsRecord>)
            .transpose()?;
        let global = self
            .store
            .find_one(
                G::KIND.global_stats_collection(),
                &Filter::new().eq(field::USER_ID, user_id),
            )
            .await?
            .map(codec::from_document::<StatsRecord>)
            .transpose()?;
        Ok(StatsReport {
            user_id: user_id.clone(),
            server,
            global,
        })
    }

    /// Top `limit` players in the guild by wins, then games played, then
    /// username.
    pub async fn leaderboard(
        &self,
        guild_id: &GuildId,
        limit: usize,
    ) -> Result<Vec<StatsRecord>, GameError> {
        let options = FindOptions::new()
            .sort_desc(field::WINS)
            .sort_desc(field::GAMES_PLAYED)
            .sort_asc(field::USERNAME)
            .limit(limit);
        let documents = self
            .store
            .find(
                G::KIND.stats_collection(),
                &Filter::new().eq(field::GUILD_ID, guild_id),
                &options,
            )
            .await?;
        let rows = documents
            .into_iter()
            .map(codec::from_document::<StatsRecord>)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_win_rate_zero_games_is_zero() {
        let record = StatsRecord {
            user_id: UserId::from("u"),
            guild_id: None,
            username: "u".into(),
            games_played: 0,
            wins: 0,
        };
        assert_eq!(record.win_rate(), 0.0);
    }

    #[test]
    fn test_win_rate_is_percentage() {
        let record = StatsRecord {
            user_id: UserId::from("u"),
            guild_id: Some(GuildId::from("g")),
            username: "u".into(),
            games_played: 4,
            wins: 1,
        };
        assert!((record.win_rate() - 25.0).abs() < f64::EPSILON);
    }
}
