//! Winner determination, final persistence and stats.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use parlor_store::{Filter, Store, Update, WriteOp};
use rand::Rng;
use tracing::{error, info, warn};

use crate::record::field;
use crate::{
    GameError, GameLogic, GuildId, ParticipantRecord, Session, SessionState, StatsDelta, UserId,
    codec,
};

/// The outcome of concluding a session.
#[derive(Debug, Clone)]
pub struct Conclusion<P> {
    pub winners: Vec<P>,
    pub stats: StatsDelta,
}

/// Finalizes terminal sessions.
pub struct ConclusionService<G, S> {
    game: Arc<G>,
    store: Arc<S>,
}

impl<G, S> Clone for ConclusionService<G, S> {
    fn clone(&self) -> Self {
        Self {
            game: Arc::clone(&self.game),
            store: Arc::clone(&self.store),
        }
    }
}

impl<G: GameLogic, S: Store> ConclusionService<G, S> {
    pub fn new(game: Arc<G>, store: Arc<S>) -> Self {
        Self { game, store }
    }

    pub fn winners<R: Rng + ?Sized>(
        &self,
        session: &Session<G>,
        rng: &mut R,
    ) -> Vec<G::Participant> {
        self.game.winners(session, rng)
    }

    /// Marks the session completed with its winners.
    ///
    /// Guarded on `in_progress`: returns `false` without writing if the
    /// session was cancelled or errored in the meantime.
    pub async fn persist(
        &self,
        session: &Session<G>,
        winners: &[G::Participant],
    ) -> Result<bool, GameError> {
        let winner_ids: Vec<&UserId> = winners.iter().map(ParticipantRecord::user_id).collect();
        let filter = Filter::by_id(session.id()).eq(field::STATE, SessionState::InProgress);
        let update = Update::new()
            .set(field::STATE, SessionState::Completed)
            .set(field::WINNER_IDS, codec::to_value(&winner_ids)?)
            .set(field::ENDED_AT, codec::timestamp(Utc::now())?);
        let result = self
            .store
            .update_one(G::KIND.sessions_collection(), &filter, &update, false)
            .await?;
        Ok(result.matched > 0)
    }

    /// Upserts per-guild and global stats for every participant.
    ///
    /// Both batches are unordered, so one failed upsert does not stop the
    /// rest. Afterwards the winners' per-guild win totals are read back.
    pub async fn update_stats(
        &self,
        guild_id: &GuildId,
        participants: &[G::Participant],
        winners: &[G::Participant],
    ) -> Result<StatsDelta, GameError> {
        if participants.is_empty() {
            warn!(%guild_id, "no participants, skipping stats");
            return Ok(StatsDelta::default());
        }
        let is_winner = |user: &UserId| winners.iter().any(|w| w.user_id() == user);
        let ops = |scope: Option<&GuildId>| -> Vec<WriteOp> {
            participants
                .iter()
                .map(|p| {
                    let mut filter = Filter::new().eq(field::USER_ID, p.user_id());
                    if let Some(guild_id) = scope {
                        filter = filter.eq(field::GUILD_ID, guild_id);
                    }
                    WriteOp::UpdateOne {
                        filter,
                        update: Update::new()
                            .inc(field::GAMES_PLAYED, 1)
                            .inc(field::WINS, i64::from(is_winner(p.user_id())))
                            .set_on_insert(field::USERNAME, p.username()),
                        upsert: true,
                    }
                })
                .collect()
        };

        let guild_ops = ops(Some(guild_id));
        let global_ops = ops(None);
        let guild_result = self
            .store
            .bulk_write(G::KIND.stats_collection(), guild_ops, false)
            .await?;
        let global_result = self
            .store
            .bulk_write(G::KIND.global_stats_collection(), global_ops, false)
            .await?;

        let failed_upserts = guild_result.failures.len() + global_result.failures.len();
        if !(guild_result.is_complete() && global_result.is_complete()) {
            for failure in guild_result.failures.iter().chain(&global_result.failures) {
                warn!(%guild_id, index = failure.index, error = %failure.error, "stats upsert failed");
            }
        }

        let mut wins = BTreeMap::new();
        for winner in winners {
            let filter = Filter::new()
                .eq(field::USER_ID, winner.user_id())
                .eq(field::GUILD_ID, guild_id);
            let total = self
                .store
                .find_one(G::KIND.stats_collection(), &filter)
                .await?
                .and_then(|doc| doc.get(field::WINS).and_then(serde_json::Value::as_u64))
                .unwrap_or(0);
            wins.insert(winner.user_id().clone(), total);
        }
        Ok(StatsDelta {
            wins,
            failed_upserts,
        })
    }

    /// Picks winners, persists completion, then records stats.
    ///
    /// Returns `None` if the session had already left `in_progress`. A
    /// stats failure is logged and yields an empty [`StatsDelta`]; the
    /// session stays completed.
    pub async fn conclude<R: Rng + ?Sized>(
        &self,
        session: &Session<G>,
        rng: &mut R,
    ) -> Result<Option<Conclusion<G::Participant>>, GameError> {
        let winners = self.winners(session, rng);
        if !self.persist(session, &winners).await? {
            info!(session_id = %session.id(), "session left in_progress before conclusion");
            return Ok(None);
        }

        let stats = match self
            .update_stats(&session.header.guild_id, &session.participants, &winners)
            .await
        {
            Ok(stats) => stats,
            Err(err) => {
                error!(session_id = %session.id(), error = %err, "stats update failed");
                StatsDelta {
                    wins: BTreeMap::new(),
                    failed_upserts: session.participants.len() * 2,
                }
            }
        };

        info!(
            session_id = %session.id(),
            guild_id = %session.header.guild_id,
            winners = winners.len(),
            "session concluded"
        );
        Ok(Some(Conclusion { winners, stats }))
    }
}
