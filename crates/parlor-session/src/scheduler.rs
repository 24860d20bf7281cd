//! The per-session round loop.
//!
//! One task per session drives [`GameLogic::advance`] on a fixed interval
//! until the session is terminal, cancelled, or hits a store error:
//!
//! ```text
//! loop:
//!   wait for tick (first is immediate, then the fixed interval)
//!   reload session ── gone / not in_progress ──▶ stop
//!   terminal? ── yes ──▶ conclude, emit GameConcluded, stop
//!   advance ─▶ targeted update guarded on in_progress ─▶ emit RoundAdvanced
//!                                                      (+ HalfwayLeaderboard)
//! ```
//!
//! The inter-tick sleep is the loop's main suspension point; cancellation
//! is observed at any await. Round fields are only written from here.

use std::sync::Arc;

use parlor_store::{Filter, Store, Update};
use parlor_tick::{RoundTicker, TaskRegistry, TickConfig};
use rand::rngs::StdRng;
use tracing::{debug, error, trace, warn};

use crate::record::field;
use crate::{
    Broadcaster, ConclusionService, EventSink, GameError, GameEvent, GameLogic, Session,
    SessionId, SessionState, codec,
};

/// Launches and tracks round loops.
pub struct RoundScheduler<G, S> {
    game: Arc<G>,
    store: Arc<S>,
    conclusion: ConclusionService<G, S>,
    tasks: Arc<TaskRegistry<SessionId>>,
    tick: TickConfig,
}

impl<G, S> Clone for RoundScheduler<G, S> {
    fn clone(&self) -> Self {
        Self {
            game: Arc::clone(&self.game),
            store: Arc::clone(&self.store),
            conclusion: self.conclusion.clone(),
            tasks: Arc::clone(&self.tasks),
            tick: self.tick.clone(),
        }
    }
}

impl<G: GameLogic, S: Store> RoundScheduler<G, S> {
    /// A scheduler ticking at the game's own interval.
    pub fn new(game: Arc<G>, store: Arc<S>, tasks: Arc<TaskRegistry<SessionId>>) -> Self {
        let tick = TickConfig::with_interval(game.tick_interval());
        Self {
            conclusion: ConclusionService::new(Arc::clone(&game), Arc::clone(&store)),
            game,
            store,
            tasks,
            tick,
        }
    }

    pub fn with_tick_config(mut self, tick: TickConfig) -> Self {
        self.tick = tick.validated();
        self
    }

    pub fn tick_config(&self) -> &TickConfig {
        &self.tick
    }

    /// Spawns the round loop for `session_id`, replacing any loop already
    /// running for it. Returns the task generation.
    pub fn launch<N: EventSink<G>>(
        &self,
        session_id: SessionId,
        broadcaster: Broadcaster<N>,
        rng: StdRng,
    ) -> u64 {
        let round_loop = RoundLoop {
            game: Arc::clone(&self.game),
            store: Arc::clone(&self.store),
            conclusion: self.conclusion.clone(),
            session_id: session_id.clone(),
            broadcaster,
            rng,
        };
        let ticker = RoundTicker::new(self.tick.clone());
        debug!(%session_id, interval_ms = self.tick.interval.as_millis() as u64, "launching round loop");
        self.tasks.spawn(session_id, round_loop.run(ticker))
    }

    pub fn is_running(&self, session_id: &SessionId) -> bool {
        self.tasks.is_running(session_id)
    }
}

enum RoundOutcome {
    Continue,
    Finished,
}

struct RoundLoop<G, S, N> {
    game: Arc<G>,
    store: Arc<S>,
    conclusion: ConclusionService<G, S>,
    session_id: SessionId,
    broadcaster: Broadcaster<N>,
    rng: StdRng,
}

impl<G: GameLogic, S: Store, N: EventSink<G>> RoundLoop<G, S, N> {
    async fn run(mut self, mut ticker: RoundTicker) {
        loop {
            let info = ticker.wait_for_tick().await;
            match self.play_round(info.tick).await {
                Ok(RoundOutcome::Continue) => ticker.record_tick_end(),
                Ok(RoundOutcome::Finished) => break,
                Err(err) => {
                    error!(session_id = %self.session_id, tick = info.tick, error = %err, "round failed");
                    self.mark_errored().await;
                    break;
                }
            }
        }
        debug!(session_id = %self.session_id, rounds = ticker.tick_count(), "round loop finished");
    }

    async fn play_round(&mut self, tick: u64) -> Result<RoundOutcome, GameError> {
        let collection = G::KIND.sessions_collection();
        let Some(document) = self
            .store
            .find_one(collection, &Filter::by_id(&self.session_id))
            .await?
        else {
            warn!(session_id = %self.session_id, "session vanished, stopping");
            return Ok(RoundOutcome::Finished);
        };
        let session: Session<G> = codec::from_document(document)?;

        if session.state() != SessionState::InProgress {
            debug!(session_id = %self.session_id, state = %session.state(), "session no longer in progress");
            return Ok(RoundOutcome::Finished);
        }

        if self.game.is_terminal(&session) {
            if let Some(conclusion) = self.conclusion.conclude(&session, &mut self.rng).await? {
                let event = GameEvent::<G>::GameConcluded {
                    session_id: self.session_id.clone(),
                    winners: conclusion.winners,
                    stats: conclusion.stats,
                };
                self.broadcaster.emit(&self.session_id, event).await;
            }
            return Ok(RoundOutcome::Finished);
        }

        let delta = self.game.advance(&session, &mut self.rng);
        let update = self.game.delta_update(&session, &delta);
        let guard = Filter::by_id(&self.session_id).eq(field::STATE, SessionState::InProgress);
        let result = self
            .store
            .update_one(collection, &guard, &update, false)
            .await?;
        if result.matched == 0 {
            debug!(session_id = %self.session_id, "session left in_progress during round");
            return Ok(RoundOutcome::Finished);
        }
        trace!(session_id = %self.session_id, tick, ?delta, "round persisted");

        let narrative = self.game.narrate(&session, &delta);
        let halfway = self.game.halfway_leaderboard(&delta).map(<[_]>::to_vec);
        self.broadcaster
            .emit(
                &self.session_id,
                GameEvent::<G>::RoundAdvanced {
                    session_id: self.session_id.clone(),
                    round: tick,
                    delta,
                    narrative,
                },
            )
            .await;
        if let Some(ranked) = halfway {
            self.broadcaster
                .emit(
                    &self.session_id,
                    GameEvent::<G>::HalfwayLeaderboard {
                        session_id: self.session_id.clone(),
                        ranked,
                    },
                )
                .await;
        }
        Ok(RoundOutcome::Continue)
    }

    /// Best-effort move to `errored`. If this write fails too, the session
    /// stays `in_progress` with no task; nothing sweeps it later.
    async fn mark_errored(&self) {
        let guard = Filter::by_id(&self.session_id).eq(field::STATE, SessionState::InProgress);
        let update = match codec::timestamp(chrono::Utc::now()) {
            Ok(ended_at) => Update::new()
                .set(field::STATE, SessionState::Errored)
                .set(field::ENDED_AT, ended_at),
            Err(_) => Update::new().set(field::STATE, SessionState::Errored),
        };
        match self
            .store
            .update_one(G::KIND.sessions_collection(), &guard, &update, false)
            .await
        {
            Ok(result) if result.matched > 0 => {
                warn!(session_id = %self.session_id, "session marked errored");
            }
            Ok(_) => {
                debug!(session_id = %self.session_id, "session already left in_progress");
            }
            Err(err) => {
                error!(
                    session_id = %self.session_id,
                    error = %err,
                    "could not mark session errored, it remains in_progress"
                );
            }
        }
    }
}
