//! The `Engine` command facade.
//!
//! One engine serves one game type over one store. It ties together the
//! session layer: manager, join controller, scheduler and projections all
//! share the same store handle and task registry.

use std::sync::{Arc, Mutex, PoisonError};

use parlor_session::{
    Broadcaster, EntitlementGate, EventSink, GameError, GameEvent, GameLogic, GuildId,
    JoinController, JoinRejection, Projections, RoundScheduler, Session, SessionId,
    SessionManager, SessionStatus, StatsRecord, StatsReport, UserId,
};
use parlor_store::Store;
use parlor_tick::{InteractionClock, TaskRegistry};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info};

use crate::{EngineConfig, ParlorError};

/// Builder for an [`Engine`].
///
/// ```rust
/// use parlor::prelude::*;
///
/// let engine = Engine::builder(Squib::default())
///     .config(EngineConfig { rng_seed: Some(7), ..Default::default() })
///     .build(MemoryStore::new(), StaticGate::new(Capacity::Limited(10)));
/// assert_eq!(engine.config().min_players, 2);
/// ```
pub struct EngineBuilder<G> {
    game: G,
    config: EngineConfig,
}

impl<G: GameLogic> EngineBuilder<G> {
    pub fn new(game: G) -> Self {
        Self {
            game,
            config: EngineConfig::default(),
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config.validated();
        self
    }

    pub fn build<S: Store, E: EntitlementGate>(self, store: S, gate: E) -> Engine<G, S, E> {
        let EngineBuilder { game, config } = self;
        let tick = config.tick_config(game.tick_interval());
        let game = Arc::new(game);
        let store = Arc::new(store);
        let tasks = Arc::new(TaskRegistry::new());
        let rng = config
            .rng_seed
            .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);

        let manager = SessionManager::new(Arc::clone(&game), Arc::clone(&store), Arc::clone(&tasks))
            .with_min_players(config.min_players);
        let scheduler = RoundScheduler::new(Arc::clone(&game), Arc::clone(&store), Arc::clone(&tasks))
            .with_tick_config(tick);

        Engine {
            manager,
            joins: JoinController::new(Arc::clone(&game), Arc::clone(&store), Arc::new(gate)),
            scheduler,
            projections: Projections::new(game, store),
            tasks,
            rng: Mutex::new(rng),
            config,
        }
    }
}

/// Runs sessions of game `G` over store `S`, admitting players through
/// gate `E`.
pub struct Engine<G, S, E> {
    config: EngineConfig,
    tasks: Arc<TaskRegistry<SessionId>>,
    manager: SessionManager<G, S>,
    joins: JoinController<G, S, E>,
    scheduler: RoundScheduler<G, S>,
    projections: Projections<G, S>,
    rng: Mutex<StdRng>,
}

impl<G: GameLogic> Engine<G, (), ()> {
    pub fn builder(game: G) -> EngineBuilder<G> {
        EngineBuilder::new(game)
    }
}

impl<G, S, E> Engine<G, S, E>
where
    G: GameLogic,
    S: Store,
    E: EntitlementGate,
{
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// A fresh generator split off the engine's, so no lock is held
    /// across an await.
    fn child_rng(&self) -> StdRng {
        let mut master = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        StdRng::from_rng(&mut *master)
    }

    /// Opens a waiting session in `guild_id` with the host as its first
    /// participant.
    pub async fn start(
        &self,
        guild_id: &GuildId,
        host: &UserId,
        host_name: &str,
    ) -> Result<Session<G>, ParlorError> {
        let mut rng = self.child_rng();
        Ok(self.manager.create(guild_id, host, host_name, &mut rng).await?)
    }

    /// Tries to add a player. The outcome is always an event: accepted, or
    /// rejected with a reason the front-end can show.
    pub async fn join(
        &self,
        session_id: &SessionId,
        user_id: &UserId,
        username: &str,
    ) -> GameEvent<G> {
        let mut rng = self.child_rng();
        match self.joins.join(session_id, user_id, username, &mut rng).await {
            Ok(receipt) => GameEvent::JoinAccepted {
                session_id: receipt.session_id,
                user_id: receipt.user_id,
                participants: receipt.participants,
                capacity: receipt.capacity,
            },
            Err(err) => {
                debug!(%session_id, %user_id, error = %err, "join rejected");
                GameEvent::JoinRejected {
                    user_id: user_id.clone(),
                    reason: JoinRejection::from_error(&err),
                }
            }
        }
    }

    /// Moves the guild's waiting session to in progress and starts its
    /// round loop, delivering events to `sink`.
    pub async fn run<N: EventSink<G>>(
        &self,
        guild_id: &GuildId,
        requester: &UserId,
        sink: Arc<N>,
    ) -> Result<Session<G>, ParlorError> {
        let session = self.active(guild_id).await?;
        let started = self.manager.begin(session.id(), requester).await?;
        let clock = InteractionClock::start(self.config.interaction_ttl());
        let generation = self.scheduler.launch(
            started.id().clone(),
            Broadcaster::new(sink, clock),
            self.child_rng(),
        );
        debug!(session_id = %started.id(), generation, "round loop launched");
        Ok(started)
    }

    /// Cancels the guild's active session and stops its round loop.
    pub async fn cancel(
        &self,
        guild_id: &GuildId,
        requester: &UserId,
    ) -> Result<SessionId, ParlorError> {
        let session = self.active(guild_id).await?;
        self.manager.cancel(session.id(), requester).await?;
        Ok(session.header.id)
    }

    async fn active(&self, guild_id: &GuildId) -> Result<Session<G>, GameError> {
        self.manager
            .active_session(guild_id)
            .await?
            .ok_or_else(|| GameError::NoActiveSession(guild_id.clone()))
    }

    pub async fn session(&self, session_id: &SessionId) -> Result<Session<G>, ParlorError> {
        Ok(self.manager.load(session_id).await?)
    }

    pub async fn status(&self, guild_id: &GuildId) -> Result<SessionStatus, ParlorError> {
        Ok(self.projections.status(guild_id).await?)
    }

    pub async fn stats(
        &self,
        user_id: &UserId,
        guild_id: &GuildId,
    ) -> Result<StatsReport, ParlorError> {
        Ok(self.projections.stats(user_id, guild_id).await?)
    }

    /// The guild's top players, `leaderboard_limit` rows at most.
    pub async fn leaderboard(&self, guild_id: &GuildId) -> Result<Vec<StatsRecord>, ParlorError> {
        Ok(self
            .projections
            .leaderboard(guild_id, self.config.leaderboard_limit)
            .await?)
    }

    pub fn is_running(&self, session_id: &SessionId) -> bool {
        self.scheduler.is_running(session_id)
    }

    /// Round loops currently registered.
    pub fn running(&self) -> usize {
        self.tasks.len()
    }

    /// Aborts every round loop. Sessions keep their stored state.
    pub fn shutdown(&self) -> usize {
        let stopped = self.tasks.shutdown_all();
        info!(stopped, "engine shut down");
        stopped
    }
}
