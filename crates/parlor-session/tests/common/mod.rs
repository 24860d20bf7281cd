//! Shared fixtures: a minimal countdown game and a wired-up harness.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parlor_session::{
    Capacity, ConclusionService, EntitlementGate, GameKind, GameLogic, GuildId, JoinController,
    ParticipantRecord, Projections, RoundScheduler, Session, SessionId, SessionManager, Standing,
    StaticGate, UserId,
};
use parlor_store::{
    BulkWriteResult, Document, Filter, FindOptions, MemoryStore, Store, StoreError, Update,
    UpdateResult, WriteOp,
};
use parlor_tick::TaskRegistry;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

// =========================================================================
// Countdown: ends after a fixed number of rounds, host wins
// =========================================================================

#[derive(Debug, Clone)]
pub struct Countdown {
    pub rounds: u32,
    pub halfway_at: Option<u32>,
}

impl Countdown {
    pub fn new(rounds: u32) -> Self {
        Self {
            rounds,
            halfway_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub user_id: UserId,
    pub username: String,
    pub lucky: u32,
}

impl ParticipantRecord for Player {
    fn user_id(&self) -> &UserId {
        &self.user_id
    }

    fn username(&self) -> &str {
        &self.username
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Progress {
    #[serde(default)]
    pub rounds_played: u32,
}

#[derive(Debug, Clone)]
pub struct Step {
    pub round: u32,
    pub halfway: Option<Vec<Standing>>,
}

impl GameLogic for Countdown {
    type Participant = Player;
    type Round = Progress;
    type Delta = Step;

    const KIND: GameKind = GameKind::Bingo;

    fn new_participant<R: Rng + ?Sized>(
        &self,
        user_id: UserId,
        username: String,
        rng: &mut R,
    ) -> Player {
        Player {
            user_id,
            username,
            lucky: rng.random_range(0..100),
        }
    }

    fn is_terminal(&self, session: &Session<Self>) -> bool {
        session.round.rounds_played >= self.rounds
    }

    fn advance<R: Rng + ?Sized>(&self, session: &Session<Self>, _rng: &mut R) -> Step {
        let round = session.round.rounds_played + 1;
        let halfway = (self.halfway_at == Some(round)).then(|| {
            session
                .participants
                .iter()
                .map(|p| Standing {
                    user_id: p.user_id.clone(),
                    username: p.username.clone(),
                    remaining: p.lucky as usize,
                })
                .collect()
        });
        Step { round, halfway }
    }

    fn delta_update(&self, _session: &Session<Self>, delta: &Step) -> Update {
        Update::new().set("rounds_played", delta.round)
    }

    fn narrate(&self, _session: &Session<Self>, delta: &Step) -> String {
        format!("round {}", delta.round)
    }

    fn winners<R: Rng + ?Sized>(&self, session: &Session<Self>, _rng: &mut R) -> Vec<Player> {
        session.participants.iter().take(1).cloned().collect()
    }

    fn halfway_leaderboard<'a>(&self, delta: &'a Step) -> Option<&'a [Standing]> {
        delta.halfway.as_deref()
    }

    fn tick_interval(&self) -> Duration {
        Duration::from_secs(1)
    }
}

// =========================================================================
// A store whose reads can be switched off
// =========================================================================

#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub fail_reads: AtomicBool,
}

impl FlakyStore {
    fn check(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("reads disabled".into()))
        } else {
            Ok(())
        }
    }
}

impl Store for FlakyStore {
    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>, StoreError> {
        self.check()?;
        self.inner.find_one(collection, filter).await
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Document>, StoreError> {
        self.check()?;
        self.inner.find(collection, filter, options).await
    }

    async fn insert_one(&self, collection: &str, document: Document) -> Result<(), StoreError> {
        self.inner.insert_one(collection, document).await
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        upsert: bool,
    ) -> Result<UpdateResult, StoreError> {
        self.inner.update_one(collection, filter, update, upsert).await
    }

    async fn bulk_write(
        &self,
        collection: &str,
        ops: Vec<WriteOp>,
        ordered: bool,
    ) -> Result<BulkWriteResult, StoreError> {
        self.inner.bulk_write(collection, ops, ordered).await
    }
}

// =========================================================================
// A gate that yields before answering
// =========================================================================

/// Suspends once per lookup, so concurrent joins all read the session
/// before any of them writes.
pub struct YieldingGate(pub Capacity);

impl EntitlementGate for YieldingGate {
    async fn capacity(&self, _host: &UserId) -> Capacity {
        tokio::task::yield_now().await;
        self.0
    }
}

// =========================================================================
// Harness
// =========================================================================

pub struct Harness<S, E = StaticGate> {
    pub store: Arc<S>,
    pub tasks: Arc<TaskRegistry<SessionId>>,
    pub manager: SessionManager<Countdown, S>,
    pub joins: JoinController<Countdown, S, E>,
    pub scheduler: RoundScheduler<Countdown, S>,
    pub conclusion: ConclusionService<Countdown, S>,
    pub projections: Projections<Countdown, S>,
}

impl Harness<MemoryStore> {
    pub fn new(game: Countdown) -> Self {
        Self::with(game, MemoryStore::new(), StaticGate::unlimited())
    }
}

impl<S: Store, E: EntitlementGate> Harness<S, E> {
    pub fn with(game: Countdown, store: S, gate: E) -> Self {
        let game = Arc::new(game);
        let store = Arc::new(store);
        let tasks = Arc::new(TaskRegistry::new());
        Self {
            manager: SessionManager::new(Arc::clone(&game), Arc::clone(&store), Arc::clone(&tasks)),
            joins: JoinController::new(Arc::clone(&game), Arc::clone(&store), Arc::new(gate)),
            scheduler: RoundScheduler::new(Arc::clone(&game), Arc::clone(&store), Arc::clone(&tasks)),
            conclusion: ConclusionService::new(Arc::clone(&game), Arc::clone(&store)),
            projections: Projections::new(game, Arc::clone(&store)),
            store,
            tasks,
        }
    }

    /// Creates a session in `guild` hosted by `host`.
    pub async fn create(&self, guild: &str, host: &str) -> Session<Countdown> {
        self.manager
            .create(&GuildId::from(guild), &UserId::from(host), host, &mut rng(0))
            .await
            .expect("create session")
    }

    pub async fn join(&self, session_id: &SessionId, user: &str) {
        self.joins
            .join(session_id, &UserId::from(user), user, &mut rng(1))
            .await
            .expect("join session");
    }
}

pub fn rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Lets spawned tasks run to their next await point.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
