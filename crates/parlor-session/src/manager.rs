//! Session manager: create, begin, cancel, and look up sessions.

use std::sync::Arc;

use chrono::Utc;
use parlor_store::{Filter, Store, Update};
use parlor_tick::TaskRegistry;
use rand::Rng;

use crate::record::field;
use crate::{
    GameError, GameLogic, GuildId, Session, SessionHeader, SessionId, SessionState, UserId, codec,
};

/// Default minimum number of participants before a session can run.
pub const DEFAULT_MIN_PLAYERS: usize = 2;

/// Owns the session lifecycle outside the round loop.
///
/// Enforces at most one active (waiting or in-progress) session per guild
/// and host-only control. Every state change is a guarded update that
/// names the expected current state in its filter, so two racing commands
/// cannot both win.
pub struct SessionManager<G, S> {
    game: Arc<G>,
    store: Arc<S>,
    tasks: Arc<TaskRegistry<SessionId>>,
    min_players: usize,
}

impl<G, S> Clone for SessionManager<G, S> {
    fn clone(&self) -> Self {
        Self {
            game: Arc::clone(&self.game),
            store: Arc::clone(&self.store),
            tasks: Arc::clone(&self.tasks),
            min_players: self.min_players,
        }
    }
}

impl<G: GameLogic, S: Store> SessionManager<G, S> {
    pub fn new(game: Arc<G>, store: Arc<S>, tasks: Arc<TaskRegistry<SessionId>>) -> Self {
        Self {
            game,
            store,
            tasks,
            min_players: DEFAULT_MIN_PLAYERS,
        }
    }

    pub fn with_min_players(mut self, min_players: usize) -> Self {
        self.min_players = min_players.max(1);
        self
    }

    pub fn min_players(&self) -> usize {
        self.min_players
    }

    fn collection(&self) -> &'static str {
        G::KIND.sessions_collection()
    }

    fn active_filter(guild_id: &GuildId) -> Filter {
        Filter::new()
            .eq(field::GUILD_ID, guild_id)
            .is_in(field::STATE, SessionState::ACTIVE)
    }

    /// Creates a waiting session with the host as its first participant.
    ///
    /// The active-session check and the insert are a single conditional
    /// upsert, so two concurrent creates in one guild yield exactly one
    /// session and one [`GameError::Conflict`].
    pub async fn create<R: Rng + ?Sized>(
        &self,
        guild_id: &GuildId,
        host: &UserId,
        host_name: &str,
        rng: &mut R,
    ) -> Result<Session<G>, GameError> {
        let now = Utc::now();
        let host_participant = self
            .game
            .new_participant(host.clone(), host_name.to_string(), rng);
        let session = Session::<G> {
            header: SessionHeader {
                id: SessionId::random(),
                guild_id: guild_id.clone(),
                host_user_id: host.clone(),
                session_key: SessionHeader::session_key(guild_id, host, now),
                state: SessionState::Waiting,
                created_at: now,
                started_at: None,
                ended_at: None,
                winner_ids: Vec::new(),
            },
            participants: vec![host_participant],
            round: G::Round::default(),
        };

        let insert = codec::to_document(&session)?
            .into_iter()
            .fold(Update::new(), |update, (key, value)| update.set_on_insert(key, value));
        let result = self
            .store
            .update_one(self.collection(), &Self::active_filter(guild_id), &insert, true)
            .await?;

        if !result.upserted {
            let existing = self
                .active_session(guild_id)
                .await?
                .map(|s| s.header.id)
                .unwrap_or_else(|| session.header.id.clone());
            tracing::debug!(%guild_id, %existing, "create refused, guild has an active session");
            return Err(GameError::Conflict {
                guild_id: guild_id.clone(),
                session_id: existing,
            });
        }

        tracing::info!(
            game = %G::KIND,
            session_id = %session.header.id,
            %guild_id,
            %host,
            "session created"
        );
        Ok(session)
    }

    /// Loads a session by id.
    pub async fn load(&self, session_id: &SessionId) -> Result<Session<G>, GameError> {
        let document = self
            .store
            .find_one(self.collection(), &Filter::by_id(session_id))
            .await?
            .ok_or_else(|| GameError::NotFound(session_id.clone()))?;
        Ok(codec::from_document(document)?)
    }

    /// The guild's waiting or in-progress session, if any.
    pub async fn active_session(&self, guild_id: &GuildId) -> Result<Option<Session<G>>, GameError> {
        let found = self
            .store
            .find_one(self.collection(), &Self::active_filter(guild_id))
            .await?;
        Ok(found.map(codec::from_document::<Session<G>>).transpose()?)
    }

    /// Moves a waiting session to in-progress. Host only.
    ///
    /// Checks, in order: host, state, minimum players. Returns the session
    /// as it stands after the transition.
    pub async fn begin(
        &self,
        session_id: &SessionId,
        requester: &UserId,
    ) -> Result<Session<G>, GameError> {
        let mut session = self.load(session_id).await?;
        if !session.is_host(requester) {
            return Err(GameError::HostOnly {
                session_id: session_id.clone(),
                requester: requester.clone(),
            });
        }
        if !session.state().can_transition_to(SessionState::InProgress) {
            return Err(GameError::InvalidState {
                session_id: session_id.clone(),
                state: session.state(),
            });
        }
        if session.participants.len() < self.min_players {
            return Err(GameError::NotEnoughPlayers {
                session_id: session_id.clone(),
                have: session.participants.len(),
                need: self.min_players,
            });
        }

        let now = Utc::now();
        let filter = Filter::by_id(session_id).eq(field::STATE, SessionState::Waiting);
        let update = Update::new()
            .set(field::STATE, SessionState::InProgress)
            .set(field::STARTED_AT, codec::timestamp(now)?);
        let result = self
            .store
            .update_one(self.collection(), &filter, &update, false)
            .await?;
        if result.matched == 0 {
            let current = self.load(session_id).await?;
            return Err(GameError::InvalidState {
                session_id: session_id.clone(),
                state: current.state(),
            });
        }

        // Reload so joins that landed between the first read and the
        // transition are part of the returned snapshot.
        session = self.load(session_id).await?;
        tracing::info!(
            %session_id,
            guild_id = %session.header.guild_id,
            players = session.participants.len(),
            "session started"
        );
        Ok(session)
    }

    /// Cancels a waiting or in-progress session and aborts its round task.
    /// Host only.
    pub async fn cancel(&self, session_id: &SessionId, requester: &UserId) -> Result<(), GameError> {
        let session = self.load(session_id).await?;
        if !session.is_host(requester) {
            return Err(GameError::HostOnly {
                session_id: session_id.clone(),
                requester: requester.clone(),
            });
        }
        if session.state().is_terminal() {
            return Err(GameError::InvalidState {
                session_id: session_id.clone(),
                state: session.state(),
            });
        }

        let filter = Filter::by_id(session_id).is_in(field::STATE, SessionState::ACTIVE);
        let update = Update::new()
            .set(field::STATE, SessionState::Cancelled)
            .set(field::ENDED_AT, codec::timestamp(Utc::now())?);
        let result = self
            .store
            .update_one(self.collection(), &filter, &update, false)
            .await?;
        if result.matched == 0 {
            let current = self.load(session_id).await?;
            return Err(GameError::InvalidState {
                session_id: session_id.clone(),
                state: current.state(),
            });
        }

        let aborted = self.tasks.cancel(session_id);
        tracing::info!(
            %session_id,
            guild_id = %session.header.guild_id,
            from = %session.state(),
            aborted_task = aborted,
            "session cancelled"
        );
        Ok(())
    }
}
