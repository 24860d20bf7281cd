//! Capacity-gated admission of participants.

use std::sync::Arc;

use parlor_store::{Filter, Store, StoreError, Update};
use rand::Rng;

use crate::record::field;
use crate::{
    Capacity, EntitlementGate, GameError, GameLogic, Session, SessionId, SessionState, UserId,
    codec,
};

/// Confirmation of a successful join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinReceipt {
    pub session_id: SessionId,
    pub user_id: UserId,
    /// Participant count including the new player, as of the pre-join read.
    pub participants: usize,
    pub capacity: Capacity,
}

/// Admits players into waiting sessions.
///
/// The capacity check reads the participant count before appending, so
/// simultaneous joiners may overshoot the cap by the number of racers.
/// The cap is a display limit, not a resource guarantee. Uniqueness is
/// strict: the append itself is conditional on the user not being present.
pub struct JoinController<G, S, E> {
    game: Arc<G>,
    store: Arc<S>,
    gate: Arc<E>,
}

impl<G, S, E> Clone for JoinController<G, S, E> {
    fn clone(&self) -> Self {
        Self {
            game: Arc::clone(&self.game),
            store: Arc::clone(&self.store),
            gate: Arc::clone(&self.gate),
        }
    }
}

impl<G: GameLogic, S: Store, E: EntitlementGate> JoinController<G, S, E> {
    pub fn new(game: Arc<G>, store: Arc<S>, gate: Arc<E>) -> Self {
        Self { game, store, gate }
    }

    async fn load(&self, session_id: &SessionId) -> Result<Session<G>, GameError> {
        let document = self
            .store
            .find_one(G::KIND.sessions_collection(), &Filter::by_id(session_id))
            .await?
            .ok_or_else(|| GameError::NotFound(session_id.clone()))?;
        Ok(codec::from_document(document)?)
    }

    /// Adds `user_id` to the session.
    ///
    /// Preconditions are checked in order: the session exists, it is
    /// waiting, the user is not already in it, and the host's capacity
    /// admits one more.
    pub async fn join<R: Rng + ?Sized>(
        &self,
        session_id: &SessionId,
        user_id: &UserId,
        username: &str,
        rng: &mut R,
    ) -> Result<JoinReceipt, GameError> {
        let session = self.load(session_id).await?;
        check_joinable(&session, user_id)?;

        let capacity = self.gate.capacity(&session.header.host_user_id).await;
        let current = session.participants.len();
        if !capacity.admits(current) {
            return Err(GameError::Capacity {
                session_id: session_id.clone(),
                capacity: match capacity {
                    Capacity::Limited(max) => max,
                    Capacity::Unlimited => current,
                },
            });
        }

        let participant = self
            .game
            .new_participant(user_id.clone(), username.to_string(), rng);
        let filter = Filter::by_id(session_id)
            .eq(field::STATE, SessionState::Waiting)
            .ne(field::PARTICIPANT_USER_ID, user_id);
        let update = Update::new().push(field::PARTICIPANTS, codec::to_value(&participant)?);
        let result = self
            .store
            .update_one(G::KIND.sessions_collection(), &filter, &update, false)
            .await?;

        if result.matched == 0 {
            // Lost a race: the session started, was cancelled, or the same
            // user joined from another click. Re-read to say which.
            let session = self.load(session_id).await?;
            check_joinable(&session, user_id)?;
            return Err(GameError::Store(StoreError::WriteFailed(format!(
                "join of {user_id} into {session_id} matched no document"
            ))));
        }

        tracing::info!(
            %session_id,
            %user_id,
            players = current + 1,
            %capacity,
            "participant joined"
        );
        Ok(JoinReceipt {
            session_id: session_id.clone(),
            user_id: user_id.clone(),
            participants: current + 1,
            capacity,
        })
    }
}

fn check_joinable<G: GameLogic>(session: &Session<G>, user_id: &UserId) -> Result<(), GameError> {
    if !session.state().is_joinable() {
        return Err(GameError::NotJoinable {
            session_id: session.id().clone(),
            state: session.state(),
        });
    }
    if session.contains(user_id) {
        return Err(GameError::AlreadyJoined {
            session_id: session.id().clone(),
            user_id: user_id.clone(),
        });
    }
    Ok(())
}
