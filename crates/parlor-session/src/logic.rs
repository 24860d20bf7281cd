//! The `GameLogic` trait: the extension point each game implements.
//!
//! The engine owns persistence, scheduling and delivery. A game only
//! describes its records and how one round changes them.

use std::fmt::Debug;
use std::time::Duration;

use parlor_store::Update;
use rand::Rng;
use serde::{Serialize, de::DeserializeOwned};

use crate::{GameKind, ParticipantRecord, Session, Standing, UserId};

/// Rules for one game type.
///
/// Each associated type defines the shape of the game's stored data:
/// - `Participant`: one entry in the session's `participants` array
///   (a Bingo card and its marks, a Squib player's status)
/// - `Round`: the game's round fields next to the header
/// - `Delta`: what one round changed
///
/// The round loop calls, in order, [`is_terminal`](Self::is_terminal),
/// then either [`winners`](Self::winners) (terminal) or
/// [`advance`](Self::advance), [`delta_update`](Self::delta_update) and
/// [`narrate`](Self::narrate) (not terminal), and sleeps
/// [`tick_interval`](Self::tick_interval) before the next round.
///
/// `advance` is a pure function of the loaded session and the injected
/// RNG: it computes a delta and touches nothing else. The scheduler turns
/// the delta into a targeted store update through
/// [`delta_update`](Self::delta_update), so writes never overwrite the
/// `participants` array wholesale and concurrent joins survive.
///
/// # Trait bounds
///
/// - `Send + Sync + 'static`: the game is shared, behind an `Arc`, by the
///   command handlers and every round task.
/// - The associated types are `Serialize + DeserializeOwned` because they
///   only live in the store between rounds.
///
/// See `parlor_games::Bingo` and `parlor_games::Squib` for complete
/// implementations.
pub trait GameLogic: Sized + Send + Sync + 'static {
    /// A participant entry in the session's `participants` array.
    type Participant: ParticipantRecord
        + Clone
        + Debug
        + PartialEq
        + Send
        + Sync
        + Serialize
        + DeserializeOwned;

    /// Round fields stored next to the header (called numbers, round
    /// counter, ...). Must serialize as a map; it is flattened into the
    /// session document.
    type Round: Clone + Debug + Default + Send + Sync + Serialize + DeserializeOwned;

    /// What one round changed.
    type Delta: Clone + Debug + Send + Sync;

    const KIND: GameKind;

    /// Builds the record for a player joining (or hosting) a session.
    fn new_participant<R: Rng + ?Sized>(
        &self,
        user_id: UserId,
        username: String,
        rng: &mut R,
    ) -> Self::Participant;

    /// Returns `true` when the session should be concluded instead of
    /// advanced.
    fn is_terminal(&self, session: &Session<Self>) -> bool;

    /// Plays one round.
    ///
    /// Called once per tick on a session that is in progress and not
    /// terminal.
    ///
    /// # Arguments
    /// - `session`: the session as just reloaded from the store
    /// - `rng`: the round task's generator; seeded in tests
    ///
    /// # Returns
    /// The round's delta. Nothing is written until the scheduler applies
    /// [`delta_update`](Self::delta_update).
    fn advance<R: Rng + ?Sized>(&self, session: &Session<Self>, rng: &mut R) -> Self::Delta;

    /// The targeted update that applies `delta` to the stored session.
    ///
    /// Use `$push` and indexed `$set` paths (`participants.3.status`)
    /// rather than rewriting arrays, so a join racing the round is kept.
    fn delta_update(&self, session: &Session<Self>, delta: &Self::Delta) -> Update;

    /// One-paragraph description of the round for the chat channel.
    fn narrate(&self, session: &Session<Self>, delta: &Self::Delta) -> String;

    /// Picks the winners of a terminal session.
    ///
    /// # Returns
    /// The winning participants, possibly several (Bingo ties) or none
    /// (Bingo with every number called and no line).
    fn winners<R: Rng + ?Sized>(
        &self,
        session: &Session<Self>,
        rng: &mut R,
    ) -> Vec<Self::Participant>;

    /// A one-time mid-game leaderboard carried by `delta`, if any.
    fn halfway_leaderboard<'a>(&self, _delta: &'a Self::Delta) -> Option<&'a [Standing]> {
        None
    }

    /// Short progress line for status queries. Default: empty.
    fn progress(&self, _session: &Session<Self>) -> String {
        String::new()
    }

    /// Pause between rounds.
    fn tick_interval(&self) -> Duration;
}
