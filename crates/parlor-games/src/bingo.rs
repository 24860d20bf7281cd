//! 75-ball Bingo.
//!
//! Each round draws one uncalled number, marks it on every card holding
//! it, and checks those cards for a completed line. Once 30 numbers have
//! been called a one-time leaderboard ranks players by cells left.

use std::collections::BTreeSet;
use std::time::Duration;

use parlor_session::record::field;
use parlor_session::{GameKind, GameLogic, ParticipantRecord, Session, Standing, UserId};
use parlor_store::Update;
use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};
use serde::{Deserialize, Serialize};
use tracing::trace;

pub const CARD_SIZE: usize = 5;
pub const MAX_NUMBER: u8 = 75;
/// The free center cell.
pub const FREE: u8 = 0;
/// `ceil(0.4 * 75)`.
pub const HALFWAY_CALLS: usize = 30;
pub const CALL_INTERVAL: Duration = Duration::from_secs(8);
const RECENT_CALLS: usize = 10;

const CALLED_NUMBERS: &str = "called_numbers";
const HALFWAY_BREAK_SHOWN: &str = "halfway_break_shown";
const MARKED: &str = "marked";
const HAS_BINGO: &str = "has_bingo";

/// Column letter for a called number: B 1-15, I 16-30, N 31-45, G 46-60,
/// O 61-75.
pub fn letter(number: u8) -> char {
    match number {
        1..=15 => 'B',
        16..=30 => 'I',
        31..=45 => 'N',
        46..=60 => 'G',
        _ => 'O',
    }
}

pub fn label(number: u8) -> String {
    format!("{}-{number}", letter(number))
}

// =========================================================================
// Card
// =========================================================================

/// A 5x5 card stored row-major, with [`FREE`] at the center.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BingoCard([[u8; CARD_SIZE]; CARD_SIZE]);

impl BingoCard {
    pub fn from_rows(rows: [[u8; CARD_SIZE]; CARD_SIZE]) -> Self {
        Self(rows)
    }

    /// Draws five distinct numbers per column from that column's range.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut rows = [[FREE; CARD_SIZE]; CARD_SIZE];
        for col in 0..CARD_SIZE {
            let low = col as u8 * 15 + 1;
            let mut pool: Vec<u8> = (low..low + 15).collect();
            pool.shuffle(rng);
            for (row, number) in pool.into_iter().take(CARD_SIZE).enumerate() {
                rows[row][col] = number;
            }
        }
        rows[CARD_SIZE / 2][CARD_SIZE / 2] = FREE;
        Self(rows)
    }

    pub fn rows(&self) -> &[[u8; CARD_SIZE]; CARD_SIZE] {
        &self.0
    }

    pub fn contains(&self, number: u8) -> bool {
        number != FREE && self.0.iter().flatten().any(|&cell| cell == number)
    }

    fn covered(cell: u8, marked: &BTreeSet<u8>) -> bool {
        cell == FREE || marked.contains(&cell)
    }

    /// Returns `true` if some row, column, or diagonal is entirely free or
    /// marked.
    pub fn has_line(&self, marked: &BTreeSet<u8>) -> bool {
        let cells = &self.0;
        let covered = |row: usize, col: usize| Self::covered(cells[row][col], marked);

        let row_done = (0..CARD_SIZE).any(|r| (0..CARD_SIZE).all(|c| covered(r, c)));
        let col_done = (0..CARD_SIZE).any(|c| (0..CARD_SIZE).all(|r| covered(r, c)));
        let diagonal = (0..CARD_SIZE).all(|i| covered(i, i));
        let anti_diagonal = (0..CARD_SIZE).all(|i| covered(i, CARD_SIZE - 1 - i));
        row_done || col_done || diagonal || anti_diagonal
    }

    /// Cells neither free nor marked.
    pub fn remaining(&self, marked: &BTreeSet<u8>) -> usize {
        self.0
            .iter()
            .flatten()
            .filter(|&&cell| !Self::covered(cell, marked))
            .count()
    }
}

// =========================================================================
// Records
// =========================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BingoParticipant {
    pub user_id: UserId,
    pub username: String,
    pub card: BingoCard,
    #[serde(default)]
    pub marked: BTreeSet<u8>,
    #[serde(default)]
    pub has_bingo: bool,
}

impl ParticipantRecord for BingoParticipant {
    fn user_id(&self) -> &UserId {
        &self.user_id
    }

    fn username(&self) -> &str {
        &self.username
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BingoRound {
    #[serde(default)]
    pub called_numbers: Vec<u8>,
    #[serde(default)]
    pub halfway_break_shown: bool,
}

/// One draw and its effect on the cards.
#[derive(Debug, Clone, PartialEq)]
pub struct BingoDelta {
    /// `None` once the pool is exhausted.
    pub drawn: Option<u8>,
    /// Numbers called after this draw.
    pub called: usize,
    /// Indices of participants whose card held the number.
    pub marked: Vec<usize>,
    /// Indices of participants who completed a line this round.
    pub new_bingos: Vec<usize>,
    pub halfway: Option<Vec<Standing>>,
}

// =========================================================================
// Rules
// =========================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct Bingo;

impl Bingo {
    /// Standings by cells remaining, ties kept in join order.
    fn standings(participants: &[BingoParticipant], drawn: Option<u8>) -> Vec<Standing> {
        let mut ranked: Vec<Standing> = participants
            .iter()
            .map(|p| {
                let mut marked = p.marked.clone();
                marked.extend(drawn.filter(|&n| p.card.contains(n)));
                Standing {
                    user_id: p.user_id.clone(),
                    username: p.username.clone(),
                    remaining: p.card.remaining(&marked),
                }
            })
            .collect();
        ranked.sort_by_key(|s| s.remaining);
        ranked
    }
}

impl GameLogic for Bingo {
    type Participant = BingoParticipant;
    type Round = BingoRound;
    type Delta = BingoDelta;

    const KIND: GameKind = GameKind::Bingo;

    fn new_participant<R: Rng + ?Sized>(
        &self,
        user_id: UserId,
        username: String,
        rng: &mut R,
    ) -> BingoParticipant {
        BingoParticipant {
            user_id,
            username,
            card: BingoCard::generate(rng),
            marked: BTreeSet::new(),
            has_bingo: false,
        }
    }

    fn is_terminal(&self, session: &Session<Self>) -> bool {
        session.participants.iter().any(|p| p.has_bingo)
            || session.round.called_numbers.len() >= usize::from(MAX_NUMBER)
    }

    fn advance<R: Rng + ?Sized>(&self, session: &Session<Self>, rng: &mut R) -> BingoDelta {
        let called = &session.round.called_numbers;
        let pool: Vec<u8> = (1..=MAX_NUMBER).filter(|n| !called.contains(n)).collect();
        let drawn = pool.choose(rng).copied();

        let mut marked = Vec::new();
        let mut new_bingos = Vec::new();
        if let Some(number) = drawn {
            for (index, participant) in session.participants.iter().enumerate() {
                if !participant.card.contains(number) {
                    continue;
                }
                marked.push(index);
                let mut after = participant.marked.clone();
                after.insert(number);
                if !participant.has_bingo && participant.card.has_line(&after) {
                    new_bingos.push(index);
                }
            }
        }

        let called_after = called.len() + usize::from(drawn.is_some());
        let halfway = (!session.round.halfway_break_shown && called_after >= HALFWAY_CALLS)
            .then(|| Self::standings(&session.participants, drawn));
        trace!(?drawn, called = called_after, marked = marked.len(), "bingo draw");

        BingoDelta {
            drawn,
            called: called_after,
            marked,
            new_bingos,
            halfway,
        }
    }

    fn delta_update(&self, _session: &Session<Self>, delta: &BingoDelta) -> Update {
        let mut update = Update::new();
        if let Some(number) = delta.drawn {
            update = update.push(CALLED_NUMBERS, number);
            for &index in &delta.marked {
                update = update.push(field::participant(index, MARKED), number);
            }
        }
        for &index in &delta.new_bingos {
            update = update.set(field::participant(index, HAS_BINGO), true);
        }
        if delta.halfway.is_some() {
            update = update.set(HALFWAY_BREAK_SHOWN, true);
        }
        update
    }

    fn narrate(&self, session: &Session<Self>, delta: &BingoDelta) -> String {
        let Some(number) = delta.drawn else {
            return format!("All {MAX_NUMBER} numbers have been called.");
        };
        let mut text = format!(
            "Latest number: {}. Total called: {}/{MAX_NUMBER}. Players: {}.",
            label(number),
            delta.called,
            session.participants.len()
        );
        let names: Vec<&str> = delta
            .new_bingos
            .iter()
            .filter_map(|&i| session.participants.get(i))
            .map(|p| p.username.as_str())
            .collect();
        if !names.is_empty() {
            text.push_str(&format!(" BINGO for {}!", names.join(", ")));
        }
        text
    }

    fn winners<R: Rng + ?Sized>(
        &self,
        session: &Session<Self>,
        _rng: &mut R,
    ) -> Vec<BingoParticipant> {
        session
            .participants
            .iter()
            .filter(|p| p.has_bingo)
            .cloned()
            .collect()
    }

    fn halfway_leaderboard<'a>(&self, delta: &'a BingoDelta) -> Option<&'a [Standing]> {
        delta.halfway.as_deref()
    }

    fn progress(&self, session: &Session<Self>) -> String {
        let called = &session.round.called_numbers;
        let recent: Vec<String> = called
            .iter()
            .rev()
            .take(RECENT_CALLS)
            .map(|&n| label(n))
            .collect();
        if recent.is_empty() {
            "No numbers called yet.".to_string()
        } else {
            format!("Called {}/{MAX_NUMBER}. Recent: {}", called.len(), recent.join(", "))
        }
    }

    fn tick_interval(&self) -> Duration {
        CALL_INTERVAL
    }
}
