//! Squib: elimination rounds until one player is left.
//!
//! Every round plays one minigame picked uniformly at random. Each alive
//! player is eliminated independently with the minigame's probability, so
//! a round can eliminate nobody or everybody.

use std::time::Duration;

use parlor_session::record::field;
use parlor_session::{GameKind, GameLogic, ParticipantRecord, Session, UserId};
use parlor_store::Update;
use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{trace, warn};

pub const ROUND_INTERVAL: Duration = Duration::from_secs(10);
/// Eliminated players named in one round's narrative.
const NAMED_ELIMINATIONS: usize = 10;

const CURRENT_ROUND: &str = "current_round";
const STATUS: &str = "status";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Minigame {
    pub name: &'static str,
    pub description: &'static str,
    /// Chance each alive player is eliminated, in `0.0..=1.0`.
    pub elimination_probability: f64,
    pub all_survived: &'static str,
}

pub const MINIGAMES: [Minigame; 8] = [
    Minigame {
        name: "Red Light, Green Light",
        description: "Freeze on 'Red Light', move on 'Green Light'. Don't get caught moving!",
        elimination_probability: 0.40,
        all_survived: "Everyone held their breath and froze! No eliminations this time.",
    },
    Minigame {
        name: "Glass Bridge",
        description: "Choose wisely between tempered and regular glass panels to cross.",
        elimination_probability: 0.35,
        all_survived: "Incredible! Everyone navigated the treacherous bridge successfully!",
    },
    Minigame {
        name: "Tug of War",
        description: "Pure strength and teamwork. Pull the opposing team across the line.",
        elimination_probability: 0.50,
        all_survived: "A rare stalemate! Both sides held firm, no eliminations this round.",
    },
    Minigame {
        name: "Marbles",
        description: "A game of strategy and precision. Win your opponent's marbles.",
        elimination_probability: 0.30,
        all_survived: "A surprisingly peaceful round. Everyone held onto their marbles.",
    },
    Minigame {
        name: "Dalgona Candy",
        description: "Carefully carve out the shape without breaking the candy.",
        elimination_probability: 0.40,
        all_survived: "Amazing concentration! Everyone carved their shapes!",
    },
    Minigame {
        name: "Odd One Out",
        description: "Identify the item that doesn't belong in the group.",
        elimination_probability: 0.25,
        all_survived: "Sharp minds prevailed! Everyone spotted the odd one out.",
    },
    Minigame {
        name: "Rock Paper Scissors",
        description: "Classic game of chance and psychology. Win the round to survive.",
        elimination_probability: 0.33,
        all_survived: "A series of draws! Everyone lives to play another round.",
    },
    Minigame {
        name: "Memory Match",
        description: "Remember the sequence or pattern shown. One mistake is fatal.",
        elimination_probability: 0.30,
        all_survived: "Incredible focus! Everyone aced the memory test.",
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SquibStatus {
    #[default]
    Alive,
    Eliminated,
}

impl From<SquibStatus> for Value {
    fn from(status: SquibStatus) -> Self {
        Value::from(match status {
            SquibStatus::Alive => "alive",
            SquibStatus::Eliminated => "eliminated",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SquibParticipant {
    pub user_id: UserId,
    pub username: String,
    #[serde(default)]
    pub status: SquibStatus,
}

impl SquibParticipant {
    pub fn is_alive(&self) -> bool {
        self.status == SquibStatus::Alive
    }
}

impl ParticipantRecord for SquibParticipant {
    fn user_id(&self) -> &UserId {
        &self.user_id
    }

    fn username(&self) -> &str {
        &self.username
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SquibRound {
    #[serde(default)]
    pub current_round: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SquibDelta {
    pub round: u32,
    pub minigame: Minigame,
    /// Indices of participants eliminated this round.
    pub eliminated: Vec<usize>,
    pub alive_after: usize,
}

#[derive(Debug, Clone)]
pub struct Squib {
    minigames: Vec<Minigame>,
}

impl Default for Squib {
    fn default() -> Self {
        Self {
            minigames: MINIGAMES.to_vec(),
        }
    }
}

impl Squib {
    /// Plays only `minigames`. Minigames whose elimination probability is
    /// not a finite number are dropped; if none remain, the standard set is
    /// kept.
    pub fn with_minigames(minigames: Vec<Minigame>) -> Self {
        let minigames: Vec<Minigame> = minigames
            .into_iter()
            .filter(|m| {
                let finite = m.elimination_probability.is_finite();
                if !finite {
                    warn!(minigame = m.name, "dropping minigame with non-finite probability");
                }
                finite
            })
            .collect();
        if minigames.is_empty() {
            warn!("empty minigame list, using the standard set");
            return Self::default();
        }
        Self { minigames }
    }

    pub fn minigames(&self) -> &[Minigame] {
        &self.minigames
    }

    fn alive(session: &Session<Self>) -> impl Iterator<Item = &SquibParticipant> {
        session.participants.iter().filter(|p| p.is_alive())
    }
}

impl GameLogic for Squib {
    type Participant = SquibParticipant;
    type Round = SquibRound;
    type Delta = SquibDelta;

    const KIND: GameKind = GameKind::Squib;

    fn new_participant<R: Rng + ?Sized>(
        &self,
        user_id: UserId,
        username: String,
        _rng: &mut R,
    ) -> SquibParticipant {
        SquibParticipant {
            user_id,
            username,
            status: SquibStatus::Alive,
        }
    }

    fn is_terminal(&self, session: &Session<Self>) -> bool {
        Self::alive(session).count() <= 1
    }

    fn advance<R: Rng + ?Sized>(&self, session: &Session<Self>, rng: &mut R) -> SquibDelta {
        let minigame = self.minigames.choose(rng).copied().unwrap_or(MINIGAMES[0]);
        let probability = minigame.elimination_probability.clamp(0.0, 1.0);

        let mut eliminated = Vec::new();
        let mut alive_after = 0;
        for (index, participant) in session.participants.iter().enumerate() {
            if !participant.is_alive() {
                continue;
            }
            if rng.random_bool(probability) {
                eliminated.push(index);
            } else {
                alive_after += 1;
            }
        }
        let round = session.round.current_round + 1;
        trace!(
            round,
            minigame = minigame.name,
            eliminated = eliminated.len(),
            alive_after,
            "squib round"
        );

        SquibDelta {
            round,
            minigame,
            eliminated,
            alive_after,
        }
    }

    fn delta_update(&self, _session: &Session<Self>, delta: &SquibDelta) -> Update {
        delta.eliminated.iter().fold(
            Update::new().set(CURRENT_ROUND, delta.round),
            |update, &index| update.set(field::participant(index, STATUS), SquibStatus::Eliminated),
        )
    }

    fn narrate(&self, session: &Session<Self>, delta: &SquibDelta) -> String {
        let mut text = format!(
            "Round {}: {}\n{}\n",
            delta.round, delta.minigame.name, delta.minigame.description
        );
        if delta.eliminated.is_empty() {
            text.push_str(delta.minigame.all_survived);
        } else {
            let names: Vec<&str> = delta
                .eliminated
                .iter()
                .take(NAMED_ELIMINATIONS)
                .filter_map(|&i| session.participants.get(i))
                .map(|p| p.username.as_str())
                .collect();
            text.push_str(&format!("Eliminated: {}", names.join(", ")));
            let unnamed = delta.eliminated.len().saturating_sub(NAMED_ELIMINATIONS);
            if unnamed > 0 {
                text.push_str(&format!(" and {unnamed} others"));
            }
            text.push('.');
        }
        text.push_str(&format!("\n{} players remain.", delta.alive_after));
        text
    }

    /// One alive player wins outright. If the last round eliminated
    /// everyone, the winner is drawn from all participants, eliminated
    /// ones included. More than one alive is not terminal, but if asked the
    /// winner is drawn from the alive.
    fn winners<R: Rng + ?Sized>(
        &self,
        session: &Session<Self>,
        rng: &mut R,
    ) -> Vec<SquibParticipant> {
        let alive: Vec<&SquibParticipant> = Self::alive(session).collect();
        let winner = match alive.as_slice() {
            [only] => Some(*only),
            [] => session.participants.choose(rng),
            many => many.choose(rng).copied(),
        };
        winner.cloned().into_iter().collect()
    }

    fn progress(&self, session: &Session<Self>) -> String {
        format!(
            "Round {}. {}/{} players alive.",
            session.round.current_round,
            Self::alive(session).count(),
            session.participants.len()
        )
    }

    fn tick_interval(&self) -> Duration {
        ROUND_INTERVAL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minigames_probabilities_within_bounds() {
        for minigame in MINIGAMES {
            assert!(
                (0.25..=0.5).contains(&minigame.elimination_probability),
                "{} has {}",
                minigame.name,
                minigame.elimination_probability
            );
        }
    }

    #[test]
    fn test_with_minigames_empty_keeps_standard_set() {
        assert_eq!(Squib::with_minigames(Vec::new()).minigames().len(), MINIGAMES.len());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(SquibStatus::Eliminated).unwrap(),
            Value::from(SquibStatus::Eliminated)
        );
        assert_eq!(Value::from(SquibStatus::Alive), serde_json::json!("alive"));
    }

    #[test]
    fn test_participant_missing_status_defaults_alive() {
        let participant: SquibParticipant =
            serde_json::from_value(serde_json::json!({"user_id": "u", "username": "u"})).unwrap();
        assert!(participant.is_alive());
    }
}
