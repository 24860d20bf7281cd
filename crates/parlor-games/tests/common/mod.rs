//! Builds sessions in memory and plays rounds through the same document
//! update path the store uses.

#![allow(dead_code)]

use chrono::Utc;
use parlor_session::{
    GameLogic, GuildId, Session, SessionHeader, SessionId, SessionState, UserId, from_document,
    to_document,
};
use rand::SeedableRng;
use rand::rngs::StdRng;

pub fn rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

pub fn session<G: GameLogic>(participants: Vec<G::Participant>, round: G::Round) -> Session<G> {
    let guild_id = GuildId::from("guild");
    let host_user_id = UserId::from("host");
    let now = Utc::now();
    Session {
        header: SessionHeader {
            id: SessionId::random(),
            session_key: SessionHeader::session_key(&guild_id, &host_user_id, now),
            guild_id,
            host_user_id,
            state: SessionState::InProgress,
            created_at: now,
            started_at: Some(now),
            ended_at: None,
            winner_ids: Vec::new(),
        },
        participants,
        round,
    }
}

/// Advances one round and applies the game's targeted update to the
/// stored form of the session.
pub fn play_round<G: GameLogic>(
    game: &G,
    session: &Session<G>,
    rng: &mut StdRng,
) -> (G::Delta, Session<G>) {
    let delta = game.advance(session, rng);
    let update = game.delta_update(session, &delta);
    let mut document = to_document(session).unwrap();
    update.apply(&mut document, false).unwrap();
    (delta, from_document(document).unwrap())
}
