//! End-to-end tests driving real games through the engine facade.

use std::fmt::Debug;
use std::sync::Arc;

use parlor::prelude::*;
use parlor::session::StatsDelta;
use tokio::sync::mpsc;

// =========================================================================
// Helpers
// =========================================================================

fn seeded(seed: u64) -> EngineConfig {
    EngineConfig {
        rng_seed: Some(seed),
        ..Default::default()
    }
}

fn bingo_engine(config: EngineConfig) -> Engine<Bingo, MemoryStore, StaticGate> {
    Engine::builder(Bingo)
        .config(config)
        .build(MemoryStore::new(), StaticGate::unlimited())
}

fn squib_engine(config: EngineConfig) -> Engine<Squib, MemoryStore, StaticGate> {
    Engine::builder(Squib::default())
        .config(config)
        .build(MemoryStore::new(), StaticGate::unlimited())
}

/// Starts a session hosted by "host" and joins `guests` into it.
async fn open<G, S, E>(engine: &Engine<G, S, E>, guild: &GuildId, guests: &[&str]) -> SessionId
where
    G: GameLogic + Debug,
    S: Store,
    E: EntitlementGate,
{
    let session = engine
        .start(guild, &UserId::from("host"), "Host")
        .await
        .expect("start session");
    for guest in guests {
        let event = engine.join(session.id(), &UserId::from(*guest), guest).await;
        assert!(
            matches!(event, GameEvent::JoinAccepted { .. }),
            "{guest} rejected: {event:?}"
        );
    }
    session.header.id
}

/// Collects deliveries until the conclusion arrives.
async fn until_concluded<G: GameLogic>(
    rx: &mut mpsc::UnboundedReceiver<Delivery<G>>,
) -> (Vec<Delivery<G>>, Vec<G::Participant>, StatsDelta) {
    let mut seen = Vec::new();
    while let Some(delivery) = rx.recv().await {
        if let GameEvent::GameConcluded { winners, stats, .. } = &delivery.event {
            let result = (winners.clone(), stats.clone());
            seen.push(delivery);
            return (seen, result.0, result.1);
        }
        seen.push(delivery);
    }
    panic!("channel closed before the game concluded");
}

// =========================================================================
// Full games
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_bingo_game_runs_to_a_winner() {
    let engine = bingo_engine(seeded(42));
    let guild = GuildId::from("g1");
    let session_id = open(&engine, &guild, &["alice", "bob", "carol"]).await;

    let (tx, mut rx) = mpsc::unbounded_channel::<Delivery<Bingo>>();
    let started = engine
        .run(&guild, &UserId::from("host"), Arc::new(tx))
        .await
        .unwrap();
    assert_eq!(started.state(), SessionState::InProgress);
    assert!(engine.is_running(&session_id));

    let (seen, winners, stats) = until_concluded(&mut rx).await;
    let rounds = seen
        .iter()
        .filter(|d| matches!(d.event, GameEvent::RoundAdvanced { .. }))
        .count();
    assert!(rounds >= 4, "a line needs at least four draws, got {rounds}");
    assert!(!winners.is_empty());
    assert!(winners.iter().all(|w| w.has_bingo));

    let stored = engine.session(&session_id).await.unwrap();
    assert_eq!(stored.state(), SessionState::Completed);
    let winner_ids: Vec<UserId> = winners.iter().map(|w| w.user_id.clone()).collect();
    assert_eq!(stored.header.winner_ids, winner_ids);
    assert_eq!(stored.round.called_numbers.len(), rounds);
    for winner in &winners {
        assert_eq!(stats.wins.get(&winner.user_id), Some(&1));
    }

    let board = engine.leaderboard(&guild).await.unwrap();
    assert_eq!(board.len(), 4);
    assert!(board.iter().all(|row| row.games_played == 1));
    assert_eq!(board[0].wins, 1);
}

#[tokio::test(start_paused = true)]
async fn test_bingo_halfway_break_reported_once_when_reached() {
    let engine = bingo_engine(seeded(3));
    let guild = GuildId::from("g1");
    open(&engine, &guild, &["alice"]).await;

    let (tx, mut rx) = mpsc::unbounded_channel::<Delivery<Bingo>>();
    engine.run(&guild, &UserId::from("host"), Arc::new(tx)).await.unwrap();
    let (seen, _, _) = until_concluded(&mut rx).await;

    let draws = seen
        .iter()
        .filter(|d| matches!(d.event, GameEvent::RoundAdvanced { .. }))
        .count();
    let halfway = seen
        .iter()
        .filter(|d| matches!(d.event, GameEvent::HalfwayLeaderboard { .. }))
        .count();
    assert_eq!(halfway, usize::from(draws >= 30));
}

#[tokio::test(start_paused = true)]
async fn test_squib_game_ends_with_exactly_one_winner() {
    let engine = squib_engine(seeded(9));
    let guild = GuildId::from("g1");
    let session_id = open(&engine, &guild, &["a", "b", "c", "d", "e"]).await;

    let (tx, mut rx) = mpsc::unbounded_channel::<Delivery<Squib>>();
    engine.run(&guild, &UserId::from("host"), Arc::new(tx)).await.unwrap();
    let (_, winners, _) = until_concluded(&mut rx).await;

    assert_eq!(winners.len(), 1);
    let stored = engine.session(&session_id).await.unwrap();
    assert_eq!(stored.state(), SessionState::Completed);
    assert!(stored.participants.iter().filter(|p| p.is_alive()).count() <= 1);

    let report = engine.stats(&winners[0].user_id, &guild).await.unwrap();
    assert_eq!(report.server.unwrap().wins, 1);
    assert_eq!(report.global.unwrap().wins, 1);
}

#[tokio::test(start_paused = true)]
async fn test_round_events_fall_back_to_channel_after_interaction_expires() {
    let engine = bingo_engine(EngineConfig {
        rng_seed: Some(5),
        interaction_ttl_secs: 1,
        ..Default::default()
    });
    let guild = GuildId::from("g1");
    open(&engine, &guild, &["alice"]).await;

    let (tx, mut rx) = mpsc::unbounded_channel::<Delivery<Bingo>>();
    engine.run(&guild, &UserId::from("host"), Arc::new(tx)).await.unwrap();

    let first = rx.recv().await.unwrap();
    assert_eq!(first.route, DeliveryRoute::InteractionFollowup);
    let second = rx.recv().await.unwrap();
    assert_eq!(second.route, DeliveryRoute::ChannelPost);
    engine.shutdown();
}

// =========================================================================
// Commands
// =========================================================================

#[tokio::test]
async fn test_start_twice_in_guild_is_conflict() {
    let engine = bingo_engine(seeded(1));
    let guild = GuildId::from("g1");
    open(&engine, &guild, &[]).await;

    let err = engine
        .start(&guild, &UserId::from("other"), "Other")
        .await
        .unwrap_err();
    assert!(matches!(err, ParlorError::Game(parlor::session::GameError::Conflict { .. })));
    assert_eq!(err.user_message(), "A game is already running in this server.");
}

#[tokio::test]
async fn test_join_rejections_are_events() {
    let engine = Engine::builder(Bingo)
        .config(seeded(1))
        .build(MemoryStore::new(), StaticGate::new(Capacity::Limited(2)));
    let guild = GuildId::from("g1");
    let session_id = open(&engine, &guild, &["alice"]).await;

    let again = engine.join(&session_id, &UserId::from("alice"), "alice").await;
    assert!(matches!(
        again,
        GameEvent::JoinRejected {
            reason: JoinRejection::AlreadyJoined,
            ..
        }
    ));

    let full = engine.join(&session_id, &UserId::from("bob"), "bob").await;
    assert!(matches!(
        full,
        GameEvent::JoinRejected {
            reason: JoinRejection::Full { capacity: 2 },
            ..
        }
    ));

    let missing = engine
        .join(&SessionId::from("missing"), &UserId::from("bob"), "bob")
        .await;
    assert!(matches!(
        missing,
        GameEvent::JoinRejected {
            reason: JoinRejection::NoSession,
            ..
        }
    ));
}

#[tokio::test]
async fn test_run_requires_session_host_and_players() {
    let engine = bingo_engine(seeded(1));
    let guild = GuildId::from("g1");
    let (tx, _rx) = mpsc::unbounded_channel::<Delivery<Bingo>>();
    let sink = Arc::new(tx);
    let host = UserId::from("host");

    let err = engine.run(&guild, &host, Arc::clone(&sink)).await.unwrap_err();
    assert_eq!(err.user_message(), "There is no active game in this server.");

    open(&engine, &guild, &[]).await;
    let err = engine.run(&guild, &host, Arc::clone(&sink)).await.unwrap_err();
    assert!(err.user_message().starts_with("Not enough players"));

    let err = engine
        .run(&guild, &UserId::from("guest"), Arc::clone(&sink))
        .await
        .unwrap_err();
    assert_eq!(err.user_message(), "Only the host can do that.");
    assert_eq!(engine.running(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_stops_loop_and_frees_guild() {
    let engine = bingo_engine(seeded(1));
    let guild = GuildId::from("g1");
    let host = UserId::from("host");
    let session_id = open(&engine, &guild, &["alice"]).await;

    let (tx, mut rx) = mpsc::unbounded_channel::<Delivery<Bingo>>();
    engine.run(&guild, &host, Arc::new(tx)).await.unwrap();
    rx.recv().await.expect("first draw");

    let cancelled = engine.cancel(&guild, &host).await.unwrap();
    assert_eq!(cancelled, session_id);
    assert!(!engine.is_running(&session_id));
    assert!(rx.recv().await.is_none());
    assert_eq!(
        engine.session(&session_id).await.unwrap().state(),
        SessionState::Cancelled
    );

    open(&engine, &guild, &[]).await;
}

#[tokio::test]
async fn test_status_reports_waiting_session() {
    let engine = squib_engine(seeded(1));
    let guild = GuildId::from("g1");
    let session_id = open(&engine, &guild, &["alice"]).await;

    let status = engine.status(&guild).await.unwrap();
    assert_eq!(status.session_id, session_id);
    assert_eq!(status.state, SessionState::Waiting);
    assert_eq!(status.participants, ["Host", "alice"]);
    assert_eq!(status.progress, "Round 0. 2/2 players alive.");
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_aborts_running_loops() {
    let engine = squib_engine(seeded(1));
    let (tx, mut rx) = mpsc::unbounded_channel::<Delivery<Squib>>();
    let sink = Arc::new(tx);
    for guild in ["g1", "g2"] {
        let guild = GuildId::from(guild);
        open(&engine, &guild, &["alice", "bob"]).await;
        engine
            .run(&guild, &UserId::from("host"), Arc::clone(&sink))
            .await
            .unwrap();
    }
    drop(sink);
    assert_eq!(engine.running(), 2);

    assert_eq!(engine.shutdown(), 2);
    assert_eq!(engine.running(), 0);
    while rx.recv().await.is_some() {}
}
