//! Plays one Bingo and one Squib session against the in-memory store and
//! prints what a chat channel would see.
//!
//! ```text
//! cargo run -p guild-night [config.toml]
//! ```

use std::sync::Arc;

use parlor::prelude::*;
use parlor::session::ParticipantRecord;
use tokio::sync::mpsc;
use tracing::info;

const GUESTS: [&str; 5] = ["ada", "brook", "cyd", "dev", "emry"];

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render<G: GameLogic>(delivery: &Delivery<G>) -> Option<String> {
    let via = match delivery.route {
        DeliveryRoute::InteractionFollowup => "followup",
        DeliveryRoute::ChannelPost => "channel",
    };
    let body = match &delivery.event {
        GameEvent::RoundAdvanced { round, narrative, .. } => format!("[round {round}] {narrative}"),
        GameEvent::HalfwayLeaderboard { ranked, .. } => {
            let rows: Vec<String> = ranked
                .iter()
                .enumerate()
                .map(|(i, s)| format!("  {:>2}. {} - {} left", i + 1, s.username, s.remaining))
                .collect();
            format!("Halfway break!\n{}", rows.join("\n"))
        }
        GameEvent::GameConcluded { winners, stats, .. } => {
            if winners.is_empty() {
                "Game over. Nobody won.".to_string()
            } else {
                let names: Vec<String> = winners
                    .iter()
                    .map(|w| {
                        let wins = stats.wins.get(w.user_id()).copied().unwrap_or(0);
                        format!("{} ({wins} server wins)", w.username())
                    })
                    .collect();
                format!("Winner: {}", names.join(", "))
            }
        }
        GameEvent::JoinAccepted { .. } | GameEvent::JoinRejected { .. } => return None,
    };
    Some(format!("<{via}> {body}"))
}

// ---------------------------------------------------------------------------
// One session
// ---------------------------------------------------------------------------

async fn play<G: GameLogic + Clone>(
    game: G,
    config: EngineConfig,
    guild: &GuildId,
) -> Result<(), ParlorError> {
    let engine = Engine::builder(game)
        .config(config)
        .build(MemoryStore::new(), StaticGate::new(Capacity::Limited(10)));
    let host = UserId::from("host");

    let session = engine.start(guild, &host, "Host").await?;
    println!("{} session {} opened", G::KIND, session.id());
    for guest in GUESTS {
        match engine.join(session.id(), &UserId::from(guest), guest).await {
            GameEvent::JoinAccepted {
                participants,
                capacity,
                ..
            } => println!("{guest} joined ({participants}/{capacity})"),
            GameEvent::JoinRejected { reason, .. } => println!("{guest} turned away: {reason:?}"),
            _ => {}
        }
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<Delivery<G>>();
    engine.run(guild, &host, Arc::new(tx)).await?;
    while let Some(delivery) = rx.recv().await {
        if let Some(line) = render(&delivery) {
            println!("{line}");
        }
        if matches!(delivery.event, GameEvent::GameConcluded { .. }) {
            break;
        }
    }

    println!("Leaderboard:");
    for (rank, row) in engine.leaderboard(guild).await?.iter().enumerate() {
        println!(
            "  {:>2}. {:<6} {} wins / {} games ({:.0}%)",
            rank + 1,
            row.username,
            row.wins,
            row.games_played,
            row.win_rate()
        );
    }
    engine.shutdown();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), ParlorError> {
    parlor::telemetry::init_tracing("info,parlor_session=info");

    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::load(&path).await?,
        None => EngineConfig {
            tick_interval_ms: Some(250),
            ..Default::default()
        },
    };
    info!(?config, "guild night starting");

    let guild = GuildId::from("guild-night");
    play(Bingo, config.clone(), &guild).await?;
    play(Squib::default(), config, &guild).await?;
    Ok(())
}
