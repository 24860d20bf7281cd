//! Integration tests for the round ticker, task registry and delivery clock.
//!
//! Time-dependent tests run on a paused clock so sleeps resolve as soon as
//! the runtime is idle.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use parlor_tick::{
    DEFAULT_INTERACTION_TTL, DeliveryRoute, InteractionClock, RoundTicker, TaskRegistry,
    TickConfig,
};
use tokio::sync::oneshot;
use tokio::time::{self, Instant};

// =========================================================================
// Helpers
// =========================================================================

fn registry() -> Arc<TaskRegistry<String>> {
    Arc::new(TaskRegistry::new())
}

async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

// =========================================================================
// TickConfig
// =========================================================================

#[test]
fn test_with_interval_sets_interval() {
    let cfg = TickConfig::with_interval(Duration::from_secs(8));
    assert_eq!(cfg.interval, Duration::from_secs(8));
    assert!(cfg.metrics_enabled);
}

#[test]
fn test_validated_clamps_zero_interval_and_threshold() {
    let cfg = TickConfig {
        interval: Duration::ZERO,
        budget_warn_threshold: 3.0,
        metrics_enabled: true,
    }
    .validated();
    assert_eq!(cfg.interval, TickConfig::MIN_INTERVAL);
    assert_eq!(cfg.budget_warn_threshold, 1.0);
}

// =========================================================================
// RoundTicker
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_wait_for_tick_first_is_immediate() {
    let mut ticker = RoundTicker::with_interval(Duration::from_secs(8));
    let before = Instant::now();
    let info = ticker.wait_for_tick().await;
    assert_eq!(info.tick, 1);
    assert_eq!(info.since_last, Duration::ZERO);
    assert_eq!(Instant::now(), before);
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_tick_subsequent_sleep_interval() {
    let mut ticker = RoundTicker::with_interval(Duration::from_secs(10));
    ticker.wait_for_tick().await;
    let before = Instant::now();
    let info = ticker.wait_for_tick().await;
    assert_eq!(info.tick, 2);
    assert_eq!(info.since_last, Duration::from_secs(10));
    assert!(Instant::now() - before >= Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn test_record_tick_end_counts_slow_rounds() {
    let mut ticker = RoundTicker::new(TickConfig {
        interval: Duration::from_secs(1),
        budget_warn_threshold: 0.5,
        metrics_enabled: true,
    });
    ticker.wait_for_tick().await;
    time::advance(Duration::from_millis(800)).await;
    ticker.record_tick_end();

    ticker.wait_for_tick().await;
    ticker.record_tick_end();

    let m = ticker.metrics();
    assert_eq!(m.total_ticks, 2);
    assert_eq!(m.slow_ticks, 1);
    assert!(m.max_tick_time >= Duration::from_millis(800));
}

#[tokio::test(start_paused = true)]
async fn test_record_tick_end_without_wait_is_noop() {
    let mut ticker = RoundTicker::with_interval(Duration::from_secs(1));
    ticker.record_tick_end();
    assert_eq!(ticker.metrics().total_ticks, 0);
    assert_eq!(ticker.metrics().max_tick_time, Duration::ZERO);
}

// =========================================================================
// TaskRegistry
// =========================================================================

#[tokio::test]
async fn test_spawn_registers_and_deregisters_on_completion() {
    let reg = registry();
    let (release_tx, release_rx) = oneshot::channel::<()>();
    reg.spawn("s-1".to_string(), async move {
        let _ = release_rx.await;
    });
    assert!(reg.is_running(&"s-1".to_string()));

    release_tx.send(()).unwrap();
    settle().await;
    assert!(reg.is_empty());
}

#[tokio::test]
async fn test_spawn_instant_task_still_deregisters() {
    let reg = registry();
    reg.spawn("s-1".to_string(), async {});
    settle().await;
    assert_eq!(reg.len(), 0);
}

#[tokio::test]
async fn test_spawn_same_key_aborts_stale_task() {
    let reg = registry();
    let finished = Arc::new(AtomicU32::new(0));

    let f = Arc::clone(&finished);
    let first = reg.spawn("s-1".to_string(), async move {
        std::future::pending::<()>().await;
        f.fetch_add(1, Ordering::SeqCst);
    });
    let (release_tx, release_rx) = oneshot::channel::<()>();
    let second = reg.spawn("s-1".to_string(), async move {
        let _ = release_rx.await;
    });
    settle().await;

    assert_ne!(first, second);
    assert_eq!(reg.len(), 1);
    assert_eq!(reg.generation(&"s-1".to_string()), Some(second));
    assert_eq!(finished.load(Ordering::SeqCst), 0);

    release_tx.send(()).unwrap();
    settle().await;
    assert!(reg.is_empty());
}

#[tokio::test]
async fn test_cancel_unknown_key_returns_false() {
    let reg = registry();
    assert!(!reg.cancel(&"missing".to_string()));
}

#[tokio::test]
async fn test_cancel_aborts_running_task() {
    let reg = registry();
    let ticks = Arc::new(AtomicU32::new(0));
    let t = Arc::clone(&ticks);
    reg.spawn("s-1".to_string(), async move {
        loop {
            t.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
        }
    });
    settle().await;
    assert!(reg.cancel(&"s-1".to_string()));
    settle().await;
    let after_cancel = ticks.load(Ordering::SeqCst);
    settle().await;
    assert_eq!(ticks.load(Ordering::SeqCst), after_cancel);
    assert!(!reg.is_running(&"s-1".to_string()));
}

#[tokio::test]
async fn test_shutdown_all_aborts_every_task() {
    let reg = registry();
    for key in ["a", "b", "c"] {
        reg.spawn(key.to_string(), std::future::pending::<()>());
    }
    assert_eq!(reg.shutdown_all(), 3);
    assert!(reg.is_empty());
}

// =========================================================================
// InteractionClock
// =========================================================================

#[test]
fn test_fallback_chain_ends_at_channel_post() {
    assert_eq!(
        DeliveryRoute::InteractionFollowup.fallback(),
        Some(DeliveryRoute::ChannelPost)
    );
    assert_eq!(DeliveryRoute::ChannelPost.fallback(), None);
}

#[tokio::test(start_paused = true)]
async fn test_route_switches_after_ttl() {
    let clock = InteractionClock::default();
    assert_eq!(clock.route(), DeliveryRoute::InteractionFollowup);

    time::advance(DEFAULT_INTERACTION_TTL - Duration::from_secs(1)).await;
    assert_eq!(clock.route(), DeliveryRoute::InteractionFollowup);

    time::advance(Duration::from_secs(1)).await;
    assert!(clock.is_expired());
    assert_eq!(clock.route(), DeliveryRoute::ChannelPost);
    assert_eq!(clock.route(), DeliveryRoute::ChannelPost);
}
