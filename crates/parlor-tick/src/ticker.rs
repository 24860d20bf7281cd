//! Fixed-interval round ticker.

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for a [`RoundTicker`].
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Pause between the end of one round and the start of the next.
    pub interval: Duration,
    /// Budget warning threshold (0.0–1.0). A warning is logged when a
    /// round's work takes longer than this fraction of `interval`.
    pub budget_warn_threshold: f64,
    /// Track average and maximum round time.
    pub metrics_enabled: bool,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            budget_warn_threshold: 0.5,
            metrics_enabled: true,
        }
    }
}

impl TickConfig {
    /// Shortest interval the ticker accepts.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    /// Clamp out-of-range values.
    ///
    /// - `interval` raised to [`Self::MIN_INTERVAL`].
    /// - `budget_warn_threshold` clamped to `0.0..=1.0`.
    pub fn validated(mut self) -> Self {
        if self.interval < Self::MIN_INTERVAL {
            warn!(
                interval_ms = self.interval.as_millis() as u64,
                "round interval below minimum, clamping"
            );
            self.interval = Self::MIN_INTERVAL;
        }
        self.budget_warn_threshold = self.budget_warn_threshold.clamp(0.0, 1.0);
        self
    }
}

// ---------------------------------------------------------------------------
// Tick info and metrics
// ---------------------------------------------------------------------------

/// Returned by [`RoundTicker::wait_for_tick`].
#[derive(Debug, Clone)]
pub struct TickInfo {
    /// Round number, starting at 1.
    pub tick: u64,
    /// Time since the previous tick fired (zero for the first).
    pub since_last: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct TickMetrics {
    pub total_ticks: u64,
    /// Rounds whose work exceeded the budget threshold.
    pub slow_ticks: u64,
    /// Exponential moving average of round work time (α = 0.1).
    pub avg_tick_time: Duration,
    pub max_tick_time: Duration,
}

// ---------------------------------------------------------------------------
// Ticker
// ---------------------------------------------------------------------------

/// Paces one session's rounds.
///
/// The first call to [`wait_for_tick`](Self::wait_for_tick) returns
/// immediately; every later call sleeps `interval` measured from the call,
/// so rounds never overlap: the loop that owns the ticker cannot ask for
/// the next round until it has finished the current one.
///
/// ```ignore
/// let mut ticker = RoundTicker::new(TickConfig::with_interval(interval));
/// loop {
///     let info = ticker.wait_for_tick().await;
///     if !play_round(info.tick).await { break; }
///     ticker.record_tick_end();
/// }
/// ```
#[derive(Debug)]
pub struct RoundTicker {
    config: TickConfig,
    tick_count: u64,
    last_tick: Option<Instant>,
    tick_start: Option<Instant>,
    metrics: TickMetrics,
}

impl RoundTicker {
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        debug!(
            interval_ms = config.interval.as_millis() as u64,
            "round ticker created"
        );
        Self {
            config,
            tick_count: 0,
            last_tick: None,
            tick_start: None,
            metrics: TickMetrics::default(),
        }
    }

    pub fn with_interval(interval: Duration) -> Self {
        Self::new(TickConfig::with_interval(interval))
    }

    /// Wait until the next round is due.
    ///
    /// Cancellation-safe: dropping the future mid-sleep loses nothing.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        if self.tick_count > 0 {
            time::sleep(self.config.interval).await;
        }

        let now = Instant::now();
        let since_last = self
            .last_tick
            .map(|last| now.saturating_duration_since(last))
            .unwrap_or_default();
        self.tick_count += 1;
        self.last_tick = Some(now);
        self.tick_start = Some(now);
        self.metrics.total_ticks += 1;

        trace!(tick = self.tick_count, "round tick fired");
        TickInfo {
            tick: self.tick_count,
            since_last,
        }
    }

    /// Record that the current round's work is done.
    ///
    /// Logs a warning when the work ate more than the configured share of
    /// the interval. A no-op if no tick is in progress.
    pub fn record_tick_end(&mut self) {
        let Some(start) = self.tick_start.take() else {
            return;
        };
        let elapsed = start.elapsed();
        let utilization = elapsed.as_secs_f64() / self.config.interval.as_secs_f64();

        if utilization >= self.config.budget_warn_threshold {
            self.metrics.slow_ticks += 1;
            warn!(
                tick = self.tick_count,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                interval_ms = self.config.interval.as_secs_f64() * 1000.0,
                "round work approaching interval"
            );
        }

        if self.config.metrics_enabled {
            if elapsed > self.metrics.max_tick_time {
                self.metrics.max_tick_time = elapsed;
            }
            let alpha = 0.1;
            let prev = self.metrics.avg_tick_time.as_secs_f64();
            self.metrics.avg_tick_time =
                Duration::from_secs_f64(prev * (1.0 - alpha) + elapsed.as_secs_f64() * alpha);
        }
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn interval(&self) -> Duration {
        self.config.interval
    }

    pub fn metrics(&self) -> &TickMetrics {
        &self.metrics
    }
}
