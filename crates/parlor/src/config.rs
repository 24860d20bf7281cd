//! Engine configuration.

use std::path::Path;
use std::time::Duration;

use parlor_tick::TickConfig;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::ParlorError;

/// Tunables for an [`Engine`](crate::Engine).
///
/// Every field has a default, so a TOML file only needs the keys it
/// changes:
///
/// ```toml
/// min_players = 3
/// tick_interval_ms = 2000
/// rng_seed = 42
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Participants required before the host can run a session.
    pub min_players: usize,

    /// Round interval override. `None` uses the game's own pace
    /// (Bingo 8s, Squib 10s).
    pub tick_interval_ms: Option<u64>,

    /// How long the command interaction that ran a session stays usable
    /// for followups. Later events go straight to the channel.
    pub interaction_ttl_secs: u64,

    /// Seed for card generation, draws and eliminations. `None` seeds
    /// from the OS.
    pub rng_seed: Option<u64>,

    /// Rows returned by leaderboard queries.
    pub leaderboard_limit: usize,

    /// Fraction of the round interval after which a slow round is logged.
    pub tick_budget_warn: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_players: 2,
            tick_interval_ms: None,
            interaction_ttl_secs: 840,
            rng_seed: None,
            leaderboard_limit: 15,
            tick_budget_warn: 0.5,
        }
    }
}

impl EngineConfig {
    pub const MAX_LEADERBOARD: usize = 100;

    /// Clamp out-of-range values.
    ///
    /// - `min_players` raised to 1.
    /// - `tick_interval_ms` raised to 1.
    /// - `interaction_ttl_secs` raised to 1.
    /// - `leaderboard_limit` clamped to `1..=MAX_LEADERBOARD`.
    /// - `tick_budget_warn` clamped to `0.0..=1.0`; NaN resets to the default.
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();
        if self.min_players == 0 {
            warn!("min_players is 0, clamping to 1");
            self.min_players = 1;
        }
        if let Some(0) = self.tick_interval_ms {
            warn!("tick_interval_ms is 0, clamping to 1");
            self.tick_interval_ms = Some(1);
        }
        self.interaction_ttl_secs = self.interaction_ttl_secs.max(1);
        self.leaderboard_limit = self.leaderboard_limit.clamp(1, Self::MAX_LEADERBOARD);
        self.tick_budget_warn = if self.tick_budget_warn.is_nan() {
            defaults.tick_budget_warn
        } else {
            self.tick_budget_warn.clamp(0.0, 1.0)
        };
        self
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ParlorError> {
        let config: Self = toml::from_str(source)?;
        Ok(config.validated())
    }

    /// Reads, parses and validates a TOML file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ParlorError> {
        let source = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::from_toml_str(&source)
    }

    pub fn interaction_ttl(&self) -> Duration {
        Duration::from_secs(self.interaction_ttl_secs)
    }

    /// Ticker settings for a game whose own pace is `game_interval`.
    pub fn tick_config(&self, game_interval: Duration) -> TickConfig {
        let interval = self
            .tick_interval_ms
            .map_or(game_interval, Duration::from_millis);
        TickConfig {
            budget_warn_threshold: self.tick_budget_warn,
            ..TickConfig::with_interval(interval)
        }
        .validated()
    }
}
