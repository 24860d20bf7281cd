//! Join-capacity lookup.
//!
//! Hosts on a premium tier may admit more players. The entitlement service
//! and its cache live outside the engine; the engine only asks how many
//! participants a host's session may hold.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;

use crate::UserId;

/// Maximum participants for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capacity {
    Unlimited,
    Limited(usize),
}

impl Capacity {
    /// Converts the entitlement service's raw value, where any negative
    /// number (conventionally `-1`) means unlimited.
    pub fn from_raw(raw: i64) -> Self {
        usize::try_from(raw).map_or(Self::Unlimited, Self::Limited)
    }

    /// Returns `true` if a session holding `current` participants can
    /// admit one more.
    pub fn admits(&self, current: usize) -> bool {
        match self {
            Self::Unlimited => true,
            Self::Limited(max) => current < *max,
        }
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unlimited => f.write_str("∞"),
            Self::Limited(max) => write!(f, "{max}"),
        }
    }
}

/// Resolves a host's join capacity.
///
/// Implementations are expected to cache; the engine awaits this once per
/// join attempt.
///
/// # Trait bounds
///
/// - `Send + Sync`: one gate is shared by every join, and joins run on
///   whichever runtime thread picked up the command.
/// - `'static`: the gate lives as long as the engine.
///
/// # Example
///
/// ```rust
/// use parlor_session::{Capacity, EntitlementGate, UserId};
///
/// /// Premium hosts get unlimited seats, everyone else ten.
/// struct TierGate {
///     premium: Vec<UserId>,
/// }
///
/// impl EntitlementGate for TierGate {
///     async fn capacity(&self, host: &UserId) -> Capacity {
///         if self.premium.contains(host) {
///             Capacity::Unlimited
///         } else {
///             Capacity::Limited(10)
///         }
///     }
/// }
/// ```
pub trait EntitlementGate: Send + Sync + 'static {
    /// Returns how many participants `host`'s session may hold.
    ///
    /// # Arguments
    /// - `host`: the user who created the session
    ///
    /// # Returns
    /// - `Capacity::Limited(n)`: joins are refused once `n` participants
    ///   are in, the host included
    /// - `Capacity::Unlimited`: no cap
    ///
    /// Lookup failures are the implementation's to absorb; fall back to
    /// the free tier rather than blocking the join.
    fn capacity(&self, host: &UserId) -> impl Future<Output = Capacity> + Send;
}

/// A fixed capacity with optional per-host overrides.
#[derive(Debug, Clone)]
pub struct StaticGate {
    default: Capacity,
    overrides: HashMap<UserId, Capacity>,
}

impl StaticGate {
    pub fn new(default: Capacity) -> Self {
        Self {
            default,
            overrides: HashMap::new(),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(Capacity::Unlimited)
    }

    pub fn with_override(mut self, host: impl Into<UserId>, capacity: Capacity) -> Self {
        self.overrides.insert(host.into(), capacity);
        self
    }
}

impl EntitlementGate for StaticGate {
    async fn capacity(&self, host: &UserId) -> Capacity {
        self.overrides.get(host).copied().unwrap_or(self.default)
    }
}
