//! Unified error type for the Parlor engine.

use parlor_session::GameError;
use parlor_store::StoreError;

/// Top-level error wrapping the crate-specific errors.
///
/// `#[from]` on each variant lets `?` convert sub-crate errors directly.
#[derive(Debug, thiserror::Error)]
pub enum ParlorError {
    /// A session rule refused the command, or the store failed under it.
    #[error(transparent)]
    Game(#[from] GameError),

    /// A store error outside any session command.
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("could not read configuration: {0}")]
    Io(#[from] std::io::Error),
}

impl ParlorError {
    /// A sentence safe to show the user who issued the command.
    pub fn user_message(&self) -> String {
        match self {
            Self::Game(err) => err.user_message(),
            Self::Store(_) => "Something went wrong. Please try again later.".into(),
            Self::Config(_) | Self::Io(_) => "The game engine is misconfigured.".into(),
        }
    }
}
