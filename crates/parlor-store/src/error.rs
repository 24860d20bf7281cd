//! Error types for the store layer.

/// Errors raised by a [`Store`](crate::Store) implementation.
///
/// The session layer treats every variant the same way (a `StoreError`
/// aborts the current operation), but the variants stay distinct so logs
/// say what actually went wrong.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing store could not be reached or refused the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A typed record could not be converted to or from a document.
    #[error("document codec failed: {0}")]
    Codec(#[from] serde_json::Error),

    /// An update operator could not be applied to the addressed field,
    /// e.g. `$inc` on a string or `$push` onto an object.
    #[error("invalid update on `{path}`: {reason}")]
    InvalidUpdate { path: String, reason: String },

    /// The write was rejected (duplicate `_id`, failed bulk batch, ...).
    #[error("write failed: {0}")]
    WriteFailed(String),
}
