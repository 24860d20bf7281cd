//! Document store abstraction for Parlor.
//!
//! The session engine never talks to a database directly. It issues
//! [`Filter`]s and [`Update`]s through the [`Store`] trait, relying on
//! per-document atomicity for every state transition. [`MemoryStore`]
//! implements the trait in process and is what the tests and demos run on.

mod document;
mod error;
mod memory;
mod store;

pub use document::{
    BulkWriteFailure, BulkWriteResult, Condition, Document, Filter, FindOptions, ID_FIELD,
    SortOrder, Update, UpdateOp, UpdateResult, WriteOp, resolve,
};
pub use error::StoreError;
pub use memory::{MemoryStore, document};
pub use store::Store;
