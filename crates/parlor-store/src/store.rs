use std::future::Future;

use crate::{
    BulkWriteResult, Document, Filter, FindOptions, StoreError, Update, UpdateResult, WriteOp,
};

/// A document database with Mongo-style conditional updates.
///
/// Every write is atomic per document: a filter and its update are
/// evaluated together, so a filter such as
/// `{_id: s, state: "waiting", participants.user_id: {$ne: u}}` acts as a
/// compare-and-swap. The session layer leans on that for every state
/// transition.
///
/// # Trait bounds
///
/// - `Send + Sync + 'static`: one store handle is shared, behind an `Arc`,
///   by every component and every round task.
/// - Futures are `Send` so callers can drive them from spawned tasks.
///
/// [`MemoryStore`](crate::MemoryStore) is the in-process implementation.
/// A database-backed store maps each method onto the driver call of the
/// same name.
pub trait Store: Send + Sync + 'static {
    /// Returns the first document in `collection` matching `filter`.
    ///
    /// # Returns
    /// - `Ok(Some(doc))`: a match
    /// - `Ok(None)`: nothing matched
    /// - `Err(StoreError)`: the store could not be read
    fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> impl Future<Output = Result<Option<Document>, StoreError>> + Send;

    /// Returns every matching document, sorted and truncated per `options`.
    fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> impl Future<Output = Result<Vec<Document>, StoreError>> + Send;

    /// Inserts `document`. Fails with [`StoreError::WriteFailed`] if its
    /// `_id` already exists.
    fn insert_one(
        &self,
        collection: &str,
        document: Document,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Applies `update` to the first document matching `filter`.
    ///
    /// With `upsert`, a missing document is created from the filter's
    /// equality clauses and then updated (including `$setOnInsert`).
    ///
    /// # Returns
    /// - `matched == 0`: the filter's guard did not hold; nothing changed
    /// - `upserted`: a new document was inserted
    /// - `Err(StoreError::InvalidUpdate)`: an operator did not fit the
    ///   document; the document is left as it was
    fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        upsert: bool,
    ) -> impl Future<Output = Result<UpdateResult, StoreError>> + Send;

    /// Runs a batch of writes. Per-operation failures are reported in the
    /// result; `Err` means the batch as a whole could not run.
    fn bulk_write(
        &self,
        collection: &str,
        ops: Vec<WriteOp>,
        ordered: bool,
    ) -> impl Future<Output = Result<BulkWriteResult, StoreError>> + Send;
}
