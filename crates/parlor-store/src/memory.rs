//! In-process [`Store`] backed by a mutex-guarded map of collections.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use serde_json::Value;

use crate::document::{BulkWriteFailure, ID_FIELD};
use crate::{
    BulkWriteResult, Document, Filter, FindOptions, Store, StoreError, Update, UpdateResult,
    WriteOp,
};

type Collections = HashMap<String, Vec<Document>>;

/// A [`Store`] that keeps every collection in memory.
///
/// Each call takes the lock once, so filter evaluation and update
/// application happen atomically, the same guarantee a document database
/// gives for single-document writes. The lock is never held across an
/// `.await`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: Mutex<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in `collection`.
    pub fn count(&self, collection: &str) -> usize {
        self.lock()
            .map(|c| c.get(collection).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    /// A copy of every document in `collection`, in insertion order.
    pub fn snapshot(&self, collection: &str) -> Vec<Document> {
        self.lock()
            .map(|c| c.get(collection).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Collections>, StoreError> {
        self.collections
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))
    }
}

fn insert(docs: &mut Vec<Document>, document: Document) -> Result<(), StoreError> {
    if let Some(id) = document.get(ID_FIELD) {
        if docs.iter().any(|d| d.get(ID_FIELD) == Some(id)) {
            return Err(StoreError::WriteFailed(format!("duplicate {ID_FIELD} {id}")));
        }
    }
    docs.push(document);
    Ok(())
}

fn update(
    docs: &mut Vec<Document>,
    filter: &Filter,
    update: &Update,
    upsert: bool,
) -> Result<UpdateResult, StoreError> {
    if let Some(doc) = docs.iter_mut().find(|d| filter.matches(d)) {
        let modified = update.apply(doc, false)?;
        return Ok(UpdateResult {
            matched: 1,
            modified: u64::from(modified),
            upserted: false,
        });
    }
    if !upsert {
        return Ok(UpdateResult::default());
    }

    let mut seeded = Document::new();
    for (path, value) in filter.equality_seed() {
        Update::new().set(path, value.clone()).apply(&mut seeded, true)?;
    }
    update.apply(&mut seeded, true)?;
    insert(docs, seeded)?;
    Ok(UpdateResult {
        matched: 0,
        modified: 0,
        upserted: true,
    })
}

impl Store for MemoryStore {
    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Document>, StoreError> {
        let collections = self.lock()?;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| filter.matches(d)))
            .cloned())
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<Document>, StoreError> {
        let mut found: Vec<Document> = {
            let collections = self.lock()?;
            collections
                .get(collection)
                .map(|docs| docs.iter().filter(|d| filter.matches(d)).cloned().collect())
                .unwrap_or_default()
        };
        if !options.sort.is_empty() {
            found.sort_by(|a, b| options.compare(a, b));
        }
        if let Some(limit) = options.limit {
            found.truncate(limit);
        }
        Ok(found)
    }

    async fn insert_one(&self, collection: &str, document: Document) -> Result<(), StoreError> {
        let mut collections = self.lock()?;
        insert(collections.entry(collection.to_string()).or_default(), document)
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        changes: &Update,
        upsert: bool,
    ) -> Result<UpdateResult, StoreError> {
        let mut collections = self.lock()?;
        let docs = collections.entry(collection.to_string()).or_default();
        let result = update(docs, filter, changes, upsert)?;
        tracing::trace!(
            collection,
            matched = result.matched,
            modified = result.modified,
            upserted = result.upserted,
            "update_one"
        );
        Ok(result)
    }

    async fn bulk_write(
        &self,
        collection: &str,
        ops: Vec<WriteOp>,
        ordered: bool,
    ) -> Result<BulkWriteResult, StoreError> {
        let mut collections = self.lock()?;
        let docs = collections.entry(collection.to_string()).or_default();
        let mut result = BulkWriteResult::default();

        for (index, op) in ops.into_iter().enumerate() {
            let outcome = match op {
                WriteOp::InsertOne(document) => insert(docs, document).map(|()| {
                    result.inserted += 1;
                }),
                WriteOp::UpdateOne {
                    filter,
                    update: changes,
                    upsert,
                } => update(docs, &filter, &changes, upsert).map(|r| {
                    result.matched += r.matched;
                    result.modified += r.modified;
                    result.upserted += u64::from(r.upserted);
                }),
            };
            if let Err(error) = outcome {
                tracing::debug!(collection, index, %error, "bulk write op failed");
                result.failures.push(BulkWriteFailure { index, error });
                if ordered {
                    break;
                }
            }
        }
        Ok(result)
    }
}

/// Converts a `json!({...})` object literal into a [`Document`].
///
/// Non-object values produce an empty document.
pub fn document(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        _ => Document::new(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const SESSIONS: &str = "bingo_sessions";
    const STATS: &str = "bingo_stats";

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .insert_one(
                SESSIONS,
                document(json!({
                    "_id": "s-1",
                    "guild_id": "g-1",
                    "state": "waiting",
                    "participants": [{ "user_id": "u-1" }]
                })),
            )
            .await
            .unwrap();
        store
    }

    // =====================================================================
    // Single-document operations
    // =====================================================================

    #[tokio::test]
    async fn test_insert_one_duplicate_id_fails() {
        let store = seeded().await;
        let result = store
            .insert_one(SESSIONS, document(json!({ "_id": "s-1" })))
            .await;
        assert!(matches!(result, Err(StoreError::WriteFailed(_))));
        assert_eq!(store.count(SESSIONS), 1);
    }

    #[tokio::test]
    async fn test_find_one_missing_collection_returns_none() {
        let store = MemoryStore::new();
        let found = store.find_one("nothing", &Filter::new()).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_update_one_conditional_push_is_compare_and_swap() {
        let store = seeded().await;
        let guard = |user: &str| {
            Filter::by_id("s-1")
                .eq("state", "waiting")
                .ne("participants.user_id", user.to_string())
        };
        let push = Update::new().push("participants", json!({ "user_id": "u-2" }));

        let first = store.update_one(SESSIONS, &guard("u-2"), &push, false).await.unwrap();
        let second = store.update_one(SESSIONS, &guard("u-2"), &push, false).await.unwrap();

        assert_eq!(first.matched, 1);
        assert_eq!(second.matched, 0);
        let doc = store.find_one(SESSIONS, &Filter::by_id("s-1")).await.unwrap().unwrap();
        assert_eq!(doc["participants"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_one_upsert_seeds_from_equality_filter() {
        let store = MemoryStore::new();
        let filter = Filter::new().eq("user_id", "u-1").eq("guild_id", "g-1");
        let ops = Update::new()
            .set_on_insert("username", "ana")
            .inc("games_played", 1)
            .inc("wins", 1);

        let r = store.update_one(STATS, &filter, &ops, true).await.unwrap();
        assert!(r.upserted);
        let r = store.update_one(STATS, &filter, &ops, true).await.unwrap();
        assert!(!r.upserted);
        assert_eq!(r.matched, 1);

        let docs = store.snapshot(STATS);
        assert_eq!(docs.len(), 1);
        assert_eq!(
            docs[0],
            document(json!({
                "user_id": "u-1",
                "guild_id": "g-1",
                "username": "ana",
                "games_played": 2,
                "wins": 2
            }))
        );
    }

    #[tokio::test]
    async fn test_find_sorts_and_limits() {
        let store = MemoryStore::new();
        for (user, wins, games) in [("a", 1, 9), ("b", 4, 4), ("c", 4, 8), ("d", 0, 1)] {
            store
                .insert_one(
                    STATS,
                    document(json!({ "user_id": user, "wins": wins, "games_played": games })),
                )
                .await
                .unwrap();
        }
        let opts = FindOptions::new().sort_desc("wins").sort_desc("games_played").limit(3);
        let top = store.find(STATS, &Filter::new(), &opts).await.unwrap();
        let users: Vec<&str> = top.iter().map(|d| d["user_id"].as_str().unwrap()).collect();
        assert_eq!(users, ["c", "b", "a"]);
    }

    // =====================================================================
    // Bulk writes
    // =====================================================================

    fn bad_then_good() -> Vec<WriteOp> {
        vec![
            WriteOp::UpdateOne {
                filter: Filter::by_id("s-1"),
                update: Update::new().inc("guild_id", 1),
                upsert: false,
            },
            WriteOp::UpdateOne {
                filter: Filter::new().eq("user_id", "u-9"),
                update: Update::new().inc("wins", 1),
                upsert: true,
            },
        ]
    }

    #[tokio::test]
    async fn test_bulk_write_unordered_continues_past_failure() {
        let store = seeded().await;
        let result = store.bulk_write(SESSIONS, bad_then_good(), false).await.unwrap();
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].index, 0);
        assert_eq!(result.upserted, 1);
        assert!(!result.is_complete());
    }

    #[tokio::test]
    async fn test_bulk_write_ordered_stops_at_first_failure() {
        let store = seeded().await;
        let result = store.bulk_write(SESSIONS, bad_then_good(), true).await.unwrap();
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.upserted, 0);
        assert_eq!(store.count(SESSIONS), 1);
    }
}
