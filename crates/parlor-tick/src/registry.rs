//! One live task per key.

use std::fmt::Display;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

struct Entry {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Tracks at most one spawned task per key.
///
/// Spawning under a key that already has a task aborts the old one first.
/// A task removes its own entry when it finishes or is dropped, but only
/// if the entry still belongs to it (matched by generation), so a stale
/// task winding down never deregisters its replacement.
pub struct TaskRegistry<K> {
    tasks: DashMap<K, Entry>,
    next_generation: AtomicU64,
}

impl<K> Default for TaskRegistry<K>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            tasks: DashMap::new(),
            next_generation: AtomicU64::new(1),
        }
    }
}

impl<K> TaskRegistry<K>
where
    K: Eq + Hash + Clone + Display + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns `task` under `key`, aborting any task already registered
    /// there. Returns the generation assigned to the new task.
    ///
    /// The task body does not start until its entry is in the map, so even
    /// a task that completes instantly deregisters cleanly.
    pub fn spawn<F>(self: &Arc<Self>, key: K, task: F) -> u64
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let (start_tx, start_rx) = oneshot::channel::<()>();
        let guard = Deregister {
            registry: Arc::downgrade(self),
            key: key.clone(),
            generation,
        };

        let handle = tokio::spawn(async move {
            let _guard = guard;
            if start_rx.await.is_ok() {
                task.await;
            }
        });

        let replaced = self.tasks.insert(key.clone(), Entry { generation, handle });
        if let Some(stale) = replaced {
            warn!(
                %key,
                stale_generation = stale.generation,
                generation,
                "task already running for key, aborting stale task"
            );
            stale.handle.abort();
        }
        let _ = start_tx.send(());
        debug!(%key, generation, "task registered");
        generation
    }

    /// Aborts the task registered under `key`. Returns `false` if none was.
    pub fn cancel(&self, key: &K) -> bool {
        match self.tasks.remove(key) {
            Some((_, entry)) => {
                entry.handle.abort();
                debug!(%key, generation = entry.generation, "task cancelled");
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self, key: &K) -> bool {
        self.tasks
            .get(key)
            .is_some_and(|entry| !entry.handle.is_finished())
    }

    pub fn generation(&self, key: &K) -> Option<u64> {
        self.tasks.get(key).map(|entry| entry.generation)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Aborts every registered task. Returns how many were aborted.
    pub fn shutdown_all(&self) -> usize {
        let keys: Vec<K> = self.tasks.iter().map(|e| e.key().clone()).collect();
        let cancelled = keys.iter().filter(|key| self.cancel(key)).count();
        if cancelled > 0 {
            debug!(cancelled, "task registry shut down");
        }
        cancelled
    }
}

/// Removes the registry entry when the owning task's future is dropped.
struct Deregister<K: Eq + Hash> {
    registry: Weak<TaskRegistry<K>>,
    key: K,
    generation: u64,
}

impl<K: Eq + Hash> Drop for Deregister<K> {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry
                .tasks
                .remove_if(&self.key, |_, entry| entry.generation == self.generation);
        }
    }
}
