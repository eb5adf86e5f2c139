//! In-memory email store: processed outputs keyed by email id.
//!
//! Listing follows first-insertion order. Writes for one id can be
//! serialized with `upsert_with`, which holds a per-id lock across both the
//! producer and the write so concurrent runs for the same email cannot
//! overwrite each other out of order. The lock table only holds ids with a
//! write in flight; a lock is dropped once its last holder releases it.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::pipeline::types::EmailAgentOutput;

struct Entry {
    seq: u64,
    output: EmailAgentOutput,
}

pub struct EmailStore {
    entries: RwLock<HashMap<String, Entry>>,
    key_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    next_seq: AtomicU64,
}

impl EmailStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entries: RwLock::new(HashMap::new()),
            key_locks: Mutex::new(HashMap::new()),
            next_seq: AtomicU64::new(0),
        })
    }

    /// Insert or replace. A replaced entry keeps its list position.
    pub async fn insert(&self, output: EmailAgentOutput) {
        let mut entries = self.entries.write().await;
        self.insert_locked(&mut entries, output);
    }

    fn insert_locked(&self, entries: &mut HashMap<String, Entry>, output: EmailAgentOutput) {
        let id = output.email.email.id.clone();
        match entries.get_mut(&id) {
            Some(entry) => {
                entry.output = output;
                debug!(id = %id, "Store entry replaced");
            }
            None => {
                let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                entries.insert(id.clone(), Entry { seq, output });
                debug!(id = %id, seq, "Store entry inserted");
            }
        }
    }

    pub async fn get(&self, id: &str) -> Option<EmailAgentOutput> {
        self.entries.read().await.get(id).map(|e| e.output.clone())
    }

    pub async fn remove(&self, id: &str) -> Result<EmailAgentOutput, StoreError> {
        match self.entries.write().await.remove(id) {
            Some(entry) => {
                info!(id = %id, "Email removed from store");
                Ok(entry.output)
            }
            None => Err(StoreError::NotFound { id: id.to_string() }),
        }
    }

    /// All outputs in insertion order.
    pub async fn list(&self) -> Vec<EmailAgentOutput> {
        let entries = self.entries.read().await;
        let mut ordered: Vec<&Entry> = entries.values().collect();
        ordered.sort_by_key(|e| e.seq);
        ordered.into_iter().map(|e| e.output.clone()).collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.replace_all(Vec::new()).await;
    }

    /// Swap the whole contents for `outputs`, atomically for readers.
    ///
    /// Waits for every in-flight `upsert_with`, and holds the locks of the
    /// incoming ids, so a write that started before the swap cannot land
    /// after it.
    pub async fn replace_all(&self, outputs: Vec<EmailAgentOutput>) {
        let mut ids: Vec<String> = self.key_locks.lock().await.keys().cloned().collect();
        ids.extend(outputs.iter().map(|o| o.email.email.id.clone()));
        ids.sort();
        ids.dedup();

        let guards = self.lock_all(&ids).await;
        {
            let mut entries = self.entries.write().await;
            entries.clear();
            let count = outputs.len();
            for output in outputs {
                self.insert_locked(&mut entries, output);
            }
            info!(count, "Store contents replaced");
        }
        drop(guards);
        self.prune_locks(&ids).await;
    }

    /// Produce and store the output for `id` while holding that id's lock.
    ///
    /// Concurrent calls for the same id run one after another; calls for
    /// different ids do not block each other. Nothing is written when the
    /// producer fails.
    pub async fn upsert_with<F, Fut, E>(&self, id: &str, producer: F) -> Result<EmailAgentOutput, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<EmailAgentOutput, E>>,
    {
        let guard = self.key_lock(id).await.lock_owned().await;
        let result = match producer().await {
            Ok(output) => {
                self.insert(output.clone()).await;
                Ok(output)
            }
            Err(e) => Err(e),
        };
        drop(guard);
        self.prune_locks(&[id.to_string()]).await;
        result
    }

    async fn key_lock(&self, id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.key_locks.lock().await;
        Arc::clone(locks.entry(id.to_string()).or_default())
    }

    /// Lock `ids` in the given (sorted) order.
    async fn lock_all(&self, ids: &[String]) -> Vec<OwnedMutexGuard<()>> {
        let locks: Vec<Arc<Mutex<()>>> = {
            let mut table = self.key_locks.lock().await;
            ids.iter()
                .map(|id| Arc::clone(table.entry(id.clone()).or_default()))
                .collect()
        };

        let mut guards = Vec::with_capacity(locks.len());
        for lock in locks {
            guards.push(lock.lock_owned().await);
        }
        guards
    }

    /// Drop the locks for `ids` that nobody else holds or waits on.
    async fn prune_locks(&self, ids: &[String]) {
        let mut table = self.key_locks.lock().await;
        for id in ids {
            if let Some(lock) = table.get(id)
                && Arc::strong_count(lock) == 1
            {
                table.remove(id);
            }
        }
    }
}
