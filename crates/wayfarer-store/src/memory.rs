use std::collections::HashMap;
use std::sync::Mutex;

use futures::future::BoxFuture;

use wayfarer_core::error::{Result, WayfarerError};
use wayfarer_core::state::Checkpoint;
use wayfarer_core::traits::CheckpointStore;
use wayfarer_core::types::ThreadId;

#[derive(Default)]
struct Inner {
    threads: HashMap<ThreadId, Vec<Checkpoint>>,
    /// Thread ids in order of last append, most recent at the end.
    activity: Vec<ThreadId>,
}

/// Process-local checkpoint store. Same semantics as the SQLite store, no durability.
#[derive(Default)]
pub struct InMemoryCheckpointStore {
    inner: Mutex<Inner>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|e| WayfarerError::Database(e.to_string()))
    }
}

impl CheckpointStore for InMemoryCheckpointStore {
    fn load_latest(&self, thread_id: &ThreadId) -> BoxFuture<'_, Result<Option<Checkpoint>>> {
        let thread_id = thread_id.clone();
        Box::pin(async move {
            let inner = self.lock()?;
            Ok(inner
                .threads
                .get(&thread_id)
                .and_then(|h| h.last().cloned()))
        })
    }

    fn append(&self, mut checkpoint: Checkpoint) -> BoxFuture<'_, Result<Checkpoint>> {
        Box::pin(async move {
            let mut inner = self.lock()?;
            let thread_id = checkpoint.thread_id.clone();
            let history = inner.threads.entry(thread_id.clone()).or_default();
            let latest = history.last().map(|c| c.seq);

            if checkpoint.parent_seq.is_some() && checkpoint.parent_seq != latest {
                return Err(WayfarerError::CheckpointConflict {
                    thread_id: thread_id.to_string(),
                    expected: checkpoint.parent_seq,
                    latest,
                });
            }

            checkpoint.seq = latest.map_or(1, |s| s + 1);
            history.push(checkpoint.clone());

            inner.activity.retain(|t| t != &thread_id);
            inner.activity.push(thread_id);
            Ok(checkpoint)
        })
    }

    fn history(&self, thread_id: &ThreadId) -> BoxFuture<'_, Result<Vec<Checkpoint>>> {
        let thread_id = thread_id.clone();
        Box::pin(async move {
            let inner = self.lock()?;
            Ok(inner.threads.get(&thread_id).cloned().unwrap_or_default())
        })
    }

    fn delete_thread(&self, thread_id: &ThreadId) -> BoxFuture<'_, Result<usize>> {
        let thread_id = thread_id.clone();
        Box::pin(async move {
            let mut inner = self.lock()?;
            inner.activity.retain(|t| t != &thread_id);
            Ok(inner.threads.remove(&thread_id).map_or(0, |h| h.len()))
        })
    }

    fn list_threads(&self, limit: usize) -> BoxFuture<'_, Result<Vec<ThreadId>>> {
        Box::pin(async move {
            let inner = self.lock()?;
            Ok(inner.activity.iter().rev().take(limit).cloned().collect())
        })
    }
}
