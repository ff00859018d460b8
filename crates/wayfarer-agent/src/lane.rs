use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tracing::debug;

use wayfarer_core::error::{Result, WayfarerError};
use wayfarer_core::types::ThreadId;

/// Tracks which threads have a turn in flight.
///
/// A thread holds its lane for the whole turn; a second request for the
/// same thread is rejected rather than queued.
#[derive(Clone, Default)]
pub struct ThreadLanes {
    busy: Arc<Mutex<HashSet<ThreadId>>>,
}

impl ThreadLanes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the lane for `thread_id`, or fail with `ThreadBusy`.
    pub fn try_acquire(&self, thread_id: &ThreadId) -> Result<LaneGuard> {
        let mut busy = self
            .busy
            .lock()
            .map_err(|e| WayfarerError::Database(format!("lane registry poisoned: {}", e)))?;
        if !busy.insert(thread_id.clone()) {
            return Err(WayfarerError::ThreadBusy(thread_id.to_string()));
        }
        debug!(thread_id = %thread_id, "Lane acquired");
        Ok(LaneGuard {
            busy: self.busy.clone(),
            thread_id: thread_id.clone(),
        })
    }

    pub fn is_busy(&self, thread_id: &ThreadId) -> bool {
        self.busy
            .lock()
            .map(|busy| busy.contains(thread_id))
            .unwrap_or(false)
    }
}

/// Releases the thread's lane on drop.
pub struct LaneGuard {
    busy: Arc<Mutex<HashSet<ThreadId>>>,
    thread_id: ThreadId,
}

impl Drop for LaneGuard {
    fn drop(&mut self) {
        if let Ok(mut busy) = self.busy.lock() {
            busy.remove(&self.thread_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_is_busy() {
        let lanes = ThreadLanes::new();
        let id = ThreadId::from_string("t1");
        let guard = lanes.try_acquire(&id).unwrap();
        assert!(matches!(
            lanes.try_acquire(&id),
            Err(WayfarerError::ThreadBusy(_))
        ));
        drop(guard);
        assert!(!lanes.is_busy(&id));
        assert!(lanes.try_acquire(&id).is_ok());
    }

    #[test]
    fn test_threads_are_independent() {
        let lanes = ThreadLanes::new();
        let _a = lanes.try_acquire(&ThreadId::from_string("a")).unwrap();
        assert!(lanes.try_acquire(&ThreadId::from_string("b")).is_ok());
    }
}
