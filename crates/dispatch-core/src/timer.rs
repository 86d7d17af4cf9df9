//! In-memory timer table (§4.5 "Scheduling model": "a single dispatcher task with a timer
//! wheel keyed by post id"). Owned exclusively by `Dispatcher`; external callers only ever
//! go through `register`/`cancel`/`cancel_user` (§5 shared resource policy).

use dashmap::DashMap;
use tokio::task::JoinHandle;

struct TimerEntry {
    user_id: i64,
    handle: JoinHandle<()>,
}

/// Maps `post_id -> (user_id, spawned sleep-then-fire task)`. Registering over an existing id
/// aborts the old task first (§4.5: "`register`: idempotent; removes any prior timer").
#[derive(Default)]
pub struct TimerTable {
    timers: DashMap<i64, TimerEntry>,
}

impl TimerTable {
    pub fn new() -> Self {
        Self {
            timers: DashMap::new(),
        }
    }

    /// Installs `handle` for `post_id`, aborting and replacing any timer already registered
    /// for that id.
    pub fn insert(&self, post_id: i64, user_id: i64, handle: JoinHandle<()>) {
        if let Some((_, old)) = self.timers.remove(&post_id) {
            old.handle.abort();
        }
        self.timers.insert(post_id, TimerEntry { user_id, handle });
    }

    /// Removes the timer for `post_id`, aborting its sleep. A no-op if absent (§4.5:
    /// "`cancel`: removes timer; safe if absent"). Does not interrupt an in-flight publish —
    /// by the time a fire task starts its actual publish work it has already been removed
    /// from this table by the caller driving the fire loop.
    pub fn cancel(&self, post_id: i64) {
        if let Some((_, entry)) = self.timers.remove(&post_id) {
            entry.handle.abort();
        }
    }

    /// Removes every timer belonging to `user_id` (§4.5: "`cancel_user`").
    pub fn cancel_user(&self, user_id: i64) {
        let ids: Vec<i64> = self
            .timers
            .iter()
            .filter(|entry| entry.value().user_id == user_id)
            .map(|entry| *entry.key())
            .collect();
        for id in ids {
            self.cancel(id);
        }
    }

    /// Whether a timer is currently registered for `post_id`, used by Monitor reconciliation
    /// to find posts Dispatcher doesn't yet know about (§4.7 job 1).
    pub fn contains(&self, post_id: i64) -> bool {
        self.timers.contains_key(&post_id)
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Snapshot of every post id currently armed, for Monitor's reconciliation sweep.
    pub fn active_ids(&self) -> Vec<i64> {
        self.timers.iter().map(|entry| *entry.key()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn_noop() -> JoinHandle<()> {
        tokio::spawn(async {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        })
    }

    #[tokio::test]
    async fn insert_then_contains() {
        let table = TimerTable::new();
        table.insert(1, 10, spawn_noop());
        assert!(table.contains(1));
        assert_eq!(table.len(), 1);
    }

    #[tokio::test]
    async fn re_registering_replaces_the_old_timer() {
        let table = TimerTable::new();
        table.insert(1, 10, spawn_noop());
        table.insert(1, 10, spawn_noop());
        assert_eq!(table.len(), 1);
    }

    #[tokio::test]
    async fn cancel_is_safe_when_absent() {
        let table = TimerTable::new();
        table.cancel(999);
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn cancel_user_removes_only_their_timers() {
        let table = TimerTable::new();
        table.insert(1, 10, spawn_noop());
        table.insert(2, 10, spawn_noop());
        table.insert(3, 20, spawn_noop());

        table.cancel_user(10);
        assert!(!table.contains(1));
        assert!(!table.contains(2));
        assert!(table.contains(3));
    }

    #[tokio::test]
    async fn active_ids_reflects_current_set() {
        let table = TimerTable::new();
        table.insert(1, 10, spawn_noop());
        table.insert(2, 10, spawn_noop());
        let mut ids = table.active_ids();
        ids.sort();
        assert_eq!(ids, vec![1, 2]);
    }
}
