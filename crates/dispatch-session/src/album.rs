//! Album coalescing (§4.8): media inputs that carry a `group_id` arrive as a burst of separate
//! messages a fraction of a second apart. `AlbumCollector` buffers them per `(user_id, group_id)`
//! and reports the batch complete once `COLLECTION_WINDOW` has passed since the last item,
//! rather than the caller trying to guess a message count up front.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dispatch_store::{AlbumItem, MediaKind};

/// Inputs arriving within this long of each other belong to the same album (§4.8: "within a
/// short collection window (≈1s)").
pub const COLLECTION_WINDOW: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone)]
struct PendingAlbum {
    items: Vec<AlbumItem>,
    last_seen: DateTime<Utc>,
}

/// Buffers incoming album members by `(user_id, group_id)` until the collection window
/// elapses with no new arrivals. Not thread-safe; callers own one instance per session
/// handler and drive it from a single task, matching how the rest of SessionFSM is handled.
#[derive(Debug, Default)]
pub struct AlbumCollector {
    pending: HashMap<(i64, String), PendingAlbum>,
}

impl AlbumCollector {
    pub fn new() -> Self {
        Self {
            pending: HashMap::new(),
        }
    }

    /// Records one arriving media item under `group_id`. Returns the accumulated items so far;
    /// the caller decides readiness by calling `poll_ready` on its own timer tick rather than
    /// this call, since a single `push` cannot know whether more members are still arriving.
    pub fn push(
        &mut self,
        user_id: i64,
        group_id: &str,
        file_path: String,
        kind: MediaKind,
        now: DateTime<Utc>,
    ) {
        let key = (user_id, group_id.to_string());
        let entry = self.pending.entry(key).or_insert_with(|| PendingAlbum {
            items: Vec::new(),
            last_seen: now,
        });
        entry.items.push(AlbumItem {
            file_path,
            kind,
        });
        entry.last_seen = now;
    }

    /// Drains and returns every album whose `last_seen` is at least `COLLECTION_WINDOW` behind
    /// `now`, i.e. no member has arrived recently enough to still be in flight.
    pub fn poll_ready(&mut self, now: DateTime<Utc>) -> Vec<((i64, String), Vec<AlbumItem>)> {
        let window = chrono::Duration::from_std(COLLECTION_WINDOW).expect("window fits in chrono::Duration");
        let ready_keys: Vec<(i64, String)> = self
            .pending
            .iter()
            .filter(|(_, album)| now - album.last_seen >= window)
            .map(|(key, _)| key.clone())
            .collect();

        ready_keys
            .into_iter()
            .map(|key| {
                let album = self.pending.remove(&key).expect("key came from this map");
                (key, album.items)
            })
            .collect()
    }

    /// True if no album is currently buffered for `user_id`/`group_id`.
    pub fn is_empty_for(&self, user_id: i64, group_id: &str) -> bool {
        !self.pending.contains_key(&(user_id, group_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).single().unwrap()
    }

    #[test]
    fn items_within_the_window_stay_buffered() {
        let mut collector = AlbumCollector::new();
        collector.push(1, "g1", "a.jpg".into(), MediaKind::Photo, at(0));
        collector.push(1, "g1", "b.jpg".into(), MediaKind::Photo, at(0));
        assert!(collector.poll_ready(at(0)).is_empty());
        assert!(!collector.is_empty_for(1, "g1"));
    }

    #[test]
    fn album_flushes_once_window_elapses_with_no_new_members() {
        let mut collector = AlbumCollector::new();
        collector.push(1, "g1", "a.jpg".into(), MediaKind::Photo, at(0));
        collector.push(1, "g1", "b.jpg".into(), MediaKind::Photo, at(0));

        let ready = collector.poll_ready(at(2));
        assert_eq!(ready.len(), 1);
        let (key, items) = &ready[0];
        assert_eq!(*key, (1, "g1".to_string()));
        assert_eq!(items.len(), 2);
        assert!(collector.is_empty_for(1, "g1"));
    }

    #[test]
    fn late_arrival_resets_the_window() {
        let mut collector = AlbumCollector::new();
        collector.push(1, "g1", "a.jpg".into(), MediaKind::Photo, at(0));
        collector.push(1, "g1", "b.jpg".into(), MediaKind::Photo, at(0));
        assert!(collector.poll_ready(at(1)).is_empty());

        collector.push(1, "g1", "c.jpg".into(), MediaKind::Photo, at(1));
        assert!(collector.poll_ready(at(1)).is_empty());

        let ready = collector.poll_ready(at(3));
        assert_eq!(ready[0].1.len(), 3);
    }

    #[test]
    fn distinct_groups_are_independent() {
        let mut collector = AlbumCollector::new();
        collector.push(1, "g1", "a.jpg".into(), MediaKind::Photo, at(0));
        collector.push(2, "g1", "b.jpg".into(), MediaKind::Photo, at(0));

        let ready = collector.poll_ready(at(5));
        assert_eq!(ready.len(), 2);
    }
}
