//! §4.5 Dispatcher: owns the timer table and spawns one task per fire. Grounded on
//! `fc_scheduler::DispatchScheduler`'s shape (a struct owning its pollers, `start`/`stop`
//! methods, an `Arc<RwLock<bool>>` run flag) generalized from "poll a queue" to "hold a timer
//! per post id".

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::fire::{fire, DispatchContext, FireOutcome};
use crate::timer::TimerTable;

/// §4.5: "if `t <= now`, schedule for `now + ε` (e.g., 10s) and log a warning; do not drop."
pub const LATE_REGISTRATION_EPSILON: StdDuration = StdDuration::from_secs(10);

/// Owns the in-memory timer table and the shared fire context. Cloning a `Dispatcher` shares
/// both (it is a thin handle, the way `fc_scheduler::PendingJobPoller` is `Clone` for
/// spawning into multiple tasks).
#[derive(Clone)]
pub struct Dispatcher {
    ctx: Arc<DispatchContext>,
    timers: Arc<TimerTable>,
    running: Arc<RwLock<bool>>,
}

impl Dispatcher {
    pub fn new(ctx: DispatchContext) -> Self {
        Self {
            ctx: Arc::new(ctx),
            timers: Arc::new(TimerTable::new()),
            running: Arc::new(RwLock::new(true)),
        }
    }

    /// §4.5 "Registration": installs (or replaces) a timer for `post_id` firing at `t`.
    pub async fn register(&self, post_id: i64, user_id: i64, t: DateTime<Utc>) {
        let now = Utc::now();
        let delay = match (t - now).to_std() {
            Ok(d) => d,
            Err(_) => {
                warn!(post_id, scheduled_at = %t, "registering post in the past; deferring by grace epsilon");
                LATE_REGISTRATION_EPSILON
            }
        };

        let ctx = self.ctx.clone();
        let timers = self.timers.clone();
        let running = self.running.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if !*running.read().await {
                return;
            }
            let outcome = fire(&ctx, post_id).await;
            log_outcome(post_id, &outcome);
            match outcome {
                FireOutcome::RecurringContinued(next) => {
                    let dispatcher = Dispatcher {
                        ctx: ctx.clone(),
                        timers: timers.clone(),
                        running: running.clone(),
                    };
                    // Registers the next occurrence; this replaces our own (already finished)
                    // entry in the table rather than leaving it behind as dead weight.
                    dispatcher.register(post_id, user_id, next).await;
                }
                _ => timers.cancel(post_id),
            }
        });

        self.timers.insert(post_id, user_id, handle);
        metrics::gauge!("scheduler.pending_timers").set(self.timers.len() as f64);
    }

    /// §4.5 "`cancel(post_id)`: removes timer; safe if absent."
    pub fn cancel(&self, post_id: i64) {
        self.timers.cancel(post_id);
        metrics::gauge!("scheduler.pending_timers").set(self.timers.len() as f64);
    }

    /// §4.5 "`cancel_user(user_id)`: removes all timers whose stored posts belong to user."
    pub fn cancel_user(&self, user_id: i64) {
        self.timers.cancel_user(user_id);
        metrics::gauge!("scheduler.pending_timers").set(self.timers.len() as f64);
    }

    pub fn is_registered(&self, post_id: i64) -> bool {
        self.timers.contains(post_id)
    }

    pub fn active_count(&self) -> usize {
        self.timers.len()
    }

    pub fn active_ids(&self) -> Vec<i64> {
        self.timers.active_ids()
    }

    pub async fn stop(&self) {
        let mut running = self.running.write().await;
        *running = false;
        info!("dispatcher stopped");
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    pub fn context(&self) -> &DispatchContext {
        &self.ctx
    }
}

fn log_outcome(post_id: i64, outcome: &FireOutcome) {
    match outcome {
        FireOutcome::Posted => {
            info!(post_id, "post dispatched successfully");
            metrics::counter!("scheduler.posts.dispatched_total").increment(1);
        }
        FireOutcome::RecurringContinued(next) => {
            info!(post_id, next_fire = %next, "recurring post rescheduled");
            metrics::counter!("scheduler.posts.recurring_rescheduled_total").increment(1);
        }
        FireOutcome::Failed(kind) => {
            warn!(post_id, kind = ?kind, "post failed");
            metrics::counter!("scheduler.posts.failed_total").increment(1);
        }
        FireOutcome::Skipped(reason) => info!(post_id, reason, "fire skipped"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{AlbumMember, MediaStore, Publisher};
    use crate::sleeper::TokioSleeper;
    use async_trait::async_trait;
    use dispatch_classify::{ErrorClassifier, PublishError};
    use dispatch_store::{MediaKind, PostMode, SqliteStore, Store};
    use sqlx::SqlitePool;

    struct AlwaysOkPublisher;

    #[async_trait]
    impl Publisher for AlwaysOkPublisher {
        async fn publish_single(
            &self,
            _channel_id: i64,
            _kind: MediaKind,
            _file_path: &str,
            _caption: Option<&str>,
        ) -> Result<(), PublishError> {
            Ok(())
        }
        async fn publish_album(
            &self,
            _channel_id: i64,
            _items: &[AlbumMember],
            _caption_on_first: Option<&str>,
        ) -> Result<(), PublishError> {
            Ok(())
        }
        async fn notify_operator(&self, _user_id: i64, _text: &str) {}
    }

    struct AlwaysPresentMedia;

    #[async_trait]
    impl MediaStore for AlwaysPresentMedia {
        async fn exists(&self, _file_path: &str) -> bool {
            true
        }
        async fn delete(&self, _file_path: &str) -> std::io::Result<()> {
            Ok(())
        }
        async fn sweep(&self, _older_than_secs: u64) -> std::io::Result<u64> {
            Ok(0)
        }
    }

    async fn test_dispatcher() -> (Dispatcher, Arc<dyn Store>) {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        let store = SqliteStore::new(pool);
        store.init_schema().await.unwrap();
        let store: Arc<dyn Store> = Arc::new(store);

        let ctx = DispatchContext {
            store: store.clone(),
            publisher: Arc::new(AlwaysOkPublisher),
            media: Arc::new(AlwaysPresentMedia),
            classifier: ErrorClassifier::new(),
            sleeper: Arc::new(TokioSleeper),
        };
        (Dispatcher::new(ctx), store)
    }

    #[tokio::test]
    async fn register_then_cancel_removes_the_timer() {
        let (dispatcher, _store) = test_dispatcher().await;
        dispatcher.register(1, 10, Utc::now() + chrono::Duration::hours(1)).await;
        assert!(dispatcher.is_registered(1));
        dispatcher.cancel(1);
        assert!(!dispatcher.is_registered(1));
    }

    #[tokio::test]
    async fn cancel_user_clears_all_of_their_timers() {
        let (dispatcher, _store) = test_dispatcher().await;
        let far = Utc::now() + chrono::Duration::hours(1);
        dispatcher.register(1, 10, far).await;
        dispatcher.register(2, 10, far).await;
        dispatcher.register(3, 20, far).await;

        dispatcher.cancel_user(10);
        assert!(!dispatcher.is_registered(1));
        assert!(!dispatcher.is_registered(2));
        assert!(dispatcher.is_registered(3));
    }

    #[tokio::test]
    async fn re_registering_the_same_post_keeps_one_timer() {
        let (dispatcher, _store) = test_dispatcher().await;
        let far = Utc::now() + chrono::Duration::hours(1);
        dispatcher.register(1, 10, far).await;
        dispatcher.register(1, 10, far + chrono::Duration::hours(1)).await;
        assert_eq!(dispatcher.active_count(), 1);
    }

    #[tokio::test]
    async fn stop_flips_running_flag() {
        let (dispatcher, _store) = test_dispatcher().await;
        assert!(dispatcher.is_running().await);
        dispatcher.stop().await;
        assert!(!dispatcher.is_running().await);
    }
}
