//! §4.7 job 1: post reconciliation, every 5 minutes. Grounded on
//! `fc-scheduler::stale_recovery::StaleQueuedJobPoller` (before/after counters logged per
//! sweep) and `examples/original_source/bot/scheduler.py::_monitor_scheduled_posts`.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use dispatch_core::{notification_templates, Dispatcher, Publisher};
use dispatch_store::Store;
use tracing::{info, warn};

use crate::config::MonitorConfig;
use crate::error::MonitorResult;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconciliationSummary {
    pub registered: u32,
    pub overdue_rescheduled: u32,
}

pub struct ReconciliationJob {
    store: Arc<dyn Store>,
    dispatcher: Dispatcher,
    publisher: Arc<dyn Publisher>,
    config: MonitorConfig,
}

impl ReconciliationJob {
    pub fn new(
        store: Arc<dyn Store>,
        dispatcher: Dispatcher,
        publisher: Arc<dyn Publisher>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            store,
            dispatcher,
            publisher,
            config,
        }
    }

    /// §4.7 job 1: diff Dispatcher's active timers against Store's scheduled pending posts,
    /// registering anything missing and re-arming anything overdue.
    pub async fn run_once(&self) -> MonitorResult<ReconciliationSummary> {
        if !self.dispatcher.is_running().await {
            warn!("dispatcher is not running; reconciliation cannot re-arm timers");
        }

        let active: HashSet<i64> = self.dispatcher.active_ids().into_iter().collect();
        let pending = self.store.list_pending(None, None, false).await?;
        let now = Utc::now();

        let mut summary = ReconciliationSummary::default();
        for post in pending {
            let Some(scheduled_time) = post.scheduled_time else {
                continue;
            };
            if active.contains(&post.id) {
                continue;
            }

            if scheduled_time > now {
                self.dispatcher.register(post.id, post.user_id, scheduled_time).await;
                summary.registered += 1;
            } else {
                let next = now + chrono::Duration::from_std(self.config.overdue_grace).unwrap_or_default();
                self.dispatcher.register(post.id, post.user_id, next).await;
                self.publisher
                    .notify_operator(post.user_id, &notification_templates::delayed(post.id))
                    .await;
                summary.overdue_rescheduled += 1;
            }
        }

        if summary.registered > 0 || summary.overdue_rescheduled > 0 {
            info!(
                registered = summary.registered,
                overdue_rescheduled = summary.overdue_rescheduled,
                "reconciliation swept missing timers"
            );
        }
        metrics::gauge!("scheduler.reconciliation.registered").set(summary.registered as f64);
        metrics::gauge!("scheduler.reconciliation.overdue").set(summary.overdue_rescheduled as f64);

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dispatch_core::{AlbumMember, DispatchContext, MediaStore};
    use dispatch_classify::{ErrorClassifier, PublishError};
    use dispatch_store::{MediaKind, PostMode, SqliteStore};
    use dispatch_core::{RecordingSleeper};
    use sqlx::SqlitePool;

    struct NoopPublisher;

    #[async_trait]
    impl Publisher for NoopPublisher {
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

    async fn fresh_store() -> Arc<dyn Store> {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        let store = SqliteStore::new(pool);
        store.init_schema().await.unwrap();
        Arc::new(store)
    }

    fn dispatcher(store: Arc<dyn Store>) -> Dispatcher {
        let ctx = DispatchContext {
            store,
            publisher: Arc::new(NoopPublisher),
            media: Arc::new(AlwaysPresentMedia),
            classifier: ErrorClassifier::new(),
            sleeper: Arc::new(RecordingSleeper::default()),
        };
        Dispatcher::new(ctx)
    }

    #[tokio::test]
    async fn registers_posts_missing_from_the_timer_table() {
        let store = fresh_store().await;
        store.add_channel(1, 10, "chan").await.unwrap();
        let id = store
            .add_post(1, 10, "/tmp/a.jpg", MediaKind::Photo, None, PostMode::Individual, None)
            .await
            .unwrap();
        let future = Utc::now() + chrono::Duration::hours(1);
        store.update_post_schedule(id, future).await.unwrap();

        let dispatcher = dispatcher(store.clone());
        let job = ReconciliationJob::new(
            store,
            dispatcher.clone(),
            Arc::new(NoopPublisher),
            MonitorConfig::default(),
        );

        let summary = job.run_once().await.unwrap();
        assert_eq!(summary.registered, 1);
        assert_eq!(summary.overdue_rescheduled, 0);
        assert!(dispatcher.is_registered(id));
    }

    #[tokio::test]
    async fn reschedules_overdue_posts_with_grace_delay() {
        let store = fresh_store().await;
        store.add_channel(1, 10, "chan").await.unwrap();
        let id = store
            .add_post(1, 10, "/tmp/a.jpg", MediaKind::Photo, None, PostMode::Individual, None)
            .await
            .unwrap();
        let past = Utc::now() - chrono::Duration::minutes(5);
        store.update_post_schedule(id, past).await.unwrap();

        let dispatcher = dispatcher(store.clone());
        let job = ReconciliationJob::new(
            store,
            dispatcher.clone(),
            Arc::new(NoopPublisher),
            MonitorConfig::default(),
        );

        let summary = job.run_once().await.unwrap();
        assert_eq!(summary.overdue_rescheduled, 1);
        assert!(dispatcher.is_registered(id));
    }

    #[tokio::test]
    async fn already_registered_posts_are_left_alone() {
        let store = fresh_store().await;
        store.add_channel(1, 10, "chan").await.unwrap();
        let id = store
            .add_post(1, 10, "/tmp/a.jpg", MediaKind::Photo, None, PostMode::Individual, None)
            .await
            .unwrap();
        let future = Utc::now() + chrono::Duration::hours(1);
        store.update_post_schedule(id, future).await.unwrap();

        let dispatcher = dispatcher(store.clone());
        dispatcher.register(id, 1, future).await;

        let job = ReconciliationJob::new(
            store,
            dispatcher,
            Arc::new(NoopPublisher),
            MonitorConfig::default(),
        );
        let summary = job.run_once().await.unwrap();
        assert_eq!(summary.registered, 0);
        assert_eq!(summary.overdue_rescheduled, 0);
    }
}
