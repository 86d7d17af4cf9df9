//! §4.7 job 2: reminder sweep, every 1 hour. Grounded on
//! `examples/original_source/bot/scheduler.py::_check_and_send_reminders` (threshold-based
//! nudge gated by a 24h cooldown via `last_sent`).

use std::sync::Arc;

use chrono::Utc;
use dispatch_core::Publisher;
use dispatch_store::Store;
use tracing::info;

use crate::error::MonitorResult;

const REMINDER_COOLDOWN: chrono::Duration = chrono::Duration::hours(24);

pub struct ReminderJob {
    store: Arc<dyn Store>,
    publisher: Arc<dyn Publisher>,
}

impl ReminderJob {
    pub fn new(store: Arc<dyn Store>, publisher: Arc<dyn Publisher>) -> Self {
        Self { store, publisher }
    }

    /// Returns the number of reminders sent.
    pub async fn run_once(&self) -> MonitorResult<u32> {
        let mut sent = 0u32;
        let now = Utc::now();

        for mut settings in self.store.list_reminder_enabled().await? {
            let unscheduled = self.store.list_unscheduled(settings.user_id, None).await?;
            if unscheduled.len() as u32 > settings.threshold {
                continue;
            }

            let due = match settings.last_sent {
                Some(last) => now - last >= REMINDER_COOLDOWN,
                None => true,
            };
            if !due {
                continue;
            }

            let text = format!(
                "Reminder: you have only {} unscheduled post(s) queued. Consider adding more.",
                unscheduled.len()
            );
            self.publisher.notify_operator(settings.user_id, &text).await;

            settings.last_sent = Some(now);
            self.store.save_reminder_settings(&settings).await?;
            sent += 1;
        }

        if sent > 0 {
            info!(sent, "reminder sweep dispatched reminders");
        }
        metrics::counter!("scheduler.reminders.sent_total").increment(sent as u64);

        Ok(sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dispatch_classify::PublishError;
    use dispatch_core::AlbumMember;
    use dispatch_store::{MediaKind, PostMode, ReminderSettings, SqliteStore};
    use sqlx::SqlitePool;
    use std::sync::Mutex;

    struct RecordingPublisher {
        notified: Mutex<Vec<i64>>,
    }

    #[async_trait]
    impl Publisher for RecordingPublisher {
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
        async fn notify_operator(&self, user_id: i64, _text: &str) {
            self.notified.lock().unwrap().push(user_id);
        }
    }

    async fn fresh_store() -> Arc<dyn Store> {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        let store = SqliteStore::new(pool);
        store.init_schema().await.unwrap();
        Arc::new(store)
    }

    #[tokio::test]
    async fn sends_reminder_when_unscheduled_count_at_or_below_threshold() {
        let store = fresh_store().await;
        store.add_channel(1, 10, "chan").await.unwrap();
        store
            .add_post(1, 10, "/tmp/a.jpg", MediaKind::Photo, None, PostMode::Bulk, None)
            .await
            .unwrap();

        let mut settings = ReminderSettings {
            user_id: 1,
            ..ReminderSettings::default()
        };
        settings.threshold = 3;
        store.save_reminder_settings(&settings).await.unwrap();

        let publisher = Arc::new(RecordingPublisher {
            notified: Mutex::new(Vec::new()),
        });
        let job = ReminderJob::new(store.clone(), publisher.clone());
        let sent = job.run_once().await.unwrap();

        assert_eq!(sent, 1);
        assert_eq!(publisher.notified.lock().unwrap().as_slice(), &[1]);

        let updated = store.get_reminder_settings(1).await.unwrap();
        assert!(updated.last_sent.is_some());
    }

    #[tokio::test]
    async fn skips_when_cooldown_not_elapsed() {
        let store = fresh_store().await;
        let settings = ReminderSettings {
            user_id: 1,
            enabled: true,
            threshold: 5,
            last_sent: Some(Utc::now()),
        };
        store.save_reminder_settings(&settings).await.unwrap();

        let publisher = Arc::new(RecordingPublisher {
            notified: Mutex::new(Vec::new()),
        });
        let job = ReminderJob::new(store, publisher.clone());
        let sent = job.run_once().await.unwrap();

        assert_eq!(sent, 0);
        assert!(publisher.notified.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn skips_when_above_threshold() {
        let store = fresh_store().await;
        store.add_channel(1, 10, "chan").await.unwrap();
        for _ in 0..5 {
            store
                .add_post(1, 10, "/tmp/a.jpg", MediaKind::Photo, None, PostMode::Bulk, None)
                .await
                .unwrap();
        }
        let settings = ReminderSettings {
            user_id: 1,
            enabled: true,
            threshold: 2,
            last_sent: None,
        };
        store.save_reminder_settings(&settings).await.unwrap();

        let publisher = Arc::new(RecordingPublisher {
            notified: Mutex::new(Vec::new()),
        });
        let job = ReminderJob::new(store, publisher.clone());
        let sent = job.run_once().await.unwrap();

        assert_eq!(sent, 0);
    }
}
