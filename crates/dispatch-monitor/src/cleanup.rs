//! §4.7 job 3: daily media cleanup. Grounded on `fc-outbox::recovery::RecoveryTask` for the
//! check-interval/actual-work split, and `dispatch_common::Clock` for the local-day gate.

use std::sync::Arc;
use std::sync::Mutex;

use chrono::{NaiveDate, Timelike};
use dispatch_common::Clock;
use dispatch_core::MediaStore;
use tracing::info;

use crate::config::MonitorConfig;

/// Sweeps stale media once per local calendar day, at or after `cleanup_hour`. The check runs
/// on `cleanup_check_interval`'s finer cadence; `last_run` tracks the last date actually swept
/// so a restart doesn't re-run the same day twice nor skip a day entirely.
pub struct CleanupJob {
    media: Arc<dyn MediaStore>,
    clock: Arc<dyn Clock>,
    config: MonitorConfig,
    last_run: Mutex<Option<NaiveDate>>,
}

impl CleanupJob {
    pub fn new(media: Arc<dyn MediaStore>, clock: Arc<dyn Clock>, config: MonitorConfig) -> Self {
        Self {
            media,
            clock,
            config,
            last_run: Mutex::new(None),
        }
    }

    /// Returns `Some(removed_count)` if a sweep ran this call, `None` if it wasn't yet time.
    pub async fn run_once(&self) -> std::io::Result<Option<u64>> {
        let now = self.clock.now();
        let today = now.date_naive();

        if now.hour() < self.config.cleanup_hour {
            return Ok(None);
        }
        {
            let last_run = self.last_run.lock().unwrap();
            if *last_run == Some(today) {
                return Ok(None);
            }
        }

        let removed = self.media.sweep(self.config.media_retention.as_secs()).await?;
        *self.last_run.lock().unwrap() = Some(today);

        info!(removed, "daily media cleanup swept stale files");
        metrics::counter!("scheduler.cleanup.removed_total").increment(removed);

        Ok(Some(removed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dispatch_common::FixedClock;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct CountingMedia {
        calls: AtomicU64,
    }

    #[async_trait]
    impl MediaStore for CountingMedia {
        async fn exists(&self, _file_path: &str) -> bool {
            true
        }
        async fn delete(&self, _file_path: &str) -> std::io::Result<()> {
            Ok(())
        }
        async fn sweep(&self, _older_than_secs: u64) -> std::io::Result<u64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(7)
        }
    }

    fn clock_at(hour: u32) -> Arc<dyn Clock> {
        Arc::new(FixedClock::from_ymd_hms(
            chrono_tz::Europe::Kiev,
            2025,
            7,
            24,
            hour,
            0,
            0,
        ))
    }

    #[tokio::test]
    async fn does_not_run_before_cleanup_hour() {
        let media = Arc::new(CountingMedia {
            calls: AtomicU64::new(0),
        });
        let job = CleanupJob::new(media.clone(), clock_at(1), MonitorConfig::default());

        let result = job.run_once().await.unwrap();
        assert_eq!(result, None);
        assert_eq!(media.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn runs_once_at_or_after_cleanup_hour() {
        let media = Arc::new(CountingMedia {
            calls: AtomicU64::new(0),
        });
        let job = CleanupJob::new(media.clone(), clock_at(3), MonitorConfig::default());

        let result = job.run_once().await.unwrap();
        assert_eq!(result, Some(7));
        assert_eq!(media.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn does_not_run_twice_for_the_same_day() {
        let media = Arc::new(CountingMedia {
            calls: AtomicU64::new(0),
        });
        let job = CleanupJob::new(media.clone(), clock_at(4), MonitorConfig::default());

        assert_eq!(job.run_once().await.unwrap(), Some(7));
        assert_eq!(job.run_once().await.unwrap(), None);
        assert_eq!(media.calls.load(Ordering::SeqCst), 1);
    }
}
