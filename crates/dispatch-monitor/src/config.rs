//! Monitor job cadence. Grounded on `fc-outbox::recovery::RecoveryConfig`'s
//! interval/timeout/enabled shape.

use std::time::Duration;

/// §4.7: reconciliation every 5 minutes, reminders every 1 hour, cleanup daily at 03:00 local.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub reconciliation_interval: Duration,
    pub reminder_interval: Duration,
    /// How often to check whether it's time to run the daily cleanup. Finer-grained than the
    /// cleanup itself; the job only actually sweeps once per local calendar day.
    pub cleanup_check_interval: Duration,
    /// Local hour (0-23) at which the daily cleanup becomes eligible to run.
    pub cleanup_hour: u32,
    /// §4.7 job 3: files owned by terminal posts older than this are swept.
    pub media_retention: Duration,
    /// §4.7 "re-register at `now + 10s`" for overdue posts found during reconciliation.
    pub overdue_grace: Duration,
    pub enabled: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            reconciliation_interval: Duration::from_secs(5 * 60),
            reminder_interval: Duration::from_secs(60 * 60),
            cleanup_check_interval: Duration::from_secs(15 * 60),
            cleanup_hour: 3,
            media_retention: Duration::from_secs(30 * 24 * 60 * 60),
            overdue_grace: Duration::from_secs(10),
            enabled: true,
        }
    }
}
