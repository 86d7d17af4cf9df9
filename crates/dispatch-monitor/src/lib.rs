//! C7: Monitor — the three background sweeps from §4.7 (reconciliation, reminders, cleanup)
//! plus the cadence they share. Depends on `dispatch-core` for the `Dispatcher`/`Publisher`/
//! `MediaStore` surface it drives, and `dispatch-common` for the local-time `Clock`.

mod cleanup;
mod config;
mod error;
mod monitor;
mod reconciliation;
mod reminders;

pub use cleanup::CleanupJob;
pub use config::MonitorConfig;
pub use error::{MonitorError, MonitorResult};
pub use monitor::Monitor;
pub use reconciliation::{ReconciliationJob, ReconciliationSummary};
pub use reminders::ReminderJob;
