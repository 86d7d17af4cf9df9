//! C7: Monitor — ties the three §4.7 jobs together and runs each on its own interval.
//! Grounded on `fc-scheduler::DispatchScheduler::start`/`stop` (one `tokio::spawn` loop per
//! job, shared `Arc<RwLock<bool>>` running flag checked after every tick).

use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::cleanup::CleanupJob;
use crate::config::MonitorConfig;
use crate::reconciliation::ReconciliationJob;
use crate::reminders::ReminderJob;

pub struct Monitor {
    config: MonitorConfig,
    reconciliation: Arc<ReconciliationJob>,
    reminders: Arc<ReminderJob>,
    cleanup: Arc<CleanupJob>,
    running: Arc<RwLock<bool>>,
}

impl Monitor {
    pub fn new(
        config: MonitorConfig,
        reconciliation: ReconciliationJob,
        reminders: ReminderJob,
        cleanup: CleanupJob,
    ) -> Self {
        Self {
            config,
            reconciliation: Arc::new(reconciliation),
            reminders: Arc::new(reminders),
            cleanup: Arc::new(cleanup),
            running: Arc::new(RwLock::new(false)),
        }
    }

    pub async fn start(&self) {
        if !self.config.enabled {
            info!("monitor is disabled");
            return;
        }

        let mut running = self.running.write().await;
        if *running {
            warn!("monitor already running");
            return;
        }
        *running = true;
        drop(running);

        info!("starting monitor: reconciliation, reminders, cleanup");

        let job = self.reconciliation.clone();
        let period = self.config.reconciliation_interval;
        let running_flag = self.running.clone();
        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if !*running_flag.read().await {
                    break;
                }
                if let Err(err) = job.run_once().await {
                    error!(error = %err, "reconciliation sweep failed");
                }
            }
        });

        let job = self.reminders.clone();
        let period = self.config.reminder_interval;
        let running_flag = self.running.clone();
        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if !*running_flag.read().await {
                    break;
                }
                if let Err(err) = job.run_once().await {
                    error!(error = %err, "reminder sweep failed");
                }
            }
        });

        let job = self.cleanup.clone();
        let period = self.config.cleanup_check_interval;
        let running_flag = self.running.clone();
        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if !*running_flag.read().await {
                    break;
                }
                if let Err(err) = job.run_once().await {
                    error!(error = %err, "daily cleanup failed");
                }
            }
        });
    }

    pub async fn stop(&self) {
        let mut running = self.running.write().await;
        *running = false;
        info!("monitor stopped");
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }
}
