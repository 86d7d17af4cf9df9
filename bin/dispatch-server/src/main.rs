//! Dispatcher process entry point: loads config, opens the store, wires the Dispatcher and
//! Monitor, exposes health/readiness over axum.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{routing::get, Json, Router};
use dispatch_classify::{ErrorClassifier, PublishError};
use dispatch_config::AppConfig;
use dispatch_core::{
    AlbumMember, DispatchContext, Dispatcher, MediaStore, Publisher, TokioSleeper,
};
use dispatch_monitor::{CleanupJob, Monitor, MonitorConfig as MonitorJobConfig, ReconciliationJob, ReminderJob};
use dispatch_store::{MediaKind, SqliteStore, Store};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::info;

/// Stand-in for the out-of-scope messaging-platform transport (§1 Out of scope). Logs instead
/// of calling a real API, mirroring `fc-scheduler-server`'s `DevQueuePublisher`.
struct DevPublisher;

#[async_trait]
impl Publisher for DevPublisher {
    async fn publish_single(
        &self,
        channel_id: i64,
        kind: MediaKind,
        file_path: &str,
        caption: Option<&str>,
    ) -> Result<(), PublishError> {
        info!(channel_id, ?kind, file_path, ?caption, "DEV: publish_single");
        Ok(())
    }

    async fn publish_album(
        &self,
        channel_id: i64,
        items: &[AlbumMember],
        caption_on_first: Option<&str>,
    ) -> Result<(), PublishError> {
        info!(channel_id, count = items.len(), ?caption_on_first, "DEV: publish_album");
        Ok(())
    }

    async fn notify_operator(&self, user_id: i64, text: &str) {
        info!(user_id, text, "DEV: notify_operator");
    }
}

/// Stand-in for the out-of-scope media-file storage (§1 Out of scope). Backs `exists`/`sweep`
/// with the local filesystem so the binary is runnable without a real blob store.
struct DevMediaStore {
    root: std::path::PathBuf,
}

#[async_trait]
impl MediaStore for DevMediaStore {
    async fn exists(&self, file_path: &str) -> bool {
        tokio::fs::metadata(file_path).await.is_ok()
    }

    async fn delete(&self, file_path: &str) -> std::io::Result<()> {
        tokio::fs::remove_file(file_path).await
    }

    async fn sweep(&self, older_than_secs: u64) -> std::io::Result<u64> {
        let cutoff = std::time::SystemTime::now() - Duration::from_secs(older_than_secs);
        let mut removed = 0u64;
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(err),
        };
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            if metadata.modified()? < cutoff {
                tokio::fs::remove_file(entry.path()).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    dispatcher_running: bool,
    monitor_running: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dispatch_common::logging::init_logging("dispatch-server");

    info!("starting dispatch-server");

    let config = AppConfig::load()?;
    info!(timezone = %config.timezone, http_port = config.http_port, "configuration loaded");

    let connect_options = SqliteConnectOptions::new()
        .filename(&config.database.sqlite_path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(config.database.pool_size)
        .connect_with(connect_options)
        .await?;
    let store: Arc<dyn Store> = {
        let store = SqliteStore::new(pool);
        store.init_schema().await?;
        Arc::new(store)
    };
    info!(path = %config.database.sqlite_path, "store opened");

    tokio::fs::create_dir_all(&config.uploads_dir).await?;

    let publisher: Arc<dyn Publisher> = Arc::new(DevPublisher);
    let media: Arc<dyn MediaStore> = Arc::new(DevMediaStore {
        root: config.uploads_dir.clone().into(),
    });

    let dispatch_ctx = DispatchContext {
        store: store.clone(),
        publisher: publisher.clone(),
        media: media.clone(),
        classifier: ErrorClassifier::with_backoff_cap(config.scheduler.backoff_cap_secs),
        sleeper: Arc::new(TokioSleeper),
    };
    let dispatcher = Dispatcher::new(dispatch_ctx);

    let monitor_config = MonitorJobConfig {
        reconciliation_interval: Duration::from_secs(config.monitor.reconciliation_interval_secs),
        reminder_interval: Duration::from_secs(config.monitor.reminder_interval_secs),
        cleanup_check_interval: Duration::from_secs(15 * 60),
        cleanup_hour: config.monitor.cleanup_hour,
        media_retention: Duration::from_secs(config.media_retention.retention_days as u64 * 24 * 60 * 60),
        overdue_grace: Duration::from_secs(config.monitor.overdue_requeue_secs),
        enabled: true,
    };

    let reconciliation = ReconciliationJob::new(
        store.clone(),
        dispatcher.clone(),
        publisher.clone(),
        monitor_config.clone(),
    );
    let reminders = ReminderJob::new(store.clone(), publisher.clone());
    let zone = dispatch_common::clock::zone_or_default(&config.timezone);
    let clock = Arc::new(dispatch_common::clock::SystemClock::new(zone));
    let cleanup = CleanupJob::new(media.clone(), clock, monitor_config.clone());

    // Prime the timer table from whatever was already scheduled before this process started,
    // rather than waiting out the first reconciliation interval.
    let startup_summary = reconciliation.run_once().await?;
    info!(
        registered = startup_summary.registered,
        overdue_rescheduled = startup_summary.overdue_rescheduled,
        "startup reconciliation complete"
    );

    let monitor = Arc::new(Monitor::new(monitor_config, reconciliation, reminders, cleanup));
    monitor.start().await;

    let app_dispatcher = dispatcher.clone();
    let app_monitor = monitor.clone();
    let app = Router::new()
        .route(
            "/q/health",
            get(move || {
                let dispatcher = app_dispatcher.clone();
                let monitor = app_monitor.clone();
                async move {
                    let dispatcher_running = dispatcher.is_running().await;
                    let monitor_running = monitor.is_running().await;
                    let up = dispatcher_running && monitor_running;
                    Json(HealthResponse {
                        status: if up { "UP".to_string() } else { "DOWN".to_string() },
                        dispatcher_running,
                        monitor_running,
                    })
                }
            }),
        )
        .route("/q/health/live", get(|| async { Json(serde_json::json!({"status": "UP"})) }))
        .route("/q/health/ready", get(|| async { Json(serde_json::json!({"status": "UP"})) }));

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.http_port));
    info!(?addr, "HTTP server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(dispatcher, monitor))
        .await?;

    info!("dispatch-server stopped");
    Ok(())
}

async fn shutdown_signal(dispatcher: Dispatcher, monitor: Arc<Monitor>) {
    tokio::signal::ctrl_c().await.expect("failed to install CTRL+C handler");
    info!("shutdown signal received");
    dispatcher.stop().await;
    monitor.stop().await;
}
