//! Abstracts the fire path's pre-delay and retry-backoff sleeps so unit tests can exercise
//! the retry loop without actually waiting (the pure/IO separation `dispatch-schedule` uses
//! for its own calculations, applied here to the Dispatcher's timing side-effects).

use std::time::Duration;

use async_trait::async_trait;

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, d: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, d: Duration) {
        tokio::time::sleep(d).await;
    }
}

/// Records requested durations instead of waiting, for deterministic tests of the fire path's
/// retry loop.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    pub calls: std::sync::Mutex<Vec<Duration>>,
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, d: Duration) {
        self.calls.lock().expect("sleeper mutex poisoned").push(d);
    }
}
