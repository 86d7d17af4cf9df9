//! C5: ErrorClassifier — maps a raw `Publisher` error to the fixed taxonomy of §4.4/§7,
//! with retry/wait directives and operator-facing guidance text.
//!
//! Grounded on the teacher's `ItemStatus` (`fc-outbox/src/http_dispatcher.rs`), which splits
//! a raw API result into a small retryable/terminal enum, and on
//! `examples/original_source/bot/scheduler.py::_diagnose_telegram_error`, which additionally
//! attaches a specific operator-facing remediation string per category rather than a single
//! generic failure message.

use std::time::Duration;
use thiserror::Error;

/// The raw error a `Publisher` call can fail with. This is what the external transport
/// reports; `ErrorClassifier` turns it into a `Classification`.
#[derive(Debug, Clone, Error)]
pub enum PublishError {
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
    #[error("bot blocked or removed from channel")]
    BotBlocked,
    #[error("chat not found: {0}")]
    ChatNotFound(String),
    #[error("file too large: {0}")]
    FileTooLarge(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("caption invalid: {0}")]
    BadCaption(String),
    #[error("bad request: {0}")]
    BadRequestOther(String),
    #[error("unexpected error: {0}")]
    Unknown(String),
}

/// The canonical taxonomy tag (§7), persisted on a failed post alongside a free-text
/// message. `ValidationError`, `AccessDenied` and `MediaMissing` are never produced by
/// `ErrorClassifier::classify` — they arise synchronously, before a `Publisher` call is ever
/// made, and are constructed directly by `dispatch-core`'s fire path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FailureKind {
    ValidationError,
    AccessDenied,
    MediaMissing,
    RateLimited,
    BotBlocked,
    ChatNotFound,
    FileTooLarge,
    Network,
    BadCaption,
    BadRequestOther,
    Unknown,
}

impl FailureKind {
    /// Whether this kind is ever retried. Mirrors the table in §4.4/§7.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FailureKind::RateLimited | FailureKind::Network | FailureKind::Unknown
        )
    }
}

/// The full result of classifying a `PublishError`: the taxonomy tag, whether the dispatcher
/// should retry, how long to wait before the next attempt, and operator-facing guidance
/// surfaced only when the error becomes terminal (either because it's non-retryable, or the
/// retry budget is exhausted).
#[derive(Debug, Clone)]
pub struct Classification {
    pub kind: FailureKind,
    pub retryable: bool,
    pub wait: Duration,
    pub message: String,
    /// Remediation text shown to the operator on terminal failure, e.g. "re-add bot as
    /// admin". `None` would never happen in practice for terminal kinds; kept as `&str` since
    /// it is always present for this taxonomy.
    pub operator_guidance: &'static str,
}

/// Maps `PublishError`s to `Classification`s. Stateless; `classify` is a pure function of
/// `(error, attempt)`, since the `Unknown` kind's backoff depends on the attempt number.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorClassifier {
    /// Cap in seconds for the `Unknown` kind's exponential backoff (§4.4: `5*2^n` capped at
    /// 60s by default).
    backoff_cap_secs: Option<u64>,
}

const DEFAULT_BACKOFF_CAP_SECS: u64 = 60;

impl ErrorClassifier {
    pub fn new() -> Self {
        Self { backoff_cap_secs: None }
    }

    pub fn with_backoff_cap(backoff_cap_secs: u64) -> Self {
        Self {
            backoff_cap_secs: Some(backoff_cap_secs),
        }
    }

    /// Classify `error`, given the current attempt number (0-indexed, i.e. the attempt that
    /// just failed) for kinds whose backoff depends on it.
    pub fn classify(&self, error: &PublishError, attempt: u32) -> Classification {
        match error {
            PublishError::RateLimited { retry_after_secs } => Classification {
                kind: FailureKind::RateLimited,
                retryable: true,
                wait: Duration::from_secs(retry_after_secs + 1),
                message: error.to_string(),
                operator_guidance: "Telegram API rate limit reached. Will automatically retry.",
            },
            PublishError::BotBlocked => Classification {
                kind: FailureKind::BotBlocked,
                retryable: false,
                wait: Duration::ZERO,
                message: error.to_string(),
                operator_guidance: "The bot has been blocked or removed from the channel. Please re-add the bot as an admin.",
            },
            PublishError::ChatNotFound(_) => Classification {
                kind: FailureKind::ChatNotFound,
                retryable: false,
                wait: Duration::ZERO,
                message: error.to_string(),
                operator_guidance: "Channel not found. Please verify the channel ID and ensure the bot is added as an admin.",
            },
            PublishError::FileTooLarge(_) => Classification {
                kind: FailureKind::FileTooLarge,
                retryable: false,
                wait: Duration::ZERO,
                message: error.to_string(),
                operator_guidance: "File size exceeds the platform limit. Please use a smaller file.",
            },
            PublishError::Network(_) | PublishError::Timeout => Classification {
                kind: FailureKind::Network,
                retryable: true,
                wait: Duration::from_secs(10),
                message: error.to_string(),
                operator_guidance: "Network connectivity issue. Will automatically retry.",
            },
            PublishError::BadCaption(_) => Classification {
                kind: FailureKind::BadCaption,
                retryable: false,
                wait: Duration::ZERO,
                message: error.to_string(),
                operator_guidance: "Caption is too long (max 1024 characters) or contains invalid formatting.",
            },
            PublishError::BadRequestOther(_) => Classification {
                kind: FailureKind::BadRequestOther,
                retryable: false,
                wait: Duration::ZERO,
                message: error.to_string(),
                operator_guidance: "Invalid request parameters. Please check the post content.",
            },
            PublishError::Unknown(_) => {
                let cap = self.backoff_cap_secs.unwrap_or(DEFAULT_BACKOFF_CAP_SECS);
                let raw = 5u64.saturating_mul(1u64 << attempt.min(6));
                Classification {
                    kind: FailureKind::Unknown,
                    retryable: true,
                    wait: Duration::from_secs(raw.min(cap)),
                    message: error.to_string(),
                    operator_guidance: "Unknown error occurred. Will attempt retry.",
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_adds_one_second_buffer() {
        let c = ErrorClassifier::new();
        let classification = c.classify(&PublishError::RateLimited { retry_after_secs: 5 }, 0);
        assert_eq!(classification.wait, Duration::from_secs(6));
        assert!(classification.retryable);
    }

    #[test]
    fn bot_blocked_is_terminal() {
        let c = ErrorClassifier::new();
        let classification = c.classify(&PublishError::BotBlocked, 0);
        assert!(!classification.retryable);
        assert_eq!(classification.kind, FailureKind::BotBlocked);
    }

    #[test]
    fn unknown_backs_off_exponentially_and_caps() {
        let c = ErrorClassifier::new();
        let first = c.classify(&PublishError::Unknown("boom".into()), 0);
        let second = c.classify(&PublishError::Unknown("boom".into()), 1);
        let late = c.classify(&PublishError::Unknown("boom".into()), 10);
        assert_eq!(first.wait, Duration::from_secs(5));
        assert_eq!(second.wait, Duration::from_secs(10));
        assert_eq!(late.wait, Duration::from_secs(60));
    }

    #[test]
    fn network_and_timeout_share_classification() {
        let c = ErrorClassifier::new();
        let net = c.classify(&PublishError::Network("refused".into()), 0);
        let timeout = c.classify(&PublishError::Timeout, 0);
        assert_eq!(net.kind, FailureKind::Network);
        assert_eq!(timeout.kind, FailureKind::Network);
        assert_eq!(net.wait, Duration::from_secs(10));
    }
}
