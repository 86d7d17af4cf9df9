//! Data model (spec §3): Post, Channel, Batch, Backup, SchedulingConfig, ReminderSettings,
//! and the persisted Session record.

use chrono::{DateTime, Utc};
use dispatch_classify::FailureKind;
use serde::{Deserialize, Serialize};

/// Media kind carried by a post or an album child item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaKind {
    Photo,
    Video,
    Audio,
    Animation,
    Document,
    DocumentImage,
    DocumentVideo,
    Album,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Animation => "animation",
            MediaKind::Document => "document",
            MediaKind::DocumentImage => "document_image",
            MediaKind::DocumentVideo => "document_video",
            MediaKind::Album => "album",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "photo" => MediaKind::Photo,
            "video" => MediaKind::Video,
            "audio" => MediaKind::Audio,
            "animation" => MediaKind::Animation,
            "document" => MediaKind::Document,
            "document_image" => MediaKind::DocumentImage,
            "document_video" => MediaKind::DocumentVideo,
            "album" => MediaKind::Album,
            _ => return None,
        })
    }
}

/// One child item of an album post (1-10 per post, I5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlbumItem {
    pub file_path: String,
    pub kind: MediaKind,
}

/// Mode tag (spec §3: "used only for grouping/reporting; does not affect dispatch
/// semantics"). Kept as an explicit enum rather than inferred (§9 open question #3 /
/// DESIGN.md decision #3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PostMode {
    Bulk,
    Individual,
    Recurring,
    BatchMember,
}

/// Post lifecycle status (§3, §4.1 state model).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PostStatus {
    Pending,
    Posted,
    Failed,
}

impl PostStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PostStatus::Posted | PostStatus::Failed)
    }
}

/// Recurrence configuration carried on a post (§3, §4.6). A single row represents the whole
/// series; there is no per-occurrence materialization (§9 design note).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recurrence {
    pub interval_hours: u32,
    pub end_timestamp: Option<DateTime<Utc>>,
    pub max_count: Option<u32>,
    pub posted_count: u32,
}

impl Recurrence {
    /// I4 / §4.6 step 2: any-of termination check.
    pub fn should_terminate(&self, now: DateTime<Utc>) -> bool {
        if let Some(max) = self.max_count {
            if self.posted_count >= max {
                return true;
            }
        }
        if let Some(end) = self.end_timestamp {
            if now >= end {
                return true;
            }
        }
        false
    }
}

/// The unit of scheduling (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub user_id: i64,
    pub channel_id: i64,
    pub file_path: String,
    pub media_kind: MediaKind,
    pub album: Option<Vec<AlbumItem>>,
    pub caption: Option<String>,
    pub mode: PostMode,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub status: PostStatus,
    pub retry_count: u32,
    pub failure_kind: Option<FailureKind>,
    pub failure_message: Option<String>,
    pub recurrence: Option<Recurrence>,
    pub batch_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    pub fn is_recurring(&self) -> bool {
        self.recurrence.is_some()
    }

    /// "Queued": exists but has no scheduled_time yet (glossary).
    pub fn is_queued(&self) -> bool {
        self.scheduled_time.is_none() && self.status == PostStatus::Pending
    }

    /// "Overdue": a pending post with scheduled_time in the past (glossary).
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == PostStatus::Pending
            && self.scheduled_time.is_some_and(|t| t <= now)
    }
}

/// (user_id, channel_id, display_name), unique on (user_id, channel_id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub user_id: i64,
    pub channel_id: i64,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    Pending,
    Scheduled,
}

/// A named group of posts sharing a channel, scheduled together (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub channel_id: i64,
    pub status: BatchStatus,
    pub created_at: DateTime<Utc>,
}

/// A serialized snapshot of a set of scheduled posts, restorable into the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Backup {
    pub user_id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

/// Per-operator default scheduling window. Defaults per spec: 10, 20, 2.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingConfig {
    pub user_id: i64,
    pub start_hour: u32,
    pub end_hour: u32,
    pub interval_hours: u32,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            user_id: 0,
            start_hour: 10,
            end_hour: 20,
            interval_hours: 2,
        }
    }
}

/// Per-operator reminder configuration (§4.7 job 2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderSettings {
    pub user_id: i64,
    pub enabled: bool,
    pub threshold: u32,
    pub last_sent: Option<DateTime<Utc>>,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            user_id: 0,
            enabled: true,
            threshold: 3,
            last_sent: None,
        }
    }
}

/// Persisted form of a Session's conversational state. `dispatch-session` owns the typed
/// `SessionState` enum and (de)serializes it into `state_json`; the store treats the payload
/// as opaque.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub user_id: i64,
    pub state_tag: String,
    pub state_json: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}
