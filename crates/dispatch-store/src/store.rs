//! C2: Store — durable CRUD over posts, channels, batches, backups, sessions, reminder
//! settings, and scheduling config, with atomic per-row state transitions (§4.1).

use crate::entity::{
    Backup, Batch, BatchStatus, Channel, MediaKind, Post, PostMode, ReminderSettings,
    SchedulingConfig, SessionRecord,
};
use crate::error::StoreResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use dispatch_classify::FailureKind;
use std::collections::HashMap;

/// Manifest for an album post: an ordered 1-10 item list, each with its own file reference
/// and kind (§3).
#[derive(Debug, Clone)]
pub struct AlbumManifest(pub Vec<(String, MediaKind)>);

/// §4.1 public contract. Implementations must serialize writes per post id (I3) and treat
/// every operation as transactional.
#[async_trait]
pub trait Store: Send + Sync {
    /// `add_post`: rejects if `user_has_channel` is false (I6); enforces caption length (I5)
    /// and album size (I5). Returns the new id; the post starts `pending, unscheduled`.
    #[allow(clippy::too_many_arguments)]
    async fn add_post(
        &self,
        user_id: i64,
        channel_id: i64,
        file_path: &str,
        kind: MediaKind,
        caption: Option<&str>,
        mode: PostMode,
        album: Option<AlbumManifest>,
    ) -> StoreResult<i64>;

    /// Sets `scheduled_time`, status remains `pending`. Noop if the post is terminal.
    async fn update_post_schedule(&self, id: i64, t: DateTime<Utc>) -> StoreResult<()>;

    /// Turns a plain post into a recurring series (§4.8 `Recurring_AwaitingSchedule` ->
    /// scheduled transition): sets `is_recurring` plus its interval/termination fields.
    /// `posted_count` always starts at 0. Only valid on a non-terminal post.
    async fn set_recurrence(
        &self,
        id: i64,
        interval_hours: u32,
        end_timestamp: Option<DateTime<Utc>>,
        max_count: Option<u32>,
    ) -> StoreResult<()>;

    /// `status -> posted`. Idempotent.
    async fn mark_posted(&self, id: i64) -> StoreResult<()>;

    /// `status -> failed`; stores the classified reason.
    async fn mark_failed(&self, id: i64, kind: FailureKind, message: &str) -> StoreResult<()>;

    /// Increments the retry counter and returns the new value.
    async fn increment_retry(&self, id: i64) -> StoreResult<u32>;

    /// §4.6 step 1: increments `recurring_posted_count` and returns the new value. Called
    /// unconditionally on every successful publish of a recurring post, before the
    /// termination check decides whether to `mark_posted` or `update_post_schedule`.
    async fn increment_recurring_posted_count(&self, id: i64) -> StoreResult<u32>;

    async fn get_post(&self, id: i64) -> StoreResult<Option<Post>>;

    /// Stable ordering by `scheduled_time` NULLS LAST, then `id`.
    async fn list_pending(
        &self,
        user_id: Option<i64>,
        channel_id: Option<i64>,
        unscheduled_only: bool,
    ) -> StoreResult<Vec<Post>>;

    async fn list_unscheduled(&self, user_id: i64, channel_id: Option<i64>) -> StoreResult<Vec<Post>>;

    async fn list_scheduled_by_channel(&self, user_id: i64) -> StoreResult<HashMap<i64, Vec<Post>>>;

    async fn list_failed(&self, user_id: i64, channel_id: Option<i64>) -> StoreResult<Vec<Post>>;

    /// `pending` posts with `scheduled_time < now`.
    async fn list_overdue(&self, user_id: Option<i64>, now: DateTime<Utc>) -> StoreResult<Vec<Post>>;

    /// Max `scheduled_time` over pending posts of `user_id`, used by
    /// `next_available_slot` (§4.2.2).
    async fn latest_scheduled_time(&self, user_id: i64) -> StoreResult<Option<DateTime<Utc>>>;

    /// Deletes queued (unscheduled) posts. Returns the deleted rows so the caller can sweep
    /// their media files.
    async fn clear_queued(&self, user_id: i64, channel_id: Option<i64>) -> StoreResult<Vec<Post>>;

    /// Deletes scheduled posts. Returns the deleted ids; caller must cancel their timers.
    async fn clear_scheduled(&self, user_id: i64, channel_id: Option<i64>) -> StoreResult<Vec<i64>>;

    /// Atomic batch reschedule.
    async fn bulk_update_schedules(&self, updates: &[(i64, DateTime<Utc>)]) -> StoreResult<()>;

    /// `failed -> pending(unscheduled)`, clears retry_count and failure reason. Only valid
    /// from `failed`.
    async fn retry_failed_post(&self, id: i64) -> StoreResult<()>;

    /// Recomputes schedule times for all pending posts of `user_id`/`channel_id` starting
    /// from today, using `cfg` and `tz` (the configured local zone, per §4.2's "all times in
    /// the configured local zone"). Returns the number of posts touched.
    async fn reschedule_from_today(
        &self,
        user_id: i64,
        cfg: &SchedulingConfig,
        tz: Tz,
        channel_id: Option<i64>,
    ) -> StoreResult<u32>;

    /// I6: must be consulted on every channel-scoped write and at publish time.
    async fn user_has_channel(&self, user_id: i64, channel_id: i64) -> StoreResult<bool>;

    // -- Channel --
    async fn add_channel(&self, user_id: i64, channel_id: i64, display_name: &str) -> StoreResult<()>;
    async fn list_channels(&self, user_id: i64) -> StoreResult<Vec<Channel>>;

    // -- Batch --
    async fn create_batch(&self, user_id: i64, name: &str, channel_id: i64) -> StoreResult<i64>;
    async fn get_batch(&self, id: i64) -> StoreResult<Option<Batch>>;
    async fn list_batches(&self, user_id: i64) -> StoreResult<Vec<Batch>>;
    async fn update_batch_status(&self, id: i64, status: BatchStatus) -> StoreResult<()>;

    // -- Backup --
    async fn create_backup(&self, backup: Backup) -> StoreResult<()>;
    async fn list_backups(&self, user_id: i64) -> StoreResult<Vec<Backup>>;
    async fn get_backup(&self, user_id: i64, name: &str) -> StoreResult<Option<Backup>>;

    // -- Session --
    async fn get_session(&self, user_id: i64) -> StoreResult<Option<SessionRecord>>;
    async fn save_session(&self, session: &SessionRecord) -> StoreResult<()>;

    // -- SchedulingConfig --
    async fn get_scheduling_config(&self, user_id: i64) -> StoreResult<SchedulingConfig>;
    async fn save_scheduling_config(&self, cfg: &SchedulingConfig) -> StoreResult<()>;

    // -- ReminderSettings --
    async fn get_reminder_settings(&self, user_id: i64) -> StoreResult<ReminderSettings>;
    async fn save_reminder_settings(&self, settings: &ReminderSettings) -> StoreResult<()>;
    /// All operators with `enabled = true`, for the reminder sweep (§4.7 job 2).
    async fn list_reminder_enabled(&self) -> StoreResult<Vec<ReminderSettings>>;

    async fn init_schema(&self) -> StoreResult<()>;
}
