//! SQLite implementation of the `Store` trait (§4.1, §6 persisted state layout).
//!
//! Grounded on `fc-outbox/src/sqlite.rs`'s shape (a thin struct wrapping a `SqlitePool`,
//! `init_schema` issuing raw `CREATE TABLE IF NOT EXISTS` + index statements, row parsing via
//! `sqlx::Row::get`/`try_get`) and `fc-platform/src/dispatch_job/entity.rs`'s richly-fielded
//! entity-with-status modeling.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use dispatch_classify::FailureKind;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::entity::{
    AlbumItem, Backup, Batch, BatchStatus, Channel, MediaKind, Post, PostMode, PostStatus,
    Recurrence, ReminderSettings, SchedulingConfig, SessionRecord,
};
use crate::error::{StoreError, StoreResult};
use crate::store::{AlbumManifest, Store};

/// SQLite-backed `Store`. A single `SqlitePool` is shared across callers; sqlx serializes
/// writes against the underlying connection(s), which combined with per-post-id call
/// discipline from `dispatch-core` gives the per-row serialization I3 requires.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn millis(t: DateTime<Utc>) -> i64 {
        t.timestamp_millis()
    }

    fn from_millis(ms: i64) -> StoreResult<DateTime<Utc>> {
        Utc.timestamp_millis_opt(ms)
            .single()
            .ok_or_else(|| StoreError::Validation(format!("invalid timestamp {ms}")))
    }

    fn row_to_post(row: &sqlx::sqlite::SqliteRow) -> StoreResult<Post> {
        let media_kind_str: String = row.get("media_type");
        let media_kind = MediaKind::parse(&media_kind_str)
            .ok_or_else(|| StoreError::Validation(format!("unknown media_type {media_kind_str}")))?;

        let status_str: String = row.get("status");
        let status = match status_str.as_str() {
            "pending" => PostStatus::Pending,
            "posted" => PostStatus::Posted,
            "failed" => PostStatus::Failed,
            other => return Err(StoreError::Validation(format!("unknown status {other}"))),
        };

        let mode_str: String = row.get("mode");
        let mode = match mode_str.as_str() {
            "bulk" => PostMode::Bulk,
            "individual" => PostMode::Individual,
            "recurring" => PostMode::Recurring,
            "batch_member" => PostMode::BatchMember,
            other => return Err(StoreError::Validation(format!("unknown mode {other}"))),
        };

        let scheduled_time: Option<i64> = row.try_get("scheduled_time").ok();
        let scheduled_time = scheduled_time.map(Self::from_millis).transpose()?;

        let album_json: Option<String> = row.try_get("media_bundle_json").ok().flatten();
        let album: Option<Vec<AlbumItem>> = match album_json {
            Some(s) if !s.is_empty() => Some(serde_json::from_str(&s)?),
            _ => None,
        };

        let is_recurring: i64 = row.get("is_recurring");
        let recurrence = if is_recurring != 0 {
            let interval_hours: i64 = row.get("recurring_interval_hours");
            let end_ts: Option<i64> = row.try_get("recurring_end_date").ok().flatten();
            let max_count: Option<i64> = row.try_get("recurring_count").ok().flatten();
            let posted_count: i64 = row.get("recurring_posted_count");
            Some(Recurrence {
                interval_hours: interval_hours as u32,
                end_timestamp: end_ts.map(Self::from_millis).transpose()?,
                max_count: max_count.map(|c| c as u32),
                posted_count: posted_count as u32,
            })
        } else {
            None
        };

        let failure_kind: Option<String> = row.try_get("failure_kind").ok().flatten();
        let failure_kind = failure_kind
            .map(|s| serde_json::from_str::<FailureKind>(&format!("\"{s}\"")))
            .transpose()?;

        let created_at: i64 = row.get("created_at");
        let updated_at: i64 = row.get("updated_at");

        Ok(Post {
            id: row.get("id"),
            user_id: row.get("user_id"),
            channel_id: row.get("channel_id"),
            file_path: row.get("file_path"),
            media_kind,
            album,
            caption: row.try_get("description").ok().flatten(),
            mode,
            scheduled_time,
            status,
            retry_count: row.get::<i64, _>("retry_count") as u32,
            failure_kind,
            failure_message: row.try_get("failure_message").ok().flatten(),
            recurrence,
            batch_id: row.try_get("batch_id").ok().flatten(),
            created_at: Self::from_millis(created_at)?,
            updated_at: Self::from_millis(updated_at)?,
        })
    }
}

fn mode_str(mode: PostMode) -> &'static str {
    match mode {
        PostMode::Bulk => "bulk",
        PostMode::Individual => "individual",
        PostMode::Recurring => "recurring",
        PostMode::BatchMember => "batch_member",
    }
}

fn status_str(status: PostStatus) -> &'static str {
    match status {
        PostStatus::Pending => "pending",
        PostStatus::Posted => "posted",
        PostStatus::Failed => "failed",
    }
}

fn failure_kind_str(kind: FailureKind) -> String {
    // FailureKind is a plain unit-variant enum; its serde_json form is a bare quoted string.
    let json = serde_json::to_string(&kind).expect("FailureKind always serializes");
    json.trim_matches('"').to_string()
}

#[async_trait]
impl Store for SqliteStore {
    async fn add_post(
        &self,
        user_id: i64,
        channel_id: i64,
        file_path: &str,
        kind: MediaKind,
        caption: Option<&str>,
        mode: PostMode,
        album: Option<AlbumManifest>,
    ) -> StoreResult<i64> {
        if let Some(c) = caption {
            if c.chars().count() > 1024 {
                return Err(StoreError::Validation("caption exceeds 1024 characters".into()));
            }
        }
        if let Some(AlbumManifest(items)) = &album {
            if items.is_empty() || items.len() > 10 {
                return Err(StoreError::Validation("album must have 1-10 items".into()));
            }
        }
        if !self.user_has_channel(user_id, channel_id).await? {
            return Err(StoreError::AccessDenied { user_id, channel_id });
        }

        let album_json = album
            .map(|AlbumManifest(items)| {
                let as_items: Vec<AlbumItem> = items
                    .into_iter()
                    .map(|(file_path, kind)| AlbumItem { file_path, kind })
                    .collect();
                serde_json::to_string(&as_items)
            })
            .transpose()?;

        let now = Self::millis(Utc::now());
        let result = sqlx::query(
            "INSERT INTO posts \
             (user_id, channel_id, file_path, media_type, description, mode, status, \
              is_recurring, recurring_posted_count, retry_count, media_bundle_json, \
              created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, 'pending', 0, 0, 0, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(channel_id)
        .bind(file_path)
        .bind(kind.as_str())
        .bind(caption)
        .bind(mode_str(mode))
        .bind(album_json)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn update_post_schedule(&self, id: i64, t: DateTime<Utc>) -> StoreResult<()> {
        let now = Self::millis(Utc::now());
        sqlx::query(
            "UPDATE posts SET scheduled_time = ?, updated_at = ? \
             WHERE id = ? AND status = 'pending'",
        )
        .bind(Self::millis(t))
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_recurrence(
        &self,
        id: i64,
        interval_hours: u32,
        end_timestamp: Option<DateTime<Utc>>,
        max_count: Option<u32>,
    ) -> StoreResult<()> {
        let now = Self::millis(Utc::now());
        sqlx::query(
            "UPDATE posts SET is_recurring = 1, recurring_interval_hours = ?, \
             recurring_end_date = ?, recurring_count = ?, recurring_posted_count = 0, \
             updated_at = ? WHERE id = ? AND status = 'pending'",
        )
        .bind(interval_hours as i64)
        .bind(end_timestamp.map(Self::millis))
        .bind(max_count.map(|c| c as i64))
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_posted(&self, id: i64) -> StoreResult<()> {
        let now = Self::millis(Utc::now());
        sqlx::query("UPDATE posts SET status = 'posted', updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await?;
        debug!(post_id = id, "post marked posted");
        Ok(())
    }

    async fn mark_failed(&self, id: i64, kind: FailureKind, message: &str) -> StoreResult<()> {
        let now = Self::millis(Utc::now());
        sqlx::query(
            "UPDATE posts SET status = 'failed', failure_kind = ?, failure_message = ?, \
             updated_at = ? WHERE id = ?",
        )
        .bind(failure_kind_str(kind))
        .bind(message)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        info!(post_id = id, kind = ?kind, "post marked failed");
        Ok(())
    }

    async fn increment_retry(&self, id: i64) -> StoreResult<u32> {
        let now = Self::millis(Utc::now());
        sqlx::query("UPDATE posts SET retry_count = retry_count + 1, updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await?;
        let row = sqlx::query("SELECT retry_count FROM posts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::PostNotFound(id))?;
        Ok(row.get::<i64, _>("retry_count") as u32)
    }

    async fn increment_recurring_posted_count(&self, id: i64) -> StoreResult<u32> {
        let now = Self::millis(Utc::now());
        sqlx::query(
            "UPDATE posts SET recurring_posted_count = recurring_posted_count + 1, updated_at = ? WHERE id = ?",
        )
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        let row = sqlx::query("SELECT recurring_posted_count FROM posts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::PostNotFound(id))?;
        Ok(row.get::<i64, _>("recurring_posted_count") as u32)
    }

    async fn get_post(&self, id: i64) -> StoreResult<Option<Post>> {
        let row = sqlx::query("SELECT * FROM posts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_post).transpose()
    }

    async fn list_pending(
        &self,
        user_id: Option<i64>,
        channel_id: Option<i64>,
        unscheduled_only: bool,
    ) -> StoreResult<Vec<Post>> {
        let mut sql = String::from("SELECT * FROM posts WHERE status = 'pending'");
        if user_id.is_some() {
            sql.push_str(" AND user_id = ?");
        }
        if channel_id.is_some() {
            sql.push_str(" AND channel_id = ?");
        }
        if unscheduled_only {
            sql.push_str(" AND scheduled_time IS NULL");
        }
        sql.push_str(" ORDER BY scheduled_time IS NULL DESC, scheduled_time ASC, id ASC");

        let mut q = sqlx::query(&sql);
        if let Some(u) = user_id {
            q = q.bind(u);
        }
        if let Some(c) = channel_id {
            q = q.bind(c);
        }
        let rows = q.fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_post).collect()
    }

    async fn list_unscheduled(&self, user_id: i64, channel_id: Option<i64>) -> StoreResult<Vec<Post>> {
        self.list_pending(Some(user_id), channel_id, true).await
    }

    async fn list_scheduled_by_channel(&self, user_id: i64) -> StoreResult<HashMap<i64, Vec<Post>>> {
        let posts = self.list_pending(Some(user_id), None, false).await?;
        let mut grouped: HashMap<i64, Vec<Post>> = HashMap::new();
        for post in posts.into_iter().filter(|p| p.scheduled_time.is_some()) {
            grouped.entry(post.channel_id).or_default().push(post);
        }
        Ok(grouped)
    }

    async fn list_failed(&self, user_id: i64, channel_id: Option<i64>) -> StoreResult<Vec<Post>> {
        let mut sql = String::from("SELECT * FROM posts WHERE status = 'failed' AND user_id = ?");
        if channel_id.is_some() {
            sql.push_str(" AND channel_id = ?");
        }
        sql.push_str(" ORDER BY id ASC");
        let mut q = sqlx::query(&sql).bind(user_id);
        if let Some(c) = channel_id {
            q = q.bind(c);
        }
        let rows = q.fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_post).collect()
    }

    async fn list_overdue(&self, user_id: Option<i64>, now: DateTime<Utc>) -> StoreResult<Vec<Post>> {
        let mut sql = String::from(
            "SELECT * FROM posts WHERE status = 'pending' AND scheduled_time IS NOT NULL \
             AND scheduled_time < ?",
        );
        if user_id.is_some() {
            sql.push_str(" AND user_id = ?");
        }
        sql.push_str(" ORDER BY scheduled_time ASC");
        let mut q = sqlx::query(&sql).bind(Self::millis(now));
        if let Some(u) = user_id {
            q = q.bind(u);
        }
        let rows = q.fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_post).collect()
    }

    async fn latest_scheduled_time(&self, user_id: i64) -> StoreResult<Option<DateTime<Utc>>> {
        let row = sqlx::query(
            "SELECT MAX(scheduled_time) as latest FROM posts \
             WHERE user_id = ? AND status IN ('pending', 'posted') AND scheduled_time IS NOT NULL",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(r) => {
                let ms: Option<i64> = r.try_get("latest").ok().flatten();
                ms.map(Self::from_millis).transpose()
            }
            None => Ok(None),
        }
    }

    async fn clear_queued(&self, user_id: i64, channel_id: Option<i64>) -> StoreResult<Vec<Post>> {
        let posts = self.list_unscheduled(user_id, channel_id).await?;
        let mut sql = String::from(
            "DELETE FROM posts WHERE user_id = ? AND status = 'pending' AND scheduled_time IS NULL",
        );
        if channel_id.is_some() {
            sql.push_str(" AND channel_id = ?");
        }
        let mut q = sqlx::query(&sql).bind(user_id);
        if let Some(c) = channel_id {
            q = q.bind(c);
        }
        q.execute(&self.pool).await?;
        Ok(posts)
    }

    async fn clear_scheduled(&self, user_id: i64, channel_id: Option<i64>) -> StoreResult<Vec<i64>> {
        let posts = self.list_pending(Some(user_id), channel_id, false).await?;
        let ids: Vec<i64> = posts
            .into_iter()
            .filter(|p| p.scheduled_time.is_some())
            .map(|p| p.id)
            .collect();
        if ids.is_empty() {
            return Ok(ids);
        }
        let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
        let sql = format!(
            "DELETE FROM posts WHERE id IN ({placeholders}) AND status = 'pending' AND scheduled_time IS NOT NULL"
        );
        let mut q = sqlx::query(&sql);
        for id in &ids {
            q = q.bind(id);
        }
        q.execute(&self.pool).await?;
        Ok(ids)
    }

    async fn bulk_update_schedules(&self, updates: &[(i64, DateTime<Utc>)]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        let now = Self::millis(Utc::now());
        for (id, t) in updates {
            sqlx::query(
                "UPDATE posts SET scheduled_time = ?, updated_at = ? \
                 WHERE id = ? AND status = 'pending'",
            )
            .bind(Self::millis(*t))
            .bind(now)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn retry_failed_post(&self, id: i64) -> StoreResult<()> {
        let post = self.get_post(id).await?.ok_or(StoreError::PostNotFound(id))?;
        if post.status != PostStatus::Failed {
            return Err(StoreError::Validation(format!(
                "post {id} is not in failed state"
            )));
        }
        let now = Self::millis(Utc::now());
        sqlx::query(
            "UPDATE posts SET status = 'pending', scheduled_time = NULL, retry_count = 0, \
             failure_kind = NULL, failure_message = NULL, updated_at = ? WHERE id = ?",
        )
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn reschedule_from_today(
        &self,
        user_id: i64,
        cfg: &SchedulingConfig,
        tz: Tz,
        channel_id: Option<i64>,
    ) -> StoreResult<u32> {
        let posts = self.list_pending(Some(user_id), channel_id, false).await?;
        if posts.is_empty() {
            return Ok(0);
        }
        let window = dispatch_schedule::Window::new(cfg.start_hour, cfg.end_hour, cfg.interval_hours)
            .map_err(|e| StoreError::Validation(e.to_string()))?;
        let anchor = Utc::now().with_timezone(&tz);
        let times = dispatch_schedule::fixed_interval(window, posts.len(), anchor);
        let updates: Vec<(i64, DateTime<Utc>)> = posts
            .iter()
            .zip(times)
            .map(|(p, t)| (p.id, t.with_timezone(&Utc)))
            .collect();
        self.bulk_update_schedules(&updates).await?;
        Ok(updates.len() as u32)
    }

    async fn user_has_channel(&self, user_id: i64, channel_id: i64) -> StoreResult<bool> {
        let row = sqlx::query("SELECT 1 FROM channels WHERE user_id = ? AND channel_id = ?")
            .bind(user_id)
            .bind(channel_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn add_channel(&self, user_id: i64, channel_id: i64, display_name: &str) -> StoreResult<()> {
        let now = Self::millis(Utc::now());
        sqlx::query(
            "INSERT INTO channels (user_id, channel_id, channel_name, created_at) \
             VALUES (?, ?, ?, ?) \
             ON CONFLICT(user_id, channel_id) DO UPDATE SET channel_name = excluded.channel_name",
        )
        .bind(user_id)
        .bind(channel_id)
        .bind(display_name)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_channels(&self, user_id: i64) -> StoreResult<Vec<Channel>> {
        let rows = sqlx::query("SELECT * FROM channels WHERE user_id = ? ORDER BY channel_id")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|r| {
                Ok(Channel {
                    user_id: r.get("user_id"),
                    channel_id: r.get("channel_id"),
                    display_name: r.get("channel_name"),
                    created_at: Self::from_millis(r.get("created_at"))?,
                })
            })
            .collect()
    }

    async fn create_batch(&self, user_id: i64, name: &str, channel_id: i64) -> StoreResult<i64> {
        if !self.user_has_channel(user_id, channel_id).await? {
            return Err(StoreError::AccessDenied { user_id, channel_id });
        }
        let now = Self::millis(Utc::now());
        let result = sqlx::query(
            "INSERT INTO batches (user_id, name, channel_id, status, created_at) \
             VALUES (?, ?, ?, 'pending', ?)",
        )
        .bind(user_id)
        .bind(name)
        .bind(channel_id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn get_batch(&self, id: i64) -> StoreResult<Option<Batch>> {
        let row = sqlx::query("SELECT * FROM batches WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| {
            Ok(Batch {
                id: r.get("id"),
                user_id: r.get("user_id"),
                name: r.get("name"),
                channel_id: r.get("channel_id"),
                status: match r.get::<String, _>("status").as_str() {
                    "pending" => BatchStatus::Pending,
                    _ => BatchStatus::Scheduled,
                },
                created_at: Self::from_millis(r.get("created_at"))?,
            })
        })
        .transpose()
    }

    async fn list_batches(&self, user_id: i64) -> StoreResult<Vec<Batch>> {
        let rows = sqlx::query("SELECT * FROM batches WHERE user_id = ? ORDER BY id")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|r| {
                Ok(Batch {
                    id: r.get("id"),
                    user_id: r.get("user_id"),
                    name: r.get("name"),
                    channel_id: r.get("channel_id"),
                    status: match r.get::<String, _>("status").as_str() {
                        "pending" => BatchStatus::Pending,
                        _ => BatchStatus::Scheduled,
                    },
                    created_at: Self::from_millis(r.get("created_at"))?,
                })
            })
            .collect()
    }

    async fn update_batch_status(&self, id: i64, status: BatchStatus) -> StoreResult<()> {
        let s = match status {
            BatchStatus::Pending => "pending",
            BatchStatus::Scheduled => "scheduled",
        };
        sqlx::query("UPDATE batches SET status = ? WHERE id = ?")
            .bind(s)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn create_backup(&self, backup: Backup) -> StoreResult<()> {
        let payload = serde_json::to_string(&backup.payload)?;
        sqlx::query(
            "INSERT INTO backups (user_id, name, created_at, payload) VALUES (?, ?, ?, ?) \
             ON CONFLICT(user_id, name) DO UPDATE SET created_at = excluded.created_at, \
             payload = excluded.payload",
        )
        .bind(backup.user_id)
        .bind(&backup.name)
        .bind(Self::millis(backup.created_at))
        .bind(payload)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_backups(&self, user_id: i64) -> StoreResult<Vec<Backup>> {
        let rows = sqlx::query("SELECT * FROM backups WHERE user_id = ? ORDER BY created_at DESC")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|r| {
                let payload: String = r.get("payload");
                Ok(Backup {
                    user_id: r.get("user_id"),
                    name: r.get("name"),
                    created_at: Self::from_millis(r.get("created_at"))?,
                    payload: serde_json::from_str(&payload)?,
                })
            })
            .collect()
    }

    async fn get_backup(&self, user_id: i64, name: &str) -> StoreResult<Option<Backup>> {
        let row = sqlx::query("SELECT * FROM backups WHERE user_id = ? AND name = ?")
            .bind(user_id)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| {
            let payload: String = r.get("payload");
            Ok(Backup {
                user_id: r.get("user_id"),
                name: r.get("name"),
                created_at: Self::from_millis(r.get("created_at"))?,
                payload: serde_json::from_str(&payload)?,
            })
        })
        .transpose()
    }

    async fn get_session(&self, user_id: i64) -> StoreResult<Option<SessionRecord>> {
        let row = sqlx::query("SELECT * FROM sessions WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| {
            let state_json: String = r.get("state_json");
            Ok(SessionRecord {
                user_id: r.get("user_id"),
                state_tag: r.get("state_tag"),
                state_json: serde_json::from_str(&state_json)?,
                updated_at: Self::from_millis(r.get("updated_at"))?,
            })
        })
        .transpose()
    }

    async fn save_session(&self, session: &SessionRecord) -> StoreResult<()> {
        let state_json = serde_json::to_string(&session.state_json)?;
        sqlx::query(
            "INSERT INTO sessions (user_id, state_tag, state_json, updated_at) VALUES (?, ?, ?, ?) \
             ON CONFLICT(user_id) DO UPDATE SET state_tag = excluded.state_tag, \
             state_json = excluded.state_json, updated_at = excluded.updated_at",
        )
        .bind(session.user_id)
        .bind(&session.state_tag)
        .bind(state_json)
        .bind(Self::millis(session.updated_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_scheduling_config(&self, user_id: i64) -> StoreResult<SchedulingConfig> {
        let row = sqlx::query("SELECT * FROM scheduling_config WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(match row {
            Some(r) => SchedulingConfig {
                user_id: r.get("user_id"),
                start_hour: r.get::<i64, _>("start_hour") as u32,
                end_hour: r.get::<i64, _>("end_hour") as u32,
                interval_hours: r.get::<i64, _>("interval_hours") as u32,
            },
            None => SchedulingConfig {
                user_id,
                ..SchedulingConfig::default()
            },
        })
    }

    async fn save_scheduling_config(&self, cfg: &SchedulingConfig) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO scheduling_config (user_id, start_hour, end_hour, interval_hours) \
             VALUES (?, ?, ?, ?) \
             ON CONFLICT(user_id) DO UPDATE SET start_hour = excluded.start_hour, \
             end_hour = excluded.end_hour, interval_hours = excluded.interval_hours",
        )
        .bind(cfg.user_id)
        .bind(cfg.start_hour)
        .bind(cfg.end_hour)
        .bind(cfg.interval_hours)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_reminder_settings(&self, user_id: i64) -> StoreResult<ReminderSettings> {
        let row = sqlx::query("SELECT * FROM reminder_settings WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(r) => {
                let last_sent: Option<i64> = r.try_get("last_sent").ok().flatten();
                Ok(ReminderSettings {
                    user_id: r.get("user_id"),
                    enabled: r.get::<i64, _>("enabled") != 0,
                    threshold: r.get::<i64, _>("threshold") as u32,
                    last_sent: last_sent.map(Self::from_millis).transpose()?,
                })
            }
            None => Ok(ReminderSettings {
                user_id,
                ..ReminderSettings::default()
            }),
        }
    }

    async fn save_reminder_settings(&self, settings: &ReminderSettings) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO reminder_settings (user_id, enabled, threshold, last_sent) \
             VALUES (?, ?, ?, ?) \
             ON CONFLICT(user_id) DO UPDATE SET enabled = excluded.enabled, \
             threshold = excluded.threshold, last_sent = excluded.last_sent",
        )
        .bind(settings.user_id)
        .bind(settings.enabled as i64)
        .bind(settings.threshold)
        .bind(settings.last_sent.map(Self::millis))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_reminder_enabled(&self) -> StoreResult<Vec<ReminderSettings>> {
        let rows = sqlx::query("SELECT * FROM reminder_settings WHERE enabled = 1")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|r| {
                let last_sent: Option<i64> = r.try_get("last_sent").ok().flatten();
                Ok(ReminderSettings {
                    user_id: r.get("user_id"),
                    enabled: true,
                    threshold: r.get::<i64, _>("threshold") as u32,
                    last_sent: last_sent.map(Self::from_millis).transpose()?,
                })
            })
            .collect()
    }

    async fn init_schema(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS posts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                channel_id INTEGER NOT NULL,
                file_path TEXT NOT NULL,
                media_type TEXT NOT NULL,
                description TEXT,
                scheduled_time INTEGER,
                status TEXT NOT NULL DEFAULT 'pending',
                mode TEXT NOT NULL,
                is_recurring INTEGER NOT NULL DEFAULT 0,
                recurring_interval_hours INTEGER,
                recurring_end_date INTEGER,
                recurring_count INTEGER,
                recurring_posted_count INTEGER NOT NULL DEFAULT 0,
                batch_id INTEGER,
                retry_count INTEGER NOT NULL DEFAULT 0,
                failure_kind TEXT,
                failure_message TEXT,
                media_bundle_json TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_posts_status ON posts(status);
            CREATE INDEX IF NOT EXISTS idx_posts_user ON posts(user_id);
            CREATE INDEX IF NOT EXISTS idx_posts_scheduled_time ON posts(scheduled_time);

            CREATE TABLE IF NOT EXISTS channels (
                user_id INTEGER NOT NULL,
                channel_id INTEGER NOT NULL,
                channel_name TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                PRIMARY KEY (user_id, channel_id)
            );

            CREATE TABLE IF NOT EXISTS batches (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                channel_id INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS backups (
                user_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                payload TEXT NOT NULL,
                PRIMARY KEY (user_id, name)
            );

            CREATE TABLE IF NOT EXISTS sessions (
                user_id INTEGER PRIMARY KEY,
                state_tag TEXT NOT NULL,
                state_json TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS scheduling_config (
                user_id INTEGER PRIMARY KEY,
                start_hour INTEGER NOT NULL,
                end_hour INTEGER NOT NULL,
                interval_hours INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS reminder_settings (
                user_id INTEGER PRIMARY KEY,
                enabled INTEGER NOT NULL DEFAULT 1,
                threshold INTEGER NOT NULL DEFAULT 3,
                last_sent INTEGER
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("initialized dispatcher SQLite schema");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::AlbumManifest;

    async fn fresh_store() -> SqliteStore {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        let store = SqliteStore::new(pool);
        store.init_schema().await.unwrap();
        store
    }

    #[tokio::test]
    async fn add_post_rejects_unowned_channel() {
        let store = fresh_store().await;
        let err = store
            .add_post(1, 99, "/tmp/a.jpg", MediaKind::Photo, None, PostMode::Individual, None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AccessDenied { .. }));
    }

    #[tokio::test]
    async fn add_post_rejects_long_caption() {
        let store = fresh_store().await;
        store.add_channel(1, 10, "chan").await.unwrap();
        let caption = "x".repeat(1025);
        let err = store
            .add_post(1, 10, "/tmp/a.jpg", MediaKind::Photo, Some(&caption), PostMode::Individual, None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[tokio::test]
    async fn full_post_lifecycle() {
        let store = fresh_store().await;
        store.add_channel(1, 10, "chan").await.unwrap();
        let id = store
            .add_post(1, 10, "/tmp/a.jpg", MediaKind::Photo, Some("hi"), PostMode::Individual, None)
            .await
            .unwrap();

        let post = store.get_post(id).await.unwrap().unwrap();
        assert!(post.is_queued());

        let t = Utc::now() + chrono::Duration::hours(2);
        store.update_post_schedule(id, t).await.unwrap();
        let post = store.get_post(id).await.unwrap().unwrap();
        assert_eq!(post.status, PostStatus::Pending);
        assert!(!post.is_queued());

        store.mark_posted(id).await.unwrap();
        let post = store.get_post(id).await.unwrap().unwrap();
        assert_eq!(post.status, PostStatus::Posted);
    }

    #[tokio::test]
    async fn retry_failed_post_clears_state() {
        let store = fresh_store().await;
        store.add_channel(1, 10, "chan").await.unwrap();
        let id = store
            .add_post(1, 10, "/tmp/a.jpg", MediaKind::Photo, None, PostMode::Individual, None)
            .await
            .unwrap();
        store.update_post_schedule(id, Utc::now()).await.unwrap();
        store.increment_retry(id).await.unwrap();
        store
            .mark_failed(id, FailureKind::BotBlocked, "blocked")
            .await
            .unwrap();

        store.retry_failed_post(id).await.unwrap();
        let post = store.get_post(id).await.unwrap().unwrap();
        assert_eq!(post.status, PostStatus::Pending);
        assert!(post.scheduled_time.is_none());
        assert_eq!(post.retry_count, 0);
        assert!(post.failure_message.is_none());
    }

    #[tokio::test]
    async fn retry_failed_post_rejects_non_failed() {
        let store = fresh_store().await;
        store.add_channel(1, 10, "chan").await.unwrap();
        let id = store
            .add_post(1, 10, "/tmp/a.jpg", MediaKind::Photo, None, PostMode::Individual, None)
            .await
            .unwrap();
        assert!(store.retry_failed_post(id).await.is_err());
    }

    #[tokio::test]
    async fn list_overdue_finds_past_pending_posts() {
        let store = fresh_store().await;
        store.add_channel(1, 10, "chan").await.unwrap();
        let id = store
            .add_post(1, 10, "/tmp/a.jpg", MediaKind::Photo, None, PostMode::Individual, None)
            .await
            .unwrap();
        let past = Utc::now() - chrono::Duration::minutes(10);
        store.update_post_schedule(id, past).await.unwrap();

        let overdue = store.list_overdue(Some(1), Utc::now()).await.unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].id, id);
    }

    #[tokio::test]
    async fn album_manifest_round_trips() {
        let store = fresh_store().await;
        store.add_channel(1, 10, "chan").await.unwrap();
        let album = AlbumManifest(vec![
            ("/tmp/1.jpg".to_string(), MediaKind::Photo),
            ("/tmp/2.mp4".to_string(), MediaKind::Video),
        ]);
        let id = store
            .add_post(1, 10, "/tmp/1.jpg", MediaKind::Album, Some("caption"), PostMode::Bulk, Some(album))
            .await
            .unwrap();
        let post = store.get_post(id).await.unwrap().unwrap();
        let items = post.album.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].kind, MediaKind::Video);
    }

    #[tokio::test]
    async fn bulk_update_schedules_is_atomic() {
        let store = fresh_store().await;
        store.add_channel(1, 10, "chan").await.unwrap();
        let id1 = store
            .add_post(1, 10, "/tmp/a.jpg", MediaKind::Photo, None, PostMode::Bulk, None)
            .await
            .unwrap();
        let id2 = store
            .add_post(1, 10, "/tmp/b.jpg", MediaKind::Photo, None, PostMode::Bulk, None)
            .await
            .unwrap();
        let t1 = Utc::now() + chrono::Duration::hours(1);
        let t2 = Utc::now() + chrono::Duration::hours(2);
        store.bulk_update_schedules(&[(id1, t1), (id2, t2)]).await.unwrap();

        let p1 = store.get_post(id1).await.unwrap().unwrap();
        let p2 = store.get_post(id2).await.unwrap().unwrap();
        assert!(p1.scheduled_time.is_some());
        assert!(p2.scheduled_time.is_some());
    }

    #[tokio::test]
    async fn reminder_settings_default_to_spec_values() {
        let store = fresh_store().await;
        let settings = store.get_reminder_settings(1).await.unwrap();
        assert!(settings.enabled);
        assert_eq!(settings.threshold, 3);
    }

    #[tokio::test]
    async fn scheduling_config_defaults_to_10_20_2() {
        let store = fresh_store().await;
        let cfg = store.get_scheduling_config(1).await.unwrap();
        assert_eq!((cfg.start_hour, cfg.end_hour, cfg.interval_hours), (10, 20, 2));
    }

    #[tokio::test]
    async fn set_recurrence_marks_the_post_recurring() {
        let store = fresh_store().await;
        store.add_channel(1, 10, "chan").await.unwrap();
        let id = store
            .add_post(1, 10, "/tmp/a.jpg", MediaKind::Photo, None, PostMode::Recurring, None)
            .await
            .unwrap();
        let end = Utc::now() + chrono::Duration::days(30);
        store.set_recurrence(id, 6, Some(end), Some(10)).await.unwrap();

        let post = store.get_post(id).await.unwrap().unwrap();
        let recurrence = post.recurrence.expect("post should be recurring");
        assert_eq!(recurrence.interval_hours, 6);
        assert_eq!(recurrence.max_count, Some(10));
        assert_eq!(recurrence.posted_count, 0);
    }

    #[tokio::test]
    async fn increment_recurring_posted_count_bumps_and_returns_new_value() {
        let store = fresh_store().await;
        store.add_channel(1, 10, "chan").await.unwrap();
        let id = store
            .add_post(1, 10, "/tmp/a.jpg", MediaKind::Photo, None, PostMode::Recurring, None)
            .await
            .unwrap();
        store.set_recurrence(id, 6, None, None).await.unwrap();

        let count = store.increment_recurring_posted_count(id).await.unwrap();
        assert_eq!(count, 1);
        let count = store.increment_recurring_posted_count(id).await.unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn reschedule_from_today_sets_times_inside_the_window() {
        let store = fresh_store().await;
        store.add_channel(1, 10, "chan").await.unwrap();
        for _ in 0..3 {
            store
                .add_post(1, 10, "/tmp/a.jpg", MediaKind::Photo, None, PostMode::Bulk, None)
                .await
                .unwrap();
        }

        let cfg = SchedulingConfig {
            user_id: 1,
            start_hour: 10,
            end_hour: 20,
            interval_hours: 2,
        };
        let touched = store
            .reschedule_from_today(1, &cfg, chrono_tz::Europe::Kiev, None)
            .await
            .unwrap();
        assert_eq!(touched, 3);

        let posts = store.list_pending(Some(1), None, false).await.unwrap();
        for post in posts {
            let t = post.scheduled_time.expect("rescheduled post has a time");
            let local = t.with_timezone(&chrono_tz::Europe::Kiev);
            use chrono::Timelike;
            assert!(local.hour() >= 10 && local.hour() < 20);
        }
    }
}
