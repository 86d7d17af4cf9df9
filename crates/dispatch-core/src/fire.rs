//! §4.5 Dispatcher fire path, per post. Grounded on
//! `examples/original_source/bot/scheduler.py::_post_to_channel` for the pre-delay,
//! status/ACL re-check, and per-attempt retry loop shape.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dispatch_classify::{ErrorClassifier, FailureKind};
use dispatch_store::{MediaKind, Post, PostStatus, Recurrence, Store};
use tracing::{info, warn};

use crate::capability::{AlbumMember, MediaStore, Publisher};
use crate::recurrence::{self, RecurrenceOutcome};
use crate::sleeper::Sleeper;
use crate::templates;

/// §4.5: "MAX_RETRIES = 3".
pub const MAX_RETRIES: u32 = 3;
/// §4.5 step 1: "sleep a short pre-delay (~1s) to smooth API burst".
pub const PRE_FIRE_DELAY: Duration = Duration::from_secs(1);

/// Everything one fire of one post needs. Shared (via `Arc`) across every spawned fire task.
pub struct DispatchContext {
    pub store: Arc<dyn Store>,
    pub publisher: Arc<dyn Publisher>,
    pub media: Arc<dyn MediaStore>,
    pub classifier: ErrorClassifier,
    pub sleeper: Arc<dyn Sleeper>,
}

/// What became of one fire attempt, reported back to whatever spawned it (the Dispatcher's
/// timer task, or a test). Recurrence re-registration is the caller's job: `fire` persists
/// the next `scheduled_time` but does not itself own the timer table.
#[derive(Debug, Clone, PartialEq)]
pub enum FireOutcome {
    /// Post was gone, already terminal, or the store was unreachable; nothing to do.
    Skipped(&'static str),
    Posted,
    RecurringContinued(chrono::DateTime<Utc>),
    Failed(FailureKind),
}

/// Runs the full fire path for `post_id`, looping over retries per §4.5 step 7 ("go to step
/// 2") until the post reaches a terminal outcome or the retry budget is exhausted.
pub async fn fire(ctx: &DispatchContext, post_id: i64) -> FireOutcome {
    ctx.sleeper.sleep(PRE_FIRE_DELAY).await;

    loop {
        let post = match ctx.store.get_post(post_id).await {
            Ok(Some(post)) => post,
            Ok(None) => return FireOutcome::Skipped("post not found"),
            Err(error) => {
                warn!(post_id, %error, "store unreachable during fire");
                return FireOutcome::Skipped("store error");
            }
        };

        if post.status != PostStatus::Pending {
            return FireOutcome::Skipped("post no longer pending");
        }

        if !ctx
            .store
            .user_has_channel(post.user_id, post.channel_id)
            .await
            .unwrap_or(false)
        {
            let _ = ctx
                .store
                .mark_failed(post_id, FailureKind::AccessDenied, "channel access denied")
                .await;
            ctx.publisher
                .notify_operator(post.user_id, &templates::access_denied())
                .await;
            return FireOutcome::Failed(FailureKind::AccessDenied);
        }

        if !media_present(ctx, &post).await {
            let _ = ctx
                .store
                .mark_failed(post_id, FailureKind::MediaMissing, "file not found")
                .await;
            ctx.publisher
                .notify_operator(post.user_id, &templates::media_missing())
                .await;
            return FireOutcome::Failed(FailureKind::MediaMissing);
        }

        let result = publish(ctx, &post).await;

        match result {
            Ok(()) => return on_success(ctx, &post).await,
            Err(error) => {
                let classification = ctx.classifier.classify(&error, post.retry_count);
                if classification.retryable && post.retry_count < MAX_RETRIES {
                    let attempt = match ctx.store.increment_retry(post_id).await {
                        Ok(attempt) => attempt,
                        Err(error) => {
                            warn!(post_id, %error, "failed to record retry attempt");
                            return FireOutcome::Skipped("store error");
                        }
                    };
                    ctx.publisher
                        .notify_operator(
                            post.user_id,
                            &templates::retry_scheduled(attempt, classification.wait),
                        )
                        .await;
                    ctx.sleeper.sleep(classification.wait).await;
                    continue;
                }

                let _ = ctx
                    .store
                    .mark_failed(post_id, classification.kind, &classification.message)
                    .await;
                ctx.publisher
                    .notify_operator(
                        post.user_id,
                        &templates::permanent_failure(classification.operator_guidance),
                    )
                    .await;
                return FireOutcome::Failed(classification.kind);
            }
        }
    }
}

/// P10: for an album, every child file must exist or the whole album is refused without
/// publishing any item; for a single-item post, only `post.file_path` is checked.
async fn media_present(ctx: &DispatchContext, post: &Post) -> bool {
    if post.media_kind == MediaKind::Album {
        let items = post.album.as_deref().unwrap_or(&[]);
        for item in items {
            if !ctx.media.exists(&item.file_path).await {
                return false;
            }
        }
        true
    } else {
        ctx.media.exists(&post.file_path).await
    }
}

async fn publish(ctx: &DispatchContext, post: &Post) -> Result<(), dispatch_classify::PublishError> {
    if post.media_kind == MediaKind::Album {
        let items: Vec<AlbumMember> = post
            .album
            .clone()
            .unwrap_or_default()
            .into_iter()
            .map(|item| (item.file_path, item.kind))
            .collect();
        ctx.publisher
            .publish_album(post.channel_id, &items, post.caption.as_deref())
            .await
    } else {
        ctx.publisher
            .publish_single(post.channel_id, post.media_kind, &post.file_path, post.caption.as_deref())
            .await
    }
}

async fn on_success(ctx: &DispatchContext, post: &Post) -> FireOutcome {
    let Some(recurrence) = &post.recurrence else {
        let _ = ctx.store.mark_posted(post.id).await;
        ctx.publisher
            .notify_operator(post.user_id, &templates::success(false))
            .await;
        return FireOutcome::Posted;
    };

    let posted_count = match ctx.store.increment_recurring_posted_count(post.id).await {
        Ok(count) => count,
        Err(error) => {
            warn!(post_id = post.id, %error, "failed to bump recurring posted_count");
            return FireOutcome::Skipped("store error");
        }
    };
    let bumped = Recurrence {
        posted_count,
        ..recurrence.clone()
    };

    match recurrence::evaluate(&bumped, Utc::now()) {
        RecurrenceOutcome::Terminate => {
            let _ = ctx.store.mark_posted(post.id).await;
            info!(post_id = post.id, "recurring series terminated");
            ctx.publisher
                .notify_operator(post.user_id, &templates::success(true))
                .await;
            FireOutcome::Posted
        }
        RecurrenceOutcome::Continue(next) => {
            let _ = ctx.store.update_post_schedule(post.id, next).await;
            ctx.publisher
                .notify_operator(post.user_id, &templates::success(true))
                .await;
            FireOutcome::RecurringContinued(next)
        }
    }
}
