//! External capability traits the core depends on (§6): `Publisher`, `MediaStore`, `Acl`.
//! Grounded on `fc-scheduler`'s `QueuePublisher` trait shape (a small `async_trait` the
//! scheduler depends on without knowing the transport).

use async_trait::async_trait;
use dispatch_classify::PublishError;
use dispatch_store::MediaKind;

/// One album member ready to publish: its file path and kind.
pub type AlbumMember = (String, MediaKind);

/// The platform-facing publish capability (§4.3, §6). `Dispatcher` depends on this trait, not
/// a concrete transport, so it can be exercised against a fake in tests.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish_single(
        &self,
        channel_id: i64,
        kind: MediaKind,
        file_path: &str,
        caption: Option<&str>,
    ) -> Result<(), PublishError>;

    async fn publish_album(
        &self,
        channel_id: i64,
        items: &[AlbumMember],
        caption_on_first: Option<&str>,
    ) -> Result<(), PublishError>;

    /// Best-effort; failures here are logged, never escalated into a post's failure state
    /// (§6: "used for success/failure notifications; best-effort").
    async fn notify_operator(&self, user_id: i64, text: &str);
}

/// File storage for uploaded media (§6). `save`/`open` are used by SessionFSM ingest;
/// `exists`/`delete`/`sweep` are used by the fire path and Monitor's cleanup job.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn exists(&self, file_path: &str) -> bool;
    async fn delete(&self, file_path: &str) -> std::io::Result<()>;
    /// Removes files older than `older_than_secs` under the store's root, plus any directory
    /// left empty by the sweep. Returns the number of files removed.
    async fn sweep(&self, older_than_secs: u64) -> std::io::Result<u64>;
}

/// Channel ownership capability (§6). Implemented directly by any `Store`, since channel
/// registration already lives there; kept as its own trait because the fire path's re-check
/// is a distinct concern from Store's general CRUD surface.
#[async_trait]
pub trait Acl: Send + Sync {
    async fn user_has_channel(&self, user_id: i64, channel_id: i64) -> bool;
}

#[async_trait]
impl<S: dispatch_store::Store + ?Sized> Acl for S {
    async fn user_has_channel(&self, user_id: i64, channel_id: i64) -> bool {
        dispatch_store::Store::user_has_channel(self, user_id, channel_id)
            .await
            .unwrap_or(false)
    }
}
