//! C2: Store — durable CRUD over posts, channels, batches, backups, sessions, reminder
//! settings, and scheduling config (§4.1). `SqliteStore` is the reference implementation;
//! `Store` is the trait the rest of the workspace depends on.

pub mod entity;
pub mod error;
pub mod sqlite;
pub mod store;

pub use entity::{
    AlbumItem, Backup, Batch, BatchStatus, Channel, MediaKind, Post, PostMode, PostStatus,
    Recurrence, ReminderSettings, SchedulingConfig, SessionRecord,
};
pub use error::{StoreError, StoreResult};
pub use sqlite::SqliteStore;
pub use store::{AlbumManifest, Store};
