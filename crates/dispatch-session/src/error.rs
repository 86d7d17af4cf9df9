use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("store error: {0}")]
    Store(#[from] dispatch_store::StoreError),

    #[error("session state corrupt for user {user_id}: {reason}")]
    Corrupt { user_id: i64, reason: String },

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type SessionResult<T> = Result<T, SessionError>;
