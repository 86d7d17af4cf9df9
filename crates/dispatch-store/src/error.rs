use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("post {0} not found")]
    PostNotFound(i64),

    #[error("channel access denied for user {user_id} channel {channel_id}")]
    AccessDenied { user_id: i64, channel_id: i64 },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("post {0} is in a terminal state")]
    Terminal(i64),

    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;
