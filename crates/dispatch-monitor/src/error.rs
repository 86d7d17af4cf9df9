use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("store error: {0}")]
    Store(#[from] dispatch_store::StoreError),
}

pub type MonitorResult<T> = Result<T, MonitorError>;
