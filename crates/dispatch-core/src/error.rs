use thiserror::Error;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("store error: {0}")]
    Store(#[from] dispatch_store::StoreError),
}

pub type DispatchResult<T> = Result<T, DispatchError>;
