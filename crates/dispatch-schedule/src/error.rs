use thiserror::Error;

/// Returned by every parser and calculator in this crate. Parser errors carry a
/// human-readable diagnostic, per spec §4.2.5 ("MUST reject with a human-readable
/// diagnostic").
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("{0}")]
    Invalid(String),
}

pub type ScheduleResult<T> = Result<T, ScheduleError>;

pub(crate) fn invalid<T>(msg: impl Into<String>) -> ScheduleResult<T> {
    Err(ScheduleError::Invalid(msg.into()))
}
