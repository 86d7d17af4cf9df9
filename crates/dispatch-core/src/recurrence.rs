//! §4.6 Recurrence Engine: pure termination/next-occurrence arithmetic, kept separate from
//! the I/O-bound fire path so it can be unit tested without a `Store`.

use chrono::{DateTime, Duration, Utc};
use dispatch_store::Recurrence;

/// Outcome of evaluating one successful publish of a recurring post, after `posted_count`
/// has already been bumped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecurrenceOutcome {
    /// Any-of termination condition met (I4); the series should be marked `posted` (final).
    Terminate,
    /// The series continues; register the next fire at this instant.
    Continue(DateTime<Utc>),
}

/// §4.6 steps 2-4. `recurrence` must already reflect the post-increment `posted_count`
/// (callers bump it via `Store::increment_recurring_posted_count` before calling this).
pub fn evaluate(recurrence: &Recurrence, now: DateTime<Utc>) -> RecurrenceOutcome {
    if recurrence.should_terminate(now) {
        return RecurrenceOutcome::Terminate;
    }
    RecurrenceOutcome::Continue(now + Duration::hours(recurrence.interval_hours as i64))
}
