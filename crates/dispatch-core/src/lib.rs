//! C6: Dispatcher — owns the in-memory timer table, runs the fire path (§4.5), and drives
//! recurrence (§4.6). Depends on the `Publisher`/`MediaStore`/`Acl` capability traits (§6)
//! rather than a concrete transport.

mod capability;
mod dispatcher;
mod error;
mod fire;
mod recurrence;
mod sleeper;
mod templates;
mod timer;

pub use capability::{AlbumMember, Acl, MediaStore, Publisher};
pub use dispatcher::{Dispatcher, LATE_REGISTRATION_EPSILON};
pub use error::{DispatchError, DispatchResult};
pub use fire::{fire, DispatchContext, FireOutcome, MAX_RETRIES, PRE_FIRE_DELAY};
pub use recurrence::{evaluate as evaluate_recurrence, RecurrenceOutcome};
pub use sleeper::{RecordingSleeper, Sleeper, TokioSleeper};
pub use templates as notification_templates;
