//! C3: ScheduleCalc — pure functions computing schedule time sequences (§4.2), plus the
//! input-token parsers §4.2.5 requires.

mod calc;
mod error;
mod parse;
mod window;

pub use calc::{custom_date_schedule, even_distribution, fixed_interval, next_available_slot};
pub use error::{ScheduleError, ScheduleResult};
pub use parse::{
    parse_custom_date_request, parse_date, parse_future_datetime, parse_hour, parse_interval,
    parse_time, parse_window_tokens, tokenize_rejecting_channel_markers,
};
pub use window::Window;
