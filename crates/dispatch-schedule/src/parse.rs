//! §4.2.5 input parsing rules. All parsers operate on whitespace-split tokens and reject with
//! a human-readable diagnostic, centralizing what the teacher's design notes (§9) call
//! "ad-hoc parsing scattered across handlers" into one place with unit tests over string
//! fixtures.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Timelike};
use chrono_tz::Tz;

use crate::error::{invalid, ScheduleError, ScheduleResult};
use crate::window::Window;

/// Splits `input` on whitespace and rejects any token matching the reserved `@channel`
/// marker, which front-end commands use for a different purpose and must never be accepted
/// as a schedule parameter.
pub fn tokenize_rejecting_channel_markers(input: &str) -> ScheduleResult<Vec<&str>> {
    let tokens: Vec<&str> = input.split_whitespace().collect();
    for token in &tokens {
        if token.starts_with('@') {
            return invalid(format!(
                "'{token}' looks like a channel marker (@channel), not a schedule value"
            ));
        }
    }
    Ok(tokens)
}

/// Parses an hour token as `0 <= hour <= 23`.
pub fn parse_hour(token: &str) -> ScheduleResult<u32> {
    let hour: i64 = token
        .parse()
        .map_err(|_| ScheduleError::Invalid(format!("'{token}' is not a valid hour")))?;
    if !(0..=23).contains(&hour) {
        return invalid(format!("hour {hour} out of range 0-23"));
    }
    Ok(hour as u32)
}

/// Parses an interval token as `1 <= interval <= 24`.
pub fn parse_interval(token: &str) -> ScheduleResult<u32> {
    let interval: i64 = token
        .parse()
        .map_err(|_| ScheduleError::Invalid(format!("'{token}' is not a valid interval")))?;
    if !(1..=24).contains(&interval) {
        return invalid(format!("interval {interval} out of range 1-24"));
    }
    Ok(interval as u32)
}

/// Parses `start end interval` (three whitespace-separated tokens) into a validated `Window`.
pub fn parse_window_tokens(input: &str) -> ScheduleResult<Window> {
    let tokens = tokenize_rejecting_channel_markers(input)?;
    let [start, end, interval] = tokens.as_slice() else {
        return invalid(format!(
            "expected 3 values (start end interval), got {}",
            tokens.len()
        ));
    };
    Window::new(parse_hour(start)?, parse_hour(end)?, parse_interval(interval)?)
}

/// Parses a `YYYY-MM-DD` date.
pub fn parse_date(token: &str) -> ScheduleResult<NaiveDate> {
    NaiveDate::parse_from_str(token, "%Y-%m-%d")
        .map_err(|_| ScheduleError::Invalid(format!("'{token}' is not a valid date (expected YYYY-MM-DD)")))
}

/// Parses an `HH:MM` time.
pub fn parse_time(token: &str) -> ScheduleResult<NaiveTime> {
    NaiveTime::parse_from_str(token, "%H:%M")
        .map_err(|_| ScheduleError::Invalid(format!("'{token}' is not a valid time (expected HH:MM)")))
}

/// Parses a `YYYY-MM-DD HH:MM` pair into a zoned timestamp and validates it is strictly in
/// the future relative to `now` (§4.2.5: "future-dated validation").
pub fn parse_future_datetime(
    date_token: &str,
    time_token: &str,
    tz: Tz,
    now: DateTime<Tz>,
) -> ScheduleResult<DateTime<Tz>> {
    let date = parse_date(date_token)?;
    let time = parse_time(time_token)?;
    let naive = date.and_time(time);
    let zoned = tz
        .from_local_datetime(&naive)
        .single()
        .ok_or_else(|| ScheduleError::Invalid(format!("'{date_token} {time_token}' is ambiguous or nonexistent in this timezone")))?;
    if zoned <= now {
        return invalid(format!("'{date_token} {time_token}' must be in the future"));
    }
    Ok(zoned)
}

/// Parses a custom-date schedule request: `YYYY-MM-DD HH:MM interval count`, validating the
/// resulting start time falls inside `window` (§4.2.4: "Must fall inside [start_hour,
/// end_hour) of operator's default scheduling window").
pub fn parse_custom_date_request(
    input: &str,
    window: &Window,
    tz: Tz,
    now: DateTime<Tz>,
) -> ScheduleResult<(DateTime<Tz>, u32, usize)> {
    let tokens = tokenize_rejecting_channel_markers(input)?;
    let [date, time, interval, count] = tokens.as_slice() else {
        return invalid(format!(
            "expected 4 values (date time interval count), got {}",
            tokens.len()
        ));
    };
    let start = parse_future_datetime(date, time, tz, now)?;
    let interval_hours = parse_interval(interval)?;
    let count: i64 = count
        .parse()
        .map_err(|_| ScheduleError::Invalid(format!("'{count}' is not a valid post count")))?;
    if count <= 0 {
        return invalid("post count must be positive");
    }
    if start.hour() < window.start_hour || start.hour() >= window.end_hour {
        return invalid(format!(
            "start hour {} falls outside the scheduling window [{}, {})",
            start.hour(),
            window.start_hour,
            window.end_hour
        ));
    }
    Ok((start, interval_hours, count as usize))
}
