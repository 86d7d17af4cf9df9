//! C3: ScheduleCalc — pure, deterministic slot-placement arithmetic (§4.2).
//!
//! Grounded on `examples/original_source/bot/scheduler.py`'s `ScheduleCalculator` equivalents
//! (`_calculate_fixed_schedule`, `_calculate_next_available_slot`,
//! `_calculate_even_distribution`) for the exact arithmetic; kept as a standalone,
//! synchronously-testable module per the teacher's separation of pure calculation from I/O
//! (`fc-scheduler`'s `poller.rs` logic vs `dispatcher.rs` I/O).

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike};
use chrono_tz::Tz;

use crate::window::Window;

fn at(tz: Tz, date: chrono::NaiveDate, hour: u32, minute: u32) -> DateTime<Tz> {
    tz.from_local_datetime(&date.and_hms_opt(hour, minute, 0).expect("valid h:m"))
        .single()
        .expect("unambiguous local time")
}

fn next_day_at(current: DateTime<Tz>, hour: u32) -> DateTime<Tz> {
    let tz = current.timezone();
    at(tz, current.date_naive() + Duration::days(1), hour, 0)
}

/// §4.2.1 fixed-interval schedule. `anchor` is the caller-supplied base timestamp; when the
/// spec says "anchor omitted", pass the clock's current time as `anchor` — the first slot is
/// always `anchor.date + 1` at `start_hour`.
///
/// P1: output has length `num_posts`, strictly increasing, every element's hour in
/// `[start_hour, end_hour)`; day boundaries occur only when `current + interval` would
/// exceed `end_hour`.
pub fn fixed_interval(window: Window, num_posts: usize, anchor: DateTime<Tz>) -> Vec<DateTime<Tz>> {
    let tz = anchor.timezone();
    let mut date = anchor.date_naive() + Duration::days(1);
    let mut hour = window.start_hour;
    let mut out = Vec::with_capacity(num_posts);

    while out.len() < num_posts {
        out.push(at(tz, date, hour, 0));
        hour += window.interval_hours;
        if hour >= window.end_hour {
            date += Duration::days(1);
            hour = window.start_hour;
        }
    }
    out
}

/// Rounds `offset` up to the next multiple of `interval`, per §4.2.2 step 4.
fn round_up_to_multiple(offset: u32, interval: u32) -> u32 {
    if interval == 0 {
        return offset;
    }
    offset.div_ceil(interval) * interval
}

/// §4.2.2 next-available-slot alignment, continuing into a full `fixed_interval`-style run
/// for `num_posts` slots once the first aligned slot is found.
///
/// - `latest`: `ScheduleCalc::latest_scheduled_time(user)`, or `None` if absent (step 1 uses
///   `now` in that case).
/// - P2: never returns a time earlier than `max(latest + interval, now)` and every hour lies
///   in `[start_hour, end_hour)`.
pub fn next_available_slot(
    window: Window,
    num_posts: usize,
    latest: Option<DateTime<Tz>>,
    now: DateTime<Tz>,
) -> Vec<DateTime<Tz>> {
    let l = latest.unwrap_or(now);
    let mut c = l + Duration::hours(window.interval_hours as i64);

    if c.hour() < window.start_hour || c.hour() >= window.end_hour {
        c = next_day_at(c, window.start_hour);
    } else {
        let offset = c.hour() - window.start_hour;
        let rounded = round_up_to_multiple(offset, window.interval_hours);
        if window.start_hour + rounded >= window.end_hour {
            c = next_day_at(c, window.start_hour);
        } else {
            c = at(c.timezone(), c.date_naive(), window.start_hour + rounded, 0);
        }
    }

    let mut out = Vec::with_capacity(num_posts);
    let mut date = c.date_naive();
    let mut hour = c.hour();
    while out.len() < num_posts {
        out.push(at(c.timezone(), date, hour, 0));
        hour += window.interval_hours;
        if hour >= window.end_hour {
            date += Duration::days(1);
            hour = window.start_hour;
        }
    }
    out
}

/// §4.2.3 even-distribution schedule. `interval` mirrors `fixed_interval`'s day-packing when
/// `Some`; `None` distributes `num_posts` evenly across each day's window at minute
/// resolution.
///
/// P3: with `interval = None` and `num_posts > 1`, every timestamp lies within
/// `[start_hour:00, end_hour:59]`, daily packing never exceeds `end_hour - start_hour + 1`
/// posts, and the sequence is monotonically increasing.
pub fn even_distribution(
    window: Window,
    num_posts: usize,
    anchor: DateTime<Tz>,
    interval: Option<u32>,
) -> Vec<DateTime<Tz>> {
    if let Some(i) = interval {
        let day_packed = Window {
            interval_hours: i.max(1),
            ..window
        };
        return fixed_interval(day_packed, num_posts, anchor);
    }

    let tz = anchor.timezone();
    let mut date = anchor.date_naive() + Duration::days(1);
    let daily_capacity = (window.span_hours() + 1) as usize;
    let mut remaining = num_posts;
    let mut out = Vec::with_capacity(num_posts);

    while remaining > 0 {
        let posts_today = remaining.min(daily_capacity);
        if posts_today == 1 {
            out.push(at(tz, date, window.start_hour, 0));
        } else {
            let total_minutes = (window.span_hours() * 60) as f64;
            let interval_minutes = total_minutes / (posts_today - 1) as f64;
            for i in 0..posts_today {
                let offset = (interval_minutes * i as f64).round() as u32;
                let mut hour = window.start_hour + offset / 60;
                let mut minute = offset % 60;
                if hour >= window.end_hour {
                    hour = window.end_hour;
                    minute = 59;
                }
                out.push(at(tz, date, hour, minute));
            }
        }
        remaining -= posts_today;
        date += Duration::days(1);
    }
    out
}

/// §4.2.4 custom date schedule: `start + k*interval_hours` for `k in [0, num_posts)`. Window
/// membership is enforced by the caller (the parser), not here.
pub fn custom_date_schedule(
    start: DateTime<Tz>,
    interval_hours: u32,
    num_posts: usize,
) -> Vec<DateTime<Tz>> {
    (0..num_posts)
        .map(|k| start + Duration::hours(interval_hours as i64 * k as i64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Europe::Kiev;

    fn anchor(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Tz> {
        Kiev.with_ymd_and_hms(y, mo, d, h, mi, 0).single().unwrap()
    }

    #[test]
    fn scenario_1_fixed_interval_five_posts() {
        let window = Window::new(10, 20, 2).unwrap();
        let out = fixed_interval(window, 5, anchor(2025, 7, 24, 9, 0));
        let expected = [
            anchor(2025, 7, 25, 10, 0),
            anchor(2025, 7, 25, 12, 0),
            anchor(2025, 7, 25, 14, 0),
            anchor(2025, 7, 25, 16, 0),
            anchor(2025, 7, 25, 18, 0),
        ];
        assert_eq!(out, expected);
    }

    #[test]
    fn scenario_2_fixed_interval_seven_posts_spills_to_next_day() {
        let window = Window::new(10, 20, 2).unwrap();
        let out = fixed_interval(window, 7, anchor(2025, 7, 24, 9, 0));
        let expected = [
            anchor(2025, 7, 25, 10, 0),
            anchor(2025, 7, 25, 12, 0),
            anchor(2025, 7, 25, 14, 0),
            anchor(2025, 7, 25, 16, 0),
            anchor(2025, 7, 25, 18, 0),
            anchor(2025, 7, 26, 10, 0),
            anchor(2025, 7, 26, 12, 0),
        ];
        assert_eq!(out, expected);
    }

    #[test]
    fn fixed_interval_is_strictly_increasing_and_in_window() {
        let window = Window::new(9, 22, 3).unwrap();
        let out = fixed_interval(window, 30, anchor(2025, 1, 1, 0, 0));
        for pair in out.windows(2) {
            assert!(pair[0] < pair[1]);
        }
        for ts in &out {
            assert!(ts.hour() >= 9 && ts.hour() < 22);
        }
    }

    #[test]
    fn scenario_3_next_available_slot() {
        let window = Window::new(10, 20, 2).unwrap();
        let latest = anchor(2025, 7, 25, 16, 0);
        let now = anchor(2025, 7, 25, 8, 0);
        let out = next_available_slot(window, 2, Some(latest), now);
        assert_eq!(out[0], anchor(2025, 7, 25, 18, 0));
        assert_eq!(out[1], anchor(2025, 7, 26, 10, 0));
    }

    #[test]
    fn next_available_slot_never_earlier_than_latest_plus_interval() {
        let window = Window::new(10, 20, 2).unwrap();
        let latest = anchor(2025, 3, 3, 19, 0);
        let now = anchor(2025, 3, 3, 7, 0);
        let out = next_available_slot(window, 1, Some(latest), now);
        assert!(out[0] >= latest + Duration::hours(2));
        assert!(out[0].hour() >= 10 && out[0].hour() < 20);
    }

    #[test]
    fn next_available_slot_falls_back_to_now_without_latest() {
        let window = Window::new(10, 20, 2).unwrap();
        let now = anchor(2025, 3, 3, 7, 0);
        let out = next_available_slot(window, 1, None, now);
        assert!(out[0] >= now + Duration::hours(2));
    }

    #[test]
    fn even_distribution_packs_within_window_and_increases() {
        let window = Window::new(10, 20, 2).unwrap();
        let out = even_distribution(window, 25, anchor(2025, 6, 1, 0, 0), None);
        for pair in out.windows(2) {
            assert!(pair[0] < pair[1]);
        }
        for ts in &out {
            assert!(ts.hour() >= 10 && ts.hour() <= 20);
            if ts.hour() == 20 {
                assert_eq!(ts.minute(), 59);
            }
        }
    }

    #[test]
    fn even_distribution_single_post_uses_start_hour() {
        let window = Window::new(10, 20, 2).unwrap();
        let out = even_distribution(window, 1, anchor(2025, 6, 1, 0, 0), None);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].hour(), 10);
    }

    #[test]
    fn even_distribution_with_interval_day_packs_like_fixed() {
        let window = Window::new(10, 20, 2).unwrap();
        let out = even_distribution(window, 7, anchor(2025, 7, 24, 9, 0), Some(2));
        assert_eq!(out, fixed_interval(window, 7, anchor(2025, 7, 24, 9, 0)));
    }

    #[test]
    fn custom_date_schedule_emits_evenly_spaced_timestamps() {
        let start = anchor(2025, 8, 1, 10, 0);
        let out = custom_date_schedule(start, 4, 3);
        assert_eq!(out[0], start);
        assert_eq!(out[1], start + Duration::hours(4));
        assert_eq!(out[2], start + Duration::hours(8));
    }
}
