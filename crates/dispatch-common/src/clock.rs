//! C1: Clock — current time in the configured local zone, isolated for testability.

use chrono::{DateTime, TimeZone};
use chrono_tz::Tz;

/// Returns the current time in a configured zone. Production code uses `SystemClock`;
/// tests substitute `FixedClock` to make fire paths and reconciliation deterministic.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Tz>;
    fn zone(&self) -> Tz;
}

/// Wall-clock time projected into `zone`.
#[derive(Debug, Clone)]
pub struct SystemClock {
    zone: Tz,
}

impl SystemClock {
    pub fn new(zone: Tz) -> Self {
        Self { zone }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Tz> {
        chrono::Utc::now().with_timezone(&self.zone)
    }

    fn zone(&self) -> Tz {
        self.zone
    }
}

/// A clock pinned to a fixed instant, for deterministic tests of scheduling and
/// reconciliation logic.
#[derive(Debug, Clone)]
pub struct FixedClock {
    at: DateTime<Tz>,
}

impl FixedClock {
    pub fn new(at: DateTime<Tz>) -> Self {
        Self { at }
    }

    pub fn from_ymd_hms(zone: Tz, y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> Self {
        let at = zone
            .with_ymd_and_hms(y, mo, d, h, mi, s)
            .single()
            .expect("unambiguous fixture timestamp");
        Self { at }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Tz> {
        self.at
    }

    fn zone(&self) -> Tz {
        self.at.timezone()
    }
}

/// Parses an IANA zone name, falling back to the spec default (`Europe/Kiev`) on error.
pub fn zone_or_default(name: &str) -> Tz {
    name.parse().unwrap_or(chrono_tz::Europe::Kiev)
}
