//! Wall-clock adapter and UTC calendar helpers.
//!
//! [`SystemClock`] implements the [`Clock`] port from `std::time::SystemTime`.
//! The helpers convert between epoch days and civil dates (proleptic
//! Gregorian, UTC) without pulling in a calendar crate; both the NMEA
//! reader and the status display need them.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::app::ports::Clock;

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Host wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(d) => i64::try_from(d.as_millis()).unwrap_or(i64::MAX),
            // Clock set before 1970.
            Err(e) => -i64::try_from(e.duration().as_millis()).unwrap_or(i64::MAX),
        }
    }
}

/// Days since 1970-01-01 for a civil date.
pub fn days_from_civil(year: i32, month: u32, day: u32) -> i64 {
    let y = i64::from(year) - i64::from(month <= 2);
    let era = y.div_euclid(400);
    let yoe = y - era * 400;
    let m = i64::from(month);
    let doy = (153 * (if m > 2 { m - 3 } else { m + 9 }) + 2) / 5 + i64::from(day) - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

/// Civil date `(year, month, day)` for days since 1970-01-01.
pub fn civil_from_days(days: i64) -> (i32, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let year = (yoe + era * 400 + i64::from(month <= 2)) as i32;
    (year, month, day)
}

/// Epoch milliseconds for a UTC date and time of day.
pub fn epoch_millis(year: i32, month: u32, day: u32, secs_of_day: u32, millis: u32) -> i64 {
    days_from_civil(year, month, day) * MILLIS_PER_DAY
        + i64::from(secs_of_day) * 1000
        + i64::from(millis)
}

/// `yyyy-MM-dd HH:mm:ss` in UTC.
pub fn format_utc(epoch_ms: i64) -> String {
    let days = epoch_ms.div_euclid(MILLIS_PER_DAY);
    let secs = epoch_ms.rem_euclid(MILLIS_PER_DAY) / 1000;
    let (y, mo, d) = civil_from_days(days);
    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
        y,
        mo,
        d,
        secs / 3600,
        (secs / 60) % 60,
        secs % 60
    )
}
