//! Local-day arithmetic in the reference time zone.
//!
//! Day boundaries are derived from the zone's rules on every call, never from
//! a fixed 24-hour offset, so DST transitions yield 23h and 25h days.

use crate::errors::RolloverError;
use crate::models::DayWindow;
use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use std::time::Duration;

/// Format accepted for manually supplied target dates.
pub const TARGET_DATE_FORMAT: &str = "%Y-%m-%d";

/// Granularity used to find the first valid instant after a skipped midnight.
const DST_GAP_PROBE_MINUTES: i64 = 15;

/// Longest skipped local interval searched before giving up.
const MAX_DST_GAP_HOURS: i64 = 4;

/// Parse a `yyyy-mm-dd` calendar date.
///
/// Rejects unpadded or otherwise non-canonical input such as `2026-1-5`.
pub fn parse_target_date(value: &str) -> Result<NaiveDate, RolloverError> {
    let date = NaiveDate::parse_from_str(value, TARGET_DATE_FORMAT).map_err(|e| {
        RolloverError::InvalidDate(format!("expected yyyy-mm-dd, got '{}': {}", value, e))
    })?;

    if date.format(TARGET_DATE_FORMAT).to_string() != value {
        return Err(RolloverError::InvalidDate(format!(
            "expected yyyy-mm-dd, got '{}'",
            value
        )));
    }

    Ok(date)
}

/// Calendar date of `now` in `tz`.
pub fn local_date(now: DateTime<Utc>, tz: Tz) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

/// First absolute instant of `date` in `tz`.
///
/// When midnight falls inside a DST gap the day begins at the first local
/// time that exists. An ambiguous midnight resolves to its earlier instant.
pub fn start_of_local_day(date: NaiveDate, tz: Tz) -> Result<DateTime<Utc>, RolloverError> {
    let midnight = date.and_time(NaiveTime::MIN);
    let limit = midnight
        .checked_add_signed(TimeDelta::hours(MAX_DST_GAP_HOURS))
        .unwrap_or(midnight);

    let mut probe: Option<NaiveDateTime> = Some(midnight);
    while let Some(local) = probe.filter(|p| *p <= limit) {
        if let Some(start) = tz.from_local_datetime(&local).earliest() {
            return Ok(start.with_timezone(&Utc));
        }
        probe = local.checked_add_signed(TimeDelta::minutes(DST_GAP_PROBE_MINUTES));
    }

    Err(RolloverError::Calendar(format!(
        "no valid local time for the start of {} in {}",
        date,
        tz.name()
    )))
}

/// Absolute window covering the whole local day `date`.
///
/// `end` is the last millisecond before the following local day starts.
pub fn day_window(date: NaiveDate, tz: Tz) -> Result<DayWindow, RolloverError> {
    let following = next_day(date)?;
    let start = start_of_local_day(date, tz)?;
    let next_start = start_of_local_day(following, tz)?;

    Ok(DayWindow {
        start,
        end: next_start - TimeDelta::milliseconds(1),
    })
}

/// Start of the local day after the one containing `now`.
pub fn next_local_midnight(now: DateTime<Utc>, tz: Tz) -> Result<DateTime<Utc>, RolloverError> {
    start_of_local_day(next_day(local_date(now, tz))?, tz)
}

/// Local calendar date before the one containing `now`.
pub fn previous_local_date(now: DateTime<Utc>, tz: Tz) -> Result<NaiveDate, RolloverError> {
    let today = local_date(now, tz);
    today.checked_sub_days(Days::new(1)).ok_or_else(|| {
        RolloverError::Calendar(format!("no calendar date precedes {}", today))
    })
}

/// Time remaining from `now` until `target`; zero if `target` has passed.
pub fn delay_until(now: DateTime<Utc>, target: DateTime<Utc>) -> Duration {
    (target - now).to_std().unwrap_or(Duration::ZERO)
}

fn next_day(date: NaiveDate) -> Result<NaiveDate, RolloverError> {
    date.checked_add_days(Days::new(1))
        .ok_or_else(|| RolloverError::Calendar(format!("no calendar date follows {}", date)))
}
