// ironlayer-recon/src/cron.rs
// ============================================================================
// Module: Narrow Cron
// Description: Next-run computation for exactly three cron shapes.
// Purpose: Schedule periodic work without a general cron engine.
// Dependencies: chrono
// ============================================================================

//! ## Overview
//! Cron support is intentionally narrow: hourly (`M * * * *`), daily
//! (`M H * * *`), and weekly (`M H * * D`, Sunday = 0). Anything else is
//! rejected. "Strictly after" semantics apply: when `from_time` lands
//! exactly on the scheduled moment, the next run is one full period later.

// ============================================================================
// SECTION: Imports
// ============================================================================

use chrono::DateTime;
use chrono::Datelike;
use chrono::Duration;
use chrono::NaiveTime;
use chrono::TimeZone;
use chrono::Timelike;
use chrono::Utc;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Cron parsing errors.
#[derive(Debug, Error)]
pub enum CronError {
    /// The expression is outside the supported grammar.
    #[error("unsupported cron expression: '{0}'")]
    Unsupported(String),
}

// ============================================================================
// SECTION: Next Run
// ============================================================================

/// Computes the next run strictly after `from_time`.
///
/// # Errors
///
/// Returns [`CronError::Unsupported`] for any expression outside the three
/// supported shapes or with out-of-range fields.
pub fn compute_next_run(
    expression: &str,
    from_time: DateTime<Utc>,
) -> Result<DateTime<Utc>, CronError> {
    let unsupported = || CronError::Unsupported(expression.to_string());
    let fields: Vec<&str> = expression.split_whitespace().collect();
    let [minute, hour, dom, month, dow] = fields.as_slice() else {
        return Err(unsupported());
    };
    if *dom != "*" || *month != "*" {
        return Err(unsupported());
    }

    let minute: u32 = parse_field(minute, 59).ok_or_else(unsupported)?;

    match (*hour, *dow) {
        ("*", "*") => Ok(next_hourly(minute, from_time)),
        (hour_field, "*") => {
            let hour = parse_field(hour_field, 23).ok_or_else(unsupported)?;
            Ok(next_daily(minute, hour, from_time))
        }
        ("*", _) => Err(unsupported()),
        (hour_field, dow_field) => {
            let hour = parse_field(hour_field, 23).ok_or_else(unsupported)?;
            let weekday = parse_field(dow_field, 6).ok_or_else(unsupported)?;
            Ok(next_weekly(minute, hour, weekday, from_time))
        }
    }
}

/// Parses a plain numeric field within an inclusive bound.
fn parse_field(field: &str, max: u32) -> Option<u32> {
    let value: u32 = field.parse().ok()?;
    (value <= max).then_some(value)
}

/// Next occurrence of minute `M`, strictly after `from_time`.
fn next_hourly(minute: u32, from_time: DateTime<Utc>) -> DateTime<Utc> {
    let candidate = truncate_to_minute(from_time, minute);
    if candidate > from_time {
        candidate
    } else {
        candidate + Duration::hours(1)
    }
}

/// Next occurrence of `H:M`, strictly after `from_time`.
fn next_daily(minute: u32, hour: u32, from_time: DateTime<Utc>) -> DateTime<Utc> {
    let candidate = at_time(from_time, hour, minute);
    if candidate > from_time {
        candidate
    } else {
        candidate + Duration::days(1)
    }
}

/// Next occurrence of day-of-week `D` at `H:M`, strictly after `from_time`.
fn next_weekly(minute: u32, hour: u32, weekday: u32, from_time: DateTime<Utc>) -> DateTime<Utc> {
    let from_weekday = from_time.weekday().num_days_from_sunday();
    let days_ahead = (7 + weekday - from_weekday) % 7;
    let candidate = at_time(from_time, hour, minute) + Duration::days(i64::from(days_ahead));
    if candidate > from_time {
        candidate
    } else {
        candidate + Duration::days(7)
    }
}

/// Returns `from_time`'s hour with the given minute, seconds zeroed.
fn truncate_to_minute(from_time: DateTime<Utc>, minute: u32) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(from_time.hour(), minute, 0)
        .unwrap_or(NaiveTime::MIN);
    Utc.from_utc_datetime(&from_time.date_naive().and_time(time))
}

/// Returns `from_time`'s date at the given hour and minute.
fn at_time(from_time: DateTime<Utc>, hour: u32, minute: u32) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN);
    Utc.from_utc_datetime(&from_time.date_naive().and_time(time))
}
