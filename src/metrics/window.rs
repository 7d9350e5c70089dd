//! Inclusive date-range membership for event timestamps.
//!
//! Upstream timestamps are epoch seconds or epoch milliseconds depending on
//! the record. Anything above [`MILLISECOND_THRESHOLD`] is read as
//! milliseconds. Bounds are UTC: start-of-day of the first date through
//! 23:59:59.999 of the last.

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Offset of 23:59:59.999 from midnight.
const LAST_MILLI_OF_DAY: i64 = 86_399_999;

/// Timestamps numerically above this are milliseconds.
pub const MILLISECOND_THRESHOLD: f64 = 10_000_000_000.0;

/// How a record with no usable timestamp is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingTimestampPolicy {
    /// Missing timestamps are inside every window.
    #[default]
    Include,
    /// Missing timestamps are outside every window.
    Exclude,
}

/// Normalize an epoch timestamp of either unit to seconds.
pub fn normalize_epoch_seconds(ts: f64) -> f64 {
    if ts > MILLISECOND_THRESHOLD {
        ts / 1000.0
    } else {
        ts
    }
}

/// Normalize an epoch timestamp of either unit to whole milliseconds.
pub fn normalize_epoch_millis(ts: f64) -> f64 {
    if ts > MILLISECOND_THRESHOLD {
        ts.round()
    } else {
        (ts * 1000.0).round()
    }
}

/// An inclusive, day-aligned UTC window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    /// Window from the start of `start` to 23:59:59.999 of `end`.
    pub fn from_dates(start: NaiveDate, end: NaiveDate) -> Self {
        let start_of_day = start.and_time(NaiveTime::MIN);
        let end_of_day = end.and_time(NaiveTime::MIN) + Duration::milliseconds(LAST_MILLI_OF_DAY);
        Self {
            start: Utc.from_utc_datetime(&start_of_day),
            end: Utc.from_utc_datetime(&end_of_day),
        }
    }

    /// Window covering the single day `date`.
    pub fn single_day(date: NaiveDate) -> Self {
        Self::from_dates(date, date)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Inclusive bounds in epoch seconds, the unit the stats endpoint takes.
    pub fn bounds_epoch_secs(&self) -> (f64, f64) {
        (
            self.start.timestamp_millis() as f64 / 1000.0,
            self.end.timestamp_millis() as f64 / 1000.0,
        )
    }

    /// Membership test with an explicit policy for missing timestamps.
    pub fn contains(&self, ts: Option<f64>, missing: MissingTimestampPolicy) -> bool {
        match ts.filter(|t| t.is_finite()) {
            Some(t) => self.contains_epoch(t),
            None => missing == MissingTimestampPolicy::Include,
        }
    }

    /// Membership test for a present timestamp of either unit.
    pub fn contains_epoch(&self, ts: f64) -> bool {
        let millis = normalize_epoch_millis(ts);
        millis >= self.start.timestamp_millis() as f64
            && millis <= self.end.timestamp_millis() as f64
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}..{}",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}
