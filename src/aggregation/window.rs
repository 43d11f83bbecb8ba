//! Time Window Module
//!
//! Inclusive date ranges restricting which records an aggregate folds.

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Serialize, Serializer};

use super::ComputeError;

/// Longest accepted explicit range, in days
pub const MAX_WINDOW_DAYS: i64 = 3660;

const DATE_FORMAT: &str = "%Y-%m-%d";

// == Time Window ==
/// Inclusive bounds on a record's timestamp, at UTC day granularity.
///
/// Relative specs (`today`, `7d`, ...) are resolved to absolute dates when
/// parsed, so equal ranges always render to the same canonical string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeWindow {
    bounds: Option<(NaiveDate, NaiveDate)>,
}

impl TimeWindow {
    /// The unbounded window.
    pub const fn all() -> Self {
        Self { bounds: None }
    }

    /// Window covering `start` through `end`, both days included.
    pub fn between(start: NaiveDate, end: NaiveDate) -> Result<Self, ComputeError> {
        if start > end {
            return Err(ComputeError::InvalidWindow(format!(
                "start {} is after end {}",
                start, end
            )));
        }
        if (end - start).num_days() >= MAX_WINDOW_DAYS {
            return Err(ComputeError::InvalidWindow(format!(
                "range exceeds {} days",
                MAX_WINDOW_DAYS
            )));
        }
        Ok(Self {
            bounds: Some((start, end)),
        })
    }

    // == Parse ==
    /// Parses a window spec relative to `today`.
    ///
    /// Accepted: `all`, `today`, `<n>d` (the last n days including today,
    /// n in 1..=3660), and `YYYY-MM-DD..YYYY-MM-DD`.
    pub fn parse(spec: &str, today: NaiveDate) -> Result<Self, ComputeError> {
        let spec = spec.trim();

        if spec.is_empty() || spec.eq_ignore_ascii_case("all") {
            return Ok(Self::all());
        }
        if spec.eq_ignore_ascii_case("today") {
            return Self::between(today, today);
        }

        if let Some((start, end)) = spec.split_once("..") {
            let start = parse_date(start)?;
            let end = parse_date(end)?;
            return Self::between(start, end);
        }

        if let Some(days) = spec.strip_suffix('d') {
            let days: i64 = days
                .parse()
                .map_err(|_| ComputeError::InvalidWindow(format!("unrecognized window {:?}", spec)))?;
            if !(1..=MAX_WINDOW_DAYS).contains(&days) {
                return Err(ComputeError::InvalidWindow(format!(
                    "day count must be between 1 and {}",
                    MAX_WINDOW_DAYS
                )));
            }
            return Self::between(today - Duration::days(days - 1), today);
        }

        Err(ComputeError::InvalidWindow(format!(
            "unrecognized window {:?}",
            spec
        )))
    }

    /// Returns true if `timestamp` falls on a day inside the window.
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        match self.bounds {
            None => true,
            Some((start, end)) => {
                let day = timestamp.date_naive();
                start <= day && day <= end
            }
        }
    }

    pub fn bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        self.bounds
    }
}

impl Default for TimeWindow {
    fn default() -> Self {
        Self::all()
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bounds {
            None => f.write_str("all"),
            Some((start, end)) => write!(
                f,
                "{}..{}",
                start.format(DATE_FORMAT),
                end.format(DATE_FORMAT)
            ),
        }
    }
}

impl Serialize for TimeWindow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, ComputeError> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| ComputeError::InvalidWindow(format!("invalid date {:?}", raw.trim())))
}
