//! Half-open time windows and their request-side representation.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TallyError;

/// A bounded, half-open time range `[start, end)` processed as one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    /// Build a window.
    ///
    /// # Errors
    /// Returns `TallyError::InvalidArg` unless `start < end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, TallyError> {
        if start >= end {
            return Err(TallyError::InvalidArg(format!(
                "window start {start} must be before end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Inclusive lower bound.
    #[must_use]
    pub const fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Exclusive upper bound.
    #[must_use]
    pub const fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Whether `ts` falls inside `[start, end)`.
    #[must_use]
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts < self.end
    }

    /// Project this window onto an API's end-date convention.
    #[must_use]
    pub fn for_request(&self, semantics: EndSemantics) -> RequestWindow {
        let last = match semantics {
            EndSemantics::Exclusive => self.end,
            EndSemantics::Inclusive { unit } => {
                let shifted = self.end - unit;
                // A window shorter than one unit still asks for its first unit.
                if shifted < self.start { self.start } else { shifted }
            }
        };
        RequestWindow {
            start: self.start,
            last,
        }
    }
}

/// How an upstream API interprets the end of a requested range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndSemantics {
    /// The end bound is excluded; the window is sent as-is.
    Exclusive,
    /// The end bound is included; one `unit` is subtracted before formatting.
    Inclusive {
        /// Smallest time unit the API resolves (one day for date-granular APIs).
        unit: TimeDelta,
    },
}

impl EndSemantics {
    /// Inclusive end at day granularity.
    #[must_use]
    pub fn inclusive_days() -> Self {
        Self::Inclusive {
            unit: TimeDelta::days(1),
        }
    }
}

/// A window as presented to an API: `start` plus the last bound the API expects.
///
/// For exclusive APIs `last` equals the window end; for inclusive APIs it is the
/// end minus one unit. The window itself stays half-open internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestWindow {
    /// First instant requested.
    pub start: DateTime<Utc>,
    /// Last bound as the API expects it.
    pub last: DateTime<Utc>,
}

impl RequestWindow {
    /// `start` formatted as `YYYY-MM-DD`.
    #[must_use]
    pub fn start_date(&self) -> String {
        self.start.format("%Y-%m-%d").to_string()
    }

    /// `last` formatted as `YYYY-MM-DD`.
    #[must_use]
    pub fn last_date(&self) -> String {
        self.last.format("%Y-%m-%d").to_string()
    }
}
