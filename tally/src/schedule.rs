use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta, Utc};

use tally_core::{TallyError, TimeWindow};

/// The `[start, end)` range a scheduled run collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleWindow {
    /// First instant collected.
    pub start: DateTime<Utc>,
    /// End of the range (exclusive).
    pub end: DateTime<Utc>,
}

impl ScheduleWindow {
    /// Hours past midnight UTC at which a collection day begins.
    pub const DEFAULT_OFFSET_HOURS: i64 = 8;

    /// Window ending at the most recent day boundary before `now`, where days
    /// begin `offset_hours` past midnight UTC, and reaching `days_back` days
    /// into the past.
    ///
    /// # Errors
    /// Returns `InvalidArg` if `days_back` is zero or `offset_hours` is not
    /// within `0..24`.
    pub fn daily(
        now: DateTime<Utc>,
        offset_hours: i64,
        days_back: u32,
    ) -> Result<Self, TallyError> {
        if days_back == 0 {
            return Err(TallyError::InvalidArg("days_back must be at least 1".into()));
        }
        if !(0..24).contains(&offset_hours) {
            return Err(TallyError::InvalidArg(format!(
                "day offset must be within 0..24 hours, got {offset_hours}"
            )));
        }
        let offset = TimeDelta::hours(offset_hours);
        let floor = (now - offset).date_naive().and_time(NaiveTime::MIN).and_utc();
        let end = floor + offset;
        let start = end - TimeDelta::days(i64::from(days_back));
        Ok(Self { start, end })
    }

    /// Explicit window.
    ///
    /// # Errors
    /// Returns `InvalidArg` unless `start < end`.
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, TallyError> {
        TimeWindow::new(start, end)?;
        Ok(Self { start, end })
    }

    /// Date the run's output is partitioned under: the day of `start`.
    #[must_use]
    pub fn partition_date(&self) -> NaiveDate {
        self.start.date_naive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 3, d, h, 0, 0).unwrap()
    }

    #[test]
    fn afternoon_run_covers_previous_day() {
        let w = ScheduleWindow::daily(at(10, 14), 8, 1).unwrap();
        assert_eq!(w.end, at(10, 8));
        assert_eq!(w.start, at(9, 8));
        assert_eq!(w.partition_date(), NaiveDate::from_ymd_opt(2022, 3, 9).unwrap());
    }

    #[test]
    fn early_run_floors_to_previous_boundary() {
        let w = ScheduleWindow::daily(at(10, 3), 8, 2).unwrap();
        assert_eq!(w.end, at(9, 8));
        assert_eq!(w.start, at(7, 8));
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(ScheduleWindow::daily(at(10, 3), 8, 0).is_err());
        assert!(ScheduleWindow::daily(at(10, 3), 24, 1).is_err());
        assert!(ScheduleWindow::between(at(2, 0), at(1, 0)).is_err());
    }
}
