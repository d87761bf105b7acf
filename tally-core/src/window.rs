use chrono::{DateTime, TimeDelta, Utc};

use tally_types::{TallyError, TimeWindow};

/// Iterator over consecutive windows tiling a range.
///
/// Each window is `[cursor, min(cursor + step, end))`; the last one is clipped
/// to the range end.
#[derive(Debug, Clone)]
pub struct Windows {
    cursor: DateTime<Utc>,
    end: DateTime<Utc>,
    step: TimeDelta,
}

impl Windows {
    /// Tile `range` in steps of `step`.
    ///
    /// # Errors
    /// Returns `TallyError::InvalidArg` if `step` is not positive.
    pub fn new(range: TimeWindow, step: TimeDelta) -> Result<Self, TallyError> {
        if step <= TimeDelta::zero() {
            return Err(TallyError::InvalidArg("date increment must be positive".into()));
        }
        Ok(Self {
            cursor: range.start(),
            end: range.end(),
            step,
        })
    }
}

impl Iterator for Windows {
    type Item = TimeWindow;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.end {
            return None;
        }
        let stop = self
            .cursor
            .checked_add_signed(self.step)
            .map_or(self.end, |t| t.min(self.end));
        let window = TimeWindow::new(self.cursor, stop).ok()?;
        self.cursor = stop;
        Some(window)
    }
}
