//! Trading-session alignment.
//!
//! An event is framed by two sessions: the last close the market saw before
//! the release, and the first open after it. Morning releases land before the
//! open, so their close-before is the previous session. Anything later uses
//! the event's own session.
//!
//! Walks over the calendar are bounded: a calendar with a long gap (missing
//! data, a range edge) yields [`AlignError::NoSessionFound`] instead of an
//! unbounded search.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::timing::ReleaseTime;

/// Default number of calendar days a session walk examines.
pub const DEFAULT_MAX_WALK_DAYS: u32 = 10;

/// Answers whether the market traded on a given date.
pub trait TradingCalendar {
    fn is_session(&self, date: NaiveDate) -> bool;
}

impl<F> TradingCalendar for F
where
    F: Fn(NaiveDate) -> bool,
{
    fn is_session(&self, date: NaiveDate) -> bool {
        self(date)
    }
}

/// The two sessions framing one release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTiming {
    pub close_before: NaiveDate,
    pub open_after: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalkDirection {
    Backward,
    Forward,
}

impl fmt::Display for WalkDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalkDirection::Backward => write!(f, "before"),
            WalkDirection::Forward => write!(f, "after"),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum AlignError {
    #[error("no trading session within {max_days} days {direction} {from}")]
    NoSessionFound {
        from: NaiveDate,
        direction: WalkDirection,
        max_days: u32,
    },
}

/// Maps releases onto sessions of a [`TradingCalendar`].
#[derive(Debug, Clone, Copy)]
pub struct SessionAligner<'c, C: TradingCalendar + ?Sized> {
    calendar: &'c C,
    max_walk_days: u32,
}

impl<'c, C: TradingCalendar + ?Sized> SessionAligner<'c, C> {
    pub fn new(calendar: &'c C) -> Self {
        Self {
            calendar,
            max_walk_days: DEFAULT_MAX_WALK_DAYS,
        }
    }

    pub fn with_max_walk_days(mut self, max_walk_days: u32) -> Self {
        self.max_walk_days = max_walk_days;
        self
    }

    pub fn max_walk_days(&self) -> u32 {
        self.max_walk_days
    }

    /// Last session whose close precedes a release on `date`.
    pub fn close_before(&self, date: NaiveDate, morning: bool) -> Result<NaiveDate, AlignError> {
        let start = if morning {
            date.checked_sub_days(Days::new(1))
        } else {
            Some(date)
        };
        match start {
            Some(start) => self.walk(start, WalkDirection::Backward),
            None => Err(self.not_found(date, WalkDirection::Backward)),
        }
    }

    /// First session strictly after `close_before`.
    pub fn open_after(&self, close_before: NaiveDate) -> Result<NaiveDate, AlignError> {
        match close_before.checked_add_days(Days::new(1)) {
            Some(start) => self.walk(start, WalkDirection::Forward),
            None => Err(self.not_found(close_before, WalkDirection::Forward)),
        }
    }

    /// Both framing sessions of a release.
    pub fn align(&self, release: &ReleaseTime) -> Result<EventTiming, AlignError> {
        let close_before = self.close_before(release.date, release.is_morning())?;
        let open_after = self.open_after(close_before)?;
        Ok(EventTiming {
            close_before,
            open_after,
        })
    }

    fn walk(&self, start: NaiveDate, direction: WalkDirection) -> Result<NaiveDate, AlignError> {
        for step in 0..u64::from(self.max_walk_days) {
            let candidate = match direction {
                WalkDirection::Backward => start.checked_sub_days(Days::new(step)),
                WalkDirection::Forward => start.checked_add_days(Days::new(step)),
            };
            let Some(candidate) = candidate else {
                break;
            };
            if self.calendar.is_session(candidate) {
                return Ok(candidate);
            }
        }
        Err(self.not_found(start, direction))
    }

    fn not_found(&self, from: NaiveDate, direction: WalkDirection) -> AlignError {
        AlignError::NoSessionFound {
            from,
            direction,
            max_days: self.max_walk_days,
        }
    }
}
