//! Release date and time parsing.
//!
//! Calendar pages give a bare `"Mon D"` date under a year/week heading and an
//! Eastern release time such as `"8:30 am"`. Week 1 pages can start in late
//! December of the previous year and the last week of a year can run into
//! January, so the heading year is corrected at the boundaries.

use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::RawEventRecord;

/// Date and Eastern-time clock reading of one release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseTime {
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl ReleaseTime {
    /// Released before noon, so before the 9:30 ET open: the close-before
    /// session is the previous one.
    pub fn is_morning(&self) -> bool {
        self.time.hour() < 12
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum TimingError {
    #[error("invalid year '{0}'")]
    Year(String),

    #[error("invalid date '{0}'")]
    Date(String),

    #[error("invalid release time '{0}'")]
    Time(String),
}

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Parse the release date and time of a record.
pub fn parse_release(record: &RawEventRecord) -> Result<ReleaseTime, TimingError> {
    let date = parse_event_date(&record.year, &record.week, &record.date)?;
    let time = parse_release_time(&record.time)?;
    Ok(ReleaseTime { date, time })
}

/// Parse `"Jan 8"` under a year/week heading into a calendar date.
pub fn parse_event_date(year: &str, week: &str, date: &str) -> Result<NaiveDate, TimingError> {
    let mut year: i32 = year
        .trim()
        .parse()
        .map_err(|_| TimingError::Year(year.to_string()))?;
    let week: Option<u32> = week.trim().parse().ok();

    let invalid = || TimingError::Date(date.to_string());
    let cleaned = date.replace('.', " ");
    let mut parts = cleaned.split_whitespace();
    let month_name = parts.next().ok_or_else(invalid)?.to_ascii_lowercase();
    let day: u32 = parts
        .next()
        .and_then(|d| d.parse().ok())
        .ok_or_else(invalid)?;
    let month = MONTHS
        .iter()
        .position(|m| month_name.starts_with(m))
        .map(|i| i as u32 + 1)
        .ok_or_else(invalid)?;

    match (week, month) {
        (Some(w), 12) if w <= 1 => year -= 1,
        (Some(w), 1) if w >= 52 => year += 1,
        _ => {}
    }

    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)
}

/// Parse `"8:30 am"`, `"10:00AM ET"` or `"2:15 p.m."` into a 24-hour clock time.
pub fn parse_release_time(time: &str) -> Result<NaiveTime, TimingError> {
    let invalid = || TimingError::Time(time.to_string());

    let lower = time.trim().to_ascii_lowercase();
    let without_zone = lower.strip_suffix("et").unwrap_or(&lower);
    let compact: String = without_zone
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '.')
        .collect();

    let (clock, pm) = if let Some(c) = compact.strip_suffix("am") {
        (c, false)
    } else if let Some(c) = compact.strip_suffix("pm") {
        (c, true)
    } else {
        return Err(invalid());
    };

    let (h, m) = clock.split_once(':').ok_or_else(invalid)?;
    let hour: u32 = h.parse().map_err(|_| invalid())?;
    let minute: u32 = m.parse().map_err(|_| invalid())?;
    if !(1..=12).contains(&hour) {
        return Err(invalid());
    }

    let hour24 = match (hour, pm) {
        (12, false) => 0,
        (12, true) => 12,
        (h, false) => h,
        (h, true) => h + 12,
    };
    NaiveTime::from_hms_opt(hour24, minute, 0).ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_short_dates() {
        assert_eq!(parse_event_date("2010", "2", "Jan 8").unwrap(), ymd(2010, 1, 8));
        assert_eq!(parse_event_date("2010", "2", "Jan 08").unwrap(), ymd(2010, 1, 8));
        assert_eq!(parse_event_date("2010", "36", "Sept. 3").unwrap(), ymd(2010, 9, 3));
    }

    #[test]
    fn week_one_december_belongs_to_previous_year() {
        assert_eq!(
            parse_event_date("2009", "1", "Dec 31").unwrap(),
            ymd(2008, 12, 31)
        );
        assert_eq!(parse_event_date("2009", "01", "Jan 2").unwrap(), ymd(2009, 1, 2));
    }

    #[test]
    fn last_week_january_belongs_to_next_year() {
        assert_eq!(parse_event_date("2008", "53", "Jan 1").unwrap(), ymd(2009, 1, 1));
    }

    #[test]
    fn rejects_bad_dates() {
        assert!(matches!(
            parse_event_date("2010", "2", "Foo 8"),
            Err(TimingError::Date(_))
        ));
        assert!(matches!(
            parse_event_date("2010", "8", "Feb 30"),
            Err(TimingError::Date(_))
        ));
        assert!(matches!(
            parse_event_date("x", "2", "Jan 8"),
            Err(TimingError::Year(_))
        ));
    }

    #[test]
    fn parses_release_times() {
        let t = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap();
        assert_eq!(parse_release_time("8:30 am").unwrap(), t(8, 30));
        assert_eq!(parse_release_time("10:00AM ET").unwrap(), t(10, 0));
        assert_eq!(parse_release_time("2:15 p.m.").unwrap(), t(14, 15));
        assert_eq!(parse_release_time("12:00 pm").unwrap(), t(12, 0));
        assert_eq!(parse_release_time("12:30 am").unwrap(), t(0, 30));
    }

    #[test]
    fn rejects_bad_times() {
        for s in ["", "TBA", "8:30", "13:00 pm", "8:75 am"] {
            assert!(parse_release_time(s).is_err(), "{s}");
        }
    }

    #[test]
    fn morning_is_before_noon() {
        let release = ReleaseTime {
            date: ymd(2010, 1, 8),
            time: NaiveTime::from_hms_opt(8, 30, 0).unwrap(),
        };
        assert!(release.is_morning());

        let afternoon = ReleaseTime {
            time: NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
            ..release
        };
        assert!(!afternoon.is_morning());
    }
}
