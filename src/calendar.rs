//! Year boundaries in the service's fixed local timezone.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;

use crate::error::{PriceError, Result};

/// All dates handled by the service are localized here.
pub const TIMEZONE: Tz = chrono_tz::Asia::Tokyo;

/// Start and end moments of one calendar year.
#[derive(Debug, Clone)]
pub struct YearCalendar {
    pub year: i32,
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
    pub end_of_day: DateTime<Tz>,
    pub new_year: DateTime<Tz>,
}

impl YearCalendar {
    pub fn new(year: i32) -> Result<Self> {
        let at = |y: i32, month: u32, day: u32, h: u32, m: u32, s: u32| {
            NaiveDate::from_ymd_opt(y, month, day)
                .and_then(|d| d.and_hms_opt(h, m, s))
                .and_then(|naive| TIMEZONE.from_local_datetime(&naive).single())
                .ok_or(PriceError::InvalidYear(year))
        };

        let next = year.checked_add(1).ok_or(PriceError::InvalidYear(year))?;

        Ok(Self {
            year,
            start: at(year, 1, 1, 0, 0, 0)?,
            end: at(year, 12, 31, 0, 0, 0)?,
            end_of_day: at(year, 12, 31, 23, 59, 59)?,
            new_year: at(next, 1, 1, 0, 0, 0)?,
        })
    }

    pub fn start_yyyymmdd(&self) -> String {
        to_digit_string(&self.start)
    }

    pub fn end_yyyymmdd(&self) -> String {
        to_digit_string(&self.end)
    }

    pub fn new_year_yyyymmdd(&self) -> String {
        to_digit_string(&self.new_year)
    }

    pub fn start_dash(&self) -> String {
        self.start.format("%Y-%m-%d").to_string()
    }

    pub fn end_dash(&self) -> String {
        self.end.format("%Y-%m-%d").to_string()
    }

    pub fn start_unixtime(&self) -> i64 {
        to_unixtime(&self.start)
    }

    pub fn end_unixtime(&self) -> i64 {
        to_unixtime(&self.end)
    }

    pub fn new_year_unixtime(&self) -> i64 {
        to_unixtime(&self.new_year)
    }

    pub fn min_unixtime(&self) -> i64 {
        self.start_unixtime()
    }

    /// Last whole second of Dec 31, an inclusive upper fetch bound.
    pub fn max_unixtime(&self) -> i64 {
        to_unixtime(&self.end_of_day)
    }
}

pub fn to_digit_string<Z: TimeZone>(moment: &DateTime<Z>) -> String
where
    Z::Offset: std::fmt::Display,
{
    moment.format("%Y%m%d").to_string()
}

pub fn to_unixtime<Z: TimeZone>(moment: &DateTime<Z>) -> i64 {
    moment.timestamp()
}

/// Reads a wall-clock time as local time in [`TIMEZONE`].
pub fn localize(naive: NaiveDateTime) -> Option<DateTime<FixedOffset>> {
    TIMEZONE
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.fixed_offset())
}
