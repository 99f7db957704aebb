//! `YYYYWW` week seeds.
//!
//! A seed is `year * 100 + week`, always rendered with two week digits. `previous()` on week 1
//! lands on week 52 of the prior year even when that year has 53 ISO weeks; historical lookups
//! rely on that, so it stays.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, Local, NaiveDate, Weekday};

use crate::error::{DispatchError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WeekSeed {
    year: i32,
    week: u32,
}

/// Where a seed sits relative to the current week.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeekStatus {
    Past,
    Current,
    Future,
}

impl WeekSeed {
    pub fn new(year: i32, week: u32) -> Result<Self> {
        if !(0..=9999).contains(&year) || !(1..=53).contains(&week) {
            return Err(DispatchError::InvalidSeed(format!("{year}{week:02}")));
        }
        Ok(Self { year, week })
    }

    /// Seed from its numeric form, as found in integer-keyed schedules.
    pub fn from_number(n: u64) -> Result<Self> {
        let year = i32::try_from(n / 100).map_err(|_| DispatchError::InvalidSeed(n.to_string()))?;
        Self::new(year, (n % 100) as u32)
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn week(&self) -> u32 {
        self.week
    }

    pub fn as_number(&self) -> u64 {
        self.year as u64 * 100 + self.week as u64
    }

    /// ISO year and week of today in local time.
    pub fn current() -> Self {
        Self::current_at(Local::now().date_naive())
    }

    pub fn current_at(date: NaiveDate) -> Self {
        let iso = date.iso_week();
        Self {
            year: iso.year(),
            week: iso.week(),
        }
    }

    /// The ISO week that follows this one. Week 53 of a 52-week year rolls into week 1.
    pub fn next(&self) -> Self {
        match NaiveDate::from_isoywd_opt(self.year, self.week, Weekday::Mon) {
            Some(monday) => Self::current_at(monday + Duration::days(7)),
            None => Self {
                year: self.year + 1,
                week: 1,
            },
        }
    }

    pub fn previous(&self) -> Self {
        if self.week == 1 {
            Self {
                year: self.year - 1,
                week: 52,
            }
        } else {
            Self {
                year: self.year,
                week: self.week - 1,
            }
        }
    }

    /// Monday of the seed's week, counted from the first Monday on or after January 1.
    pub fn to_date(&self) -> NaiveDate {
        first_monday(self.year) + Duration::weeks(i64::from(self.week) - 1)
    }

    pub fn status_at(&self, today: NaiveDate) -> WeekStatus {
        let now = Self::current_at(today).as_number();
        match self.as_number() {
            n if n == now => WeekStatus::Current,
            n if n < now => WeekStatus::Past,
            _ => WeekStatus::Future,
        }
    }
}

fn first_monday(year: i32) -> NaiveDate {
    // years are bounded to 0..=9999 at construction
    NaiveDate::from_weekday_of_month_opt(year, 1, Weekday::Mon, 1).unwrap_or(NaiveDate::MIN)
}

impl fmt::Display for WeekSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}{:02}", self.year, self.week)
    }
}

impl FromStr for WeekSeed {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self> {
        let text = s.trim();
        let invalid = || DispatchError::InvalidSeed(s.to_string());
        if !(5..=6).contains(&text.len()) || !text.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let (year, week) = text.split_at(4);
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let week: u32 = week.parse().map_err(|_| invalid())?;
        Self::new(year, week).map_err(|_| invalid())
    }
}

/// Parse a textual seed and return the Monday of its week.
pub fn seed_to_date(seed: &str) -> Result<NaiveDate> {
    Ok(seed.parse::<WeekSeed>()?.to_date())
}
