//! Proleptic Gregorian dates and their Julian day numbers.

use std::str::FromStr;

use chrono::{Datelike, NaiveDate};

use crate::consts::{DATE_SEPARATOR, MAX_MONTH, MAX_YEAR};
use crate::prelude::*;
use crate::types::{Day, Month, Year};
use crate::ValidationError;

pub use crate::types::{days_in_month, is_leap_year};

/// A real calendar date in the proleptic Gregorian calendar.
///
/// Field order makes the derived ordering chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[display(fmt = "{:04}-{:02}-{:02}", "year.get()", "month.get()", "day.get()")]
pub struct GregorianDate {
    year: Year,
    month: Month,
    day: Day,
}

impl GregorianDate {
    /// Creates a date, validating every component against the calendar.
    ///
    /// # Errors
    /// Returns the first failing component as a `ValidationError`.
    pub fn new(year: u16, month: u8, day: u8) -> Result<Self, ValidationError> {
        Ok(Self {
            year: Year::new(year)?,
            month: Month::new(month)?,
            day: Day::new(day, year, month)?,
        })
    }

    #[inline]
    pub const fn year(&self) -> u16 {
        self.year.get()
    }

    #[inline]
    pub const fn month(&self) -> u8 {
        self.month.get()
    }

    #[inline]
    pub const fn day(&self) -> u8 {
        self.day.get()
    }

    /// Julian day number of this date (noon-based, so 2000-01-01 is 2451545).
    pub fn to_julian_day(&self) -> i64 {
        julian_day(
            i64::from(self.year()),
            i64::from(self.month()),
            i64::from(self.day()),
        )
    }

    /// Inverse of [`to_julian_day`](Self::to_julian_day).
    ///
    /// # Errors
    /// Returns `ValidationError::OutOfRange` when the day number lands outside
    /// years `1..=9999`.
    pub fn from_julian_day(jdn: i64) -> Result<Self, ValidationError> {
        let (year, month, day) = civil_from_julian_day(jdn);
        let year = u16::try_from(year)
            .ok()
            .filter(|y| (1..=MAX_YEAR).contains(y))
            .ok_or(ValidationError::OutOfRange {
                year,
                min: 1,
                max: MAX_YEAR,
            })?;
        // month and day come out of the inverse formula already in range
        let month = u8::try_from(month).map_err(|_| ValidationError::InvalidMonth(0))?;
        let day = u8::try_from(day).map_err(|_| ValidationError::InvalidDay {
            year,
            month,
            day: 0,
        })?;
        Self::new(year, month, day)
    }

    /// Moves the date by a signed number of days.
    ///
    /// # Errors
    /// Returns `ValidationError::OutOfRange` when the result leaves years `1..=9999`.
    pub fn add_days(&self, days: i64) -> Result<Self, ValidationError> {
        Self::from_julian_day(self.to_julian_day() + days)
    }

    /// Moves the date back by whole months, clamping the day to the
    /// length of the target month (March 31 minus one month is February 28/29).
    ///
    /// # Errors
    /// Returns `ValidationError::OutOfRange` when the result precedes year 1.
    pub fn sub_months(&self, months: u32) -> Result<Self, ValidationError> {
        let total = i64::from(self.year()) * i64::from(MAX_MONTH) + i64::from(self.month() - 1)
            - i64::from(months);
        let year = total.div_euclid(i64::from(MAX_MONTH));
        let month = total.rem_euclid(i64::from(MAX_MONTH)) + 1;
        let year = u16::try_from(year)
            .ok()
            .filter(|y| *y >= 1)
            .ok_or(ValidationError::OutOfRange {
                year,
                min: 1,
                max: MAX_YEAR,
            })?;
        let month = u8::try_from(month).map_err(|_| ValidationError::InvalidMonth(0))?;
        let day = self.day().min(days_in_month(year, month));
        Self::new(year, month, day)
    }

    /// Moves the date back by whole years, clamping February 29 to the 28th.
    ///
    /// # Errors
    /// Returns `ValidationError::OutOfRange` when the result precedes year 1.
    pub fn sub_years(&self, years: u32) -> Result<Self, ValidationError> {
        let months = years.checked_mul(u32::from(MAX_MONTH)).ok_or(
            ValidationError::OutOfRange {
                year: i64::from(self.year()) - i64::from(years),
                min: 1,
                max: MAX_YEAR,
            },
        )?;
        self.sub_months(months)
    }

    /// Converts to a `chrono::NaiveDate`.
    pub fn to_naive(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(
            i32::from(self.year()),
            u32::from(self.month()),
            u32::from(self.day()),
        )
    }
}

impl TryFrom<NaiveDate> for GregorianDate {
    type Error = ValidationError;

    fn try_from(value: NaiveDate) -> Result<Self, Self::Error> {
        let year = u16::try_from(value.year()).map_err(|_| ValidationError::OutOfRange {
            year: i64::from(value.year()),
            min: 1,
            max: MAX_YEAR,
        })?;
        // chrono guarantees month in 1..=12 and day in 1..=31
        let month = u8::try_from(value.month()).map_err(|_| ValidationError::InvalidMonth(0))?;
        let day = u8::try_from(value.day()).map_err(|_| ValidationError::InvalidDay {
            year,
            month,
            day: 0,
        })?;
        Self::new(year, month, day)
    }
}

impl FromStr for GregorianDate {
    type Err = ValidationError;

    /// Parses the ISO form `YYYY-MM-DD`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyInput);
        }

        let parts: Vec<&str> = trimmed.split(DATE_SEPARATOR).map(str::trim).collect();
        let [year, month, day] = parts.as_slice() else {
            return Err(ValidationError::InvalidFormat(trimmed.to_owned()));
        };

        let year = year
            .parse::<u16>()
            .map_err(|_| ValidationError::InvalidFormat((*year).to_owned()))?;
        let month = month
            .parse::<u8>()
            .map_err(|_| ValidationError::InvalidFormat((*month).to_owned()))?;
        let day = day
            .parse::<u8>()
            .map_err(|_| ValidationError::InvalidFormat((*day).to_owned()))?;

        Self::new(year, month, day)
    }
}

impl serde::Serialize for GregorianDate {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for GregorianDate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Standard proleptic-Gregorian day-number formula.
///
/// All divisions truncate toward zero; inputs are positive in the supported
/// range except `(month - 8) / 6`, which is -1 for January and February.
pub(crate) const fn julian_day(year: i64, month: i64, day: i64) -> i64 {
    let shift = (month - 8) / 6;
    let d = ((year + shift + 100_100) * 1461) / 4 + (153 * ((month + 9) % 12) + 2) / 5 + day
        - 34_840_408;
    d - (((year + 100_100 + shift) / 100) * 3) / 4 + 752
}

const fn civil_from_julian_day(jdn: i64) -> (i64, i64, i64) {
    let mut j = 4 * jdn + 139_361_631;
    j += (((4 * jdn + 183_187_720) / 146_097) * 3) / 4 * 4 - 3908;
    let i = ((j % 1461) / 4) * 5 + 308;
    let day = (i % 153) / 5 + 1;
    let month = (i / 153) % 12 + 1;
    let year = j / 1461 - 100_100 + (8 - month) / 6;
    (year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: u16, m: u8, d: u8) -> GregorianDate {
        GregorianDate::new(y, m, d).unwrap()
    }

    #[test]
    fn test_new_rejects_impossible_dates() {
        assert!(matches!(
            GregorianDate::new(2025, 4, 31),
            Err(ValidationError::InvalidDay {
                year: 2025,
                month: 4,
                day: 31
            })
        ));
        assert!(GregorianDate::new(2023, 2, 29).is_err());
        assert!(GregorianDate::new(2024, 2, 29).is_ok());
        assert!(matches!(
            GregorianDate::new(2024, 13, 1),
            Err(ValidationError::InvalidMonth(13))
        ));
        assert!(matches!(
            GregorianDate::new(0, 1, 1),
            Err(ValidationError::InvalidYear(0))
        ));
    }

    #[test]
    fn test_julian_day_known_values() {
        assert_eq!(date(2000, 1, 1).to_julian_day(), 2_451_545);
        assert_eq!(date(1900, 1, 1).to_julian_day(), 2_415_021);
        assert_eq!(date(2024, 3, 20).to_julian_day(), 2_460_390);
    }

    #[test]
    fn test_julian_day_inverse_over_window() {
        let mut jdn = date(1900, 1, 1).to_julian_day();
        let last = date(2100, 12, 31).to_julian_day();
        let mut previous = GregorianDate::from_julian_day(jdn - 1).unwrap();
        while jdn <= last {
            let current = GregorianDate::from_julian_day(jdn).unwrap();
            assert_eq!(current.to_julian_day(), jdn);
            assert!(current > previous, "{current} should follow {previous}");
            previous = current;
            jdn += 1;
        }
    }

    #[test]
    fn test_add_days_crosses_boundaries() {
        assert_eq!(date(2024, 2, 28).add_days(1).unwrap(), date(2024, 2, 29));
        assert_eq!(date(2023, 2, 28).add_days(1).unwrap(), date(2023, 3, 1));
        assert_eq!(date(2024, 1, 1).add_days(-1).unwrap(), date(2023, 12, 31));
        assert_eq!(date(2024, 3, 20).add_days(-2).unwrap(), date(2024, 3, 18));
        assert!(date(1, 1, 1).add_days(-1).is_err());
    }

    #[test]
    fn test_sub_months_clamps_day() {
        assert_eq!(date(2024, 3, 31).sub_months(1).unwrap(), date(2024, 2, 29));
        assert_eq!(date(2023, 3, 31).sub_months(1).unwrap(), date(2023, 2, 28));
        assert_eq!(date(2024, 1, 15).sub_months(1).unwrap(), date(2023, 12, 15));
        assert_eq!(date(2024, 5, 10).sub_months(17).unwrap(), date(2022, 12, 10));
        assert!(date(1, 1, 1).sub_months(1).is_err());
    }

    #[test]
    fn test_sub_years_leap_day() {
        assert_eq!(date(2024, 2, 29).sub_years(1).unwrap(), date(2023, 2, 28));
        assert_eq!(date(2024, 2, 29).sub_years(4).unwrap(), date(2020, 2, 29));
    }

    #[test]
    fn test_parse_and_display() {
        let parsed: GregorianDate = "2024-03-20".parse().unwrap();
        assert_eq!(parsed, date(2024, 3, 20));
        assert_eq!(parsed.to_string(), "2024-03-20");
        assert_eq!(date(987, 6, 5).to_string(), "0987-06-05");

        assert!(matches!(
            "".parse::<GregorianDate>(),
            Err(ValidationError::EmptyInput)
        ));
        assert!(matches!(
            "2024-03".parse::<GregorianDate>(),
            Err(ValidationError::InvalidFormat(_))
        ));
        assert!(matches!(
            "2024-xx-01".parse::<GregorianDate>(),
            Err(ValidationError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_serde_string_format() {
        let d = date(2024, 3, 20);
        let json = serde_json::to_string(&d).unwrap();
        assert_eq!(json, "\"2024-03-20\"");
        let back: GregorianDate = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
        assert!(serde_json::from_str::<GregorianDate>("\"2024-02-30\"").is_err());
    }

    #[test]
    fn test_chrono_interop() {
        let naive = NaiveDate::from_ymd_opt(2024, 3, 20).unwrap();
        let d = GregorianDate::try_from(naive).unwrap();
        assert_eq!(d, date(2024, 3, 20));
        assert_eq!(d.to_naive(), Some(naive));
    }
}
