//! The Persian (Jalali) solar calendar.
//!
//! Year boundaries come from the break-point table in [`JALALI_BREAKS`]:
//! between consecutive break-points the leap pattern follows a regular
//! 33-year sub-cycle, and the table pins down where that regularity is
//! interrupted. Nowruz (1 Farvardin) of any supported year is derived from
//! it, and every conversion goes through Julian day numbers. No average
//! year length is used anywhere: that approximation drifts by a day near
//! month and year boundaries.

use std::str::FromStr;

use crate::consts::{
    ESFAND_DAYS, ESFAND_DAYS_LEAP, JALALI_BREAKS, JALALI_FIRST_HALF_DAYS, JALALI_GREGORIAN_OFFSET,
    JALALI_LONG_MONTH_DAYS, JALALI_LONG_MONTHS, JALALI_MONTH_NAMES, JALALI_SEPARATOR,
    JALALI_SHORT_MONTH_DAYS, MARCH, MAX_GREGORIAN_YEAR, MAX_JALALI_YEAR, MAX_MONTH,
    MIN_GREGORIAN_YEAR, MIN_JALALI_YEAR,
};
use crate::gregorian::{GregorianDate, julian_day};
use crate::prelude::*;
use crate::types::{Day, Month, Year};
use crate::{ConversionError, DateError, ValidationError};

/// A date in the Jalali calendar.
///
/// Months 1-6 have 31 days, 7-11 have 30 and Esfand has 29, or 30 in a leap
/// year. Every constructor enforces this; there is no way to hold a
/// `JalaliDate` that violates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[display(fmt = "{:04}/{:02}/{:02}", "year.get()", "month.get()", "day.get()")]
pub struct JalaliDate {
    year: Year,
    month: Month,
    day: Day,
}

/// Position of a Jalali year within the break-point table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LeapCycle {
    /// Years since the last leap year; 0 means this year is leap.
    leap_offset: i64,
    /// Gregorian year in which this Jalali year begins.
    gregorian_year: i64,
    /// Day of March on which Nowruz falls in `gregorian_year`.
    march_day: i64,
}

/// Locates `year` in the break-point table. `None` outside the table.
fn leap_cycle(year: i64) -> Option<LeapCycle> {
    let first = JALALI_BREAKS[0];
    let last = JALALI_BREAKS[JALALI_BREAKS.len() - 1];
    if year < first || year >= last {
        return None;
    }

    let gregorian_year = year + JALALI_GREGORIAN_OFFSET;
    let mut leap_days = -14;
    let mut previous = first;
    let mut jump = 0;
    for &next in &JALALI_BREAKS[1..] {
        jump = next - previous;
        if year < next {
            break;
        }
        leap_days += (jump / 33) * 8 + (jump % 33) / 4;
        previous = next;
    }

    let mut n = year - previous;
    leap_days += (n / 33) * 8 + (n % 33 + 3) / 4;
    if jump % 33 == 4 && jump - n == 4 {
        leap_days += 1;
    }

    // Gregorian leap days accumulated since the same origin
    let gregorian_leaps = gregorian_year / 4 - ((gregorian_year / 100 + 1) * 3) / 4 - 150;
    let march_day = 20 + leap_days - gregorian_leaps;

    if jump - n < 6 {
        n = n - jump + ((jump + 4) / 33) * 33;
    }
    let mut leap_offset = ((n + 1) % 33 - 1) % 4;
    if leap_offset == -1 {
        leap_offset = 4;
    }

    Some(LeapCycle {
        leap_offset,
        gregorian_year,
        march_day,
    })
}

/// Julian day number of 1 Farvardin of `year`.
fn nowruz_julian_day(year: i64) -> Result<i64, ValidationError> {
    let cycle = leap_cycle(year).ok_or(ValidationError::OutOfRange {
        year,
        min: MIN_JALALI_YEAR,
        max: MAX_JALALI_YEAR,
    })?;
    Ok(julian_day(
        cycle.gregorian_year,
        i64::from(MARCH),
        cycle.march_day,
    ))
}

/// Whether `year` has a 30-day Esfand.
///
/// Pure function of the break-point table. Years outside the table are
/// reported as common years.
pub fn is_leap_year(year: u16) -> bool {
    leap_cycle(i64::from(year)).is_some_and(|cycle| cycle.leap_offset == 0)
}

/// Number of days in `month` of Jalali `year`.
pub fn month_length(year: u16, month: u8) -> u8 {
    debug_assert!(month != 0 && month <= MAX_MONTH);

    if month <= JALALI_LONG_MONTHS {
        JALALI_LONG_MONTH_DAYS
    } else if month < MAX_MONTH {
        JALALI_SHORT_MONTH_DAYS
    } else if is_leap_year(year) {
        ESFAND_DAYS_LEAP
    } else {
        ESFAND_DAYS
    }
}

/// Number of days in Jalali `year`.
pub fn year_length(year: u16) -> u16 {
    if is_leap_year(year) { 366 } else { 365 }
}

/// Shape and range check for a Jalali triple.
pub fn validate_jalali_date(year: i64, month: i64, day: i64) -> bool {
    let (Ok(year), Ok(month), Ok(day)) = (u16::try_from(year), u8::try_from(month), u8::try_from(day))
    else {
        return false;
    };
    (MIN_JALALI_YEAR..=MAX_JALALI_YEAR).contains(&year)
        && (1..=MAX_MONTH).contains(&month)
        && (1..=month_length(year, month)).contains(&day)
}

impl JalaliDate {
    /// Creates a Jalali date, validating every component.
    ///
    /// # Errors
    /// Returns `ValidationError` when the year is outside `1..=3177` or the
    /// month/day do not exist in that year.
    pub fn new(year: u16, month: u8, day: u8) -> Result<Self, ValidationError> {
        if !(MIN_JALALI_YEAR..=MAX_JALALI_YEAR).contains(&year) {
            return Err(ValidationError::OutOfRange {
                year: i64::from(year),
                min: MIN_JALALI_YEAR,
                max: MAX_JALALI_YEAR,
            });
        }
        Ok(Self {
            year: Year::new(year)?,
            month: Month::new(month)?,
            day: Day::jalali(day, year, month)?,
        })
    }

    /// Builds a date from computed components, enforcing the postcondition.
    fn checked(year: i64, month: i64, day: i64) -> Result<Self, ConversionError> {
        let invalid = ConversionError { year, month, day };
        if !validate_jalali_date(year, month, day) {
            return Err(invalid);
        }
        match (u16::try_from(year), u8::try_from(month), u8::try_from(day)) {
            (Ok(y), Ok(m), Ok(d)) => Self::new(y, m, d).map_err(|_| invalid),
            _ => Err(invalid),
        }
    }

    /// Converts a Gregorian date.
    ///
    /// # Errors
    /// `ValidationError::OutOfRange` outside Gregorian years 623..=3798;
    /// `ConversionError` if the result would break the month-length invariant.
    pub fn from_gregorian(date: GregorianDate) -> Result<Self, DateError> {
        if !(MIN_GREGORIAN_YEAR..=MAX_GREGORIAN_YEAR).contains(&date.year()) {
            return Err(ValidationError::OutOfRange {
                year: i64::from(date.year()),
                min: MIN_GREGORIAN_YEAR,
                max: MAX_GREGORIAN_YEAR,
            }
            .into());
        }

        let jdn = date.to_julian_day();

        // The Jalali year starting in this Gregorian year, or the one before
        // it when the date precedes Nowruz.
        let mut year = i64::from(date.year()) - JALALI_GREGORIAN_OFFSET;
        let mut start = nowruz_julian_day(year)?;
        if jdn < start {
            year -= 1;
            start = nowruz_julian_day(year)?;
        }

        let day_of_year = jdn - start;
        let first_half = i64::from(JALALI_FIRST_HALF_DAYS);
        let (month, day) = if day_of_year < first_half {
            let long = i64::from(JALALI_LONG_MONTH_DAYS);
            (1 + day_of_year / long, day_of_year % long + 1)
        } else {
            let short = i64::from(JALALI_SHORT_MONTH_DAYS);
            let rest = day_of_year - first_half;
            (
                i64::from(JALALI_LONG_MONTHS) + 1 + rest / short,
                rest % short + 1,
            )
        };

        Self::checked(year, month, day).map_err(|err| {
            tracing::warn!(%date, %err, "rejected out-of-invariant Jalali result");
            DateError::from(err)
        })
    }

    /// Converts back to the Gregorian calendar.
    ///
    /// # Errors
    /// `ValidationError` if the Gregorian result falls outside years 1..=9999.
    pub fn to_gregorian(&self) -> Result<GregorianDate, ValidationError> {
        let month = i64::from(self.month());
        let long = i64::from(JALALI_LONG_MONTH_DAYS);
        let month_start = if month <= i64::from(JALALI_LONG_MONTHS) {
            (month - 1) * long
        } else {
            i64::from(JALALI_FIRST_HALF_DAYS)
                + (month - 1 - i64::from(JALALI_LONG_MONTHS)) * i64::from(JALALI_SHORT_MONTH_DAYS)
        };
        let day_of_year = month_start + i64::from(self.day()) - 1;
        let start = nowruz_julian_day(i64::from(self.year()))?;
        GregorianDate::from_julian_day(start + day_of_year)
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

    /// Persian name of the month, Farvardin through Esfand.
    pub fn month_name(&self) -> &'static str {
        JALALI_MONTH_NAMES[usize::from(self.month() - 1)]
    }

    /// Zero-based day of the year (1 Farvardin is 0).
    pub fn day_of_year(&self) -> u16 {
        (1..self.month())
            .map(|m| u16::from(month_length(self.year(), m)))
            .sum::<u16>()
            + u16::from(self.day())
            - 1
    }
}

/// Converts a Gregorian `(year, month, day)` to Jalali.
///
/// # Errors
/// `ValidationError` for an impossible or unsupported input date,
/// `ConversionError` if the postcondition check fails.
pub fn gregorian_to_jalali(year: u16, month: u8, day: u8) -> Result<JalaliDate, DateError> {
    let date = GregorianDate::new(year, month, day)?;
    JalaliDate::from_gregorian(date)
}

/// Converts a Jalali `(year, month, day)` to Gregorian.
///
/// # Errors
/// `ValidationError` for an impossible or unsupported input date.
pub fn jalali_to_gregorian(year: u16, month: u8, day: u8) -> Result<GregorianDate, DateError> {
    Ok(JalaliDate::new(year, month, day)?.to_gregorian()?)
}

impl TryFrom<GregorianDate> for JalaliDate {
    type Error = DateError;

    fn try_from(value: GregorianDate) -> Result<Self, Self::Error> {
        Self::from_gregorian(value)
    }
}

impl FromStr for JalaliDate {
    type Err = ValidationError;

    /// Parses the localized form `YYYY/MM/DD`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyInput);
        }

        let parts: Vec<&str> = trimmed.split(JALALI_SEPARATOR).map(str::trim).collect();
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

impl serde::Serialize for JalaliDate {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for JalaliDate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
