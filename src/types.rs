//! Validated date components shared by both calendars.
//!
//! A `Year`, `Month` or `Day` on its own does not say which calendar it
//! belongs to; the date type holding it does. Day validation therefore
//! comes in two flavours, [`Day::new`] for Gregorian months and
//! [`Day::jalali`] for Jalali ones.

use std::num::{NonZeroU8, NonZeroU16};

use serde::{Deserialize, Serialize};

use crate::ValidationError;
use crate::consts::{
    CENTURY_CYCLE, DAYS_IN_MONTH, FEBRUARY, FEBRUARY_DAYS_LEAP, GREGORIAN_CYCLE, LEAP_YEAR_CYCLE,
    MAX_MONTH, MAX_YEAR,
};
use crate::prelude::*;

/// Year in `1..=MAX_YEAR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct Year(NonZeroU16);

impl Year {
    /// # Errors
    /// `ValidationError::InvalidYear` for 0 or anything above `MAX_YEAR`.
    pub fn new(value: u16) -> Result<Self, ValidationError> {
        NonZeroU16::new(value)
            .filter(|_| value <= MAX_YEAR)
            .map(Self)
            .ok_or(ValidationError::InvalidYear(value))
    }

    #[inline]
    pub const fn get(self) -> u16 {
        self.0.get()
    }
}

impl TryFrom<u16> for Year {
    type Error = ValidationError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Year> for u16 {
    fn from(year: Year) -> Self {
        year.get()
    }
}

/// Month number in `1..=12`, valid for either calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Month(NonZeroU8);

impl Month {
    /// # Errors
    /// `ValidationError::InvalidMonth` for 0 or anything above 12.
    pub fn new(value: u8) -> Result<Self, ValidationError> {
        NonZeroU8::new(value)
            .filter(|_| value <= MAX_MONTH)
            .map(Self)
            .ok_or(ValidationError::InvalidMonth(value))
    }

    #[inline]
    pub const fn get(self) -> u8 {
        self.0.get()
    }
}

impl TryFrom<u8> for Month {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Month> for u8 {
    fn from(month: Month) -> Self {
        month.get()
    }
}

/// Day of month. Only the calendar constructors check the upper bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Day(NonZeroU8);

impl Day {
    /// Day of a Gregorian month.
    ///
    /// # Errors
    /// `ValidationError::InvalidDay` if `value` is 0 or past the month's end.
    pub fn new(value: u8, year: u16, month: u8) -> Result<Self, ValidationError> {
        Self::within(value, year, month, days_in_month(year, month))
    }

    /// Day of a Jalali month (31, 30, or 29/30 for Esfand).
    ///
    /// # Errors
    /// `ValidationError::InvalidDay` if `value` is 0 or past the month's end.
    pub fn jalali(value: u8, year: u16, month: u8) -> Result<Self, ValidationError> {
        Self::within(value, year, month, crate::jalali::month_length(year, month))
    }

    fn within(value: u8, year: u16, month: u8, last: u8) -> Result<Self, ValidationError> {
        NonZeroU8::new(value)
            .filter(|_| value <= last)
            .map(Self)
            .ok_or(ValidationError::InvalidDay {
                year,
                month,
                day: value,
            })
    }

    #[inline]
    pub const fn get(self) -> u8 {
        self.0.get()
    }
}

impl TryFrom<u8> for Day {
    type Error = ValidationError;

    /// Without a month to check against, only zero is rejected.
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::within(value, 0, 0, u8::MAX)
    }
}

impl From<Day> for u8 {
    fn from(day: Day) -> Self {
        day.get()
    }
}

/// Proleptic Gregorian leap rule.
pub const fn is_leap_year(year: u16) -> bool {
    (year % LEAP_YEAR_CYCLE == 0 && year % CENTURY_CYCLE != 0) || year % GREGORIAN_CYCLE == 0
}

/// Length of a Gregorian month. `month` must be in `1..=12`.
pub const fn days_in_month(year: u16, month: u8) -> u8 {
    debug_assert!(month != 0 && month <= MAX_MONTH);

    if month == FEBRUARY && is_leap_year(year) {
        FEBRUARY_DAYS_LEAP
    } else {
        DAYS_IN_MONTH[month as usize]
    }
}
