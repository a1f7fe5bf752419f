//! Localize Gregorian dates embedded in document text into the Persian
//! (Jalali) solar calendar, in place.
//!
//! The crate is layered leaves first:
//!
//! - [`gregorian`] and [`jalali`]: pure calendar arithmetic. Conversion goes
//!   through the Julian day number and the Jalali break-point table.
//! - [`matcher`]: finds date-like spans in text and resolves them.
//! - [`document`] and [`session`]: walk a document's text leaves, rewrite
//!   matched spans and keep doing so as the document changes.
//! - [`lifecycle`] and [`host`]: gate a session on enablement and an origin
//!   allow-list supplied by the embedding application.

mod consts;
mod prelude;
mod types;

pub mod config;
pub mod document;
pub mod gregorian;
pub mod host;
pub mod jalali;
pub mod lifecycle;
pub mod matcher;
pub mod session;

pub use config::{LocalizerConfig, Settings};
pub use consts::*;
pub use document::{
    ChangeBatch, ChangeSubscription, Document, DocumentError, DocumentTree, NodeId, NodeKind,
    SubscriptionId, TextLeafCursor, TextLeaves, inside_non_prose,
};
pub use gregorian::GregorianDate;
pub use host::{
    AllowList, AtomicCounter, Clock, ConversionCounter, EnablementStore, FixedClock, NoopCounter,
    OriginAllowList, SettingsStore, SystemClock, hostname,
};
pub use jalali::{
    JalaliDate, gregorian_to_jalali, is_leap_year, jalali_to_gregorian, validate_jalali_date,
};
pub use lifecycle::LifecycleController;
pub use matcher::{
    DateCandidate, DateMatcher, Localized, PatternKind, RelativeDescriptor, RelativeUnit,
    Resolution, month_from_name,
};
pub use session::{
    EnvironmentError, ScanReport, Session, SessionEvent, SessionHandle, SessionState,
    SharedDocument, calendar_self_check,
};
pub use types::{Day, Month, Year};

use crate::prelude::*;

/// A date (or one of its components) failed a range or calendar check.
///
/// Matched text that produces one of these is left exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum ValidationError {
    #[display(fmt = "Invalid date format: {_0}")]
    InvalidFormat(String),
    #[display(fmt = "Invalid year: {} (must be 1-{})", "_0", MAX_YEAR)]
    InvalidYear(u16),
    #[display(fmt = "Invalid month: {} (must be 1-{})", "_0", MAX_MONTH)]
    InvalidMonth(u8),
    #[display(fmt = "Invalid day {day} for month {year}-{month:02}")]
    InvalidDay { year: u16, month: u8, day: u8 },
    #[display(fmt = "Year {year} is outside the supported calendar range {min}-{max}")]
    OutOfRange { year: i64, min: u16, max: u16 },
    #[display(fmt = "Year {year} is outside the accepted window {min}-{max}")]
    YearOutsideWindow { year: u16, min: u16, max: u16 },
    #[display(fmt = "Unknown month name: {_0}")]
    UnknownMonthName(String),
    #[display(fmt = "Empty date string")]
    EmptyInput,
}

impl std::error::Error for ValidationError {}

/// A computed Jalali value broke the month-length invariant.
///
/// The conversion algorithm cannot produce one; it exists so the postcondition
/// check has something to report instead of a bad date.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("computed Jalali date {year}/{month:02}/{day:02} violates the month-length invariant")]
pub struct ConversionError {
    pub year: i64,
    pub month: i64,
    pub day: i64,
}

/// Error type for calendar conversions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DateError {
    /// Input was not a valid, supported date.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Output failed the Jalali postcondition.
    #[error(transparent)]
    Conversion(#[from] ConversionError),
}
