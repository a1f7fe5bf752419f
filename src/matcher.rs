//! Recognizes Gregorian dates written in running text.
//!
//! Pattern families are tried in a fixed order. A family never matches
//! characters that an earlier family already resolved to a date, so each
//! piece of text is converted at most once per pass.

use std::ops::Range;
use std::sync::LazyLock;

use regex::{Captures, Regex, RegexSet};
use tracing::{debug, warn};

use crate::config::LocalizerConfig;
use crate::consts::{
    DEFAULT_MAX_CANDIDATE_YEAR, DEFAULT_MIN_CANDIDATE_YEAR, DEFAULT_MIN_TEXT_LEN,
    DEFAULT_TWO_DIGIT_PIVOT,
};
use crate::gregorian::GregorianDate;
use crate::jalali::JalaliDate;
use crate::ValidationError;

/// Full or abbreviated English month name, captured.
const MONTH_NAME: &str = r"(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)";

/// The surface form a candidate was recognized in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternKind {
    /// `2024-03-20`, `2024/3/20`
    YearFirst,
    /// `20/03/2024`, `20-3-24`
    DayFirst,
    /// `20-Mar-24`
    DayMonthName,
    /// `Mar-20-24`
    MonthNameDay,
    /// `March 20, 2024`
    MonthDayYear,
    /// `20 March 2024`
    DayMonthYear,
    /// `yesterday`, `3 weeks ago`
    Relative,
}

impl PatternKind {
    /// Families in the order they are applied.
    pub const ALL: [Self; 7] = [
        Self::YearFirst,
        Self::DayFirst,
        Self::DayMonthName,
        Self::MonthNameDay,
        Self::MonthDayYear,
        Self::DayMonthYear,
        Self::Relative,
    ];

    fn source(self) -> String {
        match self {
            Self::YearFirst => r"\b([0-9]{4})[-/]([0-9]{1,2})[-/]([0-9]{1,2})\b".to_string(),
            Self::DayFirst => {
                r"\b([0-9]{1,2})[-/]([0-9]{1,2})[-/]([0-9]{4}|[0-9]{2})\b".to_string()
            }
            Self::DayMonthName => {
                format!(r"(?i)\b([0-9]{{1,2}})[-/]{MONTH_NAME}[-/]([0-9]{{4}}|[0-9]{{2}})\b")
            }
            Self::MonthNameDay => {
                format!(r"(?i)\b{MONTH_NAME}[-/]([0-9]{{1,2}})[-/]([0-9]{{4}}|[0-9]{{2}})\b")
            }
            Self::MonthDayYear => {
                format!(r"(?i)\b{MONTH_NAME}\.?\s+([0-9]{{1,2}}),?\s+([0-9]{{4}})\b")
            }
            Self::DayMonthYear => {
                format!(r"(?i)\b([0-9]{{1,2}})\s+{MONTH_NAME}\.?,?\s+([0-9]{{4}})\b")
            }
            Self::Relative => r"(?i)\b(?:(today)|(yesterday)|(tomorrow)|([0-9]{1,4}|an?)\s+(day|week|month|year)s?\s+ago)\b".to_string(),
        }
    }
}

#[allow(clippy::expect_used)]
static PATTERNS: LazyLock<Vec<(PatternKind, Regex)>> = LazyLock::new(|| {
    PatternKind::ALL
        .iter()
        .map(|kind| {
            let regex = Regex::new(&kind.source()).expect("date pattern must compile");
            (*kind, regex)
        })
        .collect()
});

#[allow(clippy::expect_used)]
static PATTERN_SET: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new(PatternKind::ALL.iter().map(|kind| kind.source()))
        .expect("date pattern set must compile")
});

/// Unit of a relative expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelativeUnit {
    Day,
    Week,
    Month,
    Year,
}

/// A date expressed relative to "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelativeDescriptor {
    Today,
    Yesterday,
    Tomorrow,
    Ago { amount: u32, unit: RelativeUnit },
}

impl RelativeDescriptor {
    /// Resolves against `today`.
    ///
    /// # Errors
    /// `ValidationError::OutOfRange` if the result leaves the representable years.
    pub fn resolve(self, today: GregorianDate) -> Result<GregorianDate, ValidationError> {
        match self {
            Self::Today => Ok(today),
            Self::Yesterday => today.add_days(-1),
            Self::Tomorrow => today.add_days(1),
            Self::Ago { amount, unit } => match unit {
                RelativeUnit::Day => today.add_days(-i64::from(amount)),
                RelativeUnit::Week => today.add_days(-7 * i64::from(amount)),
                RelativeUnit::Month => today.sub_months(amount),
                RelativeUnit::Year => today.sub_years(amount),
            },
        }
    }
}

/// What a candidate span denotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A concrete, valid Gregorian date inside the year window
    Date(GregorianDate),
    /// A phrase that needs a reference date to resolve
    Relative(RelativeDescriptor),
    /// Looked like a date but is not one; the text is kept
    Unresolvable(ValidationError),
}

/// A date-like span found in a piece of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateCandidate {
    /// Byte offsets into the scanned text
    pub span: Range<usize>,
    pub raw: String,
    pub pattern: PatternKind,
    pub resolution: Resolution,
}

/// Result of localizing one piece of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Localized {
    pub text: String,
    /// Number of dates rewritten
    pub conversions: usize,
}

/// Finds and rewrites dates in text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateMatcher {
    min_year: u16,
    max_year: u16,
    two_digit_pivot: u16,
    min_text_len: usize,
}

impl Default for DateMatcher {
    fn default() -> Self {
        Self {
            min_year: DEFAULT_MIN_CANDIDATE_YEAR,
            max_year: DEFAULT_MAX_CANDIDATE_YEAR,
            two_digit_pivot: DEFAULT_TWO_DIGIT_PIVOT,
            min_text_len: DEFAULT_MIN_TEXT_LEN,
        }
    }
}

impl DateMatcher {
    pub fn new(config: &LocalizerConfig) -> Self {
        Self {
            min_year: config.min_year,
            max_year: config.max_year,
            two_digit_pivot: config.two_digit_pivot,
            min_text_len: config.min_text_len,
        }
    }

    /// Cheap prefilter: long enough and at least one family matches somewhere.
    pub fn contains_date(&self, text: &str) -> bool {
        text.trim().chars().count() >= self.min_text_len && PATTERN_SET.is_match(text)
    }

    /// Two-digit year expansion around the pivot.
    pub const fn expand_two_digit_year(&self, value: u16) -> u16 {
        if value <= self.two_digit_pivot {
            2000 + value
        } else {
            1900 + value
        }
    }

    /// Every candidate in `text`, ordered by position.
    ///
    /// Candidates that resolve (to a date or a relative phrase) claim their
    /// span; later families skip anything overlapping a claimed span.
    /// Unresolvable candidates are reported but claim nothing.
    pub fn find_candidates(&self, text: &str) -> Vec<DateCandidate> {
        let mut candidates = Vec::new();
        let mut claimed: Vec<Range<usize>> = Vec::new();

        for (kind, regex) in PATTERNS.iter() {
            let mut claimed_by_family = Vec::new();
            for caps in regex.captures_iter(text) {
                let Some(whole) = caps.get(0) else {
                    continue;
                };
                let span = whole.range();
                if claimed
                    .iter()
                    .any(|c| c.start < span.end && span.start < c.end)
                {
                    continue;
                }

                let resolution = self.resolution(*kind, &caps);
                if !matches!(resolution, Resolution::Unresolvable(_)) {
                    claimed_by_family.push(span.clone());
                }
                candidates.push(DateCandidate {
                    span,
                    raw: whole.as_str().to_owned(),
                    pattern: *kind,
                    resolution,
                });
            }
            claimed.extend(claimed_by_family);
        }

        candidates.sort_by_key(|c| c.span.start);
        candidates
    }

    /// Resolves a candidate to a Gregorian date inside the year window.
    ///
    /// Relative phrases need `today`; without it they stay unresolved.
    ///
    /// # Errors
    /// The `ValidationError` explaining why the span must be left as is.
    pub fn resolve(
        &self,
        candidate: &DateCandidate,
        today: Option<GregorianDate>,
    ) -> Result<GregorianDate, ValidationError> {
        match &candidate.resolution {
            Resolution::Date(date) => Ok(*date),
            Resolution::Unresolvable(err) => Err(err.clone()),
            Resolution::Relative(descriptor) => {
                let today = today.ok_or_else(|| {
                    ValidationError::InvalidFormat(format!(
                        "{}: no reference date",
                        candidate.raw
                    ))
                })?;
                let date = descriptor.resolve(today)?;
                self.check_window(date.year())?;
                Ok(date)
            }
        }
    }

    /// Rewrites every resolvable date in `text` as a Jalali `YYYY/MM/DD`.
    ///
    /// `today` is the single reference date for all relative phrases in
    /// this call.
    pub fn localize_text(&self, text: &str, today: Option<GregorianDate>) -> Localized {
        let mut output = String::with_capacity(text.len());
        let mut cursor = 0;
        let mut conversions = 0;

        for candidate in self.find_candidates(text) {
            if candidate.span.start < cursor {
                continue;
            }
            let date = match self.resolve(&candidate, today) {
                Ok(date) => date,
                Err(err) => {
                    debug!(raw = %candidate.raw, %err, "left date candidate unchanged");
                    continue;
                }
            };
            let jalali = match JalaliDate::from_gregorian(date) {
                Ok(jalali) => jalali,
                Err(err) => {
                    warn!(raw = %candidate.raw, %date, %err, "conversion rejected");
                    continue;
                }
            };

            output.push_str(&text[cursor..candidate.span.start]);
            output.push_str(&jalali.to_string());
            cursor = candidate.span.end;
            conversions += 1;
        }
        output.push_str(&text[cursor..]);

        Localized {
            text: output,
            conversions,
        }
    }

    fn resolution(&self, kind: PatternKind, caps: &Captures<'_>) -> Resolution {
        let field = |i: usize| caps.get(i).map_or("", |m| m.as_str());
        let result = match kind {
            PatternKind::YearFirst => self.numeric(field(1), field(2), field(3)),
            PatternKind::DayFirst => self.numeric(field(3), field(2), field(1)),
            PatternKind::DayMonthName | PatternKind::DayMonthYear => {
                self.named(field(3), field(2), field(1))
            }
            PatternKind::MonthNameDay | PatternKind::MonthDayYear => {
                self.named(field(3), field(1), field(2))
            }
            PatternKind::Relative => return relative(caps),
        };
        match result {
            Ok(date) => Resolution::Date(date),
            Err(err) => Resolution::Unresolvable(err),
        }
    }

    fn numeric(&self, year: &str, month: &str, day: &str) -> Result<GregorianDate, ValidationError> {
        let month = parse_field::<u8>(month)?;
        self.build(year, month, day)
    }

    fn named(&self, year: &str, month: &str, day: &str) -> Result<GregorianDate, ValidationError> {
        let month =
            month_from_name(month).ok_or_else(|| ValidationError::UnknownMonthName(month.to_owned()))?;
        self.build(year, month, day)
    }

    fn build(&self, year: &str, month: u8, day: &str) -> Result<GregorianDate, ValidationError> {
        let value = parse_field::<u16>(year)?;
        let year = if year.len() == 2 {
            self.expand_two_digit_year(value)
        } else {
            value
        };
        self.check_window(year)?;
        GregorianDate::new(year, month, parse_field::<u8>(day)?)
    }

    const fn check_window(&self, year: u16) -> Result<(), ValidationError> {
        if year < self.min_year || year > self.max_year {
            return Err(ValidationError::YearOutsideWindow {
                year,
                min: self.min_year,
                max: self.max_year,
            });
        }
        Ok(())
    }
}

fn relative(caps: &Captures<'_>) -> Resolution {
    if caps.get(1).is_some() {
        return Resolution::Relative(RelativeDescriptor::Today);
    }
    if caps.get(2).is_some() {
        return Resolution::Relative(RelativeDescriptor::Yesterday);
    }
    if caps.get(3).is_some() {
        return Resolution::Relative(RelativeDescriptor::Tomorrow);
    }

    let amount = caps.get(4).map_or("", |m| m.as_str());
    let amount = if amount.eq_ignore_ascii_case("a") || amount.eq_ignore_ascii_case("an") {
        Ok(1)
    } else {
        parse_field::<u32>(amount)
    };
    let unit = match caps
        .get(5)
        .map(|m| m.as_str().to_ascii_lowercase())
        .as_deref()
    {
        Some("day") => RelativeUnit::Day,
        Some("week") => RelativeUnit::Week,
        Some("month") => RelativeUnit::Month,
        Some("year") => RelativeUnit::Year,
        _ => {
            return Resolution::Unresolvable(ValidationError::InvalidFormat(
                caps.get(0).map_or("", |m| m.as_str()).to_owned(),
            ));
        }
    };

    match amount {
        Ok(amount) => Resolution::Relative(RelativeDescriptor::Ago { amount, unit }),
        Err(err) => Resolution::Unresolvable(err),
    }
}

fn parse_field<T: std::str::FromStr>(s: &str) -> Result<T, ValidationError> {
    s.parse::<T>()
        .map_err(|_| ValidationError::InvalidFormat(s.to_owned()))
}

/// Accepted English spellings, matching the alternatives in [`MONTH_NAME`].
const MONTH_NAMES: [(&str, u8); 24] = [
    ("jan", 1),
    ("january", 1),
    ("feb", 2),
    ("february", 2),
    ("mar", 3),
    ("march", 3),
    ("apr", 4),
    ("april", 4),
    ("may", 5),
    ("jun", 6),
    ("june", 6),
    ("jul", 7),
    ("july", 7),
    ("aug", 8),
    ("august", 8),
    ("sep", 9),
    ("sept", 9),
    ("september", 9),
    ("oct", 10),
    ("october", 10),
    ("nov", 11),
    ("november", 11),
    ("dec", 12),
    ("december", 12),
];

/// Month number for a full English month name or one of its abbreviations.
/// A single trailing period is allowed (`"Sept."`).
pub fn month_from_name(name: &str) -> Option<u8> {
    let name = name.strip_suffix('.').unwrap_or(name);
    MONTH_NAMES
        .iter()
        .find(|(spelling, _)| spelling.eq_ignore_ascii_case(name))
        .map(|(_, month)| *month)
}
