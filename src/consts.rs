/// Maximum valid year (inclusive)
pub const MAX_YEAR: u16 = 9999;

/// Maximum valid month (December / Esfand)
pub const MAX_MONTH: u8 = 12;

/// Month number for February
pub const FEBRUARY: u8 = 2;
/// Month number for March
pub const MARCH: u8 = 3;

/// Days in February for leap years
pub const FEBRUARY_DAYS_LEAP: u8 = 29;

/// Maximum days in each Gregorian month (index 0 is unused, months are 1-indexed)
/// February shows 28 days (non-leap year default)
pub const DAYS_IN_MONTH: [u8; 13] = [
    0,  // index 0 unused (months are 1-indexed)
    31, // January
    28, // February (non-leap, adjusted by is_leap_year check)
    31, // March
    30, // April
    31, // May
    30, // June
    31, // July
    31, // August
    30, // September
    31, // October
    30, // November
    31, // December
];

/// Leap year occurs every 4 years
pub(crate) const LEAP_YEAR_CYCLE: u16 = 4;
/// Century years are not leap years unless...
pub(crate) const CENTURY_CYCLE: u16 = 100;
/// ...they are divisible by 400 (Gregorian calendar correction)
pub(crate) const GREGORIAN_CYCLE: u16 = 400;

/// Jalali months 1..=6 have this many days
pub const JALALI_LONG_MONTH_DAYS: u8 = 31;
/// Jalali months 7..=11 have this many days
pub const JALALI_SHORT_MONTH_DAYS: u8 = 30;
/// Esfand in a common year
pub const ESFAND_DAYS: u8 = 29;
/// Esfand in a leap year
pub const ESFAND_DAYS_LEAP: u8 = 30;
/// Number of 31-day months at the start of the Jalali year
pub const JALALI_LONG_MONTHS: u8 = 6;
/// Day-of-year (0-based) on which Mehr, the first 30-day month, starts
pub const JALALI_FIRST_HALF_DAYS: u16 = 186;

/// Break-points of the Jalali leap cycle, in Jalali years.
/// Between consecutive entries the 33-year sub-cycle is regular.
pub const JALALI_BREAKS: [i64; 20] = [
    -61, 9, 38, 199, 426, 686, 756, 818, 1111, 1181, 1210, 1635, 2060, 2097, 2192, 2262, 2324,
    2394, 2456, 3178,
];

/// Offset between a Jalali year and the Gregorian year in which it starts
pub const JALALI_GREGORIAN_OFFSET: i64 = 621;

/// Earliest supported Jalali year
pub const MIN_JALALI_YEAR: u16 = 1;
/// Latest supported Jalali year (the break-point table ends at 3178)
pub const MAX_JALALI_YEAR: u16 = 3177;
/// Earliest Gregorian year whose every day falls in a supported Jalali year
pub const MIN_GREGORIAN_YEAR: u16 = 623;
/// Latest Gregorian year whose every day falls in a supported Jalali year
pub const MAX_GREGORIAN_YEAR: u16 = 3798;

/// Persian month names, Farvardin first
pub const JALALI_MONTH_NAMES: [&str; 12] = [
    "فروردین",
    "اردیبهشت",
    "خرداد",
    "تیر",
    "مرداد",
    "شهریور",
    "مهر",
    "آبان",
    "آذر",
    "دی",
    "بهمن",
    "اسفند",
];

/// Date component separator (ISO 8601 format)
pub const DATE_SEPARATOR: char = '-';
/// Separator used in every localized output
pub const JALALI_SEPARATOR: char = '/';

/// Earliest Gregorian year a matched candidate may resolve to
pub const DEFAULT_MIN_CANDIDATE_YEAR: u16 = 1900;
/// Latest Gregorian year a matched candidate may resolve to
pub const DEFAULT_MAX_CANDIDATE_YEAR: u16 = 2100;
/// Two-digit years up to this value land in the 2000s, above it in the 1900s
pub const DEFAULT_TWO_DIGIT_PIVOT: u16 = 30;
/// Shortest trimmed text worth running the matcher over ("today")
pub const DEFAULT_MIN_TEXT_LEN: usize = 5;
/// Quiet period that coalesces bursts of change notifications
pub const DEFAULT_DEBOUNCE_MS: u64 = 100;
/// Delay between document readiness and the first scan
pub const DEFAULT_READY_DELAY_MS: u64 = 300;

/// Elements whose text is never prose
pub const NON_PROSE_TAGS: [&str; 4] = ["script", "style", "noscript", "template"];

/// Allow-list entry matching every origin
pub const WILDCARD_ORIGIN: &str = "*";
/// Prefix of a suffix-matching allow-list entry
pub const WILDCARD_SUBDOMAIN_PREFIX: &str = "*.";
