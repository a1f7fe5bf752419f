//! Tunables for the localizer and the persisted settings shape.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::consts::{
    DEFAULT_DEBOUNCE_MS, DEFAULT_MAX_CANDIDATE_YEAR, DEFAULT_MIN_CANDIDATE_YEAR,
    DEFAULT_MIN_TEXT_LEN, DEFAULT_READY_DELAY_MS, DEFAULT_TWO_DIGIT_PIVOT, NON_PROSE_TAGS,
    WILDCARD_ORIGIN,
};

/// Configuration for matching and scanning.
///
/// Every field has a default, so a partial JSON object deserializes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalizerConfig {
    /// Quiet period after a change notification before the rescan runs
    pub debounce_ms: u64,

    /// Delay between the session being allowed and its first scan
    pub ready_delay_ms: u64,

    /// Texts shorter than this (after trimming) are never matched
    pub min_text_len: usize,

    /// Earliest Gregorian year a candidate may resolve to
    pub min_year: u16,

    /// Latest Gregorian year a candidate may resolve to
    pub max_year: u16,

    /// Two-digit years up to this value map to 20xx, above it to 19xx
    pub two_digit_pivot: u16,

    /// Element tags whose subtrees are not prose (compared case-insensitively)
    pub skip_tags: Vec<String>,
}

impl Default for LocalizerConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            ready_delay_ms: DEFAULT_READY_DELAY_MS,
            min_text_len: DEFAULT_MIN_TEXT_LEN,
            min_year: DEFAULT_MIN_CANDIDATE_YEAR,
            max_year: DEFAULT_MAX_CANDIDATE_YEAR,
            two_digit_pivot: DEFAULT_TWO_DIGIT_PIVOT,
            skip_tags: NON_PROSE_TAGS.iter().map(|t| (*t).to_string()).collect(),
        }
    }
}

impl LocalizerConfig {
    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub const fn ready_delay(&self) -> Duration {
        Duration::from_millis(self.ready_delay_ms)
    }

    /// Whether an element with this tag hides its text from scanning.
    pub fn is_non_prose(&self, tag: &str) -> bool {
        self.skip_tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

/// User-facing settings as the embedding application persists them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub enabled: bool,
    pub allowed_domains: Vec<String>,
    pub converted_count: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_domains: vec![WILDCARD_ORIGIN.to_string()],
            converted_count: 0,
        }
    }
}
