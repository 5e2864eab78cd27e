//! Pattern matching over lead message bodies.
//!
//! This module provides the [`Matcher`] trait and the listing-specific matchers the
//! property extractor is built from. Every matcher reports the **first** match in the
//! text; there is no scoring of alternative candidates.
//!
//! # Example
//!
//! ```
//! use lead_triage::matcher::{AddressMatcher, Matcher, RoomCountMatcher};
//!
//! let body = "New lead: 123 Main St, FL 33701. Seller says 3 bed 2 bath.";
//!
//! let address = AddressMatcher::new();
//! assert_eq!(address.find_match(body).as_deref(), Some("123 Main St, FL 33701"));
//!
//! let rooms = RoomCountMatcher::new().find_counts(body).unwrap();
//! assert_eq!((rooms.bedrooms, rooms.bathrooms), (Some(3), Some(2)));
//! ```

use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

/// `<1-5 digits> <words and spaces>, <2-letter state> <5-digit ZIP>`.
const ADDRESS_PATTERN: &str = r"\b(\d{1,5} [\w ]+, [A-Z]{2} \d{5})\b";

/// `<n> bed|br ... <n> bath|ba`, case-insensitive, shortest gap between the counts.
const ROOM_COUNT_PATTERN: &str = r"(?i)(\d+)\s*(?:bed|br).*?(\d+)\s*(?:bath|ba)";

static ADDRESS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(ADDRESS_PATTERN).expect("address pattern compiles"));

static ROOM_COUNT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(ROOM_COUNT_PATTERN).expect("room count pattern compiles"));

/// Trait for matching and extracting content from message bodies.
///
/// Implement this trait to plug a different address recognizer into the
/// [`PropertyExtractor`](crate::extractor::PropertyExtractor).
pub trait Matcher: Send + Sync {
    /// Attempts to find and extract matching content from the text.
    ///
    /// Returns the first match, or `None` when the text has none.
    fn find_match<'a>(&self, text: &'a str) -> Option<Cow<'a, str>>;

    /// Returns a human-readable description of what this matcher looks for.
    ///
    /// Used in logging and error messages.
    fn description(&self) -> &str;
}

/// Regex-based matcher that extracts the first capture group of the first match.
///
/// ```
/// use lead_triage::matcher::{RegexMatcher, Matcher};
///
/// let mls = RegexMatcher::new(r"MLS#\s*(\w+)").unwrap();
/// assert_eq!(mls.find_match("Listing MLS# U8123456 just hit"), Some("U8123456".into()));
/// ```
#[derive(Debug, Clone)]
pub struct RegexMatcher {
    regex: Regex,
    description: String,
}

impl RegexMatcher {
    /// Creates a new regex matcher.
    ///
    /// The regex should contain at least one capture group.
    ///
    /// # Errors
    ///
    /// Returns an error if the regex pattern is invalid.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(pattern)?;
        Ok(Self {
            description: format!("regex pattern: {pattern}"),
            regex,
        })
    }

    /// Creates a new regex matcher with a custom description.
    ///
    /// # Errors
    ///
    /// Returns an error if the regex pattern is invalid.
    pub fn with_description(
        pattern: &str,
        description: impl Into<String>,
    ) -> Result<Self, regex::Error> {
        let regex = Regex::new(pattern)?;
        Ok(Self {
            description: description.into(),
            regex,
        })
    }

    fn from_compiled(regex: &Regex, description: impl Into<String>) -> Self {
        Self {
            regex: regex.clone(),
            description: description.into(),
        }
    }
}

impl Matcher for RegexMatcher {
    fn find_match<'a>(&self, text: &'a str) -> Option<Cow<'a, str>> {
        self.regex
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| Cow::Borrowed(m.as_str()))
    }

    fn description(&self) -> &str {
        &self.description
    }
}

/// Matcher for US street addresses such as `123 Main St, FL 33701`.
///
/// The address is returned exactly as written; casing and spacing are not normalized.
#[derive(Debug, Clone)]
pub struct AddressMatcher {
    inner: RegexMatcher,
}

impl AddressMatcher {
    /// Creates the default street address matcher.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RegexMatcher::from_compiled(&ADDRESS_REGEX, "street address with state and ZIP"),
        }
    }
}

impl Default for AddressMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Matcher for AddressMatcher {
    fn find_match<'a>(&self, text: &'a str) -> Option<Cow<'a, str>> {
        self.inner.find_match(text)
    }

    fn description(&self) -> &str {
        self.inner.description()
    }
}

/// Bedroom and bathroom counts read from one bed/bath phrase.
///
/// A count that does not fit a `u32`, or is zero, is reported as `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomCounts {
    /// Number of bedrooms.
    pub bedrooms: Option<u32>,
    /// Number of bathrooms.
    pub bathrooms: Option<u32>,
}

/// Matcher for phrases like `3 bed 2 bath`, `4br/3ba` or `2 Beds, 1 Bath`.
#[derive(Debug, Clone)]
pub struct RoomCountMatcher {
    regex: Regex,
}

impl RoomCountMatcher {
    /// Creates the default bed/bath matcher.
    #[must_use]
    pub fn new() -> Self {
        Self {
            regex: ROOM_COUNT_REGEX.clone(),
        }
    }

    /// Returns the counts from the first bed/bath phrase, or `None` when there is none.
    #[must_use]
    pub fn find_counts(&self, text: &str) -> Option<RoomCounts> {
        let caps = self.regex.captures(text)?;
        let count = |i: usize| {
            caps.get(i)
                .and_then(|m| m.as_str().parse::<u32>().ok())
                .filter(|n| *n > 0)
        };

        Some(RoomCounts {
            bedrooms: count(1),
            bathrooms: count(2),
        })
    }

    /// Human-readable description for logs.
    #[must_use]
    pub fn description(&self) -> &'static str {
        "bed/bath counts"
    }
}

impl Default for RoomCountMatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regex_matcher() {
        let matcher = RegexMatcher::new(r"asking\s*\$([\d,]+)").unwrap();
        assert_eq!(
            matcher.find_match("Seller is asking $245,000 firm").as_deref(),
            Some("245,000")
        );
        assert_eq!(matcher.find_match("No price given"), None);
    }

    #[test]
    fn test_regex_matcher_returns_borrowed() {
        let matcher = RegexMatcher::new(r"MLS#(\w+)").unwrap();
        let result = matcher.find_match("MLS#A1");
        assert!(matches!(result, Some(Cow::Borrowed(_))));
    }

    #[test]
    fn test_address_basic() {
        let matcher = AddressMatcher::new();
        assert_eq!(
            matcher
                .find_match("123 Main St, FL 33701 ... 3 bed 2 bath")
                .as_deref(),
            Some("123 Main St, FL 33701")
        );
    }

    #[test]
    fn test_address_first_match_wins() {
        let matcher = AddressMatcher::new();
        let text = "Subject 45 Oak Ave, TX 78704\nAlso see 9 Pine Rd, TX 78702";
        assert_eq!(
            matcher.find_match(text).as_deref(),
            Some("45 Oak Ave, TX 78704")
        );
    }

    #[test]
    fn test_address_not_normalized() {
        let matcher = AddressMatcher::new();
        assert_eq!(
            matcher.find_match("at 77 north  SHORE dr, CA 90210").as_deref(),
            Some("77 north  SHORE dr, CA 90210")
        );
    }

    #[test]
    fn test_address_requires_state_and_zip() {
        let matcher = AddressMatcher::new();
        assert_eq!(matcher.find_match("123 Main St, Tampa"), None);
        assert_eq!(matcher.find_match("123 Main St, FL 3370"), None);
        assert_eq!(matcher.find_match("123456 Main St, FL 33701"), None);
    }

    #[test]
    fn test_room_counts_basic() {
        let counts = RoomCountMatcher::new()
            .find_counts("Cute place, 3 bed 2 bath, needs work")
            .unwrap();
        assert_eq!(counts.bedrooms, Some(3));
        assert_eq!(counts.bathrooms, Some(2));
    }

    #[test]
    fn test_room_counts_abbreviations_and_case() {
        let matcher = RoomCountMatcher::new();
        let counts = matcher.find_counts("4BR/3BA ranch").unwrap();
        assert_eq!((counts.bedrooms, counts.bathrooms), (Some(4), Some(3)));

        let counts = matcher.find_counts("2 Beds, 1 Bath").unwrap();
        assert_eq!((counts.bedrooms, counts.bathrooms), (Some(2), Some(1)));
    }

    #[test]
    fn test_room_counts_first_phrase() {
        let counts = RoomCountMatcher::new()
            .find_counts("3 bed 2 bath main house, 1 bed 1 bath guest house")
            .unwrap();
        assert_eq!((counts.bedrooms, counts.bathrooms), (Some(3), Some(2)));
    }

    #[test]
    fn test_room_counts_zero_is_unset() {
        let counts = RoomCountMatcher::new()
            .find_counts("0 bed 1 bath studio")
            .unwrap();
        assert_eq!(counts.bedrooms, None);
        assert_eq!(counts.bathrooms, Some(1));
    }

    #[test]
    fn test_room_counts_missing() {
        let matcher = RoomCountMatcher::new();
        assert_eq!(matcher.find_counts("3 bedrooms, no idea on the rest"), None);
        assert_eq!(matcher.find_counts("Call me about the house"), None);
    }
}
