//! Property detail extraction from lead message bodies.

use crate::matcher::{AddressMatcher, Matcher, RoomCountMatcher};
use serde::Serialize;
use tracing::debug;

/// Property details recognized in one message body.
///
/// Fields the body does not mention are `None`; a zero count is never used as a
/// placeholder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PropertyDetails {
    /// Street address, exactly as written in the body.
    pub address: Option<String>,
    /// Number of bedrooms (always > 0 when present).
    pub bedrooms: Option<u32>,
    /// Number of bathrooms (always > 0 when present).
    pub bathrooms: Option<u32>,
}

impl PropertyDetails {
    /// Returns `true` when address and both room counts are present.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// Names of the fields that were not found.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.address.is_none() {
            missing.push("address");
        }
        if self.bedrooms.is_none() {
            missing.push("bedrooms");
        }
        if self.bathrooms.is_none() {
            missing.push("bathrooms");
        }
        missing
    }

    /// Converts into a [`CompleteDetails`] when every field is present.
    #[must_use]
    pub fn complete(self) -> Option<CompleteDetails> {
        Some(CompleteDetails {
            address: self.address?,
            bedrooms: self.bedrooms?,
            bathrooms: self.bathrooms?,
        })
    }
}

/// Property details with every field present; the input to a comparables lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompleteDetails {
    /// Street address.
    pub address: String,
    /// Number of bedrooms.
    pub bedrooms: u32,
    /// Number of bathrooms.
    pub bathrooms: u32,
}

/// Recognizes an address and bed/bath counts in free text.
///
/// Pure: the same body always yields the same [`PropertyDetails`].
///
/// ```
/// use lead_triage::extractor::PropertyExtractor;
///
/// let details = PropertyExtractor::new().extract("123 Main St, FL 33701 ... 3 bed 2 bath");
/// assert_eq!(details.address.as_deref(), Some("123 Main St, FL 33701"));
/// assert_eq!(details.bedrooms, Some(3));
/// assert_eq!(details.bathrooms, Some(2));
/// ```
pub struct PropertyExtractor {
    address: Box<dyn Matcher>,
    rooms: RoomCountMatcher,
}

impl PropertyExtractor {
    /// Creates an extractor with the default US address matcher.
    #[must_use]
    pub fn new() -> Self {
        Self::with_address_matcher(AddressMatcher::new())
    }

    /// Creates an extractor with a custom address matcher.
    #[must_use]
    pub fn with_address_matcher(matcher: impl Matcher + 'static) -> Self {
        Self {
            address: Box::new(matcher),
            rooms: RoomCountMatcher::new(),
        }
    }

    /// Extracts property details from a message body.
    #[must_use]
    pub fn extract(&self, body: &str) -> PropertyDetails {
        let address = self.address.find_match(body).map(|m| m.into_owned());
        let counts = self.rooms.find_counts(body);

        let details = PropertyDetails {
            address,
            bedrooms: counts.and_then(|c| c.bedrooms),
            bathrooms: counts.and_then(|c| c.bathrooms),
        };

        debug!(
            address_matcher = %self.address.description(),
            rooms_matcher = %self.rooms.description(),
            missing = ?details.missing_fields(),
            "Extracted property details"
        );

        details
    }
}

impl Default for PropertyExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PropertyExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyExtractor")
            .field("address", &self.address.description())
            .field("rooms", &self.rooms.description())
            .finish()
    }
}
