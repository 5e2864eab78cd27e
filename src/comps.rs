//! Comparable listings and valuation.
//!
//! The fetcher turns a subject address into a set of comparable listings and a single
//! valuation. Two collaborators sit behind traits because neither the listings source
//! nor its response schema is fixed:
//!
//! - [`ListingsSource`] retrieves raw content for an address
//!   ([`HttpListingsSource`] is the HTTP implementation).
//! - [`ListingsExtractor`] turns that content into [`ComparableListing`] records
//!   ([`JsonListingsExtractor`] understands a simple JSON shape).
//!
//! Every listing contributes equally to the valuation; there is no similarity
//! weighting or distance filtering.

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// One comparable property as reported by the listings source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComparableListing {
    /// Price per square foot.
    pub price_per_square_foot: f64,
    /// Living area in square feet.
    pub square_feet: f64,
}

impl ComparableListing {
    /// Estimated total price of this comparable.
    #[must_use]
    pub fn total_value(&self) -> f64 {
        self.price_per_square_foot * self.square_feet
    }

    /// Returns `true` when both figures are strictly positive and their product is finite.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.price_per_square_foot.is_finite()
            && self.square_feet.is_finite()
            && self.price_per_square_foot > 0.0
            && self.square_feet > 0.0
            && self.total_value().is_finite()
    }
}

/// Aggregate value of a subject property derived from its comparables.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
pub struct Valuation(f64);

impl Valuation {
    /// Mean of `price_per_square_foot * square_feet` over the listings.
    ///
    /// Returns `None` for an empty slice rather than a zero or NaN valuation, and when
    /// the mean is not finite.
    ///
    /// ```
    /// use lead_triage::comps::{ComparableListing, Valuation};
    ///
    /// let comps = [
    ///     ComparableListing { price_per_square_foot: 200.0, square_feet: 1000.0 },
    ///     ComparableListing { price_per_square_foot: 220.0, square_feet: 1200.0 },
    /// ];
    /// assert_eq!(Valuation::from_comparables(&comps).unwrap().value(), 232_000.0);
    /// assert!(Valuation::from_comparables(&[]).is_none());
    /// ```
    #[must_use]
    pub fn from_comparables(listings: &[ComparableListing]) -> Option<Self> {
        if listings.is_empty() {
            return None;
        }
        let total: f64 = listings.iter().map(ComparableListing::total_value).sum();
        #[allow(clippy::cast_precision_loss)]
        let count = listings.len() as f64;
        let mean = total / count;
        mean.is_finite().then_some(Self(mean))
    }

    /// The valuation as a plain number.
    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }
}

impl std::fmt::Display for Valuation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// Comparables found for an address together with their valuation.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparableSet {
    /// The listings, in source order.
    pub listings: Vec<ComparableListing>,
    /// Mean total value of the listings.
    pub valuation: Valuation,
}

/// Retrieves raw listings content for an address.
#[async_trait]
pub trait ListingsSource: Send + Sync {
    /// Looks up the address and returns the raw response body.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, timeout, or a non-success answer.
    async fn lookup(&self, address: &str) -> Result<String>;
}

/// Parses raw listings content into comparable records.
///
/// Implementations must not fail: content they cannot understand yields no listings.
pub trait ListingsExtractor: Send + Sync {
    /// Extracts zero or more comparables from the content.
    fn extract(&self, raw: &str) -> Vec<ComparableListing>;
}

/// Builds the path segment used to look an address up: whitespace runs become `-`.
///
/// ```
/// use lead_triage::comps::lookup_key;
///
/// assert_eq!(lookup_key("123 Main St, FL 33701"), "123-Main-St,-FL-33701");
/// ```
#[must_use]
pub fn lookup_key(address: &str) -> String {
    address.split_whitespace().collect::<Vec<_>>().join("-")
}

/// Listings source reached over HTTP(S) at `{base_url}/{lookup_key}`.
#[derive(Debug, Clone)]
pub struct HttpListingsSource {
    base_url: String,
    timeout: Duration,
    http: reqwest::Client,
}

impl HttpListingsSource {
    /// Creates a source rooted at `base_url` with a lookup timeout.
    #[must_use]
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            timeout,
            http: reqwest::Client::new(),
        }
    }

    /// URL requested for the address.
    #[must_use]
    pub fn lookup_url(&self, address: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            lookup_key(address)
        )
    }
}

#[async_trait]
impl ListingsSource for HttpListingsSource {
    #[instrument(name = "HttpListingsSource::lookup", skip(self))]
    async fn lookup(&self, address: &str) -> Result<String> {
        let url = self.lookup_url(address);
        debug!(url = %url, "Requesting comparables");

        let response = self
            .http
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|source| {
                if source.is_timeout() {
                    Error::ListingsTimeout {
                        address: address.to_string(),
                        timeout: self.timeout,
                    }
                } else {
                    Error::ListingsRequest {
                        address: address.to_string(),
                        source,
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::ListingsStatus {
                address: address.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .text()
            .await
            .map_err(|source| Error::ListingsRequest {
                address: address.to_string(),
                source,
            })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonListings {
    List(Vec<serde_json::Value>),
    Wrapped { comparables: Vec<serde_json::Value> },
}

/// Reads comparables from JSON.
///
/// Accepts either a bare array of `{"price_per_square_foot", "square_feet"}` objects or
/// an object with a `comparables` array. Each record is read on its own: records with
/// missing, null or non-numeric fields, or values that are not finite and positive, are
/// dropped without affecting their siblings.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonListingsExtractor;

impl ListingsExtractor for JsonListingsExtractor {
    fn extract(&self, raw: &str) -> Vec<ComparableListing> {
        let records = match serde_json::from_str::<JsonListings>(raw) {
            Ok(JsonListings::List(records) | JsonListings::Wrapped { comparables: records }) => {
                records
            }
            Err(e) => {
                warn!(error = %e, "Listings content is not in the expected JSON shape");
                return Vec::new();
            }
        };

        let total = records.len();
        let valid: Vec<_> = records
            .into_iter()
            .filter_map(|record| serde_json::from_value::<ComparableListing>(record).ok())
            .filter(ComparableListing::is_valid)
            .collect();
        if valid.len() < total {
            debug!(dropped = total - valid.len(), "Dropped invalid comparables");
        }
        valid
    }
}

/// Combines a source and an extractor into the comparables lookup.
#[derive(Debug)]
pub struct ComparableFetcher<S, E> {
    source: S,
    extractor: E,
}

impl<S, E> ComparableFetcher<S, E>
where
    S: ListingsSource,
    E: ListingsExtractor,
{
    /// Creates a fetcher from its two collaborators.
    #[must_use]
    pub fn new(source: S, extractor: E) -> Self {
        Self { source, extractor }
    }

    /// Retrieves comparables for an address and values them.
    ///
    /// Any retrieval failure or an empty extraction is reported as
    /// [`Error::ComparablesNotFound`]; there is no partial result and no retry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ComparablesNotFound`] when nothing usable was retrieved.
    #[instrument(name = "ComparableFetcher::fetch_comparables", skip(self))]
    pub async fn fetch_comparables(&self, address: &str) -> Result<ComparableSet> {
        let raw = self.source.lookup(address).await.map_err(|e| {
            warn!(error = %e, category = %e.category(), "Listings lookup failed");
            Error::ComparablesNotFound {
                address: address.to_string(),
                reason: e.to_string(),
            }
        })?;

        let listings = self.extractor.extract(&raw);
        let Some(valuation) = Valuation::from_comparables(&listings) else {
            let reason = if listings.is_empty() {
                "no listings extracted"
            } else {
                "valuation is not a finite number"
            };
            return Err(Error::ComparablesNotFound {
                address: address.to_string(),
                reason: reason.into(),
            });
        };

        debug!(count = listings.len(), valuation = %valuation, "Comparables found");

        Ok(ComparableSet {
            listings,
            valuation,
        })
    }
}
