//! Maximum allowable offer.

use crate::comps::Valuation;
use crate::extractor::CompleteDetails;
use serde::Serialize;

/// Repair cost estimate used when none is configured.
pub const DEFAULT_REPAIR_COSTS: f64 = 30_000.0;

/// Share of the valuation an investor is willing to pay before repairs.
pub const OFFER_RATIO: f64 = 0.6;

/// `valuation * 0.6 - repair_costs`.
///
/// Total over all inputs. A negative result means there is no viable offer; it is
/// not an error.
///
/// ```
/// use lead_triage::offer::max_offer;
///
/// assert_eq!(max_offer(232_000.0, 30_000.0), 109_200.0);
/// assert!(max_offer(40_000.0, 30_000.0) < 0.0);
/// ```
#[must_use]
pub fn max_offer(valuation: f64, repair_costs: f64) -> f64 {
    valuation * OFFER_RATIO - repair_costs
}

/// Valuation and offer computed for one lead.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OfferResult {
    /// Identifier of the message the lead came from.
    pub message_id: String,
    /// The property the offer is for.
    pub property: CompleteDetails,
    /// Number of comparables the valuation is based on.
    pub comparable_count: usize,
    /// Mean comparable value.
    pub valuation: f64,
    /// Repair costs that were subtracted.
    pub repair_costs: f64,
    /// Maximum allowable offer.
    pub max_offer: f64,
}

impl OfferResult {
    /// Computes the offer for a valued property.
    #[must_use]
    pub fn new(
        message_id: impl Into<String>,
        property: CompleteDetails,
        comparable_count: usize,
        valuation: Valuation,
        repair_costs: f64,
    ) -> Self {
        let valuation = valuation.value();
        Self {
            message_id: message_id.into(),
            property,
            comparable_count,
            valuation,
            repair_costs,
            max_offer: max_offer(valuation, repair_costs),
        }
    }

    /// Returns `true` when the maximum offer is positive.
    #[must_use]
    pub fn is_viable(&self) -> bool {
        self.max_offer > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comps::ComparableListing;

    fn details() -> CompleteDetails {
        CompleteDetails {
            address: "123 Main St, FL 33701".into(),
            bedrooms: 3,
            bathrooms: 2,
        }
    }

    #[test]
    fn test_max_offer_scenario() {
        assert!((max_offer(232_000.0, DEFAULT_REPAIR_COSTS) - 109_200.0).abs() < 1e-9);
    }

    #[test]
    fn test_max_offer_formula_holds_for_negative_inputs() {
        for (v, r) in [(-10_000.0, 0.0), (50_000.0, 45_000.0), (0.0, -1_000.0), (1e9, 1e3)] {
            assert!((max_offer(v, r) - (v * 0.6 - r)).abs() < 1e-6);
        }
        assert!(max_offer(50_000.0, 45_000.0) < 0.0);
    }

    #[test]
    fn test_offer_result() {
        let comps = [
            ComparableListing {
                price_per_square_foot: 200.0,
                square_feet: 1000.0,
            },
            ComparableListing {
                price_per_square_foot: 220.0,
                square_feet: 1200.0,
            },
        ];
        let valuation = Valuation::from_comparables(&comps).unwrap();
        let offer = OfferResult::new("42", details(), comps.len(), valuation, DEFAULT_REPAIR_COSTS);

        assert_eq!(offer.comparable_count, 2);
        assert!((offer.valuation - 232_000.0).abs() < 1e-9);
        assert!((offer.max_offer - 109_200.0).abs() < 1e-9);
        assert!(offer.is_viable());
    }

    #[test]
    fn test_offer_not_viable() {
        let comps = [ComparableListing {
            price_per_square_foot: 50.0,
            square_feet: 800.0,
        }];
        let valuation = Valuation::from_comparables(&comps).unwrap();
        let offer = OfferResult::new("9", details(), 1, valuation, DEFAULT_REPAIR_COSTS);
        assert!(!offer.is_viable());
        assert!((offer.max_offer - (40_000.0 * 0.6 - 30_000.0)).abs() < 1e-9);
    }
}
