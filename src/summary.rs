//! Offer summary emails.

use crate::mailbox::OutgoingMessage;
use crate::offer::OfferResult;
use std::fmt::Write as _;

/// Where a summary is sent and which message it answers.
#[derive(Debug, Clone, Copy, Default)]
pub struct SummaryContext<'a> {
    /// Configured summary recipient. Takes precedence over `sender`.
    pub recipient: Option<&'a str>,
    /// Address the lead came from.
    pub sender: Option<&'a str>,
    /// `Message-ID` of the lead, set as `In-Reply-To` when replying to the sender.
    pub in_reply_to: Option<&'a str>,
    /// Subject of the lead, answered as `Re: <subject>` when replying to the sender.
    pub subject: Option<&'a str>,
}

/// Builds the summary email for an offer.
///
/// Returns `None` when there is neither a configured recipient nor a sender to
/// reply to.
#[must_use]
pub fn compose(offer: &OfferResult, context: SummaryContext<'_>) -> Option<OutgoingMessage> {
    let analysis = || format!("Offer analysis: {}", offer.property.address);
    let (to, subject, in_reply_to) = match (context.recipient, context.sender) {
        (Some(recipient), _) => (recipient, analysis(), None),
        (None, Some(sender)) => (
            sender,
            context
                .subject
                .filter(|subject| !subject.trim().is_empty())
                .map_or_else(analysis, reply_subject),
            context.in_reply_to.map(str::to_string),
        ),
        (None, None) => return None,
    };

    Some(OutgoingMessage {
        to: to.to_string(),
        subject,
        body: render_body(offer),
        in_reply_to,
    })
}

/// `Re: <subject>`, without stacking prefixes on a subject that already has one.
fn reply_subject(subject: &str) -> String {
    let subject = subject.trim();
    let already_reply = subject
        .get(..3)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("re:"));
    if already_reply {
        subject.to_string()
    } else {
        format!("Re: {subject}")
    }
}

/// Plain text summary of an offer.
#[must_use]
pub fn render_body(offer: &OfferResult) -> String {
    let property = &offer.property;
    let mut body = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(body, "Address: {}", property.address);
    let _ = writeln!(body, "Bedrooms: {}", property.bedrooms);
    let _ = writeln!(body, "Bathrooms: {}", property.bathrooms);
    let _ = writeln!(body, "Comparables: {}", offer.comparable_count);
    let _ = writeln!(body, "Valuation: ${:.2}", offer.valuation);
    let _ = writeln!(body, "Repair costs: ${:.2}", offer.repair_costs);
    let _ = writeln!(body, "Maximum offer: ${:.2}", offer.max_offer);
    if !offer.is_viable() {
        let _ = writeln!(body);
        let _ = writeln!(body, "No viable offer: repairs exceed 60% of the valuation.");
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::CompleteDetails;

    fn offer(valuation: f64, repair_costs: f64) -> OfferResult {
        OfferResult {
            message_id: "17".into(),
            property: CompleteDetails {
                address: "123 Main St, FL 33701".into(),
                bedrooms: 3,
                bathrooms: 2,
            },
            comparable_count: 2,
            valuation,
            repair_costs,
            max_offer: crate::offer::max_offer(valuation, repair_costs),
        }
    }

    #[test]
    fn test_compose_to_configured_recipient() {
        let message = compose(
            &offer(232_000.0, 30_000.0),
            SummaryContext {
                recipient: Some("team@example.com"),
                sender: Some("seller@example.com"),
                in_reply_to: Some("<lead@example.com>"),
                subject: Some("Property for sale"),
            },
        )
        .unwrap();

        assert_eq!(message.to, "team@example.com");
        assert_eq!(message.subject, "Offer analysis: 123 Main St, FL 33701");
        assert_eq!(message.in_reply_to, None);
        assert!(message.body.contains("Valuation: $232000.00"));
        assert!(message.body.contains("Maximum offer: $109200.00"));
        assert!(!message.body.contains("No viable offer"));
    }

    #[test]
    fn test_compose_replies_to_sender() {
        let message = compose(
            &offer(232_000.0, 30_000.0),
            SummaryContext {
                recipient: None,
                sender: Some("seller@example.com"),
                in_reply_to: Some("<lead@example.com>"),
                subject: Some("Property for sale"),
            },
        )
        .unwrap();

        assert_eq!(message.to, "seller@example.com");
        assert_eq!(message.subject, "Re: Property for sale");
        assert_eq!(message.in_reply_to.as_deref(), Some("<lead@example.com>"));
    }

    #[test]
    fn test_reply_subject_fallbacks() {
        let context = SummaryContext {
            sender: Some("seller@example.com"),
            ..SummaryContext::default()
        };
        let message = compose(&offer(232_000.0, 30_000.0), context).unwrap();
        assert_eq!(message.subject, "Offer analysis: 123 Main St, FL 33701");

        let context = SummaryContext {
            subject: Some("RE: Property for sale"),
            ..context
        };
        let message = compose(&offer(232_000.0, 30_000.0), context).unwrap();
        assert_eq!(message.subject, "RE: Property for sale");
    }

    #[test]
    fn test_compose_without_destination() {
        assert!(compose(&offer(232_000.0, 30_000.0), SummaryContext::default()).is_none());
    }

    #[test]
    fn test_body_flags_negative_offer() {
        let body = render_body(&offer(40_000.0, 30_000.0));
        assert!(body.contains("Maximum offer: $-6000.00"));
        assert!(body.contains("No viable offer"));
    }
}
