//! # lead-triage
//!
//! Automated triage of real-estate leads arriving by email.
//!
//! One pass over the inbox:
//! - lists up to five unread messages, newest first
//! - pulls the street address and bed/bath counts out of each plain text body
//! - values the property as the mean of its comparables (`price/sqft * sqft`)
//! - computes the maximum allowable offer, `valuation * 0.6 - repair_costs`
//! - sends an offer summary, or marks the lead read when no comparables exist
//!
//! ## Quick Start
//!
//! ```no_run
//! use lead_triage::comps::{ComparableFetcher, HttpListingsSource, JsonListingsExtractor};
//! use lead_triage::{ImapMailbox, InboxProcessor, PasswordAuthenticator, TriageConfig};
//!
//! # async fn example() -> lead_triage::Result<()> {
//! let config = TriageConfig::builder()
//!     .email("leads@gmail.com")
//!     .listings_url("https://comps.example.com/v1")
//!     .build()?;
//!
//! let auth = PasswordAuthenticator::new("app-password");
//! let mut mailbox = ImapMailbox::connect(&config, &auth).await?.into_guard();
//!
//! let fetcher = ComparableFetcher::new(
//!     HttpListingsSource::new("https://comps.example.com/v1", config.timeouts.listings),
//!     JsonListingsExtractor,
//! );
//! let processor = InboxProcessor::new(fetcher, config.processing.clone());
//!
//! let report = processor.process_inbox(&mut mailbox).await?;
//! for offer in report.offers() {
//!     println!("{}: max offer {:.2}", offer.property.address, offer.max_offer);
//! }
//! mailbox.logout().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Offline pieces
//!
//! The extractor and the calculator are pure and need no mailbox:
//!
//! ```
//! use lead_triage::extractor::PropertyExtractor;
//! use lead_triage::offer::max_offer;
//!
//! let details = PropertyExtractor::new().extract("123 Main St, FL 33701 ... 3 bed 2 bath");
//! assert!(details.is_complete());
//! assert_eq!(max_offer(232_000.0, 30_000.0), 109_200.0);
//! ```
//!
//! ## Error Handling
//!
//! Only an unavailable mailbox ends a pass early. Everything that goes wrong with a
//! single message is recorded in the [`ProcessingReport`]. Use [`Error::is_retryable`]
//! to decide whether a failed step is worth repeating:
//!
//! ```
//! use lead_triage::Error;
//!
//! fn handle_error(error: &Error) {
//!     if error.is_retryable() {
//!         println!("Transient error, can retry: {}", error);
//!     } else {
//!         println!("Permanent error: {}", error);
//!     }
//! }
//! ```
//!
//! ## Observability
//!
//! Spans are named `Type::method` (`ImapMailbox::connect`,
//! `InboxProcessor::process_inbox`, `ComparableFetcher::fetch_comparables`) or
//! `module::fn` for internals (`session::search_unread`, `connection::open_tls`).
//! Common fields: `email`, `imap_host`, `message_id`, `address`, `limit`.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Public modules
pub mod auth;
pub mod cli;
pub mod comps;
pub mod config;
pub mod error;
pub mod extractor;
pub mod known_servers;
pub mod mailbox;
pub mod matcher;
pub mod offer;
pub mod processor;
pub mod summary;

// Internal modules
mod client;
mod connection;
mod dispatch;
mod parser;
mod session;

// Re-exports for ergonomic API
pub use auth::{
    Authenticator, MailCredentials, PasswordAuthenticator, RefreshTokenAuthenticator,
    StaticTokenAuthenticator,
};
pub use client::{ImapMailbox, ImapMailboxGuard};
pub use comps::{ComparableFetcher, ComparableListing, Valuation};
pub use config::{ProcessingConfig, TimeoutConfig, TriageConfig, TriageConfigBuilder};
pub use email_address::EmailAddress;
pub use error::{Error, ErrorCategory, Result};
pub use extractor::{PropertyDetails, PropertyExtractor};
pub use known_servers::ServerRegistry;
pub use mailbox::{Mailbox, OutgoingMessage};
pub use offer::{max_offer, OfferResult};
pub use processor::{Disposition, InboxProcessor, MessageOutcome, ProcessingReport};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_api_accessible() {
        let _ = TriageConfig::builder();
        let _ = PropertyExtractor::new();
        let _ = ServerRegistry::with_defaults();
        assert!(max_offer(0.0, 0.0).abs() < f64::EPSILON);
    }
}
