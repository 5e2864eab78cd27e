//! The inbox processor: one triage pass over a mailbox.
//!
//! Each unread message moves through the pipeline independently and ends in exactly
//! one [`Disposition`]:
//!
//! | Disposition        | Cause                                         | Read state |
//! |--------------------|-----------------------------------------------|------------|
//! | `Skipped`          | no `text/plain` body, or incomplete details   | untouched  |
//! | `MarkedRead`       | no comparables for the address                | read       |
//! | `Processed`        | offer computed and summary sent               | untouched  |
//! | `DispatchFailed`   | offer computed, summary could not be sent     | untouched  |
//! | `Failed`           | the mailbox failed fetching or flagging it    | unknown    |
//!
//! Only a failure to list unread messages aborts the pass.

use crate::comps::{ComparableFetcher, ListingsExtractor, ListingsSource};
use crate::config::ProcessingConfig;
use crate::error::{Error, Result};
use crate::extractor::PropertyExtractor;
use crate::mailbox::Mailbox;
use crate::offer::OfferResult;
use crate::parser::parse_lead;
use crate::summary::{compose, SummaryContext};
use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

/// Terminal state of one message within a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// An offer was computed and the summary was sent.
    Processed,
    /// An offer was computed but sending the summary failed.
    DispatchFailed,
    /// No comparables were found; the message was marked read.
    MarkedRead,
    /// The message had no usable body or incomplete property details.
    Skipped,
    /// The mailbox failed while fetching or flagging the message.
    Failed,
}

impl std::fmt::Display for Disposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Processed => "processed",
            Self::DispatchFailed => "dispatch_failed",
            Self::MarkedRead => "marked_read",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// What happened to one message.
#[derive(Debug)]
pub struct MessageOutcome {
    /// Mailbox identifier of the message.
    pub message_id: String,
    /// Terminal state reached.
    pub disposition: Disposition,
    /// The error behind any disposition other than `Processed`.
    ///
    /// For `MarkedRead` this is the [`Error::ComparablesNotFound`] that caused it.
    pub error: Option<Error>,
}

impl MessageOutcome {
    fn new(message_id: &str, disposition: Disposition, error: Option<Error>) -> Self {
        Self {
            message_id: message_id.to_string(),
            disposition,
            error,
        }
    }
}

/// Result of one pass over the mailbox.
#[derive(Debug)]
pub struct ProcessingReport {
    offers: Vec<OfferResult>,
    outcomes: Vec<MessageOutcome>,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
}

impl ProcessingReport {
    /// Offers computed in this pass, in mailbox order.
    ///
    /// Includes offers whose summary could not be sent.
    #[must_use]
    pub fn offers(&self) -> &[OfferResult] {
        &self.offers
    }

    /// Consumes the report, returning the offers.
    #[must_use]
    pub fn into_offers(self) -> Vec<OfferResult> {
        self.offers
    }

    /// Per-message outcomes, in mailbox order.
    #[must_use]
    pub fn outcomes(&self) -> &[MessageOutcome] {
        &self.outcomes
    }

    /// Number of messages examined.
    #[must_use]
    pub fn examined(&self) -> usize {
        self.outcomes.len()
    }

    /// Number of messages that ended in `disposition`.
    #[must_use]
    pub fn count(&self, disposition: Disposition) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.disposition == disposition)
            .count()
    }

    /// When the pass started.
    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// When the pass finished.
    #[must_use]
    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    /// Wall-clock duration of the pass.
    #[must_use]
    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Runs the triage pipeline over unread messages.
///
/// # Example
///
/// ```no_run
/// use lead_triage::comps::{ComparableFetcher, HttpListingsSource, JsonListingsExtractor};
/// use lead_triage::config::ProcessingConfig;
/// use lead_triage::processor::InboxProcessor;
/// use lead_triage::{ImapMailbox, PasswordAuthenticator, TriageConfig};
/// use std::time::Duration;
///
/// # async fn example() -> lead_triage::Result<()> {
/// let config = TriageConfig::builder().email("leads@gmail.com").build()?;
/// let auth = PasswordAuthenticator::new("app-password");
/// let mut mailbox = ImapMailbox::connect(&config, &auth).await?;
///
/// let fetcher = ComparableFetcher::new(
///     HttpListingsSource::new("https://comps.example.com/v1", Duration::from_secs(10)),
///     JsonListingsExtractor,
/// );
/// let processor = InboxProcessor::new(fetcher, ProcessingConfig::default());
/// let report = processor.process_inbox(&mut mailbox).await?;
/// println!("{} offers", report.offers().len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct InboxProcessor<S, E> {
    extractor: PropertyExtractor,
    fetcher: ComparableFetcher<S, E>,
    config: ProcessingConfig,
}

enum Step {
    Done(MessageOutcome),
    Offer(OfferResult, MessageOutcome),
}

impl<S, E> InboxProcessor<S, E>
where
    S: ListingsSource,
    E: ListingsExtractor,
{
    /// Creates a processor with the default property extractor.
    #[must_use]
    pub fn new(fetcher: ComparableFetcher<S, E>, config: ProcessingConfig) -> Self {
        Self {
            extractor: PropertyExtractor::new(),
            fetcher,
            config,
        }
    }

    /// Replaces the property extractor.
    #[must_use]
    pub fn with_extractor(mut self, extractor: PropertyExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Processing settings in use.
    #[must_use]
    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    /// Processes up to `unread_limit` unread messages, one at a time, in the order
    /// the mailbox lists them.
    ///
    /// # Errors
    ///
    /// Returns an error only if the unread messages cannot be listed. Every
    /// per-message failure is recorded in the report instead.
    #[instrument(
        name = "InboxProcessor::process_inbox",
        skip_all,
        fields(limit = self.config.unread_limit)
    )]
    pub async fn process_inbox(&self, mailbox: &mut dyn Mailbox) -> Result<ProcessingReport> {
        let started_at = Utc::now();
        let limit = self.config.unread_limit;

        let mut ids = mailbox
            .list_unread(limit, self.config.search_query.as_deref())
            .await?;
        ids.truncate(limit);

        info!(count = ids.len(), "Processing unread messages");

        let mut offers = Vec::new();
        let mut outcomes = Vec::with_capacity(ids.len());

        for id in &ids {
            match self.process_message(mailbox, id).await {
                Step::Done(outcome) => outcomes.push(outcome),
                Step::Offer(offer, outcome) => {
                    offers.push(offer);
                    outcomes.push(outcome);
                }
            }
        }

        let report = ProcessingReport {
            offers,
            outcomes,
            started_at,
            finished_at: Utc::now(),
        };

        info!(
            examined = report.examined(),
            processed = report.count(Disposition::Processed),
            dispatch_failed = report.count(Disposition::DispatchFailed),
            marked_read = report.count(Disposition::MarkedRead),
            skipped = report.count(Disposition::Skipped),
            failed = report.count(Disposition::Failed),
            "Inbox pass finished"
        );

        Ok(report)
    }

    #[instrument(name = "InboxProcessor::process_message", skip(self, mailbox))]
    async fn process_message(&self, mailbox: &mut dyn Mailbox, message_id: &str) -> Step {
        let raw = match mailbox.fetch_raw(message_id).await {
            Ok(raw) => raw,
            Err(e) => return Step::Done(failed(message_id, e)),
        };

        let lead = match parse_lead(&raw, message_id) {
            Ok(lead) => lead,
            Err(e) => return Step::Done(skipped(message_id, e)),
        };

        let details = self.extractor.extract(&lead.body);
        let missing = details.missing_fields();
        let Some(property) = details.complete() else {
            return Step::Done(skipped(
                message_id,
                Error::DetailsIncomplete {
                    message_id: message_id.to_string(),
                    missing: missing.join(", "),
                },
            ));
        };

        let comps = match self.fetcher.fetch_comparables(&property.address).await {
            Ok(comps) => comps,
            Err(not_found) => {
                return Step::Done(match mailbox.set_read(message_id, true).await {
                    Ok(()) => {
                        info!(address = %property.address, "No comparables, marked read");
                        MessageOutcome::new(message_id, Disposition::MarkedRead, Some(not_found))
                    }
                    Err(e) => failed(message_id, e),
                });
            }
        };

        let offer = OfferResult::new(
            message_id,
            property,
            comps.listings.len(),
            comps.valuation,
            self.config.repair_costs,
        );

        let context = SummaryContext {
            recipient: self.config.summary_recipient.as_deref(),
            sender: lead.from.as_deref(),
            in_reply_to: lead.message_id_header.as_deref(),
            subject: lead.subject.as_deref(),
        };
        let sent = match compose(&offer, context) {
            Some(message) => mailbox.send(&message).await,
            None => Err(Error::InvalidConfig {
                message: "no summary recipient configured and lead has no sender".into(),
            }),
        };

        let outcome = match sent {
            Ok(()) => {
                info!(
                    address = %offer.property.address,
                    valuation = offer.valuation,
                    max_offer = offer.max_offer,
                    "Lead processed"
                );
                MessageOutcome::new(message_id, Disposition::Processed, None)
            }
            Err(e) => {
                let error = Error::DispatchFailed {
                    message_id: message_id.to_string(),
                    source: Box::new(e),
                };
                warn!(error = %error, retryable = error.is_retryable(), "Summary not sent");
                MessageOutcome::new(message_id, Disposition::DispatchFailed, Some(error))
            }
        };

        Step::Offer(offer, outcome)
    }
}

fn skipped(message_id: &str, error: Error) -> MessageOutcome {
    warn!(message_id, error = %error, category = %error.category(), "Message skipped");
    MessageOutcome::new(message_id, Disposition::Skipped, Some(error))
}

fn failed(message_id: &str, error: Error) -> MessageOutcome {
    warn!(message_id, error = %error, category = %error.category(), "Message failed");
    MessageOutcome::new(message_id, Disposition::Failed, Some(error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comps::{ComparableListing, ListingsExtractor};
    use crate::mailbox::OutgoingMessage;
    use async_trait::async_trait;
    use std::collections::{BTreeMap, HashMap};
    use std::time::Duration;

    const LEAD_A: &str = "123 Main St, FL 33701 ... 3 bed 2 bath";
    const LEAD_B: &str = "45 Oak Ave, TX 78704 with 4 br 3 ba";
    const LEAD_NO_COMPS: &str = "9 Lost Rd, NV 89001, 2 bed 1 bath";

    #[derive(Default)]
    struct FakeMailbox {
        /// uid -> (raw message, read)
        messages: BTreeMap<u32, (String, bool)>,
        sent: Vec<OutgoingMessage>,
        read_changes: Vec<String>,
        fail_list: bool,
        fail_send: bool,
        fail_fetch: Vec<String>,
    }

    impl FakeMailbox {
        fn with_bodies(bodies: &[&str]) -> Self {
            let mut mailbox = Self::default();
            for (i, body) in bodies.iter().enumerate() {
                let uid = u32::try_from(i).unwrap() + 1;
                let raw = format!(
                    "From: seller{uid}@example.com\r\nSubject: Lead {uid}\r\nMessage-ID: <{uid}@example.com>\r\n\r\n{body}"
                );
                mailbox.messages.insert(uid, (raw, false));
            }
            mailbox
        }

        fn is_read(&self, uid: u32) -> bool {
            self.messages[&uid].1
        }
    }

    #[async_trait]
    impl Mailbox for FakeMailbox {
        async fn list_unread(&mut self, limit: usize, _query: Option<&str>) -> Result<Vec<String>> {
            if self.fail_list {
                return Err(Error::SearchTimeout {
                    timeout: Duration::from_secs(10),
                });
            }
            Ok(self
                .messages
                .iter()
                .rev()
                .filter(|(_, (_, read))| !read)
                .take(limit)
                .map(|(uid, _)| uid.to_string())
                .collect())
        }

        async fn fetch_raw(&mut self, message_id: &str) -> Result<Vec<u8>> {
            if self.fail_fetch.iter().any(|id| id == message_id) {
                return Err(Error::FetchTimeout {
                    message_id: message_id.to_string(),
                    timeout: Duration::from_secs(30),
                });
            }
            let uid: u32 = message_id.parse().unwrap();
            Ok(self.messages[&uid].0.clone().into_bytes())
        }

        async fn set_read(&mut self, message_id: &str, read: bool) -> Result<()> {
            let uid: u32 = message_id.parse().unwrap();
            self.messages.get_mut(&uid).unwrap().1 = read;
            self.read_changes.push(message_id.to_string());
            Ok(())
        }

        async fn send(&mut self, message: &OutgoingMessage) -> Result<()> {
            if self.fail_send {
                return Err(Error::SendTimeout {
                    timeout: Duration::from_secs(30),
                });
            }
            self.sent.push(message.clone());
            Ok(())
        }
    }

    /// Listings keyed by lookup key; unknown addresses return an empty list.
    struct MapSource(HashMap<String, String>);

    #[async_trait]
    impl ListingsSource for MapSource {
        async fn lookup(&self, address: &str) -> Result<String> {
            Ok(self
                .0
                .get(&crate::comps::lookup_key(address))
                .cloned()
                .unwrap_or_else(|| "[]".into()))
        }
    }

    struct JsonExtractor;

    impl ListingsExtractor for JsonExtractor {
        fn extract(&self, raw: &str) -> Vec<ComparableListing> {
            serde_json::from_str(raw).unwrap_or_default()
        }
    }

    fn processor(config: ProcessingConfig) -> InboxProcessor<MapSource, JsonExtractor> {
        let mut listings = HashMap::new();
        listings.insert(
            "123-Main-St,-FL-33701".to_string(),
            r#"[{"price_per_square_foot":200,"square_feet":1000},{"price_per_square_foot":220,"square_feet":1200}]"#
                .to_string(),
        );
        listings.insert(
            "45-Oak-Ave,-TX-78704".to_string(),
            r#"[{"price_per_square_foot":150,"square_feet":2000}]"#.to_string(),
        );
        InboxProcessor::new(
            ComparableFetcher::new(MapSource(listings), JsonExtractor),
            config,
        )
    }

    #[tokio::test]
    async fn test_scenario_offer_and_summary() {
        let mut mailbox = FakeMailbox::with_bodies(&[LEAD_A]);
        let report = processor(ProcessingConfig::default())
            .process_inbox(&mut mailbox)
            .await
            .unwrap();

        assert_eq!(report.offers().len(), 1);
        let offer = &report.offers()[0];
        assert_eq!(offer.message_id, "1");
        assert!((offer.valuation - 232_000.0).abs() < 1e-9);
        assert!((offer.max_offer - 109_200.0).abs() < 1e-9);

        assert_eq!(mailbox.sent.len(), 1);
        assert_eq!(mailbox.sent[0].to, "seller1@example.com");
        assert_eq!(mailbox.sent[0].in_reply_to.as_deref(), Some("<1@example.com>"));
        assert!(!mailbox.is_read(1));
        assert_eq!(report.count(Disposition::Processed), 1);
    }

    #[tokio::test]
    async fn test_no_comparables_marks_read() {
        let mut mailbox = FakeMailbox::with_bodies(&[LEAD_NO_COMPS]);
        let report = processor(ProcessingConfig::default())
            .process_inbox(&mut mailbox)
            .await
            .unwrap();

        assert!(report.offers().is_empty());
        assert!(mailbox.sent.is_empty());
        assert!(mailbox.is_read(1));
        let outcome = &report.outcomes()[0];
        assert_eq!(outcome.disposition, Disposition::MarkedRead);
        assert!(matches!(outcome.error, Some(Error::ComparablesNotFound { .. })));
    }

    #[tokio::test]
    async fn test_batch_counts() {
        // N = 6, M = 4 complete, K = 2 with comparables.
        let bodies = [
            LEAD_A,
            "hello, just checking in",
            LEAD_NO_COMPS,
            "77 Pine Ct, OR 97201 but no room counts",
            LEAD_B,
            "1 Lone Way, UT 84101 1 bed 1 bath",
        ];
        let mut mailbox = FakeMailbox::with_bodies(&bodies);
        let config = ProcessingConfig {
            unread_limit: 10,
            ..ProcessingConfig::default()
        };
        let report = processor(config).process_inbox(&mut mailbox).await.unwrap();

        assert_eq!(report.examined(), 6);
        assert_eq!(report.offers().len(), 2);
        assert_eq!(mailbox.read_changes.len(), 2);
        assert_eq!(report.count(Disposition::Skipped), 2);
        assert!(!mailbox.is_read(2));
        assert!(!mailbox.is_read(4));
    }

    #[tokio::test]
    async fn test_limit_takes_newest_first() {
        let bodies = [LEAD_A; 7];
        let mut mailbox = FakeMailbox::with_bodies(&bodies);
        let report = processor(ProcessingConfig::default())
            .process_inbox(&mut mailbox)
            .await
            .unwrap();

        let ids: Vec<_> = report
            .outcomes()
            .iter()
            .map(|o| o.message_id.as_str())
            .collect();
        assert_eq!(ids, ["7", "6", "5", "4", "3"]);
    }

    #[tokio::test]
    async fn test_dispatch_failure_keeps_offer() {
        let mut mailbox = FakeMailbox::with_bodies(&[LEAD_A, LEAD_B]);
        mailbox.fail_send = true;
        let report = processor(ProcessingConfig::default())
            .process_inbox(&mut mailbox)
            .await
            .unwrap();

        assert_eq!(report.offers().len(), 2);
        assert_eq!(report.count(Disposition::DispatchFailed), 2);
        assert!(mailbox.read_changes.is_empty());
        let error = report.outcomes()[0].error.as_ref().unwrap();
        assert!(matches!(error, Error::DispatchFailed { .. }));
        assert!(error.is_retryable());
    }

    #[tokio::test]
    async fn test_configured_recipient() {
        let mut mailbox = FakeMailbox::with_bodies(&[LEAD_A]);
        let config = ProcessingConfig {
            summary_recipient: Some("acquisitions@example.com".into()),
            ..ProcessingConfig::default()
        };
        processor(config).process_inbox(&mut mailbox).await.unwrap();

        assert_eq!(mailbox.sent[0].to, "acquisitions@example.com");
        assert_eq!(mailbox.sent[0].in_reply_to, None);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_isolated() {
        let mut mailbox = FakeMailbox::with_bodies(&[LEAD_A, LEAD_B]);
        mailbox.fail_fetch = vec!["2".into()];
        let report = processor(ProcessingConfig::default())
            .process_inbox(&mut mailbox)
            .await
            .unwrap();

        assert_eq!(report.outcomes()[0].message_id, "2");
        assert_eq!(report.outcomes()[0].disposition, Disposition::Failed);
        assert_eq!(report.outcomes()[1].disposition, Disposition::Processed);
        assert_eq!(report.offers().len(), 1);
    }

    #[tokio::test]
    async fn test_html_only_message_is_skipped() {
        let mut mailbox = FakeMailbox::default();
        mailbox.messages.insert(
            1,
            (
                format!("From: a@example.com\r\nContent-Type: text/html\r\n\r\n<p>{LEAD_A}</p>"),
                false,
            ),
        );
        let report = processor(ProcessingConfig::default())
            .process_inbox(&mut mailbox)
            .await
            .unwrap();

        assert_eq!(report.outcomes()[0].disposition, Disposition::Skipped);
        assert!(matches!(
            report.outcomes()[0].error,
            Some(Error::BodyExtractionFailed { .. })
        ));
        assert!(!mailbox.is_read(1));
    }

    #[tokio::test]
    async fn test_list_failure_is_fatal() {
        let mut mailbox = FakeMailbox::with_bodies(&[LEAD_A]);
        mailbox.fail_list = true;
        let result = processor(ProcessingConfig::default())
            .process_inbox(&mut mailbox)
            .await;
        assert!(matches!(result, Err(Error::SearchTimeout { .. })));
    }

    #[tokio::test]
    async fn test_empty_inbox() {
        let mut mailbox = FakeMailbox::default();
        let report = processor(ProcessingConfig::default())
            .process_inbox(&mut mailbox)
            .await
            .unwrap();
        assert_eq!(report.examined(), 0);
        assert!(report.finished_at() >= report.started_at());
    }
}
