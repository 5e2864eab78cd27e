//! Command line surface of the `lead-triage` binary.

use crate::auth::Authenticator;
use crate::client::ImapMailbox;
use crate::comps::{ComparableFetcher, HttpListingsSource, JsonListingsExtractor};
use crate::config::{self, TriageConfig};
use crate::error::Error;
use crate::extractor::PropertyExtractor;
use crate::offer::{max_offer, DEFAULT_REPAIR_COSTS};
use crate::processor::{Disposition, InboxProcessor, ProcessingReport};
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Parsed command line.
#[derive(Debug, Parser)]
#[command(name = "lead-triage")]
#[command(about = "Triage real-estate leads from an inbox into offer estimates.", version)]
pub struct CommandLine {
    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run one processing pass over the unread messages of the configured mailbox
    #[command(alias = "r")]
    Run {
        /// Maximum number of unread messages to examine
        #[arg(long)]
        limit: Option<usize>,
        /// Repair cost estimate subtracted from 60% of the valuation
        #[arg(long)]
        repair_costs: Option<f64>,
        /// Extra IMAP search terms combined with UNSEEN
        #[arg(long)]
        query: Option<String>,
    },
    /// Extract property details from a message body ("-" reads stdin)
    #[command(alias = "x")]
    Extract {
        /// File holding the plain text body
        input: PathBuf,
    },
    /// Compute the maximum offer for a valuation
    #[command(alias = "o")]
    Offer {
        /// Property valuation in dollars
        #[arg(allow_negative_numbers = true)]
        valuation: f64,
        /// Repair cost estimate
        #[arg(long, default_value_t = DEFAULT_REPAIR_COSTS, allow_negative_numbers = true)]
        repair_costs: f64,
    },
}

impl CommandLine {
    /// Parses `std::env::args`, exiting with usage on error.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Runs a parsed command.
///
/// # Errors
///
/// Returns an error when the configuration is invalid, the mailbox cannot be
/// reached or the input file cannot be read. Per-message failures during `run`
/// are reported, not returned.
pub async fn execute(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Run {
            limit,
            repair_costs,
            query,
        } => {
            let mut config = TriageConfig::from_env().context("invalid configuration")?;
            apply_overrides(&mut config, limit, repair_costs, query)?;
            let auth = config::authenticator_from_env().context("no mailbox credentials")?;
            let report = run(&config, auth.as_ref()).await?;
            print_report(&report);
            Ok(())
        }
        Commands::Extract { input } => {
            let body = read_input(&input)?;
            let details = PropertyExtractor::new().extract(&body);
            println!("{}", serde_json::to_string_pretty(&details)?);
            Ok(())
        }
        Commands::Offer {
            valuation,
            repair_costs,
        } => {
            let offer = max_offer(valuation, repair_costs);
            println!("{offer:.2}");
            if offer <= 0.0 {
                println!("no viable offer");
            }
            Ok(())
        }
    }
}

/// Connects, processes one batch and logs out.
///
/// # Errors
///
/// Returns an error if the listings endpoint is not configured, the mailbox is
/// unavailable or the unread messages cannot be listed.
pub async fn run(
    config: &TriageConfig,
    authenticator: &dyn Authenticator,
) -> crate::Result<ProcessingReport> {
    let listings_url = config.listings_url.clone().ok_or_else(|| Error::InvalidConfig {
        message: format!("{}LISTINGS_URL is required", config::ENV_PREFIX),
    })?;

    let fetcher = ComparableFetcher::new(
        HttpListingsSource::new(listings_url, config.timeouts.listings),
        JsonListingsExtractor,
    );
    let processor = InboxProcessor::new(fetcher, config.processing.clone());

    let mut mailbox = ImapMailbox::connect(config, authenticator)
        .await?
        .into_guard();
    let result = processor.process_inbox(&mut mailbox).await;

    if let Err(e) = mailbox.logout().await {
        warn!(error = %e, "Logout failed");
    }
    result
}

fn apply_overrides(
    config: &mut TriageConfig,
    limit: Option<usize>,
    repair_costs: Option<f64>,
    query: Option<String>,
) -> crate::Result<()> {
    if let Some(limit) = limit {
        if limit == 0 {
            return Err(Error::InvalidConfig {
                message: "--limit must be greater than zero".into(),
            });
        }
        config.processing.unread_limit = limit;
    }
    if let Some(costs) = repair_costs {
        if !costs.is_finite() {
            return Err(Error::InvalidConfig {
                message: "--repair-costs must be a finite number".into(),
            });
        }
        config.processing.repair_costs = costs;
    }
    if query.is_some() {
        config.processing.search_query = query;
    }
    Ok(())
}

fn read_input(input: &Path) -> anyhow::Result<String> {
    if input.as_os_str() == "-" {
        let mut body = String::new();
        std::io::stdin()
            .read_to_string(&mut body)
            .context("failed to read stdin")?;
        return Ok(body);
    }
    std::fs::read_to_string(input).with_context(|| format!("failed to read {}", input.display()))
}

fn print_report(report: &ProcessingReport) {
    for offer in report.offers() {
        let verdict = if offer.is_viable() { "" } else { " (no viable offer)" };
        println!(
            "{}\t{}\tvaluation ${:.2}\tmax offer ${:.2}{verdict}",
            offer.message_id, offer.property.address, offer.valuation, offer.max_offer
        );
    }
    println!(
        "examined {}: {} processed, {} dispatch failed, {} marked read, {} skipped, {} failed",
        report.examined(),
        report.count(Disposition::Processed),
        report.count(Disposition::DispatchFailed),
        report.count(Disposition::MarkedRead),
        report.count(Disposition::Skipped),
        report.count(Disposition::Failed),
    );
}
