//! Configuration for a triage run.
//!
//! Use [`TriageConfigBuilder`] to create a configuration with sensible defaults:
//!
//! ```
//! use lead_triage::TriageConfig;
//!
//! let config = TriageConfig::builder()
//!     .email("leads@example.com")
//!     .listings_url("https://comps.example.com/v1/comparables")
//!     .build()
//!     .expect("valid config");
//!
//! assert_eq!(config.processing.unread_limit, 5);
//! ```
//!
//! Or load it from `LEAD_TRIAGE_*` environment variables with [`TriageConfig::from_env`].

use crate::auth::{
    Authenticator, PasswordAuthenticator, RefreshTokenAuthenticator, StaticTokenAuthenticator,
};
use crate::error::{Error, Result};
use crate::known_servers::{self, MailServers, ServerRegistry, SmtpSecurity};
use crate::offer::DEFAULT_REPAIR_COSTS;
use email_address::EmailAddress;
use std::time::Duration;

/// Prefix shared by every environment variable the crate reads.
pub const ENV_PREFIX: &str = "LEAD_TRIAGE_";

/// Default number of unread messages examined per run.
pub const DEFAULT_UNREAD_LIMIT: usize = 5;

/// Configuration for connecting to a mailbox and processing leads.
///
/// Create using [`TriageConfig::builder()`]. Credentials are not part of the
/// configuration; they come from an [`Authenticator`].
#[derive(Debug, Clone)]
pub struct TriageConfig {
    /// Account address (used for login, server discovery and as the sender).
    email: EmailAddress,
    /// Resolved IMAP/SMTP endpoints.
    pub servers: MailServers,
    /// IMAP server port (default: 993 for IMAPS).
    pub imap_port: u16,
    /// SMTP submission port (default depends on [`SmtpSecurity`]).
    pub smtp_port: u16,
    /// Listings source endpoint; comparables are looked up beneath it.
    pub listings_url: Option<String>,
    /// Timeout configuration.
    pub timeouts: TimeoutConfig,
    /// Processing knobs.
    pub processing: ProcessingConfig,
}

impl TriageConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> TriageConfigBuilder {
        TriageConfigBuilder::default()
    }

    /// Returns the account address as a string slice.
    #[must_use]
    pub fn email(&self) -> &str {
        self.email.as_str()
    }

    /// Returns the full IMAP server address as "host:port".
    #[must_use]
    pub fn imap_address(&self) -> String {
        format!("{}:{}", self.servers.imap_host, self.imap_port)
    }

    /// Loads the configuration from `LEAD_TRIAGE_*` environment variables.
    ///
    /// | Variable | Meaning |
    /// |---|---|
    /// | `LEAD_TRIAGE_EMAIL` | account address (required) |
    /// | `LEAD_TRIAGE_IMAP_HOST` / `_IMAP_PORT` | IMAP endpoint override |
    /// | `LEAD_TRIAGE_SMTP_HOST` / `_SMTP_PORT` / `_SMTP_STARTTLS` | SMTP endpoint override |
    /// | `LEAD_TRIAGE_LISTINGS_URL` | listings source endpoint |
    /// | `LEAD_TRIAGE_UNREAD_LIMIT` | messages per run |
    /// | `LEAD_TRIAGE_REPAIR_COSTS` | repair cost estimate |
    /// | `LEAD_TRIAGE_SEARCH_QUERY` | extra IMAP search terms |
    /// | `LEAD_TRIAGE_SUMMARY_TO` | results recipient |
    /// | `LEAD_TRIAGE_MAILBOX` | mailbox to scan |
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value is malformed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env`] with an explicit variable source.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value is malformed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}")).filter(|v| !v.is_empty());

        let mut builder = TriageConfig::builder().server_registry(ServerRegistry::with_defaults());

        if let Some(email) = var("EMAIL") {
            builder = builder.email(email);
        }
        if let Some(host) = var("IMAP_HOST") {
            builder = builder.imap_host(host);
        }
        if let Some(port) = var("IMAP_PORT") {
            builder = builder.imap_port(parse_var("IMAP_PORT", &port)?);
        }
        if let Some(host) = var("SMTP_HOST") {
            builder = builder.smtp_host(host);
        }
        if let Some(port) = var("SMTP_PORT") {
            builder = builder.smtp_port(parse_var("SMTP_PORT", &port)?);
        }
        if let Some(flag) = var("SMTP_STARTTLS") {
            let security = if parse_var::<bool>("SMTP_STARTTLS", &flag)? {
                SmtpSecurity::StartTls
            } else {
                SmtpSecurity::ImplicitTls
            };
            builder = builder.smtp_security(security);
        }
        if let Some(url) = var("LISTINGS_URL") {
            builder = builder.listings_url(url);
        }
        if let Some(limit) = var("UNREAD_LIMIT") {
            builder = builder.unread_limit(parse_var("UNREAD_LIMIT", &limit)?);
        }
        if let Some(costs) = var("REPAIR_COSTS") {
            builder = builder.repair_costs(parse_var("REPAIR_COSTS", &costs)?);
        }
        if let Some(query) = var("SEARCH_QUERY") {
            builder = builder.search_query(query);
        }
        if let Some(to) = var("SUMMARY_TO") {
            builder = builder.summary_recipient(to);
        }
        if let Some(mailbox) = var("MAILBOX") {
            builder = builder.mailbox(mailbox);
        }

        builder.build()
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| Error::InvalidConfig {
        message: format!("{ENV_PREFIX}{name} has an invalid value '{value}'"),
    })
}

/// Picks an [`Authenticator`] from `LEAD_TRIAGE_*` environment variables.
///
/// Precedence: `ACCESS_TOKEN`, then `OAUTH_CLIENT_ID` + `OAUTH_CLIENT_SECRET` +
/// `OAUTH_REFRESH_TOKEN` (with optional `OAUTH_TOKEN_URL`), then `PASSWORD`.
///
/// # Errors
///
/// Returns [`Error::AuthUnavailable`] if no credential source is configured.
pub fn authenticator_from_env() -> Result<Box<dyn Authenticator>> {
    authenticator_from_lookup(|key| std::env::var(key).ok())
}

/// Same as [`authenticator_from_env`] with an explicit variable source.
///
/// # Errors
///
/// Returns [`Error::AuthUnavailable`] if no credential source is configured.
pub fn authenticator_from_lookup<F>(lookup: F) -> Result<Box<dyn Authenticator>>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}")).filter(|v| !v.is_empty());

    if let Some(token) = var("ACCESS_TOKEN") {
        return Ok(Box::new(StaticTokenAuthenticator::new(token)));
    }

    if let (Some(client_id), Some(client_secret), Some(refresh_token)) = (
        var("OAUTH_CLIENT_ID"),
        var("OAUTH_CLIENT_SECRET"),
        var("OAUTH_REFRESH_TOKEN"),
    ) {
        let auth = match var("OAUTH_TOKEN_URL") {
            Some(url) => RefreshTokenAuthenticator::new(url, client_id, client_secret, refresh_token),
            None => RefreshTokenAuthenticator::google(client_id, client_secret, refresh_token),
        };
        return Ok(Box::new(auth));
    }

    if let Some(password) = var("PASSWORD") {
        return Ok(Box::new(PasswordAuthenticator::new(password)));
    }

    Err(Error::AuthUnavailable {
        message: format!(
            "set {ENV_PREFIX}PASSWORD, {ENV_PREFIX}ACCESS_TOKEN or the {ENV_PREFIX}OAUTH_* variables"
        ),
        source: None,
    })
}

/// Timeout configuration for every network step.
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Timeout for establishing TCP/TLS connection.
    pub connect: Duration,
    /// Timeout for IMAP authentication.
    pub auth: Duration,
    /// Timeout for selecting a mailbox.
    pub select: Duration,
    /// Timeout for the unread search.
    pub search: Duration,
    /// Timeout for fetching message content.
    pub message_fetch: Duration,
    /// Timeout for updating message flags.
    pub store: Duration,
    /// Timeout for submitting a results message.
    pub send: Duration,
    /// Timeout for a listings lookup.
    pub listings: Duration,
    /// Timeout for logout operation.
    pub logout: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(30),
            auth: Duration::from_secs(30),
            select: Duration::from_secs(10),
            search: Duration::from_secs(10),
            message_fetch: Duration::from_secs(30),
            store: Duration::from_secs(10),
            send: Duration::from_secs(30),
            listings: Duration::from_secs(10),
            logout: Duration::from_secs(5),
        }
    }
}

/// Knobs for a processing pass.
#[derive(Debug, Clone)]
pub struct ProcessingConfig {
    /// Maximum number of unread messages examined per run.
    pub unread_limit: usize,
    /// Repair cost estimate subtracted from 60% of the valuation.
    pub repair_costs: f64,
    /// Extra IMAP search terms combined with `UNSEEN`.
    pub search_query: Option<String>,
    /// Where results are sent. `None` replies to the lead's sender.
    pub summary_recipient: Option<String>,
    /// Mailbox to scan.
    pub mailbox: String,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            unread_limit: DEFAULT_UNREAD_LIMIT,
            repair_costs: DEFAULT_REPAIR_COSTS,
            search_query: None,
            summary_recipient: None,
            mailbox: "INBOX".to_string(),
        }
    }
}

fn validate_email(email: &str) -> Result<EmailAddress> {
    EmailAddress::parse_with_options(email, email_address::Options::default()).map_err(|_| {
        Error::InvalidEmailFormat {
            email: email.to_string(),
        }
    })
}

/// Builder for [`TriageConfig`].
#[derive(Debug, Default)]
pub struct TriageConfigBuilder {
    email: Option<String>,
    imap_host: Option<String>,
    imap_port: Option<u16>,
    smtp_host: Option<String>,
    smtp_port: Option<u16>,
    smtp_security: Option<SmtpSecurity>,
    server_registry: Option<ServerRegistry>,
    listings_url: Option<String>,
    timeouts: Option<TimeoutConfig>,
    processing: Option<ProcessingConfig>,
}

impl TriageConfigBuilder {
    /// Sets the account address (required).
    #[must_use]
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Sets the IMAP server hostname explicitly.
    #[must_use]
    pub fn imap_host(mut self, host: impl Into<String>) -> Self {
        self.imap_host = Some(host.into());
        self
    }

    /// Sets the IMAP server port.
    #[must_use]
    pub fn imap_port(mut self, port: u16) -> Self {
        self.imap_port = Some(port);
        self
    }

    /// Sets the SMTP server hostname explicitly.
    #[must_use]
    pub fn smtp_host(mut self, host: impl Into<String>) -> Self {
        self.smtp_host = Some(host.into());
        self
    }

    /// Sets the SMTP server port.
    #[must_use]
    pub fn smtp_port(mut self, port: u16) -> Self {
        self.smtp_port = Some(port);
        self
    }

    /// Sets how the SMTP connection is secured.
    #[must_use]
    pub fn smtp_security(mut self, security: SmtpSecurity) -> Self {
        self.smtp_security = Some(security);
        self
    }

    /// Sets a custom server registry for host discovery.
    #[must_use]
    pub fn server_registry(mut self, registry: ServerRegistry) -> Self {
        self.server_registry = Some(registry);
        self
    }

    /// Sets the listings source endpoint.
    #[must_use]
    pub fn listings_url(mut self, url: impl Into<String>) -> Self {
        self.listings_url = Some(url.into());
        self
    }

    /// Sets timeout configuration.
    #[must_use]
    pub fn timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = Some(timeouts);
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts
            .get_or_insert_with(TimeoutConfig::default)
            .connect = timeout;
        self
    }

    /// Sets the listings lookup timeout.
    #[must_use]
    pub fn listings_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts
            .get_or_insert_with(TimeoutConfig::default)
            .listings = timeout;
        self
    }

    /// Sets processing configuration.
    #[must_use]
    pub fn processing(mut self, processing: ProcessingConfig) -> Self {
        self.processing = Some(processing);
        self
    }

    /// Sets the number of unread messages examined per run.
    #[must_use]
    pub fn unread_limit(mut self, limit: usize) -> Self {
        self.processing
            .get_or_insert_with(ProcessingConfig::default)
            .unread_limit = limit;
        self
    }

    /// Sets the repair cost estimate.
    #[must_use]
    pub fn repair_costs(mut self, costs: f64) -> Self {
        self.processing
            .get_or_insert_with(ProcessingConfig::default)
            .repair_costs = costs;
        self
    }

    /// Sets extra IMAP search terms.
    #[must_use]
    pub fn search_query(mut self, query: impl Into<String>) -> Self {
        self.processing
            .get_or_insert_with(ProcessingConfig::default)
            .search_query = Some(query.into());
        self
    }

    /// Sets the results recipient.
    #[must_use]
    pub fn summary_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.processing
            .get_or_insert_with(ProcessingConfig::default)
            .summary_recipient = Some(recipient.into());
        self
    }

    /// Sets the mailbox to scan.
    #[must_use]
    pub fn mailbox(mut self, mailbox: impl Into<String>) -> Self {
        self.processing
            .get_or_insert_with(ProcessingConfig::default)
            .mailbox = mailbox.into();
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if required fields are missing or invalid.
    pub fn build(self) -> Result<TriageConfig> {
        let email_raw = self.email.ok_or_else(|| Error::InvalidConfig {
            message: "email is required".into(),
        })?;
        let email = validate_email(&email_raw)?;

        let processing = self.processing.unwrap_or_default();
        if processing.unread_limit == 0 {
            return Err(Error::InvalidConfig {
                message: "unread limit must be at least 1".into(),
            });
        }
        if !processing.repair_costs.is_finite() {
            return Err(Error::InvalidConfig {
                message: "repair costs must be a finite number".into(),
            });
        }
        if let Some(recipient) = &processing.summary_recipient {
            validate_email(recipient)?;
        }

        // Resolve hosts: explicit > registry > built-in discovery
        let mut servers = match &self.server_registry {
            Some(registry) => registry.discover(email.as_str()),
            None => known_servers::discover_servers(email.as_str()),
        };
        if let Some(host) = self.imap_host {
            servers.imap_host = host;
        }
        if let Some(host) = self.smtp_host {
            servers.smtp_host = host;
        }
        if let Some(security) = self.smtp_security {
            servers.smtp_security = security;
        }

        Ok(TriageConfig {
            email,
            smtp_port: self
                .smtp_port
                .unwrap_or_else(|| servers.smtp_security.default_port()),
            servers,
            imap_port: self.imap_port.unwrap_or(993),
            listings_url: self.listings_url,
            timeouts: self.timeouts.unwrap_or_default(),
            processing,
        })
    }
}
