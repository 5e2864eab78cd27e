//! Error types for the lead-triage crate.
//!
//! All errors implement [`std::error::Error`] and provide context about what went wrong.
//! Errors are categorized by their retryability - see [`Error::is_retryable`].
//!
//! Per-message failures ([`Error::BodyExtractionFailed`], [`Error::DetailsIncomplete`],
//! [`Error::ComparablesNotFound`], [`Error::DispatchFailed`]) are recorded in the batch
//! report by the inbox processor and never abort a run. Only failures to reach the
//! mailbox at all surface as an `Err` from a processing pass.

use std::time::Duration;
use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error used for causes that come from pluggable collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while triaging an inbox.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    // ─────────────────────────────────────────────────────────────────────────
    // Configuration / validation errors (NOT retryable)
    // ─────────────────────────────────────────────────────────────────────────
    /// Invalid email address format.
    #[error("invalid email format: {email}")]
    InvalidEmailFormat {
        /// The invalid email address.
        email: String,
    },

    /// Invalid configuration provided.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the configuration error.
        message: String,
    },

    /// Invalid DNS name for TLS.
    #[error("invalid DNS name for host '{host}'")]
    InvalidDnsName {
        /// The invalid hostname.
        host: String,
        /// The underlying DNS name error.
        #[source]
        source: rustls::client::InvalidDnsNameError,
    },

    /// A mailbox address could not be used for an outgoing message.
    #[error("invalid mailbox address '{address}'")]
    InvalidAddress {
        /// The address that failed to parse.
        address: String,
        /// The underlying address error.
        #[source]
        source: lettre::address::AddressError,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Authentication (fatal to a processing pass)
    // ─────────────────────────────────────────────────────────────────────────
    /// The mailbox capability could not be obtained.
    #[error("mailbox authorization unavailable: {message}")]
    AuthUnavailable {
        /// What went wrong while obtaining credentials.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<BoxError>,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Network / connection errors (RETRYABLE)
    // ─────────────────────────────────────────────────────────────────────────
    /// Failed to establish TCP connection.
    #[error("failed to connect to {target}")]
    TcpConnect {
        /// The target address that failed.
        target: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to establish TLS connection.
    #[error("failed to establish TLS connection to {target}")]
    TlsConnect {
        /// The target address that failed.
        target: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The listings source could not be reached.
    #[error("listings request failed for '{address}'")]
    ListingsRequest {
        /// The subject property address.
        address: String,
        /// The underlying HTTP error.
        #[source]
        source: reqwest::Error,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Timeout errors (mixed retryability)
    // ─────────────────────────────────────────────────────────────────────────
    /// Connection timeout.
    #[error("connection timeout to {target} after {timeout:?}")]
    ConnectTimeout {
        /// The target address.
        target: String,
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// Authentication timeout.
    #[error("authentication timeout for {email} after {timeout:?}")]
    AuthTimeout {
        /// The email address used for authentication.
        email: String,
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// Mailbox selection timeout.
    #[error("mailbox selection timeout for '{mailbox}' after {timeout:?}")]
    SelectTimeout {
        /// The mailbox name.
        mailbox: String,
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// Unread search timeout.
    #[error("unread search timeout after {timeout:?}")]
    SearchTimeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// Message fetch timeout.
    #[error("message fetch timeout for {message_id} after {timeout:?}")]
    FetchTimeout {
        /// The message being fetched.
        message_id: String,
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// Flag update timeout.
    #[error("flag update timeout for {message_id} after {timeout:?}")]
    StoreTimeout {
        /// The message being updated.
        message_id: String,
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// SMTP submission timeout.
    #[error("message send timeout after {timeout:?}")]
    SendTimeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// Listings lookup timeout.
    #[error("listings lookup timeout for '{address}' after {timeout:?}")]
    ListingsTimeout {
        /// The subject property address.
        address: String,
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// Logout timeout (not critical).
    #[error("logout timeout after {timeout:?}")]
    LogoutTimeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // IMAP / SMTP / HTTP protocol errors (RETRYABLE - could be transient server issues)
    // ─────────────────────────────────────────────────────────────────────────
    /// IMAP login failed.
    #[error("IMAP login failed for {email}")]
    ImapLogin {
        /// The email address used for login.
        email: String,
        /// The underlying IMAP error.
        #[source]
        source: async_imap::error::Error,
    },

    /// Failed to select mailbox.
    #[error("failed to select mailbox '{mailbox}'")]
    SelectMailbox {
        /// The mailbox name.
        mailbox: String,
        /// The underlying IMAP error.
        #[source]
        source: async_imap::error::Error,
    },

    /// IMAP search failed.
    #[error("IMAP search failed for query '{query}'")]
    ImapSearch {
        /// The search query that failed.
        query: String,
        /// The underlying IMAP error.
        #[source]
        source: async_imap::error::Error,
    },

    /// IMAP fetch failed.
    #[error("IMAP fetch failed for {message_id}")]
    ImapFetch {
        /// The message that failed.
        message_id: String,
        /// The underlying IMAP error.
        #[source]
        source: async_imap::error::Error,
    },

    /// IMAP flag update failed.
    #[error("IMAP flag update failed for {message_id}")]
    ImapStore {
        /// The message that failed.
        message_id: String,
        /// The underlying IMAP error.
        #[source]
        source: async_imap::error::Error,
    },

    /// IMAP logout failed.
    #[error("IMAP logout failed")]
    ImapLogout {
        /// The underlying IMAP error.
        #[source]
        source: async_imap::error::Error,
    },

    /// SMTP submission failed.
    #[error("SMTP send via {host} failed")]
    SmtpSend {
        /// The SMTP relay host.
        host: String,
        /// The underlying SMTP error.
        #[source]
        source: lettre::transport::smtp::Error,
    },

    /// The listings source answered with a non-success status.
    #[error("listings source returned HTTP {status} for '{address}'")]
    ListingsStatus {
        /// The subject property address.
        address: String,
        /// The HTTP status code.
        status: u16,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Message content errors (NOT retryable - malformed content won't change)
    // ─────────────────────────────────────────────────────────────────────────
    /// No decodable plain-text body.
    #[error("no plain-text body in {message_id}: {reason}")]
    BodyExtractionFailed {
        /// The message that was skipped.
        message_id: String,
        /// Why no body could be produced.
        reason: String,
    },

    /// Failed to assemble an outgoing message.
    #[error("failed to build outgoing message")]
    MessageBuild {
        /// The underlying builder error.
        #[source]
        source: lettre::error::Error,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Lookup results (NOT retryable)
    // ─────────────────────────────────────────────────────────────────────────
    /// The message does not exist in the mailbox.
    #[error("message {message_id} not found")]
    MessageNotFound {
        /// The missing message.
        message_id: String,
    },

    /// The extractor could not find an address and both room counts.
    #[error("incomplete property details in {message_id}: missing {missing}")]
    DetailsIncomplete {
        /// The message that was skipped.
        message_id: String,
        /// Comma separated list of missing fields.
        missing: String,
    },

    /// The listings collaborator returned nothing usable.
    #[error("no comparables found for '{address}': {reason}")]
    ComparablesNotFound {
        /// The subject property address.
        address: String,
        /// Why no comparables were produced.
        reason: String,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Dispatch (RETRYABLE when the cause is)
    // ─────────────────────────────────────────────────────────────────────────
    /// Sending the results message failed.
    #[error("failed to dispatch results for {message_id}")]
    DispatchFailed {
        /// The message whose results could not be sent.
        message_id: String,
        /// The underlying send error.
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Returns `true` if this error represents a transient failure that might succeed on retry.
    ///
    /// Nothing in this crate retries on its own; the classification is for callers.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::TcpConnect { .. }
            | Error::TlsConnect { .. }
            | Error::ListingsRequest { .. }
            | Error::ConnectTimeout { .. }
            | Error::AuthTimeout { .. }
            | Error::SelectTimeout { .. }
            | Error::SearchTimeout { .. }
            | Error::FetchTimeout { .. }
            | Error::StoreTimeout { .. }
            | Error::SendTimeout { .. }
            | Error::ListingsTimeout { .. }
            | Error::ImapLogin { .. }
            | Error::SelectMailbox { .. }
            | Error::ImapSearch { .. }
            | Error::ImapFetch { .. }
            | Error::ImapStore { .. }
            | Error::SmtpSend { .. }
            | Error::ListingsStatus { .. } => true,

            Error::DispatchFailed { source, .. } => source.is_retryable(),

            Error::InvalidEmailFormat { .. }
            | Error::InvalidConfig { .. }
            | Error::InvalidDnsName { .. }
            | Error::InvalidAddress { .. }
            | Error::AuthUnavailable { .. }
            | Error::LogoutTimeout { .. }
            | Error::ImapLogout { .. }
            | Error::BodyExtractionFailed { .. }
            | Error::MessageBuild { .. }
            | Error::MessageNotFound { .. }
            | Error::DetailsIncomplete { .. }
            | Error::ComparablesNotFound { .. } => false,
        }
    }

    /// Returns the error category for metrics/logging purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidEmailFormat { .. }
            | Error::InvalidConfig { .. }
            | Error::InvalidDnsName { .. }
            | Error::InvalidAddress { .. } => ErrorCategory::Configuration,

            Error::AuthUnavailable { .. } | Error::ImapLogin { .. } => {
                ErrorCategory::Authentication
            }

            Error::TcpConnect { .. } | Error::TlsConnect { .. } | Error::ListingsRequest { .. } => {
                ErrorCategory::Network
            }

            Error::ConnectTimeout { .. }
            | Error::AuthTimeout { .. }
            | Error::SelectTimeout { .. }
            | Error::SearchTimeout { .. }
            | Error::FetchTimeout { .. }
            | Error::StoreTimeout { .. }
            | Error::SendTimeout { .. }
            | Error::ListingsTimeout { .. }
            | Error::LogoutTimeout { .. } => ErrorCategory::Timeout,

            Error::SelectMailbox { .. }
            | Error::ImapSearch { .. }
            | Error::ImapFetch { .. }
            | Error::ImapStore { .. }
            | Error::ImapLogout { .. }
            | Error::SmtpSend { .. }
            | Error::ListingsStatus { .. } => ErrorCategory::Protocol,

            Error::BodyExtractionFailed { .. } | Error::MessageBuild { .. } => {
                ErrorCategory::Parse
            }

            Error::MessageNotFound { .. }
            | Error::DetailsIncomplete { .. }
            | Error::ComparablesNotFound { .. } => ErrorCategory::NotFound,

            Error::DispatchFailed { .. } => ErrorCategory::Dispatch,
        }
    }

    /// Wraps this error as an authorization failure for the given purpose.
    pub(crate) fn into_auth_unavailable(self, message: impl Into<String>) -> Error {
        match self {
            err @ Error::AuthUnavailable { .. } => err,
            other => Error::AuthUnavailable {
                message: message.into(),
                source: Some(Box::new(other)),
            },
        }
    }
}

/// Error categories for metrics and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Configuration or validation errors.
    Configuration,
    /// Credentials could not be obtained or were rejected.
    Authentication,
    /// Network connectivity errors.
    Network,
    /// Timeout errors.
    Timeout,
    /// IMAP, SMTP or HTTP protocol errors.
    Protocol,
    /// Message parsing errors.
    Parse,
    /// Nothing usable was found.
    NotFound,
    /// Results message could not be sent.
    Dispatch,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::Authentication => write!(f, "authentication"),
            ErrorCategory::Network => write!(f, "network"),
            ErrorCategory::Timeout => write!(f, "timeout"),
            ErrorCategory::Protocol => write!(f, "protocol"),
            ErrorCategory::Parse => write!(f, "parse"),
            ErrorCategory::NotFound => write!(f, "not_found"),
            ErrorCategory::Dispatch => write!(f, "dispatch"),
        }
    }
}
