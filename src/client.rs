//! IMAP + SMTP implementation of [`Mailbox`].
//!
//! [`ImapMailbox`] reads and flags messages over IMAP and submits results over SMTP,
//! using the same account and the same credentials for both.
//!
//! # Example
//!
//! ```no_run
//! use lead_triage::{ImapMailbox, Mailbox, PasswordAuthenticator, TriageConfig};
//!
//! # async fn example() -> lead_triage::Result<()> {
//! let config = TriageConfig::builder().email("leads@gmail.com").build()?;
//! let auth = PasswordAuthenticator::new("app-password");
//!
//! let mut mailbox = ImapMailbox::connect(&config, &auth).await?;
//! let unread = mailbox.list_unread(5, None).await?;
//! println!("{} unread", unread.len());
//! mailbox.logout().await?;
//! # Ok(())
//! # }
//! ```

use crate::auth::Authenticator;
use crate::config::TriageConfig;
use crate::connection;
use crate::dispatch::SmtpDispatcher;
use crate::error::{Error, Result};
use crate::mailbox::{Mailbox, OutgoingMessage};
use crate::session::{self, ImapSession};
use async_trait::async_trait;
use tracing::{debug, instrument, warn};

/// Authorized handle to one account's mailbox.
///
/// Message identifiers are IMAP UIDs rendered as decimal strings.
///
/// # Lifecycle
///
/// 1. Create with [`connect`](Self::connect)
/// 2. Use it through the [`Mailbox`] trait
/// 3. Call [`logout`](Self::logout) when done (or use [`into_guard`](Self::into_guard) for RAII)
pub struct ImapMailbox {
    session: Box<ImapSession>,
    smtp: SmtpDispatcher,
    config: TriageConfig,
}

impl ImapMailbox {
    /// Obtains credentials, connects over TLS, authenticates and selects the
    /// configured mailbox.
    ///
    /// # Errors
    ///
    /// Every failure is reported as [`Error::AuthUnavailable`] with the underlying
    /// error as its source: without a handle no message can be processed.
    #[instrument(
        name = "ImapMailbox::connect",
        skip_all,
        fields(
            email = %config.email(),
            imap_host = %config.servers.imap_host,
            flow = authenticator.flow()
        )
    )]
    pub async fn connect(config: &TriageConfig, authenticator: &dyn Authenticator) -> Result<Self> {
        Self::open(config, authenticator)
            .await
            .map_err(|e| e.into_auth_unavailable("mailbox unavailable"))
    }

    /// Logs out from the IMAP server.
    ///
    /// # Errors
    ///
    /// Returns an error if the logout command fails or times out.
    #[instrument(name = "ImapMailbox::logout", skip(self))]
    pub async fn logout(&mut self) -> Result<()> {
        let timeout = self.config.timeouts.logout;
        tokio::time::timeout(timeout, session::logout(&mut self.session))
            .await
            .map_err(|_| Error::LogoutTimeout { timeout })?
    }

    /// Converts this handle into a guard that logs out on drop.
    #[must_use]
    pub fn into_guard(self) -> ImapMailboxGuard {
        ImapMailboxGuard { inner: Some(self) }
    }

    /// Returns the account address.
    #[must_use]
    pub fn email(&self) -> &str {
        self.config.email()
    }

    /// Returns the IMAP host in use.
    #[must_use]
    pub fn imap_host(&self) -> &str {
        &self.config.servers.imap_host
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Private methods
    // ─────────────────────────────────────────────────────────────────────────

    async fn open(config: &TriageConfig, authenticator: &dyn Authenticator) -> Result<Self> {
        let credentials = authenticator.credentials().await?;
        let timeouts = &config.timeouts;
        let host = &config.servers.imap_host;

        let tls_stream = tokio::time::timeout(
            timeouts.connect,
            connection::open_tls(host, config.imap_port),
        )
        .await
        .map_err(|_| Error::ConnectTimeout {
            target: config.imap_address(),
            timeout: timeouts.connect,
        })??;

        debug!("TLS connection established");

        let mut session = tokio::time::timeout(
            timeouts.auth,
            session::authenticate(tls_stream, config.email(), &credentials),
        )
        .await
        .map_err(|_| Error::AuthTimeout {
            email: config.email().to_string(),
            timeout: timeouts.auth,
        })??;

        let mailbox = &config.processing.mailbox;
        tokio::time::timeout(
            timeouts.select,
            session::select_mailbox(&mut session, mailbox),
        )
        .await
        .map_err(|_| Error::SelectTimeout {
            mailbox: mailbox.clone(),
            timeout: timeouts.select,
        })??;

        let smtp = SmtpDispatcher::new(config, &credentials)?;

        debug!(mailbox = %mailbox, "Mailbox ready");

        Ok(Self {
            session: Box::new(session),
            smtp,
            config: config.clone(),
        })
    }
}

fn parse_uid(message_id: &str) -> Result<u32> {
    message_id
        .parse()
        .map_err(|_| Error::MessageNotFound {
            message_id: message_id.to_string(),
        })
}

#[async_trait]
impl Mailbox for ImapMailbox {
    #[instrument(name = "ImapMailbox::list_unread", skip(self))]
    async fn list_unread(&mut self, limit: usize, query: Option<&str>) -> Result<Vec<String>> {
        let timeout = self.config.timeouts.search;
        let uids = tokio::time::timeout(
            timeout,
            session::search_unread(&mut self.session, limit, query),
        )
        .await
        .map_err(|_| Error::SearchTimeout { timeout })??;

        Ok(uids.into_iter().map(|uid| uid.to_string()).collect())
    }

    #[instrument(name = "ImapMailbox::fetch_raw", skip(self))]
    async fn fetch_raw(&mut self, message_id: &str) -> Result<Vec<u8>> {
        let uid = parse_uid(message_id)?;
        let timeout = self.config.timeouts.message_fetch;
        tokio::time::timeout(timeout, session::fetch_peek(&mut self.session, uid))
            .await
            .map_err(|_| Error::FetchTimeout {
                message_id: message_id.to_string(),
                timeout,
            })?
    }

    #[instrument(name = "ImapMailbox::set_read", skip(self))]
    async fn set_read(&mut self, message_id: &str, read: bool) -> Result<()> {
        let uid = parse_uid(message_id)?;
        let timeout = self.config.timeouts.store;
        tokio::time::timeout(timeout, session::store_seen(&mut self.session, uid, read))
            .await
            .map_err(|_| Error::StoreTimeout {
                message_id: message_id.to_string(),
                timeout,
            })?
    }

    async fn send(&mut self, message: &OutgoingMessage) -> Result<()> {
        self.smtp.send(message).await
    }
}

impl std::fmt::Debug for ImapMailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapMailbox")
            .field("email", &self.config.email())
            .field("imap_host", &self.config.servers.imap_host)
            .field("mailbox", &self.config.processing.mailbox)
            .field("smtp", &self.smtp)
            .finish_non_exhaustive()
    }
}

/// RAII guard for [`ImapMailbox`] that logs out on drop.
///
/// Created by [`ImapMailbox::into_guard`]. Implements [`Mailbox`] itself.
pub struct ImapMailboxGuard {
    inner: Option<ImapMailbox>,
}

impl ImapMailboxGuard {
    /// Explicitly logs out and consumes the guard.
    ///
    /// # Errors
    ///
    /// Returns an error if the logout command fails.
    pub async fn logout(mut self) -> Result<()> {
        match self.inner.take() {
            Some(mut mailbox) => mailbox.logout().await,
            None => Ok(()),
        }
    }

    /// Returns the account address, or `None` once logged out.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.inner.as_ref().map(ImapMailbox::email)
    }

    fn mailbox(&mut self) -> Result<&mut ImapMailbox> {
        self.inner.as_mut().ok_or_else(|| Error::AuthUnavailable {
            message: "mailbox already logged out".into(),
            source: None,
        })
    }
}

#[async_trait]
impl Mailbox for ImapMailboxGuard {
    async fn list_unread(&mut self, limit: usize, query: Option<&str>) -> Result<Vec<String>> {
        self.mailbox()?.list_unread(limit, query).await
    }

    async fn fetch_raw(&mut self, message_id: &str) -> Result<Vec<u8>> {
        self.mailbox()?.fetch_raw(message_id).await
    }

    async fn set_read(&mut self, message_id: &str, read: bool) -> Result<()> {
        self.mailbox()?.set_read(message_id, read).await
    }

    async fn send(&mut self, message: &OutgoingMessage) -> Result<()> {
        self.mailbox()?.send(message).await
    }
}

impl Drop for ImapMailboxGuard {
    fn drop(&mut self) {
        let Some(mut mailbox) = self.inner.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    match mailbox.logout().await {
                        Ok(()) => debug!("Mailbox logged out"),
                        Err(e) => warn!(error = %e, "Mailbox logout failed"),
                    }
                });
            }
            Err(_) => {
                warn!(
                    "ImapMailboxGuard dropped outside of a tokio runtime; \
                     closing the connection without IMAP LOGOUT"
                );
            }
        }
    }
}

impl std::fmt::Debug for ImapMailboxGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapMailboxGuard")
            .field("inner", &self.inner)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticTokenAuthenticator;
    use std::time::Duration;

    #[test]
    fn test_parse_uid() {
        assert_eq!(parse_uid("42").unwrap(), 42);
        assert!(matches!(
            parse_uid("<abc@example.com>"),
            Err(Error::MessageNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_connect_without_credentials_is_auth_unavailable() {
        let config = TriageConfig::builder()
            .email("leads@example.com")
            .build()
            .unwrap();
        let err = ImapMailbox::connect(&config, &StaticTokenAuthenticator::new(""))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AuthUnavailable { .. }));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_connect_unreachable_server_is_auth_unavailable() {
        let config = TriageConfig::builder()
            .email("leads@example.com")
            .imap_host("127.0.0.1")
            .imap_port(1)
            .connect_timeout(Duration::from_secs(2))
            .build()
            .unwrap();
        let err = ImapMailbox::connect(&config, &StaticTokenAuthenticator::new("token"))
            .await
            .unwrap_err();
        match err {
            Error::AuthUnavailable { source, .. } => assert!(source.is_some()),
            other => panic!("expected AuthUnavailable, got {other:?}"),
        }
    }
}
