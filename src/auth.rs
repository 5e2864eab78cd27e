//! Mailbox authorization.
//!
//! Every way of getting into a lead inbox (app password, a bearer token produced by a
//! browser/console/paste OAuth flow, or an unattended refresh-token grant) is an
//! implementation of one capability: [`Authenticator`]. The rest of the crate only ever
//! sees the resulting [`MailCredentials`].
//!
//! # Example
//!
//! ```
//! use lead_triage::auth::{Authenticator, MailCredentials, PasswordAuthenticator};
//!
//! # async fn example() -> lead_triage::Result<()> {
//! let auth = PasswordAuthenticator::new("app-password");
//! let creds = auth.credentials().await?;
//! assert!(matches!(creds, MailCredentials::Password(_)));
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

/// Google's OAuth 2.0 token endpoint.
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Credentials accepted by the IMAP and SMTP servers.
#[derive(Clone)]
pub enum MailCredentials {
    /// Account or app-specific password (IMAP `LOGIN`, SMTP `PLAIN` or `LOGIN`).
    Password(SecretString),
    /// OAuth 2.0 access token (`XOAUTH2` on both protocols).
    OAuth2Token(SecretString),
}

impl MailCredentials {
    /// Returns the secret for handing to a protocol client.
    #[must_use]
    pub fn secret(&self) -> &str {
        match self {
            MailCredentials::Password(secret) | MailCredentials::OAuth2Token(secret) => {
                secret.expose_secret()
            }
        }
    }

    /// Returns `true` for bearer-token credentials.
    #[must_use]
    pub fn is_oauth2(&self) -> bool {
        matches!(self, MailCredentials::OAuth2Token(_))
    }
}

impl std::fmt::Debug for MailCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MailCredentials::Password(_) => f.write_str("Password([REDACTED])"),
            MailCredentials::OAuth2Token(_) => f.write_str("OAuth2Token([REDACTED])"),
        }
    }
}

/// Produces credentials for an authorized mailbox handle.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Obtains credentials for the configured account.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AuthUnavailable`] if no usable credentials can be produced.
    async fn credentials(&self) -> Result<MailCredentials>;

    /// Human-readable name of the flow, used in logs.
    fn flow(&self) -> &'static str;
}

/// Authenticates with a fixed account or app-specific password.
#[derive(Clone)]
pub struct PasswordAuthenticator {
    password: SecretString,
}

impl PasswordAuthenticator {
    /// Creates an authenticator for the given password.
    #[must_use]
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: SecretString::from(password.into()),
        }
    }
}

#[async_trait]
impl Authenticator for PasswordAuthenticator {
    async fn credentials(&self) -> Result<MailCredentials> {
        if self.password.expose_secret().is_empty() {
            return Err(Error::AuthUnavailable {
                message: "password is empty".into(),
                source: None,
            });
        }
        Ok(MailCredentials::Password(self.password.clone()))
    }

    fn flow(&self) -> &'static str {
        "password"
    }
}

/// Uses an access token obtained out of band (browser, console or pasted code flow).
#[derive(Clone)]
pub struct StaticTokenAuthenticator {
    token: SecretString,
}

impl StaticTokenAuthenticator {
    /// Creates an authenticator for an already issued access token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: SecretString::from(token.into()),
        }
    }
}

#[async_trait]
impl Authenticator for StaticTokenAuthenticator {
    async fn credentials(&self) -> Result<MailCredentials> {
        if self.token.expose_secret().is_empty() {
            return Err(Error::AuthUnavailable {
                message: "access token is empty".into(),
                source: None,
            });
        }
        Ok(MailCredentials::OAuth2Token(self.token.clone()))
    }

    fn flow(&self) -> &'static str {
        "static-token"
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Exchanges a long-lived refresh token for an access token (OAuth 2.0 `refresh_token` grant).
#[derive(Clone)]
pub struct RefreshTokenAuthenticator {
    token_url: String,
    client_id: String,
    client_secret: SecretString,
    refresh_token: SecretString,
    timeout: Duration,
    http: reqwest::Client,
}

impl RefreshTokenAuthenticator {
    /// Creates an authenticator against Google's token endpoint.
    #[must_use]
    pub fn google(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self::new(GOOGLE_TOKEN_URL, client_id, client_secret, refresh_token)
    }

    /// Creates an authenticator against an arbitrary token endpoint.
    #[must_use]
    pub fn new(
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: SecretString::from(client_secret.into()),
            refresh_token: SecretString::from(refresh_token.into()),
            timeout: Duration::from_secs(10),
            http: reqwest::Client::new(),
        }
    }

    /// Sets the timeout for the token request.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn unavailable(message: impl Into<String>, source: reqwest::Error) -> Error {
        Error::AuthUnavailable {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

#[async_trait]
impl Authenticator for RefreshTokenAuthenticator {
    #[instrument(
        name = "RefreshTokenAuthenticator::credentials",
        skip_all,
        fields(token_url = %self.token_url)
    )]
    async fn credentials(&self) -> Result<MailCredentials> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
            ("refresh_token", self.refresh_token.expose_secret()),
            ("grant_type", "refresh_token"),
        ];

        let response = self
            .http
            .post(&self.token_url)
            .timeout(self.timeout)
            .form(&params)
            .send()
            .await
            .map_err(|e| Self::unavailable("token endpoint unreachable", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::AuthUnavailable {
                message: format!("token endpoint returned HTTP {}", status.as_u16()),
                source: None,
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| Self::unavailable("malformed token response", e))?;

        debug!(expires_in = ?token.expires_in, "Access token refreshed");

        Ok(MailCredentials::OAuth2Token(SecretString::from(
            token.access_token,
        )))
    }

    fn flow(&self) -> &'static str {
        "refresh-token"
    }
}

impl std::fmt::Debug for RefreshTokenAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshTokenAuthenticator")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}
