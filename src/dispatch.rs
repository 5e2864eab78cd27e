//! Internal module for submitting mail over SMTP.

use crate::auth::MailCredentials;
use crate::config::TriageConfig;
use crate::error::{Error, Result};
use crate::known_servers::SmtpSecurity;
use crate::mailbox::OutgoingMessage;
use lettre::message::header::ContentType;
use lettre::message::Mailbox as Address;
use lettre::transport::smtp::authentication::{Credentials, Mechanism};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;
use tracing::{debug, instrument};

/// SMTP submission client bound to one account.
pub(crate) struct SmtpDispatcher {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Address,
    host: String,
    timeout: Duration,
}

impl SmtpDispatcher {
    /// Builds the transport. No connection is made until the first send.
    pub(crate) fn new(config: &TriageConfig, credentials: &MailCredentials) -> Result<Self> {
        let host = config.servers.smtp_host.clone();
        let from = parse_address(config.email())?;

        let builder = match config.servers.smtp_security {
            SmtpSecurity::ImplicitTls => AsyncSmtpTransport::<Tokio1Executor>::relay(&host),
            SmtpSecurity::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&host),
        }
        .map_err(|source| Error::SmtpSend {
            host: host.clone(),
            source,
        })?;

        let transport = builder
            .port(config.smtp_port)
            .credentials(Credentials::new(
                config.email().to_string(),
                credentials.secret().to_string(),
            ))
            .authentication(mechanisms(credentials))
            .timeout(Some(config.timeouts.send))
            .build();

        Ok(Self {
            transport,
            from,
            host,
            timeout: config.timeouts.send,
        })
    }

    #[instrument(name = "SmtpDispatcher::send", skip_all, fields(host = %self.host, to = %outgoing.to))]
    pub(crate) async fn send(&self, outgoing: &OutgoingMessage) -> Result<()> {
        let message = build_message(self.from.clone(), outgoing)?;

        let response = tokio::time::timeout(self.timeout, self.transport.send(message))
            .await
            .map_err(|_| Error::SendTimeout {
                timeout: self.timeout,
            })?
            .map_err(|source| Error::SmtpSend {
                host: self.host.clone(),
                source,
            })?;

        debug!(code = %response.code(), "Message accepted");
        Ok(())
    }
}

impl std::fmt::Debug for SmtpDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpDispatcher")
            .field("host", &self.host)
            .field("from", &self.from.to_string())
            .finish_non_exhaustive()
    }
}

/// SASL mechanisms offered to the server, in preference order.
fn mechanisms(credentials: &MailCredentials) -> Vec<Mechanism> {
    if credentials.is_oauth2() {
        vec![Mechanism::Xoauth2]
    } else {
        vec![Mechanism::Plain, Mechanism::Login]
    }
}

fn parse_address(address: &str) -> Result<Address> {
    address.parse().map_err(|source| Error::InvalidAddress {
        address: address.to_string(),
        source,
    })
}

fn build_message(from: Address, outgoing: &OutgoingMessage) -> Result<Message> {
    let mut builder = Message::builder()
        .from(from)
        .to(parse_address(&outgoing.to)?)
        .subject(outgoing.subject.as_str())
        .header(ContentType::TEXT_PLAIN);

    if let Some(parent) = &outgoing.in_reply_to {
        builder = builder
            .in_reply_to(parent.clone())
            .references(parent.clone());
    }

    builder
        .body(outgoing.body.clone())
        .map_err(|source| Error::MessageBuild { source })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outgoing(in_reply_to: Option<&str>) -> OutgoingMessage {
        OutgoingMessage {
            to: "seller@example.com".into(),
            subject: "Offer analysis: 123 Main St, FL 33701".into(),
            body: "Maximum offer: $109200.00\n".into(),
            in_reply_to: in_reply_to.map(str::to_string),
        }
    }

    #[test]
    fn test_build_reply_headers() {
        let from = parse_address("leads@example.com").unwrap();
        let message = build_message(from, &outgoing(Some("<lead@example.com>"))).unwrap();
        let formatted = String::from_utf8(message.formatted()).unwrap();

        assert!(formatted.contains("To: seller@example.com"));
        assert!(formatted.contains("In-Reply-To: <lead@example.com>"));
        assert!(formatted.contains("Subject: Offer analysis: 123 Main St, FL 33701"));
    }

    #[test]
    fn test_build_without_reply() {
        let from = parse_address("leads@example.com").unwrap();
        let message = build_message(from, &outgoing(None)).unwrap();
        let formatted = String::from_utf8(message.formatted()).unwrap();
        assert!(!formatted.contains("In-Reply-To"));
    }

    #[test]
    fn test_invalid_recipient() {
        let from = parse_address("leads@example.com").unwrap();
        let mut message = outgoing(None);
        message.to = "not an address".into();
        assert!(matches!(
            build_message(from, &message),
            Err(Error::InvalidAddress { .. })
        ));
    }

    #[test]
    fn test_password_offers_plain_and_login() {
        let password = MailCredentials::Password("hunter2".to_string().into());
        assert_eq!(mechanisms(&password), [Mechanism::Plain, Mechanism::Login]);

        let token = MailCredentials::OAuth2Token("ya29.token".to_string().into());
        assert_eq!(mechanisms(&token), [Mechanism::Xoauth2]);
    }

    #[test]
    fn test_dispatcher_debug_hides_secret() {
        let config = TriageConfig::builder()
            .email("leads@gmail.com")
            .build()
            .unwrap();
        let dispatcher =
            SmtpDispatcher::new(&config, &MailCredentials::Password("hunter2".to_string().into()))
                .unwrap();
        let debug = format!("{dispatcher:?}");
        assert!(debug.contains("smtp.gmail.com"));
        assert!(!debug.contains("hunter2"));
    }
}
