//! Internal IMAP session management.
//!
//! Thin wrappers over async-imap commands that attach context to their errors.

use crate::auth::MailCredentials;
use crate::connection::TlsStream;
use crate::error::{Error, Result};
use async_imap::Session;
use futures::{Stream, StreamExt};
use tracing::{debug, instrument};

/// Type alias for IMAP session over TLS.
pub(crate) type ImapSession = Session<TlsStream>;

/// SASL XOAUTH2 initial response for an access token.
struct XOAuth2<'a> {
    user: &'a str,
    token: &'a str,
}

impl async_imap::Authenticator for XOAuth2<'_> {
    type Response = String;

    fn process(&mut self, _challenge: &[u8]) -> Self::Response {
        format!("user={}\x01auth=Bearer {}\x01\x01", self.user, self.token)
    }
}

/// Logs in with a password or authenticates with XOAUTH2, depending on the credentials.
#[instrument(
    name = "session::authenticate",
    skip_all,
    fields(email = %email, oauth2 = credentials.is_oauth2())
)]
pub(crate) async fn authenticate(
    tls_stream: TlsStream,
    email: &str,
    credentials: &MailCredentials,
) -> Result<ImapSession> {
    let client = async_imap::Client::new(tls_stream);

    debug!("Authenticating to IMAP server");

    let result = match credentials {
        MailCredentials::Password(_) => client.login(email, credentials.secret()).await,
        MailCredentials::OAuth2Token(_) => {
            let auth = XOAuth2 {
                user: email,
                token: credentials.secret(),
            };
            client.authenticate("XOAUTH2", auth).await
        }
    };

    result.map_err(|(source, _client)| Error::ImapLogin {
        email: email.to_string(),
        source,
    })
}

#[instrument(name = "session::select", skip(session))]
pub(crate) async fn select_mailbox(session: &mut ImapSession, mailbox: &str) -> Result<()> {
    let selected = session
        .select(mailbox)
        .await
        .map_err(|source| Error::SelectMailbox {
            mailbox: mailbox.to_string(),
            source,
        })?;

    debug!(exists = selected.exists, "Mailbox selected");
    Ok(())
}

/// Builds the `UID SEARCH` criteria for unread messages.
pub(crate) fn unread_query(extra: Option<&str>) -> String {
    match extra.map(str::trim).filter(|q| !q.is_empty()) {
        Some(extra) => format!("UNSEEN {extra}"),
        None => "UNSEEN".to_string(),
    }
}

/// Returns unread UIDs, highest (newest) first, at most `limit` of them.
#[instrument(name = "session::search_unread", skip(session))]
pub(crate) async fn search_unread(
    session: &mut ImapSession,
    limit: usize,
    extra: Option<&str>,
) -> Result<Vec<u32>> {
    let query = unread_query(extra);

    let found = session
        .uid_search(&query)
        .await
        .map_err(|source| Error::ImapSearch {
            query: query.clone(),
            source,
        })?;

    let mut uids: Vec<u32> = found.into_iter().collect();
    uids.sort_unstable_by(|a, b| b.cmp(a));
    let total = uids.len();
    uids.truncate(limit);

    debug!(total, returned = uids.len(), "Unread messages found");
    Ok(uids)
}

/// Fetches the full message without setting `\Seen`.
#[instrument(name = "session::fetch_peek", skip(session))]
pub(crate) async fn fetch_peek(session: &mut ImapSession, uid: u32) -> Result<Vec<u8>> {
    let message_id = uid.to_string();
    let fetch_error = |source| Error::ImapFetch {
        message_id: message_id.clone(),
        source,
    };

    let stream = session
        .uid_fetch(&message_id, "BODY.PEEK[]")
        .await
        .map_err(fetch_error)?;
    futures::pin_mut!(stream);

    let mut body = None;
    while let Some(fetch) = stream.next().await {
        let fetch = fetch.map_err(fetch_error)?;
        if body.is_none() {
            body = fetch.body().map(<[u8]>::to_vec);
        }
    }

    let body = body.ok_or_else(|| Error::MessageNotFound {
        message_id: message_id.clone(),
    })?;
    debug!(size = body.len(), "Message fetched");
    Ok(body)
}

/// Adds or removes `\Seen` on one message.
#[instrument(name = "session::store_seen", skip(session))]
pub(crate) async fn store_seen(session: &mut ImapSession, uid: u32, seen: bool) -> Result<()> {
    let message_id = uid.to_string();
    let command = if seen {
        "+FLAGS (\\Seen)"
    } else {
        "-FLAGS (\\Seen)"
    };

    let stream = session
        .uid_store(&message_id, command)
        .await
        .map_err(|source| Error::ImapStore {
            message_id: message_id.clone(),
            source,
        })?;
    drain(stream).await.map_err(|source| Error::ImapStore {
        message_id: message_id.clone(),
        source,
    })?;

    debug!("Flags updated");
    Ok(())
}

#[instrument(name = "session::logout", skip(session))]
pub(crate) async fn logout(session: &mut ImapSession) -> Result<()> {
    debug!("Logging out");

    session
        .logout()
        .await
        .map_err(|source| Error::ImapLogout { source })
}

async fn drain<T, E>(stream: impl Stream<Item = std::result::Result<T, E>>) -> std::result::Result<(), E> {
    futures::pin_mut!(stream);
    while let Some(item) = stream.next().await {
        item?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unread_query() {
        assert_eq!(unread_query(None), "UNSEEN");
        assert_eq!(unread_query(Some("  ")), "UNSEEN");
        assert_eq!(
            unread_query(Some("SUBJECT \"lead\"")),
            "UNSEEN SUBJECT \"lead\""
        );
    }

    #[test]
    fn test_xoauth2_response() {
        use async_imap::Authenticator as _;

        let mut auth = XOAuth2 {
            user: "leads@gmail.com",
            token: "ya29.token",
        };
        assert_eq!(
            auth.process(b""),
            "user=leads@gmail.com\x01auth=Bearer ya29.token\x01\x01"
        );
    }
}
