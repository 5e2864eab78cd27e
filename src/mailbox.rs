//! The mailbox capability the inbox processor works against.
//!
//! [`ImapMailbox`](crate::ImapMailbox) implements it over IMAP and SMTP. Tests and
//! other backends (a provider REST API, a local maildir) can supply their own.

use crate::error::Result;
use async_trait::async_trait;

/// An email to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Plain text body.
    pub body: String,
    /// `Message-ID` of the message being answered, if this is a reply.
    pub in_reply_to: Option<String>,
}

/// Operations a mail store must offer for triage.
///
/// Messages are addressed by a stable identifier (an IMAP UID for
/// [`ImapMailbox`](crate::ImapMailbox)). Read state is always changed per message,
/// never by query.
#[async_trait]
pub trait Mailbox: Send {
    /// Lists identifiers of unread messages, newest first, at most `limit` of them.
    ///
    /// `query` adds backend-specific search terms.
    ///
    /// # Errors
    ///
    /// Returns an error if the mailbox cannot be queried.
    async fn list_unread(&mut self, limit: usize, query: Option<&str>) -> Result<Vec<String>>;

    /// Returns the raw RFC 5322 message without changing its read state.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be fetched.
    async fn fetch_raw(&mut self, message_id: &str) -> Result<Vec<u8>>;

    /// Sets or clears the read flag of one message.
    ///
    /// # Errors
    ///
    /// Returns an error if the flag cannot be updated.
    async fn set_read(&mut self, message_id: &str, read: bool) -> Result<()>;

    /// Sends a new message from the mailbox's account.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be submitted.
    async fn send(&mut self, message: &OutgoingMessage) -> Result<()>;
}
