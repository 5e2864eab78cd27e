//! Internal module for parsing lead emails.

use crate::error::{Error, Result};
use mailparse::{addrparse_header, parse_mail, MailAddr, MailHeaderMap, ParsedMail};
use tracing::{debug, warn};

/// The parts of a lead email the pipeline uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParsedLead {
    /// Decoded text of the first `text/plain` part.
    pub body: String,
    /// Bare address of the first `From` mailbox.
    pub from: Option<String>,
    pub subject: Option<String>,
    /// `Message-ID` header, used to thread replies.
    pub message_id_header: Option<String>,
}

/// Parses a raw RFC 5322 message into a [`ParsedLead`].
///
/// `message_id` is the mailbox identifier and only used for error context.
pub(crate) fn parse_lead(raw: &[u8], message_id: &str) -> Result<ParsedLead> {
    let parsed = parse_mail(raw).map_err(|source| {
        warn!(message_id, error = %source, "Failed to parse email");
        Error::BodyExtractionFailed {
            message_id: message_id.to_string(),
            reason: source.to_string(),
        }
    })?;

    let body = find_plain_text(&parsed)
        .ok_or_else(|| Error::BodyExtractionFailed {
            message_id: message_id.to_string(),
            reason: "no text/plain part".into(),
        })?
        .get_body()
        .map_err(|e| Error::BodyExtractionFailed {
            message_id: message_id.to_string(),
            reason: e.to_string(),
        })?;

    let lead = ParsedLead {
        body,
        from: sender_address(&parsed),
        subject: parsed.headers.get_first_value("Subject"),
        message_id_header: parsed
            .headers
            .get_first_value("Message-ID")
            .map(|v| v.trim().to_string()),
    };

    debug!(
        message_id,
        body_len = lead.body.len(),
        has_sender = lead.from.is_some(),
        "Parsed lead email"
    );

    Ok(lead)
}

/// Depth-first search for the first `text/plain` part.
///
/// A message without subparts qualifies only if it is itself `text/plain`.
fn find_plain_text<'a, 'b>(part: &'b ParsedMail<'a>) -> Option<&'b ParsedMail<'a>> {
    if part.subparts.is_empty() {
        return part
            .ctype
            .mimetype
            .eq_ignore_ascii_case("text/plain")
            .then_some(part);
    }
    part.subparts.iter().find_map(find_plain_text)
}

fn sender_address(parsed: &ParsedMail<'_>) -> Option<String> {
    let header = parsed.headers.get_first_header("From")?;
    let list = addrparse_header(header).ok()?;
    list.iter().find_map(|addr| match addr {
        MailAddr::Single(info) => Some(info.addr.clone()),
        MailAddr::Group(group) => group.addrs.first().map(|info| info.addr.clone()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_message() {
        let raw = b"From: Seller <seller@example.com>\r\nTo: leads@example.com\r\nSubject: House for sale\r\nMessage-ID: <abc@example.com>\r\n\r\n123 Main St, FL 33701 ... 3 bed 2 bath";
        let lead = parse_lead(raw, "1").unwrap();
        assert_eq!(lead.body.trim_end(), "123 Main St, FL 33701 ... 3 bed 2 bath");
        assert_eq!(lead.from.as_deref(), Some("seller@example.com"));
        assert_eq!(lead.subject.as_deref(), Some("House for sale"));
        assert_eq!(lead.message_id_header.as_deref(), Some("<abc@example.com>"));
    }

    #[test]
    fn test_parse_multipart_prefers_first_plain_part() {
        let raw = concat!(
            "From: seller@example.com\r\n",
            "Content-Type: multipart/alternative; boundary=\"b1\"\r\n",
            "\r\n",
            "--b1\r\n",
            "Content-Type: text/html\r\n",
            "\r\n",
            "<p>9 Wrong Way, CA 90001</p>\r\n",
            "--b1\r\n",
            "Content-Type: text/plain; charset=utf-8\r\n",
            "\r\n",
            "45 Oak Ave, TX 78704 4 bed 3 bath\r\n",
            "--b1--\r\n",
        );
        let lead = parse_lead(raw.as_bytes(), "2").unwrap();
        assert!(lead.body.contains("45 Oak Ave, TX 78704"));
        assert!(!lead.body.contains("Wrong Way"));
    }

    #[test]
    fn test_parse_nested_multipart() {
        let raw = concat!(
            "From: seller@example.com\r\n",
            "Content-Type: multipart/mixed; boundary=\"outer\"\r\n",
            "\r\n",
            "--outer\r\n",
            "Content-Type: multipart/alternative; boundary=\"inner\"\r\n",
            "\r\n",
            "--inner\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "nested body 2 bed 1 bath\r\n",
            "--inner--\r\n",
            "--outer\r\n",
            "Content-Type: application/pdf\r\n",
            "\r\n",
            "JVBERi0=\r\n",
            "--outer--\r\n",
        );
        let lead = parse_lead(raw.as_bytes(), "3").unwrap();
        assert!(lead.body.contains("nested body"));
    }

    #[test]
    fn test_html_only_message_has_no_body() {
        let raw = b"From: seller@example.com\r\nContent-Type: text/html\r\n\r\n<p>hello</p>";
        let err = parse_lead(raw, "4").unwrap_err();
        assert!(matches!(
            err,
            Error::BodyExtractionFailed { ref message_id, .. } if message_id == "4"
        ));
    }

    #[test]
    fn test_missing_headers_are_none() {
        let raw = b"Content-Type: text/plain\r\n\r\nJust a body";
        let lead = parse_lead(raw, "5").unwrap();
        assert_eq!(lead.from, None);
        assert_eq!(lead.subject, None);
        assert_eq!(lead.message_id_header, None);
    }

    #[test]
    fn test_unparseable_message_is_body_extraction_failure() {
        let raw = b" Subject: continuation without a header\r\n\r\nbody";
        match parse_lead(raw, "6").unwrap_err() {
            Error::BodyExtractionFailed { message_id, reason } => {
                assert_eq!(message_id, "6");
                assert!(reason.contains("cannot start with a space"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
