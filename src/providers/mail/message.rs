//! RFC 5322 message conversion.

use chrono::{DateTime, Utc};
use mail_parser::MessageParser;

use crate::domain::{ProviderMessageId, RawEmail};

use super::traits::{MailSourceError, Result};

/// Parses a raw RFC 5322 message into the engine's input type.
///
/// The provider-assigned id stays the canonical identifier regardless of
/// the Message-ID header. A missing Date header falls back to the current
/// time so the email still sorts deterministically within a run.
pub fn raw_email_from_rfc5322(id: ProviderMessageId, raw: &[u8]) -> Result<RawEmail> {
    let message = MessageParser::default()
        .parse(raw)
        .ok_or_else(|| MailSourceError::Malformed(format!("unparseable message {id}")))?;

    let sender = message
        .from()
        .and_then(|addr| addr.first())
        .and_then(|a| a.address())
        .map(|s| s.to_string())
        .unwrap_or_default();

    let received_at = message
        .date()
        .and_then(|d| DateTime::from_timestamp(d.to_timestamp(), 0))
        .unwrap_or_else(Utc::now);

    Ok(RawEmail {
        message_id: id,
        sender,
        subject: message.subject().unwrap_or_default().to_string(),
        body_html: message.body_html(0).map(|s| s.to_string()),
        body_text: message.body_text(0).map(|s| s.to_string()),
        received_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_a_plain_text_message() {
        let raw = concat!(
            "From: Amazon <ship-confirm@amazon.in>\r\n",
            "Date: Tue, 03 Jun 2025 10:00:00 +0000\r\n",
            "Subject: Order Confirmed: Desk Lamp\r\n",
            "Content-Type: text/plain; charset=utf-8\r\n",
            "\r\n",
            "Order #123-4567890-1234567\r\n",
        );

        let email = raw_email_from_rfc5322(ProviderMessageId::from("msg-1"), raw.as_bytes())
            .expect("message should parse");

        assert_eq!(email.message_id, ProviderMessageId::from("msg-1"));
        assert_eq!(email.sender, "ship-confirm@amazon.in");
        assert_eq!(email.subject, "Order Confirmed: Desk Lamp");
        assert!(email
            .body_text
            .as_deref()
            .unwrap()
            .contains("123-4567890-1234567"));
        assert_eq!(
            email.received_at,
            Utc.with_ymd_and_hms(2025, 6, 3, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn html_part_is_preserved() {
        let raw = concat!(
            "From: orders@flipkart.com\r\n",
            "Subject: shipped\r\n",
            "Content-Type: text/html; charset=utf-8\r\n",
            "\r\n",
            "<p>Your order OD123456789012345 has shipped</p>\r\n",
        );

        let email = raw_email_from_rfc5322(ProviderMessageId::from("msg-2"), raw.as_bytes())
            .expect("message should parse");

        assert!(email
            .body_html
            .as_deref()
            .unwrap()
            .contains("OD123456789012345"));
    }

    #[test]
    fn empty_input_is_malformed() {
        let result = raw_email_from_rfc5322(ProviderMessageId::from("msg-3"), b"");
        assert!(matches!(result, Err(MailSourceError::Malformed(_))));
    }
}
