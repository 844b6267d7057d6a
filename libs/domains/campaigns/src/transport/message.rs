//! MIME assembly shared by the SES and SMTP transports.

use super::OutboundEmail;
use crate::models::Attachment;
use eyre::{Result, WrapErr};
use lettre::Message;
use lettre::message::header::{
    ContentTransferEncoding, ContentType, Header, HeaderName, HeaderValue,
};
use lettre::message::{Attachment as MimeAttachment, Mailbox, MultiPart, SinglePart};
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::debug;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// `List-Unsubscribe` header; the value is already in `<url>` form
#[derive(Debug, Clone, PartialEq, Eq)]
struct ListUnsubscribe(String);

impl Header for ListUnsubscribe {
    fn name() -> HeaderName {
        HeaderName::new_from_ascii_str("List-Unsubscribe")
    }

    fn parse(s: &str) -> std::result::Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Self(s.to_string()))
    }

    fn display(&self) -> HeaderValue {
        HeaderValue::new(Self::name(), self.0.clone())
    }
}

/// An attachment downloaded and ready to embed
#[derive(Debug, Clone)]
pub struct FetchedAttachment {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Downloads URL-linked attachments at send time
#[derive(Debug, Clone)]
pub struct AttachmentFetcher {
    client: reqwest::Client,
}

impl AttachmentFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .wrap_err("Failed to build attachment HTTP client")?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub async fn fetch(&self, attachment: &Attachment) -> Result<FetchedAttachment> {
        let response = self
            .client
            .get(&attachment.url)
            .send()
            .await
            .wrap_err_with(|| format!("Failed to download attachment '{}'", attachment.name))?
            .error_for_status()
            .wrap_err_with(|| format!("Failed to download attachment '{}'", attachment.name))?;

        let served_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let bytes = response
            .bytes()
            .await
            .wrap_err_with(|| format!("Failed to read attachment '{}'", attachment.name))?;

        let content_type = guess_content_type(&attachment.name)
            .map(str::to_string)
            .or(served_type)
            .unwrap_or_else(|| FALLBACK_CONTENT_TYPE.to_string());

        debug!(name = %attachment.name, size = bytes.len(), "Fetched attachment");

        Ok(FetchedAttachment {
            name: attachment.name.clone(),
            content_type,
            bytes: bytes.to_vec(),
        })
    }

    pub async fn fetch_all(&self, attachments: &[Attachment]) -> Result<Vec<FetchedAttachment>> {
        let mut fetched = Vec::with_capacity(attachments.len());
        for attachment in attachments {
            fetched.push(self.fetch(attachment).await?);
        }
        Ok(fetched)
    }
}

fn guess_content_type(name: &str) -> Option<&'static str> {
    let extension = name.rsplit_once('.')?.1.to_ascii_lowercase();
    let content_type = match extension.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "json" => "application/json",
        "xml" => "application/xml",
        "zip" => "application/zip",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        _ => return None,
    };
    Some(content_type)
}

fn base64_part(content_type: ContentType, body: String) -> SinglePart {
    SinglePart::builder()
        .header(content_type)
        .header(ContentTransferEncoding::Base64)
        .body(body)
}

/// Build the MIME message: text/html alternative, attachments as mixed parts.
///
/// Bodies are base64 encoded so relays cannot rewrite whitespace under a
/// DKIM signature.
pub fn build_message(email: &OutboundEmail, attachments: Vec<FetchedAttachment>) -> Result<Message> {
    let from: Mailbox = email.from.parse().wrap_err("Invalid from address")?;
    let to: Mailbox = email.to.parse().wrap_err("Invalid recipient address")?;

    let mut builder = Message::builder()
        .from(from)
        .to(to)
        .subject(email.subject.clone());

    if let Some(reply_to) = &email.reply_to {
        let reply_to: Mailbox = reply_to.parse().wrap_err("Invalid reply-to address")?;
        builder = builder.reply_to(reply_to);
    }

    if let Some(value) = &email.list_unsubscribe {
        builder = builder.header(ListUnsubscribe(value.clone()));
    }

    let alternative = MultiPart::alternative()
        .singlepart(base64_part(ContentType::TEXT_PLAIN, email.text.clone()))
        .singlepart(base64_part(ContentType::TEXT_HTML, email.html.clone()));

    let message = if attachments.is_empty() {
        builder.multipart(alternative)
    } else {
        let mut mixed = MultiPart::mixed().multipart(alternative);
        for attachment in attachments {
            let content_type = ContentType::parse(&attachment.content_type)
                .or_else(|_| ContentType::parse(FALLBACK_CONTENT_TYPE))
                .wrap_err("Invalid attachment content type")?;
            mixed = mixed
                .singlepart(MimeAttachment::new(attachment.name).body(attachment.bytes, content_type));
        }
        builder.multipart(mixed)
    };

    message.wrap_err("Failed to build MIME message")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email() -> OutboundEmail {
        OutboundEmail {
            to: "ana@example.com".into(),
            from: "Shop <news@shop.example>".into(),
            reply_to: Some("help@shop.example".into()),
            subject: "Spring sale".into(),
            html: "<p>Hi</p>".into(),
            text: "Hi".into(),
            attachments: Vec::new(),
            list_unsubscribe: Some("<https://app.toolmail.com/unsubscribe?id=abc>".into()),
        }
    }

    #[test]
    fn test_headers_present() {
        let message = build_message(&email(), Vec::new()).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("List-Unsubscribe: <https://app.toolmail.com/unsubscribe?id=abc>"));
        assert!(raw.contains("Reply-To: help@shop.example"));
        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("Content-Transfer-Encoding: base64"));
    }

    #[test]
    fn test_attachments_use_mixed() {
        let attachment = FetchedAttachment {
            name: "invoice.pdf".into(),
            content_type: "application/pdf".into(),
            bytes: b"%PDF-1.4".to_vec(),
        };
        let message = build_message(&email(), vec![attachment]).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("multipart/mixed"));
        assert!(raw.contains("invoice.pdf"));
        assert!(raw.contains("application/pdf"));
    }

    #[test]
    fn test_invalid_recipient_is_an_error() {
        let mut bad = email();
        bad.to = "not an address".into();
        assert!(build_message(&bad, Vec::new()).is_err());
    }

    #[test]
    fn test_guess_content_type() {
        assert_eq!(guess_content_type("Report.PDF"), Some("application/pdf"));
        assert_eq!(guess_content_type("photo.jpeg"), Some("image/jpeg"));
        assert_eq!(guess_content_type("README"), None);
        assert_eq!(guess_content_type("blob.bin"), None);
    }
}
