//! Turns a personalized body into a deliverable message: reply-to policy,
//! tracking footer, document normalization and a plain-text alternative.

use super::OutboundEmail;
use super::provider::{ProviderConfig, ProviderKind};
use crate::config::EnvelopeConfig;
use crate::models::Recipient;
use regex::Regex;
use std::sync::LazyLock;
use uuid::Uuid;

const FREEMAIL_DOMAINS: &[&str] = &["@gmail.com", "@yahoo.com", "@hotmail.com"];

static DISPLAY_NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(.*)<.*>$").unwrap());
static STYLE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<style[^>]*>.*?</style>").unwrap());
static SCRIPT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script[^>]*>.*?</script>").unwrap());
static LINE_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").unwrap());
static PARAGRAPH_END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</p>").unwrap());
static ANY_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static BLANK_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\s+\n").unwrap());

struct FooterText {
    do_not_reply: &'static str,
    sent_by: &'static str,
    contact: &'static str,
    why_title: &'static str,
    why_body: &'static str,
    unsubscribe: &'static str,
    default_sender: &'static str,
}

const FOOTER_RO: FooterText = FooterText {
    do_not_reply: "Vă rugăm să nu răspundeți la acest e-mail. Adresa de expediție nu este monitorizată.",
    sent_by: "Acest e-mail a fost trimis de",
    contact: "Aveți întrebări? Scrieți direct expeditorului la adresa:",
    why_title: "De ce am primit acest e-mail?",
    why_body: "Primiți acest mesaj deoarece adresa dumneavoastră se află în lista de contacte a expeditorului. Dacă nu mai doriți astfel de mesaje, folosiți link-ul de dezabonare de mai jos.",
    unsubscribe: "Dezabonare",
    default_sender: "Expeditor",
};

const FOOTER_EN: FooterText = FooterText {
    do_not_reply: "Please do not reply to this email. The sender address is not monitored.",
    sent_by: "This email was sent by",
    contact: "Have questions? Write to the sender directly at:",
    why_title: "Why did I receive this email?",
    why_body: "You are receiving this message because your address is on the sender's contact list. If you no longer want such messages, use the unsubscribe link below.",
    unsubscribe: "Unsubscribe",
    default_sender: "Sender",
};

const FOOTER_EL: FooterText = FooterText {
    do_not_reply: "Παρακαλούμε μην απαντάτε σε αυτό το email. Η διεύθυνση αποστολέα δεν παρακολουθείται.",
    sent_by: "Αυτό το email στάλθηκε από",
    contact: "Έχετε ερωτήσεις; Γράψτε απευθείας στον αποστολέα στη διεύθυνση:",
    why_title: "Γιατί έλαβα αυτό το email;",
    why_body: "Λαμβάνετε αυτό το μήνυμα επειδή η διεύθυνσή σας βρίσκεται στη λίστα επαφών του αποστολέα. Εάν δεν επιθυμείτε πλέον τέτοια μηνύματα, χρησιμοποιήστε τον σύνδεσμο διαγραφής παρακάτω.",
    unsubscribe: "Διαγραφή",
    default_sender: "Αποστολέας",
};

fn footer_text(language: Option<&str>) -> &'static FooterText {
    match language.map(str::to_ascii_lowercase).as_deref() {
        Some("en") => &FOOTER_EN,
        Some("el") => &FOOTER_EL,
        _ => &FOOTER_RO,
    }
}

/// Builds [`OutboundEmail`]s for one deployment's settings
#[derive(Debug, Clone, Default)]
pub struct EnvelopeBuilder {
    config: EnvelopeConfig,
}

impl EnvelopeBuilder {
    pub fn new(config: EnvelopeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EnvelopeConfig {
        &self.config
    }

    /// Assemble the message for one recipient from an already personalized body
    pub fn build(
        &self,
        recipient: &Recipient,
        subject: String,
        html: String,
        provider: &ProviderConfig,
    ) -> OutboundEmail {
        let from = provider
            .from
            .clone()
            .filter(|from| !from.trim().is_empty())
            .unwrap_or_else(|| self.config.default_from.clone());

        let html = match recipient.tracking_id {
            Some(tracking_id) if provider.provider != ProviderKind::Smtp => {
                inject_before_body_end(&html, &self.footer(tracking_id, provider))
            }
            _ => html,
        };

        let html = normalize_document(&html);
        let text = plain_text(&html);

        OutboundEmail {
            to: recipient.email.trim().to_string(),
            reply_to: resolve_reply_to(provider, &from),
            from,
            subject,
            html,
            text,
            attachments: recipient.attachments.clone(),
            list_unsubscribe: recipient
                .tracking_id
                .map(|id| format!("<{}>", self.unsubscribe_url(self.config.public_url(), id))),
        }
    }

    fn unsubscribe_url(&self, base: &str, tracking_id: Uuid) -> String {
        format!("{}/unsubscribe?id={}", base.trim_end_matches('/'), tracking_id)
    }

    fn footer(&self, tracking_id: Uuid, provider: &ProviderConfig) -> String {
        let text = footer_text(provider.language.as_deref());
        let sender = provider
            .from
            .as_deref()
            .map(sender_name)
            .unwrap_or_else(|| text.default_sender.to_string());
        let link = self.unsubscribe_url(&self.config.frontend_url, tracking_id);

        let contact = match provider.reply_to.as_deref() {
            Some(reply_to) if !reply_to.trim().is_empty() => format!(
                r#"<p style="margin-bottom: 15px;">{} <a href="mailto:{reply_to}" style="color: #4c51bf; font-weight: bold;">{reply_to}</a></p>"#,
                text.contact
            ),
            _ => String::new(),
        };

        format!(
            r#"
<table role="presentation" cellspacing="0" cellpadding="0" border="0" width="100%" style="margin-top: 30px; border-top: 1px solid #e2e8f0; padding-top: 20px;">
    <tr>
        <td style="font-family: sans-serif; font-size: 12px; color: #4a5568;">
            <p style="margin-bottom: 10px; font-weight: bold; color: #e53e3e;">{do_not_reply}</p>
            <p style="margin-bottom: 10px;">{sent_by} <strong>{sender}</strong></p>
            {contact}
            <strong>{why_title}</strong><br />
            {why_body}
        </td>
    </tr>
    <tr>
        <td style="padding-top: 20px; font-family: sans-serif; font-size: 11px; color: #a0aec0; text-align: center;">
            <a href="{link}" style="color: #a0aec0; text-decoration: underline;">{unsubscribe}</a>
        </td>
    </tr>
</table>"#,
            do_not_reply = text.do_not_reply,
            sent_by = text.sent_by,
            why_title = text.why_title,
            why_body = text.why_body,
            unsubscribe = text.unsubscribe,
        )
    }
}

/// Reply-to after deliverability rules.
///
/// Shared SES always replies to the sender alias. Elsewhere a free-mail
/// reply-to behind a custom-domain sender is dropped.
pub fn resolve_reply_to(provider: &ProviderConfig, from: &str) -> Option<String> {
    if provider.provider == ProviderKind::SharedSes {
        return Some(from.to_string());
    }

    let reply_to = provider
        .reply_to
        .clone()
        .filter(|reply_to| !reply_to.trim().is_empty())?;

    if is_freemail(&reply_to) && !is_freemail(from) {
        return None;
    }
    Some(reply_to)
}

fn is_freemail(address: &str) -> bool {
    let address = address.to_ascii_lowercase();
    FREEMAIL_DOMAINS
        .iter()
        .any(|domain| address.contains(domain))
}

/// Display name of a `Name <addr>` sender, else the sender as given
fn sender_name(from: &str) -> String {
    match DISPLAY_NAME.captures(from.trim()) {
        Some(captures) => captures[1]
            .trim()
            .trim_matches(|c| c == '"' || c == '\'')
            .to_string(),
        None => from.trim().to_string(),
    }
}

fn inject_before_body_end(html: &str, fragment: &str) -> String {
    match html.find("</body>") {
        Some(index) => {
            let mut out = String::with_capacity(html.len() + fragment.len());
            out.push_str(&html[..index]);
            out.push_str(fragment);
            out.push_str(&html[index..]);
            out
        }
        None => format!("{html}{fragment}"),
    }
}

/// Wrap fragments in a UTF-8 document, or add a charset to an existing one
pub fn normalize_document(html: &str) -> String {
    if !html.contains("<html") && !html.contains("<body") {
        return format!(
            "<!DOCTYPE html>\n<html>\n<head>\n    <meta charset=\"UTF-8\">\n</head>\n<body style=\"font-family: sans-serif;\">\n{html}\n</body>\n</html>"
        );
    }

    if html.contains(r#"<meta charset="UTF-8">"#) || html.contains("<meta charset='UTF-8'>") {
        return html.trim().to_string();
    }

    let document = if html.contains("<head>") {
        html.replacen("<head>", "<head>\n<meta charset=\"UTF-8\">", 1)
    } else {
        html.replacen("<html>", "<html><head><meta charset=\"UTF-8\"></head>", 1)
    };
    document.trim().to_string()
}

/// Text alternative derived from the HTML body
pub fn plain_text(html: &str) -> String {
    let text = STYLE_BLOCK.replace_all(html, "");
    let text = SCRIPT_BLOCK.replace_all(&text, "");
    let text = LINE_BREAK.replace_all(&text, "\n");
    let text = PARAGRAPH_END.replace_all(&text, "\n\n");
    let text = ANY_TAG.replace_all(&text, "");
    let text = text.replace("&nbsp;", " ");
    let text = BLANK_RUN.replace_all(&text, "\n\n");
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::provider::SmtpSettings;

    fn builder() -> EnvelopeBuilder {
        EnvelopeBuilder::new(EnvelopeConfig {
            frontend_url: "http://localhost:3000".into(),
            default_from: "noreply@toolmail.com".into(),
        })
    }

    fn smtp() -> ProviderConfig {
        ProviderConfig::smtp(SmtpSettings {
            host: "smtp.example.com".into(),
            port: 587,
            username: String::new(),
            password: String::new(),
        })
    }

    #[test]
    fn test_shared_ses_forces_reply_to_sender() {
        let provider = ProviderConfig::shared_ses().with_reply_to("owner@gmail.com");
        assert_eq!(
            resolve_reply_to(&provider, "alias@toolmail.com").as_deref(),
            Some("alias@toolmail.com")
        );
    }

    #[test]
    fn test_freemail_reply_to_dropped_for_custom_domain() {
        let provider = smtp().with_reply_to("owner@gmail.com");
        assert_eq!(resolve_reply_to(&provider, "news@shop.example"), None);
        assert_eq!(
            resolve_reply_to(&provider, "me@yahoo.com").as_deref(),
            Some("owner@gmail.com")
        );

        let provider = smtp().with_reply_to("help@shop.example");
        assert_eq!(
            resolve_reply_to(&provider, "news@shop.example").as_deref(),
            Some("help@shop.example")
        );
    }

    #[test]
    fn test_footer_only_with_tracking_and_not_smtp() {
        let tracking_id = Uuid::new_v4();
        let recipient = Recipient::new("a@x.com").with_tracking_id(tracking_id);

        let email = builder().build(
            &recipient,
            "Hi".into(),
            "<html><body><p>Hello</p></body></html>".into(),
            &ProviderConfig::shared_ses().with_language("en"),
        );
        let link = format!("http://localhost:3000/unsubscribe?id={tracking_id}");
        assert!(email.html.contains(&link));
        assert!(email.html.contains("Unsubscribe"));
        assert!(email.html.find(&link).unwrap() < email.html.find("</body>").unwrap());

        let email = builder().build(
            &recipient,
            "Hi".into(),
            "<p>Hello</p>".into(),
            &smtp(),
        );
        assert!(!email.html.contains("unsubscribe?id="));

        let email = builder().build(
            &Recipient::new("a@x.com"),
            "Hi".into(),
            "<p>Hello</p>".into(),
            &ProviderConfig::shared_ses(),
        );
        assert!(!email.html.contains("unsubscribe?id="));
        assert!(email.list_unsubscribe.is_none());
    }

    #[test]
    fn test_footer_defaults_to_romanian() {
        let recipient = Recipient::new("a@x.com").with_tracking_id(Uuid::new_v4());
        let email = builder().build(
            &recipient,
            "Hi".into(),
            "<p>Salut</p>".into(),
            &ProviderConfig::shared_ses().with_language("xx"),
        );
        assert!(email.html.contains("Dezabonare"));
    }

    #[test]
    fn test_list_unsubscribe_never_points_at_localhost() {
        let tracking_id = Uuid::new_v4();
        let recipient = Recipient::new("a@x.com").with_tracking_id(tracking_id);
        let email = builder().build(&recipient, "Hi".into(), "<p>x</p>".into(), &smtp());
        assert_eq!(
            email.list_unsubscribe,
            Some(format!("<https://app.toolmail.com/unsubscribe?id={tracking_id}>"))
        );
    }

    #[test]
    fn test_from_falls_back_to_default() {
        let email = builder().build(
            &Recipient::new(" a@x.com "),
            "Hi".into(),
            "<p>x</p>".into(),
            &smtp(),
        );
        assert_eq!(email.from, "noreply@toolmail.com");
        assert_eq!(email.to, "a@x.com");
    }

    #[test]
    fn test_sender_name_extraction() {
        assert_eq!(sender_name("\"Shop Team\" <news@shop.example>"), "Shop Team");
        assert_eq!(sender_name("news@shop.example"), "news@shop.example");
    }

    #[test]
    fn test_normalize_wraps_fragments() {
        let html = normalize_document("<p>Hi</p>");
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains(r#"<meta charset="UTF-8">"#));
        assert!(html.contains("<p>Hi</p>"));
    }

    #[test]
    fn test_normalize_injects_charset() {
        let html = normalize_document("  <html><head><title>t</title></head><body>x</body></html>\n");
        assert!(html.starts_with("<html><head>\n<meta charset=\"UTF-8\"><title>"));
        assert!(html.ends_with("</html>"));

        let html = normalize_document("<html><body>x</body></html>");
        assert!(html.starts_with(r#"<html><head><meta charset="UTF-8"></head><body>"#));
    }

    #[test]
    fn test_plain_text() {
        let html = "<style>p{color:red}</style><p>Hello&nbsp;there</p><p>Line<br/>two</p><script>x()</script>";
        assert_eq!(plain_text(html), "Hello there\n\nLine\ntwo");
    }
}
