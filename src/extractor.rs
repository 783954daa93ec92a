use mail_parser::{MessageParser, MimeHeaders, PartType};
use serde::{Deserialize, Serialize};

/// Structured record produced by the MIME-aware extraction strategy.
///
/// Every field defaults to an empty string, never an absent marker, so the
/// feature functions downstream have no missing-value branch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailRecord {
    pub sender: String,
    pub receiver: String,
    pub subject: String,
    pub date: String,
    pub body: String,
}

/// The nine headers tracked by the line-scanning strategy.
pub const TRACKED_HEADERS: [&str; 9] = [
    "Message-ID",
    "From",
    "To",
    "Subject",
    "X-From",
    "X-To",
    "X-cc",
    "X-bcc",
    "X-Origin",
];

/// Raw header bag produced by the line-scanning extraction strategy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeaderBag {
    pub message_id: String,
    pub from: String,
    pub to: String,
    pub subject: String,
    pub x_from: String,
    pub x_to: String,
    pub x_cc: String,
    pub x_bcc: String,
    pub x_origin: String,
}

/// MIME-aware extraction for the supervised pipeline.
///
/// Multipart messages contribute the body of the first text/plain part in
/// document order; HTML parts and attachments are ignored. Non-multipart
/// messages decode their single payload. Decode and parse failures degrade to
/// empty strings, never errors.
pub fn extract_message(raw: &[u8]) -> EmailRecord {
    let message = match MessageParser::new().parse(raw) {
        Some(message) => message,
        None => {
            log::debug!("message did not parse, returning empty record");
            return EmailRecord::default();
        }
    };

    let subject = message.subject().unwrap_or_default().to_string();

    EmailRecord {
        sender: raw_header(&message, "From"),
        receiver: raw_header(&message, "To"),
        subject,
        date: raw_header(&message, "Date"),
        body: first_plain_text_body(&message),
    }
}

fn raw_header(message: &mail_parser::Message, name: &str) -> String {
    message
        .headers_raw()
        .find(|(header_name, _)| header_name.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.trim().to_string())
        .unwrap_or_default()
}

fn first_plain_text_body(message: &mail_parser::Message) -> String {
    for part in message.text_bodies() {
        // A missing Content-Type defaults to text/plain; HTML alternatives
        // surfaced as text bodies are skipped.
        let is_plain = part.content_type().map_or(true, |ct| {
            ct.ctype().eq_ignore_ascii_case("text")
                && ct
                    .subtype()
                    .map_or(true, |sub| sub.eq_ignore_ascii_case("plain"))
        });
        if !is_plain {
            continue;
        }
        if let PartType::Text(text) = &part.body {
            return text.to_string();
        }
    }
    String::new()
}

/// Line-scanning extraction for the unsupervised pipeline.
///
/// For each tracked header, the first line whose lowercased form starts with
/// `"<name>:"` supplies the value (everything after the first colon, trimmed).
/// No folding or continuation-line support: the trained anomaly detectors
/// encode this scanner's behavior, so it must stay primitive.
pub fn scan_headers(raw: &str) -> HeaderBag {
    let mut values: [Option<String>; 9] = Default::default();
    let prefixes: Vec<String> = TRACKED_HEADERS
        .iter()
        .map(|name| format!("{}:", name.to_lowercase()))
        .collect();

    for line in raw.split('\n') {
        let line_lower = line.to_lowercase();
        for (idx, prefix) in prefixes.iter().enumerate() {
            if values[idx].is_some() {
                continue;
            }
            if line_lower.starts_with(prefix.as_str()) {
                let value = line
                    .splitn(2, ':')
                    .nth(1)
                    .unwrap_or_default()
                    .trim()
                    .to_string();
                values[idx] = Some(value);
            }
        }
    }

    let mut take = |idx: usize| values[idx].take().unwrap_or_default();
    HeaderBag {
        message_id: take(0),
        from: take(1),
        to: take(2),
        subject: take(3),
        x_from: take(4),
        x_to: take(5),
        x_cc: take(6),
        x_bcc: take(7),
        x_origin: take(8),
    }
}
