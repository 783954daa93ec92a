use chrono::{DateTime, Timelike};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use url::Url;

use super::{contains_suspicious_keyword, domain_of, SUSPICIOUS_URL_KEYWORDS};
use crate::extractor::EmailRecord;

lazy_static! {
    static ref DISPLAY_NAME_RE: Regex = Regex::new(r"^(.*?)<(.+?)>").unwrap();
    static ref URL_RE: Regex = Regex::new(r"https?://\S+").unwrap();
}

/// Hour assumed when the Date header does not parse. Unparseable dates are
/// treated as sent at a normal hour, never flagged.
const FALLBACK_HOUR: u32 = 12;

/// Feature vector consumed by the supervised classifiers.
///
/// The field set and order are a fixed contract with the trained models;
/// see [`MetadataFeatures::NUMERIC_FIELDS`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataFeatures {
    pub combined_text: String,
    pub url_suspicious_count: u32,
    pub domain_mismatch: bool,
    pub subject_keywords: bool,
    pub body_keywords: bool,
    pub display_name_mismatch: bool,
    pub subject_length: u32,
    pub body_length: u32,
    pub sent_at_odd_hour: bool,
    pub unique_char_ratio: f64,
}

impl MetadataFeatures {
    /// Text field vectorized by the fitted term-frequency encoder.
    pub const TEXT_FIELD: &'static str = "combined_text";

    /// Numeric fields in the order the fitted scaler expects them.
    pub const NUMERIC_FIELDS: [&'static str; 9] = [
        "url_suspicious_count",
        "domain_mismatch",
        "subject_keywords",
        "body_keywords",
        "display_name_mismatch",
        "subject_length",
        "body_length",
        "sent_at_odd_hour",
        "unique_char_ratio",
    ];

    /// Full schema field list: text field first, then the numeric fields.
    pub fn schema_fields() -> Vec<String> {
        let mut fields = vec![Self::TEXT_FIELD.to_string()];
        fields.extend(Self::NUMERIC_FIELDS.iter().map(|f| f.to_string()));
        fields
    }

    pub fn from_record(record: &EmailRecord) -> Self {
        MetadataFeatures {
            combined_text: format!("{} {} {}", record.sender, record.receiver, record.subject),
            url_suspicious_count: suspicious_url_count(&record.body),
            domain_mismatch: domain_of(&record.sender) != domain_of(&record.receiver),
            subject_keywords: contains_suspicious_keyword(&record.subject),
            body_keywords: contains_suspicious_keyword(&record.body),
            display_name_mismatch: display_name_mismatch(&record.sender),
            subject_length: record.subject.chars().count() as u32,
            body_length: record.body.chars().count() as u32,
            sent_at_odd_hour: sent_at_odd_hour(&record.date),
            unique_char_ratio: unique_char_ratio(&record.body),
        }
    }

    /// Numeric portion as a dense vector, in [`Self::NUMERIC_FIELDS`] order.
    pub fn numeric_vector(&self) -> Vec<f64> {
        vec![
            self.url_suspicious_count as f64,
            self.domain_mismatch as u8 as f64,
            self.subject_keywords as u8 as f64,
            self.body_keywords as u8 as f64,
            self.display_name_mismatch as u8 as f64,
            self.subject_length as f64,
            self.body_length as f64,
            self.sent_at_odd_hour as u8 as f64,
            self.unique_char_ratio,
        ]
    }
}

/// True when the sender carries a display name that is not a substring of the
/// bracketed address (both lowercased, name trimmed of whitespace and
/// quoting). Senders without angle brackets never mismatch.
pub fn display_name_mismatch(sender: &str) -> bool {
    if let Some(caps) = DISPLAY_NAME_RE.captures(sender) {
        let name = caps[1].trim().trim_matches('"').trim().to_lowercase();
        let address = caps[2].to_lowercase();
        !address.contains(&name)
    } else {
        false
    }
}

/// Ratio of distinct characters to total characters; 0 for empty text.
pub fn unique_char_ratio(text: &str) -> f64 {
    let total = text.chars().count();
    if total == 0 {
        return 0.0;
    }
    let distinct: HashSet<char> = text.chars().collect();
    distinct.len() as f64 / total as f64
}

/// Count URLs whose host contains a suspicious keyword. Tokens that do not
/// parse as URLs are skipped, never errors.
pub fn suspicious_url_count(body: &str) -> u32 {
    let mut count = 0;
    for token in URL_RE.find_iter(body) {
        let url = match Url::parse(token.as_str()) {
            Ok(url) => url,
            Err(e) => {
                log::debug!("skipping malformed URL {:?}: {}", token.as_str(), e);
                continue;
            }
        };
        let host = url.host_str().unwrap_or_default();
        if SUSPICIOUS_URL_KEYWORDS
            .iter()
            .any(|keyword| host.contains(keyword))
        {
            count += 1;
        }
    }
    count
}

/// True when the Date header parses to an hour before 06:00 or after 22:00,
/// in whatever offset the header carries. Unparseable dates fall back to
/// [`FALLBACK_HOUR`] and are not flagged.
pub fn sent_at_odd_hour(date: &str) -> bool {
    let hour = parse_hour(date).unwrap_or(FALLBACK_HOUR);
    hour < 6 || hour > 22
}

fn parse_hour(date: &str) -> Option<u32> {
    let date = date.trim();
    if date.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc2822(date)
        .or_else(|_| DateTime::parse_from_rfc3339(date))
        .map(|parsed| parsed.hour())
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_mismatch() {
        assert!(display_name_mismatch("\"PayPal\" <phisher@evil.com>"));
        assert!(!display_name_mismatch("\"Alice\" <alice@example.com>"));
        assert!(!display_name_mismatch("no-angle-brackets@x.com"));
        // Empty display name is a substring of anything.
        assert!(!display_name_mismatch("<someone@example.com>"));
    }

    #[test]
    fn test_display_name_mismatch_ignores_quoting() {
        assert!(display_name_mismatch("Security Team <helpdesk@example.com>"));
        assert!(!display_name_mismatch("alice <alice@example.com>"));
        assert!(!display_name_mismatch("\"Alice\" <alice@example.com>"));
    }

    #[test]
    fn test_unique_char_ratio() {
        assert_eq!(unique_char_ratio(""), 0.0);
        assert_eq!(unique_char_ratio("abc"), 1.0);
        assert_eq!(unique_char_ratio("aabb"), 0.5);
        let ratio = unique_char_ratio("hello world");
        assert!(ratio > 0.0 && ratio <= 1.0);
    }

    #[test]
    fn test_suspicious_url_count() {
        assert_eq!(
            suspicious_url_count("visit http://secure-login.fake.com now"),
            1
        );
        assert_eq!(suspicious_url_count("no urls here"), 0);
        assert_eq!(
            suspicious_url_count("https://example.com and http://bank.evil.net"),
            1
        );
        // Malformed URL token: skipped, not an error.
        assert_eq!(suspicious_url_count("click http://[not-a-host"), 0);
    }

    #[test]
    fn test_sent_at_odd_hour() {
        assert!(sent_at_odd_hour("Tue, 1 Jul 2025 03:00:00 +0000"));
        assert!(sent_at_odd_hour("Tue, 1 Jul 2025 23:30:00 +0000"));
        assert!(!sent_at_odd_hour("Tue, 1 Jul 2025 22:00:00 +0000"));
        assert!(!sent_at_odd_hour("Tue, 1 Jul 2025 12:00:00 +0000"));
        // Hour is taken in the offset the header carries, not normalized.
        assert!(sent_at_odd_hour("Tue, 1 Jul 2025 03:00:00 +0900"));
        // Unparseable dates fall back to a normal hour.
        assert!(!sent_at_odd_hour("not a date"));
        assert!(!sent_at_odd_hour(""));
    }

    #[test]
    fn test_from_record_is_deterministic() {
        let record = EmailRecord {
            sender: "PayPal Security <security@paypal-verify.net>".to_string(),
            receiver: "user@example.com".to_string(),
            subject: String::new(),
            date: "Tue, 1 Jul 2025 03:00:00 +0000".to_string(),
            body: "reset at http://login-secure.paypal-verify.net/reset".to_string(),
        };
        let first = MetadataFeatures::from_record(&record);
        let second = MetadataFeatures::from_record(&record);
        assert_eq!(first, second);
    }

    #[test]
    fn test_phishing_scenario_features() {
        let record = EmailRecord {
            sender: "PayPal Security <security@paypal-verify.net>".to_string(),
            receiver: "user@example.com".to_string(),
            subject: String::new(),
            date: "Tue, 1 Jul 2025 03:00:00 +0000".to_string(),
            body: "reset at http://login-secure.paypal-verify.net/reset".to_string(),
        };
        let features = MetadataFeatures::from_record(&record);
        assert!(features.domain_mismatch);
        assert!(features.display_name_mismatch);
        assert!(features.url_suspicious_count >= 1);
        assert!(features.sent_at_odd_hour);
        assert_eq!(features.subject_length, 0);
    }

    #[test]
    fn test_empty_record_defaults() {
        let features = MetadataFeatures::from_record(&EmailRecord::default());
        assert_eq!(features.combined_text, "  ");
        assert_eq!(features.url_suspicious_count, 0);
        assert!(!features.domain_mismatch);
        assert_eq!(features.unique_char_ratio, 0.0);
        assert!(!features.sent_at_odd_hour);
    }

    #[test]
    fn test_numeric_vector_order_matches_schema() {
        let record = EmailRecord {
            subject: "hi".to_string(),
            body: "abc".to_string(),
            ..Default::default()
        };
        let features = MetadataFeatures::from_record(&record);
        let vector = features.numeric_vector();
        assert_eq!(vector.len(), MetadataFeatures::NUMERIC_FIELDS.len());
        assert_eq!(vector[5], 2.0); // subject_length
        assert_eq!(vector[6], 3.0); // body_length
        assert_eq!(vector[8], 1.0); // unique_char_ratio of "abc"
    }
}
