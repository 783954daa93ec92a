use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::extractor::HeaderBag;

lazy_static! {
    static ref MESSAGE_ID_RE: Regex = Regex::new(r"^<.*@.*>$").unwrap();
    static ref FROM_DOMAIN_RE: Regex = Regex::new(r"@([\w.\-]+)").unwrap();
}

/// Header-consistency feature vector consumed by the anomaly detectors.
/// All fields are 0/1; the field order is a fixed contract with the trained
/// models, see [`ConsistencyFeatures::FIELD_NAMES`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyFeatures {
    pub subject_empty: u8,
    pub message_id_valid: u8,
    pub from_xfrom_mismatch: u8,
    pub to_xto_mismatch: u8,
    pub x_cc_or_bcc_used: u8,
    pub x_origin_inconsistent: u8,
}

impl ConsistencyFeatures {
    pub const FIELD_NAMES: [&'static str; 6] = [
        "subject_empty",
        "message_id_valid",
        "from_xfrom_mismatch",
        "to_xto_mismatch",
        "x_cc_or_bcc_used",
        "x_origin_inconsistent",
    ];

    pub fn schema_fields() -> Vec<String> {
        Self::FIELD_NAMES.iter().map(|f| f.to_string()).collect()
    }

    pub fn from_headers(bag: &HeaderBag) -> Self {
        ConsistencyFeatures {
            subject_empty: bag.subject.trim().is_empty() as u8,
            // Defaults to valid; only a Message-ID that fails the
            // <anything@anything> pattern flips it. An absent Message-ID is
            // an empty string, which fails the pattern.
            message_id_valid: MESSAGE_ID_RE.is_match(&bag.message_id) as u8,
            from_xfrom_mismatch: header_pair_mismatch(&bag.x_from, &bag.from) as u8,
            to_xto_mismatch: header_pair_mismatch(&bag.x_to, &bag.to) as u8,
            x_cc_or_bcc_used: (!bag.x_cc.is_empty() || !bag.x_bcc.is_empty()) as u8,
            x_origin_inconsistent: x_origin_inconsistent(&bag.from, &bag.x_origin) as u8,
        }
    }

    /// Dense 0/1 vector in [`Self::FIELD_NAMES`] order. The detectors were
    /// trained on these raw values directly, with no scaling transform.
    pub fn dense_vector(&self) -> Vec<f64> {
        vec![
            self.subject_empty as f64,
            self.message_id_valid as f64,
            self.from_xfrom_mismatch as f64,
            self.to_xto_mismatch as f64,
            self.x_cc_or_bcc_used as f64,
            self.x_origin_inconsistent as f64,
        ]
    }
}

/// Mismatch requires both sides present: the lowercased auxiliary header must
/// appear as a substring of the lowercased primary header.
fn header_pair_mismatch(auxiliary: &str, primary: &str) -> bool {
    !auxiliary.is_empty()
        && !primary.is_empty()
        && !primary.to_lowercase().contains(&auxiliary.to_lowercase())
}

fn x_origin_inconsistent(from: &str, x_origin: &str) -> bool {
    let domain = match FROM_DOMAIN_RE.captures(from) {
        Some(caps) => caps[1].to_lowercase(),
        None => return false,
    };
    !x_origin.is_empty() && !x_origin.to_lowercase().contains(&domain)
}
