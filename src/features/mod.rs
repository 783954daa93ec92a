pub mod consistency;
pub mod metadata;

/// Keywords flagged in subjects and bodies.
pub const SUSPICIOUS_KEYWORDS: [&str; 9] = [
    "account", "verify", "password", "login", "bank", "click", "urgent", "invoice", "refund",
];

/// Keywords flagged in URL hosts.
pub const SUSPICIOUS_URL_KEYWORDS: [&str; 6] =
    ["login", "verify", "update", "secure", "account", "bank"];

/// Extract the domain of an address: the part after the `@`, but only when
/// the address contains exactly one `@`. Anything else yields an empty string.
pub fn domain_of(address: &str) -> String {
    let parts: Vec<&str> = address.split('@').collect();
    if parts.len() == 2 {
        parts[1].trim().to_string()
    } else {
        String::new()
    }
}

/// Case-insensitive substring match against the fixed keyword set.
pub fn contains_suspicious_keyword(text: &str) -> bool {
    let text_lower = text.to_lowercase();
    SUSPICIOUS_KEYWORDS
        .iter()
        .any(|keyword| text_lower.contains(keyword))
}
