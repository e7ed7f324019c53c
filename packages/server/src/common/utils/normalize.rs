//! Match keys used for duplicate detection.
//!
//! Every function returns `None` when the input can't produce a usable key,
//! so callers never match two leads on an empty string.

use lazy_static::lazy_static;
use regex::Regex;
use url::Url;

lazy_static! {
    static ref NON_DIGIT: Regex = Regex::new(r"[^0-9]").unwrap();
    static ref BUSINESS_SUFFIX: Regex =
        Regex::new(r"\b(inc|llc|ltd|co|corp|company|corporation|the)\b").unwrap();
}

/// Lowercased, trimmed address with any `+tag` removed from the local part.
pub fn normalize_email(email: &str) -> Option<String> {
    let email = email.trim().to_lowercase();
    let (local, domain) = email.split_once('@')?;
    let local = local.split('+').next().unwrap_or(local);

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return None;
    }

    Some(format!("{}@{}", local, domain))
}

/// Last ten digits of a phone number (drops country codes and formatting).
///
/// Only ASCII digits count, so the result is always ASCII.
pub fn normalize_phone(phone: &str) -> Option<String> {
    let digits = NON_DIGIT.replace_all(phone, "");
    if digits.len() < 7 {
        return None;
    }

    let start = digits.len().saturating_sub(10);
    Some(digits[start..].to_string())
}

/// Host of a website without scheme, port, path or `www.`.
pub fn normalize_domain(website: &str) -> Option<String> {
    let website = website.trim();
    if website.is_empty() {
        return None;
    }

    let with_scheme = if website.contains("://") {
        website.to_string()
    } else {
        format!("https://{}", website)
    };

    let url = Url::parse(&with_scheme).ok()?;
    let host = url.host_str()?.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();

    if host.contains('.') {
        Some(host)
    } else {
        None
    }
}

/// Business name reduced to lowercase words, without legal suffixes.
pub fn normalize_business_name(name: &str) -> String {
    let cleaned: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect();

    BUSINESS_SUFFIX
        .replace_all(&cleaned, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_normalization() {
        assert_eq!(
            normalize_email("  Owner+Leads@Bakery.COM "),
            Some("owner@bakery.com".to_string())
        );
        assert_eq!(normalize_email("no-at-sign"), None);
        assert_eq!(normalize_email("@bakery.com"), None);
    }

    #[test]
    fn phone_ignores_non_ascii_digits() {
        assert_eq!(normalize_phone("१२३४"), None);
        assert_eq!(normalize_phone("१२३४५६७८९०"), None);
        assert_eq!(
            normalize_phone("٠١٢ 612-555-0142"),
            Some("6125550142".to_string())
        );
    }

    #[test]
    fn phone_normalization() {
        assert_eq!(
            normalize_phone("+1 (612) 555-0142"),
            Some("6125550142".to_string())
        );
        assert_eq!(normalize_phone("612.555.0142"), Some("6125550142".to_string()));
        assert_eq!(normalize_phone("555"), None);
        assert_eq!(normalize_phone("+91 98765 43210"), Some("9876543210".to_string()));
    }

    #[test]
    fn domain_normalization() {
        assert_eq!(
            normalize_domain("https://www.Bakery.com/about?x=1"),
            Some("bakery.com".to_string())
        );
        assert_eq!(normalize_domain("bakery.com"), Some("bakery.com".to_string()));
        assert_eq!(normalize_domain("localhost"), None);
        assert_eq!(normalize_domain(""), None);
    }

    #[test]
    fn business_name_normalization() {
        assert_eq!(
            normalize_business_name("The Sunrise Bakery, LLC"),
            "sunrise bakery"
        );
        assert_eq!(normalize_business_name("Joe's Pizza Co."), "joe s pizza");
    }
}
