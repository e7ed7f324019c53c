/// Salutation used when no personal name can be derived.
pub const FALLBACK_GREETING: &str = "there";

/// Pull a first name out of a possessive business name.
///
/// "John's Plumbing" → "John". Anything without a possessive leading word
/// ("ABC Company", "Sunrise Bakery", "") yields [`FALLBACK_GREETING`], since a
/// business name alone doesn't say who reads the inbox.
pub fn extract_first_name(business_name: &str) -> String {
    let Some(first) = business_name.split_whitespace().next() else {
        return FALLBACK_GREETING.to_string();
    };

    let stem = first
        .strip_suffix("'s")
        .or_else(|| first.strip_suffix("\u{2019}s"))
        .or_else(|| first.strip_suffix("'S"));

    match stem {
        Some(stem) if looks_like_name(stem) => capitalize(stem),
        _ => FALLBACK_GREETING.to_string(),
    }
}

/// First name for an outreach greeting: the contact's first name when we
/// have one, otherwise whatever the business name gives us.
pub fn greeting_name(contact_name: Option<&str>, business_name: Option<&str>) -> String {
    if let Some(first) = contact_name
        .and_then(|n| n.split_whitespace().next())
        .filter(|n| looks_like_name(n))
    {
        return capitalize(first);
    }

    extract_first_name(business_name.unwrap_or_default())
}

fn looks_like_name(word: &str) -> bool {
    let letters = word.chars().filter(|c| c.is_alphabetic()).count();
    letters >= 2
        && word
            .chars()
            .all(|c| c.is_alphabetic() || c == '-' || c == '\'')
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(|c| c.to_lowercase()))
            .collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn possessive_business_name_yields_owner() {
        assert_eq!(extract_first_name("John's Plumbing"), "John");
        assert_eq!(extract_first_name("MARIA\u{2019}s Tacos"), "Maria");
        assert_eq!(extract_first_name("O'Brien's Pub"), "O'brien");
    }

    #[test]
    fn non_possessive_falls_back() {
        assert_eq!(extract_first_name("ABC Company"), "there");
        assert_eq!(extract_first_name("Sunrise Bakery"), "there");
        assert_eq!(extract_first_name("   "), "there");
        assert_eq!(extract_first_name("7's Diner"), "there");
    }

    #[test]
    fn greeting_prefers_contact_name() {
        assert_eq!(
            greeting_name(Some("jane doe"), Some("John's Plumbing")),
            "Jane"
        );
        assert_eq!(greeting_name(None, Some("John's Plumbing")), "John");
        assert_eq!(greeting_name(Some("  "), Some("ABC Company")), "there");
        assert_eq!(greeting_name(None, None), "there");
    }
}
