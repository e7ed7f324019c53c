//! Duplicate lead detection.
//!
//! Match keys are checked strongest first across all candidates: email,
//! then phone, then website domain, then a fuzzy business-name match within
//! the same city. The first key that matches wins.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::common::utils::{normalize_business_name, similarity};
use crate::common::LeadId;
use crate::domains::leads::models::Lead;

/// Minimum normalized-name similarity for a name match.
pub const NAME_SIMILARITY_THRESHOLD: f64 = 0.9;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchField {
    Email,
    Phone,
    Website,
    Name,
}

impl MatchField {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchField::Email => "email",
            MatchField::Phone => "phone",
            MatchField::Website => "website",
            MatchField::Name => "name",
        }
    }
}

impl std::fmt::Display for MatchField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DuplicateCheck {
    pub is_duplicate: bool,
    pub matched_on: Option<MatchField>,
    pub duplicate_of: Option<LeadId>,
}

impl DuplicateCheck {
    pub fn unique() -> Self {
        Self {
            is_duplicate: false,
            matched_on: None,
            duplicate_of: None,
        }
    }

    fn matched(lead: &Lead, field: MatchField) -> Self {
        Self {
            is_duplicate: true,
            matched_on: Some(field),
            duplicate_of: Some(lead.id),
        }
    }
}

fn same_key(a: &Option<String>, b: &Option<String>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if !a.is_empty() && a == b)
}

fn same_city(a: &Lead, b: &Lead) -> bool {
    match (a.city.as_deref(), b.city.as_deref()) {
        (Some(a), Some(b)) => {
            let (a, b) = (a.trim(), b.trim());
            !a.is_empty() && a.to_lowercase() == b.to_lowercase()
        }
        _ => false,
    }
}

fn similar_name(a: &Lead, b: &Lead) -> bool {
    let (Some(a_name), Some(b_name)) = (a.business_name.as_deref(), b.business_name.as_deref())
    else {
        return false;
    };
    let (a_name, b_name) = (
        normalize_business_name(a_name),
        normalize_business_name(b_name),
    );
    if a_name.is_empty() || b_name.is_empty() {
        return false;
    }
    similarity(&a_name, &b_name) >= NAME_SIMILARITY_THRESHOLD
}

/// Check `lead` against earlier leads.
pub fn find_duplicate(lead: &Lead, candidates: &[Lead]) -> DuplicateCheck {
    let others = || candidates.iter().filter(|c| c.id != lead.id);

    if let Some(c) = others().find(|c| same_key(&c.normalized_email, &lead.normalized_email)) {
        return DuplicateCheck::matched(c, MatchField::Email);
    }
    if let Some(c) = others().find(|c| same_key(&c.normalized_phone, &lead.normalized_phone)) {
        return DuplicateCheck::matched(c, MatchField::Phone);
    }
    if let Some(c) = others().find(|c| same_key(&c.normalized_domain, &lead.normalized_domain)) {
        return DuplicateCheck::matched(c, MatchField::Website);
    }
    if let Some(c) = others().find(|c| same_city(c, lead) && similar_name(c, lead)) {
        return DuplicateCheck::matched(c, MatchField::Name);
    }

    DuplicateCheck::unique()
}

/// Load candidates for `lead` and run [`find_duplicate`].
pub async fn detect_duplicate(lead: &Lead, pool: &PgPool) -> Result<DuplicateCheck> {
    let candidates = lead.find_match_candidates(pool).await?;
    Ok(find_duplicate(lead, &candidates))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::leads::scoring::tests::lead;

    fn with_keys(email: Option<&str>, phone: Option<&str>, domain: Option<&str>) -> Lead {
        let mut l = lead();
        l.normalized_email = email.map(String::from);
        l.normalized_phone = phone.map(String::from);
        l.normalized_domain = domain.map(String::from);
        l
    }

    #[test]
    fn same_email_is_duplicate() {
        let first = with_keys(Some("owner@bakery.test"), None, None);
        let second = with_keys(Some("owner@bakery.test"), None, None);

        let check = find_duplicate(&second, &[first.clone()]);
        assert!(check.is_duplicate);
        assert_eq!(check.matched_on, Some(MatchField::Email));
        assert_eq!(check.duplicate_of, Some(first.id));
    }

    #[test]
    fn email_outranks_phone_across_candidates() {
        let phone_match = with_keys(Some("a@x.test"), Some("6125550142"), None);
        let email_match = with_keys(Some("owner@bakery.test"), None, None);
        let lead = with_keys(Some("owner@bakery.test"), Some("6125550142"), None);

        let check = find_duplicate(&lead, &[phone_match, email_match.clone()]);
        assert_eq!(check.matched_on, Some(MatchField::Email));
        assert_eq!(check.duplicate_of, Some(email_match.id));
    }

    #[test]
    fn phone_then_website() {
        let by_phone = with_keys(Some("a@x.test"), Some("6125550142"), None);
        let lead = with_keys(Some("b@x.test"), Some("6125550142"), Some("bakery.test"));
        assert_eq!(
            find_duplicate(&lead, &[by_phone]).matched_on,
            Some(MatchField::Phone)
        );

        let by_domain = with_keys(Some("a@x.test"), None, Some("bakery.test"));
        assert_eq!(
            find_duplicate(&lead, &[by_domain]).matched_on,
            Some(MatchField::Website)
        );
    }

    #[test]
    fn missing_keys_never_match() {
        let a = with_keys(None, None, None);
        let b = with_keys(None, None, None);
        assert!(!find_duplicate(&b, &[a]).is_duplicate);
    }

    #[test]
    fn similar_name_needs_same_city() {
        let mut first = with_keys(Some("a@x.test"), None, None);
        first.business_name = Some("Sunrise Bakery LLC".to_string());
        first.city = Some("Minneapolis".to_string());

        let mut second = with_keys(Some("b@x.test"), None, None);
        second.business_name = Some("The Sunrise Bakery".to_string());
        second.city = Some("minneapolis ".to_string());

        assert_eq!(
            find_duplicate(&second, &[first.clone()]).matched_on,
            Some(MatchField::Name)
        );

        second.city = Some("St. Paul".to_string());
        assert!(!find_duplicate(&second, &[first]).is_duplicate);
    }

    #[test]
    fn dissimilar_names_are_unique() {
        let mut first = with_keys(Some("a@x.test"), None, None);
        first.business_name = Some("Sunrise Bakery".to_string());
        first.city = Some("Duluth".to_string());

        let mut second = with_keys(Some("b@x.test"), None, None);
        second.business_name = Some("Sunset Tacos".to_string());
        second.city = Some("Duluth".to_string());

        assert_eq!(find_duplicate(&second, &[first]), DuplicateCheck::unique());
    }

    #[test]
    fn lead_never_matches_itself() {
        let l = with_keys(Some("owner@bakery.test"), None, None);
        assert!(!find_duplicate(&l, &[l.clone()]).is_duplicate);
    }
}
