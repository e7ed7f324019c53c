//! Lead quality score (0-100).
//!
//! A lead without a business name or an email can't be contacted about a
//! site, so it scores exactly 0. Otherwise each known field adds points.

use crate::domains::leads::models::Lead;
use crate::kernel::ScrapedPage;

pub const BUSINESS_NAME_POINTS: i32 = 20;
pub const EMAIL_POINTS: i32 = 20;
pub const PHONE_POINTS: i32 = 20;
pub const WEBSITE_POINTS: i32 = 15;
pub const INDUSTRY_POINTS: i32 = 10;
pub const LOCATION_POINTS: i32 = 10;
pub const SCRAPED_CONTENT_POINTS: i32 = 5;

pub const MAX_SCORE: i32 = 100;

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

pub fn quality_score(lead: &Lead, scraped: Option<&ScrapedPage>) -> i32 {
    if !present(&lead.business_name) || !present(&lead.email) {
        return 0;
    }

    let mut score = BUSINESS_NAME_POINTS + EMAIL_POINTS;

    if present(&lead.phone) {
        score += PHONE_POINTS;
    }
    if present(&lead.website) {
        score += WEBSITE_POINTS;
    }
    if present(&lead.industry) {
        score += INDUSTRY_POINTS;
    }
    if present(&lead.city) || present(&lead.state) {
        score += LOCATION_POINTS;
    }
    if scraped.is_some_and(|page| page.has_content()) {
        score += SCRAPED_CONTENT_POINTS;
    }

    score.min(MAX_SCORE)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::common::LeadId;
    use chrono::Utc;

    pub(crate) fn lead() -> Lead {
        Lead {
            id: LeadId::new(),
            business_name: Some("John's Plumbing".to_string()),
            contact_name: None,
            email: Some("john@plumbing.test".to_string()),
            phone: None,
            website: None,
            industry: None,
            city: None,
            state: None,
            normalized_email: Some("john@plumbing.test".to_string()),
            normalized_phone: None,
            normalized_domain: None,
            status: "pending".to_string(),
            quality_score: 0,
            duplicate_of: None,
            scraped_data: None,
            contacted_at: None,
            opened_at: None,
            clicked_at: None,
            subscribed_at: None,
            delivered_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn page(text: &str) -> ScrapedPage {
        ScrapedPage {
            url: "https://plumbing.test".to_string(),
            text: text.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn missing_name_or_email_scores_zero() {
        let mut no_email = lead();
        no_email.email = None;
        no_email.phone = Some("612-555-0142".to_string());
        assert_eq!(quality_score(&no_email, None), 0);

        let mut blank_name = lead();
        blank_name.business_name = Some("   ".to_string());
        assert_eq!(quality_score(&blank_name, Some(&page("content"))), 0);
    }

    #[test]
    fn phone_adds_exactly_twenty() {
        let without = lead();
        let mut with = lead();
        with.phone = Some("612-555-0142".to_string());

        assert_eq!(
            quality_score(&with, None) - quality_score(&without, None),
            PHONE_POINTS
        );
    }

    #[test]
    fn complete_lead_scores_one_hundred() {
        let mut full = lead();
        full.phone = Some("612-555-0142".to_string());
        full.website = Some("plumbing.test".to_string());
        full.industry = Some("plumbing".to_string());
        full.city = Some("Minneapolis".to_string());
        full.state = Some("MN".to_string());

        assert_eq!(quality_score(&full, Some(&page("We fix leaks"))), 100);
        assert_eq!(quality_score(&full, Some(&page("  "))), 95);
    }

    #[test]
    fn state_alone_counts_as_location() {
        let mut l = lead();
        l.state = Some("MN".to_string());
        assert_eq!(quality_score(&l, None), 50);
    }
}
