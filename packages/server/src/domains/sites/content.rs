//! Website copy: what we ask the LLM for, how we read its answer, and the
//! per-industry copy used when it can't give us one.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::domains::leads::models::Lead;
use crate::kernel::extract_json_object;

pub const SYSTEM_PROMPT: &str = "You write concise, friendly marketing copy for small local \
businesses. Copy must be specific to the business, free of placeholders, and suitable for a \
one-page website.";

/// Copy for a one-page site, stored as `sites.content_data`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteContent {
    pub headline: String,
    pub tagline: String,
    pub about: String,
    pub services: Vec<String>,
    pub cta_text: String,
}

impl SiteContent {
    fn validate(self) -> Result<Self> {
        if self.headline.trim().is_empty() {
            bail!("headline is empty");
        }
        if self.about.trim().is_empty() {
            bail!("about section is empty");
        }
        if self.services.iter().all(|s| s.trim().is_empty()) {
            bail!("no services listed");
        }
        if self.cta_text.trim().is_empty() {
            bail!("call to action is empty");
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Industry {
    Trades,
    Food,
    Beauty,
    Professional,
    General,
}

impl Industry {
    fn classify(industry: Option<&str>) -> Self {
        let industry = industry.unwrap_or_default().to_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| industry.contains(w));

        if has(&["plumb", "electric", "hvac", "roof", "contract", "construct", "landscap", "clean"]) {
            Industry::Trades
        } else if has(&["restaurant", "food", "cafe", "bakery", "catering", "bar", "coffee"]) {
            Industry::Food
        } else if has(&["salon", "beauty", "spa", "barber", "nail", "fitness", "yoga"]) {
            Industry::Beauty
        } else if has(&["law", "legal", "account", "tax", "consult", "insurance", "real estate"]) {
            Industry::Professional
        } else {
            Industry::General
        }
    }

    fn template_id(&self) -> &'static str {
        match self {
            Industry::Trades => "trades",
            Industry::Food => "hospitality",
            Industry::Beauty => "wellness",
            Industry::Professional => "professional",
            Industry::General => "general",
        }
    }
}

/// Page template for a lead's industry.
pub fn template_for(industry: Option<&str>) -> &'static str {
    Industry::classify(industry).template_id()
}

pub fn build_prompt(lead: &Lead) -> String {
    let mut facts = vec![format!("Business name: {}", lead.display_name())];
    if let Some(industry) = lead.industry.as_deref() {
        facts.push(format!("Industry: {}", industry));
    }
    match (lead.city.as_deref(), lead.state.as_deref()) {
        (Some(city), Some(state)) => facts.push(format!("Location: {}, {}", city, state)),
        (Some(place), None) | (None, Some(place)) => facts.push(format!("Location: {}", place)),
        (None, None) => {}
    }
    if let Some(phone) = lead.phone.as_deref() {
        facts.push(format!("Phone: {}", phone));
    }
    if let Some(text) = lead
        .scraped_data
        .as_ref()
        .and_then(|data| data.get("text"))
        .and_then(|text| text.as_str())
    {
        let excerpt: String = text.chars().take(2_000).collect();
        facts.push(format!("Text from their current website:\n{}", excerpt));
    }

    format!(
        r#"Write website copy for this business.

{facts}

Return JSON with exactly these fields:
{{
  "headline": "short headline, under 10 words",
  "tagline": "one sentence",
  "about": "2-3 sentences about the business",
  "services": ["3 to 6 services"],
  "cta_text": "button text, under 5 words"
}}"#,
        facts = facts.join("\n")
    )
}

/// Parse the LLM's answer into site copy.
pub fn parse_content(text: &str) -> Result<SiteContent> {
    let json = extract_json_object(text).context("No JSON object in response")?;
    let content: SiteContent =
        serde_json::from_str(json).context("Response is not valid site content")?;
    content.validate()
}

/// Default copy for when the LLM fails or answers with something unusable.
pub fn fallback_content(lead: &Lead) -> SiteContent {
    let name = lead.display_name().to_string();
    let place = lead
        .city
        .as_deref()
        .or(lead.state.as_deref())
        .map(|p| format!(" in {}", p))
        .unwrap_or_default();

    let (headline, services, cta): (String, &[&str], &str) =
        match Industry::classify(lead.industry.as_deref()) {
            Industry::Trades => (
                format!("Reliable work{}, done right", place),
                &["Repairs", "Installations", "Maintenance", "Free estimates"],
                "Get a free quote",
            ),
            Industry::Food => (
                format!("Fresh, local favorites{}", place),
                &["Dine in", "Takeout", "Catering"],
                "See our menu",
            ),
            Industry::Beauty => (
                format!("Look and feel your best{}", place),
                &["Appointments", "Walk-ins welcome", "Gift cards"],
                "Book now",
            ),
            Industry::Professional => (
                format!("Trusted advice{}", place),
                &["Consultations", "Ongoing support", "Flexible scheduling"],
                "Schedule a consultation",
            ),
            Industry::General => (
                format!("Proudly serving our neighbors{}", place),
                &["Friendly service", "Local expertise", "Fair prices"],
                "Contact us",
            ),
        };

    SiteContent {
        headline,
        tagline: format!("{} is here to help.", name),
        about: format!(
            "{} is a locally owned business{}. We take pride in treating every customer like a \
             neighbor. Reach out today and see the difference.",
            name, place
        ),
        services: services.iter().map(|s| s.to_string()).collect(),
        cta_text: cta.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::leads::scoring::tests::lead;

    #[test]
    fn parses_fenced_json() {
        let text = r#"Here you go:
```json
{"headline": "Leaks fixed fast", "tagline": "Same-day service.", "about": "Family run since 1990.",
 "services": ["Repairs", "Water heaters"], "cta_text": "Call now"}
```"#;
        let content = parse_content(text).unwrap();
        assert_eq!(content.headline, "Leaks fixed fast");
        assert_eq!(content.services.len(), 2);
    }

    #[test]
    fn rejects_incomplete_content() {
        assert!(parse_content("Sorry, I can't help with that.").is_err());
        assert!(parse_content(
            r#"{"headline": "", "tagline": "", "about": "x", "services": ["a"], "cta_text": "go"}"#
        )
        .is_err());
        assert!(parse_content(
            r#"{"headline": "Hi", "tagline": "", "about": "x", "services": [], "cta_text": "go"}"#
        )
        .is_err());
    }

    #[test]
    fn fallback_matches_industry() {
        let mut l = lead();
        l.industry = Some("Plumbing & Heating".to_string());
        l.city = Some("Duluth".to_string());

        let content = fallback_content(&l);
        assert_eq!(content.headline, "Reliable work in Duluth, done right");
        assert_eq!(content.cta_text, "Get a free quote");
        assert!(content.about.starts_with("John's Plumbing"));
        assert!(content.clone().validate().is_ok());

        assert_eq!(template_for(Some("Bakery")), "hospitality");
        assert_eq!(template_for(None), "general");
    }

    #[test]
    fn prompt_includes_known_facts() {
        let mut l = lead();
        l.city = Some("Duluth".to_string());
        l.state = Some("MN".to_string());
        l.scraped_data = Some(serde_json::json!({ "text": "Serving Duluth since 1990" }));

        let prompt = build_prompt(&l);
        assert!(prompt.contains("Business name: John's Plumbing"));
        assert!(prompt.contains("Location: Duluth, MN"));
        assert!(prompt.contains("Serving Duluth since 1990"));
    }
}
