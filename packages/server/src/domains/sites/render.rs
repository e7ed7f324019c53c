//! HTML for the public site preview at `/sites/{slug}`.
//!
//! QA's browser checks run against this page, so it must stay mobile safe:
//! viewport meta, no fixed widths, and a `data-cta` element.

use crate::domains::leads::models::Lead;
use crate::domains::sites::content::SiteContent;

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn cta_href(lead: &Lead) -> String {
    if let Some(phone) = lead.phone.as_deref() {
        let digits: String = phone
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '+')
            .collect();
        if !digits.is_empty() {
            return format!("tel:{}", digits);
        }
    }
    match lead.email.as_deref() {
        Some(email) => format!("mailto:{}", email),
        None => "#contact".to_string(),
    }
}

pub fn render_page(template_id: &str, content: &SiteContent, lead: &Lead) -> String {
    let services: String = content
        .services
        .iter()
        .filter(|s| !s.trim().is_empty())
        .map(|s| format!("<li>{}</li>", escape_html(s)))
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{name}</title>
<meta name="description" content="{tagline}">
<style>
  *, *::before, *::after {{ box-sizing: border-box; }}
  body {{ margin: 0; font-family: system-ui, sans-serif; line-height: 1.5; color: #1f2933; }}
  main {{ max-width: 48rem; margin: 0 auto; padding: 1.5rem; }}
  img {{ max-width: 100%; height: auto; }}
  .cta {{ display: inline-block; padding: 0.75rem 1.5rem; border-radius: 0.5rem; background: #2563eb; color: #fff; text-decoration: none; }}
</style>
</head>
<body class="template-{template}">
<main>
  <header>
    <h1>{headline}</h1>
    <p>{tagline}</p>
    <a class="cta" data-cta href="{cta_href}">{cta}</a>
  </header>
  <section id="about">
    <h2>About {name}</h2>
    <p>{about}</p>
  </section>
  <section id="services">
    <h2>Services</h2>
    <ul>{services}</ul>
  </section>
  <footer id="contact">
    <p>{name}</p>
  </footer>
</main>
</body>
</html>"#,
        name = escape_html(lead.display_name()),
        template = escape_html(template_id),
        headline = escape_html(&content.headline),
        tagline = escape_html(&content.tagline),
        about = escape_html(&content.about),
        cta = escape_html(&content.cta_text),
        cta_href = escape_html(&cta_href(lead)),
        services = services,
    )
}
