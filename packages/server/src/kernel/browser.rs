//! Headless browser via Playwright.
//!
//! Each call launches Chromium through `node -e <script>` and tears it down
//! when the script exits; the script prints one JSON document to stdout.
//! Scraping falls back to a static fetch (reqwest + scraper) when node or
//! Playwright is unavailable, or the page won't render.
//!
//! Limitations:
//! - The static fallback doesn't run JavaScript
//! - Visual checks have no fallback; they need a real renderer

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{BaseBrowser, ScrapedPage, VisualCheck, VisualReport};

/// Upper bound on stored page text.
const MAX_TEXT_CHARS: usize = 20_000;

/// Mobile viewport width used for the overflow check.
pub const MOBILE_VIEWPORT_WIDTH: u32 = 375;

pub const CHECK_PAGE_LOADS: &str = "page_loads";
pub const CHECK_NO_ERRORS: &str = "no_error_elements";
pub const CHECK_NO_OVERFLOW: &str = "no_horizontal_overflow";
pub const CHECK_IMAGES: &str = "images_load";
pub const CHECK_CTA: &str = "cta_present";

/// The checks every visual report is scored against.
pub const VISUAL_CHECKS: [&str; 5] = [
    CHECK_PAGE_LOADS,
    CHECK_NO_ERRORS,
    CHECK_NO_OVERFLOW,
    CHECK_IMAGES,
    CHECK_CTA,
];

pub struct PlaywrightBrowser {
    client: reqwest::Client,
    node_binary: String,
}

#[derive(Debug, Deserialize)]
struct ScriptPage {
    title: Option<String>,
    description: Option<String>,
    text: String,
}

impl PlaywrightBrowser {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (compatible; LeadForgeBot/1.0)")
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            node_binary: "node".to_string(),
        })
    }

    /// Use a specific node binary (e.g. from nvm).
    pub fn with_node_binary(mut self, node_binary: impl Into<String>) -> Self {
        self.node_binary = node_binary.into();
        self
    }

    async fn run_script(&self, script: &str) -> Result<String> {
        let output = tokio::process::Command::new(&self.node_binary)
            .arg("-e")
            .arg(script)
            .kill_on_drop(true)
            .output()
            .await
            .context("Failed to run Playwright script")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Playwright script failed: {}", stderr.trim());
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn scrape_rendered(&self, url: &str) -> Result<ScrapedPage> {
        let stdout = self.run_script(&scrape_script(url)?).await?;
        let page: ScriptPage =
            serde_json::from_str(stdout.trim()).context("Invalid Playwright scrape output")?;

        Ok(ScrapedPage {
            url: url.to_string(),
            title: page.title.filter(|t| !t.is_empty()),
            description: page.description.filter(|d| !d.is_empty()),
            text: truncate(&collapse_whitespace(&page.text)),
        })
    }

    async fn scrape_static(&self, url: &str) -> Result<ScrapedPage> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("HTTP request failed")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("HTTP {} for {}", status, url);
        }

        let html = response
            .text()
            .await
            .context("Failed to read response body")?;

        Ok(parse_static_page(url, &html))
    }
}

#[async_trait]
impl BaseBrowser for PlaywrightBrowser {
    async fn scrape(&self, url: &str) -> Result<ScrapedPage> {
        match self.scrape_rendered(url).await {
            Ok(page) => Ok(page),
            Err(e) => {
                warn!(url = %url, error = %e, "rendered scrape failed, falling back to static fetch");
                self.scrape_static(url).await
            }
        }
    }

    async fn visual_checks(&self, url: &str) -> Result<VisualReport> {
        let stdout = self.run_script(&visual_script(url)?).await?;
        let report: VisualReport =
            serde_json::from_str(stdout.trim()).context("Invalid Playwright check output")?;

        debug!(
            url = %url,
            passed = report.checks.iter().filter(|c| c.passed).count(),
            "visual checks finished"
        );
        Ok(report)
    }
}

/// Title, meta description and body text from raw HTML.
fn parse_static_page(url: &str, html: &str) -> ScrapedPage {
    let document = Html::parse_document(html);

    let title = Selector::parse("title").ok().and_then(|s| {
        document
            .select(&s)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
    });

    let description = Selector::parse("meta[name='description']")
        .ok()
        .and_then(|s| {
            document
                .select(&s)
                .next()
                .and_then(|el| el.value().attr("content"))
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
        });

    let text = Selector::parse("body")
        .ok()
        .and_then(|s| document.select(&s).next())
        .map(|body| body.text().collect::<Vec<_>>().join(" "))
        .unwrap_or_default();

    ScrapedPage {
        url: url.to_string(),
        title,
        description,
        text: truncate(&collapse_whitespace(&text)),
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate(text: &str) -> String {
    text.chars().take(MAX_TEXT_CHARS).collect()
}

fn scrape_script(url: &str) -> Result<String> {
    let url = serde_json::to_string(url)?;
    Ok(format!(
        r#"
        const {{ chromium }} = require('playwright');
        (async () => {{
            const browser = await chromium.launch({{ headless: true }});
            try {{
                const page = await browser.newPage();
                await page.goto({url}, {{ waitUntil: 'networkidle', timeout: 30000 }});
                const result = await page.evaluate(() => ({{
                    title: document.title || null,
                    description: document.querySelector('meta[name="description"]')?.content || null,
                    text: document.body ? document.body.innerText : '',
                }}));
                console.log(JSON.stringify(result));
            }} finally {{
                await browser.close();
            }}
        }})().catch((e) => {{ console.error(String(e)); process.exit(1); }});
        "#
    ))
}

fn visual_script(url: &str) -> Result<String> {
    let url = serde_json::to_string(url)?;
    Ok(format!(
        r#"
        const {{ chromium }} = require('playwright');
        (async () => {{
            const browser = await chromium.launch({{ headless: true }});
            const checks = [];
            try {{
                const page = await browser.newPage({{ viewport: {{ width: {width}, height: 812 }} }});
                let loaded = false;
                try {{
                    const res = await page.goto({url}, {{ waitUntil: 'networkidle', timeout: 30000 }});
                    loaded = !!res && res.ok();
                    checks.push({{ name: '{loads}', passed: loaded, detail: loaded ? null : `status ${{res ? res.status() : 'none'}}` }});
                }} catch (e) {{
                    checks.push({{ name: '{loads}', passed: false, detail: String(e) }});
                }}

                if (!loaded) {{
                    for (const name of ['{errors}', '{overflow}', '{images}', '{cta}']) {{
                        checks.push({{ name, passed: false, detail: 'page did not load' }});
                    }}
                }} else {{
                    const errors = await page.locator('.error, .error-message, [role="alert"]').count();
                    checks.push({{ name: '{errors}', passed: errors === 0, detail: errors ? `${{errors}} error elements` : null }});

                    const overflow = await page.evaluate(() => document.documentElement.scrollWidth > window.innerWidth);
                    checks.push({{ name: '{overflow}', passed: !overflow, detail: overflow ? 'content wider than viewport' : null }});

                    const broken = await page.evaluate(() =>
                        Array.from(document.images).filter((img) => img.complete && img.naturalWidth === 0).length);
                    checks.push({{ name: '{images}', passed: broken === 0, detail: broken ? `${{broken}} broken images` : null }});

                    const cta = await page.locator('[data-cta], .cta, a[href^="tel:"], a[href^="mailto:"], button').count();
                    checks.push({{ name: '{cta}', passed: cta > 0, detail: cta ? null : 'no call to action found' }});
                }}
            }} finally {{
                await browser.close();
            }}
            console.log(JSON.stringify({{ checks }}));
        }})().catch((e) => {{ console.error(String(e)); process.exit(1); }});
        "#,
        width = MOBILE_VIEWPORT_WIDTH,
        loads = CHECK_PAGE_LOADS,
        errors = CHECK_NO_ERRORS,
        overflow = CHECK_NO_OVERFLOW,
        images = CHECK_IMAGES,
        cta = CHECK_CTA,
    ))
}

/// Report with every check failed, for when the browser can't run at all.
pub fn failed_report(reason: &str) -> VisualReport {
    VisualReport {
        checks: VISUAL_CHECKS
            .iter()
            .map(|name| VisualCheck::fail(*name, reason))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_static_html() {
        let html = r#"
            <html>
              <head>
                <title> Joe's Plumbing </title>
                <meta name="description" content="24/7 emergency plumbing">
              </head>
              <body><h1>Welcome</h1>
                <p>We fix   leaks.</p></body>
            </html>
        "#;
        let page = parse_static_page("https://joes.test", html);

        assert_eq!(page.title.as_deref(), Some("Joe's Plumbing"));
        assert_eq!(page.description.as_deref(), Some("24/7 emergency plumbing"));
        assert_eq!(page.text, "Welcome We fix leaks.");
        assert!(page.has_content());
    }

    #[test]
    fn scripts_quote_the_url() {
        let script = scrape_script("https://x.test/'); process.exit(0); ('").unwrap();
        assert!(script.contains(r#""https://x.test/'); process.exit(0); ('""#));
    }

    #[test]
    fn visual_script_uses_mobile_viewport() {
        let script = visual_script("https://x.test").unwrap();
        assert!(script.contains("width: 375"));
        for name in VISUAL_CHECKS {
            assert!(script.contains(name));
        }
    }

    #[test]
    fn failed_report_covers_every_check() {
        let report = failed_report("node not installed");
        assert_eq!(report.checks.len(), 5);
        assert!(report.checks.iter().all(|c| !c.passed));
    }
}
