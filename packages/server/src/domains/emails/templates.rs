//! Email bodies and tracking.
//!
//! Bodies are plain: a greeting, a couple of sentences, one link. Tracking
//! rewrites every absolute link through `/t/click/{id}` and appends a 1x1
//! pixel pointing at `/t/open/{id}`.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::common::EmailLogId;
use crate::domains::sites::render::escape_html;

lazy_static! {
    static ref HREF: Regex = Regex::new(r#"href="(https?://[^"]+)""#).unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
    pub text: String,
}

pub fn outreach_email(first_name: &str, business_name: &str, preview_url: &str) -> RenderedEmail {
    let subject = format!("We built a new website for {}", business_name);
    let text = format!(
        "Hi {first_name},\n\n\
         We put together a free website preview for {business_name}. Take a look:\n\n\
         {preview_url}\n\n\
         If you like it, reply to this email and we'll get it live for you.\n\n\
         The LeadForge team"
    );
    let html = format!(
        "<html><body>\
         <p>Hi {name},</p>\
         <p>We put together a free website preview for {business}.</p>\
         <p><a href=\"{url}\">See your new website</a></p>\
         <p>If you like it, reply to this email and we'll get it live for you.</p>\
         <p>The LeadForge team</p>\
         </body></html>",
        name = escape_html(first_name),
        business = escape_html(business_name),
        url = escape_html(preview_url),
    );

    RenderedEmail {
        subject,
        html,
        text,
    }
}

pub fn welcome_email(first_name: &str, business_name: &str, site_url: &str) -> RenderedEmail {
    let subject = format!("{} is live!", business_name);
    let text = format!(
        "Hi {first_name},\n\n\
         Thanks for subscribing. The website for {business_name} is now live:\n\n\
         {site_url}\n\n\
         Reply any time if you'd like changes.\n\n\
         The LeadForge team"
    );
    let html = format!(
        "<html><body>\
         <p>Hi {name},</p>\
         <p>Thanks for subscribing. The website for {business} is now live.</p>\
         <p><a href=\"{url}\">Visit your website</a></p>\
         <p>Reply any time if you'd like changes.</p>\
         <p>The LeadForge team</p>\
         </body></html>",
        name = escape_html(first_name),
        business = escape_html(business_name),
        url = escape_html(site_url),
    );

    RenderedEmail {
        subject,
        html,
        text,
    }
}

pub fn click_url(base_url: &str, email_log_id: EmailLogId, target: &str) -> String {
    format!(
        "{}/t/click/{}?url={}",
        base_url,
        email_log_id,
        urlencoding::encode(target)
    )
}

pub fn open_pixel_url(base_url: &str, email_log_id: EmailLogId) -> String {
    format!("{}/t/open/{}", base_url, email_log_id)
}

/// Route links through the click redirect and add the open pixel.
pub fn add_tracking(html: &str, base_url: &str, email_log_id: EmailLogId) -> String {
    let rewritten = HREF.replace_all(html, |caps: &Captures| {
        // hrefs were HTML-escaped when the body was built
        let target = caps[1].replace("&amp;", "&");
        format!(
            "href=\"{}\"",
            escape_html(&click_url(base_url, email_log_id, &target))
        )
    });

    let pixel = format!(
        "<img src=\"{}\" width=\"1\" height=\"1\" alt=\"\" style=\"display:none\">",
        escape_html(&open_pixel_url(base_url, email_log_id))
    );

    match rewritten.rfind("</body>") {
        Some(at) => format!("{}{}{}", &rewritten[..at], pixel, &rewritten[at..]),
        None => format!("{}{}", rewritten, pixel),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://leadforge.test";

    #[test]
    fn outreach_mentions_name_and_preview() {
        let email = outreach_email("John", "John's Plumbing", "https://leadforge.test/sites/johns");
        assert_eq!(email.subject, "We built a new website for John's Plumbing");
        assert!(email.text.starts_with("Hi John,"));
        assert!(email.text.contains("https://leadforge.test/sites/johns"));
        assert!(email.html.contains("John&#39;s Plumbing"));
    }

    #[test]
    fn links_go_through_click_redirect() {
        let id = EmailLogId::new();
        let html = r#"<html><body><a href="https://x.test/a?b=1&amp;c=2">go</a></body></html>"#;
        let tracked = add_tracking(html, BASE, id);

        let expected = format!(
            "href=\"{}/t/click/{}?url=https%3A%2F%2Fx.test%2Fa%3Fb%3D1%26c%3D2\"",
            BASE, id
        );
        assert!(tracked.contains(&expected), "{}", tracked);
        assert!(!tracked.contains("href=\"https://x.test"));
    }

    #[test]
    fn pixel_goes_before_body_close() {
        let id = EmailLogId::new();
        let tracked = add_tracking("<html><body><p>hi</p></body></html>", BASE, id);

        let pixel = format!("<img src=\"{}/t/open/{}\"", BASE, id);
        let pixel_at = tracked.find(&pixel).unwrap();
        assert!(pixel_at < tracked.find("</body>").unwrap());
    }

    #[test]
    fn pixel_appended_without_body() {
        let id = EmailLogId::new();
        let tracked = add_tracking("<p>hi</p>", BASE, id);
        assert!(tracked.starts_with("<p>hi</p><img"));
    }

    #[test]
    fn mailto_links_are_left_alone() {
        let tracked = add_tracking(r#"<a href="mailto:a@b.test">mail</a>"#, BASE, EmailLogId::new());
        assert!(tracked.contains(r#"href="mailto:a@b.test""#));
    }
}
