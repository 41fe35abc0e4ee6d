//! Selector-based extraction of title, description and logo candidates.
//!
//! Pure parsing, no network. `scraper` tolerates broken markup, so missing
//! or unclosed tags only ever produce empty fields.

use once_cell::sync::Lazy;
use scraper::{Html, Selector};

use crate::metadata::normalize::resolve_url;
use crate::metadata::types::PageMetadata;

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector must parse")
}

static TITLE_SELECTOR: Lazy<Selector> = Lazy::new(|| selector("title"));
static OG_TITLE_SELECTOR: Lazy<Selector> = Lazy::new(|| selector(r#"meta[property="og:title"]"#));
static DESCRIPTION_SELECTOR: Lazy<Selector> =
    Lazy::new(|| selector(r#"meta[name="description"]"#));
static OG_DESCRIPTION_SELECTOR: Lazy<Selector> =
    Lazy::new(|| selector(r#"meta[property="og:description"]"#));

/// Logo selectors, highest priority first.
const LOGO_SELECTORS: [&str; 12] = [
    // sized touch icons, largest first
    r#"link[rel="apple-touch-icon"][sizes="180x180"]"#,
    r#"link[rel="apple-touch-icon"][sizes="152x152"]"#,
    r#"link[rel="apple-touch-icon"][sizes="144x144"]"#,
    r#"link[rel="apple-touch-icon"][sizes="120x120"]"#,
    r#"link[rel="apple-touch-icon"]"#,
    // social cards
    r#"meta[property="og:image"]"#,
    r#"meta[name="twitter:image"]"#,
    // favicons
    r#"link[rel="icon"][type="image/svg+xml"]"#,
    r#"link[rel="icon"][type="image/png"]"#,
    r#"link[rel="icon"]"#,
    r#"link[rel="shortcut icon"]"#,
    r#"link[rel="favicon"]"#,
];

static LOGO_SELECTOR_LIST: Lazy<Vec<Selector>> =
    Lazy::new(|| LOGO_SELECTORS.iter().map(|css| selector(css)).collect());

fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    let text = document
        .select(selector)
        .next()?
        .text()
        .collect::<String>();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn first_content(document: &Html, selector: &Selector) -> Option<String> {
    let content = document.select(selector).next()?.attr("content")?.trim();
    (!content.is_empty()).then(|| content.to_string())
}

/// `href`, else `content`, of the first element matching `selector`
fn first_link_value<'a>(document: &'a Html, selector: &Selector) -> Option<&'a str> {
    let element = document.select(selector).next()?;
    element
        .attr("href")
        .filter(|v| !v.trim().is_empty())
        .or_else(|| element.attr("content"))
        .filter(|v| !v.trim().is_empty())
}

/// Extract metadata and prioritized logo candidates from a page.
pub fn extract(html: &str, base_url: &str) -> PageMetadata {
    let document = Html::parse_document(html);

    let title = first_text(&document, &TITLE_SELECTOR)
        .or_else(|| first_content(&document, &OG_TITLE_SELECTOR))
        .unwrap_or_default();

    let description = first_content(&document, &DESCRIPTION_SELECTOR)
        .or_else(|| first_content(&document, &OG_DESCRIPTION_SELECTOR))
        .unwrap_or_default();

    let mut logo_candidates: Vec<String> = Vec::new();
    for selector in LOGO_SELECTOR_LIST.iter() {
        let Some(value) = first_link_value(&document, selector) else {
            continue;
        };

        if value.trim_start().starts_with("data:") {
            log::debug!("inline data icons are not supported");
            continue;
        }

        if let Some(resolved) = resolve_url(base_url, Some(value)) {
            if !logo_candidates.contains(&resolved) {
                logo_candidates.push(resolved);
            }
        }
    }

    PageMetadata {
        title,
        description,
        logo_candidates,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(head: &str) -> String {
        format!("<!DOCTYPE html><html><head>{head}</head><body></body></html>")
    }

    #[test]
    fn test_title_tag_wins_over_og_title() {
        let html = page(r#"<title>Foo</title><meta property="og:title" content="Bar">"#);
        let m = extract(&html, "https://a.com");
        assert_eq!(m.title, "Foo");
    }

    #[test]
    fn test_og_title_fallback() {
        let html = page(r#"<meta property="og:title" content="Bar">"#);
        assert_eq!(extract(&html, "https://a.com").title, "Bar");
    }

    #[test]
    fn test_blank_title_tag_falls_back() {
        let html = page(r#"<title>   </title><meta property="og:title" content="Bar">"#);
        assert_eq!(extract(&html, "https://a.com").title, "Bar");
    }

    #[test]
    fn test_title_is_trimmed() {
        let html = page("<title>\n  Acme Inc\n</title>");
        assert_eq!(extract(&html, "https://a.com").title, "Acme Inc");
    }

    #[test]
    fn test_description_precedence() {
        let html = page(
            r#"<meta property="og:description" content="OG desc">
               <meta name="description" content="Plain desc">"#,
        );
        assert_eq!(extract(&html, "https://a.com").description, "Plain desc");

        let html = page(r#"<meta property="og:description" content="OG desc">"#);
        assert_eq!(extract(&html, "https://a.com").description, "OG desc");
    }

    #[test]
    fn test_garbage_html_yields_empty() {
        for html in ["", "<<<>>>", "<div><p>oops <<>> </span", "\u{0}\u{1}binary"] {
            let m = extract(html, "https://a.com");
            assert_eq!(m, PageMetadata::default(), "unexpected fields for {html:?}");
        }
    }

    #[test]
    fn test_candidate_priority() {
        let html = page(
            r#"<link rel="icon" href="/favicon.png">
               <link rel="apple-touch-icon" sizes="180x180" href="/apple-180.png">"#,
        );
        let m = extract(&html, "https://a.com");
        assert_eq!(
            m.logo_candidates,
            vec![
                "https://a.com/apple-180.png".to_string(),
                "https://a.com/favicon.png".to_string(),
            ]
        );
    }

    #[test]
    fn test_full_selector_order() {
        let html = page(
            r#"<link rel="shortcut icon" href="/shortcut.ico">
               <meta name="twitter:image" content="https://cdn.a.com/tw.png">
               <link rel="icon" type="image/svg+xml" href="/icon.svg">
               <meta property="og:image" content="//cdn.a.com/og.png">
               <link rel="apple-touch-icon" href="touch.png">
               <link rel="apple-touch-icon" sizes="152x152" href="/apple-152.png">"#,
        );
        let m = extract(&html, "https://a.com/pricing/");
        assert_eq!(
            m.logo_candidates,
            vec![
                "https://a.com/apple-152.png".to_string(),
                "https://a.com/touch.png".to_string(),
                "https://cdn.a.com/og.png".to_string(),
                "https://cdn.a.com/tw.png".to_string(),
                "https://a.com/icon.svg".to_string(),
                "https://a.com/shortcut.ico".to_string(),
            ]
        );
    }

    #[test]
    fn test_duplicates_are_dropped() {
        let html = page(
            r#"<link rel="icon" type="image/png" href="/icon.png">
               <link rel="icon" href="/icon.png">"#,
        );
        let m = extract(&html, "https://a.com");
        assert_eq!(m.logo_candidates, vec!["https://a.com/icon.png".to_string()]);
    }

    #[test]
    fn test_data_uri_icons_skipped() {
        let html = page(
            r#"<link rel="icon" type="image/png" href="data:image/png;base64,AAAA">
               <link rel="shortcut icon" href="/favicon.ico">"#,
        );
        let m = extract(&html, "https://a.com");
        assert_eq!(m.logo_candidates, vec!["https://a.com/favicon.ico".to_string()]);
    }

    #[test]
    fn test_empty_href_skipped() {
        let html = page(r#"<link rel="apple-touch-icon" href=""><link rel="icon" href="/i.png">"#);
        let m = extract(&html, "https://a.com");
        assert_eq!(m.logo_candidates, vec!["https://a.com/i.png".to_string()]);
    }

    #[test]
    fn test_unresolvable_base_drops_relative_candidates() {
        let html = page(
            r#"<link rel="icon" href="/i.png"><meta property="og:image" content="https://c.com/og.png">"#,
        );
        let m = extract(&html, "");
        assert_eq!(m.logo_candidates, vec!["https://c.com/og.png".to_string()]);
    }
}
