//! Table-of-contents link discovery on rendered municode pages.
//!
//! Municode is a single-page app; by the time a page reaches us it has been
//! rendered, so the TOC is plain HTML. Section URLs are recognized by their
//! `nodeId` query parameter.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;

static NODE_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&]nodeId=([^&#]+)").unwrap());
/// Sub-section TOC inside a chapter page's content area.
static SECTION_TOC_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("main ul a[href*='nodeId=']").unwrap());
/// Whole-code TOC in the navigation sidebar.
static FULL_TOC_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("nav ul a[href*='nodeId=']").unwrap());

/// The nodeId carried by a section URL, if any.
pub fn node_id(url: &str) -> Option<String> {
    NODE_ID_RE
        .captures(url)
        .map(|caps| caps[1].to_string())
}

/// Ordered (url, link text) entries of a chapter page's sub-TOC. Empty for a
/// leaf page, which is how root pages are recognized.
pub fn section_toc_links(html: &str) -> Vec<(String, String)> {
    collect_links(html, &SECTION_TOC_SEL)
}

/// Ordered (url, link text) entries of the whole-code navigation TOC.
pub fn full_toc_links(html: &str) -> Vec<(String, String)> {
    collect_links(html, &FULL_TOC_SEL)
}

fn collect_links(html: &str, selector: &Selector) -> Vec<(String, String)> {
    let doc = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for anchor in doc.select(selector) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        // The SPA emits absolute URLs; anything else is not navigable here.
        if !href.starts_with("http") || node_id(href).is_none() {
            continue;
        }
        if !seen.insert(href.to_string()) {
            continue;
        }
        let text = anchor
            .text()
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        links.push((href.to_string(), text));
    }

    debug!("Collected {} TOC links", links.len());
    links
}
