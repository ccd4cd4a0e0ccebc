//! Extraction of heading/content fragment pairs from a rendered page.
//!
//! Municode pages carry their body as `ul.chunks` list items, each holding a
//! `div.chunk-title` heading and a `div.chunk-content` body. Saved or older
//! pages sometimes drop the title divs and leave the heading as a bare text
//! node before each content div; both dialects are handled here.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use super::restructure::{class_level, MarkupNode};

static CHUNK_ITEM_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("ul.chunks li").unwrap());
static CHUNK_TITLE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.chunk-title").unwrap());
static CHUNK_CONTENT_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.chunk-content").unwrap());
static HEADING_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1, h2, h3, h4, h5, h6").unwrap());

/// One content fragment and the heading text that names it, if any.
pub struct Fragment {
    pub heading: Option<String>,
    pub nodes: Vec<HtmlNode>,
}

/// A child node of a fragment, detached from the parse tree so the
/// restructuring pass can stay library-agnostic.
pub enum HtmlNode {
    Element {
        tag: String,
        classes: Vec<String>,
        text: String,
        inner_html: String,
        outer_html: String,
    },
    Text(String),
}

impl HtmlNode {
    fn from_element(el: ElementRef) -> Self {
        HtmlNode::Element {
            tag: el.value().name().to_string(),
            classes: el.value().classes().map(str::to_string).collect(),
            text: collapse_whitespace(&el.text().collect::<String>()),
            inner_html: el.inner_html(),
            outer_html: el.html(),
        }
    }
}

impl MarkupNode for HtmlNode {
    fn level_class(&self, prefix: &str) -> Option<u32> {
        match self {
            // Level classes are only meaningful on paragraph nodes.
            HtmlNode::Element { tag, classes, .. } if tag == "p" => class_level(classes, prefix),
            _ => None,
        }
    }

    fn is_structural(&self) -> bool {
        matches!(self, HtmlNode::Element { .. })
    }

    fn label_text(&self) -> String {
        match self {
            HtmlNode::Element { text, .. } => text.clone(),
            HtmlNode::Text(t) => t.trim().to_string(),
        }
    }

    fn inner_html(&self) -> String {
        match self {
            HtmlNode::Element { inner_html, .. } => inner_html.clone(),
            HtmlNode::Text(t) => t.clone(),
        }
    }

    fn render(&self) -> String {
        match self {
            HtmlNode::Element { outer_html, .. } => outer_html.clone(),
            HtmlNode::Text(t) => t.clone(),
        }
    }
}

/// Pull the ordered (heading, content) fragments out of a page.
pub fn extract_fragments(html: &str) -> Vec<Fragment> {
    let doc = Html::parse_document(html);
    let mut fragments = Vec::new();

    for item in doc.select(&CHUNK_ITEM_SEL) {
        let Some(content) = item.select(&CHUNK_CONTENT_SEL).next() else {
            continue;
        };
        let heading = item
            .select(&CHUNK_TITLE_SEL)
            .next()
            .map(element_text)
            .filter(|t| !t.is_empty())
            .or_else(|| preceding_heading(content));
        fragments.push(Fragment {
            heading,
            nodes: child_nodes(content),
        });
    }

    if !fragments.is_empty() {
        return fragments;
    }

    // Bare dialect: content divs outside any chunks list, heading text left
    // as a preceding sibling node.
    doc.select(&CHUNK_CONTENT_SEL)
        .map(|content| Fragment {
            heading: preceding_heading(content),
            nodes: child_nodes(content),
        })
        .collect()
}

/// First chunk heading of a page, used by the collector to skip pages it has
/// already processed.
pub fn first_heading(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    doc.select(&CHUNK_TITLE_SEL)
        .next()
        .map(element_text)
        .filter(|t| !t.is_empty())
}

/// Remove the first heading element from a rendered fragment. The heading has
/// already been promoted into the section's label and title.
pub fn strip_first_heading(html: &str) -> String {
    let mut frag = Html::parse_fragment(html);
    let heading_id = frag.select(&HEADING_SEL).next().map(|el| el.id());
    if let Some(id) = heading_id {
        if let Some(mut node) = frag.tree.get_mut(id) {
            node.detach();
        }
    }
    frag.root_element().inner_html()
}

fn child_nodes(content: ElementRef) -> Vec<HtmlNode> {
    content
        .children()
        .filter_map(|child| {
            if let Some(el) = ElementRef::wrap(child) {
                Some(HtmlNode::from_element(el))
            } else {
                child
                    .value()
                    .as_text()
                    .map(|t| HtmlNode::Text(t.to_string()))
            }
        })
        .collect()
}

/// Nearest preceding non-blank text sibling, the way older saved pages leave
/// the heading floating before the content div.
fn preceding_heading(content: ElementRef) -> Option<String> {
    for sibling in content.prev_siblings() {
        if let Some(text) = sibling.value().as_text() {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                continue;
            }
            return Some(collapse_whitespace(trimmed));
        }
        if let Some(el) = ElementRef::wrap(sibling) {
            let text = element_text(el);
            if is_heading_tag(el.value().name()) && !text.is_empty() {
                return Some(text);
            }
        }
        break;
    }
    None
}

fn is_heading_tag(tag: &str) -> bool {
    matches!(tag, "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
}

fn element_text(el: ElementRef) -> String {
    collapse_whitespace(&el.text().collect::<String>())
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body><div id="codesContent"><ul class="chunks">
          <li>
            <div class="chunk-title">Sec. 1-1. - Short title</div>
            <div class="chunk-content">
              <h4>Sec. 1-1. - Short title</h4>
              <p>This Code shall be known as the County Code.</p>
            </div>
          </li>
          <li>
            <div class="chunk-title">Sec. 1-2. - Definitions</div>
            <div class="chunk-content">
              <p class="incr1">(a)</p>
              <p class="content1">Words have their common meaning.</p>
            </div>
          </li>
        </ul></div></body></html>
    "#;

    #[test]
    fn extracts_title_content_pairs() {
        let fragments = extract_fragments(PAGE);
        assert_eq!(fragments.len(), 2);
        assert_eq!(
            fragments[0].heading.as_deref(),
            Some("Sec. 1-1. - Short title")
        );
        assert_eq!(
            fragments[1].heading.as_deref(),
            Some("Sec. 1-2. - Definitions")
        );
    }

    #[test]
    fn fragment_nodes_carry_level_classes() {
        let fragments = extract_fragments(PAGE);
        let levels: Vec<Option<u32>> = fragments[1]
            .nodes
            .iter()
            .map(|n| n.level_class("incr"))
            .collect();
        assert!(levels.contains(&Some(1)));
    }

    #[test]
    fn extracted_nodes_restructure_across_whitespace() {
        use crate::parser::restructure::restructure;

        // Parsed chunk children carry whitespace text nodes between the
        // incr/content paragraphs; pairing must survive them.
        let fragments = extract_fragments(PAGE);
        let html = restructure(&fragments[1].nodes);
        assert!(html.contains(&format!(
            "{}(a) Words have their common meaning.",
            "&nbsp;".repeat(4)
        )));
        assert_eq!(html.matches("Words have their common meaning.").count(), 1);
    }

    #[test]
    fn bare_dialect_uses_preceding_text_sibling() {
        let html = r#"
            <div>
              Chapter 2 - ADMINISTRATION
              <div class="chunk-content"><p>The county manager.</p></div>
            </div>
        "#;
        let fragments = extract_fragments(html);
        assert_eq!(fragments.len(), 1);
        assert_eq!(
            fragments[0].heading.as_deref(),
            Some("Chapter 2 - ADMINISTRATION")
        );
    }

    #[test]
    fn missing_heading_is_none() {
        let html = r#"<div><div class="chunk-content"><p>Body.</p></div></div>"#;
        let fragments = extract_fragments(html);
        assert_eq!(fragments.len(), 1);
        assert!(fragments[0].heading.is_none());
    }

    #[test]
    fn first_heading_probe() {
        assert_eq!(
            first_heading(PAGE).as_deref(),
            Some("Sec. 1-1. - Short title")
        );
        assert_eq!(first_heading("<p>no chunks</p>"), None);
    }

    #[test]
    fn strip_first_heading_removes_only_the_first() {
        let html = "<h4>Promoted heading</h4><p>Kept.</p><h5>Later heading</h5>";
        let stripped = strip_first_heading(html);
        assert!(!stripped.contains("Promoted heading"));
        assert!(stripped.contains("<p>Kept.</p>"));
        assert!(stripped.contains("Later heading"));
    }

    #[test]
    fn strip_first_heading_without_heading_is_identity() {
        let html = "<p>Only a paragraph.</p>";
        assert_eq!(strip_first_heading(html), html);
    }
}
