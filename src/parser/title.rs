use std::sync::LazyLock;

use regex::Regex;

static SLUG_SEP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.\s]+").unwrap());

/// How many leading characters of the raw heading feed the fallback slug.
const FALLBACK_SLUG_CHARS: usize = 20;

/// A heading decomposed into its stable id, label, and display title.
///
/// Headings look like `"Sec. 22-1. - Emergency procedures"`: the label is the
/// part before the first `" - "`, the title is the remainder. Without a
/// separator, label and title are both the whole trimmed heading.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTitle {
    pub id: String,
    pub label: String,
    pub title: String,
}

/// Split a raw heading into (id, label, title).
///
/// The id is the label lower-cased with runs of dots/whitespace collapsed to
/// single hyphens. A label with no alphanumeric content falls back to a slug
/// of the first 20 characters of the heading. Empty input yields an empty id,
/// label, and title.
pub fn parse_heading(raw: &str) -> ParsedTitle {
    let trimmed = raw.trim();

    let (label, title) = match trimmed.find(" - ") {
        Some(pos) => (trimmed[..pos].trim(), trimmed[pos + 3..].trim()),
        None => (trimmed, trimmed),
    };

    let id = SLUG_SEP_RE
        .replace_all(label, "-")
        .to_lowercase()
        .trim_matches('-')
        .to_string();
    let id = if id.is_empty() {
        fallback_slug(trimmed)
    } else {
        id
    };

    ParsedTitle {
        id,
        label: label.to_string(),
        title: title.to_string(),
    }
}

/// Slug from the leading characters of the raw text: non-alphanumeric,
/// non-space characters removed, spaces hyphenated, lower-cased.
fn fallback_slug(text: &str) -> String {
    let head: String = text
        .chars()
        .take(FALLBACK_SLUG_CHARS)
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    head.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}
