//! Collapse indentation-coded sub-paragraph markers into nested text.
//!
//! Municode encodes sub-paragraphs as a label node with an `incrN` class
//! followed by a sibling body node with a `contentN` class. The restructurer
//! merges each pair into one indented paragraph and drops content nodes that
//! have no label, in a single ordered pass.

/// Class prefix carried by label nodes (`incr0`, `incr1`, ...).
const INCREMENT_PREFIX: &str = "incr";
/// Class prefix carried by body nodes paired with a label.
const CONTENT_PREFIX: &str = "content";

/// One indentation step, as rendered HTML.
const INDENT_UNIT: &str = "&nbsp;";
const INDENT_PER_LEVEL: u32 = 4;

/// Minimal view of a markup node, so the restructuring pass does not depend
/// on any particular HTML library's node type.
pub trait MarkupNode {
    /// Numeric level carried by a `<prefix><digits>` class on a paragraph
    /// node, e.g. `incr2` → 2. `None` for other nodes.
    fn level_class(&self, prefix: &str) -> Option<u32>;
    /// Whether the node is a structural sibling (an element). Text nodes are
    /// not: a label's body lives at the next structural sibling, however many
    /// text nodes sit in between.
    fn is_structural(&self) -> bool;
    /// Flattened, trimmed text content (the label of an increment node).
    fn label_text(&self) -> String;
    /// Inner markup (the body of a content node).
    fn inner_html(&self) -> String;
    /// The node rendered as-is, for passthrough.
    fn render(&self) -> String;
}

/// Parse a `<prefix><digits>` class out of a class list.
pub(crate) fn class_level(classes: &[String], prefix: &str) -> Option<u32> {
    classes.iter().find_map(|c| {
        let digits = c.strip_prefix(prefix)?;
        if digits.is_empty() {
            return None;
        }
        digits.parse().ok()
    })
}

/// Rebuild a fragment's child nodes with increment/content pairs merged.
///
/// An increment node consumes the markup of its next structural sibling
/// (parsed HTML interleaves whitespace text nodes between the paragraphs);
/// the merged paragraph is indented by 4 indent units per level. Content
/// nodes themselves never appear in the output: either their markup was
/// already consumed by the preceding label, or they are orphaned and
/// dropped. All other nodes pass through unchanged, in order.
pub fn restructure<N: MarkupNode>(nodes: &[N]) -> String {
    let mut out = Vec::with_capacity(nodes.len());

    for (i, node) in nodes.iter().enumerate() {
        if let Some(level) = node.level_class(INCREMENT_PREFIX) {
            let body = next_structural(nodes, i + 1)
                .map(|n| n.inner_html())
                .unwrap_or_default();
            let indent = INDENT_UNIT.repeat((INDENT_PER_LEVEL * level) as usize);
            let merged = format!("{}{} {}", indent, node.label_text(), body.trim());
            out.push(format!("<p>{}</p>", merged.trim()));
        } else if node.level_class(CONTENT_PREFIX).is_some() {
            // Consumed by the label before it, or orphaned.
        } else {
            out.push(node.render());
        }
    }

    out.concat()
}

fn next_structural<N: MarkupNode>(nodes: &[N], from: usize) -> Option<&N> {
    nodes.get(from..)?.iter().find(|n| n.is_structural())
}
