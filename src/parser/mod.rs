pub mod assemble;
pub mod fragments;
pub mod hierarchy;
pub mod restructure;
pub mod title;

use std::path::Path;

use anyhow::{Context, Result};

pub use assemble::{Assembler, Document, Section, DEFAULT_HIERARCHY};

/// Pipeline for one page: HTML → fragments → hierarchy-tagged sections → document.
pub fn parse_document(html: &str, doc_title: &str, source_url: &str) -> Document {
    parse_with_keywords(html, doc_title, source_url, DEFAULT_HIERARCHY)
}

/// Same pipeline with a caller-supplied hierarchy vocabulary (some codes use
/// e.g. Appendix/Chapter/Article/Sec).
pub fn parse_with_keywords(
    html: &str,
    doc_title: &str,
    source_url: &str,
    keywords: &[&str],
) -> Document {
    let mut assembler = Assembler::new(keywords);
    let sections = fragments::extract_fragments(html)
        .iter()
        .map(|f| assembler.assemble(f.heading.as_deref(), &f.nodes, source_url))
        .collect();

    Document {
        title: doc_title.to_string(),
        source_url: source_url.to_string(),
        sections,
    }
}

/// Parse a saved HTML file. The document title defaults to the file stem.
pub fn parse_file(path: &Path, title: Option<&str>) -> Result<Document> {
    let html = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "Untitled".to_string());
    let title = title.unwrap_or(&stem);
    Ok(parse_document(&html, title, &path.to_string_lossy()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> Document {
        let html = std::fs::read_to_string("tests/fixtures/chapter22.html").unwrap();
        parse_document(&html, "chapter22", "tests/fixtures/chapter22.html")
    }

    #[test]
    fn fixture_section_count_and_order() {
        let doc = fixture();
        let ids: Vec<&str> = doc.sections.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(
            ids,
            ["chapter-22", "article-ii", "sec-22-14", "sec-22-15"]
        );
    }

    #[test]
    fn fixture_paths_nest_and_reset() {
        let doc = fixture();
        let paths: Vec<&[String]> = doc.sections.iter().map(|s| s.path.as_slice()).collect();
        assert_eq!(paths[0], ["chapter-22"]);
        assert_eq!(paths[1], ["chapter-22", "article-ii"]);
        assert_eq!(paths[2], ["chapter-22", "article-ii", "sec-22-14"]);
        assert_eq!(paths[3], ["chapter-22", "article-ii", "sec-22-15"]);
    }

    #[test]
    fn fixture_labels_and_titles() {
        let doc = fixture();
        assert_eq!(doc.sections[0].label, "Chapter 22");
        assert_eq!(doc.sections[0].title, "ZONING");
        assert_eq!(doc.sections[2].label, "Sec. 22-14.");
        assert_eq!(doc.sections[2].title, "Permit required");
    }

    #[test]
    fn fixture_headings_stripped_from_content() {
        let doc = fixture();
        for section in &doc.sections {
            assert!(
                !section.content.contains("<h4>") && !section.content.contains("<h6>"),
                "heading left in content of {}",
                section.id
            );
        }
        assert!(doc.sections[0].content.contains("land use"));
    }

    #[test]
    fn fixture_subparagraphs_are_indented() {
        let doc = fixture();
        let content = &doc.sections[2].content;
        assert!(content.contains(&format!(
            "{}(a) No sign shall be erected without a permit.",
            "&nbsp;".repeat(4)
        )));
        assert!(content.contains(&format!(
            "{}(1) Applications are filed with the zoning administrator.",
            "&nbsp;".repeat(8)
        )));
        // The plain trailing paragraph survives untouched.
        assert!(content.contains("<p>Penalties are listed in section 1-11.</p>"));
    }

    #[test]
    fn fixture_json_round_trips_field_set() {
        let doc = fixture();
        let value = serde_json::to_value(&doc).unwrap();
        let first = &value["sections"][0];
        for key in ["id", "title", "label", "content", "path", "url"] {
            assert!(first.get(key).is_some(), "missing {}", key);
        }
        assert_eq!(value["title"], "chapter22");
    }

    #[test]
    fn empty_page_yields_empty_document() {
        let doc = parse_document("<html><body></body></html>", "empty", "");
        assert!(doc.sections.is_empty());
    }
}
