use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use super::fragments::{self, HtmlNode};
use super::hierarchy::{self, HierarchyState};
use super::restructure;
use super::title;

/// Default nesting vocabulary for municode ordinances, shallowest first.
pub const DEFAULT_HIERARCHY: &[&str] = &["Chapter", "Article", "Sec"];

/// Stand-in heading for fragments that arrive without one.
const UNTITLED: &str = "Untitled Section";

/// One section of a code document. The serialized field set
/// (id, title, label, content, path, url) is a compatibility contract with
/// downstream table-of-contents renderers keyed by path.
#[derive(Debug, Clone, Serialize)]
pub struct Section {
    pub id: String,
    pub title: String,
    pub label: String,
    pub content: String,
    pub path: Vec<String>,
    pub url: String,
}

/// A parsed code document: ordered sections under one title.
#[derive(Debug, Serialize)]
pub struct Document {
    pub title: String,
    pub source_url: String,
    pub sections: Vec<Section>,
}

impl Document {
    /// Write the document as a flat HTML file, one heading per section.
    pub fn save_html(&self, path: &Path) -> Result<()> {
        ensure_parent_dir(path)?;
        let mut out = format!("<h1>{}</h1>\n", self.title);
        for section in &self.sections {
            out.push_str(&format!("<h2>{}</h2>\n", section.title));
            out.push_str(&section.content);
            out.push('\n');
        }
        fs::write(path, out).with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Write the document as structured JSON.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        ensure_parent_dir(path)?;
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
    }
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Turns an ordered fragment stream into sections, threading one
/// `HierarchyState` so ancestry carries across page boundaries.
pub struct Assembler {
    keywords: Vec<String>,
    state: HierarchyState,
}

impl Assembler {
    pub fn new(keywords: &[&str]) -> Self {
        let keywords: Vec<String> = keywords.iter().map(|s| s.to_string()).collect();
        let state = HierarchyState::new(keywords.len());
        Self { keywords, state }
    }

    /// Assembler whose root slot is pre-populated with `root_id`, for
    /// sub-page streams that start below the document's root heading.
    pub fn seeded(keywords: &[&str], root_id: &str) -> Self {
        let keywords: Vec<String> = keywords.iter().map(|s| s.to_string()).collect();
        let state = HierarchyState::seeded(keywords.len(), root_id);
        Self { keywords, state }
    }

    /// Build the next section from a fragment and its heading.
    pub fn assemble(
        &mut self,
        heading: Option<&str>,
        nodes: &[HtmlNode],
        url: &str,
    ) -> Section {
        let raw = heading
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .unwrap_or(UNTITLED);
        let parsed = title::parse_heading(raw);
        let depth = hierarchy::classify(&parsed.label, &self.keywords).depth();
        let path = self.state.update(depth, &parsed.id);
        let content = fragments::strip_first_heading(&restructure::restructure(nodes));

        Section {
            id: parsed.id,
            title: parsed.title,
            label: parsed.label,
            content,
            path,
            url: url.to_string(),
        }
    }
}
