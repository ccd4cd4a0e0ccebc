//! Hierarchy level classification and ancestry tracking.
//!
//! Depths are zero-based indices into the configured keyword list
//! (0 = shallowest). One `HierarchyState` spans all pages of a document;
//! fragments must be fed in source order.

/// Outcome of classifying a heading label against the keyword list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelMatch {
    /// A configured keyword matched; the depth is its index.
    Matched(usize),
    /// No configured keyword matched; the depth comes from the heuristic
    /// token rules (or the deepest configured index when those miss too).
    Fallback(usize),
}

impl LevelMatch {
    pub fn depth(self) -> usize {
        match self {
            LevelMatch::Matched(d) | LevelMatch::Fallback(d) => d,
        }
    }
}

struct FallbackRule {
    tokens: &'static [&'static str],
    depth: usize,
}

/// Heuristic token rules, evaluated in priority order. First hit wins, even
/// for compound labels that would also match a later rule.
const FALLBACK_RULES: &[FallbackRule] = &[
    FallbackRule { tokens: &["appendix", "part"], depth: 0 },
    FallbackRule { tokens: &["chapter", "ch."], depth: 1 },
    FallbackRule { tokens: &["article", "art."], depth: 2 },
    FallbackRule { tokens: &["sec", "\u{a7}"], depth: 3 },
];

/// Map a heading label to a nesting depth.
///
/// Case-insensitive substring match of each configured keyword, in keyword
/// order. When none match, the fallback rules assign a best-effort depth,
/// clamped into the configured range. Always returns a valid index.
pub fn classify(label: &str, keywords: &[String]) -> LevelMatch {
    let lower = label.to_lowercase();

    for (i, keyword) in keywords.iter().enumerate() {
        if lower.contains(&keyword.to_lowercase()) {
            return LevelMatch::Matched(i);
        }
    }

    let deepest = keywords.len().saturating_sub(1);
    for rule in FALLBACK_RULES {
        if rule.tokens.iter().any(|t| lower.contains(t)) {
            return LevelMatch::Fallback(rule.depth.min(deepest));
        }
    }
    LevelMatch::Fallback(deepest)
}

/// Current ancestry: one slot per configured depth, holding the id of the
/// most recent section seen at that depth.
#[derive(Debug, Clone)]
pub struct HierarchyState {
    slots: Vec<Option<String>>,
}

impl HierarchyState {
    pub fn new(depth_count: usize) -> Self {
        Self {
            slots: vec![None; depth_count],
        }
    }

    /// State with slot 0 pre-populated, for sub-page streams that begin
    /// mid-hierarchy (the document id stands in for the unseen root heading).
    pub fn seeded(depth_count: usize, root_id: &str) -> Self {
        let mut state = Self::new(depth_count);
        if let Some(slot) = state.slots.first_mut() {
            *slot = Some(root_id.to_string());
        }
        state
    }

    /// Record a section at `depth` and return its path.
    ///
    /// Sets the slot, clears every deeper slot (a path can never keep a stale
    /// descendant of an earlier sibling), and returns all set ids from the
    /// root down to `depth`, ending with `id`. An out-of-range depth leaves
    /// the state untouched and returns a detached single-node path.
    pub fn update(&mut self, depth: usize, id: &str) -> Vec<String> {
        if depth >= self.slots.len() {
            return vec![id.to_string()];
        }

        self.slots[depth] = Some(id.to_string());
        for slot in &mut self.slots[depth + 1..] {
            *slot = None;
        }
        self.slots[..=depth].iter().flatten().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keywords() -> Vec<String> {
        ["Chapter", "Article", "Sec"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn keyword_match_returns_index() {
        let kw = keywords();
        assert_eq!(classify("Chapter 22", &kw), LevelMatch::Matched(0));
        assert_eq!(classify("Article II", &kw), LevelMatch::Matched(1));
        assert_eq!(classify("Sec. 22-14.", &kw), LevelMatch::Matched(2));
    }

    #[test]
    fn keyword_match_is_case_insensitive() {
        let kw = keywords();
        assert_eq!(classify("CHAPTER 1", &kw), LevelMatch::Matched(0));
        assert_eq!(classify("article iv", &kw), LevelMatch::Matched(1));
    }

    #[test]
    fn first_keyword_in_order_wins() {
        // "Chapter" is checked before "Article".
        let kw = keywords();
        assert_eq!(classify("Chapter 3, Article I", &kw), LevelMatch::Matched(0));
    }

    #[test]
    fn fallback_tokens_assign_depths() {
        let kw: Vec<String> = ["Title", "Division", "Unit", "Rule", "Item"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(classify("Appendix A", &kw), LevelMatch::Fallback(0));
        assert_eq!(classify("Part Two", &kw), LevelMatch::Fallback(0));
        assert_eq!(classify("Chapter 4", &kw), LevelMatch::Fallback(1));
        assert_eq!(classify("Article VI", &kw), LevelMatch::Fallback(2));
        assert_eq!(classify("\u{a7} 12-3", &kw), LevelMatch::Fallback(3));
    }

    #[test]
    fn fallback_depth_clamped_to_configured_range() {
        let kw: Vec<String> = vec!["Chapter".to_string(), "Rule".to_string()];
        // Section-like token wants depth 3, only indices 0..=1 exist.
        assert_eq!(classify("\u{a7} 5", &kw), LevelMatch::Fallback(1));
        let one: Vec<String> = vec!["Title".to_string()];
        assert_eq!(classify("Chapter 9", &one), LevelMatch::Fallback(0));
    }

    #[test]
    fn fallback_priority_order_for_compound_labels() {
        let kw: Vec<String> = ["Title", "Division", "Unit", "Rule"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        // Appendix rule outranks the chapter rule.
        assert_eq!(classify("Appendix A, Chapter 1", &kw), LevelMatch::Fallback(0));
    }

    #[test]
    fn exhausted_fallback_returns_deepest() {
        let kw = keywords();
        assert_eq!(classify("Miscellaneous", &kw), LevelMatch::Fallback(2));
        assert_eq!(classify("", &kw), LevelMatch::Fallback(2));
    }

    #[test]
    fn classify_is_pure() {
        let kw = keywords();
        let first = classify("Article II", &kw);
        for _ in 0..3 {
            assert_eq!(classify("Article II", &kw), first);
        }
    }

    #[test]
    fn update_builds_nested_paths() {
        let mut state = HierarchyState::new(3);
        assert_eq!(state.update(0, "chapter-22"), ["chapter-22"]);
        assert_eq!(state.update(1, "article-ii"), ["chapter-22", "article-ii"]);
        assert_eq!(
            state.update(2, "sec-22-14"),
            ["chapter-22", "article-ii", "sec-22-14"]
        );
    }

    #[test]
    fn sibling_section_replaces_only_its_own_slot() {
        let mut state = HierarchyState::new(3);
        state.update(0, "chapter-22");
        state.update(1, "article-ii");
        state.update(2, "sec-22-14");
        assert_eq!(
            state.update(2, "sec-22-15"),
            ["chapter-22", "article-ii", "sec-22-15"]
        );
    }

    #[test]
    fn shallower_update_clears_deeper_slots() {
        let mut state = HierarchyState::new(3);
        state.update(0, "chapter-22");
        state.update(1, "article-i");
        state.update(2, "sec-22-1");
        state.update(1, "article-ii");
        for slot in &state.slots[2..] {
            assert!(slot.is_none());
        }
        // No leakage of sec-22-1 under the new article.
        assert_eq!(
            state.update(2, "sec-22-40"),
            ["chapter-22", "article-ii", "sec-22-40"]
        );
    }

    #[test]
    fn unset_ancestors_are_skipped() {
        let mut state = HierarchyState::new(3);
        // Stream starts at article depth with no chapter seen.
        assert_eq!(state.update(1, "article-i"), ["article-i"]);
        assert_eq!(state.update(2, "sec-1"), ["article-i", "sec-1"]);
    }

    #[test]
    fn out_of_range_depth_is_detached_and_non_mutating() {
        let mut state = HierarchyState::new(2);
        state.update(0, "chapter-1");
        let path = state.update(5, "stray");
        assert_eq!(path, ["stray"]);
        assert_eq!(state.slots[0].as_deref(), Some("chapter-1"));
        assert!(state.slots[1].is_none());
        // Subsequent updates see the untouched state.
        assert_eq!(state.update(1, "sec-2"), ["chapter-1", "sec-2"]);
    }

    #[test]
    fn seeded_state_prepopulates_root_slot() {
        let mut state = HierarchyState::seeded(3, "chapter-22");
        assert_eq!(
            state.update(1, "article-ii"),
            ["chapter-22", "article-ii"]
        );
    }

    #[test]
    fn zero_depth_state_degrades_every_update() {
        let mut state = HierarchyState::new(0);
        assert_eq!(state.update(0, "anything"), ["anything"]);
    }
}
