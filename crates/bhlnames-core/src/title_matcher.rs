//! Links a free-text citation to BHL titles.
//!
//! The citation is abbreviated the same way titles are, and the abbreviation
//! is scanned with an Aho-Corasick automaton built from every abbreviation in
//! the title index. Every pattern found inside the citation abbreviation is
//! then resolved to the titles that produced it.

use std::collections::HashMap;
use std::sync::Arc;

use aho_corasick::AhoCorasick;

use crate::abbr;
use crate::db::TitleIndex;
use crate::CoreError;

pub struct TitleMatcher {
    index: Arc<dyn TitleIndex>,
    patterns: Vec<String>,
    automaton: Option<AhoCorasick>,
}

impl TitleMatcher {
    /// Load every pattern from `index` and build the search automaton.
    pub fn new(index: Arc<dyn TitleIndex>) -> Result<Self, CoreError> {
        let patterns = index
            .all_patterns()
            .map_err(|e| CoreError::TitleIndex(e.to_string()))?;

        let automaton = if patterns.is_empty() {
            tracing::warn!("title index is empty, citations will not match any title");
            None
        } else {
            let ac = AhoCorasick::new(&patterns)
                .map_err(|e| CoreError::TitleIndex(format!("cannot build automaton: {e}")))?;
            tracing::info!(patterns = patterns.len(), "built title search automaton");
            Some(ac)
        };

        Ok(Self {
            index,
            patterns,
            automaton,
        })
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    /// Titles the citation could refer to, each with the patterns that matched
    /// it, longest first. Titles without a match are absent.
    pub fn match_titles(&self, citation: &str) -> Result<HashMap<i64, Vec<String>>, CoreError> {
        let Some(ac) = &self.automaton else {
            return Ok(HashMap::new());
        };

        let citation_abbr = abbr::abbreviate(citation);
        let mut found: Vec<String> = ac
            .find_overlapping_iter(&citation_abbr)
            .map(|m| self.patterns[m.pattern().as_usize()].clone())
            .collect();
        found.sort();
        found.dedup();
        if found.is_empty() {
            return Ok(HashMap::new());
        }
        tracing::debug!(abbr = %citation_abbr, matches = found.len(), "citation abbreviation matched");

        let ids = self
            .index
            .lookup(&found)
            .map_err(|e| CoreError::TitleIndex(e.to_string()))?;

        let mut res: HashMap<i64, Vec<String>> = HashMap::new();
        for (pattern, title_ids) in ids {
            for id in title_ids {
                res.entry(id).or_default().push(pattern.clone());
            }
        }
        for matched in res.values_mut() {
            matched.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
            matched.dedup();
        }
        Ok(res)
    }
}

/// Title score and label from the length of the longest matched pattern.
pub fn title_score(matched: Option<&Vec<String>>) -> (u8, &'static str) {
    let longest = matched.and_then(|m| m.first()).map_or(0, |p| p.len());
    match longest {
        0 => (0, "none"),
        8.. => (3, "long"),
        5..=7 => (2, "medium"),
        _ => (1, "short"),
    }
}
