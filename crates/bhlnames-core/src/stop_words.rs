//! Words that are often dropped from abbreviated journal titles.
//!
//! The dictionary is embedded and parsed once; callers get a shared read-only set.

use std::collections::HashSet;

use once_cell::sync::Lazy;

use crate::text_utils::to_ascii;

static STOP_WORDS_TXT: &str = include_str!("../data/stop_words.txt");

static STOP_WORDS: Lazy<HashSet<String>> = Lazy::new(|| {
    let words = parse(STOP_WORDS_TXT);
    tracing::debug!(count = words.len(), "loaded stop words");
    words
});

/// The embedded stop-word set.
pub fn stop_words() -> &'static HashSet<String> {
    &STOP_WORDS
}

/// Parse a newline separated word list. Words are lowercased with diacritics
/// stripped; blank lines and `#` comments are skipped.
pub fn parse(text: &str) -> HashSet<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(|l| to_ascii(l).to_lowercase())
        .collect()
}
