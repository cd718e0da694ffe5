//! Title abbreviations used to link free-text citations to BHL titles.
//!
//! A title such as "Journal of the Linnean Society" is reduced to the first
//! letters of its words (`"jotls"`), and to the first letters of its
//! significant words (`"jls"`). Both strings, together with a few shorter
//! prefixes, become patterns for a multi-pattern search over the abbreviated
//! citation.

use std::collections::{BTreeSet, HashSet};

use crate::text_utils::{clean_token, split_any, to_ascii};

/// Maximum length of an abbreviation used as an index key.
pub const MAX_ABBR_LEN: usize = 10;

/// Number of right-truncated derivatives produced by [`derive`].
const MAX_DERIVATIVES: usize = 3;

/// Derivatives are not made shorter than this.
const MIN_DERIVATIVE_LEN: usize = 4;

const SEPARATORS: &str = " .-'";

/// Abbreviate every word of `text`.
///
/// `"Annales du Muséum national d'histoire naturelle."` becomes `"admndhn"`.
pub fn abbreviate(text: &str) -> String {
    abbr(text, None)
}

/// Abbreviate `text`, skipping words from `stop_words`.
///
/// `"Annales du Muséum national d'histoire naturelle."` becomes `"amnhn"`.
pub fn abbreviate_filtered(text: &str, stop_words: &HashSet<String>) -> String {
    abbr(text, Some(stop_words))
}

/// The abbreviation itself followed by up to three right-truncated versions.
/// Truncation stops once the string is 4 characters long.
pub fn derive(abbr: &str) -> Vec<String> {
    let mut res = vec![abbr.to_string()];
    let mut current = abbr.to_string();
    while current.chars().count() > MIN_DERIVATIVE_LEN && res.len() <= MAX_DERIVATIVES {
        current.pop();
        res.push(current.clone());
    }
    res
}

/// All abbreviation patterns of a title, longest first, then alphabetical.
pub fn patterns(text: &str, stop_words: &HashSet<String>) -> Vec<String> {
    let full = truncate(abbreviate(text));
    let filtered = truncate(abbreviate_filtered(text, stop_words));

    let mut derived = derive(&full);
    if full != filtered {
        let unique: BTreeSet<String> = derived.into_iter().chain(derive(&filtered)).collect();
        derived = unique.into_iter().collect();
    }
    derived.retain(|p| !p.is_empty());
    derived.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    derived
}

fn truncate(mut abbr: String) -> String {
    // abbreviations are ASCII, so byte truncation is safe
    abbr.truncate(MAX_ABBR_LEN);
    abbr
}

fn abbr(text: &str, stop_words: Option<&HashSet<String>>) -> String {
    let mut res = String::new();
    for field in split_any(text, SEPARATORS) {
        for token in field.split_whitespace() {
            let word = to_ascii(clean_token(token)).to_lowercase();
            if word.is_empty() {
                continue;
            }
            if let Some(stop_words) = stop_words
                && stop_words.contains(&word)
            {
                continue;
            }
            if let Some(c) = first_letter(&word) {
                res.push(c);
            }
        }
    }
    res
}

fn first_letter(word: &str) -> Option<char> {
    if word == "and" {
        return Some('&');
    }
    word.chars()
        .find(|c| c.is_ascii_alphabetic() || *c == '&')
        .map(|c| c.to_ascii_lowercase())
}
