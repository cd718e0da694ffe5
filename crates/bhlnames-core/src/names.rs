//! Minimal parser for scientific names.
//!
//! Only the parts the engine needs are extracted: the simple canonical form
//! (genus and epithets without ranks or subgenus), the authorship, the year of
//! the authorship and the cardinality (1 for uninomials, 2 for binomials,
//! 3 for trinomials).

use once_cell::sync::Lazy;
use regex::Regex;

/// Result of parsing a name-string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedName {
    pub canonical: String,
    pub authors: String,
    pub year: Option<i32>,
    pub cardinality: u8,
}

static GENUS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z][a-zë]+$").unwrap());
static EPITHET_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zë][a-zë-]+$").unwrap());
static SUBGENUS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\([A-Z][a-zë]+\)$").unwrap());
static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(1[5-9]\d\d|20\d\d)\b").unwrap());
static VIRUS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(virus|viroid|phage|satellite)\b").unwrap());

const RANKS: &[&str] = &[
    "var.", "var", "subsp.", "subsp", "ssp.", "ssp", "f.", "forma", "subvar.", "morph.", "nothosubsp.",
];

const HYBRID_SIGNS: &[&str] = &["×", "x"];

/// Lower-case words that start an authorship ("de Vries", "van der Wulp").
const AUTHOR_PARTICLES: &[&str] = &[
    "da", "dal", "de", "degli", "dei", "del", "della", "den", "der", "des", "di", "do", "dos",
    "du", "el", "et", "ex", "in", "la", "le", "van", "von", "zu", "zum", "zur",
];

/// Parse a name-string. Returns `None` when the string does not look like a
/// scientific name of an organism.
pub fn parse(name: &str) -> Option<ParsedName> {
    let name = name.trim();
    if name.is_empty() || VIRUS_RE.is_match(name) {
        return None;
    }

    let mut words = name.split_whitespace().peekable();
    let genus = words.next()?;
    if !GENUS_RE.is_match(genus) {
        return None;
    }

    let mut canonical = vec![genus.to_string()];
    let mut rest: Vec<&str> = Vec::new();
    let mut in_authorship = false;

    while let Some(word) = words.next() {
        if in_authorship {
            rest.push(word);
            continue;
        }
        if canonical.len() == 1 && SUBGENUS_RE.is_match(word) {
            continue;
        }
        if HYBRID_SIGNS.contains(&word) {
            continue;
        }
        if canonical.len() >= 2 && RANKS.contains(&word) {
            // a rank marker is meaningful only when followed by an epithet
            if words.peek().is_some_and(|w| EPITHET_RE.is_match(w)) {
                continue;
            }
        }
        if canonical.len() < 3
            && EPITHET_RE.is_match(word)
            && !AUTHOR_PARTICLES.contains(&word)
        {
            canonical.push(word.to_string());
            continue;
        }
        in_authorship = true;
        rest.push(word);
    }

    let authors = authorship(&rest.join(" "));
    let year = YEAR_RE
        .find_iter(&rest.join(" "))
        .last()
        .and_then(|m| m.as_str().parse().ok());

    Some(ParsedName {
        cardinality: canonical.len() as u8,
        canonical: canonical.join(" "),
        authors,
        year,
    })
}

/// Cardinality of a name, 0 if it cannot be parsed.
pub fn cardinality(name: &str) -> u8 {
    parse(name).map_or(0, |p| p.cardinality)
}

/// Author names without years, brackets and trailing punctuation.
fn authorship(raw: &str) -> String {
    let without_years = YEAR_RE.replace_all(raw, "");
    without_years
        .split(|c: char| c == '(' || c == ')' || c == ',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
