//! Matching, scoring and ranking engine for scientific names in the
//! Biodiversity Heritage Library (BHL).
//!
//! Given a name and an optional bibliographic citation, the engine finds every
//! page where the name occurs, collapses those occurrences into one candidate
//! per item or part, scores each candidate against the citation and converts
//! the scores into odds that the candidate is the nomenclatural event.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

pub mod abbr;
pub mod bayes;
pub mod config_file;
pub mod db;
pub mod engine;
pub mod input;
pub mod loader;
pub mod names;
pub mod resolver;
pub mod score;
pub mod stop_words;
pub mod stream;
pub mod text_utils;
pub mod title_matcher;

// Re-export for convenience
pub use bayes::{NaiveBayes, OddsDetail};
pub use db::{PartRecord, RawOccurrence, Storage, StorageError, TitleIndex};
pub use engine::Engine;
pub use input::{Input, InputBuilder};
pub use score::{Criterion, Precedence, Score};
pub use stream::{StreamOutcome, name_refs_stream};
pub use title_matcher::TitleMatcher;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("cannot parse name '{0}'")]
    UnparseableName(String),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("title index error: {0}")]
    TitleIndex(String),
    #[error("bayes model error: {0}")]
    Model(String),
    #[error("invalid precedence: {0}")]
    InvalidPrecedence(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("worker task failed: {0}")]
    Task(String),
}

/// Where the aggregate year of a reference came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum YearType {
    Part,
    Title,
    Item,
    #[default]
    #[serde(rename = "N/A")]
    NotAvailable,
}

impl YearType {
    pub fn as_str(&self) -> &'static str {
        match self {
            YearType::Part => "Part",
            YearType::Title => "Title",
            YearType::Item => "Item",
            YearType::NotAvailable => "N/A",
        }
    }
}

impl std::fmt::Display for YearType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A distinct entity inside an item, usually one scientific paper.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Part {
    pub id: i64,
    /// Page range of the part, `start-end` or `start-?`.
    pub pages: String,
    pub year: i32,
    pub name: String,
    pub doi: String,
}

impl Part {
    pub fn is_empty(&self) -> bool {
        self.id == 0
    }
}

/// Taxonomic statistics of an item. They hint at which groups of organisms
/// the volume is about.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ItemStats {
    pub main_taxon: String,
    pub main_kingdom: String,
    pub main_kingdom_percent: i32,
    pub names_total: i32,
}

/// Name that was found on a page, together with the queried name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NameData {
    /// Name-string as it was found on the page.
    pub name: String,
    /// Canonical form of the name found on the page.
    pub matched_name: String,
    pub edit_distance: i32,
    /// Nomenclatural annotation found near the name (e.g. `SP_NOV`).
    pub annot_nomen: String,
}

/// Corpus location of a candidate reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Reference {
    /// Most precise year available, see [`YearType`].
    pub year_aggr: Option<i32>,
    pub year_type: YearType,
    pub title_id: i64,
    pub title_name: String,
    pub title_doi: String,
    pub title_year_start: i32,
    pub title_year_end: i32,
    pub item_id: i64,
    pub volume: String,
    pub item_year_start: i32,
    pub item_year_end: i32,
    pub page_id: i64,
    /// Page number printed on the page, 0 if unknown.
    pub page_num: i32,
    pub url: String,
    pub part: Part,
    pub item_stats: ItemStats,
}

impl Reference {
    /// Aggregate year or 0 when it is unknown. Used for sorting.
    pub fn year_or_zero(&self) -> i32 {
        self.year_aggr.unwrap_or(0)
    }
}

/// One resolved candidate: a corpus location, the name found there and its score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceName {
    pub reference: Reference,
    pub name: NameData,
    /// 0..=5 estimate of match quality, set only when a citation was given.
    pub ref_match_quality: u8,
    pub score: Score,
}

/// Result of a single query.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RefsByName {
    pub input: Input,
    pub canonical: String,
    pub current_canonical: String,
    /// Other names of the taxon, filled only by taxon searches.
    pub synonyms: Vec<String>,
    /// Number of references before `refs_limit` was applied.
    pub reference_number: usize,
    pub references: Vec<ReferenceName>,
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Number of concurrent workers for streamed queries.
    pub jobs_num: usize,
    /// Sort resolved references from latest to earliest year.
    pub sort_desc: bool,
    /// Maximum number of references per name (0 means no limit).
    pub refs_limit: usize,
    /// Path to the SQLite database with BHL data.
    pub db_path: Option<PathBuf>,
    /// Path to a JSON file with trained Bayes weights. The embedded model is
    /// used when it is not set.
    pub model_path: Option<PathBuf>,
    pub precedence: Precedence,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            jobs_num: 4,
            sort_desc: false,
            refs_limit: 0,
            db_path: None,
            model_path: None,
            precedence: Precedence::default(),
        }
    }
}

/// Convert odds into a coarse 0..=5 match quality.
pub fn match_quality(odds: f64) -> u8 {
    if odds <= 0.0 {
        0
    } else if odds < 0.01 {
        1
    } else if odds < 0.1 {
        2
    } else if odds < 1.0 {
        3
    } else if odds < 10.0 {
        4
    } else {
        5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_quality_thresholds() {
        let cases = [
            (0.0, 0),
            (-1.0, 0),
            (0.001, 1),
            (0.05, 2),
            (0.5, 3),
            (5.0, 4),
            (10.0, 5),
            (1000.0, 5),
        ];
        for (odds, quality) in cases {
            assert_eq!(match_quality(odds), quality, "odds {odds}");
        }
    }

    #[test]
    fn year_type_labels() {
        assert_eq!(YearType::Part.to_string(), "Part");
        assert_eq!(YearType::NotAvailable.to_string(), "N/A");
    }
}
