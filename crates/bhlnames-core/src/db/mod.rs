//! Read interfaces to the BHL data the engine works with.
//!
//! The engine never writes through these traits. Implementations must be safe
//! for concurrent read-only use from several workers.

pub mod mock;

use std::collections::HashMap;

use thiserror::Error;

/// Failure of a storage or title index collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("storage backend failed: {0}")]
    Backend(String),
    #[error("not found: {0}")]
    NotFound(String),
}

/// One name occurrence on one page, joined with page, item and title data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawOccurrence {
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
    /// Page number printed on the page, 0 if it could not be parsed.
    pub page_num: i32,
    /// Name-string as it was found in the text.
    pub name_string: String,
    /// Canonical form of the name found in the text.
    pub matched_canonical: String,
    pub edit_distance: i32,
    /// Nomenclatural annotation near the name, `NO_ANNOT` by default.
    pub annotation: String,
    pub main_taxon: String,
    pub main_kingdom: String,
    pub main_kingdom_percent: i32,
    pub names_total: i32,
}

/// A part (usually a scientific paper) that contains a page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartRecord {
    pub id: i64,
    pub title: String,
    pub doi: String,
    pub page_num_start: i32,
    pub page_num_end: i32,
    pub year: i32,
}

/// Relational data about names, pages, items and titles.
pub trait Storage: Send + Sync {
    /// All occurrences of a name. With `by_accepted_name` the key is the
    /// currently accepted canonical, so occurrences of every synonym are
    /// returned.
    fn find_occurrences(
        &self,
        name_key: &str,
        by_accepted_name: bool,
    ) -> Result<Vec<RawOccurrence>, StorageError>;

    /// Parts that include the page. Usually zero or one.
    fn find_parts_for_page(&self, page_id: i64) -> Result<Vec<PartRecord>, StorageError>;

    /// Currently accepted canonical for a matched canonical, `None` if the
    /// name is not known to the taxonomic backbone.
    fn find_current_name(&self, canonical: &str) -> Result<Option<String>, StorageError>;

    /// Page, item and title data of one page, `None` for an unknown page.
    /// Name fields of the returned record are empty.
    fn find_page(&self, page_id: i64) -> Result<Option<RawOccurrence>, StorageError>;
}

/// Mapping from title abbreviations to BHL title IDs.
pub trait TitleIndex: Send + Sync {
    /// Title IDs for every given pattern that is present in the index.
    fn lookup(&self, patterns: &[String]) -> Result<HashMap<String, Vec<i64>>, StorageError>;

    /// Every abbreviation in the index. Used to build the search automaton.
    fn all_patterns(&self) -> Result<Vec<String>, StorageError>;
}
