//! In-memory storage and title index for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{PartRecord, RawOccurrence, Storage, StorageError, TitleIndex};

/// A hand-rolled mock implementing [`Storage`].
///
/// Supports:
/// - Occurrences keyed by matched canonical or by accepted canonical.
/// - Parts and pages keyed by page ID.
/// - Failing every occurrence lookup for a given name.
/// - Failing every accepted-name lookup.
/// - Optional per-call latency.
/// - Call counting via [`call_count()`](MockStorage::call_count).
#[derive(Default)]
pub struct MockStorage {
    by_name: HashMap<String, Vec<RawOccurrence>>,
    by_accepted: HashMap<String, Vec<RawOccurrence>>,
    parts: HashMap<i64, Vec<PartRecord>>,
    pages: HashMap<i64, RawOccurrence>,
    current: HashMap<String, String>,
    failing: Vec<String>,
    failing_current: bool,
    delay: Option<Duration>,
    call_count: AtomicUsize,
}

impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register occurrences found by the matched canonical `name`.
    pub fn with_occurrences(mut self, name: &str, rows: Vec<RawOccurrence>) -> Self {
        self.by_name.entry(name.to_string()).or_default().extend(rows);
        self
    }

    /// Register occurrences found by the accepted canonical `name`.
    pub fn with_taxon_occurrences(mut self, name: &str, rows: Vec<RawOccurrence>) -> Self {
        self.by_accepted
            .entry(name.to_string())
            .or_default()
            .extend(rows);
        self
    }

    pub fn with_part(mut self, page_id: i64, part: PartRecord) -> Self {
        self.parts.entry(page_id).or_default().push(part);
        self
    }

    /// Register a page with its item and title data. Name fields are ignored.
    pub fn with_page(mut self, page: RawOccurrence) -> Self {
        self.pages.insert(page.page_id, page);
        self
    }

    pub fn with_current_name(mut self, canonical: &str, current: &str) -> Self {
        self.current
            .insert(canonical.to_string(), current.to_string());
        self
    }

    /// Make occurrence lookups for `name` fail.
    pub fn failing_for(mut self, name: &str) -> Self {
        self.failing.push(name.to_string());
        self
    }

    /// Make every accepted-name lookup fail.
    pub fn failing_current_name(mut self) -> Self {
        self.failing_current = true;
        self
    }

    /// Set simulated latency per occurrence lookup.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// How many times `find_occurrences()` has been called.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    fn is_failing(&self, name: &str) -> bool {
        self.failing.iter().any(|n| n == name)
    }
}

impl Storage for MockStorage {
    fn find_occurrences(
        &self,
        name_key: &str,
        by_accepted_name: bool,
    ) -> Result<Vec<RawOccurrence>, StorageError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Some(d) = self.delay {
            std::thread::sleep(d);
        }
        if self.is_failing(name_key) {
            return Err(StorageError::Backend(format!(
                "simulated failure for '{name_key}'"
            )));
        }
        let map = if by_accepted_name {
            &self.by_accepted
        } else {
            &self.by_name
        };
        Ok(map.get(name_key).cloned().unwrap_or_default())
    }

    fn find_parts_for_page(&self, page_id: i64) -> Result<Vec<PartRecord>, StorageError> {
        Ok(self.parts.get(&page_id).cloned().unwrap_or_default())
    }

    fn find_current_name(&self, canonical: &str) -> Result<Option<String>, StorageError> {
        if self.failing_current {
            return Err(StorageError::Backend(format!(
                "simulated failure for current name of '{canonical}'"
            )));
        }
        Ok(self.current.get(canonical).cloned())
    }

    fn find_page(&self, page_id: i64) -> Result<Option<RawOccurrence>, StorageError> {
        Ok(self.pages.get(&page_id).cloned())
    }
}

/// A title index backed by a plain map.
#[derive(Default)]
pub struct MockTitleIndex {
    index: HashMap<String, Vec<i64>>,
}

impl MockTitleIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every pattern of `title` under `title_id`.
    pub fn with_title(mut self, title_id: i64, title: &str) -> Self {
        for pattern in crate::abbr::patterns(title, crate::stop_words::stop_words()) {
            if pattern.len() > 2 {
                self.index.entry(pattern).or_default().push(title_id);
            }
        }
        self
    }
}

impl TitleIndex for MockTitleIndex {
    fn lookup(&self, patterns: &[String]) -> Result<HashMap<String, Vec<i64>>, StorageError> {
        Ok(patterns
            .iter()
            .filter_map(|p| self.index.get(p).map(|ids| (p.clone(), ids.clone())))
            .collect())
    }

    fn all_patterns(&self) -> Result<Vec<String>, StorageError> {
        let mut res: Vec<String> = self.index.keys().cloned().collect();
        res.sort();
        Ok(res)
    }
}
