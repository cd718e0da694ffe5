//! SQLite storage of BHL names, pages and title abbreviations.
//!
//! [`SqliteStore`] implements the engine's [`Storage`] and [`TitleIndex`]
//! read interfaces. File-backed stores serve reads from a pool of read-only
//! connections so that stream workers do not wait on each other; in-memory
//! stores use their single connection.

pub mod db;
mod query;

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::{Connection, OpenFlags};
use thiserror::Error;

use bhlnames_core::db::{PartRecord, RawOccurrence, Storage, StorageError, TitleIndex};
use bhlnames_core::{abbr, stop_words};

// Re-export for convenience
pub use db::InsertBatch;

/// Abbreviations this short match too many unrelated titles.
const MIN_PATTERN_LEN: usize = 3;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("connection lock poisoned")]
    Poisoned,
}

impl From<StoreError> for StorageError {
    fn from(e: StoreError) -> Self {
        StorageError::Backend(e.to_string())
    }
}

/// Open a SQLite connection with WAL mode and standard pragmas.
fn open_sqlite(path: &Path, read_only: bool) -> Result<Connection, rusqlite::Error> {
    let flags = if read_only {
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX
    } else {
        OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX
    };
    let conn = Connection::open_with_flags(path, flags)?;
    if read_only {
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
    } else {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;
    }
    Ok(conn)
}

/// Pool of read-only connections to one database file.
///
/// Connections are returned to the pool after use. If the pool is empty, a
/// new connection is opened.
struct ReadPool {
    pool: Mutex<Vec<Connection>>,
    path: PathBuf,
}

impl ReadPool {
    fn new(path: &Path) -> Self {
        Self {
            pool: Mutex::new(Vec::new()),
            path: path.to_path_buf(),
        }
    }

    fn acquire(&self) -> Result<Connection, StoreError> {
        if let Ok(mut pool) = self.pool.lock()
            && let Some(conn) = pool.pop()
        {
            return Ok(conn);
        }
        Ok(open_sqlite(&self.path, true)?)
    }

    fn release(&self, conn: Connection) {
        if let Ok(mut pool) = self.pool.lock() {
            pool.push(conn);
        }
    }
}

/// Handle to a BHL names database.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    readers: Option<ReadPool>,
}

impl SqliteStore {
    /// Open (or create) a database file and make sure the schema exists.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = open_sqlite(path, false)?;
        db::init_database(&conn)?;
        let (titles, items, pages, occurrences) = db::get_counts(&conn)?;
        tracing::info!(
            path = %path.display(),
            titles,
            items,
            pages,
            occurrences,
            "opened BHL names database"
        );
        Ok(Self {
            conn: Mutex::new(conn),
            readers: Some(ReadPool::new(path)),
        })
    }

    /// A fresh database that lives in memory.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        db::init_database(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            readers: None,
        })
    }

    fn write<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        f(&conn)
    }

    fn read<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        match &self.readers {
            Some(readers) => {
                let conn = readers.acquire()?;
                let res = f(&conn);
                readers.release(conn);
                res
            }
            None => self.write(f),
        }
    }

    pub fn insert_batch(&self, batch: &InsertBatch) -> Result<(), StoreError> {
        self.write(|conn| db::insert_batch(conn, batch))
    }

    /// Recompute the abbreviation patterns of every title and replace the
    /// title index with them. Returns the number of (pattern, title) pairs.
    pub fn build_title_index(&self) -> Result<usize, StoreError> {
        let titles = self.read(query::all_titles)?;
        let stop = stop_words::stop_words();

        let mut rows = Vec::new();
        for (id, name) in &titles {
            let patterns: BTreeSet<String> = abbr::patterns(name, stop)
                .into_iter()
                .filter(|p| p.len() >= MIN_PATTERN_LEN)
                .collect();
            rows.extend(patterns.into_iter().map(|p| (p, *id)));
        }

        self.write(|conn| db::replace_abbr_titles(conn, &rows))?;
        tracing::info!(titles = titles.len(), patterns = rows.len(), "built title index");
        Ok(rows.len())
    }
}

impl Storage for SqliteStore {
    fn find_occurrences(
        &self,
        name_key: &str,
        by_accepted_name: bool,
    ) -> Result<Vec<RawOccurrence>, StorageError> {
        Ok(self.read(|conn| query::occurrences(conn, name_key, by_accepted_name))?)
    }

    fn find_parts_for_page(&self, page_id: i64) -> Result<Vec<PartRecord>, StorageError> {
        Ok(self.read(|conn| query::parts_for_page(conn, page_id))?)
    }

    fn find_current_name(&self, canonical: &str) -> Result<Option<String>, StorageError> {
        Ok(self.read(|conn| query::current_canonical(conn, canonical))?)
    }

    fn find_page(&self, page_id: i64) -> Result<Option<RawOccurrence>, StorageError> {
        Ok(self.read(|conn| query::page(conn, page_id))?)
    }
}

impl TitleIndex for SqliteStore {
    fn lookup(&self, patterns: &[String]) -> Result<HashMap<String, Vec<i64>>, StorageError> {
        Ok(self.read(|conn| query::titles_for_abbrs(conn, patterns))?)
    }

    fn all_patterns(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.read(query::all_abbrs)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::TitleRow;

    fn titles(store: &SqliteStore) {
        let mut batch = InsertBatch::new();
        for (id, name) in [
            (1, "Wiener entomologische Zeitung"),
            (2, "Annales de la Société entomologique de France"),
            (3, "Ent"),
        ] {
            batch.titles.push(TitleRow {
                id,
                name: name.into(),
                ..Default::default()
            });
        }
        store.insert_batch(&batch).unwrap();
    }

    #[test]
    fn title_index_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        titles(&store);
        let n = store.build_title_index().unwrap();
        assert!(n > 0);

        let all = store.all_patterns().unwrap();
        assert!(all.iter().all(|p| p.len() >= MIN_PATTERN_LEN), "{all:?}");
        assert!(all.contains(&"wez".to_string()), "{all:?}");

        let found = store.lookup(&["wez".to_string()]).unwrap();
        assert_eq!(found["wez"], vec![1]);

        // rebuilding does not duplicate rows
        assert_eq!(store.build_title_index().unwrap(), n);
    }

    #[test]
    fn file_store_reads_through_pool() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("bhl.db");
        let store = SqliteStore::open(&path).unwrap();
        titles(&store);
        store.build_title_index().unwrap();

        // two lookups reuse the pooled reader
        assert!(!store.all_patterns().unwrap().is_empty());
        assert!(!store.lookup(&["wez".to_string()]).unwrap().is_empty());
        assert!(store.find_occurrences("Aus bus", false).unwrap().is_empty());

        drop(store);
        let reopened = SqliteStore::open(&path).unwrap();
        assert!(!reopened.all_patterns().unwrap().is_empty());
    }

    #[test]
    fn store_errors_become_backend_errors() {
        let e: StorageError = StoreError::Poisoned.into();
        assert!(matches!(e, StorageError::Backend(_)));
    }
}
