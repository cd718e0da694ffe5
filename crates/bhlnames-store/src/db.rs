//! Schema and write operations of the BHL names database.

use rusqlite::{Connection, params};

use bhlnames_core::PartRecord;

use crate::StoreError;

/// Create every table and index if they do not exist yet.
pub fn init_database(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS titles (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            doi TEXT,
            year_start INTEGER,
            year_end INTEGER
        );

        CREATE TABLE IF NOT EXISTS items (
            id INTEGER PRIMARY KEY,
            title_id INTEGER NOT NULL,
            vol TEXT,
            year_start INTEGER,
            year_end INTEGER
        );

        CREATE TABLE IF NOT EXISTS item_stats (
            id INTEGER PRIMARY KEY,
            main_taxon TEXT,
            main_kingdom TEXT,
            main_kingdom_percent INTEGER,
            names_total INTEGER
        );

        CREATE TABLE IF NOT EXISTS pages (
            id INTEGER PRIMARY KEY,
            item_id INTEGER NOT NULL,
            page_num INTEGER
        );

        CREATE TABLE IF NOT EXISTS parts (
            id INTEGER PRIMARY KEY,
            title TEXT,
            doi TEXT,
            page_num_start INTEGER,
            page_num_end INTEGER,
            year INTEGER
        );

        CREATE TABLE IF NOT EXISTS page_parts (
            page_id INTEGER NOT NULL,
            part_id INTEGER NOT NULL,
            PRIMARY KEY (page_id, part_id)
        );

        CREATE TABLE IF NOT EXISTS name_strings (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            matched_canonical TEXT,
            current_canonical TEXT,
            edit_distance INTEGER
        );

        CREATE TABLE IF NOT EXISTS name_occurrences (
            page_id INTEGER NOT NULL,
            name_string_id TEXT NOT NULL,
            annot_nomen TEXT NOT NULL DEFAULT 'NO_ANNOT',
            PRIMARY KEY (page_id, name_string_id)
        );

        CREATE TABLE IF NOT EXISTS abbr_titles (
            abbr TEXT NOT NULL,
            title_id INTEGER NOT NULL,
            PRIMARY KEY (abbr, title_id)
        );

        CREATE INDEX IF NOT EXISTS idx_items_title ON items(title_id);
        CREATE INDEX IF NOT EXISTS idx_pages_item ON pages(item_id);
        CREATE INDEX IF NOT EXISTS idx_ns_matched ON name_strings(matched_canonical);
        CREATE INDEX IF NOT EXISTS idx_ns_current ON name_strings(current_canonical);
        CREATE INDEX IF NOT EXISTS idx_occ_name ON name_occurrences(name_string_id);
        "#,
    )?;
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct TitleRow {
    pub id: i64,
    pub name: String,
    pub doi: String,
    pub year_start: i32,
    pub year_end: i32,
}

#[derive(Debug, Clone, Default)]
pub struct ItemRow {
    pub id: i64,
    pub title_id: i64,
    pub vol: String,
    pub year_start: i32,
    pub year_end: i32,
}

#[derive(Debug, Clone, Default)]
pub struct ItemStatsRow {
    pub item_id: i64,
    pub main_taxon: String,
    pub main_kingdom: String,
    pub main_kingdom_percent: i32,
    pub names_total: i32,
}

#[derive(Debug, Clone, Default)]
pub struct PageRow {
    pub id: i64,
    pub item_id: i64,
    /// `None` when the printed page number could not be parsed.
    pub page_num: Option<i32>,
}

#[derive(Debug, Clone, Default)]
pub struct NameStringRow {
    pub id: String,
    pub name: String,
    pub matched_canonical: String,
    pub current_canonical: Option<String>,
    pub edit_distance: i32,
}

#[derive(Debug, Clone)]
pub struct OccurrenceRow {
    pub page_id: i64,
    pub name_string_id: String,
    pub annot_nomen: String,
}

impl Default for OccurrenceRow {
    fn default() -> Self {
        Self {
            page_id: 0,
            name_string_id: String::new(),
            annot_nomen: "NO_ANNOT".to_string(),
        }
    }
}

/// Batch of rows to write in one transaction.
#[derive(Default)]
pub struct InsertBatch {
    pub titles: Vec<TitleRow>,
    pub items: Vec<ItemRow>,
    pub item_stats: Vec<ItemStatsRow>,
    pub pages: Vec<PageRow>,
    pub parts: Vec<PartRecord>,
    pub page_parts: Vec<(i64, i64)>, // (page_id, part_id)
    pub name_strings: Vec<NameStringRow>,
    pub occurrences: Vec<OccurrenceRow>,
}

impl InsertBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.titles.len()
            + self.items.len()
            + self.item_stats.len()
            + self.pages.len()
            + self.parts.len()
            + self.page_parts.len()
            + self.name_strings.len()
            + self.occurrences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Insert a batch of rows, replacing rows with the same key.
pub fn insert_batch(conn: &Connection, batch: &InsertBatch) -> Result<(), StoreError> {
    let tx = conn.unchecked_transaction()?;

    {
        let mut stmt = tx.prepare_cached(
            "INSERT OR REPLACE INTO titles (id, name, doi, year_start, year_end) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for t in &batch.titles {
            stmt.execute(params![t.id, t.name, t.doi, t.year_start, t.year_end])?;
        }
    }

    {
        let mut stmt = tx.prepare_cached(
            "INSERT OR REPLACE INTO items (id, title_id, vol, year_start, year_end) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for i in &batch.items {
            stmt.execute(params![i.id, i.title_id, i.vol, i.year_start, i.year_end])?;
        }
    }

    {
        let mut stmt = tx.prepare_cached(
            "INSERT OR REPLACE INTO item_stats \
             (id, main_taxon, main_kingdom, main_kingdom_percent, names_total) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for s in &batch.item_stats {
            stmt.execute(params![
                s.item_id,
                s.main_taxon,
                s.main_kingdom,
                s.main_kingdom_percent,
                s.names_total
            ])?;
        }
    }

    {
        let mut stmt = tx.prepare_cached(
            "INSERT OR REPLACE INTO pages (id, item_id, page_num) VALUES (?1, ?2, ?3)",
        )?;
        for p in &batch.pages {
            stmt.execute(params![p.id, p.item_id, p.page_num])?;
        }
    }

    {
        let mut stmt = tx.prepare_cached(
            "INSERT OR REPLACE INTO parts (id, title, doi, page_num_start, page_num_end, year) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for p in &batch.parts {
            stmt.execute(params![
                p.id,
                p.title,
                p.doi,
                p.page_num_start,
                p.page_num_end,
                p.year
            ])?;
        }
    }

    {
        let mut stmt = tx.prepare_cached(
            "INSERT OR IGNORE INTO page_parts (page_id, part_id) VALUES (?1, ?2)",
        )?;
        for (page_id, part_id) in &batch.page_parts {
            stmt.execute(params![page_id, part_id])?;
        }
    }

    {
        let mut stmt = tx.prepare_cached(
            "INSERT OR REPLACE INTO name_strings \
             (id, name, matched_canonical, current_canonical, edit_distance) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for n in &batch.name_strings {
            stmt.execute(params![
                n.id,
                n.name,
                n.matched_canonical,
                n.current_canonical,
                n.edit_distance
            ])?;
        }
    }

    {
        let mut stmt = tx.prepare_cached(
            "INSERT OR REPLACE INTO name_occurrences (page_id, name_string_id, annot_nomen) \
             VALUES (?1, ?2, ?3)",
        )?;
        for o in &batch.occurrences {
            stmt.execute(params![o.page_id, o.name_string_id, o.annot_nomen])?;
        }
    }

    tx.commit()?;
    Ok(())
}

/// Replace the whole abbreviation index with `rows` of (abbr, title_id).
pub fn replace_abbr_titles(conn: &Connection, rows: &[(String, i64)]) -> Result<(), StoreError> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM abbr_titles", [])?;
    {
        let mut stmt =
            tx.prepare_cached("INSERT OR IGNORE INTO abbr_titles (abbr, title_id) VALUES (?1, ?2)")?;
        for (abbr, title_id) in rows {
            stmt.execute(params![abbr, title_id])?;
        }
    }
    tx.commit()?;
    Ok(())
}

/// Row counts of titles, items, pages and name occurrences.
pub fn get_counts(conn: &Connection) -> Result<(i64, i64, i64, i64), StoreError> {
    let count = |table: &str| -> Result<i64, StoreError> {
        Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
            row.get(0)
        })?)
    };
    Ok((
        count("titles")?,
        count("items")?,
        count("pages")?,
        count("name_occurrences")?,
    ))
}
