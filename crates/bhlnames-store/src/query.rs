//! Read queries behind the engine's storage traits.

use std::collections::HashMap;

use rusqlite::{Connection, OptionalExtension, Row, params};

use bhlnames_core::{PartRecord, RawOccurrence};

use crate::StoreError;

const OCCURRENCE_COLUMNS: &str = "\
    t.id, t.name, COALESCE(t.doi, ''), COALESCE(t.year_start, 0), COALESCE(t.year_end, 0), \
    i.id, COALESCE(i.vol, ''), COALESCE(i.year_start, 0), COALESCE(i.year_end, 0), \
    p.id, COALESCE(p.page_num, 0), \
    ns.name, COALESCE(ns.matched_canonical, ''), COALESCE(ns.edit_distance, 0), o.annot_nomen, \
    COALESCE(st.main_taxon, ''), COALESCE(st.main_kingdom, ''), \
    COALESCE(st.main_kingdom_percent, 0), COALESCE(st.names_total, 0)";

const OCCURRENCE_JOINS: &str = "\
    FROM name_strings ns \
    JOIN name_occurrences o ON ns.id = o.name_string_id \
    JOIN pages p ON p.id = o.page_id \
    JOIN items i ON i.id = p.item_id \
    JOIN titles t ON t.id = i.title_id \
    LEFT JOIN item_stats st ON st.id = i.id";

/// Occurrences of every name-string whose matched (or accepted) canonical is
/// `name`, oldest titles first.
pub fn occurrences(
    conn: &Connection,
    name: &str,
    by_accepted_name: bool,
) -> Result<Vec<RawOccurrence>, StoreError> {
    let field = if by_accepted_name {
        "current_canonical"
    } else {
        "matched_canonical"
    };
    let sql = format!(
        "SELECT {OCCURRENCE_COLUMNS} {OCCURRENCE_JOINS} \
         WHERE ns.{field} = ?1 \
         ORDER BY COALESCE(t.year_start, 0), p.id"
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let rows = stmt
        .query_map(params![name], occurrence_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn occurrence_from_row(row: &Row<'_>) -> rusqlite::Result<RawOccurrence> {
    Ok(RawOccurrence {
        title_id: row.get(0)?,
        title_name: row.get(1)?,
        title_doi: row.get(2)?,
        title_year_start: row.get(3)?,
        title_year_end: row.get(4)?,
        item_id: row.get(5)?,
        volume: row.get(6)?,
        item_year_start: row.get(7)?,
        item_year_end: row.get(8)?,
        page_id: row.get(9)?,
        page_num: row.get(10)?,
        name_string: row.get(11)?,
        matched_canonical: row.get(12)?,
        edit_distance: row.get(13)?,
        annotation: row.get(14)?,
        main_taxon: row.get(15)?,
        main_kingdom: row.get(16)?,
        main_kingdom_percent: row.get(17)?,
        names_total: row.get(18)?,
    })
}

/// Page, item and title data of one page. Name fields are left empty.
pub fn page(conn: &Connection, page_id: i64) -> Result<Option<RawOccurrence>, StoreError> {
    let mut stmt = conn.prepare_cached(
        "SELECT t.id, t.name, COALESCE(t.doi, ''), COALESCE(t.year_start, 0), \
         COALESCE(t.year_end, 0), \
         i.id, COALESCE(i.vol, ''), COALESCE(i.year_start, 0), COALESCE(i.year_end, 0), \
         p.id, COALESCE(p.page_num, 0), \
         COALESCE(st.main_taxon, ''), COALESCE(st.main_kingdom, ''), \
         COALESCE(st.main_kingdom_percent, 0), COALESCE(st.names_total, 0) \
         FROM pages p \
         JOIN items i ON i.id = p.item_id \
         JOIN titles t ON t.id = i.title_id \
         LEFT JOIN item_stats st ON st.id = i.id \
         WHERE p.id = ?1",
    )?;
    let page = stmt
        .query_row(params![page_id], |row| {
            Ok(RawOccurrence {
                title_id: row.get(0)?,
                title_name: row.get(1)?,
                title_doi: row.get(2)?,
                title_year_start: row.get(3)?,
                title_year_end: row.get(4)?,
                item_id: row.get(5)?,
                volume: row.get(6)?,
                item_year_start: row.get(7)?,
                item_year_end: row.get(8)?,
                page_id: row.get(9)?,
                page_num: row.get(10)?,
                main_taxon: row.get(11)?,
                main_kingdom: row.get(12)?,
                main_kingdom_percent: row.get(13)?,
                names_total: row.get(14)?,
                ..Default::default()
            })
        })
        .optional()?;
    Ok(page)
}

pub fn parts_for_page(conn: &Connection, page_id: i64) -> Result<Vec<PartRecord>, StoreError> {
    let mut stmt = conn.prepare_cached(
        "SELECT p.id, COALESCE(p.title, ''), COALESCE(p.doi, ''), \
         COALESCE(p.page_num_start, 0), COALESCE(p.page_num_end, 0), COALESCE(p.year, 0) \
         FROM parts p \
         JOIN page_parts pp ON p.id = pp.part_id \
         WHERE pp.page_id = ?1 \
         ORDER BY p.id",
    )?;
    let parts = stmt
        .query_map(params![page_id], |row| {
            Ok(PartRecord {
                id: row.get(0)?,
                title: row.get(1)?,
                doi: row.get(2)?,
                page_num_start: row.get(3)?,
                page_num_end: row.get(4)?,
                year: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(parts)
}

pub fn current_canonical(conn: &Connection, canonical: &str) -> Result<Option<String>, StoreError> {
    let mut stmt = conn.prepare_cached(
        "SELECT current_canonical FROM name_strings \
         WHERE matched_canonical = ?1 AND current_canonical <> '' \
         LIMIT 1",
    )?;
    Ok(stmt.query_row(params![canonical], |row| row.get(0)).optional()?)
}

pub fn titles_for_abbrs(
    conn: &Connection,
    abbrs: &[String],
) -> Result<HashMap<String, Vec<i64>>, StoreError> {
    let mut stmt =
        conn.prepare_cached("SELECT title_id FROM abbr_titles WHERE abbr = ?1 ORDER BY title_id")?;
    let mut res = HashMap::new();
    for abbr in abbrs {
        let ids = stmt
            .query_map(params![abbr], |row| row.get::<_, i64>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        if !ids.is_empty() {
            res.insert(abbr.clone(), ids);
        }
    }
    Ok(res)
}

pub fn all_abbrs(conn: &Connection) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn.prepare_cached("SELECT DISTINCT abbr FROM abbr_titles ORDER BY abbr")?;
    let abbrs = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(abbrs)
}

/// Every title as (id, name).
pub fn all_titles(conn: &Connection) -> Result<Vec<(i64, String)>, StoreError> {
    let mut stmt = conn.prepare_cached("SELECT id, name FROM titles ORDER BY id")?;
    let titles = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(titles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{
        InsertBatch, ItemRow, ItemStatsRow, NameStringRow, OccurrenceRow, PageRow, TitleRow,
        init_database, insert_batch, replace_abbr_titles,
    };

    fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_database(&conn).unwrap();

        let mut batch = InsertBatch::new();
        batch.titles.push(TitleRow {
            id: 1,
            name: "Wiener entomologische Zeitung".into(),
            year_start: 1882,
            ..Default::default()
        });
        batch.items.push(ItemRow {
            id: 10,
            title_id: 1,
            vol: "v. 3 (1884)".into(),
            year_start: 1884,
            ..Default::default()
        });
        batch.item_stats.push(ItemStatsRow {
            item_id: 10,
            main_taxon: "Coleoptera".into(),
            main_kingdom: "Animalia".into(),
            main_kingdom_percent: 97,
            names_total: 1200,
        });
        batch.pages.push(PageRow {
            id: 100,
            item_id: 10,
            page_num: Some(98),
        });
        batch.pages.push(PageRow {
            id: 101,
            item_id: 10,
            page_num: None,
        });
        batch.name_strings.push(NameStringRow {
            id: "ns1".into(),
            name: "Achenium lusitanicum".into(),
            matched_canonical: "Achenium lusitanicum".into(),
            current_canonical: Some("Achenium lusitanicum".into()),
            edit_distance: 0,
        });
        batch.name_strings.push(NameStringRow {
            id: "ns2".into(),
            name: "Achenium lusitanicnm".into(),
            matched_canonical: "Achenium lusitanicum".into(),
            current_canonical: None,
            edit_distance: 1,
        });
        batch.occurrences.push(OccurrenceRow {
            page_id: 100,
            name_string_id: "ns1".into(),
            annot_nomen: "SP_NOV".into(),
        });
        batch.occurrences.push(OccurrenceRow {
            page_id: 101,
            name_string_id: "ns2".into(),
            ..Default::default()
        });
        batch.parts.push(PartRecord {
            id: 55,
            title: "Zwei neue europäische Staphylinenarten".into(),
            page_num_start: 97,
            page_num_end: 99,
            year: 1884,
            ..Default::default()
        });
        batch.page_parts.push((100, 55));
        insert_batch(&conn, &batch).unwrap();
        conn
    }

    #[test]
    fn finds_occurrences_with_stats() {
        let conn = setup_db();
        let rows = occurrences(&conn, "Achenium lusitanicum", false).unwrap();
        assert_eq!(rows.len(), 2);

        let first = &rows[0];
        assert_eq!(first.page_id, 100);
        assert_eq!(first.page_num, 98);
        assert_eq!(first.annotation, "SP_NOV");
        assert_eq!(first.title_name, "Wiener entomologische Zeitung");
        assert_eq!(first.main_kingdom_percent, 97);

        let second = &rows[1];
        assert_eq!(second.page_num, 0, "missing page number reads as 0");
        assert_eq!(second.edit_distance, 1);
        assert_eq!(second.annotation, "NO_ANNOT");

        let by_taxon = occurrences(&conn, "Achenium lusitanicum", true).unwrap();
        assert_eq!(by_taxon.len(), 1);
        assert!(occurrences(&conn, "Nothing here", false).unwrap().is_empty());
    }

    #[test]
    fn finds_parts() {
        let conn = setup_db();
        let parts = parts_for_page(&conn, 100).unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].id, 55);
        assert_eq!(parts[0].doi, "");
        assert!(parts_for_page(&conn, 101).unwrap().is_empty());
    }

    #[test]
    fn finds_page() {
        let conn = setup_db();
        let found = page(&conn, 100).unwrap().unwrap();
        assert_eq!(found.item_id, 10);
        assert_eq!(found.title_id, 1);
        assert_eq!(found.page_num, 98);
        assert_eq!(found.volume, "v. 3 (1884)");
        assert_eq!(found.main_taxon, "Coleoptera");
        assert_eq!(found.name_string, "");

        assert_eq!(page(&conn, 101).unwrap().unwrap().page_num, 0);
        assert!(page(&conn, 999).unwrap().is_none());
    }

    #[test]
    fn finds_current_canonical() {
        let conn = setup_db();
        assert_eq!(
            current_canonical(&conn, "Achenium lusitanicum").unwrap(),
            Some("Achenium lusitanicum".to_string())
        );
        assert_eq!(current_canonical(&conn, "Nothing here").unwrap(), None);
    }

    #[test]
    fn abbreviation_lookup() {
        let conn = setup_db();
        replace_abbr_titles(&conn, &[("wez".into(), 1), ("wez".into(), 7), ("abc".into(), 2)])
            .unwrap();
        let found = titles_for_abbrs(&conn, &["wez".into(), "zzz".into()]).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found["wez"], vec![1, 7]);
        assert_eq!(all_abbrs(&conn).unwrap(), vec!["abc", "wez"]);
    }
}
