//! Collapses raw name occurrences into one reference per part or item.
//!
//! A name usually occurs on many pages of the same paper or volume. Only one
//! occurrence per (part or item, matched name) is kept, preferring pages with
//! a nomenclatural annotation and pages with a known page number.

use std::collections::{BTreeSet, HashMap};

use crate::db::{PartRecord, RawOccurrence, Storage};
use crate::score::criteria::Annotation;
use crate::{CoreError, ItemStats, NameData, Part, Reference, ReferenceName, YearType};

const PAGE_URL: &str = "https://www.biodiversitylibrary.org/page/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Owner {
    Part(i64),
    Item(i64),
}

struct Candidate {
    row: RawOccurrence,
    part: Option<PartRecord>,
}

/// Deduplicate `rows` and convert the survivors into references sorted by
/// their aggregate year. Rows with the same year keep their original order.
pub fn resolve(
    storage: &dyn Storage,
    rows: Vec<RawOccurrence>,
    sort_desc: bool,
) -> Result<Vec<ReferenceName>, CoreError> {
    let mut parts_by_page: HashMap<i64, Option<PartRecord>> = HashMap::new();
    let mut index: HashMap<(Owner, String), usize> = HashMap::new();
    let mut candidates: Vec<Candidate> = Vec::new();

    for row in rows {
        let part = match parts_by_page.get(&row.page_id) {
            Some(part) => part.clone(),
            None => {
                let part = storage
                    .find_parts_for_page(row.page_id)
                    .inspect_err(|e| {
                        tracing::error!(page_id = row.page_id, error = %e, "cannot find part");
                    })?
                    .pop();
                parts_by_page.insert(row.page_id, part.clone());
                part
            }
        };

        let owner = match &part {
            Some(p) => Owner::Part(p.id),
            None => Owner::Item(row.item_id),
        };
        let key = (owner, row.matched_canonical.clone());
        match index.get(&key) {
            None => {
                index.insert(key, candidates.len());
                candidates.push(Candidate { row, part });
            }
            Some(&i) => {
                if prefer(&candidates[i].row, &row) {
                    candidates[i] = Candidate { row, part };
                }
            }
        }
    }

    let mut res: Vec<ReferenceName> = candidates.into_iter().map(to_reference_name).collect();
    res.sort_by(|a, b| {
        let (ya, yb) = (a.reference.year_or_zero(), b.reference.year_or_zero());
        if sort_desc { yb.cmp(&ya) } else { ya.cmp(&yb) }
    });
    Ok(res)
}

/// Whether `new` should replace `old` as the representative occurrence.
fn prefer(old: &RawOccurrence, new: &RawOccurrence) -> bool {
    let old_annot = Annotation::parse(&old.annotation) != Annotation::NoAnnot;
    let new_annot = Annotation::parse(&new.annotation) != Annotation::NoAnnot;
    if old_annot != new_annot {
        return new_annot;
    }
    old.page_num == 0 && new.page_num > 0
}

/// Distinct matched names other than the accepted one, sorted.
pub fn synonyms(references: &[ReferenceName], current: &str) -> Vec<String> {
    references
        .iter()
        .map(|r| r.name.matched_name.as_str())
        .filter(|n| *n != current)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

pub fn page_url(page_id: i64) -> String {
    if page_id == 0 {
        return String::new();
    }
    format!("{PAGE_URL}{page_id}")
}

fn part_pages(part: &PartRecord) -> String {
    match (part.page_num_start, part.page_num_end) {
        (0, _) => String::new(),
        (start, 0) => format!("{start}-?"),
        (start, end) => format!("{start}-{end}"),
    }
}

/// The most specific year of a candidate: the part year, then the title
/// start year when the item predates it, then the item start year.
fn year_aggr(row: &RawOccurrence, part: Option<&PartRecord>) -> (Option<i32>, YearType) {
    let part_year = part.map_or(0, |p| p.year);
    let (item, title) = (row.item_year_start, row.title_year_start);
    if part_year > 0 {
        (Some(part_year), YearType::Part)
    } else if title > 0 && item < title {
        (Some(title), YearType::Title)
    } else if item > 0 {
        (Some(item), YearType::Item)
    } else {
        (None, YearType::NotAvailable)
    }
}

fn to_reference_name(c: Candidate) -> ReferenceName {
    let mut row = c.row;
    let name = NameData {
        name: std::mem::take(&mut row.name_string),
        matched_name: std::mem::take(&mut row.matched_canonical),
        edit_distance: row.edit_distance,
        annot_nomen: std::mem::take(&mut row.annotation),
    };
    ReferenceName {
        reference: reference(row, c.part),
        name,
        ref_match_quality: 0,
        score: Default::default(),
    }
}

/// Build the corpus location of a page from its row and the part it is in.
/// Name fields of `row` are not used.
pub fn reference(row: RawOccurrence, part: Option<PartRecord>) -> Reference {
    let (year_aggr, year_type) = year_aggr(&row, part.as_ref());
    let part = part.map_or_else(Part::default, |p| Part {
        id: p.id,
        pages: part_pages(&p),
        year: p.year,
        name: p.title,
        doi: p.doi,
    });
    Reference {
        year_aggr,
        year_type,
        title_id: row.title_id,
        title_name: row.title_name,
        title_doi: row.title_doi,
        title_year_start: row.title_year_start,
        title_year_end: row.title_year_end,
        item_id: row.item_id,
        volume: row.volume,
        item_year_start: row.item_year_start,
        item_year_end: row.item_year_end,
        page_id: row.page_id,
        page_num: row.page_num,
        url: page_url(row.page_id),
        part,
        item_stats: ItemStats {
            main_taxon: row.main_taxon,
            main_kingdom: row.main_kingdom,
            main_kingdom_percent: row.main_kingdom_percent,
            names_total: row.names_total,
        },
    }
}
