//! Per-criterion scores. Every function is pure and returns the score with
//! its label. Labels are the categorical features of the Bayes classifier.

use crate::names;
use crate::{Reference, YearType};

/// Highest year score, given to an exact year match.
pub const MAX_YEAR_SCORE: f64 = 3.0;

/// Year score decay per year of difference.
const YEAR_DECAY: f64 = 0.7;

/// Years further apart than this get no score.
const MAX_YEAR_DIFF: i32 = 10;

/// Earliest year a query can reasonably have.
const MIN_VALID_YEAR: i32 = 1740;

pub fn year_label(score: u8) -> &'static str {
    match score {
        3 => "exact",
        2 => "near",
        1 => "far",
        _ => "none",
    }
}

fn invalid_year(year: i32, current_year: i32) -> bool {
    year < MIN_VALID_YEAR || year > current_year + 2
}

/// Closeness of two years. The first year is the one from the query and is
/// checked for validity.
pub fn year_near(year: i32, other: i32, current_year: i32) -> u8 {
    if invalid_year(year, current_year) {
        return 0;
    }
    let diff = (year - other).abs();
    if diff > MAX_YEAR_DIFF {
        return 0;
    }
    (MAX_YEAR_SCORE * YEAR_DECAY.powi(diff)).round() as u8
}

/// Closeness of a year to a range. A year outside of the range gets 0,
/// a year inside is measured against the end of the range.
pub fn year_between(year: i32, min: i32, max: i32, current_year: i32) -> u8 {
    if invalid_year(year, current_year) {
        return 0;
    }
    if min == 0 && max == 0 {
        return 0;
    }
    if max < min && max != 0 {
        return 0;
    }
    if max == 0 {
        return year_near(year, min, current_year);
    }
    if !(min..=max).contains(&year) {
        return 0;
    }
    year_near(year, max, current_year)
}

/// Year score of a reference. A part year is compared directly, otherwise
/// the item and title year ranges are tried and the better score wins.
pub fn year_score(query_year: i32, reference: &Reference, current_year: i32) -> (u8, &'static str) {
    if reference.year_type == YearType::Part
        && let Some(part_year) = reference.year_aggr.filter(|y| *y > 0)
    {
        let score = year_near(query_year, part_year, current_year);
        return (score, year_label(score));
    }

    let has_item = reference.item_year_start + reference.item_year_end > 0;
    let has_title = reference.title_year_start + reference.title_year_end > 0;

    let mut item_score = 0;
    if has_item || !has_title {
        item_score = year_between(
            query_year,
            reference.item_year_start,
            reference.item_year_end,
            current_year,
        );
    }
    let mut title_score = 0;
    if has_title {
        title_score = year_between(
            query_year,
            reference.title_year_start,
            reference.title_year_end,
            current_year,
        );
    }
    let score = item_score.max(title_score);
    (score, year_label(score))
}

/// Nomenclatural annotation found near a name on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Annotation {
    NoAnnot,
    SpNov,
    SubspNov,
    CombNov,
}

impl Annotation {
    /// Unknown strings are treated as no annotation.
    pub fn parse(s: &str) -> Self {
        match s {
            "SP_NOV" => Annotation::SpNov,
            "SUBSP_NOV" => Annotation::SubspNov,
            "COMB_NOV" => Annotation::CombNov,
            _ => Annotation::NoAnnot,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Annotation::NoAnnot => "NO_ANNOT",
            Annotation::SpNov => "SP_NOV",
            Annotation::SubspNov => "SUBSP_NOV",
            Annotation::CombNov => "COMB_NOV",
        }
    }

    fn table(&self) -> Option<&'static AnnotTable> {
        match self {
            Annotation::NoAnnot => None,
            Annotation::SpNov => Some(&SP_NOV),
            Annotation::SubspNov => Some(&SUBSP_NOV),
            Annotation::CombNov => Some(&COMB_NOV),
        }
    }
}

/// Scores indexed by `[name cardinality - 1][matched cardinality - 1]`.
type AnnotTable = [[u8; 3]; 3];

const SP_NOV: AnnotTable = [
    [0, 0, 0], //
    [0, 3, 1],
    [0, 2, 0],
];

const SUBSP_NOV: AnnotTable = [
    [0, 0, 0], //
    [0, 0, 2],
    [0, 1, 3],
];

const COMB_NOV: AnnotTable = [
    [0, 0, 0], //
    [0, 3, 1],
    [0, 2, 3],
];

pub fn annot_label(score: u8) -> &'static str {
    match score {
        3 => "exact",
        2 => "likely",
        1 => "doubtful",
        _ => "none",
    }
}

/// Annotation score from cardinalities of the name and of the matched name.
pub fn annot_score_by_cardinality(annot: Annotation, name_card: u8, matched_card: u8) -> u8 {
    let Some(table) = annot.table() else {
        return 0;
    };
    if !(1..=3).contains(&name_card) || !(1..=3).contains(&matched_card) {
        return 0;
    }
    table[usize::from(name_card - 1)][usize::from(matched_card - 1)]
}

/// How well a nomenclatural annotation fits the name and the matched name.
/// A new species annotation fits a binomial, a new subspecies fits a
/// trinomial.
pub fn annot_score(annotation: &str, name: &str, matched_name: &str) -> (u8, &'static str) {
    let annot = Annotation::parse(annotation);
    if annot == Annotation::NoAnnot {
        return (0, annot_label(0));
    }
    let score =
        annot_score_by_cardinality(annot, names::cardinality(name), names::cardinality(matched_name));
    (score, annot_label(score))
}

pub fn volume_label(score: u8) -> &'static str {
    if score == 0 { "none" } else { "match" }
}

/// 1 if the volume number occurs in the volume text and is not a part of a
/// longer number.
pub fn volume_score(volume: i32, volume_text: &str) -> (u8, &'static str) {
    if volume <= 0 {
        return (0, volume_label(0));
    }
    let needle = volume.to_string();
    let bytes = volume_text.as_bytes();
    let found = volume_text.match_indices(&needle).any(|(start, _)| {
        let end = start + needle.len();
        let digit_before = start > 0 && bytes[start - 1].is_ascii_digit();
        let digit_after = end < bytes.len() && bytes[end].is_ascii_digit();
        !digit_before && !digit_after
    });
    let score = u8::from(found);
    (score, volume_label(score))
}

pub fn pages_label(score: u8) -> &'static str {
    match score {
        3 => "both",
        2 => "pageNum",
        1 => "paperPages",
        _ => "none",
    }
}

/// Page score. The page number of the candidate within the query range gives
/// 2, the pages of the candidate's part inside the query range give 1 more.
pub fn pages_score(
    page_start: i32,
    page_end: i32,
    page_num: i32,
    part_pages: &str,
) -> (u8, &'static str) {
    let mut score = 0;
    if page_start == 0 && page_end == 0 {
        return (score, pages_label(score));
    }
    if page_num == 0 && part_pages.is_empty() {
        return (score, pages_label(score));
    }

    if page_num > 0
        && ((page_end == 0 && page_num == page_start)
            || (page_start <= page_num && page_num <= page_end))
    {
        score = 2;
    }

    if !part_pages.is_empty() {
        let mut bounds = part_pages.split('-');
        let part_start: i32 = bounds.next().and_then(|s| s.parse().ok()).unwrap_or(0);
        if part_start == 0 {
            return (score, pages_label(score));
        }
        if page_end > page_start
            && let Some(end) = bounds.next()
        {
            let part_end: i32 = end.parse().unwrap_or(0);
            if page_start >= part_start && page_end <= part_end {
                score += 1;
            }
        }
    }
    (score, pages_label(score))
}
