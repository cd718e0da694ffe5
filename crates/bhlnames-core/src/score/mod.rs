//! Composite score of a candidate reference.
//!
//! Five sub-scores (year, annotation, title, volume, pages) are summed into a
//! total and packed into a single `u32` sort value. The total occupies bits
//! 24 and up; each sub-score takes 4 bits at an offset chosen by the
//! [`Precedence`], so candidates with the same total are ordered by the
//! sub-scores in precedence order.

pub mod criteria;

use serde::{Deserialize, Serialize};

use crate::{CoreError, OddsDetail};

/// Bit offset of the total in the sort value.
const TOTAL_SHIFT: u32 = 24;

/// Bits available to each sub-score.
const BITS_PER_CRITERION: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Criterion {
    Year,
    Annot,
    RefTitle,
    RefVolume,
    RefPages,
}

impl Criterion {
    pub const ALL: [Criterion; 5] = [
        Criterion::Year,
        Criterion::Annot,
        Criterion::RefTitle,
        Criterion::RefVolume,
        Criterion::RefPages,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Criterion::Year => "year",
            Criterion::Annot => "annot",
            Criterion::RefTitle => "title",
            Criterion::RefVolume => "volume",
            Criterion::RefPages => "pages",
        }
    }
}

/// Rank of every criterion in the sort value, 0 is the least significant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Precedence {
    pub ref_volume: u8,
    pub ref_title: u8,
    pub annot: u8,
    pub year: u8,
    pub ref_pages: u8,
}

impl Default for Precedence {
    fn default() -> Self {
        Self {
            ref_volume: 0,
            ref_title: 1,
            annot: 2,
            year: 3,
            ref_pages: 4,
        }
    }
}

impl Precedence {
    pub fn rank(&self, criterion: Criterion) -> u8 {
        match criterion {
            Criterion::Year => self.year,
            Criterion::Annot => self.annot,
            Criterion::RefTitle => self.ref_title,
            Criterion::RefVolume => self.ref_volume,
            Criterion::RefPages => self.ref_pages,
        }
    }

    /// Every criterion must have its own rank in `0..=4`.
    pub fn validate(&self) -> Result<(), CoreError> {
        let mut seen = [false; 5];
        for criterion in Criterion::ALL {
            let rank = usize::from(self.rank(criterion));
            if rank >= seen.len() {
                return Err(CoreError::InvalidPrecedence(format!(
                    "rank {rank} of '{}' is out of range 0..=4",
                    criterion.as_str()
                )));
            }
            if seen[rank] {
                return Err(CoreError::InvalidPrecedence(format!(
                    "rank {rank} is used more than once"
                )));
            }
            seen[rank] = true;
        }
        Ok(())
    }

    /// Criteria from the most significant to the least significant.
    pub fn order(&self) -> [Criterion; 5] {
        let mut res = Criterion::ALL;
        res.sort_by(|a, b| self.rank(*b).cmp(&self.rank(*a)));
        res
    }
}

/// Labels of the sub-scores, used as features by the classifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Labels {
    pub year: &'static str,
    pub annot: &'static str,
    pub title: &'static str,
    pub vol: &'static str,
    pub pages: &'static str,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Score {
    pub total: u8,
    pub year: u8,
    pub annot: u8,
    pub ref_title: u8,
    pub ref_volume: u8,
    pub ref_pages: u8,
    pub labels: Labels,
    /// Packed value for single-key sorting.
    pub sort: u32,
    /// Posterior odds that the reference is the nomenclatural event.
    pub odds: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub odds_detail: Option<OddsDetail>,
}

impl Score {
    pub fn get(&self, criterion: Criterion) -> u8 {
        match criterion {
            Criterion::Year => self.year,
            Criterion::Annot => self.annot,
            Criterion::RefTitle => self.ref_title,
            Criterion::RefVolume => self.ref_volume,
            Criterion::RefPages => self.ref_pages,
        }
    }

    /// Compute the total and the packed sort value.
    pub fn combine(&mut self, precedence: &Precedence) {
        self.total = Criterion::ALL.iter().map(|c| self.get(*c)).sum();
        let mut value = 0u32;
        for criterion in Criterion::ALL {
            let shift = BITS_PER_CRITERION * u32::from(precedence.rank(criterion));
            value |= u32::from(self.get(criterion)) << shift;
        }
        value |= u32::from(self.total) << TOTAL_SHIFT;
        self.sort = value;
    }

    /// The total followed by sub-scores from the most to the least
    /// significant. Comparing keys gives the same order as comparing
    /// packed sort values.
    pub fn rank_key(&self, precedence: &Precedence) -> (u8, [u8; 5]) {
        let order = precedence.order();
        (self.total, order.map(|c| self.get(c)))
    }

    /// Packed sort value as binary, bytes separated by `_`.
    pub fn display_bits(&self) -> String {
        let bits = format!("{:032b}", self.sort);
        bits.as_bytes()
            .chunks(8)
            .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
            .collect::<Vec<_>>()
            .join("_")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // annotation is the least significant, then year
    fn prec() -> Precedence {
        Precedence {
            annot: 0,
            year: 1,
            ref_title: 2,
            ref_volume: 3,
            ref_pages: 4,
        }
    }

    #[test]
    fn packed_values() {
        let cases = [
            (0, 0, 0, 0, "00000000_00000000_00000000_00000000"),
            (1, 1, 2, 33554449, "00000010_00000000_00000000_00010001"),
            (15, 15, 30, 503316735, "00011110_00000000_00000000_11111111"),
            (6, 11, 17, 285212854, "00010001_00000000_00000000_10110110"),
            (11, 6, 17, 285212779, "00010001_00000000_00000000_01101011"),
        ];
        for (annot, year, total, value, bits) in cases {
            let mut score = Score {
                annot,
                year,
                ..Default::default()
            };
            score.combine(&prec());
            assert_eq!(score.total, total, "a{annot}y{year}");
            assert_eq!(score.sort, value, "a{annot}y{year}");
            assert_eq!(score.display_bits(), bits, "a{annot}y{year}");
        }
    }

    #[test]
    fn default_precedence_is_valid() {
        assert!(Precedence::default().validate().is_ok());
        assert!(prec().validate().is_ok());
    }

    #[test]
    fn invalid_precedence() {
        let duplicate = Precedence {
            year: 0,
            ..Default::default()
        };
        assert!(matches!(
            duplicate.validate(),
            Err(CoreError::InvalidPrecedence(_))
        ));

        let out_of_range = Precedence {
            ref_pages: 5,
            ..Default::default()
        };
        assert!(matches!(
            out_of_range.validate(),
            Err(CoreError::InvalidPrecedence(_))
        ));
    }

    #[test]
    fn precedence_order() {
        use Criterion::*;
        assert_eq!(
            Precedence::default().order(),
            [RefPages, Year, Annot, RefTitle, RefVolume]
        );
    }

    #[test]
    fn precedence_changes_only_sort() {
        let mut a = Score {
            year: 3,
            annot: 1,
            ref_title: 2,
            ..Default::default()
        };
        let mut b = a.clone();
        a.combine(&Precedence::default());
        b.combine(&prec());
        assert_eq!(a.total, b.total);
        assert_eq!(a.year, b.year);
        assert_ne!(a.sort, b.sort);
    }

    #[test]
    fn rank_key_orders_like_sort_value() {
        let precedences = [Precedence::default(), prec()];
        let scores = [
            (3, 0, 0, 0, 0),
            (0, 3, 0, 0, 0),
            (0, 0, 3, 0, 0),
            (0, 0, 0, 1, 0),
            (0, 0, 0, 0, 3),
            (2, 1, 0, 0, 0),
            (1, 2, 0, 0, 0),
            (1, 1, 1, 1, 1),
        ];
        for p in precedences {
            let combined: Vec<Score> = scores
                .iter()
                .map(|&(year, annot, ref_title, ref_volume, ref_pages)| {
                    let mut s = Score {
                        year,
                        annot,
                        ref_title,
                        ref_volume,
                        ref_pages,
                        ..Default::default()
                    };
                    s.combine(&p);
                    s
                })
                .collect();
            for a in &combined {
                for b in &combined {
                    assert_eq!(
                        a.sort.cmp(&b.sort),
                        a.rank_key(&p).cmp(&b.rank_key(&p)),
                        "{} vs {}",
                        a.display_bits(),
                        b.display_bits()
                    );
                }
            }
        }
    }
}
