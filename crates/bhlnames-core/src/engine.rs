//! Single-query pipeline: load, resolve, score, classify, rank.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Datelike;

use crate::bayes::{BEST_RESULT, IS_NOMEN};
use crate::db::{Storage, StorageError};
use crate::input::Input;
use crate::score::criteria::{annot_score, pages_score, volume_score, year_score};
use crate::score::{Labels, Score};
use crate::title_matcher::title_score;
use crate::{
    Config, CoreError, NaiveBayes, Reference, ReferenceName, RefsByName, TitleMatcher, loader,
    match_quality, names, resolver,
};

/// Result sets up to this size count as "few" for the classifier.
const FEW_RESULTS: usize = 5;

/// Finds and ranks BHL references for names. Shared read-only between
/// workers of a stream.
pub struct Engine {
    storage: Arc<dyn Storage>,
    titles: Option<TitleMatcher>,
    model: NaiveBayes,
    config: Config,
}

impl Engine {
    /// Without a title matcher citations never match a title and the title
    /// score is always 0.
    pub fn new(
        storage: Arc<dyn Storage>,
        titles: Option<TitleMatcher>,
        model: NaiveBayes,
        config: Config,
    ) -> Result<Self, CoreError> {
        config.precedence.validate()?;
        Ok(Self {
            storage,
            titles,
            model,
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Find references for one query.
    pub fn name_refs(&self, input: &Input) -> Result<RefsByName, CoreError> {
        let canonical = if input.name.canonical.is_empty() {
            names::parse(&input.name.name_string)
                .map(|p| p.canonical)
                .ok_or_else(|| CoreError::UnparseableName(input.name.name_string.clone()))?
        } else {
            input.name.canonical.clone()
        };

        let with_taxon = input.params.with_taxon;
        let candidates = loader::load_candidates(self.storage.as_ref(), &canonical, with_taxon)?;
        let mut references = resolver::resolve(
            self.storage.as_ref(),
            candidates.rows,
            input.params.sort_desc || self.config.sort_desc,
        )?;

        let synonyms = if with_taxon {
            resolver::synonyms(&references, &candidates.current_canonical)
        } else {
            Vec::new()
        };
        let reference_number = references.len();

        self.score(input, &mut references)?;

        let has_reference = input.reference.is_present();
        if has_reference || input.params.with_nomen_event {
            rank(&mut references);
            self.boost_best_result(&mut references);
        }

        let limit = match input.params.refs_limit {
            0 => self.config.refs_limit,
            n => n,
        };
        if limit > 0 {
            references.truncate(limit);
        }

        if has_reference {
            for r in references.iter_mut() {
                r.ref_match_quality = match_quality(r.score.odds);
            }
        }

        if input.params.with_shortened_output {
            references.clear();
        }

        tracing::debug!(
            id = %input.id,
            canonical = %canonical,
            references = reference_number,
            "name references found"
        );

        Ok(RefsByName {
            input: input.clone(),
            canonical,
            current_canonical: candidates.current_canonical,
            synonyms,
            reference_number,
            references,
        })
    }

    /// Reference of a single page, with its part, URL and aggregate year.
    pub fn ref_by_page_id(&self, page_id: i64) -> Result<Reference, CoreError> {
        let Some(row) = self
            .storage
            .find_page(page_id)
            .inspect_err(|e| tracing::error!(page_id, error = %e, "cannot find page"))?
        else {
            return Err(StorageError::NotFound(format!("page {page_id}")).into());
        };
        let part = self
            .storage
            .find_parts_for_page(page_id)
            .inspect_err(|e| tracing::error!(page_id, error = %e, "cannot find part"))?
            .pop();
        Ok(resolver::reference(row, part))
    }

    /// Attach a score and posterior odds to every reference.
    fn score(&self, input: &Input, references: &mut [ReferenceName]) -> Result<(), CoreError> {
        let citation = if input.reference.ref_string.is_empty() {
            &input.reference.journal
        } else {
            &input.reference.ref_string
        };
        let matched_titles = match &self.titles {
            Some(tm) if !citation.is_empty() => tm.match_titles(citation)?,
            _ => HashMap::new(),
        };

        let query_year = input.query_year();
        let current_year = chrono::Local::now().year();
        let res_num = if references.len() <= FEW_RESULTS {
            "few"
        } else {
            "many"
        };

        for r in references.iter_mut() {
            let (year, year_label) = year_score(query_year, &r.reference, current_year);
            let (annot, annot_label) =
                annot_score(&r.name.annot_nomen, &r.name.name, &r.name.matched_name);
            let (ref_title, title_label) = title_score(matched_titles.get(&r.reference.title_id));
            let (ref_volume, vol_label) = volume_score(input.reference.volume, &r.reference.volume);
            let (ref_pages, pages_label) = pages_score(
                input.reference.page_start,
                input.reference.page_end,
                r.reference.page_num,
                &r.reference.part.pages,
            );

            let mut score = Score {
                year,
                annot,
                ref_title,
                ref_volume,
                ref_pages,
                labels: Labels {
                    year: year_label,
                    annot: annot_label,
                    title: title_label,
                    vol: vol_label,
                    pages: pages_label,
                },
                ..Default::default()
            };
            score.combine(&self.config.precedence);

            let features = feature_vector(&score.labels, res_num, input.params.with_nomen_event);
            let detail = self.model.posterior_odds(&features, IS_NOMEN)?;
            score.odds = detail.odds;
            score.odds_detail = Some(detail);
            r.score = score;
        }
        Ok(())
    }

    /// Multiply the odds of the top reference by the likelihood ratio of
    /// being the best result.
    fn boost_best_result(&self, references: &mut [ReferenceName]) {
        let Some(best) = references.first_mut() else {
            return;
        };
        match self.model.likelihood(BEST_RESULT, "true", IS_NOMEN) {
            Some(ratio) => best.score.odds *= ratio,
            None => tracing::warn!("model has no best result feature, odds are not boosted"),
        }
    }
}

/// Categorical features of a scored reference.
fn feature_vector(
    labels: &Labels,
    res_num: &str,
    with_nomen_event: bool,
) -> Vec<(&'static str, String)> {
    let has_pages = labels.pages != "none";
    let mut res = vec![
        ("yrPage", format!("{}|{has_pages}", labels.year)),
        ("title", labels.title.to_string()),
        ("vol", labels.vol.to_string()),
        ("pages", labels.pages.to_string()),
        ("resNum", res_num.to_string()),
    ];
    if with_nomen_event {
        res.push(("annot", labels.annot.to_string()));
    }
    res
}

/// Best score first. Equal scores go from the earliest year, then by page.
fn rank(references: &mut [ReferenceName]) {
    references.sort_by(|a, b| {
        b.score
            .sort
            .cmp(&a.score.sort)
            .then_with(|| a.reference.year_or_zero().cmp(&b.reference.year_or_zero()))
            .then_with(|| a.reference.page_id.cmp(&b.reference.page_id))
    });
}
