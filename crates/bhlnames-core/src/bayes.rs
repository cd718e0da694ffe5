//! Naive Bayes classifier over score labels.
//!
//! The model is the count table of a trained classifier: how many training
//! cases had each class, and for every feature value how many cases of each
//! class had it. Odds are computed on the fly from the counts.
//!
//! The embedded `data/bayes.json` is a small placeholder table that keeps the
//! engine usable out of the box. Point `Config::model_path` at a count table
//! trained on curated nomenclatural events for meaningful odds.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Class of references that are the nomenclatural event of a name.
pub const IS_NOMEN: &str = "isNomen";

/// Feature that marks the top ranked reference.
pub const BEST_RESULT: &str = "bestRes";

const EMBEDDED_MODEL: &str = include_str!("../data/bayes.json");

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelData {
    label_cases: HashMap<String, u64>,
    feature_cases: HashMap<String, HashMap<String, HashMap<String, u64>>>,
}

/// Contribution of one feature to the posterior odds.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureOdds {
    pub feature: String,
    pub value: String,
    pub likelihood: f64,
}

/// How the posterior odds were calculated.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OddsDetail {
    pub class: String,
    pub prior_odds: f64,
    pub features: Vec<FeatureOdds>,
    pub odds: f64,
}

#[derive(Debug, Clone)]
pub struct NaiveBayes {
    labels: HashMap<String, u64>,
    features: HashMap<String, HashMap<String, HashMap<String, u64>>>,
}

impl NaiveBayes {
    /// The model compiled into the library.
    pub fn embedded() -> Result<Self, CoreError> {
        Self::from_json(EMBEDDED_MODEL)
    }

    /// Read a model from a JSON file.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| CoreError::Model(format!("cannot read {}: {e}", path.display())))?;
        let nb = Self::from_json(&text)?;
        tracing::info!(path = %path.display(), cases = nb.total_cases(), "loaded bayes model");
        Ok(nb)
    }

    pub fn from_json(text: &str) -> Result<Self, CoreError> {
        let data: ModelData =
            serde_json::from_str(text).map_err(|e| CoreError::Model(e.to_string()))?;
        if data.label_cases.len() < 2 {
            return Err(CoreError::Model(
                "model needs at least two classes".to_string(),
            ));
        }
        if let Some((class, _)) = data.label_cases.iter().find(|(_, n)| **n == 0) {
            return Err(CoreError::Model(format!("class '{class}' has no cases")));
        }
        Ok(Self {
            labels: data.label_cases,
            features: data.feature_cases,
        })
    }

    pub fn total_cases(&self) -> u64 {
        self.labels.values().sum()
    }

    /// Number of cases of `class` and of every other class.
    fn class_counts(&self, class: &str) -> Option<(u64, u64)> {
        let n = *self.labels.get(class)?;
        Some((n, self.total_cases() - n))
    }

    /// Likelihood ratio of a feature value for `class` against all other
    /// classes. `None` if the feature, its value or the class is unknown.
    pub fn likelihood(&self, feature: &str, value: &str, class: &str) -> Option<f64> {
        let (n_class, n_other) = self.class_counts(class)?;
        let cases = self.features.get(feature)?.get(value)?;
        let in_class = cases.get(class).copied().unwrap_or(0);
        let in_other: u64 = cases
            .iter()
            .filter(|(c, _)| c.as_str() != class)
            .map(|(_, n)| *n)
            .sum();
        // a zero count would make the ratio 0 or infinite
        let p_class = in_class.max(1) as f64 / n_class as f64;
        let p_other = in_other.max(1) as f64 / n_other.max(1) as f64;
        Some(p_class / p_other)
    }

    /// Prior odds of `class` times the likelihood ratio of every feature.
    /// Unknown features and values do not change the odds.
    pub fn posterior_odds(
        &self,
        features: &[(&str, String)],
        class: &str,
    ) -> Result<OddsDetail, CoreError> {
        let (n_class, n_other) = self
            .class_counts(class)
            .ok_or_else(|| CoreError::Model(format!("unknown class '{class}'")))?;
        let prior_odds = n_class as f64 / n_other.max(1) as f64;

        let mut odds = prior_odds;
        let mut detail = Vec::with_capacity(features.len());
        for (feature, value) in features {
            let Some(ratio) = self.likelihood(feature, value, class) else {
                tracing::debug!(feature, value = %value, "feature value is not in the model");
                continue;
            };
            odds *= ratio;
            detail.push(FeatureOdds {
                feature: feature.to_string(),
                value: value.clone(),
                likelihood: ratio,
            });
        }

        Ok(OddsDetail {
            class: class.to_string(),
            prior_odds,
            features: detail,
            odds,
        })
    }
}
