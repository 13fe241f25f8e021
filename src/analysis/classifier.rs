// Classifier - nearest-template phrase classification
//
// Compares a query sequence against every stored template with normalized
// DTW distance and reports the closest one. Iteration order comes from the
// TemplateStore (lexical labels, then insertion order) and only a strictly
// smaller distance replaces the current best, so the first-encountered
// minimum wins and results are reproducible.

use serde::{Deserialize, Serialize};

use super::dtw::DtwMatcher;
use super::features::FeatureSequence;
use crate::config::MatchingConfig;
use crate::error::AnalysisError;
use crate::templates::TemplateStore;

/// Closest template for one query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Phrase label of the winning template
    pub label: String,
    /// Normalized DTW distance (>= 0, lower is more similar)
    pub distance: f32,
    /// Index of the winning template within its label
    pub template_index: usize,
    /// Alignment path length behind `distance`
    pub path_len: usize,
}

/// Outcome of the threshold policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", content = "result", rename_all = "snake_case")]
pub enum Decision {
    /// Within threshold (or no threshold configured)
    Accepted(MatchResult),
    /// Nearest template is still too far away; reported as "no match"
    Rejected(MatchResult),
}

impl Decision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Decision::Accepted(_))
    }

    pub fn result(&self) -> &MatchResult {
        match self {
            Decision::Accepted(result) | Decision::Rejected(result) => result,
        }
    }

    pub fn into_result(self) -> MatchResult {
        match self {
            Decision::Accepted(result) | Decision::Rejected(result) => result,
        }
    }
}

/// Nearest-template classifier with optional rejection threshold
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    matcher: DtwMatcher,
    threshold: Option<f32>,
}

impl Classifier {
    pub fn new(matcher: DtwMatcher, threshold: Option<f32>) -> Self {
        Self { matcher, threshold }
    }

    pub fn from_config(config: &MatchingConfig) -> Self {
        Self::new(DtwMatcher::from_radius(config.band_radius), config.threshold)
    }

    pub fn threshold(&self) -> Option<f32> {
        self.threshold
    }

    pub fn matcher(&self) -> &DtwMatcher {
        &self.matcher
    }

    /// Find the closest template to `query`
    ///
    /// # Errors
    /// * `EmptyStore` - the store holds no templates
    /// * `EmptySequence` / `InvalidInput` - from the matcher (empty query,
    ///   coefficient count differing from the templates)
    pub fn classify(
        &self,
        query: &FeatureSequence,
        store: &TemplateStore,
    ) -> Result<MatchResult, AnalysisError> {
        let mut best: Option<MatchResult> = None;

        for template in store.iter() {
            let d = self.matcher.distance(query, template.sequence)?;
            let distance = d.normalized();
            let better = best.as_ref().map_or(true, |b| distance < b.distance);
            if better {
                best = Some(MatchResult {
                    label: template.label.to_string(),
                    distance,
                    template_index: template.index,
                    path_len: d.path_len,
                });
            }
        }

        best.ok_or(AnalysisError::EmptyStore)
    }

    /// Score every template, closest first.
    ///
    /// The sort is stable, so equal distances keep store iteration order and
    /// `rank(..)[0]` always equals `classify(..)`.
    pub fn rank(
        &self,
        query: &FeatureSequence,
        store: &TemplateStore,
    ) -> Result<Vec<MatchResult>, AnalysisError> {
        if store.is_empty() {
            return Err(AnalysisError::EmptyStore);
        }

        let mut scored = store
            .iter()
            .map(|template| {
                self.matcher
                    .distance(query, template.sequence)
                    .map(|d| MatchResult {
                        label: template.label.to_string(),
                        distance: d.normalized(),
                        template_index: template.index,
                        path_len: d.path_len,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        scored.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        Ok(scored)
    }

    /// Apply the threshold policy to a classification result.
    pub fn decide(&self, result: MatchResult) -> Decision {
        match self.threshold {
            Some(limit) if result.distance > limit => Decision::Rejected(result),
            _ => Decision::Accepted(result),
        }
    }

    /// `classify` followed by `decide`.
    pub fn evaluate(
        &self,
        query: &FeatureSequence,
        store: &TemplateStore,
    ) -> Result<Decision, AnalysisError> {
        self.classify(query, store).map(|result| self.decide(result))
    }
}

#[cfg(test)]
#[path = "classifier_tests.rs"]
mod tests;
