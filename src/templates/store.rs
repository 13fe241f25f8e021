// TemplateStore - per-label reference sequences
//
// Populated once by the loader, then frozen behind an `Arc` and shared with
// the capture worker. Iteration order is fixed: labels lexically (BTreeMap),
// templates within a label in insertion order.

use std::collections::BTreeMap;

use crate::analysis::features::FeatureSequence;
use crate::error::AnalysisError;

/// Borrowed view of one stored template
#[derive(Debug, Clone, Copy)]
pub struct TemplateRef<'a> {
    pub label: &'a str,
    /// Position within the label's template list
    pub index: usize,
    pub sequence: &'a FeatureSequence,
}

/// Reference feature sequences grouped by phrase label
#[derive(Debug, Clone, Default)]
pub struct TemplateStore {
    templates: BTreeMap<String, Vec<FeatureSequence>>,
}

impl TemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a template under `label`.
    ///
    /// All templates in a store must share a coefficient count; a sequence
    /// whose width differs from the first stored template is rejected.
    pub fn insert(
        &mut self,
        label: impl Into<String>,
        sequence: FeatureSequence,
    ) -> Result<(), AnalysisError> {
        if let Some(width) = self.frame_width() {
            if sequence.width() != width {
                return Err(AnalysisError::InconsistentFrames {
                    expected: width,
                    actual: sequence.width(),
                });
            }
        }
        self.templates.entry(label.into()).or_default().push(sequence);
        Ok(())
    }

    /// Coefficient count shared by every template, if any are stored
    pub fn frame_width(&self) -> Option<usize> {
        self.iter().next().map(|t| t.sequence.width())
    }

    /// Total number of templates across labels
    pub fn len(&self) -> usize {
        self.templates.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Labels in lexical order
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    pub fn get(&self, label: &str) -> Option<&[FeatureSequence]> {
        self.templates.get(label).map(Vec::as_slice)
    }

    /// Every template in classification order
    pub fn iter(&self) -> impl Iterator<Item = TemplateRef<'_>> {
        self.templates.iter().flat_map(|(label, sequences)| {
            sequences
                .iter()
                .enumerate()
                .map(move |(index, sequence)| TemplateRef {
                    label: label.as_str(),
                    index,
                    sequence,
                })
        })
    }

    /// `(label, template count)` pairs for reporting
    pub fn summary(&self) -> Vec<(String, usize)> {
        self.templates
            .iter()
            .map(|(label, sequences)| (label.clone(), sequences.len()))
            .collect()
    }
}
