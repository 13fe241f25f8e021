// Types module - feature frames and sequences
//
// A FeatureSequence is time-major: `frames[t][k]` is coefficient k of
// analysis window t. Every frame in a sequence has the same length.

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// One analysis window worth of cepstral coefficients
pub type FeatureFrame = Vec<f32>;

/// Ordered, non-empty sequence of equal-length feature frames
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<FeatureFrame>", into = "Vec<FeatureFrame>")]
pub struct FeatureSequence {
    frames: Vec<FeatureFrame>,
}

impl FeatureSequence {
    /// Build a sequence, checking the shared-width invariant.
    ///
    /// Fails with `EmptySequence` for zero frames and `InconsistentFrames`
    /// when any frame's width differs from the first.
    pub fn new(frames: Vec<FeatureFrame>) -> Result<Self, AnalysisError> {
        let width = frames.first().map(Vec::len).ok_or(AnalysisError::EmptySequence)?;
        if width == 0 {
            return Err(AnalysisError::InvalidInput {
                reason: "feature frames have no coefficients".to_string(),
            });
        }
        if let Some(bad) = frames.iter().find(|frame| frame.len() != width) {
            return Err(AnalysisError::InconsistentFrames {
                expected: width,
                actual: bad.len(),
            });
        }
        Ok(Self { frames })
    }

    pub fn frames(&self) -> &[FeatureFrame] {
        &self.frames
    }

    /// Number of frames (time axis)
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Always false for a constructed sequence; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Coefficients per frame
    pub fn width(&self) -> usize {
        self.frames[0].len()
    }

    pub fn into_frames(self) -> Vec<FeatureFrame> {
        self.frames
    }
}

impl TryFrom<Vec<FeatureFrame>> for FeatureSequence {
    type Error = AnalysisError;

    fn try_from(frames: Vec<FeatureFrame>) -> Result<Self, Self::Error> {
        FeatureSequence::new(frames)
    }
}

impl From<FeatureSequence> for Vec<FeatureFrame> {
    fn from(sequence: FeatureSequence) -> Self {
        sequence.frames
    }
}
