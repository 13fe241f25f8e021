// Analysis error types: feature extraction, matching and classification

use crate::error::ErrorCode;
use log::warn;
use std::fmt;

/// Analysis error code constants
///
/// Error code range: 2001-2004
pub struct AnalysisErrorCodes {}

impl AnalysisErrorCodes {
    /// Audio window unusable for extraction (empty, short or wrong rate)
    pub const INVALID_INPUT: i32 = 2001;

    /// A feature sequence with zero frames reached the matcher
    pub const EMPTY_SEQUENCE: i32 = 2002;

    /// Classification attempted against a store with no templates
    pub const EMPTY_STORE: i32 = 2003;

    /// Frames within or across sequences disagree on coefficient count
    pub const INCONSISTENT_FRAMES: i32 = 2004;
}

/// Log an analysis error.
///
/// Analysis failures only cost the current window, so they are logged at
/// warn level rather than error.
pub fn log_analysis_error(err: &AnalysisError, context: &str) {
    warn!(
        "Analysis error in {}: code={}, component=Analysis, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised by the feature/matching pipeline.
///
/// None of these are fatal: the dispatcher drops the affected window and
/// keeps listening.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// Audio window cannot be turned into features
    InvalidInput { reason: String },

    /// Input sample rate differs from the extractor's configured rate
    SampleRateMismatch { expected: u32, actual: u32 },

    /// A sequence had zero frames
    EmptySequence,

    /// No templates to compare against
    EmptyStore,

    /// Coefficient counts disagree
    InconsistentFrames { expected: usize, actual: usize },
}

impl AnalysisError {
    /// True for the errors that mean "bad window" rather than "nothing to match".
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            AnalysisError::InvalidInput { .. } | AnalysisError::SampleRateMismatch { .. }
        )
    }
}

impl ErrorCode for AnalysisError {
    fn code(&self) -> i32 {
        match self {
            AnalysisError::InvalidInput { .. } | AnalysisError::SampleRateMismatch { .. } => {
                AnalysisErrorCodes::INVALID_INPUT
            }
            AnalysisError::EmptySequence => AnalysisErrorCodes::EMPTY_SEQUENCE,
            AnalysisError::EmptyStore => AnalysisErrorCodes::EMPTY_STORE,
            AnalysisError::InconsistentFrames { .. } => AnalysisErrorCodes::INCONSISTENT_FRAMES,
        }
    }

    fn message(&self) -> String {
        match self {
            AnalysisError::InvalidInput { reason } => format!("Invalid input: {}", reason),
            AnalysisError::SampleRateMismatch { expected, actual } => format!(
                "Invalid input: sample rate {} Hz does not match extractor rate {} Hz",
                actual, expected
            ),
            AnalysisError::EmptySequence => "Feature sequence has no frames".to_string(),
            AnalysisError::EmptyStore => "Template store is empty".to_string(),
            AnalysisError::InconsistentFrames { expected, actual } => format!(
                "Frame has {} coefficients, expected {}",
                actual, expected
            ),
        }
    }
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AnalysisError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for AnalysisError {}
