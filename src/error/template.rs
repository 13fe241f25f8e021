// Template loading errors

use crate::error::{AnalysisError, ErrorCode};
use log::error;
use std::fmt;
use std::path::PathBuf;

/// Template error code constants
///
/// Error code range: 3001-3006
pub struct TemplateErrorCodes {}

impl TemplateErrorCodes {
    /// Template directory missing or unreadable
    pub const DIRECTORY_UNREADABLE: i32 = 3001;

    /// WAV file could not be decoded
    pub const AUDIO_DECODE_FAILED: i32 = 3002;

    /// JSON template could not be parsed or written
    pub const SERIALIZATION_FAILED: i32 = 3003;

    /// Feature extraction on a template recording failed
    pub const EXTRACTION_FAILED: i32 = 3004;

    /// Loading finished with zero usable templates
    pub const NO_TEMPLATES: i32 = 3005;

    /// Pre-computed features came from different extraction settings
    pub const EXTRACTION_MISMATCH: i32 = 3006;
}

/// Log a template error with structured context.
pub fn log_template_error(err: &TemplateError, context: &str) {
    error!(
        "Template error in {}: code={}, component=TemplateLoader, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised while building a template store from disk.
///
/// Per-file variants are recoverable (the loader skips the file);
/// `NoTemplates` is startup-fatal.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateError {
    DirectoryUnreadable { path: PathBuf, reason: String },
    AudioDecodeFailed { path: PathBuf, reason: String },
    SerializationFailed { path: PathBuf, reason: String },
    ExtractionFailed { path: PathBuf, source: AnalysisError },
    NoTemplates { path: PathBuf },
    ExtractionMismatch { path: PathBuf, reason: String },
}

impl ErrorCode for TemplateError {
    fn code(&self) -> i32 {
        match self {
            TemplateError::DirectoryUnreadable { .. } => TemplateErrorCodes::DIRECTORY_UNREADABLE,
            TemplateError::AudioDecodeFailed { .. } => TemplateErrorCodes::AUDIO_DECODE_FAILED,
            TemplateError::SerializationFailed { .. } => TemplateErrorCodes::SERIALIZATION_FAILED,
            TemplateError::ExtractionFailed { .. } => TemplateErrorCodes::EXTRACTION_FAILED,
            TemplateError::NoTemplates { .. } => TemplateErrorCodes::NO_TEMPLATES,
            TemplateError::ExtractionMismatch { .. } => TemplateErrorCodes::EXTRACTION_MISMATCH,
        }
    }

    fn message(&self) -> String {
        match self {
            TemplateError::DirectoryUnreadable { path, reason } => {
                format!("Cannot read template directory {}: {}", path.display(), reason)
            }
            TemplateError::AudioDecodeFailed { path, reason } => {
                format!("Cannot decode {}: {}", path.display(), reason)
            }
            TemplateError::SerializationFailed { path, reason } => {
                format!("Invalid template file {}: {}", path.display(), reason)
            }
            TemplateError::ExtractionFailed { path, source } => {
                format!("Feature extraction failed for {}: {}", path.display(), source.message())
            }
            TemplateError::NoTemplates { path } => {
                format!("No templates found under {}", path.display())
            }
            TemplateError::ExtractionMismatch { path, reason } => {
                format!("Template {} does not match the live extractor: {}", path.display(), reason)
            }
        }
    }
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TemplateError (code {}): {}", self.code(), self.message())
    }
}

impl std::error::Error for TemplateError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_templates_message() {
        let err = TemplateError::NoTemplates {
            path: PathBuf::from("templates"),
        };
        assert_eq!(err.code(), TemplateErrorCodes::NO_TEMPLATES);
        assert_eq!(err.message(), "No templates found under templates");
    }

    #[test]
    fn test_extraction_failure_wraps_analysis_message() {
        let err = TemplateError::ExtractionFailed {
            path: PathBuf::from("yes/a.wav"),
            source: AnalysisError::InvalidInput {
                reason: "too short".to_string(),
            },
        };
        assert!(err.to_string().contains("too short"));
        assert!(err.to_string().contains("3004"));
    }
}
