// Error types for the phrase matcher
//
// This module defines custom error types for audio capture, feature analysis
// and template loading, providing structured error handling with numeric codes
// suitable for logs and CLI exit reporting.

mod analysis;
mod audio;
mod template;

pub use analysis::{log_analysis_error, AnalysisError, AnalysisErrorCodes};
pub use audio::{log_audio_error, AudioError, AudioErrorCodes};
pub use template::{log_template_error, TemplateError, TemplateErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the library and the CLI.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
