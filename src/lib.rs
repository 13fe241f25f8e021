// Phrase Matcher Core - spoken phrase recognition by template matching
// Captures audio off a lock-free device callback, extracts cepstral features
// and picks the nearest stored template with dynamic time warping.

// Module declarations
pub mod analysis;
pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod telemetry;
pub mod templates;
pub mod testing;

// Re-exports for convenience
pub use analysis::{Classifier, FeatureExtractor, FeatureSequence, MatchResult};
pub use config::{AppConfig, CaptureMode};
pub use engine::{ClassificationEvent, PipelineSession, TriggerOutcome};
pub use templates::{load_directory, TemplateStore};

use tracing_subscriber::EnvFilter;

/// Install the process-wide tracing subscriber.
///
/// Honours `RUST_LOG`, defaulting to `info`. `log` records from dependencies
/// are picked up through tracing's log compatibility. Calling this twice is
/// harmless; the second call is ignored.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging();
        init_logging();
    }
}
