// Audio error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;
use std::path::PathBuf;

/// Audio error code constants
///
/// Error code range: 1001-1009
pub struct AudioErrorCodes {}

impl AudioErrorCodes {
    /// Capture session is already running
    pub const ALREADY_RUNNING: i32 = 1001;

    /// Capture session is not running
    pub const NOT_RUNNING: i32 = 1002;

    /// Hardware error occurred
    pub const HARDWARE_ERROR: i32 = 1003;

    /// No input device matched the request
    pub const DEVICE_NOT_FOUND: i32 = 1004;

    /// Failed to open audio stream
    pub const STREAM_OPEN_FAILED: i32 = 1005;

    /// Mutex was poisoned
    pub const LOCK_POISONED: i32 = 1006;

    /// Audio stream disconnected or channel closed unexpectedly
    pub const STREAM_FAILURE: i32 = 1007;

    /// Sample-rate conversion could not be set up or run
    pub const RESAMPLE_FAILED: i32 = 1008;

    /// WAV file could not be read or written
    pub const WAV_FILE_FAILED: i32 = 1009;
}

/// Log an audio error with structured context
///
/// Emits error_code, component and message fields so failures can be
/// grepped out of long-running listener logs.
pub fn log_audio_error(err: &AudioError, context: &str) {
    error!(
        "Audio error in {}: code={}, component=Capture, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Audio-related errors
///
/// These errors cover capture session lifecycle, device lookup and
/// stream management.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioError {
    /// Capture session is already running
    AlreadyRunning,

    /// Capture session is not running
    NotRunning,

    /// Hardware error occurred
    HardwareError { details: String },

    /// No input device matched the request
    DeviceNotFound { index: Option<usize> },

    /// Failed to open audio stream
    StreamOpenFailed { reason: String },

    /// Mutex was poisoned
    LockPoisoned { component: String },

    /// Stream channel disconnected unexpectedly
    StreamFailure { reason: String },

    /// Sample-rate conversion failed
    ResampleFailed { reason: String },

    /// WAV decode or encode failed
    WavFileFailed { path: PathBuf, reason: String },
}

impl ErrorCode for AudioError {
    fn code(&self) -> i32 {
        match self {
            AudioError::AlreadyRunning => AudioErrorCodes::ALREADY_RUNNING,
            AudioError::NotRunning => AudioErrorCodes::NOT_RUNNING,
            AudioError::HardwareError { .. } => AudioErrorCodes::HARDWARE_ERROR,
            AudioError::DeviceNotFound { .. } => AudioErrorCodes::DEVICE_NOT_FOUND,
            AudioError::StreamOpenFailed { .. } => AudioErrorCodes::STREAM_OPEN_FAILED,
            AudioError::LockPoisoned { .. } => AudioErrorCodes::LOCK_POISONED,
            AudioError::StreamFailure { .. } => AudioErrorCodes::STREAM_FAILURE,
            AudioError::ResampleFailed { .. } => AudioErrorCodes::RESAMPLE_FAILED,
            AudioError::WavFileFailed { .. } => AudioErrorCodes::WAV_FILE_FAILED,
        }
    }

    fn message(&self) -> String {
        match self {
            AudioError::AlreadyRunning => {
                "Capture session already running. Call shutdown() first.".to_string()
            }
            AudioError::NotRunning => {
                "Capture session not running. Call start() first.".to_string()
            }
            AudioError::HardwareError { details } => {
                format!("Hardware error: {}", details)
            }
            AudioError::DeviceNotFound { index: Some(index) } => {
                format!("No input device at index {}", index)
            }
            AudioError::DeviceNotFound { index: None } => {
                "No default input device found".to_string()
            }
            AudioError::StreamOpenFailed { reason } => {
                format!("Failed to open audio stream: {}", reason)
            }
            AudioError::LockPoisoned { component } => {
                format!("Lock poisoned on {}", component)
            }
            AudioError::StreamFailure { reason } => {
                format!("Audio stream failed: {}", reason)
            }
            AudioError::ResampleFailed { reason } => {
                format!("Resampling failed: {}", reason)
            }
            AudioError::WavFileFailed { path, reason } => {
                format!("WAV file {}: {}", path.display(), reason)
            }
        }
    }
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AudioError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for AudioError {}

impl From<std::io::Error> for AudioError {
    fn from(err: std::io::Error) -> Self {
        AudioError::HardwareError {
            details: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_error_codes() {
        assert_eq!(
            AudioError::AlreadyRunning.code(),
            AudioErrorCodes::ALREADY_RUNNING
        );
        assert_eq!(AudioError::NotRunning.code(), AudioErrorCodes::NOT_RUNNING);
        assert_eq!(
            AudioError::DeviceNotFound { index: Some(3) }.code(),
            AudioErrorCodes::DEVICE_NOT_FOUND
        );
        assert_eq!(
            AudioError::StreamOpenFailed {
                reason: "busy".to_string()
            }
            .code(),
            AudioErrorCodes::STREAM_OPEN_FAILED
        );
    }

    #[test]
    fn test_device_not_found_message() {
        let err = AudioError::DeviceNotFound { index: Some(2) };
        assert_eq!(err.message(), "No input device at index 2");
        let err = AudioError::DeviceNotFound { index: None };
        assert!(err.message().contains("default input device"));
    }

    #[test]
    fn test_display_includes_code() {
        let err = AudioError::StreamFailure {
            reason: "disconnected".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("code 1007"));
        assert!(text.contains("disconnected"));
    }

    #[test]
    fn test_wav_file_error_names_path() {
        let err = AudioError::WavFileFailed {
            path: PathBuf::from("takes/one.wav"),
            reason: "unsupported bits_per_sample=12".to_string(),
        };
        assert_eq!(err.code(), AudioErrorCodes::WAV_FILE_FAILED);
        assert!(err.message().contains("takes/one.wav"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "device gone");
        let err: AudioError = io.into();
        assert_eq!(err.code(), AudioErrorCodes::HARDWARE_ERROR);
    }
}
