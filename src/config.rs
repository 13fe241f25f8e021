//! Configuration management for the capture and matching pipeline
//!
//! All parameters are enumerated at startup from a JSON file (falling back to
//! defaults) and may be overridden by CLI flags. There is no runtime
//! reconfiguration: a session takes a snapshot of the config when it starts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub features: FeatureConfig,
    pub matching: MatchingConfig,
    pub capture: CaptureConfig,
    pub templates: TemplateConfig,
    pub actions: ActionConfig,
}

/// Audio device and block transport configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate templates and queries are analysed at
    pub sample_rate: u32,
    /// Samples per block handed from the device callback to the worker
    pub block_size: usize,
    /// Index into the host's input device list; `None` uses the default device
    pub device_index: Option<usize>,
    /// Maximum unconsumed blocks before the worker sheds the oldest
    pub queue_capacity: usize,
    /// Pre-allocated block buffers shared between callback and worker
    pub buffer_pool_size: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            block_size: 1024,
            device_index: None,
            queue_capacity: 32,
            buffer_pool_size: 64,
        }
    }
}

/// Feature extraction parameters (shared by templates and queries)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Analysis window length in samples
    pub n_fft: usize,
    /// Hop between analysis windows in samples
    pub hop_length: usize,
    /// Mel filterbank bands
    pub n_mels: usize,
    /// Cepstral coefficients kept per frame (before `drop_energy`)
    pub n_coefficients: usize,
    /// Discard coefficient 0
    pub drop_energy: bool,
    /// Keep every n-th frame after normalization
    pub decimation: usize,
    /// Floor for the per-coefficient standard deviation
    pub std_epsilon: f32,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            n_fft: 2048,
            hop_length: 512,
            n_mels: 128,
            n_coefficients: 13,
            drop_energy: false,
            decimation: 1,
            std_epsilon: 1e-6,
        }
    }
}

/// DTW matching and decision policy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Sakoe-Chiba band radius in frames; `None` searches the full matrix
    pub band_radius: Option<usize>,
    /// Normalized distance above which a result is reported as no match
    pub threshold: Option<f32>,
}

/// How capture is started
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    /// One fixed-length capture per external trigger
    #[default]
    Triggered,
    /// Sliding window classified indefinitely
    Continuous,
}

impl std::fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureMode::Triggered => write!(f, "triggered"),
            CaptureMode::Continuous => write!(f, "continuous"),
        }
    }
}

impl std::str::FromStr for CaptureMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "triggered" => Ok(CaptureMode::Triggered),
            "continuous" => Ok(CaptureMode::Continuous),
            other => Err(format!(
                "unknown capture mode '{}' (expected triggered or continuous)",
                other
            )),
        }
    }
}

/// Capture window configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub mode: CaptureMode,
    /// Length of a triggered recording
    pub duration_ms: u64,
    /// Ring buffer length in continuous mode
    pub window_ms: u64,
    /// New audio required between continuous classifications
    pub hop_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            mode: CaptureMode::Triggered,
            duration_ms: 5000,
            window_ms: 2000,
            hop_ms: 500,
        }
    }
}

impl CaptureConfig {
    /// Samples in a triggered capture at `sample_rate`.
    pub fn capture_samples(&self, sample_rate: u32) -> usize {
        ms_to_samples(self.duration_ms, sample_rate)
    }

    /// Ring buffer capacity at `sample_rate`.
    pub fn window_samples(&self, sample_rate: u32) -> usize {
        ms_to_samples(self.window_ms, sample_rate)
    }

    pub fn hop_samples(&self, sample_rate: u32) -> usize {
        ms_to_samples(self.hop_ms, sample_rate).max(1)
    }
}

fn ms_to_samples(ms: u64, sample_rate: u32) -> usize {
    (ms * sample_rate as u64 / 1000) as usize
}

/// Where reference recordings live
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    /// Root directory with one subdirectory per label
    pub directory: PathBuf,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("templates"),
        }
    }
}

/// Label to shell command mapping run for accepted matches
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionConfig {
    pub commands: BTreeMap<String, String>,
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// Missing or malformed files are logged and replaced by defaults so a
    /// device without a config file still starts.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Reject parameter combinations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        let f = &self.features;
        if self.audio.sample_rate == 0 {
            return Err("audio.sample_rate must be greater than 0".to_string());
        }
        if self.audio.block_size == 0 {
            return Err("audio.block_size must be greater than 0".to_string());
        }
        if self.audio.queue_capacity == 0 || self.audio.buffer_pool_size == 0 {
            return Err("audio.queue_capacity and audio.buffer_pool_size must be non-zero".to_string());
        }
        if f.n_fft == 0 || f.hop_length == 0 || f.n_mels == 0 {
            return Err("features.n_fft, hop_length and n_mels must be non-zero".to_string());
        }
        if f.n_coefficients == 0 || f.n_coefficients > f.n_mels {
            return Err(format!(
                "features.n_coefficients must be in 1..={} (got {})",
                f.n_mels, f.n_coefficients
            ));
        }
        if f.drop_energy && f.n_coefficients == 1 {
            return Err("features.drop_energy leaves no coefficients".to_string());
        }
        if f.decimation == 0 {
            return Err("features.decimation must be at least 1".to_string());
        }
        let rate = self.audio.sample_rate;
        if self.capture.capture_samples(rate) < f.n_fft {
            return Err("capture.duration_ms is shorter than one analysis window".to_string());
        }
        if self.capture.window_samples(rate) < f.n_fft {
            return Err("capture.window_ms is shorter than one analysis window".to_string());
        }
        Ok(())
    }
}
