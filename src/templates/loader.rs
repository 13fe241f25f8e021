//! Template directory loader.
//!
//! Layout: one subdirectory per phrase label, holding reference recordings
//! (`*.wav`) and/or pre-computed feature files (`*.json`, written by
//! [`save_template`]). Every recording goes through the same
//! [`FeatureExtractor`] the live pipeline uses, and a feature file is only
//! admitted when it records exactly the live extractor's rate and settings.
//!
//! ```text
//! templates/
//!   lights_on/  take1.wav  take2.wav
//!   lights_off/ take1.json
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::analysis::features::{FeatureExtractor, FeatureSequence};
use crate::audio::resample::resample;
use crate::audio::wav::read_wav;
use crate::config::FeatureConfig;
use crate::error::{log_template_error, TemplateError};

use super::store::TemplateStore;

/// On-disk form of a pre-computed template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateFile {
    pub label: String,
    /// Extractor rate the features were computed at
    pub sample_rate: u32,
    /// Extraction settings the features were computed with
    pub extraction: FeatureConfig,
    pub features: FeatureSequence,
}

/// Build a store from `dir`.
///
/// Labels are visited in lexical order and files within a label sorted by
/// name, so the resulting store is identical across runs. Unreadable or
/// mismatched files are logged and skipped.
///
/// # Errors
/// `DirectoryUnreadable` when `dir` cannot be listed, `NoTemplates` when no
/// file produced a template.
pub fn load_directory(dir: &Path, extractor: &FeatureExtractor) -> Result<TemplateStore, TemplateError> {
    let mut store = TemplateStore::new();

    for label_dir in sorted_entries(dir)? {
        if !label_dir.is_dir() {
            tracing::debug!("[Templates] Ignoring {} (not a label directory)", label_dir.display());
            continue;
        }
        let Some(label) = label_dir.file_name().and_then(|n| n.to_str()).map(str::to_owned) else {
            continue;
        };

        let files = match sorted_entries(&label_dir) {
            Ok(files) => files,
            Err(err) => {
                log_template_error(&err, "load_directory");
                continue;
            }
        };

        for path in files {
            let loaded = match extension(&path).as_deref() {
                Some("wav") => load_wav(&path, extractor),
                Some("json") => load_json(&path, extractor),
                _ => continue,
            };

            match loaded.and_then(|sequence| {
                store
                    .insert(label.clone(), sequence)
                    .map_err(|source| TemplateError::ExtractionFailed {
                        path: path.clone(),
                        source,
                    })
            }) {
                Ok(()) => tracing::debug!("[Templates] Loaded '{}' from {}", label, path.display()),
                Err(err) => {
                    tracing::warn!("[Templates] Skipping {}: {}", path.display(), err);
                }
            }
        }
    }

    if store.is_empty() {
        return Err(TemplateError::NoTemplates {
            path: dir.to_path_buf(),
        });
    }

    for (label, count) in store.summary() {
        tracing::info!("[Templates] '{}': {} template(s)", label, count);
    }
    Ok(store)
}

/// Decode a recording and extract its features at the extractor's rate.
pub fn load_wav(path: &Path, extractor: &FeatureExtractor) -> Result<FeatureSequence, TemplateError> {
    let decode_failed = |reason: String| TemplateError::AudioDecodeFailed {
        path: path.to_path_buf(),
        reason,
    };
    let (samples, rate) = read_wav(path).map_err(|err| decode_failed(err.to_string()))?;

    let target = extractor.sample_rate();
    let samples = if rate != target {
        tracing::debug!("[Templates] Resampling {} from {} Hz to {} Hz", path.display(), rate, target);
        resample(&samples, rate, target).map_err(|err| decode_failed(err.to_string()))?
    } else {
        samples
    };

    extractor
        .extract(&samples, target)
        .map_err(|source| TemplateError::ExtractionFailed {
            path: path.to_path_buf(),
            source,
        })
}

fn load_json(path: &Path, extractor: &FeatureExtractor) -> Result<FeatureSequence, TemplateError> {
    let contents = fs::read_to_string(path).map_err(|err| TemplateError::SerializationFailed {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;
    let file: TemplateFile =
        serde_json::from_str(&contents).map_err(|err| TemplateError::SerializationFailed {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;

    let mismatch = |reason: String| TemplateError::ExtractionMismatch {
        path: path.to_path_buf(),
        reason,
    };
    if file.sample_rate != extractor.sample_rate() {
        return Err(mismatch(format!(
            "features computed at {} Hz, extractor runs at {} Hz",
            file.sample_rate,
            extractor.sample_rate()
        )));
    }
    if &file.extraction != extractor.config() {
        return Err(mismatch(format!(
            "extracted with {:?}, extractor uses {:?}",
            file.extraction,
            extractor.config()
        )));
    }
    if file.features.width() != extractor.frame_width() {
        return Err(mismatch(format!(
            "{} coefficients per frame, extractor produces {}",
            file.features.width(),
            extractor.frame_width()
        )));
    }
    Ok(file.features)
}

/// Write a pre-computed template that [`load_directory`] can read back.
///
/// The extractor's rate and settings are recorded alongside the frames so
/// a later load can refuse them if the live extractor differs.
pub fn save_template(
    path: &Path,
    label: &str,
    features: &FeatureSequence,
    extractor: &FeatureExtractor,
) -> Result<(), TemplateError> {
    let file = TemplateFile {
        label: label.to_string(),
        sample_rate: extractor.sample_rate(),
        extraction: extractor.config().clone(),
        features: features.clone(),
    };
    let failed = |reason: String| TemplateError::SerializationFailed {
        path: path.to_path_buf(),
        reason,
    };

    let json = serde_json::to_string_pretty(&file).map_err(|err| failed(err.to_string()))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| failed(err.to_string()))?;
    }
    fs::write(path, json).map_err(|err| failed(err.to_string()))
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, TemplateError> {
    let unreadable = |reason: String| TemplateError::DirectoryUnreadable {
        path: dir.to_path_buf(),
        reason,
    };
    let mut entries = fs::read_dir(dir)
        .map_err(|err| unreadable(err.to_string()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| unreadable(err.to_string()))?;
    entries.sort();
    Ok(entries)
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}
