// FeatureExtractor - MFCC-equivalent feature sequences for phrase matching
//
// Module organization:
// - types: FeatureSequence / FeatureFrame
// - fft: Hann-windowed power spectrum
// - mel: Slaney mel filterbank
// - cepstral: power-to-dB and orthonormal DCT-II
// - normalize: per-coefficient standardization and decimation
// - mod.rs: Coordinator (FeatureExtractor)
//
// Pipeline per input window:
// 1. Frame the signal (n_fft samples, hop_length apart, no centering)
// 2. Power spectrum -> mel bands
// 3. dB scale with a global 80 dB floor
// 4. DCT-II, keep the first n_coefficients (optionally drop c0)
// 5. Standardize each coefficient over the sequence, then decimate
//
// Templates and queries must go through the same extractor configuration,
// otherwise distances are not comparable.

mod cepstral;
mod fft;
mod mel;
pub mod normalize;
mod types;

pub use types::{FeatureFrame, FeatureSequence};

use cepstral::{power_to_db, Dct};
use fft::FftProcessor;
use mel::MelFilterbank;

use crate::config::FeatureConfig;
use crate::error::AnalysisError;

/// FeatureExtractor coordinates the cepstral feature pipeline
///
/// Holds pre-planned FFT, filterbank and DCT tables; `extract` takes `&self`
/// so one extractor can be shared between the template loader and the
/// capture worker.
pub struct FeatureExtractor {
    sample_rate: u32,
    config: FeatureConfig,
    fft_processor: FftProcessor,
    filterbank: MelFilterbank,
    dct: Dct,
}

impl FeatureExtractor {
    /// Create an extractor for audio at `sample_rate`
    ///
    /// # Errors
    /// `InvalidInput` when the parameters cannot produce a frame
    /// (zero sizes, more coefficients than mel bands, zero decimation).
    pub fn new(sample_rate: u32, config: FeatureConfig) -> Result<Self, AnalysisError> {
        let invalid = |reason: &str| AnalysisError::InvalidInput {
            reason: reason.to_string(),
        };
        if sample_rate == 0 {
            return Err(invalid("sample rate must be non-zero"));
        }
        if config.n_fft == 0 || config.hop_length == 0 || config.n_mels == 0 {
            return Err(invalid("n_fft, hop_length and n_mels must be non-zero"));
        }
        if config.n_coefficients == 0 || config.n_coefficients > config.n_mels {
            return Err(invalid("n_coefficients must be between 1 and n_mels"));
        }
        if config.drop_energy && config.n_coefficients < 2 {
            return Err(invalid("drop_energy needs at least two coefficients"));
        }
        if config.decimation == 0 {
            return Err(invalid("decimation stride must be at least 1"));
        }

        Ok(Self {
            sample_rate,
            fft_processor: FftProcessor::new(config.n_fft),
            filterbank: MelFilterbank::new(sample_rate, config.n_fft, config.n_mels),
            dct: Dct::new(config.n_mels, config.n_coefficients),
            config,
        })
    }

    /// Extractor with default parameters at `sample_rate`
    pub fn with_defaults(sample_rate: u32) -> Result<Self, AnalysisError> {
        Self::new(sample_rate, FeatureConfig::default())
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Minimum number of samples `extract` accepts
    pub fn min_samples(&self) -> usize {
        self.config.n_fft
    }

    /// Coefficients per output frame
    pub fn frame_width(&self) -> usize {
        self.config.n_coefficients - usize::from(self.config.drop_energy)
    }

    /// Number of frames `extract` produces for `n_samples` input samples
    pub fn frame_count(&self, n_samples: usize) -> usize {
        if n_samples < self.config.n_fft {
            return 0;
        }
        let frames = 1 + (n_samples - self.config.n_fft) / self.config.hop_length;
        frames.div_ceil(self.config.decimation)
    }

    /// Convert a PCM window into a normalized feature sequence
    ///
    /// # Errors
    /// * `InvalidInput` - empty input or fewer than `n_fft` samples
    /// * `SampleRateMismatch` - `sample_rate` differs from the extractor's rate
    pub fn extract(
        &self,
        samples: &[f32],
        sample_rate: u32,
    ) -> Result<FeatureSequence, AnalysisError> {
        if samples.is_empty() {
            return Err(AnalysisError::InvalidInput {
                reason: "empty sample window".to_string(),
            });
        }
        if sample_rate != self.sample_rate {
            return Err(AnalysisError::SampleRateMismatch {
                expected: self.sample_rate,
                actual: sample_rate,
            });
        }
        if samples.len() < self.config.n_fft {
            return Err(AnalysisError::InvalidInput {
                reason: format!(
                    "window of {} samples is shorter than n_fft={}",
                    samples.len(),
                    self.config.n_fft
                ),
            });
        }

        let mut mel_frames: Vec<Vec<f32>> = samples
            .windows(self.config.n_fft)
            .step_by(self.config.hop_length)
            .map(|frame| {
                let power = self.fft_processor.power_spectrum(frame);
                self.filterbank.apply(&power)
            })
            .collect();

        power_to_db(&mut mel_frames);

        let skip = usize::from(self.config.drop_energy);
        let mut frames: Vec<FeatureFrame> = mel_frames
            .iter()
            .map(|bands| {
                let mut coefficients = self.dct.transform(bands);
                coefficients.drain(..skip);
                coefficients
            })
            .collect();

        normalize::standardize(&mut frames, self.config.std_epsilon);
        let frames = normalize::decimate(frames, self.config.decimation);

        FeatureSequence::new(frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::signals::{sine_wave, white_noise};

    const RATE: u32 = 16_000;

    #[test]
    fn test_one_second_shape() {
        let extractor = FeatureExtractor::with_defaults(RATE).unwrap();
        let audio = sine_wave(440.0, 1.0, RATE, 0.5);
        let seq = extractor.extract(&audio, RATE).unwrap();
        // (16000 - 2048) / 512 + 1
        assert_eq!(seq.len(), 28);
        assert_eq!(seq.width(), 13);
        assert_eq!(extractor.frame_count(audio.len()), 28);
    }

    #[test]
    fn test_drop_energy_and_decimation() {
        let config = FeatureConfig {
            drop_energy: true,
            decimation: 2,
            ..FeatureConfig::default()
        };
        let extractor = FeatureExtractor::new(RATE, config).unwrap();
        let audio = sine_wave(440.0, 1.0, RATE, 0.5);
        let seq = extractor.extract(&audio, RATE).unwrap();
        assert_eq!(seq.len(), 14);
        assert_eq!(seq.width(), 12);
        assert_eq!(extractor.frame_width(), 12);
        assert_eq!(extractor.frame_count(audio.len()), 14);
    }

    #[test]
    fn test_rejects_empty_and_short_input() {
        let extractor = FeatureExtractor::with_defaults(RATE).unwrap();
        assert!(matches!(
            extractor.extract(&[], RATE),
            Err(AnalysisError::InvalidInput { .. })
        ));
        assert!(matches!(
            extractor.extract(&[0.1; 2047], RATE),
            Err(AnalysisError::InvalidInput { .. })
        ));
        assert!(extractor.extract(&[0.1; 2048], RATE).is_ok());
    }

    #[test]
    fn test_rejects_rate_mismatch() {
        let extractor = FeatureExtractor::with_defaults(RATE).unwrap();
        let audio = sine_wave(440.0, 1.0, 44_100, 0.5);
        let err = extractor.extract(&audio, 44_100).unwrap_err();
        assert_eq!(
            err,
            AnalysisError::SampleRateMismatch {
                expected: RATE,
                actual: 44_100
            }
        );
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_output_is_standardized_and_renormalization_is_stable() {
        let extractor = FeatureExtractor::with_defaults(RATE).unwrap();
        let audio = white_noise(1.0, RATE, 0.3, 7);
        let seq = extractor.extract(&audio, RATE).unwrap();

        let mut again = seq.clone().into_frames();
        normalize::standardize(&mut again, 1e-6);
        for (a, b) in seq.frames().iter().flatten().zip(again.iter().flatten()) {
            assert!((a - b).abs() < 1e-4, "{a} vs {b}");
        }

        for k in 0..seq.width() {
            let mean: f32 = seq.frames().iter().map(|f| f[k]).sum::<f32>() / seq.len() as f32;
            assert!(mean.abs() < 1e-4);
        }
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let extractor = FeatureExtractor::with_defaults(RATE).unwrap();
        let audio = white_noise(0.5, RATE, 0.3, 11);
        let a = extractor.extract(&audio, RATE).unwrap();
        let b = extractor.extract(&audio, RATE).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_parameters() {
        let config = FeatureConfig {
            n_coefficients: 129,
            ..FeatureConfig::default()
        };
        assert!(FeatureExtractor::new(RATE, config).is_err());
        let config = FeatureConfig {
            decimation: 0,
            ..FeatureConfig::default()
        };
        assert!(FeatureExtractor::new(RATE, config).is_err());
    }
}
