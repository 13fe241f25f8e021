// Analysis module - feature extraction, DTW and nearest-template classification
//
// Pipeline for one window of PCM audio:
// - FeatureExtractor: framing -> power spectrum -> mel -> dB -> DCT -> standardize
// - DtwMatcher: alignment cost between two feature sequences
// - Classifier: nearest template over a TemplateStore, plus threshold policy
//
// Everything here is pure computation over borrowed inputs; the capture
// worker calls it off the audio thread.

pub mod classifier;
pub mod dtw;
pub mod features;

pub use classifier::{Classifier, Decision, MatchResult};
pub use dtw::{DtwDistance, DtwMatcher};
pub use features::{FeatureExtractor, FeatureFrame, FeatureSequence};
