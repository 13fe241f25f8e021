// FFT module - windowed power spectrum
//
// Applies a periodic Hann window and returns |X[k]|^2 for the
// non-negative frequency bins of a real-valued frame.

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// FFT processor that computes power spectra from audio windows
pub struct FftProcessor {
    fft: Arc<dyn Fft<f32>>,
    fft_size: usize,
    /// Hann window (pre-computed)
    window: Vec<f32>,
}

impl FftProcessor {
    /// Create a new FFT processor
    ///
    /// # Arguments
    /// * `fft_size` - FFT window size in samples
    pub fn new(fft_size: usize) -> Self {
        // Periodic Hann: matches the window librosa/scipy use for STFTs
        let window = (0..fft_size)
            .map(|i| {
                0.5 * (1.0 - ((2.0 * std::f32::consts::PI * i as f32) / fft_size as f32).cos())
            })
            .collect();

        let fft = FftPlanner::new().plan_fft_forward(fft_size);

        Self {
            fft,
            fft_size,
            window,
        }
    }

    /// Number of bins returned by [`power_spectrum`](Self::power_spectrum)
    pub fn bins(&self) -> usize {
        self.fft_size / 2 + 1
    }

    /// Compute the power spectrum of one frame.
    ///
    /// Frames shorter than `fft_size` are zero-padded; longer ones are
    /// truncated.
    pub fn power_spectrum(&self, frame: &[f32]) -> Vec<f32> {
        let mut buffer: Vec<Complex<f32>> = self
            .window
            .iter()
            .enumerate()
            .map(|(i, w)| Complex::new(frame.get(i).copied().unwrap_or(0.0) * w, 0.0))
            .collect();

        self.fft.process(&mut buffer);

        buffer[..self.bins()].iter().map(|c| c.norm_sqr()).collect()
    }
}
