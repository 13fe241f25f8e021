// Mel filterbank (Slaney scale, area-normalized triangles)
//
// The Slaney mel scale is linear below 1 kHz and logarithmic above it.
// Each triangular filter is scaled by 2 / bandwidth so filters have
// approximately constant energy.

const F_SP: f64 = 200.0 / 3.0;
const MIN_LOG_HZ: f64 = 1000.0;
const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;

fn log_step() -> f64 {
    6.4_f64.ln() / 27.0
}

pub(crate) fn hz_to_mel(hz: f64) -> f64 {
    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    } else {
        hz / F_SP
    }
}

pub(crate) fn mel_to_hz(mel: f64) -> f64 {
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    } else {
        F_SP * mel
    }
}

/// Dense `n_mels x (n_fft/2 + 1)` filterbank spanning 0 Hz to Nyquist
pub struct MelFilterbank {
    weights: Vec<Vec<f32>>,
}

impl MelFilterbank {
    pub fn new(sample_rate: u32, n_fft: usize, n_mels: usize) -> Self {
        let bins = n_fft / 2 + 1;
        let nyquist = sample_rate as f64 / 2.0;

        let fft_freqs: Vec<f64> = (0..bins)
            .map(|k| k as f64 * sample_rate as f64 / n_fft as f64)
            .collect();

        let mel_max = hz_to_mel(nyquist);
        let mel_points: Vec<f64> = (0..n_mels + 2)
            .map(|i| mel_to_hz(mel_max * i as f64 / (n_mels + 1) as f64))
            .collect();

        let weights = (0..n_mels)
            .map(|m| {
                let (left, center, right) = (mel_points[m], mel_points[m + 1], mel_points[m + 2]);
                let enorm = 2.0 / (right - left);
                fft_freqs
                    .iter()
                    .map(|&f| {
                        let lower = (f - left) / (center - left);
                        let upper = (right - f) / (right - center);
                        (lower.min(upper).max(0.0) * enorm) as f32
                    })
                    .collect()
            })
            .collect();

        Self { weights }
    }

    pub fn n_mels(&self) -> usize {
        self.weights.len()
    }

    /// Project a power spectrum onto the mel bands.
    pub fn apply(&self, power: &[f32]) -> Vec<f32> {
        self.weights
            .iter()
            .map(|filter| filter.iter().zip(power).map(|(w, p)| w * p).sum())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mel_scale_round_trips() {
        for hz in [0.0, 440.0, 999.0, 1000.0, 4000.0, 8000.0] {
            let back = mel_to_hz(hz_to_mel(hz));
            assert!((back - hz).abs() < 1e-6, "{hz} -> {back}");
        }
    }

    #[test]
    fn test_slaney_breakpoint() {
        assert!((hz_to_mel(1000.0) - 15.0).abs() < 1e-9);
        assert!((hz_to_mel(500.0) - 7.5).abs() < 1e-9);
    }

    #[test]
    fn test_filterbank_shape_and_nonnegativity() {
        let bank = MelFilterbank::new(16_000, 2048, 128);
        assert_eq!(bank.n_mels(), 128);
        for filter in &bank.weights {
            assert_eq!(filter.len(), 1025);
            assert!(filter.iter().all(|&w| w >= 0.0));
        }
    }

    #[test]
    fn test_every_band_sees_some_energy_from_flat_spectrum() {
        let bank = MelFilterbank::new(16_000, 2048, 40);
        let flat = vec![1.0_f32; 1025];
        let bands = bank.apply(&flat);
        assert!(bands.iter().all(|&b| b > 0.0));
    }
}
