// Cepstral stage: log compression and orthonormal DCT-II

/// Smallest power considered before taking the log
pub const AMIN: f32 = 1e-10;

/// Dynamic range kept below the loudest cell of a spectrogram
pub const TOP_DB: f32 = 80.0;

/// Convert a mel power spectrogram to decibels in place.
///
/// The `TOP_DB` floor is relative to the maximum over the whole
/// spectrogram, not per frame, so quiet frames stay comparable to loud ones.
pub fn power_to_db(spectrogram: &mut [Vec<f32>]) {
    let mut peak = f32::NEG_INFINITY;
    for frame in spectrogram.iter_mut() {
        for value in frame.iter_mut() {
            *value = 10.0 * value.max(AMIN).log10();
            peak = peak.max(*value);
        }
    }

    let floor = peak - TOP_DB;
    for frame in spectrogram.iter_mut() {
        for value in frame.iter_mut() {
            *value = value.max(floor);
        }
    }
}

/// Truncated DCT-II with orthonormal scaling
pub struct Dct {
    basis: Vec<Vec<f32>>,
}

impl Dct {
    /// Basis producing the first `n_out` coefficients of an `n_in`-point transform.
    pub fn new(n_in: usize, n_out: usize) -> Self {
        let n = n_in as f64;
        let basis = (0..n_out)
            .map(|k| {
                let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
                (0..n_in)
                    .map(|i| {
                        let angle = std::f64::consts::PI / n * (i as f64 + 0.5) * k as f64;
                        (scale * angle.cos()) as f32
                    })
                    .collect()
            })
            .collect();
        Self { basis }
    }

    pub fn transform(&self, input: &[f32]) -> Vec<f32> {
        self.basis
            .iter()
            .map(|row| row.iter().zip(input).map(|(b, x)| b * x).sum())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_to_db_clips_to_top_db() {
        let mut spec = vec![vec![1.0, 1e-12], vec![0.1, 1e-3]];
        power_to_db(&mut spec);
        assert!((spec[0][0] - 0.0).abs() < 1e-5);
        assert!((spec[1][0] + 10.0).abs() < 1e-4);
        assert!((spec[1][1] + 30.0).abs() < 1e-4);
        // 1e-12 is below AMIN (-100 dB) and the -80 dB floor
        assert!((spec[0][1] + 80.0).abs() < 1e-4);
    }

    #[test]
    fn test_dct_of_constant_is_energy_only() {
        let dct = Dct::new(8, 4);
        let out = dct.transform(&[1.0; 8]);
        assert!((out[0] - 8.0_f32.sqrt()).abs() < 1e-5);
        for c in &out[1..] {
            assert!(c.abs() < 1e-5);
        }
    }

    #[test]
    fn test_dct_is_orthonormal() {
        let dct = Dct::new(16, 16);
        for a in 0..16 {
            for b in 0..16 {
                let dot: f32 = dct.basis[a].iter().zip(&dct.basis[b]).map(|(x, y)| x * y).sum();
                let expected = if a == b { 1.0 } else { 0.0 };
                assert!((dot - expected).abs() < 1e-4, "rows {a},{b}: {dot}");
            }
        }
    }
}
