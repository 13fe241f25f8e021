// DtwMatcher - dynamic time warping between feature sequences
//
// Recurrence:
//   cost[i][j] = d(a[i], b[j]) + min(cost[i-1][j-1], cost[i-1][j], cost[i][j-1])
// with Euclidean local cost. Only two rows are kept in memory; each cell
// carries the accumulated cost plus the number of steps on its best path.
//
// An optional Sakoe-Chiba band restricts cells to |i - j| <= radius. The
// effective radius is never smaller than |n - m| so the end cell stays
// reachable for sequences of different lengths.

use serde::{Deserialize, Serialize};

use super::features::{FeatureFrame, FeatureSequence};
use crate::error::AnalysisError;

/// Raw alignment result
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DtwDistance {
    /// Accumulated local cost along the optimal path
    pub cost: f32,
    /// Number of aligned frame pairs on that path
    pub path_len: usize,
}

impl DtwDistance {
    /// Cost per aligned pair, comparable across templates of different lengths.
    pub fn normalized(&self) -> f32 {
        if self.path_len == 0 {
            return 0.0;
        }
        self.cost / self.path_len as f32
    }
}

#[derive(Clone, Copy)]
struct Cell {
    cost: f64,
    len: usize,
}

const UNREACHABLE: Cell = Cell {
    cost: f64::INFINITY,
    len: 0,
};

/// Euclidean distance between two frames of equal width
pub fn euclidean(a: &FeatureFrame, b: &FeatureFrame) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = (*x - *y) as f64;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

/// DTW matcher with an optional band constraint
#[derive(Debug, Clone, Copy, Default)]
pub struct DtwMatcher {
    band_radius: Option<usize>,
}

impl DtwMatcher {
    /// Full-matrix matcher
    pub fn new() -> Self {
        Self { band_radius: None }
    }

    /// Matcher restricted to a Sakoe-Chiba band of `radius` frames
    pub fn with_band(radius: usize) -> Self {
        Self {
            band_radius: Some(radius),
        }
    }

    pub fn from_radius(band_radius: Option<usize>) -> Self {
        Self { band_radius }
    }

    pub fn band_radius(&self) -> Option<usize> {
        self.band_radius
    }

    /// Align two sequences and return raw cost plus path length
    ///
    /// # Errors
    /// * `EmptySequence` - either input has no frames
    /// * `InvalidInput` - coefficient counts differ between inputs
    pub fn distance(
        &self,
        a: &FeatureSequence,
        b: &FeatureSequence,
    ) -> Result<DtwDistance, AnalysisError> {
        if a.is_empty() || b.is_empty() {
            return Err(AnalysisError::EmptySequence);
        }
        if a.width() != b.width() {
            return Err(AnalysisError::InvalidInput {
                reason: format!(
                    "coefficient count mismatch: {} vs {}",
                    a.width(),
                    b.width()
                ),
            });
        }

        let (n, m) = (a.len(), b.len());
        let radius = self.band_radius.map(|r| r.max(n.abs_diff(m)));

        let mut prev = vec![UNREACHABLE; m + 1];
        let mut curr = vec![UNREACHABLE; m + 1];
        prev[0] = Cell { cost: 0.0, len: 0 };

        for i in 1..=n {
            curr.fill(UNREACHABLE);
            let (lo, hi) = match radius {
                Some(w) => (i.saturating_sub(w).max(1), (i + w).min(m)),
                None => (1, m),
            };

            for j in lo..=hi {
                // Diagonal wins ties, then insertion, then deletion.
                let mut best = prev[j - 1];
                if prev[j].cost < best.cost {
                    best = prev[j];
                }
                if curr[j - 1].cost < best.cost {
                    best = curr[j - 1];
                }
                if best.cost.is_infinite() {
                    continue;
                }

                let local = euclidean(&a.frames()[i - 1], &b.frames()[j - 1]);
                curr[j] = Cell {
                    cost: best.cost + local,
                    len: best.len + 1,
                };
            }
            std::mem::swap(&mut prev, &mut curr);
        }

        let end = prev[m];
        Ok(DtwDistance {
            cost: end.cost as f32,
            path_len: end.len,
        })
    }

    /// Convenience wrapper returning the normalized score directly.
    pub fn normalized_distance(
        &self,
        a: &FeatureSequence,
        b: &FeatureSequence,
    ) -> Result<f32, AnalysisError> {
        self.distance(a, b).map(|d| d.normalized())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn seq(frames: Vec<Vec<f32>>) -> FeatureSequence {
        FeatureSequence::new(frames).unwrap()
    }

    fn scalar(values: &[f32]) -> FeatureSequence {
        seq(values.iter().map(|&v| vec![v]).collect())
    }

    fn random_seq(rng: &mut StdRng, len: usize, width: usize) -> FeatureSequence {
        seq((0..len)
            .map(|_| (0..width).map(|_| rng.gen_range(-2.0..2.0)).collect())
            .collect())
    }

    #[test]
    fn test_self_distance_is_zero() {
        let mut rng = StdRng::seed_from_u64(1);
        let a = random_seq(&mut rng, 20, 13);
        let d = DtwMatcher::new().distance(&a, &a).unwrap();
        assert_eq!(d.cost, 0.0);
        assert_eq!(d.path_len, 20);
        assert_eq!(d.normalized(), 0.0);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..10 {
            let a = random_seq(&mut rng, 15, 13);
            let b = random_seq(&mut rng, 22, 13);
            let matcher = DtwMatcher::new();
            let ab = matcher.distance(&a, &b).unwrap();
            let ba = matcher.distance(&b, &a).unwrap();
            assert!((ab.cost - ba.cost).abs() < 1e-4);
        }
    }

    #[test]
    fn test_known_alignment() {
        // b repeats the middle value; warping absorbs it at zero cost
        let a = scalar(&[0.0, 1.0, 2.0]);
        let b = scalar(&[0.0, 1.0, 1.0, 2.0]);
        let d = DtwMatcher::new().distance(&a, &b).unwrap();
        assert_eq!(d.cost, 0.0);
        assert_eq!(d.path_len, 4);
    }

    #[test]
    fn test_cost_accumulates_local_distances() {
        let a = scalar(&[0.0, 0.0]);
        let b = scalar(&[1.0, 1.0]);
        let d = DtwMatcher::new().distance(&a, &b).unwrap();
        assert!((d.cost - 2.0).abs() < 1e-6);
        assert_eq!(d.path_len, 2);
        assert!((d.normalized() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalization_removes_length_bias() {
        let a = scalar(&[1.0; 4]);
        let short = scalar(&[0.0; 4]);
        let long = scalar(&[0.0; 12]);
        let matcher = DtwMatcher::new();
        let d_short = matcher.distance(&a, &short).unwrap();
        let d_long = matcher.distance(&a, &long).unwrap();
        assert!(d_long.cost > d_short.cost);
        assert!((d_long.normalized() - d_short.normalized()).abs() < 1e-6);
    }

    #[test]
    fn test_band_never_beats_full_matrix() {
        let mut rng = StdRng::seed_from_u64(3);
        let a = random_seq(&mut rng, 30, 4);
        let b = random_seq(&mut rng, 24, 4);
        let full = DtwMatcher::new().distance(&a, &b).unwrap();
        let banded = DtwMatcher::with_band(2).distance(&a, &b).unwrap();
        assert!(banded.cost >= full.cost - 1e-4);
        assert!(banded.cost.is_finite());
    }

    #[test]
    fn test_wide_band_matches_full_matrix() {
        let mut rng = StdRng::seed_from_u64(4);
        let a = random_seq(&mut rng, 12, 4);
        let b = random_seq(&mut rng, 9, 4);
        let full = DtwMatcher::new().distance(&a, &b).unwrap();
        let banded = DtwMatcher::with_band(50).distance(&a, &b).unwrap();
        assert_eq!(full, banded);
    }

    #[test]
    fn test_zero_radius_band_still_reaches_end() {
        let a = scalar(&[0.0, 1.0, 2.0, 3.0, 4.0]);
        let b = scalar(&[0.0, 4.0]);
        let d = DtwMatcher::with_band(0).distance(&a, &b).unwrap();
        assert!(d.cost.is_finite());
    }

    #[test]
    fn test_width_mismatch_is_rejected() {
        let a = seq(vec![vec![0.0, 1.0]]);
        let b = seq(vec![vec![0.0]]);
        assert_eq!(
            DtwMatcher::new().distance(&a, &b),
            Err(AnalysisError::InvalidInput {
                reason: "coefficient count mismatch: 2 vs 1".to_string()
            })
        );
    }
}
