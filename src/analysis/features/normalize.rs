// Per-sequence standardization and frame decimation

use super::types::FeatureFrame;

/// Standardize each coefficient across time: `(x - mean) / max(std, epsilon)`.
///
/// Uses the population standard deviation. Applying this to an already
/// standardized sequence leaves it unchanged up to float rounding.
pub fn standardize(frames: &mut [FeatureFrame], epsilon: f32) {
    let Some(width) = frames.first().map(Vec::len) else {
        return;
    };
    let count = frames.len() as f64;

    for k in 0..width {
        let mean = frames.iter().map(|f| f[k] as f64).sum::<f64>() / count;
        let variance = frames
            .iter()
            .map(|f| {
                let d = f[k] as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / count;
        let std = (variance.sqrt() as f32).max(epsilon);

        for frame in frames.iter_mut() {
            frame[k] = ((frame[k] as f64 - mean) as f32) / std;
        }
    }
}

/// Keep every `stride`-th frame starting at frame 0.
pub fn decimate(frames: Vec<FeatureFrame>, stride: usize) -> Vec<FeatureFrame> {
    if stride <= 1 {
        return frames;
    }
    frames.into_iter().step_by(stride).collect()
}
