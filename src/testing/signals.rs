//! Deterministic synthetic signals.
//!
//! Noise generators are seeded so repeated runs produce identical buffers.

use std::f32::consts::PI;

use rand::{rngs::StdRng, Rng, SeedableRng};

fn frames(seconds: f32, sample_rate: u32) -> usize {
    (seconds * sample_rate as f32).round() as usize
}

/// Pure tone at `frequency_hz`
pub fn sine_wave(frequency_hz: f32, seconds: f32, sample_rate: u32, amplitude: f32) -> Vec<f32> {
    let step = frequency_hz / sample_rate as f32;
    let mut phase = 0.0_f32;
    (0..frames(seconds, sample_rate))
        .map(|_| {
            let value = (2.0 * PI * phase).sin() * amplitude;
            phase += step;
            if phase >= 1.0 {
                phase -= 1.0;
            }
            value
        })
        .collect()
}

/// Uniform white noise in `[-amplitude, amplitude)`
pub fn white_noise(seconds: f32, sample_rate: u32, amplitude: f32, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..frames(seconds, sample_rate))
        .map(|_| rng.gen_range(-amplitude..amplitude))
        .collect()
}

/// Linear frequency sweep from `start_hz` to `end_hz`
pub fn chirp(
    start_hz: f32,
    end_hz: f32,
    seconds: f32,
    sample_rate: u32,
    amplitude: f32,
) -> Vec<f32> {
    let total = frames(seconds, sample_rate).max(1);
    let mut phase = 0.0_f32;
    (0..total)
        .map(|i| {
            let t = i as f32 / total as f32;
            let freq = start_hz + (end_hz - start_hz) * t;
            let value = (2.0 * PI * phase).sin() * amplitude;
            phase = (phase + freq / sample_rate as f32).fract();
            value
        })
        .collect()
}
