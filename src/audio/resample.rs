// Band-limited sample-rate conversion (rubato)
//
// Used when a device or WAV file runs at a different rate than the feature
// extractor. The FFT resampler low-passes at the lower of the two Nyquist
// frequencies, so content the target rate cannot represent is removed
// instead of folding back into the band.

use rubato::{FftFixedIn, Resampler};

use crate::error::AudioError;

/// Input frames per resampler call
const CHUNK_SIZE: usize = 1024;

/// FFT sub-chunks per input chunk
const SUB_CHUNKS: usize = 2;

/// Resample mono `samples` from `from_rate` to `to_rate`.
///
/// The output holds `len * to_rate / from_rate` samples (integer division)
/// and is aligned with the input: the resampler's group delay is trimmed
/// and the tail is flushed.
///
/// # Errors
/// `ResampleFailed` for a zero rate or when rubato rejects the conversion.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, AudioError> {
    if from_rate == 0 || to_rate == 0 {
        return Err(AudioError::ResampleFailed {
            reason: format!("cannot convert {from_rate} Hz to {to_rate} Hz"),
        });
    }
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let failed = |err: &dyn std::fmt::Display| AudioError::ResampleFailed {
        reason: err.to_string(),
    };
    let expected = (samples.len() as u64 * to_rate as u64 / from_rate as u64) as usize;

    let mut resampler = FftFixedIn::<f32>::new(
        from_rate as usize,
        to_rate as usize,
        CHUNK_SIZE,
        SUB_CHUNKS,
        1,
    )
    .map_err(|err| failed(&err))?;
    let delay = resampler.output_delay();
    let wanted = delay + expected;
    let chunk_size = resampler.input_frames_next();
    let mut output = Vec::with_capacity(wanted + resampler.output_frames_max());

    let mut chunks = samples.chunks_exact(chunk_size);
    for chunk in &mut chunks {
        let wave_in: [&[f32]; 1] = [chunk];
        let frames = resampler.process(&wave_in, None).map_err(|err| failed(&err))?;
        output.extend_from_slice(&frames[0]);
    }
    let rest = chunks.remainder();
    if !rest.is_empty() {
        let wave_in: [&[f32]; 1] = [rest];
        let frames = resampler
            .process_partial(Some(&wave_in[..]), None)
            .map_err(|err| failed(&err))?;
        output.extend_from_slice(&frames[0]);
    }

    // Flush the filter tail with silence until the delayed signal is out
    while output.len() < wanted {
        let frames = resampler
            .process_partial(None::<&[&[f32]]>, None)
            .map_err(|err| failed(&err))?;
        if frames[0].is_empty() {
            break;
        }
        output.extend_from_slice(&frames[0]);
    }

    output.drain(..delay.min(output.len()));
    output.resize(expected, 0.0);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::signals::sine_wave;

    /// RMS over the middle half, away from the filter's edge transients
    fn inner_rms(samples: &[f32]) -> f32 {
        let quarter = samples.len() / 4;
        let inner = &samples[quarter..samples.len() - quarter];
        (inner.iter().map(|s| s * s).sum::<f32>() / inner.len() as f32).sqrt()
    }

    #[test]
    fn test_same_rate_is_identity() {
        let input = vec![0.1, 0.2, 0.3];
        assert_eq!(resample(&input, 16_000, 16_000).unwrap(), input);
    }

    #[test]
    fn test_zero_rate_is_rejected() {
        let err = resample(&[0.1, 0.2], 0, 16_000).unwrap_err();
        assert!(matches!(err, AudioError::ResampleFailed { .. }));
    }

    #[test]
    fn test_length_scales_with_ratio() {
        let input = vec![0.0; 44_100];
        assert_eq!(resample(&input, 44_100, 16_000).unwrap().len(), 16_000);
        let input = vec![0.0; 1_000];
        assert_eq!(resample(&input, 8_000, 16_000).unwrap().len(), 2_000);
    }

    #[test]
    fn test_in_band_tone_keeps_its_energy() {
        let tone = sine_wave(1_000.0, 0.5, 48_000, 0.5);
        let out = resample(&tone, 48_000, 16_000).unwrap();
        assert_eq!(out.len(), 8_000);
        let rms = inner_rms(&out);
        assert!((rms - 0.5 / 2f32.sqrt()).abs() < 0.02, "rms {rms}");
    }

    #[test]
    fn test_tone_above_target_nyquist_is_removed() {
        // 12 kHz cannot exist at 16 kHz; it must not alias down to 4 kHz
        let tone = sine_wave(12_000.0, 0.5, 48_000, 0.5);
        assert!((inner_rms(&tone) - 0.3535).abs() < 1e-3);
        let out = resample(&tone, 48_000, 16_000).unwrap();
        assert_eq!(out.len(), 8_000);
        let rms = inner_rms(&out);
        assert!(rms < 0.02, "aliased energy left: rms {rms}");
    }

    #[test]
    fn test_output_is_aligned_with_input() {
        // A step placed mid-signal stays mid-signal after conversion
        let mut input = vec![0.0f32; 16_000];
        input[8_000..].fill(0.5);
        let out = resample(&input, 32_000, 16_000).unwrap();
        assert!(out[3_800].abs() < 0.05);
        assert!((out[4_200] - 0.5).abs() < 0.05);
    }
}
