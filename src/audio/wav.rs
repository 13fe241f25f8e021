// WAV file helpers (hound)
//
// Reading always yields mono f32 samples: multi-channel files are averaged
// per frame.

use std::path::Path;

use crate::error::AudioError;

fn wav_failed(path: &Path, reason: impl std::fmt::Display) -> AudioError {
    AudioError::WavFileFailed {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Decode a WAV file into mono f32 samples and its sample rate.
///
/// Integer formats are scaled by their full-scale value; float files are
/// passed through.
///
/// # Errors
/// `WavFileFailed` naming the path when the file cannot be opened or decoded.
pub fn read_wav(path: &Path) -> Result<(Vec<f32>, u32), AudioError> {
    let mut reader = hound::WavReader::open(path)
        .map_err(|err| wav_failed(path, format!("failed to open: {err}")))?;
    let spec = reader.spec();
    if spec.channels == 0 {
        return Err(wav_failed(path, "file has zero channels"));
    }

    let samples = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<Vec<f32>, _>>()
            .map_err(|err| wav_failed(path, format!("error reading samples: {err}")))?,
        hound::SampleFormat::Int => match spec.bits_per_sample {
            8 | 16 | 24 | 32 => {
                let full_scale = (1_i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|sample| sample.map(|v| v as f32 / full_scale))
                    .collect::<Result<Vec<f32>, _>>()
                    .map_err(|err| wav_failed(path, format!("error reading samples: {err}")))?
            }
            bits => {
                return Err(wav_failed(path, format!("unsupported bits_per_sample={bits}")))
            }
        },
    };

    if spec.channels == 1 {
        return Ok((samples, spec.sample_rate));
    }

    let channels = spec.channels as usize;
    let mono = samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect();
    Ok((mono, spec.sample_rate))
}

/// Write mono 16-bit PCM.
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<(), AudioError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|err| wav_failed(path, format!("failed to create: {err}")))?;
    for &sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer
            .write_sample(value)
            .map_err(|err| wav_failed(path, format!("failed to write sample: {err}")))?;
    }
    writer
        .finalize()
        .map_err(|err| wav_failed(path, format!("failed to finalize: {err}")))
}
