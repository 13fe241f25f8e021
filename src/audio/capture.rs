// cpal input stream wiring
//
// Opens a device input stream and forwards its first channel into a
// BlockProducer. The data callback only converts samples and pushes blocks;
// the error callback logs and lets the stream continue.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use serde::Serialize;

use super::block_queue::BlockProducer;
use crate::error::AudioError;

/// Input device entry for `devices` listings
#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    pub index: usize,
    pub name: String,
    pub default_sample_rate: Option<u32>,
    pub is_default: bool,
}

/// Enumerate input devices on the default host.
pub fn list_input_devices() -> Result<Vec<DeviceInfo>, AudioError> {
    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());
    let devices = host
        .input_devices()
        .map_err(|e| AudioError::HardwareError {
            details: format!("Failed to enumerate input devices: {}", e),
        })?;

    Ok(devices
        .enumerate()
        .map(|(index, device)| {
            let name = device.name().unwrap_or_else(|_| "<unknown>".to_string());
            DeviceInfo {
                index,
                is_default: default_name.as_deref() == Some(name.as_str()),
                default_sample_rate: device.default_input_config().ok().map(|c| c.sample_rate().0),
                name,
            }
        })
        .collect())
}

fn select_device(host: &cpal::Host, index: Option<usize>) -> Result<cpal::Device, AudioError> {
    match index {
        None => host
            .default_input_device()
            .ok_or(AudioError::DeviceNotFound { index: None }),
        Some(i) => host
            .input_devices()
            .map_err(|e| AudioError::HardwareError {
                details: format!("Failed to enumerate input devices: {}", e),
            })?
            .nth(i)
            .ok_or(AudioError::DeviceNotFound { index: Some(i) }),
    }
}

/// Pick a stream config at `sample_rate`, preferring mono; fall back to the
/// device default when the rate is unsupported.
fn select_config(
    device: &cpal::Device,
    sample_rate: u32,
) -> Result<cpal::SupportedStreamConfig, AudioError> {
    let rate = cpal::SampleRate(sample_rate);
    let matching = device
        .supported_input_configs()
        .map(|configs| {
            configs
                .filter(|c| c.min_sample_rate() <= rate && c.max_sample_rate() >= rate)
                .min_by_key(|c| c.channels())
        })
        .ok()
        .flatten();

    if let Some(range) = matching {
        return Ok(range.with_sample_rate(rate));
    }

    let fallback = device
        .default_input_config()
        .map_err(|e| AudioError::StreamOpenFailed {
            reason: format!("Failed to get default input config: {:?}", e),
        })?;
    tracing::warn!(
        "[Capture] {} Hz unsupported by device, using {} Hz and resampling",
        sample_rate,
        fallback.sample_rate().0
    );
    Ok(fallback)
}

/// Open and start an input stream feeding `producer`
///
/// Returns the running stream and the rate the device actually delivers.
pub fn open_input_stream(
    device_index: Option<usize>,
    sample_rate: u32,
    mut producer: BlockProducer,
) -> Result<(cpal::Stream, u32), AudioError> {
    let host = cpal::default_host();
    let device = select_device(&host, device_index)?;
    let supported = select_config(&device, sample_rate)?;

    let stream_config: cpal::StreamConfig = supported.config();
    let channels = stream_config.channels as usize;
    let device_rate = stream_config.sample_rate.0;

    tracing::info!(
        "[Capture] Opening '{}' at {} Hz, {} channel(s), {:?}",
        device.name().unwrap_or_else(|_| "<unknown>".to_string()),
        device_rate,
        channels,
        supported.sample_format()
    );

    let err_fn = |err: cpal::StreamError| {
        tracing::warn!("[Capture] Input stream error: {}", err);
    };

    let stream = match supported.sample_format() {
        cpal::SampleFormat::F32 => device.build_input_stream(
            &stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                producer.push_frames(data, channels, |s| s);
            },
            err_fn,
            None,
        ),
        cpal::SampleFormat::I16 => device.build_input_stream(
            &stream_config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                producer.push_frames(data, channels, |s| s as f32 / i16::MAX as f32);
            },
            err_fn,
            None,
        ),
        cpal::SampleFormat::U16 => device.build_input_stream(
            &stream_config,
            move |data: &[u16], _: &cpal::InputCallbackInfo| {
                producer.push_frames(data, channels, |s| {
                    (s as f32 - 32_768.0) / 32_768.0
                });
            },
            err_fn,
            None,
        ),
        format => {
            return Err(AudioError::StreamOpenFailed {
                reason: format!("Unsupported sample format: {:?}", format),
            })
        }
    }
    .map_err(|e| AudioError::StreamOpenFailed {
        reason: format!("{:?}", e),
    })?;

    stream.play().map_err(|e| AudioError::HardwareError {
        details: format!("Failed to start input stream: {:?}", e),
    })?;

    Ok((stream, device_rate))
}
