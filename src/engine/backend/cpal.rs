//! cpal microphone backend for desktop and single-board Linux targets.

use crate::audio::block_queue::BlockProducer;
use crate::audio::capture::open_input_stream;
use crate::config::AudioConfig;
use crate::error::AudioError;

use super::CaptureBackend;

/// Live input from a cpal device
pub struct CpalBackend {
    device_index: Option<usize>,
    sample_rate: u32,
    stream: Option<::cpal::Stream>,
}

impl CpalBackend {
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            device_index: config.device_index,
            sample_rate: config.sample_rate,
            stream: None,
        }
    }
}

impl CaptureBackend for CpalBackend {
    fn start(&mut self, producer: BlockProducer) -> Result<u32, AudioError> {
        if self.stream.is_some() {
            return Err(AudioError::AlreadyRunning);
        }
        let (stream, device_rate) =
            open_input_stream(self.device_index, self.sample_rate, producer)?;
        self.stream = Some(stream);
        Ok(device_rate)
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        // Dropping the stream stops the device callback
        match self.stream.take() {
            Some(stream) => {
                drop(stream);
                tracing::info!("[Capture] Input stream stopped");
                Ok(())
            }
            None => Err(AudioError::NotRunning),
        }
    }

    fn name(&self) -> &str {
        "cpal"
    }
}
