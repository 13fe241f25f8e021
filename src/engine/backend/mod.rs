//! Capture backend abstraction.
//!
//! A backend owns an audio source and drives a [`BlockProducer`] from it.
//! The session never knows whether blocks come from a microphone or from
//! memory.

use crate::audio::block_queue::BlockProducer;
use crate::error::AudioError;

/// Trait implemented by audio sources feeding a capture session.
///
/// Not `Send`: cpal streams are pinned to the thread that created them on
/// some platforms, so the session keeps its backend on the owning thread.
pub trait CaptureBackend {
    /// Start delivering blocks; returns the sample rate of the delivered audio.
    fn start(&mut self, producer: BlockProducer) -> Result<u32, AudioError>;

    /// Stop delivering blocks. Stopping an idle backend is `NotRunning`.
    fn stop(&mut self) -> Result<(), AudioError>;

    /// Short name for logs
    fn name(&self) -> &str;
}

mod cpal;
mod fixture;

pub use self::cpal::CpalBackend;
pub use self::fixture::{FixtureBackend, FixtureFeeder};
