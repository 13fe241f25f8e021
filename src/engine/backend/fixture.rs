//! In-memory capture backend for tests and offline simulation.
//!
//! Audio is pushed through the same block queue a device callback would use.
//! `FixtureFeeder::feed` waits for queue room so no block is lost, which
//! makes pipeline runs deterministic; `feed_lossy` behaves like a real
//! callback and drops on overflow.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::audio::block_queue::BlockProducer;
use crate::error::AudioError;

use super::CaptureBackend;

struct Playback {
    samples: Vec<f32>,
    realtime: bool,
}

/// Cloneable handle for pushing audio into a running fixture backend
#[derive(Clone)]
pub struct FixtureFeeder {
    producer: Arc<Mutex<Option<BlockProducer>>>,
    stopped: Arc<AtomicBool>,
    playback_done: Arc<AtomicBool>,
}

impl FixtureFeeder {
    fn with_producer<R>(&self, f: impl FnOnce(&mut BlockProducer) -> R) -> Option<R> {
        let mut guard = self.producer.lock().unwrap_or_else(PoisonError::into_inner);
        guard.as_mut().map(f)
    }

    /// True once the backend has been started and not yet stopped
    pub fn is_running(&self) -> bool {
        !self.stopped.load(Ordering::Acquire) && self.with_producer(|_| ()).is_some()
    }

    /// Push samples without losing any block, waiting for queue room.
    pub fn feed(&self, samples: &[f32]) -> Result<(), AudioError> {
        let block_size = self
            .with_producer(|p| p.block_size())
            .ok_or(AudioError::NotRunning)?;

        for chunk in samples.chunks(block_size) {
            loop {
                if self.stopped.load(Ordering::Acquire) {
                    return Err(AudioError::NotRunning);
                }
                let pushed = self
                    .with_producer(|p| {
                        if p.has_room() {
                            p.push_samples(chunk);
                            true
                        } else {
                            false
                        }
                    })
                    .ok_or(AudioError::NotRunning)?;
                if pushed {
                    break;
                }
                thread::sleep(Duration::from_micros(200));
            }
        }
        Ok(())
    }

    /// Push samples the way a device callback would; returns blocks dropped.
    pub fn feed_lossy(&self, samples: &[f32]) -> Result<usize, AudioError> {
        self.with_producer(|p| p.push_samples(samples))
            .ok_or(AudioError::NotRunning)
    }

    /// Wait until scheduled playback has been fully queued.
    pub fn wait_for_playback(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.playback_done.load(Ordering::Acquire) {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
        true
    }
}

/// Backend delivering audio from memory
pub struct FixtureBackend {
    sample_rate: u32,
    feeder: FixtureFeeder,
    playback: Option<Playback>,
    playback_thread: Option<JoinHandle<()>>,
}

impl FixtureBackend {
    /// Backend driven manually through [`FixtureFeeder`]
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            feeder: FixtureFeeder {
                producer: Arc::new(Mutex::new(None)),
                stopped: Arc::new(AtomicBool::new(false)),
                playback_done: Arc::new(AtomicBool::new(true)),
            },
            playback: None,
            playback_thread: None,
        }
    }

    /// Backend that plays `samples` once after start.
    ///
    /// With `realtime` each block is paced to its audio duration; otherwise
    /// blocks are queued as fast as the worker accepts them.
    pub fn with_playback(sample_rate: u32, samples: Vec<f32>, realtime: bool) -> Self {
        let mut backend = Self::new(sample_rate);
        backend.feeder.playback_done.store(false, Ordering::Release);
        backend.playback = Some(Playback { samples, realtime });
        backend
    }

    pub fn feeder(&self) -> FixtureFeeder {
        self.feeder.clone()
    }
}

impl CaptureBackend for FixtureBackend {
    fn start(&mut self, producer: BlockProducer) -> Result<u32, AudioError> {
        {
            let mut slot = self
                .feeder
                .producer
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if slot.is_some() {
                return Err(AudioError::AlreadyRunning);
            }
            *slot = Some(producer);
        }
        self.feeder.stopped.store(false, Ordering::Release);

        if let Some(playback) = self.playback.take() {
            let feeder = self.feeder.clone();
            let sample_rate = self.sample_rate;
            self.playback_thread = Some(thread::spawn(move || {
                let block_size = feeder.with_producer(|p| p.block_size()).unwrap_or(1024);
                let block_duration =
                    Duration::from_secs_f64(block_size as f64 / sample_rate as f64);
                for chunk in playback.samples.chunks(block_size) {
                    if feeder.feed(chunk).is_err() {
                        break;
                    }
                    if playback.realtime {
                        thread::sleep(block_duration);
                    }
                }
                feeder.playback_done.store(true, Ordering::Release);
                tracing::debug!("[Fixture] Playback of {} samples queued", playback.samples.len());
            }));
        }

        Ok(self.sample_rate)
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.feeder.stopped.store(true, Ordering::Release);
        if let Some(handle) = self.playback_thread.take() {
            let _ = handle.join();
        }
        let previous = self
            .feeder
            .producer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        previous.map(|_| ()).ok_or(AudioError::NotRunning)
    }

    fn name(&self) -> &str {
        "fixture"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::block_queue::BlockQueue;

    #[test]
    fn test_feed_requires_start() {
        let backend = FixtureBackend::new(16_000);
        let feeder = backend.feeder();
        assert!(!feeder.is_running());
        assert_eq!(feeder.feed(&[0.0; 4]), Err(AudioError::NotRunning));
    }

    #[test]
    fn test_feed_splits_into_blocks() {
        let mut backend = FixtureBackend::new(16_000);
        let (producer, mut consumer) = BlockQueue::new(4, 8, 8);
        assert_eq!(backend.start(producer).unwrap(), 16_000);

        backend.feeder().feed(&[1.0; 10]).unwrap();
        let sizes: Vec<usize> = std::iter::from_fn(|| consumer.pop())
            .map(|b| b.samples.len())
            .collect();
        assert_eq!(sizes, vec![4, 4, 2]);

        backend.stop().unwrap();
        assert_eq!(backend.stop(), Err(AudioError::NotRunning));
    }

    #[test]
    fn test_double_start_is_rejected() {
        let mut backend = FixtureBackend::new(16_000);
        let (p1, _c1) = BlockQueue::new(4, 2, 4);
        let (p2, _c2) = BlockQueue::new(4, 2, 4);
        backend.start(p1).unwrap();
        assert_eq!(backend.start(p2), Err(AudioError::AlreadyRunning));
    }

    #[test]
    fn test_playback_is_lossless() {
        let samples: Vec<f32> = (0..400).map(|i| i as f32).collect();
        let mut backend = FixtureBackend::with_playback(16_000, samples.clone(), false);
        let feeder = backend.feeder();
        let (producer, mut consumer) = BlockQueue::new(16, 2, 4);
        backend.start(producer).unwrap();

        let mut received = Vec::new();
        let deadline = Instant::now() + Duration::from_secs(5);
        while received.len() < samples.len() && Instant::now() < deadline {
            match consumer.pop() {
                Some(block) => {
                    received.extend_from_slice(&block.samples);
                    consumer.recycle(block);
                }
                None => thread::yield_now(),
            }
        }
        assert!(feeder.wait_for_playback(Duration::from_secs(1)));
        assert_eq!(received, samples);
        assert_eq!(consumer.stats().dropped_blocks(), 0);
        backend.stop().unwrap();
    }
}
