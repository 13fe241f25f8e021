//! PipelineSession - owns one capture-to-classification pipeline.
//!
//! The session holds every piece of mutable pipeline state (block queue,
//! ring buffer, trigger gate, telemetry) plus the backend and the worker
//! thread. Dropping it shuts the pipeline down: running flag cleared,
//! device stream stopped, worker joined.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::broadcast;

use crate::analysis::classifier::Classifier;
use crate::analysis::features::FeatureExtractor;
use crate::audio::block_queue::{BlockQueue, QueueStats};
use crate::audio::ring_buffer::SharedRingBuffer;
use crate::config::{AppConfig, CaptureMode};
use crate::error::{log_audio_error, AudioError};
use crate::telemetry::{LifecyclePhase, TelemetryCollector, TelemetrySnapshot};
use crate::templates::TemplateStore;

use super::backend::CaptureBackend;
use super::dispatcher::{spawn_dispatcher, DispatcherContext};
use super::gate::{CycleState, TriggerGate, TriggerOutcome};
use super::sink::{BroadcastSink, ClassificationEvent, ResultSink};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Cloneable, `Send` entry point for external trigger sources
#[derive(Clone)]
pub struct TriggerHandle {
    mode: CaptureMode,
    gate: TriggerGate,
    running: Arc<AtomicBool>,
    telemetry: Arc<TelemetryCollector>,
}

impl TriggerHandle {
    /// Start a triggered capture if no cycle is in flight.
    ///
    /// A trigger while busy is an expected condition: it is logged at info
    /// level and reported as `Busy`, never as an error.
    pub fn on_trigger(&self) -> TriggerOutcome {
        if !self.running.load(Ordering::Acquire) {
            return TriggerOutcome::Stopped;
        }
        if self.mode != CaptureMode::Triggered {
            return TriggerOutcome::NotTriggeredMode;
        }

        let outcome = self.gate.try_trigger();
        match outcome {
            TriggerOutcome::Accepted => tracing::info!("[Trigger] Capture started"),
            TriggerOutcome::Busy(state) => {
                tracing::info!("[Trigger] Ignored, cycle in progress ({:?})", state);
                self.telemetry.record_trigger_rejected(state);
            }
            _ => {}
        }
        outcome
    }

    pub fn state(&self) -> CycleState {
        self.gate.state()
    }
}

/// Counters reported when a session ends
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub mode: CaptureMode,
    pub device_sample_rate: u32,
    pub blocks_pushed: u64,
    pub blocks_processed: u64,
    pub blocks_dropped: u64,
    pub telemetry: TelemetrySnapshot,
}

/// Builder collecting the collaborators of a session
pub struct SessionBuilder {
    config: AppConfig,
    store: Arc<TemplateStore>,
    extractor: Arc<FeatureExtractor>,
    sinks: Vec<Box<dyn ResultSink>>,
    telemetry: Arc<TelemetryCollector>,
}

impl SessionBuilder {
    /// Add a result sink; sinks run in insertion order.
    pub fn sink(mut self, sink: Box<dyn ResultSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn telemetry(mut self, telemetry: Arc<TelemetryCollector>) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Start the backend and the dispatcher thread
    ///
    /// # Errors
    /// Backend start failures (device open) and thread spawn failures. These
    /// are the only startup-fatal conditions of a session.
    pub fn start(self, mut backend: Box<dyn CaptureBackend>) -> Result<PipelineSession, AudioError> {
        let SessionBuilder {
            config,
            store,
            extractor,
            sinks,
            telemetry,
        } = self;

        let mode = config.capture.mode;
        let (producer, consumer) = BlockQueue::new(
            config.audio.block_size,
            config.audio.queue_capacity,
            config.audio.buffer_pool_size,
        );
        let stats = producer.stats();

        let device_rate = backend.start(producer)?;
        tracing::info!(
            "[Session] Backend '{}' delivering {} Hz, {} template(s) loaded",
            backend.name(),
            device_rate,
            store.len()
        );

        let ring = SharedRingBuffer::new(config.capture.window_samples(device_rate).max(1));
        let gate = match mode {
            CaptureMode::Triggered => TriggerGate::new(),
            CaptureMode::Continuous => TriggerGate::listening(),
        };
        let running = Arc::new(AtomicBool::new(true));
        let processed = Arc::new(AtomicU64::new(0));
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let mut all_sinks: Vec<Box<dyn ResultSink>> =
            vec![Box::new(BroadcastSink::new(events_tx.clone()))];
        all_sinks.extend(sinks);

        let ctx = DispatcherContext {
            mode,
            consumer,
            gate: gate.clone(),
            ring: ring.clone(),
            extractor,
            classifier: Classifier::from_config(&config.matching),
            store,
            sinks: all_sinks,
            telemetry: Arc::clone(&telemetry),
            running: Arc::clone(&running),
            processed: Arc::clone(&processed),
            device_rate,
            capture_samples: config.capture.capture_samples(device_rate),
            hop_samples: config.capture.hop_samples(device_rate),
            started_at: Instant::now(),
        };

        let worker = match spawn_dispatcher(ctx) {
            Ok(handle) => handle,
            Err(err) => {
                let _ = backend.stop();
                return Err(err);
            }
        };

        telemetry.record_lifecycle(LifecyclePhase::Started);

        Ok(PipelineSession {
            mode,
            gate,
            running,
            backend,
            worker: Some(worker),
            ring,
            stats,
            processed,
            events_tx,
            telemetry,
            device_rate,
            stopped: false,
        })
    }
}

/// A running capture session
pub struct PipelineSession {
    mode: CaptureMode,
    gate: TriggerGate,
    running: Arc<AtomicBool>,
    backend: Box<dyn CaptureBackend>,
    worker: Option<JoinHandle<()>>,
    ring: SharedRingBuffer,
    stats: QueueStats,
    processed: Arc<AtomicU64>,
    events_tx: broadcast::Sender<ClassificationEvent>,
    telemetry: Arc<TelemetryCollector>,
    device_rate: u32,
    stopped: bool,
}

impl PipelineSession {
    /// Begin configuring a session
    pub fn builder(
        config: AppConfig,
        store: Arc<TemplateStore>,
        extractor: Arc<FeatureExtractor>,
    ) -> SessionBuilder {
        SessionBuilder {
            config,
            store,
            extractor,
            sinks: Vec::new(),
            telemetry: Arc::new(TelemetryCollector::default()),
        }
    }

    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    pub fn device_sample_rate(&self) -> u32 {
        self.device_rate
    }

    /// External trigger entry point (see [`TriggerHandle::on_trigger`])
    pub fn on_trigger(&self) -> TriggerOutcome {
        self.trigger_handle().on_trigger()
    }

    /// Handle for trigger sources living on other threads
    pub fn trigger_handle(&self) -> TriggerHandle {
        TriggerHandle {
            mode: self.mode,
            gate: self.gate.clone(),
            running: Arc::clone(&self.running),
            telemetry: Arc::clone(&self.telemetry),
        }
    }

    pub fn cycle_state(&self) -> CycleState {
        self.gate.state()
    }

    /// Subscribe to classification events
    pub fn subscribe(&self) -> broadcast::Receiver<ClassificationEvent> {
        self.events_tx.subscribe()
    }

    pub fn telemetry(&self) -> Arc<TelemetryCollector> {
        Arc::clone(&self.telemetry)
    }

    pub fn dropped_blocks(&self) -> u64 {
        self.stats.dropped_blocks()
    }

    /// Current continuous-mode window (zeros until the ring first fills)
    pub fn latest_window(&self) -> Result<Vec<f32>, AudioError> {
        self.ring.snapshot()
    }

    /// Wait until every queued block has been processed and no triggered
    /// cycle is in flight. Returns false on timeout.
    pub fn wait_until_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let drained = self.stats.is_drained()
                && self.processed.load(Ordering::Acquire) >= self.stats.consumed_blocks();
            if drained && self.gate.is_settled() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(2));
        }
    }

    /// Stop the pipeline and report its counters.
    pub fn shutdown(mut self) -> Result<SessionSummary, AudioError> {
        self.stop_inner()?;
        Ok(SessionSummary {
            mode: self.mode,
            device_sample_rate: self.device_rate,
            blocks_pushed: self.stats.pushed_blocks(),
            blocks_processed: self.processed.load(Ordering::Acquire),
            blocks_dropped: self.stats.dropped_blocks(),
            telemetry: self.telemetry.snapshot(),
        })
    }

    fn stop_inner(&mut self) -> Result<(), AudioError> {
        if self.stopped {
            return Ok(());
        }
        self.stopped = true;
        self.telemetry.record_lifecycle(LifecyclePhase::ShuttingDown);
        self.running.store(false, Ordering::Release);

        let backend_result = self.backend.stop();
        if let Err(err) = &backend_result {
            log_audio_error(err, "session shutdown");
        }

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                return Err(AudioError::StreamFailure {
                    reason: "dispatcher thread panicked".to_string(),
                });
            }
        }

        self.telemetry.record_lifecycle(LifecyclePhase::Stopped);
        tracing::info!("[Session] Stopped");
        match backend_result {
            Err(AudioError::NotRunning) | Ok(()) => Ok(()),
            Err(err) => Err(err),
        }
    }
}

impl Drop for PipelineSession {
    fn drop(&mut self) {
        if let Err(err) = self.stop_inner() {
            log_audio_error(&err, "session drop");
        }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
