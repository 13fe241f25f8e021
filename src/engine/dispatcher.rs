// Dispatcher - the single worker thread of a capture session
//
// Consumes blocks from the BlockQueue in capture order and runs the
// classification pipeline off the audio callback:
//
// Triggered mode: blocks are discarded while the gate is Idle. After a
//   trigger the worker claims the cycle, fills a fixed-length capture buffer,
//   then Ready -> Classifying -> emit, and the guard returns the gate to Idle.
// Continuous mode: every block is folded into the shared RingBuffer; once
//   the ring is full and `hop` new samples have arrived the current window
//   is snapshotted and classified.
//
// Analysis failures drop the window and are logged; the loop keeps running
// until the session clears `running`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::analysis::classifier::Classifier;
use crate::analysis::features::FeatureExtractor;
use crate::audio::block_queue::{AudioBlock, BlockConsumer};
use crate::audio::resample::resample;
use crate::audio::ring_buffer::SharedRingBuffer;
use crate::config::CaptureMode;
use crate::error::{log_analysis_error, log_audio_error, AnalysisError, AudioError};
use crate::telemetry::TelemetryCollector;
use crate::templates::TemplateStore;

use super::gate::{CycleGuard, CycleState, TriggerGate};
use super::sink::{ClassificationEvent, ResultSink};

/// Everything the worker needs, moved onto its thread
pub(crate) struct DispatcherContext {
    pub mode: CaptureMode,
    pub consumer: BlockConsumer,
    pub gate: TriggerGate,
    pub ring: SharedRingBuffer,
    pub extractor: Arc<FeatureExtractor>,
    pub classifier: Classifier,
    pub store: Arc<TemplateStore>,
    pub sinks: Vec<Box<dyn ResultSink>>,
    pub telemetry: Arc<TelemetryCollector>,
    pub running: Arc<AtomicBool>,
    pub processed: Arc<AtomicU64>,
    /// Rate of the incoming blocks
    pub device_rate: u32,
    /// Triggered capture length at `device_rate`
    pub capture_samples: usize,
    /// Continuous hop at `device_rate`
    pub hop_samples: usize,
    pub started_at: Instant,
}

struct DispatchWorker {
    ctx: DispatcherContext,
    cycle: Option<CycleGuard>,
    capture: Vec<f32>,
    window: Vec<f32>,
    samples_since_last: usize,
    next_event: u64,
    reported_drops: u64,
}

impl DispatchWorker {
    fn new(ctx: DispatcherContext) -> Self {
        let capture = Vec::with_capacity(ctx.capture_samples);
        Self {
            ctx,
            cycle: None,
            capture,
            window: Vec::new(),
            samples_since_last: 0,
            next_event: 0,
            reported_drops: 0,
        }
    }

    fn run(mut self) {
        tracing::info!(
            "[Dispatcher] Started in {} mode at {} Hz",
            self.ctx.mode,
            self.ctx.device_rate
        );

        while self.ctx.running.load(Ordering::Acquire) {
            match self.ctx.consumer.pop() {
                Some(block) => {
                    match self.ctx.mode {
                        CaptureMode::Triggered => self.handle_triggered(&block),
                        CaptureMode::Continuous => self.handle_continuous(&block),
                    }
                    self.ctx.consumer.recycle(block);
                    self.ctx.processed.fetch_add(1, Ordering::Release);
                }
                None => {
                    self.report_drops();
                    thread::sleep(Duration::from_millis(1));
                }
            }
        }

        if self.cycle.take().is_some() {
            tracing::info!("[Dispatcher] Abandoned in-flight capture on shutdown");
        }
        tracing::info!("[Dispatcher] Stopped after {} result(s)", self.next_event);
    }

    fn handle_triggered(&mut self, block: &AudioBlock) {
        if self.cycle.is_none() {
            let Some(guard) = self.ctx.gate.claim() else {
                // Idle: nothing is recording
                return;
            };
            tracing::debug!("[Dispatcher] Capture started at block {}", block.sequence);
            self.capture.clear();
            self.cycle = Some(guard);
        }

        let remaining = self.ctx.capture_samples - self.capture.len();
        let take = remaining.min(block.samples.len());
        self.capture.extend_from_slice(&block.samples[..take]);
        if self.capture.len() < self.ctx.capture_samples {
            return;
        }

        let Some(guard) = self.cycle.take() else {
            return;
        };
        guard.advance(CycleState::Ready);
        guard.advance(CycleState::Classifying);

        let capture = std::mem::take(&mut self.capture);
        self.classify_window(&capture, block.sequence);
        self.capture = capture;
        // guard drops here: Classifying -> Idle
    }

    fn handle_continuous(&mut self, block: &AudioBlock) {
        if let Err(err) = self.ctx.ring.add(&block.samples) {
            log_audio_error(&err, "dispatcher ring add");
            return;
        }
        self.samples_since_last += block.samples.len();
        if self.samples_since_last < self.ctx.hop_samples {
            return;
        }

        let mut window = std::mem::take(&mut self.window);
        let ready = self
            .ctx
            .ring
            .is_full()
            .and_then(|full| {
                if full {
                    self.ctx.ring.snapshot_into(&mut window).map(|_| true)
                } else {
                    Ok(false)
                }
            });

        match ready {
            Ok(true) => {
                self.samples_since_last = 0;
                self.classify_window(&window, block.sequence);
            }
            Ok(false) => {}
            Err(err) => log_audio_error(&err, "dispatcher ring snapshot"),
        }
        self.window = window;
    }

    fn classify_window(&mut self, samples: &[f32], last_block: u64) {
        let started = Instant::now();
        let target_rate = self.ctx.extractor.sample_rate();
        let resampled;
        let input = if self.ctx.device_rate != target_rate {
            match resample(samples, self.ctx.device_rate, target_rate) {
                Ok(converted) => resampled = converted,
                Err(err) => {
                    log_audio_error(&err, "dispatcher resample");
                    return;
                }
            }
            resampled.as_slice()
        } else {
            samples
        };

        let outcome = self
            .ctx
            .extractor
            .extract(input, target_rate)
            .and_then(|query| self.ctx.classifier.evaluate(&query, &self.ctx.store));

        match outcome {
            Ok(decision) => {
                let accepted = decision.is_accepted();
                let result = decision.into_result();
                let processing_ms = started.elapsed().as_secs_f32() * 1000.0;
                self.ctx
                    .telemetry
                    .record_classification(&result.label, result.distance, accepted, processing_ms);

                let event = ClassificationEvent {
                    sequence: self.next_event,
                    mode: self.ctx.mode,
                    result,
                    accepted,
                    timestamp_ms: self.ctx.started_at.elapsed().as_millis() as u64,
                    last_block,
                };
                self.next_event += 1;
                tracing::debug!(
                    "[Dispatcher] Window ending at block {} classified in {:.1} ms",
                    last_block,
                    processing_ms
                );
                for sink in self.ctx.sinks.iter_mut() {
                    sink.deliver(&event);
                }
            }
            Err(err) => self.report_no_result(&err),
        }
    }

    fn report_no_result(&self, err: &AnalysisError) {
        log_analysis_error(err, "dispatcher");
        self.ctx.telemetry.record_no_result(err);
    }

    fn report_drops(&mut self) {
        let dropped = self.ctx.consumer.stats().dropped_blocks();
        if dropped > self.reported_drops {
            tracing::warn!(
                "[Dispatcher] {} block(s) dropped so far (backlog or pool exhausted)",
                dropped
            );
            self.ctx.telemetry.record_blocks_dropped(dropped);
            self.reported_drops = dropped;
        }
    }
}

/// Spawn the dispatcher thread
pub(crate) fn spawn_dispatcher(ctx: DispatcherContext) -> Result<JoinHandle<()>, AudioError> {
    thread::Builder::new()
        .name("phrase-dispatcher".to_string())
        .spawn(move || DispatchWorker::new(ctx).run())
        .map_err(AudioError::from)
}
