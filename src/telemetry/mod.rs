//! Session telemetry collector.
//!
//! Multiplexes classification, drop, trigger and lifecycle events into a
//! bounded history plus a broadcast stream. Each `PipelineSession` owns one
//! collector; nothing here is process-global.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::broadcast;

use crate::engine::gate::CycleState;
use crate::error::AnalysisError;

pub mod events;

pub use events::{LifecyclePhase, MetricEvent, NoResultReason};

/// Snapshot of collector state for CLI reporting.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TelemetrySnapshot {
    pub recent: Vec<MetricEvent>,
    pub total_events: u64,
    pub dropped_events: u64,
    pub classifications: u64,
    pub no_results: u64,
    pub rejected_triggers: u64,
}

/// Broadcast-based collector retaining a bounded history of metrics.
pub struct TelemetryCollector {
    tx: broadcast::Sender<MetricEvent>,
    history: Mutex<VecDeque<MetricEvent>>,
    history_capacity: usize,
    latency: Mutex<LatencyTracker>,
    total_events: AtomicU64,
    dropped_history: AtomicU64,
    classifications: AtomicU64,
    no_results: AtomicU64,
    rejected_triggers: AtomicU64,
}

impl TelemetryCollector {
    pub fn new(buffer: usize, history_capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer.max(1));
        Self {
            tx,
            history: Mutex::new(VecDeque::with_capacity(history_capacity)),
            history_capacity: history_capacity.max(1),
            latency: Mutex::new(LatencyTracker::new(32)),
            total_events: AtomicU64::new(0),
            dropped_history: AtomicU64::new(0),
            classifications: AtomicU64::new(0),
            no_results: AtomicU64::new(0),
            rejected_triggers: AtomicU64::new(0),
        }
    }

    pub fn publish(&self, event: MetricEvent) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        {
            let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
            if history.len() == self.history_capacity {
                history.pop_front();
                self.dropped_history.fetch_add(1, Ordering::Relaxed);
            }
            history.push_back(event.clone());
        }

        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MetricEvent> {
        self.tx.subscribe()
    }

    pub fn record_classification(
        &self,
        label: &str,
        distance: f32,
        accepted: bool,
        processing_ms: f32,
    ) {
        self.classifications.fetch_add(1, Ordering::Relaxed);
        self.publish(MetricEvent::Classification {
            label: label.to_string(),
            distance,
            accepted,
            processing_ms,
        });

        let (avg_ms, max_ms, sample_count) = self
            .latency
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .observe(processing_ms);
        self.publish(MetricEvent::Latency {
            avg_ms,
            max_ms,
            sample_count,
        });
    }

    pub fn record_no_result(&self, err: &AnalysisError) {
        self.no_results.fetch_add(1, Ordering::Relaxed);
        let reason = match err {
            AnalysisError::InvalidInput { .. } | AnalysisError::SampleRateMismatch { .. } => {
                NoResultReason::InvalidInput
            }
            AnalysisError::EmptySequence => NoResultReason::EmptySequence,
            AnalysisError::EmptyStore => NoResultReason::EmptyStore,
            AnalysisError::InconsistentFrames { .. } => NoResultReason::Other,
        };
        self.publish(MetricEvent::NoResult {
            reason,
            message: err.to_string(),
        });
    }

    pub fn record_trigger_rejected(&self, state: CycleState) {
        self.rejected_triggers.fetch_add(1, Ordering::Relaxed);
        self.publish(MetricEvent::TriggerRejected { state });
    }

    pub fn record_blocks_dropped(&self, total: u64) {
        self.publish(MetricEvent::BlocksDropped { total });
    }

    pub fn record_lifecycle(&self, phase: LifecyclePhase) {
        self.publish(MetricEvent::Lifecycle {
            phase,
            timestamp_ms: now_timestamp_ms(),
        });
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        TelemetrySnapshot {
            recent: history.iter().cloned().collect(),
            total_events: self.total_events.load(Ordering::Relaxed),
            dropped_events: self.dropped_history.load(Ordering::Relaxed),
            classifications: self.classifications.load(Ordering::Relaxed),
            no_results: self.no_results.load(Ordering::Relaxed),
            rejected_triggers: self.rejected_triggers.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new(256, 64)
    }
}

/// Rolling window of classification processing times.
struct LatencyTracker {
    samples: VecDeque<f32>,
    max_samples: usize,
}

impl LatencyTracker {
    fn new(max_samples: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(max_samples),
            max_samples,
        }
    }

    fn observe(&mut self, value: f32) -> (f32, f32, usize) {
        if self.samples.len() == self.max_samples {
            self.samples.pop_front();
        }
        self.samples.push_back(value.abs());

        let count = self.samples.len();
        let sum: f32 = self.samples.iter().copied().sum();
        let max = self
            .samples
            .iter()
            .copied()
            .fold(0.0_f32, |acc, next| acc.max(next));
        (sum / count as f32, max, count)
    }
}

fn now_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collector_preserves_order_within_history() {
        let collector = TelemetryCollector::new(8, 2);
        collector.record_blocks_dropped(1);
        collector.record_blocks_dropped(2);
        collector.record_blocks_dropped(3);

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.total_events, 3);
        assert_eq!(snapshot.dropped_events, 1);
        assert_eq!(
            snapshot.recent,
            vec![
                MetricEvent::BlocksDropped { total: 2 },
                MetricEvent::BlocksDropped { total: 3 }
            ]
        );
    }

    #[test]
    fn classification_emits_latency_gauge() {
        let collector = TelemetryCollector::default();
        collector.record_classification("yes", 1.5, true, 4.0);
        collector.record_classification("no", 2.5, false, 8.0);

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.classifications, 2);
        match snapshot.recent.last() {
            Some(MetricEvent::Latency {
                avg_ms,
                max_ms,
                sample_count,
            }) => {
                assert_eq!(*sample_count, 2);
                assert!((avg_ms - 6.0).abs() < 1e-6);
                assert!((max_ms - 8.0).abs() < 1e-6);
            }
            other => panic!("expected latency event, got {:?}", other),
        }
    }

    #[test]
    fn no_result_reasons_map_from_errors() {
        let collector = TelemetryCollector::default();
        collector.record_no_result(&AnalysisError::EmptyStore);
        collector.record_no_result(&AnalysisError::InvalidInput {
            reason: "short".to_string(),
        });
        let snapshot = collector.snapshot();
        assert_eq!(snapshot.no_results, 2);
        assert!(matches!(
            snapshot.recent[0],
            MetricEvent::NoResult {
                reason: NoResultReason::EmptyStore,
                ..
            }
        ));
        assert!(matches!(
            snapshot.recent[1],
            MetricEvent::NoResult {
                reason: NoResultReason::InvalidInput,
                ..
            }
        ));
    }

    #[test]
    fn subscribers_receive_events() {
        let collector = TelemetryCollector::default();
        let mut rx = collector.subscribe();
        collector.record_trigger_rejected(CycleState::Capturing);
        assert_eq!(
            rx.try_recv().unwrap(),
            MetricEvent::TriggerRejected {
                state: CycleState::Capturing
            }
        );
        assert_eq!(collector.snapshot().rejected_triggers, 1);
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_string(&MetricEvent::BlocksDropped { total: 4 }).unwrap();
        assert_eq!(json, r#"{"type":"blocks_dropped","payload":{"total":4}}"#);
    }
}
