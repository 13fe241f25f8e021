//! Telemetry event types published by a capture session.

use serde::{Deserialize, Serialize};

use crate::engine::gate::CycleState;

/// Session lifecycle stages
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    Started,
    ShuttingDown,
    Stopped,
}

/// Why a window produced no classification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NoResultReason {
    InvalidInput,
    EmptySequence,
    EmptyStore,
    Other,
}

/// Metric events covering classification outcomes, drops and lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum MetricEvent {
    Classification {
        label: String,
        distance: f32,
        accepted: bool,
        processing_ms: f32,
    },
    NoResult {
        reason: NoResultReason,
        message: String,
    },
    TriggerRejected {
        state: CycleState,
    },
    BlocksDropped {
        total: u64,
    },
    Latency {
        avg_ms: f32,
        max_ms: f32,
        sample_count: usize,
    },
    Lifecycle {
        phase: LifecyclePhase,
        timestamp_ms: u64,
    },
}
