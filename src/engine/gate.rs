//! Triggered-mode cycle state and its single-flight gate.
//!
//! `Idle -> Capturing -> Ready -> Classifying -> Idle`. A continuous-mode
//! gate sits in `Listening` for its whole life. Only the trigger
//! moves the machine out of `Idle` (compare-exchange, so concurrent triggers
//! cannot both win). The worker owns the cycle through a [`CycleGuard`] whose
//! drop returns the gate to `Idle` on every exit path.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum CycleState {
    Idle = 0,
    Capturing = 1,
    Ready = 2,
    Classifying = 3,
    /// Continuous mode steady state
    Listening = 4,
}

impl CycleState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => CycleState::Capturing,
            2 => CycleState::Ready,
            3 => CycleState::Classifying,
            4 => CycleState::Listening,
            _ => CycleState::Idle,
        }
    }
}

/// Result of an external trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerOutcome {
    /// Gate moved Idle -> Capturing
    Accepted,
    /// A cycle is already in flight; the trigger was ignored
    Busy(CycleState),
    /// Session runs in continuous mode
    NotTriggeredMode,
    /// Session has shut down
    Stopped,
}

/// Shared cycle state
#[derive(Debug, Clone, Default)]
pub struct TriggerGate {
    state: Arc<AtomicU8>,
}

impl TriggerGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gate for a continuous session; never accepts a trigger
    pub fn listening() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(CycleState::Listening as u8)),
        }
    }

    /// True when no triggered cycle is in flight
    pub fn is_settled(&self) -> bool {
        matches!(self.state(), CycleState::Idle | CycleState::Listening)
    }

    pub fn state(&self) -> CycleState {
        CycleState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Try to start a cycle.
    pub fn try_trigger(&self) -> TriggerOutcome {
        match self.state.compare_exchange(
            CycleState::Idle as u8,
            CycleState::Capturing as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => TriggerOutcome::Accepted,
            Err(current) => TriggerOutcome::Busy(CycleState::from_u8(current)),
        }
    }

    /// Take ownership of a triggered cycle if one is waiting to capture.
    pub fn claim(&self) -> Option<CycleGuard> {
        (self.state() == CycleState::Capturing).then(|| CycleGuard { gate: self.clone() })
    }

    fn set(&self, state: CycleState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

/// Scoped ownership of one capture-classify cycle
#[derive(Debug)]
pub struct CycleGuard {
    gate: TriggerGate,
}

impl CycleGuard {
    /// Advance the cycle (Capturing -> Ready -> Classifying).
    pub fn advance(&self, state: CycleState) {
        self.gate.set(state);
    }

    pub fn state(&self) -> CycleState {
        self.gate.state()
    }
}

impl Drop for CycleGuard {
    fn drop(&mut self) {
        self.gate.set(CycleState::Idle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    #[test]
    fn test_trigger_from_idle() {
        let gate = TriggerGate::new();
        assert_eq!(gate.state(), CycleState::Idle);
        assert_eq!(gate.try_trigger(), TriggerOutcome::Accepted);
        assert_eq!(gate.state(), CycleState::Capturing);
    }

    #[test]
    fn test_second_trigger_is_busy() {
        let gate = TriggerGate::new();
        gate.try_trigger();
        assert_eq!(
            gate.try_trigger(),
            TriggerOutcome::Busy(CycleState::Capturing)
        );
    }

    #[test]
    fn test_listening_gate_never_claims() {
        let gate = TriggerGate::listening();
        assert!(gate.is_settled());
        assert_eq!(
            gate.try_trigger(),
            TriggerOutcome::Busy(CycleState::Listening)
        );
        assert!(gate.claim().is_none());
        assert_eq!(gate.state(), CycleState::Listening);
    }

    #[test]
    fn test_claim_requires_trigger() {
        let gate = TriggerGate::new();
        assert!(gate.claim().is_none());
        gate.try_trigger();
        assert!(gate.claim().is_some());
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let gate = TriggerGate::new();
        gate.try_trigger();
        {
            let guard = gate.claim().unwrap();
            guard.advance(CycleState::Ready);
            guard.advance(CycleState::Classifying);
            assert_eq!(
                gate.try_trigger(),
                TriggerOutcome::Busy(CycleState::Classifying)
            );
        }
        assert_eq!(gate.state(), CycleState::Idle);
        assert_eq!(gate.try_trigger(), TriggerOutcome::Accepted);
    }

    #[test]
    fn test_guard_releases_on_error_path() {
        fn failing_cycle(gate: &TriggerGate) -> Result<(), String> {
            let guard = gate.claim().ok_or("not triggered")?;
            guard.advance(CycleState::Classifying);
            Err("extraction failed".to_string())
        }

        let gate = TriggerGate::new();
        gate.try_trigger();
        assert!(failing_cycle(&gate).is_err());
        assert_eq!(gate.state(), CycleState::Idle);
    }

    #[test]
    fn test_guard_releases_on_panic() {
        let gate = TriggerGate::new();
        gate.try_trigger();
        let worker_gate = gate.clone();
        let result = thread::spawn(move || {
            let _guard = worker_gate.claim().unwrap();
            panic!("worker crashed mid-cycle");
        })
        .join();
        assert!(result.is_err());
        assert_eq!(gate.state(), CycleState::Idle);
    }

    #[test]
    fn test_only_one_concurrent_trigger_wins() {
        let gate = TriggerGate::new();
        let barrier = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gate = gate.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    gate.try_trigger()
                })
            })
            .collect();

        let accepted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|o| *o == TriggerOutcome::Accepted)
            .count();
        assert_eq!(accepted, 1);
    }
}
