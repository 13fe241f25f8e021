// RingBuffer - fixed-capacity circular sample buffer
//
// Holds the most recent `capacity` samples. Before the first full cycle the
// unwritten positions read as zeros (oldest end of the snapshot) and
// `is_full()` reports false.
//
// SharedRingBuffer wraps it in a mutex so a producer `add` and a consumer
// `snapshot` on different threads never observe a half-written buffer.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::AudioError;

#[derive(Debug, Clone)]
pub struct RingBuffer {
    data: Vec<f32>,
    /// Next write position; also the oldest sample once full
    cursor: usize,
    total_written: u64,
}

impl RingBuffer {
    /// # Panics
    /// Panics if capacity is 0
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be greater than 0");
        Self {
            data: vec![0.0; capacity],
            cursor: 0,
            total_written: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Valid samples held (saturates at capacity)
    pub fn len(&self) -> usize {
        self.total_written.min(self.data.len() as u64) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.total_written == 0
    }

    /// True once at least `capacity` samples have been written
    pub fn is_full(&self) -> bool {
        self.total_written >= self.data.len() as u64
    }

    /// Samples written since construction or the last `clear`
    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Append samples, overwriting the oldest.
    ///
    /// Input longer than the capacity keeps only its last `capacity` samples.
    pub fn add(&mut self, samples: &[f32]) {
        let capacity = self.data.len();
        self.total_written += samples.len() as u64;

        if samples.len() >= capacity {
            self.data
                .copy_from_slice(&samples[samples.len() - capacity..]);
            self.cursor = 0;
            return;
        }

        let first = (capacity - self.cursor).min(samples.len());
        self.data[self.cursor..self.cursor + first].copy_from_slice(&samples[..first]);
        let rest = samples.len() - first;
        self.data[..rest].copy_from_slice(&samples[first..]);
        self.cursor = (self.cursor + samples.len()) % capacity;
    }

    /// Copy of the contents, oldest to newest.
    pub fn snapshot(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.data.len());
        self.snapshot_into(&mut out);
        out
    }

    /// Like [`snapshot`](Self::snapshot) but reuses `out`'s allocation.
    pub fn snapshot_into(&self, out: &mut Vec<f32>) {
        out.clear();
        out.extend_from_slice(&self.data[self.cursor..]);
        out.extend_from_slice(&self.data[..self.cursor]);
    }

    pub fn clear(&mut self) {
        self.data.fill(0.0);
        self.cursor = 0;
        self.total_written = 0;
    }
}

/// Thread-safe handle to a RingBuffer
#[derive(Debug, Clone)]
pub struct SharedRingBuffer {
    inner: Arc<Mutex<RingBuffer>>,
}

impl SharedRingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RingBuffer::new(capacity))),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, RingBuffer>, AudioError> {
        self.inner.lock().map_err(|_| AudioError::LockPoisoned {
            component: "ring_buffer".to_string(),
        })
    }

    pub fn add(&self, samples: &[f32]) -> Result<(), AudioError> {
        self.lock()?.add(samples);
        Ok(())
    }

    /// Atomic with respect to concurrent `add`.
    pub fn snapshot(&self) -> Result<Vec<f32>, AudioError> {
        Ok(self.lock()?.snapshot())
    }

    pub fn snapshot_into(&self, out: &mut Vec<f32>) -> Result<(), AudioError> {
        self.lock()?.snapshot_into(out);
        Ok(())
    }

    pub fn is_full(&self) -> Result<bool, AudioError> {
        Ok(self.lock()?.is_full())
    }

    pub fn total_written(&self) -> Result<u64, AudioError> {
        Ok(self.lock()?.total_written())
    }

    pub fn capacity(&self) -> Result<usize, AudioError> {
        Ok(self.lock()?.capacity())
    }

    pub fn clear(&self) -> Result<(), AudioError> {
        self.lock()?.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    fn range(lo: u32, hi: u32) -> Vec<f32> {
        (lo..=hi).map(|v| v as f32).collect()
    }

    #[test]
    fn test_capacity_ten_scenario() {
        let mut ring = RingBuffer::new(10);
        ring.add(&range(1, 5));
        ring.add(&range(6, 12));
        assert_eq!(ring.snapshot(), range(3, 12));
        assert!(ring.is_full());
        assert_eq!(ring.total_written(), 12);
    }

    #[test]
    fn test_zero_filled_before_full() {
        let mut ring = RingBuffer::new(5);
        assert!(ring.is_empty());
        ring.add(&[1.0, 2.0]);
        assert!(!ring.is_full());
        assert_eq!(ring.len(), 2);
        assert_eq!(ring.snapshot(), vec![0.0, 0.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_oversized_add_keeps_most_recent() {
        let mut ring = RingBuffer::new(4);
        ring.add(&[9.0]);
        ring.add(&range(1, 10));
        assert_eq!(ring.snapshot(), range(7, 10));
        ring.add(&[11.0]);
        assert_eq!(ring.snapshot(), range(8, 11));
    }

    #[test]
    fn test_any_chunking_yields_last_capacity_samples() {
        let mut rng = StdRng::seed_from_u64(17);
        for capacity in [1usize, 3, 10, 64] {
            for _ in 0..25 {
                let total = capacity + rng.gen_range(0..200);
                let input = range(1, total as u32);
                let mut ring = RingBuffer::new(capacity);
                let mut offset = 0;
                while offset < input.len() {
                    let chunk = rng.gen_range(0..=capacity * 2 + 1).min(input.len() - offset);
                    ring.add(&input[offset..offset + chunk]);
                    offset += chunk;
                }
                assert_eq!(ring.snapshot(), input[input.len() - capacity..].to_vec());
            }
        }
    }

    #[test]
    fn test_clear_resets_state() {
        let mut ring = RingBuffer::new(3);
        ring.add(&[1.0, 2.0, 3.0, 4.0]);
        ring.clear();
        assert!(ring.is_empty());
        assert_eq!(ring.snapshot(), vec![0.0; 3]);
    }

    #[test]
    #[should_panic(expected = "capacity must be greater than 0")]
    fn test_zero_capacity_panics() {
        RingBuffer::new(0);
    }

    #[test]
    fn test_concurrent_snapshots_are_contiguous() {
        const CAPACITY: usize = 256;
        const TOTAL: u32 = 200_000;

        let shared = SharedRingBuffer::new(CAPACITY);
        let done = Arc::new(AtomicBool::new(false));

        let producer = {
            let shared = shared.clone();
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(5);
                let mut next = 1u32;
                while next <= TOTAL {
                    let chunk = rng.gen_range(1..=97u32).min(TOTAL - next + 1);
                    let block: Vec<f32> = (next..next + chunk).map(|v| v as f32).collect();
                    shared.add(&block).unwrap();
                    next += chunk;
                }
                done.store(true, Ordering::SeqCst);
            })
        };

        let mut checked = 0;
        while !done.load(Ordering::SeqCst) || checked == 0 {
            let snap = shared.snapshot().unwrap();
            assert_eq!(snap.len(), CAPACITY);
            // Leading zeros only before the first full cycle, then strictly +1 steps
            let first_written = snap.iter().position(|&v| v != 0.0).unwrap_or(CAPACITY);
            for pair in snap[first_written..].windows(2) {
                assert_eq!(pair[1], pair[0] + 1.0, "gap or duplicate in {:?}", pair);
            }
            checked += 1;
        }

        producer.join().unwrap();
        let last = shared.snapshot().unwrap();
        assert_eq!(*last.last().unwrap(), TOTAL as f32);
        assert!(shared.is_full().unwrap());
    }
}
