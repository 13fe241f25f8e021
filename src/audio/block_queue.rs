// BlockQueue - bounded lock-free block transport from audio callback to worker
//
// Two SPSC ring buffers (rtrb) form an object pool so the callback never
// allocates:
// - DATA queue: callback pushes filled blocks, worker consumes
// - POOL queue: worker returns empty blocks, callback recycles
//
// Block flow:
// 1. Callback pops an empty block from POOL
// 2. Callback copies (first-channel) samples into it and stamps a sequence number
// 3. Callback pushes it to DATA
// 4. Worker pops from DATA, first shedding the oldest blocks if more than
//    `max_backlog` are waiting
// 5. Worker processes and returns the block to POOL
//
// The callback never waits. When no empty block is available the incoming
// audio is dropped and counted; backlog shedding is counted the same way.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rtrb::{Consumer, Producer};

/// Configuration constants for the block pool
pub const DEFAULT_BLOCK_SIZE: usize = 1024;
pub const DEFAULT_QUEUE_CAPACITY: usize = 32;

/// Blocks kept in the pool beyond the logical queue capacity so the callback
/// still finds a free block while the worker holds one
const POOL_SLACK: usize = 2;

/// One device-callback chunk of mono samples
#[derive(Debug, Clone)]
pub struct AudioBlock {
    /// Monotonic capture order, starting at 0
    pub sequence: u64,
    pub samples: Vec<f32>,
}

/// Counters shared by both ends of the queue
#[derive(Debug, Clone, Default)]
pub struct QueueStats {
    pushed: Arc<AtomicU64>,
    overflowed: Arc<AtomicU64>,
    shed: Arc<AtomicU64>,
    consumed: Arc<AtomicU64>,
}

impl QueueStats {
    /// Blocks lost to pool exhaustion or backlog shedding
    pub fn dropped_blocks(&self) -> u64 {
        self.overflowed.load(Ordering::Relaxed) + self.shed.load(Ordering::Relaxed)
    }

    /// Blocks successfully handed to the data queue
    pub fn pushed_blocks(&self) -> u64 {
        self.pushed.load(Ordering::Relaxed)
    }

    /// Blocks handed to the worker by `BlockConsumer::pop`
    pub fn consumed_blocks(&self) -> u64 {
        self.consumed.load(Ordering::Relaxed)
    }

    /// True when every pushed block has been consumed or shed
    pub fn is_drained(&self) -> bool {
        let settled = self.consumed.load(Ordering::Acquire) + self.shed.load(Ordering::Acquire);
        settled >= self.pushed.load(Ordering::Acquire)
    }
}

/// Callback-side handle
pub struct BlockProducer {
    data_producer: Producer<AudioBlock>,
    pool_consumer: Consumer<AudioBlock>,
    block_size: usize,
    max_backlog: usize,
    next_sequence: u64,
    stats: QueueStats,
}

impl BlockProducer {
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Empty blocks available to the callback
    pub fn free_blocks(&self) -> usize {
        self.pool_consumer.slots()
    }

    /// Filled blocks not yet taken by the worker
    pub fn pending(&self) -> usize {
        self.data_producer.buffer().capacity() - self.data_producer.slots()
    }

    /// True when one more block can be pushed without being dropped or shed
    pub fn has_room(&self) -> bool {
        self.free_blocks() > 0 && self.pending() < self.max_backlog
    }

    pub fn stats(&self) -> QueueStats {
        self.stats.clone()
    }

    /// Push mono f32 samples, split into blocks of at most `block_size`.
    ///
    /// Returns the number of blocks dropped because the pool was empty.
    pub fn push_samples(&mut self, samples: &[f32]) -> usize {
        self.push_frames(samples, 1, |s| s)
    }

    /// Push interleaved frames, keeping only the first channel.
    ///
    /// `convert` maps the device sample type to f32. Real-time safe: no
    /// allocation (blocks are pre-sized), no locks, no logging.
    pub fn push_frames<T: Copy>(
        &mut self,
        data: &[T],
        channels: usize,
        convert: impl Fn(T) -> f32,
    ) -> usize {
        let channels = channels.max(1);
        let frame_count = data.len() / channels;
        let mut dropped = 0;
        let mut frame = 0;

        while frame < frame_count {
            let take = (frame_count - frame).min(self.block_size);
            let sequence = self.next_sequence;
            self.next_sequence += 1;

            let Ok(mut block) = self.pool_consumer.pop() else {
                dropped += 1;
                frame += take;
                continue;
            };

            block.sequence = sequence;
            block.samples.clear();
            block.samples.extend(
                data[frame * channels..(frame + take) * channels]
                    .iter()
                    .step_by(channels)
                    .map(|&s| convert(s)),
            );

            if self.data_producer.push(block).is_ok() {
                self.stats.pushed.fetch_add(1, Ordering::Release);
            } else {
                dropped += 1;
            }
            frame += take;
        }

        if dropped > 0 {
            self.stats
                .overflowed
                .fetch_add(dropped as u64, Ordering::Relaxed);
        }
        dropped
    }
}

/// Worker-side handle
pub struct BlockConsumer {
    data_consumer: Consumer<AudioBlock>,
    pool_producer: Producer<AudioBlock>,
    max_backlog: usize,
    stats: QueueStats,
}

impl BlockConsumer {
    /// Blocks currently waiting
    pub fn backlog(&self) -> usize {
        self.data_consumer.slots()
    }

    pub fn stats(&self) -> QueueStats {
        self.stats.clone()
    }

    /// Pop the oldest block that survives backlog shedding.
    ///
    /// If more than `max_backlog` blocks are waiting, the oldest excess
    /// blocks are recycled unprocessed and counted as dropped.
    pub fn pop(&mut self) -> Option<AudioBlock> {
        let mut shed = 0u64;
        while self.data_consumer.slots() > self.max_backlog {
            match self.data_consumer.pop() {
                Ok(stale) => {
                    self.recycle(stale);
                    shed += 1;
                }
                Err(_) => break,
            }
        }
        if shed > 0 {
            self.stats.shed.fetch_add(shed, Ordering::Release);
        }
        let block = self.data_consumer.pop().ok()?;
        self.stats.consumed.fetch_add(1, Ordering::Release);
        Some(block)
    }

    /// Return a processed block to the pool.
    pub fn recycle(&mut self, block: AudioBlock) {
        // Pool capacity equals the number of blocks ever allocated, so this
        // cannot overflow.
        let _ = self.pool_producer.push(block);
    }
}

/// Lock-free block queue built from two SPSC ring buffers
pub struct BlockQueue;

impl BlockQueue {
    /// Pre-allocate the pool and return both ends
    ///
    /// # Arguments
    /// * `block_size` - Maximum samples per block
    /// * `max_backlog` - Logical queue capacity before oldest blocks are shed
    /// * `pool_size` - Pre-allocated blocks (raised to `max_backlog + 2` if smaller)
    ///
    /// # Panics
    /// Panics if block_size or max_backlog is 0
    #[allow(clippy::new_ret_no_self)]
    pub fn new(
        block_size: usize,
        max_backlog: usize,
        pool_size: usize,
    ) -> (BlockProducer, BlockConsumer) {
        assert!(block_size > 0, "block_size must be greater than 0");
        assert!(max_backlog > 0, "max_backlog must be greater than 0");

        let pool_size = pool_size.max(max_backlog + POOL_SLACK);
        let (mut pool_producer, pool_consumer) = rtrb::RingBuffer::new(pool_size);
        let (data_producer, data_consumer) = rtrb::RingBuffer::new(pool_size);

        // The only place where block storage is allocated
        for _ in 0..pool_size {
            let block = AudioBlock {
                sequence: 0,
                samples: Vec::with_capacity(block_size),
            };
            if pool_producer.push(block).is_err() {
                break;
            }
        }

        let stats = QueueStats::default();
        (
            BlockProducer {
                data_producer,
                pool_consumer,
                block_size,
                max_backlog,
                next_sequence: 0,
                stats: stats.clone(),
            },
            BlockConsumer {
                data_consumer,
                pool_producer,
                max_backlog,
                stats,
            },
        )
    }
}
