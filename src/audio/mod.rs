// Audio module - device capture, block transport and PCM utilities

pub mod block_queue;
pub mod capture;
pub mod resample;
pub mod ring_buffer;
pub mod wav;

// Re-export commonly used types for convenience
pub use block_queue::{
    AudioBlock, BlockConsumer, BlockProducer, BlockQueue, QueueStats, DEFAULT_BLOCK_SIZE,
    DEFAULT_QUEUE_CAPACITY,
};
pub use capture::{list_input_devices, DeviceInfo};
pub use ring_buffer::{RingBuffer, SharedRingBuffer};
