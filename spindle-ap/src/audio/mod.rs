//! Audio buffers, the buffer ring and the queued output device

pub mod buffer;
pub mod cpal_queue;
pub mod output;
pub mod types;

pub use buffer::BufferRing;
pub use cpal_queue::CpalDevice;
pub use output::{CompletionHandler, ErrorHandler, OutputDevice, OutputQueue, QueueCallbacks, QueueSpec};
pub use types::{AudioBuffer, BufferGauge, OutputFormat};
