//! Queued audio output abstraction
//!
//! An output queue plays buffers in submission order and hands each one back
//! through the completion handler once it has finished playing. The handler
//! runs on a thread owned by the device, never on the command thread.

use crate::audio::types::{AudioBuffer, OutputFormat};
use crate::error::Result;

/// Called on the device thread for every finished buffer.
///
/// Returning `Some(buffer)` resubmits it to the tail of the queue;
/// returning `None` keeps it out of the queue (end of data, or shutdown).
pub type CompletionHandler = Box<dyn FnMut(AudioBuffer) -> Option<AudioBuffer> + Send>;

/// Called on the device thread when the stream fails fatally
pub type ErrorHandler = Box<dyn Fn(String) + Send + Sync>;

/// Callbacks bound to one queue for its whole lifetime
pub struct QueueCallbacks {
    pub on_complete: CompletionHandler,
    pub on_error: ErrorHandler,
}

/// Requested queue parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueSpec {
    /// Requested format; the queue reports what it actually negotiated
    pub format: OutputFormat,
    /// Maximum number of buffers that will ever be in the queue
    pub buffers: usize,
}

/// Factory for output queues (one device, many successive queues)
pub trait OutputDevice: Send {
    /// Allocate a queue bound to `callbacks`.
    ///
    /// The queue starts out stopped. Fails with `QueueInit`.
    fn create_queue(&mut self, spec: QueueSpec, callbacks: QueueCallbacks) -> Result<Box<dyn OutputQueue>>;
}

/// One live output queue
pub trait OutputQueue: Send {
    /// Negotiated format (sample rate may differ from the request)
    fn format(&self) -> OutputFormat;

    /// Submit a buffer to the tail of the queue
    fn enqueue(&mut self, buffer: AudioBuffer) -> Result<()>;

    /// Begin playback of enqueued buffers. Fails with `StartFailed`.
    fn start(&mut self) -> Result<()>;

    /// Suspend playback, keeping every buffer and the queue position.
    /// Fails with `PauseFailed`.
    fn pause(&mut self) -> Result<()>;

    /// Continue after `pause`. Fails with `StartFailed`.
    fn resume(&mut self) -> Result<()>;

    /// Linear volume in [0.0, 1.0], applied immediately
    fn set_volume(&mut self, volume: f32);

    /// Stop the device and release every buffer it holds.
    ///
    /// No completion handler runs after this returns. Idempotent.
    fn dispose(&mut self);
}
