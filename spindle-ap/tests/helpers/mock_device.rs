//! Scriptable output device
//!
//! `MockDevice` hands out queues that keep their buffers in memory instead
//! of playing them. Tests drive the device thread by hand through a
//! `MockHandle`: `complete_next` plays the buffer at the head of the queue
//! and runs the completion handler exactly as a real device would.

use spindle_ap::audio::{
    AudioBuffer, CompletionHandler, ErrorHandler, OutputDevice, OutputFormat, OutputQueue,
    QueueCallbacks, QueueSpec,
};
use spindle_ap::{Error, Result};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// Device operations in the order they happened
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Created { sample_rate: u32, buffers: usize },
    Enqueue(usize),
    Start,
    Pause,
    Resume,
    Volume(f32),
    Dispose,
}

/// Failure injection switches
#[derive(Debug, Default, Clone)]
pub struct Faults {
    pub create: bool,
    pub start: bool,
    pub pause: bool,
    /// Fail the Nth enqueue of a queue (0-based)
    pub enqueue_at: Option<usize>,
}

#[derive(Default)]
struct MockState {
    ops: Vec<Op>,
    queued: VecDeque<AudioBuffer>,
    on_complete: Option<CompletionHandler>,
    on_error: Option<ErrorHandler>,
    started: bool,
    paused: bool,
    live_queues: usize,
    enqueued_this_queue: usize,
    faults: Faults,
    negotiated_rate: Option<u32>,
}

/// Test-side view of a `MockDevice`
#[derive(Clone, Default)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockHandle {
    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn ops(&self) -> Vec<Op> {
        self.state().ops.clone()
    }

    pub fn clear_ops(&self) {
        self.state().ops.clear();
    }

    pub fn count(&self, op: &Op) -> usize {
        self.state().ops.iter().filter(|o| *o == op).count()
    }

    pub fn enqueue_count(&self) -> usize {
        self.state()
            .ops
            .iter()
            .filter(|o| matches!(o, Op::Enqueue(_)))
            .count()
    }

    /// Buffers currently held by the queue
    pub fn queued(&self) -> usize {
        self.state().queued.len()
    }

    pub fn live_queues(&self) -> usize {
        self.state().live_queues
    }

    pub fn is_playing(&self) -> bool {
        let state = self.state();
        state.started && !state.paused
    }

    pub fn set_faults(&self, faults: Faults) {
        self.state().faults = faults;
    }

    /// Make every new queue report `rate` instead of the requested rate
    pub fn negotiate_rate(&self, rate: u32) {
        self.state().negotiated_rate = Some(rate);
    }

    /// Finish the buffer at the head of the queue.
    ///
    /// Returns false when the queue is not playing or holds no buffer.
    pub fn complete_next(&self) -> bool {
        let (buffer, mut handler) = {
            let mut state = self.state();
            if !(state.started && !state.paused) {
                return false;
            }
            let Some(buffer) = state.queued.pop_front() else {
                return false;
            };
            let Some(handler) = state.on_complete.take() else {
                return false;
            };
            (buffer, handler)
        };

        // The handler locks the player session; never call it under our lock
        let requeued = handler(buffer);

        let mut state = self.state();
        if let Some(buffer) = requeued {
            state.ops.push(Op::Enqueue(buffer.index()));
            state.queued.push_back(buffer);
        }
        if state.live_queues > 0 && state.on_complete.is_none() {
            state.on_complete = Some(handler);
        }
        true
    }

    /// Complete buffers until the queue stops producing; returns how many
    pub fn drain(&self) -> usize {
        let mut completed = 0;
        while self.complete_next() {
            completed += 1;
        }
        completed
    }

    /// Report a fatal stream error through the queue's error handler
    pub fn raise_error(&self, message: &str) {
        let state = self.state();
        if let Some(on_error) = state.on_error.as_ref() {
            on_error(message.to_string());
        }
    }
}

/// `OutputDevice` backed by a `MockHandle`
pub struct MockDevice {
    handle: MockHandle,
}

impl MockDevice {
    pub fn new() -> (Self, MockHandle) {
        let handle = MockHandle::default();
        (
            Self {
                handle: handle.clone(),
            },
            handle,
        )
    }
}

impl OutputDevice for MockDevice {
    fn create_queue(&mut self, spec: QueueSpec, callbacks: QueueCallbacks) -> Result<Box<dyn OutputQueue>> {
        let mut state = self.handle.state();
        if state.faults.create {
            return Err(Error::QueueInit("injected create failure".to_string()));
        }

        let sample_rate = state.negotiated_rate.unwrap_or(spec.format.sample_rate);
        state.ops.push(Op::Created {
            sample_rate,
            buffers: spec.buffers,
        });
        state.on_complete = Some(callbacks.on_complete);
        state.on_error = Some(callbacks.on_error);
        state.started = false;
        state.paused = false;
        state.enqueued_this_queue = 0;
        state.live_queues += 1;

        Ok(Box::new(MockQueue {
            handle: self.handle.clone(),
            format: OutputFormat::new(sample_rate, spec.format.channels),
            disposed: false,
        }))
    }
}

struct MockQueue {
    handle: MockHandle,
    format: OutputFormat,
    disposed: bool,
}

impl OutputQueue for MockQueue {
    fn format(&self) -> OutputFormat {
        self.format
    }

    fn enqueue(&mut self, buffer: AudioBuffer) -> Result<()> {
        let mut state = self.handle.state();
        let attempt = state.enqueued_this_queue;
        state.enqueued_this_queue += 1;
        if state.faults.enqueue_at == Some(attempt) {
            return Err(Error::Enqueue("injected enqueue failure".to_string()));
        }
        state.ops.push(Op::Enqueue(buffer.index()));
        state.queued.push_back(buffer);
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        let mut state = self.handle.state();
        if state.faults.start {
            return Err(Error::StartFailed("injected start failure".to_string()));
        }
        state.ops.push(Op::Start);
        state.started = true;
        state.paused = false;
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        let mut state = self.handle.state();
        if state.faults.pause {
            return Err(Error::PauseFailed("injected pause failure".to_string()));
        }
        state.ops.push(Op::Pause);
        state.paused = true;
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        let mut state = self.handle.state();
        state.ops.push(Op::Resume);
        state.paused = false;
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) {
        self.handle.state().ops.push(Op::Volume(volume));
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        let (queued, on_complete, on_error) = {
            let mut state = self.handle.state();
            state.ops.push(Op::Dispose);
            state.started = false;
            state.paused = false;
            state.live_queues -= 1;
            (
                std::mem::take(&mut state.queued),
                state.on_complete.take(),
                state.on_error.take(),
            )
        };
        // Buffers and callbacks drop outside our lock
        drop(queued);
        drop(on_complete);
        drop(on_error);
    }
}

impl Drop for MockQueue {
    fn drop(&mut self) {
        self.dispose();
    }
}
