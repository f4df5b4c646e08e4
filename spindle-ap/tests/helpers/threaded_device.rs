//! Output device with its own playback thread
//!
//! `ThreadedDevice` behaves like the cpal queue where it matters for
//! locking: every queue call is a request answered by a dedicated thread,
//! and that same thread runs the completion handler whenever it is playing.
//! With `early_playback` the thread plays buffers as soon as they are
//! enqueued, like hosts whose streams run from creation.

use spindle_ap::audio::{
    AudioBuffer, CompletionHandler, OutputDevice, OutputFormat, OutputQueue, QueueCallbacks, QueueSpec,
};
use spindle_ap::{Error, Result};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Idle wait between requests; one buffer plays per tick
const TICK: Duration = Duration::from_micros(200);

enum Request {
    Enqueue(AudioBuffer, Sender<()>),
    Play(Sender<()>),
    Pause(Sender<()>),
    Shutdown,
}

#[derive(Default)]
struct Counters {
    live_queues: AtomicUsize,
    completions: AtomicUsize,
}

/// Test-side view of a `ThreadedDevice`
#[derive(Clone, Default)]
pub struct ThreadedHandle {
    counters: Arc<Counters>,
}

impl ThreadedHandle {
    pub fn live_queues(&self) -> usize {
        self.counters.live_queues.load(Ordering::SeqCst)
    }

    /// Completion handler runs so far, across every queue
    pub fn completions(&self) -> usize {
        self.counters.completions.load(Ordering::SeqCst)
    }

    /// Wait until at least `target` completions have run
    pub fn wait_for_completions(&self, target: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.completions() < target {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(TICK);
        }
        true
    }
}

pub struct ThreadedDevice {
    handle: ThreadedHandle,
    early_playback: bool,
}

impl ThreadedDevice {
    pub fn new(early_playback: bool) -> (Self, ThreadedHandle) {
        let handle = ThreadedHandle::default();
        (
            Self {
                handle: handle.clone(),
                early_playback,
            },
            handle,
        )
    }
}

impl OutputDevice for ThreadedDevice {
    fn create_queue(&mut self, spec: QueueSpec, callbacks: QueueCallbacks) -> Result<Box<dyn OutputQueue>> {
        let (requests, inbox) = mpsc::channel();
        let counters = Arc::clone(&self.handle.counters);
        let playing = self.early_playback;
        let on_complete = callbacks.on_complete;

        let thread = thread::Builder::new()
            .name("test-device".to_string())
            .spawn(move || run_device(inbox, on_complete, playing, counters))
            .map_err(|e| Error::QueueInit(e.to_string()))?;
        self.handle.counters.live_queues.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(ThreadedQueue {
            format: spec.format,
            requests,
            thread: Some(thread),
            counters: Arc::clone(&self.handle.counters),
        }))
    }
}

fn run_device(inbox: Receiver<Request>, mut on_complete: CompletionHandler, mut playing: bool, counters: Arc<Counters>) {
    let mut queued = VecDeque::new();
    loop {
        match inbox.recv_timeout(TICK) {
            Ok(Request::Enqueue(buffer, reply)) => {
                queued.push_back(buffer);
                let _ = reply.send(());
            }
            Ok(Request::Play(reply)) => {
                playing = true;
                let _ = reply.send(());
            }
            Ok(Request::Pause(reply)) => {
                playing = false;
                let _ = reply.send(());
            }
            Ok(Request::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }

        if !playing {
            continue;
        }
        if let Some(buffer) = queued.pop_front() {
            counters.completions.fetch_add(1, Ordering::SeqCst);
            if let Some(buffer) = on_complete(buffer) {
                queued.push_back(buffer);
            }
        }
    }
    // Queued buffers and the handler drop here, on the device thread
}

struct ThreadedQueue {
    format: OutputFormat,
    requests: Sender<Request>,
    thread: Option<JoinHandle<()>>,
    counters: Arc<Counters>,
}

impl ThreadedQueue {
    /// Send a request and wait for the device thread to answer it
    fn call(&self, request: impl FnOnce(Sender<()>) -> Request) -> Result<()> {
        let (reply, answer) = mpsc::channel();
        self.requests
            .send(request(reply))
            .map_err(|_| Error::Enqueue("device thread gone".to_string()))?;
        answer
            .recv()
            .map_err(|_| Error::Enqueue("device thread gone".to_string()))
    }
}

impl OutputQueue for ThreadedQueue {
    fn format(&self) -> OutputFormat {
        self.format
    }

    fn enqueue(&mut self, buffer: AudioBuffer) -> Result<()> {
        self.call(|reply| Request::Enqueue(buffer, reply))
    }

    fn start(&mut self) -> Result<()> {
        self.call(Request::Play)
    }

    fn pause(&mut self) -> Result<()> {
        self.call(Request::Pause)
    }

    fn resume(&mut self) -> Result<()> {
        self.call(Request::Play)
    }

    fn set_volume(&mut self, _volume: f32) {}

    fn dispose(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        let _ = self.requests.send(Request::Shutdown);
        let _ = thread.join();
        self.counters.live_queues.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Drop for ThreadedQueue {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Run `body` on a worker thread and fail the test if it does not finish
/// within `timeout`. Panics inside `body` are re-raised here.
pub fn within<T, F>(timeout: Duration, body: F) -> T
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (done, result) = mpsc::channel();
    let worker = thread::spawn(move || {
        let _ = done.send(body());
    });

    match result.recv_timeout(timeout) {
        Ok(value) => value,
        Err(RecvTimeoutError::Timeout) => panic!("no progress within {:?}; threads are deadlocked", timeout),
        Err(RecvTimeoutError::Disconnected) => match worker.join() {
            Err(panic) => std::panic::resume_unwind(panic),
            Ok(()) => unreachable!("worker finished without a result"),
        },
    }
}
