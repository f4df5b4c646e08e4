//! Playback session shared with the device thread
//!
//! The session holds the decode context and the buffer ring of the current
//! track. The command thread and the device's completion thread both reach
//! it through one mutex; `running` tells the completion thread whether it
//! may still render. Teardown clears `running` under the lock before the
//! queue is disposed, so a completion that races the teardown only checks
//! its buffer back in.
//!
//! The lock is never held across an `OutputQueue` call: a queue may wait on
//! its device thread, and that thread takes this lock to run completions.

use crate::audio::{AudioBuffer, BufferRing};
use crate::decoder::ModuleDecoder;
use spindle_common::{EventBus, SpindleEvent};
use std::sync::{Arc, Mutex, MutexGuard};

pub(crate) type SharedSession = Arc<Mutex<Session>>;

/// Lock the session, recovering from a poisoned mutex
pub(crate) fn lock(session: &SharedSession) -> MutexGuard<'_, Session> {
    session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub(crate) struct Session {
    pub(crate) decoder: Option<ModuleDecoder>,
    pub(crate) ring: Option<BufferRing>,
    /// Device may render; set before priming, cleared before any teardown
    pub(crate) running: bool,
    /// Device started; progress events are published from here on
    pub(crate) started: bool,
    /// `QueueFinished` already raised for this ring
    drained: bool,
    position: usize,
    seconds: u64,
    events: Arc<EventBus>,
}

impl Session {
    pub(crate) fn new(events: Arc<EventBus>) -> Self {
        Self {
            decoder: None,
            ring: None,
            running: false,
            started: false,
            drained: false,
            position: 0,
            seconds: 0,
            events,
        }
    }

    /// Install a fresh ring for a new playback run
    pub(crate) fn begin(&mut self, ring: BufferRing) {
        self.ring = Some(ring);
        self.running = false;
        self.started = false;
        self.drained = false;
        self.position = 0;
        self.seconds = 0;
    }

    pub(crate) fn checkout(&mut self, index: usize) -> Option<AudioBuffer> {
        self.ring.as_mut().and_then(|ring| ring.checkout(index))
    }

    /// Give a buffer back to the ring, or drop it if the ring is gone
    pub(crate) fn checkin(&mut self, buffer: AudioBuffer) {
        if let Some(ring) = self.ring.as_mut() {
            ring.checkin(buffer);
        }
    }

    /// Render the next chunk of the track into `buffer`
    pub(crate) fn fill(&mut self, buffer: &mut AudioBuffer) -> usize {
        let frames = match self.decoder.as_mut() {
            Some(decoder) => decoder.render_frames(buffer.storage_mut()),
            None => 0,
        };
        buffer.set_frames(frames);

        if self.started && frames > 0 {
            self.publish_progress();
        }
        frames
    }

    /// Completion handler body, run on the device thread.
    ///
    /// Refills and returns the buffer for resubmission, or keeps it when
    /// there is nothing more to play. The last buffer to come home after
    /// the end of the track raises `QueueFinished`, once.
    pub(crate) fn on_buffer_complete(&mut self, mut buffer: AudioBuffer) -> Option<AudioBuffer> {
        if !self.running {
            self.checkin(buffer);
            return None;
        }

        if self.fill(&mut buffer) > 0 {
            return Some(buffer);
        }

        self.checkin(buffer);
        if self.in_flight() == 0 && !self.drained {
            self.drained = true;
            self.events.emit_lossy(SpindleEvent::queue_finished());
        }
        None
    }

    /// Buffers currently owned by the device
    pub(crate) fn in_flight(&self) -> usize {
        self.ring.as_ref().map_or(0, BufferRing::in_flight)
    }

    /// Track ended and every buffer has come home
    pub(crate) fn is_finished(&self) -> bool {
        self.drained && self.in_flight() == 0
    }

    pub(crate) fn position(&self) -> usize {
        self.position
    }

    pub(crate) fn elapsed_seconds(&self) -> u64 {
        self.seconds
    }

    fn publish_progress(&mut self) {
        let Some(decoder) = self.decoder.as_ref() else {
            return;
        };

        let position = decoder.position();
        if position != self.position {
            self.position = position;
            self.events.emit_lossy(SpindleEvent::position_changed(position));
        }

        let seconds = decoder.elapsed_seconds();
        if seconds != self.seconds {
            self.seconds = seconds;
            self.events.emit_lossy(SpindleEvent::time_changed(seconds));
        }
    }
}
