//! Playback state machine
//!
//! `Player` coordinates the decoder, the buffer ring and the output queue.
//! It lives on the command thread; the device thread only ever touches the
//! shared session (see `session`). Reactions to device-thread events
//! (`QueueFinished`, `DeviceError`) arrive back on the command thread
//! through `on_queue_finished` and `on_device_error`.
//!
//! Teardown order is fixed: stop decoding, dispose the queue (no callback
//! can run afterwards), drop the ring, and only on unload free the decode
//! context.

use crate::audio::types::STEREO;
use crate::audio::{BufferGauge, BufferRing, OutputDevice, OutputFormat, OutputQueue, QueueCallbacks, QueueSpec};
use crate::decoder::{ModuleDecoder, RenderFlags, SynthFactory};
use crate::error::{Error, Result};
use crate::playback::session::{lock, Session, SharedSession};
use crate::playback::state::{next_state, PlayerCommand};
use crate::playlist::PlayListItem;
use spindle_common::{EventBus, ModuleInfo, PlayerState, SpindleConfig, SpindleEvent};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

/// Player tuning taken from the configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerSettings {
    pub sample_rate: u32,
    pub buffer_count: usize,
    pub queue_frames: usize,
    pub volume: f32,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self::from(&SpindleConfig::default())
    }
}

impl From<&SpindleConfig> for PlayerSettings {
    fn from(config: &SpindleConfig) -> Self {
        Self {
            sample_rate: config.sample_rate,
            buffer_count: config.buffer_count,
            queue_frames: config.queue_frames,
            volume: config.volume,
        }
    }
}

/// Module player
pub struct Player {
    state: PlayerState,
    volume: f32,
    settings: PlayerSettings,
    device: Box<dyn OutputDevice>,
    queue: Option<Box<dyn OutputQueue>>,
    session: SharedSession,
    factory: SynthFactory,
    events: Arc<EventBus>,
    info: Option<ModuleInfo>,
    gauge: BufferGauge,
    generation: u64,
}

impl Player {
    pub fn new(
        device: Box<dyn OutputDevice>,
        factory: SynthFactory,
        events: Arc<EventBus>,
        settings: PlayerSettings,
    ) -> Self {
        Self {
            state: PlayerState::Unloaded,
            volume: clamp_volume(settings.volume).unwrap_or(spindle_common::config::DEFAULT_VOLUME),
            settings,
            device,
            queue: None,
            session: Arc::new(Mutex::new(Session::new(Arc::clone(&events)))),
            factory,
            events,
            info: None,
            gauge: BufferGauge::new(),
            generation: 0,
        }
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    /// Metadata of the loaded module
    pub fn module_info(&self) -> Option<&ModuleInfo> {
        self.info.as_ref()
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Buffers currently owned by the output device
    pub fn buffers_in_flight(&self) -> usize {
        lock(&self.session).in_flight()
    }

    /// Audio buffers allocated anywhere (ring, device or in transit)
    pub fn live_buffers(&self) -> usize {
        self.gauge.live()
    }

    /// Last reported pattern order position
    pub fn position(&self) -> usize {
        lock(&self.session).position()
    }

    /// Last reported elapsed seconds
    pub fn elapsed_seconds(&self) -> u64 {
        lock(&self.session).elapsed_seconds()
    }

    /// Load a module file, tearing down the current session first.
    ///
    /// On failure the player moves to `FailedLoad` and the error is
    /// returned for the caller to present.
    pub fn load(&mut self, path: &Path) -> Result<ModuleInfo> {
        self.teardown();
        lock(&self.session).decoder = None;
        self.info = None;

        let mut decoder = ModuleDecoder::new((self.factory)());
        match decoder.load(path) {
            Ok(info) => {
                lock(&self.session).decoder = Some(decoder);
                self.info = Some(info.clone());
                self.transition(PlayerCommand::Load);
                Ok(info)
            }
            Err(e) => {
                warn!("Failed to load {}: {}", path.display(), e);
                drop(decoder);
                self.transition(PlayerCommand::LoadFailed);
                Err(e)
            }
        }
    }

    /// Read a module's metadata with a throwaway decode context, leaving
    /// the current session untouched
    pub fn probe(&self, path: &Path) -> Result<ModuleInfo> {
        ModuleDecoder::new((self.factory)()).load(path)
    }

    /// Load the module behind a playlist entry
    pub fn load_item(&mut self, item: &PlayListItem) -> Result<ModuleInfo> {
        self.load(&item.path)
    }

    /// Start playback, or resume when paused.
    ///
    /// Ignored in Unloaded, FailedLoad, Error and Playing. Device failures
    /// roll back every resource, move the player to `Error`, and are
    /// returned to the caller.
    pub fn play(&mut self) -> Result<()> {
        let next = match next_state(self.state, PlayerCommand::Play) {
            Ok(next) => next,
            Err(e) => {
                debug!("Ignoring play: {}", e);
                return Ok(());
            }
        };

        if self.state == PlayerState::Paused {
            if let Some(queue) = self.queue.as_mut() {
                queue.resume()?;
            }
            self.set_state(next);
            if lock(&self.session).is_finished() {
                self.finish_track();
            }
            return Ok(());
        }

        match self.start_session() {
            Ok(true) => {
                self.set_state(next);
                Ok(())
            }
            Ok(false) => {
                info!("Module produced no audio");
                self.teardown();
                self.set_state(PlayerState::Stopped);
                self.events.emit_lossy(SpindleEvent::song_finished());
                Ok(())
            }
            Err(e) => {
                error!("Failed to start playback: {}", e);
                self.teardown();
                self.set_state(PlayerState::Error);
                Err(e)
            }
        }
    }

    /// Toggle between Playing and Paused
    pub fn pause(&mut self) -> Result<()> {
        let next = match next_state(self.state, PlayerCommand::Pause) {
            Ok(next) => next,
            Err(e) => {
                debug!("Ignoring pause: {}", e);
                return Ok(());
            }
        };

        if let Some(queue) = self.queue.as_mut() {
            if next == PlayerState::Paused {
                queue.pause()?;
            } else {
                queue.resume()?;
            }
        }
        self.set_state(next);
        if next == PlayerState::Playing && lock(&self.session).is_finished() {
            self.finish_track();
        }
        Ok(())
    }

    /// Stop playback and release the queue and its buffers
    pub fn stop(&mut self) {
        if let Err(e) = next_state(self.state, PlayerCommand::Stop) {
            debug!("Ignoring stop: {}", e);
            return;
        }

        self.teardown();
        self.set_state(PlayerState::Stopped);
        self.events.emit_lossy(SpindleEvent::time_changed(0));
        self.events.emit_lossy(SpindleEvent::position_changed(0));
    }

    /// Seek to `seconds`; only honoured while Playing or Paused
    pub fn seek(&mut self, seconds: u64) -> bool {
        if let Err(e) = next_state(self.state, PlayerCommand::Seek) {
            debug!("Ignoring seek: {}", e);
            return false;
        }

        if let Some(decoder) = lock(&self.session).decoder.as_mut() {
            decoder.seek(seconds);
        }
        debug!("Seek to {}s", seconds);
        true
    }

    pub fn next_position(&mut self) {
        if self.state.holds_device() {
            if let Some(decoder) = lock(&self.session).decoder.as_mut() {
                decoder.next_position();
            }
        }
    }

    pub fn previous_position(&mut self) {
        if self.state.holds_device() {
            if let Some(decoder) = lock(&self.session).decoder.as_mut() {
                decoder.previous_position();
            }
        }
    }

    /// Set the volume, clamped to [0.0, 1.0].
    ///
    /// Applied to the live queue immediately, and to every queue created
    /// later.
    pub fn set_volume(&mut self, volume: f32) {
        let Some(volume) = clamp_volume(volume) else {
            warn!("Ignoring NaN volume");
            return;
        };

        self.volume = volume;
        if let Some(queue) = self.queue.as_mut() {
            queue.set_volume(volume);
        }
        debug!("Volume set to {:.2}", volume);
    }

    /// React to `QueueFinished`: the last buffer of the track has played.
    ///
    /// Stale notifications (from a run that was already stopped or
    /// restarted) are ignored.
    pub fn on_queue_finished(&mut self) {
        if self.state != PlayerState::Playing {
            debug!("Ignoring queue finished in {}", self.state);
            return;
        }
        if !lock(&self.session).is_finished() {
            debug!("Ignoring stale queue finished");
            return;
        }
        self.finish_track();
    }

    /// React to a fatal output device error
    pub fn on_device_error(&mut self, message: &str) {
        if !self.state.holds_device() {
            debug!("Ignoring device error in {}: {}", self.state, message);
            return;
        }

        error!("Audio device failed: {}", message);
        self.teardown();
        self.transition(PlayerCommand::DeviceError);
    }

    fn finish_track(&mut self) {
        info!("Track finished");
        self.teardown();
        self.transition(PlayerCommand::TrackEnd);
        self.events.emit_lossy(SpindleEvent::song_finished());
    }

    /// Allocate, prime and start a new playback run.
    ///
    /// Returns `Ok(false)` when the module yields no audio at all. On error
    /// the caller tears down whatever was created.
    fn start_session(&mut self) -> Result<bool> {
        let count = self.settings.buffer_count;
        self.generation += 1;

        let ring = BufferRing::allocate(count, self.settings.queue_frames, STEREO, self.generation, &self.gauge)?;

        let spec = QueueSpec {
            format: OutputFormat::new(self.settings.sample_rate, STEREO),
            buffers: count,
        };
        let callbacks = self.queue_callbacks();
        let queue = self.device.create_queue(spec, callbacks)?;
        let queue = self.queue.insert(queue);
        queue.set_volume(self.volume);
        let sample_rate = queue.format().sample_rate;

        {
            let mut session = lock(&self.session);
            session
                .decoder
                .as_mut()
                .ok_or(Error::NoModule)?
                .start_rendering(sample_rate, RenderFlags::default())?;
            session.begin(ring);
            session.running = true;
        }

        let mut primed = 0;
        for index in 0..count {
            let buffer = {
                let mut session = lock(&self.session);
                let Some(mut buffer) = session.checkout(index) else {
                    break;
                };
                if session.fill(&mut buffer) == 0 {
                    session.checkin(buffer);
                    break;
                }
                buffer
            };
            // Enqueue may wait on the device thread, which runs completions
            // under the session lock
            queue.enqueue(buffer)?;
            primed += 1;
        }

        if primed == 0 {
            return Ok(false);
        }

        queue.start()?;
        lock(&self.session).started = true;

        debug!("Primed {} of {} buffers, device started", primed, count);
        Ok(true)
    }

    fn queue_callbacks(&self) -> QueueCallbacks {
        let session = Arc::clone(&self.session);
        let events = Arc::clone(&self.events);

        QueueCallbacks {
            on_complete: Box::new(move |buffer| lock(&session).on_buffer_complete(buffer)),
            on_error: Box::new(move |message| events.emit_lossy(SpindleEvent::device_error(message))),
        }
    }

    /// Release the current run's device resources; the module stays loaded
    fn teardown(&mut self) {
        {
            let mut session = lock(&self.session);
            session.running = false;
            session.started = false;
            if let Some(decoder) = session.decoder.as_mut() {
                decoder.stop();
            }
        }

        // Must not hold the session lock: dispose waits for the device thread
        if let Some(mut queue) = self.queue.take() {
            queue.dispose();
        }

        lock(&self.session).ring = None;
    }

    fn transition(&mut self, command: PlayerCommand) {
        match next_state(self.state, command) {
            Ok(next) => self.set_state(next),
            Err(e) => debug!("Ignoring {}: {}", command, e),
        }
    }

    fn set_state(&mut self, new_state: PlayerState) {
        let old_state = self.state;
        if old_state == new_state {
            return;
        }
        self.state = new_state;
        info!("Player state: {} -> {}", old_state, new_state);
        self.events
            .emit_lossy(SpindleEvent::state_changed(old_state, new_state));
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.teardown();
        lock(&self.session).decoder = None;
    }
}

/// Clamp into [0.0, 1.0]; NaN has no meaningful volume
fn clamp_volume(volume: f32) -> Option<f32> {
    if volume.is_nan() {
        None
    } else {
        Some(volume.clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_volume() {
        assert_eq!(clamp_volume(1.5), Some(1.0));
        assert_eq!(clamp_volume(-0.2), Some(0.0));
        assert_eq!(clamp_volume(0.5), Some(0.5));
        assert_eq!(clamp_volume(f32::NAN), None);
    }

    #[test]
    fn test_settings_from_config() {
        let config = SpindleConfig {
            buffer_count: 4,
            queue_frames: 2048,
            ..Default::default()
        };
        let settings = PlayerSettings::from(&config);
        assert_eq!(settings.buffer_count, 4);
        assert_eq!(settings.queue_frames, 2048);
        assert_eq!(settings.sample_rate, 44100);
    }
}
