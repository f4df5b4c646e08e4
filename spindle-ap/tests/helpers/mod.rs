//! Test helper modules for spindle-ap integration tests
//!
//! - MockDevice: in-memory output queue driven by hand
//! - FakeSynth: scripted synthesis backend with create/free accounting
//! - ThreadedDevice: queues served by their own playback thread
//! - ModuleDir: temporary module files

#![allow(dead_code, unused_imports)]

pub mod fake_synth;
pub mod mock_device;
pub mod threaded_device;

pub use fake_synth::{fake_factory, Script, SynthStats, TONE};
pub use mock_device::{Faults, MockDevice, MockHandle, Op};
pub use threaded_device::{within, ThreadedDevice, ThreadedHandle};

use spindle_ap::{Player, PlayerSettings};
use spindle_common::{EventBus, SpindleEvent};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::sync::broadcast;

/// Buffers in the ring of every test player
pub const BUFFERS: usize = 3;

/// Small buffers so one scripted chunk fills one buffer
pub const QUEUE_FRAMES: usize = 256;

pub fn test_settings() -> PlayerSettings {
    PlayerSettings {
        sample_rate: 44100,
        buffer_count: BUFFERS,
        queue_frames: QUEUE_FRAMES,
        volume: 1.0,
    }
}

/// Player wired to a mock device and a fake backend
pub struct TestPlayer {
    pub player: Player,
    pub device: MockHandle,
    pub script: Arc<Mutex<Script>>,
    pub stats: Arc<SynthStats>,
    pub events: broadcast::Receiver<SpindleEvent>,
    pub modules: ModuleDir,
}

impl TestPlayer {
    pub fn new() -> Self {
        Self::with_script(Script::default())
    }

    pub fn with_script(script: Script) -> Self {
        let (device, handle) = MockDevice::new();
        let (factory, script, stats) = fake_factory(script);
        let bus = Arc::new(EventBus::new(4096));
        let events = bus.subscribe();
        let player = Player::new(Box::new(device), factory, bus, test_settings());

        Self {
            player,
            device: handle,
            script,
            stats,
            events,
            modules: ModuleDir::new(),
        }
    }

    /// Write and load a module whose title is `title`
    pub fn load(&mut self, title: &str) -> spindle_ap::Result<spindle_common::ModuleInfo> {
        let path = self.modules.write(&format!("{}.mod", title.replace(' ', "_")), title);
        self.player.load(&path)
    }

    /// Events published since the last call
    pub fn take_events(&mut self) -> Vec<SpindleEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Count events of one type
pub fn count_events(events: &[SpindleEvent], event_type: &str) -> usize {
    events.iter().filter(|e| e.event_type() == event_type).count()
}

/// Temporary directory of module files
pub struct ModuleDir {
    dir: TempDir,
}

impl ModuleDir {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    /// Write a module file; the fake backend reads its contents as the title
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }
}
