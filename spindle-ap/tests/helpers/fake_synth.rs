//! Scripted synthesis backend
//!
//! `FakeSynth` renders a fixed number of chunks of a constant tone and
//! records what the player asked of it. Every context created through
//! `fake_factory` is counted, as is every context dropped, so tests can
//! check that decode contexts are always freed.

use spindle_ap::decoder::{FrameInfo, ModuleSynth, RenderFlags, SynthFactory};
use spindle_common::module_info::ModuleMetadata;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Sample value written to every rendered frame
pub const TONE: i16 = 1000;

/// Behaviour shared by every context a factory creates
#[derive(Debug, Clone)]
pub struct Script {
    /// `Err(code)` makes `load_module` fail
    pub load: std::result::Result<(), i32>,
    /// Number of render calls that produce audio
    pub chunks: usize,
    /// Frames produced per render call
    pub chunk_frames: usize,
    pub duration_ms: u64,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            load: Ok(()),
            chunks: 12,
            chunk_frames: 256,
            duration_ms: 125_000,
        }
    }
}

/// Counters and call log shared by a factory's contexts
#[derive(Debug, Default)]
pub struct SynthStats {
    pub created: AtomicUsize,
    pub freed: AtomicUsize,
    pub seeks: Mutex<Vec<u64>>,
    pub start_rates: Mutex<Vec<u32>>,
    pub position_skips: Mutex<Vec<i32>>,
}

impl SynthStats {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn freed(&self) -> usize {
        self.freed.load(Ordering::SeqCst)
    }

    pub fn seeks(&self) -> Vec<u64> {
        self.seeks.lock().unwrap().clone()
    }

    pub fn start_rates(&self) -> Vec<u32> {
        self.start_rates.lock().unwrap().clone()
    }
}

pub struct FakeSynth {
    script: Arc<Mutex<Script>>,
    stats: Arc<SynthStats>,
    remaining: usize,
    chunk_frames: usize,
    position: usize,
    time_ms: u64,
    sample_rate: u32,
}

impl ModuleSynth for FakeSynth {
    fn load_module(&mut self, data: &[u8]) -> std::result::Result<ModuleMetadata, i32> {
        let script = self.script.lock().unwrap().clone();
        script.load?;
        self.chunk_frames = script.chunk_frames;
        self.remaining = script.chunks;

        Ok(ModuleMetadata {
            name: String::from_utf8_lossy(data).trim().to_string(),
            format: "M.K.".to_string(),
            channel_count: 4,
            pattern_count: 8,
            length_in_patterns: 16,
            initial_speed: 6,
            initial_bpm: 125,
            duration_ms: script.duration_ms,
            ..Default::default()
        })
    }

    fn start_player(&mut self, sample_rate: u32, _flags: RenderFlags) -> std::result::Result<(), i32> {
        self.stats.start_rates.lock().unwrap().push(sample_rate);
        self.sample_rate = sample_rate;
        self.remaining = self.script.lock().unwrap().chunks;
        self.position = 0;
        self.time_ms = 0;
        Ok(())
    }

    fn render(&mut self, out: &mut [i16]) -> FrameInfo {
        if self.remaining == 0 {
            return FrameInfo {
                position: self.position,
                time_ms: self.time_ms,
                ..Default::default()
            };
        }
        self.remaining -= 1;

        let frames = self.chunk_frames.min(out.len() / 2);
        out[..frames * 2].fill(TONE);
        self.position += 1;
        self.time_ms += frames as u64 * 1000 / u64::from(self.sample_rate.max(1));

        FrameInfo {
            frames,
            position: self.position,
            time_ms: self.time_ms,
            loop_count: 0,
        }
    }

    fn seek_time(&mut self, ms: u64) {
        self.stats.seeks.lock().unwrap().push(ms);
        self.time_ms = ms;
    }

    fn next_position(&mut self) {
        self.stats.position_skips.lock().unwrap().push(1);
    }

    fn prev_position(&mut self) {
        self.stats.position_skips.lock().unwrap().push(-1);
    }

    fn stop_module(&mut self) {}

    fn end_player(&mut self) {}

    fn release_module(&mut self) {
        self.remaining = 0;
    }
}

impl Drop for FakeSynth {
    fn drop(&mut self) {
        self.stats.freed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Factory producing `FakeSynth` contexts.
///
/// The script can be changed between loads through the returned handle.
pub fn fake_factory(script: Script) -> (SynthFactory, Arc<Mutex<Script>>, Arc<SynthStats>) {
    let script = Arc::new(Mutex::new(script));
    let stats = Arc::new(SynthStats::default());

    let factory_script = Arc::clone(&script);
    let factory_stats = Arc::clone(&stats);
    let factory: SynthFactory = Box::new(move || {
        factory_stats.created.fetch_add(1, Ordering::SeqCst);
        Box::new(FakeSynth {
            script: Arc::clone(&factory_script),
            stats: Arc::clone(&factory_stats),
            remaining: 0,
            chunk_frames: 0,
            position: 0,
            time_ms: 0,
            sample_rate: 0,
        })
    });

    (factory, script, stats)
}
