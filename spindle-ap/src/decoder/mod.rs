//! Module decoder adapter
//!
//! Wraps one synthesis context and gives it a small, forgiving contract:
//! load a file, start rendering, pull frames until the track ends. Transport
//! commands are ignored unless rendering, and teardown is idempotent.

pub mod synth;

#[cfg(feature = "openmpt")]
pub mod openmpt;

pub use synth::{FrameInfo, ModuleSynth, RenderFlags, SynthFactory};

use crate::audio::types::STEREO;
use crate::error::{Error, Result};
use spindle_common::module_info::{content_hash, ModuleInfo};
use std::path::Path;
use tracing::{debug, info, trace};

/// Synthesis backend compiled into this build, if any
pub fn default_factory() -> Option<SynthFactory> {
    #[cfg(feature = "openmpt")]
    {
        Some(openmpt::OpenMptSynth::factory())
    }
    #[cfg(not(feature = "openmpt"))]
    {
        None
    }
}

/// Adapter lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    /// No module in the context
    Empty,
    /// Module parsed, not rendering
    Loaded,
    /// Player started; frames can be pulled
    Rendering,
}

/// Module decoder adapter over one synthesis context
pub struct ModuleDecoder {
    synth: Box<dyn ModuleSynth>,
    stage: Stage,
    flags: RenderFlags,
    ended: bool,
    position: usize,
    elapsed_ms: u64,
}

impl ModuleDecoder {
    /// Take ownership of a freshly created context
    pub fn new(synth: Box<dyn ModuleSynth>) -> Self {
        Self {
            synth,
            stage: Stage::Empty,
            flags: RenderFlags::default(),
            ended: false,
            position: 0,
            elapsed_ms: 0,
        }
    }

    /// Load a module file.
    ///
    /// Reads the file, hashes its bytes and hands them to the synthesis
    /// context. Any previously loaded module is released first.
    pub fn load(&mut self, path: &Path) -> Result<ModuleInfo> {
        if !path.is_file() {
            return Err(Error::NotAFile(path.to_path_buf()));
        }

        self.release();

        let data = std::fs::read(path)?;
        let hash = content_hash(&data);

        let metadata = self.synth.load_module(&data).map_err(|code| match code {
            synth::STATUS_UNRECOGNIZED => Error::UnrecognizedFormat,
            synth::STATUS_CORRUPT => Error::CorruptFile,
            code => Error::Decode(code),
        })?;

        self.stage = Stage::Loaded;
        let info = ModuleInfo::new(path, hash, metadata);
        info!(
            "Loaded module '{}' ({}, {} channels, {}s)",
            info.name,
            info.simple_format,
            info.channel_count,
            info.duration_seconds()
        );
        Ok(info)
    }

    /// Begin rendering at `sample_rate`. Restarts from the top if already
    /// rendering.
    pub fn start_rendering(&mut self, sample_rate: u32, flags: RenderFlags) -> Result<()> {
        match self.stage {
            Stage::Empty => return Err(Error::NoModule),
            Stage::Rendering => self.stop(),
            Stage::Loaded => {}
        }

        self.synth
            .start_player(sample_rate, flags)
            .map_err(Error::RenderStart)?;

        self.stage = Stage::Rendering;
        self.flags = flags;
        self.ended = false;
        self.position = 0;
        self.elapsed_ms = 0;
        debug!("Rendering started at {}Hz", sample_rate);
        Ok(())
    }

    /// Fill `out` (interleaved stereo) with as many frames as the module
    /// provides, up to its capacity. Returns the frames written; 0 once the
    /// track has ended or when not rendering.
    pub fn render_frames(&mut self, out: &mut [i16]) -> usize {
        if self.stage != Stage::Rendering || self.ended {
            return 0;
        }

        let channels = STEREO as usize;
        let capacity = out.len() / channels;
        let mut filled = 0;

        while filled < capacity {
            let chunk = self.synth.render(&mut out[filled * channels..capacity * channels]);
            if chunk.frames == 0 || (chunk.loop_count != 0 && !self.flags.looping) {
                trace!("End of module after {}ms", self.elapsed_ms);
                self.ended = true;
                break;
            }

            filled += chunk.frames.min(capacity - filled);
            self.position = chunk.position;
            self.elapsed_ms = chunk.time_ms;
        }

        filled
    }

    /// Seek to `seconds` from the start of the module
    pub fn seek(&mut self, seconds: u64) {
        if self.stage == Stage::Rendering {
            self.synth.seek_time(seconds.saturating_mul(1000));
        }
    }

    pub fn next_position(&mut self) {
        if self.stage == Stage::Rendering {
            self.synth.next_position();
        }
    }

    pub fn previous_position(&mut self) {
        if self.stage == Stage::Rendering {
            self.synth.prev_position();
        }
    }

    /// Stop rendering; the module stays loaded
    pub fn stop(&mut self) {
        if self.stage == Stage::Rendering {
            self.synth.stop_module();
            self.synth.end_player();
            self.stage = Stage::Loaded;
            debug!("Rendering stopped");
        }
    }

    /// Release the loaded module (stops rendering first)
    pub fn release(&mut self) {
        self.stop();
        if self.stage == Stage::Loaded {
            self.synth.release_module();
            self.stage = Stage::Empty;
        }
    }

    pub fn is_rendering(&self) -> bool {
        self.stage == Stage::Rendering
    }

    pub fn is_loaded(&self) -> bool {
        self.stage != Stage::Empty
    }

    /// True once rendering reached the end of the track
    pub fn has_ended(&self) -> bool {
        self.ended
    }

    /// Pattern order position of the last rendered chunk
    pub fn position(&self) -> usize {
        self.position
    }

    /// Whole seconds elapsed at the last rendered chunk
    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_ms / 1000
    }
}

impl Drop for ModuleDecoder {
    fn drop(&mut self) {
        self.release();
    }
}
