//! Synthesis library seam
//!
//! The player consumes a pull-based module synthesizer; it never parses
//! module formats itself. One `ModuleSynth` value is one native decode
//! context: constructing it creates the context and dropping it frees it.

use spindle_common::module_info::ModuleMetadata;

/// Load status: format not recognised
pub const STATUS_UNRECOGNIZED: i32 = -3;

/// Load status: recognised but failed to load
pub const STATUS_CORRUPT: i32 = -4;

/// Rendering options passed to `start_player`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderFlags {
    /// Keep playing past the end of the sequence instead of ending
    pub looping: bool,
}

/// Result of one render call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameInfo {
    /// Stereo frames written to the output slice (0 = nothing left)
    pub frames: usize,
    /// Current pattern order position
    pub position: usize,
    /// Elapsed playback time in milliseconds
    pub time_ms: u64,
    /// Number of times the sequence has looped back to its start
    pub loop_count: u32,
}

/// One native module decode context
///
/// Status codes are the library's own: zero on success, negative on
/// failure (`STATUS_UNRECOGNIZED`, `STATUS_CORRUPT`, anything else).
pub trait ModuleSynth: Send {
    /// Parse a module from its file bytes
    fn load_module(&mut self, data: &[u8]) -> Result<ModuleMetadata, i32>;

    /// Prepare rendering at `sample_rate` (interleaved stereo i16)
    fn start_player(&mut self, sample_rate: u32, flags: RenderFlags) -> Result<(), i32>;

    /// Render up to `out.len() / 2` frames of interleaved stereo audio
    fn render(&mut self, out: &mut [i16]) -> FrameInfo;

    /// Jump to an absolute time
    fn seek_time(&mut self, ms: u64);

    /// Skip to the next pattern order position
    fn next_position(&mut self);

    /// Skip to the previous pattern order position
    fn prev_position(&mut self);

    /// Halt the module at its current position
    fn stop_module(&mut self);

    /// Leave the rendering state
    fn end_player(&mut self);

    /// Release the loaded module data
    fn release_module(&mut self);
}

/// Creates one fresh decode context per load
pub type SynthFactory = Box<dyn Fn() -> Box<dyn ModuleSynth> + Send + Sync>;

/// Format description for backends that name the format and its file
/// extension separately, e.g. `"FastTracker 2 (XM)"`.
///
/// The bracketed extension is what format classification keys on when the
/// long name carries no tracker signature.
pub fn tagged_format(type_long: &str, extension: &str) -> String {
    let extension = extension.trim();
    if extension.is_empty() {
        return type_long.to_string();
    }
    format!("{} ({})", type_long.trim(), extension.to_ascii_uppercase())
}
