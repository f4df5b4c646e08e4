//! libopenmpt synthesis backend
//!
//! Built only with the `openmpt` feature. libopenmpt reports no load status
//! codes, so a failed load is reported as an unrecognised format.

use super::synth::{tagged_format, FrameInfo, ModuleSynth, RenderFlags, STATUS_UNRECOGNIZED};
use openmpt::module::metadata::Key;
use openmpt::module::{Logger, Module};
use spindle_common::module_info::ModuleMetadata;
use tracing::debug;

/// Frames rendered per `render` call
const CHUNK_FRAMES: usize = 1024;

/// Decode context over one libopenmpt module
#[derive(Default)]
pub struct OpenMptSynth {
    module: Option<Module>,
    sample_rate: i32,
    rendering: bool,
    last_position: f64,
    loops: u32,
}

// libopenmpt modules are not tied to the thread that created them
unsafe impl Send for OpenMptSynth {}

impl OpenMptSynth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory for `Player`
    pub fn factory() -> super::SynthFactory {
        Box::new(|| Box::new(OpenMptSynth::new()))
    }
}

impl ModuleSynth for OpenMptSynth {
    fn load_module(&mut self, data: &[u8]) -> Result<ModuleMetadata, i32> {
        let mut buffer = data.to_vec();
        let mut module =
            Module::create_from_memory(&mut buffer, Logger::None, &[]).map_err(|_| STATUS_UNRECOGNIZED)?;

        let instruments: Vec<String> = (0..module.get_num_instruments())
            .map(|i| module.get_instrument_name(i))
            .collect();
        let samples: Vec<String> = (0..module.get_num_samples())
            .map(|i| module.get_sample_name(i))
            .collect();

        let metadata = ModuleMetadata {
            name: module.get_metadata(Key::Title).unwrap_or_default(),
            format: tagged_format(
                &module.get_metadata(Key::TypeLong).unwrap_or_default(),
                &module.get_metadata(Key::Type).unwrap_or_default(),
            ),
            comment: module.get_metadata(Key::Message).unwrap_or_default(),
            volume_base: 128,
            sequence_count: module.get_num_subsongs().max(0) as u32,
            pattern_count: module.get_num_patterns().max(0) as u32,
            track_count: module.get_num_patterns().max(0) as u32 * module.get_num_channels().max(0) as u32,
            channel_count: module.get_num_channels().max(0) as u32,
            instrument_count: instruments.len() as u32,
            sample_count: samples.len() as u32,
            initial_speed: module.get_current_speed().max(0) as u32,
            initial_bpm: module.get_current_tempo().max(0) as u32,
            length_in_patterns: module.get_num_orders().max(0) as u32,
            restart_position: 0,
            global_volume: 64,
            instruments,
            samples,
            duration_ms: (module.get_duration_seconds() * 1000.0) as u64,
        };

        self.module = Some(module);
        Ok(metadata)
    }

    fn start_player(&mut self, sample_rate: u32, flags: RenderFlags) -> Result<(), i32> {
        let module = self.module.as_mut().ok_or(STATUS_UNRECOGNIZED)?;
        module.set_repeat_count(if flags.looping { -1 } else { 0 });
        module.set_position_seconds(0.0);
        self.sample_rate = sample_rate as i32;
        self.rendering = true;
        self.last_position = 0.0;
        self.loops = 0;
        debug!("libopenmpt rendering at {}Hz", sample_rate);
        Ok(())
    }

    fn render(&mut self, out: &mut [i16]) -> FrameInfo {
        let Some(module) = self.module.as_mut().filter(|_| self.rendering) else {
            return FrameInfo::default();
        };

        let frames = (out.len() / 2).min(CHUNK_FRAMES);
        let written = module.read_interleaved_stereo(self.sample_rate, &mut out[..frames * 2]);
        let seconds = module.get_position_seconds();
        if seconds + 0.5 < self.last_position {
            self.loops += 1;
        }
        self.last_position = seconds;

        FrameInfo {
            frames: written,
            position: module.get_current_order().max(0) as usize,
            time_ms: (seconds * 1000.0) as u64,
            loop_count: self.loops,
        }
    }

    fn seek_time(&mut self, ms: u64) {
        if let Some(module) = self.module.as_mut() {
            self.last_position = module.set_position_seconds(ms as f64 / 1000.0);
        }
    }

    fn next_position(&mut self) {
        if let Some(module) = self.module.as_mut() {
            let order = module.get_current_order() + 1;
            if order < module.get_num_orders() {
                self.last_position = module.set_position_order_row(order, 0);
            }
        }
    }

    fn prev_position(&mut self) {
        if let Some(module) = self.module.as_mut() {
            let order = (module.get_current_order() - 1).max(0);
            self.last_position = module.set_position_order_row(order, 0);
        }
    }

    fn stop_module(&mut self) {
        self.rendering = false;
    }

    fn end_player(&mut self) {
        self.rendering = false;
    }

    fn release_module(&mut self) {
        self.module = None;
    }
}
