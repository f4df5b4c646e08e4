//! Core audio data types
//!
//! Defines the negotiated output format and the fixed-capacity PCM buffers
//! that cycle between the playback engine and the output device.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Channels rendered by the decoder (interleaved stereo)
pub const STEREO: u16 = 2;

/// Output stream format
///
/// Samples are always signed 16-bit interleaved; only rate and channel count
/// are negotiable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl OutputFormat {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// Bytes per interleaved frame (16-bit samples)
    pub fn bytes_per_frame(&self) -> usize {
        self.channels as usize * std::mem::size_of::<i16>()
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::new(spindle_common::config::DEFAULT_SAMPLE_RATE, STEREO)
    }
}

/// Fixed-capacity PCM buffer owned by exactly one side at a time
///
/// The engine fills it, the device plays it, and the completion handler
/// hands it back. Ownership moves with the value; there is no shared
/// access. `index` and `generation` identify the ring slot the buffer
/// belongs to, so a buffer from a disposed queue is never mistaken for one
/// of the current ring.
#[derive(Debug)]
pub struct AudioBuffer {
    index: usize,
    generation: u64,
    channels: u16,
    samples: Vec<i16>,
    frames: usize,
    _live: LiveToken,
}

impl AudioBuffer {
    pub(crate) fn new(
        index: usize,
        generation: u64,
        channels: u16,
        samples: Vec<i16>,
        gauge: &BufferGauge,
    ) -> Self {
        Self {
            index,
            generation,
            channels,
            samples,
            frames: 0,
            _live: LiveToken::new(gauge),
        }
    }

    /// Ring slot this buffer belongs to
    pub fn index(&self) -> usize {
        self.index
    }

    /// Ring generation this buffer was allocated for
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Fixed capacity in frames
    pub fn capacity_frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    /// Capacity in bytes
    pub fn capacity_bytes(&self) -> usize {
        self.samples.len() * std::mem::size_of::<i16>()
    }

    /// Frames of valid audio currently held
    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn is_empty(&self) -> bool {
        self.frames == 0
    }

    /// Valid interleaved samples
    pub fn samples(&self) -> &[i16] {
        &self.samples[..self.frames * self.channels as usize]
    }

    /// Whole backing storage, for filling
    pub fn storage_mut(&mut self) -> &mut [i16] {
        &mut self.samples
    }

    /// Mark how many frames of the storage hold audio (clamped to capacity)
    pub fn set_frames(&mut self, frames: usize) {
        self.frames = frames.min(self.capacity_frames());
    }

    /// Sample pair at `frame` (left, right)
    pub(crate) fn frame(&self, frame: usize) -> (i16, i16) {
        let base = frame * self.channels as usize;
        if self.channels >= 2 {
            (self.samples[base], self.samples[base + 1])
        } else {
            (self.samples[base], self.samples[base])
        }
    }
}

/// Count of live `AudioBuffer` allocations
///
/// Every buffer holds a token that increments the gauge on allocation and
/// decrements it on drop, wherever the buffer happens to be dropped. A
/// gauge that reads zero after teardown means nothing leaked.
#[derive(Debug, Clone, Default)]
pub struct BufferGauge {
    live: Arc<AtomicUsize>,
}

impl BufferGauge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffers currently allocated
    pub fn live(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
struct LiveToken {
    live: Arc<AtomicUsize>,
}

impl LiveToken {
    fn new(gauge: &BufferGauge) -> Self {
        gauge.live.fetch_add(1, Ordering::AcqRel);
        Self {
            live: Arc::clone(&gauge.live),
        }
    }
}

impl Drop for LiveToken {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_defaults() {
        let format = OutputFormat::default();
        assert_eq!(format.sample_rate, 44100);
        assert_eq!(format.channels, 2);
        assert_eq!(format.bytes_per_frame(), 4);
    }

    #[test]
    fn test_buffer_frames_clamped_to_capacity() {
        let gauge = BufferGauge::new();
        let mut buffer = AudioBuffer::new(0, 1, STEREO, vec![0; 200], &gauge);
        assert_eq!(buffer.capacity_frames(), 100);
        assert_eq!(buffer.capacity_bytes(), 400);

        buffer.set_frames(250);
        assert_eq!(buffer.frames(), 100);
        assert_eq!(buffer.samples().len(), 200);

        buffer.set_frames(0);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_gauge_tracks_drops() {
        let gauge = BufferGauge::new();
        let a = AudioBuffer::new(0, 1, STEREO, vec![0; 4], &gauge);
        let b = AudioBuffer::new(1, 1, STEREO, vec![0; 4], &gauge);
        assert_eq!(gauge.live(), 2);

        // Dropping on another thread still balances
        std::thread::spawn(move || drop(a)).join().unwrap();
        assert_eq!(gauge.live(), 1);
        drop(b);
        assert_eq!(gauge.live(), 0);
    }
}
