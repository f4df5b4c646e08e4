//! Buffer ring manager
//!
//! Owns the K fixed-capacity buffers of one output queue. A slot is either
//! *fillable* (the buffer sits in the ring, owned by the engine) or
//! *in-flight* (the buffer has been checked out and moved to the device).
//! Ownership moves with the `AudioBuffer` value, so a buffer can never be
//! in both places at once.

use crate::audio::types::{AudioBuffer, BufferGauge};
use crate::error::{Error, Result};
use tracing::{debug, warn};

/// Fixed set of buffers for one output queue
#[derive(Debug)]
pub struct BufferRing {
    slots: Vec<Option<AudioBuffer>>,
    generation: u64,
    capacity_frames: usize,
    channels: u16,
}

impl BufferRing {
    /// Allocate `count` buffers of `capacity_frames` frames each.
    ///
    /// Fails with `BufferAlloc` if any allocation fails; buffers already
    /// allocated in this batch are released before returning.
    pub fn allocate(
        count: usize,
        capacity_frames: usize,
        channels: u16,
        generation: u64,
        gauge: &BufferGauge,
    ) -> Result<Self> {
        Self::allocate_with(count, capacity_frames, channels, generation, gauge, try_alloc_samples)
    }

    /// Allocate with a caller-supplied allocator.
    ///
    /// `alloc(index, samples)` returns the zeroed storage for one buffer or
    /// `None` when memory is unavailable.
    pub fn allocate_with<F>(
        count: usize,
        capacity_frames: usize,
        channels: u16,
        generation: u64,
        gauge: &BufferGauge,
        mut alloc: F,
    ) -> Result<Self>
    where
        F: FnMut(usize, usize) -> Option<Vec<i16>>,
    {
        let sample_count = capacity_frames * channels as usize;
        let bytes = sample_count * std::mem::size_of::<i16>();

        let mut slots = Vec::with_capacity(count);
        for index in 0..count {
            match alloc(index, sample_count) {
                Some(samples) if samples.len() == sample_count => {
                    slots.push(Some(AudioBuffer::new(index, generation, channels, samples, gauge)));
                }
                _ => {
                    warn!(
                        "Buffer {} of {} failed to allocate, releasing {} buffers",
                        index,
                        count,
                        slots.len()
                    );
                    // `slots` drops here, releasing the partial batch
                    return Err(Error::BufferAlloc { index, bytes });
                }
            }
        }

        debug!(
            "Allocated {} buffers of {} frames ({} bytes each), generation {}",
            count, capacity_frames, bytes, generation
        );

        Ok(Self {
            slots,
            generation,
            capacity_frames,
            channels,
        })
    }

    /// Number of buffers in the ring
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn capacity_frames(&self) -> usize {
        self.capacity_frames
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Take the buffer at `index` out of the ring for filling and submission.
    ///
    /// Returns `None` when the slot is already in flight.
    pub fn checkout(&mut self, index: usize) -> Option<AudioBuffer> {
        self.slots.get_mut(index).and_then(Option::take)
    }

    /// Return a buffer to its slot.
    ///
    /// Buffers from another generation, or for a slot that is already
    /// occupied, are rejected and dropped; returns whether the buffer was
    /// accepted.
    pub fn checkin(&mut self, buffer: AudioBuffer) -> bool {
        if buffer.generation() != self.generation {
            debug!(
                "Dropping buffer {} from stale generation {} (ring is {})",
                buffer.index(),
                buffer.generation(),
                self.generation
            );
            return false;
        }

        match self.slots.get_mut(buffer.index()) {
            Some(slot @ None) => {
                *slot = Some(buffer);
                true
            }
            _ => {
                warn!("Buffer {} checked in twice, dropping", buffer.index());
                false
            }
        }
    }

    /// Buffers currently owned by the device
    pub fn in_flight(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_none()).count()
    }

    /// Buffers currently owned by the engine
    pub fn fillable(&self) -> usize {
        self.slots.len() - self.in_flight()
    }
}

/// Zeroed sample storage, reporting allocation failure instead of aborting
fn try_alloc_samples(_index: usize, samples: usize) -> Option<Vec<i16>> {
    let mut storage = Vec::new();
    storage.try_reserve_exact(samples).ok()?;
    storage.resize(samples, 0);
    Some(storage)
}
