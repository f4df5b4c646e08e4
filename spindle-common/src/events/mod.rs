//! Event types for the Spindle event system
//!
//! Provides the shared event definitions and the EventBus that decouples the
//! audio core from its observers. The core publishes; front ends subscribe.

mod player_types;

pub use player_types::PlayerState;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Spindle event types
///
/// Fire-and-forget notifications. Events raised from the audio device thread
/// are limited to `PositionChanged`, `TimeChanged`, `QueueFinished` and
/// `DeviceError`; every state-changing reaction to them happens on the
/// command thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SpindleEvent {
    /// A different module became the current song
    SongChanged {
        /// Title of the new song (empty when cleared)
        title: String,
        /// Content hash of the new song (empty when cleared)
        hash: String,
        /// When the song changed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Pattern order position changed during playback
    PositionChanged {
        /// Zero-based order position
        position: usize,
        /// When the position changed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Elapsed whole seconds changed during playback
    TimeChanged {
        /// Elapsed seconds since the start of the module
        seconds: u64,
        /// When the time changed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Current song played to its end and the player stopped
    ///
    /// Triggers:
    /// - Front end: advance to the next playlist entry (or repeat)
    SongFinished {
        /// When the song finished
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Every in-flight buffer drained with no further audio
    ///
    /// Raised once per session from the device thread. The owner of the
    /// player answers it with `Player::on_queue_finished`.
    QueueFinished {
        /// When the queue drained
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Playlist contents or current index changed
    PlayListChanged {
        /// Current playlist index (None before the first selection)
        index: Option<usize>,
        /// Number of playlist entries
        count: usize,
        /// When the playlist changed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Player state transition
    PlayerStateChanged {
        /// State before the transition
        old_state: PlayerState,
        /// State after the transition
        new_state: PlayerState,
        /// When the state changed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Output device reported a fatal stream error
    DeviceError {
        /// Device error description
        message: String,
        /// When the error was reported
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl SpindleEvent {
    /// Event type name, used for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            SpindleEvent::SongChanged { .. } => "SongChanged",
            SpindleEvent::PositionChanged { .. } => "PositionChanged",
            SpindleEvent::TimeChanged { .. } => "TimeChanged",
            SpindleEvent::SongFinished { .. } => "SongFinished",
            SpindleEvent::QueueFinished { .. } => "QueueFinished",
            SpindleEvent::PlayListChanged { .. } => "PlayListChanged",
            SpindleEvent::PlayerStateChanged { .. } => "PlayerStateChanged",
            SpindleEvent::DeviceError { .. } => "DeviceError",
        }
    }

    pub fn song_changed(title: impl Into<String>, hash: impl Into<String>) -> Self {
        SpindleEvent::SongChanged {
            title: title.into(),
            hash: hash.into(),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn playlist_changed(index: Option<usize>, count: usize) -> Self {
        SpindleEvent::PlayListChanged {
            index,
            count,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn position_changed(position: usize) -> Self {
        SpindleEvent::PositionChanged {
            position,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn time_changed(seconds: u64) -> Self {
        SpindleEvent::TimeChanged {
            seconds,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn song_finished() -> Self {
        SpindleEvent::SongFinished {
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn queue_finished() -> Self {
        SpindleEvent::QueueFinished {
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn state_changed(old_state: PlayerState, new_state: PlayerState) -> Self {
        SpindleEvent::PlayerStateChanged {
            old_state,
            new_state,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn device_error(message: impl Into<String>) -> Self {
        SpindleEvent::DeviceError {
            message: message.into(),
            timestamp: chrono::Utc::now(),
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus for application-wide events
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
///
/// Publishing never blocks, so it is safe to call from the audio device's
/// completion thread as well as from async code.
///
/// # Examples
///
/// ```
/// use spindle_common::events::{EventBus, SpindleEvent};
/// use std::sync::Arc;
///
/// let event_bus = Arc::new(EventBus::new(100));
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(SpindleEvent::time_changed(3));
/// assert!(matches!(rx.try_recv(), Ok(SpindleEvent::TimeChanged { seconds: 3, .. })));
/// ```
#[derive(Debug)]
pub struct EventBus {
    tx: broadcast::Sender<SpindleEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before dropping old events
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<SpindleEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: SpindleEvent,
    ) -> Result<usize, broadcast::error::SendError<SpindleEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: SpindleEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_EVENT_CAPACITY)
    }
}
