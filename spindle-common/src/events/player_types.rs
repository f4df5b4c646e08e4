//! Player-related type definitions
//!
//! Supporting types for the playback lifecycle.

use serde::{Deserialize, Serialize};

/// Player state enumeration
///
/// Exactly one live value per player session. Audio hardware resources
/// (output queue + buffers) exist if and only if the state is `Playing` or
/// `Paused`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "PascalCase")]
pub enum PlayerState {
    /// No module loaded
    #[default]
    Unloaded,
    /// Module loaded, never played (or reloaded)
    Loaded,
    /// Last load attempt failed
    FailedLoad,
    /// Fatal device or decoder error; only a new load recovers
    Error,
    /// Output device running
    Playing,
    /// Playback finished or stopped, resources released
    Stopped,
    /// Output device paused, resources retained
    Paused,
}

impl PlayerState {
    /// True when the output queue and its buffers must exist
    pub fn holds_device(self) -> bool {
        matches!(self, PlayerState::Playing | PlayerState::Paused)
    }

    /// True when a module is loaded and can be (re)started
    pub fn has_module(self) -> bool {
        matches!(
            self,
            PlayerState::Loaded | PlayerState::Playing | PlayerState::Paused | PlayerState::Stopped
        )
    }
}

impl std::fmt::Display for PlayerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayerState::Unloaded => write!(f, "Unloaded"),
            PlayerState::Loaded => write!(f, "Loaded"),
            PlayerState::FailedLoad => write!(f, "FailedLoad"),
            PlayerState::Error => write!(f, "Error"),
            PlayerState::Playing => write!(f, "Playing"),
            PlayerState::Stopped => write!(f, "Stopped"),
            PlayerState::Paused => write!(f, "Paused"),
        }
    }
}
