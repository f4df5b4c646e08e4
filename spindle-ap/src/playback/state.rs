//! Player state transition table
//!
//! Pure mapping from (state, command) to the next state. The player
//! consults it before doing any work, so the table is the single source of
//! truth for which commands are honoured where.

use crate::error::{Error, Result};
use spindle_common::PlayerState;

/// Commands that drive player state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerCommand {
    /// A module loaded successfully
    Load,
    /// A load attempt failed
    LoadFailed,
    Play,
    /// Toggles between Playing and Paused
    Pause,
    Stop,
    /// All audio of the current track has played
    TrackEnd,
    Seek,
    /// The output device failed fatally
    DeviceError,
}

impl std::fmt::Display for PlayerCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayerCommand::Load => write!(f, "load"),
            PlayerCommand::LoadFailed => write!(f, "fail load"),
            PlayerCommand::Play => write!(f, "play"),
            PlayerCommand::Pause => write!(f, "pause"),
            PlayerCommand::Stop => write!(f, "stop"),
            PlayerCommand::TrackEnd => write!(f, "end track"),
            PlayerCommand::Seek => write!(f, "seek"),
            PlayerCommand::DeviceError => write!(f, "report device error"),
        }
    }
}

/// State reached by applying `command` in `state`.
///
/// Returns `InvalidTransition` when the command is not honoured; the caller
/// treats that as a no-op.
pub fn next_state(state: PlayerState, command: PlayerCommand) -> Result<PlayerState> {
    use PlayerCommand as C;
    use PlayerState as S;

    let next = match (state, command) {
        (_, C::Load) => S::Loaded,
        (_, C::LoadFailed) => S::FailedLoad,
        (_, C::DeviceError) => S::Error,

        (S::Loaded | S::Stopped | S::Paused, C::Play) => S::Playing,

        (S::Playing, C::Pause) => S::Paused,
        (S::Paused, C::Pause) => S::Playing,

        (S::Playing | S::Paused, C::Stop) => S::Stopped,
        (S::Playing, C::TrackEnd) => S::Stopped,

        (S::Playing | S::Paused, C::Seek) => state,

        _ => return Err(Error::InvalidTransition { command, state }),
    };

    Ok(next)
}
