//! Playback state machine and session management

pub mod player;
pub mod session;
pub mod state;

pub use player::{Player, PlayerSettings};
pub use state::{next_state, PlayerCommand};
