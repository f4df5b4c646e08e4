//! # Spindle Audio Player Library (spindle-ap)
//!
//! Streaming engine for tracker modules (MOD, XM, IT, S3M and relatives).
//!
//! **Architecture:** a pull-based synthesis context (`decoder`) renders into
//! a small ring of fixed buffers (`audio::buffer`) that cycle through a
//! queued output device (`audio::output`, `audio::cpal_queue`). The
//! `playback::Player` state machine ties them together; `context::AppContext`
//! adds the playlist and song flow for front ends.

pub mod audio;
pub mod context;
pub mod decoder;
pub mod error;
pub mod library;
pub mod playback;
pub mod playlist;

pub use context::AppContext;
pub use error::{Error, Result};
pub use playback::{Player, PlayerSettings};
pub use playlist::{PlayList, PlayListItem};
