//! Error types for spindle-ap
//!
//! Load-time failures come from the synthesis library's status codes,
//! device-time failures from the output queue. Every variant renders a
//! message suitable for showing to the user as-is.

use crate::playback::PlayerCommand;
use spindle_common::PlayerState;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for spindle-ap
#[derive(Error, Debug)]
pub enum Error {
    /// Synthesis library does not recognise the file
    #[error("Unrecognized module format")]
    UnrecognizedFormat,

    /// Synthesis library recognised the format but could not load it
    #[error("Error loading module (corrupt file?)")]
    CorruptFile,

    /// Any other non-zero load status
    #[error("Module decode error (code {0})")]
    Decode(i32),

    /// Load target is not a regular file
    #[error("Not a file: {}", .0.display())]
    NotAFile(PathBuf),

    /// Synthesis library refused to start rendering
    #[error("Failed to start module rendering (code {0})")]
    RenderStart(i32),

    /// Output queue could not be created
    #[error("Audio queue initialization failed: {0}")]
    QueueInit(String),

    /// One of the ring buffers could not be allocated
    #[error("Failed to allocate audio buffer {index} ({bytes} bytes)")]
    BufferAlloc { index: usize, bytes: usize },

    /// Output device refused to start or resume
    #[error("Unable to start audio output: {0}")]
    StartFailed(String),

    /// Output device refused to pause
    #[error("Unable to pause audio output: {0}")]
    PauseFailed(String),

    /// Output queue rejected a buffer
    #[error("Unable to enqueue audio buffer: {0}")]
    Enqueue(String),

    /// Command cannot be honoured in the current state
    #[error("Cannot {command} while {state}")]
    InvalidTransition {
        command: PlayerCommand,
        state: PlayerState,
    },

    /// Operation needs a loaded module
    #[error("No module loaded")]
    NoModule,

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors from the shared library (configuration etc.)
    #[error(transparent)]
    Common(#[from] spindle_common::Error),
}

/// Convenience Result type using spindle-ap Error
pub type Result<T> = std::result::Result<T, Error>;
