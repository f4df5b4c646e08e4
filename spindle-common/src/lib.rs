//! # Spindle Common Library
//!
//! Shared code for the Spindle module player:
//! - Error type
//! - Configuration loading (`SpindleConfig`)
//! - Event types (`SpindleEvent`) and the `EventBus`
//! - Module metadata (`ModuleInfo`) and format classification
//! - Human-readable time formatting

pub mod config;
pub mod error;
pub mod events;
pub mod human_time;
pub mod module_info;

pub use config::SpindleConfig;
pub use error::{Error, Result};
pub use events::{EventBus, PlayerState, SpindleEvent};
pub use module_info::{FormatTag, ModuleInfo};
