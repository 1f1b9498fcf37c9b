//! Core utilities shared by the renderer crates.
//!
//! - Error types and result aliases
//! - Logging initialization
//! - Frame timing
//! - Engine configuration loaded from TOML

pub mod config;
mod error;
mod logging;
mod timer;

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use timer::Timer;
