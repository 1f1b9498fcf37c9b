//! Error types for the engine's platform and configuration layers.

use thiserror::Error;

/// Main error type for the non-GPU parts of the engine.
#[derive(Error, Debug)]
pub enum Error {
    /// Vulkan surface or extension enumeration errors
    #[error("Vulkan error: {0}")]
    Vulkan(String),

    /// Window creation or event loop errors
    #[error("Window error: {0}")]
    Window(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed or unreadable configuration
    #[error("Config error: {0}")]
    Config(String),
}

/// Result type alias using the core Error type.
pub type Result<T> = std::result::Result<T, Error>;
