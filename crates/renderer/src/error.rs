//! Renderer error types.

use ash::vk;
use renderer_rhi::RhiError;
use thiserror::Error;

/// Every error the frame loop can report. All of them are fatal: out-of-date
/// and suboptimal surfaces are handled internally and never surface here.
#[derive(Error, Debug)]
pub enum RenderError {
    /// A GPU object needed for presentation could not be created.
    #[error("Failed to create {what}: {source}")]
    ResourceCreation {
        what: &'static str,
        #[source]
        source: RhiError,
    },

    /// Acquire, submit or present failed with a non-recoverable result.
    #[error("Presentation failed while {stage}: {source}")]
    Presentation {
        stage: &'static str,
        #[source]
        source: RhiError,
    },

    /// The rebuilt surface set uses different color or depth formats.
    #[error(
        "Surface formats changed across rebuild: color {old_color:?} -> {new_color:?}, depth {old_depth:?} -> {new_depth:?}"
    )]
    FormatChanged {
        old_color: vk::Format,
        new_color: vk::Format,
        old_depth: vk::Format,
        new_depth: vk::Format,
    },

    /// The begin/end frame protocol was used out of order.
    #[error("Frame protocol violation: {0}")]
    ContractViolation(&'static str),

    #[error("Device error: {0}")]
    Device(#[from] RhiError),

    #[error("Platform error: {0}")]
    Platform(#[from] renderer_core::Error),
}

impl RenderError {
    /// `map_err` adapter for creation failures.
    pub(crate) fn creating(what: &'static str) -> impl FnOnce(RhiError) -> Self {
        move |source| Self::ResourceCreation { what, source }
    }

    /// `map_err` adapter for acquire/submit/present failures.
    pub(crate) fn presenting(stage: &'static str) -> impl FnOnce(RhiError) -> Self {
        move |source| Self::Presentation { stage, source }
    }
}

/// Result type alias for renderer operations.
pub type RenderResult<T> = std::result::Result<T, RenderError>;
