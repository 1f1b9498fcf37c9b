//! RHI-specific error types.

use ash::vk;
use thiserror::Error;

/// RHI-specific error type.
#[derive(Error, Debug)]
pub enum RhiError {
    /// Vulkan API error
    #[error("Vulkan error: {0}")]
    VulkanError(#[from] vk::Result),

    /// Failed to load Vulkan
    #[error("Failed to load Vulkan: {0}")]
    LoadingError(#[from] ash::LoadingError),

    /// GPU allocator error
    #[error("Allocator error: {0}")]
    AllocatorError(#[from] gpu_allocator::AllocationError),

    /// No suitable GPU found
    #[error("No suitable GPU found")]
    NoSuitableGpu,

    /// None of the candidate formats supports the requested usage
    #[error("No supported format among {candidates:?} for {features:?}")]
    UnsupportedFormat {
        candidates: Vec<vk::Format>,
        features: vk::FormatFeatureFlags,
    },

    /// Swapchain error
    #[error("Swapchain error: {0}")]
    SwapchainError(String),

    /// A handle or size that cannot be used for the requested operation
    #[error("Invalid handle: {0}")]
    InvalidHandle(String),
}

impl RhiError {
    /// The underlying Vulkan result, if this error came from a Vulkan call.
    pub fn vk_result(&self) -> Option<vk::Result> {
        match self {
            Self::VulkanError(result) => Some(*result),
            _ => None,
        }
    }
}

/// Result type alias for RHI operations.
pub type RhiResult<T> = std::result::Result<T, RhiError>;
