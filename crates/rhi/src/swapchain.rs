//! Swapchain configuration selection and result classification.
//!
//! The swapchain handle itself is created through [`GpuDevice`](crate::gpu::GpuDevice)
//! and owned by the presentation surface set in the renderer crate. This
//! module decides *what* to create:
//!
//! - Surface format: B8G8R8A8_SRGB / SRGB_NONLINEAR, then B8G8R8A8_UNORM, then
//!   whatever the surface lists first
//! - Present mode: MAILBOX, falling back to FIFO
//! - Extent: the surface's current extent, or the requested size clamped to
//!   the surface limits when the surface leaves it to the swapchain
//! - Image count: one more than the minimum, capped by the maximum
//!
//! It also folds the `VK_SUBOPTIMAL_KHR` / `VK_ERROR_OUT_OF_DATE_KHR` results
//! of acquire and present into [`AcquiredImage`] and [`SwapchainStatus`].

use ash::prelude::VkResult;
use ash::vk;
use tracing::{debug, warn};

use crate::error::{RhiError, RhiResult};

/// Swapchain surface support details.
#[derive(Debug, Clone)]
pub struct SwapchainSupportDetails {
    /// Surface capabilities (min/max image count, extents, transforms, etc.)
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported surface formats (format and color space combinations)
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes (FIFO, MAILBOX, IMMEDIATE, etc.)
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupportDetails {
    /// Queries swapchain support details for a physical device and surface.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the surface queries fail.
    pub fn query(
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &ash::khr::surface::Instance,
    ) -> RhiResult<Self> {
        let capabilities = unsafe {
            surface_loader.get_physical_device_surface_capabilities(physical_device, surface)?
        };
        let formats = unsafe {
            surface_loader.get_physical_device_surface_formats(physical_device, surface)?
        };
        let present_modes = unsafe {
            surface_loader.get_physical_device_surface_present_modes(physical_device, surface)?
        };

        debug!(
            "Swapchain support: {} formats, {} present modes, image count: {}-{}",
            formats.len(),
            present_modes.len(),
            capabilities.min_image_count,
            if capabilities.max_image_count == 0 {
                "unlimited".to_string()
            } else {
                capabilities.max_image_count.to_string()
            }
        );

        Ok(Self {
            capabilities,
            formats,
            present_modes,
        })
    }

    /// True if at least one format and one present mode are available.
    #[inline]
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// Everything needed to create one swapchain, apart from the surface and
/// queue sharing which belong to the device.
#[derive(Debug, Clone, Copy)]
pub struct SwapchainDesc {
    pub surface_format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub min_image_count: u32,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
    /// Swapchain being replaced, or null.
    pub old_swapchain: vk::SwapchainKHR,
}

impl SwapchainDesc {
    /// Picks format, present mode, extent and image count for `requested`.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::SwapchainError`] if the surface reports no formats
    /// or no present modes.
    pub fn select(
        support: &SwapchainSupportDetails,
        requested: vk::Extent2D,
        old_swapchain: vk::SwapchainKHR,
    ) -> RhiResult<Self> {
        if !support.is_adequate() {
            return Err(RhiError::SwapchainError(
                "Inadequate swapchain support (no formats or present modes)".to_string(),
            ));
        }

        Ok(Self {
            surface_format: choose_surface_format(&support.formats),
            present_mode: choose_present_mode(&support.present_modes),
            extent: choose_extent(&support.capabilities, requested),
            min_image_count: determine_image_count(&support.capabilities),
            pre_transform: support.capabilities.current_transform,
            old_swapchain,
        })
    }
}

/// Result of a successful (non-fatal) image acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquiredImage {
    /// An image is available; `suboptimal` means it still presents correctly
    /// but no longer matches the surface exactly.
    Ready { image_index: u32, suboptimal: bool },
    /// The surface changed and the swapchain must be rebuilt before use.
    OutOfDate,
}

impl AcquiredImage {
    /// Folds the raw result of `vkAcquireNextImageKHR`.
    ///
    /// # Errors
    ///
    /// Any error other than `ERROR_OUT_OF_DATE_KHR` is returned as-is.
    pub fn classify(result: VkResult<(u32, bool)>) -> RhiResult<Self> {
        match result {
            Ok((image_index, suboptimal)) => Ok(Self::Ready {
                image_index,
                suboptimal,
            }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(Self::OutOfDate),
            Err(e) => Err(e.into()),
        }
    }
}

/// Non-fatal outcome of a present call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapchainStatus {
    Optimal,
    Suboptimal,
    OutOfDate,
}

impl SwapchainStatus {
    /// Folds the raw result of `vkQueuePresentKHR`.
    ///
    /// # Errors
    ///
    /// Any error other than out-of-date or suboptimal is returned as-is.
    pub fn classify_present(result: VkResult<bool>) -> RhiResult<Self> {
        match result {
            Ok(false) => Ok(Self::Optimal),
            Ok(true) | Err(vk::Result::SUBOPTIMAL_KHR) => Ok(Self::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(Self::OutOfDate),
            Err(e) => Err(e.into()),
        }
    }

    /// True when the swapchain should be rebuilt.
    #[inline]
    pub fn needs_rebuild(self) -> bool {
        !matches!(self, Self::Optimal)
    }
}

/// Chooses the surface format.
fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    let preferred = formats.iter().find(|f| {
        f.format == vk::Format::B8G8R8A8_SRGB && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
    });
    if let Some(&format) = preferred {
        debug!("Selected surface format B8G8R8A8_SRGB / SRGB_NONLINEAR");
        return format;
    }

    let alternative = formats.iter().find(|f| {
        f.format == vk::Format::B8G8R8A8_UNORM && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
    });
    if let Some(&format) = alternative {
        warn!("Using fallback surface format B8G8R8A8_UNORM / SRGB_NONLINEAR");
        return format;
    }

    warn!(
        "Using first available surface format: {:?} / {:?}",
        formats[0].format, formats[0].color_space
    );
    formats[0]
}

/// Chooses MAILBOX when offered, otherwise FIFO (always available).
fn choose_present_mode(present_modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if present_modes.contains(&vk::PresentModeKHR::MAILBOX) {
        debug!("Present mode: MAILBOX");
        return vk::PresentModeKHR::MAILBOX;
    }

    debug!("Present mode: FIFO (vsync)");
    vk::PresentModeKHR::FIFO
}

/// Uses the surface's current extent unless it is the `u32::MAX` sentinel,
/// in which case `requested` is clamped to the surface limits.
fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, requested: vk::Extent2D) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    let extent = vk::Extent2D {
        width: requested.width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: requested.height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    };

    debug!(
        "Clamped extent {}x{} -> {}x{}",
        requested.width, requested.height, extent.width, extent.height
    );

    extent
}

/// One more than the minimum, capped by the maximum (0 means no maximum).
fn determine_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let preferred = capabilities.min_image_count + 1;

    if capabilities.max_image_count > 0 {
        preferred.min(capabilities.max_image_count)
    } else {
        preferred
    }
}
