//! Per-image depth attachments.
//!
//! A [`DepthAttachment`] is a device-local depth image, its memory and a
//! depth-aspect view, sized to one presentable image.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use renderer_rhi::device::Device;
use renderer_rhi::{GpuDevice, RhiResult};

/// Depth image, memory and view. Destroyed view first, then image and memory.
pub struct DepthAttachment<G: GpuDevice = Device> {
    device: Arc<G>,
    image: vk::Image,
    image_view: vk::ImageView,
    memory: Option<G::ImageMemory>,
    format: vk::Format,
    extent: vk::Extent2D,
}

impl<G: GpuDevice> DepthAttachment<G> {
    /// Creates a depth attachment of `extent` in `format`.
    ///
    /// # Errors
    ///
    /// Returns an error if the image, its memory or the view cannot be
    /// created. Anything created before the failure is released.
    pub fn new(device: Arc<G>, extent: vk::Extent2D, format: vk::Format) -> RhiResult<Self> {
        let (image, memory) = device.create_attachment_image(
            extent,
            format,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
        )?;

        let image_view = match device.create_image_view(image, format, vk::ImageAspectFlags::DEPTH)
        {
            Ok(view) => view,
            Err(e) => {
                device.destroy_image(image, memory);
                return Err(e);
            }
        };

        debug!(
            "Created depth attachment: {}x{} ({:?})",
            extent.width, extent.height, format
        );

        Ok(Self {
            device,
            image,
            image_view,
            memory: Some(memory),
            format,
            extent,
        })
    }

    #[inline]
    pub fn image(&self) -> vk::Image {
        self.image
    }

    #[inline]
    pub fn image_view(&self) -> vk::ImageView {
        self.image_view
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

impl<G: GpuDevice> Drop for DepthAttachment<G> {
    fn drop(&mut self) {
        self.device.destroy_image_view(self.image_view);
        if let Some(memory) = self.memory.take() {
            self.device.destroy_image(self.image, memory);
        }
    }
}
