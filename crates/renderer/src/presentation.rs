//! Presentable images and everything sized to them.
//!
//! A [`PresentationSurfaceSet`] owns one swapchain together with its color
//! views, a depth attachment per image, the render pass and a framebuffer per
//! image. The whole set is rebuilt as a unit whenever the surface changes.
//!
//! Creation order is swapchain, color views, render pass, depth attachments,
//! framebuffers; [`destroy`](PresentationSurfaceSet::destroy) releases them in
//! reverse.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use renderer_rhi::GpuDevice;
use renderer_rhi::device::Device;
use renderer_rhi::render_pass::{DEPTH_FORMAT_CANDIDATES, RenderPassLayout};
use renderer_rhi::swapchain::SwapchainDesc;

use crate::depth_buffer::DepthAttachment;
use crate::error::{RenderError, RenderResult};

/// Swapchain, attachments, render pass and framebuffers for one surface size.
pub struct PresentationSurfaceSet<G: GpuDevice = Device> {
    device: Arc<G>,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    color_views: Vec<vk::ImageView>,
    render_pass: vk::RenderPass,
    depth_attachments: Vec<DepthAttachment<G>>,
    framebuffers: Vec<vk::Framebuffer>,
    extent: vk::Extent2D,
    color_format: vk::Format,
    depth_format: vk::Format,
    present_mode: vk::PresentModeKHR,
}

impl<G: GpuDevice> PresentationSurfaceSet<G> {
    /// Builds a complete set for `requested_extent`.
    ///
    /// The surface decides the final extent unless it leaves the choice to
    /// the swapchain, in which case `requested_extent` is clamped to the
    /// surface limits. When `previous` is given, its swapchain is handed to
    /// the driver as the one being replaced; the caller still owns and later
    /// destroys `previous`.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::ResourceCreation`] if any object cannot be
    /// created. Objects created before the failure are released.
    pub fn create(
        device: Arc<G>,
        requested_extent: vk::Extent2D,
        previous: Option<&Self>,
    ) -> RenderResult<Self> {
        let support = device
            .swapchain_support()
            .map_err(RenderError::creating("surface capability query"))?;

        let old_swapchain = previous.map_or(vk::SwapchainKHR::null(), |p| p.swapchain);
        let desc = SwapchainDesc::select(&support, requested_extent, old_swapchain)
            .map_err(RenderError::creating("swapchain configuration"))?;

        let depth_format = device
            .find_supported_format(
                &DEPTH_FORMAT_CANDIDATES,
                vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
            )
            .map_err(RenderError::creating("depth format"))?;

        // Anything pushed into `set` is released by its Drop if a later step fails.
        let mut set = Self {
            device: device.clone(),
            swapchain: vk::SwapchainKHR::null(),
            images: Vec::new(),
            color_views: Vec::new(),
            render_pass: vk::RenderPass::null(),
            depth_attachments: Vec::new(),
            framebuffers: Vec::new(),
            extent: desc.extent,
            color_format: desc.surface_format.format,
            depth_format,
            present_mode: desc.present_mode,
        };

        set.swapchain = device
            .create_swapchain(&desc)
            .map_err(RenderError::creating("swapchain"))?;
        set.images = device
            .get_swapchain_images(set.swapchain)
            .map_err(RenderError::creating("swapchain images"))?;

        for &image in &set.images {
            let view = device
                .create_image_view(image, set.color_format, vk::ImageAspectFlags::COLOR)
                .map_err(RenderError::creating("color image view"))?;
            set.color_views.push(view);
        }

        let layout = RenderPassLayout::new(set.color_format, depth_format);
        set.render_pass = device
            .create_render_pass(&layout)
            .map_err(RenderError::creating("render pass"))?;

        for _ in 0..set.images.len() {
            let depth = DepthAttachment::new(device.clone(), set.extent, depth_format)
                .map_err(RenderError::creating("depth attachment"))?;
            set.depth_attachments.push(depth);
        }

        for (color_view, depth) in set.color_views.iter().zip(&set.depth_attachments) {
            let framebuffer = device
                .create_framebuffer(
                    set.render_pass,
                    &[*color_view, depth.image_view()],
                    set.extent,
                )
                .map_err(RenderError::creating("framebuffer"))?;
            set.framebuffers.push(framebuffer);
        }

        info!(
            "Presentation surfaces created: {}x{}, {} images, color {:?}, depth {:?}, {:?}",
            set.extent.width,
            set.extent.height,
            set.images.len(),
            set.color_format,
            set.depth_format,
            set.present_mode
        );

        Ok(set)
    }

    /// Releases every object in reverse creation order. Safe to call more
    /// than once.
    pub fn destroy(&mut self) {
        if self.swapchain == vk::SwapchainKHR::null() && self.color_views.is_empty() {
            return;
        }

        for framebuffer in self.framebuffers.drain(..) {
            self.device.destroy_framebuffer(framebuffer);
        }

        self.depth_attachments.clear();

        if self.render_pass != vk::RenderPass::null() {
            self.device.destroy_render_pass(self.render_pass);
            self.render_pass = vk::RenderPass::null();
        }

        for view in self.color_views.drain(..) {
            self.device.destroy_image_view(view);
        }

        // Swapchain images belong to the swapchain.
        self.images.clear();
        if self.swapchain != vk::SwapchainKHR::null() {
            self.device.destroy_swapchain(self.swapchain);
            self.swapchain = vk::SwapchainKHR::null();
        }

        debug!("Presentation surfaces destroyed");
    }

    /// True when color and depth formats match, so pipelines built against
    /// one render pass stay valid with the other.
    pub fn formats_compatible(&self, other: &Self) -> bool {
        self.color_format == other.color_format && self.depth_format == other.depth_format
    }

    #[inline]
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Framebuffer for presentable image `image_index`.
    #[inline]
    pub fn framebuffer(&self, image_index: u32) -> Option<vk::Framebuffer> {
        self.framebuffers.get(image_index as usize).copied()
    }

    #[inline]
    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    #[inline]
    pub fn swapchain(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    #[inline]
    pub fn color_format(&self) -> vk::Format {
        self.color_format
    }

    #[inline]
    pub fn depth_format(&self) -> vk::Format {
        self.depth_format
    }

    #[inline]
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    /// Width over height of the current extent.
    pub fn aspect_ratio(&self) -> f32 {
        self.extent.width as f32 / self.extent.height.max(1) as f32
    }
}

impl<G: GpuDevice> Drop for PresentationSurfaceSet<G> {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;
    use renderer_rhi::mock::{GpuEvent, MockGpu, ObjectKind};

    fn extent(width: u32, height: u32) -> vk::Extent2D {
        vk::Extent2D { width, height }
    }

    fn destroyed_kinds(events: &[GpuEvent]) -> Vec<ObjectKind> {
        events
            .iter()
            .filter_map(|e| match e {
                GpuEvent::Destroyed(kind, _) => Some(*kind),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_create_builds_per_image_resources() {
        let gpu = Arc::new(MockGpu::new());
        let set = PresentationSurfaceSet::create(gpu.clone(), extent(800, 600), None).unwrap();

        assert_eq!(set.image_count(), 3);
        assert_eq!(set.extent(), extent(800, 600));
        assert_eq!(set.color_format(), vk::Format::B8G8R8A8_SRGB);
        assert_eq!(set.depth_format(), vk::Format::D32_SFLOAT);
        assert_eq!(set.present_mode(), vk::PresentModeKHR::MAILBOX);
        assert!((set.aspect_ratio() - 800.0 / 600.0).abs() < f32::EPSILON);

        assert_eq!(gpu.live_objects_of(ObjectKind::Swapchain), 1);
        assert_eq!(gpu.live_objects_of(ObjectKind::RenderPass), 1);
        assert_eq!(gpu.live_objects_of(ObjectKind::Framebuffer), 3);
        assert_eq!(gpu.live_objects_of(ObjectKind::Image), 3);
        // Color and depth views.
        assert_eq!(gpu.live_objects_of(ObjectKind::ImageView), 6);

        assert!(set.framebuffer(2).is_some());
        assert!(set.framebuffer(3).is_none());
    }

    #[test]
    fn test_surface_current_extent_wins() {
        let gpu = Arc::new(MockGpu::new());
        gpu.set_current_extent(Some(extent(1024, 768)));

        let set = PresentationSurfaceSet::create(gpu, extent(800, 600), None).unwrap();
        assert_eq!(set.extent(), extent(1024, 768));
    }

    #[test]
    fn test_depth_format_falls_back() {
        let gpu = Arc::new(MockGpu::new());
        gpu.set_depth_formats(vec![vk::Format::D24_UNORM_S8_UINT]);

        let set = PresentationSurfaceSet::create(gpu, extent(800, 600), None).unwrap();
        assert_eq!(set.depth_format(), vk::Format::D24_UNORM_S8_UINT);
    }

    #[test]
    fn test_no_depth_format_is_creation_failure() {
        let gpu = Arc::new(MockGpu::new());
        gpu.set_depth_formats(vec![]);

        let result = PresentationSurfaceSet::create(gpu.clone(), extent(800, 600), None);
        assert!(matches!(
            result,
            Err(RenderError::ResourceCreation {
                what: "depth format",
                ..
            })
        ));
        assert_eq!(gpu.live_object_count(), 0);
    }

    #[test]
    fn test_partial_failure_releases_everything() {
        let gpu = Arc::new(MockGpu::new());
        gpu.fail_next_creation(ObjectKind::Framebuffer);

        let result = PresentationSurfaceSet::create(gpu.clone(), extent(800, 600), None);
        assert!(matches!(
            result,
            Err(RenderError::ResourceCreation {
                what: "framebuffer",
                ..
            })
        ));
        assert_eq!(gpu.live_object_count(), 0);
    }

    #[test]
    fn test_previous_swapchain_is_passed_as_old() {
        let gpu = Arc::new(MockGpu::new());
        let first = PresentationSurfaceSet::create(gpu.clone(), extent(800, 600), None).unwrap();
        let second =
            PresentationSurfaceSet::create(gpu.clone(), extent(640, 480), Some(&first)).unwrap();

        let old = first.swapchain().as_raw();
        assert!(gpu.events().iter().any(|e| matches!(
            e,
            GpuEvent::SwapchainCreated { handle, old_swapchain, .. }
                if *handle == second.swapchain().as_raw() && *old_swapchain == old
        )));
        assert!(second.formats_compatible(&first));

        drop(first);
        assert_eq!(gpu.live_objects_of(ObjectKind::Swapchain), 1);
    }

    #[test]
    fn test_destroy_runs_in_reverse_creation_order() {
        let gpu = Arc::new(MockGpu::new());
        gpu.set_image_count(2);
        let mut set = PresentationSurfaceSet::create(gpu.clone(), extent(800, 600), None).unwrap();
        gpu.clear_events();

        set.destroy();

        use ObjectKind::*;
        assert_eq!(
            destroyed_kinds(&gpu.events()),
            vec![
                Framebuffer,
                Framebuffer,
                ImageView,
                Image,
                Memory,
                ImageView,
                Image,
                Memory,
                RenderPass,
                ImageView,
                ImageView,
                Swapchain,
            ]
        );
        assert_eq!(gpu.live_object_count(), 0);
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let gpu = Arc::new(MockGpu::new());
        let mut set = PresentationSurfaceSet::create(gpu.clone(), extent(800, 600), None).unwrap();

        set.destroy();
        gpu.clear_events();
        set.destroy();
        drop(set);

        assert!(gpu.events().is_empty());
    }

    #[test]
    fn test_format_compatibility() {
        let gpu = Arc::new(MockGpu::new());
        let srgb = PresentationSurfaceSet::create(gpu.clone(), extent(800, 600), None).unwrap();

        gpu.set_surface_formats(vec![vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }]);
        let unorm =
            PresentationSurfaceSet::create(gpu.clone(), extent(800, 600), Some(&srgb)).unwrap();

        assert!(!unorm.formats_compatible(&srgb));
        assert!(srgb.formats_compatible(&srgb));
    }
}
