//! The device operations the frame lifecycle depends on.
//!
//! [`GpuDevice`] is implemented by [`Device`](crate::device::Device) for real
//! hardware and by [`MockGpu`](crate::mock::MockGpu) (feature `mock`) for
//! tests. Every call takes and returns raw `vk` handles; ownership of those
//! handles is tracked by the callers' RAII types.
//!
//! Destruction calls must only be given handles that were created by the same
//! device and are no longer in use by the GPU.

use ash::prelude::VkResult;
use ash::vk;

use crate::error::RhiResult;
use crate::render_pass::RenderPassLayout;
use crate::swapchain::{SwapchainDesc, SwapchainSupportDetails};

/// Logical device seen through the operations needed to acquire, record,
/// submit and present frames.
pub trait GpuDevice: Send + Sync {
    /// Device memory backing an image created by
    /// [`create_attachment_image`](Self::create_attachment_image).
    type ImageMemory: Send;

    // Capability queries

    /// Current surface capabilities, formats and present modes.
    fn swapchain_support(&self) -> RhiResult<SwapchainSupportDetails>;

    /// First format in `candidates` whose optimal-tiling features contain `features`.
    fn find_supported_format(
        &self,
        candidates: &[vk::Format],
        features: vk::FormatFeatureFlags,
    ) -> RhiResult<vk::Format>;

    // Swapchain

    fn create_swapchain(&self, desc: &SwapchainDesc) -> RhiResult<vk::SwapchainKHR>;
    fn get_swapchain_images(&self, swapchain: vk::SwapchainKHR) -> RhiResult<Vec<vk::Image>>;
    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR);

    /// Acquires the next presentable image, signaling `semaphore` when it is
    /// ready. Blocks without timeout.
    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        semaphore: vk::Semaphore,
    ) -> VkResult<(u32, bool)>;

    /// Queues `image_index` for presentation once `wait_semaphore` signals.
    fn queue_present(
        &self,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> VkResult<bool>;

    // Images and framebuffers

    fn create_image_view(
        &self,
        image: vk::Image,
        format: vk::Format,
        aspect: vk::ImageAspectFlags,
    ) -> RhiResult<vk::ImageView>;
    fn destroy_image_view(&self, view: vk::ImageView);

    /// Creates a device-local 2D image with bound memory.
    fn create_attachment_image(
        &self,
        extent: vk::Extent2D,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
    ) -> RhiResult<(vk::Image, Self::ImageMemory)>;
    fn destroy_image(&self, image: vk::Image, memory: Self::ImageMemory);

    fn create_render_pass(&self, layout: &RenderPassLayout) -> RhiResult<vk::RenderPass>;
    fn destroy_render_pass(&self, render_pass: vk::RenderPass);

    fn create_framebuffer(
        &self,
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> RhiResult<vk::Framebuffer>;
    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer);

    // Synchronization

    fn create_semaphore(&self) -> RhiResult<vk::Semaphore>;
    fn destroy_semaphore(&self, semaphore: vk::Semaphore);

    fn create_fence(&self, signaled: bool) -> RhiResult<vk::Fence>;
    fn destroy_fence(&self, fence: vk::Fence);
    fn wait_for_fence(&self, fence: vk::Fence, timeout: u64) -> RhiResult<()>;
    fn reset_fence(&self, fence: vk::Fence) -> RhiResult<()>;
    fn fence_status(&self, fence: vk::Fence) -> RhiResult<bool>;

    /// Blocks until every queue on the device is idle.
    fn wait_idle(&self) -> RhiResult<()>;

    // Commands

    /// Creates a resettable command pool on the graphics queue family.
    fn create_command_pool(&self) -> RhiResult<vk::CommandPool>;
    fn destroy_command_pool(&self, pool: vk::CommandPool);
    fn allocate_command_buffers(
        &self,
        pool: vk::CommandPool,
        count: u32,
    ) -> RhiResult<Vec<vk::CommandBuffer>>;
    fn free_command_buffers(&self, pool: vk::CommandPool, buffers: &[vk::CommandBuffer]);

    /// Begins recording; implicitly resets the buffer.
    fn begin_command_buffer(&self, command_buffer: vk::CommandBuffer) -> RhiResult<()>;
    fn end_command_buffer(&self, command_buffer: vk::CommandBuffer) -> RhiResult<()>;

    /// Submits one command buffer to the graphics queue.
    ///
    /// Execution waits on `wait_semaphore` at `wait_stage`; completion signals
    /// `signal_semaphore` and `fence`.
    fn submit_graphics(
        &self,
        command_buffer: vk::CommandBuffer,
        wait_semaphore: vk::Semaphore,
        wait_stage: vk::PipelineStageFlags,
        signal_semaphore: vk::Semaphore,
        fence: vk::Fence,
    ) -> RhiResult<()>;

    fn cmd_begin_render_pass(
        &self,
        command_buffer: vk::CommandBuffer,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        render_area: vk::Rect2D,
        clear_values: &[vk::ClearValue],
    );
    fn cmd_set_viewport(&self, command_buffer: vk::CommandBuffer, viewport: &vk::Viewport);
    fn cmd_set_scissor(&self, command_buffer: vk::CommandBuffer, scissor: &vk::Rect2D);
    fn cmd_end_render_pass(&self, command_buffer: vk::CommandBuffer);
}
