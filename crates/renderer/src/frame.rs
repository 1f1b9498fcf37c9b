//! Per-frame data handed to render systems.

use ash::vk;

use renderer_rhi::GpuDevice;
use renderer_rhi::device::Device;

use crate::error::RenderResult;

/// State of the frame being recorded. Valid from `begin_frame` until the
/// matching `end_frame`; the command buffer must not be used after that.
#[derive(Debug, Clone, Copy)]
pub struct FrameContext {
    /// Frame-in-flight slot, in `0..MAX_FRAMES_IN_FLIGHT`.
    pub slot_index: usize,
    /// Presentable image being rendered.
    pub image_index: u32,
    /// Command buffer in the recording state.
    pub command_buffer: vk::CommandBuffer,
    /// Seconds since the previous frame began.
    pub frame_time: f32,
    pub render_pass: vk::RenderPass,
    pub extent: vk::Extent2D,
}

impl FrameContext {
    pub fn aspect_ratio(&self) -> f32 {
        self.extent.width as f32 / self.extent.height.max(1) as f32
    }
}

/// Something that records draw commands inside the frame's render pass.
pub trait RenderSystem<G: GpuDevice = Device> {
    fn render(&mut self, device: &G, frame: &FrameContext) -> RenderResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aspect_ratio_guards_zero_height() {
        let frame = FrameContext {
            slot_index: 0,
            image_index: 0,
            command_buffer: vk::CommandBuffer::null(),
            frame_time: 0.016,
            render_pass: vk::RenderPass::null(),
            extent: vk::Extent2D {
                width: 1920,
                height: 0,
            },
        };
        assert_eq!(frame.aspect_ratio(), 1920.0);
    }
}
