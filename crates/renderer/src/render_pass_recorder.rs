//! Render pass begin/end with full-extent viewport and scissor.

use ash::vk;

use renderer_rhi::GpuDevice;

/// Color the frame is cleared to before drawing.
pub const CLEAR_COLOR: [f32; 4] = [0.005, 0.005, 0.005, 1.0];
pub const CLEAR_DEPTH: f32 = 1.0;
pub const CLEAR_STENCIL: u32 = 0;

/// Records render pass scope commands into a command buffer.
pub struct RenderPassRecorder<'a, G: GpuDevice> {
    device: &'a G,
}

impl<'a, G: GpuDevice> RenderPassRecorder<'a, G> {
    pub fn new(device: &'a G) -> Self {
        Self { device }
    }

    /// Begins `render_pass` on `framebuffer` over the whole `extent`, with
    /// inline contents, then sets viewport and scissor to the same area.
    pub fn begin(
        &self,
        command_buffer: vk::CommandBuffer,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
    ) {
        self.device.cmd_begin_render_pass(
            command_buffer,
            render_pass,
            framebuffer,
            full_scissor(extent),
            &clear_values(),
        );
        self.device
            .cmd_set_viewport(command_buffer, &full_viewport(extent));
        self.device
            .cmd_set_scissor(command_buffer, &full_scissor(extent));
    }

    pub fn end(&self, command_buffer: vk::CommandBuffer) {
        self.device.cmd_end_render_pass(command_buffer);
    }
}

/// Clear values in attachment order: color, then depth/stencil.
pub fn clear_values() -> [vk::ClearValue; 2] {
    [
        vk::ClearValue {
            color: vk::ClearColorValue {
                float32: CLEAR_COLOR,
            },
        },
        vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue {
                depth: CLEAR_DEPTH,
                stencil: CLEAR_STENCIL,
            },
        },
    ]
}

pub fn full_viewport(extent: vk::Extent2D) -> vk::Viewport {
    vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

pub fn full_scissor(extent: vk::Extent2D) -> vk::Rect2D {
    vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent,
    }
}
