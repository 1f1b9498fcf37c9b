//! Color + depth render pass layout.
//!
//! [`RenderPassLayout`] is a plain description of the single-subpass render
//! pass every presentable framebuffer is built against. The device turns it
//! into a `VkRenderPass`; keeping the description separate lets the layout be
//! inspected without a GPU.

use ash::vk;

/// Depth formats tried in order when choosing the depth attachment format.
pub const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

/// Index of the color attachment in the framebuffer attachment list.
pub const COLOR_ATTACHMENT_INDEX: u32 = 0;
/// Index of the depth attachment in the framebuffer attachment list.
pub const DEPTH_ATTACHMENT_INDEX: u32 = 1;

/// Attachments, subpass and dependency of the presentation render pass.
#[derive(Debug, Clone, Copy)]
pub struct RenderPassLayout {
    pub color: vk::AttachmentDescription,
    pub depth: vk::AttachmentDescription,
    pub dependency: vk::SubpassDependency,
}

impl RenderPassLayout {
    /// Layout for presenting `color_format` with a `depth_format` depth buffer.
    ///
    /// Color is cleared, stored and left in `PRESENT_SRC_KHR`; depth is
    /// cleared and discarded. The external dependency keeps color and depth
    /// writes from starting before the previous use of the attachments
    /// has finished.
    pub fn new(color_format: vk::Format, depth_format: vk::Format) -> Self {
        let color = vk::AttachmentDescription::default()
            .format(color_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR);

        let depth = vk::AttachmentDescription::default()
            .format(depth_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);

        let stages = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
            | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS;

        let dependency = vk::SubpassDependency::default()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(stages)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(stages)
            .dst_access_mask(
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                    | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            );

        Self {
            color,
            depth,
            dependency,
        }
    }

    #[inline]
    pub fn color_format(&self) -> vk::Format {
        self.color.format
    }

    #[inline]
    pub fn depth_format(&self) -> vk::Format {
        self.depth.format
    }

    /// Attachment descriptions in framebuffer order.
    #[inline]
    pub fn attachments(&self) -> [vk::AttachmentDescription; 2] {
        [self.color, self.depth]
    }

    /// Reference to the color attachment as used inside the subpass.
    #[inline]
    pub fn color_reference() -> vk::AttachmentReference {
        vk::AttachmentReference {
            attachment: COLOR_ATTACHMENT_INDEX,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        }
    }

    /// Reference to the depth attachment as used inside the subpass.
    #[inline]
    pub fn depth_reference() -> vk::AttachmentReference {
        vk::AttachmentReference {
            attachment: DEPTH_ATTACHMENT_INDEX,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        }
    }
}
