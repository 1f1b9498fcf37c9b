//! Scriptable in-memory [`GpuDevice`] for tests.
//!
//! `MockGpu` hands out fake handles, records every call as a [`GpuEvent`],
//! and models the graphics queue as an in-order timeline: each submission
//! gets a sequence number and nothing completes until the host waits for it.
//! Waiting on a fence completes that fence's submission and every earlier
//! one, so a fence reads as signaled exactly when its last submission is at
//! or below [`MockGpu::completed_through`].

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use ash::prelude::VkResult;
use ash::vk::{self, Handle};

use crate::error::{RhiError, RhiResult};
use crate::gpu::GpuDevice;
use crate::render_pass::RenderPassLayout;
use crate::swapchain::{SwapchainDesc, SwapchainSupportDetails};

/// Kind of object a fake handle stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Swapchain,
    Image,
    ImageView,
    Memory,
    RenderPass,
    Framebuffer,
    Semaphore,
    Fence,
    CommandPool,
    CommandBuffer,
}

/// Scripted outcome of one acquire or present call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Optimal,
    Suboptimal,
    OutOfDate,
}

/// One recorded device call. Handles are raw `u64` values.
#[derive(Debug, Clone, PartialEq)]
pub enum GpuEvent {
    Created(ObjectKind, u64),
    Destroyed(ObjectKind, u64),
    SwapchainCreated {
        handle: u64,
        old_swapchain: u64,
        extent: vk::Extent2D,
        format: vk::Format,
    },
    FenceWait {
        fence: u64,
        /// The fence's submission had not completed yet, so the host blocked.
        was_pending: bool,
    },
    FenceReset(u64),
    Acquire {
        swapchain: u64,
        image_index: Option<u32>,
    },
    Submit {
        command_buffer: u64,
        fence: u64,
        sequence: u64,
        /// Last completed sequence number when the submission was made.
        completed_through: u64,
    },
    Present {
        swapchain: u64,
        image_index: u32,
    },
    BeginCommandBuffer(u64),
    EndCommandBuffer(u64),
    BeginRenderPass {
        command_buffer: u64,
        framebuffer: u64,
        render_area: vk::Extent2D,
        clear_color: [f32; 4],
        clear_depth: f32,
        clear_stencil: u32,
    },
    SetViewport {
        width: f32,
        height: f32,
        min_depth: f32,
        max_depth: f32,
    },
    SetScissor(vk::Extent2D),
    EndRenderPass(u64),
    WaitIdle,
}

/// Device memory stand-in for attachment images.
#[derive(Debug)]
pub struct MockMemory(u64);

#[derive(Debug, Clone, Copy)]
enum FenceState {
    Signaled,
    Unsignaled,
    Pending(u64),
}

struct MockSwapchain {
    images: Vec<u64>,
    next_image: u32,
}

struct State {
    next_handle: u64,
    live: HashMap<u64, ObjectKind>,
    fences: HashMap<u64, FenceState>,
    swapchains: HashMap<u64, MockSwapchain>,
    next_sequence: u64,
    completed_through: u64,
    events: Vec<GpuEvent>,

    image_count: u32,
    current_extent: Option<vk::Extent2D>,
    surface_formats: Vec<vk::SurfaceFormatKHR>,
    present_modes: Vec<vk::PresentModeKHR>,
    depth_formats: Vec<vk::Format>,
    acquire_script: VecDeque<Outcome>,
    acquire_indices: VecDeque<u32>,
    present_script: VecDeque<Outcome>,
    fail_next: Option<ObjectKind>,
}

impl State {
    fn create(&mut self, kind: ObjectKind) -> VkResult<u64> {
        if self.fail_next == Some(kind) {
            self.fail_next = None;
            return Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
        }
        let handle = self.next_handle;
        self.next_handle += 1;
        self.live.insert(handle, kind);
        self.events.push(GpuEvent::Created(kind, handle));
        Ok(handle)
    }

    fn destroy(&mut self, kind: ObjectKind, handle: u64) {
        if handle == 0 {
            return;
        }
        self.live.remove(&handle);
        self.events.push(GpuEvent::Destroyed(kind, handle));
    }

    fn fence_signaled(&self, fence: u64) -> bool {
        match self.fences.get(&fence) {
            Some(FenceState::Signaled) => true,
            Some(FenceState::Pending(seq)) => *seq <= self.completed_through,
            _ => false,
        }
    }
}

/// Fake device with a simulated in-order GPU timeline.
///
/// Defaults: 3 swapchain images, a surface that leaves the extent to the
/// swapchain, `B8G8R8A8_SRGB` color, `FIFO` + `MAILBOX` present modes and
/// `D32_SFLOAT` depth.
pub struct MockGpu {
    state: Mutex<State>,
}

impl Default for MockGpu {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGpu {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                next_handle: 1,
                live: HashMap::new(),
                fences: HashMap::new(),
                swapchains: HashMap::new(),
                next_sequence: 1,
                completed_through: 0,
                events: Vec::new(),
                image_count: 3,
                current_extent: None,
                surface_formats: vec![vk::SurfaceFormatKHR {
                    format: vk::Format::B8G8R8A8_SRGB,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                }],
                present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
                depth_formats: vec![vk::Format::D32_SFLOAT],
                acquire_script: VecDeque::new(),
                acquire_indices: VecDeque::new(),
                present_script: VecDeque::new(),
                fail_next: None,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of images each new swapchain gets.
    pub fn set_image_count(&self, count: u32) {
        self.state().image_count = count;
    }

    /// Fixes the surface's current extent; `None` leaves it to the swapchain.
    pub fn set_current_extent(&self, extent: Option<vk::Extent2D>) {
        self.state().current_extent = extent;
    }

    pub fn set_surface_formats(&self, formats: Vec<vk::SurfaceFormatKHR>) {
        self.state().surface_formats = formats;
    }

    pub fn set_present_modes(&self, modes: Vec<vk::PresentModeKHR>) {
        self.state().present_modes = modes;
    }

    /// Formats usable as depth attachments, in no particular order.
    pub fn set_depth_formats(&self, formats: Vec<vk::Format>) {
        self.state().depth_formats = formats;
    }

    /// Queues the outcome of a future acquire. Unscripted acquires succeed.
    pub fn push_acquire_outcome(&self, outcome: Outcome) {
        self.state().acquire_script.push_back(outcome);
    }

    /// Forces the image index returned by a future successful acquire.
    /// Scripted acquires do not move the round-robin position.
    pub fn push_acquire_index(&self, image_index: u32) {
        self.state().acquire_indices.push_back(image_index);
    }

    /// Queues the outcome of a future present. Unscripted presents succeed.
    pub fn push_present_outcome(&self, outcome: Outcome) {
        self.state().present_script.push_back(outcome);
    }

    /// Makes the next creation of `kind` fail with `ERROR_OUT_OF_DEVICE_MEMORY`.
    pub fn fail_next_creation(&self, kind: ObjectKind) {
        self.state().fail_next = Some(kind);
    }

    pub fn events(&self) -> Vec<GpuEvent> {
        self.state().events.clone()
    }

    pub fn clear_events(&self) {
        self.state().events.clear();
    }

    pub fn live_object_count(&self) -> usize {
        self.state().live.len()
    }

    pub fn live_objects_of(&self, kind: ObjectKind) -> usize {
        self.state().live.values().filter(|&&k| k == kind).count()
    }

    /// Highest submission sequence number the simulated GPU has finished.
    pub fn completed_through(&self) -> u64 {
        self.state().completed_through
    }
}

impl GpuDevice for MockGpu {
    type ImageMemory = MockMemory;

    fn swapchain_support(&self) -> RhiResult<SwapchainSupportDetails> {
        let state = self.state();
        let current_extent = state.current_extent.unwrap_or(vk::Extent2D {
            width: u32::MAX,
            height: u32::MAX,
        });

        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: state.image_count.saturating_sub(1).max(1),
            max_image_count: state.image_count,
            current_extent,
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 16384,
                height: 16384,
            },
            max_image_array_layers: 1,
            supported_transforms: vk::SurfaceTransformFlagsKHR::IDENTITY,
            current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
            supported_composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
            supported_usage_flags: vk::ImageUsageFlags::COLOR_ATTACHMENT,
        };

        Ok(SwapchainSupportDetails {
            capabilities,
            formats: state.surface_formats.clone(),
            present_modes: state.present_modes.clone(),
        })
    }

    fn find_supported_format(
        &self,
        candidates: &[vk::Format],
        features: vk::FormatFeatureFlags,
    ) -> RhiResult<vk::Format> {
        let state = self.state();
        candidates
            .iter()
            .copied()
            .find(|format| state.depth_formats.contains(format))
            .ok_or_else(|| RhiError::UnsupportedFormat {
                candidates: candidates.to_vec(),
                features,
            })
    }

    fn create_swapchain(&self, desc: &SwapchainDesc) -> RhiResult<vk::SwapchainKHR> {
        let mut state = self.state();
        let handle = state.create(ObjectKind::Swapchain)?;
        let images = (0..state.image_count)
            .map(|_| {
                let image = state.next_handle;
                state.next_handle += 1;
                image
            })
            .collect();
        state.swapchains.insert(
            handle,
            MockSwapchain {
                images,
                next_image: 0,
            },
        );
        state.events.push(GpuEvent::SwapchainCreated {
            handle,
            old_swapchain: desc.old_swapchain.as_raw(),
            extent: desc.extent,
            format: desc.surface_format.format,
        });
        Ok(vk::SwapchainKHR::from_raw(handle))
    }

    fn get_swapchain_images(&self, swapchain: vk::SwapchainKHR) -> RhiResult<Vec<vk::Image>> {
        let state = self.state();
        let chain = state
            .swapchains
            .get(&swapchain.as_raw())
            .ok_or_else(|| RhiError::InvalidHandle(format!("unknown swapchain {swapchain:?}")))?;
        Ok(chain.images.iter().map(|&h| vk::Image::from_raw(h)).collect())
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        let mut state = self.state();
        state.swapchains.remove(&swapchain.as_raw());
        state.destroy(ObjectKind::Swapchain, swapchain.as_raw());
    }

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        _semaphore: vk::Semaphore,
    ) -> VkResult<(u32, bool)> {
        let mut state = self.state();
        let outcome = state.acquire_script.pop_front().unwrap_or(Outcome::Optimal);

        if outcome == Outcome::OutOfDate {
            state.events.push(GpuEvent::Acquire {
                swapchain: swapchain.as_raw(),
                image_index: None,
            });
            return Err(vk::Result::ERROR_OUT_OF_DATE_KHR);
        }

        let scripted = state.acquire_indices.pop_front();
        let chain = state
            .swapchains
            .get_mut(&swapchain.as_raw())
            .ok_or(vk::Result::ERROR_SURFACE_LOST_KHR)?;
        let image_count = chain.images.len().max(1) as u32;
        let image_index = match scripted {
            Some(index) if index >= image_count => {
                return Err(vk::Result::ERROR_VALIDATION_FAILED_EXT);
            }
            Some(index) => index,
            None => {
                let index = chain.next_image;
                chain.next_image = (chain.next_image + 1) % image_count;
                index
            }
        };

        state.events.push(GpuEvent::Acquire {
            swapchain: swapchain.as_raw(),
            image_index: Some(image_index),
        });
        Ok((image_index, outcome == Outcome::Suboptimal))
    }

    fn queue_present(
        &self,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        _wait_semaphore: vk::Semaphore,
    ) -> VkResult<bool> {
        let mut state = self.state();
        state.events.push(GpuEvent::Present {
            swapchain: swapchain.as_raw(),
            image_index,
        });
        match state.present_script.pop_front().unwrap_or(Outcome::Optimal) {
            Outcome::Optimal => Ok(false),
            Outcome::Suboptimal => Ok(true),
            Outcome::OutOfDate => Err(vk::Result::ERROR_OUT_OF_DATE_KHR),
        }
    }

    fn create_image_view(
        &self,
        _image: vk::Image,
        _format: vk::Format,
        _aspect: vk::ImageAspectFlags,
    ) -> RhiResult<vk::ImageView> {
        Ok(vk::ImageView::from_raw(self.state().create(ObjectKind::ImageView)?))
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        self.state().destroy(ObjectKind::ImageView, view.as_raw());
    }

    fn create_attachment_image(
        &self,
        extent: vk::Extent2D,
        _format: vk::Format,
        _usage: vk::ImageUsageFlags,
    ) -> RhiResult<(vk::Image, MockMemory)> {
        if extent.width == 0 || extent.height == 0 {
            return Err(RhiError::InvalidHandle(
                "Attachment image dimensions must be greater than 0".to_string(),
            ));
        }
        let mut state = self.state();
        let image = state.create(ObjectKind::Image)?;
        let memory = state.create(ObjectKind::Memory)?;
        Ok((vk::Image::from_raw(image), MockMemory(memory)))
    }

    fn destroy_image(&self, image: vk::Image, memory: MockMemory) {
        let mut state = self.state();
        state.destroy(ObjectKind::Image, image.as_raw());
        state.destroy(ObjectKind::Memory, memory.0);
    }

    fn create_render_pass(&self, _layout: &RenderPassLayout) -> RhiResult<vk::RenderPass> {
        Ok(vk::RenderPass::from_raw(self.state().create(ObjectKind::RenderPass)?))
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        self.state().destroy(ObjectKind::RenderPass, render_pass.as_raw());
    }

    fn create_framebuffer(
        &self,
        _render_pass: vk::RenderPass,
        _attachments: &[vk::ImageView],
        _extent: vk::Extent2D,
    ) -> RhiResult<vk::Framebuffer> {
        Ok(vk::Framebuffer::from_raw(self.state().create(ObjectKind::Framebuffer)?))
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        self.state().destroy(ObjectKind::Framebuffer, framebuffer.as_raw());
    }

    fn create_semaphore(&self) -> RhiResult<vk::Semaphore> {
        Ok(vk::Semaphore::from_raw(self.state().create(ObjectKind::Semaphore)?))
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        self.state().destroy(ObjectKind::Semaphore, semaphore.as_raw());
    }

    fn create_fence(&self, signaled: bool) -> RhiResult<vk::Fence> {
        let mut state = self.state();
        let handle = state.create(ObjectKind::Fence)?;
        let initial = if signaled {
            FenceState::Signaled
        } else {
            FenceState::Unsignaled
        };
        state.fences.insert(handle, initial);
        Ok(vk::Fence::from_raw(handle))
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        let mut state = self.state();
        state.fences.remove(&fence.as_raw());
        state.destroy(ObjectKind::Fence, fence.as_raw());
    }

    fn wait_for_fence(&self, fence: vk::Fence, _timeout: u64) -> RhiResult<()> {
        let mut state = self.state();
        let handle = fence.as_raw();
        let fence_state = *state
            .fences
            .get(&handle)
            .ok_or_else(|| RhiError::InvalidHandle(format!("unknown fence {fence:?}")))?;

        match fence_state {
            FenceState::Signaled => {
                state.events.push(GpuEvent::FenceWait {
                    fence: handle,
                    was_pending: false,
                });
            }
            FenceState::Pending(seq) => {
                let was_pending = seq > state.completed_through;
                state.completed_through = state.completed_through.max(seq);
                state.fences.insert(handle, FenceState::Signaled);
                state.events.push(GpuEvent::FenceWait {
                    fence: handle,
                    was_pending,
                });
            }
            // Nothing will ever signal it.
            FenceState::Unsignaled => return Err(vk::Result::TIMEOUT.into()),
        }
        Ok(())
    }

    fn reset_fence(&self, fence: vk::Fence) -> RhiResult<()> {
        let mut state = self.state();
        let handle = fence.as_raw();
        if !state.fences.contains_key(&handle) {
            return Err(RhiError::InvalidHandle(format!("unknown fence {fence:?}")));
        }
        state.fences.insert(handle, FenceState::Unsignaled);
        state.events.push(GpuEvent::FenceReset(handle));
        Ok(())
    }

    fn fence_status(&self, fence: vk::Fence) -> RhiResult<bool> {
        Ok(self.state().fence_signaled(fence.as_raw()))
    }

    fn wait_idle(&self) -> RhiResult<()> {
        let mut state = self.state();
        state.completed_through = state.next_sequence - 1;
        state.events.push(GpuEvent::WaitIdle);
        Ok(())
    }

    fn create_command_pool(&self) -> RhiResult<vk::CommandPool> {
        Ok(vk::CommandPool::from_raw(self.state().create(ObjectKind::CommandPool)?))
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        self.state().destroy(ObjectKind::CommandPool, pool.as_raw());
    }

    fn allocate_command_buffers(
        &self,
        _pool: vk::CommandPool,
        count: u32,
    ) -> RhiResult<Vec<vk::CommandBuffer>> {
        let mut state = self.state();
        (0..count)
            .map(|_| {
                state
                    .create(ObjectKind::CommandBuffer)
                    .map(vk::CommandBuffer::from_raw)
                    .map_err(RhiError::from)
            })
            .collect()
    }

    fn free_command_buffers(&self, _pool: vk::CommandPool, buffers: &[vk::CommandBuffer]) {
        let mut state = self.state();
        for buffer in buffers {
            state.destroy(ObjectKind::CommandBuffer, buffer.as_raw());
        }
    }

    fn begin_command_buffer(&self, command_buffer: vk::CommandBuffer) -> RhiResult<()> {
        self.state()
            .events
            .push(GpuEvent::BeginCommandBuffer(command_buffer.as_raw()));
        Ok(())
    }

    fn end_command_buffer(&self, command_buffer: vk::CommandBuffer) -> RhiResult<()> {
        self.state()
            .events
            .push(GpuEvent::EndCommandBuffer(command_buffer.as_raw()));
        Ok(())
    }

    fn submit_graphics(
        &self,
        command_buffer: vk::CommandBuffer,
        _wait_semaphore: vk::Semaphore,
        _wait_stage: vk::PipelineStageFlags,
        _signal_semaphore: vk::Semaphore,
        fence: vk::Fence,
    ) -> RhiResult<()> {
        let mut state = self.state();
        let handle = fence.as_raw();
        match state.fences.get(&handle) {
            Some(FenceState::Unsignaled) => {}
            Some(_) => {
                return Err(RhiError::InvalidHandle(format!(
                    "fence {fence:?} submitted while not unsignaled"
                )));
            }
            None => return Err(RhiError::InvalidHandle(format!("unknown fence {fence:?}"))),
        }

        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.fences.insert(handle, FenceState::Pending(sequence));
        let completed_through = state.completed_through;
        state.events.push(GpuEvent::Submit {
            command_buffer: command_buffer.as_raw(),
            fence: handle,
            sequence,
            completed_through,
        });
        Ok(())
    }

    fn cmd_begin_render_pass(
        &self,
        command_buffer: vk::CommandBuffer,
        _render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        render_area: vk::Rect2D,
        clear_values: &[vk::ClearValue],
    ) {
        // Color first, depth second.
        let (clear_color, clear_depth, clear_stencil) = unsafe {
            let color = clear_values.first().map(|v| v.color.float32).unwrap_or_default();
            let depth = clear_values
                .get(1)
                .map(|v| (v.depth_stencil.depth, v.depth_stencil.stencil))
                .unwrap_or_default();
            (color, depth.0, depth.1)
        };

        self.state().events.push(GpuEvent::BeginRenderPass {
            command_buffer: command_buffer.as_raw(),
            framebuffer: framebuffer.as_raw(),
            render_area: render_area.extent,
            clear_color,
            clear_depth,
            clear_stencil,
        });
    }

    fn cmd_set_viewport(&self, _command_buffer: vk::CommandBuffer, viewport: &vk::Viewport) {
        self.state().events.push(GpuEvent::SetViewport {
            width: viewport.width,
            height: viewport.height,
            min_depth: viewport.min_depth,
            max_depth: viewport.max_depth,
        });
    }

    fn cmd_set_scissor(&self, _command_buffer: vk::CommandBuffer, scissor: &vk::Rect2D) {
        self.state()
            .events
            .push(GpuEvent::SetScissor(scissor.extent));
    }

    fn cmd_end_render_pass(&self, command_buffer: vk::CommandBuffer) {
        self.state()
            .events
            .push(GpuEvent::EndRenderPass(command_buffer.as_raw()));
    }
}
