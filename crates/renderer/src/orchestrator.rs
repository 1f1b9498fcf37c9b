//! Begin/end frame protocol.
//!
//! [`FrameOrchestrator`] is the only entry point render code uses per frame:
//!
//! ```text
//! begin_frame ─► begin_render_pass ─► (render systems) ─► end_render_pass ─► end_frame
//! ```
//!
//! It owns the presentation surfaces, the frame synchronizer and one command
//! buffer per frame slot, and rebuilds the surfaces when the swapchain goes
//! out of date, becomes suboptimal or the window is resized.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, error, info};

use renderer_core::Timer;
use renderer_platform::PresentationWindow;
use renderer_rhi::GpuDevice;
use renderer_rhi::command::CommandPool;
use renderer_rhi::device::Device;
use renderer_rhi::swapchain::AcquiredImage;
use renderer_rhi::sync::MAX_FRAMES_IN_FLIGHT;

use crate::error::{RenderError, RenderResult};
use crate::frame::FrameContext;
use crate::frame_sync::FrameSynchronizer;
use crate::presentation::PresentationSurfaceSet;
use crate::render_pass_recorder::RenderPassRecorder;

pub struct FrameOrchestrator<G: GpuDevice = Device> {
    device: Arc<G>,
    surfaces: PresentationSurfaceSet<G>,
    sync: FrameSynchronizer<G>,
    command_buffers: Vec<vk::CommandBuffer>,
    command_pool: CommandPool<G>,
    image_index: u32,
    frame_in_progress: bool,
    /// Set when acquire reported a suboptimal swapchain; rebuilt after present.
    rebuild_pending: bool,
    timer: Timer,
}

impl<G: GpuDevice> FrameOrchestrator<G> {
    /// Builds the initial surfaces for the window's size, the frame slots and
    /// one command buffer per slot. Blocks on window events while the window
    /// has no area.
    pub fn new(device: Arc<G>, window: &mut impl PresentationWindow) -> RenderResult<Self> {
        let extent = wait_for_drawable_extent(window);
        let surfaces = PresentationSurfaceSet::create(device.clone(), extent, None)?;
        let sync = FrameSynchronizer::new(device.clone(), surfaces.image_count())?;

        let command_pool =
            CommandPool::new(device.clone()).map_err(RenderError::creating("command pool"))?;
        let command_buffers = command_pool
            .allocate_command_buffers(MAX_FRAMES_IN_FLIGHT as u32)
            .map_err(RenderError::creating("command buffers"))?;

        info!(
            "Frame orchestrator ready: {} frames in flight, {} presentable images",
            MAX_FRAMES_IN_FLIGHT,
            surfaces.image_count()
        );

        Ok(Self {
            device,
            surfaces,
            sync,
            command_buffers,
            command_pool,
            image_index: 0,
            frame_in_progress: false,
            rebuild_pending: false,
            timer: Timer::new(),
        })
    }

    /// Starts a frame and returns its context with the command buffer in the
    /// recording state.
    ///
    /// Returns `Ok(None)` when the swapchain was out of date; the surfaces
    /// have been rebuilt and the caller should skip this frame.
    ///
    /// # Errors
    ///
    /// [`RenderError::ContractViolation`] if a frame is already in progress,
    /// otherwise any fatal acquire or rebuild error.
    pub fn begin_frame(
        &mut self,
        window: &mut impl PresentationWindow,
    ) -> RenderResult<Option<FrameContext>> {
        if self.frame_in_progress {
            return Err(RenderError::ContractViolation(
                "begin_frame called while a frame is already in progress",
            ));
        }

        let image_index = match self.sync.acquire_next_image(&self.surfaces)? {
            AcquiredImage::OutOfDate => {
                self.rebuild(window)?;
                return Ok(None);
            }
            AcquiredImage::Ready {
                image_index,
                suboptimal,
            } => {
                self.rebuild_pending |= suboptimal;
                image_index
            }
        };

        self.image_index = image_index;
        self.frame_in_progress = true;

        let command_buffer = self.command_buffers[self.sync.current_slot()];
        self.device
            .begin_command_buffer(command_buffer)
            .map_err(RenderError::presenting("beginning command buffer"))?;

        Ok(Some(FrameContext {
            slot_index: self.sync.current_slot(),
            image_index,
            command_buffer,
            frame_time: self.timer.delta_secs(),
            render_pass: self.surfaces.render_pass(),
            extent: self.surfaces.extent(),
        }))
    }

    /// Finishes recording, submits and presents the frame.
    ///
    /// Rebuilds the surfaces afterward if presentation reported out-of-date
    /// or suboptimal, or if the window was resized.
    ///
    /// # Errors
    ///
    /// [`RenderError::ContractViolation`] if no frame is in progress,
    /// otherwise any fatal submit, present or rebuild error.
    pub fn end_frame(&mut self, window: &mut impl PresentationWindow) -> RenderResult<()> {
        let command_buffer = self.current_command_buffer()?;

        self.device
            .end_command_buffer(command_buffer)
            .map_err(RenderError::presenting("ending command buffer"))?;

        let status = self
            .sync
            .submit_and_present(&self.surfaces, command_buffer, self.image_index)?;
        self.frame_in_progress = false;

        if status.needs_rebuild() || self.rebuild_pending || window.was_resized() {
            debug!(
                "Rebuilding surfaces after present ({:?}, suboptimal acquire: {}, resized: {})",
                status,
                self.rebuild_pending,
                window.was_resized()
            );
            window.reset_resized_flag();
            self.rebuild_pending = false;
            self.rebuild(window)?;
        }

        Ok(())
    }

    /// Begins the render pass on the current image's framebuffer.
    ///
    /// # Errors
    ///
    /// [`RenderError::ContractViolation`] if no frame is in progress or
    /// `command_buffer` is not the current frame's.
    pub fn begin_render_pass(&self, command_buffer: vk::CommandBuffer) -> RenderResult<()> {
        self.check_active(command_buffer)?;
        let framebuffer = self
            .surfaces
            .framebuffer(self.image_index)
            .ok_or(RenderError::ContractViolation("current image has no framebuffer"))?;

        RenderPassRecorder::new(&*self.device).begin(
            command_buffer,
            self.surfaces.render_pass(),
            framebuffer,
            self.surfaces.extent(),
        );
        Ok(())
    }

    /// Ends the render pass begun by [`begin_render_pass`](Self::begin_render_pass).
    pub fn end_render_pass(&self, command_buffer: vk::CommandBuffer) -> RenderResult<()> {
        self.check_active(command_buffer)?;
        RenderPassRecorder::new(&*self.device).end(command_buffer);
        Ok(())
    }

    /// Command buffer of the frame in progress.
    pub fn current_command_buffer(&self) -> RenderResult<vk::CommandBuffer> {
        if !self.frame_in_progress {
            return Err(RenderError::ContractViolation("no frame in progress"));
        }
        Ok(self.command_buffers[self.sync.current_slot()])
    }

    /// Slot index of the frame in progress.
    pub fn frame_index(&self) -> RenderResult<usize> {
        if !self.frame_in_progress {
            return Err(RenderError::ContractViolation("no frame in progress"));
        }
        Ok(self.sync.current_slot())
    }

    #[inline]
    pub fn is_frame_in_progress(&self) -> bool {
        self.frame_in_progress
    }

    #[inline]
    pub fn render_pass(&self) -> vk::RenderPass {
        self.surfaces.render_pass()
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.surfaces.extent()
    }

    #[inline]
    pub fn aspect_ratio(&self) -> f32 {
        self.surfaces.aspect_ratio()
    }

    #[inline]
    pub fn surfaces(&self) -> &PresentationSurfaceSet<G> {
        &self.surfaces
    }

    #[inline]
    pub fn device(&self) -> &Arc<G> {
        &self.device
    }

    fn check_active(&self, command_buffer: vk::CommandBuffer) -> RenderResult<()> {
        if self.current_command_buffer()? != command_buffer {
            return Err(RenderError::ContractViolation(
                "command buffer does not belong to the frame in progress",
            ));
        }
        Ok(())
    }

    /// Replaces the surface set with one matching the window's current size.
    fn rebuild(&mut self, window: &mut impl PresentationWindow) -> RenderResult<()> {
        let extent = wait_for_drawable_extent(window);
        if extent.width == 0 || extent.height == 0 {
            debug!("Window closed while minimized, skipping surface rebuild");
            return Ok(());
        }

        self.device.wait_idle()?;

        let surfaces =
            PresentationSurfaceSet::create(self.device.clone(), extent, Some(&self.surfaces))?;
        if !surfaces.formats_compatible(&self.surfaces) {
            return Err(RenderError::FormatChanged {
                old_color: self.surfaces.color_format(),
                new_color: surfaces.color_format(),
                old_depth: self.surfaces.depth_format(),
                new_depth: surfaces.depth_format(),
            });
        }

        self.surfaces = surfaces;
        self.sync.reset_markers(self.surfaces.image_count());

        info!(
            "Surfaces rebuilt: {}x{}, {} images",
            extent.width,
            extent.height,
            self.surfaces.image_count()
        );
        Ok(())
    }
}

impl<G: GpuDevice> Drop for FrameOrchestrator<G> {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            error!("Failed to wait for device idle during shutdown: {}", e);
        }
        self.command_pool.free_command_buffers(&self.command_buffers);
        self.command_buffers.clear();
    }
}

/// Blocks on window events until the window has a drawable area or the
/// user asks to close it. Returns the last observed extent.
fn wait_for_drawable_extent(window: &mut impl PresentationWindow) -> vk::Extent2D {
    let mut extent = window.extent();
    while (extent.width == 0 || extent.height == 0) && !window.close_requested() {
        window.wait_events();
        extent = window.extent();
    }
    extent
}

#[cfg(test)]
mod tests {
    use super::*;
    use renderer_platform::mock::MockWindow;
    use renderer_rhi::mock::{MockGpu, ObjectKind, Outcome};

    fn setup() -> (Arc<MockGpu>, MockWindow, FrameOrchestrator<MockGpu>) {
        let gpu = Arc::new(MockGpu::new());
        let mut window = MockWindow::new(800, 600);
        let orchestrator = FrameOrchestrator::new(gpu.clone(), &mut window).unwrap();
        (gpu, window, orchestrator)
    }

    #[test]
    fn test_accessors_require_frame_in_progress() {
        let (_gpu, mut window, mut orchestrator) = setup();
        assert!(orchestrator.current_command_buffer().is_err());
        assert!(orchestrator.frame_index().is_err());

        let frame = orchestrator.begin_frame(&mut window).unwrap().unwrap();
        assert_eq!(
            orchestrator.current_command_buffer().unwrap(),
            frame.command_buffer
        );
        assert_eq!(orchestrator.frame_index().unwrap(), 0);
        assert!(orchestrator.is_frame_in_progress());

        orchestrator.end_frame(&mut window).unwrap();
        assert!(!orchestrator.is_frame_in_progress());
    }

    #[test]
    fn test_end_frame_while_idle_is_rejected() {
        let (_gpu, mut window, mut orchestrator) = setup();
        assert!(matches!(
            orchestrator.end_frame(&mut window),
            Err(RenderError::ContractViolation(_))
        ));
    }

    #[test]
    fn test_render_pass_outside_frame_is_rejected() {
        let (_gpu, _window, orchestrator) = setup();
        assert!(matches!(
            orchestrator.begin_render_pass(vk::CommandBuffer::null()),
            Err(RenderError::ContractViolation(_))
        ));
        assert!(matches!(
            orchestrator.end_render_pass(vk::CommandBuffer::null()),
            Err(RenderError::ContractViolation(_))
        ));
    }

    #[test]
    fn test_frame_context_describes_surfaces() {
        let (_gpu, mut window, mut orchestrator) = setup();
        let frame = orchestrator.begin_frame(&mut window).unwrap().unwrap();

        assert_eq!(frame.slot_index, 0);
        assert_eq!(frame.image_index, 0);
        assert_eq!(frame.render_pass, orchestrator.render_pass());
        assert_eq!(frame.extent, orchestrator.extent());
        assert!(frame.frame_time >= 0.0);
    }

    #[test]
    fn test_suboptimal_present_rebuilds() {
        let (gpu, mut window, mut orchestrator) = setup();
        let before = orchestrator.surfaces().swapchain();

        orchestrator.begin_frame(&mut window).unwrap().unwrap();
        gpu.push_present_outcome(Outcome::Suboptimal);
        orchestrator.end_frame(&mut window).unwrap();

        assert_ne!(orchestrator.surfaces().swapchain(), before);
        assert_eq!(gpu.live_objects_of(ObjectKind::Swapchain), 1);
    }

    #[test]
    fn test_suboptimal_acquire_rebuilds_after_present() {
        let (gpu, mut window, mut orchestrator) = setup();
        let before = orchestrator.surfaces().swapchain();

        gpu.push_acquire_outcome(Outcome::Suboptimal);
        let frame = orchestrator.begin_frame(&mut window).unwrap();
        assert!(frame.is_some());
        assert_eq!(orchestrator.surfaces().swapchain(), before);

        orchestrator.end_frame(&mut window).unwrap();
        let after = orchestrator.surfaces().swapchain();
        assert_ne!(after, before);

        // The flag is consumed by the rebuild.
        orchestrator.begin_frame(&mut window).unwrap().unwrap();
        orchestrator.end_frame(&mut window).unwrap();
        assert_eq!(orchestrator.surfaces().swapchain(), after);
    }

    #[test]
    fn test_resize_flag_rebuilds_at_new_size_and_clears() {
        let (_gpu, mut window, mut orchestrator) = setup();

        orchestrator.begin_frame(&mut window).unwrap().unwrap();
        window.resize(1024, 768);
        orchestrator.end_frame(&mut window).unwrap();

        assert!(!window.was_resized());
        assert_eq!(
            orchestrator.extent(),
            vk::Extent2D {
                width: 1024,
                height: 768
            }
        );
    }

    #[test]
    fn test_drop_releases_all_objects() {
        let (gpu, mut window, mut orchestrator) = setup();
        orchestrator.begin_frame(&mut window).unwrap().unwrap();
        orchestrator.end_frame(&mut window).unwrap();

        drop(orchestrator);
        assert_eq!(gpu.live_object_count(), 0);
    }
}
