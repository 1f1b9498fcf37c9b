//! Top-level renderer.
//!
//! [`Renderer`] owns the Vulkan instance, surface and device for a
//! [`WindowHost`] and drives frames through a [`FrameOrchestrator`].
//!
//! # Resource Destruction Order
//!
//! Fields are wrapped in [`ManuallyDrop`] and released explicitly:
//!
//! 1. Frame orchestrator (waits for the GPU, then frees command buffers,
//!    frame slots and presentation surfaces)
//! 2. Logical device
//! 3. Surface
//! 4. Instance

use std::mem::ManuallyDrop;
use std::sync::Arc;

use ash::vk;
use tracing::{error, info};

use renderer_core::config::RendererConfig;
use renderer_platform::{Surface, WindowHost};
use renderer_rhi::GpuDevice;
use renderer_rhi::device::Device;
use renderer_rhi::instance::Instance;
use renderer_rhi::physical_device::select_physical_device;

use crate::error::RenderResult;
use crate::frame::FrameContext;
use crate::orchestrator::FrameOrchestrator;

pub struct Renderer {
    orchestrator: ManuallyDrop<FrameOrchestrator<Device>>,
    device: ManuallyDrop<Arc<Device>>,
    surface: ManuallyDrop<Surface>,
    instance: ManuallyDrop<Instance>,
}

impl Renderer {
    /// Initializes Vulkan for the host's window.
    ///
    /// # Errors
    ///
    /// Fails if the Vulkan loader, a suitable GPU, or any presentation
    /// resource is unavailable.
    pub fn new(host: &mut WindowHost, config: &RendererConfig) -> RenderResult<Self> {
        info!("Initializing renderer");

        let extensions = host.required_extensions()?;
        let instance = Instance::new(&config.app_name, config.validation, &extensions)?;
        let surface = host.create_surface(instance.entry(), instance.handle())?;

        let physical_device =
            select_physical_device(instance.handle(), surface.handle(), surface.loader())?;
        info!(
            "Selected GPU: {} ({})",
            physical_device.device_name(),
            physical_device.device_type_name()
        );

        let device = Device::new(&instance, &physical_device, surface.handle())?;
        let orchestrator = FrameOrchestrator::new(device.clone(), host)?;

        info!(
            "Renderer initialized ({}x{}, validation: {})",
            orchestrator.extent().width,
            orchestrator.extent().height,
            instance.has_validation()
        );

        Ok(Self {
            orchestrator: ManuallyDrop::new(orchestrator),
            device: ManuallyDrop::new(device),
            surface: ManuallyDrop::new(surface),
            instance: ManuallyDrop::new(instance),
        })
    }

    /// See [`FrameOrchestrator::begin_frame`].
    pub fn begin_frame(&mut self, host: &mut WindowHost) -> RenderResult<Option<FrameContext>> {
        self.orchestrator.begin_frame(host)
    }

    /// See [`FrameOrchestrator::end_frame`].
    pub fn end_frame(&mut self, host: &mut WindowHost) -> RenderResult<()> {
        self.orchestrator.end_frame(host)
    }

    pub fn begin_render_pass(&self, command_buffer: vk::CommandBuffer) -> RenderResult<()> {
        self.orchestrator.begin_render_pass(command_buffer)
    }

    pub fn end_render_pass(&self, command_buffer: vk::CommandBuffer) -> RenderResult<()> {
        self.orchestrator.end_render_pass(command_buffer)
    }

    #[inline]
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    #[inline]
    pub fn orchestrator(&self) -> &FrameOrchestrator<Device> {
        &self.orchestrator
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.orchestrator.extent()
    }

    #[inline]
    pub fn aspect_ratio(&self) -> f32 {
        self.orchestrator.aspect_ratio()
    }

    /// Blocks until the GPU has finished all submitted work.
    pub fn wait_idle(&self) -> RenderResult<()> {
        self.device.wait_idle()?;
        Ok(())
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            error!("Failed to wait for device idle during renderer drop: {}", e);
        }

        // SAFETY: each field is dropped exactly once, here, and never used
        // afterward. The order releases every object before its parent.
        unsafe {
            ManuallyDrop::drop(&mut self.orchestrator);
            ManuallyDrop::drop(&mut self.device);
            ManuallyDrop::drop(&mut self.surface);
            ManuallyDrop::drop(&mut self.instance);
        }

        info!("Renderer destroyed");
    }
}
