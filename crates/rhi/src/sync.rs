//! Synchronization primitives.
//!
//! - [`Semaphore`]: GPU-to-GPU ordering between queue operations
//! - [`Fence`]: GPU-to-CPU completion signal the host can wait on
//! - [`FrameSlot`]: the semaphores and fence owned by one frame in flight
//!
//! All three are generic over [`GpuDevice`] and destroy their handle on drop.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use renderer_rhi::device::Device;
//! use renderer_rhi::sync::{Fence, Semaphore};
//!
//! # fn example(device: Arc<Device>) -> Result<(), renderer_rhi::RhiError> {
//! let image_available = Semaphore::new(device.clone())?;
//! let in_flight = Fence::new(device, true)?;
//!
//! in_flight.wait(u64::MAX)?;
//! in_flight.reset()?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;
use crate::gpu::GpuDevice;

/// Number of frames the CPU may record ahead of the GPU.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Binary semaphore.
pub struct Semaphore<G: GpuDevice = Device> {
    device: Arc<G>,
    semaphore: vk::Semaphore,
}

impl<G: GpuDevice> Semaphore<G> {
    /// Creates an unsignaled semaphore.
    pub fn new(device: Arc<G>) -> RhiResult<Self> {
        let semaphore = device.create_semaphore()?;
        Ok(Self { device, semaphore })
    }

    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl<G: GpuDevice> Drop for Semaphore<G> {
    fn drop(&mut self) {
        self.device.destroy_semaphore(self.semaphore);
    }
}

/// Host-visible completion fence.
pub struct Fence<G: GpuDevice = Device> {
    device: Arc<G>,
    fence: vk::Fence,
}

impl<G: GpuDevice> Fence<G> {
    /// Creates a fence, optionally already signaled so the first wait returns
    /// immediately.
    pub fn new(device: Arc<G>, signaled: bool) -> RhiResult<Self> {
        let fence = device.create_fence(signaled)?;
        Ok(Self { device, fence })
    }

    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }

    /// Blocks until the fence is signaled or `timeout` nanoseconds pass.
    ///
    /// # Errors
    ///
    /// Returns `vk::Result::TIMEOUT` as an error when the timeout expires.
    pub fn wait(&self, timeout: u64) -> RhiResult<()> {
        self.device.wait_for_fence(self.fence, timeout)
    }

    /// Returns the fence to the unsignaled state. The fence must not be
    /// pending on any queue.
    pub fn reset(&self) -> RhiResult<()> {
        self.device.reset_fence(self.fence)
    }

    /// Non-blocking status query. Errors read as unsignaled.
    pub fn is_signaled(&self) -> bool {
        matches!(self.device.fence_status(self.fence), Ok(true))
    }
}

impl<G: GpuDevice> Drop for Fence<G> {
    fn drop(&mut self) {
        self.device.destroy_fence(self.fence);
    }
}

/// Synchronization objects for one frame slot.
///
/// ```text
/// 1. wait in_flight, reset it
/// 2. acquire an image, signaling image_available
/// 3. submit: wait image_available, signal render_finished + in_flight
/// 4. present: wait render_finished
/// ```
pub struct FrameSlot<G: GpuDevice = Device> {
    image_available: Semaphore<G>,
    render_finished: Semaphore<G>,
    in_flight: Fence<G>,
}

impl<G: GpuDevice> FrameSlot<G> {
    /// Creates the slot with its fence signaled, so the slot starts idle.
    pub fn new(device: Arc<G>) -> RhiResult<Self> {
        let image_available = Semaphore::new(device.clone())?;
        let render_finished = Semaphore::new(device.clone())?;
        let in_flight = Fence::new(device, true)?;

        debug!("Created frame slot synchronization objects");

        Ok(Self {
            image_available,
            render_finished,
            in_flight,
        })
    }

    #[inline]
    pub fn image_available(&self) -> vk::Semaphore {
        self.image_available.handle()
    }

    #[inline]
    pub fn render_finished(&self) -> vk::Semaphore {
        self.render_finished.handle()
    }

    #[inline]
    pub fn in_flight(&self) -> &Fence<G> {
        &self.in_flight
    }
}
