//! Command pool ownership.
//!
//! [`CommandPool`] owns a resettable pool on the graphics queue family and
//! hands out primary command buffers. Buffers are plain handles; they are
//! freed explicitly or together with the pool.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use renderer_rhi::device::Device;
//! use renderer_rhi::command::CommandPool;
//!
//! # fn example(device: Arc<Device>) -> Result<(), renderer_rhi::RhiError> {
//! let pool = CommandPool::new(device)?;
//! let buffers = pool.allocate_command_buffers(2)?;
//! // ... record and submit ...
//! pool.free_command_buffers(&buffers);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::RhiResult;
use crate::gpu::GpuDevice;

/// Command pool for the graphics queue family.
pub struct CommandPool<G: GpuDevice = Device> {
    device: Arc<G>,
    pool: vk::CommandPool,
}

impl<G: GpuDevice> CommandPool<G> {
    /// Creates a pool whose buffers can be reset individually.
    ///
    /// # Errors
    ///
    /// Returns an error if pool creation fails.
    pub fn new(device: Arc<G>) -> RhiResult<Self> {
        let pool = device.create_command_pool()?;
        info!("Command pool created");
        Ok(Self { device, pool })
    }

    #[inline]
    pub fn handle(&self) -> vk::CommandPool {
        self.pool
    }

    /// Allocates `count` primary command buffers.
    pub fn allocate_command_buffers(&self, count: u32) -> RhiResult<Vec<vk::CommandBuffer>> {
        let buffers = self.device.allocate_command_buffers(self.pool, count)?;
        debug!("Allocated {} command buffer(s)", buffers.len());
        Ok(buffers)
    }

    /// Returns buffers to the pool. They must not be pending execution.
    pub fn free_command_buffers(&self, buffers: &[vk::CommandBuffer]) {
        if buffers.is_empty() {
            return;
        }
        self.device.free_command_buffers(self.pool, buffers);
        debug!("Freed {} command buffer(s)", buffers.len());
    }

    #[inline]
    pub fn device(&self) -> &Arc<G> {
        &self.device
    }
}

impl<G: GpuDevice> Drop for CommandPool<G> {
    fn drop(&mut self) {
        self.device.destroy_command_pool(self.pool);
        info!("Command pool destroyed");
    }
}
