//! Vulkan abstraction layer (Render Hardware Interface).
//!
//! This crate wraps the parts of Vulkan the frame loop needs, using `ash`:
//! - Instance, physical device and logical device creation
//! - Swapchain configuration selection and acquire/present result folding
//! - The color + depth render pass layout
//! - Synchronization primitives and command pools
//!
//! [`gpu::GpuDevice`] is the seam between this crate and the renderer. The
//! `mock` feature adds [`mock::MockGpu`], an in-memory implementation for
//! tests.

mod error;

pub mod command;
pub mod device;
pub mod gpu;
pub mod instance;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod physical_device;
pub mod render_pass;
pub mod swapchain;
pub mod sync;

pub use error::{RhiError, RhiResult};
pub use gpu::GpuDevice;

// Re-export ash types that users might need
pub use ash::vk;
