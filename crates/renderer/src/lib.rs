//! Frame lifecycle for the Vulkan renderer.
//!
//! - [`PresentationSurfaceSet`]: swapchain, views, depth, render pass and
//!   framebuffers for one window size
//! - [`FrameSynchronizer`]: frame slots and per-image in-flight tracking
//! - [`FrameOrchestrator`]: the begin/end frame protocol and rebuilds
//! - [`RenderPassRecorder`]: render pass begin with clears, viewport and scissor
//! - [`Renderer`]: owns the real instance, surface and device
//!
//! Everything except [`Renderer`] is generic over
//! [`GpuDevice`](renderer_rhi::GpuDevice), so the frame loop runs against
//! `renderer_rhi::mock::MockGpu` in tests.

pub mod depth_buffer;
mod error;
pub mod frame;
pub mod frame_sync;
pub mod orchestrator;
pub mod presentation;
pub mod render_pass_recorder;
mod renderer;

pub use error::{RenderError, RenderResult};
pub use frame::{FrameContext, RenderSystem};
pub use frame_sync::FrameSynchronizer;
pub use orchestrator::FrameOrchestrator;
pub use presentation::PresentationSurfaceSet;
pub use render_pass_recorder::RenderPassRecorder;
pub use renderer::Renderer;
pub use renderer_rhi::sync::MAX_FRAMES_IN_FLIGHT;
