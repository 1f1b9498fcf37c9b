//! Platform layer for the Vulkan renderer.
//!
//! - [`WindowHost`]: winit event loop plus the application window
//! - [`Surface`]: RAII Vulkan surface for that window
//! - [`PresentationWindow`]: the window as seen by the frame loop
//!
//! With the `mock` feature, [`mock::MockWindow`] scripts window behavior
//! for tests.

mod host;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
mod presentation;
mod window;

pub use host::WindowHost;
pub use presentation::PresentationWindow;
pub use window::{Surface, Window, get_required_extensions};
