//! Event-loop host that owns the window.
//!
//! [`WindowHost`] drives winit with `pump_app_events` instead of `run_app`,
//! so the caller keeps the main loop and can block on events in the middle
//! of a frame (e.g. while the window is minimized).

use std::ffi::c_char;
use std::time::Duration;

use ash::vk;
use tracing::{debug, info, warn};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::WindowId;

use renderer_core::config::WindowConfig;
use renderer_core::{Error, Result};

use crate::presentation::PresentationWindow;
use crate::window::{Surface, Window};

/// Window state updated from winit callbacks.
struct HostState {
    config: WindowConfig,
    window: Option<Window>,
    size: PhysicalSize<u32>,
    resized: bool,
    exit_requested: bool,
    error: Option<Error>,
}

impl HostState {
    fn new(config: WindowConfig) -> Self {
        let size = PhysicalSize::new(config.width, config.height);
        Self {
            config,
            window: None,
            size,
            resized: false,
            exit_requested: false,
            error: None,
        }
    }
}

impl ApplicationHandler for HostState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        match Window::new(event_loop, &self.config) {
            Ok(window) => {
                self.size = window.inner().inner_size();
                self.window = Some(window);
            }
            Err(e) => {
                self.error = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                self.exit_requested = true;
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                debug!("Window resized to {}x{}", size.width, size.height);
                self.size = size;
                self.resized = true;
            }
            WindowEvent::KeyboardInput { event, .. }
                if is_exit_key(event.physical_key, event.state) =>
            {
                info!("Escape pressed, shutting down");
                self.exit_requested = true;
                event_loop.exit();
            }
            _ => {}
        }
    }
}

fn is_exit_key(key: PhysicalKey, state: ElementState) -> bool {
    key == PhysicalKey::Code(KeyCode::Escape) && state.is_pressed()
}

/// Owns the winit event loop and the single application window.
pub struct WindowHost {
    event_loop: EventLoop<()>,
    state: HostState,
    window: Window,
}

impl WindowHost {
    /// Creates the event loop and pumps it until the window exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Window`] if the event loop or window cannot be created.
    pub fn new(config: &WindowConfig) -> Result<Self> {
        let mut event_loop = EventLoop::new().map_err(|e| Error::Window(e.to_string()))?;
        let mut state = HostState::new(config.clone());

        let window = loop {
            let status = event_loop.pump_app_events(Some(Duration::ZERO), &mut state);
            if let Some(e) = state.error.take() {
                return Err(e);
            }
            if let Some(window) = state.window.take() {
                break window;
            }
            if let PumpStatus::Exit(code) = status {
                return Err(Error::Window(format!(
                    "Event loop exited with code {code} before the window was created"
                )));
            }
        };

        Ok(Self {
            event_loop,
            state,
            window,
        })
    }

    /// Processes pending events without blocking. Returns `false` once the
    /// application should exit.
    pub fn poll_events(&mut self) -> bool {
        self.pump(Some(Duration::ZERO))
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Instance extensions needed to create a surface for the window.
    pub fn required_extensions(&self) -> Result<Vec<*const c_char>> {
        self.window.required_extensions()
    }

    pub fn create_surface(&self, entry: &ash::Entry, instance: &ash::Instance) -> Result<Surface> {
        self.window.create_surface(entry, instance)
    }

    fn pump(&mut self, timeout: Option<Duration>) -> bool {
        if self.state.exit_requested {
            return false;
        }
        if let PumpStatus::Exit(code) = self.event_loop.pump_app_events(timeout, &mut self.state) {
            if code != 0 {
                warn!("Event loop exited with code {}", code);
            }
            self.state.exit_requested = true;
        }
        !self.state.exit_requested
    }
}

impl PresentationWindow for WindowHost {
    fn extent(&self) -> vk::Extent2D {
        vk::Extent2D {
            width: self.state.size.width,
            height: self.state.size.height,
        }
    }

    fn was_resized(&self) -> bool {
        self.state.resized
    }

    fn reset_resized_flag(&mut self) {
        self.state.resized = false;
    }

    fn wait_events(&mut self) {
        self.pump(None);
    }

    fn close_requested(&self) -> bool {
        self.state.exit_requested
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::keyboard::NativeKeyCode;

    #[test]
    fn test_escape_press_exits() {
        assert!(is_exit_key(
            PhysicalKey::Code(KeyCode::Escape),
            ElementState::Pressed
        ));
    }

    #[test]
    fn test_other_keys_and_releases_do_not_exit() {
        assert!(!is_exit_key(
            PhysicalKey::Code(KeyCode::Escape),
            ElementState::Released
        ));
        assert!(!is_exit_key(
            PhysicalKey::Code(KeyCode::Space),
            ElementState::Pressed
        ));
        assert!(!is_exit_key(
            PhysicalKey::Unidentified(NativeKeyCode::Unidentified),
            ElementState::Pressed
        ));
    }

    #[test]
    fn test_host_state_starts_at_configured_size() {
        let state = HostState::new(WindowConfig::default());
        assert_eq!(state.size, PhysicalSize::new(1280, 720));
        assert!(!state.resized);
        assert!(!state.exit_requested);
    }
}
