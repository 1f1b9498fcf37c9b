//! Scripted [`PresentationWindow`] for tests.

use std::collections::VecDeque;

use ash::vk;

use crate::presentation::PresentationWindow;

/// Window whose extent changes only when the frame loop waits for events.
///
/// Each [`wait_events`](PresentationWindow::wait_events) call applies the
/// next scripted extent, if any, and is counted.
#[derive(Debug, Clone)]
pub struct MockWindow {
    extent: vk::Extent2D,
    script: VecDeque<vk::Extent2D>,
    resized: bool,
    wait_count: usize,
    close_requested: bool,
}

impl MockWindow {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            extent: vk::Extent2D { width, height },
            script: VecDeque::new(),
            resized: false,
            wait_count: 0,
            close_requested: false,
        }
    }

    /// Queues extents to apply on successive event waits.
    pub fn script_extents(&mut self, extents: impl IntoIterator<Item = (u32, u32)>) {
        self.script.extend(
            extents
                .into_iter()
                .map(|(width, height)| vk::Extent2D { width, height }),
        );
    }

    /// Simulates a resize event.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.extent = vk::Extent2D { width, height };
        self.resized = true;
    }

    pub fn request_close(&mut self) {
        self.close_requested = true;
    }

    pub fn wait_count(&self) -> usize {
        self.wait_count
    }
}

impl PresentationWindow for MockWindow {
    fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    fn was_resized(&self) -> bool {
        self.resized
    }

    fn reset_resized_flag(&mut self) {
        self.resized = false;
    }

    fn wait_events(&mut self) {
        self.wait_count += 1;
        if let Some(next) = self.script.pop_front() {
            self.extent = next;
        }
    }

    fn close_requested(&self) -> bool {
        self.close_requested
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_applies_on_wait() {
        let mut window = MockWindow::new(0, 0);
        window.script_extents([(0, 0), (800, 600)]);

        window.wait_events();
        assert_eq!(window.extent().width, 0);
        window.wait_events();
        assert_eq!(
            window.extent(),
            vk::Extent2D {
                width: 800,
                height: 600
            }
        );
        window.wait_events();
        assert_eq!(window.extent().width, 800);
        assert_eq!(window.wait_count(), 3);
    }

    #[test]
    fn test_resize_sets_flag() {
        let mut window = MockWindow::new(640, 480);
        assert!(!window.was_resized());

        window.resize(1024, 768);
        assert!(window.was_resized());
        window.reset_resized_flag();
        assert!(!window.was_resized());
    }
}
