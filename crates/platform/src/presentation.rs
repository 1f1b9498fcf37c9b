use ash::vk;

/// What the frame loop needs from the window it presents to.
pub trait PresentationWindow {
    /// Current drawable size in pixels. Zero while minimized.
    fn extent(&self) -> vk::Extent2D;

    /// True if the window was resized since the flag was last reset.
    fn was_resized(&self) -> bool;

    fn reset_resized_flag(&mut self);

    /// Blocks until at least one window event has been processed.
    fn wait_events(&mut self);

    /// True once the user asked to close the window.
    fn close_requested(&self) -> bool {
        false
    }
}
