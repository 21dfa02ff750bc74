/// Input button identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    ToggleTheme,
    ToggleExplore,
    PageUp,
    PageDown,
    Home,
    End,
    Quit,
    MouseLeft,
}

/// Controller - pointer and button state as seen by the render loop
pub trait Controller {
    /// Check if button is currently down
    fn is_down(&self, button: Button) -> bool;

    /// Get all currently pressed buttons
    fn get_down_keys(&self) -> &[Button];

    /// Pointer movement since the last frame, in physical pixels
    fn pointer_delta(&self) -> (f32, f32);

    /// Wheel lines since the last frame that were not consumed by page scrolling
    fn zoom_delta(&self) -> f32;
}

/// Controller with nothing pressed
#[derive(Debug, Clone, Copy, Default)]
pub struct IdleController;

impl Controller for IdleController {
    fn is_down(&self, _button: Button) -> bool {
        false
    }

    fn get_down_keys(&self) -> &[Button] {
        &[]
    }

    fn pointer_delta(&self) -> (f32, f32) {
        (0.0, 0.0)
    }

    fn zoom_delta(&self) -> f32 {
        0.0
    }
}
