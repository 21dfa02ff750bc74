//! Normalization of the three external signals (scroll, theme, mode) plus
//! the viewport into explicit change events.

use super::scene_state::{Mode, Theme};

/// Drawable size in physical pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Raw external inputs as observed at one instant
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExternalSignals {
    pub dark: bool,
    pub explore: bool,
    pub scroll_offset: f32,
    pub viewport: Viewport,
    /// Page height in the same units as `scroll_offset`
    pub document_height: f32,
    /// Visible page height in the same units as `scroll_offset`
    pub page_viewport_height: f32,
    /// Top offset of the downstream anchor section, if the page has one
    pub anchor_offset: Option<f32>,
}

impl ExternalSignals {
    pub fn theme(&self) -> Theme {
        Theme::from_dark_flag(self.dark)
    }

    pub fn mode(&self) -> Mode {
        Mode::from_explore_flag(self.explore)
    }

    pub fn progress(&self) -> f32 {
        scroll_progress(
            self.scroll_offset,
            self.anchor_offset,
            self.document_height,
            self.page_viewport_height,
        )
    }
}

/// Scroll progress in [0, 1]: 0 at the top, 1 once the anchor's top is reached.
/// Without an anchor, progress runs over the whole scrollable document.
pub fn scroll_progress(
    scroll_offset: f32,
    anchor_offset: Option<f32>,
    document_height: f32,
    viewport_height: f32,
) -> f32 {
    let span = match anchor_offset {
        Some(anchor) => anchor,
        None => document_height - viewport_height,
    };
    if span <= 0.0 {
        // Anchor at the very top: already reached. No scrollable range: stay at the top.
        return if anchor_offset.is_some() { 1.0 } else { 0.0 };
    }
    (scroll_offset / span).clamp(0.0, 1.0)
}

/// Surface opacity target for a scroll progress
pub fn fade_target(progress: f32) -> f32 {
    if progress >= 1.0 {
        0.0
    } else {
        1.0
    }
}

/// One observed change in the external signals
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SignalChange {
    Theme(Theme),
    Mode(Mode),
    ScrollProgress(f32),
    Viewport(Viewport),
}

/// Compares each observation against the previous one and reports what changed
#[derive(Debug, Clone)]
pub struct InputAdapter {
    theme: Theme,
    mode: Mode,
    progress: f32,
    viewport: Viewport,
}

impl InputAdapter {
    /// Adapter primed with the first-mount values; they produce no change events
    pub fn new(initial: &ExternalSignals) -> Self {
        Self {
            theme: initial.theme(),
            mode: initial.mode(),
            progress: initial.progress(),
            viewport: initial.viewport,
        }
    }

    pub fn observe(&mut self, signals: &ExternalSignals) -> Vec<SignalChange> {
        let mut changes = Vec::new();

        let theme = signals.theme();
        if theme != self.theme {
            self.theme = theme;
            changes.push(SignalChange::Theme(theme));
        }

        let mode = signals.mode();
        if mode != self.mode {
            self.mode = mode;
            changes.push(SignalChange::Mode(mode));
        }

        // Scroll is ignored entirely while the user owns the camera
        if self.mode == Mode::TextPresentation {
            let progress = signals.progress();
            if progress != self.progress {
                self.progress = progress;
                changes.push(SignalChange::ScrollProgress(progress));
            }
        }

        if signals.viewport != self.viewport {
            self.viewport = signals.viewport;
            changes.push(SignalChange::Viewport(signals.viewport));
        }

        changes
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }
}

/// Simulated page scroll position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageScroll {
    offset: f32,
    document_height: f32,
    viewport_height: f32,
}

impl PageScroll {
    pub fn new(document_height: f32, viewport_height: f32) -> Self {
        Self {
            offset: 0.0,
            document_height,
            viewport_height,
        }
    }

    pub fn offset(&self) -> f32 {
        self.offset
    }

    pub fn document_height(&self) -> f32 {
        self.document_height
    }

    pub fn viewport_height(&self) -> f32 {
        self.viewport_height
    }

    pub fn max_offset(&self) -> f32 {
        (self.document_height - self.viewport_height).max(0.0)
    }

    pub fn scroll_by(&mut self, delta: f32) {
        self.offset = (self.offset + delta).clamp(0.0, self.max_offset());
    }

    pub fn scroll_to(&mut self, offset: f32) {
        self.offset = offset.clamp(0.0, self.max_offset());
    }

    pub fn page_down(&mut self) {
        self.scroll_by(self.viewport_height * 0.9);
    }

    pub fn page_up(&mut self) {
        self.scroll_by(-self.viewport_height * 0.9);
    }

    pub fn set_viewport_height(&mut self, height: f32) {
        self.viewport_height = height;
        self.scroll_to(self.offset);
    }
}
