//! Session lifecycle for the backdrop.
//!
//! Everything a session owns (frame driver, texture loader, rendering surface,
//! input listeners) is created in [`Session::activate`] and released in
//! [`Session::deactivate`]. Deactivation runs on every exit path: explicit
//! teardown, a failed activation, and drop. Calling it again, or before
//! anything was created, does nothing.

use anyhow::{Context, Result};
use winit::event::WindowEvent;

use crate::config::{BackdropConfig, PageConfig};
use crate::core::clock::Clock;
use crate::core::controller::{Button, Controller};
use crate::core::loader::{texture_requests, LoadedTextures, ResourceLoader, TextureSource};
use crate::core::render_loop::{FrameDriver, FrameSink};
use crate::core::signals::{ExternalSignals, PageScroll, Viewport};
use crate::render::overlay::HudStatus;
use crate::render::Renderer;

/// A drawable the session renders into and disposes of
pub trait BackdropSurface: FrameSink {
    /// Hand over the loaded textures. Called at most once per session.
    fn apply_textures(&mut self, loaded: LoadedTextures);

    fn set_hud(&mut self, _status: HudStatus) {}

    /// Returns true when the surface consumed the event
    fn handle_window_event(&mut self, _event: &WindowEvent) -> bool {
        false
    }

    /// Toggles requested through the surface's own UI
    fn take_actions(&mut self) -> Vec<Button> {
        Vec::new()
    }

    /// Release every GPU resource held by the surface
    fn release(self: Box<Self>);
}

impl BackdropSurface for Renderer {
    fn apply_textures(&mut self, loaded: LoadedTextures) {
        Renderer::apply_textures(self, loaded);
    }

    fn set_hud(&mut self, status: HudStatus) {
        Renderer::set_hud(self, status);
    }

    fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        Renderer::handle_window_event(self, event)
    }

    fn take_actions(&mut self) -> Vec<Button> {
        self.take_overlay_actions()
    }

    fn release(self: Box<Self>) {
        self.destroy();
    }
}

/// Input routes a session subscribes to while active
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listener {
    Scroll,
    Resize,
}

struct Active {
    driver: FrameDriver,
    loader: ResourceLoader,
    surface: Box<dyn BackdropSurface>,
}

pub struct Session {
    config: BackdropConfig,
    clock: Clock,
    page: PageScroll,
    signals: ExternalSignals,
    active: Option<Active>,
    listeners: Vec<Listener>,
    running: bool,
}

impl Session {
    pub fn new(config: BackdropConfig) -> Self {
        let signals = Self::initial_signals(&config.page, Viewport::new(0, 0), false, false);
        Self {
            page: PageScroll::new(signals.document_height, signals.page_viewport_height),
            config,
            clock: Clock::new(),
            signals,
            active: None,
            listeners: Vec::new(),
            running: false,
        }
    }

    /// Signals for a page scrolled to the top
    pub fn initial_signals(
        page: &PageConfig,
        viewport: Viewport,
        dark: bool,
        explore: bool,
    ) -> ExternalSignals {
        ExternalSignals {
            dark,
            explore,
            scroll_offset: 0.0,
            viewport,
            document_height: page.document_height,
            page_viewport_height: viewport.height as f32,
            anchor_offset: page.anchor_offset,
        }
    }

    /// Build the frame driver and the surface, start texture loading, subscribe
    /// to input and start the render loop. A failed setup is torn down before
    /// the error is returned.
    pub fn activate<F>(
        &mut self,
        initial: ExternalSignals,
        source: &dyn TextureSource,
        make_surface: F,
    ) -> Result<()>
    where
        F: FnOnce(Viewport) -> Result<Box<dyn BackdropSurface>>,
    {
        if self.active.is_some() {
            log::warn!("session already active");
            return Ok(());
        }

        self.signals = initial;
        self.page = PageScroll::new(initial.document_height, initial.page_viewport_height);
        self.page.scroll_to(initial.scroll_offset);

        let driver = FrameDriver::new(self.config.clone(), &initial);
        let surface = match make_surface(initial.viewport).context("failed to create rendering surface")
        {
            Ok(surface) => surface,
            Err(err) => {
                self.deactivate();
                return Err(err);
            }
        };
        let loader = ResourceLoader::start(source, texture_requests(&self.config.textures));

        self.active = Some(Active {
            driver,
            loader,
            surface,
        });
        self.listeners = vec![Listener::Scroll, Listener::Resize];
        self.running = true;
        log::info!(
            "backdrop activated at {}x{}",
            initial.viewport.width,
            initial.viewport.height
        );
        Ok(())
    }

    /// Stop the render loop, drop every listener, cancel loading and release
    /// the surface.
    pub fn deactivate(&mut self) {
        self.running = false;
        self.listeners.clear();
        if let Some(mut active) = self.active.take() {
            active.loader.cancel();
            active.surface.release();
            log::info!("backdrop deactivated");
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_listening(&self, listener: Listener) -> bool {
        self.listeners.contains(&listener)
    }

    pub fn listeners(&self) -> &[Listener] {
        &self.listeners
    }

    pub fn signals(&self) -> &ExternalSignals {
        &self.signals
    }

    pub fn driver(&self) -> Option<&FrameDriver> {
        self.active.as_ref().map(|active| &active.driver)
    }

    /// Whether clicks should pass through the surface
    pub fn is_input_transparent(&self) -> bool {
        self.driver()
            .is_some_and(FrameDriver::is_input_transparent)
    }

    pub fn toggle_theme(&mut self) {
        self.signals.dark = !self.signals.dark;
        self.push_signals();
    }

    pub fn toggle_explore(&mut self) {
        self.signals.explore = !self.signals.explore;
        self.push_signals();
    }

    /// Scroll the page by wheel lines, positive toward the top. Returns false
    /// when scrolling is not being listened to, which includes explore mode
    /// where the wheel drives the orbit zoom instead.
    pub fn scroll_lines(&mut self, lines: f32) -> bool {
        if !self.accepts_scroll() {
            return false;
        }
        self.page.scroll_by(-lines * self.config.page.line_height);
        self.sync_scroll();
        true
    }

    /// Page navigation keys. Returns false for other buttons or when scroll is ignored.
    pub fn page_key(&mut self, button: Button) -> bool {
        if !self.accepts_scroll() {
            return false;
        }
        match button {
            Button::PageDown => self.page.page_down(),
            Button::PageUp => self.page.page_up(),
            Button::Home => self.page.scroll_to(0.0),
            Button::End => self.page.scroll_to(self.page.max_offset()),
            _ => return false,
        }
        self.sync_scroll();
        true
    }

    pub fn resize(&mut self, viewport: Viewport) {
        if !self.is_listening(Listener::Resize) {
            return;
        }
        self.page.set_viewport_height(viewport.height as f32);
        self.signals.viewport = viewport;
        self.signals.page_viewport_height = viewport.height as f32;
        self.signals.scroll_offset = self.page.offset();
        self.push_signals();
    }

    /// Route a window event to the surface's UI first
    pub fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        self.active
            .as_mut()
            .is_some_and(|active| active.surface.handle_window_event(event))
    }

    pub fn take_surface_actions(&mut self) -> Vec<Button> {
        self.active
            .as_mut()
            .map(|active| active.surface.take_actions())
            .unwrap_or_default()
    }

    /// One render loop iteration at the session clock's current time
    pub fn frame(&mut self, input: &dyn Controller) -> Result<()> {
        let now = self.clock.elapsed();
        self.frame_at(now, input)
    }

    /// One render loop iteration at `now` seconds. Does nothing unless the
    /// loop is running.
    pub fn frame_at(&mut self, now: f32, input: &dyn Controller) -> Result<()> {
        if !self.running {
            return Ok(());
        }
        let Some(active) = &mut self.active else {
            return Ok(());
        };

        if let Some(loaded) = active.loader.poll() {
            active.surface.apply_textures(loaded);
            active.driver.mark_textures_ready();
        }
        active.surface.set_hud(HudStatus {
            fps: active.driver.fps(),
            dark: self.signals.dark,
            explore: self.signals.explore,
        });

        let sink: &mut dyn FrameSink = active.surface.as_mut();
        active
            .driver
            .tick(now, input, Some(sink))
            .context("frame submission failed")
    }

    fn accepts_scroll(&self) -> bool {
        self.is_listening(Listener::Scroll) && !self.signals.explore
    }

    fn sync_scroll(&mut self) {
        self.signals.scroll_offset = self.page.offset();
        self.push_signals();
    }

    fn push_signals(&mut self) {
        let now = self.clock.elapsed();
        if let Some(active) = &mut self.active {
            let sink: &mut dyn FrameSink = active.surface.as_mut();
            active.driver.observe(&self.signals, now, Some(sink));
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.deactivate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loader::{DecodedImage, LoadError};
    use crate::core::render_loop::FrameParams;
    use crate::render::RenderError;
    use futures::future::{self, FutureExt, LocalBoxFuture};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Default)]
    struct Calls {
        frames: usize,
        textures: usize,
        released: usize,
    }

    struct MockSurface(Rc<RefCell<Calls>>);

    impl FrameSink for MockSurface {
        fn submit(&mut self, _frame: &FrameParams) -> Result<(), RenderError> {
            self.0.borrow_mut().frames += 1;
            Ok(())
        }

        fn resize(&mut self, _viewport: Viewport) {}
    }

    impl BackdropSurface for MockSurface {
        fn apply_textures(&mut self, _loaded: LoadedTextures) {
            self.0.borrow_mut().textures += 1;
        }

        fn release(self: Box<Self>) {
            self.0.borrow_mut().released += 1;
        }
    }

    struct ReadySource;

    impl TextureSource for ReadySource {
        fn fetch(&self, _url: &str) -> LocalBoxFuture<'static, Result<DecodedImage, LoadError>> {
            future::ready(Ok(DecodedImage::solid([9, 9, 9, 255]))).boxed_local()
        }
    }

    fn activated(calls: &Rc<RefCell<Calls>>) -> Session {
        let config = BackdropConfig::default();
        let initial = Session::initial_signals(&config.page, Viewport::new(1280, 720), false, false);
        let mut session = Session::new(config);
        let surface_calls = Rc::clone(calls);
        session
            .activate(initial, &ReadySource, move |_| {
                Ok(Box::new(MockSurface(surface_calls)) as Box<dyn BackdropSurface>)
            })
            .unwrap();
        session
    }

    #[test]
    fn test_textures_applied_once() {
        let calls = Rc::new(RefCell::new(Calls::default()));
        let mut session = activated(&calls);
        for i in 0..3 {
            session.frame_at(i as f32 * 0.016, &crate::core::controller::IdleController).unwrap();
        }
        assert_eq!(calls.borrow().textures, 1);
        assert_eq!(calls.borrow().frames, 3);
        assert!(session.driver().is_some_and(FrameDriver::textures_ready));
    }

    #[test]
    fn test_scroll_ignored_while_exploring() {
        let calls = Rc::new(RefCell::new(Calls::default()));
        let mut session = activated(&calls);

        assert!(session.scroll_lines(-2.0));
        assert_eq!(session.signals().scroll_offset, 96.0);

        session.toggle_explore();
        assert!(!session.scroll_lines(-2.0));
        assert!(!session.page_key(Button::End));
        assert_eq!(session.signals().scroll_offset, 96.0);
    }

    #[test]
    fn test_end_key_reaches_bottom() {
        let calls = Rc::new(RefCell::new(Calls::default()));
        let mut session = activated(&calls);
        assert!(session.page_key(Button::End));
        assert_eq!(session.signals().scroll_offset, 6000.0 - 720.0);
        assert!(session.is_input_transparent());
        assert!(!session.page_key(Button::ToggleTheme));
    }

    #[test]
    fn test_drop_releases_surface() {
        let calls = Rc::new(RefCell::new(Calls::default()));
        drop(activated(&calls));
        assert_eq!(calls.borrow().released, 1);
    }
}
