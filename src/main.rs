use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Window, WindowId},
};

use planet_backdrop::cli::Cli;
use planet_backdrop::config::BackdropConfig;
use planet_backdrop::core::input_adapter::WinitController;
use planet_backdrop::core::loader::FileTextureSource;
use planet_backdrop::core::{Button, Viewport};
use planet_backdrop::lifecycle::{BackdropSurface, Session};
use planet_backdrop::render::gpu::GpuContext;
use planet_backdrop::render::Renderer;

// === Constants ===

const DEFAULT_LOG_FILTER: &str = "info,wgpu_core=warn,wgpu_hal=warn,naga=warn";
const WINDOW_TITLE: &str = "Planet Backdrop";

// === Application ===

struct App {
    cli: Cli,
    config: BackdropConfig,
    window: Option<Arc<Window>>,
    session: Session,
    input: WinitController,
    hittest: bool,
}

impl App {
    fn new(cli: Cli, config: BackdropConfig) -> Self {
        Self {
            session: Session::new(config.clone()),
            cli,
            config,
            window: None,
            input: WinitController::new(),
            hittest: true,
        }
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window = event_loop
            .create_window(
                Window::default_attributes()
                    .with_title(WINDOW_TITLE)
                    .with_transparent(true)
                    .with_inner_size(PhysicalSize::new(self.cli.width, self.cli.height)),
            )
            .context("failed to create window")?;
        let window = Arc::new(window);

        let size = window.inner_size();
        let initial = Session::initial_signals(
            &self.config.page,
            Viewport::new(size.width, size.height),
            self.cli.dark,
            self.cli.explore,
        );
        let scene = self.config.scene.clone();
        let with_overlay = !self.cli.no_ui;
        let surface_window = Arc::clone(&window);
        self.session
            .activate(initial, &FileTextureSource, move |viewport| {
                let gpu = pollster::block_on(GpuContext::new(Arc::clone(&surface_window)))?;
                let renderer = Renderer::new(gpu, surface_window, viewport, &scene, with_overlay)?;
                Ok(Box::new(renderer) as Box<dyn BackdropSurface>)
            })?;

        log::info!("controls: T theme, E explore, wheel/PageUp/PageDown/Home/End scroll, Escape quit");
        self.window = Some(window);
        Ok(())
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        self.session.deactivate();
        self.window = None;
        event_loop.exit();
    }

    fn handle_button(&mut self, button: Button, event_loop: &ActiveEventLoop) {
        match button {
            Button::ToggleTheme => self.session.toggle_theme(),
            Button::ToggleExplore => self.session.toggle_explore(),
            Button::Quit => self.shutdown(event_loop),
            other => {
                self.session.page_key(other);
            }
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let mut buttons = self.input.drain_presses();
        buttons.extend(self.session.take_surface_actions());
        for button in buttons {
            self.handle_button(button, event_loop);
        }
        if !self.session.is_running() {
            return;
        }

        // Outside explore mode the wheel scrolls the page instead of zooming
        let lines = self.input.wheel_lines();
        if lines != 0.0 && self.session.scroll_lines(lines) {
            self.input.consume_wheel();
        }

        if let Err(err) = self.session.frame(&self.input) {
            log::error!("{:#}", err);
            self.shutdown(event_loop);
            return;
        }
        self.input.reset_deltas();
        self.update_hittest();
    }

    /// Let clicks through once the surface has faded out
    fn update_hittest(&mut self) {
        let hittest = !self.session.is_input_transparent();
        if hittest == self.hittest {
            return;
        }
        if let Some(window) = &self.window {
            if let Err(err) = window.set_cursor_hittest(hittest) {
                log::warn!("cursor hittest unsupported: {}", err);
            }
        }
        log::debug!("surface input {}", if hittest { "enabled" } else { "disabled" });
        self.hittest = hittest;
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(err) = self.start(event_loop) {
                log::error!("failed to start backdrop: {:#}", err);
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        // Let the HUD handle the event first
        if self.session.handle_window_event(&event) {
            return;
        }
        self.input.process_event(&event);

        match event {
            WindowEvent::CloseRequested => self.shutdown(event_loop),
            WindowEvent::Resized(size) => {
                self.session.resize(Viewport::new(size.width, size.height));
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if !self.session.is_running() {
            return;
        }
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn init_logging(level: Option<&str>) {
    match level {
        Some(filter) => env_logger::Builder::new().parse_filters(filter).init(),
        None => env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or(DEFAULT_LOG_FILTER),
        )
        .init(),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    let config = cli
        .resolve_config()
        .context("failed to load configuration")?;

    let event_loop = EventLoop::new()?;
    let mut app = App::new(cli, config);
    event_loop.run_app(&mut app)?;

    Ok(())
}
