//! egui HUD drawn over the composited frame: frame rate plus the theme and
//! explore toggles.

use std::sync::Arc;
use winit::event::WindowEvent;
use winit::window::Window;

use crate::core::controller::Button;

/// What the HUD shows
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HudStatus {
    pub fps: f32,
    pub dark: bool,
    pub explore: bool,
}

impl HudStatus {
    /// Label of the theme button, naming the theme it switches to
    pub fn theme_label(&self) -> &'static str {
        if self.dark {
            "Light"
        } else {
            "Dark"
        }
    }

    /// Label of the mode button, naming the mode it switches to
    pub fn mode_label(&self) -> &'static str {
        if self.explore {
            "Text"
        } else {
            "Explore"
        }
    }
}

pub struct Overlay {
    window: Arc<Window>,
    ctx: egui::Context,
    state: egui_winit::State,
    renderer: egui_wgpu::Renderer,
    status: HudStatus,
    actions: Vec<Button>,
}

impl Overlay {
    pub fn new(window: Arc<Window>, device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        let ctx = egui::Context::default();
        let state = egui_winit::State::new(
            ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );
        let renderer = egui_wgpu::Renderer::new(device, format, egui_wgpu::RendererOptions::default());

        Self {
            window,
            ctx,
            state,
            renderer,
            status: HudStatus::default(),
            actions: Vec::new(),
        }
    }

    pub fn set_status(&mut self, status: HudStatus) {
        self.status = status;
    }

    /// Returns true when egui consumed the event
    pub fn handle_event(&mut self, event: &WindowEvent) -> bool {
        self.state.on_window_event(&self.window, event).consumed
    }

    /// Toggles clicked since the last call
    pub fn take_actions(&mut self) -> Vec<Button> {
        std::mem::take(&mut self.actions)
    }

    /// Draw the HUD on top of `view`, loading what is already there
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
        size_in_pixels: [u32; 2],
    ) {
        let status = self.status;
        let mut clicked = Vec::new();
        let raw_input = self.state.take_egui_input(&self.window);
        let full_output = self.ctx.run(raw_input, |ctx| {
            egui::Window::new("hud")
                .title_bar(false)
                .resizable(false)
                .anchor(egui::Align2::RIGHT_TOP, [-12.0, 12.0])
                .frame(egui::Frame::NONE)
                .show(ctx, |ui| {
                    ui.horizontal(|ui| {
                        ui.label(
                            egui::RichText::new(format!("{:.0} fps", status.fps))
                                .size(12.0)
                                .color(egui::Color32::GRAY),
                        );
                        if ui.button(status.mode_label()).clicked() {
                            clicked.push(Button::ToggleExplore);
                        }
                        if ui.button(status.theme_label()).clicked() {
                            clicked.push(Button::ToggleTheme);
                        }
                    });
                });
        });
        self.actions.extend(clicked);

        self.state
            .handle_platform_output(&self.window, full_output.platform_output);

        let tris = self
            .ctx
            .tessellate(full_output.shapes, self.ctx.pixels_per_point());
        for (id, image_delta) in &full_output.textures_delta.set {
            self.renderer.update_texture(device, queue, *id, image_delta);
        }

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels,
            pixels_per_point: self.window.scale_factor() as f32,
        };
        self.renderer
            .update_buffers(device, queue, encoder, &tris, &screen_descriptor);

        {
            let mut pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("overlay-pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                        depth_slice: None,
                    })],
                    depth_stencil_attachment: None,
                    occlusion_query_set: None,
                    timestamp_writes: None,
                })
                .forget_lifetime();
            self.renderer.render(&mut pass, &tris, &screen_descriptor);
        }

        for id in &full_output.textures_delta.free {
            self.renderer.free_texture(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_name_the_other_state() {
        let status = HudStatus::default();
        assert_eq!(status.theme_label(), "Dark");
        assert_eq!(status.mode_label(), "Explore");

        let status = HudStatus {
            fps: 60.0,
            dark: true,
            explore: true,
        };
        assert_eq!(status.theme_label(), "Light");
        assert_eq!(status.mode_label(), "Text");
    }
}
