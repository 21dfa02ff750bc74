use std::sync::Arc;
use winit::event::WindowEvent;
use winit::window::Window;

use super::bloom::{mip_chain_extents, BloomComposer};
use super::gpu::GpuContext;
use super::overlay::{HudStatus, Overlay};
use super::scene::SceneResources;
use super::{RenderError, DEPTH_FORMAT};
use crate::config::SceneConfig;
use crate::core::controller::Button;
use crate::core::loader::LoadedTextures;
use crate::core::render_loop::{FrameParams, FrameSink};
use crate::core::signals::Viewport;

struct DepthTarget {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl DepthTarget {
    fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("scene-depth"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }
}

/// Drawable sizes derived from one viewport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetExtents {
    pub surface: (u32, u32),
    pub post: (u32, u32),
    pub bloom: Vec<(u32, u32)>,
}

/// Sizes the swapchain, depth/post target and bloom chain take for `viewport`.
/// `None` for a minimized window, which keeps the current targets.
pub fn target_extents(viewport: Viewport) -> Option<TargetExtents> {
    if viewport.is_empty() {
        return None;
    }
    let size = (viewport.width, viewport.height);
    Some(TargetExtents {
        surface: size,
        post: size,
        bloom: mip_chain_extents(viewport.width, viewport.height),
    })
}

/// Window surface renderer: scene pass into an HDR target, bloom, composite
/// with the surface opacity, then the optional HUD.
pub struct Renderer {
    gpu: GpuContext,
    surface_config: wgpu::SurfaceConfiguration,
    depth: DepthTarget,
    scene: SceneResources,
    bloom: BloomComposer,
    overlay: Option<Overlay>,
}

impl Renderer {
    pub fn new(
        gpu: GpuContext,
        window: Arc<Window>,
        viewport: Viewport,
        scene_config: &SceneConfig,
        with_overlay: bool,
    ) -> Result<Self, RenderError> {
        let surface_config = gpu.surface_config(viewport.width, viewport.height)?;
        gpu.surface().configure(gpu.device(), &surface_config);

        let (width, height) = (surface_config.width, surface_config.height);
        let depth = DepthTarget::new(gpu.device(), width, height);
        let scene = SceneResources::new(gpu.device(), gpu.queue(), scene_config);
        let bloom = BloomComposer::new(gpu.device(), surface_config.format, width, height);
        let overlay = with_overlay
            .then(|| Overlay::new(window, gpu.device(), surface_config.format));

        log::info!(
            "renderer ready: {}x{} {:?}",
            width,
            height,
            surface_config.format
        );

        Ok(Self {
            gpu,
            surface_config,
            depth,
            scene,
            bloom,
            overlay,
        })
    }

    /// Bind loaded textures to the planet and cloud materials
    pub fn apply_textures(&mut self, loaded: LoadedTextures) {
        self.scene
            .apply_textures(self.gpu.device(), self.gpu.queue(), loaded);
    }

    pub fn set_hud(&mut self, status: HudStatus) {
        if let Some(overlay) = &mut self.overlay {
            overlay.set_status(status);
        }
    }

    /// Returns true when the HUD consumed the event
    pub fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        self.overlay
            .as_mut()
            .is_some_and(|overlay| overlay.handle_event(event))
    }

    /// Toggles clicked on the HUD since the last call
    pub fn take_overlay_actions(&mut self) -> Vec<Button> {
        self.overlay
            .as_mut()
            .map(Overlay::take_actions)
            .unwrap_or_default()
    }

    pub fn surface_extent(&self) -> (u32, u32) {
        (self.surface_config.width, self.surface_config.height)
    }

    pub fn post_extent(&self) -> (u32, u32) {
        self.bloom.extent()
    }

    /// Release every GPU resource now
    pub fn destroy(self) {
        self.scene.destroy();
        self.bloom.destroy();
        self.depth.texture.destroy();
        log::info!("renderer released");
    }

    fn reconfigure(&self) {
        self.gpu
            .surface()
            .configure(self.gpu.device(), &self.surface_config);
    }
}

impl FrameSink for Renderer {
    fn submit(&mut self, frame: &FrameParams) -> Result<(), RenderError> {
        let output = match self.gpu.surface().get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::debug!("surface lost or outdated, reconfiguring");
                self.reconfigure();
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("surface timeout, skipping frame");
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let device = self.gpu.device();
        let queue = self.gpu.queue();
        self.scene.update(queue, frame);
        self.bloom.update(queue, frame.bloom, frame.surface_opacity);

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("frame-encoder"),
        });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("scene-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: self.bloom.hdr_view(),
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Discard,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            self.scene.draw(&mut pass);
        }

        self.bloom.execute(&mut encoder, &view);

        if let Some(overlay) = &mut self.overlay {
            let size = [self.surface_config.width, self.surface_config.height];
            overlay.render(device, queue, &mut encoder, &view, size);
        }

        queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    fn resize(&mut self, viewport: Viewport) {
        let Some(extents) = target_extents(viewport) else {
            return;
        };
        (self.surface_config.width, self.surface_config.height) = extents.surface;
        self.reconfigure();

        let device = self.gpu.device();
        let (width, height) = extents.post;
        self.depth.texture.destroy();
        self.depth = DepthTarget::new(device, width, height);
        self.bloom.resize(device, width, height);
        if self.surface_extent() != extents.surface
            || self.post_extent() != extents.post
            || self.bloom.mip_extents() != extents.bloom
        {
            log::warn!("targets out of step with viewport: {:?}", extents);
        }
        log::debug!("targets resized: {:?}", extents);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimized_window_keeps_targets() {
        assert_eq!(target_extents(Viewport::new(0, 0)), None);
        assert_eq!(target_extents(Viewport::new(800, 0)), None);
    }

    #[test]
    fn test_extents_track_viewport() {
        let extents = target_extents(Viewport::new(1920, 1080)).unwrap();
        assert_eq!(extents.surface, (1920, 1080));
        assert_eq!(extents.post, (1920, 1080));
        assert_eq!(extents.bloom.len(), crate::render::bloom::MIP_LEVELS);
    }
}
