//! Bloom post-process: bright-pass extraction into a half-resolution mip
//! chain, progressive downsample, additive upsample back to the top level,
//! then a composite onto the swapchain with the scene.
//!
//! Threshold, strength and radius change every frame while a theme
//! transition runs, so they live in small uniform buffers rewritten per frame.

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use super::HDR_FORMAT;
use crate::core::scene_state::Bloom;

/// Blur levels below the full-resolution scene
pub const MIP_LEVELS: usize = 5;

/// Base contribution per level before the radius is applied
const LEVEL_FACTORS: [f32; MIP_LEVELS] = [1.0, 0.8, 0.6, 0.4, 0.2];

/// Uniform for the extract/downsample/upsample passes
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct BloomParams {
    pub threshold: f32,
    pub strength: f32,
    pub radius: f32,
    pub weight: f32,
}

/// Uniform for the final composite
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct CompositeParams {
    pub strength: f32,
    pub opacity: f32,
    pub base_weight: f32,
    pub pad: f32,
}

/// Per-level weights. Radius 0 favours the sharp levels, radius 1 the wide ones.
pub fn level_weights(radius: f32) -> [f32; MIP_LEVELS] {
    let radius = radius.clamp(0.0, 1.0);
    LEVEL_FACTORS.map(|factor| factor + (1.2 - factor - factor) * radius)
}

/// Sizes of the blur levels for a drawable size, each half the previous
pub fn mip_chain_extents(width: u32, height: u32) -> Vec<(u32, u32)> {
    let mut extents = Vec::with_capacity(MIP_LEVELS);
    let mut w = (width / 2).max(1);
    let mut h = (height / 2).max(1);
    for _ in 0..MIP_LEVELS {
        extents.push((w, h));
        w = (w / 2).max(1);
        h = (h / 2).max(1);
    }
    extents
}

struct RenderTarget {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    bind_group: wgpu::BindGroup,
}

pub struct BloomComposer {
    texture_bgl: wgpu::BindGroupLayout,
    extract_pipeline: wgpu::RenderPipeline,
    downsample_pipeline: wgpu::RenderPipeline,
    upsample_pipeline: wgpu::RenderPipeline,
    composite_pipeline: wgpu::RenderPipeline,
    sampler: wgpu::Sampler,
    level_buffers: Vec<wgpu::Buffer>,
    level_bind_groups: Vec<wgpu::BindGroup>,
    composite_buffer: wgpu::Buffer,
    composite_bind_group: wgpu::BindGroup,
    // Scene renders here
    hdr: RenderTarget,
    mips: Vec<RenderTarget>,
    extent: (u32, u32),
}

impl BloomComposer {
    pub fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> Self {
        let bloom_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("bloom-shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/bloom.wgsl").into()),
        });
        let composite_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("composite-shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/composite.wgsl").into()),
        });

        let params_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("bloom-params-bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: std::num::NonZeroU64::new(16),
                },
                count: None,
            }],
        });

        let texture_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("bloom-texture-bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let blur_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("bloom-blur-layout"),
            bind_group_layouts: &[&params_bgl, &texture_bgl],
            push_constant_ranges: &[],
        });
        let composite_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("bloom-composite-layout"),
            bind_group_layouts: &[&params_bgl, &texture_bgl, &texture_bgl],
            push_constant_ranges: &[],
        });

        let additive = wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent::OVER,
        };

        let extract_pipeline = create_fullscreen_pipeline(
            device,
            &bloom_shader,
            &blur_layout,
            "fs_extract",
            HDR_FORMAT,
            None,
            "bloom-extract",
        );
        let downsample_pipeline = create_fullscreen_pipeline(
            device,
            &bloom_shader,
            &blur_layout,
            "fs_downsample",
            HDR_FORMAT,
            None,
            "bloom-downsample",
        );
        let upsample_pipeline = create_fullscreen_pipeline(
            device,
            &bloom_shader,
            &blur_layout,
            "fs_upsample",
            HDR_FORMAT,
            Some(additive),
            "bloom-upsample",
        );
        let composite_pipeline = create_fullscreen_pipeline(
            device,
            &composite_shader,
            &composite_layout,
            "fs_composite",
            surface_format,
            Some(wgpu::BlendState::REPLACE),
            "bloom-composite",
        );

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("bloom-sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let mut level_buffers = Vec::with_capacity(MIP_LEVELS);
        let mut level_bind_groups = Vec::with_capacity(MIP_LEVELS);
        for _ in 0..MIP_LEVELS {
            let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("bloom-level-params"),
                contents: bytemuck::cast_slice(&[BloomParams::zeroed()]),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
            level_bind_groups.push(params_bind_group(device, &params_bgl, &buffer));
            level_buffers.push(buffer);
        }
        let composite_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("bloom-composite-params"),
            contents: bytemuck::cast_slice(&[CompositeParams::zeroed()]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let composite_bind_group = params_bind_group(device, &params_bgl, &composite_buffer);

        let (hdr, mips) = create_targets(device, &texture_bgl, &sampler, width, height);

        Self {
            texture_bgl,
            extract_pipeline,
            downsample_pipeline,
            upsample_pipeline,
            composite_pipeline,
            sampler,
            level_buffers,
            level_bind_groups,
            composite_buffer,
            composite_bind_group,
            hdr,
            mips,
            extent: (width.max(1), height.max(1)),
        }
    }

    /// The view the scene pass renders into
    pub fn hdr_view(&self) -> &wgpu::TextureView {
        &self.hdr.view
    }

    /// Size of the full-resolution post-process target
    pub fn extent(&self) -> (u32, u32) {
        self.extent
    }

    pub fn mip_extents(&self) -> Vec<(u32, u32)> {
        self.mips
            .iter()
            .map(|mip| (mip.texture.width(), mip.texture.height()))
            .collect()
    }

    /// Recreate every target for a new drawable size
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        let (hdr, mips) = create_targets(device, &self.texture_bgl, &self.sampler, width, height);
        self.destroy_targets();
        self.hdr = hdr;
        self.mips = mips;
        self.extent = (width.max(1), height.max(1));
    }

    /// Write this frame's bloom parameters and surface opacity
    pub fn update(&self, queue: &wgpu::Queue, bloom: Bloom, opacity: f32) {
        let weights = level_weights(bloom.radius);
        for (buffer, weight) in self.level_buffers.iter().zip(weights) {
            let params = BloomParams {
                threshold: bloom.threshold,
                strength: bloom.strength,
                radius: bloom.radius,
                weight,
            };
            queue.write_buffer(buffer, 0, bytemuck::cast_slice(&[params]));
        }
        let composite = CompositeParams {
            strength: bloom.strength,
            opacity: opacity.clamp(0.0, 1.0),
            base_weight: weights[0],
            pad: 0.0,
        };
        queue.write_buffer(&self.composite_buffer, 0, bytemuck::cast_slice(&[composite]));
    }

    /// Extract → downsample → upsample → composite onto `surface_view`
    pub fn execute(&self, encoder: &mut wgpu::CommandEncoder, surface_view: &wgpu::TextureView) {
        // 1. Bright pass: HDR → mip[0]
        self.run_pass(
            encoder,
            &self.extract_pipeline,
            &[&self.level_bind_groups[0], &self.hdr.bind_group],
            &self.mips[0].view,
            wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
            "bloom-extract",
        );

        // 2. Downsample: mip[i-1] → mip[i]
        for i in 1..self.mips.len() {
            self.run_pass(
                encoder,
                &self.downsample_pipeline,
                &[&self.level_bind_groups[i], &self.mips[i - 1].bind_group],
                &self.mips[i].view,
                wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                "bloom-downsample",
            );
        }

        // 3. Upsample: mip[i+1] → mip[i], additive
        for i in (0..self.mips.len() - 1).rev() {
            self.run_pass(
                encoder,
                &self.upsample_pipeline,
                &[&self.level_bind_groups[i + 1], &self.mips[i + 1].bind_group],
                &self.mips[i].view,
                wgpu::LoadOp::Load,
                "bloom-upsample",
            );
        }

        // 4. Scene + mip[0] → surface
        self.run_pass(
            encoder,
            &self.composite_pipeline,
            &[
                &self.composite_bind_group,
                &self.hdr.bind_group,
                &self.mips[0].bind_group,
            ],
            surface_view,
            wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
            "bloom-composite",
        );
    }

    /// Run a single fullscreen render pass.
    fn run_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        pipeline: &wgpu::RenderPipeline,
        bind_groups: &[&wgpu::BindGroup],
        target_view: &wgpu::TextureView,
        load_op: wgpu::LoadOp<wgpu::Color>,
        label: &str,
    ) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: load_op,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(pipeline);
        for (index, bind_group) in bind_groups.iter().enumerate() {
            pass.set_bind_group(index as u32, *bind_group, &[]);
        }
        pass.draw(0..3, 0..1);
    }

    fn destroy_targets(&self) {
        self.hdr.texture.destroy();
        for mip in &self.mips {
            mip.texture.destroy();
        }
    }

    /// Release GPU memory now instead of at drop
    pub fn destroy(&self) {
        self.destroy_targets();
        for buffer in &self.level_buffers {
            buffer.destroy();
        }
        self.composite_buffer.destroy();
    }
}

fn params_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    buffer: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("bloom-params-bg"),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: buffer.as_entire_binding(),
        }],
    })
}

/// Create a fullscreen render pipeline with the given fragment entry point.
fn create_fullscreen_pipeline(
    device: &wgpu::Device,
    shader: &wgpu::ShaderModule,
    layout: &wgpu::PipelineLayout,
    fragment_entry: &str,
    target_format: wgpu::TextureFormat,
    blend: Option<wgpu::BlendState>,
    label: &str,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_fullscreen"),
            buffers: &[],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some(fragment_entry),
            targets: &[Some(wgpu::ColorTargetState {
                format: target_format,
                blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview: None,
        cache: None,
    })
}

fn create_target(
    device: &wgpu::Device,
    texture_bgl: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    width: u32,
    height: u32,
    label: &str,
) -> RenderTarget {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: HDR_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout: texture_bgl,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    });
    RenderTarget {
        texture,
        view,
        bind_group,
    }
}

fn create_targets(
    device: &wgpu::Device,
    texture_bgl: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    width: u32,
    height: u32,
) -> (RenderTarget, Vec<RenderTarget>) {
    let hdr = create_target(device, texture_bgl, sampler, width, height, "bloom-hdr");
    let mips = mip_chain_extents(width, height)
        .into_iter()
        .enumerate()
        .map(|(i, (w, h))| {
            log::trace!("bloom mip {i}: {w}x{h}");
            create_target(device, texture_bgl, sampler, w, h, "bloom-mip")
        })
        .collect();
    (hdr, mips)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mip_chain_dimensions_halve_each_level() {
        let expected = vec![(960, 540), (480, 270), (240, 135), (120, 67), (60, 33)];
        assert_eq!(mip_chain_extents(1920, 1080), expected);
    }

    #[test]
    fn test_mip_chain_never_reaches_zero() {
        let extents = mip_chain_extents(3, 1);
        assert_eq!(extents.len(), MIP_LEVELS);
        assert!(extents.iter().all(|&(w, h)| w >= 1 && h >= 1));
    }

    #[test]
    fn test_level_weights_follow_radius() {
        assert_eq!(level_weights(0.0), LEVEL_FACTORS);
        let wide = level_weights(1.0);
        for (weight, factor) in wide.iter().zip(LEVEL_FACTORS) {
            assert!((weight - (1.2 - factor)).abs() < 1e-6);
        }
        // Larger radius shifts weight to the wider levels
        assert!(level_weights(0.6)[4] > level_weights(0.4)[4]);
    }

    #[test]
    fn test_uniform_sizes() {
        assert_eq!(std::mem::size_of::<BloomParams>(), 16);
        assert_eq!(std::mem::size_of::<CompositeParams>(), 16);
    }
}
