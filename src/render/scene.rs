//! GPU resources for the planet, cloud shell, atmosphere shell and star field.
//!
//! Everything is built once at activation. Materials start on 1x1 stand-in
//! textures so the render loop can draw before loading finishes; real
//! textures are swapped in once by [`SceneResources::apply_textures`].

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use wgpu::util::DeviceExt;

use super::{DEPTH_FORMAT, HDR_FORMAT};
use crate::config::SceneConfig;
use crate::core::geometry::{star_field, uv_sphere, Mesh, MeshVertex};
use crate::core::loader::{DecodedImage, LoadedTextures};
use crate::core::render_loop::FrameParams;

const DAY_FALLBACK: [u8; 4] = [38, 64, 112, 255];
const NIGHT_FALLBACK: [u8; 4] = [0, 0, 0, 255];
const CLOUD_FALLBACK: [u8; 4] = [0, 0, 0, 255];

/// Per-frame uniform shared by every scene pipeline
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GlobalsUniform {
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub camera_position: [f32; 4],
    /// xyz toward the sun, w intensity
    pub sun: [f32; 4],
    /// ambient, blend, cloud opacity, star size
    pub params: [f32; 4],
    /// star opacity
    pub stars: [f32; 4],
}

impl GlobalsUniform {
    pub fn new(frame: &FrameParams, scene: &SceneConfig) -> Self {
        Self {
            view: frame.view.to_cols_array_2d(),
            projection: frame.projection.to_cols_array_2d(),
            camera_position: frame.camera_position.extend(1.0).to_array(),
            sun: frame.sun_direction.extend(frame.sun_intensity).to_array(),
            params: [
                frame.ambient_intensity,
                frame.blend,
                frame.cloud_opacity,
                scene.star_size,
            ],
            stars: [scene.star_opacity, 0.0, 0.0, 0.0],
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
struct ObjectUniform {
    model: [[f32; 4]; 4],
}

/// Model matrices for (planet, clouds, atmosphere)
pub fn model_matrices(frame: &FrameParams) -> [Mat4; 3] {
    [
        Mat4::from_rotation_y(frame.planet_rotation),
        Mat4::from_rotation_y(frame.cloud_rotation),
        Mat4::from_quat(frame.atmosphere_rotation),
    ]
}

/// Largest size not exceeding `max` on either axis, keeping the aspect ratio
pub fn fit_extent(width: u32, height: u32, max: u32) -> (u32, u32) {
    if width <= max && height <= max {
        return (width, height);
    }
    let scale = max as f32 / width.max(height) as f32;
    (
        ((width as f32 * scale).round() as u32).clamp(1, max),
        ((height as f32 * scale).round() as u32).clamp(1, max),
    )
}

struct GpuMesh {
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
    index_count: u32,
}

impl GpuMesh {
    fn new(device: &wgpu::Device, mesh: &Mesh, label: &str) -> Self {
        let vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertices,
            indices,
            index_count: mesh.index_count(),
        }
    }

    fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_vertex_buffer(0, self.vertices.slice(..));
        pass.set_index_buffer(self.indices.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..self.index_count, 0, 0..1);
    }

    fn destroy(&self) {
        self.vertices.destroy();
        self.indices.destroy();
    }
}

struct Object {
    mesh: GpuMesh,
    uniform: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

struct Material {
    textures: Vec<wgpu::Texture>,
    bind_group: wgpu::BindGroup,
}

pub struct SceneResources {
    config: SceneConfig,
    globals: wgpu::Buffer,
    globals_bind_group: wgpu::BindGroup,
    material_bgl: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    planet: Object,
    clouds: Object,
    atmosphere: Object,
    planet_material: Material,
    cloud_material: Material,
    stars: wgpu::Buffer,
    star_count: u32,
    planet_pipeline: wgpu::RenderPipeline,
    cloud_pipeline: wgpu::RenderPipeline,
    atmosphere_pipeline: wgpu::RenderPipeline,
    star_pipeline: wgpu::RenderPipeline,
    textures_applied: bool,
}

impl SceneResources {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, config: &SceneConfig) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("scene-shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/scene.wgsl").into()),
        });

        let globals_bgl = uniform_layout(
            device,
            "scene-globals-bgl",
            wgpu::ShaderStages::VERTEX_FRAGMENT,
        );
        let object_bgl = uniform_layout(device, "scene-object-bgl", wgpu::ShaderStages::VERTEX);
        let material_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("scene-material-bgl"),
            entries: &[
                texture_entry(0),
                texture_entry(1),
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let globals = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("scene-globals"),
            contents: bytemuck::cast_slice(&[GlobalsUniform::zeroed()]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let globals_bind_group = uniform_bind_group(device, &globals_bgl, &globals, "scene-globals");

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("scene-material-sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let radius = config.planet_radius;
        let object = |mesh: Mesh, label: &str| {
            let uniform = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(&[ObjectUniform {
                    model: Mat4::IDENTITY.to_cols_array_2d(),
                }]),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
            Object {
                mesh: GpuMesh::new(device, &mesh, label),
                bind_group: uniform_bind_group(device, &object_bgl, &uniform, label),
                uniform,
            }
        };
        let planet = object(
            uv_sphere(radius, config.planet_segments, config.planet_segments),
            "planet",
        );
        let clouds = object(
            uv_sphere(
                radius * config.cloud_scale,
                config.planet_segments,
                config.planet_segments,
            ),
            "clouds",
        );
        let atmosphere = object(
            uv_sphere(
                radius * config.atmosphere_scale,
                config.atmosphere_segments,
                config.atmosphere_segments,
            ),
            "atmosphere",
        );

        let day = upload_texture(device, queue, &DecodedImage::solid(DAY_FALLBACK), "day-fallback");
        let night = upload_texture(
            device,
            queue,
            &DecodedImage::solid(NIGHT_FALLBACK),
            "night-fallback",
        );
        let cover = upload_texture(
            device,
            queue,
            &DecodedImage::solid(CLOUD_FALLBACK),
            "clouds-fallback",
        );
        let planet_material = material(device, &material_bgl, &sampler, vec![day, night], "planet");
        let cloud_material = material(device, &material_bgl, &sampler, vec![cover], "clouds");

        let star_positions: Vec<[f32; 3]> =
            star_field(config.star_count, config.star_radius, config.star_seed)
                .into_iter()
                .map(|star| star.to_array())
                .collect();
        let stars = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("star-instances"),
            contents: bytemuck::cast_slice(&star_positions),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let surface_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("scene-surface-layout"),
            bind_group_layouts: &[&globals_bgl, &object_bgl, &material_bgl],
            push_constant_ranges: &[],
        });
        let star_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("scene-star-layout"),
            bind_group_layouts: &[&globals_bgl],
            push_constant_ranges: &[],
        });

        let mesh_layout = wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2],
        };
        let star_instance_layout = wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &wgpu::vertex_attr_array![0 => Float32x3],
        };

        let alpha = Some(wgpu::BlendState::ALPHA_BLENDING);
        let additive = Some(wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::SrcAlpha,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent::OVER,
        });

        let planet_pipeline = ScenePipeline {
            label: "planet",
            layout: &surface_layout,
            vertex_entry: "vs_surface",
            fragment_entry: "fs_planet",
            buffers: std::slice::from_ref(&mesh_layout),
            cull_mode: Some(wgpu::Face::Back),
            depth_write: true,
            blend: None,
        }
        .build(device, &shader);
        let cloud_pipeline = ScenePipeline {
            label: "clouds",
            fragment_entry: "fs_clouds",
            depth_write: false,
            blend: alpha,
            ..ScenePipeline::surface(&surface_layout, &mesh_layout)
        }
        .build(device, &shader);
        // Back faces only: the glow hugs the silhouette
        let atmosphere_pipeline = ScenePipeline {
            label: "atmosphere",
            fragment_entry: "fs_atmosphere",
            cull_mode: Some(wgpu::Face::Front),
            depth_write: false,
            blend: additive,
            ..ScenePipeline::surface(&surface_layout, &mesh_layout)
        }
        .build(device, &shader);
        let star_pipeline = ScenePipeline {
            label: "stars",
            layout: &star_layout,
            vertex_entry: "vs_star",
            fragment_entry: "fs_star",
            buffers: std::slice::from_ref(&star_instance_layout),
            cull_mode: None,
            depth_write: false,
            blend: alpha,
        }
        .build(device, &shader);

        log::info!(
            "scene built: {} stars, planet radius {}",
            config.star_count,
            config.planet_radius
        );

        Self {
            config: config.clone(),
            globals,
            globals_bind_group,
            material_bgl,
            sampler,
            planet,
            clouds,
            atmosphere,
            planet_material,
            cloud_material,
            stars,
            star_count: config.star_count,
            planet_pipeline,
            cloud_pipeline,
            atmosphere_pipeline,
            star_pipeline,
            textures_applied: false,
        }
    }

    /// Swap in loaded textures. Missing ones keep their stand-in. Applies once.
    pub fn apply_textures(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        loaded: LoadedTextures,
    ) {
        if self.textures_applied {
            return;
        }
        self.textures_applied = true;
        let limit = device.limits().max_texture_dimension_2d;

        let upload = |image: Option<DecodedImage>, fallback: [u8; 4], label: &str| {
            let image = image.unwrap_or_else(|| DecodedImage::solid(fallback));
            upload_texture(device, queue, &fit_image(image, limit), label)
        };
        let day = upload(loaded.day, DAY_FALLBACK, "day");
        let night = upload(loaded.night, NIGHT_FALLBACK, "night");
        let cover = upload(loaded.clouds, CLOUD_FALLBACK, "clouds");

        let planet = material(device, &self.material_bgl, &self.sampler, vec![day, night], "planet");
        let clouds = material(device, &self.material_bgl, &self.sampler, vec![cover], "clouds");
        for texture in self
            .planet_material
            .textures
            .iter()
            .chain(&self.cloud_material.textures)
        {
            texture.destroy();
        }
        self.planet_material = planet;
        self.cloud_material = clouds;
    }

    pub fn update(&self, queue: &wgpu::Queue, frame: &FrameParams) {
        queue.write_buffer(
            &self.globals,
            0,
            bytemuck::cast_slice(&[GlobalsUniform::new(frame, &self.config)]),
        );
        let models = model_matrices(frame);
        for (object, model) in [&self.planet, &self.clouds, &self.atmosphere]
            .into_iter()
            .zip(models)
        {
            queue.write_buffer(
                &object.uniform,
                0,
                bytemuck::cast_slice(&[ObjectUniform {
                    model: model.to_cols_array_2d(),
                }]),
            );
        }
    }

    /// Stars, opaque planet, then the blended shells
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_bind_group(0, &self.globals_bind_group, &[]);

        pass.set_pipeline(&self.star_pipeline);
        pass.set_vertex_buffer(0, self.stars.slice(..));
        pass.draw(0..6, 0..self.star_count);

        pass.set_pipeline(&self.planet_pipeline);
        pass.set_bind_group(1, &self.planet.bind_group, &[]);
        pass.set_bind_group(2, &self.planet_material.bind_group, &[]);
        self.planet.mesh.draw(pass);

        pass.set_pipeline(&self.cloud_pipeline);
        pass.set_bind_group(1, &self.clouds.bind_group, &[]);
        pass.set_bind_group(2, &self.cloud_material.bind_group, &[]);
        self.clouds.mesh.draw(pass);

        pass.set_pipeline(&self.atmosphere_pipeline);
        pass.set_bind_group(1, &self.atmosphere.bind_group, &[]);
        self.atmosphere.mesh.draw(pass);
    }

    /// Release every buffer and texture now
    pub fn destroy(&self) {
        self.globals.destroy();
        self.stars.destroy();
        for object in [&self.planet, &self.clouds, &self.atmosphere] {
            object.mesh.destroy();
            object.uniform.destroy();
        }
        for texture in self
            .planet_material
            .textures
            .iter()
            .chain(&self.cloud_material.textures)
        {
            texture.destroy();
        }
    }
}

struct ScenePipeline<'a> {
    label: &'a str,
    layout: &'a wgpu::PipelineLayout,
    vertex_entry: &'a str,
    fragment_entry: &'a str,
    buffers: &'a [wgpu::VertexBufferLayout<'a>],
    cull_mode: Option<wgpu::Face>,
    depth_write: bool,
    blend: Option<wgpu::BlendState>,
}

impl<'a> ScenePipeline<'a> {
    fn surface(
        layout: &'a wgpu::PipelineLayout,
        mesh_layout: &'a wgpu::VertexBufferLayout<'a>,
    ) -> Self {
        Self {
            label: "surface",
            layout,
            vertex_entry: "vs_surface",
            fragment_entry: "fs_planet",
            buffers: std::slice::from_ref(mesh_layout),
            cull_mode: Some(wgpu::Face::Back),
            depth_write: true,
            blend: None,
        }
    }

    fn build(self, device: &wgpu::Device, shader: &wgpu::ShaderModule) -> wgpu::RenderPipeline {
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(self.label),
            layout: Some(self.layout),
            vertex: wgpu::VertexState {
                module: shader,
                entry_point: Some(self.vertex_entry),
                buffers: self.buffers,
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: shader,
                entry_point: Some(self.fragment_entry),
                targets: &[Some(wgpu::ColorTargetState {
                    format: HDR_FORMAT,
                    blend: self.blend,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: self.cull_mode,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: self.depth_write,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        })
    }
}

fn uniform_layout(
    device: &wgpu::Device,
    label: &str,
    visibility: wgpu::ShaderStages,
) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    })
}

fn uniform_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    buffer: &wgpu::Buffer,
    label: &str,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: buffer.as_entire_binding(),
        }],
    })
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

/// Bind group over one or two textures; a single texture fills both slots
fn material(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    textures: Vec<wgpu::Texture>,
    label: &str,
) -> Material {
    let views: Vec<wgpu::TextureView> = textures
        .iter()
        .map(|texture| texture.create_view(&wgpu::TextureViewDescriptor::default()))
        .collect();
    let primary = &views[0];
    let secondary = views.get(1).unwrap_or(primary);
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(primary),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(secondary),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    });
    Material {
        textures,
        bind_group,
    }
}

/// Downscale an image that exceeds the device's texture limit
fn fit_image(image: DecodedImage, limit: u32) -> DecodedImage {
    let (width, height) = fit_extent(image.width, image.height, limit);
    if (width, height) == (image.width, image.height) {
        return image;
    }
    let Some(buffer) = image::RgbaImage::from_raw(image.width, image.height, image.rgba) else {
        log::warn!("texture buffer size mismatch, using a blank texture");
        return DecodedImage::solid([0, 0, 0, 255]);
    };
    log::info!(
        "downscaling texture {}x{} -> {}x{} to fit device limit",
        image.width,
        image.height,
        width,
        height
    );
    let resized =
        image::imageops::resize(&buffer, width, height, image::imageops::FilterType::Triangle);
    DecodedImage {
        width,
        height,
        rgba: resized.into_raw(),
    }
}

/// sRGB colour texture with linear filtering
fn upload_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    image: &DecodedImage,
    label: &str,
) -> wgpu::Texture {
    let size = wgpu::Extent3d {
        width: image.width,
        height: image.height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        texture.as_image_copy(),
        &image.rgba,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * image.width),
            rows_per_image: Some(image.height),
        },
        size,
    );
    texture
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scene_state::Bloom;
    use glam::Quat;

    fn frame() -> FrameParams {
        FrameParams {
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            camera_position: Vec3::new(0.0, 0.6, 7.2),
            planet_rotation: 0.5,
            cloud_rotation: 0.6,
            atmosphere_rotation: Quat::IDENTITY,
            sun_direction: Vec3::Y,
            sun_intensity: 2.4,
            ambient_intensity: 0.18,
            blend: 0.25,
            cloud_opacity: 0.7,
            bloom: Bloom {
                threshold: 0.85,
                strength: 0.35,
                radius: 0.4,
            },
            surface_opacity: 1.0,
            textures_ready: true,
        }
    }

    #[test]
    fn test_globals_layout() {
        assert_eq!(std::mem::size_of::<GlobalsUniform>(), 192);
        let globals = GlobalsUniform::new(&frame(), &SceneConfig::default());
        assert_eq!(globals.sun, [0.0, 1.0, 0.0, 2.4]);
        assert_eq!(globals.params, [0.18, 0.25, 0.7, 0.6]);
        assert_eq!(globals.stars[0], 0.9);
    }

    #[test]
    fn test_model_matrices_spin_about_y() {
        let [planet, clouds, atmosphere] = model_matrices(&frame());
        let axis = planet.transform_vector3(Vec3::Y);
        assert!((axis - Vec3::Y).length() < 1e-6);
        assert_ne!(planet, clouds);
        assert_eq!(atmosphere, Mat4::IDENTITY);
    }

    #[test]
    fn test_fit_extent() {
        assert_eq!(fit_extent(8192, 4096, 8192), (8192, 4096));
        assert_eq!(fit_extent(8192, 4096, 4096), (4096, 2048));
        assert_eq!(fit_extent(100, 20000, 1000), (5, 1000));
    }

    #[test]
    fn test_fit_image_keeps_small_images() {
        let image = DecodedImage::solid([1, 2, 3, 4]);
        assert_eq!(fit_image(image.clone(), 16), image);
    }
}
