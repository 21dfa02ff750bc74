//! CPU-side geometry for the backdrop: sphere meshes, the star field, and the
//! shading helpers the WGSL shaders mirror.

use std::f32::consts::{PI, TAU};

use bytemuck::{Pod, Zeroable};
use glam::{Quat, Vec3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Night luminance below this contributes no city light
pub const CITY_LIGHT_LOW: f32 = 0.4;
/// Night luminance above this contributes full city light
pub const CITY_LIGHT_HIGH: f32 = 0.7;

/// Rim glow falls to zero once the normal faces the viewer this much
pub const RIM_BIAS: f32 = 0.65;
pub const RIM_POWER: f32 = 2.4;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }
}

/// Latitude/longitude sphere. `uv` runs (0, 0) at the north pole seam to
/// (1, 1) at the south pole, matching equirectangular texture layout.
pub fn uv_sphere(radius: f32, width_segments: u32, height_segments: u32) -> Mesh {
    let width_segments = width_segments.max(3);
    let height_segments = height_segments.max(2);
    let stride = width_segments + 1;

    let mut vertices = Vec::with_capacity((stride * (height_segments + 1)) as usize);
    for iy in 0..=height_segments {
        let v = iy as f32 / height_segments as f32;
        let theta = v * PI;
        for ix in 0..=width_segments {
            let u = ix as f32 / width_segments as f32;
            let phi = u * TAU;
            let normal = Vec3::new(
                -phi.cos() * theta.sin(),
                theta.cos(),
                phi.sin() * theta.sin(),
            );
            vertices.push(MeshVertex {
                position: (normal * radius).to_array(),
                normal: normal.to_array(),
                uv: [u, v],
            });
        }
    }

    let mut indices = Vec::with_capacity((width_segments * height_segments * 6) as usize);
    for iy in 0..height_segments {
        for ix in 0..width_segments {
            let a = iy * stride + ix + 1;
            let b = iy * stride + ix;
            let c = (iy + 1) * stride + ix;
            let d = (iy + 1) * stride + ix + 1;
            // Pole rows collapse to a single triangle
            if iy != 0 {
                indices.extend_from_slice(&[a, b, d]);
            }
            if iy != height_segments - 1 {
                indices.extend_from_slice(&[b, c, d]);
            }
        }
    }

    Mesh { vertices, indices }
}

/// `count` points uniformly distributed on a sphere of `radius`.
///
/// The polar angle is drawn as `acos(2v - 1)` rather than uniformly, which
/// is the inverse CDF of the area element and keeps stars from bunching at
/// the poles. The same seed always yields the same sky.
pub fn star_field(count: u32, radius: f32, seed: u64) -> Vec<Vec3> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let theta = rng.random::<f32>() * TAU;
            let phi = (2.0 * rng.random::<f32>() - 1.0).acos();
            Vec3::new(
                radius * phi.sin() * theta.cos(),
                radius * phi.sin() * theta.sin(),
                radius * phi.cos(),
            )
        })
        .collect()
}

/// Rec. 709 luma
pub fn luminance(rgb: Vec3) -> f32 {
    rgb.dot(Vec3::new(0.2126, 0.7152, 0.0722))
}

/// City-light weight for a night texel's luminance: linear ramp from
/// `CITY_LIGHT_LOW` to `CITY_LIGHT_HIGH`, clamped to [0, 1]
pub fn city_light_mask(luminance: f32) -> f32 {
    ((luminance - CITY_LIGHT_LOW) / (CITY_LIGHT_HIGH - CITY_LIGHT_LOW)).clamp(0.0, 1.0)
}

/// Atmosphere glow for the view-space normal's z component
pub fn rim_intensity(normal_dot_view: f32) -> f32 {
    (RIM_BIAS - normal_dot_view).max(0.0).powf(RIM_POWER)
}

/// Rotation that turns the atmosphere shell's +Z toward the camera
pub fn facing_rotation(camera_position: Vec3) -> Quat {
    let direction = camera_position.normalize_or_zero();
    if direction == Vec3::ZERO {
        return Quat::IDENTITY;
    }
    Quat::from_rotation_arc(Vec3::Z, direction)
}

/// Direction toward the sun for a light placed at (x, height, z)
pub fn sun_direction(x: f32, height: f32, z: f32) -> Vec3 {
    Vec3::new(x, height, z).normalize_or(Vec3::Y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sphere_vertices_on_radius() {
        let mesh = uv_sphere(2.9, 16, 8);
        assert_eq!(mesh.vertices.len(), 17 * 9);
        for vertex in &mesh.vertices {
            let length = Vec3::from_array(vertex.position).length();
            assert!((length - 2.9).abs() < 1e-4);
        }
    }

    #[test]
    fn test_sphere_indices_in_range() {
        let mesh = uv_sphere(1.0, 16, 8);
        // Two triangles per quad minus one per pole quad
        assert_eq!(mesh.indices.len(), (16 * 8 * 2 - 16 * 2) * 3);
        let max = mesh.vertices.len() as u32;
        assert!(mesh.indices.iter().all(|&i| i < max));
    }

    #[test]
    fn test_sphere_faces_point_outward() {
        let mesh = uv_sphere(1.0, 12, 6);
        for tri in mesh.indices.chunks(3) {
            let p = |i: u32| Vec3::from_array(mesh.vertices[i as usize].position);
            let (a, b, c) = (p(tri[0]), p(tri[1]), p(tri[2]));
            let normal = (b - a).cross(c - a);
            let center = (a + b + c) / 3.0;
            assert!(normal.dot(center) > 0.0);
        }
    }

    #[test]
    fn test_star_field_is_deterministic_and_on_radius() {
        let a = star_field(500, 450.0, 7);
        let b = star_field(500, 450.0, 7);
        assert_eq!(a, b);
        assert!(a.iter().all(|p| (p.length() - 450.0).abs() < 0.05));
        assert_ne!(a, star_field(500, 450.0, 8));
    }

    #[test]
    fn test_star_field_does_not_cluster_at_poles() {
        let stars = star_field(20_000, 1.0, 42);
        // Uniform on a sphere: z is uniform in [-1, 1], so each polar cap
        // |z| > 0.9 holds ~5% of points
        let caps = stars.iter().filter(|p| p.z.abs() > 0.9).count() as f32;
        let share = caps / stars.len() as f32;
        assert!((share - 0.1).abs() < 0.02, "cap share {}", share);
    }

    #[test]
    fn test_city_light_mask_ramp() {
        assert_eq!(city_light_mask(0.1), 0.0);
        assert_eq!(city_light_mask(0.4), 0.0);
        assert!((city_light_mask(0.55) - 0.5).abs() < 1e-5);
        assert_eq!(city_light_mask(0.7), 1.0);
        assert_eq!(city_light_mask(0.95), 1.0);
    }

    #[test]
    fn test_rim_intensity_concentrates_at_edge() {
        assert_eq!(rim_intensity(1.0), 0.0);
        assert!(rim_intensity(0.0) > rim_intensity(0.5));
        assert!((rim_intensity(-0.35) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_facing_rotation_points_z_at_camera() {
        let camera = Vec3::new(1.0, 2.0, 7.0);
        let rotated = facing_rotation(camera) * Vec3::Z;
        assert!((rotated - camera.normalize()).length() < 1e-5);
        assert_eq!(facing_rotation(Vec3::ZERO), Quat::IDENTITY);
    }
}
