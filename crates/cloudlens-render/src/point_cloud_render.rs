//! Point sprite GPU resources.

use cloudlens_core::Rgb;
use glam::Vec3;

use crate::buffer::{create_storage_buffer, create_uniform_buffer, update_uniform};

/// Smallest accepted point size.
pub const MIN_POINT_SIZE: f32 = 0.1;
/// Largest accepted point size.
pub const MAX_POINT_SIZE: f32 = 3.0;

/// Uniforms for the point sprite pass.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[allow(clippy::pub_underscore_fields)]
pub struct PointUniforms {
    /// Sprite diameter in world units.
    pub point_size: f32,
    /// Non-zero when the point layer is drawn.
    pub visible: u32,
    pub _padding: [f32; 2],
}

impl PointUniforms {
    pub fn new(point_size: f32, visible: bool) -> Self {
        Self {
            point_size: clamp_point_size(point_size),
            visible: u32::from(visible),
            _padding: [0.0; 2],
        }
    }
}

impl Default for PointUniforms {
    fn default() -> Self {
        Self::new(0.3, true)
    }
}

/// Clamps a requested size into `[0.1, 3.0]`. NaN falls back to the minimum.
pub fn clamp_point_size(size: f32) -> f32 {
    if size.is_nan() {
        MIN_POINT_SIZE
    } else {
        size.clamp(MIN_POINT_SIZE, MAX_POINT_SIZE)
    }
}

/// Bytes per point in each of the position and color buffers.
pub const POINT_STRIDE: u64 = 16;

/// Most points whose position and color buffers each fit in a single storage
/// binding under `limits`, and whose sprite vertices fit in a `u32` draw.
pub fn max_points(limits: &wgpu::Limits) -> u64 {
    let binding = u64::from(limits.max_storage_buffer_binding_size).min(limits.max_buffer_size);
    (binding / POINT_STRIDE).min(u64::from(u32::MAX / 6))
}

/// Positions padded to `vec4`, in the layout the shader reads.
pub fn pack_positions(positions: &[Vec3]) -> Vec<[f32; 4]> {
    positions.iter().map(|p| [p.x, p.y, p.z, 1.0]).collect()
}

/// Colors as `vec4` in `[0, 1]`, paired with positions by index.
pub fn pack_colors(colors: &[Rgb]) -> Vec<[f32; 4]> {
    colors
        .iter()
        .map(|c| {
            let [r, g, b] = c.to_unit_f32();
            [r, g, b, 1.0]
        })
        .collect()
}

/// GPU resources for one point cloud.
pub struct PointCloudRenderData {
    /// Position buffer (storage buffer).
    pub position_buffer: wgpu::Buffer,
    /// Color buffer (storage buffer).
    pub color_buffer: wgpu::Buffer,
    /// Bind group: camera, point uniforms, positions, colors.
    pub bind_group: wgpu::BindGroup,
    /// Number of points.
    pub num_points: u32,
}

impl PointCloudRenderData {
    /// Uploads positions and colors. Both slices must have the same length.
    pub fn new(
        device: &wgpu::Device,
        bind_group_layout: &wgpu::BindGroupLayout,
        camera_buffer: &wgpu::Buffer,
        uniform_buffer: &wgpu::Buffer,
        positions: &[Vec3],
        colors: &[Rgb],
    ) -> Self {
        debug_assert_eq!(positions.len(), colors.len());
        let num_points = u32::try_from(positions.len()).unwrap_or(u32::MAX);

        let position_buffer =
            create_storage_buffer(device, &pack_positions(positions), Some("point positions"));
        let color_buffer = create_storage_buffer(device, &pack_colors(colors), Some("point colors"));

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("point cloud bind group"),
            layout: bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: camera_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: position_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: color_buffer.as_entire_binding(),
                },
            ],
        });

        Self {
            position_buffer,
            color_buffer,
            bind_group,
            num_points,
        }
    }

    /// Six vertices (two triangles) per sprite.
    pub fn vertex_count(&self) -> u32 {
        self.num_points.saturating_mul(6)
    }

    /// Releases the GPU buffers immediately.
    pub fn destroy(&self) {
        self.position_buffer.destroy();
        self.color_buffer.destroy();
    }
}

/// Creates the shared point uniform buffer.
pub fn create_point_uniform_buffer(device: &wgpu::Device, uniforms: &PointUniforms) -> wgpu::Buffer {
    create_uniform_buffer(device, uniforms, Some("point uniforms"))
}

/// Writes new point uniforms.
pub fn update_point_uniforms(queue: &wgpu::Queue, buffer: &wgpu::Buffer, uniforms: &PointUniforms) {
    update_uniform(queue, buffer, uniforms);
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_point_size_clamping() {
        assert_eq!(clamp_point_size(0.0), MIN_POINT_SIZE);
        assert_eq!(clamp_point_size(10.0), MAX_POINT_SIZE);
        assert_eq!(clamp_point_size(1.5), 1.5);
        assert_eq!(clamp_point_size(f32::NAN), MIN_POINT_SIZE);
        assert_eq!(PointUniforms::new(5.0, false).point_size, MAX_POINT_SIZE);
    }

    #[test]
    fn test_packing_pairs_by_index() {
        let positions = [Vec3::new(1.0, 2.0, 3.0), Vec3::new(-1.0, 0.0, 4.0)];
        let colors = [Rgb([255, 0, 0]), Rgb([0, 0, 255])];
        let p = pack_positions(&positions);
        let c = pack_colors(&colors);
        assert_eq!(p.len(), c.len());
        assert_eq!(p[1], [-1.0, 0.0, 4.0, 1.0]);
        assert_eq!(c[1], [0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_uniform_layout() {
        assert_eq!(std::mem::size_of::<PointUniforms>(), 16);
        assert_eq!(PointUniforms::new(1.0, true).visible, 1);
    }

    #[test]
    fn test_default_limits_capacity() {
        let limits = wgpu::Limits::default();
        // 128 MiB binding / 16 bytes per point.
        assert_eq!(max_points(&limits), 8_388_608);

        let raised = wgpu::Limits {
            max_storage_buffer_binding_size: u32::MAX.into(),
            max_buffer_size: u64::MAX,
            ..wgpu::Limits::default()
        };
        assert_eq!(max_points(&raised), u64::from(u32::MAX / 6));
    }

    proptest! {
        #[test]
        fn prop_capacity_fits_binding(binding in 16u32..u32::MAX, buffer in 16u64..(1u64 << 40)) {
            let limits = wgpu::Limits {
                max_storage_buffer_binding_size: binding.into(),
                max_buffer_size: buffer,
                ..wgpu::Limits::default()
            };
            let n = max_points(&limits);
            prop_assert!(n * POINT_STRIDE <= u64::from(binding));
            prop_assert!(n * POINT_STRIDE <= buffer);
            prop_assert!(n.saturating_mul(6) <= u64::from(u32::MAX));
        }
    }
}
