//! Instanced translucent ellipsoids.
//!
//! Every ellipsoid is the same unit sphere mesh drawn with a per-instance
//! model matrix and color.

use cloudlens_core::EllipsoidInstance;

use crate::buffer::{create_index_buffer, create_vertex_buffer};

/// A vertex of the unit sphere. The position doubles as the normal.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SphereVertex {
    pub position: [f32; 3],
}

/// Builds a UV sphere of radius 1 with `segments` slices and stacks.
///
/// Fewer than 3 segments is raised to 3.
#[allow(clippy::cast_precision_loss)]
pub fn unit_sphere(segments: u32) -> (Vec<SphereVertex>, Vec<u32>) {
    let segments = segments.max(3);
    let rings = segments;
    let mut vertices = Vec::with_capacity(((rings + 1) * (segments + 1)) as usize);

    for ring in 0..=rings {
        let polar = std::f32::consts::PI * ring as f32 / rings as f32;
        for seg in 0..=segments {
            let azimuth = std::f32::consts::TAU * seg as f32 / segments as f32;
            vertices.push(SphereVertex {
                position: [
                    polar.sin() * azimuth.cos(),
                    polar.cos(),
                    polar.sin() * azimuth.sin(),
                ],
            });
        }
    }

    let stride = segments + 1;
    let mut indices = Vec::with_capacity((rings * segments * 6) as usize);
    for ring in 0..rings {
        for seg in 0..segments {
            let a = ring * stride + seg;
            let b = a + stride;
            indices.extend_from_slice(&[a, b, a + 1, a + 1, b, b + 1]);
        }
    }

    (vertices, indices)
}

/// The shared sphere mesh.
pub struct SphereMesh {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub index_count: u32,
}

impl SphereMesh {
    pub fn new(device: &wgpu::Device, segments: u32) -> Self {
        let (vertices, indices) = unit_sphere(segments);
        Self {
            vertex_buffer: create_vertex_buffer(device, &vertices, Some("sphere vertices")),
            index_buffer: create_index_buffer(device, &indices, Some("sphere indices")),
            index_count: u32::try_from(indices.len()).unwrap_or(u32::MAX),
        }
    }

    pub fn vertex_layout() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<SphereVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        }
    }
}

/// Per-scene instance buffer.
pub struct EllipsoidRenderData {
    pub instance_buffer: wgpu::Buffer,
    pub instance_count: u32,
}

impl EllipsoidRenderData {
    /// Uploads the instances. Returns `None` when there is nothing to draw.
    pub fn new(device: &wgpu::Device, instances: &[EllipsoidInstance]) -> Option<Self> {
        if instances.is_empty() {
            return None;
        }
        Some(Self {
            instance_buffer: create_vertex_buffer(device, instances, Some("ellipsoid instances")),
            instance_count: u32::try_from(instances.len()).unwrap_or(u32::MAX),
        })
    }

    /// Model matrix columns at locations 1-4, color at 5.
    pub fn instance_layout() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
            1 => Float32x4,
            2 => Float32x4,
            3 => Float32x4,
            4 => Float32x4,
            5 => Float32x4
        ];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<EllipsoidInstance>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &ATTRIBUTES,
        }
    }

    pub fn destroy(&self) {
        self.instance_buffer.destroy();
    }
}
