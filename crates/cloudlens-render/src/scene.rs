//! Uploaded scene data.

use cloudlens_core::{EllipsoidInstance, Rgb};
use glam::Vec3;

use crate::ellipsoid_render::EllipsoidRenderData;
use crate::engine::RenderEngine;
use crate::error::{RenderError, RenderResult};
use crate::point_cloud_render::{max_points, PointCloudRenderData};

/// Everything drawn for one dataset: the points and, optionally, the
/// component ellipsoids.
///
/// Buffers are released when the scene is replaced or dropped.
pub struct GpuScene {
    pub points: PointCloudRenderData,
    pub ellipsoids: Option<EllipsoidRenderData>,
    /// Whether the ellipsoid pass runs.
    pub ellipsoids_visible: bool,
    generation: u64,
}

impl GpuScene {
    /// Uploads a dataset. `positions` and `colors` are paired by index.
    pub fn new(
        engine: &RenderEngine,
        positions: &[Vec3],
        colors: &[Rgb],
        instances: &[EllipsoidInstance],
        generation: u64,
    ) -> RenderResult<Self> {
        if positions.len() != colors.len() {
            return Err(RenderError::InvalidScene(format!(
                "{} positions but {} colors",
                positions.len(),
                colors.len()
            )));
        }
        check_capacity(positions.len(), instances.len(), &engine.device.limits())?;

        let points = PointCloudRenderData::new(
            &engine.device,
            engine.point_bind_group_layout(),
            engine.camera_buffer(),
            engine.point_uniform_buffer(),
            positions,
            colors,
        );
        let ellipsoids = EllipsoidRenderData::new(&engine.device, instances);

        log::debug!(
            "uploaded scene {generation}: {} points, {} ellipsoids",
            points.num_points,
            ellipsoids.as_ref().map_or(0, |e| e.instance_count)
        );

        Ok(Self {
            points,
            ellipsoids,
            ellipsoids_visible: true,
            generation,
        })
    }

    /// Load counter value this scene was built for.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn num_points(&self) -> u32 {
        self.points.num_points
    }

    pub fn num_ellipsoids(&self) -> u32 {
        self.ellipsoids.as_ref().map_or(0, |e| e.instance_count)
    }

    /// Releases the GPU buffers immediately.
    pub fn destroy(&self) {
        self.points.destroy();
        if let Some(ellipsoids) = &self.ellipsoids {
            ellipsoids.destroy();
        }
    }
}

/// Rejects scenes whose buffers would exceed the device limits.
fn check_capacity(
    num_points: usize,
    num_instances: usize,
    limits: &wgpu::Limits,
) -> RenderResult<()> {
    let max = max_points(limits);
    if num_points as u64 > max {
        return Err(RenderError::InvalidScene(format!(
            "{num_points} points exceed the device limit of {max}"
        )));
    }
    let instance_bytes = (num_instances as u64)
        .saturating_mul(std::mem::size_of::<EllipsoidInstance>() as u64);
    if instance_bytes > limits.max_buffer_size {
        return Err(RenderError::InvalidScene(format!(
            "{num_instances} ellipsoids exceed the device buffer size of {} bytes",
            limits.max_buffer_size
        )));
    }
    Ok(())
}

impl Drop for GpuScene {
    fn drop(&mut self) {
        self.destroy();
    }
}
