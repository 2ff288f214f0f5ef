//! Rendering backend for cloudlens.
//!
//! This crate provides the wgpu-based rendering engine, including:
//! - GPU resource management (buffers, pipelines)
//! - Point sprites and instanced ellipsoids, both clipped per fragment
//! - Orbit camera with damped motion
//! - Legend rasterization and the on-screen overlay
//! - Offscreen capture and image output

#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

pub mod buffer;
pub mod camera;
pub mod ellipsoid_render;
pub mod engine;
pub mod error;
pub mod legend;
pub mod point_cloud_render;
pub mod scene;
pub mod screenshot;
pub mod shader;

pub use camera::OrbitCamera;
pub use ellipsoid_render::{unit_sphere, EllipsoidRenderData, SphereMesh, SphereVertex};
pub use engine::{CameraUniforms, RenderEngine};
pub use error::{RenderError, RenderResult};
pub use legend::{format_label, LegendImage, LegendRenderer};
pub use point_cloud_render::{
    clamp_point_size, PointCloudRenderData, PointUniforms, MAX_POINT_SIZE, MIN_POINT_SIZE,
};
pub use scene::GpuScene;
pub use screenshot::{save_image, ScreenshotError};
pub use shader::ShaderBuilder;
