//! Core data model for cloudlens.
//!
//! This crate holds everything that does not touch the GPU:
//! - [`color_map`]: scalar-to-color mapping through ordered gradients
//! - [`ellipsoid`] and [`linalg`]: Gaussian components to one-sigma ellipsoids
//! - [`clipping`]: the three axis-aligned clipping half-spaces
//! - [`dataset`] and [`selection`]: response schema, dataset model and request ordering
//! - [`options`]: viewer configuration

#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

pub mod clipping;
pub mod color_map;
pub mod dataset;
pub mod ellipsoid;
pub mod error;
pub mod linalg;
pub mod options;
pub mod selection;

pub use clipping::{ClipAxis, ClipPlaneUniforms, ClippingPlane, ClippingRegionManager};
pub use color_map::{
    build_color_buffer, map_value, resolve_colors, ColorGradient, ColorMapName, LabelPalette, Rgb,
    ValueRange,
};
pub use dataset::{
    DataNamesResponse, Dataset, GaussianResponse, Normalization, PointAttributes, PointCloud,
    PointCloudResponse, Property,
};
pub use ellipsoid::{
    build_all, Covariance, EllipsoidInstance, EllipsoidTransform, GaussianComponent,
};
pub use error::{CloudlensError, Result};
pub use linalg::{symmetric_eigen, SymmetricEigen3};
pub use options::{CameraConfig, LegendConfig, Options};
pub use selection::{FetchProgress, RequestToken, Selection, SelectionTracker};

// Re-export glam types for convenience
pub use glam::{Mat3, Mat4, Vec3, Vec4};
