//! Gaussian components and their one-sigma ellipsoid transforms.

use glam::{Mat3, Mat4, Quat, Vec3};
use log::warn;
use nalgebra::Matrix3;

use crate::color_map::Rgb;
use crate::error::{CloudlensError, Result};
use crate::linalg::symmetric_eigen;

/// Color given to components that have no palette entry.
pub const DEFAULT_ELLIPSOID_COLOR: Rgb = Rgb([255, 255, 255]);

/// A symmetric 3x3 covariance matrix, row-major.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Covariance(pub [[f64; 3]; 3]);

impl Covariance {
    /// A diagonal covariance.
    pub fn diagonal(d: [f64; 3]) -> Self {
        Self([[d[0], 0.0, 0.0], [0.0, d[1], 0.0], [0.0, 0.0, d[2]]])
    }

    /// Builds a covariance from nested rows, as found in JSON responses.
    ///
    /// Anything other than exactly three rows of three entries is rejected.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        if rows.len() != 3 || rows.iter().any(|r| r.len() != 3) {
            let shape: Vec<usize> = rows.iter().map(Vec::len).collect();
            return Err(CloudlensError::InvalidCovariance(format!(
                "expected a 3x3 matrix, got {} rows with lengths {shape:?}",
                rows.len()
            )));
        }
        let mut m = [[0.0; 3]; 3];
        for (dst, src) in m.iter_mut().zip(rows) {
            dst.copy_from_slice(src);
        }
        Ok(Self(m))
    }

    pub fn to_matrix(&self) -> Matrix3<f64> {
        let m = &self.0;
        Matrix3::new(
            m[0][0], m[0][1], m[0][2], //
            m[1][0], m[1][1], m[1][2], //
            m[2][0], m[2][1], m[2][2],
        )
    }
}

/// A mean vector, its covariance and an optional cluster label.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianComponent {
    pub mean: Vec3,
    pub covariance: Covariance,
    pub label: Option<i64>,
}

impl GaussianComponent {
    pub fn new(mean: Vec3, covariance: Covariance) -> Self {
        Self {
            mean,
            covariance,
            label: None,
        }
    }

    /// Sets the cluster label.
    #[must_use]
    pub fn with_label(mut self, label: i64) -> Self {
        self.label = Some(label);
        self
    }
}

/// Scale, rotation and translation mapping the unit sphere onto the
/// one-standard-deviation surface of a Gaussian.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EllipsoidTransform {
    /// Semi-axis lengths, `sqrt(max(lambda_i, 0))`.
    pub scale: Vec3,
    /// Proper rotation whose columns are the eigenvectors.
    pub rotation: Mat3,
    pub translation: Vec3,
    pub color: Rgb,
}

impl EllipsoidTransform {
    /// `translate(mean) * rotation * scale`.
    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            self.scale,
            Quat::from_mat3(&self.rotation),
            self.translation,
        )
    }

    /// Packs the transform for the instanced ellipsoid pass.
    pub fn to_instance(&self, opacity: f32) -> EllipsoidInstance {
        let [r, g, b] = self.color.to_unit_f32();
        EllipsoidInstance {
            model: self.model_matrix().to_cols_array_2d(),
            color: [r, g, b, opacity.clamp(0.0, 1.0)],
        }
    }
}

/// Builds the ellipsoid for one Gaussian.
#[allow(clippy::cast_possible_truncation)]
pub fn build(mean: Vec3, covariance: &Covariance, color: Rgb) -> Result<EllipsoidTransform> {
    let eigen = symmetric_eigen(&covariance.to_matrix())?;

    let scale = Vec3::new(
        eigen.eigenvalues[0].max(0.0).sqrt() as f32,
        eigen.eigenvalues[1].max(0.0).sqrt() as f32,
        eigen.eigenvalues[2].max(0.0).sqrt() as f32,
    );

    let v = &eigen.eigenvectors;
    let column = |c: usize| Vec3::new(v[(0, c)] as f32, v[(1, c)] as f32, v[(2, c)] as f32);
    let rotation = Mat3::from_cols(column(0), column(1), column(2));

    Ok(EllipsoidTransform {
        scale,
        rotation,
        translation: mean,
        color,
    })
}

/// Builds every valid component, pairing component `i` with `colors[i]`.
///
/// Invalid components are skipped with a warning so the rest still render.
pub fn build_all(components: &[GaussianComponent], colors: &[Rgb]) -> Vec<EllipsoidTransform> {
    components
        .iter()
        .enumerate()
        .filter_map(|(i, component)| {
            let color = colors.get(i).copied().unwrap_or(DEFAULT_ELLIPSOID_COLOR);
            match build(component.mean, &component.covariance, color) {
                Ok(transform) => Some(transform),
                Err(e) => {
                    warn!("skipping Gaussian component {i}: {e}");
                    None
                }
            }
        })
        .collect()
}

/// Per-instance data for the ellipsoid pass.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct EllipsoidInstance {
    /// Column-major model matrix.
    pub model: [[f32; 4]; 4],
    /// sRGB color in `[0, 1]` plus opacity.
    pub color: [f32; 4],
}
