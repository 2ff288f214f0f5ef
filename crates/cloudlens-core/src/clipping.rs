//! Axis-aligned clipping half-spaces.
//!
//! Three independent planes, one per axis, hide geometry without touching
//! the point buffers. A position `p` is kept only when
//! `dot(normal, p) + offset <= 0` holds for every plane.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Lower bound of a clipping offset.
pub const MIN_CLIP_OFFSET: f32 = -100.0;
/// Upper bound of a clipping offset.
pub const MAX_CLIP_OFFSET: f32 = 100.0;

/// The axis a clipping plane is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipAxis {
    X,
    Y,
    Z,
}

impl ClipAxis {
    /// All axes in plane order.
    pub const ALL: [ClipAxis; 3] = [ClipAxis::X, ClipAxis::Y, ClipAxis::Z];

    /// Unit normal of the plane for this axis.
    pub fn normal(self) -> Vec3 {
        match self {
            ClipAxis::X => Vec3::X,
            ClipAxis::Y => Vec3::Y,
            ClipAxis::Z => Vec3::Z,
        }
    }

    /// Position of this axis's plane in `[X, Y, Z]`.
    pub fn index(self) -> usize {
        match self {
            ClipAxis::X => 0,
            ClipAxis::Y => 1,
            ClipAxis::Z => 2,
        }
    }
}

/// A half-space boundary with a fixed normal and a movable offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClippingPlane {
    axis: ClipAxis,
    offset: f32,
}

impl ClippingPlane {
    /// Creates a plane for `axis`; the offset is clamped into range.
    pub fn new(axis: ClipAxis, offset: f32) -> Self {
        let mut plane = Self {
            axis,
            offset: MIN_CLIP_OFFSET,
        };
        plane.set_offset(offset);
        plane
    }

    pub fn axis(&self) -> ClipAxis {
        self.axis
    }

    pub fn normal(&self) -> Vec3 {
        self.axis.normal()
    }

    pub fn offset(&self) -> f32 {
        self.offset
    }

    /// Sets the offset, clamped to `[-100, 100]`. NaN leaves the plane unchanged.
    pub fn set_offset(&mut self, offset: f32) {
        if offset.is_nan() {
            return;
        }
        self.offset = offset.clamp(MIN_CLIP_OFFSET, MAX_CLIP_OFFSET);
    }

    /// `dot(normal, p) + offset`. Non-positive values are kept.
    pub fn signed_distance(&self, point: Vec3) -> f32 {
        self.normal().dot(point) + self.offset
    }

    /// Returns whether a point is on the kept side of the plane.
    pub fn is_kept(&self, point: Vec3) -> bool {
        self.signed_distance(point) <= 0.0
    }
}

/// Owns the three clipping planes and hands them to the renderer each frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ClippingRegionManager {
    planes: [ClippingPlane; 3],
}

impl ClippingRegionManager {
    /// Creates a manager with every offset at `-100`.
    pub fn new() -> Self {
        Self::with_offsets([MIN_CLIP_OFFSET; 3])
    }

    /// Creates a manager with explicit X, Y and Z offsets.
    pub fn with_offsets(offsets: [f32; 3]) -> Self {
        Self {
            planes: [
                ClippingPlane::new(ClipAxis::X, offsets[0]),
                ClippingPlane::new(ClipAxis::Y, offsets[1]),
                ClippingPlane::new(ClipAxis::Z, offsets[2]),
            ],
        }
    }

    pub fn set_offset(&mut self, axis: ClipAxis, value: f32) {
        self.planes[axis.index()].set_offset(value);
    }

    pub fn offset(&self, axis: ClipAxis) -> f32 {
        self.planes[axis.index()].offset()
    }

    /// The X, Y and Z planes.
    pub fn planes(&self) -> [ClippingPlane; 3] {
        self.planes
    }

    /// Returns whether `point` passes all three planes.
    pub fn is_visible(&self, point: Vec3) -> bool {
        self.planes.iter().all(|plane| plane.is_kept(point))
    }

    /// Counts the positions that pass all three planes.
    pub fn count_visible(&self, positions: &[Vec3]) -> usize {
        positions.iter().filter(|&&p| self.is_visible(p)).count()
    }

    /// Packs the planes for upload.
    pub fn uniforms(&self) -> ClipPlaneUniforms {
        ClipPlaneUniforms::from(self)
    }
}

impl Default for ClippingRegionManager {
    fn default() -> Self {
        Self::new()
    }
}

/// GPU-compatible clipping uniforms: one `vec4(normal, offset)` per plane.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ClipPlaneUniforms {
    pub planes: [[f32; 4]; 3],
    pub _padding: [f32; 4],
}

impl From<&ClippingRegionManager> for ClipPlaneUniforms {
    fn from(manager: &ClippingRegionManager) -> Self {
        let pack = |plane: &ClippingPlane| {
            let n = plane.normal();
            [n.x, n.y, n.z, plane.offset()]
        };
        Self {
            planes: [
                pack(&manager.planes[0]),
                pack(&manager.planes[1]),
                pack(&manager.planes[2]),
            ],
            _padding: [0.0; 4],
        }
    }
}

impl Default for ClipPlaneUniforms {
    fn default() -> Self {
        Self::from(&ClippingRegionManager::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_z_plane_scenario() {
        let mut manager = ClippingRegionManager::new();
        let point = Vec3::new(0.0, 0.0, 50.0);

        manager.set_offset(ClipAxis::Z, 30.0);
        assert!(!manager.is_visible(point));

        manager.set_offset(ClipAxis::Z, -60.0);
        assert!(manager.is_visible(point));
    }

    #[test]
    fn test_offsets_are_clamped() {
        let mut manager = ClippingRegionManager::new();
        manager.set_offset(ClipAxis::X, 250.0);
        assert_eq!(manager.offset(ClipAxis::X), 100.0);
        manager.set_offset(ClipAxis::X, -1000.0);
        assert_eq!(manager.offset(ClipAxis::X), -100.0);
    }

    #[test]
    fn test_nan_offset_is_ignored() {
        let mut manager = ClippingRegionManager::with_offsets([10.0, 20.0, 30.0]);
        manager.set_offset(ClipAxis::Y, f32::NAN);
        assert_eq!(manager.offset(ClipAxis::Y), 20.0);
    }

    #[test]
    fn test_default_keeps_normalized_cloud() {
        let manager = ClippingRegionManager::default();
        for corner in [Vec3::splat(100.0), Vec3::splat(-100.0), Vec3::ZERO] {
            assert!(manager.is_visible(corner));
        }
        assert_eq!(
            manager.count_visible(&[Vec3::ZERO, Vec3::new(0.0, 101.0, 0.0)]),
            1
        );
    }

    #[test]
    fn test_uniforms() {
        let manager = ClippingRegionManager::with_offsets([1.0, 2.0, 3.0]);
        let uniforms = manager.uniforms();
        assert_eq!(uniforms.planes[0], [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(uniforms.planes[1], [0.0, 1.0, 0.0, 2.0]);
        assert_eq!(uniforms.planes[2], [0.0, 0.0, 1.0, 3.0]);
        assert_eq!(std::mem::size_of::<ClipPlaneUniforms>(), 64);
    }

    proptest! {
        #[test]
        fn prop_visibility_is_conjunction(
            ox in -100.0f32..=100.0,
            oy in -100.0f32..=100.0,
            oz in -100.0f32..=100.0,
            x in -150.0f32..150.0,
            y in -150.0f32..150.0,
            z in -150.0f32..150.0,
        ) {
            let manager = ClippingRegionManager::with_offsets([ox, oy, oz]);
            let p = Vec3::new(x, y, z);
            let expected = x + ox <= 0.0 && y + oy <= 0.0 && z + oz <= 0.0;
            prop_assert_eq!(manager.is_visible(p), expected);
        }
    }
}
