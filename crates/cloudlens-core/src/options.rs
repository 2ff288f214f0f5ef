//! Configuration options for cloudlens.

use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::color_map::ColorMapName;
use crate::dataset::Property;
use crate::error::Result;

/// Viewer configuration. Missing fields in a JSON file take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Window title.
    pub title: String,

    /// Initial window width in pixels.
    pub window_width: u32,

    /// Initial window height in pixels.
    pub window_height: u32,

    /// Background color (linear RGB, `[0, 1]`).
    pub background_color: Vec3,

    /// Initial point size, clamped to `[0.1, 3.0]` when applied.
    pub point_size: f32,

    /// Whether the point layer starts visible.
    pub points_visible: bool,

    /// Whether Gaussian ellipsoids are drawn.
    pub show_ellipsoids: bool,

    /// Opacity of every ellipsoid.
    pub ellipsoid_opacity: f32,

    /// Longitude and latitude segments of the unit sphere mesh.
    pub sphere_segments: u32,

    /// Initial X, Y and Z clipping offsets.
    pub clip_offsets: [f32; 3],

    /// Colormap requested for the first dataset.
    pub colormap: ColorMapName,

    /// Property requested for the first dataset.
    pub property: Property,

    /// Rescale incoming clouds so the longest side spans this many units.
    /// `None` renders positions unchanged.
    pub normalize_extent: Option<f32>,

    /// Whether the legend overlay is drawn.
    pub show_legend: bool,

    /// Legend strip configuration.
    pub legend: LegendConfig,

    /// Camera configuration.
    pub camera: CameraConfig,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            title: "cloudlens".to_string(),
            window_width: 1280,
            window_height: 720,
            background_color: Vec3::new(0.0, 0.0, 0.0),
            point_size: 0.3,
            points_visible: true,
            show_ellipsoids: true,
            ellipsoid_opacity: 0.2,
            sphere_segments: 32,
            clip_offsets: [-100.0; 3],
            colormap: ColorMapName::default(),
            property: Property::default(),
            normalize_extent: None,
            show_legend: true,
            legend: LegendConfig::default(),
            camera: CameraConfig::default(),
        }
    }
}

impl Options {
    /// Loads options from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Legend strip configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegendConfig {
    pub width: u32,
    pub height: u32,
    /// Decimals used for the min/max labels.
    pub decimals: usize,
}

impl Default for LegendConfig {
    fn default() -> Self {
        Self {
            width: 300,
            height: 20,
            decimals: 2,
        }
    }
}

/// Perspective orbit camera configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Vertical field of view in degrees.
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    /// Starting distance from the origin along +Z.
    pub initial_distance: f32,
    /// Fraction of the remaining orbit velocity applied per frame.
    pub damping: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_degrees: 75.0,
            near: 0.1,
            far: 1000.0,
            initial_distance: 500.0,
            damping: 0.1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let options: Options =
            serde_json::from_str(r#"{"point_size": 1.5, "camera": {"fov_degrees": 60.0}}"#)
                .unwrap();
        assert_eq!(options.point_size, 1.5);
        assert_eq!(options.camera.fov_degrees, 60.0);
        assert_eq!(options.camera.far, 1000.0);
        assert_eq!(options.clip_offsets, [-100.0; 3]);
        assert_eq!(options.legend.decimals, 2);
    }

    #[test]
    fn test_from_json_file() {
        let path = std::env::temp_dir().join(format!("cloudlens-options-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"colormap": "coolwarm", "property": "shape"}"#).unwrap();

        let options = Options::from_json_file(&path).unwrap();
        assert_eq!(options.colormap, ColorMapName::Coolwarm);
        assert_eq!(options.property, Property::Shape);

        std::fs::remove_file(&path).unwrap();
        assert!(Options::from_json_file(&path).is_err());
    }
}
