//! Dataset model and the JSON response schema it is built from.

use std::fmt;
use std::str::FromStr;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::color_map::{resolve_colors, ColorGradient, ColorMapName, LabelPalette, Rgb, ValueRange};
use crate::ellipsoid::{
    build_all, Covariance, EllipsoidTransform, GaussianComponent, DEFAULT_ELLIPSOID_COLOR,
};
use crate::error::{CloudlensError, Result};

/// Scalar property a dataset can be colored by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Property {
    #[default]
    Density,
    Shape,
}

impl Property {
    pub const ALL: [Property; 2] = [Property::Density, Property::Shape];

    pub fn as_str(self) -> &'static str {
        match self {
            Property::Density => "density",
            Property::Shape => "shape",
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Property {
    type Err = CloudlensError;

    fn from_str(s: &str) -> Result<Self> {
        Property::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| CloudlensError::UnknownProperty(s.to_string()))
    }
}

/// Per-point attributes. Exactly one kind is carried per dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum PointAttributes {
    /// Scalar values mapped through a gradient.
    Scalars(Vec<f32>),
    /// Precomputed colors, used as-is.
    Colors(Vec<Rgb>),
    /// Cluster labels, colored by a [`LabelPalette`].
    Labels(Vec<i64>),
}

impl PointAttributes {
    pub fn len(&self) -> usize {
        match self {
            PointAttributes::Scalars(v) => v.len(),
            PointAttributes::Colors(v) => v.len(),
            PointAttributes::Labels(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Positions plus one parallel attribute sequence of the same length.
#[derive(Debug, Clone, PartialEq)]
pub struct PointCloud {
    positions: Vec<Vec3>,
    attributes: PointAttributes,
}

impl PointCloud {
    /// Creates a point cloud, rejecting attribute sequences of the wrong length.
    pub fn new(positions: Vec<Vec3>, attributes: PointAttributes) -> Result<Self> {
        if attributes.len() != positions.len() {
            return Err(CloudlensError::SizeMismatch {
                expected: positions.len(),
                actual: attributes.len(),
            });
        }
        Ok(Self {
            positions,
            attributes,
        })
    }

    /// A cloud with no points.
    pub fn empty() -> Self {
        Self {
            positions: Vec::new(),
            attributes: PointAttributes::Scalars(Vec::new()),
        }
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn attributes(&self) -> &PointAttributes {
        &self.attributes
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Axis-aligned bounds, or `None` for an empty cloud.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let first = *self.positions.first()?;
        Some(
            self.positions
                .iter()
                .fold((first, first), |(lo, hi), &p| (lo.min(p), hi.max(p))),
        )
    }
}

/// Affine map `p -> (p - center) * scale` that fits a cloud into a
/// `[-extent/2, extent/2]` cube.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalization {
    pub center: Vec3,
    pub scale: f32,
}

impl Normalization {
    /// The identity map.
    pub const IDENTITY: Normalization = Normalization {
        center: Vec3::ZERO,
        scale: 1.0,
    };

    /// Fits the bounding box `[lo, hi]` so its longest side spans `extent`.
    pub fn fit(lo: Vec3, hi: Vec3, extent: f32) -> Self {
        let longest = (hi - lo).max_element();
        let scale = if longest > 0.0 { extent / longest } else { 1.0 };
        Self {
            center: (lo + hi) * 0.5,
            scale,
        }
    }

    pub fn apply_point(&self, p: Vec3) -> Vec3 {
        (p - self.center) * self.scale
    }

    /// Covariances scale with the square of the positional scale.
    pub fn apply_covariance(&self, c: &Covariance) -> Covariance {
        let s2 = f64::from(self.scale) * f64::from(self.scale);
        let mut out = c.0;
        for row in &mut out {
            for v in row.iter_mut() {
                *v *= s2;
            }
        }
        Covariance(out)
    }
}

/// `gaussians` block of a point cloud response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GaussianResponse {
    pub means: Vec<[f32; 3]>,
    pub covariances: Vec<Vec<Vec<f64>>>,
}

/// Body of `GET pointcloud?colormap=&dataname=&property=`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointCloudResponse {
    pub point_cloud: Vec<[f32; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colors: Option<Vec<Rgb>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<f32>>,
    #[serde(default)]
    pub min_value: f32,
    #[serde(default)]
    pub max_value: f32,
    #[serde(default)]
    pub explanation_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_gradient: Option<ColorGradient>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gaussians: Option<GaussianResponse>,
}

/// Body of `GET data_names`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataNamesResponse {
    pub data_name: Vec<String>,
}

impl DataNamesResponse {
    /// The first listed name, if any.
    pub fn default_selection(&self) -> Option<&str> {
        self.data_name.first().map(String::as_str)
    }
}

/// Everything needed to render one dataset selection.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub cloud: PointCloud,
    pub range: ValueRange,
    pub gradient: ColorGradient,
    pub explanation: String,
    pub gaussians: Vec<GaussianComponent>,
}

impl Dataset {
    /// An empty dataset with a degenerate legend.
    pub fn empty() -> Self {
        Self {
            cloud: PointCloud::empty(),
            range: ValueRange::new(0.0, 0.0),
            gradient: ColorGradient::default(),
            explanation: String::new(),
            gaussians: Vec::new(),
        }
    }

    /// Validates a response and turns it into a dataset.
    ///
    /// Attribute precedence is `colors`, then `values`, then `labels`. When
    /// the response has no gradient the built-in one for `colormap` is used.
    pub fn from_response(response: PointCloudResponse, colormap: ColorMapName) -> Result<Self> {
        let PointCloudResponse {
            point_cloud,
            colors,
            values,
            min_value,
            max_value,
            explanation_text,
            color_gradient,
            labels,
            gaussians,
        } = response;

        let positions: Vec<Vec3> = point_cloud.into_iter().map(Vec3::from_array).collect();

        let attributes = if let Some(colors) = colors {
            PointAttributes::Colors(colors)
        } else if let Some(values) = values {
            PointAttributes::Scalars(values)
        } else if let Some(labels) = labels {
            PointAttributes::Labels(labels)
        } else if positions.is_empty() {
            PointAttributes::Scalars(Vec::new())
        } else {
            return Err(CloudlensError::MalformedResponse(
                "response has points but no colors, values or labels".to_string(),
            ));
        };

        let cloud = PointCloud::new(positions, attributes)?;
        let gaussians = match gaussians {
            Some(g) => parse_gaussians(g, &cloud)?,
            None => Vec::new(),
        };

        Ok(Self {
            cloud,
            range: ValueRange::new(min_value, max_value),
            gradient: color_gradient.unwrap_or_else(|| colormap.builtin_gradient()),
            explanation: explanation_text,
            gaussians,
        })
    }

    /// Per-point colors for the current attributes.
    pub fn colors(&self) -> Vec<Rgb> {
        resolve_colors(self.cloud.attributes(), self.range, &self.gradient)
    }

    /// Ellipsoid colors: component `i` takes the `i`-th distinct label's
    /// color, or an evenly spaced hue when the cloud has no labels.
    pub fn ellipsoid_colors(&self) -> Vec<Rgb> {
        let palette = match self.cloud.attributes() {
            PointAttributes::Labels(labels) => LabelPalette::from_labels(labels),
            _ => {
                let indices: Vec<i64> = (0..self.gaussians.len())
                    .map(|i| i64::try_from(i).unwrap_or(i64::MAX))
                    .collect();
                LabelPalette::from_labels(&indices)
            }
        };
        self.gaussians
            .iter()
            .enumerate()
            .map(|(i, g)| {
                g.label
                    .and_then(|l| palette.color_of(l))
                    .or_else(|| palette.color_at(i))
                    .unwrap_or(DEFAULT_ELLIPSOID_COLOR)
            })
            .collect()
    }

    /// Builds the valid ellipsoids, skipping invalid components.
    pub fn ellipsoids(&self) -> Vec<EllipsoidTransform> {
        build_all(&self.gaussians, &self.ellipsoid_colors())
    }

    /// Recenters and rescales positions and Gaussians so the cloud's
    /// longest side spans `extent`. Returns the map that was applied.
    pub fn normalize(&mut self, extent: f32) -> Normalization {
        let Some((lo, hi)) = self.cloud.bounds() else {
            return Normalization::IDENTITY;
        };
        let norm = Normalization::fit(lo, hi, extent);
        for p in &mut self.cloud.positions {
            *p = norm.apply_point(*p);
        }
        for g in &mut self.gaussians {
            g.mean = norm.apply_point(g.mean);
            g.covariance = norm.apply_covariance(&g.covariance);
        }
        norm
    }
}

/// Pairs means with covariances. Components with a malformed matrix are
/// kept with a non-finite covariance so that ellipsoid building skips them.
fn parse_gaussians(response: GaussianResponse, cloud: &PointCloud) -> Result<Vec<GaussianComponent>> {
    if response.means.len() != response.covariances.len() {
        return Err(CloudlensError::SizeMismatch {
            expected: response.means.len(),
            actual: response.covariances.len(),
        });
    }

    let palette = match cloud.attributes() {
        PointAttributes::Labels(labels) => LabelPalette::from_labels(labels),
        _ => LabelPalette::default(),
    };

    Ok(response
        .means
        .into_iter()
        .zip(response.covariances)
        .enumerate()
        .map(|(i, (mean, rows))| {
            let covariance = Covariance::from_rows(&rows).unwrap_or_else(|e| {
                log::warn!("Gaussian component {i}: {e}");
                Covariance([[f64::NAN; 3]; 3])
            });
            let mut component = GaussianComponent::new(Vec3::from_array(mean), covariance);
            if let Some(&label) = palette.labels().get(i) {
                component = component.with_label(label);
            }
            component
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE: &str = r#"{
        "point_cloud": [[0, 0, 0], [1, 2, 3], [-4, 5, 6]],
        "values": [0.0, 5.0, 10.0],
        "min_value": 0.0,
        "max_value": 10.0,
        "explanation_text": "Local point density",
        "color_gradient": [[0, 0, 255], [255, 0, 0]]
    }"#;

    #[test]
    fn test_parse_scalar_response() {
        let response: PointCloudResponse = serde_json::from_str(RESPONSE).unwrap();
        let dataset = Dataset::from_response(response, ColorMapName::Viridis).unwrap();

        assert_eq!(dataset.cloud.len(), 3);
        assert_eq!(dataset.explanation, "Local point density");
        assert_eq!(
            dataset.colors(),
            vec![Rgb([0, 0, 255]), Rgb([128, 0, 128]), Rgb([255, 0, 0])]
        );
    }

    #[test]
    fn test_colors_take_precedence() {
        let mut response: PointCloudResponse = serde_json::from_str(RESPONSE).unwrap();
        response.colors = Some(vec![Rgb([1, 2, 3]); 3]);
        let dataset = Dataset::from_response(response, ColorMapName::Viridis).unwrap();
        assert_eq!(dataset.colors(), vec![Rgb([1, 2, 3]); 3]);
    }

    #[test]
    fn test_length_mismatch_is_rejected() {
        let mut response: PointCloudResponse = serde_json::from_str(RESPONSE).unwrap();
        response.values = Some(vec![1.0, 2.0]);
        let err = Dataset::from_response(response, ColorMapName::Viridis).unwrap_err();
        assert!(matches!(
            err,
            CloudlensError::SizeMismatch {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_missing_gradient_uses_builtin() {
        let mut response: PointCloudResponse = serde_json::from_str(RESPONSE).unwrap();
        response.color_gradient = None;
        let dataset = Dataset::from_response(response, ColorMapName::Reds).unwrap();
        assert_eq!(dataset.gradient, ColorMapName::Reds.builtin_gradient());
    }

    #[test]
    fn test_empty_response() {
        let response: PointCloudResponse =
            serde_json::from_str(r#"{"point_cloud": [], "color_gradient": []}"#).unwrap();
        let dataset = Dataset::from_response(response, ColorMapName::Viridis).unwrap();
        assert!(dataset.cloud.is_empty());
        assert!(dataset.colors().is_empty());
        assert!(dataset.gradient.is_empty());
    }

    #[test]
    fn test_points_without_attributes_are_malformed() {
        let response: PointCloudResponse =
            serde_json::from_str(r#"{"point_cloud": [[0, 0, 0]]}"#).unwrap();
        assert!(matches!(
            Dataset::from_response(response, ColorMapName::Viridis),
            Err(CloudlensError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_labelled_gaussians() {
        let json = r#"{
            "point_cloud": [[0, 0, 0], [1, 1, 1], [2, 2, 2]],
            "labels": [4, 9, 4],
            "gaussians": {
                "means": [[0, 0, 0], [1, 1, 1], [2, 2, 2]],
                "covariances": [
                    [[1, 0, 0], [0, 1, 0], [0, 0, 1]],
                    [[4, 0, 0], [0, 4, 0], [0, 0, 4]],
                    [[1, 0], [0, 1]]
                ]
            }
        }"#;
        let response: PointCloudResponse = serde_json::from_str(json).unwrap();
        let dataset = Dataset::from_response(response, ColorMapName::Viridis).unwrap();

        assert_eq!(dataset.gaussians.len(), 3);
        assert_eq!(dataset.gaussians[0].label, Some(4));
        assert_eq!(dataset.gaussians[1].label, Some(9));
        assert_eq!(dataset.gaussians[2].label, None);

        let colors = dataset.colors();
        assert_eq!(colors[0], Rgb([255, 0, 0]));
        assert_eq!(colors[1], Rgb([0, 255, 255]));

        // The 2x2 matrix is skipped.
        let ellipsoids = dataset.ellipsoids();
        assert_eq!(ellipsoids.len(), 2);
        assert_eq!(ellipsoids[0].color, Rgb([255, 0, 0]));
        assert_eq!(ellipsoids[1].color, Rgb([0, 255, 255]));
    }

    #[test]
    fn test_normalize_fits_extent() {
        let cloud = PointCloud::new(
            vec![Vec3::new(10.0, 0.0, 0.0), Vec3::new(30.0, 5.0, 2.0)],
            PointAttributes::Scalars(vec![0.0, 1.0]),
        )
        .unwrap();
        let mut dataset = Dataset {
            cloud,
            gaussians: vec![GaussianComponent::new(
                Vec3::new(20.0, 2.5, 1.0),
                Covariance::diagonal([1.0, 1.0, 1.0]),
            )],
            ..Dataset::empty()
        };

        let norm = dataset.normalize(100.0);
        assert_eq!(norm.scale, 5.0);
        assert_eq!(dataset.cloud.positions()[0], Vec3::new(-50.0, -12.5, -5.0));
        assert_eq!(dataset.gaussians[0].mean, Vec3::ZERO);
        assert_eq!(dataset.gaussians[0].covariance, Covariance::diagonal([25.0; 3]));
    }

    #[test]
    fn test_property_and_data_names() {
        assert_eq!("shape".parse::<Property>().unwrap(), Property::Shape);
        assert!("volume".parse::<Property>().is_err());

        let names: DataNamesResponse =
            serde_json::from_str(r#"{"data_name": ["day19", "day20"]}"#).unwrap();
        assert_eq!(names.default_selection(), Some("day19"));
        assert_eq!(DataNamesResponse::default().default_selection(), None);
    }
}
