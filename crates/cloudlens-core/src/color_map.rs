//! Color mapping: scalar values through ordered gradients, plus label palettes.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::dataset::PointAttributes;
use crate::error::CloudlensError;

/// An 8-bit RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "[f64; 3]", into = "[u8; 3]")]
pub struct Rgb(pub [u8; 3]);

impl Rgb {
    /// Pure black, used when a gradient has no stops.
    pub const BLACK: Rgb = Rgb([0, 0, 0]);

    /// Returns the red channel.
    pub fn r(self) -> u8 {
        self.0[0]
    }

    /// Returns the green channel.
    pub fn g(self) -> u8 {
        self.0[1]
    }

    /// Returns the blue channel.
    pub fn b(self) -> u8 {
        self.0[2]
    }

    /// Channel-wise linear interpolation, rounding half up.
    pub fn lerp(self, other: Rgb, t: f32) -> Rgb {
        let mix = |a: u8, b: u8| -> u8 {
            let a = f32::from(a);
            let b = f32::from(b);
            round_channel(a + (b - a) * t)
        };
        Rgb([
            mix(self.0[0], other.0[0]),
            mix(self.0[1], other.0[1]),
            mix(self.0[2], other.0[2]),
        ])
    }

    /// Channels normalized to `[0, 1]` for GPU upload.
    pub fn to_unit_f32(self) -> [f32; 3] {
        [
            f32::from(self.0[0]) / 255.0,
            f32::from(self.0[1]) / 255.0,
            f32::from(self.0[2]) / 255.0,
        ]
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn round_channel(x: f32) -> u8 {
    (x + 0.5).floor().clamp(0.0, 255.0) as u8
}

impl TryFrom<[f64; 3]> for Rgb {
    type Error = String;

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn try_from(channels: [f64; 3]) -> Result<Self, Self::Error> {
        let mut out = [0u8; 3];
        for (dst, &c) in out.iter_mut().zip(channels.iter()) {
            if !c.is_finite() || !(0.0..=255.0).contains(&c) {
                return Err(format!("color channel {c} outside [0, 255]"));
            }
            *dst = c.round() as u8;
        }
        Ok(Rgb(out))
    }
}

impl From<Rgb> for [u8; 3] {
    fn from(color: Rgb) -> Self {
        color.0
    }
}

/// The `[min, max]` interval a gradient is stretched over.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f32,
    pub max: f32,
}

impl ValueRange {
    /// Creates a range. Reversed ends are swapped so that `min <= max` holds.
    pub fn new(min: f32, max: f32) -> Self {
        if min > max {
            Self { min: max, max: min }
        } else {
            Self { min, max }
        }
    }

    /// Whether the range has zero width.
    pub fn is_degenerate(&self) -> bool {
        self.max <= self.min || self.min.is_nan() || self.max.is_nan()
    }

    /// Position of `value` inside the range, clamped to `[0, 1]`.
    ///
    /// A zero-width range and NaN inputs both normalize to 0.
    #[allow(clippy::cast_possible_truncation)]
    pub fn normalize(&self, value: f32) -> f32 {
        if self.is_degenerate() || value.is_nan() {
            return 0.0;
        }
        // f64 keeps `max - min` finite for extreme f32 ranges.
        let width = f64::from(self.max) - f64::from(self.min);
        let t = (f64::from(value) - f64::from(self.min)) / width;
        t.clamp(0.0, 1.0) as f32
    }
}

/// An ordered list of color stops, evenly spaced from `min` to `max`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColorGradient {
    stops: Vec<Rgb>,
}

impl ColorGradient {
    /// Creates a gradient from its stops.
    ///
    /// Fewer than two stops is accepted; such gradients map every value to
    /// their single stop, or to black when empty.
    pub fn new(stops: Vec<Rgb>) -> Self {
        Self { stops }
    }

    /// Returns the stops.
    pub fn stops(&self) -> &[Rgb] {
        &self.stops
    }

    /// Returns the number of stops.
    pub fn len(&self) -> usize {
        self.stops.len()
    }

    /// Returns true if there are no stops.
    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    /// Whether the gradient is too short to interpolate.
    pub fn is_degenerate(&self) -> bool {
        self.stops.len() < 2
    }
}

/// Maps a scalar to a color by interpolating between the two stops that
/// bracket its normalized position.
///
/// `value <= range.min` yields exactly the first stop and `value >=
/// range.max` exactly the last one.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn map_value(value: f32, range: ValueRange, gradient: &ColorGradient) -> Rgb {
    let stops = gradient.stops();
    match stops {
        [] => return Rgb::BLACK,
        [only] => return *only,
        _ => {}
    }

    let last = stops.len() - 1;
    let t = range.normalize(value);
    if t <= 0.0 {
        return stops[0];
    }
    if t >= 1.0 {
        return stops[last];
    }

    let scaled = t * last as f32;
    let idx = (scaled.floor() as usize).min(last - 1);
    let frac = scaled - idx as f32;
    stops[idx].lerp(stops[idx + 1], frac)
}

/// Maps every value through [`map_value`]. The output has one color per input.
pub fn build_color_buffer(values: &[f32], range: ValueRange, gradient: &ColorGradient) -> Vec<Rgb> {
    values
        .iter()
        .map(|&v| map_value(v, range, gradient))
        .collect()
}

/// Per-point colors for any attribute kind.
///
/// Precomputed colors pass through unchanged, scalars go through
/// [`build_color_buffer`] and labels through a [`LabelPalette`].
pub fn resolve_colors(attributes: &PointAttributes, range: ValueRange, gradient: &ColorGradient) -> Vec<Rgb> {
    match attributes {
        PointAttributes::Colors(colors) => colors.clone(),
        PointAttributes::Scalars(values) => build_color_buffer(values, range, gradient),
        PointAttributes::Labels(labels) => LabelPalette::from_labels(labels).build_color_buffer(labels),
    }
}

/// Closed set of colormap names understood by the selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMapName {
    #[default]
    Viridis,
    Coolwarm,
    Rainbow,
    Blues,
    Reds,
    Jet,
    Grays,
}

impl ColorMapName {
    /// All recognized names, in selector order.
    pub const ALL: [ColorMapName; 7] = [
        ColorMapName::Viridis,
        ColorMapName::Coolwarm,
        ColorMapName::Rainbow,
        ColorMapName::Blues,
        ColorMapName::Reds,
        ColorMapName::Jet,
        ColorMapName::Grays,
    ];

    /// The name as sent to the data provider.
    pub fn as_str(self) -> &'static str {
        match self {
            ColorMapName::Viridis => "viridis",
            ColorMapName::Coolwarm => "coolwarm",
            ColorMapName::Rainbow => "rainbow",
            ColorMapName::Blues => "blues",
            ColorMapName::Reds => "reds",
            ColorMapName::Jet => "jet",
            ColorMapName::Grays => "grays",
        }
    }

    /// Local gradient used when a response carries none.
    pub fn builtin_gradient(self) -> ColorGradient {
        let stops = match self {
            ColorMapName::Viridis => vec![
                Rgb([68, 1, 84]),
                Rgb([72, 36, 117]),
                Rgb([65, 68, 135]),
                Rgb([53, 95, 141]),
                Rgb([42, 120, 142]),
                Rgb([32, 144, 140]),
                Rgb([34, 168, 132]),
                Rgb([68, 191, 112]),
                Rgb([122, 209, 81]),
                Rgb([189, 223, 38]),
                Rgb([253, 231, 37]),
            ],
            ColorMapName::Coolwarm => vec![
                Rgb([59, 76, 192]),
                Rgb([141, 176, 254]),
                Rgb([221, 221, 221]),
                Rgb([244, 154, 124]),
                Rgb([180, 4, 38]),
            ],
            ColorMapName::Rainbow => vec![
                Rgb([128, 0, 255]),
                Rgb([0, 0, 255]),
                Rgb([0, 255, 255]),
                Rgb([0, 255, 0]),
                Rgb([255, 255, 0]),
                Rgb([255, 0, 0]),
            ],
            ColorMapName::Blues => vec![
                Rgb([247, 251, 255]),
                Rgb([222, 235, 247]),
                Rgb([198, 219, 239]),
                Rgb([158, 202, 225]),
                Rgb([107, 174, 214]),
                Rgb([66, 146, 198]),
                Rgb([33, 113, 181]),
                Rgb([8, 81, 156]),
                Rgb([8, 48, 107]),
            ],
            ColorMapName::Reds => vec![
                Rgb([255, 245, 240]),
                Rgb([254, 224, 210]),
                Rgb([252, 187, 161]),
                Rgb([252, 146, 114]),
                Rgb([251, 106, 74]),
                Rgb([239, 59, 44]),
                Rgb([203, 24, 29]),
                Rgb([165, 15, 21]),
                Rgb([103, 0, 13]),
            ],
            ColorMapName::Jet => vec![
                Rgb([0, 0, 128]),
                Rgb([0, 0, 255]),
                Rgb([0, 255, 255]),
                Rgb([255, 255, 0]),
                Rgb([255, 0, 0]),
                Rgb([128, 0, 0]),
            ],
            ColorMapName::Grays => vec![Rgb([0, 0, 0]), Rgb([255, 255, 255])],
        };
        ColorGradient::new(stops)
    }
}

impl fmt::Display for ColorMapName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColorMapName {
    type Err = CloudlensError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ColorMapName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| CloudlensError::UnknownColorMap(s.to_string()))
    }
}

/// Assigns evenly spaced hues to distinct labels in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct LabelPalette {
    order: Vec<i64>,
    colors: HashMap<i64, Rgb>,
}

impl LabelPalette {
    /// Builds a palette over the distinct labels of `labels`.
    #[allow(clippy::cast_precision_loss)]
    pub fn from_labels(labels: &[i64]) -> Self {
        let mut seen = HashSet::new();
        let order: Vec<i64> = labels.iter().copied().filter(|l| seen.insert(*l)).collect();

        let n = order.len() as f32;
        let colors = order
            .iter()
            .enumerate()
            .map(|(i, &label)| (label, hsl_to_rgb(i as f32 / n * 360.0, 1.0, 0.5)))
            .collect();

        Self { order, colors }
    }

    /// Returns the number of distinct labels.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true if no labels were seen.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Distinct labels in first-seen order.
    pub fn labels(&self) -> &[i64] {
        &self.order
    }

    /// Color of a label, if it was part of the palette.
    pub fn color_of(&self, label: i64) -> Option<Rgb> {
        self.colors.get(&label).copied()
    }

    /// Color of the `index`-th distinct label.
    pub fn color_at(&self, index: usize) -> Option<Rgb> {
        self.order.get(index).and_then(|&l| self.color_of(l))
    }

    /// Colors every point by its label. Unknown labels fall back to black.
    pub fn build_color_buffer(&self, labels: &[i64]) -> Vec<Rgb> {
        labels
            .iter()
            .map(|&l| self.color_of(l).unwrap_or(Rgb::BLACK))
            .collect()
    }
}

/// Converts HSL (hue in degrees, saturation and lightness in `[0, 1]`).
pub fn hsl_to_rgb(hue: f32, saturation: f32, lightness: f32) -> Rgb {
    let h = hue.rem_euclid(360.0) / 60.0;
    let c = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
    let x = c * (1.0 - (h % 2.0 - 1.0).abs());
    let (r, g, b) = match h {
        h if h < 1.0 => (c, x, 0.0),
        h if h < 2.0 => (x, c, 0.0),
        h if h < 3.0 => (0.0, c, x),
        h if h < 4.0 => (0.0, x, c),
        h if h < 5.0 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = lightness - c / 2.0;
    Rgb([
        round_channel((r + m) * 255.0),
        round_channel((g + m) * 255.0),
        round_channel((b + m) * 255.0),
    ])
}
