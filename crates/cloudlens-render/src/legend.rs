//! Color legend rasterization.
//!
//! The legend is a horizontal strip split into one flat segment per
//! gradient stop, with the range ends printed underneath.

use cloudlens_core::{ColorGradient, LegendConfig, ValueRange};
use image::{Rgba, RgbaImage};

const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;
const GLYPH_ADVANCE: u32 = GLYPH_WIDTH + 1;
const LABEL_PADDING: u32 = 2;

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
const TEXT: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Rows of a 5x7 glyph, most significant of the low five bits on the left.
fn glyph(c: char) -> [u8; 7] {
    match c {
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        '+' => [0x00, 0x04, 0x04, 0x1F, 0x04, 0x04, 0x00],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        'e' => [0x00, 0x00, 0x0E, 0x11, 0x1F, 0x10, 0x0E],
        'N' => [0x11, 0x19, 0x15, 0x13, 0x11, 0x11, 0x11],
        'a' => [0x00, 0x00, 0x0E, 0x01, 0x0F, 0x11, 0x0F],
        'i' => [0x04, 0x00, 0x0C, 0x04, 0x04, 0x04, 0x0E],
        'n' => [0x00, 0x00, 0x16, 0x19, 0x11, 0x11, 0x11],
        'f' => [0x06, 0x09, 0x08, 0x1C, 0x08, 0x08, 0x08],
        _ => [0; 7],
    }
}

/// Formats a range end with a fixed number of decimals.
pub fn format_label(value: f32, decimals: usize) -> String {
    format!("{value:.decimals$}")
}

/// Pixel width of `text` when rasterized.
pub fn text_width(text: &str) -> u32 {
    let n = u32::try_from(text.chars().count()).unwrap_or(u32::MAX);
    n.saturating_mul(GLYPH_ADVANCE).saturating_sub(1)
}

#[allow(clippy::cast_possible_truncation)]
fn draw_text(image: &mut RgbaImage, text: &str, x0: u32, y0: u32) {
    for (i, c) in text.chars().enumerate() {
        let gx = x0 + u32::try_from(i).unwrap_or(u32::MAX) * GLYPH_ADVANCE;
        for (row, bits) in glyph(c).iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if bits & (1 << (GLYPH_WIDTH - 1 - col)) == 0 {
                    continue;
                }
                let (x, y) = (gx + col, y0 + row as u32);
                if x < image.width() && y < image.height() {
                    image.put_pixel(x, y, TEXT);
                }
            }
        }
    }
}

/// A rasterized legend plus the strings printed on it.
#[derive(Debug, Clone)]
pub struct LegendImage {
    pub image: RgbaImage,
    pub min_label: String,
    pub max_label: String,
    /// Description of the property, shown by the host UI.
    pub explanation: String,
}

impl LegendImage {
    /// Attaches the dataset's explanation text.
    #[must_use]
    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = explanation.into();
        self
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Renders legends with a fixed strip size and label precision.
#[derive(Debug, Clone, Copy)]
pub struct LegendRenderer {
    config: LegendConfig,
}

impl LegendRenderer {
    pub fn new(config: LegendConfig) -> Self {
        Self { config }
    }

    /// Height of the label row below the strip.
    fn label_row_height() -> u32 {
        GLYPH_HEIGHT + 2 * LABEL_PADDING
    }

    /// Draws the strip and its range labels.
    ///
    /// Segment `i` covers pixels `[i * w / n, (i + 1) * w / n)` and is filled
    /// with stop `i` without interpolation. An empty gradient leaves the
    /// strip background-colored.
    #[allow(clippy::cast_possible_truncation)]
    pub fn render(&self, range: ValueRange, gradient: &ColorGradient) -> LegendImage {
        let width = self.config.width.max(1);
        let strip_height = self.config.height.max(1);
        let height = strip_height + Self::label_row_height();
        let mut image = RgbaImage::from_pixel(width, height, BACKGROUND);

        let stops = gradient.stops();
        if !stops.is_empty() {
            let n = stops.len() as u64;
            for x in 0..width {
                let segment = (u64::from(x) * n / u64::from(width)) as usize;
                let [r, g, b] = stops[segment].0;
                for y in 0..strip_height {
                    image.put_pixel(x, y, Rgba([r, g, b, 255]));
                }
            }
        }

        let min_label = format_label(range.min, self.config.decimals);
        let max_label = format_label(range.max, self.config.decimals);
        let text_y = strip_height + LABEL_PADDING;
        draw_text(&mut image, &min_label, LABEL_PADDING, text_y);
        let max_x = width.saturating_sub(text_width(&max_label) + LABEL_PADDING);
        draw_text(&mut image, &max_label, max_x, text_y);

        LegendImage {
            image,
            min_label,
            max_label,
            explanation: String::new(),
        }
    }
}

impl Default for LegendRenderer {
    fn default() -> Self {
        Self::new(LegendConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudlens_core::Rgb;

    fn renderer(width: u32) -> LegendRenderer {
        LegendRenderer::new(LegendConfig {
            width,
            height: 10,
            decimals: 2,
        })
    }

    #[test]
    fn test_segments_are_flat() {
        let gradient = ColorGradient::new(vec![Rgb([0, 0, 255]), Rgb([255, 0, 0])]);
        let legend = renderer(100).render(ValueRange::new(0.0, 10.0), &gradient);

        assert_eq!(*legend.image.get_pixel(0, 0), Rgba([0, 0, 255, 255]));
        assert_eq!(*legend.image.get_pixel(49, 5), Rgba([0, 0, 255, 255]));
        assert_eq!(*legend.image.get_pixel(50, 5), Rgba([255, 0, 0, 255]));
        assert_eq!(*legend.image.get_pixel(99, 9), Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn test_labels() {
        let gradient = ColorGradient::new(vec![Rgb([0, 0, 0]); 3]);
        let legend = renderer(200).render(ValueRange::new(-1.5, 10.0), &gradient);
        assert_eq!(legend.min_label, "-1.50");
        assert_eq!(legend.max_label, "10.00");

        let label_row = 10..legend.height();
        let inked = label_row
            .flat_map(|y| (0..legend.width()).map(move |x| (x, y)))
            .filter(|&(x, y)| *legend.image.get_pixel(x, y) == TEXT)
            .count();
        assert!(inked > 0);
    }

    #[test]
    fn test_empty_gradient_leaves_background() {
        let legend = renderer(64).render(ValueRange::new(0.0, 0.0), &ColorGradient::default());
        for x in 0..64 {
            assert_eq!(*legend.image.get_pixel(x, 0), BACKGROUND);
        }
        assert_eq!(legend.min_label, "0.00");
    }

    #[test]
    fn test_decimals_and_explanation() {
        let r = LegendRenderer::new(LegendConfig {
            decimals: 0,
            ..LegendConfig::default()
        });
        let legend = r
            .render(ValueRange::new(0.0, 3.7), &ColorGradient::default())
            .with_explanation("density");
        assert_eq!(legend.max_label, "4");
        assert_eq!(legend.explanation, "density");
        assert_eq!(text_width("4"), 5);
    }
}
