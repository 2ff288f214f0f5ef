//! Saving captured frames and legends to disk.

use std::path::Path;

use image::{ImageBuffer, Rgba};

/// Swaps the red and blue channels of 4-byte pixels in place.
pub fn bgra_to_rgba(data: &mut [u8]) {
    for chunk in data.chunks_exact_mut(4) {
        chunk.swap(0, 2);
    }
}

/// Saves RGBA pixel data as PNG or JPEG, chosen by the file extension.
pub fn save_image(
    path: impl AsRef<Path>,
    rgba: &[u8],
    width: u32,
    height: u32,
) -> Result<(), ScreenshotError> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    let img: ImageBuffer<Rgba<u8>, Vec<u8>> = ImageBuffer::from_raw(width, height, rgba.to_vec())
        .ok_or(ScreenshotError::InvalidImageData)?;

    match extension.as_str() {
        "png" => img.save_with_format(path, image::ImageFormat::Png)?,
        "jpg" | "jpeg" => {
            // JPEG has no alpha channel.
            let rgb = image::DynamicImage::ImageRgba8(img).to_rgb8();
            rgb.save_with_format(path, image::ImageFormat::Jpeg)?;
        }
        _ => return Err(ScreenshotError::UnsupportedFormat(extension)),
    }

    Ok(())
}

/// Error type for frame capture and image output.
#[derive(Debug, thiserror::Error)]
pub enum ScreenshotError {
    #[error("Failed to save image: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Image encoding error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid image data")]
    InvalidImageData,

    #[error("GPU buffer mapping failed")]
    BufferMapFailed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bgra_swap() {
        let mut px = vec![1, 2, 3, 4, 5, 6, 7, 8];
        bgra_to_rgba(&mut px);
        assert_eq!(px, vec![3, 2, 1, 4, 7, 6, 5, 8]);
    }

    #[test]
    fn test_save_png_round_trip() {
        let path = std::env::temp_dir().join(format!("cloudlens-shot-{}.png", std::process::id()));
        let pixels = [255u8, 0, 0, 255, 0, 255, 0, 255];
        save_image(&path, &pixels, 2, 1).unwrap();

        let loaded = image::open(&path).unwrap().to_rgba8();
        assert_eq!(loaded.dimensions(), (2, 1));
        assert_eq!(loaded.get_pixel(1, 0).0, [0, 255, 0, 255]);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_rejects_bad_input() {
        let dir = std::env::temp_dir();
        assert!(matches!(
            save_image(dir.join("x.bmp"), &[0; 4], 1, 1),
            Err(ScreenshotError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            save_image(dir.join("x.png"), &[0; 3], 1, 1),
            Err(ScreenshotError::InvalidImageData)
        ));
    }
}
