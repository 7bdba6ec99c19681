//! Image preparation: raw asset bytes → baseline RGB JPEG ready to embed.
//!
//! Every source format (PNG, GIF, WebP, BMP, JPEG with odd colour models) is
//! normalised to 8-bit RGB JPEG so the PDF writer only ever emits one kind
//! of image XObject (`/DCTDecode`, `/DeviceRGB`). Layout uses the source's
//! own pixel dimensions; downscaling for embedding keeps the aspect ratio.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use tracing::debug;

/// A decoded image, re-encoded for embedding.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    /// Pixel size of the original asset.
    pub source_width: u32,
    pub source_height: u32,
    /// Pixel size of the embedded JPEG (≤ source).
    pub width: u32,
    pub height: u32,
    pub jpeg: Vec<u8>,
}

/// Decode `bytes`, cap the longest edge at `max_pixels`, and encode as JPEG.
///
/// CPU-bound; call from `spawn_blocking` (see [`prepare_image_async`]).
pub fn prepare_image(bytes: &[u8], max_pixels: u32, quality: u8) -> Result<PreparedImage, image::ImageError> {
    let img = image::load_from_memory(bytes)?;
    let (source_width, source_height) = (img.width(), img.height());

    let img = if source_width.max(source_height) > max_pixels {
        img.resize(max_pixels, max_pixels, FilterType::Triangle)
    } else {
        img
    };

    let rgb = img.to_rgb8();
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality).encode_image(&rgb)?;

    debug!(
        "Prepared {}x{} → {}x{} JPEG ({} bytes)",
        source_width,
        source_height,
        rgb.width(),
        rgb.height(),
        jpeg.len()
    );

    Ok(PreparedImage {
        source_width,
        source_height,
        width: rgb.width(),
        height: rgb.height(),
        jpeg,
    })
}

/// [`prepare_image`] on the blocking thread pool.
///
/// Decoding a 12-megapixel photo takes long enough to stall a Tokio worker,
/// so it is moved off the async executor. A panicking decoder surfaces as an
/// error string rather than tearing down the run.
pub async fn prepare_image_async(bytes: Vec<u8>, max_pixels: u32, quality: u8) -> Result<PreparedImage, String> {
    tokio::task::spawn_blocking(move || prepare_image(&bytes, max_pixels, quality))
        .await
        .map_err(|e| format!("decode task panicked: {e}"))?
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png(w: u32, h: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([200, 10, 10, 128])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
        buf
    }

    #[test]
    fn prepares_png_as_jpeg() {
        let prepared = prepare_image(&png(40, 20), 2400, 85).expect("prepare should succeed");
        assert_eq!((prepared.source_width, prepared.source_height), (40, 20));
        assert_eq!((prepared.width, prepared.height), (40, 20));
        // JPEG SOI marker
        assert_eq!(&prepared.jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn downscales_longest_edge() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(400, 100, Rgb([1, 2, 3])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();

        let prepared = prepare_image(&buf, 100, 80).unwrap();
        assert_eq!((prepared.source_width, prepared.source_height), (400, 100));
        assert_eq!(prepared.width, 100);
        assert_eq!(prepared.height, 25);
    }

    #[test]
    fn garbage_fails_to_decode() {
        assert!(prepare_image(b"definitely not an image", 2400, 85).is_err());
    }

    #[tokio::test]
    async fn async_wrapper_reports_errors_as_strings() {
        let err = prepare_image_async(b"nope".to_vec(), 2400, 85).await.unwrap_err();
        assert!(!err.is_empty());
    }
}
