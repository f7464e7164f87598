//! Frame encoding: image file → downscaled base64 PNG wrapped in `ImageData`.
//!
//! Zero-shot classification only needs the gist of a frame (is this a
//! slide, a face, a blurred transition?), so frames are shrunk to fit
//! within [`CLASSIFY_MAX_EDGE`] pixels and sent with `detail: "low"`. That
//! keeps each request to a single image tile.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Longest edge, in pixels, of a frame sent for classification.
pub const CLASSIFY_MAX_EDGE: u32 = 512;

/// Encode a decoded frame as a base64 PNG no larger than `max_edge` on either side.
pub fn encode_frame(img: &DynamicImage, max_edge: u32) -> Result<ImageData, image::ImageError> {
    let scaled;
    let img = if img.width() > max_edge || img.height() > max_edge {
        scaled = img.thumbnail(max_edge, max_edge);
        &scaled
    } else {
        img
    };

    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!(
        "Encoded {}x{} frame → {} bytes base64",
        img.width(),
        img.height(),
        b64.len()
    );

    Ok(ImageData::new(b64, "image/png").with_detail("low"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn small_frame_is_not_resized() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let data = encode_frame(&img, CLASSIFY_MAX_EDGE).expect("encode should succeed");
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        let back = image::load_from_memory(&decoded).unwrap();
        assert_eq!((back.width(), back.height()), (10, 10));
    }

    #[test]
    fn large_frame_is_downscaled_preserving_aspect() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(1280, 720, Rgba([0, 0, 0, 255])));
        let data = encode_frame(&img, 512).unwrap();
        let decoded = STANDARD.decode(&data.data).unwrap();
        let back = image::load_from_memory(&decoded).unwrap();
        assert_eq!(back.width(), 512);
        assert!(back.height() <= 512);
        assert!(back.height() >= 287 && back.height() <= 289);
    }
}
