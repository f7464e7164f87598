//! Perceptual hashing: a 64-bit average hash (aHash) and Hamming distance.
//!
//! The image is reduced to an 8×8 grayscale grid by area averaging, then each
//! of the 64 cells emits one bit: `1` if it is brighter than the grid mean.
//! The first cell (top-left) is the most significant bit, so the hex form
//! reads in raster order.
//!
//! Degenerate inputs (undecodable files, images under the configured minimum
//! size) hash to the all-zero sentinel instead of failing. Corrupt frames
//! then look identical to each other and collapse during dedup rather than
//! sinking the selection pass.

use crate::error::FrameError;
use crate::outcome::Outcome;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::warn;

const GRID: u32 = 8;

/// A 64-bit perceptual fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ImageHash(u64);

impl ImageHash {
    /// Sentinel fingerprint for degenerate or unreadable images.
    pub const ZERO: ImageHash = ImageHash(0);

    pub fn from_bits(bits: u64) -> Self {
        ImageHash(bits)
    }

    pub fn bits(self) -> u64 {
        self.0
    }

    /// Hamming distance: the number of differing bits (0–64).
    pub fn distance(self, other: ImageHash) -> u32 {
        (self.0 ^ other.0).count_ones()
    }

    /// 16 lowercase hex characters.
    pub fn to_hex(self) -> String {
        format!("{:016x}", self.0)
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != 16 {
            return None;
        }
        u64::from_str_radix(hex, 16).ok().map(ImageHash)
    }
}

impl fmt::Display for ImageHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Hamming distance between two fingerprints.
pub fn distance(a: ImageHash, b: ImageHash) -> u32 {
    a.distance(b)
}

/// Hash a decoded image. Images smaller than `min_dimension` on either side
/// yield [`ImageHash::ZERO`].
pub fn hash_image(img: &DynamicImage, min_dimension: u32) -> ImageHash {
    if img.width() < min_dimension || img.height() < min_dimension {
        return ImageHash::ZERO;
    }

    let gray = img.to_luma8();
    let grid = image::imageops::thumbnail(&gray, GRID, GRID);
    let samples = grid.as_raw();

    let mean = samples.iter().map(|&v| f64::from(v)).sum::<f64>() / samples.len() as f64;

    let mut bits = 0u64;
    for (i, &v) in samples.iter().enumerate() {
        if f64::from(v) > mean {
            bits |= 1u64 << (63 - i);
        }
    }
    ImageHash(bits)
}

/// Decode and hash an image file. Never fails: decode errors degrade to the
/// zero sentinel and carry the reason.
pub fn hash_file(path: &Path, min_dimension: u32) -> Outcome<ImageHash> {
    match image::open(path) {
        Ok(img) => Outcome::Ok(hash_image(&img, min_dimension)),
        Err(e) => {
            let err = FrameError::Hash {
                path: path.to_path_buf(),
                detail: e.to_string(),
            };
            warn!("{}", err);
            Outcome::degraded(ImageHash::ZERO, err.to_string())
        }
    }
}

/// [`hash_file`] on the blocking pool; decoding is CPU-bound.
pub async fn hash_file_async(path: &Path, min_dimension: u32) -> Outcome<ImageHash> {
    let owned = path.to_path_buf();
    match tokio::task::spawn_blocking(move || hash_file(&owned, min_dimension)).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!("Hash task panicked for {}: {}", path.display(), e);
            Outcome::degraded(ImageHash::ZERO, format!("hash task panicked: {e}"))
        }
    }
}
