//! Bounded-size JPEG thumbnails for stored images.
//!
//! Thumbnailing is best-effort: callers log a [`ThumbnailError`] and carry
//! on, the original upload stays stored either way.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageReader, Limits};
use std::{
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};
use thiserror::Error;
use uuid::Uuid;

/// Longest side of a generated thumbnail, in pixels.
pub const THUMBNAIL_MAX_DIM: u32 = 512;

/// JPEG quality used for thumbnails.
pub const THUMBNAIL_QUALITY: u8 = 80;

/// Per-side limit applied while decoding, against decompression bombs.
const MAX_DECODE_DIMENSION: u32 = 16384;

#[derive(Debug, Error)]
pub enum ThumbnailError {
    #[error("could not read source image: {0}")]
    Io(#[from] io::Error),
    #[error("could not decode source image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("source image has zero area ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },
    #[error("could not encode thumbnail: {0}")]
    Encode(#[source] image::ImageError),
    #[error("thumbnail worker failed: {0}")]
    Worker(String),
}

/// Compute the thumbnail size for a `width` x `height` source.
///
/// The longer side becomes `max_dim`, the shorter side is scaled by the same
/// factor and rounded to the nearest pixel. Neither side drops below 1px.
/// Returns `None` for zero-area sources.
pub fn fit_dimensions(width: u32, height: u32, max_dim: u32) -> Option<(u32, u32)> {
    if width == 0 || height == 0 || max_dim == 0 {
        return None;
    }
    let scale = |short: u32, long: u32| -> u32 {
        let scaled = (u64::from(short) * u64::from(max_dim) + u64::from(long) / 2) / u64::from(long);
        u32::try_from(scaled).unwrap_or(max_dim).max(1)
    };

    if width >= height {
        Some((max_dim, scale(height, width)))
    } else {
        Some((scale(width, height), max_dim))
    }
}

/// Decode `source`, shrink (or enlarge) it to fit `max_dim`, and write a JPEG
/// to `dest`. Blocking; run it on a blocking thread.
///
/// Returns the thumbnail's pixel dimensions.
pub fn create_thumbnail(source: &Path, dest: &Path, max_dim: u32) -> Result<(u32, u32), ThumbnailError> {
    let mut reader = ImageReader::open(source)?.with_guessed_format()?;
    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_DECODE_DIMENSION);
    limits.max_image_height = Some(MAX_DECODE_DIMENSION);
    reader.limits(limits);

    let img = reader.decode().map_err(ThumbnailError::Decode)?;
    let (width, height) = img.dimensions();
    let (target_w, target_h) =
        fit_dimensions(width, height, max_dim).ok_or(ThumbnailError::EmptyImage { width, height })?;

    let resized = img.resize_exact(target_w, target_h, FilterType::Triangle);
    // JPEG has no alpha channel.
    let rgb = DynamicImage::ImageRgb8(resized.to_rgb8());

    write_jpeg(&rgb, dest)?;
    Ok((target_w, target_h))
}

/// Encode into a hidden sibling file, then rename over `dest`.
fn write_jpeg(img: &DynamicImage, dest: &Path) -> Result<(), ThumbnailError> {
    let parent = dest.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&parent)?;
    let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));

    let result = (|| -> Result<(), ThumbnailError> {
        let mut out = BufWriter::new(File::create(&tmp_path)?);
        let encoder = JpegEncoder::new_with_quality(&mut out, THUMBNAIL_QUALITY);
        img.write_with_encoder(encoder).map_err(ThumbnailError::Encode)?;
        out.flush()?;
        drop(out);
        fs::rename(&tmp_path, dest)?;
        Ok(())
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}
