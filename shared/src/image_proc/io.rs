//! Lossless label-raster persistence.
//!
//! The pipeline's output contract is that label images round-trip through an
//! integer raster codec without loss: no fractional labels, no collisions
//! with the background value 0. This module provides the conversions between
//! `Array2<u32>` label rasters and 16-bit grayscale images, plus PNG
//! save/load on top of them. Multi-frame stacks are stored as one file per
//! frame by the owning I/O layer.
//!
//! # Coordinate System Conversions
//!
//! - **ndarray**: matrix indexing `[row, col]` with `(height, width)` dims
//! - **image crate**: graphics indexing `(x, y)` with `(width, height)` dims

use image::{ImageBuffer, Luma};
use ndarray::{Array2, ArrayView2};
use std::path::Path;
use thiserror::Error;

/// 16-bit grayscale image buffer.
pub type Gray16Image = ImageBuffer<Luma<u16>, Vec<u16>>;

/// Errors from label-raster encoding and persistence.
#[derive(Error, Debug)]
pub enum CodecError {
    /// A label value exceeds the 16-bit range of the storage format.
    #[error("label {label} at ({row}, {col}) exceeds the 16-bit storage range")]
    LabelOutOfRange {
        /// The offending label value.
        label: u32,
        /// Row of the offending pixel.
        row: usize,
        /// Column of the offending pixel.
        col: usize,
    },

    /// The loaded image dimensions are empty or inconsistent.
    #[error("image has degenerate dimensions {width}x{height}")]
    DegenerateDimensions {
        /// Image width.
        width: u32,
        /// Image height.
        height: u32,
    },

    /// Underlying image encoding/decoding failure.
    #[error("image codec failure: {0}")]
    Image(#[from] image::ImageError),
}

/// Encode a label raster as a 16-bit grayscale image.
///
/// Fails if any label exceeds `u16::MAX`; identities are never truncated.
pub fn labels_to_gray16(labels: &ArrayView2<u32>) -> Result<Gray16Image, CodecError> {
    let (height, width) = labels.dim();

    let mut pixels = Vec::with_capacity(height * width);
    for ((row, col), &label) in labels.indexed_iter() {
        if label > u16::MAX as u32 {
            return Err(CodecError::LabelOutOfRange { label, row, col });
        }
        pixels.push(label as u16);
    }

    ImageBuffer::from_raw(width as u32, height as u32, pixels).ok_or(
        CodecError::DegenerateDimensions {
            width: width as u32,
            height: height as u32,
        },
    )
}

/// Decode a 16-bit grayscale image back into a label raster.
pub fn gray16_to_labels(image: &Gray16Image) -> Array2<u32> {
    let (width, height) = image.dimensions();

    Array2::from_shape_fn((height as usize, width as usize), |(row, col)| {
        image.get_pixel(col as u32, row as u32).0[0] as u32
    })
}

/// Save a label raster as a 16-bit grayscale PNG.
pub fn save_labels_png(path: &Path, labels: &ArrayView2<u32>) -> Result<(), CodecError> {
    let image = labels_to_gray16(labels)?;
    image.save(path)?;
    Ok(())
}

/// Load a label raster from a 16-bit grayscale PNG.
pub fn load_labels_png(path: &Path) -> Result<Array2<u32>, CodecError> {
    let image = image::open(path)?.into_luma16();
    Ok(gray16_to_labels(&image))
}
