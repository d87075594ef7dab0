//! Separable Gaussian blur for 2D intensity rasters.
//!
//! Used to regularize per-region intensity crops before local-maximum seed
//! detection: without blurring, pixel noise produces spurious maxima and the
//! splitter would over-seed its watershed.

use ndarray::{Array2, ArrayView2};

/// Build a normalized 1D Gaussian kernel for the given sigma.
///
/// The kernel extends to three standard deviations on each side (minimum
/// radius 1), which keeps the truncation error below 0.3% of the total mass.
pub fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    let radius = ((3.0 * sigma).ceil() as usize).max(1);
    let mut kernel = Vec::with_capacity(2 * radius + 1);

    let denom = 2.0 * sigma * sigma;
    for i in 0..=2 * radius {
        let x = i as f64 - radius as f64;
        kernel.push((-x * x / denom).exp());
    }

    let sum: f64 = kernel.iter().sum();
    for value in kernel.iter_mut() {
        *value /= sum;
    }

    kernel
}

/// Blur an image with an isotropic Gaussian of the given sigma.
///
/// The convolution is separable (rows then columns); borders are handled by
/// clamping, i.e. the edge value is repeated outside the raster. A
/// non-positive sigma returns the input unchanged.
pub fn gaussian_blur(image: &ArrayView2<f64>, sigma: f64) -> Array2<f64> {
    if sigma <= 0.0 {
        return image.to_owned();
    }

    let kernel = gaussian_kernel(sigma);
    let radius = kernel.len() / 2;
    let (height, width) = image.dim();

    // Horizontal pass
    let mut horizontal = Array2::zeros((height, width));
    for row in 0..height {
        for col in 0..width {
            let mut acc = 0.0;
            for (k, &weight) in kernel.iter().enumerate() {
                let source = (col + k).saturating_sub(radius).min(width - 1);
                acc += weight * image[[row, source]];
            }
            horizontal[[row, col]] = acc;
        }
    }

    // Vertical pass
    let mut blurred = Array2::zeros((height, width));
    for row in 0..height {
        for col in 0..width {
            let mut acc = 0.0;
            for (k, &weight) in kernel.iter().enumerate() {
                let source = (row + k).saturating_sub(radius).min(height - 1);
                acc += weight * horizontal[[source, col]];
            }
            blurred[[row, col]] = acc;
        }
    }

    blurred
}
