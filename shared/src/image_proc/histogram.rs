//! Fixed-bin-width intensity histograms for mode-relative thresholding.
//!
//! Cell images from fluorescence time-lapse microscopy have a dominant
//! background peak whose position and width vary between datasets, so the
//! binarization threshold is expressed relative to the histogram mode and the
//! half-height point on its right shoulder rather than as an absolute value.

use ndarray::ArrayView2;

/// A histogram bin location paired with its frequency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinAndFrequency {
    /// Center of the bin, in intensity units
    pub center: f64,
    /// Number of pixels counted into the bin
    pub frequency: f64,
}

/// Intensity histogram with fixed bin width over `[0, max_value]`.
///
/// The last bin additionally collects every value at or above `max_value`,
/// so saturated pixels never fall off the end of the histogram.
#[derive(Debug, Clone)]
pub struct IntensityHistogram {
    /// Bin centers, `center[i] = i * bin_width + bin_width / 2`
    pub bin_centers: Vec<f64>,
    /// Pixel counts per bin
    pub frequencies: Vec<f64>,
    /// Width of each bin in intensity units
    pub bin_width: f64,
}

impl IntensityHistogram {
    /// Build the histogram of an intensity image.
    ///
    /// # Arguments
    /// * `image` - Intensity raster; values are clamped into `[0, max_value]`
    /// * `max_value` - Upper end of the histogram range
    /// * `bin_width` - Width of each bin in intensity units
    pub fn new(image: &ArrayView2<f64>, max_value: f64, bin_width: f64) -> Self {
        let num_bins = ((max_value / bin_width) as usize).max(1);

        let bin_centers = (0..num_bins)
            .map(|i| i as f64 * bin_width + bin_width * 0.5)
            .collect();
        let mut frequencies = vec![0.0; num_bins];

        for &value in image.iter() {
            let mut bin = (value.max(0.0) / bin_width) as usize;
            if bin >= num_bins {
                bin = num_bins - 1;
            }
            frequencies[bin] += 1.0;
        }

        Self {
            bin_centers,
            frequencies,
            bin_width,
        }
    }

    /// The most frequent bin.
    ///
    /// The last bin is excluded because it accumulates saturated pixels and
    /// would otherwise win on images with clipped highlights.
    pub fn mode(&self) -> BinAndFrequency {
        let mut mode = BinAndFrequency {
            center: 0.0,
            frequency: 0.0,
        };

        for i in 0..self.frequencies.len().saturating_sub(1) {
            if self.frequencies[i] > mode.frequency {
                mode.frequency = self.frequencies[i];
                mode.center = self.bin_centers[i];
            }
        }

        mode
    }

    /// First bin right of the mode whose frequency has dropped to half the
    /// modal frequency, i.e. the half-width point on the background peak's
    /// right shoulder.
    ///
    /// Returns `None` for degenerate distributions (uniform images, or
    /// distributions whose right tail never falls below half the mode), in
    /// which case no mode-relative threshold can be derived.
    pub fn right_hand_half_mode(&self) -> Option<BinAndFrequency> {
        let mode = self.mode();

        for i in 0..self.frequencies.len() {
            if self.bin_centers[i] > mode.center && self.frequencies[i] <= mode.frequency / 2.0 {
                return Some(BinAndFrequency {
                    center: self.bin_centers[i],
                    frequency: self.frequencies[i],
                });
            }
        }

        None
    }
}
