//! Frame binarization by mode-relative thresholding.
//!
//! One calibrated intensity frame goes in, a boolean foreground mask comes
//! out: the frame is smoothed with edge-preserving diffusion, the background
//! peak of its intensity histogram is located, and the threshold is placed a
//! configurable number of half widths above the peak. Regions below the
//! minimal object area are removed before the mask is handed on.
//!
//! There are no retries: a degenerate histogram (e.g. a uniform frame) is an
//! error reported to the caller, not a silently guessed threshold.

use crate::error::PipelineError;
use crate::settings::Settings;
use ndarray::{Array2, ArrayView2};
use shared::image_proc::diffusion::anisotropic_diffusion;
use shared::image_proc::histogram::IntensityHistogram;
use shared::image_proc::regions::remove_small_regions_in_mask;
use shared::image_proc::thresholding::{apply_threshold, Connectivity};

// Smoothing and histogram parameters; intensity frames are calibrated DN
// values in [0, 65535].
const DIFFUSION_ITERATIONS: usize = 10;
const DIFFUSION_KAPPA: f64 = 30.0;
const DIFFUSION_LAMBDA: f64 = 0.2;
const HISTOGRAM_MAX: f64 = 65535.0;
const HISTOGRAM_BIN_WIDTH: f64 = 2.0;

/// Converts one intensity frame into a background/foreground mask.
pub struct Binarizer<'a> {
    intensity: ArrayView2<'a, f64>,
    settings: &'a Settings,
    /// Frame index, only used for logging and error reporting
    frame: usize,
}

impl<'a> Binarizer<'a> {
    pub fn new(intensity: ArrayView2<'a, f64>, settings: &'a Settings, frame: usize) -> Self {
        Self {
            intensity,
            settings,
            frame,
        }
    }

    /// Produce the foreground mask for this frame.
    pub fn run(&self) -> Result<Array2<bool>, PipelineError> {
        let smoothed = anisotropic_diffusion(
            &self.intensity,
            DIFFUSION_ITERATIONS,
            DIFFUSION_KAPPA,
            DIFFUSION_LAMBDA,
        );

        let histogram =
            IntensityHistogram::new(&smoothed.view(), HISTOGRAM_MAX, HISTOGRAM_BIN_WIDTH);
        let mode = histogram.mode();
        let half_mode = histogram
            .right_hand_half_mode()
            .ok_or(PipelineError::DegenerateHistogram { frame: self.frame })?;

        let offset = mode.center;
        let threshold =
            offset + (half_mode.center - mode.center) * self.settings.threshold_multiplier;

        log::debug!(
            "frame {}: intensity offset {offset:.1}, threshold {threshold:.1}",
            self.frame
        );

        let mut mask = apply_threshold(&smoothed.view(), threshold);

        remove_small_regions_in_mask(
            &mut mask,
            self.settings.minimal_object_area_px(),
            Connectivity::Four,
        );

        Ok(mask)
    }
}
