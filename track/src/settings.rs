//! Pipeline configuration.
//!
//! All spatial thresholds are expressed in physical units (µm, µm²) and
//! converted to pixel units through the working pixel size, so the same
//! settings record works across datasets with different magnifications.

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};

/// Immutable-after-construction configuration for a tracking run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Working pixel size in µm per pixel
    pub pixel_size: f64,
    /// Binarization threshold in units of the background peak's right-hand
    /// half width above the histogram mode
    pub threshold_multiplier: f64,
    /// Minimal object area in µm²; smaller regions are discarded everywhere
    /// (binarization, split fragments, manual-edit cleanup)
    pub minimal_object_area: f64,
    /// Minimal distance between object centers in µm; controls both the
    /// seed-detection blur sigma and the local-maximum suppression radius
    pub minimal_center_distance: f64,
    /// Maximal tolerated watershed boundary length in µm; longer boundaries
    /// indicate an implausible split and are rejected
    pub maximal_watershed_boundary_length: f64,
    /// Maximal skeleton length per instance in µm; regions with longer
    /// skeletons are assumed to hold several touching objects
    pub max_skeleton_length_per_instance: f64,
    /// Minimal fraction of a previous object's area that must be overlapped
    /// for it to count during merge detection (unitless, 0..=1)
    pub minimal_overlap_fraction: f64,
    /// Whether frames are offered to a manual-correction session
    pub manual_correction: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            pixel_size: 1.0,
            threshold_multiplier: 1.5,
            minimal_object_area: 200.0,
            minimal_center_distance: 6.0,
            maximal_watershed_boundary_length: 10.0,
            max_skeleton_length_per_instance: 450.0,
            minimal_overlap_fraction: 0.05,
            manual_correction: false,
        }
    }
}

impl Settings {
    /// Minimal object area in pixels (truncating conversion).
    pub fn minimal_object_area_px(&self) -> usize {
        (self.minimal_object_area / (self.pixel_size * self.pixel_size)) as usize
    }

    /// Minimal object center distance in pixels.
    pub fn minimal_center_distance_px(&self) -> f64 {
        self.minimal_center_distance / self.pixel_size
    }

    /// Maximal watershed boundary length in pixels (truncating conversion).
    pub fn maximal_watershed_boundary_length_px(&self) -> usize {
        (self.maximal_watershed_boundary_length / self.pixel_size) as usize
    }

    /// Check the record for values the pipeline cannot work with.
    ///
    /// Configuration errors are fatal for the run and surfaced before any
    /// frame is processed.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !(self.pixel_size.is_finite() && self.pixel_size > 0.0) {
            return Err(PipelineError::InvalidSettings(format!(
                "pixel size must be positive, got {}",
                self.pixel_size
            )));
        }
        if !(self.threshold_multiplier.is_finite() && self.threshold_multiplier > 0.0) {
            return Err(PipelineError::InvalidSettings(format!(
                "threshold multiplier must be positive, got {}",
                self.threshold_multiplier
            )));
        }
        if !(self.minimal_object_area.is_finite() && self.minimal_object_area >= 0.0) {
            return Err(PipelineError::InvalidSettings(format!(
                "minimal object area must be non-negative, got {}",
                self.minimal_object_area
            )));
        }
        if !(self.minimal_center_distance.is_finite() && self.minimal_center_distance > 0.0) {
            return Err(PipelineError::InvalidSettings(format!(
                "minimal center distance must be positive, got {}",
                self.minimal_center_distance
            )));
        }
        if !(self.maximal_watershed_boundary_length.is_finite()
            && self.maximal_watershed_boundary_length >= 0.0)
        {
            return Err(PipelineError::InvalidSettings(format!(
                "maximal watershed boundary length must be non-negative, got {}",
                self.maximal_watershed_boundary_length
            )));
        }
        if !(self.max_skeleton_length_per_instance.is_finite()
            && self.max_skeleton_length_per_instance > 0.0)
        {
            return Err(PipelineError::InvalidSettings(format!(
                "max skeleton length per instance must be positive, got {}",
                self.max_skeleton_length_per_instance
            )));
        }
        if !(0.0..=1.0).contains(&self.minimal_overlap_fraction) {
            return Err(PipelineError::InvalidSettings(format!(
                "minimal overlap fraction must be within [0, 1], got {}",
                self.minimal_overlap_fraction
            )));
        }

        Ok(())
    }
}
