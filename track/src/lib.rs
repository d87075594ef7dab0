//! Instance segmentation and identity tracking for time-lapse cell imaging.
//!
//! Turns a sequence of 2D intensity frames into per-frame label images in
//! which each cell keeps the same numeric identity across time, even when
//! cells touch, merge or split. The pipeline per frame:
//!
//! 1. **Binarize** — mode-relative thresholding after edge-preserving
//!    smoothing, small-object removal ([`binarize`])
//! 2. **Split** — skeleton-based instance count estimation and
//!    marker-controlled watershed carving of touching objects ([`split`])
//! 3. **Track** — maximal-overlap identity propagation from the previous
//!    frame, with overlap-triggered re-splitting of merge artifacts
//!    ([`overlap`], [`splitter`])
//! 4. **Review** — optional manual correction, re-validated through the
//!    same component-labeling and relabeling path ([`correction`])
//!
//! Frames are processed strictly in order (tracking at `t` depends on
//! `t-1`); binarization of the frames is independent and runs in parallel.

use crate::binarize::Binarizer;
use crate::correction::{NoopReviewer, Reviewer};
use crate::error::PipelineError;
use crate::settings::Settings;
use crate::splitter::{TrackingResult, TrackingSplitter};
use ndarray::Array2;
use rayon::prelude::*;

pub mod binarize;
pub mod correction;
pub mod error;
pub mod overlap;
pub mod settings;
pub mod split;
pub mod splitter;

// Re-export the types that make up the public surface
pub use crate::correction::{ManualCorrectionSession, Review, SessionEvent, SessionState};
pub use crate::error::SplitError;
pub use crate::overlap::{maximal_overlap_based_labeling, LabelingAndMaxIndex};
pub use crate::split::{ShapeIntensitySplitter, SplitReport};

/// Front door of the pipeline: binarizes all frames, then splits and tracks
/// them in sequence.
pub struct SegmentationAndTracking<'a> {
    intensities: &'a [Array2<f64>],
    settings: Settings,
    existing: Option<(Vec<Array2<u32>>, u32)>,
}

impl<'a> SegmentationAndTracking<'a> {
    pub fn new(intensities: &'a [Array2<f64>], settings: Settings) -> Self {
        Self {
            intensities,
            settings,
            existing: None,
        }
    }

    /// Resume tracking mid-sequence from labelings of a previous run and the
    /// counter it ended with.
    pub fn with_existing_labelings(
        mut self,
        labelings: Vec<Array2<u32>>,
        max_index: u32,
    ) -> Self {
        self.existing = Some((labelings, max_index));
        self
    }

    /// Run without manual correction.
    pub fn run(self) -> Result<TrackingResult, PipelineError> {
        self.run_with_reviewer(NoopReviewer)
    }

    /// Run with the given reviewer handling each frame.
    ///
    /// The reviewer is only consulted when manual correction is enabled in
    /// the settings; otherwise frames are accepted as computed.
    pub fn run_with_reviewer<R: Reviewer>(
        self,
        reviewer: R,
    ) -> Result<TrackingResult, PipelineError> {
        self.settings.validate()?;
        self.validate_inputs()?;

        let masks = self.create_masks()?;

        if self.settings.manual_correction {
            self.track(&masks, reviewer)
        } else {
            self.track(&masks, NoopReviewer)
        }
    }

    fn validate_inputs(&self) -> Result<(), PipelineError> {
        if self.intensities.is_empty() {
            return Err(PipelineError::NoFrames);
        }

        let expected = self.intensities[0].dim();
        for (index, frame) in self.intensities.iter().enumerate() {
            if frame.dim() != expected {
                return Err(PipelineError::DimensionMismatch {
                    index,
                    found: frame.dim(),
                    expected,
                });
            }
        }

        if let Some((labelings, _)) = &self.existing {
            if labelings.len() > self.intensities.len() {
                return Err(PipelineError::TooManyLabelings {
                    labelings: labelings.len(),
                    frames: self.intensities.len(),
                });
            }
            for (index, labeling) in labelings.iter().enumerate() {
                if labeling.dim() != expected {
                    return Err(PipelineError::DimensionMismatch {
                        index,
                        found: labeling.dim(),
                        expected,
                    });
                }
            }
        }

        Ok(())
    }

    /// Binarize every frame. Frames are independent, so this fans out
    /// across threads; any failure aborts the run before tracking starts.
    fn create_masks(&self) -> Result<Vec<Array2<bool>>, PipelineError> {
        let total = self.intensities.len();

        self.intensities
            .par_iter()
            .enumerate()
            .map(|(t, intensity)| {
                log::info!("Creating binary mask {}/{total}", t + 1);
                Binarizer::new(intensity.view(), &self.settings, t).run()
            })
            .collect()
    }

    fn track<R: Reviewer>(
        &self,
        masks: &[Array2<bool>],
        reviewer: R,
    ) -> Result<TrackingResult, PipelineError> {
        let mut splitter =
            TrackingSplitter::new(self.intensities, masks, &self.settings, reviewer);

        if let Some((labelings, max_index)) = &self.existing {
            splitter = splitter.with_labelings(labelings.clone(), *max_index);
        }

        splitter.run()
    }
}
