//! Frame-sequential orchestration of splitting and identity tracking.
//!
//! The orchestrator walks the frame sequence in order — tracking at frame
//! `t` is defined in terms of `labels_{t-1}`, so frames cannot be processed
//! out of order. Frame 0 is split from shape and intensity cues alone; every
//! later frame is first checked against the previous labeling for merge
//! artifacts (one current region overlapping several distinct previous
//! labels), re-split along the previous frame's overlap geometry where
//! needed, and then labeled by maximal overlap.
//!
//! Per-object failures are logged and the object is kept whole; a frame is
//! never silently dropped, because skipping a frame would corrupt identity
//! continuity for everything after it.

use crate::correction::{Review, Reviewer};
use crate::error::{PipelineError, SplitError};
use crate::overlap::{
    compute_region_overlaps, maximal_overlap_based_labeling, LabelingAndMaxIndex,
};
use crate::settings::Settings;
use crate::split::ShapeIntensitySplitter;
use ndarray::{Array2, ArrayView2};
use shared::image_proc::morphology::erode;
use shared::image_proc::regions::{
    label_regions, masked_crop, remove_small_regions_in_mask, Region,
};
use shared::image_proc::thresholding::{connected_components, Connectivity};
use shared::image_proc::watershed::{inverted, seeded_watershed, WATERSHED_BOUNDARY};
use std::collections::HashMap;

/// Result of a (possibly stopped) tracking run.
#[derive(Debug, Clone)]
pub struct TrackingResult {
    /// One label raster per processed frame; shorter than the frame
    /// sequence if the run was stopped early
    pub labelings: Vec<Array2<u32>>,
    /// Highest identity issued across the whole run, needed to resume later
    pub max_index: u32,
    /// Whether the operator stopped the run before the last frame
    pub stopped: bool,
}

/// Orchestrates per-frame splitting, tracking and review.
pub struct TrackingSplitter<'a, R: Reviewer> {
    intensities: &'a [Array2<f64>],
    masks: &'a [Array2<bool>],
    settings: &'a Settings,
    reviewer: R,
    labelings: Vec<Array2<u32>>,
    max_index: u32,
    stopped: bool,
}

impl<'a, R: Reviewer> TrackingSplitter<'a, R> {
    pub fn new(
        intensities: &'a [Array2<f64>],
        masks: &'a [Array2<bool>],
        settings: &'a Settings,
        reviewer: R,
    ) -> Self {
        Self {
            intensities,
            masks,
            settings,
            reviewer,
            labelings: Vec::new(),
            max_index: 0,
            stopped: false,
        }
    }

    /// Resume from pre-existing labelings and the counter they ended with.
    pub fn with_labelings(mut self, labelings: Vec<Array2<u32>>, max_index: u32) -> Self {
        self.labelings = labelings;
        self.max_index = max_index;
        self
    }

    /// Process all frames (or all remaining frames when resuming).
    ///
    /// When resuming, the last already-labeled frame is offered for review
    /// again before tracking continues, so the operator can touch up the
    /// point the previous run stopped at.
    pub fn run(mut self) -> Result<TrackingResult, PipelineError> {
        let existing = self.labelings.len();
        let t_min = existing.saturating_sub(1);

        for t in t_min..self.masks.len() {
            if t >= existing {
                let labeling = self.create_labeling(t)?;
                self.labelings.push(labeling);
            }

            let previous = if t > 0 {
                Some(self.labelings[t - 1].clone())
            } else {
                None
            };
            let review: Review = self.reviewer.submit_for_review(
                t,
                self.labelings[t].clone(),
                previous.as_ref(),
                self.max_index,
            );

            self.labelings[t] = review.labels;
            self.max_index = self.max_index.max(review.max_index);

            if review.stopped {
                // Whatever exists so far is kept; saving happens outside
                self.stopped = true;
                break;
            }
        }

        Ok(TrackingResult {
            labelings: self.labelings,
            max_index: self.max_index,
            stopped: self.stopped,
        })
    }

    /// Instance-segment frame `t` and assign identities.
    fn create_labeling(&mut self, t: usize) -> Result<Array2<u32>, PipelineError> {
        log::info!("Instance segmentation of frame {t}");

        if t == 0 {
            let report = ShapeIntensitySplitter::new(
                self.masks[0].view(),
                self.intensities[0].view(),
                self.settings,
            )
            .run();

            let labeling = connected_components(&report.mask.view(), Connectivity::Four);
            self.max_index = labeling.iter().copied().max().unwrap_or(0);
            Ok(labeling)
        } else {
            let previous = self.labelings[t - 1].clone();
            let split_mask = self.split_mask_from_previous(t, &previous.view());

            let LabelingAndMaxIndex {
                labeling,
                max_index,
            } = maximal_overlap_based_labeling(
                &previous.view(),
                &split_mask.view(),
                self.max_index,
            );

            self.max_index = max_index;
            Ok(labeling)
        }
    }

    /// Re-split regions of frame `t` that cover several previous objects.
    ///
    /// A region overlapping more than one distinct previous label means the
    /// current mask under-segmented what used to be separate objects. The
    /// previous frame's overlap geometry provides the seeds: each overlap
    /// subregion becomes one watershed marker (after a 2 px erosion that
    /// keeps markers off the mask boundary).
    fn split_mask_from_previous(
        &self,
        t: usize,
        previous: &ArrayView2<u32>,
    ) -> Array2<bool> {
        let components = connected_components(&self.masks[t].view(), Connectivity::Four);
        let regions = label_regions(&components.view());

        let previous_areas: HashMap<u32, usize> = label_regions(previous)
            .into_iter()
            .map(|region| (region.label, region.area()))
            .collect();

        let mut split_mask = self.masks[t].clone();

        for region in &regions {
            let overlaps = compute_region_overlaps(previous, region);
            let truly = truly_overlapping_labels(
                &overlaps,
                &previous_areas,
                self.settings.minimal_overlap_fraction,
            );

            if truly.len() <= 1 {
                // Zero previous objects: new object candidate.
                // Exactly one: the mask agrees with the previous frame.
                continue;
            }

            match self.resplit_region(t, region, previous, &truly) {
                Ok(boundary_pixels) => {
                    for (row, col) in boundary_pixels {
                        split_mask[[row, col]] = false;
                    }
                    remove_small_regions_in_mask(
                        &mut split_mask,
                        self.settings.minimal_object_area_px(),
                        Connectivity::Four,
                    );
                }
                Err(error) => {
                    log::warn!(
                        "frame {t}: overlap-based split of object {} skipped: {error}",
                        region.label
                    );
                }
            }
        }

        split_mask
    }

    /// Watershed one merged region using the previous frame's overlap
    /// subregions as markers.
    fn resplit_region(
        &self,
        t: usize,
        region: &Region,
        previous: &ArrayView2<u32>,
        truly_overlapping: &[u32],
    ) -> Result<Vec<(usize, usize)>, SplitError> {
        let region_mask = region.as_mask();

        // Marker raster: overlap subregion of the k-th previous label
        // becomes marker k+1
        let mut seeds = Array2::<u32>::zeros(region_mask.dim());
        for &(row, col) in &region.pixels {
            let previous_label = previous[[row, col]];
            if let Some(index) = truly_overlapping
                .iter()
                .position(|&label| label == previous_label)
            {
                seeds[[row - region.bbox.min_row, col - region.bbox.min_col]] = index as u32 + 1;
            }
        }

        // Watershed seeds must not touch the mask boundary
        let eroded = erode(&region_mask.view(), 2);
        for (seed, &keep) in seeds.iter_mut().zip(eroded.iter()) {
            if !keep {
                *seed = 0;
            }
        }

        // Background plus at least two markers must survive the erosion
        let mut distinct: Vec<u32> = seeds.iter().copied().collect();
        distinct.sort_unstable();
        distinct.dedup();
        if distinct.len() < 3 {
            return Err(SplitError::TooFewSeedMarkers {
                distinct: distinct.iter().filter(|&&v| v > 0).count(),
            });
        }

        let crop = masked_crop(&self.intensities[t].view(), region);
        let relief = inverted(&crop.view());
        let watershed = seeded_watershed(&relief.view(), &seeds.view(), &region_mask.view());

        let boundary: Vec<(usize, usize)> = watershed
            .indexed_iter()
            .filter(|(_, &value)| value == WATERSHED_BOUNDARY)
            .map(|((row, col), _)| (row + region.bbox.min_row, col + region.bbox.min_col))
            .collect();

        if boundary.is_empty() {
            return Err(SplitError::NoBoundary);
        }

        Ok(boundary)
    }
}

/// Previous labels that truly overlap a region.
///
/// With a single candidate the overlap is taken at face value. With several,
/// only labels covering at least `min_fraction` of their previous area count
/// — marginal one-pixel grazes must not trigger a re-split. The result is
/// sorted ascending so marker indices are deterministic.
fn truly_overlapping_labels(
    overlaps: &HashMap<u32, u64>,
    previous_areas: &HashMap<u32, usize>,
    min_fraction: f64,
) -> Vec<u32> {
    let mut labels: Vec<u32> = if overlaps.len() == 1 {
        overlaps.keys().copied().collect()
    } else {
        overlaps
            .iter()
            .filter(|(label, &overlap)| {
                let area = previous_areas.get(label).copied().unwrap_or(0);
                area > 0 && overlap as f64 / area as f64 >= min_fraction
            })
            .map(|(&label, _)| label)
            .collect()
    };

    labels.sort_unstable();
    labels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correction::NoopReviewer;

    fn test_settings() -> Settings {
        Settings {
            pixel_size: 1.0,
            minimal_object_area: 50.0,
            minimal_center_distance: 6.0,
            maximal_watershed_boundary_length: 10.0,
            max_skeleton_length_per_instance: 450.0,
            minimal_overlap_fraction: 0.05,
            ..Settings::default()
        }
    }

    /// Frame with two 20x20 squares; optionally bridged into one region.
    fn scene(bridged: bool) -> (Array2<f64>, Array2<bool>) {
        let dim = (40, 64);
        let mut mask = Array2::from_elem(dim, false);
        for row in 10..30 {
            for col in 6..26 {
                mask[[row, col]] = true;
            }
            for col in 36..56 {
                mask[[row, col]] = true;
            }
        }
        if bridged {
            for row in 17..23 {
                for col in 26..36 {
                    mask[[row, col]] = true;
                }
            }
        }

        let intensity = Array2::from_shape_fn(dim, |(row, col)| {
            if mask[[row, col]] {
                1000.0
            } else {
                100.0
            }
        });

        (intensity, mask)
    }

    #[test]
    fn test_first_frame_gets_consecutive_labels() {
        let (intensity, mask) = scene(false);
        let settings = test_settings();

        let result = TrackingSplitter::new(
            std::slice::from_ref(&intensity),
            std::slice::from_ref(&mask),
            &settings,
            NoopReviewer,
        )
        .run()
        .unwrap();

        assert_eq!(result.labelings.len(), 1);
        assert_eq!(result.max_index, 2);
        assert!(!result.stopped);

        let labels = &result.labelings[0];
        assert_eq!(labels[[15, 15]], 1);
        assert_eq!(labels[[15, 45]], 2);
    }

    /// Two objects merge into one region: the merge artifact is re-split
    /// along the previous overlap geometry and both identities survive.
    #[test]
    fn test_merge_artifact_is_resplit() {
        let (intensity0, mask0) = scene(false);
        let (intensity1, mask1) = scene(true);
        let settings = test_settings();

        let intensities = vec![intensity0, intensity1];
        let masks = vec![mask0, mask1];

        let result = TrackingSplitter::new(&intensities, &masks, &settings, NoopReviewer)
            .run()
            .unwrap();

        assert_eq!(result.labelings.len(), 2);
        // No new identities: the two previous objects were recovered
        assert_eq!(result.max_index, 2);

        let labels = &result.labelings[1];
        assert_eq!(labels[[15, 10]], 1);
        assert_eq!(labels[[15, 50]], 2);
        assert_ne!(labels[[15, 10]], labels[[15, 50]]);
    }

    /// A region overlapping exactly one previous object is accepted as-is.
    #[test]
    fn test_single_overlap_region_is_not_resplit() {
        let (intensity, mask) = scene(false);
        let settings = test_settings();

        let intensities = vec![intensity.clone(), intensity];
        let masks = vec![mask.clone(), mask];

        let result = TrackingSplitter::new(&intensities, &masks, &settings, NoopReviewer)
            .run()
            .unwrap();

        assert_eq!(result.labelings[0], result.labelings[1]);
        assert_eq!(result.max_index, 2);
    }

    /// Resume: pre-existing labelings are kept and tracking continues with
    /// the supplied counter.
    #[test]
    fn test_resume_continues_from_existing_labelings() {
        let (intensity, mask) = scene(false);
        let settings = test_settings();

        let intensities = vec![intensity.clone(), intensity.clone(), intensity];
        let masks = vec![mask.clone(), mask.clone(), mask];

        // Labels as a previous run with maxIndex 9 would have left them
        let first = TrackingSplitter::new(
            &intensities[..1],
            &masks[..1],
            &settings,
            NoopReviewer,
        )
        .run()
        .unwrap();
        let mut existing = first.labelings[0].clone();
        existing.mapv_inplace(|label| if label == 0 { 0 } else { label + 7 });

        let result = TrackingSplitter::new(&intensities, &masks, &settings, NoopReviewer)
            .with_labelings(vec![existing.clone()], 9)
            .run()
            .unwrap();

        assert_eq!(result.labelings.len(), 3);
        assert_eq!(result.labelings[0], existing);
        // Identities 8 and 9 persist through the remaining frames
        assert_eq!(result.labelings[2][[15, 15]], 8);
        assert_eq!(result.labelings[2][[15, 45]], 9);
        assert_eq!(result.max_index, 9);
    }

    /// Truly-overlapping filter: marginal grazes below the fraction do not
    /// count as merge partners.
    #[test]
    fn test_truly_overlapping_filter() {
        let overlaps = HashMap::from([(1u32, 300u64), (2u32, 2u64)]);
        let areas = HashMap::from([(1u32, 400usize), (2u32, 400usize)]);

        let labels = truly_overlapping_labels(&overlaps, &areas, 0.05);
        assert_eq!(labels, vec![1]);

        // With a permissive fraction both count, sorted ascending
        let labels = truly_overlapping_labels(&overlaps, &areas, 0.001);
        assert_eq!(labels, vec![1, 2]);
    }

    /// One candidate always counts, regardless of fraction.
    #[test]
    fn test_single_candidate_bypasses_fraction() {
        let overlaps = HashMap::from([(4u32, 1u64)]);
        let areas = HashMap::from([(4u32, 10_000usize)]);

        let labels = truly_overlapping_labels(&overlaps, &areas, 0.5);
        assert_eq!(labels, vec![4]);
    }
}
