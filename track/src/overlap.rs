//! Maximal-overlap identity propagation between consecutive frames.
//!
//! Each connected region of the current frame inherits the label of
//! whichever previous-frame object it overlaps most, or is minted a fresh
//! label when nothing overlaps. The rule is deliberately simple — one pass
//! over the pixels, no appearance or motion model — and correct whenever
//! objects move less than their own radius between frames, which is the
//! expected regime for the imaged cells.
//!
//! The tracker is stateless across frame pairs: the same function serves
//! ordinary tracking and the relabeling of manually edited rasters.

use ndarray::{Array2, ArrayView2};
use shared::image_proc::regions::{label_regions, Region};
use shared::image_proc::thresholding::{connected_components, Connectivity};
use std::collections::{HashMap, HashSet};

/// The atomic result of one tracking step: a label image plus the updated
/// identity counter, returned together so the counter's provenance is never
/// ambiguous.
#[derive(Debug, Clone)]
pub struct LabelingAndMaxIndex {
    /// Current-frame label image with identities assigned
    pub labeling: Array2<u32>,
    /// Highest label ever assigned up to and including this frame
    pub max_index: u32,
}

/// Histogram of previous-frame labels under a current-frame region,
/// background excluded.
pub fn compute_region_overlaps(
    previous_labeling: &ArrayView2<u32>,
    region: &Region,
) -> HashMap<u32, u64> {
    let mut overlaps = HashMap::new();

    for &(row, col) in &region.pixels {
        let previous_label = previous_labeling[[row, col]];
        if previous_label != 0 {
            *overlaps.entry(previous_label).or_insert(0u64) += 1;
        }
    }

    overlaps
}

/// The previous label with the largest overlap count.
///
/// Ties are broken toward the smaller label value. This makes the
/// assignment deterministic and independent of map iteration order; it is a
/// documented policy, not an incidental artifact.
pub fn max_overlap_label(overlaps: &HashMap<u32, u64>) -> u32 {
    let mut best_label = 0u32;
    let mut best_overlap = 0u64;

    for (&label, &overlap) in overlaps {
        if overlap > best_overlap || (overlap == best_overlap && label < best_label) {
            best_overlap = overlap;
            best_label = label;
        }
    }

    best_label
}

/// Assign identities to every connected region of `current_mask` by maximal
/// overlap with `reference_labeling`.
///
/// Regions are visited in connected-component label order (raster discovery
/// order). For each region:
/// - no overlap with the reference → fresh label `max_index + 1`
/// - otherwise → the reference label with the largest overlap, unless an
///   earlier region already claimed it ("first claim wins"), in which case a
///   fresh label is minted — two current regions both claiming one stale
///   label is a split the plain overlap rule cannot disambiguate
///
/// Returns the new labeling together with the updated `max_index`.
pub fn maximal_overlap_based_labeling(
    reference_labeling: &ArrayView2<u32>,
    current_mask: &ArrayView2<bool>,
    max_index: u32,
) -> LabelingAndMaxIndex {
    let components = connected_components(current_mask, Connectivity::Four);
    let regions = label_regions(&components.view());

    let mut labeling = Array2::<u32>::zeros(current_mask.dim());
    let mut max_index = max_index;
    let mut claimed: HashSet<u32> = HashSet::new();

    for region in &regions {
        let overlaps = compute_region_overlaps(reference_labeling, region);

        let object_id = if overlaps.is_empty() {
            max_index += 1;
            max_index
        } else {
            let candidate = max_overlap_label(&overlaps);
            if claimed.contains(&candidate) {
                max_index += 1;
                max_index
            } else {
                candidate
            }
        };

        claimed.insert(object_id);

        for &(row, col) in &region.pixels {
            labeling[[row, col]] = object_id;
        }
    }

    LabelingAndMaxIndex {
        labeling,
        max_index,
    }
}
