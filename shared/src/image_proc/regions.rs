//! Label-region extraction and region-level raster operations.
//!
//! A region is the materialized form of one connected component or one label
//! value: its pixel coordinates, area, centroid and bounding box. Regions are
//! derived on demand from a mask or label image and are never persisted;
//! everything downstream (splitting, overlap tracking, small-object removal)
//! consumes them through this module.

use crate::image_proc::aabb::Aabb;
use crate::image_proc::thresholding::{connected_components, Connectivity};
use ndarray::{Array2, ArrayView2};

/// One connected set of same-labeled pixels.
#[derive(Debug, Clone)]
pub struct Region {
    /// Label value the pixels share
    pub label: u32,
    /// Pixel coordinates as (row, col), in raster scan order
    pub pixels: Vec<(usize, usize)>,
    /// Tight bounding box around the pixels
    pub bbox: Aabb,
}

impl Region {
    /// Number of pixels in the region.
    pub fn area(&self) -> usize {
        self.pixels.len()
    }

    /// Unweighted center of mass as (row, col).
    pub fn centroid(&self) -> (f64, f64) {
        let n = self.pixels.len() as f64;
        let (sum_row, sum_col) = self
            .pixels
            .iter()
            .fold((0.0, 0.0), |(r, c), &(row, col)| {
                (r + row as f64, c + col as f64)
            });
        (sum_row / n, sum_col / n)
    }

    /// Render the region as a boolean mask cropped to its bounding box.
    pub fn as_mask(&self) -> Array2<bool> {
        let mut mask = Array2::from_elem((self.bbox.height(), self.bbox.width()), false);
        for &(row, col) in &self.pixels {
            mask[[row - self.bbox.min_row, col - self.bbox.min_col]] = true;
        }
        mask
    }
}

/// Materialize all regions of a label image, ordered by ascending label.
///
/// Label values need not be consecutive; absent labels simply produce no
/// region. Pixels sharing a label are treated as one region even if they are
/// spatially disconnected, matching how edited label rasters are interpreted.
pub fn label_regions(labels: &ArrayView2<u32>) -> Vec<Region> {
    let max_label = labels.iter().copied().max().unwrap_or(0) as usize;
    if max_label == 0 {
        return Vec::new();
    }

    let mut pixels: Vec<Vec<(usize, usize)>> = vec![Vec::new(); max_label + 1];
    let mut bboxes = vec![Aabb::new(); max_label + 1];

    for ((row, col), &label) in labels.indexed_iter() {
        if label > 0 {
            pixels[label as usize].push((row, col));
            bboxes[label as usize].expand_to_include(row, col);
        }
    }

    pixels
        .into_iter()
        .zip(bboxes)
        .enumerate()
        .skip(1)
        .filter(|(_, (px, _))| !px.is_empty())
        .map(|(label, (pixels, bbox))| Region {
            label: label as u32,
            pixels,
            bbox,
        })
        .collect()
}

/// Remove connected foreground regions smaller than `min_area` pixels,
/// in place.
pub fn remove_small_regions_in_mask(
    mask: &mut Array2<bool>,
    min_area: usize,
    connectivity: Connectivity,
) {
    let labels = connected_components(&mask.view(), connectivity);

    for region in label_regions(&labels.view()) {
        if region.area() < min_area {
            for (row, col) in region.pixels {
                mask[[row, col]] = false;
            }
        }
    }
}

/// Remove connected components below `min_area` pixels from a label raster,
/// in place.
///
/// Components are determined by foreground connectivity, not by label value,
/// so a freshly painted blob of any value is dropped if it is too small.
pub fn remove_small_components_in_labels(labels: &mut Array2<u32>, min_area: usize) {
    let mask = labels.mapv(|label| label > 0);
    let components = connected_components(&mask.view(), Connectivity::Four);

    for region in label_regions(&components.view()) {
        if region.area() < min_area {
            for (row, col) in region.pixels {
                labels[[row, col]] = 0;
            }
        }
    }
}

/// Crop the intensity data of one region: values inside the region are kept,
/// everything else in the bounding box is zero.
pub fn masked_crop(intensity: &ArrayView2<f64>, region: &Region) -> Array2<f64> {
    let mut crop = Array2::zeros((region.bbox.height(), region.bbox.width()));
    for &(row, col) in &region.pixels {
        crop[[row - region.bbox.min_row, col - region.bbox.min_col]] = intensity[[row, col]];
    }
    crop
}
