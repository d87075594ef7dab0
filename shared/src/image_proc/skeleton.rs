//! Topological skeletonization by Guo–Hall thinning.
//!
//! The splitter estimates how many cell instances a connected region should
//! contain from the length of its skeleton: ramified cells produce long
//! skeletons, so a region whose skeleton is much longer than one cell's
//! budget most likely holds several touching cells.
//!
//! The implementation is the two-subiteration Guo–Hall scheme: each pass
//! deletes a layer of boundary pixels that are neither endpoints nor needed
//! for connectivity, alternating between two deletion templates until the
//! raster no longer changes.

use ndarray::{Array2, ArrayView2};

/// The 8-neighborhood of a pixel in Guo–Hall order: p2 = north, then
/// clockwise through NE, E, SE, S, SW, W to p9 = NW. Out-of-bounds
/// neighbors are background.
fn neighborhood(mask: &Array2<bool>, row: usize, col: usize) -> [bool; 8] {
    let (height, width) = mask.dim();
    let at = |r: isize, c: isize| -> bool {
        r >= 0 && c >= 0 && (r as usize) < height && (c as usize) < width
            && mask[[r as usize, c as usize]]
    };
    let r = row as isize;
    let c = col as isize;

    [
        at(r - 1, c),     // p2 N
        at(r - 1, c + 1), // p3 NE
        at(r, c + 1),     // p4 E
        at(r + 1, c + 1), // p5 SE
        at(r + 1, c),     // p6 S
        at(r + 1, c - 1), // p7 SW
        at(r, c - 1),     // p8 W
        at(r - 1, c - 1), // p9 NW
    ]
}

/// One Guo–Hall subiteration; returns the pixels to delete.
fn deletable_pixels(mask: &Array2<bool>, even_iteration: bool) -> Vec<(usize, usize)> {
    let (height, width) = mask.dim();
    let mut deletions = Vec::new();

    for row in 0..height {
        for col in 0..width {
            if !mask[[row, col]] {
                continue;
            }

            let [p2, p3, p4, p5, p6, p7, p8, p9] = neighborhood(mask, row, col);

            let c = (!p2 && (p3 || p4)) as u32
                + (!p4 && (p5 || p6)) as u32
                + (!p6 && (p7 || p8)) as u32
                + (!p8 && (p9 || p2)) as u32;

            let n1 = (p9 || p2) as u32 + (p3 || p4) as u32 + (p5 || p6) as u32 + (p7 || p8) as u32;
            let n2 = (p2 || p3) as u32 + (p4 || p5) as u32 + (p6 || p7) as u32 + (p8 || p9) as u32;
            let n = n1.min(n2);

            let m = if even_iteration {
                (p6 || p7 || !p9) && p8
            } else {
                (p2 || p3 || !p5) && p4
            };

            if c == 1 && (2..=3).contains(&n) && !m {
                deletions.push((row, col));
            }
        }
    }

    deletions
}

/// Thin a mask to its topological skeleton (Guo–Hall).
///
/// The skeleton is a subset of the input mask: one-pixel-wide curves that
/// preserve the connectivity of every foreground region.
pub fn thin_guo_hall(mask: &ArrayView2<bool>) -> Array2<bool> {
    let mut skeleton = mask.to_owned();

    loop {
        let mut changed = false;

        for even_iteration in [true, false] {
            let deletions = deletable_pixels(&skeleton, even_iteration);
            if !deletions.is_empty() {
                changed = true;
            }
            for (row, col) in deletions {
                skeleton[[row, col]] = false;
            }
        }

        if !changed {
            return skeleton;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_proc::thresholding::{connected_components, Connectivity};

    fn filled_rect(height: usize, width: usize, r0: usize, r1: usize, c0: usize, c1: usize) -> Array2<bool> {
        Array2::from_shape_fn((height, width), |(row, col)| {
            row >= r0 && row <= r1 && col >= c0 && col <= c1
        })
    }

    #[test]
    fn test_empty_mask_stays_empty() {
        let mask = Array2::from_elem((6, 6), false);
        assert_eq!(thin_guo_hall(&mask.view()), mask);
    }

    #[test]
    fn test_single_pixel_survives() {
        let mut mask = Array2::from_elem((5, 5), false);
        mask[[2, 2]] = true;

        let skeleton = thin_guo_hall(&mask.view());
        assert_eq!(skeleton.iter().filter(|&&v| v).count(), 1);
        assert!(skeleton[[2, 2]]);
    }

    #[test]
    fn test_thin_line_is_unchanged() {
        let mut mask = Array2::from_elem((5, 9), false);
        for col in 1..8 {
            mask[[2, col]] = true;
        }

        let skeleton = thin_guo_hall(&mask.view());
        assert_eq!(skeleton, mask);
    }

    #[test]
    fn test_skeleton_is_subset_of_mask() {
        let mask = filled_rect(12, 20, 2, 9, 3, 16);
        let skeleton = thin_guo_hall(&mask.view());

        for ((row, col), &value) in skeleton.indexed_iter() {
            if value {
                assert!(mask[[row, col]], "skeleton escaped mask at [{row}, {col}]");
            }
        }
    }

    #[test]
    fn test_elongated_rectangle_thins_to_curve() {
        let mask = filled_rect(10, 30, 2, 7, 2, 27);
        let skeleton = thin_guo_hall(&mask.view());

        let mask_area = mask.iter().filter(|&&v| v).count();
        let skeleton_area = skeleton.iter().filter(|&&v| v).count();

        // A 6x26 block must collapse to roughly its medial axis
        assert!(skeleton_area > 0);
        assert!(
            skeleton_area < mask_area / 4,
            "skeleton area {skeleton_area} too large for mask area {mask_area}"
        );
    }

    #[test]
    fn test_connectivity_is_preserved() {
        // An L-shaped blob: one component before, one component after
        let mut mask = filled_rect(20, 20, 2, 16, 2, 7);
        for row in 12..=16 {
            for col in 2..=16 {
                mask[[row, col]] = true;
            }
        }

        let skeleton = thin_guo_hall(&mask.view());
        let labels = connected_components(&skeleton.view(), Connectivity::Eight);
        let components = labels.iter().copied().max().unwrap();

        assert_eq!(components, 1, "thinning must not disconnect the region");
    }

    #[test]
    fn test_two_blobs_give_two_skeletons() {
        let mut mask = Array2::from_elem((20, 40), false);
        for row in 4..12 {
            for col in 4..14 {
                mask[[row, col]] = true;
            }
            for col in 24..36 {
                mask[[row, col]] = true;
            }
        }

        let skeleton = thin_guo_hall(&mask.view());
        let labels = connected_components(&skeleton.view(), Connectivity::Eight);

        assert_eq!(labels.iter().copied().max().unwrap(), 2);
    }
}
