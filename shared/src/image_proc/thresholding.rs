//! Binary thresholding and connected component labeling.
//!
//! These are the entry points of every segmentation step in the pipeline:
//! an intensity frame is thresholded into a boolean mask, and masks are
//! decomposed into labeled regions before splitting or tracking.
//!
//! # Key Algorithms
//!
//! ## Thresholding
//! Plain intensity cut: pixels strictly above the threshold become
//! foreground. Threshold *selection* is the caller's business (see the
//! pipeline's binarizer, which derives it from the histogram mode).
//!
//! ## Connected Components
//! Two-pass connected component labeling with union-find and path
//! compression. Connectivity is selectable per call: 4-connectivity is used
//! for object extraction (it keeps diagonally touching cells apart),
//! 8-connectivity for measuring watershed boundary segments.

use crate::image_proc::aabb::Aabb;
use ndarray::{Array2, ArrayView2};

/// Pixel neighborhood used when deciding whether two pixels are connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    /// Horizontal and vertical neighbors only
    Four,
    /// Horizontal, vertical and diagonal neighbors
    Eight,
}

/// Create a boolean foreground mask from an intensity image.
///
/// Pixels strictly above `threshold` become `true`.
pub fn apply_threshold(image: &ArrayView2<f64>, threshold: f64) -> Array2<bool> {
    image.mapv(|pixel| pixel > threshold)
}

/// Find the root label in a disjoint-set (union-find) structure,
/// compressing the path as a side effect.
fn find_root(parents: &mut [u32], label: u32) -> u32 {
    let mut current = label;

    while current != parents[current as usize] {
        // Path compression: point the parent at the grandparent
        parents[current as usize] = parents[parents[current as usize] as usize];
        current = parents[current as usize];
    }

    current
}

/// Union two labels; the smaller root becomes the parent.
fn union_labels(parents: &mut [u32], label1: u32, label2: u32) {
    let root1 = find_root(parents, label1);
    let root2 = find_root(parents, label2);

    if root1 != root2 {
        if root1 < root2 {
            parents[root2 as usize] = root1;
        } else {
            parents[root1 as usize] = root2;
        }
    }
}

/// Connected component labeling using an optimized two-pass algorithm.
///
/// Groups connected foreground pixels into distinct objects with unique
/// integer labels. The first pass assigns preliminary labels and records
/// equivalences in a union-find structure; the second pass rewrites the
/// raster with consecutive final labels.
///
/// # Arguments
/// * `mask` - Boolean raster, `true` = foreground
/// * `connectivity` - Neighborhood definition for connectedness
///
/// # Returns
/// Labeled raster where background = 0 and each connected object carries a
/// unique label from the consecutive range `1..=n`.
pub fn connected_components(mask: &ArrayView2<bool>, connectivity: Connectivity) -> Array2<u32> {
    let (height, width) = mask.dim();
    let mut labels = Array2::<u32>::zeros((height, width));
    let mut label_count: u32 = 0;

    // Parent pointers; index 0 is the background and stays its own root.
    let mut parents: Vec<u32> = vec![0];

    let mut neighbor_labels: Vec<u32> = Vec::with_capacity(4);

    for row in 0..height {
        for col in 0..width {
            if !mask[[row, col]] {
                continue;
            }

            neighbor_labels.clear();

            // Scan-order neighbors: up and left, plus the two upper
            // diagonals for 8-connectivity.
            if row > 0 && labels[[row - 1, col]] > 0 {
                neighbor_labels.push(labels[[row - 1, col]]);
            }
            if col > 0 && labels[[row, col - 1]] > 0 {
                neighbor_labels.push(labels[[row, col - 1]]);
            }
            if connectivity == Connectivity::Eight && row > 0 {
                if col > 0 && labels[[row - 1, col - 1]] > 0 {
                    neighbor_labels.push(labels[[row - 1, col - 1]]);
                }
                if col + 1 < width && labels[[row - 1, col + 1]] > 0 {
                    neighbor_labels.push(labels[[row - 1, col + 1]]);
                }
            }

            if neighbor_labels.is_empty() {
                label_count += 1;
                labels[[row, col]] = label_count;
                parents.push(label_count);
            } else {
                let min_label = *neighbor_labels.iter().min().unwrap();
                labels[[row, col]] = min_label;

                for &neighbor in &neighbor_labels {
                    if neighbor != min_label {
                        union_labels(&mut parents, min_label, neighbor);
                    }
                }
            }
        }
    }

    // Flatten the equivalence forest
    for i in 1..parents.len() {
        find_root(&mut parents, i as u32);
    }

    // Map roots to consecutive final labels
    let mut relabel = vec![0u32; parents.len()];
    let mut next_label = 1;

    for i in 1..parents.len() {
        let root = parents[i] as usize;
        if relabel[root] == 0 {
            relabel[root] = next_label;
            next_label += 1;
        }
        relabel[i] = relabel[root];
    }

    for label in labels.iter_mut() {
        if *label > 0 {
            *label = relabel[*label as usize];
        }
    }

    labels
}

/// Extract axis-aligned bounding boxes for all labeled objects.
///
/// # Arguments
/// * `labels` - Raster from [`connected_components`]
///
/// # Returns
/// One [`Aabb`] per label; index `i` corresponds to label `i + 1`.
pub fn get_bounding_boxes(labels: &ArrayView2<u32>) -> Vec<Aabb> {
    let max_label = labels.iter().copied().max().unwrap_or(0) as usize;
    let mut bboxes = vec![Aabb::new(); max_label + 1];

    for ((row, col), &label) in labels.indexed_iter() {
        if label > 0 {
            bboxes[label as usize].expand_to_include(row, col);
        }
    }

    bboxes.remove(0);
    bboxes
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Creates a boolean mask from a 2D array of 1s and 0s; the formatting
    /// of the array makes the pattern easy to see.
    fn create_mask(pattern: &[&[i32]]) -> Array2<bool> {
        let height = pattern.len();
        let width = pattern[0].len();

        Array2::from_shape_fn((height, width), |(row, col)| pattern[row][col] != 0)
    }

    fn assert_labels_match(labels: &Array2<u32>, expected: &[&[i32]]) {
        for (row, expected_row) in expected.iter().enumerate() {
            for (col, &value) in expected_row.iter().enumerate() {
                assert_eq!(
                    labels[[row, col]],
                    value as u32,
                    "mismatch at [{}, {}]: expected {}, got {}",
                    row,
                    col,
                    value,
                    labels[[row, col]]
                );
            }
        }
    }

    #[test]
    fn test_apply_threshold() {
        let image = Array2::from_shape_fn((3, 3), |(row, col)| (row * 3 + col) as f64);
        let mask = apply_threshold(&image.view(), 4.0);

        assert!(!mask[[1, 1]]); // 4.0 is not strictly above the threshold
        assert!(mask[[1, 2]]);
        assert!(!mask[[0, 0]]);
        assert_eq!(mask.iter().filter(|&&v| v).count(), 4);
    }

    #[test]
    fn test_empty_mask() {
        let pattern: &[&[i32]] = &[
            &[0, 0, 0, 0, 0],
            &[0, 0, 0, 0, 0],
            &[0, 0, 0, 0, 0],
        ];

        let labels = connected_components(&create_mask(pattern).view(), Connectivity::Four);
        assert_labels_match(&labels, pattern);
    }

    #[test]
    fn test_two_components() {
        let pattern: &[&[i32]] = &[
            &[0, 0, 0, 0, 0],
            &[0, 1, 1, 0, 0],
            &[0, 1, 1, 0, 0],
            &[0, 0, 0, 1, 0],
            &[0, 0, 0, 0, 0],
        ];

        let expected: &[&[i32]] = &[
            &[0, 0, 0, 0, 0],
            &[0, 1, 1, 0, 0],
            &[0, 1, 1, 0, 0],
            &[0, 0, 0, 2, 0],
            &[0, 0, 0, 0, 0],
        ];

        let labels = connected_components(&create_mask(pattern).view(), Connectivity::Four);
        assert_labels_match(&labels, expected);
    }

    /// U-shaped component, tests label equivalence resolution
    #[test]
    fn test_u_shape() {
        let pattern: &[&[i32]] = &[
            &[0, 0, 0, 0, 0],
            &[0, 1, 0, 1, 0],
            &[0, 1, 0, 1, 0],
            &[0, 1, 1, 1, 0],
            &[0, 0, 0, 0, 0],
        ];

        let labels = connected_components(&create_mask(pattern).view(), Connectivity::Four);
        assert_labels_match(&labels, pattern);
    }

    /// Diagonal pixels are separate in 4-connectivity, joined in 8-connectivity
    #[test]
    fn test_diagonal_connectivity() {
        let pattern: &[&[i32]] = &[
            &[1, 0, 0],
            &[0, 1, 0],
            &[0, 0, 1],
        ];

        let four = connected_components(&create_mask(pattern).view(), Connectivity::Four);
        let eight = connected_components(&create_mask(pattern).view(), Connectivity::Eight);

        let expected_four: &[&[i32]] = &[
            &[1, 0, 0],
            &[0, 2, 0],
            &[0, 0, 3],
        ];
        let expected_eight: &[&[i32]] = &[
            &[1, 0, 0],
            &[0, 1, 0],
            &[0, 0, 1],
        ];

        assert_labels_match(&four, expected_four);
        assert_labels_match(&eight, expected_eight);
    }

    /// Pattern with multiple merge points that requires proper equivalence
    /// handling across several unions
    #[test]
    fn test_complex_equivalence() {
        let pattern: &[&[i32]] = &[
            &[0, 0, 0, 0, 0, 0, 0],
            &[0, 1, 1, 0, 1, 1, 0],
            &[0, 1, 0, 0, 0, 1, 0],
            &[0, 1, 0, 1, 0, 1, 0],
            &[0, 1, 0, 1, 0, 1, 0],
            &[0, 1, 1, 1, 1, 1, 0],
            &[0, 0, 0, 0, 0, 0, 0],
        ];

        let labels = connected_components(&create_mask(pattern).view(), Connectivity::Four);
        assert_labels_match(&labels, pattern);
    }

    #[test]
    fn test_labels_are_consecutive() {
        let pattern: &[&[i32]] = &[
            &[1, 0, 1, 0, 1],
            &[0, 0, 0, 0, 0],
            &[1, 0, 0, 0, 1],
        ];

        let labels = connected_components(&create_mask(pattern).view(), Connectivity::Four);
        let max = labels.iter().copied().max().unwrap();

        assert_eq!(max, 5);
        for wanted in 1..=max {
            assert!(
                labels.iter().any(|&l| l == wanted),
                "label {wanted} missing from labeling"
            );
        }
    }

    #[test]
    fn test_bounding_boxes() {
        let pattern: &[&[i32]] = &[
            &[0, 0, 0, 0, 0],
            &[0, 1, 1, 0, 0],
            &[0, 1, 1, 0, 0],
            &[0, 0, 0, 1, 0],
            &[0, 0, 0, 0, 0],
        ];

        let labels = connected_components(&create_mask(pattern).view(), Connectivity::Four);
        let bboxes = get_bounding_boxes(&labels.view());

        assert_eq!(bboxes.len(), 2);
        assert_eq!(bboxes[0].to_tuple(), (1, 1, 2, 2));
        assert_eq!(bboxes[1].to_tuple(), (3, 3, 3, 3));
    }
}
