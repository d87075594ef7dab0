//! Distance-suppressed local intensity maxima.
//!
//! Watershed seed points for splitting touching cells are taken from local
//! maxima of the blurred intensity crop. Two maxima closer together than the
//! minimal object center distance would seed fragments of the same cell, so
//! maxima within that distance of an already accepted maximum are suppressed.

use ndarray::ArrayView2;

/// A pixel position paired with its intensity value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionAndValue {
    /// Row coordinate
    pub row: usize,
    /// Column coordinate
    pub col: usize,
    /// Intensity at the position
    pub value: f64,
}

impl PositionAndValue {
    fn distance_to(&self, other: &PositionAndValue) -> f64 {
        let dr = self.row as f64 - other.row as f64;
        let dc = self.col as f64 - other.col as f64;
        (dr * dr + dc * dc).sqrt()
    }
}

/// True if the pixel is at least as large as every neighbor within the
/// disk of the given radius. Out-of-bounds neighbors are ignored.
fn is_local_maximum(image: &ArrayView2<f64>, row: usize, col: usize, radius: f64) -> bool {
    let (height, width) = image.dim();
    let center = image[[row, col]];
    let r = radius.ceil() as isize;

    for dr in -r..=r {
        for dc in -r..=r {
            if (dr * dr + dc * dc) as f64 > radius * radius {
                continue;
            }
            let nr = row as isize + dr;
            let nc = col as isize + dc;
            if nr < 0 || nc < 0 || nr as usize >= height || nc as usize >= width {
                continue;
            }
            if image[[nr as usize, nc as usize]] > center {
                return false;
            }
        }
    }

    true
}

/// Find local maxima of an image, at least `min_distance` apart, sorted by
/// descending value.
///
/// A pixel qualifies when its value is strictly above `threshold`, no
/// neighbor within `min_distance` exceeds it, and no previously accepted
/// maximum lies within `min_distance`. Candidates are visited in raster
/// order, so within a plateau the first pixel in scan order claims the
/// maximum; the result is sorted by value afterwards.
pub fn find_sorted_local_maxima(
    image: &ArrayView2<f64>,
    min_distance: f64,
    threshold: f64,
) -> Vec<PositionAndValue> {
    let mut maxima: Vec<PositionAndValue> = Vec::new();

    for ((row, col), &value) in image.indexed_iter() {
        if value <= threshold {
            continue;
        }
        if !is_local_maximum(image, row, col, min_distance) {
            continue;
        }

        let candidate = PositionAndValue { row, col, value };
        let far_enough = maxima
            .iter()
            .all(|accepted| candidate.distance_to(accepted) >= min_distance);

        if far_enough {
            maxima.push(candidate);
        }
    }

    maxima.sort_by(|a, b| b.value.total_cmp(&a.value));
    maxima
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn image_with_peaks(peaks: &[(usize, usize, f64)]) -> Array2<f64> {
        let mut image = Array2::zeros((20, 20));
        for &(row, col, amplitude) in peaks {
            for dr in -2isize..=2 {
                for dc in -2isize..=2 {
                    let r = row as isize + dr;
                    let c = col as isize + dc;
                    if r >= 0 && c >= 0 && r < 20 && c < 20 {
                        let falloff = 1.0 / (1.0 + (dr * dr + dc * dc) as f64);
                        let value = amplitude * falloff;
                        if value > image[[r as usize, c as usize]] {
                            image[[r as usize, c as usize]] = value;
                        }
                    }
                }
            }
        }
        image
    }

    #[test]
    fn test_finds_separated_peaks_sorted_by_value() {
        let image = image_with_peaks(&[(5, 5, 10.0), (14, 14, 20.0)]);
        let maxima = find_sorted_local_maxima(&image.view(), 4.0, 0.0);

        assert_eq!(maxima.len(), 2);
        assert_eq!((maxima[0].row, maxima[0].col), (14, 14));
        assert_eq!((maxima[1].row, maxima[1].col), (5, 5));
        assert!(maxima[0].value > maxima[1].value);
    }

    #[test]
    fn test_close_peaks_are_suppressed() {
        let image = image_with_peaks(&[(8, 8, 10.0), (8, 11, 9.0)]);
        let maxima = find_sorted_local_maxima(&image.view(), 6.0, 0.0);

        assert_eq!(maxima.len(), 1);
        assert_eq!((maxima[0].row, maxima[0].col), (8, 8));
    }

    #[test]
    fn test_threshold_excludes_background() {
        // All-zero image: the flat background must not produce maxima
        let image = Array2::zeros((10, 10));
        let maxima = find_sorted_local_maxima(&image.view(), 3.0, 0.0);

        assert!(maxima.is_empty());
    }

    #[test]
    fn test_value_must_exceed_threshold() {
        let image = image_with_peaks(&[(5, 5, 4.0)]);

        assert_eq!(find_sorted_local_maxima(&image.view(), 3.0, 5.0).len(), 0);
        assert_eq!(find_sorted_local_maxima(&image.view(), 3.0, 3.0).len(), 1);
    }

    #[test]
    fn test_plateau_yields_single_maximum() {
        let mut image = Array2::zeros((9, 9));
        for row in 3..=5 {
            for col in 3..=5 {
                image[[row, col]] = 5.0;
            }
        }

        let maxima = find_sorted_local_maxima(&image.view(), 4.0, 0.0);
        assert_eq!(maxima.len(), 1);
        // First plateau pixel in raster order claims the maximum
        assert_eq!((maxima[0].row, maxima[0].col), (3, 3));
    }
}
