//! Binary erosion and dilation with disk-shaped structuring elements.
//!
//! The tracking pipeline erodes region masks before deriving watershed seed
//! markers (seeds are not allowed to touch the mask boundary). Pixels outside
//! the raster are treated as background, so foreground touching the raster
//! edge is eroded away like any other boundary.

use ndarray::{Array2, ArrayView2};

/// Offsets of a disk-shaped structuring element of the given radius.
fn disk_offsets(radius: usize) -> Vec<(isize, isize)> {
    let r = radius as isize;
    let mut offsets = Vec::new();

    for dr in -r..=r {
        for dc in -r..=r {
            if dr * dr + dc * dc <= r * r {
                offsets.push((dr, dc));
            }
        }
    }

    offsets
}

/// Erode a mask with a disk of the given radius.
///
/// A pixel stays foreground only if the whole disk around it is foreground;
/// out-of-bounds pixels count as background. A radius of 0 returns the mask
/// unchanged.
pub fn erode(mask: &ArrayView2<bool>, radius: usize) -> Array2<bool> {
    if radius == 0 {
        return mask.to_owned();
    }

    let (height, width) = mask.dim();
    let offsets = disk_offsets(radius);

    Array2::from_shape_fn((height, width), |(row, col)| {
        offsets.iter().all(|&(dr, dc)| {
            let r = row as isize + dr;
            let c = col as isize + dc;
            r >= 0 && c >= 0 && (r as usize) < height && (c as usize) < width && mask[[r as usize, c as usize]]
        })
    })
}

/// Dilate a mask with a disk of the given radius.
///
/// A pixel becomes foreground if any pixel of the disk around it is
/// foreground. A radius of 0 returns the mask unchanged.
pub fn dilate(mask: &ArrayView2<bool>, radius: usize) -> Array2<bool> {
    if radius == 0 {
        return mask.to_owned();
    }

    let (height, width) = mask.dim();
    let offsets = disk_offsets(radius);

    Array2::from_shape_fn((height, width), |(row, col)| {
        offsets.iter().any(|&(dr, dc)| {
            let r = row as isize + dr;
            let c = col as isize + dc;
            r >= 0 && c >= 0 && (r as usize) < height && (c as usize) < width && mask[[r as usize, c as usize]]
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_mask(size: usize, min: usize, max: usize) -> Array2<bool> {
        Array2::from_shape_fn((size, size), |(row, col)| {
            row >= min && row <= max && col >= min && col <= max
        })
    }

    #[test]
    fn test_erode_shrinks_square() {
        // 5x5 square in a 9x9 raster
        let mask = square_mask(9, 2, 6);
        let eroded = erode(&mask.view(), 1);

        // Disk radius 1 removes the one-pixel rim
        for ((row, col), &value) in eroded.indexed_iter() {
            let expected = (3..=5).contains(&row) && (3..=5).contains(&col);
            assert_eq!(value, expected, "unexpected value at [{row}, {col}]");
        }
    }

    #[test]
    fn test_erode_removes_foreground_at_raster_edge() {
        let mask = Array2::from_elem((4, 4), true);
        let eroded = erode(&mask.view(), 1);

        assert!(!eroded[[0, 0]]);
        assert!(!eroded[[0, 2]]);
        assert!(eroded[[1, 1]]);
        assert!(eroded[[2, 2]]);
    }

    #[test]
    fn test_dilate_grows_point() {
        let mut mask = Array2::from_elem((5, 5), false);
        mask[[2, 2]] = true;

        let dilated = dilate(&mask.view(), 1);

        assert!(dilated[[2, 2]]);
        assert!(dilated[[1, 2]]);
        assert!(dilated[[3, 2]]);
        assert!(dilated[[2, 1]]);
        assert!(dilated[[2, 3]]);
        assert!(!dilated[[1, 1]]); // corner is outside the radius-1 disk
    }

    #[test]
    fn test_radius_zero_is_identity() {
        let mask = square_mask(6, 1, 3);

        assert_eq!(erode(&mask.view(), 0), mask);
        assert_eq!(dilate(&mask.view(), 0), mask);
    }

    #[test]
    fn test_dilate_then_erode_restores_square() {
        let mask = square_mask(11, 3, 7);
        let closed = erode(&dilate(&mask.view(), 2).view(), 2);

        assert_eq!(closed, mask);
    }
}
