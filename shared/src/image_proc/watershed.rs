//! Marker-controlled watershed restricted to a mask.
//!
//! Seeded flooding on an intensity relief: each marker grows outward along
//! increasing relief values until it meets another marker's flood, and the
//! meeting pixels form the dividing boundary. The pipeline runs this on the
//! *inverted* intensity of a region crop, so floods start at the cell
//! centers (intensity maxima) and the boundary settles into the intensity
//! valley between touching cells.
//!
//! Flood order is deterministic: the priority queue is keyed on relief value
//! with insertion order as tie-breaker.

use ndarray::{Array2, ArrayView2};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Label assigned to pixels where two floods meet.
pub const WATERSHED_BOUNDARY: i32 = -1;

/// Invert an intensity raster, `v ↦ max − v`.
///
/// Turns intensity maxima into relief minima so the watershed floods
/// outward from them.
pub fn inverted(image: &ArrayView2<f64>) -> Array2<f64> {
    let max = image.iter().copied().fold(f64::MIN, f64::max);
    image.mapv(|v| max - v)
}

/// Heap entry; ordered so the BinaryHeap pops the lowest relief first,
/// with insertion order breaking ties.
#[derive(Debug)]
struct FloodFront {
    relief: f64,
    order: usize,
    row: usize,
    col: usize,
}

impl PartialEq for FloodFront {
    fn eq(&self, other: &Self) -> bool {
        self.relief == other.relief && self.order == other.order
    }
}

impl Eq for FloodFront {}

impl Ord for FloodFront {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap, we want the minimum
        other
            .relief
            .total_cmp(&self.relief)
            .then_with(|| other.order.cmp(&self.order))
    }
}

impl PartialOrd for FloodFront {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

const NEIGHBORS_4: [(isize, isize); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// Flood the relief from the given markers, restricted to the mask.
///
/// # Arguments
/// * `relief` - Surface to flood (lower values flood first)
/// * `seeds` - Marker raster; each positive value is one marker label
/// * `mask` - Flooding is confined to `true` pixels
///
/// # Returns
/// Raster with the marker label for every flooded pixel,
/// [`WATERSHED_BOUNDARY`] where two floods meet, and `0` for background or
/// masked pixels no flood reached (markers outside the mask are dropped).
pub fn seeded_watershed(
    relief: &ArrayView2<f64>,
    seeds: &ArrayView2<u32>,
    mask: &ArrayView2<bool>,
) -> Array2<i32> {
    let (height, width) = relief.dim();
    let mut output = Array2::<i32>::zeros((height, width));
    let mut queued = Array2::from_elem((height, width), false);
    let mut heap: BinaryHeap<FloodFront> = BinaryHeap::new();
    let mut order = 0usize;

    // Place markers and remember where the floods start
    let mut marker_pixels = Vec::new();
    for ((row, col), &seed) in seeds.indexed_iter() {
        if seed > 0 {
            if mask[[row, col]] {
                output[[row, col]] = seed as i32;
                marker_pixels.push((row, col));
            } else {
                log::debug!("watershed marker {seed} at ({row}, {col}) lies outside the mask");
            }
        }
    }

    let push_neighbors = |row: usize,
                          col: usize,
                          heap: &mut BinaryHeap<FloodFront>,
                          queued: &mut Array2<bool>,
                          order: &mut usize,
                          output: &Array2<i32>| {
        for (dr, dc) in NEIGHBORS_4 {
            let nr = row as isize + dr;
            let nc = col as isize + dc;
            if nr < 0 || nc < 0 || nr as usize >= height || nc as usize >= width {
                continue;
            }
            let (nr, nc) = (nr as usize, nc as usize);
            if mask[[nr, nc]] && output[[nr, nc]] == 0 && !queued[[nr, nc]] {
                queued[[nr, nc]] = true;
                heap.push(FloodFront {
                    relief: relief[[nr, nc]],
                    order: *order,
                    row: nr,
                    col: nc,
                });
                *order += 1;
            }
        }
    };

    for (row, col) in marker_pixels {
        push_neighbors(row, col, &mut heap, &mut queued, &mut order, &output);
    }

    while let Some(front) = heap.pop() {
        let (row, col) = (front.row, front.col);
        if output[[row, col]] != 0 {
            continue;
        }

        // Distinct marker labels among the 4-neighbors decide the pixel
        let mut first_label = 0i32;
        let mut is_boundary = false;
        for (dr, dc) in NEIGHBORS_4 {
            let nr = row as isize + dr;
            let nc = col as isize + dc;
            if nr < 0 || nc < 0 || nr as usize >= height || nc as usize >= width {
                continue;
            }
            let neighbor = output[[nr as usize, nc as usize]];
            if neighbor > 0 {
                if first_label == 0 {
                    first_label = neighbor;
                } else if neighbor != first_label {
                    is_boundary = true;
                }
            }
        }

        if is_boundary {
            output[[row, col]] = WATERSHED_BOUNDARY;
            // Boundary pixels do not propagate their flood
        } else {
            output[[row, col]] = first_label;
            push_neighbors(row, col, &mut heap, &mut queued, &mut order, &output);
        }
    }

    output
}
