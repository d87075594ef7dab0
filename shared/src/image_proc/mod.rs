//! 2D image-processing algorithms for cell segmentation and tracking.
//!
//! This module provides the raster-level building blocks that the tracking
//! pipeline composes into its per-frame segmentation steps. All operations
//! work on `ndarray` rasters: `Array2<f64>` for intensity data,
//! `Array2<bool>` for masks and `Array2<u32>` for label images
//! (`0` = background).
//!
//! # Module Organization
//!
//! ## Segmentation Primitives
//! - **histogram**: fixed-bin-width intensity histograms, background mode and
//!   half-width estimation for mode-relative thresholding
//! - **thresholding**: binary thresholding and two-pass union-find connected
//!   component labeling (4- or 8-connectivity)
//! - **regions**: label-region extraction (area, centroid, bounding box,
//!   pixel cursor) and small-region removal
//!
//! ## Shape Analysis
//! - **skeleton**: Guo–Hall topological thinning
//! - **local_maxima**: distance-suppressed local intensity maxima
//! - **watershed**: marker-controlled watershed with an explicit boundary
//!   label, restricted to a mask
//!
//! ## Filtering
//! - **diffusion**: Perona–Malik edge-preserving smoothing
//! - **convolve**: separable Gaussian blur
//! - **morphology**: erosion and dilation with disk-shaped structuring
//!   elements
//!
//! ## Data I/O
//! - **io**: lossless label-raster ↔ 16-bit grayscale conversions and PNG
//!   persistence
//!
//! # Performance Considerations
//!
//! - Operations take `ArrayView2` where they only read, so callers can pass
//!   slices of larger rasters without copying
//! - Connected component labeling is O(pixels) with union-find path
//!   compression
//! - The watershed uses a binary heap keyed on relief value with insertion
//!   order as tie-breaker, making flood order deterministic

pub mod aabb;
pub mod convolve;
pub mod diffusion;
pub mod histogram;
pub mod io;
pub mod local_maxima;
pub mod morphology;
pub mod regions;
pub mod skeleton;
pub mod thresholding;
pub mod watershed;

// Re-export key functionality for easier access
pub use aabb::Aabb;
pub use convolve::{gaussian_blur, gaussian_kernel};
pub use diffusion::anisotropic_diffusion;
pub use histogram::IntensityHistogram;
pub use io::{labels_to_gray16, load_labels_png, save_labels_png, CodecError};
pub use local_maxima::{find_sorted_local_maxima, PositionAndValue};
pub use morphology::{dilate, erode};
pub use regions::{label_regions, remove_small_regions_in_mask, Region};
pub use skeleton::thin_guo_hall;
pub use thresholding::{apply_threshold, connected_components, get_bounding_boxes, Connectivity};
pub use watershed::{inverted, seeded_watershed, WATERSHED_BOUNDARY};
