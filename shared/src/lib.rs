//! Shared components and utilities for the segmentation-and-tracking modules.
//!
//! This crate contains the generic 2D image-processing algorithms that the
//! tracking pipeline is built on, kept free of any pipeline state so they
//! can be tested and reused in isolation.

pub mod image_proc;
