//! Core types shared by the aerocal crates.
//!
//! This crate is intentionally small: borrowed/owned grayscale buffers, a
//! float response map, planar homographies, and the sparse lattice map that
//! the checkerboard enumerator fills. It does not know about cameras,
//! telemetry or any image codec.

mod grid;
mod homography;
mod image;
mod logger;

pub use grid::{CalibrationGrid, GridCoords};
pub use homography::{estimate_homography, homography_from_4pt, Homography};
pub use image::{sample_bilinear, GrayImage, GrayImageView, ImageError, ImageF32};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
