//! Core types and utilities shared by the chessboard calibration crates.
//!
//! This crate is intentionally small and purely geometric. It does *not*
//! depend on any concrete corner detector, image codec or solver.

mod corner;
mod homography;
mod image;
mod logger;
mod math;

pub use corner::{Corner, GridCoords, GridSize, ImageSize};
pub use homography::{estimate_homography, Homography};
pub use image::{sample_bilinear, GrayImageView};
pub use math::{Mat3, Pt2, Pt2f, Pt3, Real, Vec3};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_logger, init_with_level};
