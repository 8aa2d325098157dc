use std::path::PathBuf;

use chesscal_calib::{CameraIntrinsics, DistortionCoeffs};
use chesscal_core::{ImageSize, Mat3, Pt2f, Pt3, Real, Vec3};

use crate::error::PipelineError;

/// State threaded through the pipeline stages of one run.
///
/// Per-image vectors are index-aligned: entry `i` of `image_paths`,
/// `corner_point_sequence`, `corner_position`, `rvecs_mat` and `tvecs_mat`
/// all describe the same accepted image.
#[derive(Clone, Debug, Default)]
pub struct CalibrationCache {
    /// Images accepted into the corner sequence.
    pub image_count: usize,
    /// Resolution of the first image that loaded.
    pub image_size: Option<ImageSize>,
    pub image_paths: Vec<PathBuf>,
    /// Refined corners per image, row-major over the board grid.
    pub corner_point_sequence: Vec<Vec<Pt2f>>,
    /// Board coordinates of the same corners, `z = 0`.
    pub corner_position: Vec<Vec<Pt3>>,
    pub intrinsic_matrix: Option<Mat3>,
    pub dist_coeffs: Option<DistortionCoeffs>,
    pub rvecs_mat: Vec<Vec3>,
    pub tvecs_mat: Vec<Vec3>,
    /// Solver RMS over all points, pixels.
    pub rms: Option<Real>,
}

impl CalibrationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Solved camera model, or `NotCalibrated` before the solve stage.
    pub fn camera(&self) -> Result<(CameraIntrinsics, DistortionCoeffs), PipelineError> {
        match (&self.intrinsic_matrix, &self.dist_coeffs) {
            (Some(k), Some(d)) => Ok((CameraIntrinsics::from_matrix(k), *d)),
            _ => Err(PipelineError::NotCalibrated),
        }
    }
}
