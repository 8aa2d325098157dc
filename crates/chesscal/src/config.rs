use std::fs;
use std::path::{Path, PathBuf};

use chesscal_calib::SolverOptions;
use chesscal_chessboard::{ChessboardParams, SubpixParams};
use chesscal_core::GridSize;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Everything a calibration run needs. Every field has a default, so a JSON
/// file only has to name what it overrides.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Inner corners per board row.
    pub grid_width: usize,
    /// Inner corners per board column.
    pub grid_height: usize,
    /// Side of one board square, in world units.
    pub square_size: f64,
    /// Text file listing one calibration image path per line.
    pub manifest_path: PathBuf,
    pub report_path: PathBuf,
    /// Image to undistort once the camera is calibrated.
    pub sample_image_path: PathBuf,
    pub output_image_path: PathBuf,
    /// Accepted images stay strictly below this count.
    pub sample_cap: usize,
    /// Half-size of the subpixel refinement window, pixels.
    pub subpix_window: usize,
    pub chessboard: ChessboardParams,
    pub solver: SolverOptions,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            grid_width: 8,
            grid_height: 6,
            square_size: 26.5,
            manifest_path: PathBuf::from("calibration/txt/calibrationData.txt"),
            report_path: PathBuf::from("calibration/txt/calibrationResult.txt"),
            sample_image_path: PathBuf::from("calibration/images/before.jpg"),
            output_image_path: PathBuf::from("calibration/images/rectified.jpg"),
            sample_cap: 10,
            subpix_window: 5,
            chessboard: ChessboardParams::default(),
            solver: SolverOptions::default(),
        }
    }
}

impl CalibrationConfig {
    /// Load a JSON config from disk.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| PipelineError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| PipelineError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn grid(&self) -> GridSize {
        GridSize::new(self.grid_width, self.grid_height)
    }

    pub fn subpix(&self) -> SubpixParams {
        SubpixParams::with_half_window(self.subpix_window)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.grid_width < 2 || self.grid_height < 2 {
            return Err(PipelineError::InvalidConfig(format!(
                "grid must be at least 2x2 inner corners, got {}x{}",
                self.grid_width, self.grid_height
            )));
        }
        if !(self.square_size.is_finite() && self.square_size > 0.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "square_size must be positive, got {}",
                self.square_size
            )));
        }
        if self.sample_cap < 2 {
            return Err(PipelineError::InvalidConfig(format!(
                "sample_cap must be at least 2, got {}",
                self.sample_cap
            )));
        }
        Ok(())
    }
}
