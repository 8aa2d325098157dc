use std::path::PathBuf;

use chesscal_calib::CalibrationError;

/// Fatal conditions of a calibration run. Per-image detection failures are
/// not errors; they are logged and the image is skipped.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("failed to read config {}: {source}", .path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {source}", .path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("failed to open manifest {}: {source}", .path.display())]
    ManifestOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load image {}: {source}", .path.display())]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("no image produced a complete chessboard; nothing to calibrate")]
    NoUsableImages,

    #[error("the camera has not been calibrated yet")]
    NotCalibrated,

    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    #[error("failed to write report {}: {source}", .path.display())]
    ReportWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load sample image {}: {source}", .path.display())]
    SampleImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to write rectified image {}: {source}", .path.display())]
    OutputImageWrite {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}
