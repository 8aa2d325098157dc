//! Offline chessboard camera calibration.
//!
//! A run reads a manifest of calibration images, finds the inner corners of
//! a planar chessboard in each, solves for the camera matrix, Brown-Conrady
//! distortion and per-image board poses, reports reprojection errors, and
//! finally undistorts a sample image with the solved model.
//!
//! The stages live in [`pipeline`] and can be run one at a time or chained
//! with [`pipeline::run`], or in two steps with [`pipeline::calibrate`] and
//! [`pipeline::rectify`]. Corner detection is pluggable through
//! [`PatternDetector`]; the default [`ChessPatternDetector`] combines the
//! ChESS response from `chess-corners` with the grid-graph detector in
//! [`chessboard`].
//!
//! ```no_run
//! use chesscal::{pipeline, CalibrationConfig, ChessPatternDetector, NoPreview};
//!
//! let config = CalibrationConfig::default();
//! let mut detector = ChessPatternDetector::new(config.chessboard.clone());
//! let run = pipeline::run(&config, &mut detector, &mut NoPreview)?;
//! println!("overall error: {:.4} px", run.evaluation.overall);
//! # Ok::<(), chesscal::PipelineError>(())
//! ```

pub use chesscal_calib as calib;
pub use chesscal_chessboard as chessboard;
pub use chesscal_core as core;

pub mod cache;
pub mod config;
pub mod detect;
pub mod error;
pub mod pipeline;
pub mod preview;
pub mod report;

pub use cache::CalibrationCache;
pub use config::CalibrationConfig;
pub use detect::{ChessPatternDetector, PatternDetector};
pub use error::PipelineError;
pub use pipeline::{calibrate, rectify, run, CalibrationRun, CalibrationSession, Evaluation};
pub use preview::{DirectoryPreview, NoPreview, PreviewSink};
