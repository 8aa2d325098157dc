//! Stage functions of a calibration run and the driver that chains them.
//!
//! Stages share one [`CalibrationCache`]. Each stage reads what earlier
//! stages left there and adds its own results; a failed stage stops the
//! run before anything later is attempted.

mod evaluate;
mod extract;
mod ingest;
mod rectify;
mod solve;

pub use evaluate::{evaluate, Evaluation};
pub use extract::{extract_corners, format_corner_dump};
pub use ingest::{check_resolution, load_image, read_manifest};
pub use rectify::{rectify_sample, undistort_image};
pub use solve::{board_object_points, solve};

use image::DynamicImage;
use log::info;

use crate::cache::CalibrationCache;
use crate::config::CalibrationConfig;
use crate::detect::PatternDetector;
use crate::error::PipelineError;
use crate::preview::PreviewSink;
use crate::report::{render_report, write_report};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// A solved camera with its evaluation and the report already on disk.
#[derive(Clone, Debug)]
pub struct CalibrationSession {
    pub cache: CalibrationCache,
    pub evaluation: Evaluation,
    /// Report text, identical to what was written to `report_path`.
    pub report: String,
}

/// Everything a successful run produced.
#[derive(Clone, Debug)]
pub struct CalibrationRun {
    pub cache: CalibrationCache,
    pub evaluation: Evaluation,
    pub report: String,
    pub rectified: DynamicImage,
}

/// Ingest and extract, solve, evaluate and write the report.
#[cfg_attr(feature = "tracing", instrument(level = "info", skip_all))]
pub fn calibrate(
    config: &CalibrationConfig,
    detector: &mut dyn PatternDetector,
    preview: &mut dyn PreviewSink,
) -> Result<CalibrationSession, PipelineError> {
    config.validate()?;
    let mut cache = CalibrationCache::new();

    info!("extracting corners from {}", config.manifest_path.display());
    let entries = read_manifest(&config.manifest_path)?;
    extract_corners(&entries, config, detector, preview, &mut cache)?;

    info!("calibrating");
    let solved = solve(config, &mut cache)?;
    info!(
        "solver finished after {} evaluations (converged: {}), rms {:.6} px",
        solved.evaluations, solved.converged, solved.rms
    );

    info!("evaluating calibration");
    let evaluation = evaluate(&cache)?;
    let report = render_report(&cache, &evaluation)?;
    write_report(&config.report_path, &report)?;
    info!("report written to {}", config.report_path.display());

    Ok(CalibrationSession {
        cache,
        evaluation,
        report,
    })
}

/// Undistort the configured sample image with a solved session.
pub fn rectify(
    config: &CalibrationConfig,
    session: &CalibrationSession,
    preview: &mut dyn PreviewSink,
) -> Result<DynamicImage, PipelineError> {
    info!("rectifying {}", config.sample_image_path.display());
    let rectified = rectify_sample(
        &session.cache,
        &config.sample_image_path,
        &config.output_image_path,
    )?;
    preview.show_rectified(&rectified);
    Ok(rectified)
}

/// Run every stage in order: [`calibrate`], then [`rectify`].
pub fn run(
    config: &CalibrationConfig,
    detector: &mut dyn PatternDetector,
    preview: &mut dyn PreviewSink,
) -> Result<CalibrationRun, PipelineError> {
    let session = calibrate(config, detector, preview)?;
    let rectified = rectify(config, &session, preview)?;
    Ok(CalibrationRun {
        cache: session.cache,
        evaluation: session.evaluation,
        report: session.report,
        rectified,
    })
}
