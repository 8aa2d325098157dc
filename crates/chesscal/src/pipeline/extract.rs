use std::path::PathBuf;

use chesscal_core::{ImageSize, Pt2f};
use log::{debug, info, log_enabled, Level};

use super::ingest::{check_resolution, load_image};
use crate::cache::CalibrationCache;
use crate::config::CalibrationConfig;
use crate::detect::PatternDetector;
use crate::error::PipelineError;
use crate::preview::PreviewSink;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Walk the manifest, accept every image whose chessboard is found, and
/// append its refined corners to the cache.
///
/// Stops before the accepted count reaches `sample_cap`. Images without a
/// chessboard and images at a different resolution are skipped. Fails with
/// `NoUsableImages` when nothing was accepted.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip_all, fields(entries = entries.len()))
)]
pub fn extract_corners(
    entries: &[PathBuf],
    config: &CalibrationConfig,
    detector: &mut dyn PatternDetector,
    preview: &mut dyn PreviewSink,
    cache: &mut CalibrationCache,
) -> Result<(), PipelineError> {
    let grid = config.grid();
    let subpix = config.subpix();

    for path in entries {
        if cache.image_count + 1 >= config.sample_cap {
            info!(
                "sample cap reached with {} images; ignoring the rest of the manifest",
                cache.image_count
            );
            break;
        }

        let image = load_image(path)?;
        let size = ImageSize::new(image.width(), image.height());
        if !check_resolution(cache, path, size) {
            continue;
        }

        let gray = image.to_luma8();
        let Some(mut corners) = detector.detect(&gray, grid) else {
            info!("{}: chessboard not found, skipping", path.display());
            continue;
        };
        if corners.len() != grid.count() {
            info!(
                "{}: detector returned {} corners, expected {}; skipping",
                path.display(),
                corners.len(),
                grid.count()
            );
            continue;
        }

        detector.refine(&gray, &mut corners, &subpix);
        if log_enabled!(Level::Debug) {
            debug!("{} corners:\n{}", path.display(), format_corner_dump(&corners));
        }
        preview.show_corners(cache.image_count, &image, &corners, grid);

        cache.image_paths.push(path.clone());
        cache.corner_point_sequence.push(corners);
        cache.image_count += 1;
        info!("image {} accepted: {}", cache.image_count, path.display());
    }

    if cache.image_count == 0 {
        return Err(PipelineError::NoUsableImages);
    }
    info!("{} images accepted for calibration", cache.image_count);
    Ok(())
}

/// Corner coordinates, four per line.
pub fn format_corner_dump(corners: &[Pt2f]) -> String {
    corners
        .chunks(4)
        .map(|line| {
            line.iter()
                .map(|p| format!("({:.3}, {:.3})", p.x, p.y))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}
