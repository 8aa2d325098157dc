use chesscal_calib::{calibrate_camera_with, CalibrationOutput};
use chesscal_core::{GridSize, Pt2, Pt3, Real};
use log::info;

use crate::cache::CalibrationCache;
use crate::config::CalibrationConfig;
use crate::error::PipelineError;

/// Physical corner coordinates on the `z = 0` board plane.
///
/// Index `row * grid.width + col` holds `(row · square, col · square, 0)`,
/// matching the scan order of detected corners.
pub fn board_object_points(grid: GridSize, square_size: Real) -> Vec<Pt3> {
    let mut points = Vec::with_capacity(grid.count());
    for row in 0..grid.height {
        for col in 0..grid.width {
            points.push(Pt3::new(
                row as Real * square_size,
                col as Real * square_size,
                0.0,
            ));
        }
    }
    points
}

/// Fill `corner_position` and solve for the camera, storing intrinsics,
/// distortion and per-image poses in the cache.
pub fn solve(config: &CalibrationConfig, cache: &mut CalibrationCache) -> Result<CalibrationOutput, PipelineError> {
    if cache.image_count == 0 {
        return Err(PipelineError::NoUsableImages);
    }
    let image_size = cache.image_size.ok_or(PipelineError::NoUsableImages)?;

    let board = board_object_points(config.grid(), config.square_size);
    cache.corner_position = vec![board; cache.image_count];

    let image_points: Vec<Vec<Pt2>> = cache
        .corner_point_sequence
        .iter()
        .map(|view| view.iter().map(|p| Pt2::new(p.x as Real, p.y as Real)).collect())
        .collect();

    info!("solving camera model from {} images", cache.image_count);
    let out = calibrate_camera_with(&cache.corner_position, &image_points, image_size, &config.solver)?;

    cache.intrinsic_matrix = Some(out.intrinsics.to_matrix());
    cache.dist_coeffs = Some(out.distortion);
    cache.rvecs_mat = out.rvecs.clone();
    cache.tvecs_mat = out.tvecs.clone();
    cache.rms = Some(out.rms);
    Ok(out)
}
