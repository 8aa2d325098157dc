use chesscal_calib::view_reprojection_error;
use chesscal_core::{Pt2, Real};
use log::info;

use crate::cache::CalibrationCache;
use crate::error::PipelineError;

/// Reprojection quality of a solved cache, in pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct Evaluation {
    /// Stacked-norm error per accepted image, divided by its corner count.
    pub per_image: Vec<Real>,
    /// Mean of `per_image`.
    pub overall: Real,
}

/// Reproject every image's board points through the solved model. Reads
/// the cache only, so repeated calls give identical results.
pub fn evaluate(cache: &CalibrationCache) -> Result<Evaluation, PipelineError> {
    let (intrinsics, dist) = cache.camera()?;
    if cache.image_count == 0 {
        return Err(PipelineError::NoUsableImages);
    }

    let mut per_image = Vec::with_capacity(cache.image_count);
    for i in 0..cache.image_count {
        let observed: Vec<Pt2> = cache.corner_point_sequence[i]
            .iter()
            .map(|p| Pt2::new(p.x as Real, p.y as Real))
            .collect();
        let err = view_reprojection_error(
            &cache.corner_position[i],
            &observed,
            &cache.rvecs_mat[i],
            &cache.tvecs_mat[i],
            &intrinsics,
            &dist,
        );
        info!("image {} mean error: {:.6} pixels", i + 1, err);
        per_image.push(err);
    }

    let overall = per_image.iter().sum::<Real>() / cache.image_count as Real;
    info!("overall mean error: {:.6} pixels", overall);
    Ok(Evaluation { per_image, overall })
}
