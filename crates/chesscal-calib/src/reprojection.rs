use crate::camera::{project_points, CameraIntrinsics, DistortionCoeffs};
use chesscal_core::{Pt2, Pt3, Real, Vec3};

/// Euclidean norm of the stacked point differences divided by the number of
/// points.
///
/// This is the per-image figure printed in calibration reports. It is not a
/// mean of per-point distances.
pub fn mean_reprojection_error(observed: &[Pt2], projected: &[Pt2]) -> Real {
    if observed.is_empty() {
        return 0.0;
    }
    let sum_sq: Real = observed
        .iter()
        .zip(projected)
        .map(|(o, p)| (o - p).norm_squared())
        .sum();
    sum_sq.sqrt() / observed.len() as Real
}

/// Reproject `object` through a solved view and score it against `observed`.
pub fn view_reprojection_error(
    object: &[Pt3],
    observed: &[Pt2],
    rvec: &Vec3,
    tvec: &Vec3,
    intrinsics: &CameraIntrinsics,
    dist: &DistortionCoeffs,
) -> Real {
    let projected = project_points(object, rvec, tvec, intrinsics, dist);
    mean_reprojection_error(observed, &projected)
}
