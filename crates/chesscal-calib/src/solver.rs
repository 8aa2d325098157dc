//! Joint refinement of intrinsics, distortion and per-view poses.
//!
//! Parameter layout: `[fx, fy, cx, cy, k1, k2, p1, p2, k3]` followed by
//! `[rvec, tvec]` for each view. Residuals are `projected - observed` in
//! pixels, `x` then `y`, point by point and view by view.

use crate::camera::{project_point, rodrigues, CameraIntrinsics, DistortionCoeffs};
use crate::error::CalibrationError;
use crate::planar_pose::pose_from_homography;
use crate::zhang::{estimate_focal_with_center, estimate_intrinsics_zhang};
use chesscal_core::{estimate_homography, ImageSize, Mat3, Pt2, Pt3, Real, Vec3};
use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt};
use log::{debug, info, warn};
use nalgebra::{storage::Owned, DMatrix, DVector, Dyn};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

const N_INTRINSIC: usize = 9;
const N_POSE: usize = 6;

/// Levenberg–Marquardt stopping criteria.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    pub ftol: Real,
    pub xtol: Real,
    pub gtol: Real,
    /// Evaluation budget, in multiples of `parameters + 1`.
    pub patience: usize,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            ftol: 1e-12,
            xtol: 1e-12,
            gtol: 1e-12,
            patience: 100,
        }
    }
}

/// Solved camera model and per-view extrinsics.
#[derive(Clone, Debug)]
pub struct CalibrationOutput {
    pub intrinsics: CameraIntrinsics,
    pub distortion: DistortionCoeffs,
    pub rvecs: Vec<Vec3>,
    pub tvecs: Vec<Vec3>,
    /// Root-mean-square reprojection error over all points, pixels.
    pub rms: Real,
    pub converged: bool,
    pub evaluations: usize,
}

struct PlanarCalibProblem<'a> {
    object: &'a [Vec<Pt3>],
    image: &'a [Vec<Pt2>],
    /// First residual row of each view.
    offsets: Vec<usize>,
    num_residuals: usize,
    params: DVector<Real>,
}

fn unpack_camera(p: &DVector<Real>) -> (CameraIntrinsics, DistortionCoeffs) {
    (
        CameraIntrinsics::new(p[0], p[1], p[2], p[3]),
        DistortionCoeffs::from_array([p[4], p[5], p[6], p[7], p[8]]),
    )
}

fn unpack_pose(p: &DVector<Real>, view: usize) -> (Vec3, Vec3) {
    let o = N_INTRINSIC + N_POSE * view;
    (
        Vec3::new(p[o], p[o + 1], p[o + 2]),
        Vec3::new(p[o + 3], p[o + 4], p[o + 5]),
    )
}

#[inline]
fn fd_step(x: Real) -> Real {
    1e-6 * (x.abs() + 1.0)
}

impl<'a> PlanarCalibProblem<'a> {
    fn new(object: &'a [Vec<Pt3>], image: &'a [Vec<Pt2>], params: DVector<Real>) -> Self {
        let mut offsets = Vec::with_capacity(image.len());
        let mut num_residuals = 0;
        for view in image {
            offsets.push(num_residuals);
            num_residuals += 2 * view.len();
        }
        Self {
            object,
            image,
            offsets,
            num_residuals,
            params,
        }
    }

    fn view_residuals(
        &self,
        view: usize,
        intr: &CameraIntrinsics,
        dist: &DistortionCoeffs,
        rvec: &Vec3,
        tvec: &Vec3,
        out: &mut [Real],
    ) {
        let rotation = rodrigues(rvec);
        for (k, (obj, obs)) in self.object[view].iter().zip(&self.image[view]).enumerate() {
            let proj = project_point(obj, &rotation, tvec, intr, dist);
            out[2 * k] = proj.x - obs.x;
            out[2 * k + 1] = proj.y - obs.y;
        }
    }

    fn residuals_at(&self, p: &DVector<Real>) -> DVector<Real> {
        let (intr, dist) = unpack_camera(p);
        let mut r = DVector::zeros(self.num_residuals);
        for view in 0..self.image.len() {
            let (rvec, tvec) = unpack_pose(p, view);
            let start = self.offsets[view];
            let end = start + 2 * self.image[view].len();
            self.view_residuals(
                view,
                &intr,
                &dist,
                &rvec,
                &tvec,
                &mut r.as_mut_slice()[start..end],
            );
        }
        r
    }

    /// Central differences. Camera columns touch every row; a pose column
    /// only touches the rows of its own view.
    fn jacobian_at(&self, p: &DVector<Real>) -> DMatrix<Real> {
        let mut jac = DMatrix::zeros(self.num_residuals, p.len());

        let mut probe = p.clone();
        for c in 0..N_INTRINSIC {
            let h = fd_step(p[c]);
            probe[c] = p[c] + h;
            let plus = self.residuals_at(&probe);
            probe[c] = p[c] - h;
            let minus = self.residuals_at(&probe);
            probe[c] = p[c];
            jac.set_column(c, &((plus - minus) / (2.0 * h)));
        }

        let (intr, dist) = unpack_camera(p);
        for view in 0..self.image.len() {
            let rows = 2 * self.image[view].len();
            let start = self.offsets[view];
            let mut plus = vec![0.0; rows];
            let mut minus = vec![0.0; rows];
            let base = N_INTRINSIC + N_POSE * view;
            for c in 0..N_POSE {
                let idx = base + c;
                let h = fd_step(p[idx]);
                probe[idx] = p[idx] + h;
                let (rvec, tvec) = unpack_pose(&probe, view);
                self.view_residuals(view, &intr, &dist, &rvec, &tvec, &mut plus);
                probe[idx] = p[idx] - h;
                let (rvec, tvec) = unpack_pose(&probe, view);
                self.view_residuals(view, &intr, &dist, &rvec, &tvec, &mut minus);
                probe[idx] = p[idx];
                for r in 0..rows {
                    jac[(start + r, idx)] = (plus[r] - minus[r]) / (2.0 * h);
                }
            }
        }
        jac
    }
}

impl LeastSquaresProblem<Real, Dyn, Dyn> for PlanarCalibProblem<'_> {
    type ResidualStorage = Owned<Real, Dyn>;
    type JacobianStorage = Owned<Real, Dyn, Dyn>;
    type ParameterStorage = Owned<Real, Dyn>;

    fn set_params(&mut self, x: &DVector<Real>) {
        self.params.clone_from(x);
    }

    fn params(&self) -> DVector<Real> {
        self.params.clone()
    }

    fn residuals(&self) -> Option<DVector<Real>> {
        Some(self.residuals_at(&self.params))
    }

    fn jacobian(&self) -> Option<DMatrix<Real>> {
        Some(self.jacobian_at(&self.params))
    }
}

fn validate_views(object: &[Vec<Pt3>], image: &[Vec<Pt2>]) -> Result<(), CalibrationError> {
    if image.is_empty() {
        return Err(CalibrationError::NoViews);
    }
    if object.len() != image.len() {
        return Err(CalibrationError::ViewCountMismatch {
            object: object.len(),
            image: image.len(),
        });
    }
    for (view, (obj, img)) in object.iter().zip(image).enumerate() {
        if obj.len() != img.len() {
            return Err(CalibrationError::PointCountMismatch {
                view,
                object: obj.len(),
                image: img.len(),
            });
        }
        if obj.len() < 4 {
            return Err(CalibrationError::TooFewPoints {
                view,
                count: obj.len(),
            });
        }
        let scale = obj
            .iter()
            .map(|p| p.x.abs().max(p.y.abs()))
            .fold(1.0, Real::max);
        if obj.iter().any(|p| p.z.abs() > 1e-9 * scale) {
            return Err(CalibrationError::NonPlanarTarget { view });
        }
    }
    Ok(())
}

/// Calibrate with default solver options.
pub fn calibrate_camera(
    object_points: &[Vec<Pt3>],
    image_points: &[Vec<Pt2>],
    image_size: ImageSize,
) -> Result<CalibrationOutput, CalibrationError> {
    calibrate_camera_with(object_points, image_points, image_size, &SolverOptions::default())
}

/// Estimate one pinhole + 5-coefficient distortion model and a pose per
/// view from planar correspondences.
///
/// The linear stage (homographies, closed-form intrinsics, homography poses)
/// seeds a single Levenberg–Marquardt run over all parameters. Skew is held
/// at zero.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(object_points, image_points, opts), fields(views = image_points.len()))
)]
pub fn calibrate_camera_with(
    object_points: &[Vec<Pt3>],
    image_points: &[Vec<Pt2>],
    image_size: ImageSize,
    opts: &SolverOptions,
) -> Result<CalibrationOutput, CalibrationError> {
    if image_size.width == 0 || image_size.height == 0 {
        return Err(CalibrationError::InvalidImageSize(image_size));
    }
    validate_views(object_points, image_points)?;

    let homographies = object_points
        .iter()
        .zip(image_points)
        .enumerate()
        .map(|(view, (obj, img))| {
            let plane: Vec<Pt2> = obj.iter().map(|p| Pt2::new(p.x, p.y)).collect();
            estimate_homography(&plane, img)
                .map(|h| h.h)
                .ok_or(CalibrationError::HomographyFailed { view })
        })
        .collect::<Result<Vec<Mat3>, _>>()?;

    let mut intr = match estimate_intrinsics_zhang(&homographies, image_size) {
        Ok(k) => k,
        Err(e) => {
            debug!("closed-form intrinsics unavailable ({e}), using centred focal estimate");
            estimate_focal_with_center(&homographies, image_size)
        }
    };
    intr.skew = 0.0;
    debug!(
        "initial intrinsics fx={:.2} fy={:.2} cx={:.2} cy={:.2}",
        intr.fx, intr.fy, intr.cx, intr.cy
    );

    let k = intr.to_matrix();
    let mut params = DVector::zeros(N_INTRINSIC + N_POSE * image_points.len());
    params[0] = intr.fx;
    params[1] = intr.fy;
    params[2] = intr.cx;
    params[3] = intr.cy;
    for (view, h) in homographies.iter().enumerate() {
        let (rvec, tvec) =
            pose_from_homography(&k, h).ok_or(CalibrationError::PoseInitFailed { view })?;
        let o = N_INTRINSIC + N_POSE * view;
        params.rows_mut(o, 3).copy_from(&rvec);
        params.rows_mut(o + 3, 3).copy_from(&tvec);
    }

    let problem = PlanarCalibProblem::new(object_points, image_points, params);
    let initial_rms = rms_of(&problem.residuals_at(&problem.params), problem.num_residuals);
    info!(
        "calibrating from {} views, {} residuals, initial rms {:.4}px",
        image_points.len(),
        problem.num_residuals,
        initial_rms
    );

    let lm = LevenbergMarquardt::new()
        .with_ftol(opts.ftol)
        .with_xtol(opts.xtol)
        .with_gtol(opts.gtol)
        .with_patience(opts.patience.max(1));
    let (problem, report) = lm.minimize(problem);

    let params = problem.params();
    if params.iter().any(|v| !v.is_finite()) {
        return Err(CalibrationError::NonFinite);
    }
    let converged = report.termination.was_successful();
    if !converged {
        warn!("solver stopped without converging: {:?}", report.termination);
    }

    let rms = rms_of(&problem.residuals_at(&params), problem.num_residuals);
    let (intrinsics, distortion) = unpack_camera(&params);
    let (rvecs, tvecs): (Vec<Vec3>, Vec<Vec3>) = (0..image_points.len())
        .map(|view| unpack_pose(&params, view))
        .unzip();

    info!(
        "calibration rms {:.4}px after {} evaluations",
        rms, report.number_of_evaluations
    );

    Ok(CalibrationOutput {
        intrinsics,
        distortion,
        rvecs,
        tvecs,
        rms,
        converged,
        evaluations: report.number_of_evaluations,
    })
}

/// Root-mean-square over points, with two residuals per point.
fn rms_of(residuals: &DVector<Real>, num_residuals: usize) -> Real {
    let points = (num_residuals / 2).max(1) as Real;
    (residuals.norm_squared() / points).sqrt()
}
