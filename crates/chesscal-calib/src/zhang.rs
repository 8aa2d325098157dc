//! Closed-form intrinsics from plane homographies.

use crate::camera::CameraIntrinsics;
use crate::error::CalibrationError;
use chesscal_core::{ImageSize, Mat3, Real};
use nalgebra::{DMatrix, DVector, SVector};

/// The 6-vector `v_ij(H)` of Zhang's constraint `v_ijᵀ b = h_iᵀ B h_j`.
fn v_ij(h: &Mat3, i: usize, j: usize) -> SVector<Real, 6> {
    let hi = h.column(i);
    let hj = h.column(j);
    SVector::<Real, 6>::from_row_slice(&[
        hi[0] * hj[0],
        hi[0] * hj[1] + hi[1] * hj[0],
        hi[1] * hj[1],
        hi[2] * hj[0] + hi[0] * hj[2],
        hi[2] * hj[1] + hi[1] * hj[2],
        hi[2] * hj[2],
    ])
}

/// Pixel-to-normalized conditioning transform centred on the image.
fn conditioning(size: ImageSize) -> (Mat3, Real, Real, Real) {
    let cx = size.width as Real * 0.5;
    let cy = size.height as Real * 0.5;
    let s = cx.max(cy).max(1.0);
    let n = Mat3::new(
        1.0 / s, 0.0, -cx / s, //
        0.0, 1.0 / s, -cy / s, //
        0.0, 0.0, 1.0,
    );
    (n, s, cx, cy)
}

/// Zhang's closed-form solution. Needs at least three homographies in
/// general position.
///
/// Homographies are conditioned to the image size before the linear solve,
/// which keeps `V` well scaled for pixel-sized inputs.
pub fn estimate_intrinsics_zhang(
    homographies: &[Mat3],
    size: ImageSize,
) -> Result<CameraIntrinsics, CalibrationError> {
    if homographies.len() < 3 {
        return Err(CalibrationError::DegenerateIntrinsics);
    }
    let (n, s, cx0, cy0) = conditioning(size);

    let m = homographies.len();
    let mut v = DMatrix::<Real>::zeros(2 * m, 6);
    for (k, h) in homographies.iter().enumerate() {
        let hn = n * h;
        let hn = hn / hn.norm();
        let v11 = v_ij(&hn, 0, 0);
        let v22 = v_ij(&hn, 1, 1);
        let v12 = v_ij(&hn, 0, 1);
        v.row_mut(2 * k).copy_from(&v12.transpose());
        v.row_mut(2 * k + 1).copy_from(&(v11 - v22).transpose());
    }

    let svd = v.svd(false, true);
    let v_t = svd.v_t.ok_or(CalibrationError::DegenerateIntrinsics)?;
    let (min_idx, _) = svd
        .singular_values
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .ok_or(CalibrationError::DegenerateIntrinsics)?;
    let mut b = v_t.row(min_idx).transpose().into_owned();
    // B is positive definite up to scale.
    if b[0] < 0.0 {
        b = -b;
    }
    let (b11, b12, b22, b13, b23, b33) = (b[0], b[1], b[2], b[3], b[4], b[5]);

    let denom = b11 * b22 - b12 * b12;
    let denom_norm = b11 * b11 + b22 * b22;
    if denom_norm <= 0.0 || denom.abs() / denom_norm < 1e-9 || denom <= 0.0 {
        return Err(CalibrationError::DegenerateIntrinsics);
    }

    let v0 = (b12 * b13 - b11 * b23) / denom;
    let lambda = b33 - (b13 * b13 + v0 * (b12 * b13 - b11 * b23)) / b11;
    if lambda <= 0.0 {
        return Err(CalibrationError::DegenerateIntrinsics);
    }

    let alpha = (lambda / b11).sqrt();
    let beta = (lambda * b11 / denom).sqrt();
    let gamma = -b12 * alpha * alpha * beta / lambda;
    let u0 = gamma * v0 / beta - b13 * alpha * alpha / lambda;

    // Undo the conditioning: K = N⁻¹ K'.
    let intr = CameraIntrinsics {
        fx: alpha * s,
        fy: beta * s,
        cx: u0 * s + cx0,
        cy: v0 * s + cy0,
        skew: gamma * s,
    };
    if !is_plausible(&intr, size) {
        return Err(CalibrationError::DegenerateIntrinsics);
    }
    Ok(intr)
}

/// Focal lengths with the principal point fixed at the image centre and
/// zero skew. Works from a single view.
pub fn estimate_focal_with_center(homographies: &[Mat3], size: ImageSize) -> CameraIntrinsics {
    let cx = size.width as Real * 0.5;
    let cy = size.height as Real * 0.5;
    let fallback = (size.width.max(size.height) as Real).max(1.0);
    let shift = Mat3::new(1.0, 0.0, -cx, 0.0, 1.0, -cy, 0.0, 0.0, 1.0);

    // With B = diag(1/fx², 1/fy², 1), each view gives two linear equations
    // in (1/fx², 1/fy²).
    let m = homographies.len();
    let mut a = DMatrix::<Real>::zeros(2 * m, 2);
    let mut rhs = DVector::<Real>::zeros(2 * m);
    for (k, h) in homographies.iter().enumerate() {
        let hc = shift * h;
        let hc = hc / hc.norm();
        let (h11, h12) = (hc[(0, 0)], hc[(0, 1)]);
        let (h21, h22) = (hc[(1, 0)], hc[(1, 1)]);
        let (h31, h32) = (hc[(2, 0)], hc[(2, 1)]);

        a[(2 * k, 0)] = h11 * h12;
        a[(2 * k, 1)] = h21 * h22;
        rhs[2 * k] = -h31 * h32;
        a[(2 * k + 1, 0)] = h11 * h11 - h12 * h12;
        a[(2 * k + 1, 1)] = h21 * h21 - h22 * h22;
        rhs[2 * k + 1] = -(h31 * h31 - h32 * h32);
    }

    let focal = a
        .svd(true, true)
        .solve(&rhs, 1e-15)
        .ok()
        .and_then(|x| {
            let (ia, ib) = (x[0], x[1]);
            (ia > 0.0 && ib > 0.0).then(|| (1.0 / ia.sqrt(), 1.0 / ib.sqrt()))
        })
        .filter(|(fx, fy)| fx.is_finite() && fy.is_finite());

    match focal {
        Some((fx, fy)) => CameraIntrinsics::new(fx, fy, cx, cy),
        None => CameraIntrinsics::new(fallback, fallback, cx, cy),
    }
}

fn is_plausible(k: &CameraIntrinsics, size: ImageSize) -> bool {
    let (w, h) = (size.width as Real, size.height as Real);
    let finite = [k.fx, k.fy, k.cx, k.cy, k.skew].iter().all(|v| v.is_finite());
    finite
        && k.fx > 0.0
        && k.fy > 0.0
        && (k.fx / k.fy) > 0.2
        && (k.fx / k.fy) < 5.0
        && k.cx > 0.0
        && k.cx < w
        && k.cy > 0.0
        && k.cy < h
}
