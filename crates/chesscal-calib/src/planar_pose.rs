use crate::camera::rotation_to_rvec;
use chesscal_core::{Mat3, Real, Vec3};
use nalgebra::Matrix3;

/// Pose of a `z = 0` board from its homography `H ∝ K [r1 r2 t]`.
///
/// Returns `(rvec, tvec)` mapping board coordinates into the camera frame,
/// with the board in front of the camera (`t.z > 0`).
pub fn pose_from_homography(k: &Mat3, h: &Mat3) -> Option<(Vec3, Vec3)> {
    let k_inv = k.try_inverse()?;

    let a1 = k_inv * h.column(0);
    let a2 = k_inv * h.column(1);
    let a3 = k_inv * h.column(2);

    let norm1 = a1.norm();
    let norm2 = a2.norm();
    if norm1 <= Real::EPSILON || norm2 <= Real::EPSILON {
        return None;
    }
    let mut lambda = 2.0 / (norm1 + norm2);
    // H is only known up to sign.
    if a3.z * lambda < 0.0 {
        lambda = -lambda;
    }

    let r1 = a1 * lambda;
    let r2 = a2 * lambda;
    let r3 = r1.cross(&r2);
    let t = a3 * lambda;

    let r = Matrix3::from_columns(&[r1, r2, r3]);

    // Closest rotation in the Frobenius sense.
    let svd = r.svd(true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;
    let mut r_orth = u * v_t;
    if r_orth.determinant() < 0.0 {
        let mut u_flipped = u;
        u_flipped.column_mut(2).neg_mut();
        r_orth = u_flipped * v_t;
    }

    let rvec = rotation_to_rvec(&r_orth);
    (rvec.iter().chain(t.iter()).all(|v| v.is_finite())).then_some((rvec, t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{rodrigues, CameraIntrinsics};
    use approx::assert_relative_eq;

    #[test]
    fn recovers_pose_from_exact_homography() {
        let k = CameraIntrinsics::new(800.0, 780.0, 320.0, 240.0).to_matrix();
        let rvec = Vec3::new(0.1, -0.2, 0.05);
        let tvec = Vec3::new(-90.0, -60.0, 550.0);
        let r = rodrigues(&rvec);

        let mut h = Mat3::zeros();
        h.set_column(0, &(k * r.column(0)));
        h.set_column(1, &(k * r.column(1)));
        h.set_column(2, &(k * tvec));

        let (rv, tv) = pose_from_homography(&k, &h).expect("pose");
        assert_relative_eq!(rv, rvec, epsilon = 1e-9);
        assert_relative_eq!(tv, tvec, epsilon = 1e-6);

        // A negated homography describes the same pose.
        let (rv, tv) = pose_from_homography(&k, &(-h)).expect("pose");
        assert_relative_eq!(rv, rvec, epsilon = 1e-9);
        assert_relative_eq!(tv, tvec, epsilon = 1e-6);
    }
}
