use chesscal_core::{Mat3, Pt2, Pt3, Real, Vec3};
use nalgebra::Rotation3;
use serde::{Deserialize, Serialize};

/// Pinhole intrinsics. Skew is carried for completeness; the calibration
/// solver keeps it at zero.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    pub fx: Real,
    pub fy: Real,
    pub cx: Real,
    pub cy: Real,
    pub skew: Real,
}

impl CameraIntrinsics {
    pub fn new(fx: Real, fy: Real, cx: Real, cy: Real) -> Self {
        Self {
            fx,
            fy,
            cx,
            cy,
            skew: 0.0,
        }
    }

    /// The 3×3 camera matrix `K`.
    pub fn to_matrix(&self) -> Mat3 {
        Mat3::new(
            self.fx, self.skew, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }

    pub fn from_matrix(k: &Mat3) -> Self {
        Self {
            fx: k[(0, 0)],
            fy: k[(1, 1)],
            cx: k[(0, 2)],
            cy: k[(1, 2)],
            skew: k[(0, 1)],
        }
    }

    /// Normalized image coordinates to pixels.
    #[inline]
    pub fn to_pixel(&self, x: Real, y: Real) -> Pt2 {
        Pt2::new(self.fx * x + self.skew * y + self.cx, self.fy * y + self.cy)
    }
}

/// Brown–Conrady coefficients with two tangential and three radial terms.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DistortionCoeffs {
    pub k1: Real,
    pub k2: Real,
    pub p1: Real,
    pub p2: Real,
    pub k3: Real,
}

impl DistortionCoeffs {
    /// Coefficients in the conventional `(k1, k2, p1, p2, k3)` order.
    pub fn as_array(&self) -> [Real; 5] {
        [self.k1, self.k2, self.p1, self.p2, self.k3]
    }

    pub fn from_array(c: [Real; 5]) -> Self {
        Self {
            k1: c[0],
            k2: c[1],
            p1: c[2],
            p2: c[3],
            k3: c[4],
        }
    }

    /// Apply the distortion to a normalized, undistorted point.
    #[inline]
    pub fn distort(&self, x: Real, y: Real) -> (Real, Real) {
        let r2 = x * x + y * y;
        let r4 = r2 * r2;
        let r6 = r4 * r2;
        let radial = 1.0 + self.k1 * r2 + self.k2 * r4 + self.k3 * r6;

        let xy = x * y;
        let x_tan = 2.0 * self.p1 * xy + self.p2 * (r2 + 2.0 * x * x);
        let y_tan = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * xy;

        (x * radial + x_tan, y * radial + y_tan)
    }
}

/// Rotation vector (axis × angle) to rotation matrix.
pub fn rodrigues(rvec: &Vec3) -> Mat3 {
    Rotation3::new(*rvec).into_inner()
}

/// Rotation matrix to rotation vector. The input is re-orthonormalized first.
pub fn rotation_to_rvec(r: &Mat3) -> Vec3 {
    Rotation3::from_matrix(r).scaled_axis()
}

/// Project a single board point through pose, pinhole and distortion.
#[inline]
pub fn project_point(
    p: &Pt3,
    rotation: &Mat3,
    tvec: &Vec3,
    intrinsics: &CameraIntrinsics,
    dist: &DistortionCoeffs,
) -> Pt2 {
    let pc = rotation * p.coords + tvec;
    let (x, y) = (pc.x / pc.z, pc.y / pc.z);
    let (xd, yd) = dist.distort(x, y);
    intrinsics.to_pixel(xd, yd)
}

/// Project board points into the image of a camera at pose `(rvec, tvec)`.
pub fn project_points(
    object: &[Pt3],
    rvec: &Vec3,
    tvec: &Vec3,
    intrinsics: &CameraIntrinsics,
    dist: &DistortionCoeffs,
) -> Vec<Pt2> {
    let rotation = rodrigues(rvec);
    object
        .iter()
        .map(|p| project_point(p, &rotation, tvec, intrinsics, dist))
        .collect()
}
