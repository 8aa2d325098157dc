//! Camera model and planar calibration.
//!
//! - [`project_points`] and [`rodrigues`] implement the pinhole camera with
//!   Brown–Conrady `(k1, k2, p1, p2, k3)` distortion.
//! - [`calibrate_camera`] estimates shared intrinsics and per-view poses from
//!   `z = 0` board correspondences. A closed-form start is refined with
//!   Levenberg–Marquardt.
//! - [`init_undistort_rectify_map`] and [`remap_bilinear`] undistort images
//!   of a calibrated camera.
//!
//! ```
//! use chesscal_calib::{project_points, CameraIntrinsics, DistortionCoeffs};
//! use chesscal_core::{Pt3, Vec3};
//!
//! let k = CameraIntrinsics::new(600.0, 600.0, 320.0, 240.0);
//! let px = project_points(
//!     &[Pt3::origin()],
//!     &Vec3::zeros(),
//!     &Vec3::new(0.0, 0.0, 1.0),
//!     &k,
//!     &DistortionCoeffs::default(),
//! );
//! assert_eq!(320.0, px[0].x);
//! ```

mod camera;
mod error;
mod planar_pose;
mod reprojection;
mod solver;
mod undistort;
mod zhang;

pub use camera::{
    project_point, project_points, rodrigues, rotation_to_rvec, CameraIntrinsics,
    DistortionCoeffs,
};
pub use error::CalibrationError;
pub use planar_pose::pose_from_homography;
pub use reprojection::{mean_reprojection_error, view_reprojection_error};
pub use solver::{calibrate_camera, calibrate_camera_with, CalibrationOutput, SolverOptions};
pub use undistort::{init_undistort_rectify_map, remap_bilinear, UndistortMaps};
pub use zhang::{estimate_focal_with_center, estimate_intrinsics_zhang};
