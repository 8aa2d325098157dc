use chesscal_core::ImageSize;

#[derive(thiserror::Error, Debug)]
pub enum CalibrationError {
    #[error("no views to calibrate from")]
    NoViews,
    #[error("object point views ({object}) and image point views ({image}) differ in count")]
    ViewCountMismatch { object: usize, image: usize },
    #[error("view {view}: {object} object points but {image} image points")]
    PointCountMismatch {
        view: usize,
        object: usize,
        image: usize,
    },
    #[error("view {view}: need at least 4 correspondences, got {count}")]
    TooFewPoints { view: usize, count: usize },
    #[error("view {view}: object points must lie on the z = 0 plane")]
    NonPlanarTarget { view: usize },
    #[error("view {view}: homography estimation failed")]
    HomographyFailed { view: usize },
    #[error("view {view}: could not recover an initial pose")]
    PoseInitFailed { view: usize },
    #[error("invalid image size {}x{}", .0.width, .0.height)]
    InvalidImageSize(ImageSize),
    #[error("degenerate configuration in intrinsics estimation")]
    DegenerateIntrinsics,
    #[error("camera matrix is not invertible")]
    SingularCameraMatrix,
    #[error("solver produced non-finite parameters")]
    NonFinite,
}
