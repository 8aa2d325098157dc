use nalgebra::{Matrix3, Point2, Point3, Vector3};

pub type Real = f64;

pub type Vec3 = Vector3<Real>;
pub type Pt2 = Point2<Real>;
pub type Pt3 = Point3<Real>;
pub type Mat3 = Matrix3<Real>;

/// Pixel-space point as produced by the corner detector.
pub type Pt2f = Point2<f32>;
