use crate::camera::{CameraIntrinsics, DistortionCoeffs};
use crate::error::CalibrationError;
use chesscal_core::{ImageSize, Mat3, Vec3};

/// Per-pixel source coordinates for an undistorted output image.
#[derive(Clone, Debug)]
pub struct UndistortMaps {
    pub size: ImageSize,
    /// Source x for each output pixel, row-major.
    pub map_x: Vec<f32>,
    /// Source y for each output pixel, row-major.
    pub map_y: Vec<f32>,
}

impl UndistortMaps {
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> (f32, f32) {
        let idx = y as usize * self.size.width as usize + x as usize;
        (self.map_x[idx], self.map_y[idx])
    }
}

/// Build remap tables that undistort images of camera `(k, dist)`.
///
/// Each output pixel is back-projected through `(new_k · r)⁻¹`, distorted,
/// and projected with `k`. Passing the identity for `r` and `k` for `new_k`
/// keeps the field of view unchanged.
pub fn init_undistort_rectify_map(
    k: &Mat3,
    dist: &DistortionCoeffs,
    r: &Mat3,
    new_k: &Mat3,
    size: ImageSize,
) -> Result<UndistortMaps, CalibrationError> {
    if size.width == 0 || size.height == 0 {
        return Err(CalibrationError::InvalidImageSize(size));
    }
    let inv = (new_k * r)
        .try_inverse()
        .ok_or(CalibrationError::SingularCameraMatrix)?;
    let intr = CameraIntrinsics::from_matrix(k);

    let n = size.width as usize * size.height as usize;
    let mut map_x = Vec::with_capacity(n);
    let mut map_y = Vec::with_capacity(n);
    for v in 0..size.height {
        for u in 0..size.width {
            let ray = inv * Vec3::new(u as f64, v as f64, 1.0);
            let (x, y) = (ray.x / ray.z, ray.y / ray.z);
            let (xd, yd) = dist.distort(x, y);
            let src = intr.to_pixel(xd, yd);
            map_x.push(src.x as f32);
            map_y.push(src.y as f32);
        }
    }

    Ok(UndistortMaps { size, map_x, map_y })
}

/// Bilinear remap of an interleaved 8-bit image. Taps that fall outside the
/// source contribute black; map entries beyond one pixel of the source, or
/// non-finite, produce black pixels.
pub fn remap_bilinear(src: &[u8], src_size: ImageSize, channels: usize, maps: &UndistortMaps) -> Vec<u8> {
    let (sw, sh) = (src_size.width as i64, src_size.height as i64);
    let (max_x, max_y) = (src_size.width as f32, src_size.height as f32);
    let tap = |x: i64, y: i64, c: usize| -> f32 {
        if x < 0 || y < 0 || x >= sw || y >= sh {
            0.0
        } else {
            src[(y as usize * sw as usize + x as usize) * channels + c] as f32
        }
    };

    let mut out = Vec::with_capacity(maps.map_x.len() * channels);
    for (&sx, &sy) in maps.map_x.iter().zip(&maps.map_y) {
        // Also rejects NaN, so the casts below never saturate.
        if !(-1.0..=max_x).contains(&sx) || !(-1.0..=max_y).contains(&sy) {
            out.extend(std::iter::repeat(0u8).take(channels));
            continue;
        }
        let x0 = sx.floor();
        let y0 = sy.floor();
        let (fx, fy) = (sx - x0, sy - y0);
        let (x0, y0) = (x0 as i64, y0 as i64);
        for c in 0..channels {
            let top = tap(x0, y0, c) * (1.0 - fx) + tap(x0 + 1, y0, c) * fx;
            let bottom = tap(x0, y0 + 1, c) * (1.0 - fx) + tap(x0 + 1, y0 + 1, c) * fx;
            let value = top * (1.0 - fy) + bottom * fy;
            out.push(value.round().clamp(0.0, 255.0) as u8);
        }
    }
    out
}
