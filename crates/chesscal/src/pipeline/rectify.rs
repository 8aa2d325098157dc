use std::fs;
use std::path::Path;

use chesscal_calib::{init_undistort_rectify_map, remap_bilinear};
use chesscal_core::{ImageSize, Mat3};
use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};
use log::info;

use crate::cache::CalibrationCache;
use crate::error::PipelineError;

use super::ingest::decode_image;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Undistort `image` with the cached camera model, keeping the camera matrix
/// and field of view. 8-bit gray stays gray, images with alpha become RGBA
/// and everything else becomes RGB. Deeper samples are reduced to 8 bits.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip_all, fields(width = image.width(), height = image.height()))
)]
pub fn undistort_image(cache: &CalibrationCache, image: &DynamicImage) -> Result<DynamicImage, PipelineError> {
    let k = cache.intrinsic_matrix.ok_or(PipelineError::NotCalibrated)?;
    let dist = cache.dist_coeffs.ok_or(PipelineError::NotCalibrated)?;
    let size = ImageSize::new(image.width(), image.height());
    let maps = init_undistort_rectify_map(&k, &dist, &Mat3::identity(), &k, size)?;

    let rectified = match image {
        DynamicImage::ImageLuma8(gray) => {
            let mut out = GrayImage::new(size.width, size.height);
            out.copy_from_slice(&remap_bilinear(gray.as_raw(), size, 1, &maps));
            DynamicImage::ImageLuma8(out)
        }
        other if other.color().has_alpha() => {
            let rgba = other.to_rgba8();
            let mut out = RgbaImage::new(size.width, size.height);
            out.copy_from_slice(&remap_bilinear(rgba.as_raw(), size, 4, &maps));
            DynamicImage::ImageRgba8(out)
        }
        other => {
            let rgb = other.to_rgb8();
            let mut out = RgbImage::new(size.width, size.height);
            out.copy_from_slice(&remap_bilinear(rgb.as_raw(), size, 3, &maps));
            DynamicImage::ImageRgb8(out)
        }
    };
    Ok(rectified)
}

/// Load the sample image, undistort it and write the result.
pub fn rectify_sample(
    cache: &CalibrationCache,
    sample_path: &Path,
    output_path: &Path,
) -> Result<DynamicImage, PipelineError> {
    let sample = decode_image(sample_path, |source| PipelineError::SampleImageLoad {
        path: sample_path.to_path_buf(),
        source,
    })?;

    let rectified = undistort_image(cache, &sample)?;

    let write_err = |source| PipelineError::OutputImageWrite {
        path: output_path.to_path_buf(),
        source,
    };
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| write_err(image::ImageError::IoError(e)))?;
    }
    rectified.save(output_path).map_err(&write_err)?;
    info!("rectified image written to {}", output_path.display());
    Ok(rectified)
}
