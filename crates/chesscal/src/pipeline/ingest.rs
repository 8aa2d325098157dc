use std::fs;
use std::path::{Path, PathBuf};

use chesscal_core::ImageSize;
use image::{DynamicImage, ImageReader};
use log::{debug, warn};

use crate::cache::CalibrationCache;
use crate::error::PipelineError;

/// Image paths listed in a manifest, in file order. Blank lines are
/// dropped; surrounding whitespace is trimmed.
pub fn read_manifest(path: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    let raw = fs::read_to_string(path).map_err(|source| PipelineError::ManifestOpen {
        path: path.to_path_buf(),
        source,
    })?;
    let entries: Vec<PathBuf> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .collect();
    debug!("manifest {} lists {} images", path.display(), entries.len());
    Ok(entries)
}

/// Open and decode one image. Any failure is fatal for the run.
pub fn load_image(path: &Path) -> Result<DynamicImage, PipelineError> {
    decode_image(path, |source| PipelineError::ImageLoad {
        path: path.to_path_buf(),
        source,
    })
}

/// Decode `path`, guessing the format from its content. `to_err` picks the
/// pipeline error each failure is reported as.
pub(super) fn decode_image<F>(path: &Path, to_err: F) -> Result<DynamicImage, PipelineError>
where
    F: Fn(image::ImageError) -> PipelineError,
{
    ImageReader::open(path)
        .map_err(|e| to_err(image::ImageError::IoError(e)))?
        .with_guessed_format()
        .map_err(|e| to_err(image::ImageError::IoError(e)))?
        .decode()
        .map_err(to_err)
}

/// Record the session resolution from the first loaded image and check
/// later images against it. Returns `false` for a mismatching image.
pub fn check_resolution(cache: &mut CalibrationCache, path: &Path, size: ImageSize) -> bool {
    match cache.image_size {
        None => {
            debug!("reference resolution {}x{}", size.width, size.height);
            cache.image_size = Some(size);
            true
        }
        Some(expected) if expected == size => true,
        Some(expected) => {
            warn!(
                "{} is {}x{}, expected {}x{}; skipping",
                path.display(),
                size.width,
                size.height,
                expected.width,
                expected.height
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn manifest_skips_blank_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "a.png\n\n  b.jpg  \n").unwrap();
        let entries = read_manifest(file.path()).unwrap();
        assert_eq!(vec![PathBuf::from("a.png"), PathBuf::from("b.jpg")], entries);
    }

    #[test]
    fn missing_manifest_is_fatal() {
        let err = read_manifest(Path::new("/nonexistent/manifest.txt")).unwrap_err();
        assert!(matches!(err, PipelineError::ManifestOpen { .. }));
    }

    #[test]
    fn undecodable_image_is_fatal() {
        let mut file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        file.write_all(b"definitely not a png").unwrap();
        let err = load_image(file.path()).unwrap_err();
        assert!(matches!(err, PipelineError::ImageLoad { .. }));
    }

    #[test]
    fn first_resolution_wins() {
        let mut cache = CalibrationCache::new();
        let p = Path::new("x.png");
        assert!(check_resolution(&mut cache, p, ImageSize::new(640, 480)));
        assert!(!check_resolution(&mut cache, p, ImageSize::new(320, 240)));
        assert!(check_resolution(&mut cache, p, ImageSize::new(640, 480)));
        assert_eq!(Some(ImageSize::new(640, 480)), cache.image_size);
    }
}
