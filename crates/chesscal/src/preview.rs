//! Diagnostic output. Nothing written here feeds back into the calibration.

use std::fs;
use std::path::{Path, PathBuf};

use chesscal_core::{GridSize, Pt2f};
use image::{DynamicImage, Rgb, RgbImage};
use log::{info, warn};

/// Receives intermediate images for inspection.
pub trait PreviewSink {
    /// An accepted calibration image with its refined corners.
    fn show_corners(&mut self, index: usize, image: &DynamicImage, corners: &[Pt2f], grid: GridSize);

    /// The undistorted sample image.
    fn show_rectified(&mut self, image: &DynamicImage);
}

/// Headless default.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoPreview;

impl PreviewSink for NoPreview {
    fn show_corners(&mut self, _: usize, _: &DynamicImage, _: &[Pt2f], _: GridSize) {}

    fn show_rectified(&mut self, _: &DynamicImage) {}
}

/// Writes corner overlays and the rectified sample as PNG files.
#[derive(Clone, Debug)]
pub struct DirectoryPreview {
    dir: PathBuf,
}

impl DirectoryPreview {
    pub fn new(dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn save(&self, name: &str, image: &RgbImage) {
        let path = self.dir.join(name);
        match image.save(&path) {
            Ok(()) => info!("preview written to {}", path.display()),
            Err(e) => warn!("failed to write preview {}: {e}", path.display()),
        }
    }
}

impl PreviewSink for DirectoryPreview {
    fn show_corners(&mut self, index: usize, image: &DynamicImage, corners: &[Pt2f], grid: GridSize) {
        let mut canvas = image.to_rgb8();
        draw_chessboard_corners(&mut canvas, corners, grid);
        self.save(&format!("corners_{:02}.png", index + 1), &canvas);
    }

    fn show_rectified(&mut self, image: &DynamicImage) {
        self.save("rectified.png", &image.to_rgb8());
    }
}

const ROW_COLORS: [[u8; 3]; 6] = [
    [255, 0, 0],
    [255, 128, 0],
    [200, 200, 0],
    [0, 200, 0],
    [0, 128, 255],
    [200, 0, 255],
];

/// Overlay detected corners: one color per board row, a cross at each
/// corner and a polyline in scan order.
pub fn draw_chessboard_corners(image: &mut RgbImage, corners: &[Pt2f], grid: GridSize) {
    let width = grid.width.max(1);
    let mut prev: Option<Pt2f> = None;
    for (k, p) in corners.iter().enumerate() {
        let color = Rgb(ROW_COLORS[(k / width) % ROW_COLORS.len()]);
        if let Some(q) = prev {
            draw_line(image, q, *p, color);
        }
        draw_cross(image, *p, 4, color);
        prev = Some(*p);
    }
}

fn put(image: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && x < image.width() as i64 && y < image.height() as i64 {
        image.put_pixel(x as u32, y as u32, color);
    }
}

fn draw_cross(image: &mut RgbImage, p: Pt2f, r: i64, color: Rgb<u8>) {
    let (cx, cy) = (p.x.round() as i64, p.y.round() as i64);
    for d in -r..=r {
        put(image, cx + d, cy + d, color);
        put(image, cx + d, cy - d, color);
    }
}

fn draw_line(image: &mut RgbImage, a: Pt2f, b: Pt2f, color: Rgb<u8>) {
    let steps = (b - a).abs().max().ceil().max(1.0) as usize;
    for s in 0..=steps {
        let t = s as f32 / steps as f32;
        let x = a.x + (b.x - a.x) * t;
        let y = a.y + (b.y - a.y) * t;
        put(image, x.round() as i64, y.round() as i64, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point2;

    #[test]
    fn overlay_marks_corners_and_ignores_out_of_bounds() {
        let mut img = RgbImage::new(20, 20);
        let corners = [Point2::new(5.0, 5.0), Point2::new(15.0, 5.0), Point2::new(40.0, 40.0)];
        draw_chessboard_corners(&mut img, &corners, GridSize::new(2, 2));
        assert_eq!(Rgb(ROW_COLORS[0]), *img.get_pixel(5, 5));
        // Segment between the first two corners.
        assert_eq!(Rgb(ROW_COLORS[0]), *img.get_pixel(10, 5));
    }

    #[test]
    fn directory_preview_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = DirectoryPreview::new(dir.path().join("preview")).unwrap();
        let img = DynamicImage::ImageLuma8(image::GrayImage::new(8, 8));
        sink.show_corners(0, &img, &[Point2::new(4.0, 4.0)], GridSize::new(1, 1));
        sink.show_rectified(&img);
        assert!(dir.path().join("preview/corners_01.png").is_file());
        assert!(dir.path().join("preview/rectified.png").is_file());
    }
}
