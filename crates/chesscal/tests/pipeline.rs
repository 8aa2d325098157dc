//! End-to-end runs over synthetic images with a scripted corner detector.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use approx::assert_relative_eq;
use chesscal::calib::{project_points, rotation_to_rvec, CameraIntrinsics, DistortionCoeffs};
use chesscal::chessboard::SubpixParams;
use chesscal::core::{GridSize, ImageSize, Pt2f, Real, Vec3};
use chesscal::pipeline::{self, board_object_points, evaluate, extract_corners, read_manifest, solve};
use chesscal::{CalibrationCache, CalibrationConfig, NoPreview, PatternDetector, PipelineError};
use image::{DynamicImage, GrayImage, GenericImageView, Rgb, RgbImage};
use nalgebra::{Point2, Rotation3};
use tempfile::TempDir;

const GRID: GridSize = GridSize::new(8, 6);
const SQUARE: Real = 26.5;

/// Hands out pre-computed corners in call order; `None` entries simulate
/// images without a visible chessboard.
struct ScriptedDetector {
    script: VecDeque<Option<Vec<Pt2f>>>,
    calls: usize,
}

impl ScriptedDetector {
    fn new(script: Vec<Option<Vec<Pt2f>>>) -> Self {
        Self {
            script: script.into(),
            calls: 0,
        }
    }
}

impl PatternDetector for ScriptedDetector {
    fn detect(&mut self, _gray: &GrayImage, _grid: GridSize) -> Option<Vec<Pt2f>> {
        self.calls += 1;
        self.script.pop_front().flatten()
    }

    fn refine(&mut self, _gray: &GrayImage, _corners: &mut [Pt2f], _params: &SubpixParams) {}
}

fn camera() -> (CameraIntrinsics, DistortionCoeffs) {
    (
        CameraIntrinsics::new(620.0, 615.0, 322.0, 238.0),
        DistortionCoeffs {
            k1: -0.12,
            k2: 0.05,
            p1: 0.001,
            p2: -0.0008,
            k3: 0.0,
        },
    )
}

/// Board corners as seen from `count` distinct viewpoints.
fn views(count: usize) -> Vec<Vec<Pt2f>> {
    let (intr, dist) = camera();
    let object = board_object_points(GRID, SQUARE);
    let centre = Vec3::new(2.5 * SQUARE, 3.5 * SQUARE, 0.0);
    let tilts = [
        (0.0, 0.0, 0.0),
        (0.35, 0.0, 0.1),
        (-0.3, 0.1, -0.2),
        (0.0, 0.4, 0.3),
        (0.1, -0.35, 1.2),
        (0.25, 0.25, -0.4),
        (-0.2, -0.3, 0.6),
        (0.4, -0.15, 1.5),
        (-0.15, 0.35, -1.0),
        (0.2, 0.2, 0.9),
        (-0.25, -0.1, -0.7),
        (0.3, -0.3, 0.2),
    ];
    tilts
        .iter()
        .take(count)
        .enumerate()
        .map(|(k, &(roll, pitch, yaw))| {
            let r = Rotation3::from_euler_angles(roll, pitch, yaw);
            let offset = Vec3::new(
                10.0 * (k as Real - 4.0),
                -6.0 * (k as Real - 4.0),
                480.0 + 20.0 * k as Real,
            );
            let tvec = offset - r * centre;
            project_points(&object, &rotation_to_rvec(r.matrix()), &tvec, &intr, &dist)
                .into_iter()
                .map(|p| Point2::new(p.x as f32, p.y as f32))
                .collect()
        })
        .collect()
}

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Writes blank calibration images of the given sizes plus a manifest
    /// listing them in order.
    fn images(&self, sizes: &[(u32, u32)]) -> PathBuf {
        let mut manifest = String::new();
        for (i, &(w, h)) in sizes.iter().enumerate() {
            let path = self.path(&format!("calib_{i:02}.png"));
            GrayImage::from_pixel(w, h, image::Luma([200])).save(&path).unwrap();
            manifest.push_str(&format!("{}\n", path.display()));
        }
        let manifest_path = self.path("calibrationData.txt");
        fs::write(&manifest_path, manifest).unwrap();
        manifest_path
    }

    fn sample(&self) -> PathBuf {
        let path = self.path("before.png");
        gradient(640, 480).save(&path).unwrap();
        path
    }

    fn config(&self, manifest: &Path) -> CalibrationConfig {
        CalibrationConfig {
            manifest_path: manifest.to_path_buf(),
            report_path: self.path("txt/calibrationResult.txt"),
            sample_image_path: self.sample(),
            output_image_path: self.path("out/rectified.png"),
            ..CalibrationConfig::default()
        }
    }
}

fn gradient(w: u32, h: u32) -> RgbImage {
    RgbImage::from_fn(w, h, |x, y| {
        Rgb([
            (x * 255 / (w - 1)) as u8,
            (y * 255 / (h - 1)) as u8,
            ((x + y) % 256) as u8,
        ])
    })
}

fn assert_aligned(cache: &CalibrationCache) {
    let n = cache.image_count;
    assert_eq!(n, cache.image_paths.len());
    assert_eq!(n, cache.corner_point_sequence.len());
    assert_eq!(n, cache.corner_position.len());
    assert_eq!(n, cache.rvecs_mat.len());
    assert_eq!(n, cache.tvecs_mat.len());
    for i in 0..n {
        assert_eq!(GRID.count(), cache.corner_point_sequence[i].len());
        assert_eq!(GRID.count(), cache.corner_position[i].len());
    }
}

fn overall_error_line(report: &str) -> Real {
    let line = report
        .lines()
        .find(|l| l.starts_with("Overall mean error:"))
        .unwrap();
    line.trim_start_matches("Overall mean error:")
        .trim_end_matches("pixels")
        .trim()
        .parse()
        .unwrap()
}

#[test]
fn nine_clean_views_calibrate_the_camera() {
    let ws = Workspace::new();
    let manifest = ws.images(&[(640, 480); 9]);
    let config = ws.config(&manifest);
    let mut detector = ScriptedDetector::new(views(9).into_iter().map(Some).collect());

    let run = pipeline::run(&config, &mut detector, &mut NoPreview).unwrap();
    let cache = &run.cache;

    assert_eq!(9, cache.image_count);
    assert_eq!(Some(ImageSize::new(640, 480)), cache.image_size);
    assert_aligned(cache);

    let k = cache.intrinsic_matrix.unwrap();
    let (truth, truth_dist) = camera();
    assert_relative_eq!(truth.fx, k[(0, 0)], max_relative = 1e-3);
    assert_relative_eq!(truth.fy, k[(1, 1)], max_relative = 1e-3);
    assert_relative_eq!(truth.cx, k[(0, 2)], epsilon = 0.5);
    assert_relative_eq!(truth.cy, k[(1, 2)], epsilon = 0.5);
    assert_eq!(1.0, k[(2, 2)]);

    let dist = cache.dist_coeffs.unwrap().as_array();
    assert_eq!(5, dist.len());
    assert_relative_eq!(truth_dist.k1, dist[0], epsilon = 1e-2);

    let written = fs::read_to_string(&config.report_path).unwrap();
    assert_eq!(run.report, written);
    let overall = overall_error_line(&written);
    assert!(overall >= 0.0 && overall < 0.01, "overall error {overall}");
    assert_eq!(9, written.matches("rotation vector:").count());
    assert_eq!(9, written.matches("translation vector:").count());
}

#[test]
fn image_without_chessboard_is_dropped() {
    let ws = Workspace::new();
    let manifest = ws.images(&[(640, 480); 10]);
    let config = ws.config(&manifest);

    let mut script: Vec<Option<Vec<Pt2f>>> = views(9).into_iter().map(Some).collect();
    script.insert(3, None);
    let mut detector = ScriptedDetector::new(script);

    let run = pipeline::run(&config, &mut detector, &mut NoPreview).unwrap();
    let cache = &run.cache;

    assert_eq!(10, detector.calls);
    assert_eq!(9, cache.image_count);
    assert_eq!(9, cache.corner_point_sequence.len());
    assert!(!cache.image_paths.contains(&ws.path("calib_03.png")));
    assert_eq!(ws.path("calib_04.png"), cache.image_paths[3]);
    assert_aligned(cache);
}

#[test]
fn accepted_images_stay_below_the_cap() {
    let ws = Workspace::new();
    let manifest = ws.images(&[(640, 480); 12]);
    let config = ws.config(&manifest);
    let entries = read_manifest(&manifest).unwrap();
    let mut detector = ScriptedDetector::new(views(12).into_iter().map(Some).collect());
    let mut cache = CalibrationCache::new();

    extract_corners(&entries, &config, &mut detector, &mut NoPreview, &mut cache).unwrap();

    assert_eq!(config.sample_cap - 1, cache.image_count);
    assert_eq!(9, detector.calls);
    assert_eq!(ws.path("calib_08.png"), cache.image_paths[8]);
}

#[test]
fn first_loaded_resolution_is_recorded() {
    let ws = Workspace::new();
    let mut sizes = vec![(640, 480); 9];
    sizes.insert(2, (320, 240));
    let manifest = ws.images(&sizes);
    let config = ws.config(&manifest);
    let entries = read_manifest(&manifest).unwrap();
    let mut detector = ScriptedDetector::new(views(9).into_iter().map(Some).collect());
    let mut cache = CalibrationCache::new();

    extract_corners(&entries, &config, &mut detector, &mut NoPreview, &mut cache).unwrap();

    assert_eq!(Some(ImageSize::new(640, 480)), cache.image_size);
    assert_eq!(9, cache.image_count);
    assert!(!cache.image_paths.contains(&ws.path("calib_02.png")));
}

#[test]
fn every_detection_failing_stops_before_solve() {
    let ws = Workspace::new();
    let manifest = ws.images(&[(640, 480); 5]);
    let config = ws.config(&manifest);
    let mut detector = ScriptedDetector::new(vec![None; 5]);

    let err = pipeline::run(&config, &mut detector, &mut NoPreview).unwrap_err();

    assert!(matches!(err, PipelineError::NoUsableImages));
    assert!(!config.report_path.exists());
    assert!(!config.output_image_path.exists());
}

#[test]
fn unreadable_image_aborts_the_run() {
    let ws = Workspace::new();
    let manifest = ws.path("calibrationData.txt");
    fs::write(&manifest, format!("{}\n", ws.path("missing.png").display())).unwrap();
    let config = ws.config(&manifest);
    let mut detector = ScriptedDetector::new(Vec::new());

    let err = pipeline::run(&config, &mut detector, &mut NoPreview).unwrap_err();

    assert!(matches!(err, PipelineError::ImageLoad { .. }));
    assert_eq!(0, detector.calls);
    assert!(!config.report_path.exists());
}

#[test]
fn evaluation_is_repeatable() {
    let ws = Workspace::new();
    let manifest = ws.images(&[(640, 480); 9]);
    let config = ws.config(&manifest);
    let entries = read_manifest(&manifest).unwrap();
    let mut detector = ScriptedDetector::new(views(9).into_iter().map(Some).collect());
    let mut cache = CalibrationCache::new();

    extract_corners(&entries, &config, &mut detector, &mut NoPreview, &mut cache).unwrap();
    solve(&config, &mut cache).unwrap();

    let first = evaluate(&cache).unwrap();
    let second = evaluate(&cache).unwrap();
    assert_eq!(first, second);
    assert_eq!(9, first.per_image.len());
    let mean = first.per_image.iter().sum::<Real>() / 9.0;
    assert_relative_eq!(mean, first.overall, epsilon = 1e-12);
}

#[test]
fn rectification_moves_the_periphery_only() {
    let ws = Workspace::new();
    let manifest = ws.images(&[(640, 480); 9]);
    let config = ws.config(&manifest);
    let mut detector = ScriptedDetector::new(views(9).into_iter().map(Some).collect());

    let run = pipeline::run(&config, &mut detector, &mut NoPreview).unwrap();

    let original = DynamicImage::ImageRgb8(gradient(640, 480));
    let written = image::open(&config.output_image_path).unwrap();
    assert_eq!(original.dimensions(), written.dimensions());
    assert_eq!(original.dimensions(), run.rectified.dimensions());

    let rectified = run.rectified.to_rgb8();
    let source = original.to_rgb8();
    let diff = |x: u32, y: u32| -> i32 {
        let a = source.get_pixel(x, y);
        let b = rectified.get_pixel(x, y);
        (0..3).map(|c| (a[c] as i32 - b[c] as i32).abs()).sum()
    };

    assert!(diff(322, 238) <= 3, "centre moved by {}", diff(322, 238));
    let periphery = [(40, 40), (600, 40), (40, 440), (600, 440)];
    assert!(
        periphery.iter().any(|&(x, y)| diff(x, y) > 10),
        "periphery unchanged"
    );
}

#[test]
fn report_is_written_before_a_missing_sample_fails() {
    let ws = Workspace::new();
    let manifest = ws.images(&[(640, 480); 9]);
    let config = CalibrationConfig {
        sample_image_path: ws.path("no_such_sample.png"),
        ..ws.config(&manifest)
    };
    let mut detector = ScriptedDetector::new(views(9).into_iter().map(Some).collect());

    let session = pipeline::calibrate(&config, &mut detector, &mut NoPreview).unwrap();
    assert_eq!(session.report, fs::read_to_string(&config.report_path).unwrap());

    let err = pipeline::rectify(&config, &session, &mut NoPreview).unwrap_err();
    assert!(matches!(err, PipelineError::SampleImageLoad { .. }));
    assert!(!config.output_image_path.exists());

    let mut detector = ScriptedDetector::new(views(9).into_iter().map(Some).collect());
    let err = pipeline::run(&config, &mut detector, &mut NoPreview).unwrap_err();
    assert!(matches!(err, PipelineError::SampleImageLoad { .. }));
    assert!(config.report_path.exists());
}
