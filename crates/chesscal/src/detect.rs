//! ChESS adapter and the chessboard pattern detector used by the pipeline.

use std::f32::consts::PI;

use chess_corners::{find_chess_corners_image, ChessConfig, CornerDescriptor, ThresholdMode};
use chesscal_chessboard::{refine_corners, ChessboardDetector, ChessboardParams, SubpixParams};
use chesscal_core::{Corner, GrayImageView, GridSize, Pt2f};
use image::GrayImage;
use log::{debug, warn};
use nalgebra::Point2;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Finds a chessboard's inner corners in a grayscale image.
///
/// The pipeline holds one detector for a whole run, so implementations may
/// keep state between calls.
pub trait PatternDetector {
    /// Coarse corners of the complete `grid`, row-major with `grid.width`
    /// points per row, or `None` when the pattern is not found.
    fn detect(&mut self, gray: &GrayImage, grid: GridSize) -> Option<Vec<Pt2f>>;

    /// Move `corners` to subpixel saddle points in place.
    fn refine(&mut self, gray: &GrayImage, corners: &mut [Pt2f], params: &SubpixParams) {
        refine_corners(&gray_view(gray), corners, params);
    }
}

/// Reasonable default settings for the `chess-corners` ChESS detector.
pub fn default_chess_config() -> ChessConfig {
    let mut cfg = ChessConfig::single_scale();
    cfg.threshold_mode = ThresholdMode::Relative;
    cfg.threshold_value = 0.2;
    cfg.nms_radius = 2;
    cfg
}

/// Borrow an `image::GrayImage` as a `chesscal-core` view.
pub fn gray_view(img: &GrayImage) -> GrayImageView<'_> {
    GrayImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

/// Detect ChESS corners and adapt them into [`Corner`]s. A ChESS failure
/// is logged and yields no corners.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(img, cfg), fields(width = img.width(), height = img.height()))
)]
pub fn detect_corners(img: &GrayImage, cfg: &ChessConfig) -> Vec<Corner> {
    match find_chess_corners_image(img, cfg) {
        Ok(descriptors) => descriptors.iter().map(adapt_chess_corner).collect(),
        Err(e) => {
            warn!("ChESS detection failed: {e}");
            Vec::new()
        }
    }
}

/// Light-square diagonal, modulo π, from the two ChESS grid axes.
///
/// Turning from `axes[0]` to `axes[1]` crosses a dark sector, so the bright
/// sector spans `axes[1]` to `axes[0] + π` and its bisector is the diagonal.
fn bright_diagonal(c: &CornerDescriptor) -> f32 {
    let [a0, a1] = c.axes;
    ((a0.angle + PI + a1.angle) * 0.5).rem_euclid(PI)
}

fn adapt_chess_corner(c: &CornerDescriptor) -> Corner {
    Corner {
        position: Point2::new(c.x, c.y),
        orientation: bright_diagonal(c),
        strength: c.response,
    }
}

/// ChESS corners followed by grid-graph chessboard detection.
pub struct ChessPatternDetector {
    pub chess: ChessConfig,
    pub params: ChessboardParams,
}

impl ChessPatternDetector {
    pub fn new(params: ChessboardParams) -> Self {
        Self {
            chess: default_chess_config(),
            params,
        }
    }
}

impl Default for ChessPatternDetector {
    fn default() -> Self {
        Self::new(ChessboardParams::default())
    }
}

impl PatternDetector for ChessPatternDetector {
    fn detect(&mut self, gray: &GrayImage, grid: GridSize) -> Option<Vec<Pt2f>> {
        let corners = detect_corners(gray, &self.chess);
        debug!("{} raw ChESS corners", corners.len());
        ChessboardDetector::new(grid, self.params.clone())
            .detect_from_corners(&corners)
            .map(|det| det.corners)
    }
}
