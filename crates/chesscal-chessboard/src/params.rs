use serde::{Deserialize, Serialize};

/// Neighbor search parameters for the grid graph.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GridGraphParams {
    /// Absolute lower bound on the corner spacing, pixels.
    pub min_spacing_pix: f32,
    /// Absolute upper bound on the corner spacing, pixels.
    pub max_spacing_pix: f32,
    /// Accepted neighbor distance relative to the estimated base spacing,
    /// as `[lo, hi]` multipliers.
    pub spacing_window: [f32; 2],
    /// Max candidates inspected per corner.
    pub k_neighbors: usize,
    pub orientation_tolerance_deg: f32,
}

impl Default for GridGraphParams {
    fn default() -> Self {
        Self {
            min_spacing_pix: 5.0,
            max_spacing_pix: 400.0,
            spacing_window: [0.6, 1.8],
            k_neighbors: 8,
            orientation_tolerance_deg: 22.5,
        }
    }
}

/// Parameters specific to the chessboard detector.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ChessboardParams {
    /// Minimal corner strength to consider.
    pub min_strength: f32,

    /// Minimal number of strong corners before a grid search is attempted.
    pub min_corners: usize,

    pub graph: GridGraphParams,
}

impl Default for ChessboardParams {
    fn default() -> Self {
        Self {
            min_strength: 0.0,
            min_corners: 4,
            graph: GridGraphParams::default(),
        }
    }
}

/// Termination settings for the subpixel corner refiner.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct SubpixParams {
    /// Half-size of the square support window, pixels.
    pub half_window: usize,
    pub max_iters: usize,
    /// Stop when a single update moves the corner less than this, pixels.
    pub epsilon: f32,
}

impl SubpixParams {
    pub fn with_half_window(half_window: usize) -> Self {
        Self {
            half_window,
            ..Self::default()
        }
    }
}

impl Default for SubpixParams {
    fn default() -> Self {
        Self {
            half_window: 5,
            max_iters: 30,
            epsilon: 0.01,
        }
    }
}
