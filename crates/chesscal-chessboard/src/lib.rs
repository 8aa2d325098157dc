//! Chessboard inner-corner grid detection on top of `chesscal-core`.
//!
//! ## Quickstart
//!
//! ```
//! use chesscal_chessboard::{ChessboardDetector, ChessboardParams};
//! use chesscal_core::{Corner, GridSize};
//!
//! let detector = ChessboardDetector::new(GridSize::new(8, 6), ChessboardParams::default());
//! let corners: Vec<Corner> = Vec::new();
//! assert!(detector.detect_from_corners(&corners).is_none());
//! ```
//!
//! Steps:
//! 1. Filter strong ChESS corners.
//! 2. Estimate a base spacing from nearest orthogonally oriented neighbors.
//! 3. Link each corner to at most one neighbor per direction.
//! 4. BFS each connected component and assign integer coordinates `(i, j)`.
//! 5. Accept the component that fills the expected grid exactly (up to a
//!    90° swap) and emit its corners row by row.
//!
//! [`refine_corners`] then moves detected corners to subpixel saddle points.

mod detector;
mod geom;
mod gridgraph;
mod params;
mod subpix;

pub use detector::{ChessboardDetection, ChessboardDetector};
pub use gridgraph::{GridGraph, NeighborDirection, NodeNeighbor, SpacingRange};
pub use params::{ChessboardParams, GridGraphParams, SubpixParams};
pub use subpix::{refine_corner, refine_corners};
