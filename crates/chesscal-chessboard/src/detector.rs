use crate::geom::is_orthogonal;
use crate::gridgraph::{GridGraph, SpacingRange};
use crate::params::ChessboardParams;
use chesscal_core::{Corner, GridCoords, GridSize, Pt2f};
use kiddo::{KdTree, SquaredEuclidean};
use log::{debug, info};
use std::collections::HashMap;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// A complete inner-corner grid found in one image.
#[derive(Clone, Debug)]
pub struct ChessboardDetection {
    pub grid: GridSize,
    /// Corner positions in row-major scan order, `grid.width` per row.
    pub corners: Vec<Pt2f>,
    /// Board coordinates of each entry in `corners`: `i` is the column,
    /// `j` the row.
    pub grid_coords: Vec<GridCoords>,
    /// Estimated spacing between adjacent corners, pixels.
    pub spacing: f32,
}

/// Chessboard detector over a cloud of ChESS corners.
pub struct ChessboardDetector {
    pub params: ChessboardParams,
    pub grid: GridSize,
}

impl ChessboardDetector {
    pub fn new(grid: GridSize, params: ChessboardParams) -> Self {
        Self { params, grid }
    }

    /// Find the complete `grid.width × grid.height` inner-corner grid.
    ///
    /// Returns `None` unless exactly one connected component covers every
    /// cell of the grid; partial boards are not reported.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, corners), fields(num_corners = corners.len()))
    )]
    pub fn detect_from_corners(&self, corners: &[Corner]) -> Option<ChessboardDetection> {
        let expected = self.grid.count();
        let strong: Vec<Corner> = corners
            .iter()
            .filter(|c| c.strength >= self.params.min_strength)
            .cloned()
            .collect();

        debug!(
            "{} of {} ChESS corners pass the strength filter",
            strong.len(),
            corners.len()
        );
        if strong.len() < expected.max(self.params.min_corners) {
            return None;
        }

        let Some(spacing) = self.estimate_spacing(&strong) else {
            info!("failed to estimate corner spacing");
            return None;
        };
        let graph_params = &self.params.graph;
        let window = SpacingRange {
            min: (spacing * graph_params.spacing_window[0]).max(graph_params.min_spacing_pix),
            max: (spacing * graph_params.spacing_window[1]).min(graph_params.max_spacing_pix),
        };
        debug!(
            "base spacing {:.2}px, neighbor window [{:.2}, {:.2}]",
            spacing, window.min, window.max
        );

        let graph = GridGraph::new(&strong, graph_params, window);
        let mut components = graph.connected_components();
        components.sort_by_key(|c| std::cmp::Reverse(c.len()));

        for component in components.iter().filter(|c| c.len() == expected) {
            let Some(coords) = graph.assign_grid_coordinates(component) else {
                debug!("component of {} corners has conflicting labels", component.len());
                continue;
            };
            if let Some(detection) = self.order_grid(&strong, &coords, spacing) {
                info!(
                    "chessboard {}x{} found, spacing {:.1}px",
                    self.grid.width, self.grid.height, spacing
                );
                return Some(detection);
            }
        }

        info!(
            "no complete {}x{} grid among {} components",
            self.grid.width,
            self.grid.height,
            components.len()
        );
        None
    }

    /// Median distance from each corner to its closest orthogonally oriented
    /// neighbor.
    fn estimate_spacing(&self, corners: &[Corner]) -> Option<f32> {
        let coords = corners
            .iter()
            .map(|c| [c.position.x, c.position.y])
            .collect::<Vec<_>>();
        let tree: KdTree<f32, 2> = (&coords).into();
        let tol = self.params.graph.orientation_tolerance_deg.to_radians();
        let max = self.params.graph.max_spacing_pix;

        let mut nearest: Vec<f32> = corners
            .iter()
            .enumerate()
            .filter_map(|(i, c)| {
                tree.within_unsorted::<SquaredEuclidean>(&coords[i], max * max)
                    .into_iter()
                    .filter(|nn| nn.item as usize != i)
                    .filter(|nn| is_orthogonal(c.orientation, corners[nn.item as usize].orientation, tol))
                    .map(|nn| nn.distance.sqrt())
                    .filter(|d| *d >= self.params.graph.min_spacing_pix)
                    .min_by(|a, b| a.total_cmp(b))
            })
            .collect();

        if nearest.is_empty() {
            return None;
        }
        nearest.sort_by(|a, b| a.total_cmp(b));
        Some(nearest[nearest.len() / 2])
    }

    /// Normalize BFS coordinates to start at (0, 0) and emit corners in
    /// row-major order with `grid.width` corners per row.
    fn order_grid(
        &self,
        corners: &[Corner],
        coords: &[(usize, GridCoords)],
        spacing: f32,
    ) -> Option<ChessboardDetection> {
        let min_i = coords.iter().map(|(_, g)| g.i).min()?;
        let min_j = coords.iter().map(|(_, g)| g.j).min()?;
        let max_i = coords.iter().map(|(_, g)| g.i).max()?;
        let max_j = coords.iter().map(|(_, g)| g.j).max()?;
        let extent_i = (max_i - min_i + 1) as usize;
        let extent_j = (max_j - min_j + 1) as usize;

        let cells: HashMap<(i32, i32), usize> = coords
            .iter()
            .map(|(idx, g)| ((g.i - min_i, g.j - min_j), *idx))
            .collect();

        let (w, h) = (self.grid.width, self.grid.height);
        // Rows of the board run along image i when the extents match
        // directly, along image j when the board is seen rotated by 90°.
        let transposed = if extent_i == w && extent_j == h {
            false
        } else if extent_i == h && extent_j == w {
            true
        } else {
            debug!(
                "component spans {}x{} cells, expected {}x{}",
                extent_i, extent_j, w, h
            );
            return None;
        };

        let mut ordered = Vec::with_capacity(w * h);
        let mut grid_coords = Vec::with_capacity(w * h);
        for row in 0..h {
            for col in 0..w {
                let key = if transposed {
                    (row as i32, col as i32)
                } else {
                    (col as i32, row as i32)
                };
                let idx = *cells.get(&key)?;
                ordered.push(corners[idx].position);
                grid_coords.push(GridCoords {
                    i: col as i32,
                    j: row as i32,
                });
            }
        }

        Some(ChessboardDetection {
            grid: self.grid,
            corners: ordered,
            grid_coords,
            spacing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point2;
    use std::f32::consts::FRAC_PI_4;

    fn board_corners(cols: usize, rows: usize, origin: (f32, f32), spacing: f32) -> Vec<Corner> {
        let mut corners = Vec::new();
        for j in 0..rows {
            for i in 0..cols {
                let orientation = if (i + j) % 2 == 0 {
                    FRAC_PI_4
                } else {
                    3.0 * FRAC_PI_4
                };
                corners.push(Corner {
                    position: Point2::new(
                        origin.0 + i as f32 * spacing,
                        origin.1 + j as f32 * spacing,
                    ),
                    orientation,
                    strength: 1.0,
                });
            }
        }
        corners
    }

    fn detector(w: usize, h: usize) -> ChessboardDetector {
        ChessboardDetector::new(GridSize::new(w, h), ChessboardParams::default())
    }

    #[test]
    fn detects_full_grid_in_row_major_order() {
        let mut corners = board_corners(8, 6, (100.0, 80.0), 30.0);
        // Reverse so output order cannot come from input order.
        corners.reverse();
        // A stray corner far from the board.
        corners.push(Corner {
            position: Point2::new(600.0, 20.0),
            orientation: 0.3,
            strength: 1.0,
        });

        let det = detector(8, 6).detect_from_corners(&corners).expect("grid");
        assert_eq!(48, det.corners.len());
        assert!((det.spacing - 30.0).abs() < 1e-3);
        for (k, p) in det.corners.iter().enumerate() {
            let (col, row) = (k % 8, k / 8);
            assert!((p.x - (100.0 + col as f32 * 30.0)).abs() < 1e-3);
            assert!((p.y - (80.0 + row as f32 * 30.0)).abs() < 1e-3);
        }
        assert_eq!(GridCoords { i: 7, j: 5 }, det.grid_coords[47]);
    }

    #[test]
    fn detects_board_rotated_by_ninety_degrees() {
        // 6 columns x 8 rows in the image: board rows run vertically.
        let corners = board_corners(6, 8, (50.0, 50.0), 25.0);
        let det = detector(8, 6).detect_from_corners(&corners).expect("grid");
        assert_eq!(48, det.corners.len());
        // Each output row holds 8 points that share an image column.
        for row in det.corners.chunks(8) {
            assert!(row.iter().all(|p| (p.x - row[0].x).abs() < 1e-3));
        }
    }

    #[test]
    fn incomplete_board_is_rejected() {
        let mut corners = board_corners(8, 6, (0.0, 0.0), 20.0);
        corners.remove(20);
        assert!(detector(8, 6).detect_from_corners(&corners).is_none());
    }

    #[test]
    fn wrong_grid_size_is_rejected() {
        let corners = board_corners(9, 6, (0.0, 0.0), 20.0);
        assert!(detector(8, 6).detect_from_corners(&corners).is_none());
    }

    #[test]
    fn weak_corners_are_ignored() {
        let mut corners = board_corners(8, 6, (0.0, 0.0), 20.0);
        corners[0].strength = 0.01;
        let params = ChessboardParams {
            min_strength: 0.5,
            ..ChessboardParams::default()
        };
        let det = ChessboardDetector::new(GridSize::new(8, 6), params).detect_from_corners(&corners);
        assert!(det.is_none());
    }
}
