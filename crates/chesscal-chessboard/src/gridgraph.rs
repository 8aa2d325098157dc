use crate::geom::{angle_diff_abs, axis_vec_diff, is_orthogonal};
use crate::params::GridGraphParams;
use chesscal_core::{Corner, GridCoords};
use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::Vector2;
use std::collections::{HashMap, VecDeque};
use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NeighborDirection {
    Right,
    Left,
    Up,
    Down,
}

impl NeighborDirection {
    /// Grid step taken when following this edge.
    pub fn step(self) -> (i32, i32) {
        match self {
            NeighborDirection::Right => (1, 0),
            NeighborDirection::Left => (-1, 0),
            NeighborDirection::Up => (0, -1),
            NeighborDirection::Down => (0, 1),
        }
    }
}

#[derive(Clone, Debug)]
pub struct NodeNeighbor {
    pub direction: NeighborDirection,
    pub index: usize,
    pub distance: f32,
    pub score: f32,
}

/// Accepted neighbor distance range, pixels.
#[derive(Clone, Copy, Debug)]
pub struct SpacingRange {
    pub min: f32,
    pub max: f32,
}

fn direction_quadrant(vec_to_neighbor: &Vector2<f32>) -> NeighborDirection {
    if vec_to_neighbor.x.abs() > vec_to_neighbor.y.abs() {
        if vec_to_neighbor.x >= 0.0 {
            NeighborDirection::Right
        } else {
            NeighborDirection::Left
        }
    } else if vec_to_neighbor.y >= 0.0 {
        NeighborDirection::Down
    } else {
        NeighborDirection::Up
    }
}

fn is_good_neighbor(
    corner: &Corner,
    neighbor: &Corner,
    neighbor_index: usize,
    spacing: SpacingRange,
    tolerance_rad: f32,
) -> Option<NodeNeighbor> {
    // Adjacent inner corners swap the light-square diagonal.
    if !is_orthogonal(corner.orientation, neighbor.orientation, tolerance_rad) {
        return None;
    }

    let vec_to_neighbor = neighbor.as_vec2() - corner.as_vec2();
    let distance = vec_to_neighbor.norm();
    if distance < spacing.min || distance > spacing.max {
        return None;
    }

    // The board edge between two corners runs at ~45° to both diagonals.
    let edge_angle = vec_to_neighbor.y.atan2(vec_to_neighbor.x);
    let score_corner = (axis_vec_diff(corner.orientation, edge_angle) - FRAC_PI_4).abs();
    let score_neighbor = (axis_vec_diff(neighbor.orientation, edge_angle) - FRAC_PI_4).abs();
    if score_corner > tolerance_rad || score_neighbor > tolerance_rad {
        return None;
    }

    let score_orientation =
        (FRAC_PI_2 - angle_diff_abs(corner.orientation, neighbor.orientation)).abs();

    Some(NodeNeighbor {
        direction: direction_quadrant(&vec_to_neighbor),
        index: neighbor_index,
        distance,
        score: score_corner + score_neighbor + score_orientation,
    })
}

/// Keep at most one neighbor per direction, choosing the lowest-score candidate.
fn select_neighbors(candidates: Vec<NodeNeighbor>) -> Vec<NodeNeighbor> {
    let mut best: [Option<NodeNeighbor>; 4] = [None, None, None, None];

    for candidate in candidates {
        let slot = match candidate.direction {
            NeighborDirection::Right => &mut best[0],
            NeighborDirection::Left => &mut best[1],
            NeighborDirection::Up => &mut best[2],
            NeighborDirection::Down => &mut best[3],
        };

        let replace = match slot {
            None => true,
            Some(current) => {
                candidate.score < current.score
                    || (candidate.score == current.score && candidate.distance < current.distance)
            }
        };

        if replace {
            *slot = Some(candidate);
        }
    }

    best.into_iter().flatten().collect()
}

/// 4-connected neighbor graph over detected corners.
pub struct GridGraph {
    pub neighbors: Vec<Vec<NodeNeighbor>>,
}

impl GridGraph {
    pub fn new(corners: &[Corner], params: &GridGraphParams, spacing: SpacingRange) -> Self {
        let coords = corners
            .iter()
            .map(|c| [c.position.x, c.position.y])
            .collect::<Vec<_>>();
        let tree: KdTree<f32, 2> = (&coords).into();
        let tolerance_rad = params.orientation_tolerance_deg.to_radians();
        let max_sq = spacing.max * spacing.max;

        let neighbors = corners
            .iter()
            .enumerate()
            .map(|(i, corner)| {
                let mut nearby = tree.within_unsorted::<SquaredEuclidean>(&coords[i], max_sq);
                nearby.sort_by(|a, b| a.distance.total_cmp(&b.distance));

                let candidates = nearby
                    .into_iter()
                    .map(|nn| nn.item as usize)
                    .filter(|&j| j != i)
                    .take(params.k_neighbors)
                    .filter_map(|j| is_good_neighbor(corner, &corners[j], j, spacing, tolerance_rad))
                    .collect();
                select_neighbors(candidates)
            })
            .collect();

        Self { neighbors }
    }

    /// Undirected connected components; a node belongs to the component of
    /// any node that lists it as a neighbor or that it lists.
    pub fn connected_components(&self) -> Vec<Vec<usize>> {
        let n = self.neighbors.len();
        let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (a, list) in self.neighbors.iter().enumerate() {
            for nb in list {
                adjacency[a].push(nb.index);
                adjacency[nb.index].push(a);
            }
        }

        let mut visited = vec![false; n];
        let mut components = Vec::new();
        for start in 0..n {
            if visited[start] {
                continue;
            }
            let mut component = Vec::new();
            let mut stack = vec![start];
            while let Some(node) = stack.pop() {
                if visited[node] {
                    continue;
                }
                visited[node] = true;
                component.push(node);
                stack.extend(adjacency[node].iter().copied().filter(|&m| !visited[m]));
            }
            components.push(component);
        }
        components
    }

    /// BFS from the first node of `component`, assigning integer grid
    /// coordinates. Returns `None` when two corners land on the same cell,
    /// which happens when direction labels disagree along a cycle.
    pub fn assign_grid_coordinates(&self, component: &[usize]) -> Option<Vec<(usize, GridCoords)>> {
        let start = *component.first()?;
        let mut assigned: HashMap<usize, GridCoords> = HashMap::new();
        let mut occupied: HashMap<GridCoords, usize> = HashMap::new();
        let mut queue = VecDeque::new();
        queue.push_back((start, GridCoords { i: 0, j: 0 }));

        while let Some((node, g)) = queue.pop_front() {
            if let Some(prev) = assigned.get(&node) {
                if *prev != g {
                    return None;
                }
                continue;
            }
            if let Some(&other) = occupied.get(&g) {
                if other != node {
                    return None;
                }
            }
            assigned.insert(node, g);
            occupied.insert(g, node);

            for nb in &self.neighbors[node] {
                let (di, dj) = nb.direction.step();
                queue.push_back((
                    nb.index,
                    GridCoords {
                        i: g.i + di,
                        j: g.j + dj,
                    },
                ));
            }
        }

        let mut coords: Vec<(usize, GridCoords)> = assigned.into_iter().collect();
        coords.sort_by_key(|(idx, _)| *idx);
        Some(coords)
    }
}
