//! 3-D k-d tree for nearest-vertex queries on surface meshes.
//!
//! Used by the spin surrogates (nearest original vertex to each rotated
//! query) and by nearest-vertex resampling between sphere meshes. Indices
//! returned are positions in the slice the tree was built from.

use crate::sphere::Vec3;

#[derive(Debug)]
pub struct KdTree {
    nodes: Vec<KdNode>,
    points: Vec<Vec3>,
}

#[derive(Debug)]
struct KdNode {
    point_idx: usize,
    /// 0 = x, 1 = y, 2 = z
    split_dim: u8,
    left: Option<usize>,
    right: Option<usize>,
}

/// Result of a nearest-neighbour query.
#[derive(Debug, Clone, Copy)]
pub struct Nearest {
    pub index: usize,
    pub distance_sq: f64,
}

impl KdTree {
    /// Build the tree by median-of-coordinate splitting, O(n log² n).
    pub fn build(points: &[Vec3]) -> Self {
        let mut nodes = Vec::with_capacity(points.len());
        if !points.is_empty() {
            let mut indices: Vec<usize> = (0..points.len()).collect();
            build_recursive(points, &mut indices, 0, &mut nodes);
        }
        Self { nodes, points: points.to_vec() }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Nearest stored point to `q`. Ties keep the first point visited, which
    /// is fixed by the tree layout, so queries are deterministic.
    pub fn nearest(&self, q: Vec3) -> Option<Nearest> {
        if self.nodes.is_empty() {
            return None;
        }
        let mut best = Nearest { index: 0, distance_sq: f64::MAX };
        self.nearest_recursive(0, q, &mut best);
        Some(best)
    }

    fn nearest_recursive(&self, node_idx: usize, q: Vec3, best: &mut Nearest) {
        let node = &self.nodes[node_idx];
        let p = self.points[node.point_idx];

        let dist_sq = q.distance_sq(p);
        if dist_sq < best.distance_sq {
            *best = Nearest { index: node.point_idx, distance_sq: dist_sq };
        }

        let dim = node.split_dim as usize;
        let diff = q.axis(dim) - p.axis(dim);
        let (first, second) = if diff < 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };

        if let Some(child) = first {
            self.nearest_recursive(child, q, best);
        }
        if diff * diff < best.distance_sq {
            if let Some(child) = second {
                self.nearest_recursive(child, q, best);
            }
        }
    }
}

fn build_recursive(
    points: &[Vec3],
    indices: &mut [usize],
    depth: usize,
    nodes: &mut Vec<KdNode>,
) -> usize {
    let n = indices.len();
    let split_dim = (depth % 3) as u8;
    let dim = split_dim as usize;

    indices.sort_by(|&a, &b| points[a].axis(dim).total_cmp(&points[b].axis(dim)));

    let median = n / 2;
    let node_idx = nodes.len();
    nodes.push(KdNode {
        point_idx: indices[median],
        split_dim,
        left: None,
        right: None,
    });

    let (lower, rest) = indices.split_at_mut(median);
    let upper = &mut rest[1..];

    if !lower.is_empty() {
        let left_idx = build_recursive(points, lower, depth + 1, nodes);
        nodes[node_idx].left = Some(left_idx);
    }
    if !upper.is_empty() {
        let right_idx = build_recursive(points, upper, depth + 1, nodes);
        nodes[node_idx].right = Some(right_idx);
    }

    node_idx
}
