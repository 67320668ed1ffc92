//! Traits defining BSP tree operations for dependency inversion

use crate::float_types::Real;
use crate::mesh::bsp::node::Node;
use crate::mesh::plane::{BACK, COPLANAR, FRONT, Plane};
use crate::mesh::polygon::Polygon;

/// Core BSP operations trait - implements algorithms on BSP nodes
pub trait BspOps {
    /// Invert all polygons in the BSP tree
    fn invert(&self, node: &mut Node);

    /// Recursively remove all polygons that are inside this BSP tree
    fn clip_polygons(&self, node: &Node, polygons: &[Polygon]) -> Vec<Polygon>;

    /// Remove all polygons in this BSP tree that are inside the other BSP tree
    fn clip_to(&self, node: &mut Node, other: &Node);

    /// Build a BSP tree from the given polygons
    fn build(&self, node: &mut Node, polygons: &[Polygon]);

    /// Return all polygons in this BSP tree
    fn all_polygons(&self, node: &Node) -> Vec<Polygon>;
}

/// Trait for picking splitting planes
pub trait SplittingPlaneStrategy {
    /// Pick the best splitting plane from a non-empty set of polygons
    fn pick_best_splitting_plane(&self, polygons: &[Polygon]) -> Plane;
}

/// Default splitting plane strategy: few spanning polygons, balanced halves.
pub struct BalancedSplittingStrategy {
    pub span_weight: Real,
    pub balance_weight: Real,
    pub sample_size: usize,
}

impl Default for BalancedSplittingStrategy {
    fn default() -> Self {
        Self {
            span_weight: 8.0,
            balance_weight: 1.0,
            sample_size: 20,
        }
    }
}

impl SplittingPlaneStrategy for BalancedSplittingStrategy {
    fn pick_best_splitting_plane(&self, polygons: &[Polygon]) -> Plane {
        let mut best_plane = polygons[0].plane;
        let mut best_score = Real::MAX;

        for candidate in polygons.iter().take(self.sample_size) {
            let plane = &candidate.plane;
            let (num_front, num_back, num_spanning) = polygons
                .iter()
                .map(|poly| match plane.classify_polygon(poly) {
                    COPLANAR => (0, 0, 0),
                    FRONT => (1, 0, 0),
                    BACK => (0, 1, 0),
                    _ => (0, 0, 1),
                })
                .fold((0i64, 0i64, 0i64), |acc, x| (acc.0 + x.0, acc.1 + x.1, acc.2 + x.2));

            let score = self.span_weight * num_spanning as Real
                + self.balance_weight * ((num_front - num_back) as Real).abs();

            if score < best_score {
                best_score = score;
                best_plane = *plane;
            }
        }

        best_plane
    }
}
