//! Candidate cutting planes for one part.
//!
//! Axis-aligned sweeps are always generated. Oblique planes perpendicular to
//! the principal axes are only added when the best axis-aligned candidate
//! scores below the configured fallback threshold.

use crate::config::{BuildVolume, SegmentationConfig};
use crate::cutting_plane::{Axis, CuttingPlane, PlaneKind};
use crate::float_types::Real;
use crate::mesh::Mesh;
use crate::scoring::{CutCandidate, Scorer, rank};
use crate::traits::CSGOps;
use nalgebra::{Matrix3, Point3, SymmetricEigen, Vector3};
use tracing::debug;

/// Positions closer than this along one axis are the same candidate.
const POSITION_MERGE_MM: Real = 1e-3;

/// Relative offsets along each principal axis for oblique planes.
const PCA_OFFSETS: [Real; 3] = [0.25, 0.5, 0.75];

/// Principal axes of a point cloud, sorted by descending variance.
#[derive(Debug, Clone, PartialEq)]
pub struct PrincipalAxes {
    pub center: Point3<Real>,
    pub axes: [Vector3<Real>; 3],
    pub variances: [Real; 3],
}

/// Eigen-decomposition of the centred vertex covariance of `mesh`.
/// `None` for a mesh without vertices.
pub fn principal_axes(mesh: &Mesh) -> Option<PrincipalAxes> {
    let points = mesh.to_indexed().positions;
    if points.is_empty() {
        return None;
    }
    let n = points.len() as Real;
    let center = Point3::from(points.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords) / n);
    let covariance = points.iter().fold(Matrix3::zeros(), |acc, p| {
        let d = p - center;
        acc + d * d.transpose()
    }) / n;

    let eigen = SymmetricEigen::new(covariance);
    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));

    let axes = order.map(|i| {
        let mut axis: Vector3<Real> = eigen.eigenvectors.column(i).into_owned();
        // Eigenvector signs are arbitrary; make the dominant component positive.
        if axis[axis.iamax()] < 0.0 {
            axis = -axis;
        }
        axis
    });
    Some(PrincipalAxes {
        center,
        axes,
        variances: order.map(|i| eigen.eigenvalues[i]),
    })
}

/// Produces and scores the cutting planes considered for one part.
#[derive(Debug, Clone)]
pub struct CandidateGenerator {
    scorer: Scorer,
    positions_per_axis: usize,
    min_part_thickness: Real,
    enable_oblique: bool,
    oblique_threshold: Real,
}

impl CandidateGenerator {
    pub fn new(config: &SegmentationConfig) -> Self {
        CandidateGenerator {
            scorer: Scorer::new(config.build_volume, config.overhang_threshold_deg),
            positions_per_axis: config.positions_per_axis,
            min_part_thickness: config.min_part_thickness_mm,
            enable_oblique: config.enable_oblique_cuts,
            oblique_threshold: config.oblique_fallback_threshold,
        }
    }

    pub const fn build_volume(&self) -> &BuildVolume {
        &self.scorer.build
    }

    /// Axis-aligned planes swept along X, then Y, then Z.
    pub fn axis_planes(&self, mesh: &Mesh) -> Vec<CuttingPlane> {
        let bb = mesh.bounding_box();
        let build = self.scorer.build.as_array();
        let mut planes = Vec::new();

        for axis in Axis::ALL {
            let a = axis.index();
            let (lo, hi) = (bb.mins[a], bb.maxs[a]);
            let extent = hi - lo;
            if extent <= 2.0 * self.min_part_thickness || extent <= 0.0 {
                continue;
            }

            let steps = self.positions_per_axis + 1;
            let mut positions: Vec<Real> = (1..steps)
                .map(|i| lo + extent * i as Real / steps as Real)
                .collect();
            let mut aligned = lo + build[a];
            while aligned < hi {
                positions.push(aligned);
                aligned += build[a];
            }

            positions.sort_by(|x, y| x.total_cmp(y));
            positions.dedup_by(|x, y| (*x - *y).abs() < POSITION_MERGE_MM);
            planes.extend(
                positions
                    .into_iter()
                    .filter(|&p| p - lo >= self.min_part_thickness && hi - p >= self.min_part_thickness)
                    .map(|p| CuttingPlane::axis(axis, p)),
            );
        }
        planes
    }

    /// Planes perpendicular to each principal axis at fixed relative offsets.
    /// Planes that come out axis-aligned are left to the axis sweep.
    pub fn pca_planes(&self, mesh: &Mesh) -> Vec<CuttingPlane> {
        let Some(pca) = principal_axes(mesh) else {
            return Vec::new();
        };
        let points = mesh.to_indexed().positions;
        let mut planes = Vec::new();

        for axis in pca.axes {
            let (smin, smax) = points.iter().fold((Real::MAX, Real::MIN), |(lo, hi), p| {
                let s = (p - pca.center).dot(&axis);
                (lo.min(s), hi.max(s))
            });
            let span = smax - smin;
            for fraction in PCA_OFFSETS {
                let s = smin + span * fraction;
                if s - smin < self.min_part_thickness || smax - s < self.min_part_thickness {
                    continue;
                }
                let origin = pca.center + axis * s;
                if let Some(plane) = CuttingPlane::from_normal(origin, axis) {
                    if plane.kind == PlaneKind::Oblique {
                        planes.push(plane);
                    }
                }
            }
        }
        planes
    }

    /// Scored candidates for `mesh`, best first.
    pub fn generate(&self, mesh: &Mesh) -> Vec<CutCandidate> {
        let mut candidates = self.scorer.score_all(mesh, &self.axis_planes(mesh));
        rank(&mut candidates);

        let best_axis = candidates.first().map(|c| c.total_score);
        let wants_oblique = best_axis.is_none_or(|score| score < self.oblique_threshold);
        if self.enable_oblique && wants_oblique {
            let oblique = self.scorer.score_all(mesh, &self.pca_planes(mesh));
            debug!(
                best_axis_score = best_axis.unwrap_or(0.0),
                threshold = self.oblique_threshold,
                oblique = oblique.len(),
                "adding oblique candidates"
            );
            candidates.extend(oblique);
            rank(&mut candidates);
        }

        // A cut leaving more work than the best one only adds parts.
        if let Some(fewest) = candidates.iter().map(|c| c.remaining_cuts).min() {
            candidates.retain(|c| c.remaining_cuts == fewest);
        }
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::polygon::FaceTag;
    use approx::assert_relative_eq;

    fn config() -> SegmentationConfig {
        SegmentationConfig::default()
    }

    #[test]
    fn axis_sweep_respects_thickness_and_extent() {
        let mesh = Mesh::cuboid(300.0, 200.0, 15.0, FaceTag::Surface);
        let planes = CandidateGenerator::new(&config()).axis_planes(&mesh);
        // Z is too thin to cut with a 10 mm minimum on both sides.
        assert!(planes.iter().all(|p| p.kind != PlaneKind::AxisZ));
        // X gets 9 even positions plus the build-aligned one at 256 mm.
        let xs: Vec<Real> = planes
            .iter()
            .filter(|p| p.kind == PlaneKind::AxisX)
            .map(|p| p.origin.x)
            .collect();
        assert_eq!(xs.len(), 10);
        assert!(xs.iter().any(|&x| (x - 256.0).abs() < 1e-9));
        assert!(xs.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn pca_of_elongated_box() {
        let mesh = Mesh::cuboid(100.0, 20.0, 10.0, FaceTag::Surface);
        let pca = principal_axes(&mesh).unwrap();
        assert_relative_eq!(pca.axes[0].x.abs(), 1.0, epsilon = 1e-9);
        assert!(pca.variances[0] >= pca.variances[1] && pca.variances[1] >= pca.variances[2]);
        assert_relative_eq!(pca.center.x, 50.0, epsilon = 1e-9);
    }

    #[test]
    fn rotated_bar_gets_oblique_planes() {
        let mesh = Mesh::cuboid(400.0, 40.0, 40.0, FaceTag::Surface).rotate(0.0, 0.0, 35.0);
        let planes = CandidateGenerator::new(&config()).pca_planes(&mesh);
        assert!(planes.len() >= 3);
        let along = Vector3::new(35.0_f64.to_radians().cos(), 35.0_f64.to_radians().sin(), 0.0);
        for plane in &planes[..3] {
            assert_eq!(plane.kind, PlaneKind::Oblique);
            assert_relative_eq!(plane.normal.dot(&along), 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn candidates_are_sorted_and_deterministic() {
        let mesh = Mesh::cuboid(300.0, 200.0, 150.0, FaceTag::Surface);
        let generator = CandidateGenerator::new(&config());
        let first = generator.generate(&mesh);
        let second = generator.generate(&mesh);
        assert_eq!(first, second);
        assert!(first.windows(2).all(|w| w[0].total_score >= w[1].total_score));
    }

    #[test]
    fn wasteful_cuts_are_dropped() {
        // 600 mm needs three pieces; a middle cut would leave four.
        let mesh = Mesh::cuboid(600.0, 100.0, 100.0, FaceTag::Surface);
        let candidates = CandidateGenerator::new(&config()).generate(&mesh);
        assert!(!candidates.is_empty());
        assert!(candidates.iter().all(|c| c.remaining_cuts == 1));
        assert!(candidates.iter().all(|c| (c.plane.origin.x - 300.0).abs() > 1e-9));
    }
}
