//! Heuristic scoring of candidate cuts.
//!
//! Every score lies in `[0, 1]`, higher is better. Scores are computed from
//! cut-free statistics ([`Mesh::split_stats`]) and a per-part face table, so
//! evaluating a candidate never runs a boolean operation.

use crate::config::BuildVolume;
use crate::cutting_plane::{Axis, CuttingPlane};
use crate::float_types::Real;
use crate::mesh::{Mesh, SplitStats};
use crate::traits::CSGOps;
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Faces lying within this distance of the bed are supported by it.
pub const BED_CONTACT_TOLERANCE_MM: Real = 0.5;

/// Relative weights of the five sub-scores. They sum to one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub fit: Real,
    pub utilization: Real,
    pub balance: Real,
    pub overhang: Real,
    pub visibility: Real,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        ScoreWeights {
            fit: 0.35,
            utilization: 0.20,
            balance: 0.10,
            overhang: 0.20,
            visibility: 0.15,
        }
    }
}

/// One side of a cut.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// Behind the plane, opposite its normal.
    Negative,
    /// In front of the plane.
    Positive,
}

/// A scored cutting plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CutCandidate {
    pub plane: CuttingPlane,
    pub fit_score: Real,
    pub utilization_score: Real,
    pub balance_score: Real,
    pub overhang_score: Real,
    pub visibility_score: Real,
    pub total_score: Real,
    /// Cuts both sides still need, estimated from their bounding boxes.
    #[serde(default)]
    pub remaining_cuts: usize,
}

/// Per-face data reused across every candidate evaluated on one part.
#[derive(Debug, Clone)]
pub struct FaceTable {
    centroids: Vec<Point3<Real>>,
    normals: Vec<Vector3<Real>>,
    areas: Vec<Real>,
    /// Per face, per axis: (lowest, highest) vertex coordinate.
    ranges: Vec<[(Real, Real); 3]>,
}

impl FaceTable {
    pub fn new(mesh: &Mesh) -> Self {
        let count = mesh.polygons.len();
        let mut table = FaceTable {
            centroids: Vec::with_capacity(count),
            normals: Vec::with_capacity(count),
            areas: Vec::with_capacity(count),
            ranges: Vec::with_capacity(count),
        };
        for polygon in &mesh.polygons {
            let area_vector = polygon.area_vector();
            let area = area_vector.norm();
            if area <= Real::EPSILON {
                continue;
            }
            let bb = polygon.bounding_box();
            table.centroids.push(polygon.centroid());
            table.normals.push(area_vector / area);
            table.areas.push(area);
            table.ranges.push([0, 1, 2].map(|i| (bb.mins[i], bb.maxs[i])));
        }
        table
    }

    pub fn len(&self) -> usize {
        self.areas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }

    /// Smallest overhanging area fraction over the six print orientations,
    /// considering only faces whose centroid lies on `side` of `plane`.
    fn best_overhang_ratio(&self, plane: &CuttingPlane, side: Side, threshold_deg: Real) -> Real {
        let on_side: Vec<usize> = (0..self.len())
            .filter(|&f| {
                let d = plane.signed_distance(&self.centroids[f]);
                match side {
                    Side::Negative => d < 0.0,
                    Side::Positive => d >= 0.0,
                }
            })
            .collect();
        let total: Real = on_side.iter().map(|&f| self.areas[f]).sum();
        if total <= Real::EPSILON {
            return 0.0;
        }

        let limit = threshold_deg.to_radians().sin();
        let mut best = Real::MAX;
        for axis in Axis::ALL {
            let a = axis.index();
            for sign in [1.0, -1.0] {
                // Height of the bed for this orientation: lowest point along `up`.
                let bed = on_side
                    .iter()
                    .map(|&f| {
                        let (lo, hi) = self.ranges[f][a];
                        if sign > 0.0 { lo } else { -hi }
                    })
                    .fold(Real::MAX, Real::min);

                let overhanging: Real = on_side
                    .iter()
                    .filter(|&&f| {
                        let facing_down = -self.normals[f][a] * sign;
                        let (lo, hi) = self.ranges[f][a];
                        let top = if sign > 0.0 { hi } else { -lo };
                        facing_down > limit && top - bed > BED_CONTACT_TOLERANCE_MM
                    })
                    .map(|&f| self.areas[f])
                    .sum();
                best = best.min(overhanging / total);
            }
        }
        best.clamp(0.0, 1.0)
    }
}

/// Fraction of the two parts that fit the build volume in some orientation.
pub fn fit_score(stats: &SplitStats, build: &BuildVolume) -> Real {
    let fitting = [stats.back, stats.front]
        .iter()
        .filter(|side| build.fits(&side.dimensions()))
        .count();
    fitting as Real / 2.0
}

/// Mean per-part bounding box utilization of the build volume.
pub fn utilization_score(stats: &SplitStats, build: &BuildVolume) -> Real {
    let build_volume = build.volume();
    let per_part = |dims: Vector3<Real>| -> Real {
        let ratio = dims.x * dims.y * dims.z / build_volume;
        if ratio <= 0.0 {
            0.0
        } else if build.fits(&dims) {
            ratio.min(1.0)
        } else if ratio > 1.0 {
            1.0 / ratio
        } else {
            0.5 * ratio
        }
    };
    let total = per_part(stats.back.dimensions()) + per_part(stats.front.dimensions());
    (total / 2.0).clamp(0.0, 1.0)
}

/// `1 − |V1 − V2| / (V1 + V2)`.
pub fn balance_score(stats: &SplitStats) -> Real {
    let (a, b) = (stats.back.volume.max(0.0), stats.front.volume.max(0.0));
    if a + b <= Real::EPSILON {
        return 0.0;
    }
    (1.0 - (a - b).abs() / (a + b)).clamp(0.0, 1.0)
}

/// Position-based guess of how visible the seam will be.
/// Bottom cuts hide best, back cuts next, side cuts are neutral, front and top
/// cuts show the most. Oblique planes blend the axis anchors by the squared
/// normal components.
pub fn visibility_score(mesh: &Mesh, plane: &CuttingPlane) -> Real {
    let bb = mesh.bounding_box();
    let center = bb.center();
    let through = center - plane.normal * plane.signed_distance(&center);
    let extents = bb.extents();
    let normalized = |axis: usize| -> Real {
        if extents[axis] <= Real::EPSILON {
            0.5
        } else {
            ((through[axis] - bb.mins[axis]) / extents[axis]).clamp(0.0, 1.0)
        }
    };
    let lerp = |from: Real, to: Real, t: Real| from + (to - from) * t;

    let anchors = [
        0.5,
        lerp(0.7, 0.3, normalized(1)),
        lerp(0.9, 0.3, normalized(2)),
    ];
    let n = plane.normal;
    let weights = [n.x * n.x, n.y * n.y, n.z * n.z];
    let norm: Real = weights.iter().sum();
    if norm <= Real::EPSILON {
        return 0.5;
    }
    (weights
        .iter()
        .zip(anchors)
        .map(|(w, a)| w * a)
        .sum::<Real>()
        / norm)
        .clamp(0.0, 1.0)
}

/// Fit score of cutting `mesh` by `plane`.
pub fn fit(mesh: &Mesh, plane: &CuttingPlane, build: &BuildVolume) -> Real {
    fit_score(&mesh.split_stats(&plane.to_plane()), build)
}

pub fn utilization(mesh: &Mesh, plane: &CuttingPlane, build: &BuildVolume) -> Real {
    utilization_score(&mesh.split_stats(&plane.to_plane()), build)
}

pub fn balance(mesh: &Mesh, plane: &CuttingPlane) -> Real {
    balance_score(&mesh.split_stats(&plane.to_plane()))
}

/// `1 − overhang ratio` of one side in its best print orientation.
pub fn overhang(mesh: &Mesh, plane: &CuttingPlane, side: Side, threshold_deg: Real) -> Real {
    1.0 - FaceTable::new(mesh).best_overhang_ratio(plane, side, threshold_deg)
}

pub fn visibility(mesh: &Mesh, plane: &CuttingPlane) -> Real {
    visibility_score(mesh, plane)
}

/// Scores candidate planes against one part.
#[derive(Debug, Clone)]
pub struct Scorer {
    pub build: BuildVolume,
    pub weights: ScoreWeights,
    pub overhang_threshold_deg: Real,
}

impl Scorer {
    pub fn new(build: BuildVolume, overhang_threshold_deg: Real) -> Self {
        Scorer {
            build,
            weights: ScoreWeights::default(),
            overhang_threshold_deg,
        }
    }

    /// Score one plane. `None` when the plane misses the part or leaves one
    /// side empty.
    pub fn score(&self, mesh: &Mesh, faces: &FaceTable, plane: &CuttingPlane) -> Option<CutCandidate> {
        if !plane.intersects_aabb(&mesh.bounding_box()) {
            return None;
        }
        let stats = mesh.split_stats(&plane.to_plane());
        if stats.back.is_empty() || stats.front.is_empty() {
            return None;
        }
        if stats.back.volume <= Real::EPSILON || stats.front.volume <= Real::EPSILON {
            return None;
        }

        let fit_score = fit_score(&stats, &self.build);
        let utilization_score = utilization_score(&stats, &self.build);
        let balance_score = balance_score(&stats);
        let worst_ratio = [Side::Negative, Side::Positive]
            .map(|side| faces.best_overhang_ratio(plane, side, self.overhang_threshold_deg))
            .into_iter()
            .fold(0.0, Real::max);
        let overhang_score = (1.0 - worst_ratio).clamp(0.0, 1.0);
        let visibility_score = visibility_score(mesh, plane);
        let remaining_cuts =
            self.build.estimated_cuts(&stats.back.dimensions()) + self.build.estimated_cuts(&stats.front.dimensions());

        let w = &self.weights;
        let total_score = (w.fit * fit_score
            + w.utilization * utilization_score
            + w.balance * balance_score
            + w.overhang * overhang_score
            + w.visibility * visibility_score)
            .clamp(0.0, 1.0);

        Some(CutCandidate {
            plane: *plane,
            fit_score,
            utilization_score,
            balance_score,
            overhang_score,
            visibility_score,
            total_score,
            remaining_cuts,
        })
    }

    /// Score many planes, keeping their order and dropping invalid ones.
    #[cfg(not(feature = "parallel"))]
    pub fn score_all(&self, mesh: &Mesh, planes: &[CuttingPlane]) -> Vec<CutCandidate> {
        let faces = FaceTable::new(mesh);
        planes
            .iter()
            .filter_map(|plane| self.score(mesh, &faces, plane))
            .collect()
    }

    /// Score many planes in parallel, keeping their order and dropping invalid ones.
    #[cfg(feature = "parallel")]
    pub fn score_all(&self, mesh: &Mesh, planes: &[CuttingPlane]) -> Vec<CutCandidate> {
        let faces = FaceTable::new(mesh);
        planes
            .par_iter()
            .filter_map(|plane| self.score(mesh, &faces, plane))
            .collect()
    }
}

/// Sort candidates best first. Stable, so equal scores keep generation order.
pub fn rank(candidates: &mut [CutCandidate]) {
    candidates.sort_by(|a, b| b.total_score.total_cmp(&a.total_score));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::polygon::FaceTag;
    use approx::assert_relative_eq;

    fn slab() -> Mesh {
        Mesh::cuboid(300.0, 200.0, 150.0, FaceTag::Surface)
    }

    #[test]
    fn weights_sum_to_one() {
        let w = ScoreWeights::default();
        assert_relative_eq!(w.fit + w.utilization + w.balance + w.overhang + w.visibility, 1.0);
    }

    #[test]
    fn middle_cut_of_slab() {
        let mesh = slab();
        let build = BuildVolume::default();
        let plane = CuttingPlane::axis(Axis::X, 150.0);
        assert_relative_eq!(fit(&mesh, &plane, &build), 1.0);
        assert_relative_eq!(balance(&mesh, &plane), 1.0, epsilon = 1e-9);
        let expected = 150.0 * 200.0 * 150.0 / build.volume();
        assert_relative_eq!(utilization(&mesh, &plane, &build), expected, epsilon = 1e-9);
        assert_relative_eq!(visibility(&mesh, &plane), 0.5);
        // A box printed on any face has no overhangs.
        assert_relative_eq!(overhang(&mesh, &plane, Side::Negative, 30.0), 1.0);
    }

    #[test]
    fn uneven_cut_fails_to_fit_one_side() {
        let mesh = slab();
        let plane = CuttingPlane::axis(Axis::X, 20.0);
        assert_relative_eq!(fit(&mesh, &plane, &BuildVolume::default()), 0.5);
        assert!(balance(&mesh, &plane) < 0.2);
    }

    #[test]
    fn visibility_anchors() {
        let mesh = slab();
        let bottom = CuttingPlane::axis(Axis::Z, 0.0);
        let top = CuttingPlane::axis(Axis::Z, 150.0);
        let back = CuttingPlane::axis(Axis::Y, 0.0);
        assert_relative_eq!(visibility(&mesh, &bottom), 0.9, epsilon = 1e-12);
        assert_relative_eq!(visibility(&mesh, &top), 0.3, epsilon = 1e-12);
        assert_relative_eq!(visibility(&mesh, &back), 0.7, epsilon = 1e-12);
    }

    #[test]
    fn candidate_scores_are_bounded() {
        let mesh = slab();
        let scorer = Scorer::new(BuildVolume::default(), 30.0);
        let planes: Vec<CuttingPlane> = (1..10)
            .flat_map(|i| {
                let t = i as Real / 10.0;
                [
                    CuttingPlane::axis(Axis::X, 300.0 * t),
                    CuttingPlane::axis(Axis::Y, 200.0 * t),
                    CuttingPlane::from_angles(Point3::new(150.0, 100.0, 75.0), 36.0 * i as Real, 20.0),
                ]
            })
            .collect();
        let candidates = scorer.score_all(&mesh, &planes);
        assert!(!candidates.is_empty());
        for c in &candidates {
            for s in [
                c.fit_score,
                c.utilization_score,
                c.balance_score,
                c.overhang_score,
                c.visibility_score,
                c.total_score,
            ] {
                assert!((0.0..=1.0).contains(&s), "{c:?}");
            }
        }
    }

    #[test]
    fn remaining_cuts_follow_the_sides() {
        let bar = Mesh::cuboid(600.0, 100.0, 100.0, FaceTag::Surface);
        let scorer = Scorer::new(BuildVolume::default(), 30.0);
        let faces = FaceTable::new(&bar);
        let remaining = |x: Real| {
            scorer
                .score(&bar, &faces, &CuttingPlane::axis(Axis::X, x))
                .map(|c| c.remaining_cuts)
        };
        assert_eq!(remaining(256.0), Some(1));
        assert_eq!(remaining(300.0), Some(2));
        assert_eq!(remaining(30.0), Some(2));
    }

    #[test]
    fn planes_missing_the_part_are_excluded() {
        let mesh = slab();
        let scorer = Scorer::new(BuildVolume::default(), 30.0);
        let faces = FaceTable::new(&mesh);
        assert!(scorer.score(&mesh, &faces, &CuttingPlane::axis(Axis::X, 400.0)).is_none());
        assert!(scorer.score(&mesh, &faces, &CuttingPlane::axis(Axis::X, 0.0)).is_none());
    }
}
