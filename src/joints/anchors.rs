//! Where on a cut face alignment features go.
//!
//! A cap is the set of faces a cut left on one part, flattened into the cut
//! plane. Anchors are found by a deterministic grid scan over the overlap of
//! the two mating caps.

use crate::float_types::{EPSILON, Real};
use crate::mesh::Mesh;
use crate::mesh::plane::Plane;
use crate::mesh::polygon::Polygon;
use nalgebra::{Matrix2, Point3, SymmetricEigen, Vector2};

/// A face counts as part of a cap when its normal is this close to the plane normal.
const CAP_ALIGNMENT: Real = 0.95;

/// Upper bound on grid cells along each in-plane axis.
const MAX_GRID_STEPS: usize = 64;

/// Points checked on the rim of a joint footprint.
const RIM_SAMPLES: usize = 8;

/// A cut face flattened into plane coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct CapRegion {
    polygons: Vec<Vec<[Real; 2]>>,
    mins: [Real; 2],
    maxs: [Real; 2],
    area: Real,
    centroid: [Real; 2],
}

fn cross(o: [Real; 2], a: [Real; 2], b: [Real; 2]) -> Real {
    (a[0] - o[0]) * (b[1] - o[1]) - (a[1] - o[1]) * (b[0] - o[0])
}

fn in_convex(polygon: &[[Real; 2]], p: [Real; 2]) -> bool {
    let (mut pos, mut neg) = (false, false);
    for (i, &a) in polygon.iter().enumerate() {
        let b = polygon[(i + 1) % polygon.len()];
        let c = cross(a, b, p);
        pos |= c > EPSILON;
        neg |= c < -EPSILON;
        if pos && neg {
            return false;
        }
    }
    true
}

impl CapRegion {
    /// Flatten `faces` into `plane`. `None` if they cover no area.
    pub fn from_faces<'a>(plane: &Plane, faces: impl IntoIterator<Item = &'a Polygon>) -> Option<Self> {
        let mut polygons = Vec::new();
        let mut mins = [Real::MAX; 2];
        let mut maxs = [Real::MIN; 2];
        let mut area = 0.0;
        let mut moment = [0.0; 2];

        for face in faces {
            let flat: Vec<[Real; 2]> = face.vertices.iter().map(|v| plane.project_2d(&v.pos)).collect();
            let mut face_area = 0.0;
            let mut face_moment = [0.0; 2];
            for i in 1..flat.len().saturating_sub(1) {
                let a = cross(flat[0], flat[i], flat[i + 1]).abs() * 0.5;
                face_area += a;
                for k in 0..2 {
                    face_moment[k] += a * (flat[0][k] + flat[i][k] + flat[i + 1][k]) / 3.0;
                }
            }
            if face_area <= EPSILON * EPSILON {
                continue;
            }
            for p in &flat {
                for k in 0..2 {
                    mins[k] = mins[k].min(p[k]);
                    maxs[k] = maxs[k].max(p[k]);
                }
            }
            area += face_area;
            moment[0] += face_moment[0];
            moment[1] += face_moment[1];
            polygons.push(flat);
        }

        (area > EPSILON).then(|| CapRegion {
            polygons,
            mins,
            maxs,
            area,
            centroid: [moment[0] / area, moment[1] / area],
        })
    }

    /// Cap of cut `cut_id` on `part`, facing along `outward`.
    ///
    /// Faces tagged with the cut are used when present. Parts whose tags were
    /// lost (re-meshed by voxel hollowing) fall back to faces lying on the
    /// plane within `tolerance`; a zero tolerance disables the fallback.
    pub fn of_part(part: &Mesh, plane: &Plane, cut_id: u32, outward: Real, tolerance: Real) -> Option<Self> {
        let facing = plane.normal() * outward.signum();
        let aligned = |p: &&Polygon| p.plane.normal().dot(&facing) >= CAP_ALIGNMENT;

        let tagged: Vec<&Polygon> = part.cap_polygons(cut_id).filter(aligned).collect();
        if !tagged.is_empty() {
            return Self::from_faces(plane, tagged);
        }
        if tolerance <= 0.0 {
            return None;
        }
        Self::from_faces(
            plane,
            part.polygons.iter().filter(aligned).filter(|p| {
                p.vertices
                    .iter()
                    .all(|v| plane.signed_distance(&v.pos).abs() <= tolerance)
            }),
        )
    }

    pub fn contains(&self, p: [Real; 2]) -> bool {
        if p[0] < self.mins[0] - EPSILON
            || p[1] < self.mins[1] - EPSILON
            || p[0] > self.maxs[0] + EPSILON
            || p[1] > self.maxs[1] + EPSILON
        {
            return false;
        }
        self.polygons.iter().any(|polygon| in_convex(polygon, p))
    }

    /// True if a disk of `radius` around `p` lies inside the cap.
    pub fn contains_disk(&self, p: [Real; 2], radius: Real) -> bool {
        self.contains(p)
            && (0..RIM_SAMPLES).all(|k| {
                let angle = k as Real / RIM_SAMPLES as Real * crate::float_types::TAU;
                self.contains([p[0] + radius * angle.cos(), p[1] + radius * angle.sin()])
            })
    }

    pub const fn area(&self) -> Real {
        self.area
    }

    pub const fn centroid(&self) -> [Real; 2] {
        self.centroid
    }

    pub fn longest_extent(&self) -> Real {
        (self.maxs[0] - self.mins[0]).max(self.maxs[1] - self.mins[1])
    }
}

/// Footprint and spacing rules for one joint type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnchorSettings {
    /// Radius of the feature where it meets the cut face.
    pub radius: Real,
    /// Material kept between the feature and the cap boundary.
    pub margin: Real,
    /// Feature diameter used for spacing extra anchors.
    pub diameter: Real,
    /// Caps at least this long get anchors at both ends of their major axis.
    pub large_face_threshold: Real,
}

/// Anchor positions in plane coordinates, primary first.
///
/// The primary anchor is the valid grid point closest to the centroid of
/// `a`. Large caps get up to two more at the extremes of the valid region's
/// major axis, each at least three diameters from every other anchor.
pub fn find_anchors(a: &CapRegion, b: &CapRegion, settings: &AnchorSettings) -> Vec<[Real; 2]> {
    let mins = [a.mins[0].max(b.mins[0]), a.mins[1].max(b.mins[1])];
    let maxs = [a.maxs[0].min(b.maxs[0]), a.maxs[1].min(b.maxs[1])];
    if maxs[0] <= mins[0] || maxs[1] <= mins[1] {
        return Vec::new();
    }

    let reach = settings.radius + settings.margin;
    let longest = (maxs[0] - mins[0]).max(maxs[1] - mins[1]);
    let step = (settings.radius * 0.5).max(longest / MAX_GRID_STEPS as Real).max(EPSILON);
    let counts = [0, 1].map(|k| ((maxs[k] - mins[k]) / step).floor() as usize + 1);
    // Centre the grid inside the overlap.
    let offset = [0, 1].map(|k| mins[k] + 0.5 * ((maxs[k] - mins[k]) - (counts[k] - 1) as Real * step));

    let mut valid = Vec::new();
    for j in 0..counts[1] {
        for i in 0..counts[0] {
            let p = [offset[0] + i as Real * step, offset[1] + j as Real * step];
            if a.contains_disk(p, reach) && b.contains_disk(p, reach) {
                valid.push(p);
            }
        }
    }
    if valid.is_empty() {
        return Vec::new();
    }

    let target = a.centroid;
    let distance = |p: &[Real; 2], q: &[Real; 2]| ((p[0] - q[0]).powi(2) + (p[1] - q[1]).powi(2)).sqrt();
    let mut primary = valid[0];
    for p in &valid[1..] {
        if distance(p, &target) < distance(&primary, &target) {
            primary = *p;
        }
    }
    let mut anchors = vec![primary];

    if a.longest_extent().min(b.longest_extent()) < settings.large_face_threshold || valid.len() < 3 {
        return anchors;
    }

    let n = valid.len() as Real;
    let mean = valid
        .iter()
        .fold(Vector2::zeros(), |acc, p| acc + Vector2::new(p[0], p[1]))
        / n;
    let covariance = valid.iter().fold(Matrix2::zeros(), |acc, p| {
        let d = Vector2::new(p[0], p[1]) - mean;
        acc + d * d.transpose()
    }) / n;
    let eigen = SymmetricEigen::new(covariance);
    let major = eigen.eigenvectors.column(eigen.eigenvalues.imax()).into_owned();

    let along = |p: &[Real; 2]| major.dot(&Vector2::new(p[0], p[1]));
    let mut low = valid[0];
    let mut high = valid[0];
    for p in &valid[1..] {
        if along(p) < along(&low) {
            low = *p;
        }
        if along(p) > along(&high) {
            high = *p;
        }
    }

    let spacing = 3.0 * settings.diameter;
    for extreme in [low, high] {
        if anchors.iter().all(|q| distance(&extreme, q) >= spacing) {
            anchors.push(extreme);
        }
    }
    anchors
}

/// Lift plane coordinates back onto the cut plane.
pub fn to_world(plane: &Plane, anchors: &[[Real; 2]]) -> Vec<Point3<Real>> {
    anchors.iter().map(|&uv| plane.lift_2d(uv)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cutting_plane::{Axis, CuttingPlane};
    use crate::mesh::polygon::FaceTag;

    fn settings() -> AnchorSettings {
        AnchorSettings {
            radius: 2.5,
            margin: 1.0,
            diameter: 5.0,
            large_face_threshold: 80.0,
        }
    }

    fn caps(width: Real, depth: Real) -> (Plane, CapRegion, CapRegion) {
        let block = Mesh::cuboid(width, depth, 100.0, FaceTag::Surface);
        let plane = CuttingPlane::axis(Axis::Z, 50.0).to_plane();
        let (back, front) = block.split(&plane, 0);
        let lower = CapRegion::of_part(&back, &plane, 0, 1.0, 0.0).unwrap();
        let upper = CapRegion::of_part(&front, &plane, 0, -1.0, 0.0).unwrap();
        (plane, lower, upper)
    }

    #[test]
    fn small_cap_gets_one_centred_anchor() {
        let (plane, lower, upper) = caps(40.0, 30.0);
        approx::assert_relative_eq!(lower.area(), 1200.0, epsilon = 1e-6);
        let anchors = find_anchors(&lower, &upper, &settings());
        assert_eq!(anchors.len(), 1);
        let world = to_world(&plane, &anchors);
        assert!((world[0].x - 20.0).abs() <= 1.25 && (world[0].y - 15.0).abs() <= 1.25);
        approx::assert_relative_eq!(world[0].z, 50.0, epsilon = 1e-9);
    }

    #[test]
    fn large_cap_gets_extra_anchors() {
        let (_, lower, upper) = caps(200.0, 30.0);
        let anchors = find_anchors(&lower, &upper, &settings());
        assert_eq!(anchors.len(), 3);
        for (i, p) in anchors.iter().enumerate() {
            for q in &anchors[i + 1..] {
                let d = ((p[0] - q[0]).powi(2) + (p[1] - q[1]).powi(2)).sqrt();
                assert!(d >= 15.0, "{d}");
            }
        }
    }

    #[test]
    fn anchors_are_deterministic() {
        let (_, lower, upper) = caps(120.0, 90.0);
        assert_eq!(
            find_anchors(&lower, &upper, &settings()),
            find_anchors(&lower, &upper, &settings())
        );
    }

    #[test]
    fn narrow_cap_has_no_room() {
        let (_, lower, upper) = caps(40.0, 5.0);
        assert!(find_anchors(&lower, &upper, &settings()).is_empty());
    }
}
