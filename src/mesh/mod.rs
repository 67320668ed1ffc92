//! `Mesh` struct and implementations of the `CSGOps` trait for `Mesh`

use crate::float_types::{
    EPSILON, Real,
    parry3d::{
        bounding_volume::{Aabb, BoundingVolume},
        query::{PointQuery, Ray, RayCast},
        shape::Triangle,
    },
};
use crate::io::IoError;
use crate::mesh::{
    bsp::Node,
    indexed::IndexedTriangles,
    plane::Plane,
    polygon::{FaceTag, Polygon},
};
use crate::traits::CSGOps;
use nalgebra::{Matrix4, Point3, Vector3};
use std::sync::OnceLock;

pub mod bsp;
pub mod decimate;
pub mod indexed;
pub mod plane;
pub mod polygon;
pub mod shapes;
pub mod smoothing;
pub mod vertex;

/// Direction used for ray-parity containment tests. Deliberately not aligned
/// with any axis or diagonal so rays rarely graze edges of axis-aligned models.
const PARITY_RAY: [Real; 3] = [0.432_427, 0.765_189, 0.477_131];

/// An immutable closed solid made of convex polygons.
///
/// Operations never modify a mesh in place; cutting, hollowing and joint
/// booleans all return new values, so a `Mesh` can be shared freely between
/// search paths.
#[derive(Clone, Debug)]
pub struct Mesh {
    /// 3D polygons for volumetric shapes
    pub polygons: Vec<Polygon>,

    /// Lazily calculated AABB that spans `polygons`.
    pub bounding_box: OnceLock<Aabb>,
}

/// Measurements of one side of a prospective cut.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SideStats {
    /// Volume of the closed part on this side.
    pub volume: Real,
    /// Bounds of the part, `None` if nothing of the solid lies on this side.
    pub bounds: Option<Aabb>,
}

impl SideStats {
    /// Bounding box extents, zero for an empty side.
    pub fn dimensions(&self) -> Vector3<Real> {
        self.bounds.map(|b| b.extents()).unwrap_or_else(Vector3::zeros)
    }

    pub const fn is_empty(&self) -> bool {
        self.bounds.is_none()
    }
}

/// Cut-free statistics of splitting a mesh by a plane: what the two parts
/// would measure if the cut were executed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitStats {
    /// Part behind the plane (opposite the normal).
    pub back: SideStats,
    /// Part in front of the plane (along the normal).
    pub front: SideStats,
    /// Area of the section the plane cuts through the solid.
    pub cap_area: Real,
}

impl Mesh {
    /// Build a Mesh from an existing polygon list
    pub fn from_polygons(polygons: &[Polygon]) -> Self {
        Self::from_polygon_vec(polygons.to_vec())
    }

    pub const fn from_polygon_vec(polygons: Vec<Polygon>) -> Self {
        Mesh {
            polygons,
            bounding_box: OnceLock::new(),
        }
    }

    /// Build a Mesh from indexed triangles as read from an exchange format.
    /// Degenerate triangles are skipped; out-of-range indices are an error.
    pub fn from_triangles(positions: &[Point3<Real>], faces: &[[usize; 3]]) -> Result<Self, IoError> {
        let mut polygons = Vec::with_capacity(faces.len());
        for (f, face) in faces.iter().enumerate() {
            if face.iter().any(|&i| i >= positions.len()) {
                return Err(IoError::invalid_content(format!(
                    "triangle {f} references vertex outside 0..{}",
                    positions.len()
                )));
            }
            let [a, b, c] = face.map(|i| positions[i]);
            if (b - a).cross(&(c - a)).norm() <= EPSILON * EPSILON {
                continue;
            }
            polygons.push(Polygon::triangle(a, b, c, FaceTag::Surface));
        }
        Ok(Self::from_polygon_vec(polygons))
    }

    /// Split polygons into (may_touch, cannot_touch) using bounding‑box tests
    fn partition_polys(polys: &[Polygon], other_bb: &Aabb) -> (Vec<Polygon>, Vec<Polygon>) {
        let mut maybe = Vec::new();
        let mut never = Vec::new();
        for p in polys {
            if p.bounding_box().loosened(EPSILON).intersects(other_bb) {
                maybe.push(p.clone());
            } else {
                never.push(p.clone());
            }
        }
        (maybe, never)
    }

    pub const fn polygons(&self) -> &Vec<Polygon> {
        &self.polygons
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    /// Number of triangles after fan triangulation.
    pub fn triangle_count(&self) -> usize {
        self.polygons
            .iter()
            .map(|p| p.vertices.len().saturating_sub(2))
            .sum()
    }

    /// Welded triangle representation (vertex positions + index triples).
    pub fn to_indexed(&self) -> IndexedTriangles {
        IndexedTriangles::weld(self, crate::float_types::tolerance().max(EPSILON * 0.1))
    }

    /// One normal per face.
    pub fn face_normals(&self) -> Vec<Vector3<Real>> {
        self.polygons.iter().map(|p| p.plane.normal()).collect()
    }

    /// Bounding box extents along X, Y and Z.
    pub fn dimensions(&self) -> Vector3<Real> {
        self.bounding_box().extents()
    }

    /// Enclosed volume. Positive for an outward-oriented closed surface.
    pub fn volume(&self) -> Real {
        self.polygons.iter().map(Polygon::signed_volume).sum()
    }

    pub fn surface_area(&self) -> Real {
        self.polygons.iter().map(Polygon::area).sum()
    }

    /// Centre of mass of the enclosed volume, falling back to the bounding
    /// box centre for open or flat inputs.
    pub fn centroid(&self) -> Point3<Real> {
        let mut weighted = Vector3::zeros();
        let mut total = 0.0;
        for polygon in &self.polygons {
            for [a, b, c] in polygon.triangulate() {
                let volume = a.pos.coords.dot(&b.pos.coords.cross(&c.pos.coords)) / 6.0;
                weighted += (a.pos.coords + b.pos.coords + c.pos.coords) * (volume / 4.0);
                total += volume;
            }
        }
        if total.abs() > EPSILON {
            Point3::from(weighted / total)
        } else {
            self.bounding_box().center()
        }
    }

    /// Casts a ray from `origin` along `direction` against every triangle and
    /// returns the hit distances, sorted ascending with near-duplicates removed.
    pub fn ray_hits(&self, origin: &Point3<Real>, direction: &Vector3<Real>) -> Vec<Real> {
        let ray = Ray::new(*origin, *direction);
        let mut hits: Vec<Real> = self
            .polygons
            .iter()
            .flat_map(|poly| poly.triangulate())
            .filter_map(|[a, b, c]| {
                Triangle::new(a.pos, b.pos, c.pos).cast_local_ray(&ray, Real::MAX, true)
            })
            .collect();
        hits.sort_by(|a, b| a.total_cmp(b));
        hits.dedup_by(|a, b| (*a - *b).abs() < EPSILON);
        hits
    }

    /// Ray-parity point containment.
    pub fn contains_point(&self, point: &Point3<Real>) -> bool {
        let bb = self.bounding_box();
        if !bb.contains_local_point(point) {
            return false;
        }
        let direction = Vector3::new(PARITY_RAY[0], PARITY_RAY[1], PARITY_RAY[2]);
        self.ray_hits(point, &direction).len() % 2 == 1
    }

    /// Unsigned distance from `point` to the closest face.
    pub fn distance_to_surface(&self, point: &Point3<Real>) -> Real {
        self.polygons
            .iter()
            .flat_map(|poly| poly.triangulate())
            .map(|[a, b, c]| Triangle::new(a.pos, b.pos, c.pos).distance_to_local_point(point, true))
            .fold(Real::MAX, Real::min)
    }

    /// Faces created by the cut with the given id.
    pub fn cap_polygons(&self, cut_id: u32) -> impl Iterator<Item = &Polygon> {
        self.polygons
            .iter()
            .filter(move |p| p.tag == FaceTag::Cut(cut_id))
    }

    /// Half-space solid bounded by `plane`, large enough to swallow this mesh.
    /// `front` selects the side the plane normal points into. The face lying on
    /// the plane is tagged `Cut(cut_id)`.
    fn half_space(&self, plane: &Plane, cut_id: u32, front: bool) -> Mesh {
        let bb = self.bounding_box();
        let center = bb.center();
        let reach = 2.0 * (bb.extents().norm() + plane.signed_distance(&center).abs()) + 1.0;
        let (u, v) = plane.basis();
        let n = plane.normal();
        let on_plane = center - n * plane.signed_distance(&center);

        let ring = |depth: Real| -> Vec<Point3<Real>> {
            [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)]
                .iter()
                .map(|(a, b)| on_plane + u * (a * reach) + v * (b * reach) + n * depth)
                .collect()
        };
        let far = if front { reach } else { -reach };
        let mut solid = Mesh::loft(ring(0.0), ring(far), FaceTag::Surface);
        for polygon in &mut solid.polygons {
            if polygon
                .vertices
                .iter()
                .all(|v| plane.signed_distance(&v.pos).abs() < EPSILON)
            {
                polygon.tag = FaceTag::Cut(cut_id);
            }
        }
        solid
    }

    /// Cut the solid by `plane` into `(back, front)` closed parts. The new
    /// cap faces on both parts are tagged `FaceTag::Cut(cut_id)`.
    pub fn split(&self, plane: &Plane, cut_id: u32) -> (Mesh, Mesh) {
        let back = self.intersection(&self.half_space(plane, cut_id, false));
        let front = self.intersection(&self.half_space(plane, cut_id, true));
        (back, front)
    }

    /// Measure both sides of a cut without performing it.
    ///
    /// Faces are clipped against the plane; each side's volume is closed
    /// analytically with the cap, whose vector area is minus the sum of the
    /// side's face area vectors.
    pub fn split_stats(&self, plane: &Plane) -> SplitStats {
        #[derive(Default)]
        struct Accumulator {
            volume: Real,
            area: Vector3<Real>,
            bounds: Option<Aabb>,
        }

        impl Accumulator {
            fn add(&mut self, polygon: &Polygon) {
                self.volume += polygon.signed_volume();
                self.area += polygon.area_vector();
                let bb = polygon.bounding_box();
                self.bounds = Some(match self.bounds {
                    Some(current) => current.merged(&bb),
                    None => bb,
                });
            }

            fn finish(self, p0: &Point3<Real>) -> (SideStats, Real) {
                let cap = -self.area;
                let volume = self.volume + p0.coords.dot(&cap) / 3.0;
                (
                    SideStats {
                        volume,
                        bounds: self.bounds,
                    },
                    cap.norm(),
                )
            }
        }

        let mut back = Accumulator::default();
        let mut front = Accumulator::default();

        for polygon in &self.polygons {
            let (coplanar_front, coplanar_back, front_parts, back_parts) =
                plane.split_polygon(polygon);
            // A face lying on the plane and facing along the normal closes the back part.
            coplanar_front.iter().chain(&back_parts).for_each(|p| back.add(p));
            coplanar_back.iter().chain(&front_parts).for_each(|p| front.add(p));
        }

        let p0 = plane.origin();
        let (back, back_cap) = back.finish(&p0);
        let (front, front_cap) = front.finish(&p0);

        SplitStats {
            back,
            front,
            cap_area: back_cap.max(front_cap),
        }
    }
}

impl CSGOps for Mesh {
    /// Returns a new empty Mesh
    fn new() -> Self {
        Mesh {
            polygons: Vec::new(),
            bounding_box: OnceLock::new(),
        }
    }

    /// Return a new Mesh representing union of the two Meshes.
    ///
    /// ```text
    /// let c = a.union(b);
    ///     +-------+            +-------+
    ///     |       |            |       |
    ///     |   a   |            |   c   |
    ///     |    +--+----+   =   |       +----+
    ///     +----+--+    |       +----+       |
    ///          |   b   |            |   c   |
    ///          |       |            |       |
    ///          +-------+            +-------+
    /// ```
    fn union(&self, other: &Mesh) -> Mesh {
        // avoid splitting obvious non‑intersecting faces
        let (a_clip, a_passthru) = Self::partition_polys(&self.polygons, &other.bounding_box());
        let (b_clip, b_passthru) = Self::partition_polys(&other.polygons, &self.bounding_box());

        let mut a = Node::from_polygons(&a_clip);
        let mut b = Node::from_polygons(&b_clip);

        a.clip_to(&b);
        b.clip_to(&a);
        b.invert();
        b.clip_to(&a);
        b.invert();
        a.build(&b.all_polygons());

        let mut final_polys = a.all_polygons();
        final_polys.extend(a_passthru);
        final_polys.extend(b_passthru);

        Mesh::from_polygon_vec(final_polys)
    }

    /// Return a new Mesh representing difference of the two Meshes.
    ///
    /// ```text
    /// let c = a.difference(b);
    ///     +-------+            +-------+
    ///     |       |            |       |
    ///     |   a   |            |   c   |
    ///     |    +--+----+   =   |    +--+
    ///     +----+--+    |       +----+
    ///          |   b   |
    ///          |       |
    ///          +-------+
    /// ```
    fn difference(&self, other: &Mesh) -> Mesh {
        let (a_clip, a_passthru) = Self::partition_polys(&self.polygons, &other.bounding_box());
        let (b_clip, _b_passthru) = Self::partition_polys(&other.polygons, &self.bounding_box());

        let mut a = Node::from_polygons(&a_clip);
        let mut b = Node::from_polygons(&b_clip);

        a.invert();
        a.clip_to(&b);
        b.clip_to(&a);
        b.invert();
        b.clip_to(&a);
        b.invert();
        a.build(&b.all_polygons());
        a.invert();

        let mut final_polys = a.all_polygons();
        final_polys.extend(a_passthru);

        Mesh::from_polygon_vec(final_polys)
    }

    /// Return a new Mesh representing intersection of the two Meshes.
    fn intersection(&self, other: &Mesh) -> Mesh {
        let mut a = Node::from_polygons(&self.polygons);
        let mut b = Node::from_polygons(&other.polygons);

        a.invert();
        b.clip_to(&a);
        b.invert();
        a.clip_to(&b);
        b.clip_to(&a);
        a.build(&b.all_polygons());
        a.invert();

        Mesh::from_polygon_vec(a.all_polygons())
    }

    /// Apply an arbitrary 3D transform (as a 4x4 matrix) to the mesh.
    /// A singular matrix leaves normals untransformed.
    fn transform(&self, mat: &Matrix4<Real>) -> Mesh {
        let mat_inv_transpose = mat
            .try_inverse()
            .map(|inv| inv.transpose())
            .unwrap_or_else(Matrix4::identity);
        let mut mesh = self.clone();

        for poly in &mut mesh.polygons {
            for vert in &mut poly.vertices {
                vert.pos = mat.transform_point(&vert.pos);
                let normal = mat_inv_transpose.transform_vector(&vert.normal);
                vert.normal = if normal.norm() > Real::EPSILON {
                    normal.normalize()
                } else {
                    normal
                };
            }

            // keep the cached plane consistent with the new vertex positions
            if let Some(plane) = Plane::from_vertices(&poly.vertices) {
                poly.plane = plane;
            }
        }

        mesh.bounding_box = OnceLock::new();
        mesh
    }

    /// Returns a [`parry3d::bounding_volume::Aabb`] indicating the 3D bounds of all `polygons`.
    fn bounding_box(&self) -> Aabb {
        *self.bounding_box.get_or_init(|| {
            let mut mins = Point3::new(Real::MAX, Real::MAX, Real::MAX);
            let mut maxs = Point3::new(-Real::MAX, -Real::MAX, -Real::MAX);
            for poly in &self.polygons {
                for v in &poly.vertices {
                    mins = mins.inf(&v.pos);
                    maxs = maxs.sup(&v.pos);
                }
            }

            // no polygons: a trivial AABB at origin
            if mins.x > maxs.x {
                return Aabb::new(Point3::origin(), Point3::origin());
            }
            Aabb::new(mins, maxs)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn block() -> Mesh {
        Mesh::cuboid(100.0, 60.0, 40.0, FaceTag::Surface)
    }

    #[test]
    fn split_stats_matches_executed_cut() {
        let mesh = block();
        let plane = Plane::from_normal(Vector3::x(), 30.0);
        let stats = mesh.split_stats(&plane);
        assert_relative_eq!(stats.back.volume, 30.0 * 60.0 * 40.0, epsilon = 1e-6);
        assert_relative_eq!(stats.front.volume, 70.0 * 60.0 * 40.0, epsilon = 1e-6);
        assert_relative_eq!(stats.cap_area, 60.0 * 40.0, epsilon = 1e-6);
        assert_relative_eq!(stats.back.dimensions().x, 30.0, epsilon = 1e-9);

        let (back, front) = mesh.split(&plane, 7);
        assert_relative_eq!(back.volume(), stats.back.volume, epsilon = 1e-6);
        assert_relative_eq!(front.volume(), stats.front.volume, epsilon = 1e-6);
        assert_relative_eq!(front.bounding_box().mins.x, 30.0, epsilon = 1e-6);

        let cap_area: Real = back.cap_polygons(7).map(Polygon::area).sum();
        assert_relative_eq!(cap_area, 60.0 * 40.0, epsilon = 1e-6);
        assert!(back.cap_polygons(7).all(|p| p.plane.normal().x > 0.99));
        assert!(front.cap_polygons(7).all(|p| p.plane.normal().x < -0.99));
    }

    #[test]
    fn oblique_split_conserves_volume() {
        let mesh = block();
        let plane = Plane::from_point_normal(&Point3::new(50.0, 30.0, 20.0), &Vector3::new(1.0, 1.0, 0.5));
        let stats = mesh.split_stats(&plane);
        assert_relative_eq!(stats.back.volume + stats.front.volume, mesh.volume(), epsilon = 1e-6);
        let (back, front) = mesh.split(&plane, 0);
        assert_relative_eq!(back.volume(), stats.back.volume, max_relative = 1e-6);
        assert_relative_eq!(front.volume(), stats.front.volume, max_relative = 1e-6);
    }

    #[test]
    fn plane_outside_leaves_one_side_empty() {
        let stats = block().split_stats(&Plane::from_normal(Vector3::z(), 500.0));
        assert!(stats.front.is_empty());
        assert_relative_eq!(stats.back.volume, 100.0 * 60.0 * 40.0, epsilon = 1e-6);
    }

    #[test]
    fn containment_and_distance() {
        let mesh = block();
        assert!(mesh.contains_point(&Point3::new(10.0, 10.0, 10.0)));
        assert!(!mesh.contains_point(&Point3::new(-1.0, 10.0, 10.0)));
        assert!(!mesh.contains_point(&Point3::new(50.0, 30.0, 41.0)));
        assert_relative_eq!(
            mesh.distance_to_surface(&Point3::new(50.0, 30.0, 35.0)),
            5.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn difference_removes_tool_volume() {
        let mesh = block();
        let tool = Mesh::cube(10.0, FaceTag::Joint).translate(45.0, 25.0, 35.0);
        let result = mesh.difference(&tool);
        assert_relative_eq!(result.volume(), mesh.volume() - 500.0, epsilon = 1e-6);
        assert!(result.polygons.iter().any(|p| p.tag == FaceTag::Joint));
    }

    #[test]
    fn from_triangles_rejects_bad_indices() {
        let positions = [Point3::origin(), Point3::new(1.0, 0.0, 0.0)];
        assert!(Mesh::from_triangles(&positions, &[[0, 1, 2]]).is_err());
    }

    #[test]
    fn centroid_of_box() {
        let c = block().translate(5.0, 0.0, 0.0).centroid();
        assert_relative_eq!(c.x, 55.0, epsilon = 1e-9);
        assert_relative_eq!(c.y, 30.0, epsilon = 1e-9);
        assert_relative_eq!(c.z, 20.0, epsilon = 1e-9);
    }
}
