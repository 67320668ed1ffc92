//! Convex planar polygons, the unit of work of the BSP boolean engine.

use crate::float_types::{
    Real,
    parry3d::bounding_volume::Aabb,
};
use crate::mesh::plane::Plane;
use crate::mesh::vertex::Vertex;
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Provenance of a face. Carried through every split so that cut faces can
/// be located again after later booleans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaceTag {
    /// Original surface of the input solid.
    #[default]
    Surface,
    /// Cap produced by the cut with the given id.
    Cut(u32),
    /// Wall of a joint pin or hole.
    Joint,
    /// Inner wall created by hollowing.
    Inner,
}

/// A convex polygon with its supporting plane.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub vertices: Vec<Vertex>,
    pub plane: Plane,
    pub tag: FaceTag,
}

impl Polygon {
    /// Create a polygon, computing its plane from the vertex loop.
    /// Degenerate loops get a plane through the first vertex facing +Z; they
    /// have zero area and drop out of every measurement.
    pub fn new(vertices: Vec<Vertex>, tag: FaceTag) -> Self {
        let plane = Plane::from_vertices(&vertices).unwrap_or_else(|| {
            let z = vertices.first().map(|v| v.pos.z).unwrap_or(0.0);
            Plane::from_normal(Vector3::z(), z)
        });
        Polygon {
            vertices,
            plane,
            tag,
        }
    }

    /// Create a polygon that reuses an already known plane.
    pub const fn with_plane(vertices: Vec<Vertex>, plane: Plane, tag: FaceTag) -> Self {
        Polygon {
            vertices,
            plane,
            tag,
        }
    }

    /// Triangle from three positions, flat-shaded.
    pub fn triangle(a: Point3<Real>, b: Point3<Real>, c: Point3<Real>, tag: FaceTag) -> Self {
        let n = (b - a).cross(&(c - a));
        let n = if n.norm() > Real::EPSILON {
            n.normalize()
        } else {
            Vector3::z()
        };
        Polygon::new(
            vec![Vertex::new(a, n), Vertex::new(b, n), Vertex::new(c, n)],
            tag,
        )
    }

    /// Reverse winding and plane orientation.
    pub fn flip(&mut self) {
        self.vertices.reverse();
        for v in &mut self.vertices {
            v.flip();
        }
        self.plane.flip();
    }

    /// Recompute the plane from the current vertices and push the plane
    /// normal onto every vertex.
    pub fn set_new_normal(&mut self) {
        if let Some(plane) = Plane::from_vertices(&self.vertices) {
            self.plane = plane;
        }
        for v in &mut self.vertices {
            v.normal = self.plane.normal;
        }
    }

    /// Fan triangulation. Valid because every polygon in the engine is convex:
    /// inputs are triangles and BSP splits of convex polygons stay convex.
    pub fn triangulate(&self) -> Vec<[Vertex; 3]> {
        if self.vertices.len() < 3 {
            return Vec::new();
        }
        let anchor = self.vertices[0];
        self.vertices
            .windows(2)
            .skip(1)
            .map(|pair| [anchor, pair[0], pair[1]])
            .collect()
    }

    /// Vector area: direction of the outward normal, magnitude equal to the area.
    pub fn area_vector(&self) -> Vector3<Real> {
        self.triangulate()
            .iter()
            .fold(Vector3::zeros(), |acc, [a, b, c]| {
                acc + (b.pos - a.pos).cross(&(c.pos - a.pos)) * 0.5
            })
    }

    pub fn area(&self) -> Real {
        self.area_vector().norm()
    }

    /// Area-weighted centroid.
    pub fn centroid(&self) -> Point3<Real> {
        let mut weighted = Vector3::zeros();
        let mut total = 0.0;
        for [a, b, c] in self.triangulate() {
            let area = (b.pos - a.pos).cross(&(c.pos - a.pos)).norm() * 0.5;
            weighted += (a.pos.coords + b.pos.coords + c.pos.coords) / 3.0 * area;
            total += area;
        }
        if total > Real::EPSILON {
            Point3::from(weighted / total)
        } else {
            let sum = self
                .vertices
                .iter()
                .fold(Vector3::zeros(), |acc, v| acc + v.pos.coords);
            Point3::from(sum / self.vertices.len().max(1) as Real)
        }
    }

    /// Signed volume of the cone from the origin to this polygon. Summed over
    /// a closed, outward-oriented surface this gives the enclosed volume.
    pub fn signed_volume(&self) -> Real {
        self.triangulate()
            .iter()
            .map(|[a, b, c]| a.pos.coords.dot(&b.pos.coords.cross(&c.pos.coords)) / 6.0)
            .sum()
    }

    pub fn bounding_box(&self) -> Aabb {
        let mut mins = Point3::new(Real::MAX, Real::MAX, Real::MAX);
        let mut maxs = Point3::new(-Real::MAX, -Real::MAX, -Real::MAX);
        for v in &self.vertices {
            mins = mins.inf(&v.pos);
            maxs = maxs.sup(&v.pos);
        }
        Aabb::new(mins, maxs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_square() -> Polygon {
        Polygon::new(
            vec![
                Vertex::new(Point3::new(0.0, 0.0, 0.0), Vector3::z()),
                Vertex::new(Point3::new(1.0, 0.0, 0.0), Vector3::z()),
                Vertex::new(Point3::new(1.0, 1.0, 0.0), Vector3::z()),
                Vertex::new(Point3::new(0.0, 1.0, 0.0), Vector3::z()),
            ],
            FaceTag::Surface,
        )
    }

    #[test]
    fn square_measurements() {
        let square = unit_square();
        assert_eq!(square.triangulate().len(), 2);
        assert_relative_eq!(square.area(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(square.area_vector().z, 1.0, epsilon = 1e-12);
        let c = square.centroid();
        assert_relative_eq!(c.x, 0.5, epsilon = 1e-12);
        assert_relative_eq!(c.y, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn flip_reverses_orientation() {
        let mut square = unit_square();
        square.flip();
        assert_relative_eq!(square.area_vector().z, -1.0, epsilon = 1e-12);
        assert!(square.plane.normal.z < 0.0);
        assert_eq!(square.tag, FaceTag::Surface);
    }
}
