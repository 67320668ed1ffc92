//! Oriented planes used for BSP classification and polygon splitting.

use crate::float_types::{EPSILON, Real};
use crate::mesh::polygon::Polygon;
use crate::mesh::vertex::Vertex;
use nalgebra::{Point3, Vector3};

// Classification bit flags. `SPANNING == FRONT | BACK`.
pub const COPLANAR: i8 = 0;
pub const FRONT: i8 = 1;
pub const BACK: i8 = 2;
pub const SPANNING: i8 = 3;

/// A plane in Hessian normal form: every point `p` on it satisfies `normal · p = w`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Unit normal vector of the plane
    pub normal: Vector3<Real>,
    /// Distance from origin along normal
    pub w: Real,
}

impl Plane {
    /// Create a plane from a (possibly non-unit) normal and offset.
    /// The offset is rescaled together with the normal.
    pub fn from_normal(normal: Vector3<Real>, w: Real) -> Self {
        let len = normal.norm();
        if len < Real::EPSILON {
            return Plane {
                normal: Vector3::z(),
                w,
            };
        }
        Plane {
            normal: normal / len,
            w: w / len,
        }
    }

    /// Plane through `point` with the given normal.
    pub fn from_point_normal(point: &Point3<Real>, normal: &Vector3<Real>) -> Self {
        let n = normal.normalize();
        Plane {
            normal: n,
            w: n.dot(&point.coords),
        }
    }

    /// Plane through three points, normal by the right-hand rule `(b-a) × (c-a)`.
    /// Returns `None` for collinear input.
    pub fn from_points(a: &Point3<Real>, b: &Point3<Real>, c: &Point3<Real>) -> Option<Self> {
        let n = (b - a).cross(&(c - a));
        if n.norm_squared() < Real::EPSILON * Real::EPSILON {
            return None;
        }
        Some(Self::from_point_normal(a, &n))
    }

    /// Best-fit plane of a polygon outline using Newell's method, which stays
    /// stable for slightly non-planar or nearly degenerate loops.
    pub fn from_vertices(vertices: &[Vertex]) -> Option<Self> {
        if vertices.len() < 3 {
            return None;
        }
        let mut normal = Vector3::zeros();
        let mut centroid = Vector3::zeros();
        for (i, current) in vertices.iter().enumerate() {
            let next = &vertices[(i + 1) % vertices.len()];
            normal.x += (current.pos.y - next.pos.y) * (current.pos.z + next.pos.z);
            normal.y += (current.pos.z - next.pos.z) * (current.pos.x + next.pos.x);
            normal.z += (current.pos.x - next.pos.x) * (current.pos.y + next.pos.y);
            centroid += current.pos.coords;
        }
        if normal.norm_squared() < Real::EPSILON * Real::EPSILON {
            return None;
        }
        centroid /= vertices.len() as Real;
        Some(Self::from_point_normal(&Point3::from(centroid), &normal))
    }

    pub const fn normal(&self) -> Vector3<Real> {
        self.normal
    }

    pub const fn offset(&self) -> Real {
        self.w
    }

    /// Some point lying on the plane.
    pub fn origin(&self) -> Point3<Real> {
        Point3::from(self.normal * self.w)
    }

    pub fn flip(&mut self) {
        self.normal = -self.normal;
        self.w = -self.w;
    }

    pub fn flipped(&self) -> Self {
        Plane {
            normal: -self.normal,
            w: -self.w,
        }
    }

    /// Signed distance of `point` from the plane, positive on the normal side.
    #[inline]
    pub fn signed_distance(&self, point: &Point3<Real>) -> Real {
        self.normal.dot(&point.coords) - self.w
    }

    /// Classify a point as `FRONT`, `BACK` or `COPLANAR`.
    #[inline]
    pub fn orient_point(&self, point: &Point3<Real>) -> i8 {
        let t = self.signed_distance(point);
        if t < -EPSILON {
            BACK
        } else if t > EPSILON {
            FRONT
        } else {
            COPLANAR
        }
    }

    /// Classify another plane: `FRONT` if its normal agrees with ours.
    pub fn orient_plane(&self, other: &Plane) -> i8 {
        if self.normal.dot(&other.normal) > 0.0 {
            FRONT
        } else {
            BACK
        }
    }

    /// Bitmask classification of a polygon against this plane.
    pub fn classify_polygon(&self, polygon: &Polygon) -> i8 {
        polygon
            .vertices
            .iter()
            .fold(COPLANAR, |acc, v| acc | self.orient_point(&v.pos))
    }

    /// Splits a polygon by this plane, returning four buckets:
    /// `(coplanar_front, coplanar_back, front, back)`.
    ///
    /// Split pieces keep the source polygon's plane and tag, so cut faces and
    /// joint faces stay identifiable through any number of BSP passes.
    #[allow(clippy::type_complexity)]
    pub fn split_polygon(
        &self,
        polygon: &Polygon,
    ) -> (Vec<Polygon>, Vec<Polygon>, Vec<Polygon>, Vec<Polygon>) {
        let mut coplanar_front = Vec::new();
        let mut coplanar_back = Vec::new();
        let mut front = Vec::new();
        let mut back = Vec::new();

        let types: Vec<i8> = polygon
            .vertices
            .iter()
            .map(|v| self.orient_point(&v.pos))
            .collect();
        let polygon_type = types.iter().fold(COPLANAR, |acc, &t| acc | t);

        match polygon_type {
            COPLANAR => {
                if self.normal.dot(&polygon.plane.normal) > 0.0 {
                    coplanar_front.push(polygon.clone());
                } else {
                    coplanar_back.push(polygon.clone());
                }
            },
            FRONT => front.push(polygon.clone()),
            BACK => back.push(polygon.clone()),
            _ => {
                let count = polygon.vertices.len();
                let mut split_front = Vec::with_capacity(count + 1);
                let mut split_back = Vec::with_capacity(count + 1);

                for i in 0..count {
                    let j = (i + 1) % count;
                    let (type_i, type_j) = (types[i], types[j]);
                    let vertex_i = &polygon.vertices[i];
                    let vertex_j = &polygon.vertices[j];

                    if type_i != BACK {
                        split_front.push(*vertex_i);
                    }
                    if type_i != FRONT {
                        split_back.push(*vertex_i);
                    }

                    if (type_i | type_j) == SPANNING {
                        let denom = self.normal.dot(&(vertex_j.pos - vertex_i.pos));
                        if denom.abs() > Real::EPSILON {
                            let t = (self.w - self.normal.dot(&vertex_i.pos.coords)) / denom;
                            let vertex_new = vertex_i.interpolate(vertex_j, t);
                            split_front.push(vertex_new);
                            split_back.push(vertex_new);
                        }
                    }
                }

                if split_front.len() >= 3 {
                    front.push(Polygon::with_plane(split_front, polygon.plane, polygon.tag));
                }
                if split_back.len() >= 3 {
                    back.push(Polygon::with_plane(split_back, polygon.plane, polygon.tag));
                }
            },
        }

        (coplanar_front, coplanar_back, front, back)
    }

    /// Orthonormal in-plane basis `(u, v)` with `u × v = normal`.
    pub fn basis(&self) -> (Vector3<Real>, Vector3<Real>) {
        let helper = if self.normal.x.abs() < 0.9 {
            Vector3::x()
        } else {
            Vector3::y()
        };
        let u = helper.cross(&self.normal).normalize();
        let v = self.normal.cross(&u);
        (u, v)
    }

    /// Project a point into the plane's `(u, v)` coordinates.
    pub fn project_2d(&self, point: &Point3<Real>) -> [Real; 2] {
        let (u, v) = self.basis();
        let rel = point - self.origin();
        [rel.dot(&u), rel.dot(&v)]
    }

    /// Map plane coordinates back into 3D.
    pub fn lift_2d(&self, uv: [Real; 2]) -> Point3<Real> {
        let (u, v) = self.basis();
        self.origin() + u * uv[0] + v * uv[1]
    }
}
