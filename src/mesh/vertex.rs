//! Struct and functions for working with `Vertex`s from which `Polygon`s are composed.

use crate::float_types::Real;
use nalgebra::{Point3, Vector3};

/// A vertex of a polygon, holding position and normal.
#[derive(Debug, Clone, PartialEq, Copy)]
pub struct Vertex {
    pub pos: Point3<Real>,
    pub normal: Vector3<Real>,
}

impl Vertex {
    /// Create a new [`Vertex`].
    ///
    /// * `pos`    – the position in model space
    /// * `normal` – (optionally non‑unit) normal; copied verbatim
    ///
    /// Non-finite coordinates are replaced by zero so that a corrupt input
    /// triangle cannot poison bounding boxes or plane classification.
    #[inline]
    pub fn new(mut pos: Point3<Real>, mut normal: Vector3<Real>) -> Self {
        for c in pos.coords.iter_mut() {
            if !c.is_finite() {
                *c = 0.0;
            }
        }
        for c in normal.iter_mut() {
            if !c.is_finite() {
                *c = 0.0;
            }
        }
        Vertex { pos, normal }
    }

    /// Flip vertex normal in place.
    ///
    /// ```rust
    /// # use nalgebra::{Point3, Vector3};
    /// # use meshcut::mesh::vertex::Vertex;
    /// let mut v = Vertex::new(Point3::new(1.0, 2.0, 3.0), Vector3::x());
    /// v.flip();
    /// assert_eq!(v.pos, Point3::new(1.0, 2.0, 3.0));
    /// assert_eq!(v.normal, -Vector3::x());
    /// ```
    pub fn flip(&mut self) {
        self.normal = -self.normal;
    }

    /// Linear interpolation between `self` and `other` at parameter `t`.
    pub fn interpolate(&self, other: &Vertex, t: Real) -> Vertex {
        let pos = self.pos + (other.pos - self.pos) * t;
        let normal = self.normal + (other.normal - self.normal) * t;
        Vertex::new(pos, normal)
    }

    /// Euclidean distance between vertex positions.
    pub fn distance_to(&self, other: &Vertex) -> Real {
        (self.pos - other.pos).norm()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpolate_midpoint() {
        let a = Vertex::new(Point3::new(0.0, 0.0, 0.0), Vector3::x());
        let b = Vertex::new(Point3::new(2.0, 4.0, 6.0), Vector3::y());
        let m = a.interpolate(&b, 0.5);
        assert_eq!(m.pos, Point3::new(1.0, 2.0, 3.0));
        assert_eq!(m.normal, Vector3::new(0.5, 0.5, 0.0));
    }

    #[test]
    fn non_finite_coordinates_are_sanitised() {
        let v = Vertex::new(Point3::new(Real::NAN, 1.0, Real::INFINITY), Vector3::z());
        assert_eq!(v.pos, Point3::new(0.0, 1.0, 0.0));
        assert_eq!(v.distance_to(&v), 0.0);
    }
}
