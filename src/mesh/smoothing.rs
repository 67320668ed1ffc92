//! Laplacian and Taubin smoothing on welded triangle meshes.

use crate::float_types::Real;
use crate::mesh::indexed::IndexedTriangles;
use nalgebra::Point3;

impl IndexedTriangles {
    /// One umbrella-operator step: every vertex moves `factor` of the way
    /// towards the mean of its neighbours.
    fn laplacian_step(&mut self, neighbors: &[Vec<usize>], factor: Real) {
        let updated: Vec<Point3<Real>> = self
            .positions
            .iter()
            .zip(neighbors)
            .map(|(&current, ring)| {
                if ring.is_empty() {
                    return current;
                }
                let sum = ring
                    .iter()
                    .fold(Point3::origin().coords, |acc, &n| acc + self.positions[n].coords);
                let average = Point3::from(sum / ring.len() as Real);
                current + (average - current) * factor
            })
            .collect();
        self.positions = updated;
    }

    /// Applies Laplacian smoothing. Shrinks the surface over many iterations.
    pub fn laplacian_smooth(&self, lambda: Real, iterations: usize) -> IndexedTriangles {
        let neighbors = self.neighbors();
        let mut smoothed = self.clone();
        for _ in 0..iterations {
            smoothed.laplacian_step(&neighbors, lambda);
        }
        smoothed
    }

    /// Applies Taubin smoothing: a shrinking `lambda` pass followed by an
    /// inflating `mu` pass (`mu < -lambda`), which keeps the volume roughly constant.
    pub fn taubin_smooth(&self, lambda: Real, mu: Real, iterations: usize) -> IndexedTriangles {
        let neighbors = self.neighbors();
        let mut smoothed = self.clone();
        for _ in 0..iterations {
            smoothed.laplacian_step(&neighbors, lambda);
            smoothed.laplacian_step(&neighbors, mu);
        }
        smoothed
    }
}

#[cfg(test)]
mod tests {
    use crate::mesh::Mesh;
    use crate::mesh::indexed::IndexedTriangles;
    use crate::mesh::polygon::FaceTag;

    #[test]
    fn laplacian_shrinks_and_taubin_preserves() {
        let sphere = IndexedTriangles::weld(&Mesh::sphere(10.0, 24, 12, FaceTag::Surface), 1e-6);
        let original = sphere.signed_volume();

        let laplacian = sphere.laplacian_smooth(0.5, 10);
        assert!(laplacian.signed_volume() < original * 0.95);

        let taubin = sphere.taubin_smooth(0.5, -0.53, 10);
        let drift = (taubin.signed_volume() - original).abs() / original;
        assert!(drift < 0.1, "taubin volume drift {drift}");
    }
}
