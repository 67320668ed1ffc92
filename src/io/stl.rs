//! STL import and export through `stl_io`.

use crate::float_types::Real;
use crate::io::{IoResult, open};
use crate::mesh::Mesh;
use nalgebra::Point3;
use std::io::{BufReader, Cursor};
use std::path::Path;

/// Read an ASCII or binary STL file.
pub fn read_stl(path: &Path) -> IoResult<Mesh> {
    let mut reader = BufReader::new(open(path)?);
    let indexed = stl_io::read_stl(&mut reader)?;
    let positions: Vec<Point3<Real>> = indexed
        .vertices
        .iter()
        .map(|v| Point3::new(v[0] as Real, v[1] as Real, v[2] as Real))
        .collect();
    let faces: Vec<[usize; 3]> = indexed.faces.iter().map(|f| f.vertices).collect();
    Mesh::from_triangles(&positions, &faces)
}

/// Write `mesh` as binary STL.
pub fn write_stl(mesh: &Mesh, path: &Path, name: &str) -> IoResult<()> {
    std::fs::write(path, mesh.to_stl_binary(name)?)?;
    Ok(())
}

impl Mesh {
    /// Convert this Mesh to an **ASCII STL** string with the given `name`.
    ///
    /// ```rust
    /// # use meshcut::mesh::{Mesh, polygon::FaceTag};
    /// let mesh = Mesh::cube(1.0, FaceTag::Surface);
    /// let text = mesh.to_stl_ascii("my_solid");
    /// assert!(text.starts_with("solid my_solid"));
    /// ```
    pub fn to_stl_ascii(&self, name: &str) -> String {
        let mut out = String::new();
        out.push_str(&format!("solid {name}\n"));
        for polygon in &self.polygons {
            let n = polygon.plane.normal();
            for triangle in polygon.triangulate() {
                out.push_str(&format!("  facet normal {:.6} {:.6} {:.6}\n", n.x, n.y, n.z));
                out.push_str("    outer loop\n");
                for v in &triangle {
                    out.push_str(&format!(
                        "      vertex {:.6} {:.6} {:.6}\n",
                        v.pos.x, v.pos.y, v.pos.z
                    ));
                }
                out.push_str("    endloop\n");
                out.push_str("  endfacet\n");
            }
        }
        out.push_str(&format!("endsolid {name}\n"));
        out
    }

    /// Convert this Mesh to a **binary STL** byte vector. Binary STL has no
    /// name field, `_name` is accepted for symmetry with the ASCII writer.
    pub fn to_stl_binary(&self, _name: &str) -> std::io::Result<Vec<u8>> {
        use stl_io::{Normal, Triangle, Vertex, write_stl};

        let mut triangles = Vec::<Triangle>::new();
        for polygon in &self.polygons {
            let n = polygon.plane.normal();
            for triangle in polygon.triangulate() {
                triangles.push(Triangle {
                    normal: Normal::new([n.x as f32, n.y as f32, n.z as f32]),
                    vertices: triangle.map(|v| Vertex::new([v.pos.x as f32, v.pos.y as f32, v.pos.z as f32])),
                });
            }
        }

        let mut cursor = Cursor::new(Vec::new());
        write_stl(&mut cursor, triangles.iter())?;
        Ok(cursor.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::polygon::FaceTag;
    use approx::assert_relative_eq;

    #[test]
    fn binary_stl_round_trip_keeps_volume() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cube.stl");
        let cube = Mesh::cuboid(10.0, 20.0, 30.0, FaceTag::Surface);
        write_stl(&cube, &path, "cube").unwrap();
        let loaded = read_stl(&path).unwrap();
        assert_eq!(loaded.triangle_count(), 12);
        assert_relative_eq!(loaded.volume(), 6000.0, epsilon = 1e-3);
    }

    #[test]
    fn ascii_stl_is_readable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ascii.stl");
        let cube = Mesh::cube(4.0, FaceTag::Surface);
        std::fs::write(&path, cube.to_stl_ascii("ascii")).unwrap();
        let loaded = read_stl(&path).unwrap();
        assert_relative_eq!(loaded.volume(), 64.0, epsilon = 1e-3);
    }
}
