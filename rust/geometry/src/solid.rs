// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Solids as faces bounded by loops
//!
//! Ownership is strictly hierarchical: a solid owns its faces, faces own
//! their loops. A solid belongs to the builder that creates it until it
//! is handed to the caller, and may be discarded and rebuilt on failure.

use crate::bbox::BoundingBox;
use crate::curve::is_mirrored;
use crate::error::{Error, Result};
use crate::mesh::Mesh;
use crate::profile::Plane;
use crate::triangulation::triangulate_with_holes;
use nalgebra::{Matrix4, Point3, Vector3};

/// Planar face bounded by an outer loop and optional hole loops
///
/// Loops wind counter-clockwise around the face normal (holes clockwise).
#[derive(Debug, Clone)]
pub struct Face {
    pub plane: Plane,
    pub outer: Vec<Point3<f64>>,
    pub holes: Vec<Vec<Point3<f64>>>,
}

impl Face {
    pub fn new(plane: Plane, outer: Vec<Point3<f64>>) -> Result<Self> {
        if outer.len() < 3 {
            return Err(Error::InvalidProfile(format!(
                "face boundary needs at least 3 vertices, got {}",
                outer.len()
            )));
        }
        Ok(Self {
            plane,
            outer,
            holes: Vec::new(),
        })
    }

    /// Build a face from a 3-D ring, fitting its plane from the winding
    pub fn from_ring(outer: Vec<Point3<f64>>) -> Result<Self> {
        let plane = Plane::fit(&outer)?;
        Self::new(plane, outer)
    }

    /// Outward face normal
    #[inline]
    pub fn normal(&self) -> Vector3<f64> {
        self.plane.normal()
    }

    /// Tessellate this face into a shell mesh
    pub fn tessellate_into(&self, mesh: &mut Mesh) -> Result<()> {
        let outer_2d: Vec<_> = self.outer.iter().map(|p| self.plane.project(p)).collect();
        let holes_2d: Vec<Vec<_>> = self
            .holes
            .iter()
            .map(|h| h.iter().map(|p| self.plane.project(p)).collect())
            .collect();

        let indices = triangulate_with_holes(&outer_2d, &holes_2d)?;

        let base = mesh.vertex_count() as u32;
        for p in self.outer.iter().chain(self.holes.iter().flatten()) {
            mesh.add_vertex(*p);
        }

        let normal = self.normal();
        for tri in indices.chunks_exact(3) {
            let (i0, i1, i2) = (tri[0] as u32, tri[1] as u32, tri[2] as u32);
            let a = mesh.vertex(base + i0);
            let b = mesh.vertex(base + i1);
            let c = mesh.vertex(base + i2);
            // earcut follows the ring winding; enforce the face normal
            if (b - a).cross(&(c - a)).dot(&normal) >= 0.0 {
                mesh.add_triangle(base + i0, base + i1, base + i2);
            } else {
                mesh.add_triangle(base + i0, base + i2, base + i1);
            }
        }
        Ok(())
    }
}

/// A 3-D body made of faces bounded by loops
#[derive(Debug, Clone, Default)]
pub struct Solid {
    pub faces: Vec<Face>,
}

impl Solid {
    pub fn new(faces: Vec<Face>) -> Self {
        Self { faces }
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Tessellate the boundary into a triangle shell
    pub fn shell(&self) -> Result<Mesh> {
        let vertex_estimate: usize = self
            .faces
            .iter()
            .map(|f| f.outer.len() + f.holes.iter().map(|h| h.len()).sum::<usize>())
            .sum();
        let mut mesh = Mesh::with_capacity(vertex_estimate, vertex_estimate * 3);
        for face in &self.faces {
            face.tessellate_into(&mut mesh)?;
        }
        Ok(mesh)
    }

    /// Enclosed volume (positive for outward-oriented closed shells)
    pub fn volume(&self) -> Result<f64> {
        Ok(self.shell()?.signed_volume())
    }

    /// Bounding box over all boundary vertices
    pub fn bounds(&self) -> BoundingBox {
        let mut bounds = BoundingBox::empty();
        for face in &self.faces {
            for p in face.outer.iter().chain(face.holes.iter().flatten()) {
                bounds.expand_point(p);
            }
        }
        bounds
    }

    /// Apply an affine transform, returning a new solid
    ///
    /// Mirrored transforms reverse every loop so face normals stay
    /// outward; planes are refit from the transformed rings.
    pub fn transformed(&self, m: &Matrix4<f64>) -> Result<Solid> {
        let mirrored = is_mirrored(m);
        let map_ring = |ring: &[Point3<f64>]| -> Vec<Point3<f64>> {
            let mut out: Vec<_> = ring.iter().map(|p| m.transform_point(p)).collect();
            if mirrored {
                out.reverse();
            }
            out
        };

        let mut faces = Vec::with_capacity(self.faces.len());
        for face in &self.faces {
            let outer = map_ring(&face.outer);
            let mut new_face = Face::from_ring(outer)?;
            new_face.holes = face.holes.iter().map(|h| map_ring(h)).collect();
            faces.push(new_face);
        }
        Ok(Solid::new(faces))
    }

    /// Rigid translation
    pub fn translated(&self, offset: &Vector3<f64>) -> Solid {
        let map_ring = |ring: &[Point3<f64>]| -> Vec<Point3<f64>> {
            ring.iter().map(|p| p + offset).collect()
        };
        let faces = self
            .faces
            .iter()
            .map(|face| Face {
                plane: Plane {
                    origin: face.plane.origin + offset,
                    u: face.plane.u,
                    v: face.plane.v,
                },
                outer: map_ring(&face.outer),
                holes: face.holes.iter().map(|h| map_ring(h)).collect(),
            })
            .collect();
        Solid::new(faces)
    }
}

#[cfg(test)]
pub(crate) fn unit_cube_solid() -> Solid {
    let corners = [
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(1.0, 1.0, 0.0),
        Point3::new(0.0, 1.0, 0.0),
        Point3::new(0.0, 0.0, 1.0),
        Point3::new(1.0, 0.0, 1.0),
        Point3::new(1.0, 1.0, 1.0),
        Point3::new(0.0, 1.0, 1.0),
    ];
    let rings = [
        [0usize, 3, 2, 1], // bottom, -Z
        [4, 5, 6, 7],      // top, +Z
        [0, 1, 5, 4],      // -Y
        [2, 3, 7, 6],      // +Y
        [1, 2, 6, 5],      // +X
        [3, 0, 4, 7],      // -X
    ];
    let faces = rings
        .iter()
        .map(|ring| Face::from_ring(ring.iter().map(|&i| corners[i]).collect()).unwrap())
        .collect();
    Solid::new(faces)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cube_solid_volume_and_faces() {
        let cube = unit_cube_solid();
        assert_eq!(cube.face_count(), 6);
        assert_relative_eq!(cube.volume().unwrap(), 1.0, epsilon = 1e-9);

        let shell = cube.shell().unwrap();
        assert_eq!(shell.triangle_count(), 12);
    }

    #[test]
    fn test_face_with_hole_tessellates() {
        let outer = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(4.0, 0.0, 0.0),
            Point3::new(4.0, 4.0, 0.0),
            Point3::new(0.0, 4.0, 0.0),
        ];
        let mut face = Face::from_ring(outer).unwrap();
        face.holes.push(vec![
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(1.0, 3.0, 0.0),
            Point3::new(3.0, 3.0, 0.0),
            Point3::new(3.0, 1.0, 0.0),
        ]);

        let mut mesh = Mesh::new();
        face.tessellate_into(&mut mesh).unwrap();
        assert!(mesh.triangle_count() >= 8);

        // Total tessellated area equals outer minus hole
        let mut area = 0.0;
        for tri in 0..mesh.triangle_count() {
            let (a, b, c) = mesh.triangle(tri);
            area += (b - a).cross(&(c - a)).norm() * 0.5;
        }
        assert_relative_eq!(area, 12.0, epsilon = 1e-9);
    }

    #[test]
    fn test_mirrored_transform_keeps_volume_positive() {
        let cube = unit_cube_solid();
        let mut mirror = Matrix4::identity();
        mirror[(0, 0)] = -1.0;

        let mirrored = cube.transformed(&mirror).unwrap();
        assert_relative_eq!(mirrored.volume().unwrap(), 1.0, epsilon = 1e-9);
        assert_relative_eq!(mirrored.bounds().min.x, -1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_translation() {
        let cube = unit_cube_solid().translated(&Vector3::new(0.0, 0.0, 2.0));
        assert_relative_eq!(cube.bounds().min.z, 2.0, epsilon = 1e-9);
        assert_relative_eq!(cube.volume().unwrap(), 1.0, epsilon = 1e-9);
    }
}
