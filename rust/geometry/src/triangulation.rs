// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Planar polygon triangulation
//!
//! Thin wrapper around earcutr, with fast paths for triangles and quads.

use crate::error::{Error, Result};
use nalgebra::{Point2, Point3, Vector3};

/// Triangulate a simple polygon (no holes)
///
/// Returns triangle indices into the input points, winding following the
/// input ring.
pub fn triangulate_ring(points: &[Point2<f64>]) -> Result<Vec<usize>> {
    let n = points.len();
    if n < 3 {
        return Err(Error::Triangulation(format!(
            "need at least 3 points, got {n}"
        )));
    }
    if n == 3 {
        return Ok(vec![0, 1, 2]);
    }
    if n == 4 {
        return Ok(vec![0, 1, 2, 0, 2, 3]);
    }

    let mut vertices = Vec::with_capacity(n * 2);
    for p in points {
        vertices.push(p.x);
        vertices.push(p.y);
    }

    earcutr::earcut(&vertices, &[], 2).map_err(|e| Error::Triangulation(format!("{e:?}")))
}

/// Triangulate a polygon with holes
///
/// Returns triangle indices into the combined vertex array
/// (outer ring first, then each hole in order).
pub fn triangulate_with_holes(
    outer: &[Point2<f64>],
    holes: &[Vec<Point2<f64>>],
) -> Result<Vec<usize>> {
    if outer.len() < 3 {
        return Err(Error::Triangulation(
            "need at least 3 points in outer boundary".to_string(),
        ));
    }

    let valid_holes: Vec<&Vec<Point2<f64>>> = holes.iter().filter(|h| h.len() >= 3).collect();
    if valid_holes.is_empty() {
        return triangulate_ring(outer);
    }

    let total: usize = outer.len() + valid_holes.iter().map(|h| h.len()).sum::<usize>();
    let mut vertices = Vec::with_capacity(total * 2);
    for p in outer {
        vertices.push(p.x);
        vertices.push(p.y);
    }

    let mut hole_indices = Vec::with_capacity(valid_holes.len());
    for hole in valid_holes {
        hole_indices.push(vertices.len() / 2);
        for p in hole {
            vertices.push(p.x);
            vertices.push(p.y);
        }
    }

    earcutr::earcut(&vertices, &hole_indices, 2)
        .map_err(|e| Error::Triangulation(format!("{e:?}")))
}

/// Polygon normal via Newell's method, unnormalized
///
/// Robust against non-planar and concave rings; the caller normalizes.
pub fn newell_normal(points: &[Point3<f64>]) -> Vector3<f64> {
    let mut normal = Vector3::zeros();
    let n = points.len();
    for i in 0..n {
        let current = &points[i];
        let next = &points[(i + 1) % n];
        normal.x += (current.y - next.y) * (current.z + next.z);
        normal.y += (current.z - next.z) * (current.x + next.x);
        normal.z += (current.x - next.x) * (current.y + next.y);
    }
    normal
}

/// Stable in-plane basis for a normal: the reference axis least parallel
/// to the normal keeps the cross products well conditioned.
pub fn stable_basis(normal: &Vector3<f64>) -> (Vector3<f64>, Vector3<f64>) {
    let abs_x = normal.x.abs();
    let abs_y = normal.y.abs();
    let abs_z = normal.z.abs();

    let reference = if abs_x <= abs_y && abs_x <= abs_z {
        Vector3::x()
    } else if abs_y <= abs_z {
        Vector3::y()
    } else {
        Vector3::z()
    };

    let u = reference.cross(normal).normalize();
    let v = normal.cross(&u).normalize();
    (u, v)
}

/// Signed area of a 2-D ring; positive for counter-clockwise winding
pub fn signed_area(points: &[Point2<f64>]) -> f64 {
    let n = points.len();
    let mut area = 0.0;
    for i in 0..n {
        let a = &points[i];
        let b = &points[(i + 1) % n];
        area += a.x * b.y - b.x * a.y;
    }
    area * 0.5
}
