// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Triangle shell data structure
//!
//! The kernel-side tessellation of a solid boundary. Positions stay in
//! f64: this shell feeds boolean operations and validity checks, not a
//! renderer.

use crate::bbox::BoundingBox;
use nalgebra::{Matrix4, Point3, Vector3};

/// Triangle mesh with flat position storage
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    /// Vertex positions (x, y, z)
    pub positions: Vec<f64>,
    /// Triangle indices (i0, i1, i2)
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Create a new empty mesh
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mesh with capacity
    pub fn with_capacity(vertex_count: usize, index_count: usize) -> Self {
        Self {
            positions: Vec::with_capacity(vertex_count * 3),
            indices: Vec::with_capacity(index_count),
        }
    }

    /// Add a vertex, returning its index
    #[inline]
    pub fn add_vertex(&mut self, position: Point3<f64>) -> u32 {
        let index = self.vertex_count() as u32;
        self.positions.push(position.x);
        self.positions.push(position.y);
        self.positions.push(position.z);
        index
    }

    /// Add a triangle
    #[inline]
    pub fn add_triangle(&mut self, i0: u32, i1: u32, i2: u32) {
        self.indices.push(i0);
        self.indices.push(i1);
        self.indices.push(i2);
    }

    /// Get a vertex position
    #[inline]
    pub fn vertex(&self, index: u32) -> Point3<f64> {
        let i = index as usize * 3;
        Point3::new(self.positions[i], self.positions[i + 1], self.positions[i + 2])
    }

    /// Corner positions of a triangle
    #[inline]
    pub fn triangle(&self, tri: usize) -> (Point3<f64>, Point3<f64>, Point3<f64>) {
        let i = tri * 3;
        (
            self.vertex(self.indices[i]),
            self.vertex(self.indices[i + 1]),
            self.vertex(self.indices[i + 2]),
        )
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Merge another mesh into this one
    pub fn merge(&mut self, other: &Mesh) {
        if other.is_empty() {
            return;
        }
        let vertex_offset = self.vertex_count() as u32;
        self.positions.reserve(other.positions.len());
        self.indices.reserve(other.indices.len());
        self.positions.extend_from_slice(&other.positions);
        self.indices
            .extend(other.indices.iter().map(|&i| i + vertex_offset));
    }

    /// Bounding box over all vertices
    pub fn bounds(&self) -> BoundingBox {
        let mut bounds = BoundingBox::empty();
        self.positions.chunks_exact(3).for_each(|chunk| {
            bounds.expand_point(&Point3::new(chunk[0], chunk[1], chunk[2]));
        });
        bounds
    }

    /// Signed volume via the divergence theorem
    ///
    /// Positive for a closed shell with outward-facing triangles.
    pub fn signed_volume(&self) -> f64 {
        let mut volume = 0.0;
        for tri in 0..self.triangle_count() {
            let (a, b, c) = self.triangle(tri);
            let a = a.coords;
            let b = b.coords;
            let c = c.coords;
            volume += a.dot(&b.cross(&c));
        }
        volume / 6.0
    }

    /// Whether every coordinate is finite
    pub fn is_finite(&self) -> bool {
        self.positions.iter().all(|v| v.is_finite())
    }

    /// Apply an affine transform in place
    pub fn apply_transform(&mut self, transform: &Matrix4<f64>) {
        self.positions.chunks_exact_mut(3).for_each(|chunk| {
            let p = transform.transform_point(&Point3::new(chunk[0], chunk[1], chunk[2]));
            chunk[0] = p.x;
            chunk[1] = p.y;
            chunk[2] = p.z;
        });
    }

    /// Translate in place
    pub fn translate(&mut self, offset: &Vector3<f64>) {
        self.positions.chunks_exact_mut(3).for_each(|chunk| {
            chunk[0] += offset.x;
            chunk[1] += offset.y;
            chunk[2] += offset.z;
        });
    }

    /// Clear all geometry, keeping allocations
    pub fn clear(&mut self) {
        self.positions.clear();
        self.indices.clear();
    }
}
