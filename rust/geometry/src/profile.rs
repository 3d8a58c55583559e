// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Planes and planar profiles
//!
//! A profile is a set of closed loops (outer boundary plus holes) living
//! on a plane; the swept/extruded builders consume these.

use crate::error::{Error, Result};
use crate::triangulation::{newell_normal, signed_area, stable_basis, triangulate_with_holes};
use crate::EPS;
use nalgebra::{Matrix4, Point2, Point3, Vector2, Vector3};

/// Plane with origin and orthonormal in-plane basis
///
/// The implied normal is `u × v`.
#[derive(Debug, Clone)]
pub struct Plane {
    pub origin: Point3<f64>,
    pub u: Vector3<f64>,
    pub v: Vector3<f64>,
}

impl Plane {
    /// Create a plane, re-orthonormalizing `v` against `u`
    pub fn new(origin: Point3<f64>, u: Vector3<f64>, v: Vector3<f64>) -> Result<Self> {
        let u = u
            .try_normalize(EPS)
            .ok_or_else(|| Error::InvalidProfile("plane u axis is zero-length".to_string()))?;
        let v_raw = v - u * v.dot(&u);
        let v = v_raw
            .try_normalize(EPS)
            .ok_or_else(|| Error::InvalidProfile("plane axes are parallel".to_string()))?;
        Ok(Self { origin, u, v })
    }

    /// Create a plane from origin and normal with a stable derived basis
    pub fn from_normal(origin: Point3<f64>, normal: Vector3<f64>) -> Result<Self> {
        let normal = normal
            .try_normalize(EPS)
            .ok_or_else(|| Error::InvalidProfile("plane normal is zero-length".to_string()))?;
        let (u, v) = stable_basis(&normal);
        Ok(Self { origin, u, v })
    }

    /// Fit a plane through a roughly planar 3-D ring (Newell's method)
    pub fn fit(points: &[Point3<f64>]) -> Result<Self> {
        if points.len() < 3 {
            return Err(Error::InvalidProfile(format!(
                "cannot fit a plane through {} points",
                points.len()
            )));
        }
        Self::from_normal(points[0], newell_normal(points))
    }

    /// Implied plane normal
    #[inline]
    pub fn normal(&self) -> Vector3<f64> {
        self.u.cross(&self.v)
    }

    /// Project a 3-D point into plane coordinates
    #[inline]
    pub fn project(&self, p: &Point3<f64>) -> Point2<f64> {
        let d = p - self.origin;
        Point2::new(d.dot(&self.u), d.dot(&self.v))
    }

    /// Lift plane coordinates back to 3-D
    #[inline]
    pub fn lift(&self, p: &Point2<f64>) -> Point3<f64> {
        self.origin + self.u * p.x + self.v * p.y
    }

    /// Signed distance of a point from the plane
    #[inline]
    pub fn signed_distance(&self, p: &Point3<f64>) -> f64 {
        (p - self.origin).dot(&self.normal())
    }

    /// Apply an affine transform
    pub fn transformed(&self, m: &Matrix4<f64>) -> Result<Self> {
        Self::new(
            m.transform_point(&self.origin),
            m.transform_vector(&self.u),
            m.transform_vector(&self.v),
        )
    }

    /// Shift the plane origin by in-plane coordinates
    pub fn offset_in_plane(&self, offset: Vector2<f64>) -> Self {
        Self {
            origin: self.origin + self.u * offset.x + self.v * offset.y,
            u: self.u,
            v: self.v,
        }
    }
}

/// Triangulated profile result
#[derive(Debug, Clone)]
pub struct Triangulation {
    /// All vertices (outer + holes), in plane coordinates
    pub points: Vec<Point2<f64>>,
    /// Triangle indices
    pub indices: Vec<usize>,
}

/// Planar profile with optional holes
///
/// The outer loop winds counter-clockwise in the plane basis; holes wind
/// clockwise.
#[derive(Debug, Clone)]
pub struct Profile {
    pub plane: Plane,
    pub outer: Vec<Point2<f64>>,
    pub holes: Vec<Vec<Point2<f64>>>,
}

impl Profile {
    /// Create a profile, normalizing the outer winding to counter-clockwise
    pub fn new(plane: Plane, mut outer: Vec<Point2<f64>>) -> Result<Self> {
        strip_wrap_point(&mut outer);
        if outer.len() < 3 {
            return Err(Error::InvalidProfile(format!(
                "profile needs at least 3 vertices, got {}",
                outer.len()
            )));
        }
        if signed_area(&outer).abs() < EPS * EPS {
            return Err(Error::InvalidProfile("profile has zero area".to_string()));
        }
        if signed_area(&outer) < 0.0 {
            outer.reverse();
        }
        Ok(Self {
            plane,
            outer,
            holes: Vec::new(),
        })
    }

    /// Build a profile from a roughly planar 3-D ring, fitting the plane
    pub fn from_points(points: &[Point3<f64>]) -> Result<Self> {
        let plane = Plane::fit(points)?;
        let projected = points.iter().map(|p| plane.project(p)).collect();
        Self::new(plane, projected)
    }

    /// Add a hole, normalizing its winding to clockwise
    pub fn add_hole(&mut self, mut hole: Vec<Point2<f64>>) {
        strip_wrap_point(&mut hole);
        if hole.len() < 3 {
            return;
        }
        if signed_area(&hole) > 0.0 {
            hole.reverse();
        }
        self.holes.push(hole);
    }

    /// Triangulate the profile (outer + holes)
    pub fn triangulate(&self) -> Result<Triangulation> {
        let indices = triangulate_with_holes(&self.outer, &self.holes)?;
        let mut points = Vec::with_capacity(
            self.outer.len() + self.holes.iter().map(|h| h.len()).sum::<usize>(),
        );
        points.extend_from_slice(&self.outer);
        for hole in &self.holes {
            points.extend_from_slice(hole);
        }
        Ok(Triangulation { points, indices })
    }

    /// 2-D bounds in plane coordinates
    pub fn bounds_2d(&self) -> (Point2<f64>, Point2<f64>) {
        let mut min = Point2::new(f64::INFINITY, f64::INFINITY);
        let mut max = Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
        for p in self.outer.iter().chain(self.holes.iter().flatten()) {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }
        (min, max)
    }

    /// Profile area (outer minus holes)
    pub fn area(&self) -> f64 {
        let outer = signed_area(&self.outer).abs();
        let holes: f64 = self.holes.iter().map(|h| signed_area(h).abs()).sum();
        outer - holes
    }

    /// Lift the outer loop back to 3-D
    pub fn lift_outer(&self) -> Vec<Point3<f64>> {
        self.outer.iter().map(|p| self.plane.lift(p)).collect()
    }

    /// Rigid 3-D translation of the whole profile
    pub fn translated(&self, offset: &Vector3<f64>) -> Profile {
        Profile {
            plane: Plane {
                origin: self.plane.origin + offset,
                u: self.plane.u,
                v: self.plane.v,
            },
            outer: self.outer.clone(),
            holes: self.holes.clone(),
        }
    }

    /// Re-origin to a canonical local frame with the bounds minimum at
    /// the plane origin; returns the in-plane offset that was removed.
    pub fn reoriginated(&self) -> (Profile, Vector2<f64>) {
        let (min, _) = self.bounds_2d();
        let offset = Vector2::new(min.x, min.y);
        let shift = |p: &Point2<f64>| Point2::new(p.x - offset.x, p.y - offset.y);
        let profile = Profile {
            plane: self.plane.offset_in_plane(offset),
            outer: self.outer.iter().map(shift).collect(),
            holes: self
                .holes
                .iter()
                .map(|h| h.iter().map(shift).collect())
                .collect(),
        };
        (profile, offset)
    }
}

/// Drop an explicit closing vertex so rings never carry the wrap twice
fn strip_wrap_point(ring: &mut Vec<Point2<f64>>) {
    if ring.len() > 1 {
        let first = ring[0];
        let last = ring[ring.len() - 1];
        if (last - first).norm() < EPS {
            ring.pop();
        }
    }
}

/// Rectangular profile centered on the XY-plane origin
pub fn create_rectangle(width: f64, height: f64) -> Result<Profile> {
    let half_w = width / 2.0;
    let half_h = height / 2.0;
    Profile::new(
        Plane::new(Point3::origin(), Vector3::x(), Vector3::y())?,
        vec![
            Point2::new(-half_w, -half_h),
            Point2::new(half_w, -half_h),
            Point2::new(half_w, half_h),
            Point2::new(-half_w, half_h),
        ],
    )
}

/// Circular profile centered on the XY-plane origin, with optional hole
pub fn create_circle(radius: f64, hole_radius: Option<f64>) -> Result<Profile> {
    let ring = |r: f64| {
        let segments = crate::curve::segments_for_radius(r);
        (0..segments)
            .map(|i| {
                let angle = 2.0 * std::f64::consts::PI * i as f64 / segments as f64;
                Point2::new(r * angle.cos(), r * angle.sin())
            })
            .collect::<Vec<_>>()
    };

    let mut profile = Profile::new(
        Plane::new(Point3::origin(), Vector3::x(), Vector3::y())?,
        ring(radius),
    )?;
    if let Some(hole_r) = hole_radius {
        profile.add_hole(ring(hole_r));
    }
    Ok(profile)
}
