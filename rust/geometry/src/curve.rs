// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Curve primitives - lines, arcs, polylines
//!
//! A closed tagged variant: the subtype set is fixed by the schema version
//! in use, so dispatch is a pattern match. Trimming never mutates the
//! original curve.

use crate::error::{Error, Result};
use crate::EPS;
use nalgebra::{Matrix4, Point3, Vector3};
use smallvec::SmallVec;

/// Tolerance-based point coincidence. Coordinates are never compared
/// with `==` anywhere in the kernel.
#[inline]
pub fn same_point(a: &Point3<f64>, b: &Point3<f64>) -> bool {
    (b - a).norm() < EPS
}

/// Whether a transform encodes a reflection (mirrored basis)
///
/// Downstream orientation logic (face normals, sweep direction) depends on
/// this, so it is tracked explicitly rather than inferred later.
#[inline]
pub fn is_mirrored(transform: &Matrix4<f64>) -> bool {
    transform.fixed_view::<3, 3>(0, 0).clone_owned().determinant() < 0.0
}

/// Straight line, parameterized by arc length from its origin
///
/// `range` is `None` for an unbounded (infinite) line.
#[derive(Debug, Clone)]
pub struct Line {
    pub origin: Point3<f64>,
    /// Unit direction
    pub direction: Vector3<f64>,
    pub range: Option<(f64, f64)>,
}

impl Line {
    /// Create an unbounded line
    pub fn new(origin: Point3<f64>, direction: Vector3<f64>) -> Result<Self> {
        let direction = direction
            .try_normalize(EPS)
            .ok_or_else(|| Error::InvalidProfile("line direction is zero-length".to_string()))?;
        Ok(Self {
            origin,
            direction,
            range: None,
        })
    }

    /// Create a bounded segment between two parameters
    pub fn bounded(origin: Point3<f64>, direction: Vector3<f64>, start: f64, end: f64) -> Result<Self> {
        if end - start < EPS {
            return Err(Error::InvalidProfile(format!(
                "degenerate line range [{start}, {end}]"
            )));
        }
        let mut line = Self::new(origin, direction)?;
        line.range = Some((start, end));
        Ok(line)
    }

    /// Segment between two points, parameter range `[0, |b-a|]`
    pub fn between(a: Point3<f64>, b: Point3<f64>) -> Result<Self> {
        let length = (b - a).norm();
        Self::bounded(a, b - a, 0.0, length)
    }

    #[inline]
    pub fn point_at(&self, t: f64) -> Point3<f64> {
        self.origin + self.direction * t
    }
}

/// Circular arc on the plane spanned by `x_dir`/`y_dir`
///
/// `point(t) = center + radius * (cos(t) * x_dir + sin(t) * y_dir)`,
/// with `t` in radians over `range`. The arc normal is `x_dir × y_dir`.
#[derive(Debug, Clone)]
pub struct Arc {
    pub center: Point3<f64>,
    pub radius: f64,
    /// Unit vector toward the `t = 0` point
    pub x_dir: Vector3<f64>,
    /// Unit vector toward the `t = pi/2` point, orthogonal to `x_dir`
    pub y_dir: Vector3<f64>,
    pub range: (f64, f64),
}

impl Arc {
    pub fn new(
        center: Point3<f64>,
        radius: f64,
        x_dir: Vector3<f64>,
        y_dir: Vector3<f64>,
        range: (f64, f64),
    ) -> Result<Self> {
        if !radius.is_finite() || radius < EPS {
            return Err(Error::InvalidProfile(format!("degenerate arc radius {radius}")));
        }
        if range.1 - range.0 < EPS {
            return Err(Error::InvalidProfile(format!(
                "degenerate arc range [{}, {}]",
                range.0, range.1
            )));
        }
        let x_dir = x_dir
            .try_normalize(EPS)
            .ok_or_else(|| Error::InvalidProfile("arc x axis is zero-length".to_string()))?;
        // Re-orthogonalize Y against X so a slightly skewed basis from the
        // entity graph cannot shear the arc.
        let y_raw = y_dir - x_dir * y_dir.dot(&x_dir);
        let y_dir = y_raw
            .try_normalize(EPS)
            .ok_or_else(|| Error::InvalidProfile("arc axes are parallel".to_string()))?;
        Ok(Self {
            center,
            radius,
            x_dir,
            y_dir,
            range,
        })
    }

    /// Full circle in the given basis
    pub fn circle(
        center: Point3<f64>,
        radius: f64,
        x_dir: Vector3<f64>,
        y_dir: Vector3<f64>,
    ) -> Result<Self> {
        Self::new(center, radius, x_dir, y_dir, (0.0, 2.0 * std::f64::consts::PI))
    }

    /// Plane normal of the arc
    #[inline]
    pub fn normal(&self) -> Vector3<f64> {
        self.x_dir.cross(&self.y_dir)
    }

    #[inline]
    pub fn point_at(&self, t: f64) -> Point3<f64> {
        self.center + (self.x_dir * t.cos() + self.y_dir * t.sin()) * self.radius
    }

    /// Swept angle of the trimmed range
    #[inline]
    pub fn sweep(&self) -> f64 {
        self.range.1 - self.range.0
    }

    /// Tessellation segment count, by radius and swept angle
    pub fn segment_count(&self) -> usize {
        let full = segments_for_radius(self.radius);
        let fraction = self.sweep() / (2.0 * std::f64::consts::PI);
        ((full as f64 * fraction).ceil() as usize).max(2)
    }
}

/// Adaptive number of segments for a full circle of the given radius
#[inline]
pub fn segments_for_radius(radius: f64) -> usize {
    let segments = (radius.abs().sqrt() * 16.0).ceil() as usize;
    segments.clamp(12, 64)
}

/// Polyline through a point sequence, parameterized by segment index
#[derive(Debug, Clone)]
pub struct Polyline {
    pub points: Vec<Point3<f64>>,
}

impl Polyline {
    pub fn new(points: Vec<Point3<f64>>) -> Result<Self> {
        if points.len() < 2 {
            return Err(Error::InvalidProfile(format!(
                "polyline needs at least 2 points, got {}",
                points.len()
            )));
        }
        Ok(Self { points })
    }

    pub fn point_at(&self, t: f64) -> Point3<f64> {
        let last = (self.points.len() - 1) as f64;
        let t = t.clamp(0.0, last);
        let i = (t.floor() as usize).min(self.points.len() - 2);
        let frac = t - i as f64;
        let a = self.points[i];
        let b = self.points[i + 1];
        a + (b - a) * frac
    }
}

/// Polymorphic curve
#[derive(Debug, Clone)]
pub enum Curve {
    Line(Line),
    Arc(Arc),
    Polyline(Polyline),
}

impl Curve {
    /// Whether the curve has a finite parameter domain
    pub fn is_bounded(&self) -> bool {
        match self {
            Self::Line(line) => line.range.is_some(),
            Self::Arc(_) | Self::Polyline(_) => true,
        }
    }

    /// Parameter domain, `None` for an unbounded line
    pub fn domain(&self) -> Option<(f64, f64)> {
        match self {
            Self::Line(line) => line.range,
            Self::Arc(arc) => Some(arc.range),
            Self::Polyline(poly) => Some((0.0, (poly.points.len() - 1) as f64)),
        }
    }

    /// Evaluate the curve at a parameter
    pub fn point_at(&self, t: f64) -> Point3<f64> {
        match self {
            Self::Line(line) => line.point_at(t),
            Self::Arc(arc) => arc.point_at(t),
            Self::Polyline(poly) => poly.point_at(t),
        }
    }

    /// Start point, `None` for an unbounded line
    pub fn start_point(&self) -> Option<Point3<f64>> {
        self.domain().map(|(s, _)| self.point_at(s))
    }

    /// End point, `None` for an unbounded line
    pub fn end_point(&self) -> Option<Point3<f64>> {
        self.domain().map(|(_, e)| self.point_at(e))
    }

    /// Produce the sub-curve over `[start, end]` without mutating `self`
    ///
    /// For bounded curves the range is clamped into the existing domain.
    pub fn trim(&self, start: f64, end: f64) -> Result<Curve> {
        if end - start < EPS {
            return Err(Error::InvalidProfile(format!(
                "degenerate trim range [{start}, {end}]"
            )));
        }
        match self {
            Self::Line(line) => {
                let (start, end) = match line.range {
                    Some((s, e)) => (start.max(s), end.min(e)),
                    None => (start, end),
                };
                Ok(Self::Line(Line::bounded(line.origin, line.direction, start, end)?))
            }
            Self::Arc(arc) => {
                let start = start.max(arc.range.0);
                let end = end.min(arc.range.1);
                Ok(Self::Arc(Arc::new(
                    arc.center,
                    arc.radius,
                    arc.x_dir,
                    arc.y_dir,
                    (start, end),
                )?))
            }
            Self::Polyline(poly) => {
                let last = (poly.points.len() - 1) as f64;
                let start = start.max(0.0);
                let end = end.min(last);
                if end - start < EPS {
                    return Err(Error::InvalidProfile(
                        "trim range lies outside polyline domain".to_string(),
                    ));
                }
                let mut points = vec![poly.point_at(start)];
                let mut i = start.floor() as usize + 1;
                while (i as f64) < end {
                    points.push(poly.points[i]);
                    i += 1;
                }
                points.push(poly.point_at(end));
                Ok(Self::Polyline(Polyline::new(points)?))
            }
        }
    }

    /// Tessellate into points, endpoints included
    pub fn tessellate(&self) -> Result<Vec<Point3<f64>>> {
        let (s, e) = self
            .domain()
            .ok_or_else(|| Error::InvalidProfile("cannot tessellate an unbounded line".to_string()))?;
        match self {
            Self::Line(line) => Ok(vec![line.point_at(s), line.point_at(e)]),
            Self::Arc(arc) => {
                let count = arc.segment_count();
                let mut points = Vec::with_capacity(count + 1);
                for i in 0..=count {
                    let t = s + (e - s) * i as f64 / count as f64;
                    points.push(arc.point_at(t));
                }
                Ok(points)
            }
            Self::Polyline(poly) => Ok(poly.points.clone()),
        }
    }

    /// Apply an affine transform, returning a new curve
    ///
    /// Parameter ranges are rescaled where the transform changes arc
    /// length (uniform scale); mirrored transforms flip arc orientation
    /// through the transformed basis vectors.
    pub fn transformed(&self, m: &Matrix4<f64>) -> Result<Curve> {
        match self {
            Self::Line(line) => {
                let origin = m.transform_point(&line.origin);
                let dir_scaled = m.transform_vector(&line.direction);
                let scale = dir_scaled.norm();
                if scale < EPS {
                    return Err(Error::InvalidProfile(
                        "transform collapses line direction".to_string(),
                    ));
                }
                let range = line.range.map(|(s, e)| (s * scale, e * scale));
                let mut out = Line::new(origin, dir_scaled)?;
                out.range = range;
                Ok(Self::Line(out))
            }
            Self::Arc(arc) => {
                let center = m.transform_point(&arc.center);
                let x_scaled = m.transform_vector(&arc.x_dir);
                let y_scaled = m.transform_vector(&arc.y_dir);
                let radius = arc.radius * x_scaled.norm();
                Ok(Self::Arc(Arc::new(center, radius, x_scaled, y_scaled, arc.range)?))
            }
            Self::Polyline(poly) => {
                let points = poly.points.iter().map(|p| m.transform_point(p)).collect();
                Ok(Self::Polyline(Polyline::new(points)?))
            }
        }
    }
}

/// Ordered sequence of curves, end-to-end continuous
///
/// Closed when the last endpoint coincides with the first start point.
/// Invariant: at least 2 segments open, 3 closed.
#[derive(Debug, Clone)]
pub struct CurveLoop {
    curves: SmallVec<[Curve; 4]>,
}

impl CurveLoop {
    /// Build a loop, validating continuity and minimum segment counts
    pub fn new(curves: Vec<Curve>) -> Result<Self> {
        for curve in &curves {
            if !curve.is_bounded() {
                return Err(Error::InvalidProfile(
                    "loop contains an unbounded curve".to_string(),
                ));
            }
        }
        for pair in curves.windows(2) {
            if let (Some(end), Some(start)) = (pair[0].end_point(), pair[1].start_point()) {
                if !same_point(&end, &start) {
                    return Err(Error::InvalidProfile(format!(
                        "loop is discontinuous: gap of {:.6}",
                        (start - end).norm()
                    )));
                }
            }
        }
        let result = Self {
            curves: SmallVec::from_vec(curves),
        };
        let min = if result.is_closed() { 3 } else { 2 };
        if result.curves.len() < min {
            return Err(Error::InvalidProfile(format!(
                "loop has {} segments, needs at least {min}",
                result.curves.len()
            )));
        }
        Ok(result)
    }

    pub fn curves(&self) -> &[Curve] {
        &self.curves
    }

    /// Whether the loop closes back on its first point (within tolerance)
    pub fn is_closed(&self) -> bool {
        let start = self.curves.first().and_then(|c| c.start_point());
        let end = self.curves.last().and_then(|c| c.end_point());
        match (start, end) {
            (Some(start), Some(end)) => same_point(&start, &end),
            _ => false,
        }
    }

    /// Tessellate the whole loop, deduplicating the shared joints
    pub fn tessellate(&self) -> Result<Vec<Point3<f64>>> {
        let mut points: Vec<Point3<f64>> = Vec::new();
        for curve in &self.curves {
            let segment = curve.tessellate()?;
            for p in segment {
                if points.last().map(|last| same_point(last, &p)) != Some(true) {
                    points.push(p);
                }
            }
        }
        // Drop the explicit wrap point for closed loops
        if points.len() > 1 && same_point(&points[0], &points[points.len() - 1]) {
            points.pop();
        }
        Ok(points)
    }

    /// Apply an affine transform to every segment
    pub fn transformed(&self, m: &Matrix4<f64>) -> Result<CurveLoop> {
        let curves = self
            .curves
            .iter()
            .map(|c| c.transformed(m))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            curves: SmallVec::from_vec(curves),
        })
    }
}
