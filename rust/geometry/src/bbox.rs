// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Axis-aligned bounding boxes with analytic arc extrema
//!
//! Sampling curve endpoints alone clips the true extent of an arc: the
//! extremum per coordinate axis falls at `atan2(v_i, u_i) + k*pi`, which
//! is injected analytically for every such angle inside the trimmed range.

use crate::curve::{Arc, Curve, CurveLoop};
use crate::error::{Error, Result};
use crate::EPS;
use nalgebra::Point3;

/// Min/max corner pair in a given coordinate frame
///
/// Derived from its source geometry, never persisted independently.
#[derive(Debug, Clone, Copy)]
pub struct BoundingBox {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl BoundingBox {
    /// Inverted empty box; expanding with any point makes it valid
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x
    }

    #[inline]
    pub fn expand_point(&mut self, p: &Point3<f64>) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.min.z = self.min.z.min(p.z);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
        self.max.z = self.max.z.max(p.z);
    }

    pub fn expand_box(&mut self, other: &BoundingBox) {
        if !other.is_empty() {
            self.expand_point(&other.min);
            self.expand_point(&other.max);
        }
    }

    /// Tolerance-based containment
    pub fn contains_point(&self, p: &Point3<f64>) -> bool {
        p.x >= self.min.x - EPS
            && p.y >= self.min.y - EPS
            && p.z >= self.min.z - EPS
            && p.x <= self.max.x + EPS
            && p.y <= self.max.y + EPS
            && p.z <= self.max.z + EPS
    }

    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    /// Extent along each axis
    pub fn extent(&self) -> (f64, f64, f64) {
        (
            self.max.x - self.min.x,
            self.max.y - self.min.y,
            self.max.z - self.min.z,
        )
    }
}

/// Inject the analytic per-axis extrema of a trimmed arc
fn expand_arc_extrema(bounds: &mut BoundingBox, arc: &Arc) {
    let (start, end) = arc.range;
    for axis in 0..3 {
        let u = arc.x_dir[axis];
        let v = arc.y_dir[axis];
        if u.abs() < EPS && v.abs() < EPS {
            continue; // Arc does not move along this axis
        }
        // d/dt (u cos t + v sin t) = 0  =>  t = atan2(v, u) + k*pi
        let phase = v.atan2(u);
        let mut k = ((start - phase) / std::f64::consts::PI).floor();
        loop {
            let t = phase + k * std::f64::consts::PI;
            if t > end + EPS {
                break;
            }
            if t >= start - EPS {
                bounds.expand_point(&arc.point_at(t));
            }
            k += 1.0;
        }
    }
}

/// Bounding box of a single bounded curve
///
/// Endpoints are always included; arcs additionally get their analytic
/// axis-crossing extrema so the true bulge is never clipped.
pub fn curve_bounds(curve: &Curve) -> Result<BoundingBox> {
    let (start, end) = curve
        .domain()
        .ok_or_else(|| Error::InvalidProfile("unbounded curve has no bounding box".to_string()))?;

    let mut bounds = BoundingBox::empty();
    bounds.expand_point(&curve.point_at(start));
    bounds.expand_point(&curve.point_at(end));

    match curve {
        Curve::Arc(arc) => expand_arc_extrema(&mut bounds, arc),
        Curve::Polyline(poly) => {
            for p in &poly.points {
                bounds.expand_point(p);
            }
        }
        Curve::Line(_) => {}
    }

    Ok(bounds)
}

/// Bounding box of a closed-loop curve set
pub fn loop_bounds(curve_loop: &CurveLoop) -> Result<BoundingBox> {
    let mut bounds = BoundingBox::empty();
    for curve in curve_loop.curves() {
        bounds.expand_box(&curve_bounds(curve)?);
    }
    Ok(bounds)
}

/// Bounding box of a raw point set
pub fn points_bounds(points: &[Point3<f64>]) -> BoundingBox {
    let mut bounds = BoundingBox::empty();
    for p in points {
        bounds.expand_point(p);
    }
    bounds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::Line;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    #[test]
    fn test_quarter_arc_includes_bulge() {
        // Quarter arc from (2,0) to (0,2): endpoint sampling alone would
        // miss nothing here, but trim to a range straddling t=0 and the
        // x extremum at t=0 must be injected.
        let arc = Arc::new(
            Point3::origin(),
            2.0,
            Vector3::x(),
            Vector3::y(),
            (-std::f64::consts::FRAC_PI_4, std::f64::consts::FRAC_PI_4),
        )
        .unwrap();
        let bounds = curve_bounds(&Curve::Arc(arc)).unwrap();

        // Max x is the full radius at t=0, not the chord endpoints
        assert_relative_eq!(bounds.max.x, 2.0, epsilon = 1e-9);
        assert_relative_eq!(bounds.min.y, -(2.0f64.sqrt()), epsilon = 1e-9);
        assert_relative_eq!(bounds.max.y, 2.0f64.sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn test_arc_bounds_contain_all_samples() {
        // Superset property: the analytic box contains every tessellated
        // sample of the arc restricted to its range.
        let arc = Arc::new(
            Point3::new(1.0, -2.0, 0.5),
            3.7,
            Vector3::new(1.0, 0.3, 0.0),
            Vector3::new(0.0, 1.0, 0.4),
            (0.7, 5.1),
        )
        .unwrap();
        let curve = Curve::Arc(arc.clone());
        let bounds = curve_bounds(&curve).unwrap();

        for i in 0..=500 {
            let t = 0.7 + (5.1 - 0.7) * i as f64 / 500.0;
            assert!(bounds.contains_point(&arc.point_at(t)), "sample at t={t} escapes box");
        }
    }

    #[test]
    fn test_full_circle_bounds() {
        let arc = Arc::circle(Point3::origin(), 1.5, Vector3::x(), Vector3::y()).unwrap();
        let bounds = curve_bounds(&Curve::Arc(arc)).unwrap();
        assert_relative_eq!(bounds.min.x, -1.5, epsilon = 1e-9);
        assert_relative_eq!(bounds.max.y, 1.5, epsilon = 1e-9);
    }

    #[test]
    fn test_unbounded_line_rejected() {
        let line = Curve::Line(Line::new(Point3::origin(), Vector3::x()).unwrap());
        assert!(curve_bounds(&line).is_err());
    }

    #[test]
    fn test_loop_bounds_union() {
        let p0 = Point3::new(0.0, 0.0, 0.0);
        let p1 = Point3::new(4.0, 0.0, 0.0);
        let p2 = Point3::new(0.0, 3.0, 0.0);
        let looped = CurveLoop::new(vec![
            Curve::Line(Line::between(p0, p1).unwrap()),
            Curve::Line(Line::between(p1, p2).unwrap()),
            Curve::Line(Line::between(p2, p0).unwrap()),
        ])
        .unwrap();

        let bounds = loop_bounds(&looped).unwrap();
        assert_relative_eq!(bounds.max.x, 4.0, epsilon = 1e-9);
        assert_relative_eq!(bounds.max.y, 3.0, epsilon = 1e-9);
        assert_relative_eq!(bounds.min.x, 0.0, epsilon = 1e-9);
    }
}
