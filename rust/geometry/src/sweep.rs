// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Swept/extruded profile builder
//!
//! Builds solids from planar profiles: straight extrusion, sweeping along
//! a directrix curve, and the host-cut variants used for door/window
//! openings (straight and arced hosts). Analysis failures are plain
//! errors here; callers convert them to "no result, fall back".

use crate::curve::Curve;
use crate::error::{Error, Result};
use crate::profile::{Plane, Profile};
use crate::solid::{Face, Solid};
use crate::triangulation::stable_basis;
use crate::EPS;
use nalgebra::{Point2, Point3, Rotation3, Vector3};

/// Extrude a planar profile along a direction by a distance
///
/// The direction need not equal the profile normal (oblique extrusions
/// are fine) but must not be orthogonal to it.
pub fn extrude_profile(profile: &Profile, direction: Vector3<f64>, distance: f64) -> Result<Solid> {
    if !(distance > EPS) {
        return Err(Error::InvalidSweep(format!(
            "extrusion distance must be positive, got {distance}"
        )));
    }
    let dir = direction
        .try_normalize(EPS)
        .ok_or_else(|| Error::InvalidSweep("extrusion direction is zero-length".to_string()))?;

    let normal = profile.plane.normal();
    let along = dir.dot(&normal);
    if along.abs() < EPS {
        return Err(Error::InvalidSweep(
            "extrusion direction orthogonal to profile normal".to_string(),
        ));
    }

    let offset = dir * distance;
    // When the direction runs against the profile normal the cap roles
    // swap, and every ring flips to keep normals outward.
    let flip = along < 0.0;

    let mut faces = Vec::with_capacity(profile.outer.len() + 2);

    faces.push(cap_face(profile, Vector3::zeros(), !flip)?);
    faces.push(cap_face(profile, offset, flip)?);

    side_faces(&profile.outer, &profile.plane, offset, flip, &mut faces)?;
    for hole in &profile.holes {
        side_faces(hole, &profile.plane, offset, flip, &mut faces)?;
    }

    Ok(Solid::new(faces))
}

/// Build one cap of an extrusion
///
/// `reversed` selects the cap whose outward normal opposes the profile
/// normal (rings reversed, basis swapped).
fn cap_face(profile: &Profile, offset: Vector3<f64>, reversed: bool) -> Result<Face> {
    let base = &profile.plane;
    let plane = if reversed {
        Plane::new(base.origin + offset, base.v, base.u)?
    } else {
        Plane::new(base.origin + offset, base.u, base.v)?
    };

    let lift_ring = |ring: &[Point2<f64>]| -> Vec<Point3<f64>> {
        let mut out: Vec<_> = ring.iter().map(|p| base.lift(p) + offset).collect();
        if reversed {
            out.reverse();
        }
        out
    };

    let mut face = Face::new(plane, lift_ring(&profile.outer))?;
    face.holes = profile.holes.iter().map(|h| lift_ring(h)).collect();
    Ok(face)
}

/// Side wall quads for one profile ring
fn side_faces(
    ring: &[Point2<f64>],
    plane: &Plane,
    offset: Vector3<f64>,
    flip: bool,
    faces: &mut Vec<Face>,
) -> Result<()> {
    for i in 0..ring.len() {
        let j = (i + 1) % ring.len();
        let p0 = plane.lift(&ring[i]);
        let p1 = plane.lift(&ring[j]);
        if (p1 - p0).norm() < EPS {
            continue; // Degenerate edge survives only in unsanitized input
        }
        let quad = if flip {
            vec![p1, p0, p0 + offset, p1 + offset]
        } else {
            vec![p0, p1, p1 + offset, p0 + offset]
        };
        faces.push(Face::from_ring(quad)?);
    }
    Ok(())
}

/// Sweep a planar profile along a directrix curve
///
/// The profile's 2-D coordinates ride a frame that is parallel-transported
/// along the tessellated path, which keeps rings from twisting against
/// each other. Side walls are emitted as triangles since swept quads are
/// generally non-planar.
pub fn sweep_profile_along_curve(profile: &Profile, directrix: &Curve) -> Result<Solid> {
    let path = directrix.tessellate()?;
    if path.len() < 2 {
        return Err(Error::InvalidSweep(
            "directrix tessellates to fewer than 2 points".to_string(),
        ));
    }

    // Tangents: forward/backward at the ends, central elsewhere
    let mut tangents = Vec::with_capacity(path.len());
    for i in 0..path.len() {
        let raw = if i == 0 {
            path[1] - path[0]
        } else if i == path.len() - 1 {
            path[i] - path[i - 1]
        } else {
            path[i + 1] - path[i - 1]
        };
        let tangent = raw
            .try_normalize(EPS)
            .ok_or_else(|| Error::InvalidSweep("directrix has a zero-length segment".to_string()))?;
        tangents.push(tangent);
    }

    // Parallel-transported frames
    let (u0, v0) = stable_basis(&tangents[0]);
    let mut frames = Vec::with_capacity(path.len());
    frames.push((u0, v0));
    for i in 1..path.len() {
        let (u_prev, v_prev) = frames[i - 1];
        let (u, v) = match Rotation3::rotation_between(&tangents[i - 1], &tangents[i]) {
            Some(rotation) => (rotation * u_prev, rotation * v_prev),
            None => (u_prev, v_prev),
        };
        frames.push((u, v));
    }

    let ring_at = |i: usize, ring_2d: &[Point2<f64>]| -> Vec<Point3<f64>> {
        let (u, v) = frames[i];
        ring_2d
            .iter()
            .map(|p| path[i] + u * p.x + v * p.y)
            .collect::<Vec<_>>()
    };

    let mut faces = Vec::new();

    // End caps: start cap faces backward along the path
    faces.push(swept_cap(profile, &path[0], &frames[0], true)?);
    faces.push(swept_cap(profile, &path[path.len() - 1], &frames[path.len() - 1], false)?);

    // Side walls for the outer ring and every hole ring
    let mut rings: Vec<&[Point2<f64>]> = vec![profile.outer.as_slice()];
    rings.extend(profile.holes.iter().map(|h| h.as_slice()));

    for ring_2d in rings {
        let mut prev = ring_at(0, ring_2d);
        for i in 1..path.len() {
            let next = ring_at(i, ring_2d);
            for a in 0..ring_2d.len() {
                let b = (a + 1) % ring_2d.len();
                if (prev[b] - prev[a]).norm() < EPS {
                    continue;
                }
                faces.push(Face::from_ring(vec![prev[a], prev[b], next[b]])?);
                faces.push(Face::from_ring(vec![prev[a], next[b], next[a]])?);
            }
            prev = next;
        }
    }

    Ok(Solid::new(faces))
}

/// End cap of a swept solid, in the frame at one end of the path
fn swept_cap(
    profile: &Profile,
    origin: &Point3<f64>,
    frame: &(Vector3<f64>, Vector3<f64>),
    reversed: bool,
) -> Result<Face> {
    let (u, v) = *frame;
    let plane = if reversed {
        Plane::new(*origin, v, u)?
    } else {
        Plane::new(*origin, u, v)?
    };

    let lift_ring = |ring: &[Point2<f64>]| -> Vec<Point3<f64>> {
        let mut out: Vec<_> = ring.iter().map(|p| origin + u * p.x + v * p.y).collect();
        if reversed {
            out.reverse();
        }
        out
    };

    let mut face = Face::new(plane, lift_ring(&profile.outer))?;
    face.holes = profile.holes.iter().map(|h| lift_ring(h)).collect();
    Ok(face)
}

/// Build the cut solid for an opening in a straight host
///
/// The profile is re-expressed in a local frame whose Y axis is the
/// hinge-side offset (the host axis direction projected into the profile
/// plane); the cut direction is flipped when its sense disagrees with
/// the profile normal.
pub fn line_cut_solid(
    profile: &Profile,
    hinge_axis: Vector3<f64>,
    cut_direction: Vector3<f64>,
    depth: f64,
) -> Result<Solid> {
    let normal = profile.plane.normal();
    let mut dir = cut_direction
        .try_normalize(EPS)
        .ok_or_else(|| Error::InvalidSweep("cut direction is zero-length".to_string()))?;
    if dir.dot(&normal).abs() < EPS {
        return Err(Error::InvalidSweep(
            "cut direction orthogonal to profile normal".to_string(),
        ));
    }

    let hinge_in_plane = hinge_axis - normal * hinge_axis.dot(&normal);
    let v = hinge_in_plane
        .try_normalize(EPS)
        .ok_or_else(|| Error::InvalidSweep("hinge axis parallel to profile normal".to_string()))?;
    let u = v.cross(&normal);

    let plane = Plane::new(profile.plane.origin, u, v)?;
    let reframed = reproject(profile, plane)?;

    if dir.dot(&normal) < 0.0 {
        dir = -dir;
    }
    extrude_profile(&reframed, dir, depth)
}

/// Build the cut solid for an opening in an arced host
///
/// Two booleans must agree: whether the naive profile center lies inside
/// the swept radius, and whether the cut direction points toward the arc
/// center. On disagreement the profile is shifted by `-depth` along the
/// cut direction before sweeping. Where the cut width approaches the
/// sweep diameter, extra depth covers the sagitta of the host's curved
/// faces on both the leading and trailing edges.
pub fn arc_cut_solid(
    profile: &Profile,
    arc: &crate::curve::Arc,
    cut_direction: Vector3<f64>,
    unscaled_depth: f64,
) -> Result<Solid> {
    let normal = profile.plane.normal();
    let dir = cut_direction
        .try_normalize(EPS)
        .ok_or_else(|| Error::InvalidSweep("cut direction is zero-length".to_string()))?;
    if dir.dot(&normal).abs() < EPS {
        return Err(Error::InvalidSweep(
            "cut direction orthogonal to profile normal".to_string(),
        ));
    }

    let (min, max) = profile.bounds_2d();
    let center_2d = Point2::new((min.x + max.x) * 0.5, (min.y + max.y) * 0.5);
    let center = profile.plane.lift(&center_2d);

    // Radial offset from the sweep axis (the line through the arc center
    // along the arc normal), not the 3-D distance to the center point
    let axis_normal = arc.normal();
    let rel = center - arc.center;
    let radial = rel - axis_normal * rel.dot(&axis_normal);

    let inside = radial.norm() < arc.radius;
    let toward = dir.dot(&(-radial)) > 0.0;

    let mut working = profile.clone();
    if inside != toward {
        working = working.translated(&(-dir * unscaled_depth));
    }

    // Cut width measured along the arc's travel direction at the profile
    // center (in-plane tangent), independent of the profile basis
    let tangent = axis_normal.cross(&radial);
    let width_axis = (tangent - normal * tangent.dot(&normal))
        .try_normalize(EPS)
        .unwrap_or(profile.plane.u);
    let width = ring_extent_along(profile, &width_axis);

    // Sagitta of the chord the opening cuts across the swept disk
    let half_ratio = (width / (2.0 * arc.radius)).clamp(0.0, 1.0);
    let extra = arc.radius * (1.0 - (1.0 - half_ratio * half_ratio).sqrt());

    let mut depth = unscaled_depth;
    if extra > EPS {
        working = working.translated(&(-dir * extra));
        depth += 2.0 * extra;
    }

    extrude_profile(&working, dir, depth)
}

/// Extent of a profile's outer ring along a direction
fn ring_extent_along(profile: &Profile, axis: &Vector3<f64>) -> f64 {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for p in profile.lift_outer() {
        let t = p.coords.dot(axis);
        min = min.min(t);
        max = max.max(t);
    }
    if min > max {
        0.0
    } else {
        max - min
    }
}

/// Re-express a profile's rings in another plane through the same points
fn reproject(profile: &Profile, plane: Plane) -> Result<Profile> {
    let project_ring = |ring: &[Point2<f64>]| -> Vec<Point2<f64>> {
        ring.iter()
            .map(|p| plane.project(&profile.plane.lift(p)))
            .collect()
    };

    let mut out = Profile::new(plane, project_ring(&profile.outer))?;
    for hole in &profile.holes {
        out.add_hole(project_ring(hole));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::Arc;
    use crate::profile::{create_circle, create_rectangle};
    use approx::assert_relative_eq;

    #[test]
    fn test_extrude_unit_square() {
        let profile = create_rectangle(1.0, 1.0).unwrap();
        let solid = extrude_profile(&profile, Vector3::z(), 1.0).unwrap();

        assert_eq!(solid.face_count(), 6);
        assert_relative_eq!(solid.volume().unwrap(), 1.0, epsilon = 1e-9);

        let bounds = solid.bounds();
        assert_relative_eq!(bounds.min.z, 0.0, epsilon = 1e-9);
        assert_relative_eq!(bounds.max.z, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_extrude_against_normal() {
        let profile = create_rectangle(2.0, 2.0).unwrap();
        let solid = extrude_profile(&profile, -Vector3::z(), 3.0).unwrap();

        assert_relative_eq!(solid.volume().unwrap(), 12.0, epsilon = 1e-9);
        assert_relative_eq!(solid.bounds().min.z, -3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_oblique_extrusion_volume() {
        // Shearing does not change the base-times-height volume
        let profile = create_rectangle(1.0, 1.0).unwrap();
        let dir = Vector3::new(1.0, 0.0, 1.0).normalize();
        let solid = extrude_profile(&profile, dir, 2.0f64.sqrt()).unwrap();
        assert_relative_eq!(solid.volume().unwrap(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_orthogonal_direction_rejected() {
        let profile = create_rectangle(1.0, 1.0).unwrap();
        let result = extrude_profile(&profile, Vector3::x(), 1.0);
        assert!(matches!(result, Err(Error::InvalidSweep(_))));
    }

    #[test]
    fn test_extrude_with_hole() {
        let mut profile = create_rectangle(4.0, 4.0).unwrap();
        profile.add_hole(vec![
            Point2::new(-1.0, -1.0),
            Point2::new(1.0, -1.0),
            Point2::new(1.0, 1.0),
            Point2::new(-1.0, 1.0),
        ]);
        let solid = extrude_profile(&profile, Vector3::z(), 2.0).unwrap();

        // 2 caps + 4 outer walls + 4 hole walls
        assert_eq!(solid.face_count(), 10);
        assert_relative_eq!(solid.volume().unwrap(), 24.0, epsilon = 1e-9);
    }

    #[test]
    fn test_sweep_disk_along_quarter_arc() {
        let profile = create_circle(1.0, None).unwrap();
        let directrix = Curve::Arc(
            Arc::new(
                Point3::origin(),
                5.0,
                Vector3::x(),
                Vector3::y(),
                (0.0, std::f64::consts::FRAC_PI_2),
            )
            .unwrap(),
        );

        let solid = sweep_profile_along_curve(&profile, &directrix).unwrap();
        let volume = solid.volume().unwrap();

        // Analytic torus-segment volume: pi * r^2 * arc length
        let expected = std::f64::consts::PI * 5.0 * std::f64::consts::FRAC_PI_2;
        assert!(volume > 0.0);
        assert!(
            (volume - expected).abs() / expected < 0.05,
            "volume {volume} deviates from analytic {expected}"
        );
    }

    #[test]
    fn test_sweep_along_straight_line() {
        let profile = create_rectangle(1.0, 1.0).unwrap();
        let directrix = Curve::Line(
            crate::curve::Line::bounded(Point3::origin(), Vector3::z(), 0.0, 4.0).unwrap(),
        );
        let solid = sweep_profile_along_curve(&profile, &directrix).unwrap();
        assert_relative_eq!(solid.volume().unwrap(), 4.0, epsilon = 1e-6);
    }

    #[test]
    fn test_line_cut_flips_disagreeing_direction() {
        let profile = create_rectangle(1.0, 2.0).unwrap();
        // Cut direction against the profile normal gets flipped, so the
        // solid still grows along +Z
        let solid = line_cut_solid(&profile, Vector3::y(), -Vector3::z(), 0.3).unwrap();
        let bounds = solid.bounds();
        assert_relative_eq!(bounds.min.z, 0.0, epsilon = 1e-9);
        assert_relative_eq!(bounds.max.z, 0.3, epsilon = 1e-9);
    }

    #[test]
    fn test_arc_cut_agreement_keeps_profile_in_place() {
        let profile = create_rectangle(0.5, 1.0).unwrap();
        // Profile centered at origin, arc center 3.0 along +Z: the center
        // is inside the swept radius and the cut points toward the
        // center, so the two tests agree and nothing shifts.
        let arc = Arc::new(
            Point3::new(0.0, 0.0, 3.0),
            4.0,
            Vector3::x(),
            Vector3::z(),
            (0.0, std::f64::consts::PI),
        )
        .unwrap();

        let solid = arc_cut_solid(&profile, &arc, Vector3::z(), 0.4).unwrap();
        let bounds = solid.bounds();
        // Only the sagitta allowance moves the leading face below z=0
        let half_ratio = 0.5 / 8.0;
        let extra = 4.0 * (1.0 - (1.0 - half_ratio * half_ratio).sqrt());
        assert_relative_eq!(bounds.min.z, -extra, epsilon = 1e-9);
        assert_relative_eq!(bounds.max.z, 0.4 + extra, epsilon = 1e-9);
    }

    #[test]
    fn test_arc_cut_disagreement_shifts_back() {
        let profile = create_rectangle(0.5, 1.0).unwrap();
        // Same arc, but the cut points away from the center: the two
        // tests disagree, so the profile shifts by -depth first.
        let arc = Arc::new(
            Point3::new(0.0, 0.0, 3.0),
            4.0,
            Vector3::x(),
            Vector3::z(),
            (0.0, std::f64::consts::PI),
        )
        .unwrap();

        let solid = arc_cut_solid(&profile, &arc, -Vector3::z(), 0.4).unwrap();
        let bounds = solid.bounds();
        let half_ratio = 0.5 / 8.0;
        let extra = 4.0 * (1.0 - (1.0 - half_ratio * half_ratio).sqrt());
        // The -depth shift moves the profile to the far face, and the
        // sweep then crosses back: the cut lands in the same slab as the
        // agreeing case.
        assert_relative_eq!(bounds.min.z, -extra, epsilon = 1e-9);
        assert_relative_eq!(bounds.max.z, 0.4 + extra, epsilon = 1e-9);
    }
}
