// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Entity-graph readers
//!
//! Resolve points, directions, placements, curves, and profile
//! definitions out of the pre-parsed entity graph. Length attributes are
//! scaled from file units to modeling units here, before any geometric
//! operation sees them.

use crate::curve::{Arc, Curve, Line, Polyline};
use crate::error::{Error, Result};
use crate::profile::{Plane, Profile};
use crate::sanitize::{sanitize_loop, SHORT_CURVE_TOLERANCE};
use crate::EPS;
use ifc_mend_model::{Diagnostics, Entity, EntityArena, EntityKind, StepId, UnitScale};
use nalgebra::{Matrix4, Point2, Point3, Vector3};

fn kind_check(entity: &Entity, expected: EntityKind) -> Result<()> {
    if entity.kind != expected {
        return Err(Error::WrongKind {
            id: entity.id,
            expected: expected.as_str(),
        });
    }
    Ok(())
}

/// Read a cartesian point, scaling coordinates to modeling units
///
/// Two-dimensional points get `z = 0`.
pub fn read_point(arena: &EntityArena, id: StepId, scale: UnitScale) -> Result<Point3<f64>> {
    let entity = arena.require(id)?;
    kind_check(entity, EntityKind::CartesianPoint)?;

    let coords = entity.require_aggregate("Coordinates")?;
    let component = |i: usize| coords.get(i).and_then(|v| v.as_float()).unwrap_or(0.0);
    Ok(Point3::new(
        scale.length(component(0)),
        scale.length(component(1)),
        scale.length(component(2)),
    ))
}

/// Read a direction (ratios are unitless, never scaled)
pub fn read_direction(arena: &EntityArena, id: StepId) -> Result<Vector3<f64>> {
    let entity = arena.require(id)?;
    kind_check(entity, EntityKind::Direction)?;

    let ratios = entity.require_aggregate("DirectionRatios")?;
    let component = |i: usize| ratios.get(i).and_then(|v| v.as_float()).unwrap_or(0.0);
    let raw = Vector3::new(component(0), component(1), component(2));
    raw.try_normalize(EPS)
        .ok_or_else(|| Error::malformed(id, "DirectionRatios"))
}

/// Read an axis placement into a local-to-parent transform
///
/// Axis defaults to +Z and RefDirection to +X; the X axis is projected
/// orthogonal to Z, with a perpendicular fallback when the two are
/// (nearly) parallel.
pub fn read_axis_placement(
    arena: &EntityArena,
    id: StepId,
    scale: UnitScale,
) -> Result<Matrix4<f64>> {
    let entity = arena.require(id)?;
    kind_check(entity, EntityKind::Axis2Placement)?;

    let location = read_point(arena, entity.require_instance("Location")?, scale)?;

    let z_axis = match entity.instance_attribute("Axis") {
        Some(axis_id) => read_direction(arena, axis_id)?,
        None => Vector3::z(),
    };
    let x_hint = match entity.instance_attribute("RefDirection") {
        Some(ref_id) => read_direction(arena, ref_id)?,
        None => Vector3::x(),
    };

    let z_axis = z_axis
        .try_normalize(EPS)
        .ok_or_else(|| Error::malformed(id, "Axis"))?;

    // Project the X hint orthogonal to Z; fall back to a perpendicular
    // axis when the hint is parallel to Z
    let x_ortho = x_hint - z_axis * x_hint.dot(&z_axis);
    let x_axis = match x_ortho.try_normalize(EPS) {
        Some(x) => x,
        None => {
            if z_axis.z.abs() < 0.9 {
                Vector3::z().cross(&z_axis).normalize()
            } else {
                Vector3::x().cross(&z_axis).normalize()
            }
        }
    };
    let y_axis = z_axis.cross(&x_axis);

    Ok(Matrix4::new(
        x_axis.x, y_axis.x, z_axis.x, location.x,
        x_axis.y, y_axis.y, z_axis.y, location.y,
        x_axis.z, y_axis.z, z_axis.z, location.z,
        0.0, 0.0, 0.0, 1.0,
    ))
}

/// Read a curve entity
///
/// Lines come back unbounded unless trim parameters are present;
/// composite curves flatten to polylines through their segments.
pub fn read_curve(arena: &EntityArena, id: StepId, scale: UnitScale) -> Result<Curve> {
    let entity = arena.require(id)?;
    match entity.kind {
        EntityKind::Line => {
            let origin = read_point(arena, entity.require_instance("Pnt")?, scale)?;
            let direction = read_direction(arena, entity.require_instance("Dir")?)?;
            let mut line = Line::new(origin, direction)?;
            if let (Some(start), Some(end)) = (
                entity.real_attribute("StartParam"),
                entity.real_attribute("EndParam"),
            ) {
                // Line parameters are lengths, so they scale
                line = Line::bounded(
                    line.origin,
                    line.direction,
                    scale.length(start),
                    scale.length(end),
                )?;
            }
            Ok(Curve::Line(line))
        }
        EntityKind::Circle => {
            let placement =
                read_axis_placement(arena, entity.require_instance("Position")?, scale)?;
            let radius = scale.length(entity.require_real("Radius")?);
            let center = Point3::new(placement[(0, 3)], placement[(1, 3)], placement[(2, 3)]);
            let x_dir = Vector3::new(placement[(0, 0)], placement[(1, 0)], placement[(2, 0)]);
            let normal = Vector3::new(placement[(0, 2)], placement[(1, 2)], placement[(2, 2)]);
            let y_dir = normal.cross(&x_dir);
            Ok(Curve::Arc(Arc::circle(center, radius, x_dir, y_dir)?))
        }
        EntityKind::TrimmedCurve => {
            let basis = read_curve(arena, entity.require_instance("BasisCurve")?, scale)?;
            let trim1 = entity.require_real("Trim1")?;
            let trim2 = entity.require_real("Trim2")?;
            // Angular parameters (arcs) are unitless; length parameters
            // (lines, polylines) scale with the file units
            let (start, end) = match basis {
                Curve::Arc(_) => (trim1, trim2),
                Curve::Line(_) => (scale.length(trim1), scale.length(trim2)),
                Curve::Polyline(_) => (trim1, trim2),
            };
            basis.trim(start, end)
        }
        EntityKind::Polyline => {
            let refs = entity.require_aggregate("Points")?;
            let mut points = Vec::with_capacity(refs.len());
            for value in refs {
                let point_id = value
                    .as_entity_ref()
                    .ok_or_else(|| Error::malformed(id, "Points"))?;
                points.push(read_point(arena, point_id, scale)?);
            }
            Ok(Curve::Polyline(Polyline::new(points)?))
        }
        EntityKind::CompositeCurve => {
            let segments = entity.require_aggregate("Segments")?;
            let mut points: Vec<Point3<f64>> = Vec::new();
            for value in segments {
                let segment_id = value
                    .as_entity_ref()
                    .ok_or_else(|| Error::malformed(id, "Segments"))?;
                let segment = read_curve(arena, segment_id, scale)?;
                for p in segment.tessellate()? {
                    if points.last().map(|last| (p - last).norm() < EPS) != Some(true) {
                        points.push(p);
                    }
                }
            }
            Ok(Curve::Polyline(Polyline::new(points)?))
        }
        other => Err(Error::UnsupportedSchema(other.as_str())),
    }
}

/// Read a profile definition into a planar profile
pub fn read_profile(
    arena: &EntityArena,
    id: StepId,
    scale: UnitScale,
    diag: &mut Diagnostics,
) -> Result<Profile> {
    let entity = arena.require(id)?;
    match entity.kind {
        EntityKind::RectangleProfile => {
            let x_dim = scale.length(entity.require_real("XDim")?);
            let y_dim = scale.length(entity.require_real("YDim")?);
            if x_dim < EPS || y_dim < EPS {
                return Err(Error::InvalidProfile(format!(
                    "rectangle profile {id} has degenerate dimensions {x_dim} x {y_dim}"
                )));
            }
            let half_x = x_dim / 2.0;
            let half_y = y_dim / 2.0;
            Profile::new(
                profile_plane(arena, entity, scale)?,
                vec![
                    Point2::new(-half_x, -half_y),
                    Point2::new(half_x, -half_y),
                    Point2::new(half_x, half_y),
                    Point2::new(-half_x, half_y),
                ],
            )
        }
        EntityKind::CircleProfile => {
            let radius = scale.length(entity.require_real("Radius")?);
            if radius < EPS {
                return Err(Error::InvalidProfile(format!(
                    "circle profile {id} has degenerate radius {radius}"
                )));
            }
            let segments = crate::curve::segments_for_radius(radius);
            let ring = (0..segments)
                .map(|i| {
                    let angle = 2.0 * std::f64::consts::PI * i as f64 / segments as f64;
                    Point2::new(radius * angle.cos(), radius * angle.sin())
                })
                .collect();
            Profile::new(profile_plane(arena, entity, scale)?, ring)
        }
        EntityKind::ArbitraryClosedProfile => {
            let curve_id = entity.require_instance("OuterCurve")?;
            let curve = read_curve(arena, curve_id, scale)?;
            let raw_points = curve.tessellate()?;
            let sources = vec![curve_id; raw_points.len()];
            let cleaned = sanitize_loop(
                &raw_points,
                Some(&sources),
                true,
                SHORT_CURVE_TOLERANCE,
                diag,
            )
            .ok_or_else(|| {
                Error::InvalidProfile(format!("outer curve of profile {id} degenerates"))
            })?;
            Profile::from_points(&cleaned.points)
        }
        other => Err(Error::UnsupportedSchema(other.as_str())),
    }
}

/// Optional in-plane position of a parameterized profile
fn profile_plane(arena: &EntityArena, entity: &Entity, scale: UnitScale) -> Result<Plane> {
    let base = Plane::new(Point3::origin(), Vector3::x(), Vector3::y())?;
    match entity.instance_attribute("Position") {
        Some(position_id) => {
            let m = read_axis_placement(arena, position_id, scale)?;
            base.transformed(&m)
        }
        None => Ok(base),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ifc_mend_model::AttributeValue;

    fn float_list(values: &[f64]) -> AttributeValue {
        AttributeValue::List(values.iter().map(|&v| AttributeValue::Float(v)).collect())
    }

    fn seed_point(arena: &mut EntityArena, id: u32, coords: &[f64]) -> StepId {
        arena.insert(
            Entity::new(StepId(id), EntityKind::CartesianPoint)
                .with("Coordinates", float_list(coords)),
        )
    }

    fn seed_direction(arena: &mut EntityArena, id: u32, ratios: &[f64]) -> StepId {
        arena.insert(
            Entity::new(StepId(id), EntityKind::Direction)
                .with("DirectionRatios", float_list(ratios)),
        )
    }

    #[test]
    fn test_read_point_scales_lengths() {
        let mut arena = EntityArena::new();
        let id = seed_point(&mut arena, 1, &[1000.0, 2000.0, 500.0]);

        let scale = UnitScale::new(0.001).unwrap(); // Millimeter file
        let p = read_point(&arena, id, scale).unwrap();
        assert_relative_eq!(p.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(p.y, 2.0, epsilon = 1e-12);
        assert_relative_eq!(p.z, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_read_2d_point_pads_z() {
        let mut arena = EntityArena::new();
        let id = seed_point(&mut arena, 1, &[3.0, 4.0]);
        let p = read_point(&arena, id, UnitScale::identity()).unwrap();
        assert_relative_eq!(p.z, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_read_direction_normalizes() {
        let mut arena = EntityArena::new();
        let id = seed_direction(&mut arena, 1, &[0.0, 3.0, 4.0]);
        let d = read_direction(&arena, id).unwrap();
        assert_relative_eq!(d.norm(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(d.y, 0.6, epsilon = 1e-12);
    }

    #[test]
    fn test_axis_placement_orthonormalizes_skewed_ref() {
        let mut arena = EntityArena::new();
        let location = seed_point(&mut arena, 1, &[1.0, 2.0, 3.0]);
        let axis = seed_direction(&mut arena, 2, &[0.0, 0.0, 1.0]);
        // RefDirection not orthogonal to the axis
        let ref_dir = seed_direction(&mut arena, 3, &[1.0, 0.0, 0.5]);
        let placement = arena.insert(
            Entity::new(StepId(4), EntityKind::Axis2Placement)
                .with("Location", AttributeValue::EntityRef(location))
                .with("Axis", AttributeValue::EntityRef(axis))
                .with("RefDirection", AttributeValue::EntityRef(ref_dir)),
        );

        let m = read_axis_placement(&arena, placement, UnitScale::identity()).unwrap();
        let x = Vector3::new(m[(0, 0)], m[(1, 0)], m[(2, 0)]);
        let z = Vector3::new(m[(0, 2)], m[(1, 2)], m[(2, 2)]);
        assert_relative_eq!(x.dot(&z), 0.0, epsilon = 1e-12);
        assert_relative_eq!(x.norm(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(m[(0, 3)], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_axis_placement_parallel_ref_falls_back() {
        let mut arena = EntityArena::new();
        let location = seed_point(&mut arena, 1, &[0.0, 0.0, 0.0]);
        let axis = seed_direction(&mut arena, 2, &[0.0, 0.0, 1.0]);
        let ref_dir = seed_direction(&mut arena, 3, &[0.0, 0.0, 1.0]);
        let placement = arena.insert(
            Entity::new(StepId(4), EntityKind::Axis2Placement)
                .with("Location", AttributeValue::EntityRef(location))
                .with("Axis", AttributeValue::EntityRef(axis))
                .with("RefDirection", AttributeValue::EntityRef(ref_dir)),
        );

        let m = read_axis_placement(&arena, placement, UnitScale::identity()).unwrap();
        let x = Vector3::new(m[(0, 0)], m[(1, 0)], m[(2, 0)]);
        let z = Vector3::new(m[(0, 2)], m[(1, 2)], m[(2, 2)]);
        assert_relative_eq!(x.dot(&z), 0.0, epsilon = 1e-9);
        assert_relative_eq!(x.norm(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_read_trimmed_circle_becomes_arc() {
        let mut arena = EntityArena::new();
        let center = seed_point(&mut arena, 1, &[0.0, 0.0, 0.0]);
        let position = arena.insert(
            Entity::new(StepId(2), EntityKind::Axis2Placement)
                .with("Location", AttributeValue::EntityRef(center)),
        );
        let circle = arena.insert(
            Entity::new(StepId(3), EntityKind::Circle)
                .with("Position", AttributeValue::EntityRef(position))
                .with("Radius", AttributeValue::Float(2.0)),
        );
        let trimmed = arena.insert(
            Entity::new(StepId(4), EntityKind::TrimmedCurve)
                .with("BasisCurve", AttributeValue::EntityRef(circle))
                .with("Trim1", AttributeValue::Float(0.0))
                .with("Trim2", AttributeValue::Float(std::f64::consts::FRAC_PI_2)),
        );

        let curve = read_curve(&arena, trimmed, UnitScale::identity()).unwrap();
        let end = curve.end_point().unwrap();
        assert_relative_eq!(end.y, 2.0, epsilon = 1e-9);
        assert_relative_eq!(end.x, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_read_polyline_profile() {
        let mut arena = EntityArena::new();
        let ids: Vec<StepId> = [
            [0.0, 0.0],
            [2.0, 0.0],
            [2.0, 1.0],
            [0.0, 1.0],
        ]
        .iter()
        .enumerate()
        .map(|(i, c)| seed_point(&mut arena, 10 + i as u32, c))
        .collect();

        let polyline = arena.insert(
            Entity::new(StepId(20), EntityKind::Polyline).with(
                "Points",
                AttributeValue::List(ids.iter().map(|&i| AttributeValue::EntityRef(i)).collect()),
            ),
        );
        let profile_id = arena.insert(
            Entity::new(StepId(21), EntityKind::ArbitraryClosedProfile)
                .with("OuterCurve", AttributeValue::EntityRef(polyline)),
        );

        let mut diag = Diagnostics::new();
        let profile = read_profile(&arena, profile_id, UnitScale::identity(), &mut diag).unwrap();
        assert_relative_eq!(profile.area(), 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_advanced_kind_is_unsupported() {
        let mut arena = EntityArena::new();
        let id = arena.insert(Entity::new(StepId(1), EntityKind::AdvancedFace));
        let mut diag = Diagnostics::new();
        let err = read_profile(&arena, id, UnitScale::identity(), &mut diag).unwrap_err();
        assert!(matches!(err, Error::UnsupportedSchema(_)));
    }
}
