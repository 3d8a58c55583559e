// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Boolean solid combiner
//!
//! Union/difference/intersection between solids with a bounded
//! retry-with-perturbation loop. Floating-point coincidence between
//! boundary faces is the dominant cause of boolean-kernel failure; a
//! 1 mm nudge of the second operand breaks exact coincidence without
//! visibly altering the result.
//!
//! No exceptions cross the retry loop: the CSG primitive returns an
//! explicit `Result` and the loop ranges over it. Intermediate failed
//! solids are discarded on every iteration.

use crate::error::{Error, Result};
use crate::mesh::Mesh;
use crate::profile::Plane;
use crate::solid::{Face, Solid};
use crate::triangulation::signed_area;
use crate::validate::Validator;
use crate::EPS;
use ifc_mend_model::{Diagnostics, StepId};
use nalgebra::{Point2, Point3, Vector3};
use rustc_hash::FxHashMap;
use std::fmt;

/// Rigid translation applied on retry attempts (1 mm in modeling units)
const NUDGE_DISTANCE: f64 = 1.0e-3;

/// Quantization for grouping CSG output polygons by plane
const NORMAL_QUANTUM: f64 = 0.01;
const OFFSET_QUANTUM: f64 = 1e-4;

/// Boolean operation between two solids
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanOp {
    Union,
    Difference,
    Intersect,
}

impl fmt::Display for BooleanOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Union => "union",
            Self::Difference => "difference",
            Self::Intersect => "intersection",
        };
        f.write_str(s)
    }
}

/// How a combine call resolved
#[derive(Debug, Clone, Copy)]
pub struct CombineReport {
    /// Attempts consumed (1 = clean first try)
    pub attempts: u32,
    /// Whether the accepted result required a nudged operand
    pub nudged: bool,
    /// Whether all attempts failed and the first operand was returned
    pub degraded: bool,
}

fn fmt_id(id: Option<StepId>) -> String {
    id.map(|i| i.to_string()).unwrap_or_else(|| "<anonymous>".to_string())
}

/// Combine two optional solids under a boolean operation
///
/// Degenerate operands resolve without touching the CSG backend: a
/// missing union operand yields the other; a missing second operand
/// leaves a difference's first operand untouched; a missing intersection
/// operand yields nothing.
pub fn combine(
    first: Option<Solid>,
    second: Option<Solid>,
    op: BooleanOp,
    shift_direction: Option<Vector3<f64>>,
    validator: &mut Validator,
    diag: &mut Diagnostics,
    ids: (Option<StepId>, Option<StepId>),
) -> Option<Solid> {
    combine_with_report(first, second, op, shift_direction, validator, diag, ids).0
}

/// As [`combine`], also reporting how the operation resolved
pub fn combine_with_report(
    first: Option<Solid>,
    second: Option<Solid>,
    op: BooleanOp,
    shift_direction: Option<Vector3<f64>>,
    validator: &mut Validator,
    diag: &mut Diagnostics,
    ids: (Option<StepId>, Option<StepId>),
) -> (Option<Solid>, CombineReport) {
    let clean = |solid: Option<Solid>, attempts: u32| {
        (
            solid,
            CombineReport {
                attempts,
                nudged: false,
                degraded: false,
            },
        )
    };

    let (first, second) = match op {
        BooleanOp::Union => match (first, second) {
            (None, None) => return clean(None, 0),
            (Some(a), None) => return clean(Some(a), 0),
            (None, Some(b)) => return clean(Some(b), 0),
            (Some(a), Some(b)) => (a, b),
        },
        BooleanOp::Difference => match (first, second) {
            (None, _) => return clean(None, 0),
            (Some(a), None) => return clean(Some(a), 0),
            (Some(a), Some(b)) => (a, b),
        },
        BooleanOp::Intersect => match (first, second) {
            (Some(a), Some(b)) => (a, b),
            _ => return clean(None, 0),
        },
    };

    let shift = shift_direction
        .and_then(|v| v.try_normalize(EPS))
        .unwrap_or_else(Vector3::z);

    let offsets = [0.0, NUDGE_DISTANCE, -NUDGE_DISTANCE];
    for (index, &offset) in offsets.iter().enumerate() {
        let attempt = index as u32 + 1;
        let second_working = if index == 0 {
            second.clone()
        } else {
            second.translated(&(shift * offset))
        };

        let candidate = match apply_csg(&first, &second_working, op) {
            Ok(candidate) => candidate,
            Err(e) => {
                diag.verbose(
                    ids.0,
                    format!("boolean {op} attempt {attempt} failed: {e}"),
                );
                continue;
            }
        };

        if candidate.is_empty() {
            if op == BooleanOp::Intersect {
                // Disjoint operands intersect to nothing; that is an
                // answer, not a failure.
                return clean(None, attempt);
            }
            diag.verbose(
                ids.0,
                format!("boolean {op} attempt {attempt} produced an empty result"),
            );
            continue;
        }

        if validator.is_valid(&candidate) {
            let nudged = index > 0;
            if nudged {
                diag.warning(
                    ids.0,
                    format!(
                        "boolean {op} of {} and {} succeeded after nudging the second operand by 1mm",
                        fmt_id(ids.0),
                        fmt_id(ids.1)
                    ),
                );
            }
            return (
                Some(candidate),
                CombineReport {
                    attempts: attempt,
                    nudged,
                    degraded: false,
                },
            );
        }
        // Failed candidate is dropped here; the loop never leaks it
    }

    diag.error(
        ids.0,
        format!(
            "boolean {op} of {} and {} failed validation after 3 attempts; returning first operand unmodified",
            fmt_id(ids.0),
            fmt_id(ids.1)
        ),
    );
    (
        Some(first),
        CombineReport {
            attempts: 3,
            nudged: false,
            degraded: true,
        },
    )
}

/// One CSG application, no retries
fn apply_csg(first: &Solid, second: &Solid, op: BooleanOp) -> Result<Solid> {
    use csgrs::traits::CSG;

    let first_csg = mesh_to_csg(&first.shell()?)?;
    let second_csg = mesh_to_csg(&second.shell()?)?;

    let result = match op {
        BooleanOp::Union => first_csg.union(&second_csg),
        BooleanOp::Difference => first_csg.difference(&second_csg),
        BooleanOp::Intersect => first_csg.intersection(&second_csg),
    };

    solid_from_csg(&result)
}

/// Convert a triangle shell to the csgrs mesh format
fn mesh_to_csg(mesh: &Mesh) -> Result<csgrs::mesh::Mesh<()>> {
    use csgrs::mesh::{polygon::Polygon, vertex::Vertex, Mesh as CsgMesh};

    let mut polygons = Vec::with_capacity(mesh.triangle_count());
    for tri in 0..mesh.triangle_count() {
        let (v0, v1, v2) = mesh.triangle(tri);
        let face_normal = match (v1 - v0).cross(&(v2 - v0)).try_normalize(1e-10) {
            Some(n) => n,
            None => continue, // Degenerate triangle would propagate NaN
        };
        let vertices = vec![
            Vertex::new(v0, face_normal),
            Vertex::new(v1, face_normal),
            Vertex::new(v2, face_normal),
        ];
        polygons.push(Polygon::new(vertices, None));
    }

    if polygons.is_empty() {
        return Err(Error::Boolean("operand tessellated to nothing".to_string()));
    }
    Ok(CsgMesh::from_polygons(&polygons, None))
}

/// Rebuild a face/loop solid from CSG output polygons
///
/// Polygons are grouped by quantized plane; each group's boundary loops
/// are recovered by counting directed edges (interior edges cancel) and
/// walking the remainder. Counter-clockwise loops become face boundaries,
/// clockwise loops become holes of the enclosing boundary.
fn solid_from_csg(csg: &csgrs::mesh::Mesh<()>) -> Result<Solid> {
    type Quant = (i64, i64, i64);

    let quantize_point = |p: &Point3<f64>| -> Quant {
        let scale = 1e6;
        (
            (p.x * scale).round() as i64,
            (p.y * scale).round() as i64,
            (p.z * scale).round() as i64,
        )
    };

    // Group polygons by plane (quantized normal + signed offset), keeping
    // a representative outward normal per group
    type Group = (Vector3<f64>, Vec<Vec<Point3<f64>>>);
    let mut groups: FxHashMap<(Quant, i64), Group> = FxHashMap::default();
    for polygon in &csg.polygons {
        if polygon.vertices.len() < 3 {
            continue;
        }
        let ring: Vec<Point3<f64>> = polygon
            .vertices
            .iter()
            .map(|v| Point3::new(v.pos[0], v.pos[1], v.pos[2]))
            .collect();
        let normal = match crate::triangulation::newell_normal(&ring).try_normalize(1e-10) {
            Some(n) => n,
            None => continue,
        };
        let normal_key = (
            (normal.x / NORMAL_QUANTUM).round() as i64,
            (normal.y / NORMAL_QUANTUM).round() as i64,
            (normal.z / NORMAL_QUANTUM).round() as i64,
        );
        let offset = normal.dot(&ring[0].coords);
        let offset_key = (offset / OFFSET_QUANTUM).round() as i64;
        groups
            .entry((normal_key, offset_key))
            .or_insert_with(|| (normal, Vec::new()))
            .1
            .push(ring);
    }

    let mut faces = Vec::new();

    for (group_normal, rings) in groups.values() {
        // Net directed-edge count; interior edges shared by two polygons
        // of the group cancel, leaving the boundary
        let mut net: FxHashMap<(Quant, Quant), (i32, Point3<f64>, Point3<f64>)> =
            FxHashMap::default();
        for ring in rings {
            for i in 0..ring.len() {
                let a = ring[i];
                let b = ring[(i + 1) % ring.len()];
                let qa = quantize_point(&a);
                let qb = quantize_point(&b);
                if qa == qb {
                    continue;
                }
                if qa < qb {
                    net.entry((qa, qb)).or_insert((0, a, b)).0 += 1;
                } else {
                    net.entry((qb, qa)).or_insert((0, b, a)).0 -= 1;
                }
            }
        }

        // Outgoing boundary edges per start vertex
        let mut outgoing: FxHashMap<Quant, Vec<(Quant, Point3<f64>)>> = FxHashMap::default();
        for ((qa, qb), (count, pa, pb)) in &net {
            if *count > 0 {
                outgoing.entry(*qa).or_default().push((*qb, *pb));
            } else if *count < 0 {
                outgoing.entry(*qb).or_default().push((*qa, *pa));
            }
        }
        let starts: FxHashMap<Quant, Point3<f64>> = net
            .values()
            .filter(|(c, _, _)| *c != 0)
            .map(|(c, pa, pb)| if *c > 0 { (quantize_point(pa), *pa) } else { (quantize_point(pb), *pb) })
            .collect();

        // Walk boundary loops
        let mut loops: Vec<Vec<Point3<f64>>> = Vec::new();
        let mut visited: FxHashMap<Quant, bool> = FxHashMap::default();
        for (&start_q, &start_p) in &starts {
            if visited.get(&start_q).copied().unwrap_or(false) {
                continue;
            }
            let mut contour = vec![start_p];
            visited.insert(start_q, true);
            let mut current = start_q;
            loop {
                let next = outgoing.get(&current).and_then(|candidates| {
                    candidates
                        .iter()
                        .find(|(q, _)| !visited.get(q).copied().unwrap_or(false))
                });
                match next {
                    Some(&(q, p)) => {
                        contour.push(p);
                        visited.insert(q, true);
                        current = q;
                    }
                    None => break,
                }
            }
            if contour.len() >= 3 {
                loops.push(contour);
            }
        }

        if loops.is_empty() {
            continue;
        }

        // Classify loops by winding against the group's outward normal:
        // counter-clockwise loops bound faces, clockwise loops are holes
        let plane = Plane::from_normal(loops[0][0], *group_normal)?;
        let project = |ring: &[Point3<f64>]| -> Vec<Point2<f64>> {
            ring.iter().map(|p| plane.project(p)).collect()
        };

        let mut outers: Vec<(Vec<Point3<f64>>, Vec<Point2<f64>>)> = Vec::new();
        let mut hole_rings: Vec<(Vec<Point3<f64>>, Point2<f64>)> = Vec::new();
        for contour in loops {
            let ring_2d = project(&contour);
            if signed_area(&ring_2d) >= 0.0 {
                outers.push((contour, ring_2d));
            } else {
                let probe = ring_2d[0];
                hole_rings.push((contour, probe));
            }
        }

        if outers.is_empty() {
            continue;
        }

        let mut group_faces: Vec<Face> = Vec::with_capacity(outers.len());
        let mut outer_rings_2d: Vec<Vec<Point2<f64>>> = Vec::new();
        for (contour, ring_2d) in outers {
            let face_plane = Plane::from_normal(contour[0], *group_normal)?;
            group_faces.push(Face::new(face_plane, contour)?);
            outer_rings_2d.push(ring_2d);
        }

        for (hole, probe) in hole_rings {
            let owner = outer_rings_2d
                .iter()
                .position(|ring| point_in_ring(&probe, ring));
            if let Some(owner) = owner {
                group_faces[owner].holes.push(hole);
            }
            // A hole with no enclosing boundary in its plane group is CSG
            // noise; dropping it keeps the shell closed
        }

        faces.extend(group_faces);
    }

    Ok(Solid::new(faces))
}

/// 2-D point-in-polygon by ray casting
fn point_in_ring(point: &Point2<f64>, ring: &[Point2<f64>]) -> bool {
    let mut inside = false;
    let n = ring.len();
    let mut j = n - 1;
    for i in 0..n {
        let a = &ring[i];
        let b = &ring[j];
        if (a.y > point.y) != (b.y > point.y) {
            let x = a.x + (point.y - a.y) / (b.y - a.y) * (b.x - a.x);
            if point.x < x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}
