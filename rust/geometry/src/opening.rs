// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Opening/void resolver
//!
//! Computes the cut solid, nominal height/width, and local placement of
//! a door/window rough opening against a host element, and duplicates
//! the opening across split-host fragments where its vertical span
//! covers more than one story.

use crate::curve::{Arc, Line};
use crate::error::Error;
use crate::profile::Profile;
use crate::sanitize::{sanitize_loop, SHORT_CURVE_TOLERANCE};
use crate::solid::Solid;
use crate::sweep::{arc_cut_solid, line_cut_solid};
use crate::validate::Validator;
use crate::EPS;
use ifc_mend_model::{Diagnostics, EntityArena, StepId};
use nalgebra::{Matrix4, Point3, Vector3};
use rustc_hash::FxHashSet;

/// Epsilon inset applied to both ends of the opening's vertical interval
/// before testing fragment overlap
const LEVEL_INSET: f64 = 1e-3;

/// Axis curve of a host element
#[derive(Debug, Clone)]
pub enum HostAxis {
    Line(Line),
    Arc(Arc),
}

/// One fragment of a (possibly split) host element
///
/// Split hosts model one logical wall as several fragments, one per
/// story; `base_elevation`/`top_elevation` bound the fragment's story in
/// the shared frame that `placement` maps host-local coordinates into.
#[derive(Debug, Clone)]
pub struct HostFragment {
    pub id: StepId,
    pub placement: Matrix4<f64>,
    pub axis: HostAxis,
    pub base_elevation: f64,
    pub top_elevation: f64,
}

/// A "voids" registration between a host fragment and an opening
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoidRelationship {
    pub host: StepId,
    pub opening: StepId,
}

/// Resolved opening geometry
#[derive(Debug, Clone)]
pub struct OpeningCut {
    /// Cut solid in the opening's canonical local frame
    pub solid: Solid,
    /// Nominal width along the host axis, for quantity takeoff
    pub width: f64,
    /// Nominal vertical height, for quantity takeoff
    pub height: f64,
    /// Placement of the canonical frame relative to the host assembly
    pub placement: Matrix4<f64>,
}

/// Fragment-id to vertical-range lookup
///
/// Built once per pass and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct LevelIndex {
    ranges: Vec<(StepId, f64, f64)>,
}

impl LevelIndex {
    pub fn build(fragments: &[HostFragment]) -> Self {
        let mut ranges: Vec<_> = fragments
            .iter()
            .map(|f| (f.id, f.base_elevation, f.top_elevation))
            .collect();
        ranges.sort_by(|a, b| a.1.total_cmp(&b.1));
        Self { ranges }
    }

    /// Fragments whose half-open `[base, top)` range overlaps the
    /// epsilon-inset interval `[z_min + eps, z_max - eps)`
    pub fn overlapping(&self, z_min: f64, z_max: f64) -> impl Iterator<Item = StepId> + '_ {
        let start = z_min + LEVEL_INSET;
        let end = z_max - LEVEL_INSET;
        self.ranges
            .iter()
            .filter(move |(_, base, top)| start < *top && *base < end)
            .map(|(id, _, _)| *id)
    }
}

/// Resolver for one host assembly
pub struct OpeningResolver {
    levels: LevelIndex,
}

impl OpeningResolver {
    /// Build the resolver (and its level index) for one pass
    pub fn new(fragments: &[HostFragment]) -> Self {
        Self {
            levels: LevelIndex::build(fragments),
        }
    }

    /// Resolve one opening against its host
    ///
    /// `cut_loop` is the rough-opening profile in the shared frame;
    /// `cut_direction` and `unscaled_depth` describe the cut in the
    /// host's local (un-scaled) frame. Returns `None` when the opening
    /// cannot be built; the caller falls back to coarser handling.
    #[allow(clippy::too_many_arguments)]
    pub fn resolve(
        &self,
        arena: &mut EntityArena,
        opening_id: StepId,
        cut_loop: &[Point3<f64>],
        cut_direction: Vector3<f64>,
        unscaled_depth: f64,
        host: &HostFragment,
        validator: &mut Validator,
        diag: &mut Diagnostics,
    ) -> Option<(OpeningCut, Vec<VoidRelationship>)> {
        if !(unscaled_depth > EPS) || !unscaled_depth.is_finite() {
            diag.fatal(
                Some(opening_id),
                format!("opening depth {unscaled_depth} is not a positive length"),
            );
            return None;
        }

        // Transform the cut loop into the host's local (un-scaled) frame
        let to_local = match host.placement.try_inverse() {
            Some(inverse) => inverse,
            None => {
                diag.error(Some(host.id), "host placement is singular");
                return None;
            }
        };
        let local_points: Vec<Point3<f64>> =
            cut_loop.iter().map(|p| to_local.transform_point(p)).collect();

        let cleaned = sanitize_loop(
            &local_points,
            None,
            true,
            SHORT_CURVE_TOLERANCE,
            diag,
        )?;

        let profile = match Profile::from_points(&cleaned.points) {
            Ok(profile) => profile,
            Err(e) => {
                diag.error(Some(opening_id), format!("opening profile rejected: {e}"));
                return None;
            }
        };

        // Nominal extents in the host-local frame: width along the host
        // axis, height along local up
        let axis_dir = match &host.axis {
            HostAxis::Line(line) => line.direction,
            HostAxis::Arc(arc) => {
                let (min, max) = profile.bounds_2d();
                let center = profile
                    .plane
                    .lift(&nalgebra::center(&min, &max));
                let radial = center - arc.center;
                arc.normal()
                    .cross(&radial)
                    .try_normalize(EPS)
                    .unwrap_or_else(Vector3::x)
            }
        };
        let width = extent_along(&cleaned.points, &axis_dir);
        let height = extent_along(&cleaned.points, &Vector3::z());

        // Build the cut solid per host axis shape
        let built = match &host.axis {
            HostAxis::Line(line) => {
                line_cut_solid(&profile, line.direction, cut_direction, unscaled_depth)
            }
            HostAxis::Arc(arc) => arc_cut_solid(&profile, arc, cut_direction, unscaled_depth),
        };
        let solid = match built {
            Ok(solid) => solid,
            Err(e @ Error::InvalidSweep(_)) => {
                // Degenerate sweep setup aborts this entity only
                diag.fatal(Some(opening_id), format!("opening cut rejected: {e}"));
                return None;
            }
            Err(e) => {
                diag.error(Some(opening_id), format!("opening cut failed: {e}"));
                return None;
            }
        };

        if !validator.is_valid(&solid) {
            diag.error(Some(opening_id), "opening cut solid failed validation");
            return None;
        }

        // Re-origin to the canonical local frame and compose the final
        // placement from the host placement and the re-origin offset
        let (canonical, _offset) = profile.reoriginated();
        let anchor = canonical.plane.origin;
        let local_solid = solid.translated(&(-anchor.coords));
        let placement = host.placement * Matrix4::new_translation(&anchor.coords);

        // Vertical span of the cut in the shared frame
        let world = solid.transformed(&host.placement).ok()?;
        let bounds = world.bounds();
        let relationships =
            self.register_voids(arena, opening_id, host.id, bounds.min.z, bounds.max.z, diag);

        Some((
            OpeningCut {
                solid: local_solid,
                width,
                height,
                placement,
            },
            relationships,
        ))
    }

    /// Register the opening against every host fragment it spans
    ///
    /// The original opening id voids the primary host; each additional
    /// overlapped fragment receives a clone with a fresh identity. The
    /// per-call used-hosts set guards against double registration.
    fn register_voids(
        &self,
        arena: &mut EntityArena,
        opening_id: StepId,
        primary_host: StepId,
        z_min: f64,
        z_max: f64,
        diag: &mut Diagnostics,
    ) -> Vec<VoidRelationship> {
        let mut used_hosts: FxHashSet<StepId> = FxHashSet::default();
        let mut relationships = vec![VoidRelationship {
            host: primary_host,
            opening: opening_id,
        }];
        used_hosts.insert(primary_host);

        for fragment in self.levels.overlapping(z_min, z_max) {
            if !used_hosts.insert(fragment) {
                continue;
            }
            match arena.clone_with_new_id(opening_id) {
                Ok(clone) => {
                    diag.verbose(
                        Some(opening_id),
                        format!("opening spans fragment {fragment}; registered clone {clone}"),
                    );
                    relationships.push(VoidRelationship {
                        host: fragment,
                        opening: clone,
                    });
                }
                Err(e) => {
                    diag.error(Some(opening_id), format!("could not clone opening: {e}"));
                }
            }
        }

        relationships
    }
}

/// Extent of a point set along a direction
fn extent_along(points: &[Point3<f64>], axis: &Vector3<f64>) -> f64 {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for p in points {
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
