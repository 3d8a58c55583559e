// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Loop sanitizer - removes near-duplicate and back-tracking vertices
//!
//! The output loop never contains a zero-length or reversing segment.
//! Removals are advisory (verbose-only diagnostics); the operation aborts
//! only when fewer than the minimum vertices survive, and then only for
//! this loop - the caller decides whether that is fatal for the solid.

use ifc_mend_model::{Diagnostics, StepId};
use nalgebra::Point3;

/// Minimum surviving segment length
pub const SHORT_CURVE_TOLERANCE: f64 = 1e-4;

/// Cosine threshold for the parallel-opposite-direction (near-180°) test
const REVERSAL_COS: f64 = -0.9999;

/// Result of sanitizing a polyline loop
#[derive(Debug, Clone)]
pub struct SanitizedLoop {
    /// Cleaned vertex sequence; closed loops carry an explicit wrap point
    pub points: Vec<Point3<f64>>,
    /// Whether the input's first and last points already coincided
    pub was_already_closed: bool,
    /// Number of input vertices dropped
    pub dropped: usize,
}

/// Sanitize an ordered point sequence representing a polyline loop
///
/// `sources`, when given, carries the step-id of each input vertex's
/// originating entity for diagnostics. `force_closed` asks for a closed
/// output loop with an explicit wrap vertex; the original closing vertex
/// is always preserved over interior points when re-closing.
///
/// Returns `None` when fewer than the minimum vertices survive
/// (2 open, 4 closed counting the wrap).
pub fn sanitize_loop(
    points: &[Point3<f64>],
    sources: Option<&[StepId]>,
    force_closed: bool,
    tolerance: f64,
    diag: &mut Diagnostics,
) -> Option<SanitizedLoop> {
    let source_of = |i: usize| sources.and_then(|s| s.get(i)).copied();

    if points.len() < 2 {
        diag.error(source_of(0), format!("loop has only {} points", points.len()));
        return None;
    }

    let was_already_closed =
        (points[points.len() - 1] - points[0]).norm() < tolerance;

    // An explicit wrap vertex is redundant during the walk
    let walk = if was_already_closed {
        &points[..points.len() - 1]
    } else {
        points
    };

    let mut kept: Vec<Point3<f64>> = Vec::with_capacity(walk.len());
    let mut dropped = 0usize;
    kept.push(walk[0]);

    for (i, candidate) in walk.iter().enumerate().skip(1) {
        let last = kept[kept.len() - 1];
        let segment = candidate - last;

        if segment.norm() < tolerance {
            diag.verbose(
                source_of(i),
                format!("dropping vertex {i}: segment shorter than tolerance"),
            );
            dropped += 1;
            continue;
        }

        if kept.len() >= 2 {
            let prev = (last - kept[kept.len() - 2]).normalize();
            let next = segment.normalize();
            if prev.dot(&next) < REVERSAL_COS {
                diag.verbose(
                    source_of(i),
                    format!("dropping vertex {i}: segment back-tracks onto the previous one"),
                );
                dropped += 1;
                continue;
            }
        }

        kept.push(*candidate);
    }

    if force_closed {
        // Re-verify closure after point removal. If the closing segment
        // became too short, discard the second-to-last point rather than
        // the closing vertex itself.
        while kept.len() > 1 && (kept[kept.len() - 1] - kept[0]).norm() < tolerance {
            diag.verbose(
                None,
                "dropping second-to-last vertex: closing segment shorter than tolerance",
            );
            kept.pop();
            dropped += 1;
        }

        if kept.len() < 3 {
            diag.error(
                source_of(0),
                format!(
                    "closed loop reduced to {} vertices after cleanup, need 3",
                    kept.len()
                ),
            );
            return None;
        }

        let wrap = kept[0];
        kept.push(wrap);
    } else if kept.len() < 2 {
        diag.error(
            source_of(0),
            "open loop reduced to a single vertex after cleanup",
        );
        return None;
    }

    Some(SanitizedLoop {
        points: kept,
        was_already_closed,
        dropped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_with_wrap() -> Vec<Point3<f64>> {
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 0.0),
        ]
    }

    #[test]
    fn test_idempotent_on_clean_input() {
        let mut diag = Diagnostics::new();
        let input = square_with_wrap();
        let out = sanitize_loop(&input, None, true, SHORT_CURVE_TOLERANCE, &mut diag).unwrap();

        assert_eq!(out.points, input);
        assert_eq!(out.dropped, 0);
        assert!(out.was_already_closed);

        // Sanitizing the output changes nothing further
        let again = sanitize_loop(&out.points, None, true, SHORT_CURVE_TOLERANCE, &mut diag).unwrap();
        assert_eq!(again.points, out.points);
    }

    #[test]
    fn test_adjacent_duplicate_removed() {
        let mut diag = Diagnostics::new();
        let mut input = square_with_wrap();
        input.insert(2, Point3::new(1.0 + 1e-7, 0.0, 0.0)); // Near-duplicate of vertex 1

        let out = sanitize_loop(&input, None, true, 1e-4, &mut diag).unwrap();
        assert!(out.points.len() < input.len());
        assert_eq!(out.dropped, 1);

        // No surviving segment is shorter than tolerance
        for pair in out.points.windows(2) {
            assert!((pair[1] - pair[0]).norm() >= 1e-4);
        }
    }

    #[test]
    fn test_backtracking_vertex_removed() {
        let mut diag = Diagnostics::new();
        let input = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0), // Reverses onto the previous segment
            Point3::new(2.0, 1.0, 0.0),
        ];

        let out = sanitize_loop(&input, None, false, 1e-4, &mut diag).unwrap();
        assert_eq!(out.dropped, 1);
        assert_eq!(out.points.len(), 3);
    }

    #[test]
    fn test_reclose_preserves_original_closing_vertex() {
        let mut diag = Diagnostics::new();
        // The last interior vertex sits almost on top of the first point,
        // so once the explicit wrap is stripped the closing segment
        // collapses; the interior vertex must be the one discarded.
        let near_start = Point3::new(4e-4, 0.0, 0.0);
        let input = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            near_start,
            Point3::new(0.0, 0.0, 0.0),
        ];

        let out = sanitize_loop(&input, None, true, 1e-3, &mut diag).unwrap();
        assert_eq!(out.dropped, 1);
        assert_eq!(out.points.first(), Some(&Point3::new(0.0, 0.0, 0.0)));
        assert_eq!(out.points.last(), Some(&Point3::new(0.0, 0.0, 0.0)));
        assert!(!out.points.contains(&near_start));
    }

    #[test]
    fn test_rejects_underfilled_loops() {
        let mut diag = Diagnostics::with_verbose(true);
        let input = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1e-7, 0.0, 0.0),
            Point3::new(0.0, 1e-7, 0.0),
        ];
        assert!(sanitize_loop(&input, None, true, 1e-4, &mut diag).is_none());
        // The rejection itself is an error entry, not verbose-only
        assert!(!diag.is_empty());
    }

    #[test]
    fn test_source_ids_tagged_in_diagnostics() {
        let mut diag = Diagnostics::with_verbose(true);
        let input = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1e-7, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
        ];
        let ids = [StepId(11), StepId(12), StepId(13), StepId(14)];
        sanitize_loop(&input, Some(&ids), false, 1e-4, &mut diag).unwrap();

        let entry = &diag.entries()[0];
        assert_eq!(entry.step_id, Some(StepId(12)));
    }
}
