// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Solid validator
//!
//! Acceptance gate for constructed solids: a solid is valid when its
//! tessellated boundary is a closed, outward-oriented shell with
//! non-zero volume per shell and finite coordinates.
//!
//! Closedness is checked by signed interval cancellation per supporting
//! line rather than exact edge pairing, so tessellations that refine the
//! same boundary differently on two faces (T-vertices) still cancel.
//!
//! The validator owns reusable scratch buffers for the duration of one
//! pass; they are cleared on every call and released when the validator
//! is dropped, on all exit paths.

use crate::mesh::Mesh;
use crate::solid::Solid;
use crate::EPS;
use nalgebra::{Point3, Vector3};
use rustc_hash::FxHashMap;

/// Minimum acceptable shell volume, in cubic modeling units
const VOLUME_EPS: f64 = 1e-9;

/// Welding quantum for vertex coincidence (micrometer at meter scale)
const WELD_SCALE: f64 = 1e6;

/// Maximum findings reported per solid before truncation
const MAX_FINDINGS: usize = 8;

/// Validator with per-pass scratch buffers
#[derive(Debug, Default)]
pub struct Validator {
    scratch: Mesh,
    weld: FxHashMap<(i64, i64, i64), u32>,
}

impl Validator {
    /// Acquire a validator (and its scratch storage) for one pass
    pub fn new() -> Self {
        Self::default()
    }

    /// Check a solid against the structural invariants
    pub fn is_valid(&mut self, solid: &Solid) -> bool {
        self.diagnose(solid).is_empty()
    }

    /// Human-readable findings; empty means the solid is valid
    pub fn diagnose(&mut self, solid: &Solid) -> Vec<String> {
        let mut findings = Vec::new();

        if solid.is_empty() {
            findings.push("solid has no faces".to_string());
            return findings;
        }

        self.scratch.clear();
        for face in &solid.faces {
            if let Err(e) = face.tessellate_into(&mut self.scratch) {
                findings.push(format!("face tessellation failed: {e}"));
                return findings;
            }
        }

        if self.scratch.is_empty() {
            findings.push("boundary tessellated to nothing".to_string());
            return findings;
        }
        if !self.scratch.is_finite() {
            findings.push("boundary contains non-finite coordinates".to_string());
            return findings;
        }

        // Weld coincident vertices so per-face tessellations share identity
        self.weld.clear();
        let mut welded_of = vec![0u32; self.scratch.vertex_count()];
        let mut next = 0u32;
        for i in 0..self.scratch.vertex_count() {
            let p = self.scratch.vertex(i as u32);
            let key = (
                (p.x * WELD_SCALE).round() as i64,
                (p.y * WELD_SCALE).round() as i64,
                (p.z * WELD_SCALE).round() as i64,
            );
            welded_of[i] = *self.weld.entry(key).or_insert_with(|| {
                let id = next;
                next += 1;
                id
            });
        }

        let mut shells = UnionFind::new(next as usize);
        let mut triangles = Vec::with_capacity(self.scratch.triangle_count());
        for tri in 0..self.scratch.triangle_count() {
            let i = tri * 3;
            let a = welded_of[self.scratch.indices[i] as usize];
            let b = welded_of[self.scratch.indices[i + 1] as usize];
            let c = welded_of[self.scratch.indices[i + 2] as usize];
            if a == b || b == c || c == a {
                continue; // Sliver collapsed by welding
            }
            shells.union(a, b);
            shells.union(b, c);
            triangles.push((tri, a));
        }

        if triangles.is_empty() {
            findings.push("every boundary triangle is degenerate".to_string());
            return findings;
        }

        // Per-shell signed volume via the divergence theorem
        let mut shell_volumes: FxHashMap<u32, f64> = FxHashMap::default();
        for &(tri, rep) in &triangles {
            let (a, b, c) = self.scratch.triangle(tri);
            let contribution = a.coords.dot(&b.coords.cross(&c.coords)) / 6.0;
            *shell_volumes.entry(shells.find(rep)).or_insert(0.0) += contribution;
        }

        // Cavity shells of a hollow solid are legitimately negative, so
        // orientation is judged on the net volume
        for volume in shell_volumes.values() {
            if volume.abs() < VOLUME_EPS {
                findings.push(format!("shell has near-zero volume ({volume:.3e})"));
            }
        }
        let net: f64 = shell_volumes.values().sum();
        if net < VOLUME_EPS {
            findings.push(format!(
                "boundary is inverted or empty: net enclosed volume {net:.3e}"
            ));
        }

        self.check_closedness(&welded_of, &mut findings);

        findings.truncate(MAX_FINDINGS);
        if !findings.is_empty() {
            tracing::debug!(count = findings.len(), "solid failed validation");
        }
        findings
    }

    /// Closed 2-manifold check by signed interval cancellation
    ///
    /// Every directed triangle edge contributes a signed interval on its
    /// supporting line; a closed, consistently oriented boundary cancels
    /// to zero net coverage everywhere. Leftover coverage is an open or
    /// inconsistently oriented boundary.
    fn check_closedness(&self, welded_of: &[u32], findings: &mut Vec<String>) {
        type LineKey = (i64, i64, i64, i64, i64, i64);
        let mut lines: FxHashMap<LineKey, Vec<(f64, f64, f64)>> = FxHashMap::default();

        let quant = |v: f64| (v * WELD_SCALE).round() as i64;

        for tri in 0..self.scratch.triangle_count() {
            let i = tri * 3;
            let raw = [
                self.scratch.indices[i],
                self.scratch.indices[i + 1],
                self.scratch.indices[i + 2],
            ];
            let (wa, wb, wc) = (
                welded_of[raw[0] as usize],
                welded_of[raw[1] as usize],
                welded_of[raw[2] as usize],
            );
            if wa == wb || wb == wc || wc == wa {
                continue;
            }
            let corners = [
                self.scratch.vertex(raw[0]),
                self.scratch.vertex(raw[1]),
                self.scratch.vertex(raw[2]),
            ];
            for e in 0..3 {
                let a: Point3<f64> = corners[e];
                let b: Point3<f64> = corners[(e + 1) % 3];
                let d = match (b - a).try_normalize(EPS) {
                    Some(d) => d,
                    None => continue,
                };
                // Canonical line orientation so opposite edges share a key
                let dir: Vector3<f64> = if (d.x, d.y, d.z) < (0.0, 0.0, 0.0) { -d } else { d };
                let anchor = a - dir * a.coords.dot(&dir);
                let key = (
                    quant(dir.x),
                    quant(dir.y),
                    quant(dir.z),
                    quant(anchor.x),
                    quant(anchor.y),
                    quant(anchor.z),
                );
                // Coverage sign: +1 along the canonical direction, -1 against
                let ta = a.coords.dot(&dir);
                let tb = b.coords.dot(&dir);
                lines
                    .entry(key)
                    .or_default()
                    .push((ta.min(tb), ta.max(tb), (tb - ta).signum()));
            }
        }

        let mut leftover = 0.0f64;
        for intervals in lines.values() {
            let mut breaks: Vec<f64> = Vec::with_capacity(intervals.len() * 2);
            for &(s, e, _) in intervals {
                breaks.push(s);
                breaks.push(e);
            }
            breaks.sort_by(|a, b| a.total_cmp(b));
            breaks.dedup_by(|a, b| (*a - *b).abs() < EPS);

            for span in breaks.windows(2) {
                let mid = (span[0] + span[1]) * 0.5;
                let net: f64 = intervals
                    .iter()
                    .filter(|&&(s, e, _)| s <= mid && mid <= e)
                    .map(|&(_, _, sign)| sign)
                    .sum();
                if net.abs() > 0.5 {
                    leftover += span[1] - span[0];
                }
            }
        }

        if leftover > EPS * 10.0 {
            findings.push(format!(
                "boundary is not closed: {leftover:.6} of unmatched edge length"
            ));
        }
    }
}

/// Minimal union-find over welded vertex ids
struct UnionFind {
    parent: Vec<u32>,
}

impl UnionFind {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size as u32).collect(),
        }
    }

    fn find(&mut self, mut x: u32) -> u32 {
        while self.parent[x as usize] != x {
            let grandparent = self.parent[self.parent[x as usize] as usize];
            self.parent[x as usize] = grandparent;
            x = grandparent;
        }
        x
    }

    fn union(&mut self, a: u32, b: u32) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent[ra as usize] = rb;
        }
    }
}
