//! IFC-Mend Geometry Kernel
//!
//! Reconstructs validated boundary-representation solids from a pre-parsed
//! IFC entity graph, repairing the malformed input real files contain:
//! degenerate loops, near-duplicate vertices, non-planar faces, and
//! boolean operation failures.
//!
//! Data flow: raw boundary description → loop sanitizer → swept/extruded
//! profile builder + boolean combiner → validator → opening resolver →
//! `Solid` (or no result, signalling the caller to fall back).

pub mod bbox;
pub mod boolean;
pub mod curve;
pub mod error;
pub mod mesh;
pub mod opening;
pub mod placement;
pub mod profile;
pub mod router;
pub mod sanitize;
pub mod solid;
pub mod sweep;
pub mod triangulation;
pub mod validate;

// Re-export nalgebra types for convenience
pub use nalgebra::{Matrix4, Point2, Point3, Vector2, Vector3};

pub use bbox::BoundingBox;
pub use boolean::{combine, BooleanOp, CombineReport};
pub use curve::{Arc, Curve, CurveLoop, Line, Polyline};
pub use error::{Error, Result};
pub use mesh::Mesh;
pub use opening::{HostAxis, HostFragment, LevelIndex, OpeningCut, OpeningResolver, VoidRelationship};
pub use profile::{Plane, Profile};
pub use router::{BuildContext, ShapeRouter};
pub use sanitize::sanitize_loop;
pub use solid::{Face, Solid};
pub use sweep::{extrude_profile, sweep_profile_along_curve};
pub use validate::Validator;

/// Fixed epsilon, in modeling-unit meters, governing all almost-equal
/// comparisons in the kernel. Never compare coordinates with `==`.
pub const EPS: f64 = 1e-6;
