//! # IFC-Mend Model
//!
//! In-memory IFC entity graph for the geometry reconstruction kernel.
//!
//! This crate deliberately knows nothing about STEP tokenizing: the entity
//! graph is handed in pre-parsed. It provides:
//!
//! - **Entity arena**: entities keyed by their integer step-id, with
//!   named-attribute access and cloning under a fresh identity
//! - **Unit scaling**: lengths arrive in file units and are scaled to
//!   modeling units before any geometric operation
//! - **Diagnostics**: a structured sink of per-entity log entries with
//!   severities, alongside `tracing` events

pub mod diag;
pub mod entity;
pub mod error;
pub mod units;

pub use diag::{DiagEntry, Diagnostics, Severity};
pub use entity::{AttributeValue, Entity, EntityArena, EntityKind, StepId};
pub use error::{Error, Result};
pub use units::UnitScale;
