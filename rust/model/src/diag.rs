// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Diagnostics sink for the geometry kernel
//!
//! Entries are tagged with the originating step-id and a severity. Verbose
//! entries (vertex cleanup and similar common, usually harmless removals)
//! are only collected when verbose mode is on; they always emit a
//! `tracing::debug!` event either way.

use crate::entity::StepId;
use std::fmt;

/// Severity of a diagnostic entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Common, usually harmless cleanup; reported only in verbose mode
    Verbose,
    /// Non-fatal degradation (e.g. geometry nudged before a boolean)
    Warning,
    /// Processing continues degraded for this shape
    Error,
    /// This entity's shape is skipped entirely
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Verbose => "verbose",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Fatal => "fatal",
        };
        f.write_str(s)
    }
}

/// A single diagnostic entry
#[derive(Debug, Clone)]
pub struct DiagEntry {
    /// Originating entity, when known
    pub step_id: Option<StepId>,
    pub severity: Severity,
    pub message: String,
}

impl fmt::Display for DiagEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.step_id {
            Some(id) => write!(f, "[{}] {}: {}", self.severity, id, self.message),
            None => write!(f, "[{}] {}", self.severity, self.message),
        }
    }
}

/// Collector of diagnostic entries for one import/export pass
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<DiagEntry>,
    verbose: bool,
}

impl Diagnostics {
    /// Create a new sink with verbose reporting off
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new sink with the given verbose setting
    pub fn with_verbose(verbose: bool) -> Self {
        Self {
            entries: Vec::new(),
            verbose,
        }
    }

    /// Record a verbose-only entry
    pub fn verbose(&mut self, step_id: Option<StepId>, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(step_id = step_id.map(|id| id.0), "{}", message);
        if self.verbose {
            self.entries.push(DiagEntry {
                step_id,
                severity: Severity::Verbose,
                message,
            });
        }
    }

    /// Record a warning
    pub fn warning(&mut self, step_id: Option<StepId>, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(step_id = step_id.map(|id| id.0), "{}", message);
        self.entries.push(DiagEntry {
            step_id,
            severity: Severity::Warning,
            message,
        });
    }

    /// Record an error (processing continues degraded)
    pub fn error(&mut self, step_id: Option<StepId>, message: impl Into<String>) {
        let message = message.into();
        tracing::error!(step_id = step_id.map(|id| id.0), "{}", message);
        self.entries.push(DiagEntry {
            step_id,
            severity: Severity::Error,
            message,
        });
    }

    /// Record a fatal entry (this entity's shape is skipped)
    pub fn fatal(&mut self, step_id: Option<StepId>, message: impl Into<String>) {
        let message = message.into();
        tracing::error!(step_id = step_id.map(|id| id.0), fatal = true, "{}", message);
        self.entries.push(DiagEntry {
            step_id,
            severity: Severity::Fatal,
            message,
        });
    }

    /// All collected entries, in recording order
    pub fn entries(&self) -> &[DiagEntry] {
        &self.entries
    }

    /// Entries at or above a severity
    pub fn at_least(&self, severity: Severity) -> impl Iterator<Item = &DiagEntry> {
        self.entries.iter().filter(move |e| e.severity >= severity)
    }

    /// Check whether any fatal entry was recorded
    pub fn has_fatal(&self) -> bool {
        self.entries.iter().any(|e| e.severity == Severity::Fatal)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
