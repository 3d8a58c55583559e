// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Unit scaling for length values
//!
//! Length attributes arrive in IFC file units (often millimeters) and must
//! be scaled to modeling units (meters) before any geometric operation.
//! The factor is caller-supplied; extracting it from the unit assignment
//! chain is the parser's job, not this kernel's.

use crate::error::{Error, Result};

/// Multiplier converting file-unit lengths to modeling units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitScale(f64);

impl UnitScale {
    /// Create a scale from a conversion factor (e.g. 0.001 for millimeters)
    pub fn new(factor: f64) -> Result<Self> {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(Error::InvalidUnitScale(factor));
        }
        Ok(Self(factor))
    }

    /// Identity scale - file units are already modeling units
    pub fn identity() -> Self {
        Self(1.0)
    }

    /// The raw conversion factor
    pub fn factor(&self) -> f64 {
        self.0
    }

    /// Scale a length from file units to modeling units
    #[inline]
    pub fn length(&self, value: f64) -> f64 {
        value * self.0
    }
}

impl Default for UnitScale {
    fn default() -> Self {
        Self::identity()
    }
}
