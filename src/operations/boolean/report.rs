use tracing::warn;

use crate::topology::Shape;

/// A non-fatal event absorbed during a Boolean operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    /// A degenerate configuration (zero-length edge, tangent surfaces, an
    /// untrimmable curve) was skipped.
    GeometricDegeneracy { shapes: Vec<Shape>, reason: String },
    /// Merging coincident entities grew a tolerance past the bound.
    ToleranceConflict { shapes: Vec<Shape>, tolerance: f64 },
    /// A root search stopped without converging and was treated as
    /// "no intersection".
    IterationLimit { shapes: Vec<Shape>, iterations: usize },
}

/// Diagnostics of a Boolean operation.
#[derive(Debug, Clone, Default)]
pub struct Report {
    pub warnings: Vec<Warning>,
    /// Number of interferences found per pair kind (`"VV"`, `"EF"`, ...).
    pub counters: Vec<(&'static str, usize)>,
}

impl Report {
    pub(crate) fn push(&mut self, warning: Warning) {
        match &warning {
            Warning::GeometricDegeneracy { shapes, reason } => {
                warn!(?shapes, %reason, "geometric degeneracy skipped");
            }
            Warning::ToleranceConflict { shapes, tolerance } => {
                warn!(?shapes, tolerance, "tolerance grew past bound");
            }
            Warning::IterationLimit { shapes, iterations } => {
                warn!(?shapes, iterations, "root search hit iteration limit");
            }
        }
        self.warnings.push(warning);
    }

    pub(crate) fn count(&mut self, phase: &'static str, n: usize) {
        self.counters.push((phase, n));
    }

    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Interferences recorded for `phase`, zero if the phase did not run.
    #[must_use]
    pub fn counter(&self, phase: &str) -> usize {
        self.counters
            .iter()
            .filter(|(p, _)| *p == phase)
            .map(|(_, n)| n)
            .sum()
    }
}
