use crate::error::Result;
use crate::topology::{Shape, TopologyStore};

use super::engine::{boolean_op, BooleanResult};
use super::options::BooleanOptions;
use super::select::BooleanKind;

/// Computes the intersection edges of the boundaries of two shapes.
///
/// The result is a compound of edges: the section curves trimmed to both
/// faces, plus the boundaries of regions where the faces coincide.
#[derive(Debug, Clone)]
pub struct Section {
    object: Shape,
    tool: Shape,
    options: BooleanOptions,
}

impl Section {
    /// Creates a new `Section` operation with default options.
    #[must_use]
    pub fn new(object: impl Into<Shape>, tool: impl Into<Shape>) -> Self {
        Self {
            object: object.into(),
            tool: tool.into(),
            options: BooleanOptions::default(),
        }
    }

    /// Replaces the default options of the operation.
    #[must_use]
    pub fn with_options(mut self, options: BooleanOptions) -> Self {
        self.options = options;
        self
    }

    /// Executes the section.
    ///
    /// # Errors
    ///
    /// Returns an error if an operand references missing entities or the
    /// operation is cancelled.
    pub fn execute(&self, store: &mut TopologyStore) -> Result<BooleanResult> {
        boolean_op(store, self.object, self.tool, BooleanKind::Section, &self.options)
    }
}
