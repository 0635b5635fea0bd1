use crate::error::Result;
use crate::topology::{Shape, TopologyStore};

use super::engine::{boolean_op, BooleanResult};
use super::options::BooleanOptions;
use super::select::BooleanKind;

/// Computes the material common to two shapes.
#[derive(Debug, Clone)]
pub struct Intersection {
    object: Shape,
    tool: Shape,
    options: BooleanOptions,
}

impl Intersection {
    /// Creates a new `Intersection` operation with default options.
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

    /// Executes the intersection. Disjoint operands give an empty compound.
    ///
    /// # Errors
    ///
    /// Returns an error if the selected faces do not close or the operation
    /// is cancelled.
    pub fn execute(&self, store: &mut TopologyStore) -> Result<BooleanResult> {
        boolean_op(store, self.object, self.tool, BooleanKind::Intersection, &self.options)
    }
}
