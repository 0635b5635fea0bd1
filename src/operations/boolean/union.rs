use crate::error::Result;
use crate::topology::{Shape, TopologyStore};

use super::engine::{boolean_op, BooleanResult};
use super::options::BooleanOptions;
use super::select::BooleanKind;

/// Computes the Boolean union of two shapes.
#[derive(Debug, Clone)]
pub struct Union {
    object: Shape,
    tool: Shape,
    options: BooleanOptions,
}

impl Union {
    /// Creates a new `Union` operation with default options.
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

    /// Executes the union, creating the result entities in the topology store.
    ///
    /// # Errors
    ///
    /// Returns an error if the selected faces do not close or the operation
    /// is cancelled.
    pub fn execute(&self, store: &mut TopologyStore) -> Result<BooleanResult> {
        boolean_op(store, self.object, self.tool, BooleanKind::Union, &self.options)
    }
}
