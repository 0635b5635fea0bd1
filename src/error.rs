use thiserror::Error;

use crate::operations::boolean::History;
use crate::topology::EdgeId;

/// Top-level error type for the Boolean kernel.
#[derive(Debug, Error)]
pub enum BrepError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error(transparent)]
    Operation(#[from] OperationError),

    #[error(transparent)]
    Boolean(#[from] BooleanError),
}

/// Errors related to geometric computations.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("parameter {parameter} = {value} is out of range [{min}, {max}]")]
    ParameterOutOfRange {
        parameter: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("degenerate geometry: {0}")]
    Degenerate(String),

    #[error("zero-length vector")]
    ZeroVector,
}

/// Errors related to topological operations.
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("entity not found: {0}")]
    EntityNotFound(String),

    #[error("wire is not closed")]
    WireNotClosed,

    #[error("invalid topology: {0}")]
    InvalidTopology(String),
}

/// Errors related to CAD operations.
#[derive(Debug, Error)]
pub enum OperationError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("operation failed: {0}")]
    Failed(String),
}

/// Fatal outcomes of a Boolean operation.
#[derive(Debug, Error)]
pub enum BooleanError {
    /// Some edges of the selected faces are not shared by exactly two faces.
    #[error("result is not manifold: {} edge(s) with bad face count", edges.len())]
    NonManifoldResult {
        edges: Vec<EdgeId>,
        /// History accumulated up to the failure.
        history: Box<History>,
    },

    #[error("operation cancelled")]
    Cancelled,
}

/// Convenience type alias for results using [`BrepError`].
pub type Result<T> = std::result::Result<T, BrepError>;
