pub mod error;
pub mod geometry;
pub mod math;
pub mod operations;
pub mod topology;

pub use error::{BrepError, Result};
pub use operations::boolean::{
    boolean_op, BooleanKind, BooleanOptions, BooleanResult, CancelToken, History, Report, Warning,
};
