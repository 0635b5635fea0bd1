//! Boolean operations on boundary representations.
//!
//! The pipeline runs in phases over an [`IntersectionDS`](ds::IntersectionDS):
//! the filler intersects every pair of sub-shapes, the pave builder splits
//! edges, the face builder splits faces, and the classifier, selection
//! table and assembler turn the split faces into the result.

mod assemble;
mod classify;
mod ds;
mod engine;
mod face_builder;
mod fill;
mod history;
mod intersect;
mod intersect_op;
mod merge;
mod options;
mod pave;
mod pool;
mod report;
mod section;
mod select;
mod subtract;
mod union;

#[cfg(test)]
mod properties;

pub use classify::{classify_point_in_solid, PointClassification};
pub use ds::{Interference, IntersectionRecord, RecordKind, SubParam};
pub use engine::{boolean_op, BooleanResult};
pub use history::{Evolution, History};
pub use intersect_op::Intersection;
pub use options::{BooleanOptions, CancelToken};
pub use report::{Report, Warning};
pub use section::Section;
pub use select::BooleanKind;
pub use subtract::Cut;
pub use union::Union;
