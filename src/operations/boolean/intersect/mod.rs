//! Pairwise geometric intersection of sub-shapes.
//!
//! Every function here is pure: it reads geometry and returns hits plus the
//! numerical issues met on the way. Turning hits into vertices, paves and
//! section edges is the filler's job.

mod edge_edge;
mod edge_face;
mod face_face;
mod marching;
mod vertex;

pub(crate) use edge_edge::{edge_edge, EdgeEdgeHit};
pub(crate) use edge_face::{edge_face, EdgeFaceHit};
pub(crate) use face_face::{face_face, FaceFace, SectionGeom};
pub(crate) use vertex::{vertex_edge, vertex_face};

/// A numerical problem that made a pair yield fewer hits than it may have.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Issue {
    Degenerate(String),
    IterationLimit,
}

/// Hits of one pair plus the issues met while computing them.
#[derive(Debug, Clone)]
pub(crate) struct Outcome<T> {
    pub hits: Vec<T>,
    pub issues: Vec<Issue>,
}

impl<T> Default for Outcome<T> {
    fn default() -> Self {
        Self {
            hits: Vec::new(),
            issues: Vec::new(),
        }
    }
}

impl<T> Outcome<T> {
    pub(crate) fn is_empty(&self) -> bool {
        self.hits.is_empty() && self.issues.is_empty()
    }
}
