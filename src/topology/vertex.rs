use crate::math::tolerance::CONFUSION;
use crate::math::Point3;

slotmap::new_key_type! {
    /// Unique identifier for a vertex in the topology store.
    pub struct VertexId;
}

/// Data associated with a topological vertex.
///
/// The vertex stands for every point within `tolerance` of `point`.
#[derive(Debug, Clone)]
pub struct VertexData {
    /// The 3D position of the vertex.
    pub point: Point3,
    /// Radius of the tolerance sphere around `point`.
    pub tolerance: f64,
}

impl VertexData {
    /// Creates a new vertex at the given point with the default tolerance.
    #[must_use]
    pub fn new(point: Point3) -> Self {
        Self {
            point,
            tolerance: CONFUSION,
        }
    }

    /// Creates a new vertex with an explicit tolerance.
    #[must_use]
    pub fn with_tolerance(point: Point3, tolerance: f64) -> Self {
        Self {
            point,
            tolerance: tolerance.max(CONFUSION),
        }
    }
}
