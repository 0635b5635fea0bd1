use crate::error::Result;
pub use crate::math::aabb::Aabb;
use crate::topology::explore::{edges_of, vertices_of};
use crate::topology::{Shape, TopologyStore};

/// Computes the axis-aligned bounding box of a shape.
///
/// Curved edges are sampled, and the box is enlarged by the largest
/// tolerance found. An empty compound yields an empty box.
pub struct BoundingBox {
    shape: Shape,
}

impl BoundingBox {
    /// Creates a new `BoundingBox` query.
    #[must_use]
    pub fn new(shape: impl Into<Shape>) -> Self {
        Self { shape: shape.into() }
    }

    /// Executes the query, returning the AABB.
    ///
    /// # Errors
    ///
    /// Returns an error if the shape references missing entities.
    pub fn execute(&self, store: &TopologyStore) -> Result<Aabb> {
        let mut aabb = Aabb::empty();
        let mut margin: f64 = 0.0;
        for v in vertices_of(store, self.shape)? {
            let data = store.vertex(v)?;
            aabb.include_point(&data.point);
            margin = margin.max(data.tolerance);
        }
        for e in edges_of(store, self.shape)? {
            let data = store.edge(e)?;
            for p in data.sample() {
                aabb.include_point(&p);
            }
            margin = margin.max(data.tolerance);
        }
        Ok(if aabb.is_empty() { aabb } else { aabb.enlarged(margin) })
    }
}
