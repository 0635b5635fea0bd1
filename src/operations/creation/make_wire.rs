use crate::error::{OperationError, Result};
use crate::geometry::curve::Line;
use crate::math::tolerance::CONFUSION;
use crate::math::Point3;
use crate::topology::{EdgeCurve, EdgeData, OrientedEdge, TopologyStore, VertexData, WireData, WireId};

/// Creates a wire of line segments from a sequence of 3D points.
pub struct MakeWire {
    points: Vec<Point3>,
    close: bool,
}

impl MakeWire {
    /// Creates a new `MakeWire` operation.
    #[must_use]
    pub fn new(points: Vec<Point3>, close: bool) -> Self {
        Self { points, close }
    }

    /// Executes the operation, creating the wire in the topology store.
    ///
    /// One vertex is created per point; a closed wire links the last point
    /// back to the first.
    ///
    /// # Errors
    ///
    /// Returns an error if there are too few points or two consecutive
    /// points coincide.
    pub fn execute(&self, store: &mut TopologyStore) -> Result<WireId> {
        let n = self.points.len();
        if n < 2 || (self.close && n < 3) {
            return Err(OperationError::InvalidInput("wire needs more points".into()).into());
        }

        let vertices: Vec<_> = self
            .points
            .iter()
            .map(|p| store.add_vertex(VertexData::new(*p)))
            .collect();

        let segments = if self.close { n } else { n - 1 };
        let mut edges = Vec::with_capacity(segments);
        for i in 0..segments {
            let j = (i + 1) % n;
            let (a, b) = (self.points[i], self.points[j]);
            let length = (b - a).norm();
            if length <= CONFUSION {
                return Err(OperationError::InvalidInput(format!("wire points {i} and {j} coincide")).into());
            }
            let line = Line::through(&a, &b)?;
            let edge = store.add_edge(EdgeData::new(
                vertices[i],
                vertices[j],
                EdgeCurve::Line(line),
                0.0,
                length,
            ));
            edges.push(OrientedEdge::new(edge, true));
        }

        Ok(store.add_wire(WireData {
            edges,
            is_closed: self.close,
        }))
    }
}
