use crate::error::{OperationError, Result};
use crate::math::tolerance::CONFUSION;
use crate::topology::{EdgeCurve, EdgeData, EdgeId, TopologyStore, VertexId};

/// Creates an edge on a curve between two existing vertices.
pub struct MakeEdge {
    start: VertexId,
    end: VertexId,
    curve: EdgeCurve,
    t_start: f64,
    t_end: f64,
}

impl MakeEdge {
    /// Creates a new `MakeEdge` operation.
    #[must_use]
    pub fn new(start: VertexId, end: VertexId, curve: EdgeCurve, t_start: f64, t_end: f64) -> Self {
        Self {
            start,
            end,
            curve,
            t_start,
            t_end,
        }
    }

    /// Executes the operation, creating the edge in the topology store.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameter range is empty or a vertex does not
    /// lie on the curve at its parameter.
    pub fn execute(&self, store: &mut TopologyStore) -> Result<EdgeId> {
        if self.t_end - self.t_start <= 0.0 {
            return Err(OperationError::InvalidInput("edge parameter range is empty".into()).into());
        }
        let mut tolerance = CONFUSION;
        for (vid, t) in [(self.start, self.t_start), (self.end, self.t_end)] {
            let vertex = store.vertex(vid)?;
            let gap = (self.curve.evaluate(t) - vertex.point).norm();
            if gap > vertex.tolerance.max(CONFUSION) {
                return Err(OperationError::InvalidInput(format!(
                    "vertex is {gap:e} away from the curve at t = {t}"
                ))
                .into());
            }
            tolerance = tolerance.max(gap);
        }
        let mut data = EdgeData::new(self.start, self.end, self.curve.clone(), self.t_start, self.t_end);
        data.tolerance = tolerance;
        Ok(store.add_edge(data))
    }
}
