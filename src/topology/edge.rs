use crate::geometry::curve::{Circle, Curve, Line, Polyline};
use crate::math::tolerance::CONFUSION;
use crate::math::{Point3, Vector3};

use super::vertex::VertexId;

slotmap::new_key_type! {
    /// Unique identifier for an edge in the topology store.
    pub struct EdgeId;
}

/// The geometric curve associated with an edge.
#[derive(Debug, Clone)]
pub enum EdgeCurve {
    /// A line segment.
    Line(Line),
    /// A circular arc.
    Circle(Circle),
    /// A sampled curve, typically produced by surface intersection.
    Polyline(Polyline),
}

impl EdgeCurve {
    fn as_curve(&self) -> &dyn Curve {
        match self {
            Self::Line(c) => c,
            Self::Circle(c) => c,
            Self::Polyline(c) => c,
        }
    }

    /// Evaluates the underlying curve at `t`.
    #[must_use]
    pub fn evaluate(&self, t: f64) -> Point3 {
        self.as_curve().evaluate(t)
    }

    /// First derivative of the underlying curve at `t`.
    #[must_use]
    pub fn derivative(&self, t: f64) -> Vector3 {
        self.as_curve().derivative(t)
    }

    /// Closest parameter in `[t_min, t_max]` and its distance.
    #[must_use]
    pub fn project(&self, point: &Point3, t_min: f64, t_max: f64) -> (f64, f64) {
        self.as_curve().project(point, t_min, t_max)
    }

    /// Whether the underlying curve is periodic.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.as_curve().is_closed()
    }

    /// Parameters where evaluation should sample `[t_min, t_max]` so that a
    /// chordal polygon follows the curve.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn sample_params(&self, t_min: f64, t_max: f64) -> Vec<f64> {
        match self {
            Self::Line(_) => vec![t_min, t_max],
            Self::Polyline(pl) => pl.knots(t_min, t_max),
            Self::Circle(_) => {
                let span = t_max - t_min;
                let n = ((span / (std::f64::consts::PI / 32.0)).ceil() as usize).max(2);
                (0..=n).map(|i| t_min + span * i as f64 / n as f64).collect()
            }
        }
    }
}

/// Data associated with a topological edge.
///
/// An edge connects two vertices and carries a geometric curve
/// that defines the shape of the edge between them.
#[derive(Debug, Clone)]
pub struct EdgeData {
    /// Start vertex of the edge.
    pub start: VertexId,
    /// End vertex of the edge.
    pub end: VertexId,
    /// The geometric curve defining this edge's shape.
    pub curve: EdgeCurve,
    /// Parameter on the curve corresponding to the start vertex.
    pub t_start: f64,
    /// Parameter on the curve corresponding to the end vertex.
    pub t_end: f64,
    /// Distance within which points count as lying on the edge.
    pub tolerance: f64,
}

impl EdgeData {
    /// Creates an edge with the default tolerance.
    #[must_use]
    pub fn new(start: VertexId, end: VertexId, curve: EdgeCurve, t_start: f64, t_end: f64) -> Self {
        Self {
            start,
            end,
            curve,
            t_start,
            t_end,
            tolerance: CONFUSION,
        }
    }

    /// Point at curve parameter `t`.
    #[must_use]
    pub fn point_at(&self, t: f64) -> Point3 {
        self.curve.evaluate(t)
    }

    /// Parameter midway along the edge.
    #[must_use]
    pub fn mid_param(&self) -> f64 {
        0.5 * (self.t_start + self.t_end)
    }

    /// Whether the edge starts and ends at the same vertex.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.start == self.end
    }

    /// Closest parameter on the edge's range and the distance to it.
    #[must_use]
    pub fn project(&self, point: &Point3) -> (f64, f64) {
        self.curve.project(point, self.t_start, self.t_end)
    }

    /// Points sampled along the edge in its natural direction.
    #[must_use]
    pub fn sample(&self) -> Vec<Point3> {
        self.curve
            .sample_params(self.t_start, self.t_end)
            .into_iter()
            .map(|t| self.curve.evaluate(t))
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn circle_samples_are_dense() {
        let c = Circle::new(Point3::origin(), 1.0, Vector3::z(), Vector3::x()).unwrap();
        let params = EdgeCurve::Circle(c).sample_params(0.0, PI);
        assert_eq!(params.len(), 33);
        assert!((params[32] - PI).abs() < 1e-12);
    }

    #[test]
    fn line_samples_are_endpoints() {
        let l = Line::new(Point3::origin(), Vector3::x()).unwrap();
        let params = EdgeCurve::Line(l).sample_params(0.5, 2.0);
        assert_eq!(params, vec![0.5, 2.0]);
    }
}
