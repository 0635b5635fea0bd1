use std::sync::Arc;

use crate::error::{GeometryError, Result};
use crate::math::{Point3, Vector3, TOLERANCE};

use super::{Curve, CurveDomain};

/// A piecewise-linear curve parameterized by arc length.
///
/// Used for intersection curves that have no closed form. The point array
/// is shared, so sub-edges cut from the same curve do not copy it.
/// A closed polyline is periodic with period [`length`](Self::length).
#[derive(Debug, Clone)]
pub struct Polyline {
    points: Arc<[Point3]>,
    /// Cumulative arc length at each point (and at the closing point).
    lengths: Arc<[f64]>,
    closed: bool,
}

impl Polyline {
    /// Creates a polyline through `points`.
    ///
    /// Consecutive duplicates are dropped. For a closed polyline the last
    /// point must not repeat the first; if it does, it is removed.
    ///
    /// # Errors
    ///
    /// Returns an error if fewer than two distinct points remain.
    pub fn new(points: Vec<Point3>, closed: bool) -> Result<Self> {
        let mut pts: Vec<Point3> = Vec::with_capacity(points.len());
        for p in points {
            if pts.last().is_none_or(|q: &Point3| (p - q).norm() > TOLERANCE) {
                pts.push(p);
            }
        }
        if closed && pts.len() > 2 {
            if let (Some(first), Some(last)) = (pts.first(), pts.last()) {
                if (first - last).norm() <= TOLERANCE {
                    pts.pop();
                }
            }
        }
        if pts.len() < 2 || (closed && pts.len() < 3) {
            return Err(GeometryError::Degenerate("polyline needs distinct points".into()).into());
        }

        let n = pts.len();
        let segments = if closed { n } else { n - 1 };
        let mut lengths = Vec::with_capacity(segments + 1);
        lengths.push(0.0);
        let mut acc = 0.0;
        for i in 0..segments {
            acc += (pts[(i + 1) % n] - pts[i]).norm();
            lengths.push(acc);
        }

        Ok(Self {
            points: pts.into(),
            lengths: lengths.into(),
            closed,
        })
    }

    /// Returns the vertices of the polyline.
    #[must_use]
    pub fn points(&self) -> &[Point3] {
        &self.points
    }

    /// Total arc length (including the closing segment when closed).
    #[must_use]
    pub fn length(&self) -> f64 {
        self.lengths.last().copied().unwrap_or(0.0)
    }

    fn segment_count(&self) -> usize {
        self.lengths.len() - 1
    }

    fn segment(&self, i: usize) -> (Point3, Point3) {
        let n = self.points.len();
        (self.points[i], self.points[(i + 1) % n])
    }

    /// Maps `t` into the base period for closed polylines.
    fn wrap(&self, t: f64) -> f64 {
        if self.closed {
            t.rem_euclid(self.length())
        } else {
            t
        }
    }

    /// Segment index and the local fraction for parameter `t`.
    fn locate(&self, t: f64) -> (usize, f64) {
        let t = self.wrap(t);
        let count = self.segment_count();
        let i = self
            .lengths
            .partition_point(|&l| l <= t)
            .saturating_sub(1)
            .min(count - 1);
        let span = self.lengths[i + 1] - self.lengths[i];
        let s = if span < TOLERANCE {
            0.0
        } else {
            (t - self.lengths[i]) / span
        };
        (i, s)
    }

    /// Parameters in `[t_min, t_max]` where the polyline has a corner,
    /// including both ends.
    #[must_use]
    pub fn knots(&self, t_min: f64, t_max: f64) -> Vec<f64> {
        let mut knots = vec![t_min];
        let period = self.length();
        let inner = &self.lengths[..self.lengths.len() - 1];
        if self.closed && period > TOLERANCE {
            let mut base = (t_min / period).floor() * period;
            while base < t_max {
                for &l in inner {
                    let k = base + l;
                    if k > t_min + TOLERANCE && k < t_max - TOLERANCE {
                        knots.push(k);
                    }
                }
                base += period;
            }
        } else {
            for &l in inner.iter().skip(1) {
                if l > t_min + TOLERANCE && l < t_max - TOLERANCE {
                    knots.push(l);
                }
            }
        }
        knots.push(t_max);
        knots
    }
}

impl Curve for Polyline {
    fn evaluate(&self, t: f64) -> Point3 {
        // open polylines extend linearly past both ends (s outside [0, 1])
        let (i, s) = self.locate(t);
        let (a, b) = self.segment(i);
        a + (b - a) * s
    }

    fn derivative(&self, t: f64) -> Vector3 {
        let (i, _) = self.locate(t);
        let (a, b) = self.segment(i);
        let d = b - a;
        let len = d.norm();
        if len < TOLERANCE {
            Vector3::zeros()
        } else {
            d / len
        }
    }

    fn domain(&self) -> CurveDomain {
        CurveDomain::new(0.0, self.length())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn project(&self, point: &Point3, t_min: f64, t_max: f64) -> (f64, f64) {
        let knots = self.knots(t_min, t_max);
        let mut best = (t_min, f64::INFINITY);
        for w in knots.windows(2) {
            let (ka, kb) = (w[0], w[1]);
            let a = self.evaluate(ka);
            let b = self.evaluate(kb);
            let ab = b - a;
            let len_sq = ab.norm_squared();
            let s = if len_sq < TOLERANCE * TOLERANCE {
                0.0
            } else {
                ((point - a).dot(&ab) / len_sq).clamp(0.0, 1.0)
            };
            let dist = (point - (a + ab * s)).norm();
            if dist < best.1 {
                best = (ka + (kb - ka) * s, dist);
            }
        }
        best
    }
}
