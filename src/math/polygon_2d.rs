use super::{Point2, Vector2, TOLERANCE};

/// Computes the signed area of a closed polygon (shoelace formula).
///
/// Positive for counter-clockwise, negative for clockwise.
#[must_use]
pub fn signed_area_2d(points: &[Point2]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        sum += points[i].x * points[j].y - points[j].x * points[i].y;
    }
    sum * 0.5
}

/// Winding number of `point` with respect to the closed polygon `verts`.
///
/// Non-zero => inside, zero => outside.
#[must_use]
pub fn winding_number_2d(point: &Point2, verts: &[Point2]) -> i32 {
    let n = verts.len();
    let mut winding = 0i32;
    for i in 0..n {
        let a = verts[i];
        let b = verts[(i + 1) % n];
        let side = cross_2d(&(b - a), &(point - a));
        if a.y <= point.y {
            if b.y > point.y && side > 0.0 {
                winding += 1;
            }
        } else if b.y <= point.y && side < 0.0 {
            winding -= 1;
        }
    }
    winding
}

/// Point-in-polygon test using the winding number.
#[must_use]
pub fn point_in_polygon_2d(point: &Point2, verts: &[Point2]) -> bool {
    verts.len() >= 3 && winding_number_2d(point, verts) != 0
}

/// Distance from `point` to the closed polyline `verts`.
#[must_use]
pub fn distance_to_loop_2d(point: &Point2, verts: &[Point2]) -> f64 {
    let n = verts.len();
    let mut best = f64::INFINITY;
    for i in 0..n {
        let a = verts[i];
        let b = verts[(i + 1) % n];
        best = best.min(distance_to_segment_2d(point, &a, &b));
    }
    best
}

/// Distance from `point` to the segment `[a, b]`.
#[must_use]
pub fn distance_to_segment_2d(point: &Point2, a: &Point2, b: &Point2) -> f64 {
    let ab = b - a;
    let len_sq = ab.norm_squared();
    if len_sq < TOLERANCE * TOLERANCE {
        return (point - a).norm();
    }
    let t = ((point - a).dot(&ab) / len_sq).clamp(0.0, 1.0);
    (point - (a + ab * t)).norm()
}

/// 2D cross product `a.x * b.y - a.y * b.x`.
#[inline]
#[must_use]
pub fn cross_2d(a: &Vector2, b: &Vector2) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Finds a point strictly inside a region bounded by `loops`.
///
/// The first loop is the outer boundary, the others are holes. Horizontal
/// scan lines are intersected with every loop and the midpoint of the widest
/// interior span is returned.
#[must_use]
pub fn interior_point_2d(loops: &[Vec<Point2>]) -> Option<Point2> {
    let outer = loops.first()?;
    if outer.len() < 3 {
        return None;
    }
    let (y_min, y_max) = outer
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
            (lo.min(p.y), hi.max(p.y))
        });
    if y_max - y_min < TOLERANCE {
        return None;
    }

    let fractions = [0.5, 0.3127, 0.6873, 0.1841, 0.8159, 0.4213, 0.5787, 0.0731, 0.9269];
    let mut best: Option<(f64, Point2)> = None;
    for f in fractions {
        let y = y_min + (y_max - y_min) * f;
        let mut xs = Vec::new();
        for verts in loops {
            let n = verts.len();
            for i in 0..n {
                let a = verts[i];
                let b = verts[(i + 1) % n];
                if (a.y <= y) != (b.y <= y) {
                    xs.push(a.x + (y - a.y) * (b.x - a.x) / (b.y - a.y));
                }
            }
        }
        xs.sort_by(f64::total_cmp);
        for pair in xs.chunks_exact(2) {
            let width = pair[1] - pair[0];
            if best.is_none_or(|(w, _)| width > w) {
                best = Some((width, Point2::new(0.5 * (pair[0] + pair[1]), y)));
            }
        }
    }
    best.filter(|(w, _)| *w > TOLERANCE).map(|(_, p)| p)
}

/// Axis-aligned bounds of a point set as `(min, max)`.
#[must_use]
pub fn bounds_2d(points: &[Point2]) -> (Point2, Point2) {
    let mut lo = Point2::new(f64::INFINITY, f64::INFINITY);
    let mut hi = Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
    for p in points {
        lo = lo.inf(p);
        hi = hi.sup(p);
    }
    (lo, hi)
}
