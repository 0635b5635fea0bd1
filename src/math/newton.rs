//! Bounded iterative solvers.
//!
//! Every solver stops after `max_iterations` steps and reports
//! [`SolveFailure::IterationLimit`] instead of looping.

use super::{Matrix3, Point3, Vector3, TOLERANCE};

/// Why an iterative solve did not produce a root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveFailure {
    /// The iteration cap was hit before convergence.
    IterationLimit,
    /// The system became singular (parallel tangents, tangent surfaces).
    Singular,
    /// The bracket does not enclose a sign change.
    NoBracket,
}

/// Finds a root of `f` inside `[a, b]` where `f(a)` and `f(b)` differ in sign.
///
/// Uses the Illinois variant of regula falsi. Converged when `|f| <= f_tol`.
///
/// # Errors
///
/// Returns [`SolveFailure::NoBracket`] if the end values share a sign and
/// [`SolveFailure::IterationLimit`] if `max_iterations` is exhausted.
pub fn bracketed_root(
    f: impl Fn(f64) -> f64,
    mut a: f64,
    mut b: f64,
    f_tol: f64,
    max_iterations: usize,
) -> Result<f64, SolveFailure> {
    let mut fa = f(a);
    let mut fb = f(b);
    if fa.abs() <= f_tol {
        return Ok(a);
    }
    if fb.abs() <= f_tol {
        return Ok(b);
    }
    if fa.signum() == fb.signum() {
        return Err(SolveFailure::NoBracket);
    }

    let mut side = 0i8;
    for _ in 0..max_iterations {
        let c = (a * fb - b * fa) / (fb - fa);
        let fc = f(c);
        if fc.abs() <= f_tol || (b - a).abs() <= TOLERANCE * (1.0 + a.abs()) {
            return Ok(c);
        }
        if fc.signum() == fb.signum() {
            b = c;
            fb = fc;
            if side == -1 {
                fa *= 0.5;
            }
            side = -1;
        } else {
            a = c;
            fa = fc;
            if side == 1 {
                fb *= 0.5;
            }
            side = 1;
        }
    }
    Err(SolveFailure::IterationLimit)
}

/// Gauss-Newton search for the mutually closest parameters of two curves.
///
/// `eval_a` and `eval_b` return the point and first derivative at a
/// parameter. Parameters are clamped to their ranges at every step.
///
/// # Errors
///
/// Returns [`SolveFailure::Singular`] when the tangents are parallel at the
/// current estimate and [`SolveFailure::IterationLimit`] when no converged
/// estimate is reached.
pub fn curve_curve_closest(
    eval_a: impl Fn(f64) -> (Point3, Vector3),
    range_a: (f64, f64),
    eval_b: impl Fn(f64) -> (Point3, Vector3),
    range_b: (f64, f64),
    seed: (f64, f64),
    max_iterations: usize,
) -> Result<(f64, f64), SolveFailure> {
    let (mut s, mut t) = seed;
    for _ in 0..max_iterations {
        let (pa, da) = eval_a(s);
        let (pb, db) = eval_b(t);
        let d = pa - pb;

        let m11 = da.dot(&da);
        let m12 = -da.dot(&db);
        let m22 = db.dot(&db);
        let g1 = da.dot(&d);
        let g2 = -db.dot(&d);
        let det = m11 * m22 - m12 * m12;
        if det.abs() <= 1e-14 * (m11 * m22).max(TOLERANCE) {
            return Err(SolveFailure::Singular);
        }
        let ds = -(m22 * g1 - m12 * g2) / det;
        let dt = -(m11 * g2 - m12 * g1) / det;

        let s_next = (s + ds).clamp(range_a.0, range_a.1);
        let t_next = (t + dt).clamp(range_b.0, range_b.1);
        let moved = (da * (s_next - s)).norm() + (db * (t_next - t)).norm();
        s = s_next;
        t = t_next;
        if moved <= 1e-13 * (1.0 + pa.coords.norm()) {
            return Ok((s, t));
        }
    }
    Err(SolveFailure::IterationLimit)
}

/// Newton corrector onto the intersection of two implicit surfaces.
///
/// `f1` and `f2` return the signed distance and its gradient. The point is
/// constrained to the plane through `plane_point` with normal `plane_normal`,
/// which fixes the position along the intersection curve.
///
/// # Errors
///
/// Returns [`SolveFailure::Singular`] when the gradients and the plane normal
/// are linearly dependent (tangent surfaces) and
/// [`SolveFailure::IterationLimit`] when `tol` is not reached.
pub fn surface_pair_correct(
    f1: impl Fn(&Point3) -> (f64, Vector3),
    f2: impl Fn(&Point3) -> (f64, Vector3),
    plane_point: &Point3,
    plane_normal: &Vector3,
    start: &Point3,
    tol: f64,
    max_iterations: usize,
) -> Result<Point3, SolveFailure> {
    let mut p = *start;
    for _ in 0..max_iterations {
        let (v1, g1) = f1(&p);
        let (v2, g2) = f2(&p);
        let v3 = plane_normal.dot(&(p - plane_point));
        if v1.abs() <= tol * 1e-3 && v2.abs() <= tol * 1e-3 && v3.abs() <= tol * 1e-3 {
            return Ok(p);
        }
        let jac = Matrix3::from_rows(&[g1.transpose(), g2.transpose(), plane_normal.transpose()]);
        let rhs = Vector3::new(-v1, -v2, -v3);
        let Some(step) = jac.lu().solve(&rhs) else {
            return Err(SolveFailure::Singular);
        };
        p += step;
        if step.norm() <= tol * 1e-6 {
            return Ok(p);
        }
    }
    Err(SolveFailure::IterationLimit)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    #[test]
    fn root_of_cosine() {
        let r = bracketed_root(f64::cos, 0.0, 3.0, 1e-14, 64).unwrap();
        assert!((r - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn no_bracket_is_reported() {
        assert_eq!(
            bracketed_root(|x| x * x + 1.0, -1.0, 1.0, 1e-12, 64),
            Err(SolveFailure::NoBracket)
        );
    }

    #[test]
    fn iteration_cap_is_honoured() {
        assert_eq!(
            bracketed_root(|x| x.powi(11) - 0.3, 0.0, 1.0, 1e-300, 2),
            Err(SolveFailure::IterationLimit)
        );
    }

    #[test]
    fn closest_points_of_crossing_segments() {
        let a = |s: f64| (p(s, 0.0, 0.0), Vector3::x());
        let b = |t: f64| (p(0.5, t, 0.2), Vector3::y());
        let (s, t) = curve_curve_closest(a, (0.0, 1.0), b, (-1.0, 1.0), (0.1, 0.7), 32).unwrap();
        assert!((s - 0.5).abs() < 1e-12);
        assert!(t.abs() < 1e-12);
    }

    #[test]
    fn parallel_tangents_are_singular() {
        let a = |s: f64| (p(s, 0.0, 0.0), Vector3::x());
        let b = |t: f64| (p(t, 1.0, 0.0), Vector3::x());
        assert_eq!(
            curve_curve_closest(a, (0.0, 1.0), b, (0.0, 1.0), (0.5, 0.5), 32),
            Err(SolveFailure::Singular)
        );
    }

    #[test]
    fn corrector_lands_on_two_planes() {
        let f1 = |q: &Point3| (q.z - 1.0, Vector3::z());
        let f2 = |q: &Point3| (q.y + 2.0, Vector3::y());
        let q = surface_pair_correct(
            f1,
            f2,
            &p(3.0, 0.0, 0.0),
            &Vector3::x(),
            &p(2.5, 0.3, 0.8),
            1e-7,
            16,
        )
        .unwrap();
        assert!((q - p(3.0, -2.0, 1.0)).norm() < 1e-12);
    }
}
