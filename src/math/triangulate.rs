use std::collections::{HashMap, VecDeque};

use spade::handles::{FixedFaceHandle, InnerTag};
use spade::{
    ConstrainedDelaunayTriangulation, InsertionError, Point2 as SpadePoint2, Triangulation,
};

use crate::error::{GeometryError, Result};

use super::Point2;

type Cdt = ConstrainedDelaunayTriangulation<SpadePoint2<f64>>;

/// Triangulates the region bounded by closed `loops` (outer boundaries and
/// holes, any nesting) using a constrained Delaunay triangulation.
///
/// `steiner` points are inserted as extra vertices; points outside the
/// region are harmless. Returned triangles are counter-clockwise.
///
/// # Errors
///
/// Returns an error if a point cannot be inserted (non-finite coordinates).
pub fn triangulate_loops(loops: &[Vec<Point2>], steiner: &[Point2]) -> Result<Vec<[Point2; 3]>> {
    let mut cdt = Cdt::new();
    for verts in loops {
        insert_constraint_loop(&mut cdt, verts)?;
    }
    for pt in steiner {
        cdt.insert(SpadePoint2::new(pt.x, pt.y))
            .map_err(|e: InsertionError| GeometryError::Degenerate(format!("CDT insert: {e:?}")))?;
    }

    let interior = classify_interior_faces(&cdt);
    let mut triangles = Vec::new();
    for face in cdt.inner_faces() {
        if interior.get(&face.fix().index()).is_some_and(|d| d % 2 == 1) {
            let [a, b, c] = face.vertices().map(|vh| {
                let pos = vh.position();
                Point2::new(pos.x, pos.y)
            });
            triangles.push([a, b, c]);
        }
    }
    Ok(triangles)
}

fn insert_constraint_loop(cdt: &mut Cdt, points: &[Point2]) -> Result<()> {
    if points.len() < 3 {
        return Ok(());
    }

    let mut handles = Vec::with_capacity(points.len());
    for pt in points {
        let h = cdt
            .insert(SpadePoint2::new(pt.x, pt.y))
            .map_err(|e: InsertionError| GeometryError::Degenerate(format!("CDT insert: {e:?}")))?;
        handles.push(h);
    }

    for i in 0..handles.len() {
        let from = handles[i];
        let to = handles[(i + 1) % handles.len()];
        if from != to && cdt.can_add_constraint(from, to) {
            cdt.add_constraint(from, to);
        }
    }
    Ok(())
}

/// Flood-fills the triangulation from the convex hull inwards. Crossing a
/// constraint edge increments the depth; odd depth means interior.
fn classify_interior_faces(cdt: &Cdt) -> HashMap<usize, u32> {
    let mut depth_map: HashMap<usize, u32> = HashMap::new();
    let mut queue: VecDeque<(FixedFaceHandle<InnerTag>, u32)> = VecDeque::new();

    let outer_fix = cdt.outer_face().fix();
    for edge in cdt.directed_edges() {
        if edge.face().fix() != outer_fix {
            continue;
        }
        if let Some(inner) = edge.rev().face().as_inner() {
            let idx = inner.fix().index();
            if depth_map.contains_key(&idx) {
                continue;
            }
            let depth = u32::from(cdt.is_constraint_edge(edge.as_undirected().fix()));
            depth_map.insert(idx, depth);
            queue.push_back((inner.fix(), depth));
        }
    }

    while let Some((face_fix, depth)) = queue.pop_front() {
        let face = cdt.face(face_fix);
        for edge in face.adjacent_edges() {
            let Some(neighbor) = edge.rev().face().as_inner() else {
                continue;
            };
            let n_idx = neighbor.fix().index();
            if depth_map.contains_key(&n_idx) {
                continue;
            }
            let next = depth + u32::from(cdt.is_constraint_edge(edge.as_undirected().fix()));
            depth_map.insert(n_idx, next);
            queue.push_back((neighbor.fix(), next));
        }
    }
    depth_map
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::math::polygon_2d::signed_area_2d;

    fn q(x: f64, y: f64) -> Point2 {
        Point2::new(x, y)
    }

    fn area(tris: &[[Point2; 3]]) -> f64 {
        tris.iter().map(|t| signed_area_2d(t)).sum()
    }

    #[test]
    fn square_with_hole_area() {
        let outer = vec![q(0.0, 0.0), q(4.0, 0.0), q(4.0, 4.0), q(0.0, 4.0)];
        let hole = vec![q(1.0, 1.0), q(1.0, 3.0), q(3.0, 3.0), q(3.0, 1.0)];
        let tris = triangulate_loops(&[outer, hole], &[]).unwrap();
        assert!((area(&tris) - 12.0).abs() < 1e-12);
        assert!(tris.iter().all(|t| signed_area_2d(t) > 0.0), "triangles must be CCW");
    }

    #[test]
    fn steiner_points_keep_area() {
        let outer = vec![q(0.0, 0.0), q(2.0, 0.0), q(2.0, 1.0), q(0.0, 1.0)];
        let steiner = [q(0.5, 0.5), q(1.5, 0.5), q(5.0, 5.0)];
        let tris = triangulate_loops(&[outer], &steiner).unwrap();
        assert!((area(&tris) - 2.0).abs() < 1e-12);
        assert!(tris.len() >= 4);
    }
}
