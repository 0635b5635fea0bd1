use std::collections::HashMap;

use crate::math::Point3;
use crate::topology::{Shape, TopologyStore, VertexData, VertexId};

use super::ds::{IntersectionDS, Rank};
use super::report::{Report, Warning};

const MAX_RINGS: i64 = 3;

/// Spatial hash of the representative vertices of one operation.
///
/// Every new intersection point is matched against the vertices already
/// present within the combined tolerance; only when none is close enough a
/// new vertex is created. The survivor's tolerance grows to cover the
/// absorbed point.
pub(crate) struct VertexPool {
    cell_size: f64,
    fuzzy: f64,
    tolerance_bound: f64,
    /// Largest tolerance of any representative; widens the search.
    max_tolerance: f64,
    cells: HashMap<(i64, i64, i64), Vec<VertexId>>,
    entries: HashMap<VertexId, Entry>,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    point: Point3,
    tolerance: f64,
    original: bool,
}

impl VertexPool {
    pub(crate) fn new(fuzzy: f64, tolerance_bound: f64) -> Self {
        Self {
            cell_size: (2.0 * tolerance_bound + fuzzy).max(1e-6),
            fuzzy,
            tolerance_bound,
            max_tolerance: 0.0,
            cells: HashMap::new(),
            entries: HashMap::new(),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn cell_key(&self, p: &Point3) -> (i64, i64, i64) {
        let inv = 1.0 / self.cell_size;
        (
            (p.x * inv).floor() as i64,
            (p.y * inv).floor() as i64,
            (p.z * inv).floor() as i64,
        )
    }

    /// Registers an existing vertex as a representative.
    pub(crate) fn insert(&mut self, vertex: VertexId, point: Point3, tolerance: f64, original: bool) {
        let key = self.cell_key(&point);
        self.cells.entry(key).or_default().push(vertex);
        self.max_tolerance = self.max_tolerance.max(tolerance);
        self.entries.insert(
            vertex,
            Entry {
                point,
                tolerance,
                original,
            },
        );
    }

    /// Stops `vertex` from standing for new points.
    pub(crate) fn remove(&mut self, vertex: VertexId) {
        let Some(entry) = self.entries.remove(&vertex) else {
            return;
        };
        let key = self.cell_key(&entry.point);
        if let Some(cell) = self.cells.get_mut(&key) {
            cell.retain(|&v| v != vertex);
        }
    }

    /// Closest representative within the combined tolerance of `point`.
    ///
    /// Searches as many rings of cells as the largest combined tolerance
    /// spans, so representatives grown past the bound are still found. Past
    /// a few rings every representative is checked directly.
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn find(&self, point: &Point3, tolerance: f64) -> Option<(VertexId, f64)> {
        let radius = self.max_tolerance + tolerance + self.fuzzy;
        let rings = ((radius / self.cell_size).ceil() as i64).max(1);
        let mut best: Option<(VertexId, f64)> = None;
        let mut consider = |id: VertexId| {
            let Some(entry) = self.entries.get(&id) else {
                return;
            };
            let d = (point - entry.point).norm();
            if d <= entry.tolerance + tolerance + self.fuzzy && best.is_none_or(|(_, bd)| d < bd) {
                best = Some((id, d));
            }
        };
        if rings > MAX_RINGS {
            self.entries.keys().copied().for_each(&mut consider);
            return best;
        }
        let key = self.cell_key(point);
        for dx in -rings..=rings {
            for dy in -rings..=rings {
                for dz in -rings..=rings {
                    if let Some(ids) = self.cells.get(&(key.0 + dx, key.1 + dy, key.2 + dz)) {
                        ids.iter().copied().for_each(&mut consider);
                    }
                }
            }
        }
        best
    }

    /// Grows the tolerance of `vertex` so it covers a point at `distance`
    /// with its own `tolerance`.
    pub(crate) fn absorb(
        &mut self,
        store: &mut TopologyStore,
        ds: &mut IntersectionDS,
        report: &mut Report,
        vertex: VertexId,
        distance: f64,
        tolerance: f64,
        sources: &[Shape],
    ) {
        let Some(entry) = self.entries.get_mut(&vertex) else {
            return;
        };
        let needed = distance + tolerance;
        if needed <= entry.tolerance {
            return;
        }
        entry.tolerance = needed;
        self.max_tolerance = self.max_tolerance.max(needed);
        if entry.original {
            ds.grow_tolerance(vertex, needed);
        } else if let Ok(data) = store.vertex_mut(vertex) {
            data.tolerance = data.tolerance.max(needed);
        }
        if needed > self.tolerance_bound {
            let mut shapes = vec![Shape::Vertex(vertex)];
            shapes.extend_from_slice(sources);
            report.push(Warning::ToleranceConflict {
                shapes,
                tolerance: needed,
            });
        }
    }

    /// Vertex standing for `point`: an existing representative when one is
    /// close enough, otherwise a new vertex indexed as derived under `rank`.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn find_or_insert(
        &mut self,
        store: &mut TopologyStore,
        ds: &mut IntersectionDS,
        report: &mut Report,
        point: Point3,
        tolerance: f64,
        rank: Rank,
        sources: &[Shape],
    ) -> VertexId {
        if let Some((id, d)) = self.find(&point, tolerance) {
            self.absorb(store, ds, report, id, d, tolerance, sources);
            return id;
        }
        let id = store.add_vertex(VertexData::with_tolerance(point, tolerance));
        ds.add_derived(Shape::Vertex(id), rank);
        self.insert(id, point, tolerance, false);
        id
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    #[test]
    fn close_points_share_a_vertex() {
        let mut store = TopologyStore::new();
        let mut ds = IntersectionDS::new();
        let mut report = Report::default();
        let mut pool = VertexPool::new(0.0, 1e-3);
        let a = pool.find_or_insert(&mut store, &mut ds, &mut report, p(1.0, 2.0, 3.0), 1e-7, Rank::A, &[]);
        let b = pool.find_or_insert(&mut store, &mut ds, &mut report, p(1.0, 2.0, 3.0 + 1e-8), 1e-7, Rank::B, &[]);
        let c = pool.find_or_insert(&mut store, &mut ds, &mut report, p(1.0, 2.0, 3.1), 1e-7, Rank::B, &[]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(store.vertex_count(), 2);
        assert!(!report.has_warnings());
    }

    #[test]
    fn growth_past_bound_is_reported() {
        let mut store = TopologyStore::new();
        let mut ds = IntersectionDS::new();
        let mut report = Report::default();
        let mut pool = VertexPool::new(0.0, 1e-6);
        let v = store.add_vertex(VertexData::with_tolerance(p(0.0, 0.0, 0.0), 1e-5));
        pool.insert(v, p(0.0, 0.0, 0.0), 1e-5, true);
        let w = pool.find_or_insert(&mut store, &mut ds, &mut report, p(1.5e-5, 0.0, 0.0), 1e-5, Rank::B, &[]);
        assert_eq!(v, w);
        assert!(matches!(report.warnings[0], Warning::ToleranceConflict { .. }));
        // input vertex untouched, growth tracked in the data structure
        assert!((store.vertex(v).unwrap().tolerance - 1e-5).abs() < 1e-15);
        assert!(ds.tolerance(v, 0.0) > 2e-5);
    }

    #[test]
    fn neighbouring_cells_are_searched() {
        let mut pool = VertexPool::new(0.0, 1e-3);
        let mut store = TopologyStore::new();
        let v = store.add_vertex(VertexData::new(p(0.0, 0.0, 0.0)));
        pool.insert(v, p(-1e-9, -1e-9, -1e-9), 1e-7, true);
        assert_eq!(pool.find(&p(1e-9, 1e-9, 1e-9), 1e-7).map(|(id, _)| id), Some(v));
    }

    #[test]
    fn grown_vertices_are_found_beyond_one_cell() {
        let mut store = TopologyStore::new();
        let mut ds = IntersectionDS::new();
        let mut report = Report::default();
        let mut pool = VertexPool::new(0.0, 1e-6);
        let v = store.add_vertex(VertexData::with_tolerance(p(0.0, 0.0, 0.0), 1e-4));
        pool.insert(v, p(0.0, 0.0, 0.0), 1e-4, true);
        // fifty cells away, still inside the vertex tolerance
        let w = pool.find_or_insert(&mut store, &mut ds, &mut report, p(1e-4, 0.0, 0.0), 1e-7, Rank::B, &[]);
        assert_eq!(v, w);
        let far = pool.find_or_insert(&mut store, &mut ds, &mut report, p(1e-3, 0.0, 0.0), 1e-7, Rank::B, &[]);
        assert_ne!(v, far);
        assert_eq!(store.vertex_count(), 2);
    }
}
