//! Splits every operand face along the section edges lying in it.
//!
//! Each face is redrawn in its oriented UV plane as a graph of half-edges:
//! boundary images contribute one half-edge in their wire direction, split
//! edges inside the face contribute both. Loops are traced by always taking
//! the sharpest clockwise turn, which walks every region with the region on
//! the left. Counter-clockwise loops bound new faces; clockwise loops are
//! holes and go to the smallest face that encloses them.

use std::collections::{HashMap, HashSet};
use std::f64::consts::TAU;

use tracing::{debug, trace};

use crate::error::Result;
use crate::math::polygon_2d::{interior_point_2d, point_in_polygon_2d, signed_area_2d};
use crate::math::{Point2, Point3, Vector2, TOLERANCE};
use crate::topology::explore::oriented_ends;
use crate::topology::face_uv::{face_interior_point, FaceUv};
use crate::topology::{EdgeId, FaceData, FaceId, OrientedEdge, Shape, TopologyStore, VertexId, WireData};

use super::ds::{IntersectionDS, Rank};
use super::fill::par_map;
use super::options::BooleanOptions;
use super::pave::Splits;
use super::report::{Report, Warning};

/// One face of the split operands.
#[derive(Debug, Clone)]
pub(crate) struct SplitFace {
    pub face: FaceId,
    /// Original face this one was cut from.
    pub source: FaceId,
    pub rank: Rank,
    /// A point strictly inside the face, used for classification.
    pub interior: Option<Point3>,
    /// Edges of the face, sorted.
    pub edges: Vec<EdgeId>,
}

#[derive(Debug, Default)]
pub(crate) struct SplitFaces {
    pub faces: Vec<SplitFace>,
    /// Split faces of every original face.
    pub images: HashMap<FaceId, Vec<FaceId>>,
}

#[derive(Debug)]
struct Region {
    outer: Vec<OrientedEdge>,
    holes: Vec<Vec<OrientedEdge>>,
    interior: Option<Point3>,
}

#[derive(Debug)]
enum Plan {
    Keep(Option<Point3>),
    Build(Vec<Region>),
}

struct Job {
    face: FaceId,
    rank: Rank,
    /// Boundary images per wire, outer first.
    wires: Vec<Vec<OrientedEdge>>,
    internal: Vec<EdgeId>,
    unchanged: bool,
}

struct HalfEdge {
    edge: OrientedEdge,
    from: VertexId,
    to: VertexId,
    uv: Vec<Point2>,
}

impl HalfEdge {
    fn start_dir(&self) -> Vector2 {
        end_direction(self.uv.iter())
    }

    fn end_dir(&self) -> Vector2 {
        -end_direction(self.uv.iter().rev())
    }
}

/// Direction of the first non-degenerate segment of a point sequence.
fn end_direction<'p>(mut pts: impl Iterator<Item = &'p Point2>) -> Vector2 {
    let Some(first) = pts.next() else {
        return Vector2::zeros();
    };
    pts.map(|q| q - first)
        .find(|d| d.norm() > TOLERANCE)
        .map_or_else(Vector2::zeros, |d| d.normalize())
}

/// Splits every original face of both operands.
///
/// # Errors
///
/// Returns an error if an entity referenced by the filler is missing.
pub(crate) fn build_faces(
    store: &mut TopologyStore,
    ds: &IntersectionDS,
    splits: &Splits,
    options: &BooleanOptions,
    report: &mut Report,
) -> Result<SplitFaces> {
    let mut on_face: HashMap<FaceId, HashSet<EdgeId>> = HashMap::new();
    for (edge, faces) in &splits.sections {
        for f in faces {
            on_face.entry(*f).or_default().insert(*edge);
        }
    }
    for (f, edges) in &splits.in_face {
        on_face.entry(*f).or_default().extend(edges.iter().copied());
    }

    let mut jobs = Vec::new();
    for info in ds.originals() {
        let Shape::Face(face) = info.shape else {
            continue;
        };
        let data = store.face(face)?;
        let mut wires = Vec::new();
        let mut unchanged = true;
        for wire in data.wires() {
            let mut images = Vec::new();
            for oe in &store.wire(wire)?.edges {
                let split = splits.images(oe.edge);
                unchanged &= split.len() == 1 && split[0] == (oe.edge, true);
                if oe.forward {
                    images.extend(split.iter().map(|&(e, same)| OrientedEdge::new(e, same)));
                } else {
                    images.extend(split.iter().rev().map(|&(e, same)| OrientedEdge::new(e, !same)));
                }
            }
            wires.push(images);
        }
        let boundary: HashSet<EdgeId> = wires.iter().flatten().map(|oe| oe.edge).collect();
        let mut internal: Vec<EdgeId> = on_face
            .get(&face)
            .into_iter()
            .flatten()
            .copied()
            .filter(|e| !boundary.contains(e))
            .collect();
        internal.sort();
        jobs.push(Job {
            face,
            rank: info.rank,
            wires,
            internal,
            unchanged,
        });
    }

    let shared: &TopologyStore = store;
    let plans = par_map(options.parallel, &jobs, |job| plan(shared, job));

    let mut out = SplitFaces::default();
    let mut split_count = 0;
    for (job, planned) in jobs.iter().zip(plans) {
        let (plan, issues) = planned?;
        for reason in issues {
            report.push(Warning::GeometricDegeneracy {
                shapes: vec![Shape::Face(job.face)],
                reason,
            });
        }
        let images = out.images.entry(job.face).or_default();
        match plan {
            Plan::Keep(interior) => {
                images.push(job.face);
                out.faces.push(SplitFace {
                    face: job.face,
                    source: job.face,
                    rank: job.rank,
                    interior,
                    edges: sorted_edges(job.wires.iter().flatten()),
                });
            }
            Plan::Build(regions) => {
                if regions.len() > 1 {
                    split_count += 1;
                }
                let original = store.face(job.face)?;
                let (surface, same_sense, tolerance) =
                    (original.surface.clone(), original.same_sense, original.tolerance);
                for region in regions {
                    let edges = sorted_edges(region.outer.iter().chain(region.holes.iter().flatten()));
                    let outer = store.add_wire(WireData::closed(region.outer));
                    let inner = region
                        .holes
                        .into_iter()
                        .map(|h| store.add_wire(WireData::closed(h)))
                        .collect();
                    let mut data = FaceData::new(surface.clone(), outer, inner, same_sense);
                    data.tolerance = tolerance;
                    let face = store.add_face(data);
                    images.push(face);
                    out.faces.push(SplitFace {
                        face,
                        source: job.face,
                        rank: job.rank,
                        interior: region.interior,
                        edges,
                    });
                }
            }
        }
    }
    debug!(faces = out.faces.len(), split = split_count, "faces built");
    Ok(out)
}

fn sorted_edges<'e>(oes: impl Iterator<Item = &'e OrientedEdge>) -> Vec<EdgeId> {
    let mut edges: Vec<EdgeId> = oes.map(|oe| oe.edge).collect();
    edges.sort();
    edges.dedup();
    edges
}

/// Decides how one face is rebuilt. Pure, runs in parallel.
fn plan(store: &TopologyStore, job: &Job) -> Result<(Plan, Vec<String>)> {
    let mut issues = Vec::new();
    let boundary: Vec<OrientedEdge> = job.wires.iter().flatten().copied().collect();
    let internal = prune_dangling(store, &boundary, &job.internal)?;
    if internal.is_empty() {
        let interior = face_interior_point(store, job.face)?;
        if job.unchanged {
            return Ok((Plan::Keep(interior), issues));
        }
        let mut wires = job.wires.iter().cloned();
        let region = Region {
            outer: wires.next().unwrap_or_default(),
            holes: wires.collect(),
            interior,
        };
        return Ok((Plan::Build(vec![region]), issues));
    }

    let uv = FaceUv::new(store, job.face)?;
    let mut halves = Vec::with_capacity(boundary.len() + 2 * internal.len());
    for oe in &boundary {
        halves.push(half_edge(store, &uv, *oe)?);
    }
    for &e in &internal {
        halves.push(half_edge(store, &uv, OrientedEdge::new(e, true))?);
        halves.push(half_edge(store, &uv, OrientedEdge::new(e, false))?);
    }

    let loops = trace_loops(&halves, &mut issues);
    let polygons: Vec<Vec<Point2>> = loops
        .iter()
        .map(|l| {
            l.iter()
                .flat_map(|&h| {
                    let pts = &halves[h].uv;
                    pts[..pts.len().saturating_sub(1)].iter().copied()
                })
                .collect()
        })
        .collect();
    let areas: Vec<f64> = polygons.iter().map(|p| signed_area_2d(p)).collect();

    let outers: Vec<usize> = (0..loops.len()).filter(|&i| areas[i] > TOLERANCE).collect();
    let mut holes_of: HashMap<usize, Vec<usize>> = HashMap::new();
    for i in (0..loops.len()).filter(|&i| areas[i] < -TOLERANCE) {
        let probe = hole_probe(&polygons[i]);
        let container = outers
            .iter()
            .copied()
            .filter(|&o| point_in_polygon_2d(&probe, &polygons[o]))
            .min_by(|&a, &b| areas[a].total_cmp(&areas[b]));
        match container {
            Some(o) => holes_of.entry(o).or_default().push(i),
            None => issues.push("hole loop outside every region dropped".into()),
        }
    }
    trace!(face = ?job.face, loops = loops.len(), regions = outers.len(), "face traced");

    let to_edges = |l: &[usize]| l.iter().map(|&h| halves[h].edge).collect::<Vec<_>>();
    let regions = outers
        .iter()
        .map(|&o| {
            let holes = holes_of.remove(&o).unwrap_or_default();
            let mut rings = vec![polygons[o].clone()];
            rings.extend(holes.iter().map(|&h| polygons[h].clone()));
            Region {
                outer: to_edges(&loops[o]),
                holes: holes.iter().map(|&h| to_edges(&loops[h])).collect(),
                interior: interior_point_2d(&rings).map(|q| uv.to_point(&q)),
            }
        })
        .collect();
    Ok((Plan::Build(regions), issues))
}

fn half_edge(store: &TopologyStore, uv: &FaceUv, edge: OrientedEdge) -> Result<HalfEdge> {
    let (from, to) = oriented_ends(store, &edge)?;
    Ok(HalfEdge {
        edge,
        from,
        to,
        uv: uv.edge_uv(store, &edge)?,
    })
}

/// Internal edges left after repeatedly removing those with a free end.
fn prune_dangling(store: &TopologyStore, boundary: &[OrientedEdge], internal: &[EdgeId]) -> Result<Vec<EdgeId>> {
    let mut degree: HashMap<VertexId, usize> = HashMap::new();
    for oe in boundary {
        let (a, b) = oriented_ends(store, oe)?;
        *degree.entry(a).or_default() += 1;
        *degree.entry(b).or_default() += 1;
    }
    let mut ends = Vec::with_capacity(internal.len());
    for &e in internal {
        let data = store.edge(e)?;
        *degree.entry(data.start).or_default() += 1;
        *degree.entry(data.end).or_default() += 1;
        ends.push((e, data.start, data.end));
    }
    loop {
        let before = ends.len();
        ends.retain(|&(_, a, b)| {
            let dangling = degree.get(&a).copied().unwrap_or(0) < 2 || degree.get(&b).copied().unwrap_or(0) < 2;
            if dangling {
                for v in [a, b] {
                    if let Some(d) = degree.get_mut(&v) {
                        *d = d.saturating_sub(1);
                    }
                }
            }
            !dangling
        });
        if ends.len() == before {
            break;
        }
    }
    Ok(ends.into_iter().map(|(e, _, _)| e).collect())
}

/// Clockwise angle from `from` to `to` in `(0, 2π]`.
fn clockwise(from: &Vector2, to: &Vector2) -> f64 {
    let a = (from.y.atan2(from.x) - to.y.atan2(to.x)).rem_euclid(TAU);
    if a <= TOLERANCE {
        TAU
    } else {
        a
    }
}

/// Closed loops of half-edge indices.
fn trace_loops(halves: &[HalfEdge], issues: &mut Vec<String>) -> Vec<Vec<usize>> {
    let mut outgoing: HashMap<VertexId, Vec<usize>> = HashMap::new();
    for (i, h) in halves.iter().enumerate() {
        outgoing.entry(h.from).or_default().push(i);
    }
    let mut used = vec![false; halves.len()];
    let mut loops = Vec::new();
    for start in 0..halves.len() {
        if used[start] {
            continue;
        }
        used[start] = true;
        let mut chain = vec![start];
        let mut current = start;
        let closed = loop {
            let h = &halves[current];
            let back = -h.end_dir();
            let next = outgoing.get(&h.to).into_iter().flatten().copied().min_by(|&a, &b| {
                turn(halves, h, &back, a).total_cmp(&turn(halves, h, &back, b))
            });
            match next {
                Some(n) if n == start => break true,
                Some(n) if !used[n] && chain.len() < halves.len() => {
                    used[n] = true;
                    chain.push(n);
                    current = n;
                }
                _ => break false,
            }
        };
        if closed {
            loops.push(chain);
        } else {
            issues.push("open chain of split edges dropped".into());
        }
    }
    loops
}

fn turn(halves: &[HalfEdge], incoming: &HalfEdge, back: &Vector2, candidate: usize) -> f64 {
    let c = &halves[candidate];
    if c.edge.edge == incoming.edge.edge && c.edge.forward != incoming.edge.forward {
        return TAU;
    }
    clockwise(back, &c.start_dir())
}

/// A point just left of the first segment of a clockwise loop, which is
/// outside the loop and inside whatever region encloses it.
fn hole_probe(polygon: &[Point2]) -> Point2 {
    let (a, b) = (polygon[0], polygon[1 % polygon.len()]);
    let d = b - a;
    let left = Vector2::new(-d.y, d.x);
    Point2::from((a.coords + b.coords) * 0.5) + left * 1e-3
}
