use std::collections::{HashMap, HashSet, VecDeque};

use tracing::{debug, trace};

use crate::error::Result;
use crate::geometry::curve::Line;
use crate::math::polygon_2d::signed_area_2d;
use crate::math::tolerance::{is_parallel, CONFUSION};
use crate::math::Point2;
use crate::operations::creation::MakeSolid;
use crate::topology::explore::{oriented_ends, solids_of};
use crate::topology::face_uv::FaceUv;
use crate::topology::{
    EdgeCurve, EdgeData, EdgeId, FaceData, FaceId, FaceSurface, OrientedEdge, Shape, ShellData, SolidId,
    TopologyStore, VertexId, WireData,
};

use super::assemble::compound_of;

/// Result of the coplanar merge, with the history rewrites it implies.
#[derive(Debug, Default)]
pub(crate) struct MergeOutcome {
    pub shape: Option<Shape>,
    /// Result shapes replaced by a merged or fused one.
    pub replaced: Vec<(Shape, Shape)>,
    /// Result shapes that disappeared inside a merged face.
    pub forgotten: Vec<Shape>,
}

/// Merges adjacent coplanar faces of every solid in `shape` and fuses
/// collinear line edges that meet at vertices used by no other edge.
///
/// Faces are coplanar when they lie on one plane with the same outward
/// normal; a connected group of them becomes one face whose boundary is
/// the edges used once inside the group. Groups that do not chain into
/// closed loops are left alone.
///
/// # Errors
///
/// Returns an error if an entity is missing from the store.
pub(crate) fn merge_coplanar_faces(store: &mut TopologyStore, shape: Shape) -> Result<MergeOutcome> {
    let mut out = MergeOutcome::default();
    let solids = solids_of(store, shape)?;
    let mut rebuilt = Vec::with_capacity(solids.len());
    for solid in solids {
        let merged = merge_solid(store, solid, &mut out)?;
        if merged != solid {
            out.replaced.push((Shape::Solid(solid), Shape::Solid(merged)));
        }
        rebuilt.push(merged);
    }
    if out.replaced.is_empty() {
        return Ok(out);
    }
    out.shape = Some(match (shape, rebuilt.as_slice()) {
        (Shape::Solid(_), [single]) => Shape::Solid(*single),
        _ => compound_of(store, rebuilt.into_iter().map(Shape::Solid).collect()),
    });
    debug!(rewrites = out.replaced.len(), dropped = out.forgotten.len(), "coplanar faces merged");
    Ok(out)
}

fn merge_solid(store: &mut TopologyStore, solid: SolidId, out: &mut MergeOutcome) -> Result<SolidId> {
    let data = store.solid(solid)?.clone();
    let mut changed = false;
    let mut shells = Vec::new();
    for shell in data.shells() {
        let faces = store.shell(shell)?.faces.clone();
        let mut merged = merge_shell_faces(store, &faces, out)?;
        fuse_collinear(store, &mut merged, out)?;
        if merged == faces {
            shells.push(shell);
        } else {
            changed = true;
            let new_shell = store.add_shell(ShellData::closed(merged));
            out.replaced.push((Shape::Shell(shell), Shape::Shell(new_shell)));
            shells.push(new_shell);
        }
    }
    if !changed {
        return Ok(solid);
    }
    let (outer, inner) = shells.split_first().map_or((data.outer_shell, Vec::new()), |(o, i)| (*o, i.to_vec()));
    MakeSolid::new(outer, inner).execute(store)
}

fn coplanar(store: &TopologyStore, a: FaceId, b: FaceId) -> Result<bool> {
    let (fa, fb) = (store.face(a)?, store.face(b)?);
    let (FaceSurface::Plane(pa), FaceSurface::Plane(pb)) = (&fa.surface, &fb.surface) else {
        return Ok(false);
    };
    if !fa.surface.same_domain(&fb.surface, CONFUSION) {
        return Ok(false);
    }
    let na = if fa.same_sense { *pa.plane_normal() } else { -pa.plane_normal() };
    let nb = if fb.same_sense { *pb.plane_normal() } else { -pb.plane_normal() };
    Ok(na.dot(&nb) > 0.0)
}

fn wire_edges(store: &TopologyStore, face: FaceId) -> Result<Vec<OrientedEdge>> {
    let mut edges = Vec::new();
    for wire in store.face(face)?.wires() {
        edges.extend(store.wire(wire)?.edges.iter().copied());
    }
    Ok(edges)
}

/// Replaces every connected coplanar group by one face.
fn merge_shell_faces(store: &mut TopologyStore, faces: &[FaceId], out: &mut MergeOutcome) -> Result<Vec<FaceId>> {
    let mut by_edge: HashMap<EdgeId, Vec<usize>> = HashMap::new();
    for (i, &f) in faces.iter().enumerate() {
        for oe in wire_edges(store, f)? {
            by_edge.entry(oe.edge).or_default().push(i);
        }
    }

    let mut visited = vec![false; faces.len()];
    let mut result = Vec::with_capacity(faces.len());
    for seed in 0..faces.len() {
        if visited[seed] {
            continue;
        }
        visited[seed] = true;
        let mut component = vec![seed];
        let mut queue = VecDeque::from([seed]);
        while let Some(i) = queue.pop_front() {
            for oe in wire_edges(store, faces[i])? {
                for &j in by_edge.get(&oe.edge).into_iter().flatten() {
                    if !visited[j] && coplanar(store, faces[i], faces[j])? {
                        visited[j] = true;
                        component.push(j);
                        queue.push_back(j);
                    }
                }
            }
        }
        if component.len() < 2 {
            result.push(faces[seed]);
            continue;
        }
        let members: Vec<FaceId> = component.iter().map(|&i| faces[i]).collect();
        match merge_component(store, &members)? {
            Some((merged, internal)) => {
                for &f in &members {
                    out.replaced.push((Shape::Face(f), Shape::Face(merged)));
                    for wire in store.face(f)?.wires() {
                        out.forgotten.push(Shape::Wire(wire));
                    }
                }
                out.forgotten.extend(internal.into_iter().map(Shape::Edge));
                result.push(merged);
            }
            None => {
                trace!(faces = members.len(), "coplanar group left unmerged");
                result.extend(members);
            }
        }
    }
    Ok(result)
}

/// One face covering `members`, and the edges that became interior.
fn merge_component(store: &mut TopologyStore, members: &[FaceId]) -> Result<Option<(FaceId, Vec<EdgeId>)>> {
    let mut uses: Vec<OrientedEdge> = Vec::new();
    let mut count: HashMap<EdgeId, usize> = HashMap::new();
    for &f in members {
        for oe in wire_edges(store, f)? {
            *count.entry(oe.edge).or_default() += 1;
            uses.push(oe);
        }
    }
    let mut internal: Vec<EdgeId> = count.iter().filter(|&(_, &n)| n > 1).map(|(&e, _)| e).collect();
    internal.sort();
    let boundary: Vec<OrientedEdge> = uses.into_iter().filter(|oe| count[&oe.edge] == 1).collect();

    let Some(loops) = chain_loops(store, &boundary)? else {
        return Ok(None);
    };
    let uv = FaceUv::new(store, members[0])?;
    let mut areas = Vec::with_capacity(loops.len());
    for l in &loops {
        let mut pts: Vec<Point2> = Vec::new();
        for oe in l {
            let e = uv.edge_uv(store, oe)?;
            pts.extend_from_slice(&e[..e.len().saturating_sub(1)]);
        }
        areas.push(signed_area_2d(&pts));
    }
    let Some(outer) = (0..loops.len()).max_by(|&a, &b| areas[a].total_cmp(&areas[b])) else {
        return Ok(None);
    };
    if areas[outer] <= 0.0 {
        return Ok(None);
    }

    let first = store.face(members[0])?.clone();
    let mut tolerance = first.tolerance;
    for &f in members {
        tolerance = tolerance.max(store.face(f)?.tolerance);
    }
    let mut outer_wire = None;
    let mut inner = Vec::new();
    for (k, l) in loops.into_iter().enumerate() {
        let wire = store.add_wire(WireData::closed(l));
        if k == outer {
            outer_wire = Some(wire);
        } else {
            inner.push(wire);
        }
    }
    let Some(outer_wire) = outer_wire else {
        return Ok(None);
    };
    let mut data = FaceData::new(first.surface, outer_wire, inner, first.same_sense);
    data.tolerance = tolerance;
    Ok(Some((store.add_face(data), internal)))
}

/// Chains oriented edges end to start into closed loops; `None` when some
/// chain does not close.
fn chain_loops(store: &TopologyStore, edges: &[OrientedEdge]) -> Result<Option<Vec<Vec<OrientedEdge>>>> {
    let mut ends = Vec::with_capacity(edges.len());
    let mut starting: HashMap<VertexId, Vec<usize>> = HashMap::new();
    for (i, oe) in edges.iter().enumerate() {
        let (a, b) = oriented_ends(store, oe)?;
        starting.entry(a).or_default().push(i);
        ends.push((a, b));
    }
    let mut used = vec![false; edges.len()];
    let mut loops = Vec::new();
    for seed in 0..edges.len() {
        if used[seed] {
            continue;
        }
        used[seed] = true;
        let mut chain = vec![edges[seed]];
        let start = ends[seed].0;
        let mut at = ends[seed].1;
        while at != start {
            let next = starting
                .get(&at)
                .and_then(|c| c.iter().copied().find(|&i| !used[i]));
            let Some(i) = next else {
                return Ok(None);
            };
            used[i] = true;
            chain.push(edges[i]);
            at = ends[i].1;
        }
        loops.push(chain);
    }
    Ok(Some(loops))
}

/// Vertices joining exactly two collinear line edges.
fn removable_vertices(store: &TopologyStore, faces: &[FaceId]) -> Result<HashSet<VertexId>> {
    let mut incident: HashMap<VertexId, HashSet<EdgeId>> = HashMap::new();
    for &f in faces {
        for oe in wire_edges(store, f)? {
            let e = store.edge(oe.edge)?;
            incident.entry(e.start).or_default().insert(oe.edge);
            incident.entry(e.end).or_default().insert(oe.edge);
        }
    }
    let mut out = HashSet::new();
    for (v, edges) in incident {
        let edges: Vec<EdgeId> = edges.into_iter().collect();
        let [a, b] = edges.as_slice() else {
            continue;
        };
        let (ea, eb) = (store.edge(*a)?, store.edge(*b)?);
        if let (EdgeCurve::Line(la), EdgeCurve::Line(lb)) = (&ea.curve, &eb.curve) {
            if !ea.is_closed() && !eb.is_closed() && is_parallel(la.direction(), lb.direction()) {
                out.insert(v);
            }
        }
    }
    Ok(out)
}

/// Fused line edges, keyed by the sorted edges they replace, with their
/// start vertex.
type FusedEdges = HashMap<Vec<EdgeId>, (EdgeId, VertexId)>;

fn fuse_collinear(store: &mut TopologyStore, faces: &mut [FaceId], out: &mut MergeOutcome) -> Result<()> {
    let removable = removable_vertices(store, faces)?;
    if removable.is_empty() {
        return Ok(());
    }
    let mut fused: FusedEdges = HashMap::new();
    for face in faces.iter_mut() {
        let data = store.face(*face)?.clone();
        let mut changed = false;
        let mut wires = Vec::new();
        for wire in data.wires() {
            let edges = store.wire(wire)?.edges.clone();
            let rewritten = fuse_wire(store, &edges, &removable, &mut fused, out)?;
            changed |= rewritten.len() != edges.len();
            wires.push(rewritten);
        }
        if !changed {
            continue;
        }
        let mut ids = wires.into_iter().map(|w| store.add_wire(WireData::closed(w)));
        let Some(outer) = ids.next() else {
            continue;
        };
        let inner = ids.collect();
        let mut rebuilt = FaceData::new(data.surface, outer, inner, data.same_sense);
        rebuilt.tolerance = data.tolerance;
        let new_face = store.add_face(rebuilt);
        out.replaced.push((Shape::Face(*face), Shape::Face(new_face)));
        *face = new_face;
    }
    for v in removable {
        out.forgotten.push(Shape::Vertex(v));
    }
    Ok(())
}

/// Replaces runs of edges through removable vertices by single edges.
fn fuse_wire(
    store: &mut TopologyStore,
    edges: &[OrientedEdge],
    removable: &HashSet<VertexId>,
    fused: &mut FusedEdges,
    out: &mut MergeOutcome,
) -> Result<Vec<OrientedEdge>> {
    let mut ends = Vec::with_capacity(edges.len());
    for oe in edges {
        ends.push(oriented_ends(store, oe)?);
    }
    let Some(anchor) = (0..edges.len()).find(|&i| !removable.contains(&ends[i].0)) else {
        return Ok(edges.to_vec());
    };

    let mut result = Vec::with_capacity(edges.len());
    let mut run: Vec<usize> = Vec::new();
    for k in 0..edges.len() {
        let i = (anchor + k) % edges.len();
        run.push(i);
        if removable.contains(&ends[i].1) {
            continue;
        }
        if run.len() == 1 {
            result.push(edges[i]);
        } else {
            result.push(fused_edge(store, edges, &ends, &run, fused, out)?);
        }
        run.clear();
    }
    Ok(result)
}

fn fused_edge(
    store: &mut TopologyStore,
    edges: &[OrientedEdge],
    ends: &[(VertexId, VertexId)],
    run: &[usize],
    fused: &mut FusedEdges,
    out: &mut MergeOutcome,
) -> Result<OrientedEdge> {
    let start = ends[run[0]].0;
    let mut key: Vec<EdgeId> = run.iter().map(|&i| edges[i].edge).collect();
    key.sort();
    if let Some(&(edge, edge_start)) = fused.get(&key) {
        return Ok(OrientedEdge::new(edge, edge_start == start));
    }
    let end = ends[run[run.len() - 1]].1;
    let (p0, p1) = (store.vertex(start)?.point, store.vertex(end)?.point);
    let mut tolerance = CONFUSION;
    for &i in run {
        tolerance = tolerance.max(store.edge(edges[i].edge)?.tolerance);
    }
    let line = Line::through(&p0, &p1)?;
    let mut data = EdgeData::new(start, end, EdgeCurve::Line(line), 0.0, (p1 - p0).norm());
    data.tolerance = tolerance;
    let edge = store.add_edge(data);
    for &old in &key {
        out.replaced.push((Shape::Edge(old), Shape::Edge(edge)));
    }
    fused.insert(key, (edge, start));
    Ok(OrientedEdge::new(edge, true))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::math::Point3;
    use crate::operations::creation::{MakeFace, MakeWire};
    use crate::operations::query::{IsValid, Volume};
    use crate::operations::shaping::Extrude;
    use crate::topology::explore::{edges_of, faces_of};

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    /// A 2x1x1 block whose bottom is split into two squares by an extra
    /// vertex pair, so two coplanar faces meet along x = 1.
    fn split_block(store: &mut TopologyStore) -> SolidId {
        let pts = vec![
            p(0.0, 0.0, 0.0),
            p(1.0, 0.0, 0.0),
            p(2.0, 0.0, 0.0),
            p(2.0, 1.0, 0.0),
            p(1.0, 1.0, 0.0),
            p(0.0, 1.0, 0.0),
        ];
        let wire = MakeWire::new(pts, true).execute(store).unwrap();
        let face = MakeFace::new(wire, vec![]).execute(store).unwrap();
        Extrude::new(face, crate::math::Vector3::new(0.0, 0.0, 1.0)).execute(store).unwrap()
    }

    #[test]
    fn collinear_edges_are_fused() {
        let mut store = TopologyStore::new();
        let solid = split_block(&mut store);
        let before = faces_of(&store, Shape::Solid(solid)).unwrap().len();
        assert_eq!(before, 8);
        let outcome = merge_coplanar_faces(&mut store, Shape::Solid(solid)).unwrap();
        let merged = outcome.shape.unwrap();
        let faces = faces_of(&store, merged).unwrap();
        assert_eq!(faces.len(), 6);
        assert_eq!(edges_of(&store, merged).unwrap().len(), 12);
        assert!(IsValid::new(merged).execute(&store));
        assert!((Volume::new(merged).execute(&store).unwrap() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn nothing_to_merge_leaves_the_shape() {
        let mut store = TopologyStore::new();
        let solid = crate::operations::creation::MakeBox::new(p(0.0, 0.0, 0.0), p(1.0, 1.0, 1.0))
            .execute(&mut store)
            .unwrap();
        let outcome = merge_coplanar_faces(&mut store, Shape::Solid(solid)).unwrap();
        assert!(outcome.shape.is_none());
        assert!(outcome.replaced.is_empty());
    }

    #[test]
    fn chain_loops_rejects_open_chains() {
        let mut store = TopologyStore::new();
        let solid = crate::operations::creation::MakeBox::new(p(0.0, 0.0, 0.0), p(1.0, 1.0, 1.0))
            .execute(&mut store)
            .unwrap();
        let face = faces_of(&store, Shape::Solid(solid)).unwrap()[0];
        let edges = wire_edges(&store, face).unwrap();
        assert_eq!(chain_loops(&store, &edges).unwrap().unwrap().len(), 1);
        assert!(chain_loops(&store, &edges[1..]).unwrap().is_none());
    }
}
