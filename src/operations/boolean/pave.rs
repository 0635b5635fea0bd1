//! Pave builder: turns the paves collected by the filler into split edges.
//!
//! Every original edge gets a pavement (its end paves plus every pave the
//! intersection phases added), consecutive paves bound pave blocks, and
//! blocks of different edges or section curves that coincide are realised
//! by one shared split edge.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::error::Result;
use crate::math::tolerance::parametric;
use crate::topology::face_uv::{FaceLocation, FaceLocator};
use crate::topology::{EdgeCurve, EdgeData, EdgeId, FaceId, Shape, TopologyStore, VertexId};

use super::ds::{IntersectionDS, Rank};

/// Where a pave block comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Edge(EdgeId),
    Section(usize),
}

#[derive(Debug, Clone)]
struct PaveBlock {
    origin: Origin,
    rank: Option<Rank>,
    v0: VertexId,
    v1: VertexId,
    t0: f64,
    t1: f64,
    curve: EdgeCurve,
    tolerance: f64,
    /// Spans the whole original edge with its original vertices.
    unchanged: bool,
}

impl PaveBlock {
    fn point_at(&self, t: f64) -> crate::math::Point3 {
        self.curve.evaluate(t)
    }

    fn project(&self, p: &crate::math::Point3) -> (f64, f64) {
        self.curve.project(p, self.t0, self.t1)
    }

    fn is_loop(&self) -> bool {
        self.v0 == self.v1
    }
}

/// Split edges of one operation.
#[derive(Debug, Default)]
pub(crate) struct Splits {
    /// Images of every original edge in parameter order, with whether
    /// each image runs the same way as the original.
    pub edge_images: HashMap<EdgeId, Vec<(EdgeId, bool)>>,
    /// Split edges realising section curves, with the faces they run
    /// through the interior of.
    pub sections: Vec<(EdgeId, Vec<FaceId>)>,
    /// Split edges of the other operand lying inside a face.
    pub in_face: HashMap<FaceId, Vec<EdgeId>>,
    /// Operands each split edge belongs to.
    pub ranks: HashMap<EdgeId, [bool; 2]>,
    pub section_edges: HashSet<EdgeId>,
}

impl Splits {
    #[must_use]
    pub(crate) fn images(&self, edge: EdgeId) -> &[(EdgeId, bool)] {
        self.edge_images.get(&edge).map_or(&[], Vec::as_slice)
    }

    /// True when the split edge belongs to both operands.
    #[must_use]
    pub(crate) fn is_shared(&self, edge: EdgeId) -> bool {
        self.ranks.get(&edge).is_some_and(|r| r[0] && r[1])
    }
}

/// Builds the pavement of every original edge and realises the blocks.
///
/// # Errors
///
/// Returns an error if an indexed entity is missing from the store.
pub(crate) fn build_splits(store: &mut TopologyStore, ds: &IntersectionDS) -> Result<Splits> {
    let mut blocks: Vec<PaveBlock> = Vec::new();
    let mut edge_blocks: Vec<(EdgeId, Vec<usize>)> = Vec::new();
    for info in ds.originals() {
        let Shape::Edge(e) = info.shape else {
            continue;
        };
        if ds.is_degenerate(e) {
            edge_blocks.push((e, Vec::new()));
            continue;
        }
        let mut indices = Vec::new();
        for block in pavement(store, ds, e, info.rank)? {
            indices.push(blocks.len());
            blocks.push(block);
        }
        edge_blocks.push((e, indices));
    }
    let first_section = blocks.len();
    for (i, s) in ds.sections().iter().enumerate() {
        blocks.push(PaveBlock {
            origin: Origin::Section(i),
            rank: None,
            v0: s.start,
            v1: s.end,
            t0: s.t_start,
            t1: s.t_end,
            curve: s.curve.clone(),
            tolerance: s.tolerance,
            unchanged: false,
        });
    }

    let groups = common_blocks(&blocks);
    let mut realized: Vec<Option<(EdgeId, bool)>> = vec![None; blocks.len()];
    let mut splits = Splits::default();
    let mut common = 0;
    for group in &groups {
        if group.len() > 1 {
            common += 1;
        }
        let (edge, lead) = realize(store, &blocks, group);
        let ranks = splits.ranks.entry(edge).or_insert([false; 2]);
        for &i in group {
            match blocks[i].rank {
                Some(rank) => ranks[rank as usize] = true,
                None => {
                    splits.section_edges.insert(edge);
                }
            }
        }
        for &i in group {
            realized[i] = Some((edge, same_direction(&blocks[lead], &blocks[i])));
        }
    }

    for (e, indices) in edge_blocks {
        let images = indices.iter().filter_map(|&i| realized[i]).collect();
        splits.edge_images.insert(e, images);
    }
    for (i, s) in ds.sections().iter().enumerate() {
        if let Some((edge, _)) = realized[first_section + i] {
            splits.sections.push((edge, s.faces.clone()));
        }
    }

    for (&face, info) in ds.face_infos() {
        if info.in_edges.is_empty() {
            continue;
        }
        let locator = FaceLocator::new(store, face)?;
        let tol = store.face(face)?.tolerance;
        let mut inside = Vec::new();
        for &e in &info.in_edges {
            for &(image, _) in splits.images(e) {
                let data = store.edge(image)?;
                let mid = data.point_at(data.mid_param());
                if locator.locate(&mid, tol.max(data.tolerance)) == FaceLocation::Inside && !inside.contains(&image) {
                    inside.push(image);
                }
            }
        }
        if !inside.is_empty() {
            splits.in_face.insert(face, inside);
        }
    }

    debug!(
        blocks = blocks.len(),
        common,
        split_edges = groups.len(),
        sections = splits.sections.len(),
        "paving done"
    );
    Ok(splits)
}

/// Sorted, deduplicated pave blocks of one original edge.
fn pavement(store: &TopologyStore, ds: &IntersectionDS, e: EdgeId, rank: Rank) -> Result<Vec<PaveBlock>> {
    let data = store.edge(e)?;
    let tol = data.tolerance;
    // (vertex, param, is end pave)
    let mut paves: Vec<(VertexId, f64, bool)> = vec![
        (ds.resolve(data.start), data.t_start, true),
        (ds.resolve(data.end), data.t_end, true),
    ];
    paves.extend(
        ds.paves(e)
            .iter()
            .filter(|p| p.param > data.t_start && p.param < data.t_end)
            .map(|p| (ds.resolve(p.vertex), p.param, false)),
    );
    paves.sort_by(|a, b| a.1.total_cmp(&b.1));

    let mut merged: Vec<(VertexId, f64, bool)> = Vec::with_capacity(paves.len());
    for pave in paves {
        if let Some(last) = merged.last_mut() {
            if pave.0 == last.0 && same_spot(store, ds, data, pave.0, last.1, pave.1)? {
                if pave.2 {
                    *last = pave;
                }
                continue;
            }
        }
        merged.push(pave);
    }

    let unchanged = merged.len() == 2 && merged[0].0 == data.start && merged[1].0 == data.end;
    let speed = data.curve.derivative(data.mid_param()).norm();
    let ptol = parametric(tol, speed);
    let mut blocks = Vec::new();
    for w in merged.windows(2) {
        let ((v0, t0, _), (v1, t1, _)) = (w[0], w[1]);
        if t1 - t0 <= ptol {
            continue;
        }
        blocks.push(PaveBlock {
            origin: Origin::Edge(e),
            rank: Some(rank),
            v0,
            v1,
            t0,
            t1,
            curve: data.curve.clone(),
            tolerance: data.tolerance,
            unchanged,
        });
    }
    Ok(blocks)
}

/// True when two paves of one vertex are the same pave: the stretch of
/// edge between them stays within the vertex tolerance.
fn same_spot(
    store: &TopologyStore,
    ds: &IntersectionDS,
    edge: &EdgeData,
    vertex: VertexId,
    t0: f64,
    t1: f64,
) -> Result<bool> {
    let vtol = ds.tolerance(vertex, store.vertex(vertex)?.tolerance);
    let mid = edge.point_at(0.5 * (t0 + t1));
    Ok((mid - edge.point_at(t0)).norm() <= vtol + edge.tolerance)
}

/// Partitions blocks into groups of coinciding blocks.
fn common_blocks(blocks: &[PaveBlock]) -> Vec<Vec<usize>> {
    let mut by_ends: HashMap<(VertexId, VertexId), Vec<usize>> = HashMap::new();
    let mut order = Vec::new();
    for (i, b) in blocks.iter().enumerate() {
        let key = if b.v0 <= b.v1 { (b.v0, b.v1) } else { (b.v1, b.v0) };
        let bucket = by_ends.entry(key).or_default();
        if bucket.is_empty() {
            order.push(key);
        }
        bucket.push(i);
    }

    let mut groups = Vec::new();
    for key in order {
        let Some(bucket) = by_ends.get(&key) else {
            continue;
        };
        let mut clusters: Vec<Vec<usize>> = Vec::new();
        for &i in bucket {
            let mut placed = false;
            for cluster in &mut clusters {
                if coincide(&blocks[cluster[0]], &blocks[i]) {
                    cluster.push(i);
                    placed = true;
                    break;
                }
            }
            if !placed {
                clusters.push(vec![i]);
            }
        }
        groups.extend(clusters);
    }
    groups
}

/// True when two blocks with the same end vertices run along one curve.
fn coincide(a: &PaveBlock, b: &PaveBlock) -> bool {
    if let (Origin::Edge(ea), Origin::Edge(eb)) = (a.origin, b.origin) {
        if ea == eb {
            return false;
        }
    }
    let tol = a.tolerance + b.tolerance;
    let fractions: &[f64] = if a.is_loop() { &[0.25, 0.5, 0.75] } else { &[0.5] };
    for &f in fractions {
        let pa = a.point_at(a.t0 + (a.t1 - a.t0) * f);
        if b.project(&pa).1 > tol {
            return false;
        }
        let pb = b.point_at(b.t0 + (b.t1 - b.t0) * f);
        if a.project(&pb).1 > tol {
            return false;
        }
    }
    true
}

/// Split edge standing for a group: the unchanged original when there is
/// one, otherwise a new edge on the first block's curve. Returns the edge
/// and the block it was built from.
fn realize(store: &mut TopologyStore, blocks: &[PaveBlock], group: &[usize]) -> (EdgeId, usize) {
    let pick = |rank: Option<Rank>| group.iter().copied().find(|&i| blocks[i].rank == rank);
    let reuse = [Rank::A, Rank::B].into_iter().find_map(|rank| {
        group.iter().copied().find(|&i| {
            blocks[i].unchanged && blocks[i].rank == Some(rank)
        })
    });
    if let Some(i) = reuse {
        if let Origin::Edge(e) = blocks[i].origin {
            return (e, i);
        }
    }
    let lead = pick(Some(Rank::A))
        .or_else(|| pick(Some(Rank::B)))
        .or_else(|| group.first().copied())
        .unwrap_or_default();
    let b = &blocks[lead];
    let tolerance = group.iter().map(|&i| blocks[i].tolerance).fold(b.tolerance, f64::max);
    let mut data = EdgeData::new(b.v0, b.v1, b.curve.clone(), b.t0, b.t1);
    data.tolerance = tolerance;
    (store.add_edge(data), lead)
}

/// Whether block `b` runs the same way as the lead block `lead`.
fn same_direction(lead: &PaveBlock, b: &PaveBlock) -> bool {
    if !lead.is_loop() {
        return b.v0 == lead.v0;
    }
    let (t, _) = lead.project(&b.point_at(b.t0 + 0.25 * (b.t1 - b.t0)));
    let tb = b.curve.derivative(b.t0 + 0.25 * (b.t1 - b.t0));
    lead.curve.derivative(t).dot(&tb) > 0.0
}
