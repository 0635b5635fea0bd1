//! Pave filler: the pairwise intersection phases of a Boolean operation.
//!
//! Phases run in order VV, VE, EE, VF, EF, FF. Each phase first collects
//! candidate pairs whose boxes overlap, computes their intersections over
//! immutable snapshots of the store and the data structure (in parallel
//! when enabled), then commits the results on one thread: vertex
//! unification through the [`VertexPool`], paves, face info and section
//! curves.

use std::collections::{HashMap, HashSet};

use rayon::prelude::*;
use tracing::{debug, trace};

use crate::error::Result;
use crate::math::tolerance::{combined, parametric};
use crate::math::Point3;
use crate::operations::query::BoundingBox;
use crate::topology::explore::sub_shapes;
use crate::topology::face_uv::{FaceLocation, FaceLocator};
use crate::topology::{EdgeCurve, EdgeId, FaceId, Shape, TopologyStore, VertexId};

use super::ds::{IntersectionDS, IntersectionRecord, Pave, Rank, RecordKind, SectionCurve, SubParam};
use super::intersect::{
    edge_edge, edge_face, face_face, vertex_edge, vertex_face, EdgeEdgeHit, EdgeFaceHit, FaceFace, Issue, SectionGeom,
};
use super::options::BooleanOptions;
use super::pool::VertexPool;
use super::report::{Report, Warning};

/// Maps `f` over `items`, on the rayon pool when `parallel` is set.
pub(crate) fn par_map<T, R, F>(parallel: bool, items: &[T], f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync + Send,
{
    if parallel {
        items.par_iter().map(f).collect()
    } else {
        items.iter().map(f).collect()
    }
}

/// Sub-shapes of one operand, in index order.
#[derive(Debug, Default)]
struct Operand {
    vertices: Vec<VertexId>,
    edges: Vec<EdgeId>,
    faces: Vec<FaceId>,
}

/// A trimmed piece of a section curve, before its end vertices exist.
#[derive(Debug, Clone)]
struct Span {
    curve: EdgeCurve,
    t0: f64,
    t1: f64,
    v0: Option<VertexId>,
    v1: Option<VertexId>,
    faces: Vec<FaceId>,
    tolerance: f64,
}

#[derive(Debug)]
enum PairSection {
    SameDomain,
    Spans { spans: Vec<Span>, issues: Vec<Issue> },
}

pub(crate) struct PaveFiller<'a> {
    store: &'a mut TopologyStore,
    options: &'a BooleanOptions,
    ds: IntersectionDS,
    pool: VertexPool,
    report: Report,
    operands: [Operand; 2],
    locators: HashMap<FaceId, FaceLocator>,
    face_edges: HashMap<FaceId, HashSet<EdgeId>>,
}

impl<'a> PaveFiller<'a> {
    pub(crate) fn new(store: &'a mut TopologyStore, options: &'a BooleanOptions) -> Self {
        Self {
            store,
            options,
            ds: IntersectionDS::new(),
            pool: VertexPool::new(options.fuzzy, options.tolerance_bound),
            report: Report::default(),
            operands: [Operand::default(), Operand::default()],
            locators: HashMap::new(),
            face_edges: HashMap::new(),
        }
    }

    /// Indexes both operands and runs every intersection phase.
    ///
    /// # Errors
    ///
    /// Returns an error if an operand references missing entities or the
    /// operation is cancelled.
    pub(crate) fn perform(mut self, a: Shape, b: Shape) -> Result<(IntersectionDS, Report)> {
        self.index(a, Rank::A)?;
        self.index(b, Rank::B)?;
        debug!(shapes = self.ds.shape_count(), "operands indexed");

        self.perform_vv()?;
        self.screen_degenerate_edges()?;
        self.perform_ve()?;
        self.perform_ee()?;
        self.perform_vf()?;
        self.perform_ef()?;
        self.perform_ff()?;
        self.options.check_cancel()?;
        Ok((self.ds, self.report))
    }

    fn index(&mut self, shape: Shape, rank: Rank) -> Result<()> {
        for s in sub_shapes(self.store, shape)? {
            let bbox = BoundingBox::new(s).execute(self.store)?;
            let idx = self.ds.add_shape(s, rank, bbox);
            if self.ds.info(idx).rank != rank {
                trace!(?s, "sub-shape shared by both operands keeps its first rank");
                continue;
            }
            let operand = &mut self.operands[rank as usize];
            match s {
                Shape::Vertex(v) => operand.vertices.push(v),
                Shape::Edge(e) => operand.edges.push(e),
                Shape::Face(f) => {
                    operand.faces.push(f);
                    self.locators.insert(f, FaceLocator::new(self.store, f)?);
                    let mut edges = HashSet::new();
                    for wire in self.store.face(f)?.wires() {
                        edges.extend(self.store.wire(wire)?.edges.iter().map(|oe| oe.edge));
                    }
                    self.face_edges.insert(f, edges);
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn bbox_overlap(&self, a: Shape, b: Shape) -> bool {
        match (self.ds.index(a), self.ds.index(b)) {
            (Some(i), Some(j)) => self
                .ds
                .info(i)
                .bbox
                .enlarged(self.options.fuzzy)
                .overlaps(&self.ds.info(j).bbox),
            _ => false,
        }
    }

    fn vertex_tolerance(&self, v: VertexId) -> Result<f64> {
        Ok(self.ds.tolerance(v, self.store.vertex(v)?.tolerance))
    }

    fn record(&mut self, a: Shape, b: Shape, record: IntersectionRecord) {
        if let (Some(i), Some(j)) = (self.ds.index(a), self.ds.index(b)) {
            self.ds.add_interference(i, j, record);
        }
    }

    fn absorb_issues(&mut self, issues: Vec<Issue>, shapes: &[Shape]) {
        for issue in issues {
            let warning = match issue {
                Issue::Degenerate(reason) => Warning::GeometricDegeneracy {
                    shapes: shapes.to_vec(),
                    reason,
                },
                Issue::IterationLimit => Warning::IterationLimit {
                    shapes: shapes.to_vec(),
                    iterations: self.options.max_iterations,
                },
            };
            self.report.push(warning);
        }
    }

    /// Vertices standing for themselves after vertex/vertex unification.
    fn representatives(&self) -> Vec<(VertexId, Rank)> {
        let mut out = Vec::new();
        for rank in [Rank::A, Rank::B] {
            for &v in &self.operands[rank as usize].vertices {
                if self.ds.resolve(v) == v {
                    out.push((v, rank));
                }
            }
        }
        out
    }

    /// True when `point` lies within tolerance of an end vertex of `edge`.
    fn near_end(&self, edge: EdgeId, point: &Point3, tol: f64) -> Result<bool> {
        let data = self.store.edge(edge)?;
        for end in [data.start, data.end] {
            let v = self.ds.resolve(end);
            let vd = self.store.vertex(v)?;
            if (point - vd.point).norm() <= tol + self.ds.tolerance(v, vd.tolerance) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn perform_vv(&mut self) -> Result<()> {
        for v in self.operands[0].vertices.clone() {
            let data = self.store.vertex(v)?;
            let (point, tol) = (data.point, data.tolerance);
            self.pool.insert(v, point, tol, true);
        }
        let mut count = 0;
        for v in self.operands[1].vertices.clone() {
            let data = self.store.vertex(v)?;
            let (point, tol) = (data.point, data.tolerance);
            match self.pool.find(&point, tol) {
                Some((rep, distance)) if rep != v => {
                    self.ds.set_image(v, rep);
                    self.pool.absorb(
                        self.store,
                        &mut self.ds,
                        &mut self.report,
                        rep,
                        distance,
                        tol,
                        &[Shape::Vertex(v)],
                    );
                    self.record(
                        Shape::Vertex(rep),
                        Shape::Vertex(v),
                        IntersectionRecord {
                            location: point,
                            param_a: SubParam::Vertex,
                            param_b: SubParam::Vertex,
                            kind: RecordKind::Point,
                            tolerance: distance,
                            entity: Some(Shape::Vertex(rep)),
                        },
                    );
                    count += 1;
                }
                Some(_) => {}
                None => self.pool.insert(v, point, tol, true),
            }
        }
        debug!(records = count, "vertex/vertex phase");
        self.report.count("VV", count);
        Ok(())
    }

    /// Drops edges no longer than the tolerance of their ends. Their end
    /// vertices are merged and they get no split images.
    fn screen_degenerate_edges(&mut self) -> Result<()> {
        let mut count = 0;
        for rank in [Rank::A, Rank::B] {
            let edges = std::mem::take(&mut self.operands[rank as usize].edges);
            let mut kept = Vec::with_capacity(edges.len());
            for e in edges {
                let data = self.store.edge(e)?;
                let (start, end) = (self.ds.resolve(data.start), self.ds.resolve(data.end));
                let tol = combined(self.vertex_tolerance(start)?, self.vertex_tolerance(end)?, self.options.fuzzy)
                    .max(data.tolerance);
                let length: f64 = data.sample().windows(2).map(|w| (w[1] - w[0]).norm()).sum();
                if length > tol {
                    kept.push(e);
                    continue;
                }
                if start != end {
                    let (p0, p1) = (self.store.vertex(start)?.point, self.store.vertex(end)?.point);
                    let end_tol = self.vertex_tolerance(end)?;
                    self.ds.set_image(end, start);
                    self.pool.remove(end);
                    self.pool.absorb(
                        self.store,
                        &mut self.ds,
                        &mut self.report,
                        start,
                        (p1 - p0).norm(),
                        end_tol,
                        &[Shape::Vertex(end)],
                    );
                }
                self.ds.mark_degenerate(e);
                self.report.push(Warning::GeometricDegeneracy {
                    shapes: vec![Shape::Edge(e)],
                    reason: format!("edge of length {length:e} within tolerance {tol:e}"),
                });
                count += 1;
            }
            self.operands[rank as usize].edges = kept;
        }
        if count > 0 {
            debug!(edges = count, "degenerate edges dropped");
        }
        Ok(())
    }

    fn perform_ve(&mut self) -> Result<()> {
        let mut pairs = Vec::new();
        for (v, rank) in self.representatives() {
            for &e in &self.operands[rank.other() as usize].edges {
                if self.bbox_overlap(Shape::Vertex(v), Shape::Edge(e)) {
                    pairs.push((v, e));
                }
            }
        }

        let (store, ds, fuzzy) = (&*self.store, &self.ds, self.options.fuzzy);
        let hits = par_map(self.options.parallel, &pairs, |&(v, e)| -> Result<Option<(Point3, f64)>> {
            let vd = store.vertex(v)?;
            let ed = store.edge(e)?;
            if ds.resolve(ed.start) == v || ds.resolve(ed.end) == v {
                return Ok(None);
            }
            let tol = combined(ds.tolerance(v, vd.tolerance), ed.tolerance, fuzzy);
            Ok(vertex_edge(&vd.point, tol, ed).map(|t| (vd.point, t)))
        });

        let mut count = 0;
        for (&(v, e), hit) in pairs.iter().zip(hits) {
            let Some((point, t)) = hit? else {
                continue;
            };
            self.ds.add_pave(e, Pave { vertex: v, param: t });
            self.record(
                Shape::Vertex(v),
                Shape::Edge(e),
                IntersectionRecord {
                    location: point,
                    param_a: SubParam::Vertex,
                    param_b: SubParam::Edge(t),
                    kind: RecordKind::Point,
                    tolerance: self.vertex_tolerance(v)?,
                    entity: Some(Shape::Vertex(v)),
                },
            );
            count += 1;
        }
        debug!(pairs = pairs.len(), records = count, "vertex/edge phase");
        self.report.count("VE", count);
        Ok(())
    }

    fn perform_ee(&mut self) -> Result<()> {
        let mut pairs = Vec::new();
        for &ea in &self.operands[0].edges {
            for &eb in &self.operands[1].edges {
                if ea != eb && self.bbox_overlap(Shape::Edge(ea), Shape::Edge(eb)) {
                    pairs.push((ea, eb));
                }
            }
        }

        let (store, options) = (&*self.store, self.options);
        let outcomes = par_map(options.parallel, &pairs, |&(ea, eb)| -> Result<_> {
            let (da, db) = (store.edge(ea)?, store.edge(eb)?);
            let tol = combined(da.tolerance, db.tolerance, options.fuzzy);
            Ok((tol, edge_edge(da, db, tol, options.max_iterations)))
        });

        let mut count = 0;
        for (&(ea, eb), outcome) in pairs.iter().zip(outcomes) {
            let (tol, outcome) = outcome?;
            let shapes = [Shape::Edge(ea), Shape::Edge(eb)];
            self.absorb_issues(outcome.issues, &shapes);
            for hit in outcome.hits {
                match hit {
                    EdgeEdgeHit::Point {
                        point,
                        ta,
                        tb,
                        distance,
                    } => {
                        if self.near_end(ea, &point, tol)? || self.near_end(eb, &point, tol)? {
                            continue;
                        }
                        let v = self.pool.find_or_insert(
                            self.store,
                            &mut self.ds,
                            &mut self.report,
                            point,
                            tol.max(distance),
                            Rank::A,
                            &shapes,
                        );
                        self.ds.add_pave(ea, Pave { vertex: v, param: ta });
                        self.ds.add_pave(eb, Pave { vertex: v, param: tb });
                        self.ds.record_generated(Shape::Edge(ea), Shape::Vertex(v));
                        self.ds.record_generated(Shape::Edge(eb), Shape::Vertex(v));
                        self.record(
                            shapes[0],
                            shapes[1],
                            IntersectionRecord {
                                location: point,
                                param_a: SubParam::Edge(ta),
                                param_b: SubParam::Edge(tb),
                                kind: RecordKind::Point,
                                tolerance: tol.max(distance),
                                entity: Some(Shape::Vertex(v)),
                            },
                        );
                    }
                    EdgeEdgeHit::Coincident { ta, tb } => {
                        // overlap ends are vertices already paved by VE/VV;
                        // the common block is found when paving
                        let location = self.store.edge(ea)?.point_at(0.5 * (ta.0 + ta.1));
                        self.record(
                            shapes[0],
                            shapes[1],
                            IntersectionRecord {
                                location,
                                param_a: SubParam::EdgeRange(ta.0, ta.1),
                                param_b: SubParam::EdgeRange(tb.0, tb.1),
                                kind: RecordKind::Curve,
                                tolerance: tol,
                                entity: None,
                            },
                        );
                    }
                }
                count += 1;
            }
        }
        debug!(pairs = pairs.len(), records = count, "edge/edge phase");
        self.report.count("EE", count);
        Ok(())
    }

    fn perform_vf(&mut self) -> Result<()> {
        let mut pairs = Vec::new();
        for (v, rank) in self.representatives() {
            for &f in &self.operands[rank.other() as usize].faces {
                if self.bbox_overlap(Shape::Vertex(v), Shape::Face(f)) {
                    pairs.push((v, f));
                }
            }
        }

        let (store, ds, locators, face_edges, fuzzy) = (
            &*self.store,
            &self.ds,
            &self.locators,
            &self.face_edges,
            self.options.fuzzy,
        );
        let hits = par_map(self.options.parallel, &pairs, |&(v, f)| -> Result<_> {
            let (Some(locator), Some(edges)) = (locators.get(&f), face_edges.get(&f)) else {
                return Ok(None);
            };
            for &e in edges {
                let ed = store.edge(e)?;
                if ds.resolve(ed.start) == v || ds.resolve(ed.end) == v {
                    return Ok(None);
                }
            }
            let vd = store.vertex(v)?;
            let tol = combined(ds.tolerance(v, vd.tolerance), store.face(f)?.tolerance, fuzzy);
            Ok(vertex_face(&vd.point, tol, locator).map(|(uv, _)| (vd.point, uv)))
        });

        let mut count = 0;
        for (&(v, f), hit) in pairs.iter().zip(hits) {
            let Some((point, uv)) = hit? else {
                continue;
            };
            self.ds.add_on_vertex(f, v);
            self.record(
                Shape::Vertex(v),
                Shape::Face(f),
                IntersectionRecord {
                    location: point,
                    param_a: SubParam::Vertex,
                    param_b: SubParam::Face(uv.x, uv.y),
                    kind: RecordKind::Point,
                    tolerance: self.vertex_tolerance(v)?,
                    entity: Some(Shape::Vertex(v)),
                },
            );
            count += 1;
        }
        debug!(pairs = pairs.len(), records = count, "vertex/face phase");
        self.report.count("VF", count);
        Ok(())
    }

    fn perform_ef(&mut self) -> Result<()> {
        let mut pairs = Vec::new();
        for rank in [Rank::A, Rank::B] {
            for &e in &self.operands[rank as usize].edges {
                for &f in &self.operands[rank.other() as usize].faces {
                    let on_boundary = self.face_edges.get(&f).is_some_and(|s| s.contains(&e));
                    if !on_boundary && self.bbox_overlap(Shape::Edge(e), Shape::Face(f)) {
                        pairs.push((e, f, rank));
                    }
                }
            }
        }

        let (store, locators, options) = (&*self.store, &self.locators, self.options);
        let outcomes = par_map(options.parallel, &pairs, |&(e, f, _)| -> Result<_> {
            let ed = store.edge(e)?;
            let tol = combined(ed.tolerance, store.face(f)?.tolerance, options.fuzzy);
            Ok(locators
                .get(&f)
                .map(|loc| (tol, edge_face(ed, loc, tol, options.max_iterations))))
        });

        let mut count = 0;
        for (&(e, f, rank), outcome) in pairs.iter().zip(outcomes) {
            let Some((tol, outcome)) = outcome? else {
                continue;
            };
            let shapes = [Shape::Edge(e), Shape::Face(f)];
            self.absorb_issues(outcome.issues, &shapes);
            for hit in outcome.hits {
                match hit {
                    EdgeFaceHit::OnSurface => {
                        self.ds.add_in_edge(f, e);
                        let location = self.store.edge(e)?.point_at(self.store.edge(e)?.mid_param());
                        self.record(
                            shapes[0],
                            shapes[1],
                            IntersectionRecord {
                                location,
                                param_a: SubParam::None,
                                param_b: SubParam::None,
                                kind: RecordKind::Curve,
                                tolerance: tol,
                                entity: Some(Shape::Edge(e)),
                            },
                        );
                    }
                    EdgeFaceHit::Point {
                        point,
                        t,
                        uv,
                        location,
                    } => {
                        if self.near_end(e, &point, tol)? {
                            continue;
                        }
                        let v = self.pool.find_or_insert(
                            self.store,
                            &mut self.ds,
                            &mut self.report,
                            point,
                            tol,
                            rank,
                            &shapes,
                        );
                        self.ds.add_pave(e, Pave { vertex: v, param: t });
                        self.ds.add_on_vertex(f, v);
                        self.ds.record_generated(Shape::Face(f), Shape::Vertex(v));
                        self.ds.record_generated(Shape::Edge(e), Shape::Vertex(v));
                        if location == FaceLocation::OnBoundary {
                            self.pave_face_boundary(f, v, &point, tol)?;
                        }
                        self.record(
                            shapes[0],
                            shapes[1],
                            IntersectionRecord {
                                location: point,
                                param_a: SubParam::Edge(t),
                                param_b: SubParam::Face(uv.x, uv.y),
                                kind: RecordKind::Point,
                                tolerance: tol,
                                entity: Some(Shape::Vertex(v)),
                            },
                        );
                    }
                }
                count += 1;
            }
        }
        debug!(pairs = pairs.len(), records = count, "edge/face phase");
        self.report.count("EF", count);
        Ok(())
    }

    /// Paves the boundary edges of `face` passing through a vertex found on
    /// the face boundary.
    fn pave_face_boundary(&mut self, face: FaceId, v: VertexId, point: &Point3, tol: f64) -> Result<()> {
        let edges: Vec<EdgeId> = self
            .face_edges
            .get(&face)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();
        for be in edges {
            let data = self.store.edge(be)?;
            if self.ds.resolve(data.start) == v || self.ds.resolve(data.end) == v {
                continue;
            }
            let (t, d) = data.project(point);
            let limit = tol + data.tolerance;
            if d <= limit && !self.near_end(be, point, limit)? {
                let known = self.ds.paves(be).iter().any(|p| p.vertex == v);
                if !known {
                    self.ds.add_pave(be, Pave { vertex: v, param: t });
                }
            }
        }
        Ok(())
    }

    /// Vertices a section curve on `face` may be cut at: resolved ends and
    /// paves of its boundary edges plus the vertices found on it.
    fn cut_candidates(&self, face: FaceId) -> Result<Vec<VertexId>> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut push = |v: VertexId| {
            if seen.insert(v) {
                out.push(v);
            }
        };
        if let Some(edges) = self.face_edges.get(&face) {
            for &e in edges {
                let data = self.store.edge(e)?;
                push(self.ds.resolve(data.start));
                push(self.ds.resolve(data.end));
                for pave in self.ds.paves(e) {
                    push(self.ds.resolve(pave.vertex));
                }
            }
        }
        if let Some(info) = self.ds.face_info(face) {
            for &v in &info.on_vertices {
                push(self.ds.resolve(v));
            }
        }
        Ok(out)
    }

    fn perform_ff(&mut self) -> Result<()> {
        let mut pairs = Vec::new();
        for &fa in &self.operands[0].faces {
            for &fb in &self.operands[1].faces {
                if fa != fb && self.bbox_overlap(Shape::Face(fa), Shape::Face(fb)) {
                    pairs.push((fa, fb));
                }
            }
        }

        let mut candidates: HashMap<FaceId, Vec<(VertexId, Point3, f64)>> = HashMap::new();
        for &(fa, fb) in &pairs {
            for f in [fa, fb] {
                if candidates.contains_key(&f) {
                    continue;
                }
                let mut list = Vec::new();
                for v in self.cut_candidates(f)? {
                    let vd = self.store.vertex(v)?;
                    list.push((v, vd.point, self.ds.tolerance(v, vd.tolerance)));
                }
                candidates.insert(f, list);
            }
        }

        let (store, ds, locators, options) = (&*self.store, &self.ds, &self.locators, self.options);
        let candidates = &candidates;
        let results = par_map(options.parallel, &pairs, |&(fa, fb)| -> Result<Option<PairSection>> {
            let (da, db) = (store.face(fa)?, store.face(fb)?);
            let (Some(ia), Some(ib)) = (ds.index(Shape::Face(fa)), ds.index(Shape::Face(fb))) else {
                return Ok(None);
            };
            let (Some(la), Some(lb)) = (locators.get(&fa), locators.get(&fb)) else {
                return Ok(None);
            };
            let bbox = ds.info(ia).bbox.intersection(&ds.info(ib).bbox);
            let tol = combined(da.tolerance, db.tolerance, options.fuzzy);
            match face_face(da, db, &bbox, tol, options.max_iterations) {
                FaceFace::SameDomain => Ok(Some(PairSection::SameDomain)),
                FaceFace::Curves(outcome) => {
                    if outcome.is_empty() {
                        return Ok(None);
                    }
                    let mut cands: Vec<(VertexId, Point3, f64)> = Vec::new();
                    for f in [fa, fb] {
                        for c in candidates.get(&f).into_iter().flatten() {
                            if cands.iter().all(|(v, _, _)| *v != c.0) {
                                cands.push(*c);
                            }
                        }
                    }
                    let mut issues = outcome.issues;
                    let mut spans = Vec::new();
                    for geom in &outcome.hits {
                        trim(geom, &cands, [(fa, la), (fb, lb)], tol, options.fuzzy, &mut spans, &mut issues);
                    }
                    Ok(Some(PairSection::Spans { spans, issues }))
                }
            }
        });

        let mut count = 0;
        for (&(fa, fb), result) in pairs.iter().zip(results) {
            let shapes = [Shape::Face(fa), Shape::Face(fb)];
            match result? {
                None => {}
                Some(PairSection::SameDomain) => {
                    self.ds.add_same_domain(fa, fb);
                    let location = self
                        .locators
                        .get(&fa)
                        .map_or_else(Point3::origin, |l| l.uv().surface().evaluate(0.0, 0.0));
                    self.record(
                        shapes[0],
                        shapes[1],
                        IntersectionRecord {
                            location,
                            param_a: SubParam::None,
                            param_b: SubParam::None,
                            kind: RecordKind::Curve,
                            tolerance: 0.0,
                            entity: None,
                        },
                    );
                    count += 1;
                }
                Some(PairSection::Spans { spans, issues }) => {
                    self.absorb_issues(issues, &shapes);
                    for span in spans {
                        self.commit_span(fa, fb, span);
                        count += 1;
                    }
                }
            }
        }
        debug!(pairs = pairs.len(), records = count, sections = self.ds.sections().len(), "face/face phase");
        self.report.count("FF", count);
        Ok(())
    }

    fn commit_span(&mut self, fa: FaceId, fb: FaceId, span: Span) {
        let shapes = [Shape::Face(fa), Shape::Face(fb)];
        let (v0, v1) = match (span.v0, span.v1) {
            (Some(v0), Some(v1)) => (v0, v1),
            _ => {
                // a closed curve crossing no boundary gets one new vertex
                let point = span.curve.evaluate(span.t0);
                let v = self.pool.find_or_insert(
                    self.store,
                    &mut self.ds,
                    &mut self.report,
                    point,
                    span.tolerance,
                    Rank::A,
                    &shapes,
                );
                self.ds.record_generated(shapes[0], Shape::Vertex(v));
                self.ds.record_generated(shapes[1], Shape::Vertex(v));
                (v, v)
            }
        };
        let location = span.curve.evaluate(0.5 * (span.t0 + span.t1));
        self.record(
            shapes[0],
            shapes[1],
            IntersectionRecord {
                location,
                param_a: SubParam::None,
                param_b: SubParam::None,
                kind: RecordKind::Curve,
                tolerance: span.tolerance,
                entity: None,
            },
        );
        self.ds.add_section(SectionCurve {
            curve: span.curve,
            t_start: span.t0,
            t_end: span.t1,
            start: v0,
            end: v1,
            tolerance: span.tolerance,
            faces: span.faces,
        });
    }
}

/// Cuts one untrimmed section curve at the candidate vertices lying on it
/// and keeps the pieces whose midpoint is on both faces.
#[allow(clippy::too_many_arguments)]
fn trim(
    geom: &SectionGeom,
    cands: &[(VertexId, Point3, f64)],
    faces: [(FaceId, &FaceLocator); 2],
    tol: f64,
    fuzzy: f64,
    spans: &mut Vec<Span>,
    issues: &mut Vec<Issue>,
) {
    // marched chords stray from the surfaces by up to the curve tolerance
    let tol = tol.max(geom.tolerance);
    let on_both = |p: &Point3| faces.iter().all(|(_, l)| l.locate(p, tol) != FaceLocation::Outside);
    let mut cuts: Vec<(f64, VertexId, Point3)> = Vec::new();
    for (v, p, vtol) in cands {
        let (t, d) = geom.curve.project(p, geom.t_start, geom.t_end);
        if d > vtol + geom.tolerance + fuzzy || !on_both(p) {
            continue;
        }
        cuts.push((t, *v, *p));
    }
    cuts.sort_by(|a, b| a.0.total_cmp(&b.0));
    cuts.dedup_by(|b, a| a.1 == b.1 || (a.2 - b.2).norm() <= tol);

    let speed = geom.curve.derivative(0.5 * (geom.t_start + geom.t_end)).norm();
    let ptol = parametric(tol, speed);
    let mut push = |t0: f64, t1: f64, v0: Option<VertexId>, v1: Option<VertexId>| {
        if t1 - t0 <= ptol {
            return;
        }
        let mid = geom.curve.evaluate(0.5 * (t0 + t1));
        let locations = faces.map(|(f, l)| (f, l.locate(&mid, tol)));
        if locations.iter().any(|(_, l)| *l == FaceLocation::Outside) {
            return;
        }
        spans.push(Span {
            curve: geom.curve.clone(),
            t0,
            t1,
            v0,
            v1,
            faces: locations
                .iter()
                .filter(|(_, l)| *l == FaceLocation::Inside)
                .map(|(f, _)| *f)
                .collect(),
            tolerance: geom.tolerance,
        });
    };

    let inside_both = |t: f64| {
        let p = geom.curve.evaluate(t);
        faces.iter().all(|(_, l)| l.locate(&p, tol) == FaceLocation::Inside)
    };

    if geom.closed {
        let period = geom.t_end - geom.t_start;
        match cuts.len() {
            0 => {
                if on_both(&geom.curve.evaluate(geom.t_start))
                    && on_both(&geom.curve.evaluate(geom.t_start + 0.5 * period))
                {
                    push(geom.t_start, geom.t_end, None, None);
                }
            }
            n => {
                for i in 0..n {
                    let (t0, v0, _) = cuts[i];
                    let (t1, v1) = if i + 1 < n {
                        (cuts[i + 1].0, cuts[i + 1].1)
                    } else {
                        (cuts[0].0 + period, cuts[0].1)
                    };
                    push(t0, t1, Some(v0), Some(v1));
                }
            }
        }
        return;
    }

    let (first, last) = match (cuts.first(), cuts.last()) {
        (Some(f), Some(l)) => (f.0, l.0),
        _ => (geom.t_end, geom.t_end),
    };
    // pieces running off the curve without reaching a vertex
    if (first - geom.t_start > ptol && inside_both(0.5 * (geom.t_start + first)))
        || (geom.t_end - last > ptol && inside_both(0.5 * (last + geom.t_end)))
    {
        issues.push(Issue::Degenerate("section curve leaves a face without a vertex".into()));
    }
    for w in cuts.windows(2) {
        if w[0].1 != w[1].1 {
            push(w[0].0, w[1].0, Some(w[0].1), Some(w[1].1));
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::geometry::Line;
    use crate::math::Vector3;
    use crate::operations::creation::{MakeBox, MakeCylinder};
    use crate::topology::{CompoundData, EdgeData, VertexData};

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    fn run(store: &mut TopologyStore, a: Shape, b: Shape) -> (IntersectionDS, Report) {
        let options = BooleanOptions::default().with_parallel(false);
        PaveFiller::new(store, &options).perform(a, b).unwrap()
    }

    #[test]
    fn offset_cubes_share_corner_vertices() {
        let mut store = TopologyStore::new();
        let a = MakeBox::new(p(0.0, 0.0, 0.0), p(1.0, 1.0, 1.0)).execute(&mut store).unwrap();
        let b = MakeBox::new(p(0.5, 0.0, 0.0), p(1.5, 1.0, 1.0)).execute(&mut store).unwrap();
        let before = store.vertex_count();
        let (ds, report) = run(&mut store, a.into(), b.into());
        // B's corners at x = 0.5 lie on A's edges, A's at x = 1 on B's
        assert_eq!(report.counter("VE"), 8);
        assert_eq!(report.counter("VV"), 0);
        // no new vertex: every crossing is an existing corner
        assert_eq!(store.vertex_count(), before);
        assert!(!ds.same_domain().is_empty());
        assert!(!report.has_warnings());
    }

    #[test]
    fn coincident_corners_are_unified() {
        let mut store = TopologyStore::new();
        let a = MakeBox::new(p(0.0, 0.0, 0.0), p(1.0, 1.0, 1.0)).execute(&mut store).unwrap();
        let b = MakeBox::new(p(0.0, 0.0, 1.0), p(1.0, 1.0, 2.0)).execute(&mut store).unwrap();
        let (ds, report) = run(&mut store, a.into(), b.into());
        assert_eq!(report.counter("VV"), 4);
        let unified = ds
            .originals()
            .filter_map(|s| match s.shape {
                Shape::Vertex(v) if ds.resolve(v) != v => Some(v),
                _ => None,
            })
            .count();
        assert_eq!(unified, 4);
    }

    #[test]
    fn crossing_boxes_produce_sections() {
        let mut store = TopologyStore::new();
        let a = MakeBox::new(p(0.0, 0.0, 0.0), p(2.0, 2.0, 2.0)).execute(&mut store).unwrap();
        let b = MakeBox::new(p(1.0, 1.0, 1.0), p(3.0, 3.0, 3.0)).execute(&mut store).unwrap();
        let (ds, report) = run(&mut store, a.into(), b.into());
        // three B faces cross three A faces in an L, one section piece each
        assert_eq!(ds.sections().len(), 6, "{:?}", report.warnings);
        assert_eq!(report.counter("EF"), 6);
        for s in ds.sections() {
            assert_eq!(s.faces.len(), 2);
            assert!((s.t_end - s.t_start - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn cylinder_through_box_gets_cap_sections() {
        let mut store = TopologyStore::new();
        let a = MakeBox::new(p(0.0, 0.0, 0.0), p(2.0, 2.0, 1.0)).execute(&mut store).unwrap();
        let b = MakeCylinder::new(p(1.0, 1.0, -0.5), 0.5, Vector3::z(), 2.0)
            .execute(&mut store)
            .unwrap();
        let (ds, report) = run(&mut store, a.into(), b.into());
        // each cap plane cuts the two half-cylinders into one arc each
        assert_eq!(ds.sections().len(), 4, "{:?}", report.warnings);
        assert!(!report.has_warnings());
    }

    #[test]
    fn tilted_cylinder_keeps_marched_sections() {
        let mut store = TopologyStore::new();
        let slab = MakeBox::new(p(-2.0, -2.0, 0.0), p(2.0, 2.0, 1.0)).execute(&mut store).unwrap();
        let rod = MakeCylinder::new(p(0.0, 0.0, -1.0), 0.3, Vector3::new(0.3, 0.0, 1.0), 3.0)
            .execute(&mut store)
            .unwrap();
        let (ds, report) = run(&mut store, slab.into(), rod.into());
        // both slab faces cut each half-cylinder in half an ellipse
        assert_eq!(ds.sections().len(), 4, "{:?}", report.warnings);
        for s in ds.sections() {
            assert_eq!(s.faces.len(), 2);
            assert!(s.t_end > s.t_start);
        }
    }

    #[test]
    fn zero_length_edge_is_screened_out() {
        let mut store = TopologyStore::new();
        let v0 = store.add_vertex(VertexData::new(p(0.5, 0.5, 0.5)));
        let v1 = store.add_vertex(VertexData::new(p(0.5 + 1e-9, 0.5, 0.5)));
        let line = Line::new(p(0.5, 0.5, 0.5), Vector3::x()).unwrap();
        let stub = store.add_edge(EdgeData::new(v0, v1, EdgeCurve::Line(line), 0.0, 1e-9));
        let a = Shape::Compound(store.add_compound(CompoundData {
            shapes: vec![Shape::Edge(stub)],
        }));
        let b = MakeBox::new(p(0.0, 0.0, 0.0), p(1.0, 1.0, 1.0)).execute(&mut store).unwrap();
        let (ds, report) = run(&mut store, a, b.into());
        assert!(ds.is_degenerate(stub));
        assert_eq!(ds.resolve(v1), v0);
        assert!(report.warnings.iter().any(|w| matches!(
            w,
            Warning::GeometricDegeneracy { shapes, .. } if shapes == &vec![Shape::Edge(stub)]
        )));
        // the stub sits inside the box yet meets nothing
        assert!(ds.paves(stub).is_empty());
        assert_eq!(report.counter("EF"), 0);
    }

    #[test]
    fn cancelled_filler_stops() {
        let mut store = TopologyStore::new();
        let a = MakeBox::new(p(0.0, 0.0, 0.0), p(1.0, 1.0, 1.0)).execute(&mut store).unwrap();
        let b = MakeBox::new(p(0.5, 0.5, 0.5), p(1.5, 1.5, 1.5)).execute(&mut store).unwrap();
        let token = super::super::CancelToken::new();
        token.cancel();
        let options = BooleanOptions::default().with_cancel(token);
        assert!(PaveFiller::new(&mut store, &options).perform(a.into(), b.into()).is_err());
    }
}
