//! Rule composition along a match of the second rule's left side into the first rule's
//! right side.
//!
//! The result core is assembled in four passes: copy the first rule's vertices, fuse or add
//! the second rule's vertices, copy the first rule's edges, fuse or add the second rule's
//! edges. Any pass may find that the composition is undefined (a dangling or parallel edge),
//! in which case no rule is produced. Labels, terms, stereo data and constraints are then
//! re-derived from whichever rule contributed each element.

use crate::config::{LabelSettings, LabelType};
use crate::error::Error;
use crate::graph::stereo::{Cloner, Configuration, EdgeCategory, EmbeddingEdge};
use crate::graph::term::{Owner, Substitution, Symbol, Term};
use crate::graph::topology::Topology;
use crate::morphism::common_subgraph::{common_subgraphs, CommonSubgraphOptions};
use crate::morphism::constraints::Constraint;
use crate::morphism::vertex_map::{InvertibleMap, InvertibleVertexMap, VectorVertexMap, VertexMap};
use crate::morphism::vf2::{Mode, Vf2};
use crate::morphism::LabelMatcher;
use crate::rule::labelled_rule::{LabelledRule, Membership, PropTermCore, RuleBuilder, Side};
use std::collections::HashSet;
use std::rc::Rc;

/// A composed rule with the maps from both input cores into its core.
#[derive(Debug, Clone)]
pub struct Composition {
    pub rule: LabelledRule,
    pub first_to_result: VectorVertexMap,
    pub second_to_result: VectorVertexMap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    First,
    Second,
}

/// Where a result label comes from: an element of one input rule, read on one side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LabelRef {
    origin: Origin,
    index: usize,
    side: Side,
}

#[derive(Debug, Clone)]
struct Element {
    membership: Membership,
    left: Option<LabelRef>,
    right: Option<LabelRef>,
}

#[derive(Debug, Clone)]
struct ResultEdge {
    source: usize,
    target: usize,
    element: Element,
}

struct Composer<'a> {
    first: &'a LabelledRule,
    second: &'a LabelledRule,
    /// Second core vertices to first core vertices.
    matching: &'a InvertibleVertexMap,
    settings: LabelSettings,
    vertices: Vec<Element>,
    edges: Vec<ResultEdge>,
    first_to_result: Vec<Option<usize>>,
    second_to_result: Vec<Option<usize>>,
    first_edge_to_result: Vec<Option<usize>>,
    /// Label pairs that were fused and must agree: (second left, first right).
    fused: Vec<(LabelRef, LabelRef, bool)>,
}

fn left_ref(origin: Origin, index: usize) -> LabelRef {
    LabelRef {
        origin,
        index,
        side: Side::Left,
    }
}

fn right_ref(origin: Origin, index: usize) -> LabelRef {
    LabelRef {
        origin,
        index,
        side: Side::Right,
    }
}

fn element(origin: Origin, index: usize, membership: Membership) -> Element {
    Element {
        membership,
        left: if membership.in_left() { Some(left_ref(origin, index)) } else { None },
        right: if membership.in_right() { Some(right_ref(origin, index)) } else { None },
    }
}

impl<'a> Composer<'a> {
    fn rule(&self, origin: Origin) -> &'a LabelledRule {
        match origin {
            Origin::First => self.first,
            Origin::Second => self.second,
        }
    }

    /// The first-rule vertex a second-rule vertex is fused with.
    fn first_of(&self, v_second: usize) -> Option<usize> {
        if self.second.vertex_membership(v_second) == Membership::Right {
            None
        } else {
            self.matching.get(v_second)
        }
    }

    fn second_of(&self, v_first: usize) -> Option<usize> {
        if self.first.vertex_membership(v_first) == Membership::Left {
            None
        } else {
            self.matching.get_inverse(v_first)
        }
    }

    fn add_edge(&mut self, source: usize, target: usize, element: Element) -> usize {
        self.edges.push(ResultEdge { source, target, element });
        self.edges.len() - 1
    }

    fn copy_vertices_first(&mut self, copy_vertices: Option<&[usize]>) {
        let all: Vec<usize>;
        let selected = match copy_vertices {
            Some(vs) => vs,
            None => {
                all = (0..self.first.core().num_vertices()).collect();
                &all
            }
        };
        for &v in selected {
            let membership = self.first.vertex_membership(v);
            let deleted = membership == Membership::Right
                && self
                    .second_of(v)
                    .map_or(false, |s| self.second.vertex_membership(s) == Membership::Left);
            if deleted {
                log::trace!("first vertex {} gets deleted", v);
                continue;
            }
            self.vertices.push(element(Origin::First, v, membership));
            self.first_to_result[v] = Some(self.vertices.len() - 1);
        }
    }

    fn compose_vertices_second(&mut self) {
        for v in 0..self.second.core().num_vertices() {
            let membership = self.second.vertex_membership(v);
            let v_first = match self.first_of(v) {
                Some(f) => f,
                None => {
                    self.vertices.push(element(Origin::Second, v, membership));
                    self.second_to_result[v] = Some(self.vertices.len() - 1);
                    continue;
                }
            };
            self.fused.push((left_ref(Origin::Second, v), right_ref(Origin::First, v_first), true));
            let v_result = match self.first_to_result[v_first] {
                Some(r) => r,
                None => continue,
            };
            self.second_to_result[v] = Some(v_result);
            let result = &mut self.vertices[v_result];
            match (self.first.vertex_membership(v_first), membership) {
                (Membership::Right, Membership::Context) | (Membership::Context, Membership::Context) => {
                    result.right = Some(right_ref(Origin::Second, v));
                }
                (Membership::Context, Membership::Left) => {
                    result.membership = Membership::Left;
                    result.right = None;
                }
                (mf, ms) => unreachable!("vertex {} ({:?}) fused with first vertex {} ({:?})", v, ms, v_first, mf),
            }
        }
    }

    fn vertex_deleted_or_left(&self, v_first: usize, v_second: usize) -> bool {
        self.first_to_result[v_first].is_none() || self.second.vertex_membership(v_second) == Membership::Left
    }

    /// Returns false when an edge would dangle.
    fn copy_edges_first(&mut self) -> bool {
        let core = self.first.core();
        for e in 0..core.num_edges() {
            let (s, t) = core.endpoints(e);
            let membership = self.first.edge_membership(e);
            let ends = match (self.first_to_result[s], self.first_to_result[t]) {
                (Some(rs), Some(rt)) => Some((rs, rt)),
                _ => None,
            };
            if membership == Membership::Left {
                if let Some((rs, rt)) = ends {
                    self.first_edge_to_result[e] = Some(self.add_edge(rs, rt, element(Origin::First, e, membership)));
                }
                continue;
            }
            match (self.second_of(s), self.second_of(t)) {
                (Some(ss), Some(st)) => {
                    let second_edge = self
                        .second
                        .core()
                        .edge_between(ss, st)
                        .filter(|&es| self.second.edge_membership(es) != Membership::Right);
                    if let Some(es) = second_edge {
                        if membership == Membership::Right {
                            continue;
                        }
                        let m = self.second.edge_membership(es);
                        let (rs, rt) = match ends {
                            Some(ends) => ends,
                            None => return false,
                        };
                        let right = if m == Membership::Left { None } else { Some(right_ref(Origin::First, e)) };
                        let id = self.add_edge(
                            rs,
                            rt,
                            Element {
                                membership: m,
                                left: Some(left_ref(Origin::First, e)),
                                right,
                            },
                        );
                        self.first_edge_to_result[e] = Some(id);
                        continue;
                    }
                    if self.vertex_deleted_or_left(s, ss) || self.vertex_deleted_or_left(t, st) {
                        log::trace!("first edge {} would dangle", e);
                        return false;
                    }
                }
                (Some(ss), None) if self.vertex_deleted_or_left(s, ss) => return false,
                (None, Some(st)) if self.vertex_deleted_or_left(t, st) => return false,
                _ => {}
            }
            if let Some((rs, rt)) = ends {
                self.first_edge_to_result[e] = Some(self.add_edge(rs, rt, element(Origin::First, e, membership)));
            }
        }
        true
    }

    /// Returns false when the result would need a parallel edge or a dangling one.
    fn compose_edges_second(&mut self) -> bool {
        let core = self.second.core();
        for e in 0..core.num_edges() {
            let (s, t) = core.endpoints(e);
            let membership = self.second.edge_membership(e);
            let (fs, ft) = (self.first_of(s), self.first_of(t));
            let (rs, rt) = (self.second_to_result[s], self.second_to_result[t]);
            let (fs, ft) = match (fs, ft) {
                (Some(fs), Some(ft)) => (fs, ft),
                (None, None) => {
                    match (rs, rt) {
                        (Some(rs), Some(rt)) => {
                            self.add_edge(rs, rt, element(Origin::Second, e, membership));
                        }
                        _ => return false,
                    }
                    continue;
                }
                _ => {
                    let (rs, rt) = match (rs, rt) {
                        (Some(rs), Some(rt)) => (rs, rt),
                        _ => return false,
                    };
                    let matched = if fs.is_some() { rs } else { rt };
                    let m = self.vertices[matched].membership;
                    if m != Membership::Context && m != membership {
                        log::trace!("second edge {} attached to a {:?} vertex", e, m);
                        return false;
                    }
                    self.add_edge(rs, rt, element(Origin::Second, e, membership));
                    continue;
                }
            };
            let first_edge = self.first.core().edge_between(fs, ft);
            let first_edge = match first_edge {
                Some(ef) => ef,
                None => {
                    if membership == Membership::Left {
                        let bad = |r: Option<usize>| r.map_or(true, |r| self.vertices[r].membership == Membership::Right);
                        if bad(rs) || bad(rt) {
                            return false;
                        }
                    }
                    match (rs, rt) {
                        (Some(rs), Some(rt)) => {
                            self.add_edge(rs, rt, element(Origin::Second, e, membership));
                        }
                        _ => return false,
                    }
                    continue;
                }
            };
            let first_membership = self.first.edge_membership(first_edge);
            if first_membership == Membership::Left && membership != Membership::Right {
                return false;
            }
            if first_membership != Membership::Left && membership == Membership::Right {
                log::trace!("second edge {} would be parallel to first edge {}", e, first_edge);
                return false;
            }
            if first_membership != Membership::Left {
                self.fused.push((left_ref(Origin::Second, e), right_ref(Origin::First, first_edge), false));
            }
            if membership == Membership::Left {
                continue;
            }
            if first_membership == Membership::Right {
                let (rs, rt) = match (rs, rt) {
                    (Some(rs), Some(rt)) => (rs, rt),
                    _ => return false,
                };
                self.add_edge(
                    rs,
                    rt,
                    Element {
                        membership: Membership::Right,
                        left: None,
                        right: Some(right_ref(Origin::Second, e)),
                    },
                );
                continue;
            }
            let id = match self.first_edge_to_result[first_edge] {
                Some(id) => id,
                None => return false,
            };
            let result = &mut self.edges[id].element;
            result.membership = Membership::Context;
            result.right = Some(right_ref(Origin::Second, e));
        }
        true
    }

    fn string_of(&self, r: LabelRef, vertex: bool) -> &'a str {
        let rule = self.rule(r.origin);
        if vertex {
            rule.vertex_label(r.index, r.side)
        } else {
            rule.edge_label(r.index, r.side)
        }
    }

    fn term_of(&self, r: LabelRef, vertex: bool) -> Option<&'a Term> {
        let terms = self.rule(r.origin).terms()?;
        let table = match (vertex, r.side) {
            (true, Side::Right) => &terms.vertex_right,
            (true, _) => &terms.vertex_left,
            (false, Side::Right) => &terms.edge_right,
            (false, _) => &terms.edge_left,
        };
        table[r.index].as_ref()
    }

    fn owner(origin: Origin) -> Owner {
        match origin {
            Origin::First => Owner::Codomain,
            Origin::Second => Owner::Domain,
        }
    }

    fn check_string_labels(&self) -> Result<(), Error> {
        for &(second, first, vertex) in &self.fused {
            let (ls, lf) = (self.string_of(second, vertex), self.string_of(first, vertex));
            if ls != lf {
                return Err(Error::LabelConflict {
                    left: lf.to_string(),
                    right: ls.to_string(),
                });
            }
        }
        Ok(())
    }

    fn unify_terms(&self) -> Result<Substitution, Error> {
        let mut substitution = Substitution::new();
        for &(second, first, vertex) in &self.fused {
            let (ts, tf) = match (self.term_of(second, vertex), self.term_of(first, vertex)) {
                (Some(ts), Some(tf)) => (ts, tf),
                _ => {
                    return Err(Error::LabelConflict {
                        left: self.string_of(first, vertex).to_string(),
                        right: self.string_of(second, vertex).to_string(),
                    })
                }
            };
            if !substitution.unify((Owner::Domain, ts), (Owner::Codomain, tf)) {
                return Err(Error::LabelConflict {
                    left: tf.to_string(),
                    right: ts.to_string(),
                });
            }
        }
        Ok(substitution)
    }

    fn first_variables(&self) -> HashSet<Symbol> {
        let mut vars = vec![];
        if let Some(terms) = self.first.terms() {
            for table in &[&terms.vertex_left, &terms.vertex_right, &terms.edge_left, &terms.edge_right] {
                for t in table.iter().flatten() {
                    t.variables(&mut vars);
                }
            }
        }
        vars.into_iter().collect()
    }

    /// Expected embedding entries of `v` on `side` of the result core.
    fn side_offsets(&self, core: &Topology, v: usize, side: Side) -> Vec<usize> {
        core.out_edges(v)
            .enumerate()
            .filter(|(_, (e, _))| self.edges[*e].element.membership.in_side(side))
            .map(|(o, _)| o)
            .collect()
    }

    fn clone_stereo(&self, builder: &mut RuleBuilder) -> Result<(), Error> {
        if self.first.stereo().is_none() && self.second.stereo().is_none() {
            return Ok(());
        }
        builder.enable_stereo();
        for (v, vertex) in self.vertices.iter().enumerate() {
            for r in vertex.left.iter().chain(vertex.right.iter()) {
                let source = self.rule(r.origin);
                let stereo = match source.stereo() {
                    Some(s) => s,
                    None => continue,
                };
                let cfg = match r.side {
                    Side::Right => &stereo.vertex_right[r.index],
                    _ => &stereo.vertex_left[r.index],
                };
                let map = match r.origin {
                    Origin::First => &self.first_to_result,
                    Origin::Second => &self.second_to_result,
                };
                let cloned = Cloner::clone_configuration(cfg, source.core(), r.index, builder.core(), v, |u| {
                    map.get(u).copied().flatten()
                });
                let wanted = self.side_offsets(builder.core(), v, r.side);
                let covers = |c: &Configuration| {
                    let mut given: Vec<usize> = c.edge_offsets().collect();
                    given.sort_unstable();
                    given == wanted
                };
                let configuration = match cloned {
                    Some(c) if covers(&c) => c,
                    _ => {
                        log::debug!("configuration of vertex {} does not survive composition", v);
                        Configuration {
                            embedding: wanted.iter().copied().map(EmbeddingEdge::Edge).collect(),
                            ..Configuration::any(0)
                        }
                    }
                };
                builder.set_configuration(v, r.side, configuration)?;
            }
        }
        for (e, edge) in self.edges.iter().enumerate() {
            for r in edge.element.left.iter().chain(edge.element.right.iter()) {
                let category = match self.rule(r.origin).stereo() {
                    Some(s) => match r.side {
                        Side::Right => s.edge_right[r.index],
                        _ => s.edge_left[r.index],
                    },
                    None => EdgeCategory::from_label(self.string_of(*r, false)),
                };
                builder.set_edge_category(e, r.side, category)?;
            }
        }
        Ok(())
    }

    fn transfer_constraints(&self, builder: &mut RuleBuilder) -> Result<(), Error> {
        for c in self.first.constraints() {
            if let Some(c) = c.remapped(|v| self.first_to_result[v]) {
                builder.add_constraint(c)?;
            }
        }
        for c in self.second.constraints() {
            let usable = c.vertices().into_iter().all(|v| match self.second_to_result[v] {
                None => false,
                Some(r) => self.vertices[r].membership != Membership::Right,
            });
            if !usable {
                continue;
            }
            let settled = match c {
                Constraint::VertexAdjacency(a) => self.first_of(a.vertex).is_some(),
                Constraint::ShortestPath(p) => {
                    self.first_of(p.source).is_some() && self.first_of(p.target).is_some()
                }
            };
            if settled {
                continue;
            }
            if let Some(c) = c.remapped(|v| self.second_to_result[v]) {
                builder.add_constraint(c)?;
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<Composition, Error> {
        let term_mode = self.settings.label_type == LabelType::Term;
        let substitution = if term_mode {
            Some(self.unify_terms()?)
        } else {
            self.check_string_labels()?;
            None
        };
        let first_vars = self.first_variables();
        let rename = move |owner: Owner, name: &Symbol| -> Symbol {
            if owner == Owner::Domain && first_vars.contains(name) {
                Rc::from(format!("{}'", name))
            } else {
                name.clone()
            }
        };
        let resolve = |r: Option<LabelRef>, vertex: bool| -> (String, Option<Term>) {
            let r = match r {
                Some(r) => r,
                None => return (String::new(), None),
            };
            match (&substitution, self.term_of(r, vertex)) {
                (Some(sub), Some(t)) => {
                    let resolved = sub.resolve(Self::owner(r.origin), t, &rename);
                    (resolved.to_string(), Some(resolved))
                }
                _ => (self.string_of(r, vertex).to_string(), None),
            }
        };

        let name = format!("{} * {}", self.first.name(), self.second.name());
        let mut builder = RuleBuilder::new(&name);
        let mut terms = PropTermCore {
            vertex_left: vec![],
            vertex_right: vec![],
            edge_left: vec![],
            edge_right: vec![],
            error: None,
        };
        for vertex in &self.vertices {
            let (left, left_term) = resolve(vertex.left, true);
            let (right, right_term) = resolve(vertex.right, true);
            builder.add_vertex(vertex.membership, &left, &right);
            terms.vertex_left.push(left_term);
            terms.vertex_right.push(right_term);
        }
        for edge in &self.edges {
            let (left, left_term) = resolve(edge.element.left, false);
            let (right, right_term) = resolve(edge.element.right, false);
            builder.add_edge(edge.source, edge.target, edge.element.membership, &left, &right)?;
            terms.edge_left.push(left_term);
            terms.edge_right.push(right_term);
        }
        self.clone_stereo(&mut builder)?;
        self.transfer_constraints(&mut builder)?;
        builder.drop_split_constraints();
        let mut rule = builder.build()?;
        if term_mode {
            rule.set_terms(terms);
        }
        Ok(Composition {
            rule,
            first_to_result: VectorVertexMap::from(self.first_to_result),
            second_to_result: VectorVertexMap::from(self.second_to_result),
        })
    }
}

/// Compose `first` and `second` along `matching`, a partial injective map from the second
/// core (left side) into the first core (right side).
///
/// `copy_vertices` restricts which first-rule vertices are carried into the result; edges
/// of the first rule are copied when both endpoints are. Returns `Ok(None)` when the
/// composition is undefined and an error when fused labels conflict.
pub fn compose(
    first: &LabelledRule,
    second: &LabelledRule,
    matching: &InvertibleVertexMap,
    settings: LabelSettings,
    copy_vertices: Option<&[usize]>,
) -> Result<Option<Composition>, Error> {
    assert!(
        matching.domain_bound() >= second.core().num_vertices()
            && matching.codomain_bound() >= first.core().num_vertices(),
        "match does not cover the two rule cores"
    );
    for (v, w) in matching.pairs() {
        if !second.vertex_membership(v).in_left() || !first.vertex_membership(w).in_right() {
            return Err(Error::InvalidGraph(format!(
                "match {} -> {} is not from the left of {} into the right of {}",
                v,
                w,
                second.name(),
                first.name()
            )));
        }
    }
    if settings.label_type == LabelType::Term {
        let valid = |r: &LabelledRule| r.terms().map_or(false, PropTermCore::is_valid);
        if !valid(first) || !valid(second) {
            log::debug!("composition of {} and {} without valid terms", first.name(), second.name());
            return Ok(None);
        }
    }
    let mut composer = Composer {
        first,
        second,
        matching,
        settings,
        vertices: vec![],
        edges: vec![],
        first_to_result: vec![None; first.core().num_vertices()],
        second_to_result: vec![None; second.core().num_vertices()],
        first_edge_to_result: vec![None; first.core().num_edges()],
        fused: vec![],
    };
    composer.copy_vertices_first(copy_vertices);
    composer.compose_vertices_second();
    if !composer.copy_edges_first() || !composer.compose_edges_second() {
        log::debug!("composition of {} and {} is undefined", first.name(), second.name());
        return Ok(None);
    }
    composer.finish().map(Some)
}

fn compose_all<I>(first: &LabelledRule, second: &LabelledRule, matches: I, settings: LabelSettings) -> Result<Vec<Composition>, Error>
where
    I: IntoIterator<Item = InvertibleVertexMap>,
{
    let mut result = vec![];
    for m in matches {
        if let Some(c) = compose(first, second, &m, settings, None)? {
            result.push(c);
        }
    }
    Ok(result)
}

/// Compose along every common subgraph of the second rule's left side and the first
/// rule's right side.
pub fn compose_common(
    first: &LabelledRule,
    second: &LabelledRule,
    settings: LabelSettings,
    options: CommonSubgraphOptions,
) -> Result<Vec<Composition>, Error> {
    let (left, right) = (second.left(), first.right());
    let matches = common_subgraphs(&left, &right, LabelMatcher::new(&left, &right, settings), options);
    compose_all(first, second, matches, settings)
}

/// Compose along matches that cover the whole right side of the first rule.
pub fn compose_sub(first: &LabelledRule, second: &LabelledRule, settings: LabelSettings) -> Result<Vec<Composition>, Error> {
    let (right, left) = (first.right(), second.left());
    let matches: Vec<InvertibleVertexMap> = Vf2::new(&right, &left, LabelMatcher::new(&right, &left, settings), Mode::Monomorphism)
        .map(|m| m.inverted())
        .collect();
    compose_all(first, second, matches, settings)
}

/// Compose along matches that cover the whole left side of the second rule.
pub fn compose_super(first: &LabelledRule, second: &LabelledRule, settings: LabelSettings) -> Result<Vec<Composition>, Error> {
    let (left, right) = (second.left(), first.right());
    let matches: Vec<InvertibleVertexMap> =
        Vf2::new(&left, &right, LabelMatcher::new(&left, &right, settings), Mode::Monomorphism).collect();
    compose_all(first, second, matches, settings)
}
