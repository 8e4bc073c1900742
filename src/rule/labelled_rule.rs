//! DPO rules stored as one core graph whose elements are tagged with a [`Membership`].
//!
//! The sides L, K and R are not stored separately. A [`SideView`] filters the core by
//! membership (and optionally by connected component) and reads the labels of its side.

use crate::config::LabelSettings;
use crate::error::Error;
use crate::graph::labelled::LabelledGraph;
use crate::graph::stereo::{Configuration, EdgeCategory, EmbeddingEdge, Fixation, Geometry};
use crate::graph::term::{StringStore, Term};
use crate::graph::topology::{connected_components, Topology};
use crate::graph::LabelledView;
use crate::morphism::constraints::Constraint;
use crate::morphism::order::vertex_order_by_mult;
use crate::morphism::symmetry::StabiliserChain;
use crate::morphism::vertex_map::VertexMap;
use crate::morphism::vf2::{Mode, Vf2};
use crate::morphism::{LabelMatcher, Pinned};
use serde::Deserialize;
use std::cell::OnceCell;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
pub enum Membership {
    Left,
    Context,
    Right,
}

impl Membership {
    pub fn in_left(self) -> bool {
        self != Membership::Right
    }

    pub fn in_right(self) -> bool {
        self != Membership::Left
    }

    pub fn in_side(self, side: Side) -> bool {
        match side {
            Side::Left => self.in_left(),
            Side::Context => self == Membership::Context,
            Side::Right => self.in_right(),
        }
    }
}

/// One of the three graphs of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Context,
    Right,
}

/// Labels of the core. Context elements carry both a left and a right label; the unused
/// side of a Left or Right element is empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropStringCore {
    pub vertex_left: Vec<String>,
    pub vertex_right: Vec<String>,
    pub edge_left: Vec<String>,
    pub edge_right: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropTermCore {
    pub vertex_left: Vec<Option<Term>>,
    pub vertex_right: Vec<Option<Term>>,
    pub edge_left: Vec<Option<Term>>,
    pub edge_right: Vec<Option<Term>>,
    pub error: Option<Error>,
}

impl PropTermCore {
    fn parse(labels: &PropStringCore, vm: &[Membership], em: &[Membership], store: &mut StringStore) -> Self {
        let mut error = None;
        let mut parse_side = |labels: &[String], membership: &[Membership], side: Side| -> Vec<Option<Term>> {
            labels
                .iter()
                .zip(membership)
                .map(|(label, m)| {
                    if !m.in_side(side) {
                        return None;
                    }
                    match Term::parse(label, store) {
                        Ok(t) => Some(t),
                        Err(e) => {
                            log::debug!("{}", e);
                            error.get_or_insert(e);
                            None
                        }
                    }
                })
                .collect()
        };
        let vertex_left = parse_side(&labels.vertex_left, vm, Side::Left);
        let vertex_right = parse_side(&labels.vertex_right, vm, Side::Right);
        let edge_left = parse_side(&labels.edge_left, em, Side::Left);
        let edge_right = parse_side(&labels.edge_right, em, Side::Right);
        Self {
            vertex_left,
            vertex_right,
            edge_left,
            edge_right,
            error,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropStereoCore {
    pub vertex_left: Vec<Configuration>,
    pub vertex_right: Vec<Configuration>,
    pub edge_left: Vec<EdgeCategory>,
    pub edge_right: Vec<EdgeCategory>,
}

/// Partition of one side into connected components.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Components {
    /// Component of each core vertex, `None` outside the side.
    pub of_vertex: Vec<Option<usize>>,
    /// Vertices of each component in ascending order.
    pub vertices: Vec<Vec<usize>>,
}

impl Components {
    fn compute(core: &Topology, vm: &[Membership], em: &[Membership], side: Side) -> Self {
        let (of_vertex, count) =
            connected_components(core, |v| vm[v].in_side(side), |e| em[e].in_side(side));
        let mut vertices = vec![vec![]; count];
        for (v, c) in of_vertex.iter().enumerate() {
            if let Some(c) = c {
                vertices[*c].push(v);
            }
        }
        Self { of_vertex, vertices }
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct LabelledRule {
    name: String,
    core: Topology,
    vertex_membership: Vec<Membership>,
    edge_membership: Vec<Membership>,
    labels: PropStringCore,
    terms: Option<PropTermCore>,
    stereo: Option<PropStereoCore>,
    constraints: Vec<Constraint>,
    left_components: Components,
    right_components: Components,
    symmetry: OnceCell<StabiliserChain>,
}

/// Collects the core of a rule. Components are computed once by [`RuleBuilder::build`].
#[derive(Debug, Clone)]
pub struct RuleBuilder {
    name: String,
    core: Topology,
    vertex_membership: Vec<Membership>,
    edge_membership: Vec<Membership>,
    labels: PropStringCore,
    constraints: Vec<Constraint>,
    configurations: Vec<(usize, Side, Configuration)>,
    categories: Vec<(usize, Side, EdgeCategory)>,
    with_stereo: bool,
}

impl RuleBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            core: Topology::new(),
            vertex_membership: vec![],
            edge_membership: vec![],
            labels: PropStringCore::default(),
            constraints: vec![],
            configurations: vec![],
            categories: vec![],
            with_stereo: false,
        }
    }

    pub fn num_vertices(&self) -> usize {
        self.core.num_vertices()
    }

    pub(crate) fn core(&self) -> &Topology {
        &self.core
    }

    pub fn vertex_membership(&self, v: usize) -> Membership {
        self.vertex_membership[v]
    }

    /// Add a vertex. `left` is ignored for Right vertices and `right` for Left vertices.
    pub fn add_vertex(&mut self, membership: Membership, left: &str, right: &str) -> usize {
        let v = self.core.add_vertex();
        self.vertex_membership.push(membership);
        self.labels.vertex_left.push(if membership.in_left() { left } else { "" }.to_string());
        self.labels.vertex_right.push(if membership.in_right() { right } else { "" }.to_string());
        v
    }

    pub fn add_edge(
        &mut self,
        source: usize,
        target: usize,
        membership: Membership,
        left: &str,
        right: &str,
    ) -> Result<usize, Error> {
        for v in &[source, target] {
            if *v >= self.core.num_vertices() {
                return Err(Error::UnknownVertex(*v));
            }
        }
        let ends = (self.vertex_membership[source], self.vertex_membership[target]);
        let ok = match membership {
            Membership::Left => ends.0.in_left() && ends.1.in_left(),
            Membership::Right => ends.0.in_right() && ends.1.in_right(),
            Membership::Context => ends.0 == Membership::Context && ends.1 == Membership::Context,
        };
        if !ok {
            return Err(Error::MembershipMismatch {
                edge: (source, target),
                message: format!("{:?} edge between {:?} and {:?} vertices", membership, ends.0, ends.1),
            });
        }
        let e = self.core.add_edge(source, target)?;
        self.edge_membership.push(membership);
        self.labels.edge_left.push(if membership.in_left() { left } else { "" }.to_string());
        self.labels.edge_right.push(if membership.in_right() { right } else { "" }.to_string());
        Ok(e)
    }

    /// Constraints refer to left-side vertices.
    pub fn add_constraint(&mut self, constraint: Constraint) -> Result<(), Error> {
        for v in constraint.vertices() {
            match self.vertex_membership.get(v) {
                Some(m) if m.in_left() => {}
                Some(_) => {
                    return Err(Error::InvalidGraph(format!(
                        "constraint on vertex {} which is not in the left side",
                        v
                    )))
                }
                None => return Err(Error::UnknownVertex(v)),
            }
        }
        self.constraints.push(constraint);
        Ok(())
    }

    pub fn set_configuration(&mut self, v: usize, side: Side, configuration: Configuration) -> Result<(), Error> {
        if v >= self.core.num_vertices() {
            return Err(Error::UnknownVertex(v));
        }
        self.with_stereo = true;
        self.configurations.push((v, side, configuration));
        Ok(())
    }

    pub fn set_edge_category(&mut self, e: usize, side: Side, category: EdgeCategory) -> Result<(), Error> {
        if e >= self.core.num_edges() {
            return Err(Error::InvalidGraph(format!("unknown edge {}", e)));
        }
        self.with_stereo = true;
        self.categories.push((e, side, category));
        Ok(())
    }

    pub fn enable_stereo(&mut self) -> &mut Self {
        self.with_stereo = true;
        self
    }

    fn side_configuration(&self, v: usize, side: Side) -> Configuration {
        let offsets = self
            .core
            .out_edges(v)
            .enumerate()
            .filter(|(_, (e, _))| self.edge_membership[*e].in_side(side))
            .map(|(o, _)| EmbeddingEdge::Edge(o))
            .collect();
        Configuration {
            embedding: offsets,
            ..Configuration::any(0)
        }
    }

    fn build_stereo(&self) -> Result<Option<PropStereoCore>, Error> {
        if !self.with_stereo {
            return Ok(None);
        }
        let nv = self.core.num_vertices();
        let mut stereo = PropStereoCore {
            vertex_left: (0..nv).map(|v| self.side_configuration(v, Side::Left)).collect(),
            vertex_right: (0..nv).map(|v| self.side_configuration(v, Side::Right)).collect(),
            edge_left: self.labels.edge_left.iter().map(|l| EdgeCategory::from_label(l)).collect(),
            edge_right: self.labels.edge_right.iter().map(|l| EdgeCategory::from_label(l)).collect(),
        };
        for (v, side, cfg) in &self.configurations {
            let expected = self.side_configuration(*v, *side);
            let mut given: Vec<usize> = cfg.edge_offsets().collect();
            let mut wanted: Vec<usize> = expected.edge_offsets().collect();
            given.sort_unstable();
            wanted.sort_unstable();
            if given != wanted {
                return Err(Error::InvalidStereo(format!(
                    "configuration of vertex {} does not cover its {:?} edges",
                    v, side
                )));
            }
            match side {
                Side::Left => stereo.vertex_left[*v] = cfg.clone(),
                Side::Right => stereo.vertex_right[*v] = cfg.clone(),
                Side::Context => {
                    stereo.vertex_left[*v] = cfg.clone();
                    stereo.vertex_right[*v] = cfg.clone();
                }
            }
        }
        for (e, side, category) in &self.categories {
            if side != &Side::Right {
                stereo.edge_left[*e] = *category;
            }
            if side != &Side::Left {
                stereo.edge_right[*e] = *category;
            }
        }
        Ok(Some(stereo))
    }

    fn left_components(&self) -> Components {
        Components::compute(&self.core, &self.vertex_membership, &self.edge_membership, Side::Left)
    }

    /// Whether both ends of a shortest-path constraint lie in one left component. Matches are
    /// found one component at a time, so a distance between components is never checked.
    fn is_local(constraint: &Constraint, left: &Components) -> bool {
        match constraint {
            Constraint::ShortestPath(c) => left.of_vertex[c.source] == left.of_vertex[c.target],
            Constraint::VertexAdjacency(_) => true,
        }
    }

    /// Drop shortest-path constraints whose ends ended up in different left components.
    pub(crate) fn drop_split_constraints(&mut self) {
        let left = self.left_components();
        let name = &self.name;
        self.constraints.retain(|c| {
            let keep = Self::is_local(c, &left);
            if !keep {
                log::debug!("rule {}: dropping {:?} across left components", name, c);
            }
            keep
        });
    }

    pub fn build(self) -> Result<LabelledRule, Error> {
        let stereo = self.build_stereo()?;
        let left_components = self.left_components();
        if let Some(c) = self.constraints.iter().find(|c| !Self::is_local(c, &left_components)) {
            return Err(Error::InvalidGraph(format!(
                "rule {}: vertices {:?} of a shortest path constraint are in different left components",
                self.name,
                c.vertices()
            )));
        }
        let right_components =
            Components::compute(&self.core, &self.vertex_membership, &self.edge_membership, Side::Right);
        log::trace!(
            "rule {}: {} left and {} right components",
            self.name,
            left_components.len(),
            right_components.len()
        );
        Ok(LabelledRule {
            name: self.name,
            core: self.core,
            vertex_membership: self.vertex_membership,
            edge_membership: self.edge_membership,
            labels: self.labels,
            terms: None,
            stereo,
            constraints: self.constraints,
            left_components,
            right_components,
            symmetry: OnceCell::new(),
        })
    }
}

impl LabelledRule {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    pub fn core(&self) -> &Topology {
        &self.core
    }

    pub fn vertex_membership(&self, v: usize) -> Membership {
        self.vertex_membership[v]
    }

    pub fn edge_membership(&self, e: usize) -> Membership {
        self.edge_membership[e]
    }

    pub fn labels(&self) -> &PropStringCore {
        &self.labels
    }

    pub fn terms(&self) -> Option<&PropTermCore> {
        self.terms.as_ref()
    }

    pub fn stereo(&self) -> Option<&PropStereoCore> {
        self.stereo.as_ref()
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Parse every label as a term. Failures mark the rule invalid for term matching.
    pub fn parse_terms(&mut self, store: &mut StringStore) -> &mut Self {
        self.terms = Some(PropTermCore::parse(
            &self.labels,
            &self.vertex_membership,
            &self.edge_membership,
            store,
        ));
        self
    }

    pub(crate) fn set_terms(&mut self, terms: PropTermCore) {
        self.terms = Some(terms);
    }

    pub fn left_components(&self) -> &Components {
        &self.left_components
    }

    pub fn right_components(&self) -> &Components {
        &self.right_components
    }

    pub fn num_left_components(&self) -> usize {
        self.left_components.len()
    }

    pub fn side(&self, side: Side) -> SideView<'_> {
        SideView {
            rule: self,
            side,
            component: None,
        }
    }

    pub fn left(&self) -> SideView<'_> {
        self.side(Side::Left)
    }

    pub fn context(&self) -> SideView<'_> {
        self.side(Side::Context)
    }

    pub fn right(&self) -> SideView<'_> {
        self.side(Side::Right)
    }

    pub fn left_component(&self, component: usize) -> SideView<'_> {
        assert!(component < self.left_components.len(), "no left component {}", component);
        SideView {
            rule: self,
            side: Side::Left,
            component: Some(component),
        }
    }

    pub fn right_component(&self, component: usize) -> SideView<'_> {
        assert!(component < self.right_components.len(), "no right component {}", component);
        SideView {
            rule: self,
            side: Side::Right,
            component: Some(component),
        }
    }

    pub fn vertex_label(&self, v: usize, side: Side) -> &str {
        match side {
            Side::Right => &self.labels.vertex_right[v],
            _ => &self.labels.vertex_left[v],
        }
    }

    pub fn edge_label(&self, e: usize, side: Side) -> &str {
        match side {
            Side::Right => &self.labels.edge_right[e],
            _ => &self.labels.edge_left[e],
        }
    }

    /// Whether the rule changes anything at vertex `v`: its membership, its label, or one of
    /// its edges.
    pub fn is_changed(&self, v: usize) -> bool {
        self.vertex_membership[v] != Membership::Context
            || self.labels.vertex_left[v] != self.labels.vertex_right[v]
            || self.core.out_edges(v).any(|(e, _)| {
                self.edge_membership[e] != Membership::Context
                    || self.labels.edge_left[e] != self.labels.edge_right[e]
            })
    }

    /// Encode the core as a plain graph in which edges become vertices, so that label and
    /// membership changes are vertex labels and the string isomorphism test sees them.
    fn canonizable(&self) -> LabelledGraph {
        let mut graph = LabelledGraph::new(&self.name);
        let mut marks = vec![String::new(); self.core.num_vertices()];
        for (i, c) in self.constraints.iter().enumerate() {
            for (role, v) in c.vertices().into_iter().enumerate() {
                marks[v].push_str(&format!("|c{}.{}", i, role));
            }
        }
        if let Some(stereo) = &self.stereo {
            for v in 0..self.core.num_vertices() {
                let fixed = |c: &Configuration| c.fixation == Fixation::Simple;
                if fixed(&stereo.vertex_left[v]) || fixed(&stereo.vertex_right[v]) {
                    marks[v].push_str(&format!("|v{}", v));
                }
                for cfg in &[&stereo.vertex_left[v], &stereo.vertex_right[v]] {
                    if cfg.geometry != Geometry::Any {
                        marks[v].push_str(&format!("|{:?}", cfg.geometry));
                    }
                }
            }
        }
        for v in 0..self.core.num_vertices() {
            graph.add_vertex(&format!(
                "v{:?}\u{1}{}\u{1}{}{}",
                self.vertex_membership[v], self.labels.vertex_left[v], self.labels.vertex_right[v], marks[v]
            ));
        }
        for e in 0..self.core.num_edges() {
            let x = graph.add_vertex(&format!(
                "e{:?}\u{1}{}\u{1}{}",
                self.edge_membership[e], self.labels.edge_left[e], self.labels.edge_right[e]
            ));
            let (s, t) = self.core.endpoints(e);
            for end in &[s, t] {
                if let Err(err) = graph.add_edge(*end, x, "") {
                    panic!("encoding rule {}: {}", self.name, err);
                }
            }
        }
        graph
    }

    /// The automorphisms of the core that preserve memberships and labels, as a stabiliser
    /// chain. The base lists the left vertices component by component, then the rest of the
    /// core. Computed on first use.
    pub fn symmetry(&self) -> &StabiliserChain {
        self.symmetry.get_or_init(|| {
            let graph = self.canonizable();
            let n = self.core.num_vertices();
            let mut base: Vec<usize> = self.left_components.vertices.iter().flatten().copied().collect();
            let mut in_base = vec![false; n];
            for v in &base {
                in_base[*v] = true;
            }
            base.extend((0..n).filter(|v| !in_base[*v]));
            let rest = vertex_order_by_mult(&graph);
            let chain = StabiliserChain::search(n, base, |fixed, point, image| {
                let mut pins = vec![None; graph.vertex_bound()];
                for &v in fixed {
                    pins[v] = Some(v);
                }
                pins[point] = Some(image);
                let mut order = fixed.to_vec();
                order.push(point);
                order.extend(rest.iter().copied().filter(|v| pins[*v].is_none()));
                let matcher = Pinned::new(LabelMatcher::new(&graph, &graph, LabelSettings::string_iso()), pins);
                Vf2::with_order(&graph, &graph, matcher, Mode::Isomorphism, order)
                    .next()
                    .map(|m| (0..n).map(|v| m.get(v).unwrap_or(v)).collect())
            });
            log::debug!(
                "rule {}: {} automorphism generators, group order {}",
                self.name,
                chain.generators().len(),
                chain.order()
            );
            chain
        })
    }
}

/// One side of a rule, optionally restricted to one of its connected components.
#[derive(Clone, Copy)]
pub struct SideView<'a> {
    rule: &'a LabelledRule,
    side: Side,
    component: Option<usize>,
}

impl<'a> SideView<'a> {
    pub fn rule(&self) -> &'a LabelledRule {
        self.rule
    }

    pub fn which(&self) -> Side {
        self.side
    }

    fn components(&self) -> &'a Components {
        match self.side {
            Side::Right => &self.rule.right_components,
            _ => &self.rule.left_components,
        }
    }
}

impl LabelledView for SideView<'_> {
    fn topology(&self) -> &Topology {
        &self.rule.core
    }

    fn has_vertex(&self, v: usize) -> bool {
        self.rule.vertex_membership[v].in_side(self.side)
            && self
                .component
                .map_or(true, |c| self.components().of_vertex[v] == Some(c))
    }

    fn has_edge(&self, e: usize) -> bool {
        self.rule.edge_membership[e].in_side(self.side) && {
            let (s, _) = self.rule.core.endpoints(e);
            self.component
                .map_or(true, |c| self.components().of_vertex[s] == Some(c))
        }
    }

    fn vertex_label(&self, v: usize) -> &str {
        self.rule.vertex_label(v, self.side)
    }

    fn edge_label(&self, e: usize) -> &str {
        self.rule.edge_label(e, self.side)
    }

    fn vertex_term(&self, v: usize) -> Option<&Term> {
        let terms = self.rule.terms.as_ref()?;
        match self.side {
            Side::Right => terms.vertex_right[v].as_ref(),
            _ => terms.vertex_left[v].as_ref(),
        }
    }

    fn edge_term(&self, e: usize) -> Option<&Term> {
        let terms = self.rule.terms.as_ref()?;
        match self.side {
            Side::Right => terms.edge_right[e].as_ref(),
            _ => terms.edge_left[e].as_ref(),
        }
    }

    fn terms_valid(&self) -> bool {
        self.rule.terms.as_ref().map_or(false, PropTermCore::is_valid)
    }

    fn has_stereo(&self) -> bool {
        self.rule.stereo.is_some()
    }

    fn vertex_stereo(&self, v: usize) -> Option<&Configuration> {
        let stereo = self.rule.stereo.as_ref()?;
        Some(match self.side {
            Side::Right => &stereo.vertex_right[v],
            _ => &stereo.vertex_left[v],
        })
    }

    fn edge_category(&self, e: usize) -> Option<EdgeCategory> {
        let stereo = self.rule.stereo.as_ref()?;
        Some(match self.side {
            Side::Right => stereo.edge_right[e],
            _ => stereo.edge_left[e],
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::morphism::constraints::{Comparison, Operator, ShortestPath};
    use Membership::*;

    /// `C-C` single bond broken into two carbons.
    pub(crate) fn unbind_cc() -> LabelledRule {
        let mut b = RuleBuilder::new("unbind<C-C>");
        let a = b.add_vertex(Left, "C", "");
        let c = b.add_vertex(Left, "C", "");
        b.add_edge(a, c, Left, "-", "").unwrap();
        b.build().unwrap()
    }

    /// Break a `C-C` bond but keep both carbons.
    pub(crate) fn split_cc() -> LabelledRule {
        let mut b = RuleBuilder::new("split C-C");
        let a = b.add_vertex(Context, "C", "C");
        let c = b.add_vertex(Context, "C", "C");
        b.add_edge(a, c, Left, "-", "").unwrap();
        b.build().unwrap()
    }

    #[test]
    fn test_side_views() {
        let mut b = RuleBuilder::new("r");
        let a = b.add_vertex(Context, "C", "C");
        let o = b.add_vertex(Left, "O", "");
        let h = b.add_vertex(Right, "", "H");
        b.add_edge(a, o, Left, "-", "").unwrap();
        b.add_edge(a, h, Right, "", "-").unwrap();
        let r = b.build().unwrap();
        assert_eq!(r.left().vertices().collect::<Vec<_>>(), vec![a, o]);
        assert_eq!(r.context().vertices().collect::<Vec<_>>(), vec![a]);
        assert_eq!(r.right().vertices().collect::<Vec<_>>(), vec![a, h]);
        assert_eq!(r.left().num_edges(), 1);
        assert_eq!(r.context().num_edges(), 0);
        assert_eq!(r.right().degree(a), 1);
        assert_eq!(r.right().vertex_label(h), "H");
        assert_eq!(r.num_left_components(), 1);
        assert!(r.is_changed(a));
    }

    #[test]
    fn test_membership_mismatch() {
        let mut b = RuleBuilder::new("bad");
        let l = b.add_vertex(Left, "C", "");
        let r = b.add_vertex(Right, "", "C");
        assert!(matches!(
            b.add_edge(l, r, Left, "-", ""),
            Err(Error::MembershipMismatch { .. })
        ));
        let k = b.add_vertex(Context, "C", "C");
        assert!(b.add_edge(l, k, Context, "-", "-").is_err());
        assert!(b.add_edge(l, k, Left, "-", "").is_ok());
        assert_eq!(b.add_edge(l, 9, Left, "-", ""), Err(Error::UnknownVertex(9)));
    }

    #[test]
    fn test_components_are_fixed_at_build() {
        let mut b = RuleBuilder::new("two");
        for _ in 0..4 {
            b.add_vertex(Context, "C", "C");
        }
        b.add_edge(0, 1, Left, "-", "").unwrap();
        b.add_edge(2, 3, Context, "-", "-").unwrap();
        b.add_edge(1, 2, Right, "", "-").unwrap();
        let r = b.build().unwrap();
        assert_eq!(r.left_components().vertices, vec![vec![0, 1], vec![2, 3]]);
        assert_eq!(r.right_components().vertices, vec![vec![0], vec![1, 2, 3]]);
        let comp = r.left_component(1);
        assert_eq!(comp.vertices().collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(comp.num_edges(), 1);
    }

    #[test]
    fn test_automorphisms() {
        assert_eq!(unbind_cc().symmetry().order(), 2);
        assert_eq!(split_cc().symmetry().order(), 2);
        assert_eq!(split_cc().symmetry().generators().len(), 1);

        let mut b = RuleBuilder::new("asym");
        let a = b.add_vertex(Context, "C", "C");
        let c = b.add_vertex(Context, "C", "O");
        b.add_edge(a, c, Context, "-", "-").unwrap();
        assert_eq!(b.build().unwrap().symmetry().order(), 1);
    }

    #[test]
    #[ntest::timeout(2000)]
    fn test_large_symmetry_keeps_few_generators() {
        let mut b = RuleBuilder::new("eight carbons");
        for _ in 0..8 {
            b.add_vertex(Context, "C", "C");
        }
        let r = b.build().unwrap();
        let chain = r.symmetry();
        assert_eq!(chain.order(), 40320);
        assert!(chain.generators().len() <= 7);
        assert_eq!(chain.levels()[0].base(), 0);
        assert!(chain.is_member(&[7, 6, 5, 4, 3, 2, 1, 0]));

        let mut b = RuleBuilder::new("star");
        let centre = b.add_vertex(Context, "C", "C");
        for _ in 0..4 {
            let leaf = b.add_vertex(Context, "C", "C");
            b.add_edge(centre, leaf, Context, "-", "-").unwrap();
        }
        let chain = b.build().unwrap().symmetry().clone();
        assert_eq!(chain.order(), 24);
        assert_eq!(chain.levels()[0].orbit(), &[0]);
    }

    #[test]
    fn test_constraints_break_symmetry() {
        let mut b = RuleBuilder::new("constrained");
        let a = b.add_vertex(Left, "C", "");
        let c = b.add_vertex(Left, "C", "");
        let d = b.add_vertex(Left, "C", "");
        b.add_edge(a, c, Left, "-", "").unwrap();
        b.add_edge(c, d, Left, "-", "").unwrap();
        b.add_constraint(Constraint::ShortestPath(ShortestPath {
            source: a,
            target: c,
            comparison: Comparison {
                operator: Operator::LessOrEqual,
                value: 1,
            },
        }))
        .unwrap();
        let r = b.build().unwrap();
        assert_eq!(r.constraints().len(), 1);
        assert_eq!(r.symmetry().order(), 1);
    }

    #[test]
    fn test_shortest_path_across_components_is_rejected() {
        let far = |operator| {
            Constraint::ShortestPath(ShortestPath {
                source: 0,
                target: 1,
                comparison: Comparison { operator, value: 2 },
            })
        };
        for operator in &[Operator::LessOrEqual, Operator::Greater] {
            let mut b = RuleBuilder::new("bond");
            let x = b.add_vertex(Context, "C", "C");
            let y = b.add_vertex(Context, "C", "C");
            b.add_edge(x, y, Right, "", "-").unwrap();
            b.add_constraint(far(*operator)).unwrap();
            assert!(matches!(b.build(), Err(Error::InvalidGraph(_))));
        }

        let mut b = RuleBuilder::new("bond");
        let x = b.add_vertex(Context, "C", "C");
        let y = b.add_vertex(Context, "C", "C");
        b.add_edge(x, y, Right, "", "-").unwrap();
        b.add_constraint(far(Operator::Greater)).unwrap();
        b.drop_split_constraints();
        assert!(b.build().unwrap().constraints().is_empty());
    }

    #[test]
    fn test_term_validity() {
        let mut store = StringStore::new();
        let mut r = split_cc();
        assert!(!r.left().terms_valid());
        r.parse_terms(&mut store);
        assert!(r.left().terms_valid());
        assert!(r.right().vertex_term(0).is_some());
        assert!(r.right().edge_term(0).is_none());
    }

    #[test]
    fn test_stereo_side_configuration() {
        let mut b = RuleBuilder::new("stereo");
        let centre = b.add_vertex(Context, "C", "C");
        for i in 0..4 {
            let n = b.add_vertex(Context, "H", "H");
            let m = if i == 3 { Left } else { Context };
            b.add_edge(centre, n, m, "-", "-").unwrap();
        }
        b.enable_stereo();
        let bad = Configuration::tetrahedral((0..4).map(EmbeddingEdge::Edge).collect(), Fixation::Free).unwrap();
        b.set_configuration(centre, Side::Right, bad).unwrap();
        assert!(b.clone().build().is_err());

        let mut b2 = RuleBuilder::new("stereo");
        let centre = b2.add_vertex(Context, "C", "C");
        for _ in 0..4 {
            let n = b2.add_vertex(Context, "H", "H");
            b2.add_edge(centre, n, Context, "-", "-").unwrap();
        }
        let cfg = Configuration::tetrahedral((0..4).map(EmbeddingEdge::Edge).collect(), Fixation::Simple).unwrap();
        b2.set_configuration(centre, Side::Left, cfg).unwrap();
        let r = b2.build().unwrap();
        assert_eq!(r.left().vertex_stereo(centre).unwrap().geometry, Geometry::Tetrahedral);
        assert_eq!(r.right().vertex_stereo(centre).unwrap().geometry, Geometry::Any);
        assert_eq!(r.right().edge_category(0), Some(EdgeCategory::Single));
    }
}
