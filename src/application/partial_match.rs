use crate::application::component_match_db::ComponentMatch;
use crate::config::{LabelSettings, LabelType};
use crate::error::Error;
use crate::graph::stereo::Cloner;
use crate::graph::term::StringStore;
use crate::graph::{LabelledGraph, LabelledView};
use crate::morphism::vertex_map::{InvertibleMap, InvertibleVertexMap, VertexMap};
use crate::rule::{bind, compose, Composition, LabelledRule, Membership};
use std::rc::Rc;

/// One copy of a host graph inside the union host.
#[derive(Debug, Clone)]
struct Part {
    host: usize,
    instance: usize,
    graph: Rc<LabelledGraph>,
    offset: usize,
}

/// Left components of a rule matched one at a time into a growing disjoint union of host
/// graph instances. Union vertices are numbered part by part in the order parts were opened.
#[derive(Debug)]
pub struct PartialMatch<'a> {
    rule: &'a LabelledRule,
    settings: LabelSettings,
    parts: Vec<Part>,
    /// Rule core vertices to union vertices.
    map: InvertibleVertexMap,
    /// Every pushed component match and whether it opened a new part.
    pushed: Vec<(ComponentMatch, bool)>,
}

impl<'a> PartialMatch<'a> {
    pub fn new(rule: &'a LabelledRule, settings: LabelSettings) -> Self {
        Self {
            rule,
            settings,
            parts: vec![],
            map: InvertibleVertexMap::new(rule.core().num_vertices(), 0),
            pushed: vec![],
        }
    }

    pub fn rule(&self) -> &'a LabelledRule {
        self.rule
    }

    /// Number of pushed component matches.
    pub fn len(&self) -> usize {
        self.pushed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pushed.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.pushed.len() == self.rule.num_left_components()
    }

    pub fn map(&self) -> &InvertibleVertexMap {
        &self.map
    }

    pub fn component_matches(&self) -> impl Iterator<Item = &ComponentMatch> + '_ {
        self.pushed.iter().map(|(cm, _)| cm)
    }

    /// How many copies of universe graph `host` are open.
    pub fn num_instances(&self, host: usize) -> usize {
        self.parts.iter().filter(|p| p.host == host).count()
    }

    pub fn last_push_is_new_instance(&self) -> bool {
        self.pushed.last().map_or(false, |(_, added)| *added)
    }

    /// The host graphs consumed, one entry per open copy.
    pub fn lhs(&self) -> Vec<Rc<LabelledGraph>> {
        self.parts.iter().map(|p| p.graph.clone()).collect()
    }

    fn part_of(&self, u: usize) -> &Part {
        let i = self.parts.partition_point(|p| p.offset <= u);
        &self.parts[i - 1]
    }

    /// Add the next component match. Returns false and leaves the partial match unchanged
    /// when the match overlaps an earlier one or would break the gluing condition.
    pub fn push(&mut self, cm: &ComponentMatch) -> bool {
        assert!(!self.is_full(), "pushing onto a full match");
        assert_eq!(cm.component, self.pushed.len(), "components are pushed in order");
        let existing = self
            .parts
            .iter()
            .position(|p| p.host == cm.host && p.instance == cm.instance);
        let added = existing.is_none();
        let part = match existing {
            Some(i) => i,
            None => {
                let offset = self.parts.last().map_or(0, |p| p.offset + p.graph.num_vertices());
                self.parts.push(Part {
                    host: cm.host,
                    instance: cm.instance,
                    graph: cm.graph.clone(),
                    offset,
                });
                self.map.grow_codomain(offset + cm.graph.num_vertices());
                log::trace!("opened {}#{} at offset {}", cm.graph.name(), cm.instance, offset);
                self.parts.len() - 1
            }
        };
        self.pushed.push((cm.clone(), added));

        let offset = self.parts[part].offset;
        let rule = self.rule;
        for v in rule.left_component(cm.component).vertices() {
            let w = match cm.map.get(v) {
                Some(w) => w,
                None => panic!("component match leaves vertex {} unmapped", v),
            };
            if self.map.get_inverse(offset + w).is_some() {
                self.pop();
                return false;
            }
            self.map.put(v, offset + w);
        }
        if !self.is_valid_dpo(cm.component) {
            log::trace!("component {} breaks the gluing condition", cm.component);
            self.pop();
            return false;
        }
        true
    }

    pub fn pop(&mut self) {
        let (cm, added) = match self.pushed.pop() {
            Some(last) => last,
            None => panic!("popping an empty partial match"),
        };
        let rule = self.rule;
        for v in rule.left_component(cm.component).vertices() {
            self.map.remove(v);
        }
        if added {
            self.parts.pop();
        }
    }

    /// No deleted vertex may keep an edge the rule does not delete, and no created edge may
    /// duplicate a host edge.
    fn is_valid_dpo(&self, component: usize) -> bool {
        let core = self.rule.core();
        let left = self.rule.left();
        for v in self.rule.left_component(component).vertices() {
            let u = match self.map.get(v) {
                Some(u) => u,
                None => continue,
            };
            let part = self.part_of(u);
            let w = u - part.offset;
            for (e, n) in core.out_edges(v) {
                if self.rule.edge_membership(e) != Membership::Right {
                    continue;
                }
                let un = match self.map.get(n) {
                    Some(un) => un,
                    None => continue,
                };
                let same_part = un >= part.offset && un < part.offset + part.graph.num_vertices();
                if same_part && part.graph.edge_between(w, un - part.offset).is_some() {
                    return false;
                }
            }
            if self.rule.vertex_membership(v) == Membership::Left && part.graph.degree(w) != left.degree(v) {
                return false;
            }
        }
        true
    }

    /// Union vertices whose rule preimage is changed by the rule.
    pub fn reaction_center(&self) -> Vec<usize> {
        let mut center: Vec<usize> = self
            .map
            .pairs()
            .into_iter()
            .filter(|&(v, _)| self.rule.is_changed(v))
            .map(|(_, u)| u)
            .collect();
        center.sort_unstable();
        center
    }

    /// The disjoint union of the open parts as one graph.
    pub fn union_graph(&self) -> Result<LabelledGraph, Error> {
        let names: Vec<&str> = self.parts.iter().map(|p| p.graph.name()).collect();
        let mut union = LabelledGraph::new(&names.join(" + "));
        for part in &self.parts {
            for v in part.graph.vertices() {
                union.add_vertex(part.graph.vertex_label(v));
            }
        }
        let mut edge_offsets = vec![];
        for part in &self.parts {
            edge_offsets.push(union.num_edges());
            for e in part.graph.edges() {
                let (s, t) = part.graph.topology().endpoints(e);
                union.add_edge(part.offset + s, part.offset + t, part.graph.edge_label(e))?;
            }
        }
        if self.parts.iter().any(|p| p.graph.has_stereo()) {
            union.enable_stereo();
            for (part, edge_offset) in self.parts.iter().zip(edge_offsets) {
                let stereo = match part.graph.stereo() {
                    Some(s) => s,
                    None => continue,
                };
                for (e, category) in stereo.edges.iter().enumerate() {
                    union.set_edge_category(edge_offset + e, *category)?;
                }
                for v in part.graph.vertices() {
                    let cloned = Cloner::clone_configuration(
                        &stereo.vertices[v],
                        part.graph.topology(),
                        v,
                        union.topology(),
                        part.offset + v,
                        |n| Some(part.offset + n),
                    )
                    .ok_or_else(|| Error::InvalidStereo(format!("could not copy vertex {} of {}", v, part.graph.name())))?;
                    union.set_configuration(part.offset + v, cloned)?;
                }
            }
        }
        if self.settings.label_type == LabelType::Term {
            union.parse_terms(&mut StringStore::new());
        }
        Ok(union)
    }

    /// Apply the rule at the full match by composing the binding of the union host with it.
    /// `Ok(None)` when the result is not a valid derivation.
    pub fn apply(&self) -> Result<Option<Composition>, Error> {
        assert!(self.is_full(), "applying a partial match");
        let union = self.union_graph()?;
        let host = bind(&union)?;
        let mut m = InvertibleVertexMap::new(self.rule.core().num_vertices(), union.num_vertices());
        for (v, u) in self.map.pairs() {
            m.put(v, u);
        }
        compose(&host, self.rule, &m, self.settings, None)
    }
}
