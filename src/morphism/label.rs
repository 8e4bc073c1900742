//! Label compatibility used by the morphism search.

use crate::config::{LabelSettings, LabelType};
use crate::graph::stereo::Configuration;
use crate::graph::term::{Owner, Substitution, Symbol, Term};
use crate::graph::LabelledView;
use crate::morphism::vertex_map::{InvertibleVertexMap, VertexMap};

/// Decides whether a domain element may be mapped onto a codomain element.
///
/// `vertex` and `edge` are checked while the map grows, `complete` once every domain vertex
/// is mapped. Checks that need the whole map (term unification, stereo permutations) belong
/// in `complete`.
pub trait MatchPredicate {
    fn vertex(&self, v: usize, w: usize) -> bool;
    fn edge(&self, domain_edge: usize, codomain_edge: usize) -> bool;
    fn complete(&self, _map: &InvertibleVertexMap) -> bool {
        true
    }
}

/// Structure only.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyLabel;

impl MatchPredicate for AnyLabel {
    fn vertex(&self, _v: usize, _w: usize) -> bool {
        true
    }

    fn edge(&self, _d: usize, _c: usize) -> bool {
        true
    }
}

/// Narrows a predicate so that each pinned domain vertex only maps to its pin.
pub struct Pinned<P> {
    inner: P,
    pins: Vec<Option<usize>>,
}

impl<P: MatchPredicate> Pinned<P> {
    pub fn new(inner: P, pins: Vec<Option<usize>>) -> Self {
        Self { inner, pins }
    }
}

impl<P: MatchPredicate> MatchPredicate for Pinned<P> {
    fn vertex(&self, v: usize, w: usize) -> bool {
        self.pins.get(v).copied().flatten().map_or(true, |p| p == w) && self.inner.vertex(v, w)
    }

    fn edge(&self, d: usize, c: usize) -> bool {
        self.inner.edge(d, c)
    }

    fn complete(&self, map: &InvertibleVertexMap) -> bool {
        self.inner.complete(map)
    }
}

/// Compares the labels of two views under a [`LabelSettings`].
pub struct LabelMatcher<'a, D: ?Sized, C: ?Sized> {
    domain: &'a D,
    codomain: &'a C,
    settings: LabelSettings,
}

impl<'a, D, C> LabelMatcher<'a, D, C>
where
    D: LabelledView + ?Sized,
    C: LabelledView + ?Sized,
{
    pub fn new(domain: &'a D, codomain: &'a C, settings: LabelSettings) -> Self {
        Self {
            domain,
            codomain,
            settings,
        }
    }

    pub fn settings(&self) -> LabelSettings {
        self.settings
    }

    fn terms_usable(&self) -> bool {
        self.domain.terms_valid() && self.codomain.terms_valid()
    }

    fn terms_may_match(&self, d: Option<&Term>, c: Option<&Term>) -> bool {
        match (d, c) {
            (Some(d), Some(c)) => d.may_match(c),
            _ => false,
        }
    }

    fn string_match(&self, d: &str, c: &str) -> bool {
        d == c
    }

    fn stereo_vertex(&self, v: usize, w: usize) -> bool {
        if !self.settings.with_stereo {
            return true;
        }
        let dcfg = match self.domain.vertex_stereo(v) {
            Some(cfg) => cfg,
            None => return true,
        };
        let fallback;
        let ccfg = match self.codomain.vertex_stereo(w) {
            Some(cfg) => cfg,
            None => {
                fallback = Configuration::any(self.codomain.degree(w));
                &fallback
            }
        };
        dcfg.local_match(ccfg, self.settings.stereo_relation)
    }

    fn stereo_edge(&self, d: usize, c: usize) -> bool {
        if !self.settings.with_stereo {
            return true;
        }
        match (self.domain.edge_category(d), self.codomain.edge_category(c)) {
            (Some(dc), Some(cc)) => dc.matches(cc, self.settings.stereo_relation),
            _ => true,
        }
    }

    /// Codomain offset of the image of the domain edge at `offset` around `v`.
    fn edge_image(&self, map: &InvertibleVertexMap, v: usize, w: usize, offset: usize) -> Option<usize> {
        let neighbour = self.domain.topology().neighbour_at(v, offset)?;
        let image = map.get(neighbour)?;
        self.codomain.topology().offset_of_neighbour(w, image)
    }

    fn stereo_complete(&self, map: &InvertibleVertexMap) -> bool {
        if !self.settings.with_stereo {
            return true;
        }
        for (v, w) in map.pairs() {
            let (dcfg, ccfg) = match (self.domain.vertex_stereo(v), self.codomain.vertex_stereo(w)) {
                (Some(d), Some(c)) => (d, c),
                _ => continue,
            };
            if !dcfg.needs_permutation_check(ccfg) {
                continue;
            }
            let ok = dcfg
                .make_permutation(ccfg, |o| self.edge_image(map, v, w, o))
                .map_or(false, |p| dcfg.morphism_ok(ccfg, &p));
            if !ok {
                log::trace!("stereo rejects {} -> {}", v, w);
                return false;
            }
        }
        true
    }

    /// Term pairs of every mapped vertex and of every domain edge with its image edge.
    fn term_pairs(&self, map: &InvertibleVertexMap) -> Option<Vec<(&'a Term, &'a Term)>> {
        let mut pairs = vec![];
        for (v, w) in map.pairs() {
            if !self.domain.has_vertex(v) {
                continue;
            }
            pairs.push((self.domain.vertex_term(v)?, self.codomain.vertex_term(w)?));
        }
        for e in self.domain.edges() {
            let (s, t) = self.domain.topology().endpoints(e);
            let (fs, ft) = match (map.get(s), map.get(t)) {
                (Some(fs), Some(ft)) => (fs, ft),
                _ => continue,
            };
            let image = self.codomain.edge_between(fs, ft)?;
            pairs.push((self.domain.edge_term(e)?, self.codomain.edge_term(image)?));
        }
        Some(pairs)
    }

    /// The most general unifier of all mapped term labels, if it satisfies the relation.
    pub fn unifier(&self, map: &InvertibleVertexMap) -> Option<Substitution> {
        if !self.terms_usable() {
            return None;
        }
        let pairs = self.term_pairs(map)?;
        let mut substitution = Substitution::new();
        let mut domain_vars: Vec<Symbol> = vec![];
        let mut codomain_vars: Vec<Symbol> = vec![];
        for (d, c) in pairs {
            if !substitution.unify((Owner::Domain, d), (Owner::Codomain, c)) {
                return None;
            }
            d.variables(&mut domain_vars);
            c.variables(&mut codomain_vars);
        }
        if substitution.satisfies(self.settings.relation, &domain_vars, &codomain_vars) {
            Some(substitution)
        } else {
            None
        }
    }
}

impl<D, C> MatchPredicate for LabelMatcher<'_, D, C>
where
    D: LabelledView + ?Sized,
    C: LabelledView + ?Sized,
{
    fn vertex(&self, v: usize, w: usize) -> bool {
        let labels = match self.settings.label_type {
            LabelType::String => self.string_match(self.domain.vertex_label(v), self.codomain.vertex_label(w)),
            LabelType::Term => {
                self.terms_usable()
                    && self.terms_may_match(self.domain.vertex_term(v), self.codomain.vertex_term(w))
            }
        };
        labels && self.stereo_vertex(v, w)
    }

    fn edge(&self, d: usize, c: usize) -> bool {
        let labels = match self.settings.label_type {
            LabelType::String => self.string_match(self.domain.edge_label(d), self.codomain.edge_label(c)),
            LabelType::Term => {
                self.terms_usable() && self.terms_may_match(self.domain.edge_term(d), self.codomain.edge_term(c))
            }
        };
        labels && self.stereo_edge(d, c)
    }

    fn complete(&self, map: &InvertibleVertexMap) -> bool {
        let labels = match self.settings.label_type {
            LabelType::String => true,
            LabelType::Term => self.unifier(map).is_some(),
        };
        labels && self.stereo_complete(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LabelRelation;
    use crate::graph::labelled::tests::graph;
    use crate::graph::stereo::{EmbeddingEdge, Fixation};
    use crate::graph::term::StringStore;

    fn term_settings(relation: LabelRelation) -> LabelSettings {
        LabelSettings::new(LabelType::Term, relation)
    }

    #[test]
    fn test_string_labels() {
        let d = graph("d", &["C", "O"], &[(0, 1, "=")]);
        let c = graph("c", &["O", "C"], &[(0, 1, "-")]);
        let m = LabelMatcher::new(&d, &c, LabelSettings::string_iso());
        assert!(m.vertex(0, 1));
        assert!(!m.vertex(0, 0));
        assert!(!m.edge(0, 0));
    }

    #[test]
    fn test_pinned_vertices() {
        let g = graph("propane", &["C", "C", "C"], &[(0, 1, "-"), (1, 2, "-")]);
        let m = Pinned::new(LabelMatcher::new(&g, &g, LabelSettings::string_iso()), vec![Some(2), None]);
        assert!(m.vertex(0, 2));
        assert!(!m.vertex(0, 0));
        assert!(m.vertex(1, 0));
        assert!(m.vertex(2, 1));
    }

    #[test]
    fn test_term_specialisation_direction() {
        let mut store = StringStore::new();
        let mut d = graph("d", &["_X"], &[]);
        let mut c = graph("c", &["C"], &[]);
        d.parse_terms(&mut store);
        c.parse_terms(&mut store);
        let mut map = InvertibleVertexMap::new(1, 1);
        map.put(0, 0);

        let spec = LabelMatcher::new(&d, &c, term_settings(LabelRelation::Specialisation));
        assert!(spec.vertex(0, 0));
        assert!(spec.complete(&map));
        let iso = LabelMatcher::new(&d, &c, term_settings(LabelRelation::Isomorphism));
        assert!(!iso.complete(&map));
        let backwards = LabelMatcher::new(&c, &d, term_settings(LabelRelation::Specialisation));
        assert!(!backwards.complete(&map));
        let unify = LabelMatcher::new(&c, &d, term_settings(LabelRelation::Unification));
        assert!(unify.complete(&map));
    }

    #[test]
    fn test_shared_variable_must_bind_consistently() {
        let mut store = StringStore::new();
        let mut d = graph("d", &["_X", "_X"], &[(0, 1, "-")]);
        let mut c = graph("c", &["C", "O"], &[(0, 1, "-")]);
        d.parse_terms(&mut store);
        c.parse_terms(&mut store);
        let mut map = InvertibleVertexMap::new(2, 2);
        map.put(0, 0);
        map.put(1, 1);
        let m = LabelMatcher::new(&d, &c, term_settings(LabelRelation::Specialisation));
        assert!(m.vertex(0, 0) && m.vertex(1, 1));
        assert!(!m.complete(&map));
    }

    #[test]
    fn test_invalid_terms_never_match() {
        let mut store = StringStore::new();
        let mut d = graph("d", &["f(a"], &[]);
        let mut c = graph("c", &["f(a)"], &[]);
        d.parse_terms(&mut store);
        c.parse_terms(&mut store);
        let m = LabelMatcher::new(&d, &c, term_settings(LabelRelation::Unification));
        assert!(!m.vertex(0, 0));
        assert!(m.unifier(&InvertibleVertexMap::new(1, 1)).is_none());
    }

    #[test]
    fn test_fixed_tetrahedral_orientation() {
        let star = |name| {
            let mut g = graph(name, &["C", "F", "Cl", "Br", "I"], &[(0, 1, "-"), (0, 2, "-"), (0, 3, "-"), (0, 4, "-")]);
            let cfg = Configuration::tetrahedral((0..4).map(EmbeddingEdge::Edge).collect(), Fixation::Simple).unwrap();
            g.set_configuration(0, cfg).unwrap();
            g
        };
        let d = star("d");
        let c = star("c");
        let settings = LabelSettings::string_iso().with_stereo(LabelRelation::Isomorphism);
        let m = LabelMatcher::new(&d, &c, settings);
        let mut identity = InvertibleVertexMap::new(5, 5);
        for v in 0..5 {
            identity.put(v, v);
        }
        assert!(m.vertex(0, 0));
        assert!(m.complete(&identity));

        // Swapping two ligands mirrors the centre.
        let mut swapped = InvertibleVertexMap::new(5, 5);
        for (v, w) in [(0, 0), (1, 2), (2, 1), (3, 3), (4, 4)].iter() {
            swapped.put(*v, *w);
        }
        assert!(!m.complete(&swapped));
        let plain = LabelMatcher::new(&d, &c, LabelSettings::string_iso());
        assert!(plain.complete(&swapped));
    }
}
