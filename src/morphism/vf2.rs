//! VF2-style backtracking search for isomorphisms and monomorphisms.
//!
//! The search keeps its own stack of frames instead of recursing, so deep graphs do not
//! exhaust the call stack, and it is exposed as an [`Iterator`] over complete maps. The
//! callback helpers on top follow one contract: the callback returns `true` to keep
//! searching and `false` to stop the whole search.

use crate::graph::LabelledView;
use crate::morphism::label::MatchPredicate;
use crate::morphism::order::vertex_order_by_mult;
use crate::morphism::vertex_map::{InvertibleMap, InvertibleVertexMap, VertexMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Bijective on vertices and edges.
    Isomorphism,
    /// Injective on vertices, edges map to edges; codomain may have more.
    Monomorphism,
}

#[derive(Debug)]
struct Frame {
    candidates: Vec<usize>,
    cursor: usize,
}

pub struct Vf2<'a, D: ?Sized, C: ?Sized, P> {
    domain: &'a D,
    codomain: &'a C,
    predicate: P,
    mode: Mode,
    order: Vec<usize>,
    /// For each depth, an earlier domain vertex adjacent to the vertex at that depth.
    anchor: Vec<Option<usize>>,
    domain_degree: Vec<usize>,
    codomain_degree: Vec<usize>,
    map: InvertibleVertexMap,
    stack: Vec<Frame>,
    started: bool,
    yielded: bool,
    done: bool,
}

impl<'a, D, C, P> Vf2<'a, D, C, P>
where
    D: LabelledView + ?Sized,
    C: LabelledView + ?Sized,
    P: MatchPredicate,
{
    pub fn new(domain: &'a D, codomain: &'a C, predicate: P, mode: Mode) -> Self {
        let order = vertex_order_by_mult(domain);
        Self::with_order(domain, codomain, predicate, mode, order)
    }

    /// Search with an explicit visiting order. It must list every domain vertex once.
    pub fn with_order(domain: &'a D, codomain: &'a C, predicate: P, mode: Mode, order: Vec<usize>) -> Self {
        let mut position = vec![None; domain.vertex_bound()];
        for (i, &v) in order.iter().enumerate() {
            position[v] = Some(i);
        }
        let anchor = order
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                domain
                    .out_edges(v)
                    .map(|(_, n)| n)
                    .filter(|&n| position[n].map_or(false, |p| p < i))
                    .min_by_key(|&n| position[n])
            })
            .collect();
        let mut domain_degree = vec![0; domain.vertex_bound()];
        for v in domain.vertices() {
            domain_degree[v] = domain.degree(v);
        }
        let mut codomain_degree = vec![0; codomain.vertex_bound()];
        for w in codomain.vertices() {
            codomain_degree[w] = codomain.degree(w);
        }
        Self {
            domain,
            codomain,
            predicate,
            mode,
            order,
            anchor,
            domain_degree,
            codomain_degree,
            map: InvertibleVertexMap::new(domain.vertex_bound(), codomain.vertex_bound()),
            stack: vec![],
            started: false,
            yielded: false,
            done: false,
        }
    }

    fn size_precheck(&self) -> bool {
        let (dv, cv) = (self.domain.num_vertices(), self.codomain.num_vertices());
        match self.mode {
            Mode::Isomorphism => dv == cv && self.domain.num_edges() == self.codomain.num_edges(),
            Mode::Monomorphism => dv <= cv,
        }
    }

    fn candidates(&self, depth: usize) -> Vec<usize> {
        match self.anchor[depth].and_then(|u| self.map.get(u)) {
            Some(image) => self.codomain.out_edges(image).map(|(_, n)| n).collect(),
            None => self.codomain.vertices().collect(),
        }
    }

    fn feasible(&self, v: usize, w: usize) -> bool {
        if self.map.get_inverse(w).is_some() {
            return false;
        }
        let degree_ok = match self.mode {
            Mode::Isomorphism => self.domain_degree[v] == self.codomain_degree[w],
            Mode::Monomorphism => self.domain_degree[v] <= self.codomain_degree[w],
        };
        if !degree_ok || !self.predicate.vertex(v, w) {
            return false;
        }
        let mut mapped_neighbours = 0;
        for (e, n) in self.domain.out_edges(v) {
            let m = match self.map.get(n) {
                Some(m) => m,
                None => continue,
            };
            mapped_neighbours += 1;
            match self.codomain.edge_between(w, m) {
                Some(image) if self.predicate.edge(e, image) => {}
                _ => return false,
            }
        }
        if self.mode == Mode::Isomorphism {
            // The codomain may not have edges between mapped vertices the domain lacks.
            let induced = self
                .codomain
                .out_edges(w)
                .filter(|&(_, m)| self.map.get_inverse(m).is_some())
                .count();
            if induced != mapped_neighbours {
                return false;
            }
        }
        true
    }

    fn start(&mut self) -> Option<InvertibleVertexMap> {
        self.started = true;
        log::trace!(
            "vf2 {:?}: {} vertices into {}",
            self.mode,
            self.domain.num_vertices(),
            self.codomain.num_vertices()
        );
        if !self.size_precheck() {
            self.done = true;
            return None;
        }
        if self.order.is_empty() {
            self.done = true;
            return if self.predicate.complete(&self.map) {
                Some(self.map.clone())
            } else {
                None
            };
        }
        let candidates = self.candidates(0);
        self.stack.push(Frame { candidates, cursor: 0 });
        self.advance()
    }

    fn advance(&mut self) -> Option<InvertibleVertexMap> {
        if self.yielded {
            self.yielded = false;
            if let Some(&last) = self.order.last() {
                self.map.remove(last);
            }
        }
        loop {
            let depth = match self.stack.len() {
                0 => {
                    self.done = true;
                    return None;
                }
                n => n - 1,
            };
            let v = self.order[depth];
            let next = self.stack.last_mut().and_then(|frame| {
                let w = frame.candidates.get(frame.cursor).copied();
                frame.cursor += 1;
                w
            });
            let w = match next {
                Some(w) => w,
                None => {
                    self.stack.pop();
                    if depth > 0 {
                        self.map.remove(self.order[depth - 1]);
                    }
                    continue;
                }
            };
            if !self.feasible(v, w) {
                continue;
            }
            self.map.put(v, w);
            if depth + 1 == self.order.len() {
                if self.predicate.complete(&self.map) {
                    self.yielded = true;
                    return Some(self.map.clone());
                }
                self.map.remove(v);
                continue;
            }
            let candidates = self.candidates(depth + 1);
            self.stack.push(Frame { candidates, cursor: 0 });
        }
    }
}

impl<D, C, P> Iterator for Vf2<'_, D, C, P>
where
    D: LabelledView + ?Sized,
    C: LabelledView + ?Sized,
    P: MatchPredicate,
{
    type Item = InvertibleVertexMap;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if !self.started {
            return self.start();
        }
        self.advance()
    }
}

/// Run the search and hand every complete map to `on_match` until it returns `false`.
/// Returns `false` when the callback stopped the search.
pub fn find_morphisms<D, C, P, F>(domain: &D, codomain: &C, predicate: P, mode: Mode, mut on_match: F) -> bool
where
    D: LabelledView + ?Sized,
    C: LabelledView + ?Sized,
    P: MatchPredicate,
    F: FnMut(&InvertibleVertexMap) -> bool,
{
    for m in Vf2::new(domain, codomain, predicate, mode) {
        if !on_match(&m) {
            return false;
        }
    }
    true
}

pub fn find_all<D, C, P>(domain: &D, codomain: &C, predicate: P, mode: Mode) -> Vec<InvertibleVertexMap>
where
    D: LabelledView + ?Sized,
    C: LabelledView + ?Sized,
    P: MatchPredicate,
{
    Vf2::new(domain, codomain, predicate, mode).collect()
}

/// Wrap a callback so that it stops the search after `limit` accepted maps.
pub fn limit<F>(limit: usize, mut on_match: F) -> impl FnMut(&InvertibleVertexMap) -> bool
where
    F: FnMut(&InvertibleVertexMap) -> bool,
{
    let mut seen = 0;
    move |m| {
        if limit == 0 {
            return false;
        }
        seen += 1;
        on_match(m) && seen < limit
    }
}

pub fn is_morphic<D, C, P>(domain: &D, codomain: &C, predicate: P, mode: Mode) -> bool
where
    D: LabelledView + ?Sized,
    C: LabelledView + ?Sized,
    P: MatchPredicate,
{
    Vf2::new(domain, codomain, predicate, mode).next().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LabelSettings;
    use crate::context::Context;
    use crate::graph::labelled::tests::graph;
    use crate::morphism::label::{AnyLabel, LabelMatcher};
    use ntest::timeout;

    fn cycle(n: usize) -> crate::graph::LabelledGraph {
        let edges: Vec<(usize, usize, &str)> = (0..n).map(|i| (i, (i + 1) % n, "-")).collect();
        graph("cycle", &vec!["C"; n], &edges)
    }

    fn sound<D: LabelledView, C: LabelledView>(d: &D, c: &C, m: &InvertibleVertexMap) -> bool {
        d.edges().all(|e| {
            let (s, t) = d.topology().endpoints(e);
            match (m.get(s), m.get(t)) {
                (Some(fs), Some(ft)) => c.edge_between(fs, ft).map_or(false, |ce| d.edge_label(e) == c.edge_label(ce)),
                _ => false,
            }
        }) && d.vertices().all(|v| m.get(v).map_or(false, |w| d.vertex_label(v) == c.vertex_label(w)))
    }

    #[test]
    #[timeout(1000)]
    fn test_ethane_edge() {
        let cc = graph("C-C", &["C", "C"], &[(0, 1, "-")]);
        let ethane = graph("ethane", &["C", "C"], &[(0, 1, "-")]);
        let settings = LabelSettings::string_iso();
        let iso = find_all(&cc, &ethane, LabelMatcher::new(&cc, &ethane, settings), Mode::Isomorphism);
        assert_eq!(iso.len(), 2);
        for m in &iso {
            assert!(sound(&cc, &ethane, m));
        }
        let wrong = graph("C=C", &["C", "C"], &[(0, 1, "=")]);
        assert!(!is_morphic(&wrong, &ethane, LabelMatcher::new(&wrong, &ethane, settings), Mode::Monomorphism));
    }

    #[test]
    #[timeout(1000)]
    fn test_cycle_automorphisms() {
        let c6 = cycle(6);
        let autos = find_all(&c6, &c6, AnyLabel, Mode::Isomorphism);
        assert_eq!(autos.len(), 12);
    }

    #[test]
    #[timeout(1000)]
    fn test_path_into_cycle() {
        let path = graph("path", &["C", "C", "C"], &[(0, 1, "-"), (1, 2, "-")]);
        let c5 = cycle(5);
        let monos = find_all(&path, &c5, AnyLabel, Mode::Monomorphism);
        assert_eq!(monos.len(), 10);
        for m in &monos {
            assert!(sound(&path, &c5, m));
        }
        assert!(find_all(&path, &c5, AnyLabel, Mode::Isomorphism).is_empty());
    }

    #[test]
    #[timeout(1000)]
    fn test_isomorphism_is_induced() {
        // A triangle contains a 3-path as a subgraph but they are not isomorphic.
        let path = graph("path", &["C", "C", "C"], &[(0, 1, "-"), (1, 2, "-")]);
        let triangle = graph("tri", &["C", "C", "C"], &[(0, 1, "-"), (1, 2, "-"), (0, 2, "-")]);
        assert!(!is_morphic(&path, &triangle, AnyLabel, Mode::Isomorphism));
        assert_eq!(find_all(&path, &triangle, AnyLabel, Mode::Monomorphism).len(), 6);
    }

    #[test]
    #[timeout(1000)]
    fn test_mono_count_at_least_iso_count() {
        let mut ctx = Context::new(7);
        let g = graph(
            "methanol",
            &["C", "O", "H", "H", "H", "H"],
            &[(0, 1, "-"), (0, 2, "-"), (0, 3, "-"), (0, 4, "-"), (1, 5, "-")],
        );
        let (p, _) = g.permuted(&mut ctx.rng);
        let settings = LabelSettings::string_iso();
        let iso = find_all(&g, &p, LabelMatcher::new(&g, &p, settings), Mode::Isomorphism).len();
        let mono = find_all(&g, &p, LabelMatcher::new(&g, &p, settings), Mode::Monomorphism).len();
        assert_eq!(iso, 6);
        assert!(mono >= iso);
    }

    #[test]
    #[timeout(1000)]
    fn test_callback_stops_search() {
        let c6 = cycle(6);
        let mut seen = 0;
        let finished = find_morphisms(&c6, &c6, AnyLabel, Mode::Isomorphism, limit(3, |_| {
            seen += 1;
            true
        }));
        assert!(!finished);
        assert_eq!(seen, 3);
    }

    #[test]
    #[timeout(1000)]
    fn test_zero_limit_reports_nothing() {
        let c6 = cycle(6);
        let mut seen = 0;
        let finished = find_morphisms(&c6, &c6, AnyLabel, Mode::Isomorphism, limit(0, |_| {
            seen += 1;
            true
        }));
        assert!(!finished);
        assert_eq!(seen, 0);
    }

    #[test]
    fn test_empty_domain_has_one_match() {
        let empty = graph("empty", &[], &[]);
        let c = cycle(3);
        assert_eq!(find_all(&empty, &c, AnyLabel, Mode::Monomorphism).len(), 1);
        assert_eq!(find_all(&empty, &c, AnyLabel, Mode::Isomorphism).len(), 0);
        assert_eq!(find_all(&empty, &empty, AnyLabel, Mode::Isomorphism).len(), 1);
    }

    #[test]
    #[timeout(1000)]
    fn test_disconnected_domain() {
        let two = graph("2C", &["C", "C"], &[]);
        let c3 = cycle(3);
        assert_eq!(find_all(&two, &c3, AnyLabel, Mode::Monomorphism).len(), 6);
    }
}
