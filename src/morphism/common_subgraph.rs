//! McGregor-style enumeration of common induced subgraphs of two views.
//!
//! Every domain vertex is either mapped to a compatible codomain vertex or left out. The
//! resulting partial maps are used to glue two rules together, so graphs are small and the
//! search recurses once per domain vertex.

use crate::graph::LabelledView;
use crate::morphism::label::MatchPredicate;
use crate::morphism::order::vertex_order_by_mult;
use crate::morphism::vertex_map::{InvertibleMap, InvertibleVertexMap, VertexMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommonSubgraphOptions {
    /// Only report maps of the largest size found.
    pub maximum: bool,
    /// Only report maps whose domain vertices induce a connected subgraph.
    pub connected: bool,
}

struct Search<'a, D: ?Sized, C: ?Sized, P> {
    domain: &'a D,
    codomain: &'a C,
    predicate: P,
    options: CommonSubgraphOptions,
    order: Vec<usize>,
    map: InvertibleVertexMap,
    found: Vec<InvertibleVertexMap>,
    best: usize,
}

impl<D, C, P> Search<'_, D, C, P>
where
    D: LabelledView + ?Sized,
    C: LabelledView + ?Sized,
    P: MatchPredicate,
{
    fn feasible(&self, v: usize, w: usize) -> bool {
        if self.map.get_inverse(w).is_some() || !self.predicate.vertex(v, w) {
            return false;
        }
        for (e, n) in self.domain.out_edges(v) {
            if let Some(m) = self.map.get(n) {
                match self.codomain.edge_between(w, m) {
                    Some(image) if self.predicate.edge(e, image) => {}
                    _ => return false,
                }
            }
        }
        // Induced: codomain edges between mapped vertices need a domain counterpart.
        self.codomain
            .out_edges(w)
            .filter_map(|(_, m)| self.map.get_inverse(m))
            .all(|u| self.domain.edge_between(v, u).is_some())
    }

    fn is_connected(&self) -> bool {
        let mapped: Vec<usize> = self.map.pairs().into_iter().map(|(v, _)| v).collect();
        let start = match mapped.first() {
            Some(&v) => v,
            None => return true,
        };
        let mut seen = vec![start];
        let mut stack = vec![start];
        while let Some(v) = stack.pop() {
            for (_, n) in self.domain.out_edges(v) {
                if self.map.get(n).is_some() && !seen.contains(&n) {
                    seen.push(n);
                    stack.push(n);
                }
            }
        }
        seen.len() == mapped.len()
    }

    fn report(&mut self) {
        let size = self.map.len();
        if size == 0 || (self.options.connected && !self.is_connected()) {
            return;
        }
        if !self.predicate.complete(&self.map) {
            return;
        }
        if self.options.maximum {
            if size < self.best {
                return;
            }
            if size > self.best {
                self.best = size;
                self.found.clear();
            }
        }
        self.found.push(self.map.clone());
    }

    fn recurse(&mut self, depth: usize) {
        if depth == self.order.len() {
            self.report();
            return;
        }
        let remaining = self.order.len() - depth;
        if self.options.maximum && self.map.len() + remaining < self.best {
            return;
        }
        let v = self.order[depth];
        let candidates: Vec<usize> = self.codomain.vertices().collect();
        for w in candidates {
            if !self.feasible(v, w) {
                continue;
            }
            self.map.put(v, w);
            self.recurse(depth + 1);
            self.map.remove(v);
        }
        self.recurse(depth + 1);
    }
}

/// Enumerate common subgraphs of `domain` and `codomain` as partial injective maps.
/// The empty map is never reported.
pub fn common_subgraphs<D, C, P>(
    domain: &D,
    codomain: &C,
    predicate: P,
    options: CommonSubgraphOptions,
) -> Vec<InvertibleVertexMap>
where
    D: LabelledView + ?Sized,
    C: LabelledView + ?Sized,
    P: MatchPredicate,
{
    let mut search = Search {
        domain,
        codomain,
        predicate,
        options,
        order: vertex_order_by_mult(domain),
        map: InvertibleVertexMap::new(domain.vertex_bound(), codomain.vertex_bound()),
        found: vec![],
        best: 0,
    };
    search.recurse(0);
    log::trace!("{} common subgraphs ({:?})", search.found.len(), options);
    search.found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LabelSettings;
    use crate::graph::labelled::tests::graph;
    use crate::morphism::label::LabelMatcher;
    use ntest::timeout;

    #[test]
    #[timeout(2000)]
    fn test_maximum_common_subgraph() {
        let a = graph("a", &["C", "O", "H"], &[(0, 1, "-"), (1, 2, "-")]);
        let b = graph("b", &["C", "O", "N"], &[(0, 1, "-"), (1, 2, "-")]);
        let maximum = CommonSubgraphOptions {
            maximum: true,
            connected: false,
        };
        let found = common_subgraphs(&a, &b, LabelMatcher::new(&a, &b, LabelSettings::string_iso()), maximum);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].pairs(), vec![(0, 0), (1, 1)]);
    }

    #[test]
    #[timeout(2000)]
    fn test_connected_filter() {
        // Two isolated carbons against a single carbon pair joined by an edge.
        let a = graph("a", &["C", "C"], &[]);
        let b = graph("b", &["C", "C"], &[(0, 1, "-")]);
        let all = CommonSubgraphOptions::default();
        let settings = LabelSettings::string_iso();
        let found = common_subgraphs(&a, &b, LabelMatcher::new(&a, &b, settings), all);
        // Only single vertices: an induced pair would need the edge in `a`.
        assert_eq!(found.len(), 4);
        let connected = CommonSubgraphOptions {
            maximum: false,
            connected: true,
        };
        assert_eq!(common_subgraphs(&a, &b, LabelMatcher::new(&a, &b, settings), connected).len(), 4);
    }
}
