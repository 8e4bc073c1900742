use crate::application::component_match_db::ComponentMatch;
use crate::morphism::symmetry::{compose, Permutation, StabiliserChain};
use crate::morphism::vertex_map::VertexMap;
use crate::rule::LabelledRule;
use std::cmp::Ordering;

/// Image of one left vertex: host index, host instance, host vertex.
type Image = (usize, usize, usize);

/// Filters full matches down to one representative per orbit under the rule's automorphisms.
///
/// Left vertices are laid out component by component, which is also the base of the rule's
/// stabiliser chain. A match is kept when its image sequence, with host instances renumbered
/// by first appearance, is not larger than that of the match composed with any
/// automorphism. The automorphisms are walked through the chain, so only coset
/// representatives that tie on the prefix are followed.
#[derive(Debug)]
pub struct CanonMatch<'a> {
    chain: &'a StabiliserChain,
    /// Left vertices in layout order.
    order: Vec<usize>,
    /// Position of each core vertex in `order`.
    position: Vec<Option<usize>>,
    /// Prefix length covered once components `0..=d` are assigned.
    component_end: Vec<usize>,
    /// `orbit_pos[i]`: positions of the orbit of `order[i]` under the stabiliser of
    /// `order[..i]`, without `i` itself.
    orbit_pos: Vec<Vec<usize>>,
    images: Vec<Image>,
    /// Length of `images` before each push.
    marks: Vec<usize>,
}

/// `image` with its instance renumbered by first appearance in `prefix`.
fn renamed(prefix: &[Image], image: Image) -> Image {
    let (host, instance, vertex) = image;
    let mut seen: Vec<usize> = vec![];
    for &(h, i, _) in prefix {
        if h == host && !seen.contains(&i) {
            seen.push(i);
        }
    }
    let id = seen.iter().position(|&i| i == instance).unwrap_or_else(|| seen.len());
    (host, id, vertex)
}

fn normalise(images: &[Image]) -> Vec<Image> {
    (0..images.len()).map(|i| renamed(&images[..i], images[i])).collect()
}

impl<'a> CanonMatch<'a> {
    pub fn new(rule: &'a LabelledRule) -> Self {
        let components = rule.left_components();
        let mut order = vec![];
        let mut component_end = vec![];
        for vertices in &components.vertices {
            order.extend(vertices.iter().copied());
            component_end.push(order.len());
        }
        let mut position = vec![None; rule.core().num_vertices()];
        for (i, v) in order.iter().enumerate() {
            position[*v] = Some(i);
        }
        let chain = rule.symmetry();
        let orbit_pos = chain.levels()[..order.len()]
            .iter()
            .enumerate()
            .map(|(i, level)| {
                debug_assert_eq!(level.base(), order[i]);
                // Automorphisms preserve membership, so left vertices map to left vertices.
                level.orbit()[1..].iter().filter_map(|&v| position[v]).collect()
            })
            .collect();
        log::trace!(
            "rule {}: {} automorphism generators over {} left vertices",
            rule.name(),
            chain.generators().len(),
            order.len()
        );
        Self {
            chain,
            order,
            position,
            component_end,
            orbit_pos,
            images: vec![],
            marks: vec![],
        }
    }

    fn append(&mut self, cm: &ComponentMatch) {
        assert_eq!(cm.component, self.marks.len(), "components are pushed in order");
        self.marks.push(self.images.len());
        let start = if cm.component == 0 { 0 } else { self.component_end[cm.component - 1] };
        for i in start..self.component_end[cm.component] {
            let v = self.order[i];
            let w = match cm.map.get(v) {
                Some(w) => w,
                None => panic!("component match leaves vertex {} unmapped", v),
            };
            self.images.push((cm.host, cm.instance, w));
        }
    }

    /// Whether some automorphism gives a smaller sequence on the first `end` positions,
    /// using only automorphisms that map those positions among themselves.
    fn has_smaller_variant(&self, end: usize) -> bool {
        let images = &self.images[..end];
        let mut search = TieSearch {
            chain: self.chain,
            position: &self.position,
            images,
            own: normalise(images),
            permuted: Vec::with_capacity(end),
            ties: vec![],
        };
        let identity: Permutation = (0..self.chain.degree()).collect();
        search.descend(0, &identity)
    }

    /// Push the next component match and search the chain for an automorphism that makes
    /// the assigned prefix smaller. Every push must be undone by `pop`, also when it fails.
    pub fn push(&mut self, cm: &ComponentMatch) -> bool {
        self.append(cm);
        !self.has_smaller_variant(self.images.len())
    }

    /// As `push`, but only with automorphisms that fix the prefix before each position,
    /// read off the precomputed orbits. Rejects a subset of what `push` rejects.
    pub fn push_fast(&mut self, cm: &ComponentMatch) -> bool {
        let start = self.images.len();
        self.append(cm);
        let end = self.images.len();
        for i in 0..end {
            let own = renamed(&self.images[..i], self.images[i]);
            for &p in &self.orbit_pos[i] {
                if p >= end || (i < start && p < start) {
                    continue;
                }
                if renamed(&self.images[..i], self.images[p]) < own {
                    return false;
                }
            }
        }
        true
    }

    pub fn pop(&mut self) {
        let mark = match self.marks.pop() {
            Some(mark) => mark,
            None => panic!("popping an empty canonical match"),
        };
        self.images.truncate(mark);
    }

    pub fn pop_fast(&mut self) {
        self.pop();
    }

    /// Whether the full match is the representative of its orbit. Instances must also be
    /// numbered by first appearance, as the other numberings are the same match.
    pub fn accept(&self) -> bool {
        assert_eq!(self.marks.len(), self.component_end.len(), "accepting a partial match");
        normalise(&self.images) == self.images && !self.has_smaller_variant(self.images.len())
    }
}

/// Walks the stabiliser chain along the automorphisms that tie with the match on every
/// position so far. Tied automorphisms found at the bottom are kept to skip branches that
/// are images of each other.
struct TieSearch<'s> {
    chain: &'s StabiliserChain,
    position: &'s [Option<usize>],
    images: &'s [Image],
    own: Vec<Image>,
    permuted: Vec<Image>,
    ties: Vec<Permutation>,
}

impl TieSearch<'_> {
    /// Try every `g ∘ t` with `t` from the transversal of `level`. `g` is the product of the
    /// transversal elements picked above and reproduces the first `level` positions.
    fn descend(&mut self, level: usize, g: &[usize]) -> bool {
        let chain = self.chain;
        let end = self.images.len();
        if level == end {
            if g.iter().enumerate().any(|(v, &w)| v != w) {
                self.ties.push(g.to_vec());
            }
            return false;
        }
        let chain_level = &chain.levels()[level];
        let fixed: Vec<usize> = chain.levels()[..level].iter().map(|l| g[l.base()]).collect();
        let mut tried: Vec<usize> = vec![];
        for (k, &v) in chain_level.orbit().iter().enumerate() {
            let u = g[v];
            let p = match self.position[u] {
                Some(p) if p < end => p,
                _ => continue,
            };
            let value = renamed(&self.permuted, self.images[p]);
            match value.cmp(&self.own[level]) {
                Ordering::Less => return true,
                Ordering::Greater => continue,
                Ordering::Equal => {}
            }
            if self.reaches(u, &tried, &fixed) {
                continue;
            }
            tried.push(u);
            let next = compose(g, chain_level.transversal(k));
            self.permuted.push(self.images[p]);
            let found = self.descend(level + 1, &next);
            self.permuted.pop();
            if found {
                return true;
            }
        }
        false
    }

    /// Whether a tie that fixes `fixed` pointwise moves `u` onto one of `tried`.
    fn reaches(&self, u: usize, tried: &[usize], fixed: &[usize]) -> bool {
        if tried.is_empty() {
            return false;
        }
        let usable: Vec<&Permutation> = self
            .ties
            .iter()
            .filter(|a| fixed.iter().all(|&f| a[f] == f))
            .collect();
        let mut orbit = vec![u];
        let mut k = 0;
        while k < orbit.len() {
            for a in &usable {
                let w = a[orbit[k]];
                if tried.contains(&w) {
                    return true;
                }
                if !orbit.contains(&w) {
                    orbit.push(w);
                }
            }
            k += 1;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::labelled::tests::graph;
    use crate::graph::LabelledGraph;
    use crate::morphism::vertex_map::InvertibleVertexMap;
    use crate::rule::labelled_rule::tests::split_cc;
    use crate::rule::{Membership, RuleBuilder};
    use ntest::timeout;
    use std::rc::Rc;

    fn cm(component: usize, host: usize, instance: usize, pairs: &[(usize, usize)], graph: &Rc<LabelledGraph>) -> ComponentMatch {
        let mut map = InvertibleVertexMap::new(16, 16);
        for (v, w) in pairs {
            map.put(*v, *w);
        }
        ComponentMatch {
            component,
            host,
            graph: graph.clone(),
            in_subset: true,
            map: Rc::new(map),
            instance,
        }
    }

    #[test]
    #[timeout(2000)]
    fn test_orientation_of_symmetric_component() {
        let rule = split_cc();
        let host = Rc::new(graph("ethane", &["C", "C"], &[(0, 1, "-")]));
        let mut canon = CanonMatch::new(&rule);
        assert!(canon.push_fast(&cm(0, 0, 0, &[(0, 0), (1, 1)], &host)));
        assert!(canon.accept());
        canon.pop_fast();
        assert!(!canon.push_fast(&cm(0, 0, 0, &[(0, 1), (1, 0)], &host)));
        canon.pop_fast();
    }

    #[test]
    #[timeout(2000)]
    fn test_swapped_components() {
        // Two isolated carbons that get bonded: swapping them gives the same derivation.
        let mut b = RuleBuilder::new("bond");
        let x = b.add_vertex(Membership::Context, "C", "C");
        let y = b.add_vertex(Membership::Context, "C", "C");
        b.add_edge(x, y, Membership::Right, "", "-").unwrap();
        let rule = b.build().unwrap();
        assert_eq!(rule.symmetry().order(), 2);
        let host = Rc::new(graph("methane", &["C"], &[]));

        let mut canon = CanonMatch::new(&rule);
        assert!(canon.push_fast(&cm(0, 0, 0, &[(0, 0)], &host)));
        assert!(canon.push_fast(&cm(1, 0, 1, &[(1, 0)], &host)));
        assert!(canon.accept());
        canon.pop_fast();
        // Instance 0 for both components is the same molecule again, seen already.
        assert!(canon.push_fast(&cm(1, 0, 0, &[(1, 0)], &host)));
        assert!(canon.accept());
        canon.pop_fast();
        canon.pop_fast();

        // Numbering instances out of first-appearance order is the first match again.
        assert!(canon.push_fast(&cm(0, 0, 1, &[(0, 0)], &host)));
        assert!(canon.push_fast(&cm(1, 0, 0, &[(1, 0)], &host)));
        assert!(!canon.accept());
    }

    #[test]
    #[timeout(2000)]
    fn test_push_and_push_fast_agree_on_one_component() {
        let rule = split_cc();
        let host = Rc::new(graph("propane", &["C", "C", "C"], &[(0, 1, "-"), (1, 2, "-")]));
        let maps = vec![
            vec![(0, 0), (1, 1)],
            vec![(0, 1), (1, 0)],
            vec![(0, 1), (1, 2)],
            vec![(0, 2), (1, 1)],
        ];
        let mut slow = CanonMatch::new(&rule);
        let mut fast = CanonMatch::new(&rule);
        let mut kept = 0;
        for pairs in &maps {
            let m = cm(0, 0, 0, pairs, &host);
            let a = slow.push(&m);
            let b = fast.push_fast(&m);
            assert_eq!(a, b, "{:?}", pairs);
            if b {
                kept += 1;
            }
            slow.pop();
            fast.pop_fast();
        }
        assert_eq!(kept, 2);
    }

    fn carbons(n: usize) -> LabelledRule {
        let mut b = RuleBuilder::new("carbons");
        for _ in 0..n {
            b.add_vertex(Membership::Context, "C", "C");
        }
        b.build().unwrap()
    }

    #[test]
    #[timeout(2000)]
    fn test_many_copies_of_one_host() {
        let rule = carbons(8);
        assert_eq!(rule.symmetry().order(), 40320);
        let host = Rc::new(graph("methane", &["C"], &[]));
        let mut canon = CanonMatch::new(&rule);
        for c in 0..8 {
            assert!(canon.push(&cm(c, 0, c, &[(c, 0)], &host)));
        }
        assert!(canon.accept());
        for _ in 0..8 {
            canon.pop();
        }

        // The last two components share a copy.
        for c in 0..8 {
            assert!(canon.push_fast(&cm(c, 0, c.min(6), &[(c, 0)], &host)));
        }
        assert!(!canon.accept());
        canon.pop_fast();
        assert!(canon.push_fast(&cm(7, 0, 7, &[(7, 0)], &host)));
        assert!(canon.accept());
    }

    #[test]
    #[timeout(2000)]
    fn test_order_within_one_host() {
        let rule = carbons(8);
        let edges: Vec<(usize, usize, &str)> = (0..7).map(|v| (v, v + 1, "-")).collect();
        let host = Rc::new(graph("octane", &["C"; 8], &edges));
        let mut canon = CanonMatch::new(&rule);
        for c in 0..8 {
            assert!(canon.push_fast(&cm(c, 0, 0, &[(c, c)], &host)));
        }
        assert!(canon.accept());
        for _ in 0..8 {
            canon.pop_fast();
        }

        assert!(canon.push_fast(&cm(0, 0, 0, &[(0, 7)], &host)));
        assert!(!canon.push_fast(&cm(1, 0, 0, &[(1, 6)], &host)));
        canon.pop_fast();
        assert!(!canon.push(&cm(1, 0, 0, &[(1, 6)], &host)));
    }
}
