//! Per-component matches of rule left sides into host graphs, and the assembly of those
//! matches into derivations.

use crate::application::canon_match::CanonMatch;
use crate::application::derivation::{products, Derivation};
use crate::application::partial_match::PartialMatch;
use crate::config::LabelSettings;
use crate::error::Error;
use crate::graph::LabelledGraph;
use crate::logger::Logger;
use crate::morphism::constraints::{checked, Constraint};
use crate::morphism::label::LabelMatcher;
use crate::morphism::vertex_map::InvertibleVertexMap;
use crate::morphism::vf2::{find_morphisms, Mode};
use crate::rule::LabelledRule;
use std::collections::HashMap;
use std::rc::Rc;

/// A match of one left component of a rule into one host graph. The map goes from rule
/// core vertices to host vertices and covers exactly the component.
#[derive(Debug, Clone)]
pub struct ComponentMatch {
    pub component: usize,
    /// Index of the host in the universe.
    pub host: usize,
    pub graph: Rc<LabelledGraph>,
    pub in_subset: bool,
    pub map: Rc<InvertibleVertexMap>,
    /// Which copy of the host graph the match uses when a graph is consumed several times.
    pub instance: usize,
}

impl ComponentMatch {
    pub fn with_instance(&self, instance: usize) -> Self {
        Self {
            instance,
            ..self.clone()
        }
    }
}

/// Monomorphisms of left component `component` of `rule` into `host` that pass the rule's
/// constraints on that component. Stops after `limit` maps when given.
fn component_matches(
    rule: &LabelledRule,
    component: usize,
    host: &LabelledGraph,
    settings: LabelSettings,
    limit: Option<usize>,
) -> Vec<InvertibleVertexMap> {
    let pattern = rule.left_component(component);
    let of_vertex = &rule.left_components().of_vertex;
    let constraints: Vec<Constraint> = rule
        .constraints()
        .iter()
        .filter(|c| c.vertices().into_iter().all(|v| of_vertex[v] == Some(component)))
        .cloned()
        .collect();
    let mut found = vec![];
    let store = |m: &InvertibleVertexMap| {
        found.push(m.clone());
        limit.map_or(true, |l| found.len() < l)
    };
    find_morphisms(
        &pattern,
        host,
        LabelMatcher::new(&pattern, host, settings),
        Mode::Monomorphism,
        checked(&constraints, host, settings, store),
    );
    found
}

fn is_monomorphic(rule: &LabelledRule, component: usize, host: &LabelledGraph, settings: LabelSettings) -> bool {
    !component_matches(rule, component, host, settings, Some(1)).is_empty()
}

type CacheKey = (usize, usize, usize);

struct CacheEntry {
    // The key holds raw addresses; keeping both alive stops them from being reused.
    _rule: Rc<LabelledRule>,
    _graph: Rc<LabelledGraph>,
    maps: Vec<Rc<InvertibleVertexMap>>,
}

/// Cache of component matches keyed by rule, host graph and component. Entries are never
/// invalidated: rules and graphs are immutable once shared.
pub struct ComponentMatchDb {
    settings: LabelSettings,
    cache: HashMap<CacheKey, CacheEntry>,
}

impl ComponentMatchDb {
    pub fn new(settings: LabelSettings) -> Self {
        Self {
            settings,
            cache: HashMap::new(),
        }
    }

    pub fn settings(&self) -> LabelSettings {
        self.settings
    }

    /// Number of cached (rule, graph, component) entries.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Whether the rule can produce a derivation that uses at least one of the first
    /// `num_subset` graphs of `universe`. False as soon as a left component has no match
    /// anywhere. A rule without left components is always valid.
    pub fn is_valid(&self, rule: &LabelledRule, num_subset: usize, universe: &[Rc<LabelledGraph>]) -> bool {
        let num_subset = num_subset.min(universe.len());
        if rule.num_left_components() == 0 {
            return true;
        }
        let (subset, rest) = universe.split_at(num_subset);
        let mut has_subset_match = false;
        for cid in 0..rule.num_left_components() {
            if subset.iter().any(|g| is_monomorphic(rule, cid, g, self.settings)) {
                has_subset_match = true;
                continue;
            }
            if !rest.iter().any(|g| is_monomorphic(rule, cid, g, self.settings)) {
                log::debug!("rule {}: left component {} has no match", rule.name(), cid);
                return false;
            }
        }
        has_subset_match
    }

    /// All component matches of `rule` into `universe`, newest graphs first. Hosts with an
    /// index below `num_subset` are flagged as in the subset.
    pub fn get_matches(
        &mut self,
        rule: &Rc<LabelledRule>,
        num_subset: usize,
        universe: &[Rc<LabelledGraph>],
    ) -> Vec<ComponentMatch> {
        let mut out = vec![];
        for host in (0..universe.len()).rev() {
            let graph = &universe[host];
            for cid in 0..rule.num_left_components() {
                let key = (Rc::as_ptr(rule) as usize, Rc::as_ptr(graph) as usize, cid);
                let settings = self.settings;
                let entry = self.cache.entry(key).or_insert_with(|| {
                    let maps: Vec<Rc<InvertibleVertexMap>> = component_matches(rule, cid, graph, settings, None)
                        .into_iter()
                        .map(Rc::new)
                        .collect();
                    log::trace!("{} matches of {}[{}] in {}", maps.len(), rule.name(), cid, graph.name());
                    CacheEntry {
                        _rule: rule.clone(),
                        _graph: graph.clone(),
                        maps,
                    }
                });
                out.extend(entry.maps.iter().map(|m| ComponentMatch {
                    component: cid,
                    host,
                    graph: graph.clone(),
                    in_subset: host < num_subset,
                    map: m.clone(),
                    instance: 0,
                }));
            }
        }
        out
    }

    /// Assemble full matches from `matches` and apply the rule to each one that is new.
    ///
    /// A full match must use at least one subset host and must be the canonical one among
    /// its images under the rule's automorphisms. `on_new_graph_instance` is asked before
    /// another copy of a host graph is opened and can refuse it. `on_match` receives every
    /// derivation and returns false to stop. Returns the number of derivations reported.
    pub fn compute_derivations<M, N>(
        &self,
        rule: &Rc<LabelledRule>,
        matches: &[ComponentMatch],
        logger: &Logger,
        mut on_match: M,
        mut on_new_graph_instance: N,
    ) -> Result<usize, Error>
    where
        M: FnMut(&PartialMatch, Derivation) -> bool,
        N: FnMut(&Rc<LabelledGraph>, usize) -> bool,
    {
        let num_components = rule.num_left_components();
        let mut by_component: Vec<Vec<&ComponentMatch>> = vec![vec![]; num_components];
        for cm in matches {
            by_component[cm.component].push(cm);
        }
        logger.log(
            1,
            &format!(
                "rule {}: assembling {} component matches over {} components",
                rule.name(),
                matches.len(),
                num_components
            ),
        );
        let mut search = Assembly {
            rule,
            settings: self.settings,
            by_component,
            partial: PartialMatch::new(rule, self.settings),
            canon: CanonMatch::new(rule),
            logger,
            reported: 0,
            rejected: 0,
        };
        let _indent = logger.indent();
        search.recurse(&mut on_match, &mut on_new_graph_instance)?;
        log::info!(
            "rule {}: {} derivations from {} component matches ({} full matches rejected)",
            rule.name(),
            search.reported,
            matches.len(),
            search.rejected
        );
        Ok(search.reported)
    }
}

struct Assembly<'a> {
    rule: &'a Rc<LabelledRule>,
    settings: LabelSettings,
    by_component: Vec<Vec<&'a ComponentMatch>>,
    partial: PartialMatch<'a>,
    canon: CanonMatch<'a>,
    logger: &'a Logger,
    reported: usize,
    rejected: usize,
}

impl Assembly<'_> {
    /// Returns false when the caller asked to stop.
    fn report<M>(&mut self, on_match: &mut M) -> Result<bool, Error>
    where
        M: FnMut(&PartialMatch, Derivation) -> bool,
    {
        let in_subset = self.rule.num_left_components() == 0
            || self.partial.component_matches().any(|cm| cm.in_subset);
        if !in_subset || !self.canon.accept() {
            self.rejected += 1;
            return Ok(true);
        }
        let composition = match self.partial.apply()? {
            Some(c) => c,
            None => {
                self.rejected += 1;
                self.logger.log(2, "match does not give a valid derivation");
                return Ok(true);
            }
        };
        let right = products(&composition.rule, self.settings)?
            .into_iter()
            .map(Rc::new)
            .collect();
        let derivation = Derivation {
            left: self.partial.lhs(),
            rule: self.rule.clone(),
            right,
        };
        self.logger.log(2, &format!("derivation {}", derivation));
        self.reported += 1;
        Ok(on_match(&self.partial, derivation))
    }

    fn recurse<M, N>(&mut self, on_match: &mut M, on_new_graph_instance: &mut N) -> Result<bool, Error>
    where
        M: FnMut(&PartialMatch, Derivation) -> bool,
        N: FnMut(&Rc<LabelledGraph>, usize) -> bool,
    {
        if self.partial.is_full() {
            return self.report(on_match);
        }
        let depth = self.partial.len();
        let candidates = self.by_component[depth].clone();
        for cm in candidates {
            let opened = self.partial.num_instances(cm.host);
            for instance in 0..=opened {
                if instance == opened && !on_new_graph_instance(&cm.graph, instance) {
                    continue;
                }
                let cm = cm.with_instance(instance);
                if !self.partial.push(&cm) {
                    continue;
                }
                let keep_going = if self.canon.push_fast(&cm) {
                    self.recurse(on_match, on_new_graph_instance)?
                } else {
                    true
                };
                self.canon.pop_fast();
                self.partial.pop();
                if !keep_going {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::labelled::tests::graph;
    use crate::graph::LabelledView;
    use crate::morphism::constraints::{Comparison, Constraint, Operator, ShortestPath};
    use crate::morphism::VertexMap;
    use crate::rule::labelled_rule::tests::{split_cc, unbind_cc};
    use crate::config::{LabelRelation, LabelType};
    use crate::graph::stereo::{Configuration, EmbeddingEdge, Fixation};
    use crate::graph::term::StringStore;
    use crate::rule::{Membership, RuleBuilder, Side};
    use maplit::hashset;
    use ntest::timeout;
    use std::collections::HashSet;

    fn ethane() -> Rc<LabelledGraph> {
        Rc::new(graph("ethane", &["C", "C"], &[(0, 1, "-")]))
    }

    fn run(rule: &Rc<LabelledRule>, universe: &[Rc<LabelledGraph>]) -> Vec<Derivation> {
        let mut db = ComponentMatchDb::new(LabelSettings::string_iso());
        let matches = db.get_matches(rule, universe.len(), universe);
        let mut found = vec![];
        db.compute_derivations(
            rule,
            &matches,
            &Logger::new(0),
            |_, d| {
                found.push(d);
                true
            },
            |_, _| true,
        )
        .unwrap();
        found
    }

    #[test]
    #[timeout(2000)]
    fn test_split_ethane() {
        let rule = Rc::new(split_cc());
        let found = run(&rule, &[ethane()]);
        assert_eq!(found.len(), 1);
        let d = &found[0];
        assert_eq!(d.left.len(), 1);
        assert_eq!(d.left[0].name(), "ethane");
        assert_eq!(d.right.len(), 2);
        for g in &d.right {
            assert_eq!(g.num_vertices(), 1);
            assert_eq!(g.vertex_label(0), "C");
        }
    }

    #[test]
    #[timeout(2000)]
    fn test_unbind_ethane() {
        let rule = Rc::new(unbind_cc());
        let found = run(&rule, &[ethane()]);
        assert_eq!(found.len(), 1);
        assert!(found[0].right.is_empty());
    }

    #[test]
    #[timeout(2000)]
    fn test_is_valid() {
        let db = ComponentMatchDb::new(LabelSettings::string_iso());
        let water = Rc::new(graph("water", &["O", "H", "H"], &[(0, 1, "-"), (0, 2, "-")]));
        let universe = vec![ethane(), water.clone()];
        let mut b = RuleBuilder::new("needs N");
        let c = b.add_vertex(Membership::Context, "C", "C");
        let n = b.add_vertex(Membership::Context, "N", "N");
        b.add_edge(c, n, Membership::Left, "-", "").unwrap();
        let needs_n = b.build().unwrap();
        assert!(!db.is_valid(&needs_n, 2, &universe));

        let split = split_cc();
        assert!(db.is_valid(&split, 2, &universe));
        // Ethane is outside the subset, so nothing new can come from water alone.
        assert!(!db.is_valid(&split, 1, &[water, ethane()]));

        let mut b = RuleBuilder::new("create C");
        b.add_vertex(Membership::Right, "", "C");
        assert!(db.is_valid(&b.build().unwrap(), 0, &[]));
    }

    #[test]
    #[timeout(2000)]
    fn test_cache_is_idempotent() {
        let rule = Rc::new(split_cc());
        let propane = Rc::new(graph("propane", &["C", "C", "C"], &[(0, 1, "-"), (1, 2, "-")]));
        let universe = vec![ethane(), propane];
        let mut db = ComponentMatchDb::new(LabelSettings::string_iso());
        let first = db.get_matches(&rule, 2, &universe);
        assert_eq!(db.len(), 2);
        let second = db.get_matches(&rule, 2, &universe);
        assert_eq!(db.len(), 2);
        let pairs = |ms: &[ComponentMatch]| -> Vec<(usize, Vec<(usize, usize)>)> {
            ms.iter().map(|m| (m.host, m.map.pairs())).collect()
        };
        assert_eq!(pairs(&first), pairs(&second));
        assert_eq!(first.len(), 6);
        // Newest graph first.
        assert_eq!(first[0].host, 1);
    }

    #[test]
    #[timeout(2000)]
    fn test_automorphic_matches_are_reported_once() {
        let rule = Rc::new(split_cc());
        let propane = Rc::new(graph("propane", &["C", "C", "C"], &[(0, 1, "-"), (1, 2, "-")]));
        let found = run(&rule, &[propane]);
        assert_eq!(found.len(), 2);
        for d in &found {
            let sizes: HashSet<usize> = d.right.iter().map(|g| g.num_vertices()).collect();
            assert_eq!(sizes, hashset! {1, 2});
        }
    }

    #[test]
    #[timeout(2000)]
    fn test_two_instances_of_one_graph() {
        // Two lone carbons joined by a new bond.
        let mut b = RuleBuilder::new("bond");
        let x = b.add_vertex(Membership::Context, "C", "C");
        let y = b.add_vertex(Membership::Context, "C", "C");
        b.add_edge(x, y, Membership::Right, "", "-").unwrap();
        let rule = Rc::new(b.build().unwrap());
        assert_eq!(rule.num_left_components(), 2);
        let carbon = Rc::new(graph("C", &["C"], &[]));

        let found = run(&rule, &[carbon.clone()]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].left.len(), 2);
        assert_eq!(found[0].right.len(), 1);
        assert_eq!(found[0].right[0].num_edges(), 1);

        // Refusing a second copy leaves nothing to bond.
        let mut db = ComponentMatchDb::new(LabelSettings::string_iso());
        let matches = db.get_matches(&rule, 1, &[carbon]);
        let mut opened = vec![];
        let count = db
            .compute_derivations(
                &rule,
                &matches,
                &Logger::new(0),
                |_, _| true,
                |g, instance| {
                    opened.push((g.name().to_string(), instance));
                    instance == 0
                },
            )
            .unwrap();
        assert_eq!(count, 0);
        assert!(opened.contains(&("C".to_string(), 1)));
    }

    #[test]
    #[timeout(2000)]
    fn test_shortest_path_constraint_rejects_far_matches() {
        let butanol = Rc::new(graph(
            "butanol",
            &["C", "C", "C", "C", "O"],
            &[(0, 1, "-"), (1, 2, "-"), (2, 3, "-"), (3, 4, "-")],
        ));
        let mut b = RuleBuilder::new("far ends");
        let x = b.add_vertex(Membership::Context, "C", "C");
        let y = b.add_vertex(Membership::Context, "O", "O");
        let z = b.add_vertex(Membership::Context, "C", "C");
        b.add_edge(y, z, Membership::Context, "-", "-").unwrap();
        b.add_edge(x, z, Membership::Context, "-", "-").unwrap();
        b.add_constraint(Constraint::ShortestPath(ShortestPath {
            source: x,
            target: y,
            comparison: Comparison {
                operator: Operator::LessOrEqual,
                value: 1,
            },
        }))
        .unwrap();
        let rule = Rc::new(b.build().unwrap());
        let mut db = ComponentMatchDb::new(LabelSettings::string_iso());
        assert!(db.get_matches(&rule, 1, &[butanol.clone()]).is_empty());
        assert!(!db.is_valid(&rule, 1, &[butanol]));
    }

    #[test]
    #[timeout(2000)]
    fn test_constraint_only_checks_its_component() {
        // Bond a carbon to the carbon of a C-O pair; the distance constraint sits on the pair.
        let methanol = Rc::new(graph("methanol", &["C", "O"], &[(0, 1, "-")]));
        let mut b = RuleBuilder::new("bond to C-O");
        let x = b.add_vertex(Membership::Context, "C", "C");
        let y = b.add_vertex(Membership::Context, "C", "C");
        let w = b.add_vertex(Membership::Context, "O", "O");
        b.add_edge(y, w, Membership::Context, "-", "-").unwrap();
        b.add_edge(x, y, Membership::Right, "", "-").unwrap();
        let near = |operator| {
            Constraint::ShortestPath(ShortestPath {
                source: y,
                target: w,
                comparison: Comparison { operator, value: 1 },
            })
        };
        let mut strict = b.clone();
        b.add_constraint(near(Operator::LessOrEqual)).unwrap();
        let rule = Rc::new(b.build().unwrap());
        assert_eq!(rule.num_left_components(), 2);
        let mut db = ComponentMatchDb::new(LabelSettings::string_iso());
        let matches = db.get_matches(&rule, 1, &[methanol.clone()]);
        assert_eq!(matches.iter().filter(|m| m.component == 0).count(), 1);
        assert_eq!(matches.iter().filter(|m| m.component == 1).count(), 1);
        let found = run(&rule, &[methanol.clone()]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].left.len(), 2);

        strict.add_constraint(near(Operator::Greater)).unwrap();
        let rule = Rc::new(strict.build().unwrap());
        let matches = db.get_matches(&rule, 1, &[methanol.clone()]);
        assert_eq!(matches.iter().filter(|m| m.component == 0).count(), 1);
        assert_eq!(matches.iter().filter(|m| m.component == 1).count(), 0);
        assert!(run(&rule, &[methanol]).is_empty());
    }

    #[test]
    #[timeout(2000)]
    fn test_term_variable_is_specialised_in_product() {
        let mut store = StringStore::new();
        let mut co = graph("CO", &["C", "O"], &[(0, 1, "-")]);
        co.parse_terms(&mut store);
        let mut broken = graph("broken", &["f(a", "O"], &[(0, 1, "-")]);
        broken.parse_terms(&mut store);
        assert!(!broken.terms_valid());
        let universe = vec![Rc::new(co), Rc::new(broken)];

        let mut b = RuleBuilder::new("mark");
        let x = b.add_vertex(Membership::Context, "_X", "f(_X)");
        let y = b.add_vertex(Membership::Context, "O", "O");
        b.add_edge(x, y, Membership::Context, "-", "-").unwrap();
        let mut rule = b.build().unwrap();
        rule.parse_terms(&mut store);
        let rule = Rc::new(rule);

        let settings = LabelSettings::new(LabelType::Term, LabelRelation::Specialisation);
        let mut db = ComponentMatchDb::new(settings);
        assert!(db.is_valid(&rule, 2, &universe));
        let matches = db.get_matches(&rule, 2, &universe);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].host, 0);

        let mut found = vec![];
        db.compute_derivations(
            &rule,
            &matches,
            &Logger::new(0),
            |_, d| {
                found.push(d);
                true
            },
            |_, _| true,
        )
        .unwrap();
        assert_eq!(found.len(), 1);
        let product = &found[0].right[0];
        assert_eq!(product.vertex_label(0), "f(C)");
        assert_eq!(product.vertex_label(1), "O");
        assert!(product.terms_valid());
        // Only the invalid host is left: nothing may match it.
        assert!(!db.is_valid(&rule, 1, &universe[1..]));
    }

    #[test]
    #[timeout(2000)]
    fn test_stereo_rejects_mirrored_centre() {
        let star = |name, embedding: Vec<EmbeddingEdge>| {
            let mut g = graph(name, &["C", "F", "Cl", "Br", "I"], &[(0, 1, "-"), (0, 2, "-"), (0, 3, "-"), (0, 4, "-")]);
            g.set_configuration(0, Configuration::tetrahedral(embedding, Fixation::Simple).unwrap())
                .unwrap();
            Rc::new(g)
        };
        let upright = star("upright", (0..4).map(EmbeddingEdge::Edge).collect());
        let mirrored = star(
            "mirrored",
            vec![EmbeddingEdge::Edge(1), EmbeddingEdge::Edge(0), EmbeddingEdge::Edge(2), EmbeddingEdge::Edge(3)],
        );

        let mut b = RuleBuilder::new("touch centre");
        let centre = b.add_vertex(Membership::Context, "C", "C");
        for label in &["F", "Cl", "Br", "I"] {
            let v = b.add_vertex(Membership::Context, label, label);
            b.add_edge(centre, v, Membership::Context, "-", "-").unwrap();
        }
        let cfg = Configuration::tetrahedral((0..4).map(EmbeddingEdge::Edge).collect(), Fixation::Simple).unwrap();
        b.set_configuration(centre, Side::Context, cfg).unwrap();
        let rule = Rc::new(b.build().unwrap());
        let universe = vec![upright, mirrored];

        let settings = LabelSettings::string_iso().with_stereo(LabelRelation::Isomorphism);
        let mut db = ComponentMatchDb::new(settings);
        let hosts: Vec<usize> = db.get_matches(&rule, 2, &universe).iter().map(|m| m.host).collect();
        assert_eq!(hosts, vec![0]);
        assert!(!db.is_valid(&rule, 1, &universe[1..]));

        let mut plain = ComponentMatchDb::new(LabelSettings::string_iso());
        assert_eq!(plain.get_matches(&rule, 2, &universe).len(), 2);
    }

    #[test]
    #[timeout(2000)]
    fn test_stop_early() {
        let rule = Rc::new(split_cc());
        let propane = Rc::new(graph("propane", &["C", "C", "C"], &[(0, 1, "-"), (1, 2, "-")]));
        let mut db = ComponentMatchDb::new(LabelSettings::string_iso());
        let matches = db.get_matches(&rule, 1, &[propane]);
        let mut seen = 0;
        let count = db
            .compute_derivations(
                &rule,
                &matches,
                &Logger::new(0),
                |pm, _| {
                    seen += 1;
                    assert!(pm.is_full());
                    false
                },
                |_, _| true,
            )
            .unwrap();
        assert_eq!((seen, count), (1, 1));
    }
}
