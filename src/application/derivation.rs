use crate::config::{LabelSettings, LabelType};
use crate::error::Error;
use crate::graph::stereo::Cloner;
use crate::graph::term::StringStore;
use crate::graph::{LabelledGraph, LabelledView};
use crate::morphism::label::LabelMatcher;
use crate::morphism::vf2::{is_morphic, Mode};
use crate::rule::{LabelledRule, Side};
use std::fmt;
use std::rc::Rc;

/// One rule application: the host graphs consumed and the graphs produced, as multisets.
#[derive(Debug, Clone)]
pub struct Derivation {
    pub left: Vec<Rc<LabelledGraph>>,
    pub rule: Rc<LabelledRule>,
    pub right: Vec<Rc<LabelledGraph>>,
}

impl fmt::Display for Derivation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = |graphs: &[Rc<LabelledGraph>]| {
            graphs.iter().map(|g| g.name().to_string()).collect::<Vec<_>>().join(" + ")
        };
        write!(f, "{} ={}=> {}", names(&self.left), self.rule.name(), names(&self.right))
    }
}

/// Split the right side of `rule` into one graph per connected component.
pub fn products(rule: &LabelledRule, settings: LabelSettings) -> Result<Vec<LabelledGraph>, Error> {
    let right = rule.right();
    let components = rule.right_components();
    let mut local = vec![None; rule.core().num_vertices()];
    let mut graphs = Vec::with_capacity(components.len());
    for (c, vertices) in components.vertices.iter().enumerate() {
        let mut graph = LabelledGraph::new(&format!("{}, product {}", rule.name(), c));
        for &v in vertices {
            local[v] = Some(graph.add_vertex(right.vertex_label(v)));
        }
        let mut edges = vec![];
        for e in rule.right_component(c).edges() {
            let (s, t) = rule.core().endpoints(e);
            if let (Some(ls), Some(lt)) = (local[s], local[t]) {
                graph.add_edge(ls, lt, right.edge_label(e))?;
                edges.push(e);
            }
        }
        if let Some(stereo) = rule.stereo() {
            graph.enable_stereo();
            for (i, e) in edges.iter().enumerate() {
                graph.set_edge_category(i, stereo.edge_right[*e])?;
            }
            for &v in vertices {
                let lv = match local[v] {
                    Some(lv) => lv,
                    None => continue,
                };
                let cloned = Cloner::clone_configuration(
                    &stereo.vertex_right[v],
                    rule.core(),
                    v,
                    graph.topology(),
                    lv,
                    |n| local[n],
                )
                .ok_or_else(|| Error::InvalidStereo(format!("vertex {} of {} loses an embedded edge", v, rule.name())))?;
                graph.set_configuration(lv, cloned)?;
            }
        }
        if settings.label_type == LabelType::Term {
            graph.parse_terms(&mut StringStore::new());
        }
        log::trace!("{}: product {} with {} vertices", rule.name(), c, graph.num_vertices());
        graphs.push(graph);
    }
    Ok(graphs)
}

/// The first candidate isomorphic to `graph`.
pub fn find_isomorphic<'g>(
    graph: &LabelledGraph,
    candidates: &'g [Rc<LabelledGraph>],
    settings: LabelSettings,
) -> Option<&'g Rc<LabelledGraph>> {
    candidates.iter().find(|c| {
        c.num_vertices() == graph.num_vertices()
            && c.num_edges() == graph.num_edges()
            && is_morphic(graph, c.as_ref(), LabelMatcher::new(graph, c.as_ref(), settings), Mode::Isomorphism)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::labelled::tests::graph;
    use crate::graph::stereo::{Configuration, EdgeCategory, EmbeddingEdge, Fixation};
    use crate::rule::labelled_rule::tests::{split_cc, unbind_cc};
    use crate::rule::{Membership, RuleBuilder};
    use ntest::timeout;

    #[test]
    #[timeout(2000)]
    fn test_products_of_split() {
        let graphs = products(&split_cc(), LabelSettings::string_iso()).unwrap();
        assert_eq!(graphs.len(), 2);
        for g in &graphs {
            assert_eq!(g.num_vertices(), 1);
            assert_eq!(g.vertex_label(0), "C");
        }
        assert!(products(&unbind_cc(), LabelSettings::string_iso()).unwrap().is_empty());
    }

    #[test]
    #[timeout(2000)]
    fn test_products_use_right_labels() {
        let mut b = RuleBuilder::new("oxidise");
        let c = b.add_vertex(Membership::Context, "C", "C");
        let o = b.add_vertex(Membership::Context, "O", "O");
        let h = b.add_vertex(Membership::Left, "H", "");
        b.add_edge(c, o, Membership::Context, "-", "=").unwrap();
        b.add_edge(o, h, Membership::Left, "-", "").unwrap();
        let rule = b.build().unwrap();
        let graphs = products(&rule, LabelSettings::string_iso()).unwrap();
        assert_eq!(graphs.len(), 1);
        let g = &graphs[0];
        assert_eq!(g.num_vertices(), 2);
        assert_eq!(g.num_edges(), 1);
        assert_eq!(g.edge_label(0), "=");
        assert!(g.stereo().is_none());
    }

    #[test]
    #[timeout(2000)]
    fn test_products_carry_stereo() {
        let mut b = RuleBuilder::new("fix");
        let centre = b.add_vertex(Membership::Context, "C", "C");
        let gone = b.add_vertex(Membership::Left, "H", "");
        let mut kept = vec![];
        for label in &["F", "Cl", "Br"] {
            let v = b.add_vertex(Membership::Context, label, label);
            b.add_edge(centre, v, Membership::Context, "-", "-").unwrap();
            kept.push(v);
        }
        let new = b.add_vertex(Membership::Right, "", "I");
        b.add_edge(centre, gone, Membership::Left, "-", "").unwrap();
        b.add_edge(centre, new, Membership::Right, "", "-").unwrap();
        // Core offsets at the centre: F 0, Cl 1, Br 2, H 3, I 4.
        let embedding = vec![EmbeddingEdge::Edge(4), EmbeddingEdge::Edge(0), EmbeddingEdge::Edge(1), EmbeddingEdge::Edge(2)];
        b.set_configuration(centre, Side::Right, Configuration::tetrahedral(embedding, Fixation::Simple).unwrap())
            .unwrap();
        b.set_edge_category(4, Side::Right, EdgeCategory::Single).unwrap();
        let rule = b.build().unwrap();

        let graphs = products(&rule, LabelSettings::string_iso()).unwrap();
        assert_eq!(graphs.len(), 1);
        let g = &graphs[0];
        assert_eq!(g.num_vertices(), 5);
        // Product edges follow core edge order without the deleted bond: F, Cl, Br, I.
        let cfg = g.vertex_stereo(0).unwrap();
        assert_eq!(
            cfg.embedding,
            vec![EmbeddingEdge::Edge(3), EmbeddingEdge::Edge(0), EmbeddingEdge::Edge(1), EmbeddingEdge::Edge(2)]
        );
        assert_eq!(cfg.fixation, Fixation::Simple);
        assert_eq!(g.edge_category(3), Some(EdgeCategory::Single));
    }

    #[test]
    #[timeout(2000)]
    fn test_find_isomorphic() {
        let pool = vec![
            Rc::new(graph("water", &["O", "H", "H"], &[(0, 1, "-"), (0, 2, "-")])),
            Rc::new(graph("ethane", &["C", "C"], &[(0, 1, "-")])),
            Rc::new(graph("ethene", &["C", "C"], &[(0, 1, "=")])),
        ];
        let query = graph("query", &["H", "O", "H"], &[(1, 0, "-"), (1, 2, "-")]);
        let found = find_isomorphic(&query, &pool, LabelSettings::string_iso()).unwrap();
        assert_eq!(found.name(), "water");
        let query = graph("query", &["C", "C"], &[(0, 1, "=")]);
        assert_eq!(find_isomorphic(&query, &pool, LabelSettings::string_iso()).unwrap().name(), "ethene");
        let query = graph("query", &["C"], &[]);
        assert!(find_isomorphic(&query, &pool, LabelSettings::string_iso()).is_none());
    }

    #[test]
    #[timeout(2000)]
    fn test_display() {
        let ethane = Rc::new(graph("ethane", &["C", "C"], &[(0, 1, "-")]));
        let methyl = Rc::new(graph("methyl", &["C"], &[]));
        let d = Derivation {
            left: vec![ethane],
            rule: Rc::new(split_cc()),
            right: vec![methyl.clone(), methyl],
        };
        assert_eq!(d.to_string(), format!("ethane ={}=> methyl + methyl", d.rule.name()));
    }
}
