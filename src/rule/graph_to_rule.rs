use crate::error::Error;
use crate::graph::labelled::LabelledGraph;
use crate::graph::stereo::Cloner;
use crate::graph::LabelledView;
use crate::rule::labelled_rule::{LabelledRule, Membership, PropTermCore, RuleBuilder, Side};

/// Turn a graph into a rule in which every element has the same membership:
/// Left gives `unbind<G>`, Context gives `id<G>`, Right gives `bind<G>`.
pub fn graph_to_rule(graph: &LabelledGraph, membership: Membership) -> Result<LabelledRule, Error> {
    let name = match membership {
        Membership::Left => format!("unbind<{}>", graph.name()),
        Membership::Context => format!("id<{}>", graph.name()),
        Membership::Right => format!("bind<{}>", graph.name()),
    };
    let mut builder = RuleBuilder::new(&name);
    for v in graph.vertices() {
        let label = graph.vertex_label(v);
        builder.add_vertex(membership, label, label);
    }
    for e in graph.edges() {
        let (s, t) = graph.topology().endpoints(e);
        let label = graph.edge_label(e);
        builder.add_edge(s, t, membership, label, label)?;
    }
    if let Some(stereo) = graph.stereo() {
        builder.enable_stereo();
        let side = match membership {
            Membership::Left => Side::Left,
            Membership::Context => Side::Context,
            Membership::Right => Side::Right,
        };
        for v in graph.vertices() {
            let cloned = Cloner::clone_configuration(
                &stereo.vertices[v],
                graph.topology(),
                v,
                builder.core(),
                v,
                Some,
            )
            .ok_or_else(|| Error::InvalidStereo(format!("could not clone configuration of vertex {}", v)))?;
            builder.set_configuration(v, side, cloned)?;
        }
        for e in graph.edges() {
            builder.set_edge_category(e, side, stereo.edges[e])?;
        }
    }
    let mut rule = builder.build()?;
    if let Some(terms) = graph.terms() {
        let keep = |side: bool, table: &[Option<crate::graph::term::Term>]| {
            if side {
                table.to_vec()
            } else {
                vec![None; table.len()]
            }
        };
        rule.set_terms(PropTermCore {
            vertex_left: keep(membership.in_left(), &terms.vertices),
            vertex_right: keep(membership.in_right(), &terms.vertices),
            edge_left: keep(membership.in_left(), &terms.edges),
            edge_right: keep(membership.in_right(), &terms.edges),
            error: terms.error.clone(),
        });
    }
    Ok(rule)
}

pub fn bind(graph: &LabelledGraph) -> Result<LabelledRule, Error> {
    graph_to_rule(graph, Membership::Right)
}

pub fn unbind(graph: &LabelledGraph) -> Result<LabelledRule, Error> {
    graph_to_rule(graph, Membership::Left)
}

pub fn identity(graph: &LabelledGraph) -> Result<LabelledRule, Error> {
    graph_to_rule(graph, Membership::Context)
}
