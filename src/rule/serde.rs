use crate::error::Error;
use crate::graph::serde::{EdgeDesc, EmbeddingDesc, StereoDesc, VertexDesc};
use crate::graph::stereo::{Configuration, EmbeddingEdge, Fixation};
use crate::morphism::constraints::{Comparison, Constraint, Operator, ShortestPath, VertexAdjacency};
use crate::rule::labelled_rule::{LabelledRule, Membership, RuleBuilder, Side};
use core::fmt::Formatter;
use serde::de::{Error as _, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::collections::{BTreeMap, HashMap};

/// Vertices and edges of one section of a rule description.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SectionDesc {
    #[serde(default)]
    pub vertices: Vec<VertexDesc>,
    #[serde(default)]
    pub edges: Vec<EdgeDesc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdjacencyDesc {
    pub id: usize,
    pub count: Comparison,
    #[serde(default, alias = "vertexLabels")]
    pub vertex_labels: Vec<String>,
    #[serde(default, alias = "edgeLabels")]
    pub edge_labels: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShortestPathDesc {
    pub source: usize,
    pub target: usize,
    pub length: Comparison,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintDesc {
    Adjacency(AdjacencyDesc),
    #[serde(alias = "shortestPath")]
    ShortestPath(ShortestPathDesc),
}

/// A rule written as three sections. An element listed in both `left` and `right` is a
/// context element whose label changes; listing it in `context` as well is an error.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleDesc {
    pub name: String,
    #[serde(default)]
    pub left: SectionDesc,
    #[serde(default)]
    pub context: SectionDesc,
    #[serde(default)]
    pub right: SectionDesc,
    #[serde(default)]
    pub constraints: Vec<ConstraintDesc>,
}

struct Occurrence<'a, T> {
    left: Option<&'a T>,
    context: Option<&'a T>,
    right: Option<&'a T>,
}

impl<T> Default for Occurrence<'_, T> {
    fn default() -> Self {
        Self {
            left: None,
            context: None,
            right: None,
        }
    }
}

impl<'a, T> Occurrence<'a, T> {
    fn get(&self, side: Side) -> Option<&'a T> {
        match side {
            Side::Left => self.left,
            Side::Context => self.context,
            Side::Right => self.right,
        }
    }

    fn slot(&mut self, side: Side) -> &mut Option<&'a T> {
        match side {
            Side::Left => &mut self.left,
            Side::Context => &mut self.context,
            Side::Right => &mut self.right,
        }
    }

    /// Membership and the labels on both sides.
    fn resolve<F>(&self, label: F, what: &str) -> Result<(Membership, &'a str, &'a str), Error>
    where
        F: Fn(&'a T) -> &'a str,
    {
        match (self.left, self.context, self.right) {
            (None, Some(c), None) => Ok((Membership::Context, label(c), label(c))),
            (Some(l), None, Some(r)) => Ok((Membership::Context, label(l), label(r))),
            (Some(l), None, None) => Ok((Membership::Left, label(l), "")),
            (None, None, Some(r)) => Ok((Membership::Right, "", label(r))),
            _ => Err(Error::InvalidGraph(format!("{} is listed in context and in left or right", what))),
        }
    }
}

const SECTIONS: [Side; 3] = [Side::Left, Side::Context, Side::Right];

impl RuleDesc {
    fn section(&self, side: Side) -> &SectionDesc {
        match side {
            Side::Left => &self.left,
            Side::Context => &self.context,
            Side::Right => &self.right,
        }
    }

    pub fn build(&self) -> Result<LabelledRule, Error> {
        let mut vertices: BTreeMap<usize, Occurrence<VertexDesc>> = BTreeMap::new();
        let mut edges: BTreeMap<(usize, usize), Occurrence<EdgeDesc>> = BTreeMap::new();
        for &side in &SECTIONS {
            let section = self.section(side);
            for v in &section.vertices {
                let slot = vertices.entry(v.id).or_default().slot(side);
                if slot.replace(v).is_some() {
                    return Err(Error::InvalidGraph(format!("vertex id {} used twice in {:?}", v.id, side)));
                }
            }
            for e in &section.edges {
                let key = (e.source.min(e.target), e.source.max(e.target));
                let slot = edges.entry(key).or_default().slot(side);
                if slot.replace(e).is_some() {
                    return Err(Error::DuplicateEdge(e.source, e.target));
                }
            }
        }

        let mut builder = RuleBuilder::new(&self.name);
        let mut index = HashMap::new();
        for (&id, occurrence) in &vertices {
            let (membership, left, right) = occurrence.resolve(|v| v.label.as_str(), &format!("vertex {}", id))?;
            index.insert(id, builder.add_vertex(membership, left, right));
        }
        let lookup = |id: usize| index.get(&id).copied().ok_or(Error::UnknownVertex(id));

        let mut edge_membership = vec![];
        for (&(s, t), occurrence) in &edges {
            let (membership, left, right) = occurrence.resolve(|e| e.label.as_str(), &format!("edge ({}, {})", s, t))?;
            let e = builder.add_edge(lookup(s)?, lookup(t)?, membership, left, right)?;
            edge_membership.push(membership);
            for &side in &SECTIONS {
                if let Some(category) = occurrence.get(side).and_then(|d| d.category) {
                    builder.set_edge_category(e, side, category)?;
                }
            }
        }

        for (&id, occurrence) in &vertices {
            for &side in &SECTIONS {
                let desc = match occurrence.get(side).and_then(|d| d.stereo.as_ref()) {
                    Some(desc) => desc,
                    None => continue,
                };
                let v = lookup(id)?;
                let configuration = side_configuration(&builder, &edge_membership, v, side, desc, &lookup)?;
                builder.set_configuration(v, side, configuration)?;
            }
        }

        for c in &self.constraints {
            let constraint = match c {
                ConstraintDesc::Adjacency(a) => Constraint::VertexAdjacency(VertexAdjacency {
                    vertex: lookup(a.id)?,
                    vertex_labels: a.vertex_labels.clone(),
                    edge_labels: a.edge_labels.clone(),
                    comparison: a.count,
                }),
                ConstraintDesc::ShortestPath(p) => Constraint::ShortestPath(ShortestPath {
                    source: lookup(p.source)?,
                    target: lookup(p.target)?,
                    comparison: p.length,
                }),
            };
            builder.add_constraint(constraint)?;
        }
        builder.build()
    }
}

fn side_configuration<F>(
    builder: &RuleBuilder,
    edge_membership: &[Membership],
    v: usize,
    side: Side,
    desc: &StereoDesc,
    lookup: &F,
) -> Result<Configuration, Error>
where
    F: Fn(usize) -> Result<usize, Error>,
{
    let core = builder.core();
    let mut embedding = vec![];
    for entry in &desc.embedding {
        embedding.push(match entry {
            EmbeddingDesc::Neighbour(id) => {
                let n = lookup(*id)?;
                let offset = core.offset_of_neighbour(v, n).ok_or_else(|| {
                    Error::InvalidStereo(format!("{} is not a neighbour of vertex {}", id, v))
                })?;
                EmbeddingEdge::Edge(offset)
            }
            EmbeddingDesc::LonePair => EmbeddingEdge::LonePair,
            EmbeddingDesc::Radical => EmbeddingEdge::Radical,
        });
    }
    if desc.embedding.is_empty() {
        embedding = core
            .out_edges(v)
            .enumerate()
            .filter(|(_, (e, _))| edge_membership[*e].in_side(side))
            .map(|(o, _)| EmbeddingEdge::Edge(o))
            .collect();
    }
    let fixation = if desc.fixed { Fixation::Simple } else { Fixation::Free };
    Configuration::new(desc.geometry, embedding, fixation)
}

impl<'de> Deserialize<'de> for Comparison {
    fn deserialize<D>(deserializer: D) -> Result<Self, <D as Deserializer<'de>>::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_seq(ComparisonVisitor)
    }
}

struct ComparisonVisitor;

impl<'de> Visitor<'de> for ComparisonVisitor {
    type Value = Comparison;

    fn expecting(&self, formatter: &mut Formatter) -> std::fmt::Result {
        formatter.write_str("a sequence of an operator designator followed by a count")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, <A as SeqAccess<'de>>::Error>
    where
        A: SeqAccess<'de>,
    {
        let designation: String = seq
            .next_element()?
            .ok_or_else(|| <A as SeqAccess<'de>>::Error::custom("Missing designator"))?;
        let operator = Operator::from_designator(&designation).ok_or_else(|| {
            <A as SeqAccess<'de>>::Error::custom(Error::UnknownDesignator(designation.clone()))
        })?;
        let value: usize = seq
            .next_element()?
            .ok_or_else(|| <A as SeqAccess<'de>>::Error::custom("Missing value"))?;
        Ok(Comparison { operator, value })
    }
}
