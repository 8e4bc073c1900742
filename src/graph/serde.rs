use crate::error::Error;
use crate::graph::labelled::LabelledGraph;
use crate::graph::stereo::{Configuration, EdgeCategory, EmbeddingEdge, Fixation, Geometry};
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Deserialize)]
pub struct VertexDesc {
    /// Identify the vertex within the description. Need not be contiguous.
    pub id: usize,
    pub label: String,
    #[serde(default)]
    pub stereo: Option<StereoDesc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EdgeDesc {
    pub source: usize,
    pub target: usize,
    pub label: String,
    /// Overrides the category derived from the label.
    #[serde(default)]
    pub category: Option<EdgeCategory>,
}

/// Stereo annotation of a vertex. Embedding entries refer to neighbours by description id.
#[derive(Debug, Clone, Deserialize)]
pub struct StereoDesc {
    pub geometry: Geometry,
    #[serde(default)]
    pub embedding: Vec<EmbeddingDesc>,
    #[serde(default)]
    pub fixed: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingDesc {
    Neighbour(usize),
    LonePair,
    Radical,
}

/// Plain description of a graph, e.g. read from YAML.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphDesc {
    pub name: String,
    pub vertices: Vec<VertexDesc>,
    #[serde(default)]
    pub edges: Vec<EdgeDesc>,
}

impl GraphDesc {
    pub fn build(&self) -> Result<LabelledGraph, Error> {
        let mut graph = LabelledGraph::new(&self.name);
        let mut index = HashMap::new();
        for v in &self.vertices {
            if index.insert(v.id, graph.add_vertex(&v.label)).is_some() {
                return Err(Error::InvalidGraph(format!("vertex id {} used twice", v.id)));
            }
        }
        let lookup = |id: usize| index.get(&id).copied().ok_or(Error::UnknownVertex(id));
        let mut categories = vec![];
        for e in &self.edges {
            let edge = graph.add_edge(lookup(e.source)?, lookup(e.target)?, &e.label)?;
            if let Some(c) = e.category {
                categories.push((edge, c));
            }
        }
        let annotated: Vec<&VertexDesc> = self.vertices.iter().filter(|v| v.stereo.is_some()).collect();
        if annotated.is_empty() && categories.is_empty() {
            return Ok(graph);
        }
        graph.enable_stereo();
        for (edge, category) in categories {
            graph.set_edge_category(edge, category)?;
        }
        for v in annotated {
            let vertex = lookup(v.id)?;
            if let Some(desc) = &v.stereo {
                let configuration = desc.to_configuration(&graph, vertex, &lookup)?;
                graph.set_configuration(vertex, configuration)?;
            }
        }
        Ok(graph)
    }
}

impl StereoDesc {
    fn to_configuration<F>(&self, graph: &LabelledGraph, vertex: usize, lookup: &F) -> Result<Configuration, Error>
    where
        F: Fn(usize) -> Result<usize, Error>,
    {
        use crate::graph::labelled::LabelledView;
        let mut embedding = vec![];
        for entry in &self.embedding {
            embedding.push(match entry {
                EmbeddingDesc::Neighbour(id) => {
                    let n = lookup(*id)?;
                    let offset = graph.topology().offset_of_neighbour(vertex, n).ok_or_else(|| {
                        Error::InvalidStereo(format!("{} is not a neighbour of vertex {}", id, vertex))
                    })?;
                    EmbeddingEdge::Edge(offset)
                }
                EmbeddingDesc::LonePair => EmbeddingEdge::LonePair,
                EmbeddingDesc::Radical => EmbeddingEdge::Radical,
            });
        }
        if self.embedding.is_empty() {
            embedding = (0..graph.degree(vertex)).map(EmbeddingEdge::Edge).collect();
        }
        let fixation = if self.fixed { Fixation::Simple } else { Fixation::Free };
        Configuration::new(self.geometry, embedding, fixation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::labelled::LabelledView;

    #[test]
    fn test_de_graph() {
        let desc: GraphDesc = serde_yaml::from_str(
            r#"
name: ethane
vertices:
  - {id: 10, label: C}
  - {id: 20, label: C}
edges:
  - {source: 10, target: 20, label: "-"}"#,
        )
        .unwrap();
        let g = desc.build().unwrap();
        assert_eq!(g.name(), "ethane");
        assert_eq!(g.num_vertices(), 2);
        assert_eq!(g.edge_label(0), "-");
        assert!(!g.has_stereo());
    }

    #[test]
    fn test_de_graph_with_stereo() {
        let desc: GraphDesc = serde_yaml::from_str(
            r#"
name: centre
vertices:
  - {id: 0, label: C, stereo: {geometry: Tetrahedral, fixed: true, embedding: [{neighbour: 1}, {neighbour: 2}, {neighbour: 3}, lonepair]}}
  - {id: 1, label: H}
  - {id: 2, label: F}
  - {id: 3, label: Cl}
edges:
  - {source: 0, target: 3, label: "-"}
  - {source: 0, target: 1, label: "-"}
  - {source: 0, target: 2, label: "-", category: Any}"#,
        )
        .unwrap();
        let g = desc.build().unwrap();
        let cfg = g.vertex_stereo(0).unwrap();
        assert_eq!(
            cfg.embedding,
            vec![EmbeddingEdge::Edge(1), EmbeddingEdge::Edge(2), EmbeddingEdge::Edge(0), EmbeddingEdge::LonePair]
        );
        assert_eq!(cfg.fixation, Fixation::Simple);
        assert_eq!(g.edge_category(2), Some(EdgeCategory::Any));
    }

    #[test]
    fn test_de_graph_errors() {
        let desc: GraphDesc = serde_yaml::from_str(
            r#"
name: broken
vertices: [{id: 0, label: C}]
edges: [{source: 0, target: 5, label: "-"}]"#,
        )
        .unwrap();
        assert_eq!(desc.build(), Err(Error::UnknownVertex(5)));
    }
}
