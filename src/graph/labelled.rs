use crate::error::Error;
use crate::graph::stereo::{Configuration, EdgeCategory};
use crate::graph::term::{StringStore, Term};
use crate::graph::topology::Topology;
use rand::seq::SliceRandom;
use rand::Rng;

/// Read access to a labelled graph or to a filtered projection of one.
///
/// Indices are those of the underlying [`Topology`]; a view only decides which of them are
/// present. Everything the morphism search needs goes through this trait.
pub trait LabelledView {
    fn topology(&self) -> &Topology;
    fn has_vertex(&self, v: usize) -> bool;
    fn has_edge(&self, e: usize) -> bool;
    fn vertex_label(&self, v: usize) -> &str;
    fn edge_label(&self, e: usize) -> &str;
    fn vertex_term(&self, v: usize) -> Option<&Term>;
    fn edge_term(&self, e: usize) -> Option<&Term>;
    /// False when term labels were requested but failed to parse.
    fn terms_valid(&self) -> bool;
    fn has_stereo(&self) -> bool;
    fn vertex_stereo(&self, v: usize) -> Option<&Configuration>;
    fn edge_category(&self, e: usize) -> Option<EdgeCategory>;

    fn vertex_bound(&self) -> usize {
        self.topology().num_vertices()
    }

    fn vertices(&self) -> Box<dyn Iterator<Item = usize> + '_> {
        Box::new((0..self.vertex_bound()).filter(move |&v| self.has_vertex(v)))
    }

    fn edges(&self) -> Box<dyn Iterator<Item = usize> + '_> {
        Box::new((0..self.topology().num_edges()).filter(move |&e| self.has_edge(e)))
    }

    /// `(edge, neighbour)` pairs present in the view, in offset order.
    fn out_edges(&self, v: usize) -> Box<dyn Iterator<Item = (usize, usize)> + '_> {
        Box::new(
            self.topology()
                .out_edges(v)
                .filter(move |&(e, _)| self.has_edge(e)),
        )
    }

    fn degree(&self, v: usize) -> usize {
        self.out_edges(v).count()
    }

    fn edge_between(&self, u: usize, v: usize) -> Option<usize> {
        self.topology()
            .edge_between(u, v)
            .filter(|&e| self.has_edge(e))
    }

    fn num_vertices(&self) -> usize {
        self.vertices().count()
    }

    fn num_edges(&self) -> usize {
        self.edges().count()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropString {
    pub vertices: Vec<String>,
    pub edges: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropTerm {
    pub vertices: Vec<Option<Term>>,
    pub edges: Vec<Option<Term>>,
    /// First parse failure, if any. A graph with an error has no term matches.
    pub error: Option<Error>,
}

impl PropTerm {
    pub fn parse(labels: &PropString, store: &mut StringStore) -> Self {
        let mut error = None;
        let mut parse_all = |labels: &[String]| -> Vec<Option<Term>> {
            labels
                .iter()
                .map(|label| match Term::parse(label, store) {
                    Ok(t) => Some(t),
                    Err(e) => {
                        log::debug!("{}", e);
                        error.get_or_insert(e);
                        None
                    }
                })
                .collect()
        };
        let vertices = parse_all(&labels.vertices);
        let edges = parse_all(&labels.edges);
        Self {
            vertices,
            edges,
            error,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropStereo {
    pub vertices: Vec<Configuration>,
    pub edges: Vec<EdgeCategory>,
}

/// A graph with a string label on every vertex and edge, optionally parsed term labels and
/// optionally stereo information.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelledGraph {
    name: String,
    topology: Topology,
    labels: PropString,
    terms: Option<PropTerm>,
    stereo: Option<PropStereo>,
}

impl LabelledGraph {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            topology: Topology::new(),
            labels: PropString::default(),
            terms: None,
            stereo: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    pub fn add_vertex(&mut self, label: &str) -> usize {
        let v = self.topology.add_vertex();
        self.labels.vertices.push(label.to_string());
        if let Some(terms) = self.terms.as_mut() {
            terms.vertices.push(None);
            terms.error.get_or_insert(Error::InvalidGraph(
                "vertex added after term parsing".to_string(),
            ));
        }
        if let Some(stereo) = self.stereo.as_mut() {
            stereo.vertices.push(Configuration::any(0));
        }
        v
    }

    pub fn add_edge(&mut self, source: usize, target: usize, label: &str) -> Result<usize, Error> {
        let e = self.topology.add_edge(source, target)?;
        self.labels.edges.push(label.to_string());
        if let Some(terms) = self.terms.as_mut() {
            terms.edges.push(None);
            terms.error.get_or_insert(Error::InvalidGraph(
                "edge added after term parsing".to_string(),
            ));
        }
        if let Some(stereo) = self.stereo.as_mut() {
            stereo.edges.push(EdgeCategory::from_label(label));
            for v in &[source, target] {
                let degree = self.topology.vertex_degree(*v);
                let cfg = &mut stereo.vertices[*v];
                if cfg.geometry == crate::graph::stereo::Geometry::Any {
                    *cfg = Configuration::any(degree);
                }
            }
        }
        Ok(e)
    }

    /// Parse every label as a term. Failures are recorded, not returned.
    pub fn parse_terms(&mut self, store: &mut StringStore) -> &mut Self {
        self.terms = Some(PropTerm::parse(&self.labels, store));
        self
    }

    /// Declare stereo information, starting from unconstrained configurations and edge
    /// categories derived from the edge labels.
    pub fn enable_stereo(&mut self) -> &mut Self {
        let vertices = (0..self.topology.num_vertices())
            .map(|v| Configuration::any(self.topology.vertex_degree(v)))
            .collect();
        let edges = self
            .labels
            .edges
            .iter()
            .map(|l| EdgeCategory::from_label(l))
            .collect();
        self.stereo = Some(PropStereo { vertices, edges });
        self
    }

    pub fn set_configuration(&mut self, v: usize, configuration: Configuration) -> Result<(), Error> {
        if v >= self.topology.num_vertices() {
            return Err(Error::UnknownVertex(v));
        }
        let degree = self.topology.vertex_degree(v);
        if configuration.edge_offsets().any(|o| o >= degree)
            || configuration.edge_offsets().count() != degree
        {
            return Err(Error::InvalidStereo(format!(
                "configuration of vertex {} does not cover its {} edges",
                v, degree
            )));
        }
        if self.stereo.is_none() {
            self.enable_stereo();
        }
        if let Some(stereo) = self.stereo.as_mut() {
            stereo.vertices[v] = configuration;
        }
        Ok(())
    }

    pub fn set_edge_category(&mut self, e: usize, category: EdgeCategory) -> Result<(), Error> {
        if e >= self.topology.num_edges() {
            return Err(Error::InvalidGraph(format!("unknown edge {}", e)));
        }
        if self.stereo.is_none() {
            self.enable_stereo();
        }
        if let Some(stereo) = self.stereo.as_mut() {
            stereo.edges[e] = category;
        }
        Ok(())
    }

    pub fn labels(&self) -> &PropString {
        &self.labels
    }

    pub fn terms(&self) -> Option<&PropTerm> {
        self.terms.as_ref()
    }

    pub fn stereo(&self) -> Option<&PropStereo> {
        self.stereo.as_ref()
    }

    /// Every property table must cover exactly the graph's index space.
    pub fn check_invariants(&self) {
        let (nv, ne) = (self.topology.num_vertices(), self.topology.num_edges());
        assert_eq!(self.labels.vertices.len(), nv, "vertex label table out of sync");
        assert_eq!(self.labels.edges.len(), ne, "edge label table out of sync");
        if let Some(terms) = &self.terms {
            assert_eq!(terms.vertices.len(), nv, "vertex term table out of sync");
            assert_eq!(terms.edges.len(), ne, "edge term table out of sync");
        }
        if let Some(stereo) = &self.stereo {
            assert_eq!(stereo.vertices.len(), nv, "vertex stereo table out of sync");
            assert_eq!(stereo.edges.len(), ne, "edge stereo table out of sync");
        }
    }

    /// A copy with vertices and edges renumbered at random. Returns the copy and the map from
    /// old to new vertex indices.
    pub fn permuted<R: Rng>(&self, rng: &mut R) -> (LabelledGraph, Vec<usize>) {
        let n = self.topology.num_vertices();
        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(rng);
        let mut new_index = vec![0; n];
        for (new, &old) in order.iter().enumerate() {
            new_index[old] = new;
        }
        let mut edge_order: Vec<usize> = (0..self.topology.num_edges()).collect();
        edge_order.shuffle(rng);

        let mut result = LabelledGraph::new(&self.name);
        for &old in &order {
            result.add_vertex(&self.labels.vertices[old]);
        }
        for &e in &edge_order {
            let (s, t) = self.topology.endpoints(e);
            // Endpoints are distinct and the source graph is simple.
            if let Err(err) = result.add_edge(new_index[s], new_index[t], &self.labels.edges[e]) {
                panic!("permuting a valid graph failed: {}", err);
            }
        }
        if let Some(terms) = &self.terms {
            let mut vertices = vec![None; n];
            for (old, t) in terms.vertices.iter().enumerate() {
                vertices[new_index[old]] = t.clone();
            }
            let mut edges = vec![None; edge_order.len()];
            for (new, &old) in edge_order.iter().enumerate() {
                edges[new] = terms.edges[old].clone();
            }
            result.terms = Some(PropTerm {
                vertices,
                edges,
                error: terms.error.clone(),
            });
        }
        if let Some(stereo) = &self.stereo {
            result.enable_stereo();
            for (new_e, &old_e) in edge_order.iter().enumerate() {
                if let Some(rs) = result.stereo.as_mut() {
                    rs.edges[new_e] = stereo.edges[old_e];
                }
            }
            for old in 0..n {
                let cloned = crate::graph::stereo::Cloner::clone_configuration(
                    &stereo.vertices[old],
                    &self.topology,
                    old,
                    &result.topology,
                    new_index[old],
                    |u| Some(new_index[u]),
                );
                if let (Some(cfg), Some(rs)) = (cloned, result.stereo.as_mut()) {
                    rs.vertices[new_index[old]] = cfg;
                }
            }
        }
        result.check_invariants();
        (result, new_index)
    }
}

impl AsRef<Topology> for LabelledGraph {
    fn as_ref(&self) -> &Topology {
        &self.topology
    }
}

impl LabelledView for LabelledGraph {
    fn topology(&self) -> &Topology {
        &self.topology
    }

    fn has_vertex(&self, v: usize) -> bool {
        v < self.topology.num_vertices()
    }

    fn has_edge(&self, e: usize) -> bool {
        e < self.topology.num_edges()
    }

    fn vertex_label(&self, v: usize) -> &str {
        &self.labels.vertices[v]
    }

    fn edge_label(&self, e: usize) -> &str {
        &self.labels.edges[e]
    }

    fn vertex_term(&self, v: usize) -> Option<&Term> {
        self.terms.as_ref().and_then(|t| t.vertices[v].as_ref())
    }

    fn edge_term(&self, e: usize) -> Option<&Term> {
        self.terms.as_ref().and_then(|t| t.edges[e].as_ref())
    }

    fn terms_valid(&self) -> bool {
        self.terms.as_ref().map_or(false, PropTerm::is_valid)
    }

    fn has_stereo(&self) -> bool {
        self.stereo.is_some()
    }

    fn vertex_stereo(&self, v: usize) -> Option<&Configuration> {
        self.stereo.as_ref().map(|s| &s.vertices[v])
    }

    fn edge_category(&self, e: usize) -> Option<EdgeCategory> {
        self.stereo.as_ref().map(|s| s.edges[e])
    }

    fn vertex_bound(&self) -> usize {
        self.topology.num_vertices()
    }

    fn num_vertices(&self) -> usize {
        self.topology.num_vertices()
    }

    fn num_edges(&self) -> usize {
        self.topology.num_edges()
    }
}
