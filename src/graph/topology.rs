use crate::error::Error as GraphError;
use gamma::graph::{Error, Graph};
use std::collections::VecDeque;

/// Undirected simple graph with stable vertex and edge indices.
///
/// Each vertex keeps its incident edges in insertion order. The position of an edge in that
/// list is its *offset*, which stereo configurations use to refer to neighbours.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Topology {
    nodes: Vec<usize>,
    edges: Vec<(usize, usize)>,
    /// Neighbours of each vertex, in offset order.
    adjacency: Vec<Vec<usize>>,
    /// Incident edge indices of each vertex, parallel to `adjacency`.
    incidence: Vec<Vec<usize>>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_vertex(&mut self) -> usize {
        let id = self.nodes.len();
        self.nodes.push(id);
        self.adjacency.push(vec![]);
        self.incidence.push(vec![]);
        id
    }

    pub fn add_edge(&mut self, source: usize, target: usize) -> Result<usize, GraphError> {
        for v in &[source, target] {
            if *v >= self.nodes.len() {
                return Err(GraphError::UnknownVertex(*v));
            }
        }
        if source == target {
            return Err(GraphError::SelfLoop(source));
        }
        if self.edge_between(source, target).is_some() {
            return Err(GraphError::DuplicateEdge(source, target));
        }
        let id = self.edges.len();
        self.edges.push((source, target));
        self.adjacency[source].push(target);
        self.incidence[source].push(id);
        self.adjacency[target].push(source);
        self.incidence[target].push(id);
        Ok(id)
    }

    pub fn num_vertices(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn endpoints(&self, edge: usize) -> (usize, usize) {
        self.edges[edge]
    }

    /// The endpoint of `edge` that is not `v`.
    pub fn opposite(&self, edge: usize, v: usize) -> usize {
        let (s, t) = self.edges[edge];
        if s == v {
            t
        } else {
            s
        }
    }

    /// `(edge, neighbour)` pairs of `v` in offset order.
    pub fn out_edges(&self, v: usize) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.incidence[v]
            .iter()
            .copied()
            .zip(self.adjacency[v].iter().copied())
    }

    pub fn neighbour_at(&self, v: usize, offset: usize) -> Option<usize> {
        self.adjacency[v].get(offset).copied()
    }

    pub fn offset_of_neighbour(&self, v: usize, neighbour: usize) -> Option<usize> {
        self.adjacency[v].iter().position(|&n| n == neighbour)
    }

    pub fn offset_of_edge(&self, v: usize, edge: usize) -> Option<usize> {
        self.incidence[v].iter().position(|&e| e == edge)
    }

    pub fn edge_between(&self, u: usize, v: usize) -> Option<usize> {
        let (a, b) = if self.adjacency[u].len() <= self.adjacency[v].len() {
            (u, v)
        } else {
            (v, u)
        };
        self.adjacency[a]
            .iter()
            .position(|&n| n == b)
            .map(|offset| self.incidence[a][offset])
    }

    pub fn vertex_degree(&self, v: usize) -> usize {
        self.adjacency[v].len()
    }
}

impl Graph for Topology {
    fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn order(&self) -> usize {
        self.nodes.len()
    }

    fn size(&self) -> usize {
        self.edges.len()
    }

    fn nodes<'a>(&'a self) -> Box<dyn Iterator<Item = &'a usize> + 'a> {
        Box::new(self.nodes.iter())
    }

    fn neighbors<'a>(
        &'a self,
        id: usize,
    ) -> Result<Box<dyn Iterator<Item = &'a usize> + 'a>, Error> {
        let neighbors = self.adjacency.get(id).ok_or(Error::MissingNode(id))?;
        Ok(Box::new(neighbors.iter()))
    }

    fn has_node(&self, id: usize) -> bool {
        id < self.nodes.len()
    }

    fn degree(&self, id: usize) -> Result<usize, Error> {
        let neighbors = self.adjacency.get(id).ok_or(Error::MissingNode(id))?;
        Ok(neighbors.len())
    }

    fn edges<'a>(&'a self) -> Box<dyn Iterator<Item = &'a (usize, usize)> + 'a> {
        Box::new(self.edges.iter())
    }

    fn has_edge(&self, sid: usize, tid: usize) -> Result<bool, Error> {
        if !self.has_node(sid) {
            return Err(Error::MissingNode(sid));
        }
        if !self.has_node(tid) {
            return Err(Error::MissingNode(tid));
        }
        Ok(self.edge_between(sid, tid).is_some())
    }
}

/// Label vertices by connected component. Vertices rejected by `vertex_filter` get `None`,
/// edges rejected by `edge_filter` are not followed. Components are numbered in order of
/// their smallest vertex.
pub fn connected_components<G, VF, EF>(
    graph: &G,
    vertex_filter: VF,
    edge_filter: EF,
) -> (Vec<Option<usize>>, usize)
where
    G: AsRef<Topology>,
    VF: Fn(usize) -> bool,
    EF: Fn(usize) -> bool,
{
    let topology = graph.as_ref();
    let mut component = vec![None; topology.num_vertices()];
    let mut count = 0;
    let mut queue = VecDeque::new();
    for start in 0..topology.num_vertices() {
        if component[start].is_some() || !vertex_filter(start) {
            continue;
        }
        component[start] = Some(count);
        queue.push_back(start);
        while let Some(v) = queue.pop_front() {
            for (e, n) in topology.out_edges(v) {
                if component[n].is_none() && edge_filter(e) && vertex_filter(n) {
                    component[n] = Some(count);
                    queue.push_back(n);
                }
            }
        }
        count += 1;
    }
    (component, count)
}

impl AsRef<Topology> for Topology {
    fn as_ref(&self) -> &Topology {
        self
    }
}

/// Unweighted shortest path length, `None` when `target` is unreachable.
pub fn shortest_path<G: Graph>(graph: &G, source: usize, target: usize) -> Result<Option<usize>, Error> {
    if !graph.has_node(source) {
        return Err(Error::MissingNode(source));
    }
    if source == target {
        return Ok(Some(0));
    }
    let mut distance = std::collections::HashMap::new();
    distance.insert(source, 0usize);
    let mut queue = VecDeque::new();
    queue.push_back(source);
    while let Some(v) = queue.pop_front() {
        let d = distance[&v];
        for &n in graph.neighbors(v)? {
            if distance.contains_key(&n) {
                continue;
            }
            if n == target {
                return Ok(Some(d + 1));
            }
            distance.insert(n, d + 1);
            queue.push_back(n);
        }
    }
    Ok(None)
}
