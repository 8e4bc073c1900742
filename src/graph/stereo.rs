//! Stereo information at the level needed to decide match compatibility: a geometry per
//! vertex, an ordered embedding of the incident edges and virtual entries, a fixation flag,
//! and a category per edge.

use crate::config::LabelRelation;
use crate::error::Error;
use crate::graph::topology::Topology;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum Geometry {
    Any,
    Linear,
    TrigonalPlanar,
    Tetrahedral,
}

impl Geometry {
    pub fn parent(self) -> Option<Geometry> {
        match self {
            Geometry::Any => None,
            _ => Some(Geometry::Any),
        }
    }

    /// Reflexive ancestor test in the geometry hierarchy.
    pub fn is_ancestor_of(self, other: Geometry) -> bool {
        let mut current = Some(other);
        while let Some(g) = current {
            if g == self {
                return true;
            }
            current = g.parent();
        }
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum EdgeCategory {
    Any,
    Undefined,
    Single,
    Double,
    Triple,
    Aromatic,
}

impl EdgeCategory {
    pub fn from_label(label: &str) -> Self {
        match label {
            "-" => EdgeCategory::Single,
            "=" => EdgeCategory::Double,
            "#" => EdgeCategory::Triple,
            ":" => EdgeCategory::Aromatic,
            _ => EdgeCategory::Undefined,
        }
    }

    pub fn matches(self, codomain: EdgeCategory, relation: LabelRelation) -> bool {
        match relation {
            LabelRelation::Isomorphism => self == codomain,
            LabelRelation::Specialisation => self == codomain || self == EdgeCategory::Any,
            LabelRelation::Unification => {
                self == codomain || self == EdgeCategory::Any || codomain == EdgeCategory::Any
            }
        }
    }
}

/// One position around a stereo centre.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum EmbeddingEdge {
    /// An incident edge, by its offset in the vertex's edge list.
    Edge(usize),
    LonePair,
    Radical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum Fixation {
    Free,
    Simple,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    pub geometry: Geometry,
    pub embedding: Vec<EmbeddingEdge>,
    pub fixation: Fixation,
    pub num_lone_pairs: usize,
    pub has_radical: bool,
}

/// Even permutations of four embedding positions.
const TETRAHEDRAL_GOOD: [[usize; 4]; 12] = [
    [0, 1, 2, 3],
    [0, 2, 3, 1],
    [0, 3, 1, 2],
    [1, 0, 3, 2],
    [1, 2, 0, 3],
    [1, 3, 2, 0],
    [2, 0, 1, 3],
    [2, 1, 3, 0],
    [2, 3, 0, 1],
    [3, 0, 2, 1],
    [3, 1, 0, 2],
    [3, 2, 1, 0],
];

impl Configuration {
    /// No stereo information beyond the incident edges.
    pub fn any(degree: usize) -> Self {
        Self {
            geometry: Geometry::Any,
            embedding: (0..degree).map(EmbeddingEdge::Edge).collect(),
            fixation: Fixation::Free,
            num_lone_pairs: 0,
            has_radical: false,
        }
    }

    pub fn tetrahedral(embedding: Vec<EmbeddingEdge>, fixation: Fixation) -> Result<Self, Error> {
        Self::new(Geometry::Tetrahedral, embedding, fixation)
    }

    pub fn new(
        geometry: Geometry,
        embedding: Vec<EmbeddingEdge>,
        fixation: Fixation,
    ) -> Result<Self, Error> {
        if geometry == Geometry::Tetrahedral && embedding.len() != 4 {
            return Err(Error::InvalidStereo(format!(
                "tetrahedral needs 4 embedding entries, got {}",
                embedding.len()
            )));
        }
        let num_lone_pairs = embedding
            .iter()
            .filter(|e| **e == EmbeddingEdge::LonePair)
            .count();
        let radicals = embedding
            .iter()
            .filter(|e| **e == EmbeddingEdge::Radical)
            .count();
        if radicals > 1 {
            return Err(Error::InvalidStereo("more than one radical".to_string()));
        }
        let mut seen = vec![];
        for e in &embedding {
            if let EmbeddingEdge::Edge(offset) = e {
                if seen.contains(offset) {
                    return Err(Error::InvalidStereo(format!("offset {} repeated", offset)));
                }
                seen.push(*offset);
            }
        }
        if fixation == Fixation::Simple && geometry != Geometry::Tetrahedral {
            return Err(Error::InvalidStereo(format!(
                "{:?} can not be fixed",
                geometry
            )));
        }
        Ok(Self {
            geometry,
            embedding,
            fixation,
            num_lone_pairs,
            has_radical: radicals == 1,
        })
    }

    pub fn edge_offsets(&self) -> impl Iterator<Item = usize> + '_ {
        self.embedding.iter().filter_map(|e| match e {
            EmbeddingEdge::Edge(offset) => Some(*offset),
            _ => None,
        })
    }

    fn local_geometry_ok(&self, other: &Configuration, relation: LabelRelation) -> bool {
        match relation {
            LabelRelation::Isomorphism => self.geometry == other.geometry,
            LabelRelation::Specialisation => self.geometry.is_ancestor_of(other.geometry),
            LabelRelation::Unification => {
                self.geometry.is_ancestor_of(other.geometry)
                    || other.geometry.is_ancestor_of(self.geometry)
            }
        }
    }

    /// Vertex-local compatibility, checked before the neighbourhood is known.
    pub fn local_match(&self, other: &Configuration, relation: LabelRelation) -> bool {
        if !self.local_geometry_ok(other, relation) {
            return false;
        }
        if self.geometry != other.geometry {
            // A more general geometry says nothing about the rest.
            return true;
        }
        if self.num_lone_pairs != other.num_lone_pairs || self.has_radical != other.has_radical {
            return false;
        }
        if self.geometry != Geometry::Tetrahedral {
            return true;
        }
        match relation {
            LabelRelation::Isomorphism => self.fixation == other.fixation,
            LabelRelation::Specialisation => {
                self.fixation == Fixation::Free || other.fixation == Fixation::Simple
            }
            LabelRelation::Unification => true,
        }
    }

    /// Both sides are fixed tetrahedral centres, so the neighbour order matters.
    pub fn needs_permutation_check(&self, other: &Configuration) -> bool {
        self.geometry == Geometry::Tetrahedral
            && other.geometry == Geometry::Tetrahedral
            && self.fixation == Fixation::Simple
            && other.fixation == Fixation::Simple
    }

    /// Check a permutation from domain embedding positions to codomain embedding positions.
    pub fn morphism_ok(&self, other: &Configuration, permutation: &[usize]) -> bool {
        if !self.needs_permutation_check(other) {
            return true;
        }
        if permutation.len() != 4 {
            return false;
        }
        let p = [permutation[0], permutation[1], permutation[2], permutation[3]];
        TETRAHEDRAL_GOOD.binary_search(&p).is_ok()
    }

    /// Build the permutation of embedding positions induced by a vertex map.
    ///
    /// `edge_image(domain_offset)` gives the codomain offset of the image of the domain edge
    /// at that offset. Virtual entries are paired in order of appearance.
    pub fn make_permutation<F>(&self, other: &Configuration, edge_image: F) -> Option<Vec<usize>>
    where
        F: Fn(usize) -> Option<usize>,
    {
        if self.embedding.len() != other.embedding.len() {
            return None;
        }
        let mut used = vec![false; other.embedding.len()];
        let mut permutation = Vec::with_capacity(self.embedding.len());
        for entry in &self.embedding {
            let target = match entry {
                EmbeddingEdge::Edge(offset) => {
                    let image = edge_image(*offset)?;
                    other
                        .embedding
                        .iter()
                        .position(|e| *e == EmbeddingEdge::Edge(image))?
                }
                virtual_entry => other
                    .embedding
                    .iter()
                    .enumerate()
                    .position(|(i, e)| !used[i] && e == virtual_entry)?,
            };
            if used[target] {
                return None;
            }
            used[target] = true;
            permutation.push(target);
        }
        Some(permutation)
    }
}

/// Copies configurations between graphs whose incident-edge order differs.
pub struct Cloner;

impl Cloner {
    /// Clone `configuration` of `src_vertex` in `src` onto `dst_vertex` in `dst`.
    /// `vertex_map` maps neighbours of the source vertex to vertices of `dst`. Returns `None`
    /// when an embedded edge has no counterpart.
    pub fn clone_configuration<F>(
        configuration: &Configuration,
        src: &Topology,
        src_vertex: usize,
        dst: &Topology,
        dst_vertex: usize,
        vertex_map: F,
    ) -> Option<Configuration>
    where
        F: Fn(usize) -> Option<usize>,
    {
        let mut offset_map = vec![None; src.vertex_degree(src_vertex)];
        for (offset_src, entry) in offset_map.iter_mut().enumerate() {
            let neighbour = src.neighbour_at(src_vertex, offset_src)?;
            if let Some(image) = vertex_map(neighbour) {
                *entry = dst.offset_of_neighbour(dst_vertex, image);
            }
        }
        let mut embedding = Vec::with_capacity(configuration.embedding.len());
        for entry in &configuration.embedding {
            embedding.push(match entry {
                EmbeddingEdge::Edge(offset) => EmbeddingEdge::Edge(offset_map.get(*offset).copied()??),
                other => *other,
            });
        }
        Some(Configuration {
            embedding,
            ..configuration.clone()
        })
    }
}
