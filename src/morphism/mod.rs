// Morphism search between labelled views: vertex maps, label predicates, VF2 search,
// common subgraphs, match constraints and symmetry groups.

pub mod common_subgraph;
pub mod constraints;
pub mod label;
pub mod order;
pub mod symmetry;
pub mod vertex_map;
pub mod vf2;

pub use constraints::Constraint;
pub use label::{LabelMatcher, MatchPredicate, Pinned};
pub use vertex_map::{InvertibleMap, InvertibleVertexMap, VectorVertexMap, VertexMap};
pub use vf2::Mode;
