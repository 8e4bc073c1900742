// Applying rules to pools of host graphs: per-component matches, assembly, products.

pub mod canon_match;
pub mod component_match_db;
pub mod derivation;
pub mod partial_match;

pub use component_match_db::{ComponentMatch, ComponentMatchDb};
pub use derivation::{find_isomorphic, products, Derivation};
pub use partial_match::PartialMatch;
