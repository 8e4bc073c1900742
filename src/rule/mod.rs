// DPO rules over one core graph: membership of each element, side views, composition.

pub mod compose;
pub mod graph_to_rule;
pub mod labelled_rule;
pub mod serde;

pub use compose::{compose, Composition};
pub use graph_to_rule::{bind, identity, unbind};
pub use labelled_rule::{LabelledRule, Membership, RuleBuilder, Side, SideView};
