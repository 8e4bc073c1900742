// Labelled graphs: topology with stable indices, string/term labels and stereo data.

pub mod labelled;
pub mod serde;
pub mod stereo;
pub mod term;
pub mod topology;

pub use labelled::{LabelledGraph, LabelledView};
pub use topology::Topology;
