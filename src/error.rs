use std::fmt;

/// Failures caused by malformed input. Contract violations panic instead.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// A label could not be parsed as a term.
    TermParse { label: String, message: String },
    /// The graph or rule was marked invalid when it was built.
    InvalidGraph(String),
    UnknownVertex(usize),
    DuplicateEdge(usize, usize),
    SelfLoop(usize),
    /// An edge has a membership its endpoints can not carry.
    MembershipMismatch { edge: (usize, usize), message: String },
    /// Two fused elements carry labels that can not be reconciled.
    LabelConflict { left: String, right: String },
    InvalidStereo(String),
    UnknownDesignator(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::TermParse { label, message } => {
                write!(f, "could not parse '{}' as a term: {}", label, message)
            }
            Error::InvalidGraph(message) => write!(f, "invalid graph: {}", message),
            Error::UnknownVertex(v) => write!(f, "unknown vertex {}", v),
            Error::DuplicateEdge(u, v) => write!(f, "duplicate edge ({}, {})", u, v),
            Error::SelfLoop(v) => write!(f, "self loop on vertex {}", v),
            Error::MembershipMismatch { edge, message } => {
                write!(f, "edge ({}, {}): {}", edge.0, edge.1, message)
            }
            Error::LabelConflict { left, right } => {
                write!(f, "conflicting labels '{}' and '{}'", left, right)
            }
            Error::InvalidStereo(message) => write!(f, "invalid stereo data: {}", message),
            Error::UnknownDesignator(d) => write!(f, "unknown designator {:?}", d),
        }
    }
}

impl std::error::Error for Error {}

impl From<gamma::graph::Error> for Error {
    fn from(e: gamma::graph::Error) -> Self {
        match e {
            gamma::graph::Error::MissingNode(id) => Error::UnknownVertex(id),
            other => Error::InvalidGraph(format!("{:?}", other)),
        }
    }
}
