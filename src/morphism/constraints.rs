use crate::config::{LabelSettings, LabelType};
use crate::graph::term::{Owner, StringStore, Substitution, Term};
use crate::graph::topology::shortest_path;
use crate::graph::LabelledView;
use crate::morphism::vertex_map::{InvertibleVertexMap, VertexMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Equal,
    Less,
    Greater,
    LessOrEqual,
    GreaterOrEqual,
}

impl Operator {
    pub fn check(self, value: usize, bound: usize) -> bool {
        match self {
            Self::Equal => value == bound,
            Self::Less => value < bound,
            Self::Greater => value > bound,
            Self::LessOrEqual => value <= bound,
            Self::GreaterOrEqual => value >= bound,
        }
    }

    /// `None` is an infinite value.
    pub fn check_distance(self, value: Option<usize>, bound: usize) -> bool {
        match value {
            Some(value) => self.check(value, bound),
            None => matches!(self, Self::Greater | Self::GreaterOrEqual),
        }
    }

    pub fn designator(self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::Less => "<",
            Self::Greater => ">",
            Self::LessOrEqual => "<=",
            Self::GreaterOrEqual => ">=",
        }
    }

    pub fn from_designator(designator: &str) -> Option<Self> {
        match designator {
            "=" | "eq" => Some(Self::Equal),
            "<" | "lt" => Some(Self::Less),
            ">" | "gt" => Some(Self::Greater),
            "<=" | "lte" => Some(Self::LessOrEqual),
            ">=" | "gte" => Some(Self::GreaterOrEqual),
            _ => None,
        }
    }
}

/// An operator with its right-hand side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Comparison {
    pub operator: Operator,
    pub value: usize,
}

/// Counts the neighbours of the image of `vertex`. Empty label lists accept any label.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexAdjacency {
    pub vertex: usize,
    pub vertex_labels: Vec<String>,
    pub edge_labels: Vec<String>,
    pub comparison: Comparison,
}

/// Distance in the codomain between the images of two vertices.
#[derive(Debug, Clone, PartialEq)]
pub struct ShortestPath {
    pub source: usize,
    pub target: usize,
    pub comparison: Comparison,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    VertexAdjacency(VertexAdjacency),
    ShortestPath(ShortestPath),
}

fn label_filter_match(filter: &[String], label: &str, term: Option<&Term>, settings: LabelSettings) -> bool {
    if filter.is_empty() {
        return true;
    }
    match settings.label_type {
        LabelType::String => filter.iter().any(|f| f == label),
        LabelType::Term => {
            let term = match term {
                Some(t) => t,
                None => return false,
            };
            let mut store = StringStore::new();
            filter.iter().any(|f| {
                let pattern = match Term::parse(f, &mut store) {
                    Ok(p) => p,
                    Err(_) => return false,
                };
                let mut substitution = Substitution::new();
                if !substitution.unify((Owner::Domain, &pattern), (Owner::Codomain, term)) {
                    return false;
                }
                let (mut dv, mut cv) = (vec![], vec![]);
                pattern.variables(&mut dv);
                term.variables(&mut cv);
                substitution.satisfies(settings.relation, &dv, &cv)
            })
        }
    }
}

impl Constraint {
    /// Domain vertices the constraint refers to.
    pub fn vertices(&self) -> Vec<usize> {
        match self {
            Constraint::VertexAdjacency(c) => vec![c.vertex],
            Constraint::ShortestPath(c) => vec![c.source, c.target],
        }
    }

    /// The same constraint on renumbered vertices, or `None` if a vertex has no image.
    pub fn remapped<F: Fn(usize) -> Option<usize>>(&self, f: F) -> Option<Constraint> {
        Some(match self {
            Constraint::VertexAdjacency(c) => Constraint::VertexAdjacency(VertexAdjacency {
                vertex: f(c.vertex)?,
                ..c.clone()
            }),
            Constraint::ShortestPath(c) => Constraint::ShortestPath(ShortestPath {
                source: f(c.source)?,
                target: f(c.target)?,
                comparison: c.comparison,
            }),
        })
    }

    /// Whether `map` into `codomain` satisfies the constraint. Unmapped vertices make an
    /// adjacency constraint hold and a distance infinite.
    pub fn matches<M, C>(&self, map: &M, codomain: &C, settings: LabelSettings) -> bool
    where
        M: VertexMap + ?Sized,
        C: LabelledView + ?Sized,
    {
        match self {
            Constraint::VertexAdjacency(c) => {
                let image = match map.get(c.vertex) {
                    Some(w) => w,
                    None => return true,
                };
                let count = codomain
                    .out_edges(image)
                    .filter(|&(e, n)| {
                        label_filter_match(&c.vertex_labels, codomain.vertex_label(n), codomain.vertex_term(n), settings)
                            && label_filter_match(&c.edge_labels, codomain.edge_label(e), codomain.edge_term(e), settings)
                    })
                    .count();
                c.comparison.operator.check(count, c.comparison.value)
            }
            Constraint::ShortestPath(c) => {
                let distance = match (map.get(c.source), map.get(c.target)) {
                    (Some(s), Some(t)) => match shortest_path(codomain.topology(), s, t) {
                        Ok(d) => d,
                        Err(e) => {
                            log::warn!("shortest path between {} and {}: {:?}", s, t, e);
                            None
                        }
                    },
                    _ => None,
                };
                c.comparison.operator.check_distance(distance, c.comparison.value)
            }
        }
    }
}

/// Check every constraint in order, stopping at the first failure.
pub fn constraints_hold<M, C>(constraints: &[Constraint], map: &M, codomain: &C, settings: LabelSettings) -> bool
where
    M: VertexMap + ?Sized,
    C: LabelledView + ?Sized,
{
    constraints.iter().all(|c| c.matches(map, codomain, settings))
}

/// Wrap a match callback so that maps failing a constraint are skipped. A rejected map
/// reports `true` so the search continues.
pub fn checked<'a, C, F>(
    constraints: &'a [Constraint],
    codomain: &'a C,
    settings: LabelSettings,
    mut next: F,
) -> impl FnMut(&InvertibleVertexMap) -> bool + 'a
where
    C: LabelledView + ?Sized,
    F: FnMut(&InvertibleVertexMap) -> bool + 'a,
{
    move |m| {
        if !constraints_hold(constraints, m, codomain, settings) {
            log::trace!("constraint rejects {:?}", m.pairs());
            return true;
        }
        next(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::labelled::tests::graph;
    use crate::morphism::label::LabelMatcher;
    use crate::morphism::vf2::{find_morphisms, Mode};
    use ntest::timeout;

    fn comparison(operator: Operator, value: usize) -> Comparison {
        Comparison { operator, value }
    }

    #[test]
    fn test_operators() {
        assert!(Operator::LessOrEqual.check(1, 1));
        assert!(!Operator::Less.check(1, 1));
        assert!(Operator::GreaterOrEqual.check_distance(None, 4));
        assert!(!Operator::Equal.check_distance(None, 4));
        assert_eq!(Operator::from_designator("lte"), Some(Operator::LessOrEqual));
        assert_eq!(Operator::from_designator(">="), Some(Operator::GreaterOrEqual));
        assert_eq!(Operator::from_designator("~"), None);
        assert_eq!(Operator::Greater.designator(), ">");
    }

    #[test]
    fn test_vertex_adjacency() {
        // Carbon with three hydrogens and one oxygen.
        let g = graph(
            "methanol",
            &["C", "H", "H", "H", "O"],
            &[(0, 1, "-"), (0, 2, "-"), (0, 3, "-"), (0, 4, "-")],
        );
        let mut map = InvertibleVertexMap::new(2, 5);
        map.put(0, 0);
        let settings = LabelSettings::string_iso();
        let hydrogens = Constraint::VertexAdjacency(VertexAdjacency {
            vertex: 0,
            vertex_labels: vec!["H".to_string()],
            edge_labels: vec![],
            comparison: comparison(Operator::Equal, 3),
        });
        assert!(hydrogens.matches(&map, &g, settings));
        let double = Constraint::VertexAdjacency(VertexAdjacency {
            vertex: 0,
            vertex_labels: vec![],
            edge_labels: vec!["=".to_string()],
            comparison: comparison(Operator::Greater, 0),
        });
        assert!(!double.matches(&map, &g, settings));
        // Vertex 1 is unmapped.
        let unmapped = Constraint::VertexAdjacency(VertexAdjacency {
            vertex: 1,
            vertex_labels: vec![],
            edge_labels: vec![],
            comparison: comparison(Operator::Equal, 100),
        });
        assert!(unmapped.matches(&map, &g, settings));
    }

    #[test]
    #[timeout(1000)]
    fn test_shortest_path_rejects_distant_pairs() {
        let pattern = graph("2C", &["C", "O"], &[]);
        // C and O are three edges apart in every host.
        let host = graph("host", &["C", "N", "N", "O"], &[(0, 1, "-"), (1, 2, "-"), (2, 3, "-")]);
        let settings = LabelSettings::string_iso();
        let near = vec![Constraint::ShortestPath(ShortestPath {
            source: 0,
            target: 1,
            comparison: comparison(Operator::LessOrEqual, 1),
        })];
        let mut found = 0;
        find_morphisms(
            &pattern,
            &host,
            LabelMatcher::new(&pattern, &host, settings),
            Mode::Monomorphism,
            checked(&near, &host, settings, |_| {
                found += 1;
                true
            }),
        );
        assert_eq!(found, 0);

        let far = vec![Constraint::ShortestPath(ShortestPath {
            source: 0,
            target: 1,
            comparison: comparison(Operator::Equal, 3),
        })];
        let mut found = 0;
        find_morphisms(
            &pattern,
            &host,
            LabelMatcher::new(&pattern, &host, settings),
            Mode::Monomorphism,
            checked(&far, &host, settings, |_| {
                found += 1;
                true
            }),
        );
        assert_eq!(found, 1);
    }

    #[test]
    fn test_remapped() {
        let c = Constraint::ShortestPath(ShortestPath {
            source: 0,
            target: 2,
            comparison: comparison(Operator::Less, 2),
        });
        let r = c.remapped(|v| Some(v + 10)).unwrap();
        assert_eq!(r.vertices(), vec![10, 12]);
        assert!(c.remapped(|v| if v == 2 { None } else { Some(v) }).is_none());
    }
}
