use crate::graph::LabelledView;
use std::collections::HashMap;

/// Order the vertices of `graph` for the search: sort by degree, count how many vertices
/// share each degree, then sort by `(frequency, degree)`. Rare degrees come first, which
/// prunes early. The sorts are stable so ties keep index order.
pub fn vertex_order_by_mult<G: LabelledView + ?Sized>(graph: &G) -> Vec<usize> {
    let mut order: Vec<usize> = graph.vertices().collect();
    let degree: HashMap<usize, usize> = order.iter().map(|&v| (v, graph.degree(v))).collect();
    order.sort_by_key(|v| degree[v]);
    let mut frequency: HashMap<usize, usize> = HashMap::new();
    for v in &order {
        *frequency.entry(degree[v]).or_insert(0) += 1;
    }
    order.sort_by_key(|v| (frequency[&degree[v]], degree[v]));
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::labelled::tests::graph;

    #[test]
    fn test_rare_degrees_first() {
        // A star with centre 0 and a tail: 0-1, 0-2, 0-3, 3-4.
        let g = graph("g", &["C"; 5], &[(0, 1, "-"), (0, 2, "-"), (0, 3, "-"), (3, 4, "-")]);
        // Degrees: 0:3, 1:1, 2:1, 3:2, 4:1. Degree 3 and 2 occur once, degree 1 three times.
        assert_eq!(vertex_order_by_mult(&g), vec![3, 0, 1, 2, 4]);
    }

    #[test]
    fn test_empty_graph() {
        let g = graph("empty", &[], &[]);
        assert!(vertex_order_by_mult(&g).is_empty());
    }
}
