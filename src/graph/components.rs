//! Connected components
//!
//! Depth-first labelling with an explicit stack, so chains of any length
//! are handled without growing the call stack.

use super::SparseGraph;
use crate::error::{Error, Result};

const UNVISITED: usize = usize::MAX;

/// Label every node with the id of its connected component
///
/// Ids are dense, starting at 0, in order of the lowest node index of each
/// component. Edges are followed as stored; pass a symmetric graph to get
/// undirected components.
pub fn connected_components(graph: &SparseGraph) -> Vec<usize> {
    let n = graph.num_nodes();
    let mut component = vec![UNVISITED; n];
    let mut stack = Vec::new();
    let mut next_id = 0;

    for start in 0..n {
        if component[start] != UNVISITED {
            continue;
        }

        component[start] = next_id;
        stack.push(start);

        while let Some(node) = stack.pop() {
            for &neighbor in graph.neighbors(node) {
                if component[neighbor] == UNVISITED {
                    component[neighbor] = next_id;
                    stack.push(neighbor);
                }
            }
        }

        next_id += 1;
    }

    component
}

/// Number of distinct labels in a dense labelling
pub fn num_components(labels: &[usize]) -> usize {
    labels.iter().max().map_or(0, |&max| max + 1)
}

/// Sizes of each component, indexed by component id
pub fn component_sizes(labels: &[usize]) -> Vec<usize> {
    let mut sizes = vec![0; num_components(labels)];
    for &label in labels {
        sizes[label] += 1;
    }
    sizes
}

/// Check that no edge joins two differently labelled nodes
pub fn check_isolation(graph: &SparseGraph, labels: &[usize]) -> Result<()> {
    if labels.len() != graph.num_nodes() {
        return Err(Error::dims("node labels", graph.num_nodes(), labels.len()));
    }

    match graph.edges().find(|&(i, j, _)| labels[i] != labels[j]) {
        Some((from, to, _)) => Err(Error::CrossComponentEdge {
            from,
            to,
            from_group: labels[from],
            to_group: labels[to],
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;
    use std::collections::HashMap;

    fn undirected(n: usize, pairs: &[(usize, usize)]) -> SparseGraph {
        let edges: Vec<(usize, usize, f64)> = pairs
            .iter()
            .flat_map(|&(a, b)| [(a, b, 1.0), (b, a, 1.0)])
            .collect();
        SparseGraph::from_edges(n, &edges).unwrap()
    }

    #[test]
    fn test_two_triangles() {
        let graph = undirected(6, &[(0, 1), (1, 2), (2, 0), (3, 4), (4, 5), (5, 3)]);
        let labels = connected_components(&graph);

        assert_eq!(num_components(&labels), 2);
        assert_eq!(component_sizes(&labels), vec![3, 3]);
        assert_eq!(labels[0], labels[2]);
        assert_ne!(labels[0], labels[3]);
        assert!(check_isolation(&graph, &labels).is_ok());
    }

    #[test]
    fn test_isolated_nodes_get_own_ids() {
        let graph = undirected(4, &[(1, 2)]);
        let labels = connected_components(&graph);
        assert_eq!(labels, vec![0, 1, 1, 2]);
    }

    #[test]
    fn test_long_chain_does_not_overflow() {
        let n = 200_000;
        let pairs: Vec<(usize, usize)> = (0..n - 1).map(|i| (i, i + 1)).collect();
        let graph = undirected(n, &pairs);

        let labels = connected_components(&graph);
        assert_eq!(num_components(&labels), 1);
    }

    #[test]
    fn test_permutation_invariance() {
        let pairs = [(0, 1), (1, 2), (3, 4), (5, 6), (6, 7), (7, 5), (8, 8)];
        let n = 10;
        let labels = connected_components(&undirected(n, &pairs));

        let mut perm: Vec<usize> = (0..n).collect();
        perm.shuffle(&mut rand::rngs::StdRng::seed_from_u64(7));
        let permuted: Vec<(usize, usize)> = pairs.iter().map(|&(a, b)| (perm[a], perm[b])).collect();
        let permuted_labels = connected_components(&undirected(n, &permuted));

        // labels must agree up to a bijective renaming
        let mut forward = HashMap::new();
        let mut backward = HashMap::new();
        for node in 0..n {
            let a = labels[node];
            let b = permuted_labels[perm[node]];
            assert_eq!(*forward.entry(a).or_insert(b), b);
            assert_eq!(*backward.entry(b).or_insert(a), a);
        }
    }

    #[test]
    fn test_cross_component_edge_detected() {
        let graph = undirected(4, &[(0, 1), (2, 3), (1, 2)]);
        let labels = vec![0, 0, 1, 1];

        let err = check_isolation(&graph, &labels).unwrap_err();
        assert!(matches!(err, Error::CrossComponentEdge { from: 1, to: 2, .. }));
    }
}
