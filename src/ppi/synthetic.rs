//! Synthetic PPI-shaped datasets for demos and tests

use ndarray::Array2;
use ndarray_rand::rand_distr::{Bernoulli, Uniform};
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::loader::PpiDataset;
use super::split::{NodeFlags, Split};
use crate::error::{Error, Result};
use crate::graph::SparseGraph;

impl PpiDataset {
    /// Disjoint graphs of the given sizes and splits, laid out consecutively
    ///
    /// Each graph is a ring (a single edge for two nodes) plus a few random
    /// chords. Features are uniform in `[-1, 1)`, labels are fair coin flips.
    pub fn synthetic(
        tissues: &[(usize, Split)],
        num_features: usize,
        num_classes: usize,
        seed: u64,
    ) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        let n: usize = tissues.iter().map(|&(size, _)| size).sum();

        let mut edges = Vec::new();
        let mut flags = Vec::with_capacity(n);
        let mut offset = 0;

        for &(size, split) in tissues {
            let mut link = |a: usize, b: usize| {
                edges.push((offset + a, offset + b, 1.0));
                edges.push((offset + b, offset + a, 1.0));
            };
            match size {
                0 | 1 => {}
                2 => link(0, 1),
                _ => {
                    for i in 0..size {
                        link(i, (i + 1) % size);
                    }
                    for _ in 0..size / 4 {
                        let a = rng.gen_range(0..size);
                        let b = rng.gen_range(0..size);
                        if a != b {
                            link(a, b);
                        }
                    }
                }
            }

            let node_flags = NodeFlags::new(split == Split::Val, split == Split::Test);
            flags.extend(std::iter::repeat(node_flags).take(size));
            offset += size;
        }

        let graph = SparseGraph::from_edges(n, &edges)?;
        let features = Array2::random_using((n, num_features), Uniform::new(-1.0, 1.0), &mut rng);
        let coin = Bernoulli::new(0.5).map_err(|e| Error::DataError(e.to_string()))?;
        let labels = Array2::random_using((n, num_classes), coin, &mut rng)
            .mapv(|b: bool| if b { 1.0 } else { 0.0 });

        Self::new(graph, features, labels, flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{component_sizes, connected_components};

    #[test]
    fn test_synthetic_layout() {
        let tissues = [(5, Split::Train), (2, Split::Val), (4, Split::Test)];
        let dataset = PpiDataset::synthetic(&tissues, 3, 2, 1).unwrap();

        assert_eq!(dataset.num_nodes(), 11);
        assert_eq!(dataset.features.dim(), (11, 3));
        assert!(dataset.graph.is_symmetric());

        let components = connected_components(&dataset.graph);
        assert_eq!(component_sizes(&components), vec![5, 2, 4]);
        assert_eq!(dataset.flags[6], NodeFlags::new(true, false));
        assert!(dataset.labels.iter().all(|&v| v == 0.0 || v == 1.0));
    }
}
