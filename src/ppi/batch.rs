//! Fixed-shape batches of padded subgraphs

use ndarray::{s, Array2, Array3, Axis};

use super::split::Subgraph;
use crate::error::{Error, Result};
use crate::graph::{adj_to_bias, SparseGraph};

/// Padded tensors for every subgraph of one split
///
/// Row `k` holds subgraph `k`; its first `num_nodes[k]` slots are real nodes
/// in ascending original order, the rest is padding.
#[derive(Debug, Clone, PartialEq)]
pub struct PaddedBatch {
    adjacency: Array3<f64>,
    features: Array3<f64>,
    labels: Array3<f64>,
    num_nodes: Vec<usize>,
    mask: Array2<f64>,
}

impl PaddedBatch {
    /// Number of subgraphs
    pub fn len(&self) -> usize {
        self.num_nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.num_nodes.is_empty()
    }

    /// Padded node count of every row
    pub fn max_nodes(&self) -> usize {
        self.mask.ncols()
    }

    pub fn num_features(&self) -> usize {
        self.features.len_of(Axis(2))
    }

    pub fn num_classes(&self) -> usize {
        self.labels.len_of(Axis(2))
    }

    /// `[k, maxN, maxN]`, identity on padding
    pub fn adjacency(&self) -> &Array3<f64> {
        &self.adjacency
    }

    /// `[k, maxN, F]`
    pub fn features(&self) -> &Array3<f64> {
        &self.features
    }

    /// `[k, maxN, C]`
    pub fn labels(&self) -> &Array3<f64> {
        &self.labels
    }

    pub fn num_nodes(&self) -> &[usize] {
        &self.num_nodes
    }

    /// `[k, maxN]`, 1.0 on real nodes
    pub fn mask(&self) -> &Array2<f64> {
        &self.mask
    }

    /// Features and labels of the real nodes of row `index`
    pub fn unpad(&self, index: usize) -> Result<(Array2<f64>, Array2<f64>)> {
        if index >= self.len() {
            return Err(Error::dims("batch row bound", self.len(), index + 1));
        }
        let real: Vec<usize> = self
            .mask
            .row(index)
            .iter()
            .enumerate()
            .filter(|&(_, &m)| m > 0.0)
            .map(|(slot, _)| slot)
            .collect();

        let features = self.features.index_axis(Axis(0), index).select(Axis(0), &real);
        let labels = self.labels.index_axis(Axis(0), index).select(Axis(0), &real);
        Ok((features, labels))
    }

    /// Bias matrices for the dense attention heads
    pub fn bias(&self, nhood: usize) -> Result<Array3<f64>> {
        adj_to_bias(&self.adjacency, &self.num_nodes, nhood)
    }
}

/// Packs subgraphs into [`PaddedBatch`]es of a common width
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPacker {
    max_nodes: usize,
}

impl BatchPacker {
    pub fn new(max_nodes: usize) -> Self {
        Self { max_nodes }
    }

    /// Packer wide enough for the largest of `subgraphs`
    pub fn fitting(subgraphs: &[Subgraph]) -> Self {
        Self::new(subgraphs.iter().map(Subgraph::len).max().unwrap_or(0))
    }

    pub fn max_nodes(&self) -> usize {
        self.max_nodes
    }

    /// Gather the rows of `subgraphs` out of the full graph
    pub fn pack(
        &self,
        graph: &SparseGraph,
        features: &Array2<f64>,
        labels: &Array2<f64>,
        subgraphs: &[&Subgraph],
    ) -> Result<PaddedBatch> {
        let n = graph.num_nodes();
        if features.nrows() != n {
            return Err(Error::dims("feature rows", n, features.nrows()));
        }
        if labels.nrows() != n {
            return Err(Error::dims("label rows", n, labels.nrows()));
        }

        let k = subgraphs.len();
        let max_n = self.max_nodes;
        let mut adjacency = Array3::zeros((k, max_n, max_n));
        let mut feats = Array3::zeros((k, max_n, features.ncols()));
        let mut labs = Array3::zeros((k, max_n, labels.ncols()));
        let mut mask = Array2::zeros((k, max_n));
        let mut num_nodes = Vec::with_capacity(k);

        for (row, subgraph) in subgraphs.iter().enumerate() {
            let size = subgraph.len();
            if size > max_n {
                return Err(Error::dims("subgraph size within batch width", max_n, size));
            }
            if let Some(&node) = subgraph.nodes.iter().find(|&&node| node >= n) {
                return Err(Error::dims("subgraph node bound", n, node + 1));
            }

            let block = graph.subgraph(&subgraph.nodes).to_dense();
            adjacency.slice_mut(s![row, ..size, ..size]).assign(&block);
            for pad in size..max_n {
                adjacency[[row, pad, pad]] = 1.0;
            }

            for (slot, &node) in subgraph.nodes.iter().enumerate() {
                feats.slice_mut(s![row, slot, ..]).assign(&features.row(node));
                labs.slice_mut(s![row, slot, ..]).assign(&labels.row(node));
                mask[[row, slot]] = 1.0;
            }
            num_nodes.push(size);
        }

        Ok(PaddedBatch {
            adjacency,
            features: feats,
            labels: labs,
            num_nodes,
            mask,
        })
    }
}
