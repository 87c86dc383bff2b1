//! Graph Attention Layer implementation
//!
//! A layer runs several independent heads on the same input and either
//! concatenates their outputs (hidden layers) or averages them (output layer).

use ndarray::{concatenate, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use super::attention::{AttentionHead, HeadConfig};
use super::sparse::SparseAttentionHead;
use crate::error::{Error, Result};
use crate::graph::SparseGraph;

/// A single attention head usable inside a [`GraphAttentionLayer`]
pub trait AttentionKernel {
    /// Graph structure consumed by the head
    type Graph: ?Sized;

    fn forward(&self, x: &Array2<f64>, graph: &Self::Graph, training: bool) -> Result<Array2<f64>>;

    fn in_features(&self) -> usize;

    fn out_features(&self) -> usize;

    fn num_parameters(&self) -> usize;
}

impl AttentionKernel for AttentionHead {
    /// Dense `[N, N]` bias matrix
    type Graph = Array2<f64>;

    fn forward(&self, x: &Array2<f64>, bias: &Array2<f64>, training: bool) -> Result<Array2<f64>> {
        AttentionHead::forward(self, x, bias, training)
    }

    fn in_features(&self) -> usize {
        self.params().in_features()
    }

    fn out_features(&self) -> usize {
        self.params().out_features()
    }

    fn num_parameters(&self) -> usize {
        self.params().num_parameters()
    }
}

impl AttentionKernel for SparseAttentionHead {
    type Graph = SparseGraph;

    fn forward(&self, x: &Array2<f64>, adj: &SparseGraph, training: bool) -> Result<Array2<f64>> {
        SparseAttentionHead::forward(self, x, adj, training)
    }

    fn in_features(&self) -> usize {
        self.params().in_features()
    }

    fn out_features(&self) -> usize {
        self.params().out_features()
    }

    fn num_parameters(&self) -> usize {
        self.params().num_parameters()
    }
}

/// How head outputs are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeadAggregation {
    /// Stack head outputs along the feature axis
    Concat,
    /// Element-wise mean of head outputs
    Mean,
}

/// Graph Attention Layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphAttentionLayer<H> {
    heads: Vec<H>,
    aggregation: HeadAggregation,
}

impl<H: AttentionKernel> GraphAttentionLayer<H> {
    /// Build from already constructed heads
    ///
    /// All heads must share input and output widths.
    pub fn from_heads(heads: Vec<H>, aggregation: HeadAggregation) -> Result<Self> {
        let first = heads
            .first()
            .ok_or_else(|| Error::ConfigError("attention layer needs at least one head".into()))?;
        let (in_dim, out_dim) = (first.in_features(), first.out_features());

        for head in &heads {
            if head.in_features() != in_dim {
                return Err(Error::dims("head input width", in_dim, head.in_features()));
            }
            if head.out_features() != out_dim {
                return Err(Error::dims("head output width", out_dim, head.out_features()));
            }
        }

        Ok(Self { heads, aggregation })
    }

    /// Re-run the construction checks, for layers that bypassed [`Self::from_heads`]
    pub(crate) fn into_checked(self) -> Result<Self> {
        Self::from_heads(self.heads, self.aggregation)
    }

    /// Forward pass
    pub fn forward(&self, x: &Array2<f64>, graph: &H::Graph, training: bool) -> Result<Array2<f64>> {
        let outputs = self
            .heads
            .iter()
            .map(|head| head.forward(x, graph, training))
            .collect::<Result<Vec<_>>>()?;

        match self.aggregation {
            HeadAggregation::Concat => {
                let views: Vec<ArrayView2<f64>> = outputs.iter().map(|o| o.view()).collect();
                concatenate(Axis(1), &views)
                    .map_err(|_| Error::ConfigError("head outputs disagree in shape".into()))
            }
            HeadAggregation::Mean => {
                let mut sum = Array2::zeros((x.nrows(), self.head_dim()));
                for out in &outputs {
                    sum += out;
                }
                Ok(sum / self.heads.len() as f64)
            }
        }
    }

    pub fn heads(&self) -> &[H] {
        &self.heads
    }

    pub fn num_heads(&self) -> usize {
        self.heads.len()
    }

    pub fn aggregation(&self) -> HeadAggregation {
        self.aggregation
    }

    pub fn input_dim(&self) -> usize {
        self.heads[0].in_features()
    }

    /// Output width of a single head
    pub fn head_dim(&self) -> usize {
        self.heads[0].out_features()
    }

    /// Output width of the layer
    pub fn output_dim(&self) -> usize {
        match self.aggregation {
            HeadAggregation::Concat => self.head_dim() * self.heads.len(),
            HeadAggregation::Mean => self.head_dim(),
        }
    }

    /// Get number of parameters
    pub fn num_parameters(&self) -> usize {
        self.heads.iter().map(|h| h.num_parameters()).sum()
    }
}

impl GraphAttentionLayer<AttentionHead> {
    /// Randomly initialised dense layer
    pub fn dense(
        in_features: usize,
        out_features: usize,
        num_heads: usize,
        aggregation: HeadAggregation,
        config: HeadConfig,
    ) -> Result<Self> {
        let heads = (0..num_heads)
            .map(|_| AttentionHead::new(in_features, out_features, config))
            .collect();
        Self::from_heads(heads, aggregation)
    }

    /// Attention weights averaged over heads, for inspection
    pub fn attention_weights(&self, x: &Array2<f64>, bias: &Array2<f64>) -> Result<Array2<f64>> {
        let n = x.nrows();
        let mut avg = Array2::zeros((n, n));
        for head in &self.heads {
            avg += &head.attention_coefficients(x, bias)?;
        }
        Ok(avg / self.heads.len() as f64)
    }
}

impl GraphAttentionLayer<SparseAttentionHead> {
    /// Randomly initialised sparse layer for graphs of `n_nodes` nodes
    pub fn sparse(
        in_features: usize,
        out_features: usize,
        n_nodes: usize,
        num_heads: usize,
        aggregation: HeadAggregation,
        config: HeadConfig,
    ) -> Result<Self> {
        let heads = (0..num_heads)
            .map(|_| SparseAttentionHead::new(in_features, out_features, n_nodes, config))
            .collect();
        Self::from_heads(heads, aggregation)
    }

    /// Attention weights averaged over heads, same sparsity as `adj`
    pub fn attention_weights(&self, x: &Array2<f64>, adj: &SparseGraph) -> Result<SparseGraph> {
        let mut avg = vec![0.0; adj.num_edges()];
        for head in &self.heads {
            let coefs = head.attention_coefficients(x, adj)?;
            for (acc, &v) in avg.iter_mut().zip(coefs.values()) {
                *acc += v;
            }
        }
        let k = self.heads.len() as f64;
        adj.with_values(avg.into_iter().map(|v| v / k).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::adj_to_bias_single;
    use ndarray_rand::rand_distr::Uniform;
    use ndarray_rand::RandomExt;

    fn chain_adjacency(n: usize) -> Array2<f64> {
        let mut adj = Array2::zeros((n, n));
        for i in 0..n - 1 {
            adj[[i, i + 1]] = 1.0;
            adj[[i + 1, i]] = 1.0;
        }
        adj
    }

    #[test]
    fn test_layer_concat() {
        let n = 5;
        let layer =
            GraphAttentionLayer::dense(10, 8, 2, HeadAggregation::Concat, HeadConfig::default())
                .unwrap();
        let x = Array2::random((n, 10), Uniform::new(-1.0, 1.0));
        let bias = adj_to_bias_single(&chain_adjacency(n), 1).unwrap();

        let output = layer.forward(&x, &bias, false).unwrap();

        assert_eq!(output.dim(), (n, 16));
        assert_eq!(layer.output_dim(), 16);
    }

    #[test]
    fn test_layer_averaging() {
        let n = 5;
        let layer =
            GraphAttentionLayer::dense(10, 8, 3, HeadAggregation::Mean, HeadConfig::default())
                .unwrap();
        let x = Array2::random((n, 10), Uniform::new(-1.0, 1.0));
        let bias = adj_to_bias_single(&chain_adjacency(n), 1).unwrap();

        let output = layer.forward(&x, &bias, false).unwrap();

        assert_eq!(output.dim(), (n, 8));
    }

    #[test]
    fn test_attention_weights() {
        let n = 5;
        let layer =
            GraphAttentionLayer::dense(10, 8, 2, HeadAggregation::Concat, HeadConfig::default())
                .unwrap();
        let x = Array2::random((n, 10), Uniform::new(-1.0, 1.0));
        let bias = adj_to_bias_single(&chain_adjacency(n), 1).unwrap();

        let attention = layer.attention_weights(&x, &bias).unwrap();

        for i in 0..n {
            assert!((attention.row(i).sum() - 1.0).abs() < 1e-10);
        }
        assert_eq!(attention[[0, 4]], 0.0);
    }

    #[test]
    fn test_sparse_attention_weights() {
        let n = 4;
        let adj = SparseGraph::from_dense(&chain_adjacency(n)).unwrap().add_self_loops(1.0);
        let layer = GraphAttentionLayer::sparse(
            3,
            2,
            n,
            4,
            HeadAggregation::Concat,
            HeadConfig::default(),
        )
        .unwrap();
        let x = Array2::random((n, 3), Uniform::new(-1.0, 1.0));

        let weights = layer.attention_weights(&x, &adj).unwrap();
        for i in 0..n {
            let sum: f64 = weights.edge_weights(i).iter().sum();
            assert!((sum - 1.0).abs() < 1e-10);
        }
        assert_eq!(layer.forward(&x, &adj, false).unwrap().dim(), (n, 8));
    }

    #[test]
    fn test_empty_layer_rejected() {
        let heads: Vec<AttentionHead> = Vec::new();
        assert!(GraphAttentionLayer::from_heads(heads, HeadAggregation::Mean).is_err());
    }

    #[test]
    fn test_mismatched_heads_rejected() {
        let heads = vec![
            AttentionHead::new(4, 2, HeadConfig::default()),
            AttentionHead::new(4, 3, HeadConfig::default()),
        ];
        assert!(GraphAttentionLayer::from_heads(heads, HeadAggregation::Concat).is_err());
    }
}
