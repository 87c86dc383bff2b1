//! Sparse attention head
//!
//! Scores only the stored entries of the adjacency, so memory and time grow
//! with the number of edges instead of `N^2`.

use ndarray::Array2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::attention::{HeadConfig, HeadParams};
use super::ops::{dropout, leaky_relu};
use crate::error::{Error, Result};
use crate::graph::SparseGraph;

/// Single attention head over a sparse adjacency matrix
///
/// Works on one graph at a time; the node count is fixed at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseAttentionHead {
    params: HeadParams,
    config: HeadConfig,
    n_nodes: usize,
}

impl SparseAttentionHead {
    /// Create a new randomly initialised sparse head
    pub fn new(in_features: usize, out_features: usize, n_nodes: usize, config: HeadConfig) -> Self {
        Self::with_rng(in_features, out_features, n_nodes, config, &mut rand::thread_rng())
    }

    /// Create with a caller-supplied random generator
    pub fn with_rng<R: Rng>(
        in_features: usize,
        out_features: usize,
        n_nodes: usize,
        config: HeadConfig,
        rng: &mut R,
    ) -> Self {
        Self {
            params: HeadParams::init(in_features, out_features, rng),
            config,
            n_nodes,
        }
    }

    /// Create from existing parameters
    pub fn from_params(params: HeadParams, n_nodes: usize, config: HeadConfig) -> Self {
        Self {
            params,
            config,
            n_nodes,
        }
    }

    pub fn params(&self) -> &HeadParams {
        &self.params
    }

    pub fn n_nodes(&self) -> usize {
        self.n_nodes
    }

    fn check_graph(&self, x: &Array2<f64>, adj: &SparseGraph) -> Result<()> {
        self.params.check_input(x)?;
        if x.nrows() != self.n_nodes {
            return Err(Error::dims("sparse head node count", self.n_nodes, x.nrows()));
        }
        if adj.num_nodes() != self.n_nodes {
            return Err(Error::dims("sparse adjacency size", self.n_nodes, adj.num_nodes()));
        }
        Ok(())
    }

    /// Coefficients over the adjacency support, stored in CSR row order
    ///
    /// The logit of a stored entry `a_ij` is `a_ij * f1[i] + a_ij * f2[j]`;
    /// the softmax runs over each row's stored entries only.
    fn coefficients(&self, seq: &Array2<f64>, adj: &SparseGraph) -> Vec<f64> {
        let (f1, f2) = self.params.scores(seq);
        let slope = self.config.negative_slope;
        let mut coefs = Vec::with_capacity(adj.num_edges());

        for i in 0..adj.num_nodes() {
            let start = coefs.len();
            coefs.extend(
                adj.neighbors(i)
                    .iter()
                    .zip(adj.edge_weights(i))
                    .map(|(&j, &a)| leaky_relu(a * f1[i] + a * f2[j], slope)),
            );

            let row = &mut coefs[start..];
            if row.is_empty() {
                continue;
            }
            let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            row.iter_mut().for_each(|v| *v = (*v - max).exp());
            let sum: f64 = row.iter().sum();
            row.iter_mut().for_each(|v| *v /= sum);
        }

        coefs
    }

    /// Attention coefficients in inference mode, same sparsity as `adj`
    pub fn attention_coefficients(&self, x: &Array2<f64>, adj: &SparseGraph) -> Result<SparseGraph> {
        self.check_graph(x, adj)?;
        let coefs = self.coefficients(&self.params.project(x), adj);
        adj.with_values(coefs)
    }

    /// Forward pass: `x` is `[N, F_in]`, output is `[N, F_out]`
    pub fn forward(&self, x: &Array2<f64>, adj: &SparseGraph, training: bool) -> Result<Array2<f64>> {
        self.check_graph(x, adj)?;

        let mut x = x.clone();
        if training {
            dropout(x.iter_mut(), self.config.in_drop);
        }

        let mut seq = self.params.project(&x);
        let mut coefs = self.coefficients(&seq, adj);

        if training {
            dropout(coefs.iter_mut(), self.config.coef_drop);
            dropout(seq.iter_mut(), self.config.coef_drop);
        }

        let mut vals = adj.with_values(coefs)?.spmm(&seq)?;
        if self.config.residual {
            vals = self.params.add_residual(vals, &x);
        }

        Ok(self.config.activation.apply(vals))
    }
}
