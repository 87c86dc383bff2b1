//! Graph Convolutional Network
//!
//! Implements: H' = σ(D^(-1/2) (A + I) D^(-1/2) H W + b)

use ndarray::{Array1, Array2};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::gat::ops::{dropout, log_softmax_rows};
use crate::graph::SparseGraph;

/// Graph Convolutional Layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ConvParts")]
pub struct GraphConvLayer {
    weight: Array2<f64>,
    bias: Array1<f64>,
}

#[derive(Deserialize)]
struct ConvParts {
    weight: Array2<f64>,
    bias: Array1<f64>,
}

impl TryFrom<ConvParts> for GraphConvLayer {
    type Error = Error;

    fn try_from(parts: ConvParts) -> Result<Self> {
        Self::from_weights(parts.weight, parts.bias)
    }
}

impl GraphConvLayer {
    /// Create a new GCN layer with Glorot-uniform weights and zero bias
    pub fn new(in_features: usize, out_features: usize) -> Self {
        let mut rng = rand::thread_rng();
        let scale = (6.0 / (in_features + out_features) as f64).sqrt();
        let weight =
            Array2::from_shape_fn((in_features, out_features), |_| rng.gen_range(-scale..scale));

        Self {
            weight,
            bias: Array1::zeros(out_features),
        }
    }

    /// Create from explicit weights
    pub fn from_weights(weight: Array2<f64>, bias: Array1<f64>) -> Result<Self> {
        if bias.len() != weight.ncols() {
            return Err(Error::dims("GCN bias width", weight.ncols(), bias.len()));
        }
        Ok(Self { weight, bias })
    }

    pub fn in_features(&self) -> usize {
        self.weight.nrows()
    }

    pub fn out_features(&self) -> usize {
        self.weight.ncols()
    }

    pub fn num_parameters(&self) -> usize {
        self.weight.len() + self.bias.len()
    }

    /// Forward pass
    ///
    /// `propagation` is the normalised adjacency from [`SparseGraph::gcn_normalize`].
    pub fn forward(&self, x: &Array2<f64>, propagation: &SparseGraph) -> Result<Array2<f64>> {
        if x.ncols() != self.in_features() {
            return Err(Error::dims("GCN input features", self.in_features(), x.ncols()));
        }
        Ok(propagation.spmm(&x.dot(&self.weight))? + &self.bias)
    }
}

/// Two-layer GCN for node classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GcnParts")]
pub struct Gcn {
    conv1: GraphConvLayer,
    conv2: GraphConvLayer,
    dropout: f64,
}

#[derive(Deserialize)]
struct GcnParts {
    conv1: GraphConvLayer,
    conv2: GraphConvLayer,
    dropout: f64,
}

impl TryFrom<GcnParts> for Gcn {
    type Error = Error;

    fn try_from(parts: GcnParts) -> Result<Self> {
        Self::from_layers(parts.conv1, parts.conv2, parts.dropout)
    }
}

impl Gcn {
    /// Hidden width used by the reference architecture
    pub const DEFAULT_HIDDEN: usize = 16;

    /// Create a new GCN: `in_features -> hidden -> n_classes`
    pub fn new(in_features: usize, hidden: usize, n_classes: usize, dropout: f64) -> Result<Self> {
        Self::from_layers(
            GraphConvLayer::new(in_features, hidden),
            GraphConvLayer::new(hidden, n_classes),
            dropout,
        )
    }

    /// Build from explicit layers
    pub fn from_layers(conv1: GraphConvLayer, conv2: GraphConvLayer, dropout: f64) -> Result<Self> {
        if !(0.0..1.0).contains(&dropout) {
            return Err(Error::ConfigError(format!("dropout must be in [0, 1), got {}", dropout)));
        }
        if conv1.out_features() != conv2.in_features() {
            return Err(Error::dims("GCN layer chaining", conv1.out_features(), conv2.in_features()));
        }
        Ok(Self {
            conv1,
            conv2,
            dropout,
        })
    }

    /// Forward pass, returns per-node log-probabilities
    pub fn forward(&self, x: &Array2<f64>, propagation: &SparseGraph, training: bool) -> Result<Array2<f64>> {
        let mut h = self.conv1.forward(x, propagation)?.mapv_into(|v| v.max(0.0));
        if training {
            dropout(h.iter_mut(), self.dropout);
        }
        let logits = self.conv2.forward(&h, propagation)?;
        Ok(log_softmax_rows(&logits))
    }

    /// Get number of parameters
    pub fn num_parameters(&self) -> usize {
        self.conv1.num_parameters() + self.conv2.num_parameters()
    }
}
