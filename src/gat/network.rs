//! Graph Attention Network
//!
//! Multi-layer GAT: concatenating hidden layers followed by an averaging
//! output layer that produces one logit per class.

use ndarray::{Array2, Array3, Axis};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::attention::{AttentionHead, HeadConfig, DEFAULT_NEGATIVE_SLOPE};
use super::layer::{AttentionKernel, GraphAttentionLayer, HeadAggregation};
use super::ops::Activation;
use super::sparse::SparseAttentionHead;
use crate::error::{Error, Result};

/// Architecture and regularisation of a GAT model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatConfig {
    /// Output width of each head in every hidden layer
    pub hid_units: Vec<usize>,
    /// Heads per hidden layer, plus the output layer head count last
    pub n_heads: Vec<usize>,
    /// Input dropout rate of every head
    pub in_drop: f64,
    /// Coefficient dropout rate of every head
    pub coef_drop: f64,
    /// Residual connections in hidden and output layers
    pub residual: bool,
    /// Negative slope of the logit LeakyReLU
    pub negative_slope: f64,
}

impl Default for GatConfig {
    /// Inductive PPI setup: two 4-head layers of 256 units, 6 output heads
    fn default() -> Self {
        Self {
            hid_units: vec![256, 256],
            n_heads: vec![4, 4, 6],
            in_drop: 0.0,
            coef_drop: 0.0,
            residual: true,
            negative_slope: DEFAULT_NEGATIVE_SLOPE,
        }
    }
}

impl GatConfig {
    /// Transductive citation-network setup (Cora-style)
    pub fn citation() -> Self {
        Self {
            hid_units: vec![8],
            n_heads: vec![8, 1],
            in_drop: 0.6,
            coef_drop: 0.6,
            residual: false,
            negative_slope: DEFAULT_NEGATIVE_SLOPE,
        }
    }

    /// Check layer lists and rates
    pub fn validate(&self) -> Result<()> {
        if self.hid_units.is_empty() {
            return Err(Error::ConfigError("hid_units must not be empty".into()));
        }
        if self.n_heads.len() != self.hid_units.len() + 1 {
            return Err(Error::ConfigError(format!(
                "n_heads needs {} entries (one per hidden layer plus the output layer), got {}",
                self.hid_units.len() + 1,
                self.n_heads.len()
            )));
        }
        if self.hid_units.contains(&0) || self.n_heads.contains(&0) {
            return Err(Error::ConfigError("layer widths and head counts must be positive".into()));
        }
        for (name, rate) in [("in_drop", self.in_drop), ("coef_drop", self.coef_drop)] {
            if !(0.0..1.0).contains(&rate) {
                return Err(Error::ConfigError(format!("{} must be in [0, 1), got {}", name, rate)));
            }
        }
        if !self.negative_slope.is_finite() {
            return Err(Error::ConfigError("negative_slope must be finite".into()));
        }
        Ok(())
    }

    fn head_config(&self, residual: bool, activation: Activation) -> HeadConfig {
        HeadConfig {
            in_drop: self.in_drop,
            coef_drop: self.coef_drop,
            residual,
            negative_slope: self.negative_slope,
            activation,
        }
    }
}

/// Graph Attention Network over any head kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphAttentionNetwork<H> {
    /// Hidden layers followed by the output layer
    layers: Vec<GraphAttentionLayer<H>>,
}

/// Dense GAT driven by bias matrices
pub type Gat = GraphAttentionNetwork<AttentionHead>;

/// Sparse GAT driven by a CSR adjacency
pub type SpGat = GraphAttentionNetwork<SparseAttentionHead>;

impl<H: AttentionKernel> GraphAttentionNetwork<H> {
    /// Lay out the layers described by `config`
    ///
    /// The first layer has no residual connection; hidden layers use ELU heads
    /// and concatenate, the output layer uses linear heads and averages.
    fn assemble<F>(config: &GatConfig, input_dim: usize, n_classes: usize, mut make_head: F) -> Result<Self>
    where
        F: FnMut(usize, usize, HeadConfig) -> H,
    {
        config.validate()?;
        if input_dim == 0 || n_classes == 0 {
            return Err(Error::ConfigError("input and class dimensions must be positive".into()));
        }

        let mut layers = Vec::with_capacity(config.hid_units.len() + 1);
        let mut current_dim = input_dim;

        for (i, (&units, &heads)) in config.hid_units.iter().zip(&config.n_heads).enumerate() {
            let head_config = config.head_config(i > 0 && config.residual, Activation::Elu);
            let heads = (0..heads).map(|_| make_head(current_dim, units, head_config)).collect();
            layers.push(GraphAttentionLayer::from_heads(heads, HeadAggregation::Concat)?);
            current_dim = units * config.n_heads[i];
        }

        let out_heads = config.n_heads[config.hid_units.len()];
        let head_config = config.head_config(config.residual, Activation::Identity);
        let heads = (0..out_heads)
            .map(|_| make_head(current_dim, n_classes, head_config))
            .collect();
        layers.push(GraphAttentionLayer::from_heads(heads, HeadAggregation::Mean)?);

        Ok(Self { layers })
    }

    /// Build from explicit layers
    pub fn from_layers(layers: Vec<GraphAttentionLayer<H>>) -> Result<Self> {
        if layers.is_empty() {
            return Err(Error::ConfigError("network needs at least one layer".into()));
        }
        for pair in layers.windows(2) {
            if pair[0].output_dim() != pair[1].input_dim() {
                return Err(Error::dims("layer chaining", pair[0].output_dim(), pair[1].input_dim()));
            }
        }
        Ok(Self { layers })
    }

    /// Forward pass through all layers, returns per-node class logits
    pub fn forward(&self, x: &Array2<f64>, graph: &H::Graph, training: bool) -> Result<Array2<f64>> {
        let mut h = self.layers[0].forward(x, graph, training)?;
        for layer in &self.layers[1..] {
            h = layer.forward(&h, graph, training)?;
        }
        Ok(h)
    }

    pub fn layers(&self) -> &[GraphAttentionLayer<H>] {
        &self.layers
    }

    /// Get number of layers
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// Get input dimension
    pub fn input_dim(&self) -> usize {
        self.layers[0].input_dim()
    }

    /// Number of output classes
    pub fn output_dim(&self) -> usize {
        self.layers[self.layers.len() - 1].output_dim()
    }

    /// Get number of parameters
    pub fn num_parameters(&self) -> usize {
        self.layers.iter().map(|l| l.num_parameters()).sum()
    }
}

impl GraphAttentionNetwork<AttentionHead> {
    /// Create a dense GAT
    pub fn new(config: &GatConfig, input_dim: usize, n_classes: usize) -> Result<Self> {
        Self::assemble(config, input_dim, n_classes, |i, o, c| AttentionHead::new(i, o, c))
    }

    /// Forward pass over padded graphs: `x` is `[G, N, F]`, `bias` is `[G, N, N]`
    pub fn forward_batch(&self, x: &Array3<f64>, bias: &Array3<f64>, training: bool) -> Result<Array3<f64>> {
        let (graphs, n, _) = x.dim();
        if bias.len_of(Axis(0)) != graphs {
            return Err(Error::dims("bias batch size", graphs, bias.len_of(Axis(0))));
        }

        let mut out = Array3::zeros((graphs, n, self.output_dim()));
        for (g, mut slot) in out.axis_iter_mut(Axis(0)).enumerate() {
            let logits = self.forward(
                &x.index_axis(Axis(0), g).to_owned(),
                &bias.index_axis(Axis(0), g).to_owned(),
                training,
            )?;
            slot.assign(&logits);
        }
        Ok(out)
    }

    /// Get attention weights from first layer
    pub fn attention_weights(&self, x: &Array2<f64>, bias: &Array2<f64>) -> Result<Array2<f64>> {
        self.layers[0].attention_weights(x, bias)
    }
}

impl GraphAttentionNetwork<SparseAttentionHead> {
    /// Create a sparse GAT for graphs of exactly `n_nodes` nodes
    pub fn new_sparse(config: &GatConfig, input_dim: usize, n_classes: usize, n_nodes: usize) -> Result<Self> {
        Self::assemble(config, input_dim, n_classes, |i, o, c| {
            SparseAttentionHead::new(i, o, n_nodes, c)
        })
    }
}

impl<H: AttentionKernel + Serialize + DeserializeOwned> GraphAttentionNetwork<H> {
    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize from JSON
    ///
    /// Head counts, head widths and layer chaining are checked as in
    /// [`Self::from_layers`].
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: Self = serde_json::from_str(json)?;
        let layers = raw
            .layers
            .into_iter()
            .map(GraphAttentionLayer::into_checked)
            .collect::<Result<Vec<_>>>()?;
        Self::from_layers(layers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{adj_to_bias, adj_to_bias_single, SparseGraph};
    use ndarray_rand::rand_distr::Uniform;
    use ndarray_rand::RandomExt;

    fn small_config() -> GatConfig {
        GatConfig {
            hid_units: vec![8, 6],
            n_heads: vec![2, 3, 2],
            ..GatConfig::default()
        }
    }

    fn ring(n: usize) -> Array2<f64> {
        let mut adj = Array2::zeros((n, n));
        for i in 0..n {
            adj[[i, (i + 1) % n]] = 1.0;
            adj[[(i + 1) % n, i]] = 1.0;
        }
        adj
    }

    #[test]
    fn test_network_creation() {
        let gat = Gat::new(&small_config(), 10, 4).unwrap();

        assert_eq!(gat.num_layers(), 3);
        assert_eq!(gat.input_dim(), 10);
        assert_eq!(gat.output_dim(), 4);
        assert_eq!(gat.layers()[1].input_dim(), 16);
        assert_eq!(gat.layers()[2].input_dim(), 18);
        assert_eq!(gat.layers()[2].num_heads(), 2);
    }

    #[test]
    fn test_forward_pass() {
        let n = 5;
        let gat = Gat::new(&small_config(), 10, 4).unwrap();
        let x = Array2::random((n, 10), Uniform::new(-1.0, 1.0));
        let bias = adj_to_bias_single(&ring(n), 1).unwrap();

        let logits = gat.forward(&x, &bias, false).unwrap();
        assert_eq!(logits.dim(), (n, 4));
        assert!(logits.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_forward_batch() {
        let gat = Gat::new(&small_config(), 3, 2).unwrap();
        let adj = ndarray::stack![Axis(0), ring(4), ring(4)];
        let bias = adj_to_bias(&adj, &[4, 4], 1).unwrap();
        let x = Array3::random((2, 4, 3), Uniform::new(-1.0, 1.0));

        let logits = gat.forward_batch(&x, &bias, false).unwrap();
        assert_eq!(logits.dim(), (2, 4, 2));
    }

    #[test]
    fn test_sparse_network() {
        let n = 6;
        let spgat = SpGat::new_sparse(&GatConfig::citation(), 5, 3, n).unwrap();
        let adj = SparseGraph::from_dense(&ring(n)).unwrap().add_self_loops(1.0);
        let x = Array2::random((n, 5), Uniform::new(-1.0, 1.0));

        let logits = spgat.forward(&x, &adj, false).unwrap();
        assert_eq!(logits.dim(), (n, 3));
        // training mode with dropout still yields the same shape
        assert_eq!(spgat.forward(&x, &adj, true).unwrap().dim(), (n, 3));
    }

    #[test]
    fn test_invalid_head_list() {
        let config = GatConfig {
            hid_units: vec![8],
            n_heads: vec![8],
            ..GatConfig::default()
        };
        assert!(matches!(Gat::new(&config, 4, 2), Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_invalid_dropout() {
        let config = GatConfig {
            in_drop: 1.0,
            ..GatConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_serialization() {
        let gat = Gat::new(&small_config(), 4, 2).unwrap();

        let json = gat.to_json().unwrap();
        let restored = Gat::from_json(&json).unwrap();

        assert_eq!(gat.num_parameters(), restored.num_parameters());
        assert_eq!(restored.num_layers(), 3);
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(Gat::from_json(r#"{"layers":[]}"#).is_err());

        let gat = Gat::new(&small_config(), 10, 4).unwrap();
        let valid: serde_json::Value = serde_json::from_str(&gat.to_json().unwrap()).unwrap();

        // dropping the middle layer breaks chaining: 16 outputs feed an 18-wide layer
        let mut unchained = valid.clone();
        unchained["layers"].as_array_mut().unwrap().remove(1);
        assert!(matches!(
            Gat::from_json(&unchained.to_string()),
            Err(Error::DimensionMismatch { .. })
        ));

        let mut headless = valid.clone();
        headless["layers"][0]["heads"] = serde_json::json!([]);
        assert!(matches!(Gat::from_json(&headless.to_string()), Err(Error::ConfigError(_))));

        let mut mixed = valid;
        let narrow = Gat::new(&small_config(), 7, 4).unwrap();
        let narrow: serde_json::Value = serde_json::from_str(&narrow.to_json().unwrap()).unwrap();
        mixed["layers"][0]["heads"][1] = narrow["layers"][0]["heads"][0].clone();
        assert!(Gat::from_json(&mixed.to_string()).is_err());
    }
}
