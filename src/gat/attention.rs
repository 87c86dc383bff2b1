//! Dense attention head
//!
//! Attention over all node pairs of a graph, restricted to neighbourhoods
//! by an additive bias matrix (see [`crate::graph::adj_to_bias`]).

use ndarray::{Array1, Array2, Array3, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::ops::{dropout, leaky_relu, softmax_rows, Activation};
use crate::error::{Error, Result};

/// Default slope of the LeakyReLU applied to attention logits
pub const DEFAULT_NEGATIVE_SLOPE: f64 = 0.01;

/// Hyper-parameters shared by dense and sparse heads
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeadConfig {
    /// Dropout applied to the head input
    pub in_drop: f64,
    /// Dropout applied to attention coefficients and projected features
    pub coef_drop: f64,
    /// Add a residual connection
    pub residual: bool,
    /// Negative slope for LeakyReLU
    pub negative_slope: f64,
    /// Output activation
    pub activation: Activation,
}

impl Default for HeadConfig {
    fn default() -> Self {
        Self {
            in_drop: 0.0,
            coef_drop: 0.0,
            residual: false,
            negative_slope: DEFAULT_NEGATIVE_SLOPE,
            activation: Activation::Elu,
        }
    }
}

/// Learned parameters of one head
///
/// `kernel` projects inputs to the head's output channels; the two
/// attention vectors with their scalar biases score each node as a sender
/// (`attn_self`) and as a receiver (`attn_neigh`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "HeadParamsParts")]
pub struct HeadParams {
    kernel: Array2<f64>,
    attn_self: Array1<f64>,
    attn_self_bias: f64,
    attn_neigh: Array1<f64>,
    attn_neigh_bias: f64,
}

/// Stored head weights, checked by [`HeadParams::from_weights`] on load
#[derive(Deserialize)]
struct HeadParamsParts {
    kernel: Array2<f64>,
    attn_self: Array1<f64>,
    attn_self_bias: f64,
    attn_neigh: Array1<f64>,
    attn_neigh_bias: f64,
}

impl TryFrom<HeadParamsParts> for HeadParams {
    type Error = Error;

    fn try_from(parts: HeadParamsParts) -> Result<Self> {
        let params = Self::from_weights(parts.kernel, parts.attn_self, parts.attn_neigh)?;
        Ok(params.with_attention_bias(parts.attn_self_bias, parts.attn_neigh_bias))
    }
}

impl HeadParams {
    /// Xavier-style uniform initialisation, zero attention biases
    pub fn init<R: Rng>(in_features: usize, out_features: usize, rng: &mut R) -> Self {
        let scale = (2.0 / (in_features + out_features) as f64).sqrt();
        let kernel =
            Array2::from_shape_fn((in_features, out_features), |_| rng.gen_range(-scale..scale));

        let attn_scale = (2.0 / (out_features + 1) as f64).sqrt();
        let attn_self =
            Array1::from_shape_fn(out_features, |_| rng.gen_range(-attn_scale..attn_scale));
        let attn_neigh =
            Array1::from_shape_fn(out_features, |_| rng.gen_range(-attn_scale..attn_scale));

        Self {
            kernel,
            attn_self,
            attn_self_bias: 0.0,
            attn_neigh,
            attn_neigh_bias: 0.0,
        }
    }

    /// Assemble from explicit weights
    pub fn from_weights(
        kernel: Array2<f64>,
        attn_self: Array1<f64>,
        attn_neigh: Array1<f64>,
    ) -> Result<Self> {
        let out = kernel.ncols();
        if attn_self.len() != out {
            return Err(Error::dims("sender attention vector", out, attn_self.len()));
        }
        if attn_neigh.len() != out {
            return Err(Error::dims("receiver attention vector", out, attn_neigh.len()));
        }
        Ok(Self {
            kernel,
            attn_self,
            attn_self_bias: 0.0,
            attn_neigh,
            attn_neigh_bias: 0.0,
        })
    }

    /// Set the scalar biases of the sender and receiver scores
    pub fn with_attention_bias(mut self, self_bias: f64, neigh_bias: f64) -> Self {
        self.attn_self_bias = self_bias;
        self.attn_neigh_bias = neigh_bias;
        self
    }

    pub fn in_features(&self) -> usize {
        self.kernel.nrows()
    }

    pub fn out_features(&self) -> usize {
        self.kernel.ncols()
    }

    pub fn num_parameters(&self) -> usize {
        self.kernel.len() + self.attn_self.len() + self.attn_neigh.len() + 2
    }

    /// Shared linear transform, no bias term
    pub fn project(&self, x: &Array2<f64>) -> Array2<f64> {
        x.dot(&self.kernel)
    }

    /// Per-node sender and receiver scores of projected features
    pub fn scores(&self, seq: &Array2<f64>) -> (Array1<f64>, Array1<f64>) {
        let f1 = seq.dot(&self.attn_self) + self.attn_self_bias;
        let f2 = seq.dot(&self.attn_neigh) + self.attn_neigh_bias;
        (f1, f2)
    }

    /// Add the raw input, or its projection when the widths differ
    pub fn add_residual(&self, vals: Array2<f64>, x: &Array2<f64>) -> Array2<f64> {
        if x.ncols() == vals.ncols() {
            vals + x
        } else {
            vals + self.project(x)
        }
    }

    pub(crate) fn check_input(&self, x: &Array2<f64>) -> Result<()> {
        if x.ncols() != self.in_features() {
            return Err(Error::dims("head input features", self.in_features(), x.ncols()));
        }
        Ok(())
    }
}

/// Single attention head over a dense bias matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttentionHead {
    params: HeadParams,
    config: HeadConfig,
}

impl AttentionHead {
    /// Create a new randomly initialised attention head
    pub fn new(in_features: usize, out_features: usize, config: HeadConfig) -> Self {
        Self::with_rng(in_features, out_features, config, &mut rand::thread_rng())
    }

    /// Create with a caller-supplied random generator
    pub fn with_rng<R: Rng>(
        in_features: usize,
        out_features: usize,
        config: HeadConfig,
        rng: &mut R,
    ) -> Self {
        Self {
            params: HeadParams::init(in_features, out_features, rng),
            config,
        }
    }

    /// Create from existing parameters
    pub fn from_params(params: HeadParams, config: HeadConfig) -> Self {
        Self { params, config }
    }

    pub fn params(&self) -> &HeadParams {
        &self.params
    }

    pub fn config(&self) -> &HeadConfig {
        &self.config
    }

    /// Attention coefficients for projected features `seq`
    fn coefficients(&self, seq: &Array2<f64>, bias: &Array2<f64>) -> Array2<f64> {
        let n = seq.nrows();
        let (f1, f2) = self.params.scores(seq);
        let slope = self.config.negative_slope;

        let logits = Array2::from_shape_fn((n, n), |(i, j)| {
            leaky_relu(f1[i] + f2[j], slope) + bias[[i, j]]
        });
        softmax_rows(logits)
    }

    fn check_bias(&self, x: &Array2<f64>, bias: &Array2<f64>) -> Result<()> {
        self.params.check_input(x)?;
        let n = x.nrows();
        if bias.nrows() != n {
            return Err(Error::dims("bias matrix rows", n, bias.nrows()));
        }
        if bias.ncols() != n {
            return Err(Error::dims("bias matrix columns", n, bias.ncols()));
        }
        Ok(())
    }

    /// Attention coefficients `[N, N]` in inference mode
    ///
    /// Every row sums to one; pairs masked by the bias get exactly zero.
    pub fn attention_coefficients(&self, x: &Array2<f64>, bias: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_bias(x, bias)?;
        Ok(self.coefficients(&self.params.project(x), bias))
    }

    /// Forward pass for one graph: `x` is `[N, F_in]`, `bias` is `[N, N]`
    pub fn forward(&self, x: &Array2<f64>, bias: &Array2<f64>, training: bool) -> Result<Array2<f64>> {
        self.check_bias(x, bias)?;

        let mut x = x.clone();
        if training {
            dropout(x.iter_mut(), self.config.in_drop);
        }

        let mut seq = self.params.project(&x);
        let mut coefs = self.coefficients(&seq, bias);

        if training {
            dropout(coefs.iter_mut(), self.config.coef_drop);
            dropout(seq.iter_mut(), self.config.coef_drop);
        }

        let mut vals = coefs.dot(&seq);
        if self.config.residual {
            vals = self.params.add_residual(vals, &x);
        }

        Ok(self.config.activation.apply(vals))
    }

    /// Forward pass over a batch: `x` is `[G, N, F_in]`, `bias` is `[G, N, N]`
    pub fn forward_batch(&self, x: &Array3<f64>, bias: &Array3<f64>, training: bool) -> Result<Array3<f64>> {
        let (graphs, n, _) = x.dim();
        if bias.len_of(Axis(0)) != graphs {
            return Err(Error::dims("bias batch size", graphs, bias.len_of(Axis(0))));
        }

        let mut out = Array3::zeros((graphs, n, self.params.out_features()));
        for (g, mut slot) in out.axis_iter_mut(Axis(0)).enumerate() {
            let vals = self.forward(
                &x.index_axis(Axis(0), g).to_owned(),
                &bias.index_axis(Axis(0), g).to_owned(),
                training,
            )?;
            slot.assign(&vals);
        }
        Ok(out)
    }
}
