//! Element-wise operations shared by the attention heads

use ndarray::{Array2, ArrayViewMut1, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Output nonlinearity of an attention head
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    /// Exponential linear unit with alpha = 1
    #[default]
    Elu,
    /// No activation (output layer logits)
    Identity,
}

impl Activation {
    /// Apply to every element
    pub fn apply(&self, x: Array2<f64>) -> Array2<f64> {
        match self {
            Activation::Elu => x.mapv_into(|v| elu(v, 1.0)),
            Activation::Identity => x,
        }
    }
}

/// LeakyReLU activation
pub fn leaky_relu(x: f64, negative_slope: f64) -> f64 {
    if x >= 0.0 {
        x
    } else {
        negative_slope * x
    }
}

/// ELU activation
pub fn elu(x: f64, alpha: f64) -> f64 {
    if x >= 0.0 {
        x
    } else {
        alpha * (x.exp() - 1.0)
    }
}

/// Logistic sigmoid
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Numerically stable in-place softmax of one row
pub fn softmax_inplace(mut row: ArrayViewMut1<f64>) {
    if row.is_empty() {
        return;
    }
    let max = row.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
    row.mapv_inplace(|v| (v - max).exp());
    let sum = row.sum();
    row.mapv_inplace(|v| v / sum);
}

/// Row-wise softmax
pub fn softmax_rows(mut x: Array2<f64>) -> Array2<f64> {
    for row in x.axis_iter_mut(Axis(0)) {
        softmax_inplace(row);
    }
    x
}

/// Row-wise log-softmax
pub fn log_softmax_rows(x: &Array2<f64>) -> Array2<f64> {
    let mut out = x.clone();
    for mut row in out.axis_iter_mut(Axis(0)) {
        let max = row.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
        let log_sum = row.iter().map(|&v| (v - max).exp()).sum::<f64>().ln() + max;
        row.mapv_inplace(|v| v - log_sum);
    }
    out
}

/// Inverted dropout over any collection of values
///
/// Kept values are scaled by `1 / (1 - rate)`. A rate of 0 or below leaves
/// the values untouched; a rate of 1 or above zeroes them.
pub fn dropout<'a, I>(values: I, rate: f64)
where
    I: IntoIterator<Item = &'a mut f64>,
{
    if rate <= 0.0 {
        return;
    }
    if rate >= 1.0 {
        values.into_iter().for_each(|v| *v = 0.0);
        return;
    }

    let mut rng = rand::thread_rng();
    let scale = 1.0 / (1.0 - rate);
    for v in values {
        if rng.gen::<f64>() < rate {
            *v = 0.0;
        } else {
            *v *= scale;
        }
    }
}
