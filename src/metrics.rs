//! Masked losses and evaluation metrics
//!
//! Masks are per-node weights (1.0 for nodes that count, 0.0 otherwise).
//! Losses and accuracy re-weight the mask by its mean so that the result is
//! an average over the selected nodes only.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use ordered_float::OrderedFloat;

use crate::error::{Error, Result};
use crate::gat::ops::{log_softmax_rows, sigmoid};

/// Guard added to every precision / recall / F1 denominator
pub const F1_EPSILON: f64 = 1e-10;

fn check_rows(context: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(Error::dims(context, expected, actual));
    }
    Ok(())
}

/// Mask divided by its mean; an all-zero mask stays all zero
fn normalized_mask(mask: &Array1<f64>) -> Array1<f64> {
    let mean = mask.mean().unwrap_or(0.0);
    if mean > 0.0 {
        mask / mean
    } else {
        Array1::zeros(mask.len())
    }
}

fn argmax(row: ArrayView1<f64>) -> usize {
    row.iter()
        .enumerate()
        .max_by_key(|&(_, &v)| OrderedFloat(v))
        .map_or(0, |(i, _)| i)
}

/// Softmax cross-entropy against integer class labels
pub fn masked_softmax_cross_entropy(
    logits: &Array2<f64>,
    labels: &[usize],
    mask: &Array1<f64>,
) -> Result<f64> {
    check_rows("labels", logits.nrows(), labels.len())?;
    check_rows("mask", logits.nrows(), mask.len())?;
    if let Some(&label) = labels.iter().find(|&&l| l >= logits.ncols()) {
        return Err(Error::dims("class label bound", logits.ncols(), label + 1));
    }

    let log_probs = log_softmax_rows(logits);
    let weights = normalized_mask(mask);
    let losses = Array1::from_iter(
        labels
            .iter()
            .enumerate()
            .map(|(i, &label)| -log_probs[[i, label]] * weights[i]),
    );
    Ok(losses.mean().unwrap_or(0.0))
}

/// Negative log-likelihood over log-probabilities, optionally class-weighted
///
/// With weights the result is `sum(w[y_i] * -lp[i, y_i]) / sum(w[y_i])`, so
/// rare classes can be up-weighted without changing the loss scale.
pub fn nll_loss(log_probs: &Array2<f64>, labels: &[usize], class_weights: Option<&Array1<f64>>) -> Result<f64> {
    check_rows("labels", log_probs.nrows(), labels.len())?;
    if let Some(&label) = labels.iter().find(|&&l| l >= log_probs.ncols()) {
        return Err(Error::dims("class label bound", log_probs.ncols(), label + 1));
    }
    if let Some(weights) = class_weights {
        check_rows("class weights", log_probs.ncols(), weights.len())?;
    }

    let weight_of = |label: usize| class_weights.map_or(1.0, |w| w[label]);
    let (total, norm) = labels
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(total, norm), (i, &label)| {
            let w = weight_of(label);
            (total - w * log_probs[[i, label]], norm + w)
        });

    if norm == 0.0 {
        return Ok(0.0);
    }
    Ok(total / norm)
}

/// Sigmoid cross-entropy for multi-label targets in `{0, 1}`
pub fn masked_sigmoid_cross_entropy(
    logits: &Array2<f64>,
    labels: &Array2<f64>,
    mask: &Array1<f64>,
) -> Result<f64> {
    check_rows("labels", logits.nrows(), labels.nrows())?;
    check_rows("label width", logits.ncols(), labels.ncols())?;
    check_rows("mask", logits.nrows(), mask.len())?;

    // max(x, 0) - x * z + log(1 + exp(-|x|))
    let per_node = ndarray::Zip::from(logits)
        .and(labels)
        .map_collect(|&x, &z| x.max(0.0) - x * z + (-x.abs()).exp().ln_1p())
        .mean_axis(Axis(1))
        .unwrap_or_else(|| Array1::zeros(logits.nrows()));

    let weights = normalized_mask(mask);
    Ok((per_node * weights).mean().unwrap_or(0.0))
}

/// Fraction of masked nodes whose argmax logit matches the label
pub fn masked_accuracy(logits: &Array2<f64>, labels: &[usize], mask: &Array1<f64>) -> Result<f64> {
    check_rows("labels", logits.nrows(), labels.len())?;
    check_rows("mask", logits.nrows(), mask.len())?;

    let weights = normalized_mask(mask);
    let correct = Array1::from_iter(logits.rows().into_iter().zip(labels).enumerate().map(
        |(i, (row, &label))| {
            if argmax(row) == label {
                weights[i]
            } else {
                0.0
            }
        },
    ));
    Ok(correct.mean().unwrap_or(0.0))
}

/// Micro-averaged F1 of thresholded sigmoid outputs over masked nodes
pub fn micro_f1(logits: &Array2<f64>, labels: &Array2<f64>, mask: &Array1<f64>) -> Result<f64> {
    check_rows("labels", logits.nrows(), labels.nrows())?;
    check_rows("label width", logits.ncols(), labels.ncols())?;
    check_rows("mask", logits.nrows(), mask.len())?;

    let (mut tp, mut fp, mut fn_) = (0.0, 0.0, 0.0);
    for ((logit_row, label_row), &m) in logits.rows().into_iter().zip(labels.rows()).zip(mask) {
        for (&x, &y) in logit_row.iter().zip(label_row.iter()) {
            let pred = sigmoid(x).round();
            tp += pred * y * m;
            fp += pred * (1.0 - y) * m;
            fn_ += (1.0 - pred) * y * m;
        }
    }

    let precision = tp / (tp + fp + F1_EPSILON);
    let recall = tp / (tp + fn_ + F1_EPSILON);
    Ok(2.0 * precision * recall / (precision + recall + F1_EPSILON))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_accuracy_respects_mask() {
        let logits = array![[2.0, 0.0], [0.0, 2.0], [3.0, 0.0], [0.0, 1.0]];
        let labels = [0, 1, 1, 0];
        let mask = array![1.0, 1.0, 0.0, 0.0];

        assert!((masked_accuracy(&logits, &labels, &mask).unwrap() - 1.0).abs() < 1e-12);

        let all = Array1::ones(4);
        assert!((masked_accuracy(&logits, &labels, &all).unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_cross_entropy_masked_mean() {
        let logits = array![[0.0, 0.0], [10.0, -10.0]];
        let labels = [0, 1];
        let mask = array![1.0, 0.0];

        let loss = masked_softmax_cross_entropy(&logits, &labels, &mask).unwrap();
        assert!((loss - 2.0f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_sigmoid_cross_entropy_zero_logits() {
        let logits = Array2::zeros((2, 3));
        let labels = array![[1.0, 0.0, 1.0], [0.0, 0.0, 0.0]];
        let loss = masked_sigmoid_cross_entropy(&logits, &labels, &Array1::ones(2)).unwrap();
        assert!((loss - 2.0f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_micro_f1() {
        let logits = array![[5.0, -5.0, 5.0], [-5.0, 5.0, -5.0]];
        let labels = array![[1.0, 0.0, 0.0], [0.0, 1.0, 1.0]];
        let mask = Array1::ones(2);

        // tp = 2, fp = 1, fn = 1
        let f1 = micro_f1(&logits, &labels, &mask).unwrap();
        assert!((f1 - 2.0 / 3.0).abs() < 1e-8);
    }

    #[test]
    fn test_empty_mask_is_finite() {
        let logits = array![[1.0, -1.0]];
        let labels = array![[1.0, 0.0]];
        let mask = array![0.0];

        assert_eq!(micro_f1(&logits, &labels, &mask).unwrap(), 0.0);
        assert_eq!(masked_accuracy(&logits, &[0], &mask).unwrap(), 0.0);
    }

    #[test]
    fn test_label_out_of_range() {
        let logits = array![[1.0, -1.0]];
        assert!(masked_softmax_cross_entropy(&logits, &[2], &array![1.0]).is_err());
    }

    #[test]
    fn test_nll_loss_class_weights() {
        let log_probs = array![[0.2f64.ln(), 0.8f64.ln()], [0.6f64.ln(), 0.4f64.ln()]];
        let labels = [0, 1];

        let plain = nll_loss(&log_probs, &labels, None).unwrap();
        assert!((plain - (-(0.2f64.ln()) - 0.4f64.ln()) / 2.0).abs() < 1e-12);

        let weights = array![1.0, 3.0];
        let weighted = nll_loss(&log_probs, &labels, Some(&weights)).unwrap();
        let expected = (-(0.2f64.ln()) - 3.0 * 0.4f64.ln()) / 4.0;
        assert!((weighted - expected).abs() < 1e-12);

        let uniform = array![2.0, 2.0];
        assert!((nll_loss(&log_probs, &labels, Some(&uniform)).unwrap() - plain).abs() < 1e-12);

        let zeros = array![0.0, 0.0];
        assert_eq!(nll_loss(&log_probs, &labels, Some(&zeros)).unwrap(), 0.0);
    }

    #[test]
    fn test_nll_loss_rejects_bad_shapes() {
        let log_probs = array![[-0.5, -1.0], [-2.0, -0.1]];
        assert!(nll_loss(&log_probs, &[0, 1], Some(&array![1.0, 2.0, 3.0])).is_err());
        assert!(nll_loss(&log_probs, &[0, 2], None).is_err());
        assert!(nll_loss(&log_probs, &[0], None).is_err());
    }
}
