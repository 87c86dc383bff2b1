//! Attention bias matrices
//!
//! Turns (padded) adjacency matrices into additive masks for the dense
//! attention heads: zero inside the `nhood`-hop neighbourhood of a node,
//! a large negative value everywhere else.

use ndarray::{s, Array2, Array3, Axis};

use crate::error::{Error, Result};

/// Bias applied to pairs outside the neighbourhood.
///
/// Large enough that `exp` underflows to exactly zero after the softmax,
/// small enough that adding it to any finite logit stays finite.
pub const UNREACHABLE_BIAS: f64 = -1e9;

/// Build bias matrices for a batch of graphs
///
/// `adj` has shape `[G, N, N]`, `sizes[g]` is the number of real nodes of
/// graph `g` (the rest is padding). Reachability is computed as
/// `(A + I)^nhood`; entries among the real nodes are clipped to 1 while the
/// padding block keeps its raw path counts.
pub fn adj_to_bias(adj: &Array3<f64>, sizes: &[usize], nhood: usize) -> Result<Array3<f64>> {
    let (nb_graphs, n, m) = adj.dim();
    if n != m {
        return Err(Error::dims("square adjacency matrices", n, m));
    }
    if sizes.len() != nb_graphs {
        return Err(Error::dims("graph sizes", nb_graphs, sizes.len()));
    }
    if let Some(&size) = sizes.iter().find(|&&size| size > n) {
        return Err(Error::dims("real node count", n, size));
    }

    let eye = Array2::<f64>::eye(n);
    let mut bias = Array3::zeros((nb_graphs, n, n));

    for (g, (graph, mut out)) in adj
        .axis_iter(Axis(0))
        .zip(bias.axis_iter_mut(Axis(0)))
        .enumerate()
    {
        let step = &graph + &eye;
        let mut mt = eye.clone();
        for _ in 0..nhood {
            mt = mt.dot(&step);
        }

        let size = sizes[g];
        mt.slice_mut(s![..size, ..size])
            .mapv_inplace(|v| if v > 0.0 { 1.0 } else { v });

        out.assign(&mt.mapv(|v| UNREACHABLE_BIAS * (1.0 - v)));
    }

    Ok(bias)
}

/// Bias matrix for a single unpadded graph
pub fn adj_to_bias_single(adj: &Array2<f64>, nhood: usize) -> Result<Array2<f64>> {
    let n = adj.nrows();
    let batch = adj.clone().insert_axis(Axis(0));
    let bias = adj_to_bias(&batch, &[n], nhood)?;
    Ok(bias.index_axis_move(Axis(0), 0))
}
