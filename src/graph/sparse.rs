//! Sparse graph representation using CSR format
//!
//! Adjacency storage for the sparse attention path, the GCN propagation
//! matrix and the subgraph extraction done by the PPI pipeline.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Compressed Sparse Row (CSR) graph representation
///
/// Stores only existing edges. Rows are sorted by column index and hold no
/// duplicate entries; deserialisation rejects arrays that break this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CsrParts")]
pub struct SparseGraph {
    /// Number of nodes
    n_nodes: usize,
    /// Row pointers: indptr[i] to indptr[i+1] gives edge range for node i
    indptr: Vec<usize>,
    /// Column indices: target node for each edge
    indices: Vec<usize>,
    /// Edge weights
    data: Vec<f64>,
}

/// Raw CSR arrays as stored on disk
#[derive(Deserialize)]
struct CsrParts {
    n_nodes: usize,
    indptr: Vec<usize>,
    indices: Vec<usize>,
    data: Vec<f64>,
}

impl TryFrom<CsrParts> for SparseGraph {
    type Error = Error;

    fn try_from(parts: CsrParts) -> Result<Self> {
        let CsrParts {
            n_nodes,
            indptr,
            indices,
            data,
        } = parts;

        if indptr.len().checked_sub(1) != Some(n_nodes) {
            return Err(Error::DataError(format!(
                "CSR graph of {} nodes has {} row pointers",
                n_nodes,
                indptr.len()
            )));
        }
        if data.len() != indices.len() {
            return Err(Error::dims("CSR edge value count", indices.len(), data.len()));
        }
        if indptr[0] != 0 || indptr[n_nodes] != indices.len() {
            return Err(Error::DataError(format!(
                "CSR row pointers must run from 0 to {}",
                indices.len()
            )));
        }
        if indptr.windows(2).any(|w| w[0] > w[1]) {
            return Err(Error::DataError("CSR row pointers must be non-decreasing".into()));
        }

        for row in 0..n_nodes {
            let cols = &indices[indptr[row]..indptr[row + 1]];
            if let Some(&col) = cols.iter().find(|&&col| col >= n_nodes) {
                return Err(Error::dims("edge endpoint bound", n_nodes, col + 1));
            }
            if cols.windows(2).any(|w| w[0] >= w[1]) {
                return Err(Error::DataError(format!(
                    "CSR row {} is not strictly sorted",
                    row
                )));
            }
        }

        Ok(Self {
            n_nodes,
            indptr,
            indices,
            data,
        })
    }
}

impl SparseGraph {
    /// Create an empty graph with `n_nodes` nodes
    pub fn new(n_nodes: usize) -> Self {
        Self {
            n_nodes,
            indptr: vec![0; n_nodes + 1],
            indices: Vec::new(),
            data: Vec::new(),
        }
    }

    /// Create from dense adjacency matrix
    pub fn from_dense(adjacency: &Array2<f64>) -> Result<Self> {
        let (n, m) = adjacency.dim();
        if n != m {
            return Err(Error::dims("square adjacency matrix", n, m));
        }

        let mut indptr = vec![0usize; n + 1];
        let mut indices = Vec::new();
        let mut data = Vec::new();

        for i in 0..n {
            for j in 0..n {
                if adjacency[[i, j]] != 0.0 {
                    indices.push(j);
                    data.push(adjacency[[i, j]]);
                }
            }
            indptr[i + 1] = indices.len();
        }

        Ok(Self {
            n_nodes: n,
            indptr,
            indices,
            data,
        })
    }

    /// Create from edge list
    ///
    /// Duplicate `(src, dst)` pairs keep the first weight given.
    pub fn from_edges(n_nodes: usize, edges: &[(usize, usize, f64)]) -> Result<Self> {
        if let Some(&(src, dst, _)) = edges.iter().find(|e| e.0 >= n_nodes || e.1 >= n_nodes) {
            return Err(Error::dims("edge endpoint bound", n_nodes, src.max(dst) + 1));
        }
        Ok(Self::build(n_nodes, edges.to_vec()))
    }

    /// Build CSR arrays from in-range edges
    fn build(n_nodes: usize, mut edges: Vec<(usize, usize, f64)>) -> Self {
        edges.sort_by_key(|&(src, dst, _)| (src, dst));
        edges.dedup_by_key(|&mut (src, dst, _)| (src, dst));

        let mut indptr = vec![0usize; n_nodes + 1];
        let mut indices = Vec::with_capacity(edges.len());
        let mut data = Vec::with_capacity(edges.len());

        for &(src, dst, weight) in &edges {
            indptr[src + 1] += 1;
            indices.push(dst);
            data.push(weight);
        }
        for i in 0..n_nodes {
            indptr[i + 1] += indptr[i];
        }

        Self {
            n_nodes,
            indptr,
            indices,
            data,
        }
    }

    /// Same sparsity pattern with new edge values
    pub fn with_values(&self, data: Vec<f64>) -> Result<Self> {
        if data.len() != self.data.len() {
            return Err(Error::dims("edge value count", self.data.len(), data.len()));
        }
        Ok(Self {
            n_nodes: self.n_nodes,
            indptr: self.indptr.clone(),
            indices: self.indices.clone(),
            data,
        })
    }

    /// Get number of nodes
    pub fn num_nodes(&self) -> usize {
        self.n_nodes
    }

    /// Get number of stored edges
    pub fn num_edges(&self) -> usize {
        self.indices.len()
    }

    /// Get neighbors of a node
    pub fn neighbors(&self, node: usize) -> &[usize] {
        &self.indices[self.indptr[node]..self.indptr[node + 1]]
    }

    /// Get edge weights for a node's outgoing edges
    pub fn edge_weights(&self, node: usize) -> &[f64] {
        &self.data[self.indptr[node]..self.indptr[node + 1]]
    }

    /// All stored edge values in row order
    pub fn values(&self) -> &[f64] {
        &self.data
    }

    /// Iterate over `(src, dst, weight)` triples in row order
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        (0..self.n_nodes).flat_map(move |i| {
            self.neighbors(i)
                .iter()
                .zip(self.edge_weights(i))
                .map(move |(&j, &w)| (i, j, w))
        })
    }

    /// Get degree (number of outgoing edges) for a node
    pub fn degree(&self, node: usize) -> usize {
        self.indptr[node + 1] - self.indptr[node]
    }

    /// Check if edge exists
    pub fn has_edge(&self, src: usize, dst: usize) -> bool {
        self.neighbors(src).binary_search(&dst).is_ok()
    }

    /// Get edge weight (returns 0 if edge doesn't exist)
    pub fn get_edge_weight(&self, src: usize, dst: usize) -> f64 {
        match self.neighbors(src).binary_search(&dst) {
            Ok(pos) => self.edge_weights(src)[pos],
            Err(_) => 0.0,
        }
    }

    /// Convert to dense adjacency matrix
    pub fn to_dense(&self) -> Array2<f64> {
        let mut adj = Array2::zeros((self.n_nodes, self.n_nodes));
        for (i, j, w) in self.edges() {
            adj[[i, j]] = w;
        }
        adj
    }

    /// Weighted row sums
    pub fn row_sums(&self) -> Array1<f64> {
        Array1::from_iter((0..self.n_nodes).map(|i| self.edge_weights(i).iter().sum::<f64>()))
    }

    /// Check if graph is symmetric
    pub fn is_symmetric(&self) -> bool {
        self.edges().all(|(i, j, _)| self.has_edge(j, i))
    }

    /// Make graph symmetric by adding reverse edges
    pub fn make_symmetric(&self) -> Self {
        let mut edges: Vec<(usize, usize, f64)> = self.edges().collect();
        let reverse: Vec<(usize, usize, f64)> = self
            .edges()
            .filter(|&(i, j, _)| !self.has_edge(j, i))
            .map(|(i, j, w)| (j, i, w))
            .collect();
        edges.extend(reverse);

        Self::build(self.n_nodes, edges)
    }

    /// Add self-loops to nodes that lack one
    pub fn add_self_loops(&self, weight: f64) -> Self {
        let mut edges: Vec<(usize, usize, f64)> = self.edges().collect();
        edges.extend(
            (0..self.n_nodes)
                .filter(|&i| !self.has_edge(i, i))
                .map(|i| (i, i, weight)),
        );

        Self::build(self.n_nodes, edges)
    }

    /// Renormalised propagation matrix `D^-1/2 (A + I) D^-1/2` used by GCN layers
    pub fn gcn_normalize(&self) -> Self {
        let looped = self.add_self_loops(1.0);
        let d_inv_sqrt = looped.row_sums().mapv(|d| {
            let v = d.powf(-0.5);
            if v.is_finite() {
                v
            } else {
                0.0
            }
        });

        let data = looped
            .edges()
            .map(|(i, j, w)| d_inv_sqrt[i] * w * d_inv_sqrt[j])
            .collect();

        Self { data, ..looped }
    }

    /// Sparse-dense product `self · dense`
    pub fn spmm(&self, dense: &Array2<f64>) -> Result<Array2<f64>> {
        if dense.nrows() != self.n_nodes {
            return Err(Error::dims("sparse-dense product rows", self.n_nodes, dense.nrows()));
        }

        let mut out = Array2::zeros((self.n_nodes, dense.ncols()));
        for (i, j, w) in self.edges() {
            out.row_mut(i).scaled_add(w, &dense.row(j));
        }
        Ok(out)
    }

    /// Get subgraph induced by node subset, renumbered in the given order
    pub fn subgraph(&self, nodes: &[usize]) -> Self {
        let node_map: std::collections::HashMap<usize, usize> =
            nodes.iter().enumerate().map(|(i, &n)| (n, i)).collect();

        let mut edges: Vec<(usize, usize, f64)> = Vec::new();
        for (new_i, &old_i) in nodes.iter().enumerate() {
            for (&old_j, &w) in self.neighbors(old_i).iter().zip(self.edge_weights(old_i)) {
                if let Some(&new_j) = node_map.get(&old_j) {
                    edges.push((new_i, new_j, w));
                }
            }
        }

        Self::build(nodes.len(), edges)
    }
}
