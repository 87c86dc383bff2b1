//! Graph data structures and structural preprocessing
//!
//! CSR adjacency storage, attention bias matrices and connected-component
//! labelling.

mod bias;
mod components;
mod sparse;

pub use bias::{adj_to_bias, adj_to_bias_single, UNREACHABLE_BIAS};
pub use components::{check_isolation, component_sizes, connected_components, num_components};
pub use sparse::SparseGraph;
