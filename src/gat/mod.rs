//! Graph Attention Network implementation
//!
//! Dense (bias-matrix) and sparse (CSR) attention heads, multi-head layers
//! and the assembled networks.

mod attention;
mod layer;
mod network;
pub mod ops;
mod sparse;

pub use attention::{AttentionHead, HeadConfig, HeadParams, DEFAULT_NEGATIVE_SLOPE};
pub use layer::{AttentionKernel, GraphAttentionLayer, HeadAggregation};
pub use network::{Gat, GatConfig, GraphAttentionNetwork, SpGat};
pub use ops::Activation;
pub use sparse::SparseAttentionHead;
