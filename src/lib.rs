//! Graph Attention Networks for inductive node classification
//!
//! This crate provides dense and sparse Graph Attention Networks (GAT), a
//! Graph Convolutional Network baseline, and the preprocessing that turns the
//! protein-protein interaction (PPI) graph into padded per-split batches.
//!
//! # Features
//!
//! - **Attention heads**: additive attention masked by a bias matrix, or restricted to CSR edges
//! - **Models**: multi-head GAT layers and networks, two-layer GCN
//! - **Graph preprocessing**: bias matrices, connected components, GCN normalisation
//! - **PPI pipeline**: split validation, subgraph pooling, padded batches
//! - **Metrics**: masked cross-entropy, accuracy and micro-F1
//!
//! # Example
//!
//! ```rust,no_run
//! use graph_attention::{Gat, GatConfig, PpiDataset, PpiPipeline, PreprocessConfig};
//!
//! fn main() -> graph_attention::Result<()> {
//!     let dataset = PpiDataset::load("data", "ppi")?;
//!     let splits = PpiPipeline::new(PreprocessConfig::default()).run(&dataset)?;
//!
//!     let gat = Gat::new(&GatConfig::default(), dataset.num_features(), dataset.num_classes())?;
//!     let bias = splits.train.bias(1)?;
//!     let logits = gat.forward_batch(splits.train.features(), &bias, false)?;
//!     println!("{:?}", logits.dim());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod gat;
pub mod gcn;
pub mod graph;
pub mod metrics;
pub mod ppi;
pub mod preprocessing;

// Re-export commonly used types
pub use config::{Config, PreprocessConfig};
pub use error::{Error, Result};
pub use gat::{AttentionHead, Gat, GatConfig, GraphAttentionLayer, SparseAttentionHead, SpGat};
pub use gcn::Gcn;
pub use graph::SparseGraph;
pub use ppi::{PaddedBatch, PpiDataset, PpiPipeline, PpiSplits, Split};
pub use preprocessing::StandardScaler;
