//! Protein-protein interaction dataset preparation
//!
//! The PPI graph is a union of disconnected tissue graphs. Each connected
//! component becomes one row of a padded batch, small components are pooled,
//! and each batch holds the rows of one split.

mod batch;
mod loader;
mod pipeline;
mod split;
mod synthetic;

pub use batch::{BatchPacker, PaddedBatch};
pub use loader::PpiDataset;
pub use pipeline::{BatchStats, PpiPipeline, PpiSplits, SplitSummary};
pub use split::{
    node_splits, partition_subgraphs, validate_edge_splits, NodeFlags, Split, Subgraph, SubgraphKind,
    SubgraphPartition,
};
