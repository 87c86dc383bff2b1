//! End-to-end PPI preprocessing
//!
//! Loads nothing itself: takes a [`PpiDataset`] and produces one padded
//! batch per split, all sharing the width of the largest subgraph.

use serde::Serialize;
use tracing::{debug, info, warn};

use super::batch::{BatchPacker, PaddedBatch};
use super::loader::PpiDataset;
use super::split::{node_splits, partition_subgraphs, validate_edge_splits, Split, SubgraphPartition};
use crate::config::PreprocessConfig;
use crate::error::Result;
use crate::graph::{check_isolation, connected_components, num_components};
use crate::preprocessing::StandardScaler;

/// Padded batches of every split
#[derive(Debug, Clone)]
pub struct PpiSplits {
    pub train: PaddedBatch,
    pub val: PaddedBatch,
    pub test: PaddedBatch,
    /// Subgraphs behind the batch rows, in partition order
    pub partition: SubgraphPartition,
    /// Scaler fitted on training nodes, when standardisation ran
    pub scaler: Option<StandardScaler>,
}

impl PpiSplits {
    pub fn get(&self, split: Split) -> &PaddedBatch {
        match split {
            Split::Train => &self.train,
            Split::Val => &self.val,
            Split::Test => &self.test,
        }
    }

    /// Common padded width of every batch
    pub fn max_nodes(&self) -> usize {
        self.train.max_nodes()
    }

    pub fn summary(&self) -> SplitSummary {
        let stats = |split: Split| {
            let batch = self.get(split);
            BatchStats {
                split,
                subgraphs: batch.len(),
                nodes: batch.num_nodes().iter().sum(),
            }
        };
        SplitSummary {
            max_nodes: self.max_nodes(),
            num_features: self.train.num_features(),
            num_classes: self.train.num_classes(),
            splits: Split::ALL.into_iter().map(stats).collect(),
        }
    }
}

/// Shape overview written by the CLI
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitSummary {
    pub max_nodes: usize,
    pub num_features: usize,
    pub num_classes: usize,
    pub splits: Vec<BatchStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchStats {
    pub split: Split,
    pub subgraphs: usize,
    pub nodes: usize,
}

/// Partition, validate and pack a PPI dataset
#[derive(Debug, Clone, Default)]
pub struct PpiPipeline {
    config: PreprocessConfig,
}

impl PpiPipeline {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    pub fn run(&self, dataset: &PpiDataset) -> Result<PpiSplits> {
        self.config.validate()?;

        let graph = if dataset.graph.is_symmetric() {
            dataset.graph.clone()
        } else if self.config.symmetrize {
            warn!("Adjacency is not symmetric, adding reverse edges");
            dataset.graph.make_symmetric()
        } else {
            dataset.graph.clone()
        };

        let splits = node_splits(&dataset.flags)?;
        validate_edge_splits(&graph, &splits)?;

        let components = connected_components(&graph);
        info!("Found {} connected components", num_components(&components));

        let partition = partition_subgraphs(&components, &splits, self.config.min_subgraph_size)?;
        check_isolation(&graph, partition.group_of())?;
        debug!(
            "{} subgraphs after pooling components below {} nodes",
            partition.num_subgraphs(),
            self.config.min_subgraph_size
        );

        let (features, scaler) = if self.config.standardize {
            let train_rows: Vec<usize> = splits
                .iter()
                .enumerate()
                .filter(|&(_, &s)| s == Split::Train)
                .map(|(i, _)| i)
                .collect();
            if train_rows.is_empty() {
                warn!("No training nodes, features left unscaled");
                (dataset.features.clone(), None)
            } else {
                let scaler = StandardScaler::fit_rows(&dataset.features, &train_rows)?;
                (scaler.transform(&dataset.features)?, Some(scaler))
            }
        } else {
            (dataset.features.clone(), None)
        };

        let packer = BatchPacker::fitting(partition.subgraphs());
        let pack = |split: Split| -> Result<PaddedBatch> {
            let batch = packer.pack(&graph, &features, &dataset.labels, &partition.by_split(split))?;
            info!(
                "{} split: {} subgraphs padded to {} nodes",
                split,
                batch.len(),
                batch.max_nodes()
            );
            Ok(batch)
        };
        let train = pack(Split::Train)?;
        let val = pack(Split::Val)?;
        let test = pack(Split::Test)?;

        Ok(PpiSplits {
            train,
            val,
            test,
            partition,
            scaler,
        })
    }
}
