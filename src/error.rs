//! Error types for the graph attention library

use thiserror::Error;

use crate::ppi::Split;

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// Array shapes do not line up
    #[error("Dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// A node carries both the validation and the test flag
    #[error("Node {node} is flagged as both validation and test")]
    AmbiguousNodeSplit { node: usize },

    /// An edge joins nodes from different splits
    #[error("Labels of both nodes differ: edge {from} -> {to} joins a {from_split} node to a {to_split} node")]
    EdgeSplitMismatch {
        from: usize,
        to: usize,
        from_split: Split,
        to_split: Split,
    },

    /// A component mixes nodes from different splits
    #[error("Inconsistent labels within component {component}: node {node} is {found}, earlier nodes are {expected}")]
    InconsistentSplit {
        component: usize,
        node: usize,
        expected: Split,
        found: Split,
    },

    /// Post-hoc isolation check failed
    #[error("Sub-graphs are not isolated: edge {from} -> {to} crosses subgraphs {from_group} and {to_group}")]
    CrossComponentEdge {
        from: usize,
        to: usize,
        from_group: usize,
        to_group: usize,
    },

    /// Dataset content is malformed
    #[error("Malformed dataset: {0}")]
    DataError(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// CSV parsing error
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerError(#[from] toml::ser::Error),
}

impl Error {
    /// Whether the error signals corrupted ground-truth split data
    pub fn is_integrity_violation(&self) -> bool {
        matches!(
            self,
            Error::AmbiguousNodeSplit { .. }
                | Error::EdgeSplitMismatch { .. }
                | Error::InconsistentSplit { .. }
                | Error::CrossComponentEdge { .. }
        )
    }

    pub(crate) fn dims(context: &'static str, expected: usize, actual: usize) -> Self {
        Error::DimensionMismatch {
            context,
            expected,
            actual,
        }
    }
}
