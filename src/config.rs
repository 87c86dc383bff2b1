//! Configuration handling.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::gat::GatConfig;

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// GAT architecture
    #[serde(default)]
    pub model: GatConfig,
    /// Subgraph partitioning and batching
    #[serde(default)]
    pub preprocess: PreprocessConfig,
}

impl Config {
    /// Load configuration from TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file.
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.model.validate()?;
        self.preprocess.validate()
    }
}

/// PPI preprocessing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Hop radius of the attention neighbourhood
    pub nhood: usize,
    /// Components smaller than this are pooled into per-split leftovers
    pub min_subgraph_size: usize,
    /// Z-score features with statistics of the training nodes
    pub standardize: bool,
    /// Add missing reverse edges instead of rejecting a directed graph
    pub symmetrize: bool,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            nhood: 1,
            min_subgraph_size: 3,
            standardize: true,
            symmetrize: true,
        }
    }
}

impl PreprocessConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_subgraph_size == 0 {
            return Err(Error::ConfigError("min_subgraph_size must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.model.hid_units, vec![256, 256]);
        assert_eq!(config.model.n_heads, vec![4, 4, 6]);
        assert_eq!(config.preprocess.nhood, 1);
        assert_eq!(config.preprocess.min_subgraph_size, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.model = GatConfig::citation();
        config.preprocess.nhood = 2;
        config.to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.model.hid_units, vec![8]);
        assert_eq!(loaded.model.n_heads, vec![8, 1]);
        assert!(!loaded.model.residual);
        assert_eq!(loaded.preprocess.nhood, 2);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str("[preprocess]\nmin_subgraph_size = 5\n").unwrap();
        assert_eq!(config.preprocess.min_subgraph_size, 5);
        assert!(config.preprocess.standardize);
        assert_eq!(config.model, GatConfig::default());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[preprocess]\nmin_subgraph_size = 0\n").unwrap();

        assert!(matches!(Config::from_file(&path), Err(Error::ConfigError(_))));
    }
}
