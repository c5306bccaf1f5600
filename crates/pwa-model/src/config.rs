//! Evaluation settings loaded from YAML.

use std::fs;
use std::path::Path;

use pwa_core::errors::{ErrorInfo, PwaError};
use pwa_data::PartitionStrategy;
use serde::{Deserialize, Serialize};

/// YAML-configurable settings of an evaluation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalConfig {
    /// How the dataset is split into independently evaluated partitions.
    #[serde(default)]
    pub partitioning: PartitionStrategy,
    /// Number of worker threads evaluating partitions.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Drop events with a non-finite log intensity from likelihood sums.
    #[serde(default = "default_exclude_non_finite")]
    pub exclude_non_finite: bool,
}

fn default_concurrency() -> usize {
    1
}

fn default_exclude_non_finite() -> bool {
    true
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            partitioning: PartitionStrategy::default(),
            concurrency: default_concurrency(),
            exclude_non_finite: default_exclude_non_finite(),
        }
    }
}

impl EvalConfig {
    /// Parses and validates a YAML document.
    pub fn from_yaml_str(contents: &str) -> Result<Self, PwaError> {
        let config: EvalConfig = serde_yaml::from_str(contents)
            .map_err(|err| PwaError::Config(ErrorInfo::new("config-parse", err.to_string())))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a YAML file.
    pub fn load(path: &Path) -> Result<Self, PwaError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            PwaError::Config(
                ErrorInfo::new("config-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        Self::from_yaml_str(&contents).map_err(|err| err.with_context("path", path.display().to_string()))
    }

    /// Renders the configuration as YAML.
    pub fn to_yaml_string(&self) -> Result<String, PwaError> {
        serde_yaml::to_string(self)
            .map_err(|err| PwaError::Config(ErrorInfo::new("config-serialize", err.to_string())))
    }

    /// Rejects settings that can never produce a pass.
    pub fn validate(&self) -> Result<(), PwaError> {
        let (field, value) = match self.partitioning {
            PartitionStrategy::Block { count } | PartitionStrategy::Weave { count } => ("count", count),
            PartitionStrategy::BlockBySize { size } => ("size", size),
        };
        if value == 0 {
            return Err(PwaError::Config(
                ErrorInfo::new("invalid-config", "partitioning needs a positive count or size")
                    .with_context(field, value),
            ));
        }
        if self.concurrency == 0 {
            return Err(PwaError::Config(
                ErrorInfo::new("invalid-config", "concurrency must be at least one worker")
                    .with_context("concurrency", self.concurrency),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = EvalConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, EvalConfig::default());
    }

    #[test]
    fn parses_partitioning_strategy() {
        let yaml = "partitioning:\n  kind: weave\n  count: 4\nconcurrency: 2\nexclude_non_finite: false\n";
        let config = EvalConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.partitioning, PartitionStrategy::Weave { count: 4 });
        assert_eq!(config.concurrency, 2);
        assert!(!config.exclude_non_finite);
        let again = EvalConfig::from_yaml_str(&config.to_yaml_string().unwrap()).unwrap();
        assert_eq!(again, config);
    }

    #[test]
    fn rejects_zero_sized_partitions() {
        let err = EvalConfig::from_yaml_str("partitioning:\n  kind: block-by-size\n  size: 0\n").unwrap_err();
        assert!(matches!(err, PwaError::Config(ref info) if info.code == "invalid-config"));
        let err = EvalConfig::from_yaml_str("concurrency: [1]").unwrap_err();
        assert_eq!(err.code(), "config-parse");
    }
}
