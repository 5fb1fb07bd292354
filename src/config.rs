//! Generator configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{HdtError, Result};

/// Entries per front-coding block.
pub const DEFAULT_BLOCK_SIZE: usize = 16;

/// Largest accepted front-coding block.
pub const MAX_BLOCK_SIZE: usize = 4096;

/// Triple count above which sorting runs on the rayon pool.
pub const DEFAULT_PARALLEL_SORT_THRESHOLD: usize = 100_000;

/// Tunables for building a container. Persisted as JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Entries per front-coded dictionary block.
    pub block_size: usize,
    /// Sort in parallel when there are more triples than this.
    pub parallel_sort_threshold: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            parallel_sort_threshold: DEFAULT_PARALLEL_SORT_THRESHOLD,
        }
    }
}

impl GeneratorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 || self.block_size > MAX_BLOCK_SIZE {
            return Err(HdtError::InvalidConfig(format!(
                "block_size must be in 1..={}, got {}",
                MAX_BLOCK_SIZE, self.block_size
            )));
        }
        Ok(())
    }

    /// Read a JSON config file and validate it.
    pub fn read_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = GeneratorConfig::default();
        assert_eq!(config.block_size, 16);
        assert_eq!(config.parallel_sort_threshold, 100_000);
        config.validate().unwrap();
    }

    #[test]
    fn test_invalid_block_size() {
        for block_size in [0, 4097] {
            let config = GeneratorConfig {
                block_size,
                ..Default::default()
            };
            let err = config.validate().unwrap_err();
            assert_eq!(err.code(), "INVALID_CONFIG");
        }
    }

    #[test]
    fn test_json_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("generator.json");
        let config = GeneratorConfig {
            block_size: 32,
            parallel_sort_threshold: 10,
        };
        config.write_to(&path).unwrap();
        assert_eq!(GeneratorConfig::read_from(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let config: GeneratorConfig = serde_json::from_str(r#"{"block_size": 8}"#).unwrap();
        assert_eq!(config.block_size, 8);
        assert_eq!(config.parallel_sort_threshold, DEFAULT_PARALLEL_SORT_THRESHOLD);
    }

    #[test]
    fn test_read_rejects_invalid() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"block_size": 0}"#).unwrap();
        assert_eq!(
            GeneratorConfig::read_from(&path).unwrap_err().code(),
            "INVALID_CONFIG"
        );
        std::fs::write(&path, "not json").unwrap();
        assert_eq!(
            GeneratorConfig::read_from(&path).unwrap_err().code(),
            "INTERNAL_ERROR"
        );
    }
}
