//! Configuration structures for Tabula.

use crate::error::{Result, TabulaError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How the record codec treats values that cannot be encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingPolicy {
    /// Reject malformed values with an encoding error.
    Strict,
    /// Substitute the column default and log a warning.
    #[default]
    Lenient,
}

/// Storage configuration for the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for data, index and lock files.
    pub data_dir: PathBuf,
    /// Maximum records per data page.
    pub block_factor: usize,
    /// Maximum separator keys in the sparse index block.
    pub index_capacity: usize,
    /// Maximum keys per B+ tree node.
    pub btree_max_keys: usize,
    /// Handling of malformed values during record encoding.
    pub encoding_policy: EncodingPolicy,
    /// Enable fsync after block writes.
    pub fsync_enabled: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            block_factor: 8,
            index_capacity: 64,
            btree_max_keys: 32,
            encoding_policy: EncodingPolicy::Lenient,
            fsync_enabled: true,
        }
    }
}

impl StorageConfig {
    /// Creates a default configuration rooted at `data_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Checks the numeric parameters.
    pub fn validate(&self) -> Result<()> {
        if self.block_factor == 0 {
            return Err(invalid("block_factor", self.block_factor));
        }
        if self.index_capacity == 0 {
            return Err(invalid("index_capacity", self.index_capacity));
        }
        if self.btree_max_keys < 2 {
            return Err(invalid("btree_max_keys", self.btree_max_keys));
        }
        Ok(())
    }

    /// Loads and validates a configuration from a JSON file.
    ///
    /// Missing fields take their default values.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config: StorageConfig = serde_json::from_str(&text)
            .map_err(|e| TabulaError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Returns the path of a file inside the data directory.
    pub fn file_path(&self, file_name: &str) -> PathBuf {
        self.data_dir.join(file_name)
    }
}

fn invalid(name: &str, value: usize) -> TabulaError {
    TabulaError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
    }
}
