//! Packing configuration
//!
//! Parsed from a small JSON file; every field is optional.

use std::path::Path;

use serde::Deserialize;

use crate::parallel::ParallelConfig;
use crate::Result;

/// Accelerator family whose attention kernel consumes the packed batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Accelerator {
    /// Kernels that only need cumulative offsets.
    #[default]
    Gpu,
    /// Kernels that also take a query/kv index split per context-parallel rank.
    Npu,
}

/// Top-level packing configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackingConfig {
    /// Selects the packing strategy
    #[serde(default)]
    pub accelerator: Accelerator,

    /// Parallel layout of this process
    #[serde(default)]
    pub parallel: ParallelConfig,
}

impl PackingConfig {
    /// Load configuration from a JSON file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed, or describes an
    /// invalid parallel layout
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_json(&content)?;
        tracing::debug!(path = %path.display(), ?config, "loaded packing config");
        Ok(config)
    }

    /// Parse configuration from a JSON string
    ///
    /// # Errors
    /// Returns an error if the JSON is malformed or the parallel layout is invalid
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.parallel.validate()?;
        Ok(config)
    }
}
