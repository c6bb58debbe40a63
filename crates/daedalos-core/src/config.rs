//! Configuration file loading for Daedalos tools
//!
//! Every tool keeps an optional JSON file under the Daedalos config directory.
//! A missing file is not an error: the tool falls back to its defaults.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::Path;

/// Load a config file, or the default value when the file does not exist
pub fn load_or_default<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        return Ok(T::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;

    if content.trim().is_empty() {
        return Ok(T::default());
    }

    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config: {}", path.display()))
}
