//! Subcommand implementations. Each writes its report to `out`.

pub mod cache;
pub mod generate;
pub mod lint;
pub mod list;
pub mod resolve;

use std::path::Path;

use anyhow::{Context, Result};
use aqua_schema::RegistryConfig;

/// Read a YAML registry, or a JSON one when the file ends in `.json`.
pub fn read_registry(path: &Path) -> Result<RegistryConfig> {
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read registry {}", path.display()))?;
    let cfg = if path.extension().is_some_and(|e| e == "json") {
        RegistryConfig::from_json(&s)
            .with_context(|| format!("Failed to parse registry {}", path.display()))?
    } else {
        RegistryConfig::from_yaml(&s)
            .with_context(|| format!("Failed to parse registry {}", path.display()))?
    };
    Ok(cfg)
}
