use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use super::PackageInfo;

/// A registry file: `packages: [PackageInfo, ...]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Package definitions in file order.
    #[serde(default, deserialize_with = "skip_null_entries")]
    pub packages: Vec<PackageInfo>,
}

fn skip_null_entries<'de, D>(deserializer: D) -> Result<Vec<PackageInfo>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<Option<PackageInfo>>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .filter_map(|(i, p)| {
            if p.is_none() {
                debug!(index = i, "ignore an empty package entry");
            }
            p
        })
        .collect())
}

impl RegistryConfig {
    /// Parse a YAML registry.
    ///
    /// # Errors
    ///
    /// Returns the decoder error on malformed input.
    pub fn from_yaml(s: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(s)
    }

    /// Parse a JSON registry.
    ///
    /// # Errors
    ///
    /// Returns the decoder error on malformed input.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Index packages by name and alias.
    ///
    /// The first definition of a name wins. Later duplicates, unnamed
    /// packages and empty aliases are dropped with a debug log.
    pub fn to_map(&self) -> HashMap<String, &PackageInfo> {
        let mut m = HashMap::with_capacity(self.packages.len());
        for pkg in &self.packages {
            let name = pkg.get_name();
            if name.is_empty() {
                debug!("ignore a package without name");
                continue;
            }
            if m.contains_key(&name) {
                debug!(package_name = %name, "ignore a duplicated package");
                continue;
            }
            m.insert(name.clone(), pkg);
        }
        for pkg in &self.packages {
            for alias in &pkg.aliases {
                if alias.name.is_empty() {
                    debug!(package_name = %pkg.get_name(), "ignore an empty alias");
                    continue;
                }
                if m.contains_key(&alias.name) {
                    debug!(alias = %alias.name, "ignore a duplicated alias");
                    continue;
                }
                m.insert(alias.name.clone(), pkg);
            }
        }
        m
    }

    /// Look up a package by name or alias.
    pub fn package(&self, name: &str) -> Option<&PackageInfo> {
        self.packages
            .iter()
            .find(|p| p.get_name() == name)
            .or_else(|| {
                self.packages
                    .iter()
                    .find(|p| p.aliases.iter().any(|a| a.name == name))
            })
    }
}
