//! `aqua.yaml`: the user's registries and pinned packages.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name used when a package does not name its registry.
pub const STANDARD_REGISTRY: &str = "standard";

const STANDARD_REPO_OWNER: &str = "aquaproj";
const STANDARD_REPO_NAME: &str = "aqua-registry";
const STANDARD_PATH: &str = "registry.yaml";

/// Invalid user configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A registry has an unknown `type`.
    #[error("registry {0} has an unknown type")]
    UnknownRegistryType(String),

    /// A registry lacks a field its type needs.
    #[error("registry {name} requires {field}")]
    MissingField {
        /// Registry name.
        name: String,
        /// Missing field.
        field: &'static str,
    },

    /// A package gives no version.
    #[error("package {0} has no version")]
    MissingVersion(String),
}

/// Kind of registry source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryType {
    /// Shorthand for the aquaproj/aqua-registry repository.
    #[default]
    Standard,
    /// A file in a GitHub repository at a ref.
    GithubContent,
    /// A file on disk, relative to `aqua.yaml`.
    Local,
    /// Any other value.
    #[serde(other)]
    Unknown,
}

/// A registry declared in `aqua.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    /// Name packages refer to.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Where the registry lives.
    #[serde(rename = "type", default)]
    pub registry_type: RegistryType,
    /// Repository owner for `github_content`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub repo_owner: String,
    /// Repository name for `github_content`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub repo_name: String,
    /// Git ref for `standard` and `github_content`.
    #[serde(rename = "ref", default, skip_serializing_if = "String::is_empty")]
    pub git_ref: String,
    /// File path in the repository or on disk.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    /// The repository is private.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub private: bool,
}

impl Registry {
    /// Expand `type: standard` into its `github_content` form.
    pub fn normalize(&self) -> Registry {
        if self.registry_type != RegistryType::Standard {
            return self.clone();
        }
        Registry {
            name: if self.name.is_empty() {
                STANDARD_REGISTRY.to_string()
            } else {
                self.name.clone()
            },
            registry_type: RegistryType::GithubContent,
            repo_owner: STANDARD_REPO_OWNER.to_string(),
            repo_name: STANDARD_REPO_NAME.to_string(),
            git_ref: self.git_ref.clone(),
            path: STANDARD_PATH.to_string(),
            private: false,
        }
    }

    /// Check the fields required by the registry type.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] describing the first missing field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let missing = |field| ConfigError::MissingField {
            name: self.name.clone(),
            field,
        };
        match self.normalize().registry_type {
            RegistryType::GithubContent => {
                if self.repo_owner.is_empty() && self.registry_type != RegistryType::Standard {
                    return Err(missing("repo_owner"));
                }
                if self.repo_name.is_empty() && self.registry_type != RegistryType::Standard {
                    return Err(missing("repo_name"));
                }
                if self.git_ref.is_empty() {
                    return Err(missing("ref"));
                }
                Ok(())
            }
            RegistryType::Local => {
                if self.path.is_empty() {
                    return Err(missing("path"));
                }
                Ok(())
            }
            RegistryType::Standard | RegistryType::Unknown => {
                Err(ConfigError::UnknownRegistryType(self.name.clone()))
            }
        }
    }

    /// Where the registry file lives on disk.
    ///
    /// `root` is the aqua root directory; `cfg_dir` is the directory of the
    /// `aqua.yaml` that declared the registry.
    pub fn file_path(&self, root: &Path, cfg_dir: &Path) -> PathBuf {
        let r = self.normalize();
        match r.registry_type {
            RegistryType::Local => cfg_dir.join(&r.path),
            _ => root
                .join("registries")
                .join("github_content")
                .join("github.com")
                .join(&r.repo_owner)
                .join(&r.repo_name)
                .join(&r.git_ref)
                .join(&r.path),
        }
    }
}

/// A package pinned in `aqua.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    /// `owner/repo` or `owner/repo@version`.
    pub name: String,
    /// Registry name. Defaults to `standard`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub registry: String,
    /// Version, when not given inline.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    /// Documentation link.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub link: String,
    /// Free text.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Tags for filtering installs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl Package {
    /// Package name with any inline `@version` removed.
    pub fn name(&self) -> &str {
        if self.version.is_empty() {
            self.name.split_once('@').map_or(&self.name, |(n, _)| n)
        } else {
            &self.name
        }
    }

    /// Explicit `version`, else the inline `@version`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingVersion`] when neither is given.
    pub fn version(&self) -> Result<&str, ConfigError> {
        if !self.version.is_empty() {
            return Ok(&self.version);
        }
        match self.name.split_once('@') {
            Some((_, v)) if !v.is_empty() => Ok(v),
            _ => Err(ConfigError::MissingVersion(self.name.clone())),
        }
    }

    /// Registry name, defaulting to `standard`.
    pub fn registry(&self) -> &str {
        if self.registry.is_empty() {
            STANDARD_REGISTRY
        } else {
            &self.registry
        }
    }
}

/// Top-level `aqua.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AquaConfig {
    /// Declared registries.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub registries: Vec<Registry>,
    /// Pinned packages.
    #[serde(default)]
    pub packages: Vec<Package>,
}

impl AquaConfig {
    /// Parse `aqua.yaml`.
    ///
    /// # Errors
    ///
    /// Returns the decoder error on malformed input.
    pub fn from_yaml(s: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(s)
    }

    /// Registries with `standard` expanded, keyed by name.
    pub fn registry(&self, name: &str) -> Option<Registry> {
        self.registries
            .iter()
            .map(Registry::normalize)
            .find(|r| r.name == name)
    }
}
