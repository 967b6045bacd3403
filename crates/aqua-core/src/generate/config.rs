//! `aqua-generate-registry.yaml`.

use std::path::Path;

use aqua_schema::expr::{AssetFilter, VersionFilter};
use serde::{Deserialize, Serialize};

use super::GenerateError;

/// Configuration file written by `--init`.
pub const CONFIG_FILE_NAME: &str = "aqua-generate-registry.yaml";

const CONFIG_TEMPLATE: &str = r#"# Configuration of `aqua generate-registry`.
name: {{name}}
# version_prefix: cli-
# version_filter: 'not (Version contains "-rc")'
# all_assets_filter: 'not (Asset contains "static")'
"#;

/// The file as written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawConfig {
    /// Package the file belongs to.
    #[serde(rename = "name", default)]
    pub package: String,
    /// Only tags with this prefix are read.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version_prefix: String,
    /// Expression over `Version` selecting the releases to read.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version_filter: String,
    /// Expression over `Asset` selecting the assets to read.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub all_assets_filter: String,
}

/// Compiled settings.
#[derive(Debug, Clone, Default)]
pub struct GenerateConfig {
    /// Package the configuration belongs to.
    pub package: String,
    /// Required tag prefix.
    pub version_prefix: String,
    /// Compiled `version_filter`.
    pub version_filter: Option<VersionFilter>,
    /// Source text of `version_filter`, copied into the generated package.
    pub version_filter_source: String,
    /// Compiled `all_assets_filter`.
    pub all_assets_filter: Option<AssetFilter>,
}

impl GenerateConfig {
    /// Compile the filters of `raw`.
    ///
    /// # Errors
    ///
    /// Returns [`GenerateError::Expression`] when a filter does not compile.
    pub fn from_raw(raw: RawConfig) -> Result<Self, GenerateError> {
        let version_filter = if raw.version_filter.is_empty() {
            None
        } else {
            Some(VersionFilter::compile(&raw.version_filter)?)
        };
        let all_assets_filter = if raw.all_assets_filter.is_empty() {
            None
        } else {
            Some(AssetFilter::compile(&raw.all_assets_filter)?)
        };
        Ok(Self {
            package: raw.package,
            version_prefix: raw.version_prefix,
            version_filter,
            version_filter_source: raw.version_filter,
            all_assets_filter,
        })
    }

    /// # Errors
    ///
    /// Returns [`GenerateError::ConfigDecode`] for malformed YAML and
    /// [`GenerateError::Expression`] for filters that do not compile.
    pub fn from_yaml(s: &str) -> Result<Self, GenerateError> {
        let raw: Option<RawConfig> = serde_yaml::from_str(s)?;
        Self::from_raw(raw.unwrap_or_default())
    }

    /// # Errors
    ///
    /// Returns [`GenerateError::Io`] when the file cannot be read, else as
    /// [`from_yaml`](Self::from_yaml).
    pub fn read(path: &Path) -> Result<Self, GenerateError> {
        let s = std::fs::read_to_string(path).map_err(|source| GenerateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&s)
    }
}

/// Write a starter config for `package` into `dir`, leaving an existing
/// file alone. Returns whether a file was written.
///
/// # Errors
///
/// Returns [`GenerateError::Io`] when the file cannot be written.
pub fn init_config(dir: &Path, package: &str) -> Result<bool, GenerateError> {
    let path = dir.join(CONFIG_FILE_NAME);
    if path.exists() {
        return Ok(false);
    }
    let body = CONFIG_TEMPLATE.replace("{{name}}", package);
    std::fs::write(&path, body).map_err(|source| GenerateError::Io { path, source })?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_yaml() {
        let cfg = GenerateConfig::from_yaml(
            r#"
name: cli/cli
version_prefix: v
version_filter: 'not (Version contains "rc")'
all_assets_filter: 'not (Asset contains "static")'
"#,
        )
        .unwrap();
        assert_eq!(cfg.package, "cli/cli");
        assert_eq!(cfg.version_prefix, "v");
        assert_eq!(cfg.version_filter_source, r#"not (Version contains "rc")"#);
        assert!(cfg.version_filter.as_ref().unwrap().check("v1.0.0", ""));
        assert!(!cfg.all_assets_filter.as_ref().unwrap().check("tool-static.tar.gz"));
    }

    #[test]
    fn test_empty_document() {
        let cfg = GenerateConfig::from_yaml("").unwrap();
        assert!(cfg.package.is_empty());
        assert!(cfg.version_filter.is_none());
    }

    #[test]
    fn test_bad_filter() {
        let err = GenerateConfig::from_yaml("version_filter: 'Version =='").unwrap_err();
        assert!(matches!(err, GenerateError::Expression(_)));
    }

    #[test]
    fn test_init_config_keeps_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(init_config(dir.path(), "cli/cli").unwrap());
        let written = GenerateConfig::read(&dir.path().join(CONFIG_FILE_NAME)).unwrap();
        assert_eq!(written.package, "cli/cli");
        assert!(!init_config(dir.path(), "other/tool").unwrap());
    }
}
