//! Per-configuration cache of the registry packages it uses.
//!
//! Each `aqua.yaml` gets its own file, named after the URL-safe base64 of
//! the configuration path, holding `{registry path → {name → PackageInfo}}`.

use std::collections::{BTreeMap, BTreeSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use aqua_schema::PackageInfo;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use thiserror::Error;
use tracing::debug;

use crate::paths::registry_cache_dir;

type Entries = BTreeMap<String, BTreeMap<String, PackageInfo>>;

/// Errors reading or writing the registry cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The cache file exists but could not be read.
    #[error("failed to read the registry cache {path}")]
    Read {
        /// Cache file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The cache file is not valid JSON.
    #[error("failed to decode the registry cache {path}")]
    Decode {
        /// Cache file.
        path: PathBuf,
        /// Decode error.
        #[source]
        source: serde_json::Error,
    },

    /// The cache file or its directory could not be written.
    #[error("failed to write the registry cache {path}")]
    Write {
        /// Cache file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The cache could not be encoded.
    #[error("failed to encode the registry cache")]
    Encode(#[source] serde_json::Error),
}

/// Cache file for the configuration at `cfg_path`.
pub fn cache_file_path(root: &Path, cfg_path: &Path) -> PathBuf {
    let key = URL_SAFE.encode(cfg_path.to_string_lossy().as_bytes());
    registry_cache_dir(root).join(format!("{key}.json"))
}

/// Registry packages of one configuration.
///
/// Callers hold it behind `&mut` for [`add`](Self::add),
/// [`clean`](Self::clean) and [`write`](Self::write).
#[derive(Debug)]
pub struct RegistryCache {
    path: PathBuf,
    entries: Entries,
    dirty: bool,
}

impl RegistryCache {
    /// Load the cache for `cfg_path`. A missing file gives an empty cache.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Read`] on I/O failure and
    /// [`CacheError::Decode`] when the file is not a valid cache.
    pub fn new(root: &Path, cfg_path: &Path) -> Result<Self, CacheError> {
        let path = cache_file_path(root, cfg_path);
        let entries = match std::fs::read(&path) {
            Ok(bytes) => {
                serde_json::from_slice(&bytes).map_err(|source| CacheError::Decode {
                    path: path.clone(),
                    source,
                })?
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Entries::new(),
            Err(source) => return Err(CacheError::Read { path, source }),
        };
        Ok(Self {
            path,
            entries,
            dirty: false,
        })
    }

    /// Where the cache lives.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert or replace `pkg` under its name.
    pub fn add(&mut self, registry_path: &str, pkg: PackageInfo) {
        self.entries
            .entry(registry_path.to_string())
            .or_default()
            .insert(pkg.get_name(), pkg);
        self.dirty = true;
    }

    /// Cached definition of `name` in `registry_path`.
    pub fn get(&self, registry_path: &str, name: &str) -> Option<&PackageInfo> {
        self.entries.get(registry_path)?.get(name)
    }

    /// Drop every registry not in `keep`.
    pub fn clean(&mut self, keep: &BTreeSet<String>) {
        let before = self.entries.len();
        self.entries.retain(|rg, _| keep.contains(rg));
        if self.entries.len() != before {
            debug!(
                removed = before - self.entries.len(),
                "evict unused registries from the cache"
            );
            self.dirty = true;
        }
    }

    /// Persist the cache if anything changed since it was loaded.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Write`] when the directory or file cannot be
    /// written.
    pub fn write(&mut self) -> Result<(), CacheError> {
        if !self.dirty {
            return Ok(());
        }
        let write_err = |source| CacheError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(write_err)?;
        }
        let body = serde_json::to_vec(&self.entries).map_err(CacheError::Encode)?;
        std::fs::write(&self.path, body).map_err(write_err)?;
        self.dirty = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aqua_schema::PackageType;
    use tempfile::tempdir;

    fn pkg(name: &str) -> PackageInfo {
        PackageInfo {
            name: name.into(),
            pkg_type: Some(PackageType::GithubRelease),
            asset: "tool.tar.gz".into(),
            ..PackageInfo::default()
        }
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let cache = RegistryCache::new(dir.path(), Path::new("/work/aqua.yaml")).unwrap();
        assert!(cache.get("registry.yaml", "acme/tool").is_none());
    }

    #[test]
    fn test_write_then_load() {
        let dir = tempdir().unwrap();
        let cfg = Path::new("/work/aqua.yaml");
        let mut cache = RegistryCache::new(dir.path(), cfg).unwrap();
        cache.add("registry.yaml", pkg("acme/tool"));
        cache.add("local.yaml", pkg("acme/other"));
        cache.write().unwrap();

        let loaded = RegistryCache::new(dir.path(), cfg).unwrap();
        assert_eq!(loaded.entries, cache.entries);
        assert_eq!(loaded.get("registry.yaml", "acme/tool"), Some(&pkg("acme/tool")));
        assert!(
            loaded
                .path()
                .starts_with(dir.path().join("registry-cache"))
        );
    }

    #[test]
    fn test_write_is_noop_when_clean() {
        let dir = tempdir().unwrap();
        let mut cache = RegistryCache::new(dir.path(), Path::new("/work/aqua.yaml")).unwrap();
        cache.write().unwrap();
        assert!(!cache.path().exists());
    }

    #[test]
    fn test_clean_keeps_listed_registries() {
        let dir = tempdir().unwrap();
        let cfg = Path::new("/work/aqua.yaml");
        let mut cache = RegistryCache::new(dir.path(), cfg).unwrap();
        cache.add("a.yaml", pkg("acme/a"));
        cache.add("b.yaml", pkg("acme/b"));
        cache.clean(&BTreeSet::from(["a.yaml".to_string()]));
        cache.write().unwrap();

        let loaded = RegistryCache::new(dir.path(), cfg).unwrap();
        assert!(loaded.get("a.yaml", "acme/a").is_some());
        assert!(loaded.get("b.yaml", "acme/b").is_none());
    }

    #[test]
    fn test_decode_error_is_fatal() {
        let dir = tempdir().unwrap();
        let cfg = Path::new("/work/aqua.yaml");
        let path = cache_file_path(dir.path(), cfg);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            RegistryCache::new(dir.path(), cfg),
            Err(CacheError::Decode { .. })
        ));
    }

    #[test]
    fn test_cache_file_name_is_url_safe() {
        let path = cache_file_path(Path::new("/root"), Path::new("/a/b?/aqua.yaml"));
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.ends_with(".json"));
        assert!(!name.trim_end_matches(".json").contains('/'));
    }
}
