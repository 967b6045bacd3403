//! Cache command

use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use aqua_core::registry_cache::RegistryCache;
use aqua_core::try_root_dir;
use aqua_schema::AquaConfig;

/// Evict cached registries that `config` no longer declares.
pub fn clean(config: &Path, out: &mut impl Write) -> Result<()> {
    let root = try_root_dir().context("Failed to resolve the aqua root directory")?;
    clean_in(&root, config, out)
}

fn clean_in(root: &Path, config: &Path, out: &mut impl Write) -> Result<()> {
    let cfg_path = std::path::absolute(config)
        .with_context(|| format!("Failed to resolve {}", config.display()))?;
    let s = std::fs::read_to_string(&cfg_path)
        .with_context(|| format!("Failed to read {}", cfg_path.display()))?;
    let cfg = AquaConfig::from_yaml(&s)
        .with_context(|| format!("Failed to parse {}", cfg_path.display()))?;
    let cfg_dir = cfg_path.parent().unwrap_or(Path::new("."));

    let keep: BTreeSet<String> = cfg
        .registries
        .iter()
        .map(|r| r.file_path(root, cfg_dir).to_string_lossy().into_owned())
        .collect();
    let mut cache = RegistryCache::new(root, &cfg_path)?;
    cache.clean(&keep);
    cache.write()?;
    writeln!(out, "  cleaned {}", cache.path().display())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use aqua_schema::PackageInfo;

    fn pkg(name: &str) -> PackageInfo {
        PackageInfo {
            name: name.into(),
            ..PackageInfo::default()
        }
    }

    #[test]
    fn test_clean_evicts_unreferenced_registries() {
        let root = tempfile::tempdir().unwrap();
        let project = tempfile::tempdir().unwrap();
        let config = project.path().join("aqua.yaml");
        std::fs::write(
            &config,
            "registries:\n  - name: local\n    type: local\n    path: registry.yaml\n",
        )
        .unwrap();
        let kept = project.path().join("registry.yaml");
        let kept = kept.to_string_lossy();

        let cfg_path = std::path::absolute(&config).unwrap();
        let mut cache = RegistryCache::new(root.path(), &cfg_path).unwrap();
        cache.add(&kept, pkg("acme/tool"));
        cache.add("/old/registry.yaml", pkg("acme/old"));
        cache.write().unwrap();

        let mut out = Vec::new();
        clean_in(root.path(), &config, &mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("cleaned"));

        let cache = RegistryCache::new(root.path(), &cfg_path).unwrap();
        assert!(cache.get(&kept, "acme/tool").is_some());
        assert!(cache.get("/old/registry.yaml", "acme/old").is_none());
    }

    #[test]
    fn test_clean_missing_config() {
        let root = tempfile::tempdir().unwrap();
        let mut out = Vec::new();
        assert!(clean_in(root.path(), Path::new("/nonexistent/aqua.yaml"), &mut out).is_err());
    }
}
