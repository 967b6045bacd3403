//! Locations under the aqua root directory.

use std::path::{Path, PathBuf};

use dirs::home_dir;

/// Overrides the root directory.
pub const ROOT_DIR_ENV: &str = "AQUA_ROOT_DIR";

const ROOT_DIR_NAME: &str = "aquaproj-aqua";

fn root_dir_from(
    var: impl Fn(&str) -> Option<String>,
    home: Option<PathBuf>,
) -> Option<PathBuf> {
    if let Some(val) = var(ROOT_DIR_ENV).filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(val));
    }
    if let Some(xdg) = var("XDG_DATA_HOME").filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(xdg).join(ROOT_DIR_NAME));
    }
    if cfg!(windows) {
        return dirs::data_local_dir().map(|d| d.join(ROOT_DIR_NAME));
    }
    home.map(|h| h.join(".local").join("share").join(ROOT_DIR_NAME))
}

/// Returns the root directory, or None if the user's home cannot be resolved.
///
/// `$AQUA_ROOT_DIR`, else `$XDG_DATA_HOME/aquaproj-aqua`, else
/// `~/.local/share/aquaproj-aqua`.
pub fn try_root_dir() -> Option<PathBuf> {
    root_dir_from(|k| std::env::var(k).ok(), home_dir())
}

/// Downloaded registries: `<root>/registries`
pub fn registries_dir(root: &Path) -> PathBuf {
    root.join("registries")
}

/// Per-config registry caches: `<root>/registry-cache`
pub fn registry_cache_dir(root: &Path) -> PathBuf {
    root.join("registry-cache")
}
