//! Generating registry entries from what a project has released.
//!
//! [`Generator::generate`] looks up a GitHub repository or a crates.io
//! crate and infers a [`PackageInfo`] that reproduces the release assets.
//! Without `--limit 1` or an explicit version, the whole release history is
//! split into `version_overrides`.

mod config;
mod group;
mod patch;
mod release;

use std::path::PathBuf;
use std::sync::Arc;

use aqua_schema::aqua_config::Package;
use aqua_schema::expr::ExprError;
use aqua_schema::registry::File;
use aqua_schema::{PackageInfo, PackageType, RegistryConfig};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::sources::{CargoSource, GitHubSource};

pub use config::{CONFIG_FILE_NAME, GenerateConfig, RawConfig, init_config};
pub use group::{GenRelease, generate_version_overrides, replace_version};
pub use patch::patch_release;
pub use release::{
    AssetFile, asset_file_releases, exclude_asset, exclude_version, read_asset_file,
};

use release::{github_releases, list_release_assets, tolerate};

/// Errors raised while generating a registry entry.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    /// A file could not be read or written.
    #[error("access {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid YAML.
    #[error("decode a generate configuration file as YAML: {0}")]
    ConfigDecode(#[from] serde_yaml::Error),

    /// A filter in the configuration does not compile.
    #[error(transparent)]
    Expression(#[from] ExprError),

    /// The asset file is not a JSON map of tags to asset names.
    #[error("read the asset file {path} as JSON: {source}")]
    AssetFile {
        /// Asset file that failed.
        path: PathBuf,
        /// Decode error.
        #[source]
        source: serde_json::Error,
    },

    /// The package argument names another package than the configuration file.
    #[error(
        "a given package name {arg:?} is different from the package name in the configuration file {config:?}"
    )]
    PackageMismatch {
        /// Name given on the command line.
        arg: String,
        /// Name in the configuration file.
        config: String,
    },

    /// The generated registry could not be encoded.
    #[error("encode YAML: {0}")]
    Encode(#[source] serde_yaml::Error),

    /// The run was canceled.
    #[error("operation canceled")]
    Canceled,
}

/// Options of one generation run.
#[derive(Debug, Clone, Default)]
pub struct GenerateParam {
    /// Maximum number of releases to read. 0 means no limit; 1 generates
    /// from the latest release only.
    pub limit: usize,
    /// Command names to declare as `files`.
    pub commands: Vec<String>,
    /// Release assets to use instead of the GitHub API.
    pub asset_file: Option<AssetFile>,
}

/// A generated package and the versions it was built from, newest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Generated {
    /// The registry entry.
    pub package: PackageInfo,
    /// Release tags the entry covers, newest first.
    pub versions: Vec<String>,
}

/// Package names to generate: the arguments, else the configured one.
///
/// # Errors
///
/// Returns [`GenerateError::PackageMismatch`] when both are given and
/// disagree.
pub fn parse_args(args: Vec<String>, cfg: &GenerateConfig) -> Result<Vec<String>, GenerateError> {
    let Some(first) = args.first() else {
        if cfg.package.is_empty() {
            return Ok(Vec::new());
        }
        return Ok(vec![cfg.package.clone()]);
    };
    if !cfg.package.is_empty() && &cfg.package != first {
        return Err(GenerateError::PackageMismatch {
            arg: first.clone(),
            config: cfg.package.clone(),
        });
    }
    Ok(args)
}

/// Strip emoji, surrounding whitespace and trailing `.!?`.
pub fn clean_description(desc: &str) -> String {
    let without_emoji: String = desc.chars().filter(|c| !is_emoji(*c)).collect();
    without_emoji
        .trim()
        .trim_end_matches(['.', '!', '?'])
        .to_string()
}

fn is_emoji(c: char) -> bool {
    matches!(
        u32::from(c),
        0x1F000..=0x1FAFF | 0x2600..=0x27BF | 0x2B00..=0x2BFF | 0xFE0F | 0x200D | 0x20E3
    )
}

/// `aqua.yaml` entries pinning `versions`: the newest inline, the rest
/// with an explicit `version`.
pub fn testdata_packages(pkg_name: &str, versions: &[String]) -> Vec<Package> {
    let Some((newest, rest)) = versions.split_first() else {
        return Vec::new();
    };
    let mut pkgs = Vec::with_capacity(versions.len());
    pkgs.push(Package {
        name: format!("{pkg_name}@{newest}"),
        ..Package::default()
    });
    pkgs.extend(rest.iter().map(|v| Package {
        name: pkg_name.to_string(),
        version: v.clone(),
        ..Package::default()
    }));
    pkgs
}

/// A registry document holding `packages`.
///
/// # Errors
///
/// Returns [`GenerateError::Encode`] when serialization fails.
pub fn to_registry_yaml(packages: Vec<PackageInfo>) -> Result<String, GenerateError> {
    serde_yaml::to_string(&RegistryConfig { packages }).map_err(GenerateError::Encode)
}

/// Reads releases and crates through the injected sources.
#[derive(Clone)]
pub struct Generator {
    github: Arc<dyn GitHubSource>,
    cargo: Arc<dyn CargoSource>,
}

impl std::fmt::Debug for Generator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Generator").finish_non_exhaustive()
    }
}

impl Generator {
    /// Generator over a GitHub and a crates.io source.
    pub fn new(github: Arc<dyn GitHubSource>, cargo: Arc<dyn CargoSource>) -> Self {
        Self { github, cargo }
    }

    /// Generate the package for `arg` (`owner/repo`, `owner/repo@tag` or
    /// `crates.io/<crate>`).
    ///
    /// Lookup failures are logged and leave the affected fields empty.
    ///
    /// # Errors
    ///
    /// Returns [`GenerateError::Canceled`] when `cancel` fires.
    pub async fn generate(
        &self,
        arg: &str,
        param: &GenerateParam,
        cfg: &GenerateConfig,
        cancel: &CancellationToken,
    ) -> Result<Generated, GenerateError> {
        let mut generated = self.generate_main(arg, param, cfg, cancel).await?;
        generated.package.description = clean_description(&generated.package.description);
        if !param.commands.is_empty() {
            generated.package.files = param
                .commands
                .iter()
                .map(|name| File {
                    name: name.clone(),
                    ..File::default()
                })
                .collect();
        }
        Ok(generated)
    }

    async fn generate_main(
        &self,
        arg: &str,
        param: &GenerateParam,
        cfg: &GenerateConfig,
        cancel: &CancellationToken,
    ) -> Result<Generated, GenerateError> {
        let (pkg_name, version) = arg.split_once('@').unwrap_or((arg, ""));
        if pkg_name.starts_with("crates.io/") {
            return self.generate_cargo(pkg_name, cancel).await;
        }
        let mut pkg = PackageInfo {
            pkg_type: Some(PackageType::GithubRelease),
            version_prefix: cfg.version_prefix.clone(),
            version_filter: cfg.version_filter_source.clone(),
            ..PackageInfo::default()
        };
        let parts: Vec<&str> = pkg_name.split('/').collect();
        let [owner, repo, ..] = parts.as_slice() else {
            pkg.name = pkg_name.to_string();
            return Ok(Generated {
                package: pkg,
                versions: Vec::new(),
            });
        };
        if parts.len() != 2 {
            pkg.name = pkg_name.to_string();
        }
        pkg.repo_owner = (*owner).to_string();
        pkg.repo_name = (*repo).to_string();

        let result = self.github.get_repository(owner, repo, cancel).await;
        if let Some(repository) = tolerate(result, "get the repository", &pkg)? {
            pkg.description = repository.description.unwrap_or_default();
        }

        if param.limit != 1 && version.is_empty() {
            let releases = match &param.asset_file {
                Some(file) => asset_file_releases(file, cfg),
                None => {
                    github_releases(self.github.as_ref(), &pkg, param.limit, cfg, cancel).await?
                }
            };
            let versions = generate_version_overrides(&mut pkg, pkg_name, releases);
            if !pkg.version_overrides.is_empty() {
                pkg.version_constraints = "false".to_string();
            }
            return Ok(Generated {
                package: pkg,
                versions,
            });
        }

        let result = if version.is_empty() {
            self.github.get_latest_release(owner, repo, cancel).await
        } else {
            self.github.get_release_by_tag(owner, repo, version, cancel).await
        };
        let Some(release) = tolerate(result, "get the release", &pkg)? else {
            let versions = if version.is_empty() {
                Vec::new()
            } else {
                vec![version.to_string()]
            };
            return Ok(Generated {
                package: pkg,
                versions,
            });
        };
        debug!(version = %release.tag_name, "got the release");

        let assets = list_release_assets(self.github.as_ref(), &pkg, release.id, cancel).await?;
        debug!(num_of_assets = assets.len(), "got assets");
        let assets: Vec<String> = assets
            .into_iter()
            .filter(|a| !exclude_asset(a, cfg))
            .collect();
        patch_release(&mut pkg, pkg_name, &release.tag_name, &assets, release.immutable);
        Ok(Generated {
            package: pkg,
            versions: vec![release.tag_name],
        })
    }

    async fn generate_cargo(
        &self,
        pkg_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Generated, GenerateError> {
        let crate_name = pkg_name.trim_start_matches("crates.io/");
        let mut pkg = PackageInfo {
            name: pkg_name.to_string(),
            pkg_type: Some(PackageType::Cargo),
            crate_name: crate_name.to_string(),
            ..PackageInfo::default()
        };
        let result = self.cargo.get_crate(crate_name, cancel).await;
        if let Some(info) = tolerate(result, "get a crate metadata by crates.io API", &pkg)? {
            pkg.description = info.description.unwrap_or_default();
            if info.homepage != info.repository {
                pkg.link = info.homepage.unwrap_or_default();
            }
            if let Some((owner, repo)) = info.repository.as_deref().and_then(github_repo) {
                pkg.repo_owner = owner.to_string();
                pkg.repo_name = repo.to_string();
            }
        }
        let result = self.cargo.get_latest_version(crate_name, cancel).await;
        let versions = tolerate(result, "get a latest version by crates.io API", &pkg)?
            .flatten()
            .into_iter()
            .collect();
        Ok(Generated {
            package: pkg,
            versions,
        })
    }
}

/// Owner and name of a `https://github.com/<owner>/<repo>` URL.
///
/// Trailing slashes, a `.git` suffix and deeper paths are ignored.
fn github_repo(url: &str) -> Option<(&str, &str)> {
    let path = url
        .strip_prefix("https://github.com/")?
        .trim_end_matches('/');
    let mut parts = path.split('/');
    let owner = parts.next().filter(|s| !s.is_empty())?;
    let repo = parts.next()?;
    let repo = repo.strip_suffix(".git").unwrap_or(repo);
    (!repo.is_empty()).then_some((owner, repo))
}
