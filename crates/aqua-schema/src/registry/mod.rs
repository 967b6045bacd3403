//! Registry data model.
//!
//! A registry is a list of [`PackageInfo`]s. Each one describes how to find
//! a package's artifacts for any version and runtime; the conditional parts
//! ([`VersionOverride`], [`Override`], [`FormatOverride`]) are folded in by
//! [`PackageInfo::with_version`] and [`PackageInfo::apply_runtime`].

mod config;
mod error;
mod overrides;
mod package_type;
mod render;
mod security;
mod supported_envs;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

pub use config::RegistryConfig;
pub use error::ValidationError;
pub use overrides::{FormatOverride, Override, VersionOverride};
pub use package_type::PackageType;
pub use render::RenderError;
pub use security::{
    Checksum, ChecksumPattern, Cosign, DownloadedFile, GitHubArtifactAttestations, Minisign,
    SlsaProvenance,
};
pub use supported_envs::{SupportedEnvs, matches_runtime, normalize_supported_envs};

use crate::expr::{ExprError, SupportedIf};
use crate::runtime::Runtime;

/// Canonical name (`linux`, `amd64`) to the literal a package uses.
pub type Replacements = BTreeMap<String, String>;

/// Alternative lookup name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alias {
    /// The alias.
    pub name: String,
}

/// An executable provided by a package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    /// Command name.
    pub name: String,
    /// Path inside the unpacked artifact (template).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub src: String,
    /// Directory inside the unpacked artifact (template).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dir: String,
    /// Alternative link name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub link: String,
    /// Create a hard link instead of a symlink.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub hard: bool,
}

/// User-supplied template variable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Var {
    /// Variable name.
    pub name: String,
    /// Whether `aqua.yaml` must set it.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
    /// Fallback value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

/// `cargo install` options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cargo {
    /// `--features`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
    /// `--all-features`.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub all_features: bool,
}

/// Build-from-source fallback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Build {
    /// Defaults to `true` when the block is present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// `go_install` or `go_build`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub build_type: Option<PackageType>,
    /// Import path or build path.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    /// Files produced by the build.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<File>,
    /// Environments where building is not attempted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_envs: SupportedEnvs,
}

impl Build {
    /// Present and not explicitly disabled.
    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }
}

/// A package definition as written in a registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageInfo {
    /// Lookup name. Defaults to `repo_owner/repo_name`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Other names resolving to this package.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<Alias>,
    /// Extra words for search.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub search_words: Vec<String>,
    /// How the package is obtained.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub pkg_type: Option<PackageType>,
    /// GitHub repository owner.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub repo_owner: String,
    /// GitHub repository name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub repo_name: String,
    /// One-line summary.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Homepage. Defaults to the GitHub repository.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub link: String,
    /// Release asset name (template).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub asset: String,
    /// Crate name for `cargo` packages.
    #[serde(rename = "crate", default, skip_serializing_if = "String::is_empty")]
    pub crate_name: String,
    /// Download URL for `http` packages (template).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    /// File path for `github_content`, import path for `go_install`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    /// `raw` means the artifact is not an archive.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub format: String,
    /// Expression selecting the tags that are versions.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version_filter: String,
    /// Tag prefix in front of the version.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version_prefix: String,
    /// Go module whose versions are listed.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub go_version_path: String,
    /// Install the darwin/amd64 asset on darwin/arm64. An explicit `false`
    /// is kept on output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rosetta2: Option<bool>,
    /// Install the windows/amd64 asset on windows/arm64.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub windows_arm_emulation: Option<bool>,
    /// No artifact exists for the matched versions.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub no_asset: bool,
    /// `""` or `github_tag`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version_source: String,
    /// Whether `.exe` is appended on Windows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complete_windows_ext: Option<bool>,
    /// Extension for Windows executables.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub windows_ext: String,
    /// The repository is private.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub private: bool,
    /// Shown instead of installing.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error_message: String,
    /// Whether the format extension is appended to raw assets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub append_ext: Option<bool>,
    /// `cargo install` options.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cargo: Option<Cargo>,
    /// Build-from-source fallback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<Build>,
    /// Runtime-keyed overrides, first match wins.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overrides: Vec<Override>,
    /// Per-OS formats.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub format_overrides: Vec<FormatOverride>,
    /// Executables the package provides.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<File>,
    /// Literals used for `{{.OS}}` and `{{.Arch}}`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub replacements: Replacements,
    /// `None` means every environment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supported_envs: Option<SupportedEnvs>,
    /// Consulted only when `supported_envs` is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supported_if: Option<String>,
    /// Checksum verification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<Checksum>,
    /// Cosign verification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cosign: Option<Cosign>,
    /// SLSA provenance verification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slsa_provenance: Option<SlsaProvenance>,
    /// Minisign verification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minisign: Option<Minisign>,
    /// GitHub artifact attestation verification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_artifact_attestations: Option<GitHubArtifactAttestations>,
    /// Releases are immutable.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub github_immutable_release: bool,
    /// Template variables set from `aqua.yaml`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vars: Vec<Var>,
    /// Versions this definition applies to.
    #[serde(
        rename = "version_constraint",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub version_constraints: String,
    /// Definitions for other versions, first match wins.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub version_overrides: Vec<VersionOverride>,
}

impl PackageInfo {
    /// Both `repo_owner` and `repo_name` are set.
    pub fn has_repo(&self) -> bool {
        !self.repo_owner.is_empty() && !self.repo_name.is_empty()
    }

    /// The package type, [`PackageType::Unknown`] when missing.
    pub fn package_type(&self) -> PackageType {
        self.pkg_type.unwrap_or(PackageType::Unknown)
    }

    /// `name`, else `owner/repo`, else the `go_install` path.
    pub fn get_name(&self) -> String {
        if !self.name.is_empty() {
            return self.name.clone();
        }
        if self.has_repo() {
            return format!("{}/{}", self.repo_owner, self.repo_name);
        }
        if self.pkg_type == Some(PackageType::GoInstall) && !self.path.is_empty() {
            return self.path.clone();
        }
        String::new()
    }

    /// `path`, else the GitHub import path for `go_install`.
    pub fn get_path(&self) -> String {
        if !self.path.is_empty() {
            return self.path.clone();
        }
        if self.pkg_type == Some(PackageType::GoInstall) && self.has_repo() {
            return format!("github.com/{}/{}", self.repo_owner, self.repo_name);
        }
        String::new()
    }

    /// `link`, else the GitHub repository page.
    pub fn get_link(&self) -> String {
        if !self.link.is_empty() {
            return self.link.clone();
        }
        if self.has_repo() {
            return format!("https://github.com/{}/{}", self.repo_owner, self.repo_name);
        }
        String::new()
    }

    /// Source archives are always `tar.gz`.
    pub fn get_format(&self) -> &str {
        match self.pkg_type {
            Some(PackageType::GithubArchive | PackageType::GoBuild) => "tar.gz",
            _ => &self.format,
        }
    }

    /// Defaults to `true`.
    pub fn get_append_ext(&self) -> bool {
        self.append_ext.unwrap_or(true)
    }

    /// Defaults to `false`.
    pub fn get_rosetta2(&self) -> bool {
        self.rosetta2.unwrap_or(false)
    }

    /// Defaults to `false`.
    pub fn get_windows_arm_emulation(&self) -> bool {
        self.windows_arm_emulation.unwrap_or(false)
    }

    /// `files`, else a single file named after the package.
    pub fn get_files(&self) -> Vec<File> {
        if !self.files.is_empty() {
            return self.files.clone();
        }
        let name = self.default_cmd_name();
        if name.is_empty() {
            return Vec::new();
        }
        vec![File {
            name,
            ..File::default()
        }]
    }

    fn default_cmd_name(&self) -> String {
        if self.has_repo() {
            if self.name.is_empty() {
                return self.repo_name.clone();
            }
            return last_segment(&self.name).to_string();
        }
        if self.pkg_type == Some(PackageType::GoInstall) {
            return last_segment(&self.get_path()).to_string();
        }
        last_segment(&self.get_name()).to_string()
    }

    /// Whether `exe_name` could be provided by some version or runtime of
    /// this package.
    pub fn maybe_has_command(&self, exe_name: &str) -> bool {
        let mut any_empty = self.files.is_empty();
        let contains = |files: &[File]| files.iter().any(|f| f.name == exe_name);

        if contains(&self.files) {
            return true;
        }
        if let Some(build) = &self.build {
            any_empty |= build.files.is_empty();
            if contains(&build.files) {
                return true;
            }
        }
        for vo in &self.version_overrides {
            let files = vo.files.as_deref().unwrap_or_default();
            any_empty |= files.is_empty();
            if contains(files) {
                return true;
            }
            for ov in vo.overrides.iter().flatten() {
                if ov.files.as_deref().is_some_and(|f| contains(f)) {
                    return true;
                }
            }
        }
        if self
            .overrides
            .iter()
            .any(|ov| ov.files.as_deref().is_some_and(|f| contains(f)))
        {
            return true;
        }

        any_empty && self.default_cmd_name() == exe_name
    }

    /// Replacements used to render checksum file names.
    ///
    /// An explicitly empty map in the checksum block disables replacements.
    pub fn checksum_replacements(&self) -> Replacements {
        let Some(cr) = self.checksum.as_ref().and_then(|c| c.replacements.as_ref()) else {
            return self.replacements.clone();
        };
        if cr.is_empty() {
            return Replacements::new();
        }
        let mut merged = self.replacements.clone();
        merged.extend(cr.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }

    /// `github.com/owner/repo` of the SLSA source, if configured.
    pub fn slsa_source_uri(&self) -> Option<String> {
        let sp = self.slsa_provenance.as_ref()?;
        if let Some(uri) = &sp.source_uri {
            return Some(uri.clone());
        }
        let owner = if sp.repo_owner.is_empty() {
            &self.repo_owner
        } else {
            &sp.repo_owner
        };
        let repo = if sp.repo_name.is_empty() {
            &self.repo_name
        } else {
            &sp.repo_name
        };
        Some(format!("github.com/{owner}/{repo}"))
    }

    /// Check the fields required by the package type.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.get_name().is_empty() {
            return Err(ValidationError::NameRequired);
        }
        if self.no_asset || !self.error_message.is_empty() {
            return Ok(());
        }
        match self.package_type() {
            PackageType::GithubArchive | PackageType::GoBuild => {
                if !self.has_repo() {
                    return Err(ValidationError::RepoRequired);
                }
            }
            PackageType::GoInstall => {
                if self.get_path().is_empty() {
                    return Err(ValidationError::GoInstallRequiresPath);
                }
            }
            PackageType::Cargo => {
                if self.crate_name.is_empty() {
                    return Err(ValidationError::CargoRequiresCrate);
                }
            }
            PackageType::GithubContent => {
                if !self.has_repo() {
                    return Err(ValidationError::RepoRequired);
                }
                if self.path.is_empty() {
                    return Err(ValidationError::GithubContentRequiresPath);
                }
            }
            PackageType::GithubRelease => {
                if !self.has_repo() {
                    return Err(ValidationError::RepoRequired);
                }
                if self.asset.is_empty() {
                    return Err(ValidationError::AssetRequired);
                }
            }
            PackageType::Http => {
                if self.url.is_empty() {
                    return Err(ValidationError::UrlRequired);
                }
            }
            PackageType::Go | PackageType::Unknown => return Err(ValidationError::InvalidType),
        }
        Ok(())
    }

    /// Whether the package installs on `rt`.
    ///
    /// `supported_envs` wins when present; otherwise `supported_if` decides,
    /// and a package with neither supports everything.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError`] when `supported_if` does not compile.
    pub fn check_supported(&self, rt: &Runtime) -> Result<bool, ExprError> {
        if let Some(envs) = &self.supported_envs {
            return Ok(matches_runtime(envs, rt));
        }
        match &self.supported_if {
            Some(src) => Ok(SupportedIf::compile(src)?.check(&rt.goos, &rt.goarch)),
            None => Ok(true),
        }
    }

    /// Directories under `pkgs/` this package may occupy, across all
    /// version overrides.
    pub fn pkg_paths(&self) -> BTreeSet<String> {
        let mut paths: BTreeSet<String> = self.own_pkg_paths().into_iter().collect();
        for vo in &self.version_overrides {
            paths.extend(self.override_version(vo).own_pkg_paths());
        }
        paths
    }

    fn own_pkg_paths(&self) -> Option<String> {
        if self.no_asset || !self.error_message.is_empty() {
            return None;
        }
        let ty = self.package_type();
        match ty {
            PackageType::GithubArchive
            | PackageType::GoBuild
            | PackageType::GithubContent
            | PackageType::GithubRelease => self
                .has_repo()
                .then(|| format!("{ty}/github.com/{}/{}", self.repo_owner, self.repo_name)),
            PackageType::Cargo => {
                (!self.crate_name.is_empty()).then(|| format!("{ty}/crates.io/{}", self.crate_name))
            }
            PackageType::GoInstall => {
                let path = self.get_path();
                (!path.is_empty()).then(|| format!("{ty}/{}", mask_placeholders(&path)))
            }
            PackageType::Http => {
                if self.url.is_empty() {
                    return None;
                }
                let masked = mask_placeholders(&self.url);
                let without_scheme = masked.split_once("://").map_or(masked.as_str(), |(_, r)| r);
                let without_query = without_scheme
                    .split(['?', '#'])
                    .next()
                    .unwrap_or(without_scheme);
                Some(format!("{ty}/{without_query}"))
            }
            PackageType::Go | PackageType::Unknown => None,
        }
    }
}

fn last_segment(s: &str) -> &str {
    s.rsplit('/').next().unwrap_or(s)
}

/// Replace every `{{...}}` action with `*`.
fn mask_placeholders(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        match rest[start..].find("}}") {
            Some(end) => {
                out.push('*');
                rest = &rest[start + end + 2..];
            }
            None => {
                rest = &rest[start..];
                break;
            }
        }
    }
    out.push_str(rest);
    out
}
