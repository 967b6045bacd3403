//! Version and runtime overrides, and how they fold into a package.

use serde::{Deserialize, Serialize};

use super::{
    Build, Cargo, Checksum, Cosign, File, GitHubArtifactAttestations, Minisign, PackageInfo,
    PackageType, Replacements, SlsaProvenance, SupportedEnvs, Var, matches_runtime,
};
use crate::expr::{ExprError, VersionConstraint};
use crate::runtime::Runtime;

/// Copy fields from an override onto a package.
///
/// - `nonempty`: `Option<String>` applied only when non-empty.
/// - `opt`: `Option<T>` replacing an `Option<T>` when present.
/// - `val`: `Option<T>` replacing a `T` when present.
macro_rules! overlay {
    ($dst:expr, $src:expr;
     nonempty: [$($ne:ident),* $(,)?];
     opt: [$($o:ident),* $(,)?];
     val: [$($v:ident),* $(,)?]) => {{
        $(
            if let Some(v) = $src.$ne.as_ref().filter(|s| !s.is_empty()) {
                $dst.$ne = v.clone();
            }
        )*
        $(
            if $src.$o.is_some() {
                $dst.$o = $src.$o.clone();
            }
        )*
        $(
            if let Some(v) = &$src.$v {
                $dst.$v = v.clone();
            }
        )*
    }};
}

/// Format for one OS.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatOverride {
    /// OS the format applies to.
    pub goos: String,
    /// Format on that OS.
    pub format: String,
}

/// Settings applied on matching runtimes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Override {
    /// Matching OS. Empty matches any.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub goos: String,
    /// Matching arch. Empty matches any.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub goarch: String,
    /// Matching environments, in `supported_envs` syntax.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub envs: SupportedEnvs,
    /// Replaces `type`, clearing fields the new type does not use.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub pkg_type: Option<PackageType>,
    /// Replaces `format`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Replaces `asset`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
    /// Replaces `crate`.
    #[serde(rename = "crate", default, skip_serializing_if = "Option::is_none")]
    pub crate_name: Option<String>,
    /// Replaces `url`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Replaces `path`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Replaces `go_version_path`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub go_version_path: Option<String>,
    /// Replaces `complete_windows_ext`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complete_windows_ext: Option<bool>,
    /// Replaces `windows_ext`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub windows_ext: Option<String>,
    /// Replaces `append_ext`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub append_ext: Option<bool>,
    /// Replaces `cargo`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cargo: Option<Cargo>,
    /// Replaces `files`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<File>>,
    /// Merged over `replacements`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacements: Option<Replacements>,
    /// Replaces `checksum`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<Checksum>,
    /// Replaces `cosign`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cosign: Option<Cosign>,
    /// Replaces `slsa_provenance`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slsa_provenance: Option<SlsaProvenance>,
    /// Replaces `minisign`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minisign: Option<Minisign>,
    /// Replaces `github_artifact_attestations`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_artifact_attestations: Option<GitHubArtifactAttestations>,
    /// Replaces `vars`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vars: Option<Vec<Var>>,
}

impl Override {
    /// Whether this override applies to `rt`.
    pub fn matches(&self, rt: &Runtime) -> bool {
        if !self.goos.is_empty() && self.goos != rt.goos {
            return false;
        }
        if !self.goarch.is_empty() && self.goarch != rt.goarch {
            return false;
        }
        self.envs.is_empty() || matches_runtime(&self.envs, rt)
    }
}

/// Settings applied to versions matching `version_constraint`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VersionOverride {
    /// Versions this entry applies to.
    #[serde(rename = "version_constraint", default)]
    pub version_constraints: String,
    /// Replaces `type`, clearing fields the new type does not use.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub pkg_type: Option<PackageType>,
    /// Replaces `repo_owner`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_owner: Option<String>,
    /// Replaces `repo_name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_name: Option<String>,
    /// Replaces `asset`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
    /// Replaces `crate`.
    #[serde(rename = "crate", default, skip_serializing_if = "Option::is_none")]
    pub crate_name: Option<String>,
    /// Replaces `path`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Replaces `url`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Replaces `format`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Replaces `version_source`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_source: Option<String>,
    /// Replaces `windows_ext`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub windows_ext: Option<String>,
    /// Replaces `go_version_path`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub go_version_path: Option<String>,
    /// Replaces `version_filter`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_filter: Option<String>,
    /// Replaces `version_prefix`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_prefix: Option<String>,
    /// Replaces `error_message`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Replaces `rosetta2`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rosetta2: Option<bool>,
    /// Replaces `windows_arm_emulation`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub windows_arm_emulation: Option<bool>,
    /// Replaces `complete_windows_ext`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complete_windows_ext: Option<bool>,
    /// Replaces `no_asset`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_asset: Option<bool>,
    /// Replaces `append_ext`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub append_ext: Option<bool>,
    /// Replaces `github_immutable_release`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_immutable_release: Option<bool>,
    /// Replaces `cargo`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cargo: Option<Cargo>,
    /// Replaces `files`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<File>>,
    /// Replaces `format_overrides`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format_overrides: Option<Vec<FormatOverride>>,
    /// Replaces `replacements`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacements: Option<Replacements>,
    /// Replaces `checksum`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<Checksum>,
    /// Replaces `cosign`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cosign: Option<Cosign>,
    /// Replaces `slsa_provenance`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slsa_provenance: Option<SlsaProvenance>,
    /// Replaces `minisign`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minisign: Option<Minisign>,
    /// Replaces `github_artifact_attestations`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_artifact_attestations: Option<GitHubArtifactAttestations>,
    /// Replaces `build`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<Build>,
    /// Replaces `vars`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vars: Option<Vec<Var>>,
    /// Replaces `overrides`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overrides: Option<Vec<Override>>,
    /// Replaces `supported_envs`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supported_envs: Option<SupportedEnvs>,
    /// Replaces `supported_if`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supported_if: Option<String>,
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

impl VersionOverride {
    /// The asset-shaping part of a package, as an override.
    ///
    /// Used by the registry generator to freeze one group's settings.
    pub fn from_package(pkg: &PackageInfo) -> Self {
        Self {
            asset: non_empty(&pkg.asset),
            files: (!pkg.files.is_empty()).then(|| pkg.files.clone()),
            format: non_empty(&pkg.format),
            overrides: (!pkg.overrides.is_empty()).then(|| pkg.overrides.clone()),
            replacements: (!pkg.replacements.is_empty()).then(|| pkg.replacements.clone()),
            supported_envs: pkg.supported_envs.clone(),
            complete_windows_ext: pkg.complete_windows_ext,
            checksum: pkg.checksum.clone(),
            slsa_provenance: pkg.slsa_provenance.clone(),
            ..Self::default()
        }
    }
}

impl PackageInfo {
    /// Clear the fields that do not apply to `ty`.
    pub(crate) fn reset_by_pkg_type(&mut self, ty: PackageType) {
        match ty {
            PackageType::GithubRelease => {
                self.url.clear();
                self.path.clear();
                self.crate_name.clear();
                self.go_version_path.clear();
                self.cargo = None;
            }
            PackageType::GithubContent => {
                self.url.clear();
                self.asset.clear();
                self.crate_name.clear();
                self.go_version_path.clear();
                self.cargo = None;
            }
            PackageType::GithubArchive => {
                self.url.clear();
                self.path.clear();
                self.asset.clear();
                self.crate_name.clear();
                self.go_version_path.clear();
                self.cargo = None;
                self.format.clear();
            }
            PackageType::Http => {
                self.path.clear();
                self.asset.clear();
                self.go_version_path.clear();
            }
            PackageType::GoInstall | PackageType::GoBuild | PackageType::Cargo => {
                self.url.clear();
                self.asset.clear();
                self.windows_ext.clear();
                self.complete_windows_ext = None;
                self.cosign = None;
                self.slsa_provenance = None;
                self.minisign = None;
                self.github_artifact_attestations = None;
                self.github_immutable_release = false;
                self.format.clear();
                self.rosetta2 = None;
                self.windows_arm_emulation = None;
                self.append_ext = None;
                if ty == PackageType::Cargo {
                    self.path.clear();
                    self.go_version_path.clear();
                } else {
                    self.crate_name.clear();
                    self.cargo = None;
                }
            }
            PackageType::Go | PackageType::Unknown => {}
        }
    }

    /// This package with `vo` applied.
    pub fn override_version(&self, vo: &VersionOverride) -> PackageInfo {
        let mut pkg = self.clone();
        if let Some(ty) = vo.pkg_type {
            pkg.reset_by_pkg_type(ty);
            pkg.pkg_type = Some(ty);
        }
        overlay!(pkg, vo;
            nonempty: [repo_owner, repo_name, asset, crate_name, path, url, format,
                       version_source, windows_ext];
            opt: [complete_windows_ext, append_ext, rosetta2, windows_arm_emulation, cargo,
                  checksum, cosign, slsa_provenance, minisign, github_artifact_attestations,
                  build, supported_envs, supported_if];
            val: [go_version_path, version_filter, version_prefix, error_message, no_asset,
                  github_immutable_release, files, format_overrides, replacements, vars,
                  overrides]);
        pkg
    }

    /// Resolve the definition that applies to `version`.
    ///
    /// The package's own `version_constraint` is tried first; then the
    /// first matching entry of `version_overrides` is applied. A package
    /// without a constraint applies to every version.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError`] when a constraint does not compile.
    pub fn with_version(&self, version: &str) -> Result<PackageInfo, ExprError> {
        if self.version_constraints.is_empty() {
            return Ok(self.clone());
        }
        if VersionConstraint::compile(&self.version_constraints)?
            .check(version, &self.version_prefix)
        {
            return Ok(self.clone());
        }
        for vo in &self.version_overrides {
            let prefix = vo.version_prefix.as_deref().unwrap_or(&self.version_prefix);
            if VersionConstraint::compile(&vo.version_constraints)?.check(version, prefix) {
                return Ok(self.override_version(vo));
            }
        }
        Ok(self.clone())
    }

    /// This package with runtime-conditional settings applied.
    pub fn apply_runtime(&self, rt: &Runtime) -> PackageInfo {
        let mut pkg = self.clone();

        if let Some(fo) = self.format_overrides.iter().find(|fo| fo.goos == rt.goos) {
            pkg.format.clone_from(&fo.format);
        }

        let Some(ov) = self.overrides.iter().find(|ov| ov.matches(rt)) else {
            return pkg;
        };

        if let Some(ty) = ov.pkg_type {
            pkg.reset_by_pkg_type(ty);
            pkg.pkg_type = Some(ty);
        }
        if let Some(r) = &ov.replacements {
            pkg.replacements
                .extend(r.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        overlay!(pkg, ov;
            nonempty: [asset, crate_name, url, path, format, windows_ext];
            opt: [cargo, complete_windows_ext, checksum, cosign, slsa_provenance, minisign,
                  github_artifact_attestations, append_ext];
            val: [files, vars, go_version_path]);
        pkg
    }
}
