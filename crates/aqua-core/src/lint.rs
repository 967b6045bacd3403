//! Style and consistency checks for registry files.
//!
//! Each check looks at one [`PackageInfo`] and reports at most one
//! [`Code`]. Only the codes in [`CODES`] are ever reported.

use std::fmt;
use std::path::{Path, PathBuf};

use aqua_schema::{PackageInfo, PackageType, RegistryConfig};
use thiserror::Error;

use crate::asset::is_supported_format;

/// Errors loading a registry to lint.
#[derive(Error, Debug)]
pub enum LintError {
    /// The file could not be read.
    #[error("failed to read the registry {path}")]
    Read {
        /// Registry file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not a registry.
    #[error("failed to decode the registry {path}: {message}")]
    Decode {
        /// Registry file.
        path: PathBuf,
        /// Decoder message.
        message: String,
    },
}

/// Severity of a [`Code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    /// Reported without failing the run.
    Warning,
    /// Fails the run.
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Warning => "warning",
            Self::Error => "error",
        })
    }
}

/// A lint rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Code {
    /// Stable identifier, e.g. `asset_miss`.
    pub id: &'static str,
    /// Registry fields the rule looks at.
    pub attributes: &'static [&'static str],
    /// Severity.
    pub level: Level,
    /// One-line explanation shown to the user.
    pub short_description: &'static str,
}

const fn code(
    id: &'static str,
    attributes: &'static [&'static str],
    level: Level,
    short_description: &'static str,
) -> Code {
    Code {
        id,
        attributes,
        level,
        short_description,
    }
}

const NAME_ATTRS: &[&str] = &["name", "repo_owner", "repo_name"];

/// Every code a check may report.
pub const CODES: &[Code] = &[
    code(
        "name_empty",
        NAME_ATTRS,
        Level::Error,
        "name is empty. Either name or a pair of repo_owner and repo_name are required",
    ),
    code(
        "name_omit",
        NAME_ATTRS,
        Level::Error,
        "omit name, because name is equivalent to <repo_owner>/<repo_name>",
    ),
    code(
        "avoid_go",
        &["type"],
        Level::Warning,
        "use the package type go_install instead of go as much as possible",
    ),
    code("unknown_type", &["type"], Level::Error, "the package type is unknown"),
    code(
        "repo_owner_miss",
        &["repo_owner"],
        Level::Error,
        "repo_name is set but repo_owner isn't set",
    ),
    code(
        "repo_name_miss",
        &["repo_name"],
        Level::Error,
        "repo_owner is set but repo_name isn't set",
    ),
    code(
        "asset_miss",
        &["asset"],
        Level::Error,
        "asset is required for github_release package",
    ),
    code("asset_unneeded", &["asset"], Level::Error, "asset is unneeded"),
    code(
        "path_miss",
        &["path"],
        Level::Error,
        "path is required for github_content or go_install package",
    ),
    code("path_unneeded", &["path"], Level::Error, "path is unneeded"),
    code("format_unsupported", &["format"], Level::Error, "format value is unsupported"),
    code("description_empty", &["description"], Level::Error, "description is empty"),
    code(
        "description_trim_space",
        &["description"],
        Level::Error,
        "remove all leading and trailing white space from description",
    ),
    code(
        "description_punctuation",
        &["description"],
        Level::Error,
        "remove punctuation from the end of description",
    ),
    code("link_empty", &["link"], Level::Error, "link is empty"),
];

/// Look up a declared code.
pub fn find_code(id: &str) -> Option<&'static Code> {
    CODES.iter().find(|c| c.id == id)
}

/// One problem in one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    /// Position in `packages`.
    pub index: usize,
    /// Package name, empty when it has none.
    pub name: String,
    /// Rule that failed.
    pub code: &'static Code,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: packages[{}] {}: {} ({})",
            self.code.level, self.index, self.name, self.code.short_description, self.code.id
        )
    }
}

type Check = fn(&PackageInfo) -> Option<&'static str>;

const CHECKS: &[Check] = &[
    lint_name,
    lint_type,
    lint_repo,
    lint_asset,
    lint_path,
    lint_format,
    lint_description,
    lint_link,
];

fn lint_name(pkg: &PackageInfo) -> Option<&'static str> {
    if pkg.get_name().is_empty() {
        return Some("name_empty");
    }
    (pkg.has_repo() && pkg.name == format!("{}/{}", pkg.repo_owner, pkg.repo_name))
        .then_some("name_omit")
}

fn lint_type(pkg: &PackageInfo) -> Option<&'static str> {
    match pkg.package_type() {
        PackageType::Go => Some("avoid_go"),
        PackageType::Unknown => Some("unknown_type"),
        _ => None,
    }
}

fn lint_repo(pkg: &PackageInfo) -> Option<&'static str> {
    match (pkg.repo_owner.is_empty(), pkg.repo_name.is_empty()) {
        (true, false) => Some("repo_owner_miss"),
        (false, true) => Some("repo_name_miss"),
        _ => None,
    }
}

fn lint_asset(pkg: &PackageInfo) -> Option<&'static str> {
    if pkg.pkg_type == Some(PackageType::GithubRelease) {
        return (pkg.asset.is_empty() && !pkg.no_asset).then_some("asset_miss");
    }
    (!pkg.asset.is_empty()).then_some("asset_unneeded")
}

fn lint_path(pkg: &PackageInfo) -> Option<&'static str> {
    let has_path = !pkg.get_path().is_empty();
    match pkg.pkg_type {
        Some(PackageType::GithubContent | PackageType::GoInstall) => {
            (!has_path).then_some("path_miss")
        }
        _ => has_path.then_some("path_unneeded"),
    }
}

fn lint_format(pkg: &PackageInfo) -> Option<&'static str> {
    let mut formats = std::iter::once(pkg.format.as_str())
        .chain(pkg.overrides.iter().filter_map(|o| o.format.as_deref()))
        .chain(pkg.format_overrides.iter().map(|o| o.format.as_str()));
    formats
        .any(|f| !f.is_empty() && !is_supported_format(f))
        .then_some("format_unsupported")
}

fn lint_description(pkg: &PackageInfo) -> Option<&'static str> {
    let desc = pkg.description.as_str();
    if desc.is_empty() {
        return Some("description_empty");
    }
    let trimmed = desc.trim();
    if trimmed != desc {
        return Some("description_trim_space");
    }
    (trimmed.trim_end_matches([',', '.', '!', '?']) != desc).then_some("description_punctuation")
}

fn lint_link(pkg: &PackageInfo) -> Option<&'static str> {
    (pkg.link.is_empty() && !pkg.has_repo()).then_some("link_empty")
}

/// Codes reported for `pkg`, in check order.
pub fn lint_package(pkg: &PackageInfo) -> Vec<&'static Code> {
    CHECKS
        .iter()
        .filter_map(|check| check(pkg))
        .filter_map(find_code)
        .collect()
}

/// Findings for every package, in file order.
pub fn lint_registry(cfg: &RegistryConfig) -> Vec<Finding> {
    cfg.packages
        .iter()
        .enumerate()
        .flat_map(|(index, pkg)| {
            let name = pkg.get_name();
            lint_package(pkg).into_iter().map(move |code| Finding {
                index,
                name: name.clone(),
                code,
            })
        })
        .collect()
}

/// Lint a YAML registry file, or a JSON one when it ends in `.json`.
///
/// # Errors
///
/// Returns [`LintError`] when the file cannot be read or decoded.
pub fn lint_registry_file(path: &Path) -> Result<Vec<Finding>, LintError> {
    let s = std::fs::read_to_string(path).map_err(|source| LintError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let decoded = if path.extension().is_some_and(|e| e == "json") {
        RegistryConfig::from_json(&s).map_err(|e| e.to_string())
    } else {
        RegistryConfig::from_yaml(&s).map_err(|e| e.to_string())
    };
    let cfg = decoded.map_err(|message| LintError::Decode {
        path: path.to_path_buf(),
        message,
    })?;
    Ok(lint_registry(&cfg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn ids(pkg: &PackageInfo) -> Vec<&'static str> {
        lint_package(pkg).into_iter().map(|c| c.id).collect()
    }

    fn release() -> PackageInfo {
        PackageInfo {
            pkg_type: Some(PackageType::GithubRelease),
            repo_owner: "cli".into(),
            repo_name: "cli".into(),
            asset: "gh_{{trimV .Version}}_{{.OS}}_{{.Arch}}.{{.Format}}".into(),
            format: "tar.gz".into(),
            description: "GitHub's official command line tool".into(),
            ..PackageInfo::default()
        }
    }

    #[test]
    fn test_clean_package() {
        assert!(ids(&release()).is_empty());
    }

    #[test]
    fn test_codes_are_unique() {
        for (i, c) in CODES.iter().enumerate() {
            assert!(CODES[i + 1..].iter().all(|o| o.id != c.id), "{}", c.id);
        }
    }

    #[test]
    fn test_name() {
        let mut pkg = release();
        pkg.name = "cli/cli".into();
        assert_eq!(ids(&pkg), ["name_omit"]);

        let pkg = PackageInfo {
            pkg_type: Some(PackageType::Http),
            url: "https://example.com/tool".into(),
            description: "A tool".into(),
            link: "https://example.com".into(),
            ..PackageInfo::default()
        };
        assert_eq!(ids(&pkg), ["name_empty"]);
    }

    #[rstest]
    #[case(None, "unknown_type")]
    #[case(Some(PackageType::Unknown), "unknown_type")]
    #[case(Some(PackageType::Go), "avoid_go")]
    fn test_type(#[case] pkg_type: Option<PackageType>, #[case] expected: &str) {
        let pkg = PackageInfo {
            pkg_type,
            ..release()
        };
        assert!(ids(&pkg).contains(&expected));
    }

    #[test]
    fn test_repo_half_set() {
        let mut pkg = release();
        pkg.name = "gh".into();
        pkg.repo_owner.clear();
        pkg.link = "https://cli.github.com".into();
        assert_eq!(ids(&pkg), ["repo_owner_miss"]);

        let mut pkg = release();
        pkg.name = "gh".into();
        pkg.repo_name.clear();
        pkg.link = "https://cli.github.com".into();
        assert_eq!(ids(&pkg), ["repo_name_miss"]);
    }

    #[test]
    fn test_asset() {
        let mut pkg = release();
        pkg.asset.clear();
        assert_eq!(ids(&pkg), ["asset_miss"]);
        pkg.no_asset = true;
        assert!(ids(&pkg).is_empty());

        let pkg = PackageInfo {
            pkg_type: Some(PackageType::GithubArchive),
            format: String::new(),
            ..release()
        };
        assert_eq!(ids(&pkg), ["asset_unneeded"]);
    }

    #[test]
    fn test_path() {
        let pkg = PackageInfo {
            pkg_type: Some(PackageType::GithubContent),
            asset: String::new(),
            ..release()
        };
        assert_eq!(ids(&pkg), ["path_miss"]);

        // go_install falls back to the repository import path.
        let pkg = PackageInfo {
            pkg_type: Some(PackageType::GoInstall),
            asset: String::new(),
            ..release()
        };
        assert!(ids(&pkg).is_empty());

        let mut pkg = release();
        pkg.path = "bin/gh".into();
        assert_eq!(ids(&pkg), ["path_unneeded"]);
    }

    #[test]
    fn test_format() {
        let mut pkg = release();
        pkg.format = "deb".into();
        assert_eq!(ids(&pkg), ["format_unsupported"]);
        pkg.format = "raw".into();
        assert!(ids(&pkg).is_empty());
    }

    #[rstest]
    #[case("", Some("description_empty"))]
    #[case(" A tool", Some("description_trim_space"))]
    #[case("A tool.", Some("description_punctuation"))]
    #[case("A tool!?", Some("description_punctuation"))]
    #[case("A tool", None)]
    fn test_description(#[case] desc: &str, #[case] expected: Option<&str>) {
        let pkg = PackageInfo {
            description: desc.into(),
            ..release()
        };
        assert_eq!(ids(&pkg).first().copied(), expected);
    }

    #[test]
    fn test_link() {
        let pkg = PackageInfo {
            name: "tool".into(),
            pkg_type: Some(PackageType::Http),
            url: "https://example.com/tool".into(),
            description: "A tool".into(),
            ..PackageInfo::default()
        };
        assert_eq!(ids(&pkg), ["link_empty"]);
        // A link next to a repository is accepted.
        let mut pkg = release();
        pkg.link = "https://cli.github.com".into();
        assert!(ids(&pkg).is_empty());
    }

    #[test]
    fn test_lint_registry_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.yaml");
        std::fs::write(
            &path,
            r"packages:
  - type: github_release
    repo_owner: cli
    repo_name: cli
    asset: gh.tar.gz
    description: GitHub's official command line tool
  - type: go
    repo_owner: golang
    repo_name: go
    description: The Go programming language.
",
        )
        .unwrap();

        let findings = lint_registry_file(&path).unwrap();
        let got: Vec<(usize, &str)> = findings.iter().map(|f| (f.index, f.code.id)).collect();
        assert_eq!(got, [(1, "avoid_go"), (1, "description_punctuation")]);
        assert_eq!(
            findings[0].to_string(),
            "warning: packages[1] golang/go: use the package type go_install instead of go as much as possible (avoid_go)"
        );
    }

    #[test]
    fn test_lint_registry_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.yaml");
        assert!(matches!(lint_registry_file(&missing), Err(LintError::Read { .. })));

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{").unwrap();
        assert!(matches!(lint_registry_file(&bad), Err(LintError::Decode { .. })));
    }
}
