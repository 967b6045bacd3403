//! The installation method of a package.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How a package is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageType {
    /// A GitHub release asset.
    GithubRelease,
    /// A file inside a GitHub repository.
    GithubContent,
    /// A GitHub source archive.
    GithubArchive,
    /// An arbitrary URL.
    Http,
    /// Go toolchain itself.
    Go,
    /// `go install <path>`.
    GoInstall,
    /// `go build` from a GitHub source archive.
    GoBuild,
    /// `cargo install <crate>`.
    Cargo,
    /// Anything else found on disk. Always fails validation.
    #[serde(other)]
    Unknown,
}

impl PackageType {
    /// Returns the registry spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GithubRelease => "github_release",
            Self::GithubContent => "github_content",
            Self::GithubArchive => "github_archive",
            Self::Http => "http",
            Self::Go => "go",
            Self::GoInstall => "go_install",
            Self::GoBuild => "go_build",
            Self::Cargo => "cargo",
            Self::Unknown => "unknown",
        }
    }

    /// Whether packages of this type live in a GitHub repository.
    pub fn is_github(self) -> bool {
        matches!(
            self,
            Self::GithubRelease | Self::GithubContent | Self::GithubArchive | Self::GoBuild
        )
    }
}

impl fmt::Display for PackageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PackageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "github_release" => Ok(Self::GithubRelease),
            "github_content" => Ok(Self::GithubContent),
            "github_archive" => Ok(Self::GithubArchive),
            "http" => Ok(Self::Http),
            "go" => Ok(Self::Go),
            "go_install" => Ok(Self::GoInstall),
            "go_build" => Ok(Self::GoBuild),
            "cargo" => Ok(Self::Cargo),
            _ => Err(format!("Unknown package type: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_type_deserializes() {
        let t: PackageType = serde_yaml::from_str("gitlab_release").unwrap();
        assert_eq!(t, PackageType::Unknown);
        let t: PackageType = serde_yaml::from_str("go_install").unwrap();
        assert_eq!(t, PackageType::GoInstall);
    }

    #[test]
    fn test_from_str() {
        assert_eq!("cargo".parse::<PackageType>(), Ok(PackageType::Cargo));
        assert!("brew".parse::<PackageType>().is_err());
    }
}
