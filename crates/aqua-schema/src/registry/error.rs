use thiserror::Error;

/// A package definition is missing what its type requires.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Neither `name` nor `repo_owner`/`repo_name` is set.
    #[error("package name is required")]
    NameRequired,

    /// The type needs a repository.
    #[error("repo_owner and repo_name are required")]
    RepoRequired,

    /// `github_content` without `path`.
    #[error("github_content package requires path")]
    GithubContentRequiresPath,

    /// `go_install` without a path or repository.
    #[error("go_install package requires path")]
    GoInstallRequiresPath,

    /// `cargo` without `crate`.
    #[error("cargo package requires crate")]
    CargoRequiresCrate,

    /// `github_release` without `asset`.
    #[error("github_release package requires asset")]
    AssetRequired,

    /// `http` without `url`.
    #[error("http package requires url")]
    UrlRequired,

    /// `type` is missing or unknown.
    #[error("package type is invalid")]
    InvalidType,
}
