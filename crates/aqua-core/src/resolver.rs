//! From a registry definition to the package that applies to one version
//! on one runtime.

use aqua_schema::expr::ExprError;
use aqua_schema::registry::ValidationError;
use aqua_schema::{PackageInfo, RegistryConfig, Runtime};
use thiserror::Error;
use tracing::debug;

/// Errors resolving a package.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// No package or alias has this name.
    #[error("package {0} is not found in the registry")]
    UnknownPackage(String),

    /// A version constraint or `supported_if` does not compile.
    #[error("invalid expression in package {name}")]
    BadExpression {
        /// Package name.
        name: String,
        /// Compile error.
        #[source]
        source: ExprError,
    },

    /// The effective package misses a required field.
    #[error("package {name} is invalid")]
    Validation {
        /// Package name.
        name: String,
        /// Failed check.
        #[source]
        source: ValidationError,
    },
}

/// Outcome of [`resolve`].
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The effective definition.
    Resolved(Box<PackageInfo>),
    /// The package does not support the runtime.
    Skipped,
}

impl Resolution {
    /// The effective definition, if any.
    pub fn package(&self) -> Option<&PackageInfo> {
        match self {
            Self::Resolved(pkg) => Some(pkg),
            Self::Skipped => None,
        }
    }
}

/// Apply the version override matching `version`, then the format and
/// runtime overrides matching `rt`.
///
/// `pkg` is left untouched. Support is checked on the version-resolved
/// definition, so a version override may change `supported_envs`.
///
/// # Errors
///
/// Returns [`ResolveError::BadExpression`] when a version constraint or
/// `supported_if` does not compile.
pub fn resolve(pkg: &PackageInfo, version: &str, rt: &Runtime) -> Result<Resolution, ResolveError> {
    let bad_expr = |source| ResolveError::BadExpression {
        name: pkg.get_name(),
        source,
    };
    let versioned = pkg.with_version(version).map_err(bad_expr)?;
    if !versioned.check_supported(rt).map_err(bad_expr)? {
        debug!(
            package_name = %pkg.get_name(),
            env = %rt.env(),
            "the package isn't supported on this environment"
        );
        return Ok(Resolution::Skipped);
    }
    Ok(Resolution::Resolved(Box::new(versioned.apply_runtime(rt))))
}

/// Look up `name` in `registry`, resolve it, and validate the result.
///
/// # Errors
///
/// Returns [`ResolveError::UnknownPackage`] when neither a name nor an
/// alias matches, and the errors of [`resolve`] and
/// [`PackageInfo::validate`].
pub fn resolve_in_registry(
    registry: &RegistryConfig,
    name: &str,
    version: &str,
    rt: &Runtime,
) -> Result<Resolution, ResolveError> {
    let pkg = registry
        .package(name)
        .ok_or_else(|| ResolveError::UnknownPackage(name.to_string()))?;
    let resolution = resolve(pkg, version, rt)?;
    if let Some(effective) = resolution.package() {
        effective
            .validate()
            .map_err(|source| ResolveError::Validation {
                name: name.to_string(),
                source,
            })?;
    }
    Ok(resolution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aqua_schema::PackageType;
    use aqua_schema::registry::{Override, Replacements, VersionOverride};

    fn repl(pairs: &[(&str, &str)]) -> Replacements {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn base() -> PackageInfo {
        PackageInfo {
            pkg_type: Some(PackageType::GithubRelease),
            repo_owner: "acme".into(),
            repo_name: "tool".into(),
            asset: "tool-{{.OS}}-{{.Arch}}.tar.gz".into(),
            ..PackageInfo::default()
        }
    }

    fn resolved(pkg: &PackageInfo, version: &str, rt: &Runtime) -> PackageInfo {
        match resolve(pkg, version, rt).unwrap() {
            Resolution::Resolved(p) => *p,
            Resolution::Skipped => panic!("unexpectedly skipped"),
        }
    }

    #[test]
    fn test_override_replacements_layer_on_package() {
        let pkg = PackageInfo {
            replacements: repl(&[("linux", "unknown-linux-musl")]),
            overrides: vec![Override {
                goos: "linux".into(),
                goarch: "arm64".into(),
                replacements: Some(repl(&[("linux", "unknown-linux-gnu")])),
                ..Override::default()
            }],
            ..base()
        };

        let arm = resolved(&pkg, "v1.0.0", &Runtime::new("linux", "arm64"));
        assert_eq!(arm.replacements, repl(&[("linux", "unknown-linux-gnu")]));

        let mac = resolved(&pkg, "v1.0.0", &Runtime::new("darwin", "amd64"));
        assert_eq!(mac.replacements, repl(&[("linux", "unknown-linux-musl")]));
        assert_eq!(pkg.replacements, repl(&[("linux", "unknown-linux-musl")]));
    }

    fn kubectl() -> PackageInfo {
        PackageInfo {
            asset: "kubectl".into(),
            version_constraints: r#"semver(">= 1.20.0 < 1.25.0")"#.into(),
            version_overrides: vec![
                VersionOverride {
                    version_constraints: r#"semver("< 1.20.0")"#.into(),
                    pkg_type: Some(PackageType::Http),
                    url: Some("legacy".into()),
                    ..VersionOverride::default()
                },
                VersionOverride {
                    version_constraints: r#"semver(">= 1.25.0")"#.into(),
                    asset: Some("kubectl-new".into()),
                    format: Some("tar.gz".into()),
                    ..VersionOverride::default()
                },
            ],
            ..base()
        }
    }

    #[test]
    fn test_version_override_selection() {
        let pkg = kubectl();
        let rt = Runtime::new("linux", "amd64");

        let old = resolved(&pkg, "v1.18.0", &rt);
        assert_eq!(old.pkg_type, Some(PackageType::Http));
        assert_eq!(old.url, "legacy");
        assert_eq!(old.asset, "");

        assert_eq!(resolved(&pkg, "v1.22.0", &rt), pkg);

        let new = resolved(&pkg, "v1.26.0", &rt);
        assert_eq!(new.asset, "kubectl-new");
        assert_eq!(new.format, "tar.gz");
        assert_eq!(new.pkg_type, Some(PackageType::GithubRelease));
    }

    #[test]
    fn test_missing_prefix_never_matches() {
        let pkg = PackageInfo {
            version_prefix: "cli-".into(),
            ..kubectl()
        };
        let rt = Runtime::new("linux", "amd64");
        assert_eq!(resolved(&pkg, "v1.18.0", &rt), pkg);
        assert_eq!(resolved(&pkg, "cli-v1.18.0", &rt).url, "legacy");
    }

    #[test]
    fn test_format_override_then_runtime_override() {
        let pkg = PackageInfo {
            format: "tar.gz".into(),
            format_overrides: vec![aqua_schema::registry::FormatOverride {
                goos: "windows".into(),
                format: "zip".into(),
            }],
            overrides: vec![Override {
                goos: "windows".into(),
                asset: Some("tool.{{.Format}}".into()),
                ..Override::default()
            }],
            ..base()
        };
        let win = resolved(&pkg, "v1.0.0", &Runtime::new("windows", "amd64"));
        assert_eq!(win.format, "zip");
        assert_eq!(win.asset, "tool.{{.Format}}");
        assert_eq!(resolved(&pkg, "v1.0.0", &Runtime::new("linux", "amd64")).format, "tar.gz");
    }

    #[test]
    fn test_unsupported_env_is_skipped() {
        let pkg = PackageInfo {
            supported_envs: Some(vec!["darwin".into(), "linux/amd64".into()]),
            ..base()
        };
        assert_eq!(
            resolve(&pkg, "v1.0.0", &Runtime::new("linux", "arm64")).unwrap(),
            Resolution::Skipped
        );
        assert!(
            resolve(&pkg, "v1.0.0", &Runtime::new("darwin", "arm64"))
                .unwrap()
                .package()
                .is_some()
        );

        let by_expr = PackageInfo {
            supported_if: Some(r#"GOOS != "windows""#.into()),
            ..base()
        };
        assert_eq!(
            resolve(&by_expr, "v1.0.0", &Runtime::new("windows", "amd64")).unwrap(),
            Resolution::Skipped
        );
    }

    #[test]
    fn test_bad_expression_is_an_error() {
        let pkg = PackageInfo {
            version_constraints: "semver(".into(),
            ..base()
        };
        let err = resolve(&pkg, "v1.0.0", &Runtime::new("linux", "amd64")).unwrap_err();
        assert!(matches!(err, ResolveError::BadExpression { name, .. } if name == "acme/tool"));
    }

    #[test]
    fn test_resolution_is_deterministic_and_idempotent() {
        let pkg = PackageInfo {
            replacements: repl(&[("amd64", "x86_64")]),
            overrides: vec![Override {
                goos: "darwin".into(),
                replacements: Some(repl(&[("darwin", "macOS")])),
                ..Override::default()
            }],
            ..base()
        };
        let rt = Runtime::new("darwin", "amd64");
        let once = resolved(&pkg, "v1.0.0", &rt);
        assert_eq!(
            serde_json::to_string(&once).unwrap(),
            serde_json::to_string(&resolved(&pkg, "v1.0.0", &rt)).unwrap()
        );

        let lifted = PackageInfo {
            overrides: Vec::new(),
            ..once.clone()
        };
        let twice = resolved(&lifted, "v1.0.0", &rt);
        assert_eq!(twice, lifted);
        assert_eq!(twice.replacements, once.replacements);
    }

    #[test]
    fn test_resolve_in_registry() {
        let registry = RegistryConfig {
            packages: vec![
                base(),
                PackageInfo {
                    pkg_type: Some(PackageType::GithubRelease),
                    repo_owner: "acme".into(),
                    repo_name: "broken".into(),
                    ..PackageInfo::default()
                },
            ],
        };
        let rt = Runtime::new("linux", "amd64");
        assert!(
            resolve_in_registry(&registry, "acme/tool", "v1.0.0", &rt)
                .unwrap()
                .package()
                .is_some()
        );
        assert!(matches!(
            resolve_in_registry(&registry, "acme/none", "v1.0.0", &rt),
            Err(ResolveError::UnknownPackage(_))
        ));
        assert!(matches!(
            resolve_in_registry(&registry, "acme/broken", "v1.0.0", &rt),
            Err(ResolveError::Validation { .. })
        ));
    }
}
