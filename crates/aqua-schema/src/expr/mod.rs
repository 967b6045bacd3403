//! A small expression language for registry filters and constraints.
//!
//! Expressions are compiled once into a [`Program`] and evaluated against an
//! [`Env`] many times. Four typed entry points fix which bindings a program
//! may reference:
//!
//! | Program | Bindings | Functions |
//! |---|---|---|
//! | [`VersionConstraint`] | `Version`, `SemVer` | `semver`, `semverWithVersion`, `trimPrefix` |
//! | [`VersionFilter`] | `Version`, `SemVer` | `semver`, `semverWithVersion`, `trimPrefix` |
//! | [`AssetFilter`] | `Asset` | `trimPrefix` |
//! | [`SupportedIf`] | `GOOS`, `GOARCH` | `trimPrefix` |
//!
//! Compilation errors are fatal to the caller. Evaluation errors are logged
//! at debug level and read as `false`.
//!
//! # Example
//!
//! ```
//! use aqua_schema::expr::VersionConstraint;
//!
//! let c = VersionConstraint::compile(r#"semver(">= 1.20.0 < 1.25.0")"#).unwrap();
//! assert!(c.check("v1.22.0", ""));
//! assert!(!c.check("v1.26.0", ""));
//! ```

mod constraint;
mod eval;
mod lexer;
mod parser;

use std::fmt;

use tracing::debug;

pub use constraint::VersionRange;
pub use eval::{Env, EvalError, Value};

use parser::{Expr, Func, Parser};

/// Compile-time failure of an expression.
#[derive(Debug, thiserror::Error)]
pub enum ExprError {
    /// The expression is not well formed.
    #[error("invalid expression {expr:?}: {message}")]
    Syntax {
        /// Source text.
        expr: String,
        /// What went wrong.
        message: String,
    },

    /// The expression references a variable that is not defined.
    #[error("invalid expression {expr:?}: unknown identifier {name}")]
    UnknownIdentifier {
        /// Source text.
        expr: String,
        /// Offending identifier.
        name: String,
    },

    /// The expression calls a function that is not defined.
    #[error("invalid expression {expr:?}: unknown function {name}")]
    UnknownFunction {
        /// Source text.
        expr: String,
        /// Offending function name.
        name: String,
    },
}

/// Variables an expression may read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Var {
    /// `Version`
    Version,
    /// `SemVer`
    SemVer,
    /// `Asset`
    Asset,
    /// `GOOS`
    Goos,
    /// `GOARCH`
    Goarch,
}

impl Var {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "Version" => Some(Self::Version),
            "SemVer" => Some(Self::SemVer),
            "Asset" => Some(Self::Asset),
            "GOOS" => Some(Self::Goos),
            "GOARCH" => Some(Self::Goarch),
            _ => None,
        }
    }

    /// Name as written in expressions.
    pub fn name(self) -> &'static str {
        match self {
            Self::Version => "Version",
            Self::SemVer => "SemVer",
            Self::Asset => "Asset",
            Self::Goos => "GOOS",
            Self::Goarch => "GOARCH",
        }
    }
}

/// Which bindings and functions a program is allowed to use.
#[derive(Debug, Clone, Copy)]
struct Scope {
    vars: &'static [Var],
    funcs: &'static [Func],
}

const VERSION_SCOPE: Scope = Scope {
    vars: &[Var::Version, Var::SemVer],
    funcs: &[Func::Semver, Func::SemverWithVersion, Func::TrimPrefix],
};

const ASSET_SCOPE: Scope = Scope {
    vars: &[Var::Asset],
    funcs: &[Func::TrimPrefix],
};

const RUNTIME_SCOPE: Scope = Scope {
    vars: &[Var::Goos, Var::Goarch],
    funcs: &[Func::TrimPrefix],
};

/// A compiled expression.
#[derive(Debug, Clone)]
pub struct Program {
    source: String,
    ast: Expr,
}

impl Program {
    fn compile(src: &str, scope: Scope) -> Result<Self, ExprError> {
        let tokens = lexer::tokenize(src)?;
        let ast = Parser::new(src, tokens).parse()?;
        check_scope(src, &ast, scope)?;
        Ok(Self {
            source: src.to_string(),
            ast,
        })
    }

    /// Evaluate to a value.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError`] on unbound variables, type mismatches or
    /// unparsable versions.
    pub fn eval(&self, env: &Env<'_>) -> Result<Value, EvalError> {
        eval::eval(&self.ast, env)
    }

    /// Evaluate as a boolean, reading any error as `false`.
    pub fn eval_bool_lossy(&self, env: &Env<'_>) -> bool {
        match eval::eval_bool(&self.ast, env) {
            Ok(b) => b,
            Err(e) => {
                debug!(expr = %self.source, error = %e, "expression evaluation failed");
                false
            }
        }
    }

    /// Source text.
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn check_scope(src: &str, expr: &Expr, scope: Scope) -> Result<(), ExprError> {
    match expr {
        Expr::Str(_) | Expr::Bool(_) => Ok(()),
        Expr::Var(var) => {
            if scope.vars.contains(var) {
                Ok(())
            } else {
                Err(ExprError::UnknownIdentifier {
                    expr: src.to_string(),
                    name: var.name().to_string(),
                })
            }
        }
        Expr::Call(func, args) => {
            if !scope.funcs.contains(func) {
                return Err(ExprError::UnknownFunction {
                    expr: src.to_string(),
                    name: func.name().to_string(),
                });
            }
            args.iter().try_for_each(|a| check_scope(src, a, scope))
        }
        Expr::List(items) => items.iter().try_for_each(|a| check_scope(src, a, scope)),
        Expr::Not(inner) | Expr::Matches(inner, _) => check_scope(src, inner, scope),
        Expr::And(lhs, rhs) | Expr::Or(lhs, rhs) | Expr::Binary(_, lhs, rhs) => {
            check_scope(src, lhs, scope)?;
            check_scope(src, rhs, scope)
        }
    }
}

/// Strip `prefix` from `version`; `None` when the prefix is configured but
/// absent.
fn strip_version_prefix<'a>(version: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        Some(version)
    } else {
        version.strip_prefix(prefix)
    }
}

/// `version_constraint` of a package or version override.
#[derive(Debug, Clone)]
pub struct VersionConstraint(Program);

impl VersionConstraint {
    /// Compile a constraint.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError`] when the source does not compile.
    pub fn compile(src: &str) -> Result<Self, ExprError> {
        Program::compile(src, VERSION_SCOPE).map(Self)
    }

    /// Whether `version` satisfies the constraint.
    ///
    /// A version missing the configured `prefix` never matches.
    pub fn check(&self, version: &str, prefix: &str) -> bool {
        let Some(sv) = strip_version_prefix(version, prefix) else {
            return false;
        };
        self.0.eval_bool_lossy(&Env {
            version: Some(version),
            semver: Some(sv),
            ..Env::default()
        })
    }

    /// The compiled program.
    pub fn program(&self) -> &Program {
        &self.0
    }
}

/// `version_filter`: which tags count as releases.
#[derive(Debug, Clone)]
pub struct VersionFilter(Program);

impl VersionFilter {
    /// Compile a filter.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError`] when the source does not compile.
    pub fn compile(src: &str) -> Result<Self, ExprError> {
        Program::compile(src, VERSION_SCOPE).map(Self)
    }

    /// Evaluate against a tag, surfacing evaluation failures.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError`] when the expression fails at runtime.
    pub fn try_check(&self, tag: &str, prefix: &str) -> Result<bool, EvalError> {
        let sv = strip_version_prefix(tag, prefix).unwrap_or(tag);
        let env = Env {
            version: Some(tag),
            semver: Some(sv),
            ..Env::default()
        };
        match self.0.eval(&env)? {
            Value::Bool(b) => Ok(b),
            other => Err(EvalError::TypeMismatch {
                expected: "bool",
                got: match other {
                    Value::Str(_) => "string",
                    _ => "list",
                },
            }),
        }
    }

    /// Evaluate against a tag, reading failures as `false`.
    pub fn check(&self, tag: &str, prefix: &str) -> bool {
        let sv = strip_version_prefix(tag, prefix).unwrap_or(tag);
        self.0.eval_bool_lossy(&Env {
            version: Some(tag),
            semver: Some(sv),
            ..Env::default()
        })
    }
}

/// `all_assets_filter` of the registry generator.
#[derive(Debug, Clone)]
pub struct AssetFilter(Program);

impl AssetFilter {
    /// Compile a filter.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError`] when the source does not compile.
    pub fn compile(src: &str) -> Result<Self, ExprError> {
        Program::compile(src, ASSET_SCOPE).map(Self)
    }

    /// Whether the asset passes the filter.
    pub fn check(&self, asset: &str) -> bool {
        self.0.eval_bool_lossy(&Env {
            asset: Some(asset),
            ..Env::default()
        })
    }
}

/// `supported_if`: runtime predicate.
#[derive(Debug, Clone)]
pub struct SupportedIf(Program);

impl SupportedIf {
    /// Compile a predicate.
    ///
    /// # Errors
    ///
    /// Returns [`ExprError`] when the source does not compile.
    pub fn compile(src: &str) -> Result<Self, ExprError> {
        Program::compile(src, RUNTIME_SCOPE).map(Self)
    }

    /// Whether the package supports `goos`/`goarch`.
    pub fn check(&self, goos: &str, goarch: &str) -> bool {
        self.0.eval_bool_lossy(&Env {
            goos: Some(goos),
            goarch: Some(goarch),
            ..Env::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(r#"semver(">= 1.20.0 < 1.25.0")"#, "v1.22.0", "", true)]
    #[case(r#"semver(">= 1.20.0 < 1.25.0")"#, "v1.18.0", "", false)]
    #[case(r#"Version == "v0.3.0""#, "v0.3.0", "", true)]
    #[case(r#"Version in ["v0.1.0", "v0.2.0"]"#, "v0.2.0", "", true)]
    #[case(r#"Version not in ["v0.1.0", "v0.2.0"]"#, "v0.2.0", "", false)]
    #[case(r#"semver("<= 1.0.0") || Version in ["nightly"]"#, "nightly", "", true)]
    #[case(r#"semver(">= 2.0.0")"#, "cli-v2.1.0", "cli-", true)]
    #[case(r#"semverWithVersion(">= 2.0.0", trimPrefix(Version, "cli-v"))"#, "cli-v2.1.0", "", true)]
    #[case("true", "anything", "", true)]
    #[case("false", "anything", "", false)]
    fn test_version_constraint(
        #[case] src: &str,
        #[case] version: &str,
        #[case] prefix: &str,
        #[case] expected: bool,
    ) {
        let c = VersionConstraint::compile(src).unwrap();
        assert_eq!(c.check(version, prefix), expected);
    }

    #[test]
    fn test_missing_prefix_is_false() {
        let c = VersionConstraint::compile("true").unwrap();
        assert!(!c.check("v1.0.0", "cli-"));
    }

    #[test]
    fn test_commit_hash_never_matches() {
        let c = VersionConstraint::compile(r#"semver(">= 0.0.0")"#).unwrap();
        assert!(!c.check("0123456789abcdef0123456789abcdef01234567", ""));
    }

    #[test]
    fn test_non_version_never_matches() {
        let c = VersionConstraint::compile(r#"semver(">= 1.0.0")"#).unwrap();
        assert!(!c.check("nightly", ""));
    }

    #[test]
    fn test_eval_error_reads_false() {
        let c = VersionConstraint::compile(r#"trimPrefix(Version, "v")"#).unwrap();
        assert!(!c.check("v1.0.0", ""));
    }

    #[rstest]
    #[case("Version ==")]
    #[case(r#"Unknown == "x""#)]
    #[case(r#"bogus("x")"#)]
    #[case(r#"semver(">>> 1")"#)]
    #[case(r#"Version matches "(""#)]
    #[case(r#"Asset == "x""#)]
    fn test_version_constraint_rejects(#[case] src: &str) {
        assert!(VersionConstraint::compile(src).is_err());
    }

    #[rstest]
    #[case(r#"not (Version startsWith "nightly")"#, "v1.0.0", true)]
    #[case(r#"!(Version contains "-rc")"#, "v1.0.0-rc.1", false)]
    #[case(r#"Version matches "^v\\d+\\.\\d+\\.\\d+$""#, "v1.2.3", true)]
    #[case(r#"Version endsWith "-beta" and Version != "v1-beta""#, "v2-beta", true)]
    fn test_version_filter(#[case] src: &str, #[case] tag: &str, #[case] expected: bool) {
        let f = VersionFilter::compile(src).unwrap();
        assert_eq!(f.check(tag, ""), expected);
    }

    #[test]
    fn test_version_filter_try_check_surfaces_errors() {
        let f = VersionFilter::compile("SemVer").unwrap();
        assert!(f.try_check("v1.0.0", "").is_err());

        let f = VersionFilter::compile(r#"semver(">= 1.0.0")"#).unwrap();
        assert!(f.try_check("v1.0.0", "").unwrap());
        assert!(!f.try_check("latest", "").unwrap());
    }

    #[test]
    fn test_asset_filter() {
        let f = AssetFilter::compile(r#"not (Asset endsWith ".sbom")"#).unwrap();
        assert!(f.check("tool-linux-amd64.tar.gz"));
        assert!(!f.check("tool.sbom"));
        assert!(AssetFilter::compile(r#"Version == "x""#).is_err());
    }

    #[test]
    fn test_supported_if() {
        let s = SupportedIf::compile(r#"GOOS != "windows" || GOARCH == "amd64""#).unwrap();
        assert!(s.check("linux", "arm64"));
        assert!(s.check("windows", "amd64"));
        assert!(!s.check("windows", "arm64"));
        assert!(SupportedIf::compile(r#"semver(">= 1")"#).is_err());
    }

    #[test]
    fn test_programs_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<VersionConstraint>();
        assert_send_sync::<SupportedIf>();
    }
}
