//! Tree-walking evaluator.

use super::Var;
use super::constraint::VersionRange;
use super::parser::{BinOp, Expr, Func};
use crate::version::{Version, is_commit_hash};

/// A runtime value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// A string.
    Str(String),
    /// A boolean.
    Bool(bool),
    /// A list literal.
    List(Vec<Value>),
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Self::Str(_) => "string",
            Self::Bool(_) => "bool",
            Self::List(_) => "list",
        }
    }
}

/// Variable bindings for one evaluation.
#[derive(Debug, Default, Clone, Copy)]
pub struct Env<'a> {
    /// Raw tag, bound as `Version`.
    pub version: Option<&'a str>,
    /// Tag without its prefix, bound as `SemVer`.
    pub semver: Option<&'a str>,
    /// Asset filename, bound as `Asset`.
    pub asset: Option<&'a str>,
    /// Bound as `GOOS`.
    pub goos: Option<&'a str>,
    /// Bound as `GOARCH`.
    pub goarch: Option<&'a str>,
}

impl Env<'_> {
    fn lookup(&self, var: Var) -> Option<&str> {
        match var {
            Var::Version => self.version,
            Var::SemVer => self.semver,
            Var::Asset => self.asset,
            Var::Goos => self.goos,
            Var::Goarch => self.goarch,
        }
    }
}

/// Failure while evaluating a compiled expression.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    /// A variable the expression reads was not bound.
    #[error("variable {0} is not bound")]
    Unbound(&'static str),

    /// An operator received a value of the wrong type.
    #[error("type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        /// Expected type.
        expected: &'static str,
        /// Actual type.
        got: &'static str,
    },

    /// A version or range could not be parsed.
    #[error("{0}")]
    Version(String),
}

pub(crate) fn eval(expr: &Expr, env: &Env<'_>) -> Result<Value, EvalError> {
    match expr {
        Expr::Str(s) => Ok(Value::Str(s.clone())),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Var(var) => env
            .lookup(*var)
            .map(|s| Value::Str(s.to_string()))
            .ok_or(EvalError::Unbound(var.name())),
        Expr::List(items) => items
            .iter()
            .map(|item| eval(item, env))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        Expr::Not(inner) => Ok(Value::Bool(!eval_bool(inner, env)?)),
        Expr::And(lhs, rhs) => Ok(Value::Bool(eval_bool(lhs, env)? && eval_bool(rhs, env)?)),
        Expr::Or(lhs, rhs) => Ok(Value::Bool(eval_bool(lhs, env)? || eval_bool(rhs, env)?)),
        Expr::Matches(lhs, re) => {
            let s = eval_str(lhs, env)?;
            Ok(Value::Bool(re.is_match(&s)))
        }
        Expr::Binary(op, lhs, rhs) => eval_binary(*op, lhs, rhs, env),
        Expr::Call(func, args) => eval_call(*func, args, env),
    }
}

pub(crate) fn eval_bool(expr: &Expr, env: &Env<'_>) -> Result<bool, EvalError> {
    match eval(expr, env)? {
        Value::Bool(b) => Ok(b),
        other => Err(EvalError::TypeMismatch {
            expected: "bool",
            got: other.kind(),
        }),
    }
}

fn eval_str(expr: &Expr, env: &Env<'_>) -> Result<String, EvalError> {
    match eval(expr, env)? {
        Value::Str(s) => Ok(s),
        other => Err(EvalError::TypeMismatch {
            expected: "string",
            got: other.kind(),
        }),
    }
}

fn eval_binary(op: BinOp, lhs: &Expr, rhs: &Expr, env: &Env<'_>) -> Result<Value, EvalError> {
    let result = match op {
        BinOp::Eq => eval(lhs, env)? == eval(rhs, env)?,
        BinOp::Ne => eval(lhs, env)? != eval(rhs, env)?,
        BinOp::In | BinOp::NotIn => {
            let needle = eval(lhs, env)?;
            let found = match eval(rhs, env)? {
                Value::List(items) => items.contains(&needle),
                other => {
                    return Err(EvalError::TypeMismatch {
                        expected: "list",
                        got: other.kind(),
                    });
                }
            };
            if op == BinOp::In { found } else { !found }
        }
        BinOp::StartsWith => eval_str(lhs, env)?.starts_with(&eval_str(rhs, env)?),
        BinOp::EndsWith => eval_str(lhs, env)?.ends_with(&eval_str(rhs, env)?),
        BinOp::Contains => eval_str(lhs, env)?.contains(&eval_str(rhs, env)?),
    };
    Ok(Value::Bool(result))
}

fn eval_call(func: Func, args: &[Expr], env: &Env<'_>) -> Result<Value, EvalError> {
    match func {
        Func::Semver => {
            let range = eval_str(&args[0], env)?;
            let sv = env.semver.ok_or(EvalError::Unbound(Var::SemVer.name()))?;
            semver_match(&range, sv).map(Value::Bool)
        }
        Func::SemverWithVersion => {
            let range = eval_str(&args[0], env)?;
            let v = eval_str(&args[1], env)?;
            semver_match(&range, &v).map(Value::Bool)
        }
        Func::TrimPrefix => {
            let s = eval_str(&args[0], env)?;
            let prefix = eval_str(&args[1], env)?;
            Ok(Value::Str(
                s.strip_prefix(prefix.as_str()).unwrap_or(&s).to_string(),
            ))
        }
    }
}

/// A version that is not a version (a commit hash, `nightly`) matches no
/// range. A malformed range is an error.
fn semver_match(range: &str, version: &str) -> Result<bool, EvalError> {
    let range = VersionRange::parse(range).map_err(EvalError::Version)?;
    if is_commit_hash(version) {
        return Ok(false);
    }
    Ok(Version::parse(version).is_ok_and(|v| range.matches(&v)))
}
