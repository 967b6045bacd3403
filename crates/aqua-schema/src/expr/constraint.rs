//! Version range syntax accepted by `semver(...)`.
//!
//! Comparators are joined by `,` or whitespace (AND) and by `||` (OR):
//! `>= 1.20.0 < 1.25.0`, `>=1.0, <2.0 || = 3.0.0`, `~> 1.2`.

use std::cmp::Ordering;

use crate::version::Version;

/// Comparison operator of a single comparator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    /// Pessimistic: `~> 1.2.3` is `>= 1.2.3, < 1.3`.
    Tilde,
}

#[derive(Debug, Clone)]
struct Comparator {
    op: Op,
    version: Version,
}

impl Comparator {
    fn matches(&self, v: &Version) -> bool {
        let ord = v.cmp(&self.version);
        match self.op {
            Op::Eq => ord == Ordering::Equal,
            Op::Ne => ord != Ordering::Equal,
            Op::Gt => ord == Ordering::Greater,
            Op::Ge => ord != Ordering::Less,
            Op::Lt => ord == Ordering::Less,
            Op::Le => ord != Ordering::Greater,
            Op::Tilde => {
                if ord == Ordering::Less {
                    return false;
                }
                let want = self.version.segments();
                let have = v.segments();
                let fixed = want.len().saturating_sub(1);
                want[..fixed]
                    .iter()
                    .enumerate()
                    .all(|(i, w)| have.get(i).copied().unwrap_or(0) == *w)
            }
        }
    }
}

/// A parsed range: OR of AND-groups of comparators.
#[derive(Debug, Clone)]
pub struct VersionRange {
    any_of: Vec<Vec<Comparator>>,
}

impl VersionRange {
    /// Parse a range string.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first malformed comparator.
    pub fn parse(s: &str) -> Result<Self, String> {
        let mut any_of = Vec::new();
        for group in s.split("||") {
            let comparators = parse_group(group)?;
            if comparators.is_empty() {
                return Err(format!("empty constraint in {s:?}"));
            }
            any_of.push(comparators);
        }
        Ok(Self { any_of })
    }

    /// Whether `v` satisfies the range.
    pub fn matches(&self, v: &Version) -> bool {
        self.any_of
            .iter()
            .any(|group| group.iter().all(|c| c.matches(v)))
    }
}

fn parse_group(group: &str) -> Result<Vec<Comparator>, String> {
    let mut out = Vec::new();
    let mut rest = group.trim_start_matches([' ', '\t', ',']);

    while !rest.is_empty() {
        let op_len = rest
            .find(|c: char| !matches!(c, '<' | '>' | '=' | '!' | '~'))
            .unwrap_or(rest.len());
        let op = match &rest[..op_len] {
            "" | "=" | "==" => Op::Eq,
            "!=" => Op::Ne,
            ">" => Op::Gt,
            ">=" => Op::Ge,
            "<" => Op::Lt,
            "<=" => Op::Le,
            "~>" => Op::Tilde,
            other => return Err(format!("unknown operator {other:?}")),
        };
        rest = rest[op_len..].trim_start();

        let ver_len = rest
            .find(|c: char| c.is_whitespace() || c == ',')
            .unwrap_or(rest.len());
        if ver_len == 0 {
            return Err(format!("missing version after operator in {group:?}"));
        }
        let version = Version::parse(&rest[..ver_len]).map_err(|e| e.to_string())?;
        out.push(Comparator { op, version });

        rest = rest[ver_len..].trim_start_matches([' ', '\t', ',']);
    }

    Ok(out)
}
