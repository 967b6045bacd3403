//! Lenient version parsing for release tags.
//!
//! Release tags in the wild rarely follow strict semver: `v1.2`, `1.2.3.4`,
//! `cli-v0.9.0-rc.1` all show up. [`Version`] accepts any number of numeric
//! segments plus an optional pre-release and orders them the way users expect.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

static TAG_RE: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^(.*?)v?((?:\d+)(?:\.\d+)?(?:\.\d+)?(?:(?:\.|-).+)?)$"));

/// Error returned when a string is not a recognizable version.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid version: {0:?}")]
pub struct VersionError(pub String);

/// A version with arbitrary numeric segments and an optional pre-release.
#[derive(Debug, Clone, Eq)]
pub struct Version {
    segments: Vec<u64>,
    pre: Option<String>,
    original: String,
}

impl Version {
    /// Parse a version, tolerating a leading `v` and build metadata.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError`] if the string has no leading numeric segment.
    pub fn parse(s: &str) -> Result<Self, VersionError> {
        let original = s.to_string();
        let trimmed = s.trim();
        let body = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);
        let body = body.split_once('+').map_or(body, |(core, _build)| core);

        let (core, pre) = match body.split_once('-') {
            Some((core, pre)) if !pre.is_empty() => (core, Some(pre.to_string())),
            Some(_) => return Err(VersionError(original)),
            None => (body, None),
        };

        if core.is_empty() {
            return Err(VersionError(original));
        }

        let segments = core
            .split('.')
            .map(|seg| seg.parse::<u64>().map_err(|_| VersionError(original.clone())))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            segments,
            pre,
            original,
        })
    }

    /// Numeric segments, as written.
    pub fn segments(&self) -> &[u64] {
        &self.segments
    }

    /// The pre-release part after `-`, if any.
    pub fn prerelease(&self) -> Option<&str> {
        self.pre.as_deref()
    }

    /// Whether the version carries a pre-release.
    pub fn is_prerelease(&self) -> bool {
        self.pre.is_some()
    }

    /// The string this version was parsed from.
    pub fn as_str(&self) -> &str {
        &self.original
    }

    fn segment(&self, i: usize) -> u64 {
        self.segments.get(i).copied().unwrap_or(0)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.segments.len().max(other.segments.len());
        for i in 0..len {
            match self.segment(i).cmp(&other.segment(i)) {
                Ordering::Equal => {}
                ord => return ord,
            }
        }
        match (&self.pre, &other.pre) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(a), Some(b)) => compare_prerelease(a, b),
        }
    }
}

/// Pre-releases compare by semver precedence. Identifiers semver rejects
/// (`rc_1`, `beta+x`) fall back to a per-identifier comparison with the
/// same rules.
fn compare_prerelease(a: &str, b: &str) -> Ordering {
    if let (Ok(x), Ok(y)) = (semver::Prerelease::new(a), semver::Prerelease::new(b)) {
        return x.cmp(&y);
    }
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
                    (Ok(nx), Ok(ny)) => nx.cmp(&ny),
                    (Ok(_), Err(_)) => Ordering::Less,
                    (Err(_), Ok(_)) => Ordering::Greater,
                    (Err(_), Err(_)) => x.cmp(y),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Split a release tag into its parsed version and the prefix before it.
///
/// `cli-v1.2.3` yields `(1.2.3, "cli-")`. The `v` is absorbed by neither
/// side. Returns `None` when no version can be found.
pub fn version_and_prefix(tag: &str) -> Option<(Version, String)> {
    let re = TAG_RE.as_ref().ok()?;
    let caps = re.captures(tag)?;
    let prefix = caps.get(1).map_or("", |m| m.as_str());
    let version = Version::parse(caps.get(2)?.as_str()).ok()?;
    Some((version, prefix.to_string()))
}

/// Whether `s` looks like a full 40-character git commit hash.
pub fn is_commit_hash(s: &str) -> bool {
    s.len() == 40 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Strip one leading `v`.
pub fn trim_v(s: &str) -> &str {
    s.strip_prefix('v').unwrap_or(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1.2.3", "1.2.10", Ordering::Less)]
    #[case("v1.2", "1.2.0", Ordering::Equal)]
    #[case("1.2.3-rc.1", "1.2.3", Ordering::Less)]
    #[case("1.2.3-rc.2", "1.2.3-rc.10", Ordering::Less)]
    #[case("1.2.3-alpha", "1.2.3-1", Ordering::Greater)]
    #[case("1.2.3.4", "1.2.3", Ordering::Greater)]
    #[case("1.0.0-beta.11", "1.0.0-rc.1", Ordering::Less)]
    #[case("1.0.0-rc_2", "1.0.0-rc_10", Ordering::Greater)]
    #[case("1.0.0-rc_1.2", "1.0.0-rc_1.10", Ordering::Less)]
    fn test_ordering(#[case] a: &str, #[case] b: &str, #[case] expected: Ordering) {
        let a = Version::parse(a).unwrap();
        let b = Version::parse(b).unwrap();
        assert_eq!(a.cmp(&b), expected);
    }

    #[rstest]
    #[case("")]
    #[case("latest")]
    #[case("1.x")]
    #[case("1.2.3-")]
    fn test_parse_rejects(#[case] input: &str) {
        assert!(Version::parse(input).is_err());
    }

    #[rstest]
    #[case("v1.2.3", "", "1.2.3")]
    #[case("cli-v0.9.0", "cli-", "0.9.0")]
    #[case("release-2024.01.02", "release-", "2024.01.02")]
    #[case("1.0.0-rc.1", "", "1.0.0-rc.1")]
    fn test_version_and_prefix(#[case] tag: &str, #[case] prefix: &str, #[case] version: &str) {
        let (v, p) = version_and_prefix(tag).unwrap();
        assert_eq!(p, prefix);
        assert_eq!(v.as_str(), version);
    }

    #[test]
    fn test_version_and_prefix_none() {
        assert!(version_and_prefix("nightly").is_none());
    }

    #[test]
    fn test_is_commit_hash() {
        assert!(is_commit_hash("0123456789abcdef0123456789abcdef01234567"));
        assert!(!is_commit_hash("v1.0.0"));
        assert!(!is_commit_hash("0123456789abcdef0123456789abcdef0123456z"));
    }
}
