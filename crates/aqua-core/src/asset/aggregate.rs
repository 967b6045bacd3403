//! Folding the assets of one release into a templated [`PackageInfo`].
//!
//! Every `(goos, goarch)` pair picks its best asset. Pairs are collapsed
//! per OS where possible, the most common format and asset become the
//! package defaults, and replacements shared by enough overrides are
//! hoisted to the package level.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use aqua_schema::PackageInfo;
use aqua_schema::registry::{Override, Replacements, normalize_supported_envs};
use aqua_schema::runtime::{AMD64, ARM64, DARWIN, LINUX, WINDOWS, is_os};

use super::parse::{AssetInfo, FORMAT_RAW};

/// Sort key of an asset among those for the same platform; smaller wins.
///
/// Archives beat raw files, then higher score, then the earliest
/// placeholder, then the shorter template. The template itself breaks any
/// remaining tie.
fn preference(a: &AssetInfo) -> (bool, Reverse<i32>, usize, usize, &str) {
    (
        a.is_raw(),
        Reverse(a.score),
        a.template.find('{').unwrap_or(usize::MAX),
        a.template.len(),
        a.template.as_str(),
    )
}

/// Best asset for `goos/goarch`, if any.
///
/// A darwin universal asset is a candidate for every darwin arch.
pub fn select_for_runtime<'a>(
    goos: &str,
    goarch: &str,
    infos: &'a [AssetInfo],
) -> Option<&'a AssetInfo> {
    infos
        .iter()
        .filter(|a| a.os == goos && (a.arch == goarch || (goos == DARWIN && a.darwin_all)))
        .min_by(|a, b| preference(a).cmp(&preference(b)))
}

/// Override under construction. `format` is cleared once it equals the
/// package default.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Candidate {
    goos: String,
    goarch: String,
    format: String,
    asset: Option<String>,
    replacements: Replacements,
}

impl Candidate {
    /// Whether the override's platform is one `key` could describe.
    fn names(&self, key: &str, key_is_os: bool) -> bool {
        self.goos == key
            || self.goarch == key
            || (self.goos.is_empty() && key_is_os)
            || (self.goarch.is_empty() && !key_is_os)
    }

    /// Whether the override covers every runtime of `key`.
    fn owns(&self, key: &str, key_is_os: bool) -> bool {
        if key_is_os {
            self.goos == key && self.goarch.is_empty()
        } else {
            self.goarch == key && self.goos.is_empty()
        }
    }

    fn is_empty(&self) -> bool {
        self.replacements.is_empty() && self.format.is_empty() && self.asset.is_none()
    }

    fn into_override(self) -> Override {
        Override {
            goos: self.goos,
            goarch: self.goarch,
            format: (!self.format.is_empty()).then_some(self.format),
            asset: self.asset,
            replacements: (!self.replacements.is_empty()).then_some(self.replacements),
            ..Override::default()
        }
    }
}

/// Union of `a` and `b`, provided they agree on `goos`.
fn merge_replacements(goos: &str, a: &Replacements, b: &Replacements) -> Option<Replacements> {
    if a.get(goos) != b.get(goos) {
        return None;
    }
    let mut merged = a.clone();
    merged.extend(b.iter().map(|(k, v)| (k.clone(), v.clone())));
    Some(merged)
}

/// Most common format; ties prefer an archive, then the smaller name.
fn default_format(cands: &[Candidate]) -> String {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for c in cands {
        *counts.entry(c.format.as_str()).or_default() += 1;
    }
    counts
        .into_iter()
        .min_by_key(|(f, n)| (Reverse(*n), *f == FORMAT_RAW, *f))
        .map(|(f, _)| f.to_string())
        .unwrap_or_default()
}

/// Most common asset among candidates in the default format; ties go to
/// the smaller template. Clears `format` on those candidates.
fn default_asset(format: &str, cands: &mut [Candidate]) -> String {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for c in cands.iter_mut().filter(|c| c.format == format) {
        c.format.clear();
        if let Some(asset) = &c.asset {
            *counts.entry(asset.clone()).or_default() += 1;
        }
    }
    counts
        .into_iter()
        .min_by(|(a, n), (b, m)| m.cmp(n).then_with(|| a.cmp(b)))
        .map(|(a, _)| a)
        .unwrap_or_default()
}

fn drop_default_asset(asset: &str, cands: Vec<Candidate>) -> Vec<Candidate> {
    cands
        .into_iter()
        .filter_map(|mut c| {
            if c.asset.as_deref() != Some(asset) {
                return Some(c);
            }
            c.asset = None;
            (!c.is_empty()).then_some(c)
        })
        .collect()
}

/// How many overrides agree with hoisting `key: value` minus how many it
/// would break. Overrides after one that owns `key` are not penalised.
fn hoist_score(cands: &[Candidate], key: &str, value: &str, key_is_os: bool) -> i32 {
    let mut score = -1;
    let mut owned = false;
    for c in cands {
        match c.replacements.get(key) {
            Some(v) if v == value => score += 1,
            Some(_) if !owned => score -= 1,
            None if !owned && c.names(key, key_is_os) => score -= 1,
            _ => {}
        }
        owned |= c.owns(key, key_is_os);
    }
    score
}

/// Move replacements to the package level where that does not change
/// what any override renders.
///
/// Overrides that agree drop the key. Overrides the key could affect but
/// that never set it get an explicit identity mapping. An override is
/// kept only if, once its own keys are processed, it still carries
/// something.
fn hoist_replacements(mut cands: Vec<Candidate>) -> (Replacements, Vec<Candidate>) {
    let mut hoisted = Replacements::new();
    let mut keep = vec![false; cands.len()];
    for i in 0..cands.len() {
        let snapshot = cands[i].replacements.clone();
        for (key, value) in &snapshot {
            let key_is_os = is_os(key);
            if hoist_score(&cands, key, value, key_is_os) < 0 {
                continue;
            }
            hoisted.insert(key.clone(), value.clone());
            let mut owned = false;
            for c in &mut cands {
                match c.replacements.get(key) {
                    Some(v) if v == value => {
                        c.replacements.remove(key);
                    }
                    None if !owned && c.names(key, key_is_os) => {
                        c.replacements.insert(key.clone(), key.clone());
                    }
                    _ => {}
                }
                owned |= c.owns(key, key_is_os);
            }
        }
        keep[i] = !cands[i].is_empty();
    }
    let kept = cands
        .into_iter()
        .zip(keep)
        .filter_map(|(c, k)| k.then_some(c))
        .collect();
    (hoisted, kept)
}

/// Fill `pkg`'s `format`, `asset`, `overrides`, `replacements`,
/// `supported_envs`, the emulation flags and `complete_windows_ext` from
/// the assets of one release.
pub fn parse_asset_infos(pkg: &mut PackageInfo, infos: &[AssetInfo]) {
    let mut cands = Vec::new();
    let mut envs = Vec::new();
    for goos in [LINUX, DARWIN, WINDOWS] {
        let mut per_os: Vec<Candidate> = Vec::with_capacity(2);
        let mut os_envs = Vec::with_capacity(2);
        for goarch in [AMD64, ARM64] {
            let Some(a) = select_for_runtime(goos, goarch, infos) else {
                continue;
            };
            per_os.push(Candidate {
                goos: goos.to_string(),
                goarch: goarch.to_string(),
                format: a.format.clone(),
                asset: Some(a.template.clone()),
                replacements: a.replacements.clone(),
            });
            os_envs.push(if goos == DARWIN && goarch == AMD64 {
                DARWIN.to_string()
            } else {
                format!("{goos}/{goarch}")
            });
        }
        if let [amd, arm] = per_os.as_slice() {
            os_envs = vec![goos.to_string()];
            if amd.format == arm.format && amd.asset == arm.asset {
                if let Some(replacements) =
                    merge_replacements(goos, &amd.replacements, &arm.replacements)
                {
                    per_os = vec![Candidate {
                        replacements,
                        ..amd.clone()
                    }];
                }
            }
        }
        if let [only] = per_os.as_mut_slice() {
            only.goarch.clear();
        }
        cands.extend(per_os);
        envs.extend(os_envs);
    }

    if select_for_runtime(DARWIN, AMD64, infos).is_some()
        && select_for_runtime(DARWIN, ARM64, infos).is_none()
    {
        pkg.rosetta2 = Some(true);
    }
    if select_for_runtime(WINDOWS, AMD64, infos).is_some()
        && select_for_runtime(WINDOWS, ARM64, infos).is_none()
    {
        pkg.windows_arm_emulation = Some(true);
    }
    pkg.supported_envs = normalize_supported_envs(envs);

    pkg.format = default_format(&cands);
    pkg.asset = default_asset(&pkg.format, &mut cands);
    let cands = drop_default_asset(&pkg.asset, cands);
    let (replacements, cands) = hoist_replacements(cands);
    pkg.replacements = replacements;
    pkg.overrides = cands.into_iter().map(Candidate::into_override).collect();

    if let Some(complete) = infos.iter().find_map(|a| a.complete_windows_ext) {
        pkg.complete_windows_ext = Some(complete);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::parse_asset_name;

    fn infos(names: &[&str], version: &str) -> Vec<AssetInfo> {
        names.iter().map(|n| parse_asset_name(n, version)).collect()
    }

    fn aggregate(names: &[&str], version: &str) -> PackageInfo {
        let mut pkg = PackageInfo::default();
        parse_asset_infos(&mut pkg, &infos(names, version));
        pkg
    }

    fn repl(pairs: &[(&str, &str)]) -> Replacements {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_cross_platform_defaults() {
        let pkg = aggregate(
            &[
                "tool-linux-amd64.tar.gz",
                "tool-linux-arm64.tar.gz",
                "tool-darwin-amd64.tar.gz",
                "tool-darwin-arm64.tar.gz",
                "tool-windows-amd64.zip",
                "tool-windows-arm64.zip",
            ],
            "v1.0.0",
        );
        assert_eq!(pkg.format, "tar.gz");
        assert_eq!(pkg.asset, "tool-{{.OS}}-{{.Arch}}.{{.Format}}");
        assert_eq!(
            pkg.overrides,
            vec![Override {
                goos: "windows".into(),
                format: Some("zip".into()),
                ..Override::default()
            }]
        );
        assert_eq!(pkg.supported_envs, None);
        assert_eq!(pkg.rosetta2, None);
        assert!(pkg.replacements.is_empty());
    }

    #[test]
    fn test_rosetta2_when_darwin_has_only_amd64() {
        let pkg = aggregate(
            &[
                "tool-linux-amd64.tar.gz",
                "tool-linux-arm64.tar.gz",
                "tool-darwin-amd64.tar.gz",
            ],
            "v1.0.0",
        );
        assert_eq!(pkg.rosetta2, Some(true));
        assert_eq!(
            pkg.supported_envs,
            Some(vec!["linux".to_string(), "darwin".to_string()])
        );

        let both = aggregate(
            &["tool-darwin-amd64.tar.gz", "tool-darwin-arm64.tar.gz"],
            "v1.0.0",
        );
        assert_eq!(both.rosetta2, None);
    }

    #[test]
    fn test_windows_arm_emulation_when_windows_has_only_amd64() {
        let pkg = aggregate(
            &["tool-linux-amd64.tar.gz", "tool-windows-amd64.zip"],
            "v1.0.0",
        );
        assert_eq!(pkg.windows_arm_emulation, Some(true));
        assert_eq!(pkg.rosetta2, None);
    }

    #[test]
    fn test_goreleaser_style_replacements_are_hoisted() {
        let pkg = aggregate(
            &[
                "tool_1.0.0_Linux_x86_64.tar.gz",
                "tool_1.0.0_Linux_arm64.tar.gz",
                "tool_1.0.0_Darwin_x86_64.tar.gz",
                "tool_1.0.0_Darwin_arm64.tar.gz",
                "tool_1.0.0_Windows_x86_64.zip",
                "tool_1.0.0_Windows_arm64.zip",
            ],
            "v1.0.0",
        );
        assert_eq!(pkg.asset, "tool_{{trimV .Version}}_{{.OS}}_{{.Arch}}.{{.Format}}");
        assert_eq!(
            pkg.replacements,
            repl(&[
                ("amd64", "x86_64"),
                ("darwin", "Darwin"),
                ("linux", "Linux"),
                ("windows", "Windows"),
            ])
        );
        assert_eq!(
            pkg.overrides,
            vec![Override {
                goos: "windows".into(),
                format: Some("zip".into()),
                ..Override::default()
            }]
        );
    }

    #[test]
    fn test_single_os_replacement_is_hoisted() {
        let pkg = aggregate(
            &[
                "gh_2.40.0_linux_amd64.tar.gz",
                "gh_2.40.0_linux_arm64.tar.gz",
                "gh_2.40.0_macOS_amd64.zip",
                "gh_2.40.0_macOS_arm64.zip",
                "gh_2.40.0_windows_amd64.zip",
                "gh_2.40.0_windows_arm64.zip",
            ],
            "v2.40.0",
        );
        assert_eq!(pkg.format, "zip");
        assert_eq!(pkg.replacements, repl(&[("darwin", "macOS")]));
        assert_eq!(
            pkg.overrides,
            vec![Override {
                goos: "linux".into(),
                format: Some("tar.gz".into()),
                ..Override::default()
            }]
        );
    }

    #[test]
    fn test_identity_keeps_override_behaviour() {
        let pkg = aggregate(
            &[
                "tool_linux_x86_64.tar.gz",
                "tool_linux_arm64.tar.gz",
                "tool_darwin_x86_64.tar.gz",
                "tool_darwin_arm64.tar.gz",
                "tool_windows_amd64.zip",
                "tool_windows_arm64.zip",
            ],
            "v1.0.0",
        );
        assert_eq!(pkg.replacements, repl(&[("amd64", "x86_64")]));
        assert_eq!(
            pkg.overrides,
            vec![Override {
                goos: "windows".into(),
                format: Some("zip".into()),
                replacements: Some(repl(&[("amd64", "amd64")])),
                ..Override::default()
            }]
        );
    }

    #[test]
    fn test_select_prefers_archive_and_musl() {
        let all = infos(
            &[
                "rg-14.0.0-x86_64-unknown-linux-gnu.tar.gz",
                "rg-14.0.0-x86_64-unknown-linux-musl.tar.gz",
                "rg-14.0.0-x86_64-unknown-linux-musl",
            ],
            "14.0.0",
        );
        let best = select_for_runtime("linux", "amd64", &all).unwrap();
        assert_eq!(best.replacements["linux"], "unknown-linux-musl");
        assert_eq!(best.format, "tar.gz");
        assert!(select_for_runtime("linux", "arm64", &all).is_none());
    }

    #[test]
    fn test_darwin_universal_covers_both_arches() {
        let pkg = aggregate(
            &[
                "tool_linux_amd64.tar.gz",
                "tool_linux_arm64.tar.gz",
                "tool_darwin_all.tar.gz",
            ],
            "v1.0.0",
        );
        assert_eq!(pkg.rosetta2, None);
        assert_eq!(
            pkg.supported_envs,
            Some(vec!["linux".to_string(), "darwin".to_string()])
        );
        // Equal counts fall back to the smaller template.
        assert_eq!(pkg.asset, "tool_{{.OS}}_all.{{.Format}}");
        assert_eq!(
            pkg.overrides,
            vec![Override {
                goos: "linux".into(),
                asset: Some("tool_{{.OS}}_{{.Arch}}.{{.Format}}".into()),
                ..Override::default()
            }]
        );
    }

    #[test]
    fn test_complete_windows_ext_propagates() {
        let pkg = aggregate(&["tool_linux_amd64", "tool_windows_amd64"], "v1.0.0");
        assert_eq!(pkg.format, "raw");
        assert_eq!(pkg.complete_windows_ext, Some(false));
    }

    #[test]
    fn test_aggregation_is_deterministic() {
        let names = [
            "tool_1.0.0_Linux_x86_64.tar.gz",
            "tool_1.0.0_Darwin_x86_64.zip",
            "tool_1.0.0_Darwin_arm64.tar.gz",
            "tool_1.0.0_Windows_x86_64.zip",
        ];
        let first = aggregate(&names, "v1.0.0");
        let mut reversed = names;
        reversed.reverse();
        assert_eq!(aggregate(&reversed, "v1.0.0"), first);
    }
}
