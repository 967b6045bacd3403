//! Splitting a release history into version overrides.
//!
//! Releases whose asset names look the same once the version is templated
//! out form a group. Each group is turned into a package with
//! [`patch_release`], groups yielding equal packages are merged, and every
//! remaining group becomes one entry of `version_overrides`.

use std::cmp::Ordering;

use aqua_schema::registry::VersionOverride;
use aqua_schema::version::trim_v;
use aqua_schema::{PackageInfo, Version};

use super::patch::patch_release;
use crate::asset::exclude;

/// A release as seen by the generator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenRelease {
    /// GitHub release id, 0 for releases read from an asset file.
    pub id: u64,
    /// Release tag as published.
    pub tag: String,
    /// Version parsed from the tag.
    pub version: Option<Version>,
    /// Text before the version in the tag.
    pub version_prefix: String,
    /// Asset names.
    pub assets: Vec<String>,
}

impl GenRelease {
    /// Split `tag` into version and prefix.
    pub fn new(id: u64, tag: String, assets: Vec<String>) -> Self {
        let (version, version_prefix) = match aqua_schema::version::version_and_prefix(&tag) {
            Some((v, prefix)) => (Some(v), prefix),
            None => (None, String::new()),
        };
        Self {
            id,
            tag,
            version,
            version_prefix,
            assets,
        }
    }

    /// Oldest first. Tags without a version sort before versioned ones.
    pub fn chronological(&self, other: &Self) -> Ordering {
        self.version
            .cmp(&other.version)
            .then_with(|| self.tag.cmp(&other.tag))
    }
}

#[derive(Debug, Clone)]
struct Group {
    releases: Vec<GenRelease>,
    /// Sorted version-templated asset names.
    asset_names: Vec<String>,
    all_asset: String,
    pkg: Option<PackageInfo>,
    fixed: bool,
}

impl Group {
    fn new(release: GenRelease, asset_names: Vec<String>) -> Self {
        Self {
            all_asset: asset_names.join("\n"),
            releases: vec![release],
            asset_names,
            pkg: None,
            fixed: false,
        }
    }

    fn info(&self) -> Option<&PackageInfo> {
        self.pkg.as_ref()
    }

    fn no_asset(&self) -> bool {
        self.info().is_some_and(|p| p.no_asset)
    }

    fn representative<'a>(&self, release: &'a GenRelease) -> Option<&'a GenRelease> {
        if self.no_asset() { None } else { Some(release) }
    }

    fn absorb(&mut self, other: Group) {
        self.releases.extend(other.releases);
    }

    /// The constraint selecting this group's releases, and the release
    /// standing for the group in the returned version list.
    fn version_constraint(&self) -> (String, Option<&GenRelease>) {
        let Some(first) = self.releases.first() else {
            return ("false".to_string(), None);
        };
        if let [only] = self.releases.as_slice() {
            return (format!(r#"Version == "{}""#, only.tag), self.representative(only));
        }
        if self.fixed {
            return (version_in(&self.releases), self.representative(first));
        }
        let mut non_semver = Vec::new();
        for release in self.releases.iter().rev() {
            let Some(version) = &release.version else {
                non_semver.push(release.clone());
                continue;
            };
            let upper = format!(r#"semver("<= {}")"#, trim_v(version.as_str()));
            let vc = if non_semver.is_empty() {
                upper
            } else {
                format!("{upper} or {}", version_in(&non_semver))
            };
            return (vc, self.representative(release));
        }
        (version_in(&non_semver), self.representative(first))
    }
}

fn version_in(releases: &[GenRelease]) -> String {
    let tags: Vec<String> = releases.iter().map(|r| format!(r#""{}""#, r.tag)).collect();
    format!("Version in [{}]", tags.join(", "))
}

/// Template the version out of an asset name so that releases can be
/// compared.
pub fn replace_version(asset: &str, version: &str, semver: &str) -> String {
    let s = asset.replace(version, "{{.Version}}").replace(
        version.strip_prefix('v').unwrap_or(version),
        "{{trimV .Version}}",
    );
    if semver == version || semver.is_empty() {
        return s;
    }
    s.replace(semver, "{{.SemVer}}")
}

fn group_by_all_asset(releases: Vec<GenRelease>) -> Vec<Group> {
    let mut groups: Vec<Group> = Vec::new();
    for release in releases {
        let semver = release
            .tag
            .strip_prefix(release.version_prefix.as_str())
            .unwrap_or(&release.tag)
            .to_string();
        let mut names: Vec<String> = release
            .assets
            .iter()
            .map(|a| replace_version(a, &release.tag, &semver))
            .collect();
        names.sort();
        match groups.last_mut() {
            Some(g) if g.all_asset == names.join("\n") => g.releases.push(release),
            _ => groups.push(Group::new(release, names)),
        }
    }
    groups
}

fn exclude_group_assets(group: &mut Group, pkg_name: &str) {
    group.asset_names.retain(|name| !exclude(pkg_name, name));
    group.all_asset = group.asset_names.join("\n");
}

/// Merge neighbours with the same assets or the same package.
fn merge_adjacent(groups: Vec<Group>) -> Vec<Group> {
    let mut merged: Vec<Group> = Vec::with_capacity(groups.len());
    for group in groups {
        match merged.last_mut() {
            Some(prev)
                if prev.all_asset == group.all_asset
                    || (prev.pkg.is_some() && prev.pkg == group.pkg) =>
            {
                prev.absorb(group);
            }
            _ => merged.push(group),
        }
    }
    merged
}

/// Fixed groups with the same assets become one, oldest first, with the
/// asset-less group on top.
fn merge_fixed_groups(groups: Vec<Group>) -> Vec<Group> {
    let mut merged: Vec<Group> = Vec::with_capacity(groups.len());
    for group in groups {
        match merged.iter_mut().find(|g| g.all_asset == group.all_asset) {
            Some(existing) => existing.absorb(group),
            None => merged.push(group),
        }
    }
    merged.sort_by(|a, b| a.releases[0].chronological(&b.releases[0]));
    if let Some(i) = merged.iter().position(Group::no_asset) {
        let g = merged.remove(i);
        merged.insert(0, g);
    }
    merged
}

/// Single-release groups other than the newest are pinned by exact
/// version and emitted first, so the ranged groups can merge across them.
fn sort_and_merge_groups(mut groups: Vec<Group>) -> Vec<Group> {
    let Some(last) = groups.pop() else {
        return groups;
    };
    let (mut fixed, mut ranged): (Vec<Group>, Vec<Group>) =
        groups.into_iter().partition(|g| g.releases.len() == 1);
    for g in &mut fixed {
        g.fixed = true;
    }
    ranged.push(last);
    let mut out = merge_fixed_groups(fixed);
    out.extend(merge_adjacent(ranged));
    out
}

fn group(repo: &PackageInfo, pkg_name: &str, releases: Vec<GenRelease>) -> Vec<Group> {
    let mut groups = group_by_all_asset(releases);
    for g in &mut groups {
        exclude_group_assets(g, pkg_name);
    }
    let mut groups = merge_adjacent(groups);

    for g in &mut groups {
        let mut pkg = PackageInfo {
            repo_owner: repo.repo_owner.clone(),
            repo_name: repo.repo_name.clone(),
            ..PackageInfo::default()
        };
        patch_release(&mut pkg, pkg_name, &g.releases[0].tag, &g.asset_names, false);
        g.pkg = Some(pkg);
    }
    let mut groups = merge_adjacent(groups);

    if groups
        .last()
        .and_then(Group::info)
        .is_some_and(|p| p.asset.is_empty() && !p.no_asset)
    {
        groups.pop();
    }
    sort_and_merge_groups(groups)
}

fn to_version_override(group: &Group) -> (VersionOverride, Option<&GenRelease>) {
    let info = group.info().cloned().unwrap_or_default();
    let (constraint, release) = group.version_constraint();
    let vo = VersionOverride {
        version_constraints: constraint,
        no_asset: info.no_asset.then_some(true),
        rosetta2: info.rosetta2,
        windows_arm_emulation: info.windows_arm_emulation,
        version_filter: (!info.version_filter.is_empty()).then(|| info.version_filter.clone()),
        version_prefix: (!info.version_prefix.is_empty()).then(|| info.version_prefix.clone()),
        ..VersionOverride::from_package(&info)
    };
    (vo, release)
}

/// Append one version override per release group to `pkg`.
///
/// `releases` must be oldest first. Returns the tags standing for the
/// groups, newest first.
pub fn generate_version_overrides(
    pkg: &mut PackageInfo,
    pkg_name: &str,
    releases: Vec<GenRelease>,
) -> Vec<String> {
    if releases.is_empty() {
        return Vec::new();
    }
    let groups = group(pkg, pkg_name, releases);
    let mut representatives = Vec::with_capacity(groups.len());
    for g in &groups {
        let (vo, release) = to_version_override(g);
        pkg.version_overrides.push(vo);
        representatives.extend(release);
    }
    if let Some(last) = pkg.version_overrides.last_mut() {
        last.version_constraints = "true".to_string();
    }
    representatives.sort_by(|a, b| b.chronological(a));
    representatives.into_iter().map(|r| r.tag.clone()).collect()
}
