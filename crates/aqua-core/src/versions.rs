//! Finding the latest version of a package, or listing its versions.
//!
//! Which source is asked depends on the package: crates.io for `cargo`
//! packages, tags for `version_source: github_tag`, releases otherwise.

use std::collections::HashSet;
use std::sync::Arc;

use aqua_schema::expr::{ExprError, VersionConstraint, VersionFilter};
use aqua_schema::version::version_and_prefix;
use aqua_schema::{PackageInfo, PackageType, Version};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::sources::{CargoSource, GitHubSource, ListOptions, Release, SourceError};

const GH_MAX_PER_PAGE: u32 = 100;
const GH_LATEST_PER_PAGE: u32 = 30;

/// Which tags count as versions of the package, for one entry of
/// `version_overrides` or for the package itself.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    /// Required tag prefix.
    pub prefix: String,
    /// Compiled `version_filter`.
    pub filter: Option<VersionFilter>,
    /// Compiled `version_constraint`.
    pub constraint: Option<VersionConstraint>,
    /// Versions matched here have no asset and are skipped.
    pub no_asset: bool,
}

impl Filter {
    /// Whether `tag` has the prefix and passes the filter and constraint.
    pub fn matches(&self, tag: &str) -> bool {
        if !self.prefix.is_empty() && !tag.starts_with(&self.prefix) {
            return false;
        }
        if let Some(f) = &self.filter {
            if !f.check(tag, &self.prefix) {
                return false;
            }
        }
        self.constraint
            .as_ref()
            .is_none_or(|c| c.check(tag, &self.prefix))
    }
}

fn compile_constraint(src: &str) -> Result<Option<VersionConstraint>, ExprError> {
    if src.is_empty() {
        return Ok(None);
    }
    VersionConstraint::compile(src).map(Some)
}

/// One filter for the package, then one per version override.
///
/// Overrides inherit the package's prefix and filter unless they set
/// their own.
///
/// # Errors
///
/// Returns [`ExprError`] when a filter or constraint does not compile.
pub fn create_filters(pkg: &PackageInfo) -> Result<Vec<Filter>, ExprError> {
    let top = Filter {
        prefix: pkg.version_prefix.clone(),
        filter: if pkg.version_filter.is_empty() {
            None
        } else {
            Some(VersionFilter::compile(&pkg.version_filter)?)
        },
        constraint: compile_constraint(&pkg.version_constraints)?,
        no_asset: pkg.no_asset,
    };
    let mut filters = Vec::with_capacity(1 + pkg.version_overrides.len());
    for vo in &pkg.version_overrides {
        filters.push(Filter {
            prefix: vo
                .version_prefix
                .clone()
                .unwrap_or_else(|| top.prefix.clone()),
            filter: match &vo.version_filter {
                Some(src) => Some(VersionFilter::compile(src)?),
                None => top.filter.clone(),
            },
            constraint: compile_constraint(&vo.version_constraints)?,
            no_asset: vo.no_asset.unwrap_or(pkg.no_asset),
        });
    }
    filters.insert(0, top);
    Ok(filters)
}

/// A candidate version, with text to show next to it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Item {
    /// The version.
    pub label: String,
    /// Release title and notes.
    pub preview: String,
}

impl Item {
    fn plain(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            preview: String::new(),
        }
    }
}

/// Page size for listing: with filters, fetch full pages since many
/// entries may be dropped; otherwise no more than needed.
pub fn item_num_per_page(limit: usize, filter_num: usize) -> u32 {
    match u32::try_from(limit) {
        Ok(l) if l > 0 && filter_num == 0 && l < GH_MAX_PER_PAGE => l,
        _ => GH_MAX_PER_PAGE,
    }
}

fn filter_release(release: &Release, filters: &[Filter]) -> bool {
    if release.prerelease {
        return false;
    }
    filters
        .iter()
        .find(|f| f.matches(&release.tag_name))
        .is_some_and(|f| !f.no_asset)
}

fn filter_tag(tag: &str, filters: &[Filter]) -> bool {
    filters.iter().any(|f| f.matches(tag))
}

struct Candidate<'a> {
    tag: &'a str,
    version: Option<Version>,
    prerelease: bool,
}

impl<'a> Candidate<'a> {
    fn new(release: &'a Release) -> Self {
        let version = version_and_prefix(&release.tag_name).map(|(v, _)| v);
        let prerelease = release.prerelease || version.as_ref().is_some_and(Version::is_prerelease);
        Self {
            tag: &release.tag_name,
            version,
            prerelease,
        }
    }

    /// Whether `other` should replace `self` as the latest.
    fn superseded_by(&self, other: &Self) -> bool {
        if self.prerelease != other.prerelease {
            return self.prerelease;
        }
        match (&self.version, &other.version) {
            (Some(a), Some(b)) => b > a,
            (None, Some(_)) => true,
            (Some(_), None) => false,
            (None, None) => other.tag > self.tag,
        }
    }
}

fn latest_release(releases: &[Release]) -> Option<&str> {
    let mut iter = releases.iter().map(Candidate::new);
    let first = iter.next()?;
    let latest = iter.fold(first, |latest, c| {
        if latest.superseded_by(&c) { c } else { latest }
    });
    Some(latest.tag)
}

fn truncate<T>(mut items: Vec<T>, limit: usize) -> Vec<T> {
    if limit > 0 {
        items.truncate(limit);
    }
    items
}

fn release_preview(release: &Release) -> String {
    let mut preview = release.name.clone().unwrap_or_default();
    for part in [
        release.tag_name.as_str(),
        release.html_url.as_str(),
        release.body.as_deref().unwrap_or_default(),
    ] {
        if part.is_empty() {
            continue;
        }
        if !preview.is_empty() {
            preview.push('\n');
        }
        preview.push_str(part);
    }
    preview
}

/// Latest and list lookups over the configured sources.
#[derive(Clone, Default)]
pub struct VersionGetter {
    github: Option<Arc<dyn GitHubSource>>,
    cargo: Option<Arc<dyn CargoSource>>,
}

impl std::fmt::Debug for VersionGetter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionGetter")
            .field("github", &self.github.is_some())
            .field("cargo", &self.cargo.is_some())
            .finish()
    }
}

enum Kind {
    Cargo,
    GitHubTag,
    GitHubRelease,
}

impl VersionGetter {
    /// Getter over the sources that are configured.
    pub fn new(
        github: Option<Arc<dyn GitHubSource>>,
        cargo: Option<Arc<dyn CargoSource>>,
    ) -> Self {
        Self { github, cargo }
    }

    fn kind(&self, pkg: &PackageInfo) -> Option<Kind> {
        if pkg.pkg_type == Some(PackageType::Cargo) {
            return self.cargo.is_some().then_some(Kind::Cargo);
        }
        if !pkg.go_version_path.is_empty() {
            debug!(package_name = %pkg.get_name(), "versions from the Go module proxy are not supported");
            return None;
        }
        if self.github.is_none() || !pkg.has_repo() {
            return None;
        }
        if pkg.version_source == "github_tag" {
            return Some(Kind::GitHubTag);
        }
        Some(Kind::GitHubRelease)
    }

    fn github(&self) -> Result<&dyn GitHubSource, SourceError> {
        self.github
            .as_deref()
            .ok_or_else(|| SourceError::InvalidResponse("no GitHub source".to_string()))
    }

    fn cargo(&self) -> Result<&dyn CargoSource, SourceError> {
        self.cargo
            .as_deref()
            .ok_or_else(|| SourceError::InvalidResponse("no crates.io source".to_string()))
    }

    /// The latest version passing `filters`, `None` when there is none or
    /// no source applies.
    ///
    /// # Errors
    ///
    /// Returns the source error, including [`SourceError::Canceled`].
    pub async fn get(
        &self,
        pkg: &PackageInfo,
        filters: &[Filter],
        cancel: &CancellationToken,
    ) -> Result<Option<String>, SourceError> {
        match self.kind(pkg) {
            None => Ok(None),
            Some(Kind::Cargo) => self.cargo()?.get_latest_version(&pkg.crate_name, cancel).await,
            Some(Kind::GitHubTag) => {
                let gh = self.github()?;
                let mut opts = ListOptions::first(GH_LATEST_PER_PAGE);
                loop {
                    let page = gh
                        .list_tags(&pkg.repo_owner, &pkg.repo_name, opts, cancel)
                        .await?;
                    if let Some(tag) = page.items.iter().find(|t| filter_tag(&t.name, filters)) {
                        return Ok(Some(tag.name.clone()));
                    }
                    let Some(next) = page.next_page else {
                        return Ok(None);
                    };
                    opts.page = next;
                }
            }
            Some(Kind::GitHubRelease) => {
                let gh = self.github()?;
                let mut opts = ListOptions::first(GH_LATEST_PER_PAGE);
                loop {
                    let page = gh
                        .list_releases(&pkg.repo_owner, &pkg.repo_name, opts, cancel)
                        .await?;
                    let candidates: Vec<Release> = page
                        .items
                        .into_iter()
                        .filter(|r| filter_release(r, filters))
                        .collect();
                    if let Some(tag) = latest_release(&candidates) {
                        return Ok(Some(tag.to_string()));
                    }
                    let Some(next) = page.next_page else {
                        return Ok(None);
                    };
                    opts.page = next;
                }
            }
        }
    }

    /// Versions passing `filters`, newest first as the source returns
    /// them. `limit` 0 means no limit.
    ///
    /// # Errors
    ///
    /// Returns the source error, including [`SourceError::Canceled`].
    pub async fn list(
        &self,
        pkg: &PackageInfo,
        filters: &[Filter],
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<Item>, SourceError> {
        match self.kind(pkg) {
            None => Ok(Vec::new()),
            Some(Kind::Cargo) => {
                let versions = self.cargo()?.list_versions(&pkg.crate_name, cancel).await?;
                let items = versions
                    .into_iter()
                    .filter(|v| filter_tag(v, filters))
                    .map(Item::plain)
                    .collect();
                Ok(truncate(items, limit))
            }
            Some(Kind::GitHubTag) => {
                let gh = self.github()?;
                let mut opts = ListOptions::first(item_num_per_page(limit, filters.len()));
                let mut seen = HashSet::new();
                let mut items = Vec::new();
                loop {
                    let page = gh
                        .list_tags(&pkg.repo_owner, &pkg.repo_name, opts, cancel)
                        .await?;
                    for tag in page.items {
                        if seen.insert(tag.name.clone()) && filter_tag(&tag.name, filters) {
                            items.push(Item::plain(tag.name));
                        }
                    }
                    if limit > 0 && items.len() >= limit {
                        return Ok(truncate(items, limit));
                    }
                    let Some(next) = page.next_page else {
                        return Ok(items);
                    };
                    opts.page = next;
                }
            }
            Some(Kind::GitHubRelease) => {
                let gh = self.github()?;
                let mut opts = ListOptions::first(item_num_per_page(limit, filters.len()));
                let mut seen = HashSet::new();
                let mut items = Vec::new();
                loop {
                    let page = gh
                        .list_releases(&pkg.repo_owner, &pkg.repo_name, opts, cancel)
                        .await?;
                    for release in &page.items {
                        if seen.insert(release.tag_name.clone()) && filter_release(release, filters)
                        {
                            items.push(Item {
                                label: release.tag_name.clone(),
                                preview: release_preview(release),
                            });
                        }
                    }
                    if limit > 0 && items.len() >= limit {
                        return Ok(truncate(items, limit));
                    }
                    let Some(next) = page.next_page else {
                        return Ok(items);
                    };
                    opts.page = next;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{MockCargoSource, MockGitHubSource, Page, Tag};
    use aqua_schema::registry::VersionOverride;
    use rstest::rstest;

    fn release(tag: &str, prerelease: bool) -> Release {
        Release {
            tag_name: tag.into(),
            prerelease,
            ..Release::default()
        }
    }

    fn github_pkg() -> PackageInfo {
        PackageInfo {
            pkg_type: Some(PackageType::GithubRelease),
            repo_owner: "acme".into(),
            repo_name: "tool".into(),
            ..PackageInfo::default()
        }
    }

    #[rstest]
    #[case(10, 0, 10)]
    #[case(0, 0, 100)]
    #[case(10, 1, 100)]
    #[case(150, 0, 100)]
    fn test_item_num_per_page(#[case] limit: usize, #[case] filters: usize, #[case] want: u32) {
        assert_eq!(item_num_per_page(limit, filters), want);
    }

    #[test]
    fn test_create_filters_inherits_from_package() {
        let pkg = PackageInfo {
            version_prefix: "cli-".into(),
            version_filter: r#"not (Version contains "rc")"#.into(),
            version_constraints: "false".into(),
            version_overrides: vec![
                VersionOverride {
                    version_constraints: r#"semver("< 1.0.0")"#.into(),
                    no_asset: Some(true),
                    ..VersionOverride::default()
                },
                VersionOverride {
                    version_constraints: "true".into(),
                    version_prefix: Some(String::new()),
                    ..VersionOverride::default()
                },
            ],
            ..github_pkg()
        };
        let filters = create_filters(&pkg).unwrap();
        assert_eq!(filters.len(), 3);
        assert!(!filters[0].matches("cli-v1.0.0"));
        assert!(filters[1].matches("cli-v0.9.0"));
        assert!(filters[1].no_asset);
        assert!(!filters[1].matches("cli-v0.9.0-rc1"));
        assert!(!filters[1].matches("v0.9.0"));
        assert!(filters[2].matches("v2.0.0"));
    }

    #[test]
    fn test_create_filters_rejects_bad_expression() {
        let pkg = PackageInfo {
            version_filter: "Version ==".into(),
            ..github_pkg()
        };
        assert!(create_filters(&pkg).is_err());
    }

    #[test]
    fn test_filter_release() {
        let filters = create_filters(&PackageInfo {
            version_constraints: r#"semver(">= 1.0.0")"#.into(),
            version_overrides: vec![VersionOverride {
                version_constraints: "true".into(),
                no_asset: Some(true),
                ..VersionOverride::default()
            }],
            ..github_pkg()
        })
        .unwrap();
        assert!(filter_release(&release("v1.2.0", false), &filters));
        assert!(!filter_release(&release("v1.3.0", true), &filters));
        assert!(!filter_release(&release("v0.9.0", false), &filters));
    }

    #[test]
    fn test_latest_release_prefers_stable_and_higher() {
        let releases = vec![
            release("v1.0.0", false),
            release("v2.0.0-rc.1", false),
            release("v1.10.0", false),
            release("nightly", false),
            release("v1.9.0", false),
        ];
        assert_eq!(latest_release(&releases), Some("v1.10.0"));
        assert_eq!(latest_release(&[]), None);
    }

    #[tokio::test]
    async fn test_get_latest_release_pages_until_a_candidate() {
        let mut gh = MockGitHubSource::new();
        gh.expect_list_releases()
            .withf(|owner, repo, opts, _| {
                owner == "acme" && repo == "tool" && opts.page == 1 && opts.per_page == 30
            })
            .times(1)
            .returning(|_, _, _, _| {
                Ok(Page {
                    items: vec![release("v3.0.0", true)],
                    next_page: Some(2),
                })
            });
        gh.expect_list_releases()
            .withf(|_, _, opts, _| opts.page == 2)
            .times(1)
            .returning(|_, _, _, _| {
                Ok(Page {
                    items: vec![release("v2.0.0", false), release("v2.1.0", false)],
                    next_page: Some(3),
                })
            });

        let getter = VersionGetter::new(Some(Arc::new(gh)), None);
        let pkg = github_pkg();
        let filters = create_filters(&pkg).unwrap();
        let latest = getter
            .get(&pkg, &filters, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(latest.as_deref(), Some("v2.1.0"));
    }

    #[tokio::test]
    async fn test_list_tags_dedupes_and_limits() {
        let mut gh = MockGitHubSource::new();
        gh.expect_list_tags()
            .withf(|_, _, opts, _| opts.per_page == 100)
            .times(1)
            .returning(|_, _, _, _| {
                Ok(Page {
                    items: ["v3.0.0", "v3.0.0", "v2.0.0", "v1.0.0"]
                        .iter()
                        .map(|n| Tag { name: (*n).into() })
                        .collect(),
                    next_page: Some(2),
                })
            });

        let getter = VersionGetter::new(Some(Arc::new(gh)), None);
        let pkg = PackageInfo {
            version_source: "github_tag".into(),
            ..github_pkg()
        };
        let filters = create_filters(&pkg).unwrap();
        let items = getter
            .list(&pkg, &filters, 2, &CancellationToken::new())
            .await
            .unwrap();
        let labels: Vec<&str> = items.iter().map(|i| i.label.as_str()).collect();
        assert_eq!(labels, ["v3.0.0", "v2.0.0"]);
    }

    #[tokio::test]
    async fn test_cargo_latest() {
        let mut cargo = MockCargoSource::new();
        cargo
            .expect_get_latest_version()
            .withf(|name, _| name == "skim")
            .returning(|_, _| Ok(Some("3.0.0".into())));

        let getter = VersionGetter::new(None, Some(Arc::new(cargo)));
        let pkg = PackageInfo {
            name: "crates.io/skim".into(),
            pkg_type: Some(PackageType::Cargo),
            crate_name: "skim".into(),
            ..PackageInfo::default()
        };
        let latest = getter
            .get(&pkg, &create_filters(&pkg).unwrap(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(latest.as_deref(), Some("3.0.0"));
    }

    #[tokio::test]
    async fn test_no_source_for_package() {
        let getter = VersionGetter::default();
        let pkg = github_pkg();
        assert_eq!(
            getter.get(&pkg, &[], &CancellationToken::new()).await.unwrap(),
            None
        );
        assert!(
            getter
                .list(&pkg, &[], 0, &CancellationToken::new())
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_canceled_error_propagates() {
        let mut gh = MockGitHubSource::new();
        gh.expect_list_releases()
            .returning(|_, _, _, _| Err(SourceError::Canceled));

        let getter = VersionGetter::new(Some(Arc::new(gh)), None);
        let pkg = github_pkg();
        let result = getter.list(&pkg, &[], 0, &CancellationToken::new()).await;
        assert!(matches!(result, Err(SourceError::Canceled)));
    }
}
