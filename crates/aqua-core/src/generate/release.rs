//! Collecting releases and their assets for generation.

use std::collections::BTreeMap;
use std::path::Path;

use aqua_schema::PackageInfo;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::group::GenRelease;
use super::{GenerateConfig, GenerateError};
use crate::sources::{GitHubSource, ListOptions, Release, SourceError};

const MAX_PER_PAGE: u32 = 100;
const MAX_PAGES: usize = 10;

/// `{tag: [asset, ...]}` read from `--asset-file`.
pub type AssetFile = BTreeMap<String, Vec<String>>;

/// Cancellation aborts; any other source failure is logged and the
/// caller carries on with what it has.
pub(crate) fn tolerate<T>(
    result: Result<T, SourceError>,
    what: &str,
    pkg: &PackageInfo,
) -> Result<Option<T>, GenerateError> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(SourceError::Canceled) => Err(GenerateError::Canceled),
        Err(e) => {
            warn!(
                error = %e,
                repo_owner = %pkg.repo_owner,
                repo_name = %pkg.repo_name,
                "{what}"
            );
            Ok(None)
        }
    }
}

/// Tags that never name a release of the package.
pub fn exclude_version(tag: &str, cfg: &GenerateConfig) -> bool {
    if matches!(tag, "latest" | "nightly" | "stable") {
        return true;
    }
    if let Some(filter) = &cfg.version_filter {
        match filter.try_check(tag, "") {
            Ok(false) => return true,
            Ok(true) => {}
            Err(e) => warn!(error = %e, tag_name = tag, "evaluate a version filter"),
        }
    }
    !cfg.version_prefix.is_empty() && !tag.starts_with(&cfg.version_prefix)
}

/// Assets rejected by `all_assets_filter`.
pub fn exclude_asset(asset: &str, cfg: &GenerateConfig) -> bool {
    cfg.all_assets_filter
        .as_ref()
        .is_some_and(|filter| !filter.check(asset))
}

/// Up to ten pages of releases, stopping early once `limit` is reached.
pub(crate) async fn list_releases(
    github: &dyn GitHubSource,
    pkg: &PackageInfo,
    limit: usize,
    cancel: &CancellationToken,
) -> Result<Vec<Release>, GenerateError> {
    let per_page = match u32::try_from(limit) {
        Ok(l) if l > 0 && l < MAX_PER_PAGE => l,
        _ => MAX_PER_PAGE,
    };
    let mut opts = ListOptions::first(per_page);
    let mut releases = Vec::new();
    for _ in 0..MAX_PAGES {
        let result = github
            .list_releases(&pkg.repo_owner, &pkg.repo_name, opts, cancel)
            .await;
        let Some(page) = tolerate(result, "list releases", pkg)? else {
            break;
        };
        let fetched = page.items.len();
        releases.extend(page.items);
        if limit > 0 && fetched >= limit {
            break;
        }
        let Some(next) = page.next_page else {
            break;
        };
        opts.page = next;
    }
    Ok(releases)
}

/// Names of the assets of release `release_id`.
pub(crate) async fn list_release_assets(
    github: &dyn GitHubSource,
    pkg: &PackageInfo,
    release_id: u64,
    cancel: &CancellationToken,
) -> Result<Vec<String>, GenerateError> {
    let mut opts = ListOptions::first(MAX_PER_PAGE);
    let mut assets = Vec::new();
    for _ in 0..MAX_PAGES {
        let result = github
            .list_release_assets(&pkg.repo_owner, &pkg.repo_name, release_id, opts, cancel)
            .await;
        let Some(page) = tolerate(result, "list release assets", pkg)? else {
            break;
        };
        let short = page.items.len() < MAX_PER_PAGE as usize;
        assets.extend(page.items.into_iter().map(|a| a.name));
        if short {
            break;
        }
        let Some(next) = page.next_page else {
            break;
        };
        opts.page = next;
    }
    Ok(assets)
}

fn sorted(mut releases: Vec<GenRelease>) -> Vec<GenRelease> {
    releases.sort_by(GenRelease::chronological);
    releases
}

/// Releases from the GitHub API, oldest first, with filtered assets.
pub(crate) async fn github_releases(
    github: &dyn GitHubSource,
    pkg: &PackageInfo,
    limit: usize,
    cfg: &GenerateConfig,
    cancel: &CancellationToken,
) -> Result<Vec<GenRelease>, GenerateError> {
    let listed = list_releases(github, pkg, limit, cancel).await?;
    let releases: Vec<GenRelease> = listed
        .into_iter()
        .filter(|r| !exclude_version(&r.tag_name, cfg))
        .map(|r| GenRelease::new(r.id, r.tag_name, Vec::new()))
        .collect();
    let mut releases = sorted(releases);
    for release in &mut releases {
        let assets = list_release_assets(github, pkg, release.id, cancel).await?;
        debug!(num_of_assets = assets.len(), tag_name = %release.tag, "got assets");
        release.assets = assets
            .into_iter()
            .filter(|a| !exclude_asset(a, cfg))
            .collect();
    }
    Ok(releases)
}

/// Read an asset file written as `{"v1.0.0": ["tool.tar.gz"]}`.
///
/// # Errors
///
/// Returns [`GenerateError::Io`] when the file cannot be read and
/// [`GenerateError::AssetFile`] when it is not such an object.
pub fn read_asset_file(path: &Path) -> Result<AssetFile, GenerateError> {
    let data = std::fs::read(path).map_err(|source| GenerateError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&data).map_err(|source| GenerateError::AssetFile {
        path: path.to_path_buf(),
        source,
    })
}

/// Releases from an asset file, oldest first, with filtered assets.
pub fn asset_file_releases(file: &AssetFile, cfg: &GenerateConfig) -> Vec<GenRelease> {
    let releases = file
        .iter()
        .filter(|(tag, _)| !exclude_version(tag, cfg))
        .map(|(tag, assets)| {
            let assets = assets
                .iter()
                .filter(|a| !exclude_asset(a, cfg))
                .cloned()
                .collect();
            GenRelease::new(0, tag.clone(), assets)
        })
        .collect();
    sorted(releases)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{MockGitHubSource, Page, ReleaseAsset};
    use rstest::rstest;

    fn cfg(yaml: &str) -> GenerateConfig {
        GenerateConfig::from_yaml(yaml).unwrap()
    }

    fn repo() -> PackageInfo {
        PackageInfo {
            repo_owner: "acme".into(),
            repo_name: "tool".into(),
            ..PackageInfo::default()
        }
    }

    #[rstest]
    #[case("latest", "", true)]
    #[case("nightly", "", true)]
    #[case("v1.0.0", "", false)]
    #[case("v1.0.0-rc1", r#"version_filter: 'not (Version contains "rc")'"#, true)]
    #[case("v1.0.0", r#"version_filter: 'not (Version contains "rc")'"#, false)]
    #[case("v1.0.0", "version_prefix: cli-", true)]
    #[case("cli-v1.0.0", "version_prefix: cli-", false)]
    fn test_exclude_version(#[case] tag: &str, #[case] yaml: &str, #[case] excluded: bool) {
        assert_eq!(exclude_version(tag, &cfg(yaml)), excluded);
    }

    #[test]
    fn test_exclude_asset() {
        let c = cfg(r#"all_assets_filter: 'not (Asset contains "static")'"#);
        assert!(exclude_asset("tool-static-linux.tar.gz", &c));
        assert!(!exclude_asset("tool-linux.tar.gz", &c));
        assert!(!exclude_asset("tool-static-linux.tar.gz", &cfg("")));
    }

    #[test]
    fn test_asset_file_releases() {
        let mut file = AssetFile::new();
        file.insert("v1.10.0".into(), vec!["tool_linux.tar.gz".into()]);
        file.insert("v1.9.0".into(), vec!["tool_linux.tar.gz".into(), "tool-static.zip".into()]);
        file.insert("latest".into(), vec!["tool_linux.tar.gz".into()]);

        let c = cfg(r#"all_assets_filter: 'not (Asset contains "static")'"#);
        let releases = asset_file_releases(&file, &c);
        let tags: Vec<&str> = releases.iter().map(|r| r.tag.as_str()).collect();
        assert_eq!(tags, ["v1.9.0", "v1.10.0"]);
        assert_eq!(releases[0].assets, ["tool_linux.tar.gz"]);
    }

    #[test]
    fn test_read_asset_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("assets.json");
        std::fs::write(&path, r#"{"v1.0.0": ["tool.tar.gz"]}"#).unwrap();
        let file = read_asset_file(&path).unwrap();
        assert_eq!(file["v1.0.0"], ["tool.tar.gz"]);

        std::fs::write(&path, "[1, 2]").unwrap();
        assert!(matches!(read_asset_file(&path), Err(GenerateError::AssetFile { .. })));
        assert!(matches!(
            read_asset_file(&dir.path().join("missing.json")),
            Err(GenerateError::Io { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_releases_stops_at_limit() {
        let mut gh = MockGitHubSource::new();
        gh.expect_list_releases()
            .withf(|_, _, opts, _| opts.per_page == 2 && opts.page == 1)
            .times(1)
            .returning(|_, _, _, _| {
                Ok(Page {
                    items: vec![
                        Release { tag_name: "v2.0.0".into(), ..Release::default() },
                        Release { tag_name: "v1.0.0".into(), ..Release::default() },
                    ],
                    next_page: Some(2),
                })
            });

        let releases = list_releases(&gh, &repo(), 2, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(releases.len(), 2);
    }

    #[tokio::test]
    async fn test_list_releases_keeps_partial_result_on_error() {
        let mut gh = MockGitHubSource::new();
        gh.expect_list_releases()
            .withf(|_, _, opts, _| opts.page == 1)
            .times(1)
            .returning(|_, _, _, _| {
                Ok(Page {
                    items: vec![Release { tag_name: "v2.0.0".into(), ..Release::default() }],
                    next_page: Some(2),
                })
            });
        gh.expect_list_releases()
            .withf(|_, _, opts, _| opts.page == 2)
            .times(1)
            .returning(|_, _, _, _| Err(SourceError::NotFound("acme/tool".into())));

        let releases = list_releases(&gh, &repo(), 0, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(releases.len(), 1);
    }

    #[tokio::test]
    async fn test_cancellation_is_not_tolerated() {
        let mut gh = MockGitHubSource::new();
        gh.expect_list_release_assets()
            .returning(|_, _, _, _, _| Err(SourceError::Canceled));

        let result = list_release_assets(&gh, &repo(), 1, &CancellationToken::new()).await;
        assert!(matches!(result, Err(GenerateError::Canceled)));
    }

    #[tokio::test]
    async fn test_github_releases_sorted_with_assets() {
        let mut gh = MockGitHubSource::new();
        gh.expect_list_releases().times(1).returning(|_, _, _, _| {
            Ok(Page {
                items: vec![
                    Release { id: 2, tag_name: "v1.1.0".into(), ..Release::default() },
                    Release { id: 3, tag_name: "nightly".into(), ..Release::default() },
                    Release { id: 1, tag_name: "v1.0.0".into(), ..Release::default() },
                ],
                next_page: None,
            })
        });
        gh.expect_list_release_assets()
            .times(2)
            .returning(|_, _, id, _, _| {
                Ok(Page {
                    items: vec![ReleaseAsset {
                        name: format!("tool_{id}_linux_amd64.tar.gz"),
                        ..ReleaseAsset::default()
                    }],
                    next_page: None,
                })
            });

        let releases = github_releases(&gh, &repo(), 0, &cfg(""), &CancellationToken::new())
            .await
            .unwrap();
        let tags: Vec<&str> = releases.iter().map(|r| r.tag.as_str()).collect();
        assert_eq!(tags, ["v1.0.0", "v1.1.0"]);
        assert_eq!(releases[0].assets, ["tool_1_linux_amd64.tar.gz"]);
    }
}
