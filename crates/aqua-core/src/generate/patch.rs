//! Filling a package from the asset names of one release.

use std::collections::BTreeSet;

use aqua_schema::PackageInfo;
use aqua_schema::registry::{Checksum, Cosign, DownloadedFile, SlsaProvenance};
use tracing::debug;

use crate::asset::{checksum_config_from_filename, exclude, parse_asset_infos, parse_asset_name};

const GITHUB_RELEASE: &str = "github_release";
const OIDC_ISSUER: &str = "https://token.actions.githubusercontent.com";

/// Set the asset template, overrides and verification settings of `pkg`
/// from `assets`, the files of release `tag`.
///
/// A release without assets marks the package `no_asset`.
pub fn patch_release(
    pkg: &mut PackageInfo,
    pkg_name: &str,
    tag: &str,
    assets: &[String],
    immutable: bool,
) {
    if assets.is_empty() {
        pkg.no_asset = true;
        return;
    }
    pkg.github_immutable_release = immutable;
    let name_has_checksum = pkg_name.to_ascii_lowercase().contains("checksum");
    let mut infos = Vec::with_capacity(assets.len());
    let mut names = BTreeSet::new();
    let mut checksum_names = BTreeSet::new();
    for asset in assets {
        if !name_has_checksum && checksum_config_from_filename(asset, tag).is_some() {
            checksum_names.insert(asset.as_str());
            continue;
        }
        if exclude(pkg_name, asset) {
            debug!(asset_name = %asset, "exclude an asset");
            continue;
        }
        names.insert(asset.as_str());
        infos.push(parse_asset_name(asset, tag));
    }

    pkg.checksum = names
        .iter()
        .find_map(|name| sidecar_checksum(&checksum_names, name));
    pkg.slsa_provenance = names.iter().find_map(|name| slsa_provenance(name, tag));
    if pkg.checksum.is_none() {
        let repo: &PackageInfo = pkg;
        let checksum = checksum_names.iter().find_map(|name| {
            let mut checksum = checksum_config_from_filename(name, tag)?;
            checksum.asset = parse_asset_name(name, tag).template;
            checksum.cosign = checksum_cosign(repo, name, &names);
            Some(checksum)
        });
        pkg.checksum = checksum;
    }
    parse_asset_infos(pkg, &infos);
}

/// A per-asset checksum file such as `tool.tar.gz.sha256`.
fn sidecar_checksum(checksum_names: &BTreeSet<&str>, asset: &str) -> Option<Checksum> {
    ["md5", "sha256", "sha512", "sha1"]
        .into_iter()
        .find(|suffix| checksum_names.contains(format!("{asset}.{suffix}").as_str()))
        .map(|suffix| Checksum {
            checksum_type: GITHUB_RELEASE.to_string(),
            asset: format!("{{{{.Asset}}}}.{suffix}"),
            algorithm: suffix.to_string(),
            ..Checksum::default()
        })
}

fn slsa_provenance(asset: &str, tag: &str) -> Option<SlsaProvenance> {
    if !asset.ends_with(".intoto.jsonl") {
        return None;
    }
    Some(SlsaProvenance {
        provenance_type: GITHUB_RELEASE.to_string(),
        asset: Some(parse_asset_name(asset, tag).template),
        ..SlsaProvenance::default()
    })
}

fn find_with_suffix<'a>(
    names: &BTreeSet<&'a str>,
    base: &str,
    suffixes: &[&str],
) -> Option<&'a str> {
    suffixes
        .iter()
        .find_map(|suf| names.get(format!("{base}{suf}").as_str()).copied())
}

/// Cosign settings for the checksum file `checksum_name`, from the
/// bundle, certificate, signature and key files released next to it.
fn checksum_cosign(
    pkg: &PackageInfo,
    checksum_name: &str,
    names: &BTreeSet<&str>,
) -> Option<Cosign> {
    let download_url = format!(
        "https://github.com/{}/{}/releases/download/{{{{.Version}}}}/",
        pkg.repo_owner, pkg.repo_name
    );
    let mut cosign = Cosign::default();

    let bundle = find_with_suffix(
        names,
        checksum_name,
        &[".cosign.bundle", ".bundle", ".sigstore", ".sigstore.json"],
    );
    let certificate = if bundle.is_some() {
        None
    } else {
        find_with_suffix(names, checksum_name, &["-keyless.pem", ".pem"])
    };
    if let Some(bundle) = bundle {
        cosign.bundle = Some(DownloadedFile {
            file_type: GITHUB_RELEASE.to_string(),
            asset: Some(bundle.to_string()),
            ..DownloadedFile::default()
        });
    } else if let Some(cert) = certificate {
        cosign.opts.push("--certificate".to_string());
        cosign.opts.push(format!("{download_url}{cert}"));
    }
    if bundle.is_some() || certificate.is_some() {
        cosign.opts.extend([
            "--certificate-identity-regexp".to_string(),
            format!(
                r"^https://github\.com/{}/{}/\.github/workflows/.+\.ya?ml@refs/tags/\Q{{{{.Version}}}}\E$",
                regex::escape(&pkg.repo_owner),
                regex::escape(&pkg.repo_name),
            ),
            "--certificate-oidc-issuer".to_string(),
            OIDC_ISSUER.to_string(),
        ]);
    }
    if bundle.is_some() {
        return Some(cosign);
    }

    let signature = find_with_suffix(names, checksum_name, &["-keyless.sig", ".sig"])?;
    if certificate.is_none() && !signature.ends_with("-keyless.sig") {
        if let Some(key) = names.iter().find(|n| n.ends_with("cosign.pub")) {
            cosign.opts.push("--key".to_string());
            cosign.opts.push(format!("{download_url}{key}"));
        }
    }
    if cosign.opts.is_empty() {
        return None;
    }
    cosign.opts.push("--signature".to_string());
    cosign.opts.push(format!("{download_url}{signature}"));
    Some(cosign)
}
