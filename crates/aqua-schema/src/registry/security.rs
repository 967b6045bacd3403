//! Verification settings attached to a package.
//!
//! Only the declarative shape and the enabled-defaults live here; the
//! verification itself happens elsewhere.

use serde::{Deserialize, Serialize};

use super::Replacements;

/// A file fetched alongside the package (signature, certificate, key...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadedFile {
    /// `github_release` or `http`.
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub file_type: String,
    /// Defaults to the package's repository owner.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub repo_owner: String,
    /// Defaults to the package's repository name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub repo_name: String,
    /// Asset template for `github_release`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
    /// URL template for `http`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Location of the checksum inside a checksum file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumPattern {
    /// Regex capturing the checksum.
    pub checksum: String,
    /// Regex capturing the file name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub file: String,
}

/// Checksum file settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checksum {
    /// `github_release` or `http`.
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub checksum_type: String,
    /// Asset template of the checksum file.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub asset: String,
    /// URL template of the checksum file.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    /// `regexp` or `raw`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub file_format: String,
    /// `md5`, `sha1`, `sha256` or `sha512`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub algorithm: String,
    /// How to pick a line out of the file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<ChecksumPattern>,
    /// Defaults to `true` when the block is present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Replacements used only when rendering the checksum file name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacements: Option<Replacements>,
    /// Signature of the checksum file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cosign: Option<Cosign>,
    /// Minisign signature of the checksum file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minisign: Option<Minisign>,
    /// Attestation of the checksum file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_artifact_attestations: Option<GitHubArtifactAttestations>,
}

impl Checksum {
    /// Present and not explicitly disabled.
    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    /// Algorithm, or `sha256` when disabled.
    pub fn algorithm(&self) -> &str {
        if self.enabled() {
            &self.algorithm
        } else {
            "sha256"
        }
    }
}

/// Sigstore cosign settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cosign {
    /// Explicit switch; otherwise inferred from the other fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// `COSIGN_EXPERIMENTAL=1`.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub cosign_experimental: bool,
    /// Extra `cosign verify-blob` arguments (templates).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub opts: Vec<String>,
    /// Signature file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<DownloadedFile>,
    /// Certificate file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<DownloadedFile>,
    /// Public key file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<DownloadedFile>,
    /// Sigstore bundle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle: Option<DownloadedFile>,
}

impl Cosign {
    /// Explicit flag, else whether anything is configured.
    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or_else(|| {
            !self.opts.is_empty()
                || self.signature.is_some()
                || self.certificate.is_some()
                || self.key.is_some()
                || self.bundle.is_some()
                || self.cosign_experimental
        })
    }
}

/// SLSA provenance settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlsaProvenance {
    /// Defaults to `true` when the block is present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// `github_release` or `http`.
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub provenance_type: String,
    /// Defaults to the package's repository owner.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub repo_owner: String,
    /// Defaults to the package's repository name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub repo_name: String,
    /// Provenance asset template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
    /// Provenance URL template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Overrides the `github.com/owner/repo` source URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_uri: Option<String>,
    /// Tag expected in the provenance.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source_tag: String,
}

impl SlsaProvenance {
    /// Present and not explicitly disabled.
    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }
}

/// Minisign settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Minisign {
    /// Defaults to `true` when the block is present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// `github_release` or `http`.
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub minisign_type: String,
    /// Defaults to the package's repository owner.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub repo_owner: String,
    /// Defaults to the package's repository name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub repo_name: String,
    /// Signature asset template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
    /// Signature URL template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Public key.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub public_key: String,
}

impl Minisign {
    /// Present and not explicitly disabled.
    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    /// The signature as a generic downloadable file.
    pub fn to_downloaded_file(&self) -> DownloadedFile {
        DownloadedFile {
            file_type: self.minisign_type.clone(),
            repo_owner: self.repo_owner.clone(),
            repo_name: self.repo_name.clone(),
            asset: self.asset.clone(),
            url: self.url.clone(),
        }
    }
}

/// `gh attestation verify` settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitHubArtifactAttestations {
    /// Defaults to `true` when the block is present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Predicate type URI.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub predicate_type: String,
    /// Signer workflow path.
    #[serde(
        default,
        alias = "signer-workflow",
        skip_serializing_if = "String::is_empty"
    )]
    pub signer_workflow: String,
}

impl GitHubArtifactAttestations {
    /// Present and not explicitly disabled.
    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enabled_defaults_when_present() {
        let c: Checksum = serde_yaml::from_str("type: github_release\nasset: checksums.txt").unwrap();
        assert!(c.enabled());
        let m: Minisign = serde_yaml::from_str("type: http").unwrap();
        assert!(m.enabled());
        let s: SlsaProvenance = serde_yaml::from_str("type: github_release").unwrap();
        assert!(s.enabled());
        let g: GitHubArtifactAttestations = serde_yaml::from_str("signer-workflow: a/b").unwrap();
        assert!(g.enabled());
        assert_eq!(g.signer_workflow, "a/b");
    }

    #[test]
    fn test_explicitly_disabled() {
        let c: Checksum = serde_yaml::from_str("enabled: false\nalgorithm: sha512").unwrap();
        assert!(!c.enabled());
        assert_eq!(c.algorithm(), "sha256");
    }

    #[test]
    fn test_cosign_enabled_inferred() {
        assert!(!Cosign::default().enabled());
        let c = Cosign {
            opts: vec!["--key".into()],
            ..Cosign::default()
        };
        assert!(c.enabled());
        let c = Cosign {
            bundle: Some(DownloadedFile::default()),
            ..Cosign::default()
        };
        assert!(c.enabled());
        let c = Cosign {
            enabled: Some(false),
            cosign_experimental: true,
            ..Cosign::default()
        };
        assert!(!c.enabled());
    }
}
