//! Recognising checksum files among release assets.

use std::sync::LazyLock;

use aqua_schema::registry::Checksum;
use regex::Regex;

use super::parse::templatize_version;

/// Detached signatures and attestations that often sit next to a checksum
/// file and share its name.
const SIDECAR_SUFFIXES: [&str; 10] = [
    ".asc",
    ".sig",
    ".pem",
    ".crt",
    ".cert",
    ".bundle",
    ".sigstore",
    ".sigstore.json",
    ".minisig",
    ".intoto.jsonl",
];

static SHASUMS_RE: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"sha(\d*)sums?(\d*)"));

fn algorithm_from_digits(digits: &str) -> Option<&'static str> {
    match digits {
        "" | "256" => Some("sha256"),
        "1" => Some("sha1"),
        "512" => Some("sha512"),
        _ => None,
    }
}

fn detect_algorithm(lower: &str) -> Option<&'static str> {
    for algo in ["sha512", "sha256", "sha1", "md5"] {
        if lower.contains(algo) {
            return Some(algo);
        }
    }
    if let Some(caps) = SHASUMS_RE.as_ref().ok().and_then(|re| re.captures(lower)) {
        let lead = caps.get(1).map_or("", |m| m.as_str());
        let trail = caps.get(2).map_or("", |m| m.as_str());
        return match (lead, trail) {
            ("", d) | (d, "") => algorithm_from_digits(d),
            _ => None,
        };
    }
    if lower.contains("checksum") {
        return Some("sha256");
    }
    None
}

/// Checksum settings for a release asset that looks like a checksum file.
///
/// Returns `None` for anything else, including signatures of checksum
/// files.
///
/// ```
/// use aqua_core::asset::checksum_config_from_filename;
///
/// let c = checksum_config_from_filename("tool_1.0.0_checksums.txt", "v1.0.0").unwrap();
/// assert_eq!(c.asset, "tool_{{trimV .Version}}_checksums.txt");
/// assert_eq!(c.algorithm, "sha256");
/// assert!(checksum_config_from_filename("tool_1.0.0_checksums.txt.sig", "v1.0.0").is_none());
/// ```
pub fn checksum_config_from_filename(name: &str, version: &str) -> Option<Checksum> {
    let lower = name.to_ascii_lowercase();
    if SIDECAR_SUFFIXES.iter().any(|s| lower.ends_with(s)) {
        return None;
    }
    let algorithm = detect_algorithm(&lower)?;
    Some(Checksum {
        checksum_type: "github_release".to_string(),
        asset: templatize_version(name, version),
        algorithm: algorithm.to_string(),
        ..Checksum::default()
    })
}
