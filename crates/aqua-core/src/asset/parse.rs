//! Single asset name → [`AssetInfo`].

use aqua_schema::registry::Replacements;
use aqua_schema::runtime::{AMD64, ARM64, DARWIN, LINUX, WINDOWS};

/// Format of an artifact that is not an archive.
pub const FORMAT_RAW: &str = "raw";

/// Archive extensions in match order. Compound extensions precede their
/// suffixes so `foo.tar.gz` is not read as `gz`.
const FORMATS: [&str; 24] = [
    "tar.br", "tar.bz2", "tar.gz", "tar.lz4", "tar.sz", "tar.xz", "tbr", "tbz2", "tgz", "tlz4",
    "tsz", "txz", "tar.zst", "zip", "gz", "bz2", "lz4", "sz", "xz", "zst", "dmg", "pkg", "rar",
    "tar",
];

/// Whether `format` is an archive type the installer unpacks, or `raw`.
pub fn is_supported_format(format: &str) -> bool {
    format == FORMAT_RAW || FORMATS.contains(&format)
}

/// `(literal, canonical OS)`, most specific first.
const OS_TOKENS: [(&str, &str); 19] = [
    ("apple-darwin", DARWIN),
    ("unknown-linux-gnu", LINUX),
    ("unknown-linux-musl", LINUX),
    ("unknown-linux", LINUX),
    ("linux-gnu", LINUX),
    ("pc-windows-msvc", WINDOWS),
    ("pc-windows-gnu", WINDOWS),
    ("pc-windows", WINDOWS),
    ("darwin", DARWIN),
    ("linux", LINUX),
    ("windows", WINDOWS),
    ("apple", DARWIN),
    ("macosx", DARWIN),
    ("osx", DARWIN),
    ("macos", DARWIN),
    ("mac", DARWIN),
    ("win64", WINDOWS),
    ("win32", WINDOWS),
    ("win", WINDOWS),
];

/// `(literal, canonical arch)`, most specific first.
const ARCH_TOKENS: [(&str, &str); 7] = [
    (AMD64, AMD64),
    (ARM64, ARM64),
    ("x86_64", AMD64),
    ("x64", AMD64),
    ("64bit", AMD64),
    ("64-bit", AMD64),
    ("aarch64", ARM64),
];

/// Markers of a macOS universal binary.
const UNIVERSAL_MARKERS: [&str; 6] = [
    "_all",
    "-all",
    ".all",
    "_universal",
    "-universal",
    ".universal",
];

/// What a single release asset name says about its platform.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetInfo {
    /// The name with version, OS, arch and format replaced by placeholders.
    pub template: String,
    /// Canonical OS, empty when none was recognised.
    pub os: String,
    /// Canonical arch. Defaults to `amd64`.
    pub arch: String,
    /// Archive format or [`FORMAT_RAW`].
    pub format: String,
    /// Canonical name → literal used in the asset.
    pub replacements: Replacements,
    /// Lower means less preferred among assets for the same platform.
    pub score: i32,
    /// A macOS universal binary, usable for every darwin arch.
    pub darwin_all: bool,
    /// `Some(false)` for a raw Windows asset without `.exe`.
    pub complete_windows_ext: Option<bool>,
}

impl AssetInfo {
    /// Whether the asset is not an archive.
    pub fn is_raw(&self) -> bool {
        self.format.is_empty() || self.format == FORMAT_RAW
    }
}

/// Split `name` into the part before its archive extension and the
/// extension. Non-archives return `(name, "raw")`.
///
/// ```
/// use aqua_core::asset::remove_ext;
///
/// assert_eq!(remove_ext("tool.tar.gz"), ("tool", "tar.gz"));
/// assert_eq!(remove_ext("TOOL.ZIP"), ("TOOL", "zip"));
/// assert_eq!(remove_ext("tool"), ("tool", "raw"));
/// ```
pub fn remove_ext(name: &str) -> (&str, &'static str) {
    let lower = name.to_ascii_lowercase();
    for format in FORMATS {
        if let Some(stem) = lower
            .strip_suffix(format)
            .and_then(|s| s.strip_suffix('.'))
        {
            return (&name[..stem.len()], format);
        }
    }
    (name, FORMAT_RAW)
}

/// Replace the first occurrence of `version` in `name` with
/// `{{.Version}}`, else the v-less form with `{{trimV .Version}}`.
pub(crate) fn templatize_version(name: &str, version: &str) -> String {
    if !version.is_empty() && name.contains(version) {
        return name.replacen(version, "{{.Version}}", 1);
    }
    let trimmed = version.strip_prefix('v').unwrap_or(version);
    if !trimmed.is_empty() && name.contains(trimmed) {
        return name.replacen(trimmed, "{{trimV .Version}}", 1);
    }
    name.to_string()
}

/// Infer platform and template from an asset name.
///
/// ```
/// use aqua_core::asset::parse_asset_name;
///
/// let a = parse_asset_name("tool-v1.0.0-linux-amd64.tar.gz", "v1.0.0");
/// assert_eq!(a.template, "tool-{{.Version}}-{{.OS}}-{{.Arch}}.{{.Format}}");
/// assert_eq!((a.os.as_str(), a.arch.as_str()), ("linux", "amd64"));
/// ```
pub fn parse_asset_name(name: &str, version: &str) -> AssetInfo {
    let mut info = AssetInfo {
        template: templatize_version(name, version),
        ..AssetInfo::default()
    };
    // ASCII lowering keeps byte offsets aligned with `name`.
    let lower = name.to_ascii_lowercase();
    set_os(name, &lower, &mut info);
    set_arch(name, &lower, &mut info);

    let (_, format) = remove_ext(name);
    info.format = format.to_string();
    // An upper-case extension stays literal so the template still renders it.
    if format != FORMAT_RAW && info.template.ends_with(format) {
        let keep = info.template.len().saturating_sub(format.len());
        info.template.truncate(keep);
        info.template.push_str("{{.Format}}");
    }

    if info.os == WINDOWS && info.is_raw() {
        if let Some(stem) = info.template.strip_suffix(".exe") {
            info.template = stem.to_string();
        } else {
            info.complete_windows_ext = Some(false);
        }
    }
    info
}

fn substitute(
    name: &str,
    span: (usize, usize),
    canonical: &str,
    placeholder: &str,
    info: &mut AssetInfo,
) {
    let literal = &name[span.0..span.0 + span.1];
    if literal != canonical {
        info.replacements
            .insert(canonical.to_string(), literal.to_string());
    }
    info.template = info.template.replacen(literal, placeholder, 1);
}

fn set_os(name: &str, lower: &str, info: &mut AssetInfo) {
    if lower.contains(".exe.") || lower.ends_with(".exe") {
        info.os = WINDOWS.to_string();
    } else if lower.ends_with(".dmg") || lower.ends_with(".pkg") {
        // Archives are preferred over installer images.
        info.score = -1;
        info.os = DARWIN.to_string();
    }

    for (token, os) in OS_TOKENS {
        if !info.os.is_empty() && info.os != os {
            continue;
        }
        let Some(idx) = lower.find(token) else {
            continue;
        };
        info.os = os.to_string();
        substitute(name, (idx, token.len()), os, "{{.OS}}", info);
        if token == "unknown-linux-gnu" || token == "pc-windows-gnu" {
            // musl and msvc builds win over gnu ones.
            info.score = -1;
        }
        return;
    }
}

fn set_arch(name: &str, lower: &str, info: &mut AssetInfo) {
    for (token, arch) in ARCH_TOKENS {
        if let Some(idx) = lower.find(token) {
            info.arch = arch.to_string();
            substitute(name, (idx, token.len()), arch, "{{.Arch}}", info);
            return;
        }
    }
    if info.os == DARWIN && UNIVERSAL_MARKERS.iter().any(|m| lower.contains(m)) {
        info.darwin_all = true;
    }
    info.arch = AMD64.to_string();
    info.score = -2;
}
