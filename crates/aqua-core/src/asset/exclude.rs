/// Substrings marking assets for platforms or purposes aqua never installs.
const EXCLUDED_TOKENS: [&str; 22] = [
    "32-bit",
    "32bit",
    "386",
    "android",
    "armv6",
    "armv7",
    "changelog",
    "eabihf",
    "freebsd",
    "i386",
    "license",
    "mips",
    "netbsd",
    "openbsd",
    "plan9",
    "ppc64",
    "readme",
    "riscv64",
    "s390x",
    "solaris",
    "wasm",
    "win32",
];

/// Package formats that are never release binaries.
const EXCLUDED_SUFFIXES: [&str; 3] = [".deb", ".rpm", ".msi"];

/// Whether `asset` should be ignored when inferring `pkg_name`.
///
/// A token is not applied when the package name itself contains it.
///
/// ```
/// use aqua_core::asset::exclude;
///
/// assert!(exclude("acme/tool", "tool-linux-i386.tar.gz"));
/// assert!(!exclude("acme/tool", "tool-linux-amd64.tar.gz"));
/// assert!(!exclude("acme/wasm-tool", "wasm-tool-linux-amd64.tar.gz"));
/// ```
pub fn exclude(pkg_name: &str, asset: &str) -> bool {
    let lower = asset.to_ascii_lowercase();
    if EXCLUDED_SUFFIXES.iter().any(|s| lower.ends_with(s)) {
        return true;
    }
    let pkg = pkg_name.to_ascii_lowercase();
    EXCLUDED_TOKENS
        .iter()
        .any(|t| lower.contains(t) && !pkg.contains(t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("tool-linux-386.tar.gz")]
    #[case("tool-linux-armv7.tar.gz")]
    #[case("tool-freebsd-amd64.tar.gz")]
    #[case("tool-linux-mips64le.tar.gz")]
    #[case("tool-linux-ppc64le.tar.gz")]
    #[case("tool_Windows_32bit.zip")]
    #[case("CHANGELOG.md")]
    #[case("LICENSE")]
    #[case("tool_1.0.0_amd64.deb")]
    #[case("tool-1.0.0.x86_64.rpm")]
    #[case("tool-setup.msi")]
    fn test_excluded(#[case] asset: &str) {
        assert!(exclude("acme/tool", asset));
    }

    #[rstest]
    #[case("tool-linux-amd64.tar.gz")]
    #[case("tool-darwin-arm64.zip")]
    #[case("tool_windows_x86_64.exe")]
    fn test_kept(#[case] asset: &str) {
        assert!(!exclude("acme/tool", asset));
    }

    #[test]
    fn test_token_in_package_name_is_not_applied() {
        assert!(!exclude("acme/readme-gen", "readme-gen-linux-amd64.tar.gz"));
        assert!(exclude("acme/readme-gen", "readme-gen-linux-386.tar.gz"));
        assert!(exclude("acme/readme-gen", "readme-gen_1.0_amd64.deb"));
    }
}
