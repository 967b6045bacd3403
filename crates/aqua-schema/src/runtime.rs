//! Host runtime descriptor.
//!
//! Registry entries speak Go's vocabulary (`darwin`, `amd64`, ...), so the
//! runtime is kept as plain strings in that form rather than Rust's
//! `std::env::consts` names.

use std::fmt;

/// `darwin`
pub const DARWIN: &str = "darwin";
/// `linux`
pub const LINUX: &str = "linux";
/// `windows`
pub const WINDOWS: &str = "windows";
/// `amd64`
pub const AMD64: &str = "amd64";
/// `arm64`
pub const ARM64: &str = "arm64";

/// Operating systems the registry tooling generates entries for.
pub const GOOS_LIST: [&str; 3] = [DARWIN, LINUX, WINDOWS];

/// Architectures the registry tooling generates entries for.
pub const GOARCH_LIST: [&str; 2] = [AMD64, ARM64];

/// The `(os, arch)` pair a package is resolved for.
///
/// # Example
///
/// ```
/// use aqua_schema::Runtime;
///
/// let rt = Runtime::new("linux", "arm64");
/// assert_eq!(rt.env(), "linux/arm64");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Runtime {
    /// Operating system, e.g. `linux`.
    pub goos: String,
    /// CPU architecture, e.g. `amd64`.
    pub goarch: String,
}

impl Runtime {
    /// Build a runtime from explicit values.
    pub fn new(goos: impl Into<String>, goarch: impl Into<String>) -> Self {
        Self {
            goos: goos.into(),
            goarch: goarch.into(),
        }
    }

    /// The runtime of the running process, honouring `AQUA_GOOS` and
    /// `AQUA_GOARCH` overrides.
    pub fn current() -> Self {
        let goos = std::env::var("AQUA_GOOS")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| goos_from_rust(std::env::consts::OS).to_string());
        let goarch = std::env::var("AQUA_GOARCH")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| goarch_from_rust(std::env::consts::ARCH).to_string());
        Self { goos, goarch }
    }

    /// Canonical `os/arch` form used by `supported_envs`.
    pub fn env(&self) -> String {
        format!("{}/{}", self.goos, self.goarch)
    }

    /// Whether this runtime targets Windows.
    pub fn is_windows(&self) -> bool {
        self.goos == WINDOWS
    }

    /// Architecture used to render asset names.
    ///
    /// Packages shipping only amd64 builds can still run on Apple Silicon
    /// (Rosetta 2) and on Windows ARM (emulation).
    pub fn arch(&self, rosetta2: bool, windows_arm_emulation: bool) -> &str {
        if self.goarch == AMD64 {
            return AMD64;
        }
        if self.goos == DARWIN && rosetta2 {
            return AMD64;
        }
        if self.is_windows() && windows_arm_emulation {
            return AMD64;
        }
        &self.goarch
    }

    /// Every runtime the generator considers.
    pub fn all() -> Vec<Self> {
        GOOS_LIST
            .iter()
            .flat_map(|os| GOARCH_LIST.iter().map(move |arch| Self::new(*os, *arch)))
            .collect()
    }
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.goos, self.goarch)
    }
}

/// Whether `key` names one of the supported operating systems.
pub fn is_os(key: &str) -> bool {
    GOOS_LIST.contains(&key)
}

/// Expand a `supported_envs` element into the runtimes it denotes.
///
/// Returns `None` for values outside the closed enumeration.
pub fn runtimes_for_env(env: &str) -> Option<Vec<Runtime>> {
    if env == "all" {
        return Some(Runtime::all());
    }
    if let Some((os, arch)) = env.split_once('/') {
        return (is_os(os) && GOARCH_LIST.contains(&arch)).then(|| vec![Runtime::new(os, arch)]);
    }
    if is_os(env) {
        return Some(
            GOARCH_LIST
                .iter()
                .map(|arch| Runtime::new(env, *arch))
                .collect(),
        );
    }
    if GOARCH_LIST.contains(&env) {
        return Some(GOOS_LIST.iter().map(|os| Runtime::new(*os, env)).collect());
    }
    None
}

fn goos_from_rust(os: &str) -> &str {
    match os {
        "macos" => DARWIN,
        other => other,
    }
}

fn goarch_from_rust(arch: &str) -> &str {
    match arch {
        "x86_64" => AMD64,
        "aarch64" => ARM64,
        "x86" => "386",
        other => other,
    }
}
