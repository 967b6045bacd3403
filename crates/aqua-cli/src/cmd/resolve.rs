//! Resolve command

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, bail};
use aqua_core::resolver::{Resolution, resolve_in_registry};
use aqua_schema::Runtime;

use super::read_registry;

/// Print the effective definition of `spec` (`name@version`) as YAML, or
/// `skipped` when the package does not support the target platform.
pub fn resolve(
    spec: &str,
    registry: &Path,
    os: Option<String>,
    arch: Option<String>,
    out: &mut impl Write,
) -> Result<()> {
    let Some((name, version)) = spec.split_once('@') else {
        bail!("'{spec}' has no version, use <name>@<version>");
    };
    if name.is_empty() || version.is_empty() {
        bail!("'{spec}' has no version, use <name>@<version>");
    }
    let mut rt = Runtime::current();
    if let Some(os) = os {
        rt.goos = os;
    }
    if let Some(arch) = arch {
        rt.goarch = arch;
    }

    let cfg = read_registry(registry)?;
    let resolution = resolve_in_registry(&cfg, name, version, &rt)
        .with_context(|| format!("Failed to resolve {spec} for {}", rt.env()))?;
    match resolution {
        Resolution::Resolved(pkg) => {
            let yaml = serde_yaml::to_string(&pkg).context("Failed to encode the package")?;
            write!(out, "{yaml}")?;
        }
        Resolution::Skipped => writeln!(out, "skipped")?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const REGISTRY: &str = r#"packages:
  - type: github_release
    repo_owner: acme
    repo_name: tool
    asset: tool_{{.OS}}_{{.Arch}}.tar.gz
    supported_envs:
      - linux
      - darwin
    version_constraint: semver(">= 2.0.0")
    version_overrides:
      - version_constraint: "true"
        asset: tool-legacy_{{.OS}}_{{.Arch}}.tar.gz
    overrides:
      - goos: linux
        replacements:
          amd64: x86_64
"#;

    fn run(spec: &str, os: &str, arch: &str) -> Result<String> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("registry.yaml");
        std::fs::write(&path, REGISTRY)?;
        let mut out = Vec::new();
        resolve(spec, &path, Some(os.into()), Some(arch.into()), &mut out)?;
        Ok(String::from_utf8(out)?)
    }

    #[test]
    fn test_resolve_applies_overrides() {
        let yaml = run("acme/tool@v2.1.0", "linux", "amd64").unwrap();
        assert!(yaml.contains("asset: tool_{{.OS}}_{{.Arch}}.tar.gz"), "{yaml}");
        assert!(yaml.contains("amd64: x86_64"), "{yaml}");
    }

    #[test]
    fn test_resolve_version_override() {
        let yaml = run("acme/tool@v1.0.0", "darwin", "arm64").unwrap();
        assert!(yaml.contains("asset: tool-legacy_{{.OS}}_{{.Arch}}.tar.gz"), "{yaml}");
    }

    #[test]
    fn test_resolve_unsupported_platform() {
        assert_eq!(run("acme/tool@v2.1.0", "windows", "amd64").unwrap(), "skipped\n");
    }

    #[test]
    fn test_resolve_errors() {
        assert!(run("acme/tool", "linux", "amd64").is_err());
        assert!(run("acme/missing@v1.0.0", "linux", "amd64").is_err());
    }
}
