//! Lint command

use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use aqua_core::lint::{Level, lint_registry_file};
use crossterm::style::Stylize;

/// Lint every file and print one line per finding.
///
/// Returns whether any error-level finding was reported.
pub fn lint_registry(files: &[PathBuf], out: &mut impl Write) -> Result<bool> {
    let mut errors = 0;
    let mut warnings = 0;
    for path in files {
        let findings = lint_registry_file(path)?;
        for finding in &findings {
            let level = match finding.code.level {
                Level::Error => {
                    errors += 1;
                    "error".red().bold()
                }
                Level::Warning => {
                    warnings += 1;
                    "warning".yellow().bold()
                }
            };
            writeln!(
                out,
                "  {level}: {}: packages[{}] {}: {} ({})",
                path.display(),
                finding.index,
                finding.name,
                finding.code.short_description,
                finding.code.id.dark_grey()
            )?;
        }
    }
    if errors + warnings > 0 {
        writeln!(out, "  {errors} error(s), {warnings} warning(s)")?;
    }
    Ok(errors > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lint_registry() {
        let dir = tempfile::tempdir().unwrap();
        let clean = dir.path().join("clean.yaml");
        std::fs::write(
            &clean,
            r"packages:
  - type: github_release
    repo_owner: cli
    repo_name: cli
    asset: gh.tar.gz
    description: GitHub's official command line tool
",
        )
        .unwrap();
        let mut out = Vec::new();
        assert!(!lint_registry(&[clean.clone()], &mut out).unwrap());
        assert!(out.is_empty());

        let warned = dir.path().join("warned.yaml");
        std::fs::write(
            &warned,
            r"packages:
  - type: go
    repo_owner: golang
    repo_name: go
    description: The Go programming language
",
        )
        .unwrap();
        let mut out = Vec::new();
        assert!(!lint_registry(&[clean.clone(), warned], &mut out).unwrap());
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("avoid_go"), "{text}");
        assert!(text.contains("0 error(s), 1 warning(s)"), "{text}");

        let broken = dir.path().join("broken.yaml");
        std::fs::write(
            &broken,
            r"packages:
  - type: github_release
    repo_owner: acme
    repo_name: tool
    description: A tool.
",
        )
        .unwrap();
        let mut out = Vec::new();
        assert!(lint_registry(&[broken], &mut out).unwrap());
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("asset_miss"), "{text}");
        assert!(text.contains("description_punctuation"), "{text}");
    }

    #[test]
    fn test_missing_file() {
        let mut out = Vec::new();
        assert!(lint_registry(&[PathBuf::from("/nonexistent/registry.yaml")], &mut out).is_err());
    }
}
