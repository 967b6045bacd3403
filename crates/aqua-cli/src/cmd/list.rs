//! List command

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use aqua_schema::runtime::runtimes_for_env;
use aqua_schema::{PackageInfo, Runtime};
use tracing::debug;

use super::read_registry;

#[derive(Debug, Default)]
pub struct ListArgs {
    pub registry: PathBuf,
    pub command: Option<String>,
    pub env: Option<String>,
    pub long: bool,
}

/// Print each package name, followed by its aliases.
///
/// With `long`, the `pkgs/` directories the package may occupy and its
/// SLSA source follow on indented lines.
pub fn list(args: &ListArgs, out: &mut impl Write) -> Result<()> {
    let cfg = read_registry(&args.registry)?;
    let runtimes = args
        .env
        .as_deref()
        .map(|env| runtimes_for_env(env).with_context(|| format!("unknown environment '{env}'")))
        .transpose()?;

    for pkg in &cfg.packages {
        let name = pkg.get_name();
        if name.is_empty() {
            continue;
        }
        if args
            .command
            .as_deref()
            .is_some_and(|c| !pkg.maybe_has_command(c))
        {
            continue;
        }
        if runtimes.as_deref().is_some_and(|rts| !supports_any(pkg, rts)) {
            continue;
        }

        let aliases: Vec<&str> = pkg
            .aliases
            .iter()
            .map(|a| a.name.as_str())
            .filter(|a| !a.is_empty())
            .collect();
        if aliases.is_empty() {
            writeln!(out, "{name}")?;
        } else {
            writeln!(out, "{name} (aliases: {})", aliases.join(", "))?;
        }

        if args.long {
            for path in pkg.pkg_paths() {
                writeln!(out, "  pkgs/{path}")?;
            }
            if let Some(uri) = pkg.slsa_source_uri() {
                writeln!(out, "  slsa source: {uri}")?;
            }
        }
    }
    Ok(())
}

fn supports_any(pkg: &PackageInfo, runtimes: &[Runtime]) -> bool {
    runtimes.iter().any(|rt| match pkg.check_supported(rt) {
        Ok(supported) => supported,
        Err(e) => {
            debug!(package = %pkg.get_name(), error = %e, "supported_if does not compile");
            false
        }
    })
}
