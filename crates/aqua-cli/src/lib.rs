//! aqua - Declarative CLI Version Manager
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
//!
//! Command line front end over `aqua-core`.
//!
//! # Commands
//!
//! - `generate-registry`: infer registry entries from GitHub releases or
//!   crates.io.
//! - `resolve`: print the effective definition of a package for one
//!   version and platform.
//! - `list`: package names and aliases in a registry, optionally filtered
//!   by command or environment.
//! - `lint-registry`: style checks for registry files.
//! - `cache clean`: drop cached registries no longer referenced by
//!   `aqua.yaml`.

pub mod cmd;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "aqua")]
#[command(author, version, about = "aqua - Declarative CLI Version Manager")]
pub struct Cli {
    /// Log level (error, warn, info, debug, trace). Defaults to RUST_LOG.
    #[arg(long, global = true, env = "AQUA_LOG_LEVEL")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Generate a registry entry for GitHub repositories or crates
    #[command(visible_alias = "gr")]
    GenerateRegistry {
        /// owner/repo, owner/repo@tag or crates.io/<crate>
        packages: Vec<String>,
        /// Maximum number of releases to read (0 means no limit)
        #[arg(long, short = 'l', default_value_t = 0)]
        limit: usize,
        /// Configuration file (aqua-generate-registry.yaml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
        /// JSON file mapping release tags to asset names
        #[arg(long)]
        asset_file: Option<PathBuf>,
        /// Write aqua.yaml test data pinning the generated versions
        #[arg(long, short = 'o')]
        out_testdata: Option<PathBuf>,
        /// Commands the package provides, comma separated
        #[arg(long = "cmd", value_delimiter = ',')]
        commands: Vec<String>,
        /// Write a configuration file template instead of generating
        #[arg(long)]
        init: bool,
    },
    /// Print the effective package for a version and platform
    Resolve {
        /// Package spec (e.g. cli/cli@v2.40.0)
        spec: String,
        /// Registry file (YAML, or JSON with a .json extension)
        #[arg(long, short = 'r')]
        registry: PathBuf,
        /// Target OS (defaults to AQUA_GOOS or the running OS)
        #[arg(long)]
        os: Option<String>,
        /// Target architecture (defaults to AQUA_GOARCH or the running one)
        #[arg(long)]
        arch: Option<String>,
    },
    /// List the packages of a registry
    List {
        /// Registry file
        #[arg(long, short = 'r')]
        registry: PathBuf,
        /// Only packages that may provide this command
        #[arg(long = "cmd")]
        command: Option<String>,
        /// Only packages supported on this environment (all, linux, arm64, darwin/arm64)
        #[arg(long)]
        env: Option<String>,
        /// Also print install directories and the SLSA source
        #[arg(long, short = 'l')]
        long: bool,
    },
    /// Check registry files
    LintRegistry {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Manage the registry cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
}

#[derive(Debug, Subcommand)]
pub enum CacheCommands {
    /// Remove cached registries that the configuration no longer uses
    Clean {
        /// aqua.yaml
        #[arg(long, short = 'c', default_value = "aqua.yaml")]
        config: PathBuf,
    },
}

/// `--log-level` when given, else `RUST_LOG`.
pub fn env_filter(log_level: Option<&str>) -> EnvFilter {
    match log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::from_default_env(),
    }
}
