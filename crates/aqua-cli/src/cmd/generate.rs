//! Generate-registry command

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use aqua_core::generate::{
    CONFIG_FILE_NAME, GenerateConfig, GenerateParam, Generator, init_config, parse_args,
    read_asset_file, testdata_packages, to_registry_yaml,
};
use aqua_core::sources::{CratesIoClient, GitHubClient, github_token_from_env, http_client};
use aqua_schema::AquaConfig;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, Default)]
pub struct GenerateArgs {
    pub packages: Vec<String>,
    pub limit: usize,
    pub config: Option<PathBuf>,
    pub asset_file: Option<PathBuf>,
    pub out_testdata: Option<PathBuf>,
    pub commands: Vec<String>,
    pub init: bool,
}

/// Generate against api.github.com and crates.io.
pub async fn generate_registry(
    args: GenerateArgs,
    out: &mut impl Write,
    cancel: &CancellationToken,
) -> Result<()> {
    let client = http_client().context("Failed to build the HTTP client")?;
    let github = GitHubClient::github_com(client.clone(), github_token_from_env());
    let cargo = CratesIoClient::crates_io(client);
    let generator = Generator::new(Arc::new(github), Arc::new(cargo));
    let cwd = std::env::current_dir().context("Failed to get the current directory")?;
    run(&generator, args, &cwd, out, cancel).await
}

async fn run(
    generator: &Generator,
    args: GenerateArgs,
    cwd: &Path,
    out: &mut impl Write,
    cancel: &CancellationToken,
) -> Result<()> {
    if args.init {
        let name = args.packages.first().map_or("", String::as_str);
        if init_config(cwd, name)? {
            info!(path = %cwd.join(CONFIG_FILE_NAME).display(), "created a configuration file");
        }
        return Ok(());
    }

    let cfg = match &args.config {
        Some(path) => GenerateConfig::read(path)?,
        None => GenerateConfig::default(),
    };
    let packages = parse_args(args.packages, &cfg)?;
    let asset_file = args
        .asset_file
        .as_deref()
        .map(read_asset_file)
        .transpose()?;
    let param = GenerateParam {
        limit: args.limit,
        commands: args.commands,
        asset_file,
    };

    for arg in &packages {
        let generated = generator.generate(arg, &param, &cfg, cancel).await?;
        if let Some(dest) = &args.out_testdata {
            let pkg_name = arg.split_once('@').map_or(arg.as_str(), |(name, _)| name);
            write_testdata(dest, pkg_name, &generated.versions)?;
        }
        write!(out, "{}", to_registry_yaml(vec![generated.package])?)?;
    }
    Ok(())
}

fn write_testdata(dest: &Path, pkg_name: &str, versions: &[String]) -> Result<()> {
    let cfg = AquaConfig {
        packages: testdata_packages(pkg_name, versions),
        ..AquaConfig::default()
    };
    let body = serde_yaml::to_string(&cfg).context("Failed to encode test data")?;
    std::fs::write(dest, body)
        .with_context(|| format!("Failed to output testdata to {}", dest.display()))
}
