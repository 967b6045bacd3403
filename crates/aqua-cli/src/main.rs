//! aqua - Declarative CLI Version Manager

use std::io::Write;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;

use aqua_cli::cmd;
use aqua_cli::{CacheCommands, Cli, Commands, env_filter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // stdout carries generated YAML, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(cli.log_level.as_deref()))
        .with_writer(std::io::stderr)
        .init();

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let mut out = std::io::stdout().lock();
    match cli.command {
        Commands::GenerateRegistry {
            packages,
            limit,
            config,
            asset_file,
            out_testdata,
            commands,
            init,
        } => {
            let args = cmd::generate::GenerateArgs {
                packages,
                limit,
                config,
                asset_file,
                out_testdata,
                commands,
                init,
            };
            cmd::generate::generate_registry(args, &mut out, &cancel).await?;
        }
        Commands::Resolve {
            spec,
            registry,
            os,
            arch,
        } => cmd::resolve::resolve(&spec, &registry, os, arch, &mut out)?,
        Commands::List {
            registry,
            command,
            env,
            long,
        } => {
            let args = cmd::list::ListArgs {
                registry,
                command,
                env,
                long,
            };
            cmd::list::list(&args, &mut out)?;
        }
        Commands::LintRegistry { files } => {
            let failed = cmd::lint::lint_registry(&files, &mut out)?;
            out.flush()?;
            if failed {
                std::process::exit(1);
            }
        }
        Commands::Cache { command } => match command {
            CacheCommands::Clean { config } => cmd::cache::clean(&config, &mut out)?,
        },
    }
    out.flush()?;
    Ok(())
}
