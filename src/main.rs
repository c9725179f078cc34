//! conftree
//!
//! Command-line inspection of hierarchical configuration: dump the resolved
//! tree, read single values, encrypt secrets and watch resources for changes.

use anyhow::{Context, Result};
use clap::Parser;
use conftree::cli::dump::{DumpArgs, dump, get};
use conftree::cli::{Cli, Command, encrypt};
use conftree::config::{Config, WatcherConfig};
use conftree::logging::init_logging;
use conftree::provider::EnvironmentProvider;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log, cli.verbose).context("Failed to initialize logging")?;

    match &cli.command {
        Command::Encrypt(args) => {
            let env = EnvironmentProvider::from_process();
            println!("{}", encrypt::run(args, env.vars())?);
        }
        Command::Dump(args) => {
            let config = cli.load_config().context("Failed to load configuration")?;
            print!("{}", dump(&config, args)?);
        }
        Command::Get { path } => {
            let config = cli.load_config().context("Failed to load configuration")?;
            println!("{}", get(&config, path)?);
        }
        Command::Diagnostics => {
            let config = cli.load_config().context("Failed to load configuration")?;
            let diagnostics = config.diagnostics()?;
            println!("{}", serde_json::to_string_pretty(&diagnostics)?);
        }
        Command::Watch(args) => {
            let config = cli.load_config().context("Failed to load configuration")?;
            watch(&config, args).await?;
        }
    }
    Ok(())
}

/// Print the configuration, then again after every resource change until
/// interrupted.
async fn watch(config: &Config, args: &DumpArgs) -> Result<()> {
    print!("{}", dump(config, args)?);
    let mut handle = config
        .watch(WatcherConfig::default())
        .context("Failed to start resource watcher")?;
    info!(roots = ?config.roots(), "Watching for resource changes");

    loop {
        tokio::select! {
            event = handle.wait_for_change() => {
                let Some(event) = event else {
                    break;
                };
                if !event.requires_reload() {
                    warn!(event = ?event, "Resource watcher reported an error");
                    continue;
                }
                match dump(config, args) {
                    Ok(rendered) => {
                        println!("---");
                        print!("{}", rendered);
                    }
                    Err(e) => warn!(error = %format!("{:#}", e), "Configuration reload failed"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping watch");
                break;
            }
        }
    }
    handle.stop().await;
    Ok(())
}
