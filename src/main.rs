mod actions;
mod broker;
mod cli;
mod config;
mod editor;
mod error;
mod logging;
mod process;
mod prompt;
mod sshconfig;

use actions::Helper;
use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use config::Config;
use error::HelperError;
use process::SystemRunner;
use prompt::TerminalSelector;

fn load_config(cli: &Cli) -> Result<Config> {
    let path = cli.config_path()?;
    let mut config = Config::load_or_default(&path)?;
    cli.apply_overrides(&mut config);
    config.expand_path()?;
    config
        .validate()
        .with_context(|| format!("Invalid configuration in {}", path.display()))?;
    Ok(config)
}

fn init_config(cli: &Cli, force: bool) -> Result<()> {
    let path = cli.config_path()?;
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    Config::save_default_config(&path)?;
    println!("✓ Wrote default configuration to {}", path.display());
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    if let Some(Commands::InitConfig { force }) = cli.command {
        return init_config(&cli, force);
    }

    let config = load_config(&cli)?;
    tracing::debug!(
        "using {} against {} ({})",
        config.broker.binary,
        config.broker.proxy,
        config.broker.auth_connector
    );

    if !process::is_installed(&config.broker.binary) {
        println!("Error: {} (Teleport CLI) is not installed", config.broker.binary);
        println!("Please install from: https://goteleport.com/download");
        return Err(HelperError::BinaryMissing {
            binary: config.broker.binary.clone(),
        }
        .into());
    }

    let runner = SystemRunner::new();
    let selector = TerminalSelector::new();
    let helper = Helper::new(&config, &runner, &selector);

    match cli.command {
        None => helper.run_interactive(),
        Some(Commands::Setup) => helper.setup(),
        Some(Commands::Ssh { node, login }) => helper.ssh(node, login),
        Some(Commands::Nodes) => helper.list_nodes(),
        Some(Commands::Editor { editor }) => helper.configure_editor(editor),
        Some(Commands::SshConfig) => helper.sync_ssh_config(),
        Some(Commands::InitConfig { .. }) => Ok(()),
    }
}
