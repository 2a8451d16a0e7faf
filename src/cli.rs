// ABOUTME: Command-line surface: global overrides for the broker settings plus one subcommand per action
// ABOUTME: Running without a subcommand starts the interactive menu

use crate::config::Config;
use crate::editor::Editor;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "tsh-helper",
    version,
    about = "Teleport access helper: login, node selection, SSH and editor setup",
    long_about = "Wraps the Teleport `tsh` client to log in with SSO, pick a node and a working login,\nconnect, keep ~/.ssh/config in sync and prepare editors for Remote-SSH.\nRun without a subcommand for the interactive menu."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(long, global = true, help = "Configuration file path [default: <config dir>/tsh-helper/config.toml]")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Teleport proxy address (overrides config)")]
    pub proxy: Option<String>,

    #[arg(long, global = true, help = "Auth connector name (overrides config)")]
    pub auth: Option<String>,

    #[arg(long, global = true, value_name = "PATH", help = "tsh binary (overrides config)")]
    pub tsh: Option<String>,

    #[arg(
        short = 'v',
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv, -vvv)"
    )]
    pub verbose: u8,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    #[command(about = "Log in to Teleport through SSO (no-op if already logged in)")]
    Setup,

    #[command(about = "Pick a node and a working login, then connect")]
    Ssh {
        #[arg(help = "Node to connect to; prompts when omitted")]
        node: Option<String>,

        #[arg(short = 'l', long, help = "Login user; skips login discovery")]
        login: Option<String>,
    },

    #[command(about = "List the nodes visible to the current session")]
    Nodes,

    #[command(about = "Set remote.SSH.useLocalServer = false in an editor's settings")]
    Editor {
        #[arg(long, value_enum, help = "Editor to configure; prompts when omitted")]
        editor: Option<Editor>,
    },

    #[command(about = "Write the `tsh config` block into your OpenSSH config")]
    SshConfig,

    #[command(about = "Write the default configuration file")]
    InitConfig {
        #[arg(long, help = "Overwrite an existing file")]
        force: bool,
    },
}

impl Cli {
    pub fn config_path(&self) -> anyhow::Result<PathBuf> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => Config::default_config_path(),
        }
    }

    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(proxy) = &self.proxy {
            config.broker.proxy = proxy.clone();
        }
        if let Some(auth) = &self.auth {
            config.broker.auth_connector = auth.clone();
        }
        if let Some(tsh) = &self.tsh {
            config.broker.binary = tsh.clone();
        }
    }
}
