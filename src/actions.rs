// ABOUTME: Operator-facing actions (setup, SSH, node listing, editor and SSH config) and the menu loop
// ABOUTME: Composes the broker, selector and file helpers; each action runs to completion before the next prompt

use crate::broker::{Broker, default_login};
use crate::config::Config;
use crate::editor::{self, Editor, SettingsOutcome};
use crate::error::HelperError;
use crate::process::{CommandRunner, command_line};
use crate::prompt::{SelectOptions, Selection, Selector};
use crate::sshconfig::{self, SyncOutcome};
use anyhow::{Context, Result};
use std::path::Path;

/// Interrupted interactive sessions (Ctrl+C) exit with this code.
const INTERRUPTED_EXIT: i32 = 130;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Setup,
    SyncSshConfig,
    Ssh,
    ConfigureEditor,
    Exit,
}

impl MenuAction {
    pub const ALL: [MenuAction; 5] = [
        MenuAction::Setup,
        MenuAction::SyncSshConfig,
        MenuAction::Ssh,
        MenuAction::ConfigureEditor,
        MenuAction::Exit,
    ];

    pub fn label(self) -> &'static str {
        match self {
            MenuAction::Setup => "Teleport Setup (Login)",
            MenuAction::SyncSshConfig => "Teleport Update Nodes (Update SSH config)",
            MenuAction::Ssh => "Teleport SSH (Connect to a node)",
            MenuAction::ConfigureEditor => "Configure editor for Teleport (Remote-SSH)",
            MenuAction::Exit => "Exit",
        }
    }
}

pub struct Helper<'a, R: CommandRunner, S: Selector> {
    config: &'a Config,
    runner: &'a R,
    selector: &'a S,
}

impl<'a, R: CommandRunner, S: Selector> Helper<'a, R, S> {
    pub fn new(config: &'a Config, runner: &'a R, selector: &'a S) -> Self {
        Self {
            config,
            runner,
            selector,
        }
    }

    fn broker(&self) -> Broker<'a, R> {
        Broker::new(self.runner, &self.config.broker, &self.config.logins)
    }

    fn choose(&self, prompt: &str, options: &[String], opts: SelectOptions) -> Result<String> {
        match self.selector.select(prompt, options, opts)? {
            Selection::Chosen(index) => options
                .get(index)
                .cloned()
                .with_context(|| format!("selection {index} out of range")),
            Selection::Cancelled => Err(HelperError::Cancelled.into()),
        }
    }

    fn require_login(&self, broker: &Broker<'_, R>) -> Result<()> {
        if broker.is_logged_in() {
            return Ok(());
        }
        println!("You are not logged in to Teleport");
        println!("Please run 'Teleport Setup' first");
        Err(HelperError::NotLoggedIn.into())
    }

    pub fn run_interactive(&self) -> Result<()> {
        let labels: Vec<String> = MenuAction::ALL
            .iter()
            .map(|action| action.label().to_string())
            .collect();

        loop {
            let action = match self.selector.select(
                "What would you like to do?",
                &labels,
                SelectOptions::default(),
            ) {
                Ok(Selection::Chosen(index)) => MenuAction::ALL
                    .get(index)
                    .copied()
                    .with_context(|| format!("menu selection {index} out of range"))?,
                Ok(Selection::Cancelled) => {
                    println!("Exiting...");
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!("menu prompt failed: {:#}", e);
                    println!("Exiting...");
                    return Ok(());
                }
            };

            tracing::debug!("menu action: {:?}", action);
            let result = match action {
                MenuAction::Setup => self.setup(),
                MenuAction::SyncSshConfig => self.sync_ssh_config(),
                MenuAction::Ssh => self.ssh(None, None),
                MenuAction::ConfigureEditor => self.configure_editor(None),
                MenuAction::Exit => {
                    println!("Goodbye!");
                    return Ok(());
                }
            };

            if let Err(e) = result {
                println!("Error: {e:#}");
            }
            println!();
        }
    }

    pub fn setup(&self) -> Result<()> {
        println!("\n=== Teleport Setup ===\n");
        let broker = self.broker();

        if broker.is_logged_in() {
            println!("✓ You are already logged in to Teleport");
            if let Ok(user) = broker.current_identity() {
                println!("✓ Logged in as: {user}");
            }
            println!();
            return Ok(());
        }

        println!("You are not logged in to Teleport");
        println!(
            "Logging in to {} using {}...\n",
            self.config.broker.proxy, self.config.broker.auth_connector
        );

        broker.login().context("failed to log in")?;

        println!("\n✓ Successfully logged in to Teleport!");
        match broker.current_identity() {
            Ok(user) => println!("✓ Logged in as: {user}"),
            Err(e) => tracing::debug!("identity lookup after login failed: {}", e),
        }
        println!();
        Ok(())
    }

    pub fn list_nodes(&self) -> Result<()> {
        let broker = self.broker();
        self.require_login(&broker)?;

        let nodes = broker.list_nodes().context("failed to get nodes")?;
        if nodes.is_empty() {
            println!("No nodes available");
        }
        for node in nodes {
            println!("{node}");
        }
        Ok(())
    }

    /// Connect to `node` as `login`, prompting for whichever is missing.
    pub fn ssh(&self, node: Option<String>, login: Option<String>) -> Result<()> {
        println!("\n=== Teleport SSH ===\n");
        let broker = self.broker();
        self.require_login(&broker)?;

        let node = match node {
            Some(node) => node,
            None => {
                println!("Fetching available nodes...");
                let nodes = broker.list_nodes().context("failed to get nodes")?;
                if nodes.is_empty() {
                    println!("No nodes available");
                    return Ok(());
                }
                println!("Found {} node(s)\n", nodes.len());

                self.choose(
                    "Select a node to connect to:",
                    &nodes,
                    SelectOptions {
                        default: None,
                        page_size: Some(self.config.ui.page_size),
                    },
                )?
            }
        };

        let login = match login {
            Some(login) => login,
            None => {
                println!("\nTesting available logins for {node}...");
                println!("(This may take a few seconds)");
                let logins = broker.working_logins(&node);
                if logins.is_empty() {
                    anyhow::bail!("no logins available for this node");
                }

                let preferred = default_login(&logins);
                self.choose(
                    "Select a login user:",
                    &logins,
                    SelectOptions {
                        default: logins.iter().position(|l| *l == preferred),
                        page_size: Some(self.config.ui.page_size),
                    },
                )?
            }
        };

        println!("\nConnecting to {node} as {login}...");
        println!("(Press Ctrl+D or type 'exit' to disconnect)\n");

        let exit = broker
            .connect(&login, &node)
            .context("SSH connection failed")?;
        if exit.success() || exit.code == Some(INTERRUPTED_EXIT) {
            println!("\nConnection closed");
            return Ok(());
        }

        Err(HelperError::Execution {
            command: command_line(broker.binary(), &["ssh".to_string(), format!("{login}@{node}")]),
            code: exit.code,
            stderr: String::new(),
        })
        .context("SSH connection failed")
    }

    pub fn configure_editor(&self, editor: Option<Editor>) -> Result<()> {
        let editor = match editor {
            Some(editor) => editor,
            None => {
                let names: Vec<String> = Editor::ALL
                    .iter()
                    .map(|e| e.display_name().to_string())
                    .collect();
                let name = self.choose("Which editor?", &names, SelectOptions::default())?;
                Editor::ALL
                    .into_iter()
                    .find(|e| e.display_name() == name)
                    .context("unknown editor selected")?
            }
        };

        let path = editor::settings_path(editor)?;
        self.apply_editor_settings(editor, &path)
    }

    fn apply_editor_settings(&self, editor: Editor, path: &Path) -> Result<()> {
        let name = editor.display_name();
        println!("\n=== Configure {name} for Teleport ===\n");

        let outcome = match editor::disable_local_server(path) {
            Ok(outcome) => outcome,
            Err(e) => {
                let missing = matches!(
                    e.downcast_ref::<HelperError>(),
                    Some(HelperError::EditorNotFound { .. })
                );
                if !missing {
                    return Err(e);
                }
                println!("{name} settings directory not found.");
                println!("Make sure {name} is installed and has been run at least once.");
                return Err(e.context(format!("{name} not found")));
            }
        };

        match outcome {
            SettingsOutcome::AlreadyConfigured => {
                println!("✓ {name} already configured correctly for Teleport");
                println!("  {} = false", editor::LOCAL_SERVER_KEY);
                return Ok(());
            }
            SettingsOutcome::Created => {
                println!("Created new {name} settings file: {}", path.display());
            }
            SettingsOutcome::Updated { backup } => {
                println!("Found existing {name} settings");
                match backup {
                    Some(backup) => {
                        println!("Backed up existing settings to: {}", backup.display())
                    }
                    None => println!("Warning: Failed to create backup"),
                }
            }
        }

        println!("\n=== {name} Configuration Complete! ===\n");
        println!("✓ Set {} = false\n", editor::LOCAL_SERVER_KEY);
        println!("This setting is required for Teleport SSH connections.");
        println!("Restart {name} for changes to take effect.\n");
        Ok(())
    }

    pub fn sync_ssh_config(&self) -> Result<()> {
        println!("\n=== Teleport Update SSH config ===\n");
        let broker = self.broker();
        self.require_login(&broker)?;

        let generated = broker
            .ssh_config()
            .context("failed to generate SSH config")?;
        let path = Path::new(&self.config.ssh_config.path);

        match sshconfig::sync(path, &generated)? {
            SyncOutcome::Unchanged => {
                println!("✓ SSH config already up to date: {}", path.display());
            }
            SyncOutcome::Written { hosts, backup } => {
                if let Some(backup) = backup {
                    println!("Backed up existing SSH config to: {}", backup.display());
                }
                println!("✓ Updated {}", path.display());
                if !hosts.is_empty() {
                    println!("  Hosts: {}", hosts.join(", "));
                }
                println!("Nodes are reachable as `ssh <login>@<node>.<cluster>`.");
            }
        }
        Ok(())
    }
}
