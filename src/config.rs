// ABOUTME: Configuration structures and parsing for the broker client, login trials and UI
// ABOUTME: Replaces compiled-in proxy and connector constants with an injectable TOML file

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Config {
    pub broker: BrokerConfig,
    #[serde(default)]
    pub logins: LoginConfig,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default)]
    pub ssh_config: SshConfigFile,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct BrokerConfig {
    #[serde(default = "default_binary")]
    pub binary: String,
    pub proxy: String,
    pub auth_connector: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoginConfig {
    #[serde(default = "default_fallback_logins")]
    pub fallback: Vec<String>,
    #[serde(default = "default_denial_markers")]
    pub denial_markers: Vec<String>,
    #[serde(default = "default_trial_concurrency")]
    pub trial_concurrency: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trial_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct UiConfig {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SshConfigFile {
    #[serde(default = "default_ssh_config_path")]
    pub path: String,
}

fn default_binary() -> String {
    "tsh".to_string()
}

fn default_fallback_logins() -> Vec<String> {
    vec!["ubuntu".to_string(), "root".to_string()]
}

fn default_denial_markers() -> Vec<String> {
    vec![
        "access denied".to_string(),
        "permission denied".to_string(),
        "not allowed".to_string(),
    ]
}

fn default_trial_concurrency() -> usize {
    1
}

fn default_page_size() -> usize {
    15
}

fn default_ssh_config_path() -> String {
    "~/.ssh/config".to_string()
}

impl Default for LoginConfig {
    fn default() -> Self {
        LoginConfig {
            fallback: default_fallback_logins(),
            denial_markers: default_denial_markers(),
            trial_concurrency: default_trial_concurrency(),
            trial_timeout_secs: None,
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        UiConfig {
            page_size: default_page_size(),
        }
    }
}

impl Default for SshConfigFile {
    fn default() -> Self {
        SshConfigFile {
            path: default_ssh_config_path(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            broker: BrokerConfig {
                binary: default_binary(),
                proxy: "teleport-iam.aies.scicom.dev".to_string(),
                auth_connector: "github-connector".to_string(),
            },
            logins: LoginConfig::default(),
            ui: UiConfig::default(),
            ssh_config: SshConfigFile::default(),
        }
    }
}

impl LoginConfig {
    pub fn trial_timeout(&self) -> Option<Duration> {
        self.trial_timeout_secs.map(Duration::from_secs)
    }
}

impl Config {
    pub fn default_config_content() -> &'static str {
        r#"# tsh-helper configuration

[broker]
# Teleport client binary, looked up on PATH
binary = "tsh"
# Proxy address and SSO connector passed to `tsh login`
proxy = "teleport-iam.aies.scicom.dev"
auth_connector = "github-connector"

[logins]
# Offered when `tsh status` lists no logins
fallback = ["ubuntu", "root"]
# A trial connection whose stderr contains one of these is treated as denied
denial_markers = ["access denied", "permission denied", "not allowed"]
# Trial connections run at most this many at a time; 1 tests logins one by one
trial_concurrency = 1
# Kill a trial still running after this many seconds and keep the login.
# Unset means trials run until `tsh` exits.
# trial_timeout_secs = 10

[ui]
page_size = 15

[ssh_config]
# OpenSSH config file that receives the `tsh config` block
path = "~/.ssh/config"
"#
    }

    pub fn load_from_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse configuration")
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;
        Self::load_from_str(&content)
    }

    /// Load `path` if it exists, otherwise fall back to built-in defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            tracing::debug!("loading configuration from {}", path.display());
            Self::load_from_file(path)
        } else {
            tracing::debug!(
                "no configuration at {}, using defaults",
                path.display()
            );
            Ok(Self::default())
        }
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Failed to determine config directory")?;
        Ok(config_dir.join("tsh-helper").join("config.toml"))
    }

    pub fn expand_path(&mut self) -> Result<()> {
        self.ssh_config.path = expand_tilde(&self.ssh_config.path)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.broker.binary.trim().is_empty() {
            anyhow::bail!("broker.binary cannot be empty");
        }
        if self.broker.proxy.trim().is_empty() {
            anyhow::bail!("broker.proxy cannot be empty");
        }
        if self.broker.auth_connector.trim().is_empty() {
            anyhow::bail!("broker.auth_connector cannot be empty");
        }

        if self.logins.fallback.is_empty() {
            anyhow::bail!("logins.fallback must list at least one login");
        }
        if self.logins.trial_concurrency == 0 {
            anyhow::bail!("logins.trial_concurrency must be greater than 0");
        }
        if self.logins.trial_timeout_secs == Some(0) {
            anyhow::bail!("logins.trial_timeout_secs must be greater than 0 (remove it to disable)");
        }

        if self.ui.page_size == 0 {
            anyhow::bail!("ui.page_size must be greater than 0");
        }

        Ok(())
    }

    pub fn save_default_config(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, Self::default_config_content())
            .with_context(|| format!("Failed to write default config to: {}", path.display()))?;

        Ok(())
    }
}

fn expand_tilde(path: &str) -> Result<String> {
    if let Some(rest) = path.strip_prefix("~/") {
        let home = dirs::home_dir().context("Failed to determine home directory")?;
        Ok(home.join(rest).to_string_lossy().into_owned())
    } else {
        Ok(path.to_string())
    }
}
