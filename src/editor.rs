// ABOUTME: Editor settings support for Remote-SSH through Teleport
// ABOUTME: Resolves per-platform settings.json paths and forces remote.SSH.useLocalServer to false

use crate::error::HelperError;
use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const LOCAL_SERVER_KEY: &str = "remote.SSH.useLocalServer";

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Editor {
    #[value(name = "vscode")]
    VsCode,
    #[value(name = "vscode-insiders")]
    VsCodeInsiders,
    Cursor,
    #[value(name = "vscodium")]
    VsCodium,
}

impl Editor {
    pub const ALL: [Editor; 4] = [
        Editor::VsCode,
        Editor::VsCodeInsiders,
        Editor::Cursor,
        Editor::VsCodium,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            Editor::VsCode => "VS Code",
            Editor::VsCodeInsiders => "VS Code Insiders",
            Editor::Cursor => "Cursor",
            Editor::VsCodium => "VSCodium",
        }
    }

    /// Directory name under the platform's application data root.
    fn app_dir(self) -> &'static str {
        match self {
            Editor::VsCode => "Code",
            Editor::VsCodeInsiders => "Code - Insiders",
            Editor::Cursor => "Cursor",
            Editor::VsCodium => "VSCodium",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOs {
    Windows,
    MacOs,
    Unix,
}

impl HostOs {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            HostOs::Windows
        } else if cfg!(target_os = "macos") {
            HostOs::MacOs
        } else {
            HostOs::Unix
        }
    }
}

/// `appdata` is only consulted on Windows.
pub fn settings_path_for(
    editor: Editor,
    os: HostOs,
    home: &Path,
    appdata: Option<&Path>,
) -> Result<PathBuf, HelperError> {
    let root = match os {
        HostOs::Windows => appdata
            .map(Path::to_path_buf)
            .ok_or(HelperError::MissingEnv("APPDATA"))?,
        HostOs::MacOs => home.join("Library").join("Application Support"),
        HostOs::Unix => home.join(".config"),
    };
    Ok(root.join(editor.app_dir()).join("User").join("settings.json"))
}

pub fn settings_path(editor: Editor) -> Result<PathBuf> {
    let home = dirs::home_dir().context("Failed to determine home directory")?;
    let appdata = std::env::var_os("APPDATA")
        .filter(|value| !value.is_empty())
        .map(PathBuf::from);
    Ok(settings_path_for(
        editor,
        HostOs::current(),
        &home,
        appdata.as_deref(),
    )?)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsOutcome {
    AlreadyConfigured,
    Created,
    Updated { backup: Option<PathBuf> },
}

pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".backup");
    PathBuf::from(name)
}

/// Copy `original` next to `path`. Failure is logged and reported as `None`.
pub fn write_backup(path: &Path, original: &[u8]) -> Option<PathBuf> {
    let backup = backup_path(path);
    match fs::write(&backup, original) {
        Ok(()) => {
            tracing::info!("backed up {} to {}", path.display(), backup.display());
            Some(backup)
        }
        Err(e) => {
            tracing::warn!("failed to create backup {}: {}", backup.display(), e);
            None
        }
    }
}

/// Set `remote.SSH.useLocalServer` to `false` in the settings file at `path`.
///
/// The settings directory must already exist (the editor has run at least
/// once). A missing file starts from an empty object. If the key is already
/// `false` the file is not touched at all.
pub fn disable_local_server(path: &Path) -> Result<SettingsOutcome> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    if !dir.is_dir() {
        return Err(HelperError::EditorNotFound {
            dir: dir.to_path_buf(),
        }
        .into());
    }

    let original = match fs::read(path) {
        Ok(bytes) => Some(bytes),
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(e) => {
            return Err(e)
                .with_context(|| format!("Failed to read settings: {}", path.display()));
        }
    };

    let mut settings: Map<String, Value> = match &original {
        Some(bytes) => serde_json::from_slice(bytes)
            .with_context(|| format!("Failed to parse settings: {}", path.display()))?,
        None => Map::new(),
    };

    if settings.get(LOCAL_SERVER_KEY) == Some(&Value::Bool(false)) {
        return Ok(SettingsOutcome::AlreadyConfigured);
    }

    let backup = match &original {
        Some(bytes) if !bytes.is_empty() => write_backup(path, bytes),
        _ => None,
    };

    settings.insert(LOCAL_SERVER_KEY.to_string(), Value::Bool(false));
    let updated =
        serde_json::to_string_pretty(&settings).context("Failed to serialize settings")?;
    fs::write(path, updated)
        .with_context(|| format!("Failed to write settings: {}", path.display()))?;

    Ok(match original {
        Some(_) => SettingsOutcome::Updated { backup },
        None => SettingsOutcome::Created,
    })
}
