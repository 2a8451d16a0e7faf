// ABOUTME: Typed failures for broker invocations, status parsing and editor settings
// ABOUTME: Actions wrap these with anyhow context before they reach the operator

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HelperError {
    #[error("{binary} is not installed or not on PATH")]
    BinaryMissing { binary: String },

    #[error("not logged in to Teleport")]
    NotLoggedIn,

    #[error("could not find user in status output. Output was:\n{output}")]
    IdentityNotFound { output: String },

    #[error("no logins found in status output")]
    LoginsNotFound,

    #[error("`{command}` failed ({}): {stderr}", describe_code(.code))]
    Execution {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("settings directory not found: {}", .dir.display())]
    EditorNotFound { dir: PathBuf },

    #[error("{0} environment variable not set")]
    MissingEnv(&'static str),

    #[error("selection cancelled")]
    Cancelled,
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}

pub type HelperResult<T> = std::result::Result<T, HelperError>;
