// ABOUTME: Process runner abstraction for invoking the broker client and other external commands
// ABOUTME: Supports captured output (optionally bounded by a timeout) and interactive passthrough

use crate::error::{HelperError, HelperResult};
use std::io::Read;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// How a child process ended. `code` is `None` when it was killed by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitInfo {
    pub code: Option<i32>,
}

impl ExitInfo {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit: ExitInfo,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit.success()
    }

    /// Turn a non-zero exit into an execution error carrying stderr.
    pub fn into_checked(self, command: String) -> HelperResult<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(HelperError::Execution {
                command,
                code: self.exit.code,
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

/// Seam between the helper and the operating system's process launcher.
pub trait CommandRunner: Sync {
    /// Run to completion with stdout and stderr captured.
    fn output(&self, program: &str, args: &[String]) -> HelperResult<CommandOutput>;

    /// Like `output`, but the child is killed once `timeout` elapses.
    fn output_with_timeout(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> HelperResult<CommandOutput>;

    /// Run with the terminal's standard streams inherited.
    fn interactive(&self, program: &str, args: &[String]) -> HelperResult<ExitInfo>;
}

pub fn command_line(program: &str, args: &[String]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

pub fn is_installed(binary: &str) -> bool {
    match which::which(binary) {
        Ok(path) => {
            tracing::debug!("found {} at {}", binary, path.display());
            true
        }
        Err(e) => {
            tracing::debug!("{} not found on PATH: {}", binary, e);
            false
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }

    fn spawn_error(program: &str, args: &[String], source: std::io::Error) -> HelperError {
        HelperError::Spawn {
            command: command_line(program, args),
            source,
        }
    }
}

impl CommandRunner for SystemRunner {
    fn output(&self, program: &str, args: &[String]) -> HelperResult<CommandOutput> {
        tracing::debug!("running: {}", command_line(program, args));

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| Self::spawn_error(program, args, e))?;

        Ok(CommandOutput {
            exit: ExitInfo {
                code: output.status.code(),
            },
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            timed_out: false,
        })
    }

    fn output_with_timeout(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> HelperResult<CommandOutput> {
        tracing::debug!(
            "running with {:?} timeout: {}",
            timeout,
            command_line(program, args)
        );

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Self::spawn_error(program, args, e))?;

        // Drain both pipes off-thread so a chatty child cannot block on a full pipe.
        let stdout_reader = child.stdout.take().map(drain);
        let stderr_reader = child.stderr.take().map(drain);

        let deadline = Instant::now() + timeout;
        let mut timed_out = false;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    tracing::debug!("{} timed out, killing", command_line(program, args));
                    timed_out = true;
                    let _ = child.kill();
                    break child
                        .wait()
                        .map_err(|e| Self::spawn_error(program, args, e))?;
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => return Err(Self::spawn_error(program, args, e)),
            }
        };

        // A killed child may leave grandchildren holding the pipes open, so the
        // readers are only joined when the child finished on its own.
        let (stdout, stderr) = if timed_out {
            (String::new(), String::new())
        } else {
            (join_reader(stdout_reader), join_reader(stderr_reader))
        };

        Ok(CommandOutput {
            exit: ExitInfo {
                code: status.code(),
            },
            stdout,
            stderr,
            timed_out,
        })
    }

    fn interactive(&self, program: &str, args: &[String]) -> HelperResult<ExitInfo> {
        tracing::debug!("running interactively: {}", command_line(program, args));

        let status = Command::new(program)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|e| Self::spawn_error(program, args, e))?;

        Ok(ExitInfo {
            code: status.code(),
        })
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join_reader(reader: Option<thread::JoinHandle<String>>) -> String {
    reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}
