// ABOUTME: Teleport client wrapper: session inspection, node catalog and login resolution
// ABOUTME: Every answer is re-derived from a fresh `tsh` invocation; nothing is cached

pub mod logins;
pub mod nodes;
pub mod status;

pub use logins::{TrialOutcome, default_login};

use crate::config::{BrokerConfig, LoginConfig};
use crate::error::{HelperError, HelperResult};
use crate::process::{CommandOutput, CommandRunner, ExitInfo, command_line};

pub struct Broker<'a, R: CommandRunner> {
    runner: &'a R,
    broker: &'a BrokerConfig,
    logins: &'a LoginConfig,
}

impl<'a, R: CommandRunner> Broker<'a, R> {
    pub fn new(runner: &'a R, broker: &'a BrokerConfig, logins: &'a LoginConfig) -> Self {
        Self {
            runner,
            broker,
            logins,
        }
    }

    pub fn binary(&self) -> &str {
        &self.broker.binary
    }

    fn capture(&self, args: &[&str]) -> HelperResult<CommandOutput> {
        let args = to_args(args);
        let command = command_line(&self.broker.binary, &args);
        self.runner
            .output(&self.broker.binary, &args)?
            .into_checked(command)
    }

    /// Any failure, including a missing binary, counts as logged out.
    pub fn is_logged_in(&self) -> bool {
        match self.capture(&["status"]) {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!("status check failed: {}", e);
                false
            }
        }
    }

    pub fn current_identity(&self) -> HelperResult<String> {
        let output = self.capture(&["status"])?;
        status::parse_identity(&output.stdout)
    }

    pub fn list_nodes(&self) -> HelperResult<Vec<String>> {
        let output = self.capture(&["ls", "--format=names"])?;
        let nodes = nodes::parse_nodes(&output.stdout);
        tracing::debug!("catalog returned {} node(s)", nodes.len());
        Ok(nodes)
    }

    pub fn all_known_logins(&self) -> HelperResult<Vec<String>> {
        let output = self.capture(&["status"])?;
        status::parse_logins(&output.stdout)
    }

    pub fn trial_login(&self, login: &str, node: &str) -> TrialOutcome {
        let args = to_args(&["ssh", target(login, node).as_str(), "exit"]);
        let result = match self.logins.trial_timeout() {
            Some(timeout) => self
                .runner
                .output_with_timeout(&self.broker.binary, &args, timeout),
            None => self.runner.output(&self.broker.binary, &args),
        };

        let outcome = match result {
            Ok(output) => logins::classify_trial(&output, &self.logins.denial_markers),
            Err(e) => {
                tracing::debug!("trial for {} could not run: {}", login, e);
                TrialOutcome::Inconclusive
            }
        };
        tracing::debug!("trial {}@{}: {:?}", login, node, outcome);
        outcome
    }

    /// Logins worth offering for `node`. Enumeration is best-effort: if the
    /// session lists no logins the configured fallback is returned untested.
    pub fn working_logins(&self, node: &str) -> Vec<String> {
        let candidates = match self.all_known_logins() {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::info!("could not enumerate logins ({}), using fallback", e);
                return self.logins.fallback.clone();
            }
        };

        logins::resolve_working_logins(&candidates, self.logins.trial_concurrency, |login| {
            self.trial_login(login, node)
        })
    }

    pub fn login(&self) -> HelperResult<()> {
        let args = vec![
            "login".to_string(),
            format!("--proxy={}", self.broker.proxy),
            format!("--auth={}", self.broker.auth_connector),
        ];
        let exit = self.runner.interactive(&self.broker.binary, &args)?;
        check_interactive(exit, &self.broker.binary, &args)
    }

    /// Opens an interactive session. Returns the exit info so callers can
    /// treat an interrupted session as a normal disconnect.
    pub fn connect(&self, login: &str, node: &str) -> HelperResult<ExitInfo> {
        let args = to_args(&["ssh", target(login, node).as_str()]);
        self.runner.interactive(&self.broker.binary, &args)
    }

    /// OpenSSH client configuration generated by `tsh config`.
    pub fn ssh_config(&self) -> HelperResult<String> {
        Ok(self.capture(&["config"])?.stdout)
    }
}

fn target(login: &str, node: &str) -> String {
    format!("{login}@{node}")
}

fn to_args(args: &[&str]) -> Vec<String> {
    args.iter().map(|arg| arg.to_string()).collect()
}

fn check_interactive(exit: ExitInfo, program: &str, args: &[String]) -> HelperResult<()> {
    if exit.success() {
        Ok(())
    } else {
        Err(HelperError::Execution {
            command: command_line(program, args),
            code: exit.code,
            stderr: String::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::process::fake::{self, ScriptedRunner};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    const STATUS: &str = "> Profile URL:        https://teleport.example.com:443
  Logged in as:       alice
  Logins:             ubuntu, root, deploy
";

    fn with_broker<T>(runner: &ScriptedRunner, f: impl FnOnce(&Broker<'_, ScriptedRunner>) -> T) -> T {
        let config = Config::default();
        let broker = Broker::new(runner, &config.broker, &config.logins);
        f(&broker)
    }

    #[test]
    fn test_logged_in_when_status_succeeds() {
        let runner = ScriptedRunner::new().on(&["status"], fake::ok(STATUS));
        assert!(with_broker(&runner, |b| b.is_logged_in()));
    }

    #[test]
    fn test_not_logged_in_on_failure_or_spawn_error() {
        let runner = ScriptedRunner::new().on(&["status"], fake::failed(1, "Not logged in."));
        assert!(!with_broker(&runner, |b| b.is_logged_in()));

        let runner = ScriptedRunner::new().on_spawn_error(&["status"]);
        assert!(!with_broker(&runner, |b| b.is_logged_in()));
    }

    #[test]
    fn test_current_identity() {
        let runner = ScriptedRunner::new().on(&["status"], fake::ok(STATUS));
        assert_eq!(with_broker(&runner, |b| b.current_identity()).unwrap(), "alice");
    }

    #[test]
    fn test_list_nodes_propagates_execution_error() {
        let runner = ScriptedRunner::new().on(&["ls"], fake::failed(1, "ERROR: expired\n"));
        let err = with_broker(&runner, |b| b.list_nodes()).unwrap_err();
        match err {
            HelperError::Execution { command, stderr, .. } => {
                assert_eq!(command, "tsh ls --format=names");
                assert_eq!(stderr, "ERROR: expired");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_list_nodes_empty_is_ok() {
        let runner = ScriptedRunner::new().on(&["ls", "--format=names"], fake::ok("\n"));
        assert!(with_broker(&runner, |b| b.list_nodes()).unwrap().is_empty());
    }

    #[test]
    fn test_working_logins_filters_denied() {
        let runner = ScriptedRunner::new()
            .on(&["status"], fake::ok(STATUS))
            .on(
                &["ssh", "root@web-1"],
                fake::failed(1, "ERROR: access denied to root connecting to web-1"),
            )
            .on(&["ssh", "deploy@web-1"], fake::failed(255, "connection reset"))
            .on(&["ssh", "ubuntu@web-1"], fake::ok(""));

        let logins = with_broker(&runner, |b| b.working_logins("web-1"));
        assert_eq!(logins, vec!["ubuntu", "deploy"]);
        assert!(runner.was_called_with(&["ssh", "ubuntu@web-1", "exit"]));
    }

    #[test]
    fn test_working_logins_all_denied_returns_candidates() {
        let runner = ScriptedRunner::new()
            .on(&["status"], fake::ok(STATUS))
            .on(&["ssh"], fake::failed(1, "permission denied"));

        let logins = with_broker(&runner, |b| b.working_logins("db-1"));
        assert_eq!(logins, vec!["ubuntu", "root", "deploy"]);
    }

    #[test]
    fn test_working_logins_falls_back_without_trials() {
        let runner = ScriptedRunner::new().on(&["status"], fake::ok("Logged in as: alice\n"));

        let logins = with_broker(&runner, |b| b.working_logins("db-1"));
        assert_eq!(logins, vec!["ubuntu", "root"]);
        assert!(!runner.was_called_with(&["ssh"]));
    }

    #[test]
    fn test_default_trials_are_sequential_without_timeout() {
        struct CountingRunner {
            inner: ScriptedRunner,
            active: AtomicUsize,
            peak: AtomicUsize,
        }

        impl CountingRunner {
            fn trial(&self, run: impl FnOnce() -> HelperResult<CommandOutput>) -> HelperResult<CommandOutput> {
                let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(20));
                let result = run();
                self.active.fetch_sub(1, Ordering::SeqCst);
                result
            }
        }

        impl CommandRunner for CountingRunner {
            fn output(&self, program: &str, args: &[String]) -> HelperResult<CommandOutput> {
                self.trial(|| self.inner.output(program, args))
            }

            fn output_with_timeout(
                &self,
                program: &str,
                args: &[String],
                timeout: Duration,
            ) -> HelperResult<CommandOutput> {
                self.trial(|| self.inner.output_with_timeout(program, args, timeout))
            }

            fn interactive(&self, program: &str, args: &[String]) -> HelperResult<ExitInfo> {
                self.inner.interactive(program, args)
            }
        }

        let status = "Logged in as: alice\nLogins: ubuntu, root, deploy, admin\n";
        let runner = CountingRunner {
            inner: ScriptedRunner::new()
                .on(&["status"], fake::ok(status))
                .on(&["ssh"], fake::ok("")),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        };
        let config = Config::default();
        let broker = Broker::new(&runner, &config.broker, &config.logins);

        let logins = broker.working_logins("web-1");

        assert_eq!(logins, vec!["ubuntu", "root", "deploy", "admin"]);
        assert_eq!(runner.peak.load(Ordering::SeqCst), 1);
        assert_eq!(runner.inner.timeouts(), vec![None; 5]);
    }

    #[test]
    fn test_configured_timeout_reaches_trials() {
        let runner = ScriptedRunner::new().on(&["ssh"], fake::ok(""));
        let mut config = Config::default();
        config.logins.trial_timeout_secs = Some(7);
        let broker = Broker::new(&runner, &config.broker, &config.logins);

        assert_eq!(broker.trial_login("ubuntu", "web-1"), TrialOutcome::Allowed);
        assert_eq!(runner.timeouts(), vec![Some(Duration::from_secs(7))]);
    }

    #[test]
    fn test_trial_spawn_error_keeps_login() {
        let runner = ScriptedRunner::new().on_spawn_error(&["ssh"]);
        let outcome = with_broker(&runner, |b| b.trial_login("ubuntu", "web-1"));
        assert_eq!(outcome, TrialOutcome::Inconclusive);
    }

    #[test]
    fn test_login_passes_proxy_and_connector() {
        let runner = ScriptedRunner::new();
        with_broker(&runner, |b| b.login()).unwrap();
        assert_eq!(
            runner.interactive_calls(),
            vec![vec![
                "login".to_string(),
                "--proxy=teleport-iam.aies.scicom.dev".to_string(),
                "--auth=github-connector".to_string(),
            ]]
        );
    }

    #[test]
    fn test_login_failure_is_execution_error() {
        let runner = ScriptedRunner::new().with_interactive_exit(Some(1));
        let err = with_broker(&runner, |b| b.login()).unwrap_err();
        assert!(matches!(err, HelperError::Execution { code: Some(1), .. }));
    }

    #[test]
    fn test_connect_targets_login_at_node() {
        let runner = ScriptedRunner::new();
        let exit = with_broker(&runner, |b| b.connect("ubuntu", "web-1")).unwrap();
        assert!(exit.success());
        assert_eq!(
            runner.interactive_calls(),
            vec![vec!["ssh".to_string(), "ubuntu@web-1".to_string()]]
        );
    }
}
