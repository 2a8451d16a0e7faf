// ABOUTME: Login resolution: default login choice and trial-connection filtering per node
// ABOUTME: Trials fan out over a bounded number of threads and merge back in candidate order

use crate::process::CommandOutput;
use std::thread;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialOutcome {
    Allowed,
    Denied,
    /// Timeout, network trouble or anything else unrecognised. The login is kept.
    Inconclusive,
}

impl TrialOutcome {
    pub fn keeps_login(self) -> bool {
        !matches!(self, TrialOutcome::Denied)
    }
}

/// Preference: `ubuntu`, then `root`, then the first candidate.
pub fn default_login(candidates: &[String]) -> String {
    for preferred in ["ubuntu", "root"] {
        if candidates.iter().any(|c| c == preferred) {
            return preferred.to_string();
        }
    }
    candidates
        .first()
        .cloned()
        .unwrap_or_else(|| "ubuntu".to_string())
}

/// Markers are matched case-sensitively against stderr, with no normalization.
pub fn classify_trial(output: &CommandOutput, denial_markers: &[String]) -> TrialOutcome {
    if output.success() {
        return TrialOutcome::Allowed;
    }
    if output.timed_out {
        return TrialOutcome::Inconclusive;
    }
    if denial_markers
        .iter()
        .any(|marker| output.stderr.contains(marker.as_str()))
    {
        TrialOutcome::Denied
    } else {
        TrialOutcome::Inconclusive
    }
}

/// Run `trial` for every candidate, at most `concurrency` at a time, and keep the
/// ones that were not denied. If every candidate is denied the untested list is
/// returned, since an empty choice is worse than an unverified one.
pub fn resolve_working_logins<F>(candidates: &[String], concurrency: usize, trial: F) -> Vec<String>
where
    F: Fn(&str) -> TrialOutcome + Sync,
{
    let outcomes = run_trials(candidates, concurrency.max(1), &trial);

    let working: Vec<String> = candidates
        .iter()
        .zip(&outcomes)
        .filter(|(_, outcome)| outcome.keeps_login())
        .map(|(login, _)| login.clone())
        .collect();

    if working.is_empty() {
        tracing::warn!(
            "every login was denied by trial connection, offering all {} anyway",
            candidates.len()
        );
        candidates.to_vec()
    } else {
        working
    }
}

fn run_trials<F>(candidates: &[String], concurrency: usize, trial: &F) -> Vec<TrialOutcome>
where
    F: Fn(&str) -> TrialOutcome + Sync,
{
    if concurrency == 1 {
        return candidates.iter().map(|login| trial(login)).collect();
    }

    let mut outcomes = Vec::with_capacity(candidates.len());
    for batch in candidates.chunks(concurrency) {
        thread::scope(|scope| {
            let handles: Vec<_> = batch
                .iter()
                .map(|login| scope.spawn(move || trial(login)))
                .collect();

            for (login, handle) in batch.iter().zip(handles) {
                let outcome = handle.join().unwrap_or_else(|_| {
                    tracing::warn!("trial for {} panicked, keeping it", login);
                    TrialOutcome::Inconclusive
                });
                outcomes.push(outcome);
            }
        });
    }
    outcomes
}
