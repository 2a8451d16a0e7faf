// ABOUTME: Ordered extraction rules for the free-form `tsh status` output
// ABOUTME: Finds the current identity and the combined role logins, failing loudly on unknown shapes

use crate::error::{HelperError, HelperResult};

/// One known shape of the identity line. Rules are tried in `IDENTITY_RULES` order.
pub struct StatusRule {
    pub name: &'static str,
    extract: fn(&str) -> Option<String>,
}

impl StatusRule {
    pub fn apply(&self, line: &str) -> Option<String> {
        (self.extract)(line)
    }
}

pub const IDENTITY_RULES: &[StatusRule] = &[
    StatusRule {
        name: "user-label",
        extract: user_label,
    },
    StatusRule {
        name: "profile-url",
        extract: profile_url,
    },
    StatusRule {
        name: "logged-in-as",
        extract: logged_in_as,
    },
];

/// `User: alice`
fn user_label(line: &str) -> Option<String> {
    if !line.starts_with("User:") {
        return None;
    }
    line.split_whitespace().nth(1).map(str::to_string)
}

/// `> Profile URL:  https://proxy:443/web/cluster/alice@cluster`
fn profile_url(line: &str) -> Option<String> {
    if !line.contains("Profile URL:") {
        return None;
    }
    let at = line.rfind('@')?;
    if at == 0 {
        return None;
    }
    let before_at = &line[..at];
    let slash = before_at.rfind('/')?;
    let user = &before_at[slash + 1..];
    (!user.is_empty()).then(|| user.to_string())
}

/// `Logged in as: alice`
fn logged_in_as(line: &str) -> Option<String> {
    if !line.contains("Logged in as:") {
        return None;
    }
    let user = line.split(':').nth(1)?.trim();
    (!user.is_empty()).then(|| user.to_string())
}

pub fn parse_identity(output: &str) -> HelperResult<String> {
    for line in output.lines() {
        let line = line.trim();
        for rule in IDENTITY_RULES {
            if let Some(user) = rule.apply(line) {
                tracing::debug!("identity matched rule {}: {}", rule.name, user);
                return Ok(user);
            }
        }
    }

    Err(HelperError::IdentityNotFound {
        output: output.to_string(),
    })
}

/// Logins granted by all of the session's roles, from the `Logins:` line.
pub fn parse_logins(output: &str) -> HelperResult<Vec<String>> {
    output
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("Logins:"))
        .map(|rest| {
            rest.split(',')
                .map(str::trim)
                .filter(|login| !login.is_empty())
                .map(str::to_string)
                .collect()
        })
        .ok_or(HelperError::LoginsNotFound)
}
