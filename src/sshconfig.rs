// ABOUTME: Keeps a `tsh config` block in the user's OpenSSH config file up to date
// ABOUTME: Only the text between the managed markers is ever rewritten

use crate::editor::write_backup;
use anyhow::{Context, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const BEGIN_MARKER: &str = "# BEGIN tsh-helper managed block";
pub const END_MARKER: &str = "# END tsh-helper managed block";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Unchanged,
    Written {
        hosts: Vec<String>,
        backup: Option<PathBuf>,
    },
}

/// Replace the managed block in `existing` with `generated`, or append one.
/// A begin marker without a matching end marker is an error.
pub fn merge_block(existing: &str, generated: &str) -> Result<String> {
    let block = format!("{BEGIN_MARKER}\n{}\n{END_MARKER}\n", generated.trim_end());

    if let Some(begin) = existing.find(BEGIN_MARKER) {
        let body = begin + BEGIN_MARKER.len();
        let Some(offset) = existing[body..].find(END_MARKER) else {
            anyhow::bail!("found `{BEGIN_MARKER}` without a matching `{END_MARKER}`");
        };
        let mut after = body + offset + END_MARKER.len();
        if existing[after..].starts_with('\n') {
            after += 1;
        }
        return Ok(format!("{}{}{}", &existing[..begin], block, &existing[after..]));
    }

    Ok(if existing.is_empty() {
        block
    } else if existing.ends_with('\n') {
        format!("{existing}\n{block}")
    } else {
        format!("{existing}\n\n{block}")
    })
}

/// Concrete `Host` patterns declared in generated config. Wildcard patterns are skipped.
pub fn host_patterns(config: &str) -> Vec<String> {
    let mut hosts = Vec::new();
    for line in config.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut parts = line.split_whitespace();
        let Some(key) = parts.next() else { continue };
        if !key.eq_ignore_ascii_case("host") {
            continue;
        }
        for pattern in parts {
            if !pattern.contains('*') && !pattern.contains('?') && !pattern.starts_with('!') {
                hosts.push(pattern.to_string());
            }
        }
    }
    hosts
}

pub fn sync(path: &Path, generated: &str) -> Result<SyncOutcome> {
    let existing = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
        Err(e) => {
            return Err(e)
                .with_context(|| format!("Failed to read SSH config: {}", path.display()));
        }
    };

    let merged = merge_block(&existing, generated)
        .with_context(|| format!("Refusing to rewrite SSH config: {}", path.display()))?;
    if merged == existing {
        return Ok(SyncOutcome::Unchanged);
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let backup = if existing.is_empty() {
        None
    } else {
        write_backup(path, existing.as_bytes())
    };

    fs::write(path, merged)
        .with_context(|| format!("Failed to write SSH config: {}", path.display()))?;

    Ok(SyncOutcome::Written {
        hosts: host_patterns(generated),
        backup,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::backup_path;
    use tempfile::TempDir;

    const GENERATED: &str = "# Begin generated Teleport configuration for teleport.example.com
Host *.main teleport.example.com
    UserKnownHostsFile \"/home/alice/.tsh/known_hosts\"
    IdentityFile \"/home/alice/.tsh/keys/teleport.example.com/alice\"

Host *.main !teleport.example.com
    Port 3022
    ProxyCommand \"/usr/local/bin/tsh\" proxy ssh --cluster=main --proxy=teleport.example.com:443 %r@%h:%p
# End generated Teleport configuration
";

    #[test]
    fn test_merge_into_empty_file() {
        let merged = merge_block("", "Host a\n").unwrap();
        assert_eq!(merged, format!("{BEGIN_MARKER}\nHost a\n{END_MARKER}\n"));
    }

    #[test]
    fn test_merge_appends_after_user_content() {
        let merged = merge_block("Host personal\n    User me\n", "Host a\n").unwrap();
        assert!(merged.starts_with("Host personal\n    User me\n\n# BEGIN"));
        assert!(merged.ends_with(&format!("{END_MARKER}\n")));
    }

    #[test]
    fn test_merge_replaces_existing_block() {
        let existing =
            format!("Host before\n{BEGIN_MARKER}\nHost old\n{END_MARKER}\nHost after\n");
        let merged = merge_block(&existing, "Host new\n").unwrap();
        assert_eq!(
            merged,
            format!("Host before\n{BEGIN_MARKER}\nHost new\n{END_MARKER}\nHost after\n")
        );
    }

    #[test]
    fn test_merge_is_idempotent() {
        let once = merge_block("Host personal\n", GENERATED).unwrap();
        assert_eq!(merge_block(&once, GENERATED).unwrap(), once);
    }

    #[test]
    fn test_unterminated_block_is_rejected() {
        let existing = format!("Host a\n{BEGIN_MARKER}\nHost precious\n    User me\n");
        let err = merge_block(&existing, "Host gen\n").unwrap_err();
        assert!(err.to_string().contains("without a matching"));
    }

    #[test]
    fn test_end_marker_is_paired_with_following_begin() {
        let existing = format!(
            "{END_MARKER}\nHost precious\n    User me\n{BEGIN_MARKER}\nHost old\n{END_MARKER}\n"
        );
        let merged = merge_block(&existing, "Host gen\n").unwrap();
        assert_eq!(
            merged,
            format!("{END_MARKER}\nHost precious\n    User me\n{BEGIN_MARKER}\nHost gen\n{END_MARKER}\n")
        );
    }

    #[test]
    fn test_sync_leaves_unterminated_file_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config");
        let original = format!("Host a\n{BEGIN_MARKER}\nHost precious\n    User me\n");
        fs::write(&path, &original).unwrap();

        let err = sync(&path, GENERATED).unwrap_err();

        assert!(format!("{err:#}").contains(&path.display().to_string()));
        assert_eq!(fs::read_to_string(&path).unwrap(), original);
        assert!(!backup_path(&path).exists());
    }

    #[test]
    fn test_host_patterns_skip_wildcards_and_negations() {
        assert_eq!(host_patterns(GENERATED), vec!["teleport.example.com"]);
    }

    #[test]
    fn test_sync_creates_file_and_directory() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".ssh").join("config");

        let outcome = sync(&path, GENERATED).unwrap();

        assert!(matches!(outcome, SyncOutcome::Written { backup: None, .. }));
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("ProxyCommand"));
        assert!(content.starts_with(BEGIN_MARKER));
    }

    #[test]
    fn test_sync_backs_up_and_preserves_user_content() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config");
        fs::write(&path, "Host personal\n    User me\n").unwrap();

        let outcome = sync(&path, GENERATED).unwrap();

        match outcome {
            SyncOutcome::Written { backup, .. } => assert_eq!(backup, Some(backup_path(&path))),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(
            fs::read_to_string(backup_path(&path)).unwrap(),
            "Host personal\n    User me\n"
        );
        assert!(fs::read_to_string(&path).unwrap().starts_with("Host personal"));
    }

    #[test]
    fn test_sync_unchanged_does_not_write() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config");

        sync(&path, GENERATED).unwrap();
        let outcome = sync(&path, GENERATED).unwrap();

        assert_eq!(outcome, SyncOutcome::Unchanged);
        assert!(!backup_path(&path).exists());
    }
}
