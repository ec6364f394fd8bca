//! State-capture and state-restore collaborator invocation
//!
//! The user-state tools are external executables invoked once per identity
//! (or with an all-identities sentinel) against a shared store path. Their
//! output is streamed and logged through the same tee machinery as the
//! bulk-copy backend. Non-zero capture exits are per-identity warnings;
//! restore failures are fatal to the cutover stage.

use crate::io::logs::append_line;
use crate::services::invoker::run_streaming;
use crate::services::planner::SkipPolicy;
use crate::Result;
use std::path::{Path, PathBuf};

/// Sentinel identity meaning "capture or restore every local profile".
pub const ALL_IDENTITIES: &str = "/all";

/// Default include-rule files expected next to the capture tool.
pub const INCLUDE_RULE_FILES: [&str; 2] = ["miguser.xml", "migapp.xml"];

/// Name of the generated exclude-rule file inside the store.
pub const EXCLUDE_RULES_FILE: &str = "wmig-exclude.rules";

/// Options shared by capture invocations.
#[derive(Debug, Clone, Default)]
pub struct CaptureOptions {
    /// Use snapshot-consistent capture where the tool supports it.
    pub snapshot_consistent: bool,
    /// Optional encryption key.
    pub key: Option<String>,
    /// Only capture identities active within the last N days.
    pub active_within_days: Option<u32>,
}

/// Options for a restore invocation.
#[derive(Debug, Clone, Default)]
pub struct RestoreOptions {
    /// Identity remapping pairs, `oldIdentity=newIdentity`.
    pub remap_pairs: Vec<String>,
    /// Decryption key matching the capture key.
    pub key: Option<String>,
}

/// Generate the exclude-rule file the capture tool consumes, one pattern
/// per line, derived from the standing skip-policy.
pub fn write_exclude_rules(store: &Path, skip: &SkipPolicy) -> Result<PathBuf> {
    std::fs::create_dir_all(store)?;
    let path = store.join(EXCLUDE_RULES_FILE);
    // Truncate any previous session's rules.
    std::fs::write(&path, "")?;
    for marker in &skip.dir_markers {
        append_line(&path, &format!("excludeDir={marker}"))?;
    }
    for pattern in &skip.file_patterns {
        append_line(&path, &format!("excludeFile={pattern}"))?;
    }
    Ok(path)
}

/// Capture one identity into the store. Returns the tool's exit code; the
/// caller decides whether a non-zero exit warns or aborts.
pub fn capture_identity(
    program: &str,
    store: &Path,
    identity: &str,
    exclude_rules: &Path,
    opts: &CaptureOptions,
    log_path: &Path,
    quiet: bool,
) -> Result<i32> {
    let mut args = vec![store.to_string_lossy().into_owned()];
    for rules in INCLUDE_RULE_FILES {
        args.push(format!("/i:{rules}"));
    }
    args.push(format!("/x:{}", exclude_rules.display()));
    if identity == ALL_IDENTITIES {
        args.push(ALL_IDENTITIES.to_string());
    } else {
        args.push(format!("/ui:{identity}"));
    }
    if opts.snapshot_consistent {
        args.push("/vsc".to_string());
    }
    if let Some(days) = opts.active_within_days {
        args.push(format!("/uel:{days}"));
    }
    if let Some(key) = &opts.key {
        args.push("/encrypt".to_string());
        args.push(format!("/key:{key}"));
    }

    log::info!("Capturing state for {identity}");
    let (code, _) = run_streaming(program, &args, log_path, quiet)?;
    Ok(code)
}

/// Restore the identities recorded in the capture manifest.
pub fn restore_identities(
    program: &str,
    store: &Path,
    identities: &[String],
    opts: &RestoreOptions,
    log_path: &Path,
    quiet: bool,
) -> Result<i32> {
    let mut args = vec![store.to_string_lossy().into_owned()];
    for rules in INCLUDE_RULE_FILES {
        args.push(format!("/i:{rules}"));
    }
    for identity in identities {
        if identity == ALL_IDENTITIES {
            args.push(ALL_IDENTITIES.to_string());
        } else if let Some(filter) = identity.strip_prefix("/ui:") {
            args.push(format!("/ui:{filter}"));
        } else {
            args.push(format!("/ui:{identity}"));
        }
    }
    for pair in &opts.remap_pairs {
        if let Some((old, new)) = pair.split_once('=') {
            args.push(format!("/mu:{old}:{new}"));
        } else {
            log::warn!("Ignoring malformed remap pair '{pair}' (expected old=new)");
        }
    }
    if let Some(key) = &opts.key {
        args.push("/decrypt".to_string());
        args.push(format!("/key:{key}"));
    }

    log::info!("Restoring state for {} identities", identities.len());
    let (code, _) = run_streaming(program, &args, log_path, quiet)?;
    Ok(code)
}
