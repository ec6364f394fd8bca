//! Dry-run planner and differ
//!
//! Runs the backend in list-only mode and parses its per-file
//! classification lines into a structured change-set. The line grammar is
//! fixed: `<Classification> <SizeOrBlank> <Path>` with classification one
//! of `New File`, `Older`, `Newer`, `Extra File`, `Extra Dir`. Anything
//! else is a banner or structural line and is ignored. Entries matching
//! the standing skip-policy are dropped here, at generation time: the
//! persisted plan is authoritative and is never filtered later.

use crate::io::logs;
use crate::models::{
    ChangeEntry, ChangeKind, ChangeSet, TransferMode, TransferSpec, TuningParams, TuningProfile,
};
use crate::services::{exit_code, invoker, progress::ProgressBoard};
use crate::{Error, Result};
use std::collections::BTreeSet;
use std::path::Path;

/// Standing exclusion policy for cloud-sync placeholder content.
///
/// Placeholder files inside cloud-sync folders hydrate on read; copying
/// them would pull the full cloud store through the migration link, so they
/// are excluded from plans and replays outright.
#[derive(Debug, Clone)]
pub struct SkipPolicy {
    /// Path components that mark a cloud-sync tree (case-insensitive
    /// substring match against each component).
    pub dir_markers: Vec<String>,
    /// File name patterns to drop (`*.ext`, `prefix*`, or exact name).
    pub file_patterns: Vec<String>,
}

impl Default for SkipPolicy {
    fn default() -> Self {
        Self {
            dir_markers: vec![
                "OneDrive".to_string(),
                "Dropbox".to_string(),
                "Google Drive".to_string(),
            ],
            file_patterns: vec![
                "~$*".to_string(),
                "*.crdownload".to_string(),
                "*.partial".to_string(),
            ],
        }
    }
}

impl SkipPolicy {
    /// An empty policy that skips nothing.
    #[must_use]
    pub fn none() -> Self {
        Self {
            dir_markers: Vec::new(),
            file_patterns: Vec::new(),
        }
    }

    /// Whether a relative path matches the policy and must be omitted.
    #[must_use]
    pub fn matches(&self, relative_path: &str) -> bool {
        let components: Vec<&str> = relative_path
            .split(['/', '\\'])
            .filter(|c| !c.is_empty())
            .collect();

        for component in &components {
            let lower = component.to_ascii_lowercase();
            if self
                .dir_markers
                .iter()
                .any(|m| lower.contains(&m.to_ascii_lowercase()))
            {
                return true;
            }
        }

        if let Some(name) = components.last() {
            return self
                .file_patterns
                .iter()
                .any(|p| pattern_matches(p, name));
        }
        false
    }
}

/// Minimal glob support: `*.ext` suffix, `prefix*`, `*infix*`, exact.
fn pattern_matches(pattern: &str, name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    let pattern = pattern.to_ascii_lowercase();
    match (pattern.strip_prefix('*'), pattern.strip_suffix('*')) {
        (Some(suffix), None) => name.ends_with(suffix),
        (None, Some(prefix)) => name.starts_with(prefix),
        (Some(_), Some(_)) => {
            let infix = &pattern[1..pattern.len() - 1];
            !infix.is_empty() && name.contains(infix)
        }
        (None, None) => name == pattern,
    }
}

const CLASSIFICATIONS: [(&str, ChangeKind); 5] = [
    ("New File", ChangeKind::NewFile),
    ("Older", ChangeKind::Older),
    ("Newer", ChangeKind::Newer),
    ("Extra File", ChangeKind::ExtraFile),
    ("Extra Dir", ChangeKind::ExtraDir),
];

/// Parse one backend output line against the classification grammar.
///
/// Returns `None` for banner, header, and summary lines, which is the
/// normal case for most of the backend's verbose output.
#[must_use]
pub fn parse_line(line: &str) -> Option<ChangeEntry> {
    let trimmed = line.trim_start();
    // The backend marks extras with a leading asterisk in some versions.
    let trimmed = trimmed.strip_prefix('*').unwrap_or(trimmed).trim_start();

    for (token, kind) in CLASSIFICATIONS {
        if let Some(rest) = strip_token(trimmed, token) {
            let rest = rest.trim_start();
            // Optional size column, then the path remainder.
            let (size_hint, path) = match rest.split_whitespace().next() {
                Some(first) if first.chars().all(|c| c.is_ascii_digit()) => {
                    let size = first.parse::<u64>().unwrap_or(0);
                    let path = rest[first.len()..].trim();
                    (size, path)
                }
                _ => (0, rest.trim()),
            };
            if path.is_empty() {
                return None;
            }
            return Some(ChangeEntry {
                kind,
                size_hint,
                relative_path: path.to_string(),
            });
        }
    }
    None
}

/// Strip a classification token followed by whitespace, case-insensitively.
fn strip_token<'a>(line: &'a str, token: &str) -> Option<&'a str> {
    if line.len() < token.len() {
        return None;
    }
    let (head, rest) = line.split_at(token.len());
    if head.eq_ignore_ascii_case(token) && rest.starts_with(char::is_whitespace) {
        Some(rest)
    } else {
        None
    }
}

/// Parse raw backend output into change entries, applying the skip-policy
/// and relativizing paths against the transfer roots.
#[must_use]
pub fn parse_output(
    lines: &[String],
    source: &Path,
    destination: &Path,
    skip: &SkipPolicy,
) -> Vec<ChangeEntry> {
    lines
        .iter()
        .filter_map(|line| parse_line(line))
        .map(|mut entry| {
            entry.relative_path = relativize(&entry.relative_path, source, destination);
            entry
        })
        .filter(|entry| {
            if skip.matches(&entry.relative_path) {
                log::debug!("Skip-policy dropped {}", entry.relative_path);
                false
            } else {
                true
            }
        })
        .collect()
}

/// Strip the source or destination root prefix from a backend-reported
/// path, leaving a relative path resolvable against both roots. The match
/// must end at a separator so a root like `/src` never swallows a sibling
/// such as `/srcfoo`.
fn relativize(path: &str, source: &Path, destination: &Path) -> String {
    for root in [source, destination] {
        let root = root.to_string_lossy();
        if let Some(rest) = path.strip_prefix(root.as_ref()) {
            if rest.is_empty() || rest.starts_with(['/', '\\']) {
                return rest.trim_start_matches(['/', '\\']).to_string();
            }
        }
    }
    path.to_string()
}

/// Run a list-only backend pass and build the authoritative change-set.
///
/// A fatal backend exit surfaces as an error rather than a silently partial
/// plan; a genuinely empty diff yields a valid zero-entry plan.
pub fn plan(
    backend: &str,
    source: &Path,
    destination: &Path,
    exclude_dirs: &BTreeSet<String>,
    exclude_files: &BTreeSet<String>,
    skip: &SkipPolicy,
    tuning: TuningParams,
    log_path: &Path,
    board: &ProgressBoard,
    quiet: bool,
) -> Result<ChangeSet> {
    let spec = TransferSpec {
        source: source.to_path_buf(),
        destination: destination.to_path_buf(),
        mode: TransferMode::DryRun,
        exclude_dirs: exclude_dirs.clone(),
        exclude_files: exclude_files.clone(),
        acl_mode: Default::default(),
        tuning,
        mirror_confirmed: false,
    };

    let run = invoker::invoke(backend, &spec, "dry-run", log_path, board, quiet)?;
    if exit_code::is_fatal(run.result.exit_code) {
        return Err(Error::Backend {
            code: run.result.exit_code,
            context: format!(
                "dry-run against {} failed; no plan produced (raw output in {})",
                destination.display(),
                log_path.display()
            ),
        });
    }

    let entries = parse_output(&run.lines, source, destination, skip);
    log::info!(
        "Dry-run plan: {} entries ({} raw lines)",
        entries.len(),
        run.lines.len()
    );

    Ok(ChangeSet {
        source: source.to_string_lossy().into_owned(),
        destination: destination.to_string_lossy().into_owned(),
        generated_at: logs::now_rfc3339(),
        entries,
    })
}

/// Default tuning used when a caller plans outside a sequencer session.
#[must_use]
pub fn default_plan_tuning() -> TuningParams {
    TuningParams {
        thread_count: 16,
        inter_packet_gap_ms: 0,
        profile: TuningProfile::Auto,
    }
}
