//! Selective replay of a persisted change-set
//!
//! Performs exactly the copy operations a plan specifies, one file at a
//! time, independent of the bulk backend. This is what lets an operator
//! review a dry-run plan, curate it, and replay only the vetted subset.
//! Entries are processed sequentially in plan order; each copy is
//! independent, so one failure never aborts the remaining entries.

use crate::io::logs::append_line;
use crate::models::{ChangeEntry, ChangeSet};
use crate::services::planner::SkipPolicy;
use crate::Result;
use std::fs;
use std::path::{Path, PathBuf};

/// Outcome of one replayed entry.
#[derive(Debug, Clone)]
pub struct ReplayOutcome {
    pub entry: ChangeEntry,
    pub ok: bool,
    pub detail: String,
}

/// Aggregate result of a replay pass.
#[derive(Debug, Default)]
pub struct ReplaySummary {
    pub outcomes: Vec<ReplayOutcome>,
    pub copied: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl ReplaySummary {
    #[must_use]
    pub fn all_ok(&self) -> bool {
        self.failed == 0
    }
}

/// Convert a plan-relative path (either separator convention) into a
/// platform path.
#[must_use]
pub fn rel_to_path(relative: &str) -> PathBuf {
    relative
        .split(['/', '\\'])
        .filter(|c| !c.is_empty() && *c != ".")
        .collect()
}

/// Replay a change-set against its recorded roots.
///
/// Only `NewFile`, `Older`, and `Newer` entries are copied; extras are
/// informational and the replayer never deletes. The skip-policy is
/// re-applied defensively in case the plan file was hand-edited or
/// generated under a different policy. Every entry gets a structured
/// outcome and a line in the transfer log.
pub fn replay(plan: &ChangeSet, skip: &SkipPolicy, log_path: &Path) -> Result<ReplaySummary> {
    let source_root = PathBuf::from(&plan.source);
    let dest_root = PathBuf::from(&plan.destination);
    let mut summary = ReplaySummary::default();

    for entry in &plan.entries {
        if !entry.kind.is_copyable() {
            summary.skipped += 1;
            record(
                &mut summary,
                log_path,
                entry,
                true,
                "informational entry, not copied".to_string(),
            );
            continue;
        }
        if skip.matches(&entry.relative_path) {
            summary.skipped += 1;
            record(
                &mut summary,
                log_path,
                entry,
                true,
                "dropped by skip-policy".to_string(),
            );
            continue;
        }

        let rel = rel_to_path(&entry.relative_path);
        let from = source_root.join(&rel);
        let to = dest_root.join(&rel);

        match copy_one(&from, &to) {
            Ok(bytes) => {
                summary.copied += 1;
                record(
                    &mut summary,
                    log_path,
                    entry,
                    true,
                    format!("copied {bytes} bytes"),
                );
            }
            Err(e) => {
                summary.failed += 1;
                log::warn!("Replay failed for {}: {e}", entry.relative_path);
                record(&mut summary, log_path, entry, false, format!("failed: {e}"));
            }
        }
    }

    log::info!(
        "Replay finished: {} copied, {} failed, {} skipped",
        summary.copied,
        summary.failed,
        summary.skipped
    );
    Ok(summary)
}

fn copy_one(from: &Path, to: &Path) -> std::io::Result<u64> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(from, to)
}

fn record(
    summary: &mut ReplaySummary,
    log_path: &Path,
    entry: &ChangeEntry,
    ok: bool,
    detail: String,
) {
    let status = if ok { "ok" } else { "fail" };
    if let Err(e) = append_line(
        log_path,
        &format!("{status}\t{}\t{detail}", entry.relative_path),
    ) {
        log::warn!("Failed to append replay log line: {e}");
    }
    summary.outcomes.push(ReplayOutcome {
        entry: entry.clone(),
        ok,
        detail,
    });
}
