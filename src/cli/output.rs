//! Output formatting for CLI

use crate::models::{CaptureManifest, ChangeKind, ChangeSet, InventoryReport, StageRun};
use crate::services::replay::ReplaySummary;

/// Format a byte count with a binary-unit suffix.
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

/// Render the session audit trail as short status lines.
pub fn print_stage_runs(runs: &[StageRun]) {
    for run in runs {
        println!("[{}] {}: {}", run.status, run.stage, run.detail);
    }
}

/// Render the inventory report as a human-readable table.
pub fn print_inventory(report: &InventoryReport) {
    println!("Inventory of {} ({})", report.source_root, report.generated_at);
    println!("{:<24} {:>12} {:>10} {:>8}", "PROFILE", "SIZE", "FILES", "DIRS");
    for usage in &report.profiles {
        println!(
            "{:<24} {:>12} {:>10} {:>8}",
            usage.profile,
            format_size(usage.size_bytes),
            usage.file_count,
            usage.dir_count
        );
    }
}

/// Render a summary of a generated or loaded plan.
pub fn print_plan_summary(plan: &ChangeSet) {
    let mut new_files = 0usize;
    let mut updates = 0usize;
    let mut extras = 0usize;
    let mut bytes = 0u64;
    for entry in &plan.entries {
        match entry.kind {
            ChangeKind::NewFile => new_files += 1,
            ChangeKind::Older | ChangeKind::Newer => updates += 1,
            ChangeKind::ExtraFile | ChangeKind::ExtraDir => extras += 1,
        }
        if entry.kind.is_copyable() {
            bytes += entry.size_hint;
        }
    }
    println!(
        "Plan {} -> {} ({}): {} entries",
        plan.source,
        plan.destination,
        plan.generated_at,
        plan.entries.len()
    );
    println!(
        "  {new_files} new, {updates} updated, {extras} extra (informational), ~{} to copy",
        format_size(bytes)
    );
}

/// Render replay results.
pub fn print_replay_summary(summary: &ReplaySummary) {
    println!(
        "Replay: {} copied, {} failed, {} skipped",
        summary.copied, summary.failed, summary.skipped
    );
    for outcome in summary.outcomes.iter().filter(|o| !o.ok) {
        println!("  FAILED {}: {}", outcome.entry.relative_path, outcome.detail);
    }
}

/// Render a capture manifest.
pub fn print_manifest(manifest: &CaptureManifest) {
    println!(
        "Capture manifest v{} from {} ({})",
        manifest.version, manifest.source_computer, manifest.generated_at
    );
    for identity in &manifest.identities {
        println!("  {identity}");
    }
}
