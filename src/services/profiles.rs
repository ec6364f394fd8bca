//! Parallel per-profile copy fan-out
//!
//! Launches one bulk-copy invocation per user profile on a bounded rayon
//! pool. Each run is isolated: a fatal exit in one profile's copy never
//! cancels or blocks siblings already running or queued. Per-profile
//! progress is published under a `stage:profile` label so observers can
//! tell individual profiles apart from aggregate stage progress.

use crate::io::logs;
use crate::models::{StageStatus, TransferResult, TransferSpec};
use crate::services::{exit_code, invoker, progress::ProgressBoard};
use crate::{Error, Result};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;

/// Aggregate outcome of one parallel profile copy pass.
#[derive(Debug)]
pub struct ProfileCopyReport {
    /// Per-profile results in profile order; `Err` means the invocation
    /// itself failed (backend missing, spawn failure), distinct from a
    /// fatal exit code.
    pub results: BTreeMap<String, Result<TransferResult>>,
    pub status: StageStatus,
    pub detail: String,
}

/// Copy each profile concurrently, bounded by `concurrency_limit`.
///
/// `make_spec` builds the immutable per-profile transfer spec; profiles
/// beyond the limit queue and start as pool slots free.
pub fn copy_profiles_concurrently<F>(
    backend: &str,
    profiles: &[String],
    make_spec: F,
    stage_label: &str,
    log_dir: &Path,
    concurrency_limit: usize,
    board: &ProgressBoard,
    quiet: bool,
) -> Result<ProfileCopyReport>
where
    F: Fn(&str) -> TransferSpec + Sync,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(concurrency_limit.max(1))
        .build()
        .map_err(|e| Error::System(format!("Failed to build worker pool: {e}")))?;

    let results: BTreeMap<String, Result<TransferResult>> = pool.install(|| {
        profiles
            .par_iter()
            .map(|profile| {
                let label = format!("{stage_label}:{profile}");
                let spec = make_spec(profile);
                let log_path = logs::transfer_log_path(log_dir, &label);
                let outcome = invoker::invoke(backend, &spec, &label, &log_path, board, quiet)
                    .map(|run| run.result);
                (profile.clone(), outcome)
            })
            .collect()
    });

    let failing: Vec<&str> = results
        .iter()
        .filter(|(_, outcome)| match outcome {
            Ok(result) => exit_code::is_fatal(result.exit_code),
            Err(_) => true,
        })
        .map(|(profile, _)| profile.as_str())
        .collect();

    let (status, detail) = if failing.is_empty() {
        (
            StageStatus::Ok,
            format!("{} profile(s) copied", results.len()),
        )
    } else {
        (
            StageStatus::Warn,
            format!(
                "{} of {} profile(s) failed: {}",
                failing.len(),
                results.len(),
                failing.join(", ")
            ),
        )
    };

    Ok(ProfileCopyReport {
        results,
        status,
        detail,
    })
}
