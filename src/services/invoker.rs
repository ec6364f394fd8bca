//! Bulk-copy backend invocation
//!
//! Translates a `TransferSpec` into the backend's flag vocabulary and runs
//! the backend as a child process, teeing its stdout live to the console
//! and to the per-transfer log file while also retaining the lines for the
//! dry-run parser. Per-file retries for transient errors are delegated to
//! the backend itself via a small retry count and short wait; orchestration
//! level retry decisions belong to the stage sequencer.

use crate::io::logs::{self, append_line};
use crate::models::{AclMode, TransferMode, TransferResult, TransferSpec};
use crate::services::progress::ProgressBoard;
use crate::{Error, Result};
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;

/// Per-file retry count delegated to the backend.
const RETRY_COUNT: u32 = 2;
/// Seconds the backend waits between per-file retries.
const RETRY_WAIT_SECS: u32 = 2;

/// Exit code substituted when the child was terminated by a signal and
/// reported no code. Operator-initiated kills are indistinguishable from a
/// crash at this layer, so both land in fatal territory.
const KILLED_EXIT_CODE: i32 = 16;

/// Result of one backend invocation plus the captured output lines.
#[derive(Debug)]
pub struct TransferRun {
    pub result: TransferResult,
    pub lines: Vec<String>,
}

/// Build the backend argument vector for one transfer.
///
/// Every invocation requests subdirectory recursion, restartable transfer
/// mode, verbose output mirrored to console and log, and junction exclusion
/// so reparse points never lead the backend into loops or foreign volumes.
#[must_use]
pub fn build_args(spec: &TransferSpec, log_path: &Path) -> Vec<String> {
    let mut args = vec![
        spec.source.to_string_lossy().into_owned(),
        spec.destination.to_string_lossy().into_owned(),
        "/E".to_string(),
        "/Z".to_string(),
        "/V".to_string(),
        "/TEE".to_string(),
        "/XJ".to_string(),
        format!("/R:{RETRY_COUNT}"),
        format!("/W:{RETRY_WAIT_SECS}"),
        format!("/MT:{}", spec.tuning.thread_count),
    ];

    if spec.tuning.inter_packet_gap_ms > 0 {
        args.push(format!("/IPG:{}", spec.tuning.inter_packet_gap_ms));
    }

    match spec.mode {
        TransferMode::DryRun => args.push("/L".to_string()),
        TransferMode::Mirror => args.push("/MIR".to_string()),
        // Plain and delta passes copy recursively and never delete; the
        // delta pass relies on the backend skipping up-to-date files.
        TransferMode::BulkCopy | TransferMode::Delta => {}
    }

    match spec.acl_mode {
        AclMode::Preserve => args.push("/COPYALL".to_string()),
        AclMode::Inherit => args.push("/COPY:DAT".to_string()),
    }

    if !spec.exclude_dirs.is_empty() {
        args.push("/XD".to_string());
        args.extend(spec.exclude_dirs.iter().cloned());
    }
    if !spec.exclude_files.is_empty() {
        args.push("/XF".to_string());
        args.extend(spec.exclude_files.iter().cloned());
    }

    args.push(format!("/LOG:{}", log_path.display()));
    args
}

/// Run an external program, streaming its stdout line by line to the
/// console (unless `quiet`) and appending every line to `log_path` while
/// the process runs, so an operator can watch a long transfer live and tail
/// the log independently. Stderr lines are mirrored to the console's error
/// stream and appended to the same log, so backend usage errors survive in
/// the transfer record. Returns the exit code and the captured stdout lines.
pub fn run_streaming(
    program: &str,
    args: &[String],
    log_path: &Path,
    quiet: bool,
) -> Result<(i32, Vec<String>)> {
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    log::debug!("Spawning {program} {}", args.join(" "));
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    // Drain stdout on a dedicated thread so the child never stalls on a
    // full pipe buffer while the parent waits.
    let stdout = child.stdout.take().ok_or_else(|| {
        Error::System(format!("Failed to capture stdout of {program}"))
    })?;
    let log_path_owned = log_path.to_path_buf();
    let drain = thread::spawn(move || -> std::io::Result<Vec<String>> {
        let reader = BufReader::new(stdout);
        let mut lines = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if !quiet {
                println!("{line}");
            }
            append_line(&log_path_owned, &line)?;
            lines.push(line);
        }
        Ok(lines)
    });

    let stderr = child.stderr.take().ok_or_else(|| {
        Error::System(format!("Failed to capture stderr of {program}"))
    })?;
    let err_log_path = log_path.to_path_buf();
    let err_drain = thread::spawn(move || -> std::io::Result<()> {
        let reader = BufReader::new(stderr);
        for line in reader.lines() {
            let line = line?;
            if !quiet {
                eprintln!("{line}");
            }
            append_line(&err_log_path, &line)?;
        }
        Ok(())
    });

    let status = child.wait()?;
    let lines = drain
        .join()
        .map_err(|_| Error::System(format!("Output drain thread for {program} panicked")))??;
    err_drain
        .join()
        .map_err(|_| Error::System(format!("Stderr drain thread for {program} panicked")))??;

    let code = status.code().unwrap_or(KILLED_EXIT_CODE);
    Ok((code, lines))
}

/// Execute one transfer against the bulk-copy backend.
///
/// Mirror mode is the only mode permitted to delete, and it is rejected
/// before any backend invocation unless the spec carries the operator's
/// explicit confirmation.
pub fn invoke(
    backend: &str,
    spec: &TransferSpec,
    label: &str,
    log_path: &Path,
    board: &ProgressBoard,
    quiet: bool,
) -> Result<TransferRun> {
    if spec.mode == TransferMode::Mirror && !spec.mirror_confirmed {
        return Err(Error::Policy(format!(
            "Mirror mode deletes destination extras under {}; refusing without explicit confirmation",
            spec.destination.display()
        )));
    }

    let args = build_args(spec, log_path);
    let started_at = logs::now_rfc3339();
    board.set(label, 0);

    log::info!(
        "Transfer {label}: {} -> {} ({}, {} threads)",
        spec.source.display(),
        spec.destination.display(),
        spec.mode,
        spec.tuning.thread_count
    );

    let (exit_code, lines) = run_streaming(backend, &args, log_path, quiet)?;
    let finished_at = logs::now_rfc3339();
    board.set(label, 100);

    log::info!(
        "Transfer {label} finished with exit code {exit_code}: {}",
        super::exit_code::decode(exit_code)
    );

    Ok(TransferRun {
        result: TransferResult {
            label: label.to_string(),
            exit_code,
            log_path: log_path.to_string_lossy().into_owned(),
            started_at,
            finished_at,
        },
        lines,
    })
}
