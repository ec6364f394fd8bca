//! Integration tests for backend invocation and output tee

#![cfg(unix)]

use crate::fixtures::{fake_dry_run_backend, write_script};
use std::collections::BTreeSet;
use tempfile::TempDir;
use wmig::models::{AclMode, TransferMode, TransferSpec, TuningParams, TuningProfile};
use wmig::services::invoker::{build_args, invoke};
use wmig::services::progress::ProgressBoard;

fn spec(mode: TransferMode, tmp: &TempDir) -> TransferSpec {
    TransferSpec {
        source: tmp.path().join("src"),
        destination: tmp.path().join("dst"),
        mode,
        exclude_dirs: BTreeSet::from(["OneDrive".to_string()]),
        exclude_files: BTreeSet::from(["~$*".to_string()]),
        acl_mode: AclMode::Inherit,
        tuning: TuningParams {
            thread_count: 32,
            inter_packet_gap_ms: 5,
            profile: TuningProfile::Balanced,
        },
        mirror_confirmed: false,
    }
}

#[test]
fn test_argument_vector_covers_the_backend_contract() {
    let tmp = TempDir::new().unwrap();
    let log_path = tmp.path().join("t.log");
    let args = build_args(&spec(TransferMode::BulkCopy, &tmp), &log_path);

    for expected in ["/E", "/Z", "/V", "/TEE", "/XJ", "/R:2", "/W:2", "/MT:32", "/IPG:5"] {
        assert!(args.contains(&expected.to_string()), "missing {expected} in {args:?}");
    }
    assert!(args.contains(&"/COPY:DAT".to_string()));
    assert!(args.contains(&"/XD".to_string()));
    assert!(args.contains(&"OneDrive".to_string()));
    assert!(args.contains(&"/XF".to_string()));
    assert!(args.contains(&"~$*".to_string()));
    assert!(args.iter().any(|a| a.starts_with("/LOG:")));
    assert!(!args.contains(&"/L".to_string()));
    assert!(!args.contains(&"/MIR".to_string()));
}

#[test]
fn test_mode_and_acl_flags() {
    let tmp = TempDir::new().unwrap();
    let log_path = tmp.path().join("t.log");

    let dry = build_args(&spec(TransferMode::DryRun, &tmp), &log_path);
    assert!(dry.contains(&"/L".to_string()));

    let mut mirror_spec = spec(TransferMode::Mirror, &tmp);
    mirror_spec.mirror_confirmed = true;
    let mirror = build_args(&mirror_spec, &log_path);
    assert!(mirror.contains(&"/MIR".to_string()));

    let mut preserve_spec = spec(TransferMode::BulkCopy, &tmp);
    preserve_spec.acl_mode = AclMode::Preserve;
    let preserve = build_args(&preserve_spec, &log_path);
    assert!(preserve.contains(&"/COPYALL".to_string()));

    let mut no_gap = spec(TransferMode::BulkCopy, &tmp);
    no_gap.tuning.inter_packet_gap_ms = 0;
    let args = build_args(&no_gap, &log_path);
    assert!(!args.iter().any(|a| a.starts_with("/IPG")));
}

#[test]
fn test_output_is_teed_to_log_and_captured() {
    let tmp = TempDir::new().unwrap();
    let backend = fake_dry_run_backend(tmp.path(), &["line one", "line two"], 3);
    let board = ProgressBoard::new();
    let log_path = tmp.path().join("logs/tee.log");

    let run = invoke(
        &backend.to_string_lossy(),
        &spec(TransferMode::BulkCopy, &tmp),
        "tee-test",
        &log_path,
        &board,
        true,
    )
    .unwrap();

    assert_eq!(run.result.exit_code, 3);
    assert_eq!(run.lines, ["line one", "line two"]);

    // Log is independently readable and contains the streamed lines.
    let log = std::fs::read_to_string(&log_path).unwrap();
    assert!(log.contains("line one"));
    assert!(log.contains("line two"));

    // Completion was published to the progress board.
    assert_eq!(board.get("tee-test"), Some(100));
}

#[test]
fn test_stderr_diagnostics_land_in_the_transfer_log() {
    let tmp = TempDir::new().unwrap();
    let backend = write_script(
        tmp.path(),
        "noisy-backend.sh",
        "echo 'progress line'\necho 'invalid flag combination' >&2\nexit 9\n",
    )
    .unwrap();
    let board = ProgressBoard::new();
    let log_path = tmp.path().join("logs/noisy.log");

    let run = invoke(
        &backend.to_string_lossy(),
        &spec(TransferMode::BulkCopy, &tmp),
        "noisy",
        &log_path,
        &board,
        true,
    )
    .unwrap();

    assert_eq!(run.result.exit_code, 9);
    let log = std::fs::read_to_string(&log_path).unwrap();
    assert!(log.contains("progress line"));
    assert!(
        log.contains("invalid flag combination"),
        "stderr diagnostics must survive in the log: {log:?}"
    );
}

#[test]
fn test_missing_backend_is_a_precondition_error() {
    let tmp = TempDir::new().unwrap();
    let board = ProgressBoard::new();
    let err = invoke(
        "/nonexistent/backend-binary",
        &spec(TransferMode::BulkCopy, &tmp),
        "missing",
        &tmp.path().join("m.log"),
        &board,
        true,
    )
    .unwrap_err();
    assert!(matches!(err, wmig::Error::Io(_)), "got {err:?}");
}

#[test]
fn test_fatal_exit_code_is_reported_not_masked() {
    let tmp = TempDir::new().unwrap();
    let backend = write_script(tmp.path(), "fatal.sh", "exit 9\n").unwrap();
    let board = ProgressBoard::new();

    let run = invoke(
        &backend.to_string_lossy(),
        &spec(TransferMode::BulkCopy, &tmp),
        "fatal",
        &tmp.path().join("f.log"),
        &board,
        true,
    )
    .unwrap();
    assert_eq!(run.result.exit_code, 9);
    assert!(wmig::services::exit_code::is_fatal(run.result.exit_code));
}
