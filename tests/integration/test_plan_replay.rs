//! Dry-run plan round trip: plan -> persist -> selective replay

#![cfg(unix)]

use crate::fixtures::{fake_dry_run_backend, write_file_sync, write_script};
use std::collections::BTreeSet;
use tempfile::TempDir;
use wmig::io::plan::{read_plan, write_plan};
use wmig::models::ChangeKind;
use wmig::services::planner::{self, SkipPolicy};
use wmig::services::progress::ProgressBoard;
use wmig::services::replay::replay;

#[test]
fn test_dry_run_round_trip_copies_the_planned_file() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("src");
    let dest = tmp.path().join("dst");
    write_file_sync(source.join("a.txt"), b"hello").unwrap();
    std::fs::create_dir_all(&dest).unwrap();

    // Backend reports exactly the one new file, exit 1 (files would copy).
    let backend = fake_dry_run_backend(tmp.path(), &["   New File    5   a.txt"], 1);
    let board = ProgressBoard::new();

    let plan = planner::plan(
        &backend.to_string_lossy(),
        &source,
        &dest,
        &BTreeSet::new(),
        &BTreeSet::new(),
        &SkipPolicy::default(),
        planner::default_plan_tuning(),
        &tmp.path().join("plan.log"),
        &board,
        true,
    )
    .unwrap();

    assert_eq!(plan.entries.len(), 1);
    assert_eq!(plan.entries[0].kind, ChangeKind::NewFile);
    assert_eq!(plan.entries[0].relative_path, "a.txt");

    // Persist and reload: the plan file is the contract.
    let plan_path = tmp.path().join("delta.json");
    write_plan(&plan_path, &plan).unwrap();
    let loaded = read_plan(&plan_path).unwrap();

    let summary = replay(&loaded, &SkipPolicy::default(), &tmp.path().join("replay.log")).unwrap();
    assert_eq!(summary.copied, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(std::fs::read(dest.join("a.txt")).unwrap(), b"hello");
}

#[test]
fn test_planner_drops_skip_policy_paths_at_generation_time() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("src");
    let dest = tmp.path().join("dst");
    std::fs::create_dir_all(&source).unwrap();
    std::fs::create_dir_all(&dest).unwrap();

    let backend = fake_dry_run_backend(
        tmp.path(),
        &[
            "   New File   10   Documents/keep.txt",
            "   New File   20   OneDrive - Corp/drop.txt",
        ],
        1,
    );
    let board = ProgressBoard::new();

    let plan = planner::plan(
        &backend.to_string_lossy(),
        &source,
        &dest,
        &BTreeSet::new(),
        &BTreeSet::new(),
        &SkipPolicy::default(),
        planner::default_plan_tuning(),
        &tmp.path().join("plan.log"),
        &board,
        true,
    )
    .unwrap();

    let paths: Vec<&str> = plan.entries.iter().map(|e| e.relative_path.as_str()).collect();
    assert_eq!(paths, ["Documents/keep.txt"], "skip-policy applies at generation time");
}

#[test]
fn test_fatal_backend_exit_yields_error_not_partial_plan() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("src");
    let dest = tmp.path().join("dst");
    std::fs::create_dir_all(&source).unwrap();
    std::fs::create_dir_all(&dest).unwrap();

    // Emits plausible lines, then dies with a failure bit set.
    let backend = fake_dry_run_backend(tmp.path(), &["   New File   10   half.txt"], 9);
    let board = ProgressBoard::new();

    let err = planner::plan(
        &backend.to_string_lossy(),
        &source,
        &dest,
        &BTreeSet::new(),
        &BTreeSet::new(),
        &SkipPolicy::none(),
        planner::default_plan_tuning(),
        &tmp.path().join("plan.log"),
        &board,
        true,
    )
    .unwrap_err();

    assert!(
        matches!(err, wmig::Error::Backend { code: 9, .. }),
        "got {err:?}"
    );
}

#[test]
fn test_empty_diff_yields_valid_zero_entry_plan() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("src");
    let dest = tmp.path().join("dst");
    std::fs::create_dir_all(&source).unwrap();
    std::fs::create_dir_all(&dest).unwrap();

    let backend = write_script(tmp.path(), "quiet-backend.sh", "exit 0\n").unwrap();
    let board = ProgressBoard::new();

    let plan = planner::plan(
        &backend.to_string_lossy(),
        &source,
        &dest,
        &BTreeSet::new(),
        &BTreeSet::new(),
        &SkipPolicy::none(),
        planner::default_plan_tuning(),
        &tmp.path().join("plan.log"),
        &board,
        true,
    )
    .unwrap();
    assert!(plan.entries.is_empty());
}
