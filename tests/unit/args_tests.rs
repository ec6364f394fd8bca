//! Unit tests for CLI argument parsing

use wmig::cli::args::{parse_args, Command, StageCommand};
use wmig::models::TuningProfile;

fn argv(parts: &[&str]) -> Vec<String> {
    let mut v = vec!["wmig".to_string()];
    v.extend(parts.iter().map(|s| (*s).to_string()));
    v
}

#[test]
fn test_stage_command_with_common_options() {
    let args = argv(&[
        "precopy",
        "--source",
        "/mnt/src",
        "--dest",
        "/mnt/dst",
        "--profiles",
        "alice, bob,carol",
        "--tuning",
        "wifi",
        "--throttle",
        "--limit",
        "2",
    ]);
    let parsed = parse_args(&args).expect("should parse");
    match parsed.command {
        Command::Stage(StageCommand::Precopy, session) => {
            assert_eq!(session.source, "/mnt/src");
            assert_eq!(session.dest, "/mnt/dst");
            assert_eq!(session.profiles, ["alice", "bob", "carol"]);
            assert_eq!(session.tuning, TuningProfile::Wifi);
            assert!(session.throttle);
            assert_eq!(session.limit, Some(2));
        }
        other => panic!("Unexpected command: {other:?}"),
    }
}

#[test]
fn test_unknown_command_is_rejected() {
    let err = parse_args(&argv(&["defragment"])).unwrap_err();
    assert!(err.contains("Unknown command"));
}

#[test]
fn test_missing_source_is_rejected() {
    let err = parse_args(&argv(&["precopy", "--dest", "/mnt/dst"])).unwrap_err();
    assert!(err.contains("--source"));
}

#[test]
fn test_option_requiring_value_at_end_is_rejected() {
    let err = parse_args(&argv(&["precopy", "--source", "/s", "--dest"])).unwrap_err();
    assert!(err.contains("--dest requires a value"));
}

#[test]
fn test_invalid_tuning_profile_is_rejected() {
    let err = parse_args(&argv(&[
        "precopy", "--source", "/s", "--dest", "/d", "--tuning", "ludicrous",
    ]))
    .unwrap_err();
    assert!(err.contains("tuning profile"));
}

#[test]
fn test_zero_limit_is_rejected() {
    let err = parse_args(&argv(&[
        "precopy", "--source", "/s", "--dest", "/d", "--limit", "0",
    ]))
    .unwrap_err();
    assert!(err.contains("--limit"));
}

#[test]
fn test_provision_requires_pack_source() {
    let err = parse_args(&argv(&["provision", "--source", "/s", "--dest", "/d"])).unwrap_err();
    assert!(err.contains("--pack-source"));
}

#[test]
fn test_plan_requires_out() {
    let err = parse_args(&argv(&["plan", "--source", "/s", "--dest", "/d"])).unwrap_err();
    assert!(err.contains("--out"));
}

#[test]
fn test_plan_with_out_parses() {
    let parsed = parse_args(&argv(&[
        "plan", "--source", "/s", "--dest", "/d", "--out", "delta.json",
    ]))
    .expect("should parse");
    match parsed.command {
        Command::Plan(plan) => {
            assert_eq!(plan.out, "delta.json");
            assert_eq!(plan.session.source, "/s");
        }
        other => panic!("Unexpected command: {other:?}"),
    }
}

#[test]
fn test_replay_requires_plan() {
    let err = parse_args(&argv(&["replay"])).unwrap_err();
    assert!(err.contains("--plan"));
}

#[test]
fn test_replay_parses() {
    let parsed = parse_args(&argv(&["replay", "--plan", "delta.json", "--quiet"]))
        .expect("should parse");
    match parsed.command {
        Command::Replay(replay) => {
            assert_eq!(replay.plan, "delta.json");
            assert!(replay.quiet);
        }
        other => panic!("Unexpected command: {other:?}"),
    }
}

#[test]
fn test_mirror_stage_parses_with_confirmation_flag() {
    let parsed = parse_args(&argv(&[
        "mirror",
        "--source",
        "/s",
        "--dest",
        "/d",
        "--profiles",
        "alice",
        "--confirm-mirror",
    ]))
    .expect("should parse");
    match parsed.command {
        Command::Stage(StageCommand::Mirror, session) => {
            assert!(session.confirm_mirror);
        }
        other => panic!("Unexpected command: {other:?}"),
    }
}

#[test]
fn test_remap_is_repeatable() {
    let parsed = parse_args(&argv(&[
        "cutover",
        "--source",
        "/s",
        "--dest",
        "/d",
        "--remap",
        "OLD\\alice=NEW\\alice",
        "--remap",
        "OLD\\bob=NEW\\bob",
    ]))
    .expect("should parse");
    match parsed.command {
        Command::Stage(StageCommand::Cutover, session) => {
            assert_eq!(session.remap.len(), 2);
        }
        other => panic!("Unexpected command: {other:?}"),
    }
}
