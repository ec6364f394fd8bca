//! Workstation Migration CLI (wmig) - Main binary entry point

use std::path::{Path, PathBuf};
use std::process;
use wmig::cli::args::{parse_args, Command, PlanArgs, ReplayArgs, SessionArgs, StageCommand};
use wmig::cli::output;
use wmig::io::{logs, manifest, plan as plan_io};
use wmig::models::StageStatus;
use wmig::services::planner::SkipPolicy;
use wmig::services::progress::ProgressBoard;
use wmig::services::stages::{self, Sequencer};
use wmig::services::tuning::LinkSpeedCache;
use wmig::services::{planner, replay};
use wmig::MigrationContext;

fn main() {
    // Initialize logger (controlled by RUST_LOG environment variable)
    // Example: RUST_LOG=debug wmig precopy --source /mnt/src --dest /mnt/dst
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_help();
        return;
    }

    match args[1].as_str() {
        "--help" | "-h" => {
            print_help();
            return;
        }
        "--version" | "-v" => {
            print_version();
            return;
        }
        _ => {}
    }

    let cli_args = match parse_args(&args) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("Use --help for usage information");
            process::exit(2);
        }
    };

    let exit_code = match &cli_args.command {
        Command::Stage(stage, session) => handle_stage(*stage, session),
        Command::Plan(plan_args) => handle_plan(plan_args),
        Command::Replay(replay_args) => handle_replay(replay_args),
        Command::ShowManifest(show_args) => handle_show_manifest(&show_args.store),
    };

    process::exit(exit_code);
}

fn build_context(session: &SessionArgs) -> MigrationContext {
    let mut ctx = MigrationContext::new(session.source.clone(), session.dest.clone());
    ctx.profiles = session.profiles.clone();
    ctx.log_dir = PathBuf::from(&session.log_dir);
    if let Some(backend) = &session.backend {
        ctx.backend_program = backend.clone();
    }
    if let Some(tool) = &session.capture_tool {
        ctx.capture_program = tool.clone();
    }
    if let Some(tool) = &session.restore_tool {
        ctx.restore_program = tool.clone();
    }
    if let Some(store) = &session.store {
        ctx.store_path = PathBuf::from(store);
    }
    ctx.acl_mode = session.acl;
    ctx.tuning_profile = session.tuning;
    ctx.business_hours_throttle = session.throttle;
    if let Some(limit) = session.limit {
        ctx.concurrency_limit = limit;
    }
    ctx.mirror_confirmed = session.confirm_mirror;
    ctx.provision_confirmed = session.confirm_provision;
    ctx.capture_key = session.key.clone();
    ctx.remap_pairs = session.remap.clone();
    ctx.active_within_days = session.active_within_days;
    ctx.quiet = session.quiet;
    ctx
}

fn handle_stage(stage: StageCommand, session: &SessionArgs) -> i32 {
    let ctx = build_context(session);
    let mut sequencer = Sequencer::new(ctx);

    let run = match stage {
        StageCommand::Inventory => {
            let (run, report) = sequencer.inventory();
            if let Some(report) = report {
                output::print_inventory(&report);
            }
            run
        }
        StageCommand::Precopy => sequencer.precopy(),
        StageCommand::Syscopy => sequencer.non_system_copy(),
        StageCommand::Capture => sequencer.state_capture_baseline(),
        StageCommand::Cutover => sequencer.cutover(),
        StageCommand::Postlogin => sequencer.post_login_delta(),
        StageCommand::Provision => {
            // Presence enforced by the argument parser.
            let pack = session.pack_source.clone().unwrap_or_default();
            sequencer.post_provision_pack(Path::new(&pack))
        }
        StageCommand::Ancillary => sequencer.ancillary_migrations(),
        StageCommand::Mirror => sequencer.mirror_finalize(),
    };

    output::print_stage_runs(sequencer.runs());
    status_exit_code(run.status)
}

fn handle_plan(args: &PlanArgs) -> i32 {
    let ctx = build_context(&args.session);
    let board = ProgressBoard::new();
    let cache = LinkSpeedCache::default();
    let tuning = wmig::services::tuning::compute(
        ctx.tuning_profile,
        cache.current_mbps(),
        ctx.business_hours_throttle,
        stages::current_hour_utc(),
    );
    let log_path = logs::transfer_log_path(&ctx.log_dir, "plan");

    let plan = match planner::plan(
        &ctx.backend_program,
        &ctx.source_root,
        &ctx.dest_root,
        &Default::default(),
        &Default::default(),
        &ctx.skip_policy,
        tuning,
        &log_path,
        &board,
        ctx.quiet,
    ) {
        Ok(plan) => plan,
        Err(e) => {
            eprintln!("Error: {e}");
            return 3;
        }
    };

    let out = PathBuf::from(&args.out);
    if let Err(e) = plan_io::write_plan(&out, &plan) {
        eprintln!("Error: Failed to persist plan: {e}");
        return 4;
    }

    output::print_plan_summary(&plan);
    println!("Plan written to {}", out.display());
    0
}

fn handle_replay(args: &ReplayArgs) -> i32 {
    let plan = match plan_io::read_plan(Path::new(&args.plan)) {
        Ok(plan) => plan,
        Err(e) => {
            eprintln!("Error: {e}");
            return 3;
        }
    };

    let log_path = logs::transfer_log_path(Path::new(&args.log_dir), "replay");
    let summary = match replay::replay(&plan, &SkipPolicy::default(), &log_path) {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("Error: {e}");
            return 4;
        }
    };

    output::print_replay_summary(&summary);
    if summary.all_ok() { 0 } else { 1 }
}

fn handle_show_manifest(store: &str) -> i32 {
    match manifest::read_manifest(Path::new(store)) {
        Ok(manifest) => {
            output::print_manifest(&manifest);
            0
        }
        Err(e) => {
            eprintln!("Error: {e}");
            3
        }
    }
}

fn status_exit_code(status: StageStatus) -> i32 {
    match status {
        StageStatus::Ok | StageStatus::Skipped => 0,
        StageStatus::Warn => 1,
        _ => 3,
    }
}

fn print_help() {
    println!("Workstation Migration CLI (wmig) - staged workstation migration over admin shares");
    println!();
    println!("USAGE:");
    println!("    wmig <STAGE> --source <PATH> --dest <PATH> [OPTIONS]");
    println!("    wmig plan --source <PATH> --dest <PATH> --out <FILE> [OPTIONS]");
    println!("    wmig replay --plan <FILE> [--log-dir <DIR>]");
    println!("    wmig show-manifest --store <DIR>");
    println!();
    println!("STAGES (independently invocable, intended in this order):");
    println!("    inventory     Enumerate selected profiles and report per-profile usage");
    println!("    precopy       Bulk-copy each selected profile concurrently");
    println!("    syscopy       Copy the non-system remainder of the source root");
    println!("    capture       Capture user state per identity and write the manifest");
    println!("    cutover       Delta re-copy, state restore, and integrity spot-check");
    println!("    postlogin     Delta pass after first user login");
    println!("    provision     Copy a provisioning pack (requires --pack-source)");
    println!("    ancillary     Best-effort auxiliary migrations (mapped drives, DSN report)");
    println!("    mirror        Destination-pruning per-profile mirror pass (requires --confirm-mirror)");
    println!();
    println!("COMMON OPTIONS:");
    println!("    --source <PATH>           Source root (admin share mount)");
    println!("    --dest <PATH>             Destination root");
    println!("    --profiles <A,B,C>        Comma-separated profile/identity selection");
    println!("    --log-dir <DIR>           Session log directory (default: logs)");
    println!("    --backend <PROG>          Bulk-copy backend program (default: robocopy)");
    println!("    --capture-tool <PROG>     State-capture program (default: scanstate)");
    println!("    --restore-tool <PROG>     State-restore program (default: loadstate)");
    println!("    --store <DIR>             Capture store path (default: store)");
    println!("    --tuning <PROFILE>        auto|conservative|balanced|aggressive|wifi");
    println!("    --throttle                Halve thread count during business hours");
    println!("    --limit <N>               Concurrent per-profile copies (default: 4)");
    println!("    --acl <MODE>              inherit (default) or preserve");
    println!("    --confirm-mirror          Allow destination-pruning Mirror transfers");
    println!("    --confirm-provision       Allow execution of a provisioning script");
    println!("    --key <K>                 Capture/restore encryption key");
    println!("    --remap <OLD=NEW>         Identity remapping pair (repeatable)");
    println!("    --active-within <DAYS>    Only capture identities active within N days");
    println!("    --quiet                   Suppress live backend output");
    println!();
    println!("WORKFLOW:");
    println!("    1. wmig inventory --source /mnt/src --dest /mnt/dst --profiles alice,bob");
    println!("    2. wmig precopy   --source /mnt/src --dest /mnt/dst --profiles alice,bob");
    println!("    3. wmig plan      --source /mnt/src --dest /mnt/dst --out delta.json");
    println!("    4. wmig replay    --plan delta.json");
}

fn print_version() {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    const GIT_HASH: &str = env!("GIT_HASH");
    const GIT_DATE: &str = env!("GIT_DATE");
    const BUILD_TARGET: &str = env!("BUILD_TARGET");

    println!("wmig {VERSION}");
    println!("Commit: {GIT_HASH} ({GIT_DATE})");
    println!("Target: {BUILD_TARGET}");

    #[cfg(debug_assertions)]
    println!("Build: debug");
    #[cfg(not(debug_assertions))]
    println!("Build: release");
}
