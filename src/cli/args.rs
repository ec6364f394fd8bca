//! CLI argument parsing

use crate::models::{AclMode, TuningProfile};

#[derive(Debug, Clone)]
pub struct CliArgs {
    pub command: Command,
}

#[derive(Debug, Clone)]
pub enum Command {
    /// One of the migration stages, driven by session options.
    Stage(StageCommand, SessionArgs),
    /// Dry-run diff persisted as a replay plan.
    Plan(PlanArgs),
    /// Selective replay of a persisted plan.
    Replay(ReplayArgs),
    /// Inspect the capture manifest inside a store.
    ShowManifest(ShowManifestArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageCommand {
    Inventory,
    Precopy,
    Syscopy,
    Capture,
    Cutover,
    Postlogin,
    Provision,
    Ancillary,
    Mirror,
}

impl StageCommand {
    fn from_label(label: &str) -> Option<Self> {
        match label {
            "inventory" => Some(StageCommand::Inventory),
            "precopy" => Some(StageCommand::Precopy),
            "syscopy" => Some(StageCommand::Syscopy),
            "capture" => Some(StageCommand::Capture),
            "cutover" => Some(StageCommand::Cutover),
            "postlogin" => Some(StageCommand::Postlogin),
            "provision" => Some(StageCommand::Provision),
            "ancillary" => Some(StageCommand::Ancillary),
            "mirror" => Some(StageCommand::Mirror),
            _ => None,
        }
    }
}

/// Session options shared by every stage command.
#[derive(Debug, Clone)]
pub struct SessionArgs {
    pub source: String,
    pub dest: String,
    pub profiles: Vec<String>,
    pub log_dir: String,
    pub backend: Option<String>,
    pub capture_tool: Option<String>,
    pub restore_tool: Option<String>,
    pub store: Option<String>,
    pub tuning: TuningProfile,
    pub throttle: bool,
    pub limit: Option<usize>,
    pub acl: AclMode,
    pub confirm_mirror: bool,
    pub confirm_provision: bool,
    pub key: Option<String>,
    pub remap: Vec<String>,
    pub active_within_days: Option<u32>,
    pub pack_source: Option<String>,
    pub quiet: bool,
}

impl Default for SessionArgs {
    fn default() -> Self {
        Self {
            source: String::new(),
            dest: String::new(),
            profiles: Vec::new(),
            log_dir: "logs".to_string(),
            backend: None,
            capture_tool: None,
            restore_tool: None,
            store: None,
            tuning: TuningProfile::Auto,
            throttle: false,
            limit: None,
            acl: AclMode::Inherit,
            confirm_mirror: false,
            confirm_provision: false,
            key: None,
            remap: Vec::new(),
            active_within_days: None,
            pack_source: None,
            quiet: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlanArgs {
    pub session: SessionArgs,
    pub out: String,
}

#[derive(Debug, Clone)]
pub struct ReplayArgs {
    pub plan: String,
    pub log_dir: String,
    pub quiet: bool,
}

#[derive(Debug, Clone)]
pub struct ShowManifestArgs {
    pub store: String,
}

/// Parse command line arguments
pub fn parse_args(args: &[String]) -> Result<CliArgs, String> {
    if args.len() < 2 {
        return Err("No command specified".to_string());
    }

    let command = match args[1].as_str() {
        "plan" => Command::Plan(parse_plan_args(&args[2..])?),
        "replay" => Command::Replay(parse_replay_args(&args[2..])?),
        "show-manifest" => Command::ShowManifest(parse_show_manifest_args(&args[2..])?),
        other => match StageCommand::from_label(other) {
            Some(stage) => {
                let session = parse_session_args(&args[2..], stage)?;
                Command::Stage(stage, session)
            }
            None => return Err(format!("Unknown command: {other}")),
        },
    };

    Ok(CliArgs { command })
}

fn parse_session_args(args: &[String], stage: StageCommand) -> Result<SessionArgs, String> {
    let mut session = SessionArgs::default();
    let mut i = 0;

    while i < args.len() {
        match args[i].as_str() {
            "--source" => session.source = take_value(args, &mut i, "--source")?,
            "--dest" => session.dest = take_value(args, &mut i, "--dest")?,
            "--profiles" => {
                let list = take_value(args, &mut i, "--profiles")?;
                session.profiles = list
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            "--log-dir" => session.log_dir = take_value(args, &mut i, "--log-dir")?,
            "--backend" => session.backend = Some(take_value(args, &mut i, "--backend")?),
            "--capture-tool" => {
                session.capture_tool = Some(take_value(args, &mut i, "--capture-tool")?);
            }
            "--restore-tool" => {
                session.restore_tool = Some(take_value(args, &mut i, "--restore-tool")?);
            }
            "--store" => session.store = Some(take_value(args, &mut i, "--store")?),
            "--tuning" => {
                let label = take_value(args, &mut i, "--tuning")?;
                session.tuning = TuningProfile::from_label(&label)
                    .ok_or_else(|| format!("Unknown tuning profile: {label}"))?;
            }
            "--throttle" => session.throttle = true,
            "--limit" => {
                let raw = take_value(args, &mut i, "--limit")?;
                let limit: usize = raw
                    .parse()
                    .map_err(|_| "--limit must be a number".to_string())?;
                if limit == 0 {
                    return Err("--limit must be greater than zero".to_string());
                }
                session.limit = Some(limit);
            }
            "--acl" => {
                let label = take_value(args, &mut i, "--acl")?;
                session.acl = AclMode::from_label(&label)
                    .ok_or_else(|| format!("--acl must be 'inherit' or 'preserve', got {label}"))?;
            }
            "--confirm-mirror" => session.confirm_mirror = true,
            "--confirm-provision" => session.confirm_provision = true,
            "--key" => session.key = Some(take_value(args, &mut i, "--key")?),
            "--remap" => session.remap.push(take_value(args, &mut i, "--remap")?),
            "--active-within" => {
                let raw = take_value(args, &mut i, "--active-within")?;
                session.active_within_days = Some(
                    raw.parse()
                        .map_err(|_| "--active-within must be a number of days".to_string())?,
                );
            }
            "--pack-source" => session.pack_source = Some(take_value(args, &mut i, "--pack-source")?),
            "--quiet" => session.quiet = true,
            other => return Err(format!("Unknown option: {other}")),
        }
        i += 1;
    }

    if session.source.is_empty() {
        return Err("Missing required option: --source".to_string());
    }
    if session.dest.is_empty() {
        return Err("Missing required option: --dest".to_string());
    }
    if stage == StageCommand::Provision && session.pack_source.is_none() {
        return Err("provision requires --pack-source".to_string());
    }

    Ok(session)
}

fn parse_plan_args(args: &[String]) -> Result<PlanArgs, String> {
    let mut out = String::new();
    let mut rest = Vec::new();
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--out" {
            out = take_value(args, &mut i, "--out")?;
        } else {
            rest.push(args[i].clone());
        }
        i += 1;
    }
    if out.is_empty() {
        return Err("plan requires --out <FILE>".to_string());
    }
    let session = parse_session_args(&rest, StageCommand::Inventory)?;
    Ok(PlanArgs { session, out })
}

fn parse_replay_args(args: &[String]) -> Result<ReplayArgs, String> {
    let mut plan = String::new();
    let mut log_dir = "logs".to_string();
    let mut quiet = false;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--plan" => plan = take_value(args, &mut i, "--plan")?,
            "--log-dir" => log_dir = take_value(args, &mut i, "--log-dir")?,
            "--quiet" => quiet = true,
            other => return Err(format!("Unknown option: {other}")),
        }
        i += 1;
    }
    if plan.is_empty() {
        return Err("replay requires --plan <FILE>".to_string());
    }
    Ok(ReplayArgs {
        plan,
        log_dir,
        quiet,
    })
}

fn parse_show_manifest_args(args: &[String]) -> Result<ShowManifestArgs, String> {
    let mut store = String::new();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--store" => store = take_value(args, &mut i, "--store")?,
            other => return Err(format!("Unknown option: {other}")),
        }
        i += 1;
    }
    if store.is_empty() {
        return Err("show-manifest requires --store <DIR>".to_string());
    }
    Ok(ShowManifestArgs { store })
}

fn take_value(args: &[String], i: &mut usize, flag: &str) -> Result<String, String> {
    *i += 1;
    if *i >= args.len() {
        return Err(format!("{flag} requires a value"));
    }
    Ok(args[*i].clone())
}
