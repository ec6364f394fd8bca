//! Migration stage sequencer
//!
//! Defines the ordered migration stages and drives every other service:
//! tuning, backend invocation, parallel profile fan-out, state tools,
//! progress, and telemetry. Stages are independently invocable and
//! idempotent by design: re-copying and re-capturing are safe, so an
//! operator may re-run any stage. The sequencer runs on a single control
//! thread; only the per-profile copy passes fan out internally.

use crate::io::logs::{self, TelemetryWriter};
use crate::io::manifest;
use crate::models::{
    InventoryReport, ProfileUsage, StageRun, StageStatus, TransferMode, TransferSpec, TuningParams,
};
use crate::services::{
    exit_code, invoker,
    profiles::{self, ProfileCopyReport},
    progress::ProgressBoard,
    sizing, state_tool,
    tuning::{self, LinkSpeedCache},
};
use crate::{MigrationContext, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// The ordered migration stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageId {
    Inventory,
    Precopy,
    NonSystemCopy,
    StateCaptureBaseline,
    Cutover,
    PostLoginDelta,
    PostProvisionPack,
    AncillaryMigrations,
    /// Opt-in destructive finalization; never part of the standard order.
    MirrorFinalize,
}

impl StageId {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            StageId::Inventory => "inventory",
            StageId::Precopy => "precopy",
            StageId::NonSystemCopy => "non-system-copy",
            StageId::StateCaptureBaseline => "state-capture-baseline",
            StageId::Cutover => "cutover",
            StageId::PostLoginDelta => "post-login-delta",
            StageId::PostProvisionPack => "post-provision-pack",
            StageId::AncillaryMigrations => "ancillary-migrations",
            StageId::MirrorFinalize => "mirror-finalize",
        }
    }

    /// Intended execution order for a full migration session.
    #[must_use]
    pub fn ordered() -> [StageId; 8] {
        [
            StageId::Inventory,
            StageId::Precopy,
            StageId::NonSystemCopy,
            StageId::StateCaptureBaseline,
            StageId::Cutover,
            StageId::PostLoginDelta,
            StageId::PostProvisionPack,
            StageId::AncillaryMigrations,
        ]
    }
}

impl std::fmt::Display for StageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// OS directories never copied by the non-system pass so the destination's
/// own installation is never overwritten. The Users tree is excluded too;
/// profiles are handled by the per-profile passes.
pub const SYSTEM_EXCLUDE_DIRS: [&str; 8] = [
    "Windows",
    "Program Files",
    "Program Files (x86)",
    "ProgramData",
    "Users",
    "$Recycle.Bin",
    "System Volume Information",
    "Recovery",
];

/// System files never copied by the non-system pass.
pub const SYSTEM_EXCLUDE_FILES: [&str; 3] = ["pagefile.sys", "hiberfil.sys", "swapfile.sys"];

/// Per-profile subpaths whose existence the cutover integrity check
/// verifies after restore.
pub const SPOT_CHECK_SUBPATHS: [&str; 3] = ["Desktop", "Documents", "AppData/Roaming"];

/// Mapped network drive definition migrated by the ancillary stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappedDrive {
    pub letter: String,
    pub unc_path: String,
}

/// Drives one migration session and owns its audit trail.
pub struct Sequencer {
    ctx: MigrationContext,
    board: Arc<ProgressBoard>,
    link_cache: LinkSpeedCache,
    telemetry: TelemetryWriter,
    runs: Vec<StageRun>,
}

impl Sequencer {
    #[must_use]
    pub fn new(ctx: MigrationContext) -> Self {
        let telemetry = TelemetryWriter::new(&ctx.log_dir);
        Self {
            ctx,
            board: Arc::new(ProgressBoard::new()),
            link_cache: LinkSpeedCache::default(),
            telemetry,
            runs: Vec::new(),
        }
    }

    /// Substitute the link-speed cache (tests inject a fixed probe).
    #[must_use]
    pub fn with_link_cache(mut self, cache: LinkSpeedCache) -> Self {
        self.link_cache = cache;
        self
    }

    #[must_use]
    pub fn board(&self) -> Arc<ProgressBoard> {
        Arc::clone(&self.board)
    }

    /// The session audit trail, in execution order.
    #[must_use]
    pub fn runs(&self) -> &[StageRun] {
        &self.runs
    }

    #[must_use]
    pub fn context(&self) -> &MigrationContext {
        &self.ctx
    }

    fn finish(&mut self, stage: StageId, status: StageStatus, detail: String) -> StageRun {
        log::info!("Stage {stage} finished: {status} ({detail})");
        self.telemetry.record(stage.as_str(), status, &detail);
        let run = StageRun {
            stage: stage.as_str().to_string(),
            status,
            detail,
        };
        self.runs.push(run.clone());
        run
    }

    /// Tuning parameters for the next invocation, recomputed per call.
    #[must_use]
    pub fn tuning(&self) -> TuningParams {
        tuning::compute(
            self.ctx.tuning_profile,
            self.link_cache.current_mbps(),
            self.ctx.business_hours_throttle,
            current_hour_utc(),
        )
    }

    fn profile_source(&self, profile: &str) -> PathBuf {
        self.ctx.source_root.join("Users").join(profile)
    }

    fn profile_dest(&self, profile: &str) -> PathBuf {
        self.ctx.dest_root.join("Users").join(profile)
    }

    fn profile_spec(&self, profile: &str, mode: TransferMode, tuning: TuningParams) -> TransferSpec {
        TransferSpec {
            source: self.profile_source(profile),
            destination: self.profile_dest(profile),
            mode,
            exclude_dirs: self.ctx.skip_policy.dir_markers.iter().cloned().collect(),
            exclude_files: self.ctx.skip_policy.file_patterns.iter().cloned().collect(),
            acl_mode: self.ctx.acl_mode,
            tuning,
            mirror_confirmed: self.ctx.mirror_confirmed,
        }
    }

    /// Stage: enumerate selected profiles and report per-profile usage.
    /// No network write side effects beyond the report file.
    pub fn inventory(&mut self) -> (StageRun, Option<InventoryReport>) {
        if let Err(e) = self
            .ctx
            .validate_endpoints()
            .and_then(|()| self.ctx.require_profiles())
        {
            return (
                self.finish(StageId::Inventory, StageStatus::Error, e.to_string()),
                None,
            );
        }

        let mut usages: Vec<ProfileUsage> = Vec::new();
        let mut failures = Vec::new();
        for profile in self.ctx.profiles.clone() {
            let root = self.profile_source(&profile);
            match sizing::measure_profile(&root, &profile) {
                Ok(usage) => usages.push(usage),
                Err(e) => {
                    log::warn!("Inventory failed for {profile}: {e}");
                    failures.push(profile);
                }
            }
        }

        let report = InventoryReport {
            generated_at: logs::now_rfc3339(),
            source_root: self.ctx.source_root.to_string_lossy().into_owned(),
            profiles: usages,
        };

        let report_path = self.ctx.log_dir.join("inventory.json");
        let write_outcome = std::fs::create_dir_all(&self.ctx.log_dir)
            .map_err(crate::Error::from)
            .and_then(|()| {
                let file = std::fs::File::create(&report_path)?;
                serde_json::to_writer_pretty(file, &report)
                    .map_err(|e| crate::Error::Malformed(format!("Failed to write report: {e}")))
            });

        let run = match (write_outcome, failures.is_empty()) {
            (Err(e), _) => self.finish(StageId::Inventory, StageStatus::Error, e.to_string()),
            (Ok(()), false) => self.finish(
                StageId::Inventory,
                StageStatus::Warn,
                format!(
                    "Report written to {}; unmeasurable profiles: {}",
                    report_path.display(),
                    failures.join(", ")
                ),
            ),
            (Ok(()), true) => self.finish(
                StageId::Inventory,
                StageStatus::Ok,
                format!(
                    "{} profile(s) measured, report written to {}",
                    report.profiles.len(),
                    report_path.display()
                ),
            ),
        };
        (run, Some(report))
    }

    fn profile_pass(&self, stage: StageId, mode: TransferMode) -> Result<ProfileCopyReport> {
        self.ctx.validate_endpoints()?;
        self.ctx.require_profiles()?;
        let tuning = self.tuning();
        profiles::copy_profiles_concurrently(
            &self.ctx.backend_program,
            &self.ctx.profiles,
            |profile| self.profile_spec(profile, mode, tuning),
            stage.as_str(),
            &self.ctx.log_dir,
            self.ctx.concurrency_limit,
            &self.board,
            self.ctx.quiet,
        )
    }

    /// Stage: initial bulk copy of every selected profile, fanned out
    /// concurrently. A fatal exit in one profile is reported per-profile
    /// and never escalates to abort siblings.
    pub fn precopy(&mut self) -> StageRun {
        match self.profile_pass(StageId::Precopy, TransferMode::BulkCopy) {
            Ok(report) => self.finish(StageId::Precopy, report.status, report.detail),
            Err(e) => self.finish(StageId::Precopy, StageStatus::Error, e.to_string()),
        }
    }

    /// Stage: destination-pruning mirror pass over every selected profile,
    /// making each destination profile exactly match its source. This is
    /// the only stage that deletes, and it is refused before any backend
    /// invocation unless the session carries the operator's explicit
    /// confirmation.
    pub fn mirror_finalize(&mut self) -> StageRun {
        if !self.ctx.mirror_confirmed {
            return self.finish(
                StageId::MirrorFinalize,
                StageStatus::Error,
                format!(
                    "Mirror pass deletes destination extras under {}; refusing without explicit confirmation",
                    self.ctx.dest_root.display()
                ),
            );
        }
        match self.profile_pass(StageId::MirrorFinalize, TransferMode::Mirror) {
            Ok(report) => self.finish(StageId::MirrorFinalize, report.status, report.detail),
            Err(e) => self.finish(StageId::MirrorFinalize, StageStatus::Error, e.to_string()),
        }
    }

    /// Stage: identical to precopy, re-run after first user login to catch
    /// files the OS or user had locked during the first pass.
    pub fn post_login_delta(&mut self) -> StageRun {
        match self.profile_pass(StageId::PostLoginDelta, TransferMode::Delta) {
            Ok(report) => self.finish(StageId::PostLoginDelta, report.status, report.detail),
            Err(e) => self.finish(StageId::PostLoginDelta, StageStatus::Error, e.to_string()),
        }
    }

    /// Stage: one whole-root copy excluding OS/system directories and the
    /// Users tree (profiles travel via the per-profile passes).
    pub fn non_system_copy(&mut self) -> StageRun {
        if let Err(e) = self.ctx.validate_endpoints() {
            return self.finish(StageId::NonSystemCopy, StageStatus::Error, e.to_string());
        }

        let mut exclude_dirs: BTreeSet<String> = SYSTEM_EXCLUDE_DIRS
            .iter()
            .map(|s| (*s).to_string())
            .collect();
        exclude_dirs.extend(self.ctx.skip_policy.dir_markers.iter().cloned());
        let mut exclude_files: BTreeSet<String> = SYSTEM_EXCLUDE_FILES
            .iter()
            .map(|s| (*s).to_string())
            .collect();
        exclude_files.extend(self.ctx.skip_policy.file_patterns.iter().cloned());

        let spec = TransferSpec {
            source: self.ctx.source_root.clone(),
            destination: self.ctx.dest_root.clone(),
            mode: TransferMode::BulkCopy,
            exclude_dirs,
            exclude_files,
            acl_mode: self.ctx.acl_mode,
            tuning: self.tuning(),
            mirror_confirmed: false,
        };

        let label = StageId::NonSystemCopy.as_str();
        let log_path = logs::transfer_log_path(&self.ctx.log_dir, label);
        match invoker::invoke(
            &self.ctx.backend_program,
            &spec,
            label,
            &log_path,
            &self.board,
            self.ctx.quiet,
        ) {
            Ok(run) => {
                let (status, detail) = single_shot_status(run.result.exit_code);
                self.finish(StageId::NonSystemCopy, status, detail)
            }
            Err(e) => self.finish(StageId::NonSystemCopy, StageStatus::Error, e.to_string()),
        }
    }

    /// Stage: capture user state per identity with per-identity isolation,
    /// then write the capture manifest for the restore pass.
    pub fn state_capture_baseline(&mut self) -> StageRun {
        if let Err(e) = self.ctx.require_profiles() {
            return self.finish(
                StageId::StateCaptureBaseline,
                StageStatus::Error,
                e.to_string(),
            );
        }

        let exclude_rules =
            match state_tool::write_exclude_rules(&self.ctx.store_path, &self.ctx.skip_policy) {
                Ok(path) => path,
                Err(e) => {
                    return self.finish(
                        StageId::StateCaptureBaseline,
                        StageStatus::Error,
                        e.to_string(),
                    );
                }
            };

        let opts = state_tool::CaptureOptions {
            snapshot_consistent: true,
            key: self.ctx.capture_key.clone(),
            active_within_days: self.ctx.active_within_days,
        };

        let mut captured = Vec::new();
        let mut failed = Vec::new();
        for identity in self.ctx.profiles.clone() {
            let label = format!("capture-{identity}");
            let log_path = logs::transfer_log_path(&self.ctx.log_dir, &label);
            match state_tool::capture_identity(
                &self.ctx.capture_program,
                &self.ctx.store_path,
                &identity,
                &exclude_rules,
                &opts,
                &log_path,
                self.ctx.quiet,
            ) {
                Ok(0) => captured.push(identity),
                Ok(code) => {
                    log::warn!("Capture for {identity} exited with code {code}, continuing");
                    failed.push(identity);
                }
                Err(e) => {
                    log::warn!("Capture for {identity} failed to run: {e}");
                    failed.push(identity);
                }
            }
        }

        if captured.is_empty() {
            return self.finish(
                StageId::StateCaptureBaseline,
                StageStatus::Error,
                format!("No identities captured; failed: {}", failed.join(", ")),
            );
        }

        let manifest = manifest::build_manifest(&source_computer(&self.ctx), captured.clone());
        if let Err(e) = manifest::write_manifest(&self.ctx.store_path, &manifest) {
            return self.finish(
                StageId::StateCaptureBaseline,
                StageStatus::Error,
                e.to_string(),
            );
        }

        if failed.is_empty() {
            self.finish(
                StageId::StateCaptureBaseline,
                StageStatus::Ok,
                format!("{} identities captured", captured.len()),
            )
        } else {
            self.finish(
                StageId::StateCaptureBaseline,
                StageStatus::Warn,
                format!(
                    "{} identities captured; failed: {}",
                    captured.len(),
                    failed.join(", ")
                ),
            )
        }
    }

    /// Stage: delta re-copy of every profile, state restore from the
    /// capture manifest, then an integrity spot-check. Reports Ok only if
    /// the restore exit code is zero and every spot-check passes.
    pub fn cutover(&mut self) -> StageRun {
        let delta = match self.profile_pass(StageId::Cutover, TransferMode::Delta) {
            Ok(report) => report,
            Err(e) => return self.finish(StageId::Cutover, StageStatus::Error, e.to_string()),
        };

        let manifest = match manifest::read_manifest(&self.ctx.store_path) {
            Ok(m) => m,
            Err(e) => {
                return self.finish(
                    StageId::Cutover,
                    StageStatus::Error,
                    format!("Cannot restore without a readable manifest: {e}"),
                );
            }
        };

        let restore_opts = state_tool::RestoreOptions {
            remap_pairs: self.ctx.remap_pairs.clone(),
            key: self.ctx.capture_key.clone(),
        };
        let log_path = logs::transfer_log_path(&self.ctx.log_dir, "state-restore");
        let restore_code = match state_tool::restore_identities(
            &self.ctx.restore_program,
            &self.ctx.store_path,
            &manifest.identities,
            &restore_opts,
            &log_path,
            self.ctx.quiet,
        ) {
            Ok(code) => code,
            Err(e) => return self.finish(StageId::Cutover, StageStatus::Error, e.to_string()),
        };

        if restore_code != 0 {
            return self.finish(
                StageId::Cutover,
                StageStatus::Error,
                format!("State restore exited with code {restore_code}"),
            );
        }

        let missing = self.spot_check();
        if !missing.is_empty() {
            return self.finish(
                StageId::Cutover,
                StageStatus::Warn,
                format!("Restore succeeded but spot-checks missing: {}", missing.join(", ")),
            );
        }

        let status = if delta.status == StageStatus::Ok {
            StageStatus::Ok
        } else {
            StageStatus::Warn
        };
        self.finish(
            StageId::Cutover,
            status,
            format!(
                "Delta: {}; restore ok; {} spot-checks passed",
                delta.detail,
                self.ctx.profiles.len() * SPOT_CHECK_SUBPATHS.len()
            ),
        )
    }

    /// Existence check of the expected per-profile subpaths on the
    /// destination; returns whatever is missing.
    fn spot_check(&self) -> Vec<String> {
        let mut missing = Vec::new();
        for profile in &self.ctx.profiles {
            let root = self.profile_dest(profile);
            for sub in SPOT_CHECK_SUBPATHS {
                let path = root.join(sub);
                if !path.exists() {
                    missing.push(format!("{profile}/{sub}"));
                }
            }
        }
        missing
    }

    /// Stage: copy the provisioning pack to the destination and optionally
    /// run the provisioning script found there, behind operator
    /// confirmation.
    pub fn post_provision_pack(&mut self, pack_source: &Path) -> StageRun {
        if !pack_source.exists() {
            return self.finish(
                StageId::PostProvisionPack,
                StageStatus::Error,
                format!("Provisioning pack source not reachable: {}", pack_source.display()),
            );
        }
        if let Err(e) = self.ctx.validate_endpoints() {
            return self.finish(StageId::PostProvisionPack, StageStatus::Error, e.to_string());
        }

        let pack_dest = self.ctx.dest_root.join("Provision");
        let spec = TransferSpec {
            source: pack_source.to_path_buf(),
            destination: pack_dest.clone(),
            mode: TransferMode::BulkCopy,
            exclude_dirs: BTreeSet::new(),
            exclude_files: BTreeSet::new(),
            acl_mode: self.ctx.acl_mode,
            tuning: self.tuning(),
            mirror_confirmed: false,
        };

        let label = StageId::PostProvisionPack.as_str();
        let log_path = logs::transfer_log_path(&self.ctx.log_dir, label);
        let copy = match invoker::invoke(
            &self.ctx.backend_program,
            &spec,
            label,
            &log_path,
            &self.board,
            self.ctx.quiet,
        ) {
            Ok(run) => run.result,
            Err(e) => {
                return self.finish(StageId::PostProvisionPack, StageStatus::Error, e.to_string());
            }
        };
        if exit_code::is_fatal(copy.exit_code) {
            return self.finish(
                StageId::PostProvisionPack,
                StageStatus::Error,
                format!("Pack copy failed: {}", exit_code::decode(copy.exit_code)),
            );
        }

        let script = ["provision.cmd", "provision.sh"]
            .iter()
            .map(|name| pack_dest.join(name))
            .find(|p| p.exists());

        match script {
            None => self.finish(
                StageId::PostProvisionPack,
                StageStatus::Ok,
                "Pack copied; no provisioning script found".to_string(),
            ),
            Some(_) if !self.ctx.provision_confirmed => self.finish(
                StageId::PostProvisionPack,
                StageStatus::Ok,
                "Pack copied; provisioning script present but not confirmed for execution"
                    .to_string(),
            ),
            Some(path) => {
                let script_log = logs::transfer_log_path(&self.ctx.log_dir, "provision-script");
                match invoker::run_streaming(
                    &path.to_string_lossy(),
                    &[],
                    &script_log,
                    self.ctx.quiet,
                ) {
                    Ok((0, _)) => self.finish(
                        StageId::PostProvisionPack,
                        StageStatus::Ok,
                        "Pack copied and provisioning script succeeded".to_string(),
                    ),
                    Ok((code, _)) => self.finish(
                        StageId::PostProvisionPack,
                        StageStatus::Warn,
                        format!("Pack copied but provisioning script exited with code {code}"),
                    ),
                    Err(e) => self.finish(
                        StageId::PostProvisionPack,
                        StageStatus::Warn,
                        format!("Pack copied but provisioning script failed to run: {e}"),
                    ),
                }
            }
        }
    }

    /// Stage: best-effort migration of auxiliary per-user settings (mapped
    /// network drives) and a report-only enumeration of DSN-like resources.
    /// Failures here are warnings, never fatal to the session.
    pub fn ancillary_migrations(&mut self) -> StageRun {
        let mut notes = Vec::new();
        let mut warned = false;

        for profile in self.ctx.profiles.clone() {
            let drives_file = self.profile_source(&profile).join("drives.json");
            if !drives_file.exists() {
                continue;
            }
            match read_mapped_drives(&drives_file) {
                Ok(drives) => {
                    let dest = self.profile_dest(&profile).join("drives.json");
                    match copy_drives(&drives_file, &dest) {
                        Ok(()) => notes.push(format!(
                            "{profile}: {} mapped drive(s) migrated",
                            drives.len()
                        )),
                        Err(e) => {
                            warned = true;
                            notes.push(format!("{profile}: drive migration failed: {e}"));
                        }
                    }
                }
                Err(e) => {
                    warned = true;
                    notes.push(format!("{profile}: unreadable drive definitions: {e}"));
                }
            }
        }

        // Report-only: DSN-like resources are enumerated, never migrated.
        let dsn_file = self.ctx.source_root.join("dsn.txt");
        if dsn_file.exists() {
            match std::fs::read_to_string(&dsn_file) {
                Ok(contents) => {
                    let count = contents.lines().filter(|l| !l.trim().is_empty()).count();
                    notes.push(format!("{count} DSN-like resource(s) enumerated (report only)"));
                }
                Err(e) => {
                    warned = true;
                    notes.push(format!("DSN enumeration failed: {e}"));
                }
            }
        }

        if notes.is_empty() {
            notes.push("No ancillary resources found".to_string());
        }
        let status = if warned { StageStatus::Warn } else { StageStatus::Ok };
        self.finish(StageId::AncillaryMigrations, status, notes.join("; "))
    }
}

/// Map a single-shot backend exit code onto a stage status with its
/// decoded explanation.
#[must_use]
pub fn single_shot_status(code: i32) -> (StageStatus, String) {
    let detail = exit_code::decode(code);
    match exit_code::classify(code) {
        exit_code::ExitClass::Fatal => (StageStatus::Error, detail),
        exit_code::ExitClass::NonFatal if code > 1 => (StageStatus::Warn, detail),
        _ => (StageStatus::Ok, detail),
    }
}

fn read_mapped_drives(path: &Path) -> Result<Vec<MappedDrive>> {
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| crate::Error::Malformed(format!("{}: {e}", path.display())))
}

fn copy_drives(from: &Path, to: &Path) -> std::io::Result<()> {
    if let Some(parent) = to.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::copy(from, to).map(|_| ())
}

/// Hour of day (UTC) used by the business-hours throttle.
#[must_use]
pub fn current_hour_utc() -> u32 {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs());
    ((secs % 86_400) / 3_600) as u32
}

/// Best-effort source computer name for the capture manifest.
fn source_computer(ctx: &MigrationContext) -> String {
    std::env::var("COMPUTERNAME")
        .or_else(|_| std::env::var("HOSTNAME"))
        .unwrap_or_else(|_| ctx.source_root.to_string_lossy().into_owned())
}
