//! Workstation Migration Orchestration Library
//!
//! This library plans, sequences, and executes multi-stage workstation
//! migrations over administrative shares: bulk directory sync, per-profile
//! parallel copy, delta re-sync, and user-state capture/restore. The bulk
//! copy itself is delegated to an external backend executable with a
//! well-known command-line contract and exit-code taxonomy; this crate owns
//! orchestration, tuning, progress aggregation, dry-run planning, and
//! selective replay of persisted plans.

pub mod cli;
pub mod io;
pub mod models;
pub mod services;

pub use models::{
    AclMode, CaptureManifest, ChangeEntry, ChangeKind, ChangeSet, StageRun, StageStatus,
    TransferMode, TransferResult, TransferSpec, TuningParams, TuningProfile,
};

use services::planner::SkipPolicy;
use std::path::PathBuf;
use std::result;

/// Custom error type for the library
#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    InvalidInput(String),
    /// The bulk-copy or state-tool backend returned a fatal exit code.
    Backend { code: i32, context: String },
    /// A guarded operation was attempted without its required confirmation.
    Policy(String),
    /// A persisted plan or manifest could not be parsed.
    Malformed(String),
    System(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {e}"),
            Error::InvalidInput(msg) => write!(f, "Invalid input: {msg}"),
            Error::Backend { code, context } => {
                write!(f, "Backend failed with exit code {code}: {context}")
            }
            Error::Policy(msg) => write!(f, "Policy violation: {msg}"),
            Error::Malformed(msg) => write!(f, "Malformed plan or manifest: {msg}"),
            Error::System(msg) => write!(f, "System error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

pub type Result<T> = result::Result<T, Error>;

/// Default bound on concurrent per-profile copy invocations.
pub const DEFAULT_CONCURRENCY_LIMIT: usize = 4;

/// Per-session settings handed to every stage invocation.
///
/// The source material kept ACL mode, tuning mode, and skip toggles as
/// process-wide mutable globals; here they are explicit fields so stages
/// never interfere with each other and remain independently testable.
#[derive(Debug, Clone)]
pub struct MigrationContext {
    pub source_root: PathBuf,
    pub dest_root: PathBuf,
    pub profiles: Vec<String>,
    pub log_dir: PathBuf,
    /// Bulk-copy backend program name or path.
    pub backend_program: String,
    /// State-capture collaborator program name or path.
    pub capture_program: String,
    /// State-restore collaborator program name or path.
    pub restore_program: String,
    /// Store path shared by the capture and restore tools.
    pub store_path: PathBuf,
    pub acl_mode: AclMode,
    pub tuning_profile: TuningProfile,
    pub business_hours_throttle: bool,
    pub concurrency_limit: usize,
    pub skip_policy: SkipPolicy,
    /// Operator confirmation for destination-pruning Mirror transfers.
    pub mirror_confirmed: bool,
    /// Operator confirmation for executing a provisioning script.
    pub provision_confirmed: bool,
    /// Optional encryption key forwarded to capture and restore.
    pub capture_key: Option<String>,
    /// Identity remapping pairs (`old=new`) forwarded to restore.
    pub remap_pairs: Vec<String>,
    /// Only capture identities active within the last N days.
    pub active_within_days: Option<u32>,
    pub quiet: bool,
}

impl MigrationContext {
    /// Construct a context with conservative defaults for the given endpoints.
    #[must_use]
    pub fn new<S: Into<PathBuf>, D: Into<PathBuf>>(source_root: S, dest_root: D) -> Self {
        Self {
            source_root: source_root.into(),
            dest_root: dest_root.into(),
            profiles: Vec::new(),
            log_dir: PathBuf::from("logs"),
            backend_program: "robocopy".to_string(),
            capture_program: "scanstate".to_string(),
            restore_program: "loadstate".to_string(),
            store_path: PathBuf::from("store"),
            acl_mode: AclMode::Inherit,
            tuning_profile: TuningProfile::Auto,
            business_hours_throttle: false,
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
            skip_policy: SkipPolicy::default(),
            mirror_confirmed: false,
            provision_confirmed: false,
            capture_key: None,
            remap_pairs: Vec::new(),
            active_within_days: None,
            quiet: false,
        }
    }

    /// Validate the connectivity preconditions a copy stage relies on.
    ///
    /// Host reachability over admin shares reduces to "the root paths
    /// resolve"; a share that dropped mid-session fails here rather than
    /// deep inside a backend invocation.
    pub fn validate_endpoints(&self) -> Result<()> {
        if !self.source_root.exists() {
            return Err(Error::InvalidInput(format!(
                "Source root not reachable: {}",
                self.source_root.display()
            )));
        }
        if !self.dest_root.exists() {
            return Err(Error::InvalidInput(format!(
                "Destination root not reachable: {}",
                self.dest_root.display()
            )));
        }
        Ok(())
    }

    /// Validate that a profile selection exists for stages that need one.
    pub fn require_profiles(&self) -> Result<()> {
        if self.profiles.is_empty() {
            return Err(Error::InvalidInput(
                "No profiles selected for this stage".to_string(),
            ));
        }
        Ok(())
    }
}
