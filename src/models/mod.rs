//! Data models for transfer specs, change sets, manifests, and stage records

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Copy semantics requested for one backend invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    /// List-only pass: classify differences, write no data.
    DryRun,
    /// Full recursive copy; never deletes destination extras.
    BulkCopy,
    /// Destination-pruning sync; the only mode permitted to delete.
    Mirror,
    /// Idempotent re-copy pass over an already-populated destination.
    Delta,
}

impl TransferMode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferMode::DryRun => "dry-run",
            TransferMode::BulkCopy => "bulk-copy",
            TransferMode::Mirror => "mirror",
            TransferMode::Delta => "delta",
        }
    }
}

impl std::fmt::Display for TransferMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Security-descriptor handling for copied files.
///
/// Default is `Inherit` because cross-domain SID copies are frequently
/// invalid on the destination machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AclMode {
    #[default]
    Inherit,
    Preserve,
}

impl AclMode {
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label.to_ascii_lowercase().as_str() {
            "inherit" => Some(AclMode::Inherit),
            "preserve" => Some(AclMode::Preserve),
            _ => None,
        }
    }
}

/// Named concurrency profile for the tuning advisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TuningProfile {
    /// Derive thread count from the measured link speed, no gap.
    #[default]
    Auto,
    Conservative,
    Balanced,
    Aggressive,
    Wifi,
}

impl TuningProfile {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TuningProfile::Auto => "auto",
            TuningProfile::Conservative => "conservative",
            TuningProfile::Balanced => "balanced",
            TuningProfile::Aggressive => "aggressive",
            TuningProfile::Wifi => "wifi",
        }
    }

    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label.to_ascii_lowercase().as_str() {
            "auto" => Some(TuningProfile::Auto),
            "conservative" => Some(TuningProfile::Conservative),
            "balanced" => Some(TuningProfile::Balanced),
            "aggressive" => Some(TuningProfile::Aggressive),
            "wifi" => Some(TuningProfile::Wifi),
            _ => None,
        }
    }
}

impl std::fmt::Display for TuningProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TuningProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TuningProfile::from_label(s).ok_or_else(|| format!("unknown tuning profile '{s}'"))
    }
}

/// Concurrency parameters handed to the bulk-copy backend.
///
/// Recomputed per invocation, never mutated in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TuningParams {
    pub thread_count: u32,
    pub inter_packet_gap_ms: u32,
    pub profile: TuningProfile,
}

/// One requested copy operation. Immutable once constructed; a new spec is
/// created for every stage invocation.
#[derive(Debug, Clone)]
pub struct TransferSpec {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub mode: TransferMode,
    pub exclude_dirs: BTreeSet<String>,
    pub exclude_files: BTreeSet<String>,
    pub acl_mode: AclMode,
    pub tuning: TuningParams,
    /// Explicit operator confirmation for Mirror mode. The deletion scope is
    /// exactly `destination`; without this flag Mirror is rejected before
    /// any backend invocation.
    pub mirror_confirmed: bool,
}

/// Outcome of one backend invocation.
///
/// Exit codes follow the backend's bitmask convention: bit 0 = files copied,
/// bit 1 = extra files/dirs found, bit 2 = mismatches, bits >= 3 = failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferResult {
    pub label: String,
    pub exit_code: i32,
    pub log_path: String,
    pub started_at: String,  // RFC3339 format
    pub finished_at: String, // RFC3339 format
}

/// Per-file classification produced by a dry-run pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    #[serde(rename = "New File")]
    NewFile,
    Older,
    Newer,
    #[serde(rename = "Extra File")]
    ExtraFile,
    #[serde(rename = "Extra Dir")]
    ExtraDir,
}

impl ChangeKind {
    /// Whether the selective replayer copies entries of this kind.
    /// Extra entries are informational; the replayer never deletes.
    #[must_use]
    pub fn is_copyable(&self) -> bool {
        matches!(
            self,
            ChangeKind::NewFile | ChangeKind::Older | ChangeKind::Newer
        )
    }
}

/// One line of a persisted replay plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEntry {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    #[serde(rename = "size")]
    pub size_hint: u64,
    #[serde(rename = "path")]
    pub relative_path: String,
}

/// Persisted dry-run plan: the authoritative change-set consumed by the
/// selective replayer. Entries are relative paths resolvable against both
/// roots; anything matching the standing skip-policy was omitted at
/// generation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeSet {
    pub source: String,
    pub destination: String,
    #[serde(rename = "generatedAt")]
    pub generated_at: String,
    pub entries: Vec<ChangeEntry>,
}

/// Record of which identities a state-capture run covered, written once at
/// the end of the capture stage and read back by restore and inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureManifest {
    pub version: u32,
    #[serde(rename = "generatedAt")]
    pub generated_at: String,
    #[serde(rename = "sourceComputer")]
    pub source_computer: String,
    pub identities: Vec<String>,
}

/// Current manifest schema version.
pub const MANIFEST_VERSION: u32 = 1;

/// Stage outcome surfaced on the session audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageStatus {
    Pending,
    Running,
    Ok,
    Warn,
    Error,
    Skipped,
}

impl StageStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            StageStatus::Pending => "pending",
            StageStatus::Running => "running",
            StageStatus::Ok => "ok",
            StageStatus::Warn => "warn",
            StageStatus::Error => "error",
            StageStatus::Skipped => "skipped",
        }
    }
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-stage execution record on the session audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRun {
    pub stage: String,
    pub status: StageStatus,
    pub detail: String,
}

/// Per-profile usage figures reported by the inventory stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileUsage {
    pub profile: String,
    pub size_bytes: u64,
    pub file_count: u64,
    pub dir_count: u64,
}

/// Inventory stage report, persisted as JSON beside the session logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryReport {
    #[serde(rename = "generatedAt")]
    pub generated_at: String,
    #[serde(rename = "sourceRoot")]
    pub source_root: String,
    pub profiles: Vec<ProfileUsage>,
}
