//! Transfer log paths, timestamps, and the session telemetry event stream
//!
//! Every backend invocation owns a distinct append-only log file under the
//! session log directory, so concurrent transfers never contend on the same
//! file and an operator can tail a log while the transfer is still running.

use crate::models::StageStatus;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Render a `SystemTime` as an RFC3339 UTC timestamp.
#[must_use]
pub fn rfc3339_utc(t: SystemTime) -> String {
    let secs = t
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs() as i64);
    let (date, tod) = (secs.div_euclid(86_400), secs.rem_euclid(86_400));
    let (y, m, d) = civil_from_days(date);
    format!(
        "{y:04}-{m:02}-{d:02}T{:02}:{:02}:{:02}Z",
        tod / 3600,
        (tod % 3600) / 60,
        tod % 60
    )
}

/// Current time as RFC3339 UTC.
#[must_use]
pub fn now_rfc3339() -> String {
    rfc3339_utc(SystemTime::now())
}

// Howard Hinnant's days-to-civil algorithm.
fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    (if m <= 2 { y + 1 } else { y }, m, d)
}

/// Compact timestamp suitable for file names: `YYYYMMDD-HHMMSS`.
#[must_use]
pub fn file_stamp(t: SystemTime) -> String {
    let secs = t
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs() as i64);
    let (date, tod) = (secs.div_euclid(86_400), secs.rem_euclid(86_400));
    let (y, m, d) = civil_from_days(date);
    format!(
        "{y:04}{m:02}{d:02}-{:02}{:02}{:02}",
        tod / 3600,
        (tod % 3600) / 60,
        tod % 60
    )
}

static LOG_SEQ: AtomicU64 = AtomicU64::new(0);

/// Derive a distinct log path for one transfer invocation from the session
/// log directory, a timestamp, and a stage/profile label. A process-wide
/// sequence number keeps paths distinct when transfers start within the
/// same second.
#[must_use]
pub fn transfer_log_path(log_dir: &Path, label: &str) -> PathBuf {
    let seq = LOG_SEQ.fetch_add(1, Ordering::Relaxed);
    let stamp = file_stamp(SystemTime::now());
    log_dir.join(format!("{stamp}-{:03}-{}.log", seq, sanitize_label(label)))
}

/// Replace path separators and other awkward characters in a label so it is
/// usable as a file name component.
#[must_use]
pub fn sanitize_label(label: &str) -> String {
    label
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | ' ' => '_',
            _ => c,
        })
        .collect()
}

/// Append one line to a log file, creating it (and its parent directory) on
/// first use.
pub fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")
}

/// One stage completion event on the session telemetry stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageEvent {
    pub timestamp: String,
    pub stage: String,
    pub status: StageStatus,
    pub detail: String,
}

/// Appends stage completion events as JSON lines to a per-session file.
#[derive(Debug, Clone)]
pub struct TelemetryWriter {
    path: PathBuf,
}

impl TelemetryWriter {
    #[must_use]
    pub fn new(log_dir: &Path) -> Self {
        Self {
            path: log_dir.join("session-events.jsonl"),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record one stage completion event. Telemetry failures are reported to
    /// the logger, never escalated: the audit trail in memory remains the
    /// source of truth.
    pub fn record(&self, stage: &str, status: StageStatus, detail: &str) {
        let event = StageEvent {
            timestamp: now_rfc3339(),
            stage: stage.to_string(),
            status,
            detail: detail.to_string(),
        };
        match serde_json::to_string(&event) {
            Ok(line) => {
                if let Err(e) = append_line(&self.path, &line) {
                    log::warn!("Failed to append telemetry event: {e}");
                }
            }
            Err(e) => log::warn!("Failed to serialize telemetry event: {e}"),
        }
    }
}
