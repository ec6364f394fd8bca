//! Bulk-copy backend exit-code taxonomy
//!
//! The backend reports status as a bitmask: bit 0 = files were copied,
//! bit 1 = extra files or directories were detected, bit 2 = mismatched
//! files or attributes were detected. Any bit at position 3 or above marks
//! a true failure, so codes below 8 are non-fatal and codes 8 and up mean
//! the stage must not proceed assuming success.

/// First exit code that carries a failure bit.
pub const FATAL_THRESHOLD: i32 = 8;

/// Coarse classification of one backend exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitClass {
    /// Nothing copied, nothing unexpected: trees already synchronized.
    Success,
    /// Work happened or anomalies were noted, but no failure bit is set.
    NonFatal,
    /// At least one failure bit is set.
    Fatal,
}

/// Whether the stage must treat this exit code as a hard failure.
#[must_use]
pub fn is_fatal(code: i32) -> bool {
    code >= FATAL_THRESHOLD
}

/// Classify an exit code per the bitmask convention.
#[must_use]
pub fn classify(code: i32) -> ExitClass {
    if is_fatal(code) {
        ExitClass::Fatal
    } else if code == 0 {
        ExitClass::Success
    } else {
        ExitClass::NonFatal
    }
}

/// Decode an exit code into its documented human explanation.
#[must_use]
pub fn decode(code: i32) -> String {
    if is_fatal(code) {
        return format!("fatal failure (exit code {code})");
    }
    if code == 0 {
        return "no files copied; source and destination are synchronized".to_string();
    }
    let mut parts = Vec::new();
    if code & 0b001 != 0 {
        parts.push("files were copied");
    }
    if code & 0b010 != 0 {
        parts.push("extra files or directories were detected");
    }
    if code & 0b100 != 0 {
        parts.push("mismatched files or attributes were detected");
    }
    parts.join("; ")
}
