//! Replay plan (`ChangeSet`) JSON persistence
//!
//! The on-disk shape is an external contract consumed by the selective
//! replayer and must stay parseable across sessions: `source`,
//! `destination`, `generatedAt`, and an `entries` array of
//! `{type, size, path}` objects.

use crate::models::ChangeSet;
use crate::{Error, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Write a change-set plan to a JSON file, creating parent directories.
pub fn write_plan(path: &Path, plan: &ChangeSet) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, plan)
        .map_err(|e| Error::Malformed(format!("Failed to serialize plan: {e}")))?;
    Ok(())
}

/// Read a change-set plan back from a JSON file.
///
/// A zero-entry plan is a valid plan; an unparsable file is `Malformed` and
/// the operator must re-generate it rather than have the system guess.
pub fn read_plan(path: &Path) -> Result<ChangeSet> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader).map_err(|e| {
        Error::Malformed(format!(
            "Failed to parse plan file {}: {e}",
            path.display()
        ))
    })
}
