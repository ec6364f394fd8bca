//! Capture manifest JSON persistence
//!
//! Written once at the end of a state-capture stage; read by the cutover
//! restore pass and by the show-manifest inspection command. A new capture
//! overwrites the previous manifest.

use crate::models::{CaptureManifest, MANIFEST_VERSION};
use crate::{Error, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

/// Well-known manifest file name inside the capture store.
pub const MANIFEST_FILE: &str = "capture-manifest.json";

/// Manifest location for a given store path.
#[must_use]
pub fn manifest_path(store: &Path) -> PathBuf {
    store.join(MANIFEST_FILE)
}

/// Build a manifest for the identities captured in this run.
#[must_use]
pub fn build_manifest(source_computer: &str, identities: Vec<String>) -> CaptureManifest {
    CaptureManifest {
        version: MANIFEST_VERSION,
        generated_at: super::logs::now_rfc3339(),
        source_computer: source_computer.to_string(),
        identities,
    }
}

/// Write the manifest into the store, overwriting any previous capture's.
pub fn write_manifest(store: &Path, manifest: &CaptureManifest) -> Result<()> {
    std::fs::create_dir_all(store)?;
    let file = File::create(manifest_path(store))?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, manifest)
        .map_err(|e| Error::Malformed(format!("Failed to serialize manifest: {e}")))?;
    Ok(())
}

/// Read the manifest back from the store.
pub fn read_manifest(store: &Path) -> Result<CaptureManifest> {
    let path = manifest_path(store);
    let file = File::open(&path)?;
    let reader = BufReader::new(file);
    let manifest: CaptureManifest = serde_json::from_reader(reader).map_err(|e| {
        Error::Malformed(format!(
            "Failed to parse manifest {}: {e}",
            path.display()
        ))
    })?;
    if manifest.version > MANIFEST_VERSION {
        return Err(Error::Malformed(format!(
            "Manifest version {} is newer than supported version {MANIFEST_VERSION}",
            manifest.version
        )));
    }
    Ok(manifest)
}
