//! Size measurement for the inventory stage
//!
//! Logical sizes come from metadata; physical sizes use platform-specific
//! allocation accounting (512-byte blocks on Unix, compressed file size on
//! Windows). Symlinks and reparse points are never followed.

use crate::models::ProfileUsage;
use std::fs::Metadata;
use std::io;
use std::path::Path;

/// Logical file size from metadata.
#[must_use]
pub fn logical_size(metadata: &Metadata) -> u64 {
    metadata.len()
}

/// Physical size from metadata (Unix): allocated 512-byte blocks.
#[cfg(unix)]
#[must_use]
pub fn physical_size(path: &Path, metadata: &Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    let _ = path;
    metadata.blocks() * 512
}

/// Physical size (Windows): actual on-disk usage via the compressed size
/// query, falling back to logical size on error.
#[cfg(windows)]
#[must_use]
pub fn physical_size(path: &Path, metadata: &Metadata) -> u64 {
    use std::os::windows::ffi::OsStrExt;
    use windows_sys::Win32::Storage::FileSystem::GetCompressedFileSizeW;

    const INVALID_FILE_SIZE: u32 = 0xFFFF_FFFF;

    let wide: Vec<u16> = path
        .as_os_str()
        .encode_wide()
        .chain(std::iter::once(0))
        .collect();

    let mut high: u32 = 0;
    let low = unsafe { GetCompressedFileSizeW(wide.as_ptr(), &mut high) };

    if low == INVALID_FILE_SIZE {
        metadata.len()
    } else {
        (u64::from(high) << 32) | u64::from(low)
    }
}

#[cfg(not(any(unix, windows)))]
#[must_use]
pub fn physical_size(_path: &Path, metadata: &Metadata) -> u64 {
    metadata.len()
}

/// Measure one profile directory: total physical bytes plus file and
/// directory counts. Unreadable children are logged and skipped so one bad
/// ACL never sinks the whole inventory.
pub fn measure_profile(root: &Path, profile: &str) -> io::Result<ProfileUsage> {
    let mut usage = ProfileUsage {
        profile: profile.to_string(),
        size_bytes: 0,
        file_count: 0,
        dir_count: 0,
    };
    walk(root, &mut usage)?;
    Ok(usage)
}

fn walk(dir: &Path, usage: &mut ProfileUsage) -> io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                log::warn!("Inventory skipped unreadable entry in {}: {e}", dir.display());
                continue;
            }
        };
        let path = entry.path();
        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                log::warn!("Inventory skipped {}: {e}", path.display());
                continue;
            }
        };
        if metadata.is_symlink() {
            continue;
        }
        if metadata.is_dir() {
            usage.dir_count += 1;
            if let Err(e) = walk(&path, usage) {
                log::warn!("Inventory skipped subtree {}: {e}", path.display());
            }
        } else {
            usage.file_count += 1;
            usage.size_bytes += physical_size(&path, &metadata);
        }
    }
    Ok(())
}
