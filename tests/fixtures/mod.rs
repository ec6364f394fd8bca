//! Test fixtures for deterministic testing

#![allow(dead_code)]

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Write a file, creating parent directories first.
pub fn write_file_sync<P: AsRef<Path>>(path: P, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.as_ref().parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::File::create(path)?;
    file.write_all(contents)
}

/// Create an executable shell script acting as a fake backend/state tool.
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> std::io::Result<PathBuf> {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    let mut file = fs::File::create(&path)?;
    writeln!(file, "#!/bin/sh")?;
    file.write_all(body.as_bytes())?;
    drop(file);
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
    Ok(path)
}

/// Fake bulk-copy backend that prints canned dry-run classification lines
/// and exits with the given code.
#[cfg(unix)]
pub fn fake_dry_run_backend(dir: &Path, lines: &[&str], exit_code: i32) -> PathBuf {
    let mut body = String::from("cat <<'EOF'\n");
    for line in lines {
        body.push_str(line);
        body.push('\n');
    }
    body.push_str("EOF\n");
    body.push_str(&format!("exit {exit_code}\n"));
    write_script(dir, "fake-backend.sh", &body).expect("Failed to write fake backend")
}

/// Fake backend that records each invocation's first argument (the source
/// path) into a call log, and exits 9 when the source contains "bad".
#[cfg(unix)]
pub fn fake_profile_backend(dir: &Path, call_log: &Path) -> PathBuf {
    let body = format!(
        "echo \"$1\" >> {}\ncase \"$1\" in\n  *bad*) exit 9 ;;\nesac\nexit 1\n",
        call_log.display()
    );
    write_script(dir, "fake-profile-backend.sh", &body).expect("Failed to write fake backend")
}

/// Fake backend that records its full argument vector, one invocation per
/// line, and exits with the given code.
#[cfg(unix)]
pub fn fake_recording_backend(dir: &Path, call_log: &Path, exit_code: i32) -> PathBuf {
    let body = format!("echo \"$@\" >> {}\nexit {exit_code}\n", call_log.display());
    write_script(dir, "fake-recording-backend.sh", &body).expect("Failed to write fake backend")
}

/// Fake state tool that records the full argument list and exits with the
/// given code.
#[cfg(unix)]
pub fn fake_state_tool(dir: &Path, name: &str, call_log: &Path, exit_code: i32) -> PathBuf {
    let body = format!("echo \"$@\" >> {}\nexit {exit_code}\n", call_log.display());
    write_script(dir, name, &body).expect("Failed to write fake state tool")
}

/// Build a minimal source tree with a Users directory per profile.
pub fn create_profile_tree(root: &Path, profiles: &[&str]) -> std::io::Result<()> {
    for profile in profiles {
        let home = root.join("Users").join(profile);
        fs::create_dir_all(home.join("Documents"))?;
        write_file_sync(home.join("Documents/notes.txt"), b"profile notes")?;
    }
    Ok(())
}
