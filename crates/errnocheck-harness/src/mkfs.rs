//! Block device formatting.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::SetupError;

/// Directories searched when `mkfs.*` is not on `PATH` (common for non-root shells).
const SBIN_DIRS: &[&str] = &["/sbin", "/usr/sbin", "/usr/local/sbin"];

/// Locate the `mkfs.<fs_type>` helper.
pub fn find_mkfs(fs_type: &str) -> Result<PathBuf, SetupError> {
    let name = format!("mkfs.{fs_type}");
    if let Ok(path) = which::which(&name) {
        return Ok(path);
    }
    SBIN_DIRS
        .iter()
        .map(|dir| Path::new(dir).join(&name))
        .find(|path| path.exists())
        .ok_or_else(|| SetupError::MkfsNotFound {
            fs_type: fs_type.to_owned(),
        })
}

/// Flags that make the helper overwrite an existing filesystem without asking.
fn force_args(fs_type: &str) -> &'static [&'static str] {
    match fs_type {
        "ext2" | "ext3" | "ext4" => &["-F", "-q"],
        "xfs" | "btrfs" => &["-f", "-q"],
        _ => &[],
    }
}

/// Create a fresh `fs_type` filesystem on `device`.
pub fn format(device: &Path, fs_type: &str) -> Result<(), SetupError> {
    let mkfs = find_mkfs(fs_type)?;
    tracing::info!(device = %device.display(), fs_type, "formatting device");

    let output = Command::new(&mkfs)
        .args(force_args(fs_type))
        .arg(device)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| SetupError::Mkfs {
            fs_type: fs_type.to_owned(),
            device: device.to_path_buf(),
            reason: format!("spawn {}: {e}", mkfs.display()),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SetupError::Mkfs {
            fs_type: fs_type.to_owned(),
            device: device.to_path_buf(),
            reason: format!("{}: {}", output.status, stderr.trim()),
        });
    }
    Ok(())
}
