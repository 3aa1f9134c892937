use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::archive::{extract_zip_file, has_entry_with_suffix, is_zip_valid};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::launch::ensure_executable;

/// How hard to try deleting the archive after extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for CleanupPolicy {
    fn default() -> Self {
        Self {
            attempts: 12,
            interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InstallKind {
    /// Archive unpacked into the build directory.
    Extracted { entries: usize },
    /// Archive held no runnable entry and was itself moved into place.
    MovedExecutable { path: PathBuf },
}

/// Validate `zip_path` and install it into `build_dir`.
///
/// Blocking; callers on the runtime go through `spawn_blocking`.
pub fn install_artifact(
    zip_path: &Path,
    build_dir: &Path,
    runnable_extension: &str,
    cleanup: &CleanupPolicy,
) -> LauncherResult<InstallKind> {
    if !is_zip_valid(zip_path) {
        return Err(LauncherError::InvalidArchive(zip_path.to_path_buf()));
    }

    if !has_entry_with_suffix(zip_path, runnable_extension)? {
        let path = move_as_executable(zip_path, build_dir, runnable_extension)?;
        info!("Archive had no '{}' entry; installed it as {:?}", runnable_extension, path);
        return Ok(InstallKind::MovedExecutable { path });
    }

    let entries = extract_zip_file(zip_path, build_dir)?;
    info!("Extracted {} files into {:?}", entries, build_dir);

    if !remove_with_retry(zip_path, cleanup) {
        warn!(
            "Could not delete {:?} after {} attempts; leaving it behind",
            zip_path, cleanup.attempts
        );
    }

    Ok(InstallKind::Extracted { entries })
}

/// `{build_dir}/{zip stem}{extension}`, replacing whatever is there.
fn move_as_executable(
    zip_path: &Path,
    build_dir: &Path,
    runnable_extension: &str,
) -> LauncherResult<PathBuf> {
    std::fs::create_dir_all(build_dir).map_err(|e| LauncherError::io(build_dir, e))?;

    let stem = zip_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| LauncherError::Other(format!("archive path {:?} has no file name", zip_path)))?;
    let dest = build_dir.join(format!("{stem}{runnable_extension}"));

    if dest.is_dir() {
        std::fs::remove_dir_all(&dest).map_err(|e| LauncherError::io(&dest, e))?;
    } else if dest.exists() {
        std::fs::remove_file(&dest).map_err(|e| LauncherError::io(&dest, e))?;
    }

    if let Err(e) = std::fs::rename(zip_path, &dest) {
        debug!("rename {:?} -> {:?} failed ({}); copying instead", zip_path, dest, e);
        std::fs::copy(zip_path, &dest).map_err(|e| LauncherError::io(&dest, e))?;
        std::fs::remove_file(zip_path).map_err(|e| LauncherError::io(zip_path, e))?;
    }

    ensure_executable(&dest)?;
    Ok(dest)
}

/// Delete `path`, retrying while something still holds it open.
pub fn remove_with_retry(path: &Path, policy: &CleanupPolicy) -> bool {
    for attempt in 1..=policy.attempts {
        match std::fs::remove_file(path) {
            Ok(()) => {
                debug!("Deleted {:?} on attempt {}", path, attempt);
                return true;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return true,
            Err(e) => {
                warn!(
                    "Delete attempt {}/{} for {:?} failed: {}",
                    attempt, policy.attempts, path, e
                );
                if attempt < policy.attempts {
                    std::thread::sleep(policy.interval);
                }
            }
        }
    }
    false
}
