// ─── Self-Replace ───
// Moves a staged launcher build over the live installation.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::core::config::BUILD_DIR_PREFIX;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::launch::{ensure_executable, spawn_detached};

pub const REPLACE_SCRIPT_NAME: &str = "self-update.bat";
const RESTART_GRACE: Duration = Duration::from_millis(500);

/// Delete staged directories that must never land on the live install:
/// the settings directory and every `Build - *` directory.
pub fn prune_staging(staging: &Path, settings_dir_name: &OsStr) -> LauncherResult<Vec<PathBuf>> {
    let mut removed = Vec::new();
    if !staging.is_dir() {
        return Ok(removed);
    }

    let entries = std::fs::read_dir(staging).map_err(|e| LauncherError::io(staging, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| LauncherError::io(staging, e))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }

        let name = entry.file_name();
        let is_build = name.to_string_lossy().starts_with(BUILD_DIR_PREFIX);
        if name == settings_dir_name || is_build {
            std::fs::remove_dir_all(&path).map_err(|e| LauncherError::io(&path, e))?;
            debug!("Pruned {:?} from staging", path);
            removed.push(path);
        }
    }

    Ok(removed)
}

/// Batch file that waits for the launcher to exit, moves the staged tree
/// over `root`, relaunches `launcher_name` and deletes itself.
pub fn replace_script_contents(update: &Path, root: &Path, launcher_name: &str) -> String {
    [
        "TIMEOUT /t 1 /nobreak > NUL".to_string(),
        format!(
            "robocopy \"{}\" \"{}\" /MOVE /E",
            update.display(),
            root.display()
        ),
        format!("RD /S /Q \"{}\"", update.display()),
        format!("DEL \"%~f0\" & START \"\" /B \"{}\"", launcher_name),
    ]
    .join("\r\n")
}

pub fn write_replace_script(root: &Path, update: &Path, launcher_name: &str) -> LauncherResult<PathBuf> {
    let script = root.join(REPLACE_SCRIPT_NAME);
    let mut body = replace_script_contents(update, root, launcher_name);
    body.push_str("\r\n");
    std::fs::write(&script, body).map_err(|e| LauncherError::io(&script, e))?;
    info!("Wrote self-replace script {:?}", script);
    Ok(script)
}

/// Hand the script to `cmd` in a detached process.
pub fn spawn_replace_script(script: &Path) -> LauncherResult<()> {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(script);
    if let Some(dir) = script.parent() {
        cmd.current_dir(dir);
    }
    spawn_detached(&mut cmd).map(drop)
}

/// Move everything under `staging` into `root` and remove `staging`.
///
/// A staged file named like the running binary replaces it by rename after
/// the old one is moved aside to `<name>.bak`; the running image is never
/// written to. Returns the number of top-level entries applied.
pub fn apply_staged_files(
    staging: &Path,
    root: &Path,
    running_exe: Option<&Path>,
) -> LauncherResult<usize> {
    let running_name = running_exe.and_then(Path::file_name);
    let entries = std::fs::read_dir(staging).map_err(|e| LauncherError::io(staging, e))?;

    let mut applied = 0;
    for entry in entries {
        let entry = entry.map_err(|e| LauncherError::io(staging, e))?;
        let src = entry.path();
        let dest = root.join(entry.file_name());
        let file_type = entry.file_type().map_err(|e| LauncherError::io(&src, e))?;

        if file_type.is_dir() {
            move_dir(&src, &dest)?;
        } else if Some(entry.file_name().as_os_str()) == running_name {
            swap_running_binary(&src, &dest)?;
        } else {
            move_file(&src, &dest)?;
        }
        applied += 1;
    }

    if let Err(e) = std::fs::remove_dir_all(staging) {
        warn!("Could not remove staging dir {:?}: {}", staging, e);
    }

    info!("Applied {} staged entries from {:?} to {:?}", applied, staging, root);
    Ok(applied)
}

fn move_file(src: &Path, dest: &Path) -> LauncherResult<()> {
    if dest.is_dir() {
        std::fs::remove_dir_all(dest).map_err(|e| LauncherError::io(dest, e))?;
    } else if dest.exists() {
        std::fs::remove_file(dest).map_err(|e| LauncherError::io(dest, e))?;
    }

    if std::fs::rename(src, dest).is_err() {
        // Cross-device: fall back to copy.
        std::fs::copy(src, dest).map_err(|e| LauncherError::io(dest, e))?;
        std::fs::remove_file(src).map_err(|e| LauncherError::io(src, e))?;
    }
    Ok(())
}

fn move_dir(src: &Path, dest: &Path) -> LauncherResult<()> {
    if !dest.exists() && std::fs::rename(src, dest).is_ok() {
        return Ok(());
    }

    std::fs::create_dir_all(dest).map_err(|e| LauncherError::io(dest, e))?;
    copy_dir_recursive(src, dest)?;
    std::fs::remove_dir_all(src).map_err(|e| LauncherError::io(src, e))
}

fn swap_running_binary(src: &Path, dest: &Path) -> LauncherResult<()> {
    let mut backup = dest.as_os_str().to_os_string();
    backup.push(".bak");
    let backup = PathBuf::from(backup);

    if dest.exists() {
        if backup.exists() {
            std::fs::remove_file(&backup).map_err(|e| LauncherError::io(&backup, e))?;
        }
        std::fs::rename(dest, &backup).map_err(|e| LauncherError::io(dest, e))?;
    }

    move_file(src, dest)?;
    ensure_executable(dest)?;
    info!("Swapped running binary {:?} (previous kept at {:?})", dest, backup);
    Ok(())
}

/// Merge `source` into `destination`, overwriting files.
pub fn copy_dir_recursive(source: &Path, destination: &Path) -> LauncherResult<()> {
    let entries = std::fs::read_dir(source).map_err(|e| LauncherError::io(source, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| LauncherError::io(source, e))?;
        let src_path = entry.path();
        let dst_path = destination.join(entry.file_name());
        let file_type = entry.file_type().map_err(|e| LauncherError::io(&src_path, e))?;

        if file_type.is_dir() {
            std::fs::create_dir_all(&dst_path).map_err(|e| LauncherError::io(&dst_path, e))?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else if file_type.is_file() {
            if dst_path.exists() {
                std::fs::remove_file(&dst_path).map_err(|e| LauncherError::io(&dst_path, e))?;
            }
            std::fs::copy(&src_path, &dst_path).map_err(|e| LauncherError::io(&dst_path, e))?;
        }
    }

    Ok(())
}

/// Start a fresh copy of this program with the same arguments, then give
/// it a moment before the caller exits.
pub fn restart_current_process() -> LauncherResult<()> {
    let exe = std::env::current_exe().map_err(|e| LauncherError::io("<current exe>", e))?;
    let mut cmd = Command::new(&exe);
    cmd.args(std::env::args_os().skip(1));
    if let Some(dir) = exe.parent() {
        cmd.current_dir(dir);
    }

    spawn_detached(&mut cmd)?;
    info!("Spawned replacement process {:?}", exe);
    std::thread::sleep(RESTART_GRACE);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path, contents: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[test]
    fn prune_removes_settings_and_builds_only() {
        let temp = tempfile::tempdir().unwrap();
        let staging = temp.path().join("self-update");
        touch(&staging.join("Settings/Profile 1.txt"), "x");
        touch(&staging.join("Build - Game/Game.exe"), "x");
        touch(&staging.join("lib/core.dll"), "x");
        touch(&staging.join("launchkit.exe"), "x");

        let removed = prune_staging(&staging, OsStr::new("Settings")).unwrap();

        assert_eq!(removed.len(), 2);
        assert!(!staging.join("Settings").exists());
        assert!(!staging.join("Build - Game").exists());
        assert!(staging.join("lib/core.dll").exists());
        assert!(staging.join("launchkit.exe").exists());
    }

    #[test]
    fn prune_of_missing_staging_is_empty() {
        let temp = tempfile::tempdir().unwrap();
        let removed = prune_staging(&temp.path().join("nope"), OsStr::new("Settings")).unwrap();
        assert!(removed.is_empty());
    }

    #[test]
    fn script_moves_tree_and_relaunches() {
        let script = replace_script_contents(
            Path::new(r"C:\Apps\Launcher\self-update"),
            Path::new(r"C:\Apps\Launcher"),
            "launchkit.exe",
        );
        let lines: Vec<&str> = script.split("\r\n").collect();
        assert_eq!(
            lines,
            vec![
                "TIMEOUT /t 1 /nobreak > NUL",
                r#"robocopy "C:\Apps\Launcher\self-update" "C:\Apps\Launcher" /MOVE /E"#,
                r#"RD /S /Q "C:\Apps\Launcher\self-update""#,
                r#"DEL "%~f0" & START "" /B "launchkit.exe""#,
            ]
        );
    }

    #[test]
    fn script_is_written_at_root() {
        let temp = tempfile::tempdir().unwrap();
        let path =
            write_replace_script(temp.path(), &temp.path().join("self-update"), "launchkit.exe")
                .unwrap();
        assert_eq!(path, temp.path().join(REPLACE_SCRIPT_NAME));
        assert!(std::fs::read_to_string(path).unwrap().ends_with("\r\n"));
    }

    #[test]
    fn apply_merges_into_root() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        let staging = root.join("self-update");
        touch(&root.join("lib/old.so"), "old");
        touch(&root.join("lib/shared.so"), "v1");
        touch(&root.join("readme.txt"), "v1");
        touch(&staging.join("lib/shared.so"), "v2");
        touch(&staging.join("readme.txt"), "v2");
        touch(&staging.join("assets/icon.png"), "png");

        let applied = apply_staged_files(&staging, root, None).unwrap();

        assert_eq!(applied, 3);
        assert_eq!(std::fs::read_to_string(root.join("lib/shared.so")).unwrap(), "v2");
        assert_eq!(std::fs::read_to_string(root.join("lib/old.so")).unwrap(), "old");
        assert_eq!(std::fs::read_to_string(root.join("readme.txt")).unwrap(), "v2");
        assert!(root.join("assets/icon.png").exists());
        assert!(!staging.exists());
    }

    #[test]
    fn running_binary_is_swapped_by_rename() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        let staging = root.join("self-update");
        let exe = root.join("launchkit");
        touch(&exe, "old binary");
        touch(&staging.join("launchkit"), "new binary");

        apply_staged_files(&staging, root, Some(&exe)).unwrap();

        assert_eq!(std::fs::read_to_string(&exe).unwrap(), "new binary");
        assert_eq!(
            std::fs::read_to_string(root.join("launchkit.bak")).unwrap(),
            "old binary"
        );
    }
}
