// ─── Launch Task ───
// Spawns installed builds and helper processes detached from the launcher.

use std::path::Path;
use std::process::{Child, Command, Stdio};

#[cfg(target_os = "windows")]
use std::os::windows::process::CommandExt;

use tracing::{debug, info};

use crate::core::error::{LauncherError, LauncherResult};

/// Start the installed program at `path`.
///
/// The working directory is the program's own folder. Returns right after
/// spawning; the launcher is expected to quit afterwards.
pub fn launch_program(path: &Path) -> LauncherResult<Child> {
    if !path.exists() {
        return Err(LauncherError::Other(format!(
            "launch file {:?} does not exist",
            path
        )));
    }

    let mut cmd = program_command(path)?;
    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        cmd.current_dir(dir);
    }

    info!("Launching {:?}", path);
    spawn_detached(&mut cmd)
}

#[cfg(target_os = "macos")]
fn program_command(path: &Path) -> LauncherResult<Command> {
    // `.app` bundles are directories; LaunchServices knows how to open them.
    if path.is_dir() {
        let mut cmd = Command::new("open");
        cmd.arg(path);
        return Ok(cmd);
    }
    ensure_executable(path)?;
    Ok(Command::new(path))
}

#[cfg(not(target_os = "macos"))]
fn program_command(path: &Path) -> LauncherResult<Command> {
    ensure_executable(path)?;
    Ok(Command::new(path))
}

/// Spawn `cmd` with no inherited stdio so it outlives the launcher.
pub fn spawn_detached(cmd: &mut Command) -> LauncherResult<Child> {
    configure_platform_spawn(cmd);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::null());
    cmd.stderr(Stdio::null());

    debug!("Command (copy/paste): {}", format_command_for_logs(cmd));

    cmd.spawn().map_err(|e| {
        LauncherError::Platform(format!(
            "failed to spawn {}: {}",
            cmd.get_program().to_string_lossy(),
            e
        ))
    })
}

/// Give owner/group/other execute permission to a regular file. No-op off Unix.
pub fn ensure_executable(path: &Path) -> LauncherResult<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let metadata = std::fs::metadata(path).map_err(|e| LauncherError::io(path, e))?;
        if !metadata.is_file() {
            return Ok(());
        }
        let mut perms = metadata.permissions();
        if perms.mode() & 0o111 != 0o111 {
            perms.set_mode(perms.mode() | 0o755);
            std::fs::set_permissions(path, perms).map_err(|e| LauncherError::io(path, e))?;
        }
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

fn configure_platform_spawn(cmd: &mut Command) {
    #[cfg(target_os = "windows")]
    {
        const DETACHED_PROCESS: u32 = 0x0000_0008;
        const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
        cmd.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
    }
    #[cfg(not(target_os = "windows"))]
    let _ = cmd;
}

pub fn format_command_for_logs(cmd: &Command) -> String {
    let program = shell_escape(&cmd.get_program().to_string_lossy());
    let args = cmd
        .get_args()
        .map(|arg| shell_escape(&arg.to_string_lossy()))
        .collect::<Vec<_>>()
        .join(" ");

    if args.is_empty() {
        program
    } else {
        format!("{} {}", program, args)
    }
}

fn shell_escape(raw: &str) -> String {
    if raw.is_empty() {
        return "\"\"".to_string();
    }

    if raw.chars().all(|ch| {
        ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | '/' | ':' | '\\' | '=')
    }) {
        return raw.to_string();
    }

    format!("\"{}\"", raw.replace('"', "\\\""))
}
