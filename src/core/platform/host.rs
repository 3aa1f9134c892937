use std::path::{Path, PathBuf};

use tokio::runtime::Handle;
use tracing::info;

use super::ExitCode;
use crate::core::config::ConfigurationInfo;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::version::Version;

/// Everything the core needs from the shell hosting it.
///
/// The core is UI-agnostic: presentation lives behind this trait and the
/// event channel, never inside the launcher.
pub trait Host: Send + Sync {
    /// Runtime on which background downloads and installs are spawned.
    fn request_scheduler(&self) -> Handle {
        Handle::current()
    }

    /// Sandboxed storage root on non-desktop platforms.
    fn request_platform_data_path(&self) -> Option<PathBuf> {
        None
    }

    /// Install/launch intent for platforms that cannot exec a file directly.
    fn platform_launch(&self, path: &Path) -> LauncherResult<()> {
        Err(LauncherError::Platform(format!(
            "no platform launcher registered for {:?}",
            path
        )))
    }

    /// Ask the user whether `version` of `config` should be installed.
    /// Updates without asking unless the shell overrides it.
    fn confirm_update(&self, _config: &ConfigurationInfo, _version: &Version) -> bool {
        true
    }

    /// Start the freshly replaced launcher before the current one quits.
    /// Respawns this executable with the same arguments by default.
    fn restart(&self) -> LauncherResult<()> {
        crate::core::self_update::replace::restart_current_process()
    }

    fn quit(&self, code: ExitCode);
}

/// Stock host for a plain process: quitting exits with the code.
#[derive(Debug, Default, Clone)]
pub struct ProcessHost;

impl Host for ProcessHost {
    fn quit(&self, code: ExitCode) {
        info!("Exiting with code {} ({:?})", code.code(), code);
        std::process::exit(code.code());
    }
}
