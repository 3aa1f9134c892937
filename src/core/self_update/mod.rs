pub mod replace;

use std::ffi::OsString;
use std::sync::Arc;

use tracing::{info, warn};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::launcher::{InstallOptions, InstallOutcome, Launcher};
use crate::core::platform::ExitCode;
use crate::core::version::{fetch_remote_version, Version};

pub use replace::{apply_staged_files, prune_staging, replace_script_contents};

/// Staging directory the self-updater installs into, under the root.
pub const STAGING_DIR_NAME: &str = "self-update";
pub const SELF_UPDATE_ZIP: &str = "self-update.zip";

/// Keeps the launcher program itself up to date.
pub struct SelfUpdater {
    launcher: Arc<Launcher>,
    running_version: Version,
}

impl SelfUpdater {
    /// `launcher` must have been built with `self_updater(true)`.
    pub fn new(launcher: Arc<Launcher>) -> Self {
        Self {
            launcher,
            running_version: Version::parse(env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn with_running_version(mut self, version: Version) -> Self {
        self.running_version = version;
        self
    }

    pub fn launcher(&self) -> &Arc<Launcher> {
        &self.launcher
    }

    pub fn running_version(&self) -> Version {
        self.running_version
    }

    /// Check for a newer launcher and install it.
    ///
    /// Returns `true` when a self-update was applied and the host has been
    /// asked to quit for the restart.
    pub async fn try_update_self(&self) -> LauncherResult<bool> {
        if !self.launcher.is_self_updater() {
            return Err(LauncherError::InvalidState(
                "launcher is not a self-updater".into(),
            ));
        }
        if !self.launcher.platform().is_desktop() {
            return Ok(false);
        }

        let config = self.launcher.config();
        let remote = match fetch_remote_version(self.launcher.client(), &config.version_link).await
        {
            Ok(remote) => remote,
            Err(e) => {
                warn!("Self-update check failed: {}", e);
                return Ok(false);
            }
        };

        if !remote.is_newer_than(&self.running_version) {
            info!(
                "Launcher is up to date (running {}, remote {})",
                self.running_version, remote
            );
            return Ok(false);
        }

        if !self.launcher.host().confirm_update(&config, &remote) {
            info!("Self-update to {} declined", remote);
            return Ok(false);
        }

        let Some(handle) = self.launcher.install_program_files(InstallOptions {
            version: Some(remote),
            ..InstallOptions::default()
        }) else {
            warn!("Self-updater busy ({}); skipping", self.launcher.status());
            return Ok(false);
        };

        let outcome = handle
            .await
            .map_err(|e| LauncherError::Other(format!("self-update task: {e}")))?;

        match outcome {
            InstallOutcome::Finalizing { version, .. } => {
                info!("Launcher {} staged; replacing and restarting", version);
                self.update_self_and_restart()?;
                Ok(true)
            }
            InstallOutcome::Failed { reason } => {
                warn!("Self-update failed: {}", reason);
                self.launcher.reset();
                Ok(false)
            }
            InstallOutcome::Installed { .. } => Ok(false),
        }
    }

    /// Replace the running installation with the staged build and restart.
    pub fn update_self_and_restart(&self) -> LauncherResult<()> {
        let root = self.launcher.root().to_path_buf();
        let staging = self.launcher.build_path();
        let settings_dir_name: OsString = self
            .launcher
            .settings_path()
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();

        if !self.launcher.mark_restarting() {
            info!("Self-replace requested while {}", self.launcher.status());
        }

        replace::prune_staging(&staging, &settings_dir_name)?;

        let exe = std::env::current_exe().ok();
        if self.launcher.platform().locks_running_executables() {
            let launcher_name = exe
                .as_deref()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| format!("{}.exe", env!("CARGO_PKG_NAME")));
            let script = replace::write_replace_script(&root, &staging, &launcher_name)?;
            replace::spawn_replace_script(&script)?;
        } else {
            replace::apply_staged_files(&staging, &root, exe.as_deref())?;
            self.launcher.host().restart()?;
        }

        self.launcher.host().quit(ExitCode::SelfUpdate);
        Ok(())
    }
}
