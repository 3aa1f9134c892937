use serde::Serialize;
use tracing::{info, warn};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::launcher::{InstallOptions, InstallOutcome, LauncherState};
use crate::core::state::AppState;
use crate::core::version::Version;

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UpdateCheck {
    UpToDate { version: Version },
    Installed { outcome: InstallOutcome },
    Busy { state: LauncherState },
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StartupOutcome {
    /// The launcher replaced itself and is restarting.
    Restarting,
    Launched,
    Checked { result: UpdateCheck },
}

/// Startup sequence: self-update first, then either auto-launch or an
/// update check for the main profile.
pub async fn startup(state: &AppState) -> LauncherResult<StartupOutcome> {
    let main = &state.main;

    main.begin_self_update_check();
    let restarted = match state.self_updater.try_update_self().await {
        Ok(restarted) => restarted,
        Err(e) => {
            warn!("Self-update skipped: {}", e);
            false
        }
    };
    if restarted {
        return Ok(StartupOutcome::Restarting);
    }
    main.end_self_update_check();
    main.refresh_version();

    if main.auto_launch() {
        info!("Auto launch enabled for '{}'", main.config().name);
        launch(state, true).await?;
        return Ok(StartupOutcome::Launched);
    }

    let result = check_for_updates(state).await?;
    Ok(StartupOutcome::Checked { result })
}

/// Install when a newer build exists or nothing usable is installed.
pub async fn check_for_updates(state: &AppState) -> LauncherResult<UpdateCheck> {
    let main = &state.main;

    let available = main.is_update_available().await;
    if !available && !main.needs_install() {
        info!("'{}' is up to date ({})", main.config().name, main.local_version());
        return Ok(UpdateCheck::UpToDate {
            version: main.local_version(),
        });
    }

    let Some(handle) = main.install_program_files(InstallOptions::default()) else {
        return Ok(UpdateCheck::Busy {
            state: main.status(),
        });
    };

    let outcome = handle
        .await
        .map_err(|e| LauncherError::Other(format!("install task: {e}")))?;
    Ok(UpdateCheck::Installed { outcome })
}

/// Launch the program, installing first when required.
///
/// With `force_update` a pending update is installed without asking;
/// otherwise the host is asked and a refusal launches the current build.
pub async fn launch(state: &AppState, force_update: bool) -> LauncherResult<()> {
    let main = &state.main;

    let available = main.is_update_available().await;
    let needs_install = main.needs_install();
    if !available && !needs_install {
        return main.launch_program();
    }

    let install = force_update
        || needs_install
        || main
            .host()
            .confirm_update(&main.config(), &main.latest_version());
    if !install {
        info!("Update declined; launching installed build");
        return main.launch_program();
    }

    let handle = main
        .install_program_files(InstallOptions {
            launch_after: true,
            ..InstallOptions::default()
        })
        .ok_or_else(|| LauncherError::InvalidState(main.status().to_string()))?;

    match handle
        .await
        .map_err(|e| LauncherError::Other(format!("install task: {e}")))?
    {
        InstallOutcome::Installed { launched: true, .. } | InstallOutcome::Finalizing { .. } => {
            Ok(())
        }
        InstallOutcome::Installed { .. } => Err(LauncherError::Other(format!(
            "installed but could not launch {:?}",
            main.launch_file_path()
        ))),
        InstallOutcome::Failed { reason } => Err(LauncherError::Other(reason)),
    }
}
