use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::config::ProfileDefaults;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::http::build_http_client;
use crate::core::launcher::{Launcher, SETTINGS_DIR_NAME};
use crate::core::platform::paths::canonical_or_create_dir;
use crate::core::platform::{resolve_root, Host, PlatformType};
use crate::core::self_update::{SelfUpdater, SELF_UPDATE_ZIP, STAGING_DIR_NAME};

pub const SETTINGS_FILE: &str = "launcher_settings.json";

/// Host-level settings stored next to the profiles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherSettings {
    /// Written into a profile file when it has to be (re)created.
    pub profile: ProfileDefaults,
    pub self_update_version_link: String,
    pub self_update_build_link: String,
    pub profile_file: String,
    pub self_updater_config: String,
}

impl Default for LauncherSettings {
    fn default() -> Self {
        Self {
            profile: ProfileDefaults::default(),
            self_update_version_link: String::new(),
            self_update_build_link: String::new(),
            profile_file: "Profile 1.txt".to_string(),
            self_updater_config: "Launcher.config".to_string(),
        }
    }
}

pub struct AppState {
    pub root: PathBuf,
    pub settings_dir: PathBuf,
    pub launcher_settings: LauncherSettings,
    /// Launcher for the target application.
    pub main: Arc<Launcher>,
    pub self_updater: SelfUpdater,
}

impl AppState {
    pub fn new(host: Arc<dyn Host>) -> LauncherResult<Self> {
        let root = resolve_root(host.as_ref(), PlatformType::current())?;
        Self::with_root(host, &root, PlatformType::current())
    }

    pub fn with_root(host: Arc<dyn Host>, root: &Path, platform: PlatformType) -> LauncherResult<Self> {
        let root = canonical_or_create_dir(root)?;
        let settings_dir = root.join(SETTINGS_DIR_NAME);
        std::fs::create_dir_all(&settings_dir).map_err(|e| LauncherError::io(&settings_dir, e))?;

        let launcher_settings = match load_settings_from_disk(&settings_dir) {
            Some(settings) => settings,
            None => {
                let settings = LauncherSettings::default();
                if let Err(e) = write_settings(&settings_dir, &settings) {
                    warn!("Could not write default settings: {}", e);
                }
                settings
            }
        };

        let http_client = build_http_client()?;

        let main = Launcher::builder(&launcher_settings.profile_file)
            .root(&root)
            .settings_path(&settings_dir)
            .platform(platform)
            .profile_defaults(launcher_settings.profile.clone())
            .client(http_client.clone())
            .host(host.clone())
            .build()?;

        let updater = Launcher::builder(&launcher_settings.self_updater_config)
            .root(&root)
            .settings_path(&settings_dir)
            .platform(platform)
            .self_updater(true)
            .zip_path(SELF_UPDATE_ZIP)
            .build_path(STAGING_DIR_NAME)
            .self_update_links(
                launcher_settings.self_update_version_link.clone(),
                launcher_settings.self_update_build_link.clone(),
            )
            .client(http_client)
            .host(host)
            .build()?;

        info!("Launcher root {:?}", root);

        Ok(Self {
            root,
            settings_dir,
            launcher_settings,
            main: Arc::new(main),
            self_updater: SelfUpdater::new(Arc::new(updater)),
        })
    }

    pub fn settings_path(&self) -> PathBuf {
        self.settings_dir.join(SETTINGS_FILE)
    }
}

fn write_settings(settings_dir: &Path, settings: &LauncherSettings) -> LauncherResult<()> {
    let path = settings_dir.join(SETTINGS_FILE);
    let json = serde_json::to_string_pretty(settings)?;
    std::fs::write(&path, json).map_err(|e| LauncherError::io(&path, e))
}

fn load_settings_from_disk(settings_dir: &Path) -> Option<LauncherSettings> {
    let path = settings_dir.join(SETTINGS_FILE);
    let raw = std::fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&raw) {
        Ok(settings) => Some(settings),
        Err(e) => {
            warn!("Ignoring unreadable {:?}: {}", path, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::platform::{ExitCode, ProcessHost};

    struct QuietHost;

    impl Host for QuietHost {
        fn quit(&self, _code: ExitCode) {}
    }

    #[tokio::test]
    async fn first_run_writes_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let state = AppState::with_root(Arc::new(QuietHost), temp.path(), PlatformType::Linux).unwrap();

        assert_eq!(state.launcher_settings, LauncherSettings::default());
        assert!(state.settings_path().is_file());
        assert!(state.settings_dir.join("Profile 1.txt").is_file());
        assert!(!state.settings_dir.join("Launcher.config").exists());
        assert!(state.self_updater.launcher().is_self_updater());
        assert_eq!(
            state.self_updater.launcher().build_path(),
            state.root.join("self-update")
        );
        assert_eq!(
            state.self_updater.launcher().program_zip_destination(),
            state.root.join("self-update.zip")
        );
    }

    #[tokio::test]
    async fn saved_settings_are_used() {
        let temp = tempfile::tempdir().unwrap();
        let settings_dir = temp.path().join(SETTINGS_DIR_NAME);
        std::fs::create_dir_all(&settings_dir).unwrap();
        std::fs::write(
            settings_dir.join(SETTINGS_FILE),
            r#"{ "profile": { "name": "Blooming", "version_link": "v", "build_link": "b" } }"#,
        )
        .unwrap();

        let state = AppState::with_root(Arc::new(ProcessHost), temp.path(), PlatformType::Linux).unwrap();

        assert_eq!(state.launcher_settings.profile.name, "Blooming");
        assert_eq!(state.launcher_settings.profile_file, "Profile 1.txt");
        assert_eq!(state.main.config().name, "Blooming");
        assert_eq!(
            state.main.launch_file_path(),
            state.root.join("Build - Blooming").join("Blooming.run")
        );
    }

    #[tokio::test]
    async fn corrupt_settings_fall_back_to_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let settings_dir = temp.path().join(SETTINGS_DIR_NAME);
        std::fs::create_dir_all(&settings_dir).unwrap();
        std::fs::write(settings_dir.join(SETTINGS_FILE), "{ not json").unwrap();

        let state = AppState::with_root(Arc::new(QuietHost), temp.path(), PlatformType::Linux).unwrap();

        assert_eq!(state.launcher_settings, LauncherSettings::default());
    }
}
