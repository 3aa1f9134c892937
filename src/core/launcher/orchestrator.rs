use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use reqwest::Client;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::events::{EventBus, LauncherEvent};
use super::state::LauncherState;
use crate::core::config::{
    load_configuration, AutoPaths, ConfigurationInfo, ProfileDefaults, ProfileStore,
};
use crate::core::downloader::{DownloadReport, Downloader, DEFAULT_MAX_ATTEMPTS};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::http::build_http_client;
use crate::core::installer::{install_artifact, CleanupPolicy, InstallKind};
use crate::core::launch;
use crate::core::platform::{resolve_root, ExitCode, Host, PlatformType, ProcessHost};
use crate::core::platform::paths::canonical_or_create_dir;
use crate::core::version::{fetch_remote_version, Version};

pub const SETTINGS_DIR_NAME: &str = "Settings";

/// Per-call knobs for [`Launcher::install_program_files`].
#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// Launch the program once the install finishes.
    pub launch_after: bool,
    /// Replace the loaded configuration for this and later cycles.
    pub config: Option<ConfigurationInfo>,
    /// Version to record; resolved from the remote marker when absent.
    pub version: Option<Version>,
}

/// How an install cycle ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum InstallOutcome {
    Installed {
        version: Version,
        kind: InstallKind,
        download: DownloadReport,
        launched: bool,
    },
    /// Self-updater finished; the staged files await the self-replace step.
    Finalizing { version: Version, kind: InstallKind },
    Failed { reason: String },
}

struct LauncherInner {
    status: LauncherState,
    config: ConfigurationInfo,
    local_version: Version,
    latest_version: Version,
    auto_launch: bool,
}

/// Orchestrates check, download, install and launch for one profile.
pub struct Launcher {
    root: PathBuf,
    settings_path: PathBuf,
    config_file: PathBuf,
    build_override: Option<PathBuf>,
    zip_override: Option<PathBuf>,
    is_self_updater: bool,
    has_profile_file: bool,
    platform: PlatformType,
    store: ProfileStore,
    defaults: ProfileDefaults,
    client: Client,
    downloader: Downloader,
    host: Arc<dyn Host>,
    cleanup: CleanupPolicy,
    events: EventBus,
    inner: Mutex<LauncherInner>,
}

pub struct LauncherBuilder {
    config_path: PathBuf,
    root: Option<PathBuf>,
    zip_path: Option<PathBuf>,
    build_path: Option<PathBuf>,
    settings_path: Option<PathBuf>,
    self_updater: bool,
    defaults: ProfileDefaults,
    self_update_links: Option<(String, String)>,
    client: Option<Client>,
    host: Option<Arc<dyn Host>>,
    cleanup: CleanupPolicy,
    max_download_attempts: u32,
    platform: PlatformType,
}

impl LauncherBuilder {
    fn new(config_path: PathBuf) -> Self {
        Self {
            config_path,
            root: None,
            zip_path: None,
            build_path: None,
            settings_path: None,
            self_updater: false,
            defaults: ProfileDefaults::default(),
            self_update_links: None,
            client: None,
            host: None,
            cleanup: CleanupPolicy::default(),
            max_download_attempts: DEFAULT_MAX_ATTEMPTS,
            platform: PlatformType::current(),
        }
    }

    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn zip_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.zip_path = Some(path.into());
        self
    }

    pub fn build_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.build_path = Some(path.into());
        self
    }

    pub fn settings_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings_path = Some(path.into());
        self
    }

    pub fn self_updater(mut self, yes: bool) -> Self {
        self.self_updater = yes;
        self
    }

    pub fn profile_defaults(mut self, defaults: ProfileDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Links used by a self-updater that has no profile file on disk.
    pub fn self_update_links(
        mut self,
        version_link: impl Into<String>,
        build_link: impl Into<String>,
    ) -> Self {
        self.self_update_links = Some((version_link.into(), build_link.into()));
        self
    }

    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn host(mut self, host: Arc<dyn Host>) -> Self {
        self.host = Some(host);
        self
    }

    pub fn cleanup_policy(mut self, policy: CleanupPolicy) -> Self {
        self.cleanup = policy;
        self
    }

    pub fn max_download_attempts(mut self, n: u32) -> Self {
        self.max_download_attempts = n;
        self
    }

    pub fn platform(mut self, platform: PlatformType) -> Self {
        self.platform = platform;
        self
    }

    /// Resolve paths and load (or create) the profile.
    pub fn build(self) -> LauncherResult<Launcher> {
        let host = self.host.unwrap_or_else(|| Arc::new(ProcessHost));

        let root = match self.root {
            Some(root) => canonical_or_create_dir(&root)?,
            None => resolve_root(host.as_ref(), self.platform)?,
        };
        let settings_path = match self.settings_path {
            Some(path) => absolutize(&root, path),
            None => root.join(SETTINGS_DIR_NAME),
        };
        let config_file = absolutize(&settings_path, self.config_path);
        let zip_override = self.zip_path.map(|p| absolutize(&root, p));
        let build_override = self.build_path.map(|p| absolutize(&root, p));

        let store = ProfileStore::new(&config_file);
        let has_profile_file = !self.self_updater || config_file.exists();

        let (config, auto_launch) = if has_profile_file {
            let auto = AutoPaths {
                root: &root,
                runnable_extension: self.platform.runnable_extension(),
                zip_override: zip_override.as_deref(),
            };
            load_configuration(&store, &self.defaults, &auto)?
        } else {
            let links = self.self_update_links.unwrap_or_else(|| {
                (
                    self.defaults.version_link.clone(),
                    self.defaults.build_link.clone(),
                )
            });
            (builtin_self_config(&root, zip_override.as_deref(), links), false)
        };

        info!(
            "Loaded {} '{}' v{} from {:?}",
            if self.self_updater { "self-updater" } else { "profile" },
            config.name,
            config.version,
            config_file
        );

        let client = match self.client {
            Some(client) => client,
            None => build_http_client()?,
        };
        let downloader =
            Downloader::new(client.clone()).with_max_attempts(self.max_download_attempts);

        Ok(Launcher {
            root,
            settings_path,
            config_file,
            build_override,
            zip_override,
            is_self_updater: self.self_updater,
            has_profile_file,
            platform: self.platform,
            store,
            defaults: self.defaults,
            client,
            downloader,
            host,
            cleanup: self.cleanup,
            events: EventBus::new(),
            inner: Mutex::new(LauncherInner {
                status: LauncherState::Ready,
                local_version: config.version,
                latest_version: Version::INVALID,
                config,
                auto_launch,
            }),
        })
    }
}

fn absolutize(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// Configuration describing the running launcher itself.
fn builtin_self_config(
    root: &Path,
    zip_override: Option<&Path>,
    (version_link, build_link): (String, String),
) -> ConfigurationInfo {
    let exe = std::env::current_exe().unwrap_or_else(|_| root.join(env!("CARGO_PKG_NAME")));
    let name = exe
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string());
    let zip_path = zip_override
        .map(Path::to_path_buf)
        .unwrap_or_else(|| root.join(format!("{name}.zip")));

    ConfigurationInfo {
        name,
        version: Version::parse(env!("CARGO_PKG_VERSION")),
        zip_path,
        launch_path: exe,
        version_link,
        build_link,
    }
}

impl Launcher {
    pub fn builder(config_path: impl Into<PathBuf>) -> LauncherBuilder {
        LauncherBuilder::new(config_path.into())
    }

    fn lock(&self) -> MutexGuard<'_, LauncherInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LauncherEvent> {
        self.events.subscribe()
    }

    // ── Accessors ───────────────────────────────────────

    pub fn status(&self) -> LauncherState {
        self.lock().status
    }

    pub fn config(&self) -> ConfigurationInfo {
        self.lock().config.clone()
    }

    pub fn local_version(&self) -> Version {
        self.lock().local_version
    }

    pub fn latest_version(&self) -> Version {
        self.lock().latest_version
    }

    pub fn auto_launch(&self) -> bool {
        self.lock().auto_launch
    }

    pub fn is_self_updater(&self) -> bool {
        self.is_self_updater
    }

    pub fn platform(&self) -> PlatformType {
        self.platform
    }

    pub fn host(&self) -> &Arc<dyn Host> {
        &self.host
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// Directory the build is installed into.
    pub fn build_path(&self) -> PathBuf {
        if let Some(path) = &self.build_override {
            return path.clone();
        }
        self.lock()
            .config
            .build_dir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone())
    }

    pub fn program_zip_destination(&self) -> PathBuf {
        let config_zip = self.lock().config.zip_path.clone();
        if config_zip.as_os_str().is_empty() {
            if let Some(path) = &self.zip_override {
                return path.clone();
            }
        }
        config_zip
    }

    pub fn launch_file_path(&self) -> PathBuf {
        self.lock().config.launch_path.clone()
    }

    pub fn launch_file_exists(&self) -> bool {
        self.launch_file_path().exists()
    }

    /// Something must be installed before a launch can succeed.
    pub fn needs_install(&self) -> bool {
        !self.local_version().is_valid() || !self.launch_file_exists()
    }

    // ── State transitions ───────────────────────────────

    fn set_status(&self, status: LauncherState) {
        let previous = std::mem::replace(&mut self.lock().status, status);
        if previous != status {
            debug!("State {} -> {}", previous, status);
        }
        self.events.emit(LauncherEvent::StateChanged { state: status });
    }

    /// Move `from -> to` atomically. False when the launcher is elsewhere.
    fn transition(&self, from: LauncherState, to: LauncherState) -> bool {
        {
            let mut inner = self.lock();
            if inner.status != from {
                return false;
            }
            inner.status = to;
        }
        debug!("State {} -> {}", from, to);
        self.events.emit(LauncherEvent::StateChanged { state: to });
        true
    }

    fn set_local_version(&self, version: Version) {
        {
            let mut inner = self.lock();
            inner.local_version = version;
            inner.config.version = version;
        }
        self.events.emit(LauncherEvent::VersionChanged { version });
    }

    /// Re-announce the local version to subscribers.
    pub fn refresh_version(&self) {
        let version = self.local_version();
        self.events.emit(LauncherEvent::VersionChanged { version });
    }

    /// Leave `Failed` so a new cycle may start. False in any other state.
    pub fn reset(&self) -> bool {
        self.transition(LauncherState::Failed, LauncherState::Ready)
    }

    pub fn begin_self_update_check(&self) -> bool {
        self.transition(LauncherState::Ready, LauncherState::SelfUpdating)
    }

    pub fn end_self_update_check(&self) -> bool {
        self.transition(LauncherState::SelfUpdating, LauncherState::Ready)
    }

    pub(crate) fn mark_restarting(&self) -> bool {
        self.transition(LauncherState::Finalizing, LauncherState::Restarting)
    }

    // ── Update check ────────────────────────────────────

    /// Re-read the profile so manual edits are honoured. Keeps the current
    /// configuration when the file cannot be read.
    pub fn reload_config(&self) {
        if !self.has_profile_file {
            return;
        }

        let auto = AutoPaths {
            root: &self.root,
            runnable_extension: self.platform.runnable_extension(),
            zip_override: self.zip_override.as_deref(),
        };
        match load_configuration(&self.store, &self.defaults, &auto) {
            Ok((config, auto_launch)) => {
                let version = config.version;
                let changed = {
                    let mut inner = self.lock();
                    inner.config = config;
                    inner.auto_launch = auto_launch;
                    std::mem::replace(&mut inner.local_version, version) != version
                };
                if changed {
                    self.events.emit(LauncherEvent::VersionChanged { version });
                }
            }
            Err(e) => warn!("Keeping previous configuration: {}", e),
        }
    }

    /// True when the remote marker is strictly newer than the local version.
    ///
    /// Network trouble answers `false`.
    pub async fn is_update_available(&self) -> bool {
        self.reload_config();

        let (link, local) = {
            let inner = self.lock();
            (inner.config.version_link.clone(), inner.local_version)
        };

        match fetch_remote_version(&self.client, &link).await {
            Ok(remote) => {
                let newer = remote.is_newer_than(&local);
                self.lock().latest_version = if newer { remote } else { local };
                info!(
                    "Update check: local {} remote {} -> {}",
                    local,
                    remote,
                    if newer { "update available" } else { "up to date" }
                );
                newer
            }
            Err(e) => {
                warn!("Update check against {} failed: {}", link, e);
                false
            }
        }
    }

    // ── Install cycle ───────────────────────────────────

    /// Start a download+install cycle in the background.
    ///
    /// Returns `None` without doing anything unless the launcher is `Ready`.
    pub fn install_program_files(
        self: &Arc<Self>,
        options: InstallOptions,
    ) -> Option<JoinHandle<InstallOutcome>> {
        {
            let mut inner = self.lock();
            if inner.status != LauncherState::Ready {
                debug!("Install ignored while {}", inner.status);
                return None;
            }
            inner.status = LauncherState::Updating;
            if let Some(config) = &options.config {
                inner.config = config.clone();
            }
        }
        self.events.emit(LauncherEvent::StateChanged {
            state: LauncherState::Updating,
        });

        let this = Arc::clone(self);
        let handle = self
            .host
            .request_scheduler()
            .spawn(async move { this.run_install_cycle(options).await });
        Some(handle)
    }

    async fn run_install_cycle(&self, options: InstallOptions) -> InstallOutcome {
        self.events.emit(LauncherEvent::BeginUpdate);

        let version = self.resolve_cycle_version(options.version).await;
        let config = self.config();
        let zip_path = self.program_zip_destination();
        let build_path = self.build_path();

        let download = match self
            .downloader
            .download_artifact(&config.build_link, &zip_path, |attempt, url| {
                self.events.emit(LauncherEvent::BeginDownload {
                    attempt,
                    url: url.to_string(),
                })
            })
            .await
        {
            Ok(report) => report,
            Err(e) => return self.fail(e),
        };

        if !download.valid_archive {
            return self.fail(LauncherError::InvalidArchive(zip_path));
        }

        self.set_status(LauncherState::Installing);
        self.events.emit(LauncherEvent::BeginInstall);

        let extension = self.platform.runnable_extension();
        let cleanup = self.cleanup;
        let kind = match tokio::task::spawn_blocking(move || {
            install_artifact(&zip_path, &build_path, extension, &cleanup)
        })
        .await
        {
            Ok(Ok(kind)) => kind,
            Ok(Err(e)) => return self.fail(e),
            Err(join) => return self.fail(LauncherError::Other(format!("install task: {join}"))),
        };

        if version.is_valid() {
            if let Err(e) = self.store.persist_version(&version) {
                return self.fail(e);
            }
            self.set_local_version(version);
        } else {
            warn!("Installed build has no known version; local version left unchanged");
        }

        info!("Installed '{}' v{}", config.name, version);
        self.events.emit(LauncherEvent::UpdateComplete { version });

        if self.is_self_updater {
            self.set_status(LauncherState::Finalizing);
            return InstallOutcome::Finalizing { version, kind };
        }

        self.set_status(LauncherState::Ready);

        let launched = if options.launch_after {
            match self.launch_program() {
                Ok(()) => true,
                Err(e) => {
                    error!("Launch after install failed: {}", e);
                    false
                }
            }
        } else {
            false
        };

        InstallOutcome::Installed {
            version,
            kind,
            download,
            launched,
        }
    }

    /// Explicit request, then the last seen remote version, then a fresh fetch.
    async fn resolve_cycle_version(&self, requested: Option<Version>) -> Version {
        if let Some(version) = requested.filter(Version::is_valid) {
            return version;
        }

        let latest = self.latest_version();
        if latest.is_valid() {
            return latest;
        }

        let link = self.lock().config.version_link.clone();
        match fetch_remote_version(&self.client, &link).await {
            Ok(version) => {
                self.lock().latest_version = version;
                version
            }
            Err(e) => {
                warn!("Could not resolve version for this install: {}", e);
                Version::INVALID
            }
        }
    }

    fn fail(&self, err: LauncherError) -> InstallOutcome {
        let reason = err.to_string();
        error!("Install cycle failed: {}", reason);
        self.set_status(LauncherState::Failed);
        self.events.emit(LauncherEvent::Failed {
            reason: reason.clone(),
        });
        InstallOutcome::Failed { reason }
    }

    // ── Launch ──────────────────────────────────────────

    /// Start the installed program, then ask the host to quit.
    pub fn launch_program(&self) -> LauncherResult<()> {
        let path = self.launch_file_path();
        if !path.exists() {
            return Err(LauncherError::Other(format!(
                "nothing installed at {:?}",
                path
            )));
        }

        if !self.transition(LauncherState::Ready, LauncherState::Launching) {
            return Err(LauncherError::InvalidState(self.status().to_string()));
        }

        let result = if self.platform.is_desktop() {
            launch::launch_program(&path).map(drop)
        } else {
            self.host.platform_launch(&path)
        };

        if let Err(e) = result {
            self.set_status(LauncherState::Ready);
            return Err(e);
        }

        self.host.quit(ExitCode::PostLaunch);
        Ok(())
    }
}
