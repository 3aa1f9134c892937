use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::model::{replace_version_line, AutoPaths, ProfileDefaults, ProfileFile};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::version::Version;

/// Reads and writes one profile file.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the profile, creating or rewriting it with `defaults` when the
    /// file is missing or shorter than seven lines.
    pub fn load_or_init(&self, defaults: &ProfileDefaults) -> LauncherResult<ProfileFile> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LauncherError::io(parent, e))?;
        }

        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(LauncherError::io(&self.path, e)),
        };

        match ProfileFile::parse(&text, &self.path)? {
            Some(profile) => {
                debug!("Loaded profile '{}' from {:?}", profile.name, self.path);
                Ok(profile)
            }
            None => {
                let profile = ProfileFile::with_defaults(defaults);
                self.write_lines(&profile.to_lines())?;
                info!(
                    "Wrote default profile '{}' to {:?}",
                    profile.name, self.path
                );
                Ok(profile)
            }
        }
    }

    /// Persist `version` as the profile's local version.
    ///
    /// Returns `false` when the file does not exist; nothing is created.
    pub fn persist_version(&self, version: &Version) -> LauncherResult<bool> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(
                    "Profile {:?} vanished; version {} not recorded",
                    self.path, version
                );
                return Ok(false);
            }
            Err(e) => return Err(LauncherError::io(&self.path, e)),
        };

        let mut lines: Vec<String> = text.lines().map(String::from).collect();
        replace_version_line(&mut lines, version);
        self.write_lines(&lines)?;

        info!("Recorded version {} in {:?}", version, self.path);
        Ok(true)
    }

    /// Replace the file through a sibling temp file so readers never see a
    /// half-written profile.
    fn write_lines(&self, lines: &[String]) -> LauncherResult<()> {
        let mut body = lines.join("\n");
        body.push('\n');

        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, body).map_err(|e| LauncherError::io(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| LauncherError::io(&self.path, e))
    }
}

/// Load (or initialize) a profile and resolve it in one step.
pub fn load_configuration(
    store: &ProfileStore,
    defaults: &ProfileDefaults,
    auto: &AutoPaths<'_>,
) -> LauncherResult<(super::ConfigurationInfo, bool)> {
    let profile = store.load_or_init(defaults)?;
    Ok((profile.resolve(auto), profile.auto_launch))
}
