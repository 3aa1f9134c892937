use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::version::Version;

/// Literal that asks for a computed default path.
pub const AUTO: &str = "auto";
/// Build directories are named `Build - <app name>`.
pub const BUILD_DIR_PREFIX: &str = "Build - ";
/// A profile file shorter than this is rewritten with defaults.
pub const PROFILE_LINE_COUNT: usize = 7;

const KEY_NAME: &str = "App Name";
const KEY_VERSION: &str = "Version";
const KEY_ZIP_PATH: &str = "Zip Path";
const KEY_LAUNCH_PATH: &str = "Launch Path";
const KEY_VERSION_LINK: &str = "Version Link";
const KEY_BUILD_LINK: &str = "Build Link";
const KEY_AUTO_LAUNCH: &str = "Auto Launch";

/// Immutable install profile with every `auto` path already resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationInfo {
    pub name: String,
    pub version: Version,
    pub zip_path: PathBuf,
    pub launch_path: PathBuf,
    pub version_link: String,
    pub build_link: String,
}

impl ConfigurationInfo {
    /// "Not loaded yet".
    pub fn empty() -> Self {
        Self {
            name: String::new(),
            version: Version::INVALID,
            zip_path: PathBuf::new(),
            launch_path: PathBuf::new(),
            version_link: String::new(),
            build_link: String::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
            && self.zip_path.as_os_str().is_empty()
            && self.launch_path.as_os_str().is_empty()
            && self.version_link.is_empty()
            && self.build_link.is_empty()
    }

    /// Directory the build is installed into: the launch file's parent.
    pub fn build_dir(&self) -> Option<&Path> {
        self.launch_path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
    }
}

/// Name and links written into a freshly created profile file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileDefaults {
    pub name: String,
    pub version_link: String,
    pub build_link: String,
}

impl Default for ProfileDefaults {
    fn default() -> Self {
        Self {
            name: "Application".to_string(),
            version_link: String::new(),
            build_link: String::new(),
        }
    }
}

/// Inputs for turning `auto` into concrete paths.
#[derive(Debug, Clone)]
pub struct AutoPaths<'a> {
    pub root: &'a Path,
    pub runnable_extension: &'a str,
    /// Explicit zip destination given at construction; wins over the computed one.
    pub zip_override: Option<&'a Path>,
}

impl AutoPaths<'_> {
    pub fn zip_path(&self, name: &str) -> PathBuf {
        match self.zip_override {
            Some(path) => path.to_path_buf(),
            None => self.root.join(format!("{name}.zip")),
        }
    }

    pub fn launch_path(&self, name: &str) -> PathBuf {
        self.root
            .join(format!("{BUILD_DIR_PREFIX}{name}"))
            .join(format!("{name}{}", self.runnable_extension))
    }
}

/// The on-disk profile: seven ordered `Key=Value` lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileFile {
    pub name: String,
    pub version: String,
    pub zip_path: String,
    pub launch_path: String,
    pub version_link: String,
    pub build_link: String,
    pub auto_launch: bool,
}

impl ProfileFile {
    pub fn with_defaults(defaults: &ProfileDefaults) -> Self {
        Self {
            name: defaults.name.clone(),
            version: String::new(),
            zip_path: AUTO.to_string(),
            launch_path: AUTO.to_string(),
            version_link: defaults.version_link.clone(),
            build_link: defaults.build_link.clone(),
            auto_launch: false,
        }
    }

    /// Parse profile text. `Ok(None)` when the file is too short to be a
    /// profile and must be rewritten with defaults.
    pub fn parse(text: &str, path: &Path) -> LauncherResult<Option<Self>> {
        let lines: Vec<&str> = text.lines().collect();
        if lines.len() < PROFILE_LINE_COUNT {
            return Ok(None);
        }

        let mut values = Vec::with_capacity(PROFILE_LINE_COUNT);
        for (index, line) in lines.iter().take(PROFILE_LINE_COUNT).enumerate() {
            let (_, value) = line.split_once('=').ok_or_else(|| LauncherError::Config {
                path: path.to_path_buf(),
                reason: format!("line {} has no '=': {:?}", index + 1, line),
            })?;
            values.push(value.trim().to_string());
        }

        let mut values = values.into_iter();
        let mut next = || values.next().unwrap_or_default();

        Ok(Some(Self {
            name: next(),
            version: next(),
            zip_path: next(),
            launch_path: next(),
            version_link: next(),
            build_link: next(),
            auto_launch: next().eq_ignore_ascii_case("true"),
        }))
    }

    pub fn to_lines(&self) -> Vec<String> {
        vec![
            format!("{KEY_NAME}={}", self.name),
            format!("{KEY_VERSION}={}", self.version),
            format!("{KEY_ZIP_PATH}={}", self.zip_path),
            format!("{KEY_LAUNCH_PATH}={}", self.launch_path),
            format!("{KEY_VERSION_LINK}={}", self.version_link),
            format!("{KEY_BUILD_LINK}={}", self.build_link),
            format!(
                "{KEY_AUTO_LAUNCH}={}",
                if self.auto_launch { "True" } else { "False" }
            ),
        ]
    }

    /// Substitute `auto` (or blank) paths and parse the version.
    pub fn resolve(&self, auto: &AutoPaths<'_>) -> ConfigurationInfo {
        let zip_path = if is_auto(&self.zip_path) {
            auto.zip_path(&self.name)
        } else {
            PathBuf::from(&self.zip_path)
        };

        let launch_path = if is_auto(&self.launch_path) {
            auto.launch_path(&self.name)
        } else {
            PathBuf::from(&self.launch_path)
        };

        ConfigurationInfo {
            name: self.name.clone(),
            version: Version::parse(&self.version),
            zip_path,
            launch_path,
            version_link: self.version_link.clone(),
            build_link: self.build_link.clone(),
        }
    }
}

fn is_auto(raw: &str) -> bool {
    raw.is_empty() || raw.eq_ignore_ascii_case(AUTO)
}

/// Rewrite the first `Version=` line, keeping every other line as is.
pub fn replace_version_line(lines: &mut Vec<String>, version: &Version) {
    let rendered = format!("{KEY_VERSION}={version}");
    let existing = lines.iter_mut().find(|line| {
        line.split_once('=')
            .map(|(key, _)| key.trim() == KEY_VERSION)
            .unwrap_or(false)
    });

    match existing {
        Some(line) => *line = rendered,
        None => {
            let index = lines.len().min(1);
            lines.insert(index, rendered);
        }
    }
}
