pub mod host;
pub mod paths;

pub use host::{Host, ProcessHost};
pub use paths::resolve_root;

use serde::Serialize;

/// Target platforms the launcher knows how to install for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformType {
    Windows,
    Linux,
    MacOS,
    Android,
    Ios,
}

impl PlatformType {
    /// Platform this binary was compiled for.
    pub const fn current() -> Self {
        if cfg!(target_os = "windows") {
            PlatformType::Windows
        } else if cfg!(target_os = "android") {
            PlatformType::Android
        } else if cfg!(target_os = "ios") {
            PlatformType::Ios
        } else if cfg!(target_os = "macos") {
            PlatformType::MacOS
        } else {
            PlatformType::Linux
        }
    }

    /// Suffix that marks a launchable build on this platform.
    pub const fn runnable_extension(self) -> &'static str {
        match self {
            PlatformType::Windows => ".exe",
            PlatformType::Linux => ".run",
            PlatformType::MacOS => ".app",
            PlatformType::Android => ".apk",
            PlatformType::Ios => ".ipa",
        }
    }

    pub const fn is_desktop(self) -> bool {
        matches!(
            self,
            PlatformType::Windows | PlatformType::Linux | PlatformType::MacOS
        )
    }

    /// Windows keeps loaded executables locked, so the running binary cannot
    /// be replaced from inside the process.
    pub const fn locks_running_executables(self) -> bool {
        matches!(self, PlatformType::Windows)
    }
}

/// Code handed to [`Host::quit`] so the shell can tell shutdowns apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitCode {
    Normal,
    PostLaunch,
    SelfUpdate,
    Crash,
}

impl ExitCode {
    pub const fn code(self) -> i32 {
        match self {
            ExitCode::Normal => 0,
            ExitCode::PostLaunch => 1,
            ExitCode::SelfUpdate => 2,
            ExitCode::Crash => -1,
        }
    }
}
