use std::path::{Path, PathBuf};

use super::{Host, PlatformType};
use crate::core::error::{LauncherError, LauncherResult};

const APP_DIR_NAME: &str = "launchkit";

/// Install root for a launcher.
///
/// Desktop: the directory holding the running executable. Elsewhere: the
/// sandboxed path supplied by the host. Falls back to the user data dir.
pub fn resolve_root(host: &dyn Host, platform: PlatformType) -> LauncherResult<PathBuf> {
    let candidate = if platform.is_desktop() {
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
    } else {
        host.request_platform_data_path()
    };

    let root = candidate.unwrap_or_else(|| {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR_NAME)
    });

    canonical_or_create_dir(&root)
}

pub fn canonical_or_create_dir(path: &Path) -> LauncherResult<PathBuf> {
    std::fs::create_dir_all(path).map_err(|source| LauncherError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    std::fs::canonicalize(path).map_err(|source| LauncherError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::platform::ExitCode;

    struct SandboxHost(PathBuf);

    impl Host for SandboxHost {
        fn request_platform_data_path(&self) -> Option<PathBuf> {
            Some(self.0.clone())
        }

        fn quit(&self, _code: ExitCode) {}
    }

    #[test]
    fn non_desktop_uses_host_data_path() {
        let temp = tempfile::tempdir().unwrap();
        let sandbox = temp.path().join("files");
        let host = SandboxHost(sandbox.clone());

        let root = resolve_root(&host, PlatformType::Android).unwrap();

        assert!(sandbox.is_dir());
        assert_eq!(root, std::fs::canonicalize(&sandbox).unwrap());
    }

    #[test]
    fn desktop_uses_executable_directory() {
        let host = SandboxHost(PathBuf::from("/nonexistent"));
        let root = resolve_root(&host, PlatformType::Linux).unwrap();
        let exe_dir = std::env::current_exe().unwrap();
        let exe_dir = std::fs::canonicalize(exe_dir.parent().unwrap()).unwrap();
        assert_eq!(root, exe_dir);
    }
}
