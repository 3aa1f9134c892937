use std::fs::File;
use std::path::Path;

use tracing::{debug, warn};

use crate::core::error::{LauncherError, LauncherResult};

/// True when `path` opens as a zip archive.
pub fn is_zip_valid(path: &Path) -> bool {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            debug!("Archive {:?} cannot be opened: {}", path, e);
            return false;
        }
    };

    match zip::ZipArchive::new(file) {
        Ok(_) => true,
        Err(e) => {
            warn!("Archive {:?} is not a valid zip: {}", path, e);
            false
        }
    }
}

/// Whether any entry name ends with `suffix`, ignoring ASCII case.
pub fn has_entry_with_suffix(path: &Path, suffix: &str) -> LauncherResult<bool> {
    let file = File::open(path).map_err(|e| LauncherError::io(path, e))?;
    let archive = zip::ZipArchive::new(file)?;
    let suffix = suffix.to_ascii_lowercase();

    let found = archive.file_names().any(|name| {
        let name = name.trim_end_matches('/').to_ascii_lowercase();
        name.ends_with(&suffix)
    });
    Ok(found)
}

/// Extract every entry of `zip_path` under `target`, overwriting files that
/// already exist. Nothing else in `target` is removed. Entries whose names
/// would escape `target` are skipped.
///
/// Returns the number of files written.
pub fn extract_zip_file(zip_path: &Path, target: &Path) -> LauncherResult<usize> {
    let zip_file = File::open(zip_path).map_err(|e| LauncherError::io(zip_path, e))?;
    let mut archive = zip::ZipArchive::new(zip_file)?;

    std::fs::create_dir_all(target).map_err(|e| LauncherError::io(target, e))?;

    let mut written = 0;
    for index in 0..archive.len() {
        let mut zipped = archive.by_index(index)?;

        let Some(rel_path) = zipped.enclosed_name() else {
            warn!("Skipping unsafe zip entry {:?}", zipped.name());
            continue;
        };
        let out_path = target.join(rel_path);

        if zipped.is_dir() {
            std::fs::create_dir_all(&out_path).map_err(|e| LauncherError::io(&out_path, e))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LauncherError::io(parent, e))?;
        }

        // Dropped at the end of the block so the handle is closed before the
        // archive is deleted.
        {
            let mut out = File::create(&out_path).map_err(|e| LauncherError::io(&out_path, e))?;
            std::io::copy(&mut zipped, &mut out).map_err(|e| LauncherError::io(&out_path, e))?;
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = zipped.unix_mode() {
                let perms = std::fs::Permissions::from_mode(mode & 0o7777);
                std::fs::set_permissions(&out_path, perms)
                    .map_err(|e| LauncherError::io(&out_path, e))?;
            }
        }

        written += 1;
    }

    debug!("Extracted {} files from {:?} into {:?}", written, zip_path, target);
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::write_zip;

    #[test]
    fn validity_check() {
        let temp = tempfile::tempdir().unwrap();
        let good = temp.path().join("good.zip");
        let bad = temp.path().join("bad.zip");
        write_zip(&good, &[("a.txt", b"a")]);
        std::fs::write(&bad, b"<!DOCTYPE html><html></html>").unwrap();

        assert!(is_zip_valid(&good));
        assert!(!is_zip_valid(&bad));
        assert!(!is_zip_valid(&temp.path().join("missing.zip")));
    }

    #[test]
    fn suffix_match_ignores_case() {
        let temp = tempfile::tempdir().unwrap();
        let zip = temp.path().join("build.zip");
        write_zip(&zip, &[("Game/GAME.EXE", b"MZ"), ("Game/data.pak", b"d")]);

        assert!(has_entry_with_suffix(&zip, ".exe").unwrap());
        assert!(!has_entry_with_suffix(&zip, ".apk").unwrap());
    }

    #[test]
    fn extracts_over_existing_files_without_wiping() {
        let temp = tempfile::tempdir().unwrap();
        let zip = temp.path().join("build.zip");
        let target = temp.path().join("Build - Game");
        std::fs::create_dir_all(&target).unwrap();
        std::fs::write(target.join("Game.run"), b"old").unwrap();
        std::fs::write(target.join("saves.dat"), b"keep").unwrap();
        write_zip(
            &zip,
            &[("Game.run", b"new"), ("assets/", b""), ("assets/level1.bin", b"lvl")],
        );

        let written = extract_zip_file(&zip, &target).unwrap();

        assert_eq!(written, 2);
        assert_eq!(std::fs::read(target.join("Game.run")).unwrap(), b"new");
        assert_eq!(std::fs::read(target.join("saves.dat")).unwrap(), b"keep");
        assert_eq!(std::fs::read(target.join("assets/level1.bin")).unwrap(), b"lvl");
    }

    #[test]
    fn skips_entries_escaping_target() {
        let temp = tempfile::tempdir().unwrap();
        let zip = temp.path().join("evil.zip");
        let target = temp.path().join("out");
        write_zip(&zip, &[("../escape.txt", b"x"), ("ok.txt", b"y")]);

        assert_eq!(extract_zip_file(&zip, &target).unwrap(), 1);
        assert!(!temp.path().join("escape.txt").exists());
        assert!(target.join("ok.txt").exists());
    }
}
