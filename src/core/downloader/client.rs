use std::path::Path;

use futures_util::StreamExt;
use reqwest::Client;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::interstitial::{inspect_download, resolve_link, Inspection};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::installer::is_zip_valid;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;

/// Outcome of [`Downloader::download_artifact`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadReport {
    pub attempts: u32,
    /// Link that produced the file now on disk.
    pub final_link: String,
    /// Whether the file on disk opens as a zip archive.
    pub valid_archive: bool,
}

/// Streaming downloader that sees through file-host confirmation pages.
pub struct Downloader {
    client: Client,
    max_attempts: u32,
}

impl Downloader {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n.max(1);
        self
    }

    // ── Single file download ────────────────────────────

    /// Stream `url` into `dest`, truncating any previous file.
    ///
    /// Creates parent directories as needed and returns the bytes written.
    pub async fn download_file(&self, url: &str, dest: &Path) -> LauncherResult<u64> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LauncherError::io(parent, e))?;
        }

        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LauncherError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let mut written = 0u64;
        // Handle is dropped before returning so the file can be reopened for
        // inspection on Windows.
        {
            let mut file = tokio::fs::File::create(dest)
                .await
                .map_err(|e| LauncherError::io(dest, e))?;

            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                file.write_all(&chunk)
                    .await
                    .map_err(|e| LauncherError::io(dest, e))?;
                written += chunk.len() as u64;
            }

            file.flush().await.map_err(|e| LauncherError::io(dest, e))?;
        }

        debug!("Downloaded {} bytes: {} -> {:?}", written, url, dest);
        Ok(written)
    }

    // ── Artifact download with interstitial defeat ──────

    /// Download the artifact behind `link` into `dest`.
    ///
    /// Follows confirmation pages for at most `max_attempts` requests. A
    /// failed request is retried with the same link. The result only says
    /// whether the final file is a readable archive; it never errors on
    /// network trouble. Any file already at `dest` is removed first, and a
    /// run whose last request failed never reports a valid archive.
    pub async fn download_artifact<F>(
        &self,
        link: &str,
        dest: &Path,
        mut on_attempt: F,
    ) -> LauncherResult<DownloadReport>
    where
        F: FnMut(u32, &str),
    {
        match tokio::fs::remove_file(dest).await {
            Ok(()) => debug!("Removed stale artifact at {:?}", dest),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(LauncherError::io(dest, e)),
        }

        let mut current = link.to_string();
        let mut attempts = 0;
        let mut last_write_ok = false;

        while attempts < self.max_attempts {
            attempts += 1;
            on_attempt(attempts, &current);
            info!("Download attempt {}/{}: {}", attempts, self.max_attempts, current);

            if let Err(e) = self.download_file(&current, dest).await {
                warn!("Download attempt {} failed: {}", attempts, e);
                last_write_ok = false;
                continue;
            }
            last_write_ok = true;

            match inspect_download(dest).await? {
                Inspection::Artifact => break,
                Inspection::Interstitial(Some(action)) => {
                    let next = resolve_link(&current, &action);
                    info!("Interstitial page detected; following {}", next);
                    current = next;
                }
                Inspection::Interstitial(None) => {
                    warn!("Interstitial page without a follow-up link at {}", current);
                    break;
                }
            }
        }

        let valid_archive = last_write_ok && is_zip_valid(dest);
        if valid_archive {
            info!("Artifact ready at {:?} after {} attempt(s)", dest, attempts);
        } else {
            warn!(
                "Artifact at {:?} is not a valid archive after {} attempt(s)",
                dest, attempts
            );
        }

        Ok(DownloadReport {
            attempts,
            final_link: current,
            valid_archive,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::zip_bytes;
    use mockito::Matcher;

    fn downloader() -> Downloader {
        Downloader::new(crate::core::http::build_http_client().unwrap())
    }

    #[tokio::test]
    async fn follows_interstitial_to_real_archive() {
        let mut server = mockito::Server::new_async().await;
        let page = format!(
            "<!DOCTYPE html><html><body><form action=\"{}/real?id=1&amp;foo=2\" method=\"post\"></form></body></html>",
            server.url()
        );
        let first = server
            .mock("GET", "/build")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(page)
            .expect(1)
            .create_async()
            .await;
        let second = server
            .mock("GET", "/real")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("id".into(), "1".into()),
                Matcher::UrlEncoded("foo".into(), "2".into()),
            ]))
            .with_status(200)
            .with_body(zip_bytes(&[("Game.exe", b"MZ")]))
            .expect(1)
            .create_async()
            .await;

        let temp = tempfile::tempdir().unwrap();
        let dest = temp.path().join("Game.zip");
        let mut seen = Vec::new();
        let report = downloader()
            .download_artifact(&format!("{}/build", server.url()), &dest, |n, url| {
                seen.push((n, url.to_string()))
            })
            .await
            .unwrap();

        first.assert_async().await;
        second.assert_async().await;
        assert_eq!(report.attempts, 2);
        assert!(report.valid_archive);
        assert_eq!(report.final_link, format!("{}/real?id=1&foo=2", server.url()));
        assert_eq!(seen[1], (2, format!("{}/real?id=1&foo=2", server.url())));
    }

    #[tokio::test]
    async fn small_binary_stops_after_one_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/tool.zip")
            .with_body(&b"\x7fELF tiny binary"[..])
            .expect(1)
            .create_async()
            .await;

        let temp = tempfile::tempdir().unwrap();
        let dest = temp.path().join("nested").join("tool.zip");
        let report = downloader()
            .download_artifact(&format!("{}/tool.zip", server.url()), &dest, |_, _| {})
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(report.attempts, 1);
        assert!(!report.valid_archive);
        assert_eq!(std::fs::read(&dest).unwrap(), b"\x7fELF tiny binary");
    }

    #[tokio::test]
    async fn page_without_action_stops_loop() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/build")
            .with_body("<!DOCTYPE html><html><body>Quota exceeded</body></html>")
            .expect(1)
            .create_async()
            .await;

        let temp = tempfile::tempdir().unwrap();
        let report = downloader()
            .download_artifact(
                &format!("{}/build", server.url()),
                &temp.path().join("a.zip"),
                |_, _| {},
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(report.attempts, 1);
        assert!(!report.valid_archive);
    }

    #[tokio::test]
    async fn server_errors_exhaust_attempt_cap() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/build")
            .with_status(503)
            .expect(4)
            .create_async()
            .await;

        let temp = tempfile::tempdir().unwrap();
        let report = downloader()
            .download_artifact(
                &format!("{}/build", server.url()),
                &temp.path().join("a.zip"),
                |_, _| {},
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(report.attempts, DEFAULT_MAX_ATTEMPTS);
        assert!(!report.valid_archive);
    }

    #[tokio::test]
    async fn leftover_archive_is_not_reported_after_failed_requests() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/build.zip")
            .with_status(500)
            .expect(4)
            .create_async()
            .await;

        let temp = tempfile::tempdir().unwrap();
        let dest = temp.path().join("Game.zip");
        std::fs::write(&dest, zip_bytes(&[("Game.run", b"OLD BUILD")])).unwrap();

        let report = downloader()
            .download_artifact(&format!("{}/build.zip", server.url()), &dest, |_, _| {})
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(report.attempts, DEFAULT_MAX_ATTEMPTS);
        assert!(!report.valid_archive);
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn download_file_overwrites_previous_content() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/f")
            .with_body("short")
            .create_async()
            .await;

        let temp = tempfile::tempdir().unwrap();
        let dest = temp.path().join("f.bin");
        std::fs::write(&dest, "a much longer previous body").unwrap();

        let written = downloader()
            .download_file(&format!("{}/f", server.url()), &dest)
            .await
            .unwrap();

        assert_eq!(written, 5);
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "short");
    }
}
