// ─── Remote Version Marker ───
// The version endpoint serves a bare version string as the whole body.

use tracing::debug;

use super::Version;
use crate::core::error::{LauncherError, LauncherResult};

/// Fetch and parse the version published at `link`.
///
/// Transport errors and non-success statuses are returned as errors; a body
/// that does not parse yields `Ok(Version::INVALID)`.
pub async fn fetch_remote_version(client: &reqwest::Client, link: &str) -> LauncherResult<Version> {
    let response = client.get(link).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(LauncherError::DownloadFailed {
            url: link.to_string(),
            status: status.as_u16(),
        });
    }

    let body = response.text().await?;
    let version = Version::parse(body.trim());
    debug!("Remote version at {}: {:?} -> {}", link, body.trim(), version);
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn trims_and_parses_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/version")
            .with_body("  1.4.2\r\n")
            .create_async()
            .await;

        let client = reqwest::Client::new();
        let version = fetch_remote_version(&client, &format!("{}/version", server.url()))
            .await
            .unwrap();

        assert_eq!(version, Version::new(1, 4, 2));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn garbage_body_is_invalid_version() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/version")
            .with_body("<html>oops</html>")
            .create_async()
            .await;

        let client = reqwest::Client::new();
        let version = fetch_remote_version(&client, &format!("{}/version", server.url()))
            .await
            .unwrap();

        assert!(!version.is_valid());
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/version")
            .with_status(503)
            .create_async()
            .await;

        let client = reqwest::Client::new();
        let err = fetch_remote_version(&client, &format!("{}/version", server.url()))
            .await
            .unwrap_err();

        assert!(matches!(err, LauncherError::DownloadFailed { status: 503, .. }));
    }
}
