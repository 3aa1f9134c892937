use std::path::Path;

use reqwest::Url;

use crate::core::error::{LauncherError, LauncherResult};

/// Anything larger is taken to be the real artifact.
pub const ARTIFACT_SIZE_THRESHOLD: u64 = 60_000;
const HTML_MARKER: &str = "<!DOCTYPE html>";
const PEEK_CHARS: usize = 20;
const ACTION_MARKER: &str = "action=\"";

/// What a freshly downloaded file turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inspection {
    Artifact,
    /// Confirmation page; carries the follow-up link when one was found.
    Interstitial(Option<String>),
}

pub async fn inspect_download(path: &Path) -> LauncherResult<Inspection> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| LauncherError::io(path, e))?;
    if metadata.len() > ARTIFACT_SIZE_THRESHOLD {
        return Ok(Inspection::Artifact);
    }

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| LauncherError::io(path, e))?;
    Ok(inspect_bytes(&bytes))
}

pub fn inspect_bytes(bytes: &[u8]) -> Inspection {
    if bytes.len() as u64 > ARTIFACT_SIZE_THRESHOLD {
        return Inspection::Artifact;
    }

    let text = String::from_utf8_lossy(bytes);
    let head: String = text.chars().take(PEEK_CHARS).collect();
    if !head.contains(HTML_MARKER) {
        return Inspection::Artifact;
    }

    Inspection::Interstitial(extract_action_url(&text))
}

/// Last `action="..."` attribute in the page, with `&amp;` decoded.
pub fn extract_action_url(body: &str) -> Option<String> {
    let start = body.rfind(ACTION_MARKER)? + ACTION_MARKER.len();
    let rest = &body[start..];
    let end = rest.find('"')?;
    let raw = &rest[..end];
    if raw.is_empty() {
        return None;
    }
    Some(raw.replace("&amp;", "&"))
}

/// Resolve a possibly relative action URL against the page it came from.
pub fn resolve_link(current: &str, action: &str) -> String {
    match Url::parse(current).and_then(|base| base.join(action)) {
        Ok(url) => url.to_string(),
        Err(_) => action.to_string(),
    }
}
