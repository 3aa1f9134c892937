// ─── launchkit Core ───
// Update/launch orchestration for a self-updating application launcher.
//
// Architecture:
//   core/
//     version/     : Version value type + remote version marker
//     config/      : Profile file (7 Key=Value lines) + resolved configuration
//     downloader/  : Streaming downloads with interstitial-page defeat
//     installer/   : Archive validation, extract-or-move, zip cleanup
//     launcher/    : State machine, lifecycle events, install cycle
//     self_update/ : Self-updater wrapper + self-replace protocol
//     launch/      : Detached process spawner
//     platform/    : Platform model, host collaborator trait, root paths
//     state/       : Host-level settings and launcher wiring

pub mod config;
pub mod downloader;
pub mod error;
pub mod http;
pub mod installer;
pub mod launch;
pub mod launcher;
pub mod platform;
pub mod self_update;
pub mod state;
pub mod version;

#[cfg(test)]
pub(crate) mod testing;
