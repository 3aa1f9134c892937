pub mod client;
pub mod interstitial;

pub use client::{DownloadReport, Downloader, DEFAULT_MAX_ATTEMPTS};
pub use interstitial::{inspect_download, Inspection};
