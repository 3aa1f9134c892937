pub mod archive;
pub mod pipeline;

pub use archive::{extract_zip_file, is_zip_valid};
pub use pipeline::{install_artifact, remove_with_retry, CleanupPolicy, InstallKind};
