pub mod manager;
pub mod model;

pub use manager::{load_configuration, ProfileStore};
pub use model::{AutoPaths, ConfigurationInfo, ProfileDefaults, ProfileFile, BUILD_DIR_PREFIX};
