pub mod events;
pub mod orchestrator;
pub mod state;

pub use events::{EventBus, LauncherEvent};
pub use orchestrator::{InstallOptions, InstallOutcome, Launcher, LauncherBuilder, SETTINGS_DIR_NAME};
pub use state::LauncherState;
