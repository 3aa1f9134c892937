pub mod task;

pub use task::{ensure_executable, launch_program, spawn_detached};
