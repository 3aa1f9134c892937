pub mod model;
pub mod remote;

pub use model::Version;
pub use remote::fetch_remote_version;
