pub mod actor;
pub mod domain;
pub mod protocol;
pub mod restic;
pub mod state;

pub use domain::{config, group, unit};

pub mod dirs;

mod daemon;
pub use daemon::{Daemon, RuntimeConfig};
