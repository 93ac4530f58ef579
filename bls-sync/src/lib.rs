pub mod cli;
pub mod load_config;
pub mod store;

pub use cli::{run, Cli, Commands, Outcome, SyncArgs};
