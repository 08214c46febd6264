//! Command implementations for the line-oriented subcommands.

mod config;
mod pipe;
mod scan;

pub use config::cmd_config;
pub use pipe::cmd_pipe;
pub use scan::cmd_scan;
