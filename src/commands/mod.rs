//! Subcommand implementations for the theme-indexer CLI.

mod common;
mod init;
mod run;
mod validate;
mod watch;

pub use init::{InitArgs, init_config};
pub use run::{RunArgs, run_index};
pub use validate::{ValidateArgs, validate_config};
pub use watch::{WatchArgs, watch_index};
