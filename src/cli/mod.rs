//! CLI module for codegate
//!
//! Provides the command-line interface:
//! - serve: boot the webhook + admin server
//! - issue-codes: generate verification codes to stdout
//! - import-credentials: validate and import a credential file
//! - hash-token: produce the admin token hash for configuration

mod args;
mod commands;
mod errors;

pub use args::{Cli, Command};
pub use commands::run;
pub use errors::{CliError, CliResult};
