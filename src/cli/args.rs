//! CLI argument definitions using clap
//!
//! Commands:
//! - codegate serve --config <path>
//! - codegate issue-codes --config <path> --count <n> [--role r] [--tier t]
//! - codegate import-credentials --config <path> --file <path>
//! - codegate hash-token --token <secret>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// codegate - verification-code gated access control engine
#[derive(Parser, Debug)]
#[command(name = "codegate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the webhook and admin server
    Serve {
        /// Path to configuration file
        #[arg(long, default_value = "./codegate.json")]
        config: PathBuf,
    },

    /// Generate verification codes and print them to stdout
    IssueCodes {
        /// Path to configuration file
        #[arg(long, default_value = "./codegate.json")]
        config: PathBuf,

        /// Number of codes to generate
        #[arg(long, default_value_t = 1)]
        count: usize,

        /// Role granted on redemption (user|junior|senior|manager|admin|ceo)
        #[arg(long)]
        role: Option<String>,

        /// Tier granted on redemption (free|basic|pro|enterprise)
        #[arg(long)]
        tier: Option<String>,

        /// Expiry horizon in days; 0 means never
        #[arg(long)]
        expires_in_days: Option<u32>,

        /// Redemptions allowed per code
        #[arg(long)]
        max_uses: Option<u32>,

        /// Private namespace to attach to the resulting principal
        #[arg(long)]
        namespace: Option<String>,
    },

    /// Validate and import a JSON file of credentials
    ImportCredentials {
        /// Path to configuration file
        #[arg(long, default_value = "./codegate.json")]
        config: PathBuf,

        /// Path to a JSON array of credential records
        #[arg(long)]
        file: PathBuf,
    },

    /// Hash an admin token for the configuration file
    HashToken {
        /// The token to hash
        #[arg(long)]
        token: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
