use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "cybertutor")]
#[command(author, version, about = "Telegram bot for hands-on cybersecurity training", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the bot (default)
    Run,

    /// Check a password against the breach corpus; the password is read from stdin
    CheckPassword,

    /// Scan a local file through the configured scanner and print the verdict
    Scan {
        /// Path to the file to scan
        path: PathBuf,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
