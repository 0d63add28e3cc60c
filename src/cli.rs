//! # Command Line Interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "certbridge")]
#[command(about = "Token-bootstrapped client certificate onboarding")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// TOML configuration file; `CERTBRIDGE_*` variables override it
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, Subcommand, PartialEq, Eq)]
pub enum Commands {
    /// Start the internal and external listeners (default)
    Serve,
    /// Load the configuration and CA material, then exit
    CheckConfig,
}

impl Cli {
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Serve)
    }
}
