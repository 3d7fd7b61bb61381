//! Argument parsing (spec §6 ambient: `cca-cli`), grounded on
//! `cli-sub-agent::cli`'s `clap`-derive shape.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "cca", version, about = "Critic-Coder-Arbiter workflow engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Project root containing (optionally) a cca.toml (defaults to CWD)
    #[arg(long, global = true)]
    pub project: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the JSON-RPC adapter over stdio
    Serve,

    /// Drive a single session against the mock provider, for local
    /// smoke-testing without a real RPC client attached
    Run {
        /// Task prompt; reads from stdin if omitted
        task: Option<String>,
    },
}
