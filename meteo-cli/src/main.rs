//! Binary crate for the `meteo` command-line tool.
//!
//! This crate focuses on:
//! - Parsing CLI arguments and validating coordinates
//! - Interactive provider configuration
//! - Printing resolved weather as JSON

use clap::Parser;

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cmd = cli::Cli::parse();
    cmd.run().await
}
