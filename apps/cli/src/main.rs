//! Articulate CLI: builds a transfer-course equivalence map from assist.org.
//!
//! Queries every (sending institution, department) agreement for the home
//! institution, decodes the articulations, and writes one JSON mapping from
//! home course code to equivalent courses elsewhere.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
