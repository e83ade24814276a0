//! docsagent CLI — scoped retrieval over a public documentation set.
//!
//! Resolves the documentation sitemap into a page list and pulls citable
//! sections out of individual pages.

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
