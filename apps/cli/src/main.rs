//! propcrawl CLI — drives the building-register crawl from the terminal.
//!
//! Runs the address → building → detail workflow against captured site
//! pages, saves the result as JSON, and manages replayable presets.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli)
}
