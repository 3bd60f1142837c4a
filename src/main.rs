//! rgclone CLI entry point
//!
//! Parses the command line, runs the command and renders errors with their
//! suggestions. Exit status is 1 on any failure.

use anyhow::Result;
use clap::Parser;
use rgclone::cli;
use rgclone::core::user_friendly_error;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(e) => {
            user_friendly_error(e).display();
            std::process::exit(1);
        }
    }
}
