//! Binary crate for the `pollution` command-line tool.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - Interactive configuration
//! - Serving the cities listing over HTTP

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod server;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pollution_cli=info,pollution_core=info,actix_web=info".into()),
        )
        .with_target(true)
        .init();

    let cmd = cli::Cli::parse();
    cmd.run().await
}
