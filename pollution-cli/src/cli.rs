use anyhow::Context;
use clap::{Parser, Subcommand};
use inquire::{CustomType, Password, Text};
use pollution_core::{CitiesQuery, CitiesService, Config};

use crate::server;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "pollution", version, about = "Most polluted cities, described")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store pollution API credentials and defaults.
    Configure,

    /// Print enriched cities as JSON.
    Cities {
        /// Country code (PL, DE, ES, FR); all countries when absent.
        #[arg(long)]
        country: Option<String>,

        #[arg(long, default_value_t = 1)]
        page: u32,

        /// Page size; defaults to the configured limit.
        #[arg(long)]
        limit: Option<u32>,
    },

    /// Serve `GET /cities` over HTTP.
    Serve,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let mut config = Config::load()?;

        match self.command {
            Command::Configure => configure(config),
            Command::Cities {
                country,
                page,
                limit,
            } => {
                config.apply_env()?;
                config.ensure_credentials()?;

                let limit = limit.unwrap_or(config.upstream.default_limit);
                let query = CitiesQuery::new(country, page, limit)?;

                let service = CitiesService::from_config(&config)?;
                let response = service.cities(&query).await?;

                let json = serde_json::to_string_pretty(&response)
                    .context("Failed to serialize cities response")?;
                println!("{json}");
                Ok(())
            }
            Command::Serve => {
                config.apply_env()?;
                server::run(config).await
            }
        }
    }
}

fn configure(mut config: Config) -> anyhow::Result<()> {
    config.upstream.base_url = Text::new("Pollution API base URL:")
        .with_default(&config.upstream.base_url)
        .prompt()?;

    config.upstream.username = Text::new("Username:")
        .with_default(&config.upstream.username)
        .prompt()?;

    config.upstream.password = Password::new("Password:")
        .without_confirmation()
        .prompt()?;

    config.upstream.default_limit = CustomType::<u32>::new("Default page size:")
        .with_default(config.upstream.default_limit)
        .with_error_message("Please enter a positive whole number")
        .prompt()?
        .max(1);

    config.save()?;
    println!(
        "Configuration saved to {}",
        Config::config_file_path()?.display()
    );

    Ok(())
}
