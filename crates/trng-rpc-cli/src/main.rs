#![doc = include_str!("../README.md")]

mod commands;
mod config;
mod telemetry;

use clap::Parser;
use config::{CliArgs, Settings};
use telemetry::init_telemetry;
use trng_rpc::{Client, HttpTransport, Registry};

fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let settings = Settings::try_from(args)?;

    init_telemetry()?;
    log_startup_info(&settings);

    let registry: Registry<HttpTransport> = Registry::new();
    let client = registry.get_or_create_with(&settings.api_key, |identity| {
        Ok(Client::new(
            identity,
            settings.client,
            HttpTransport::with_endpoint(&settings.endpoint)?,
        ))
    })?;

    let outcome = commands::run(&client, &settings.command);
    client.shutdown();
    registry.clear();

    let output = outcome?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn log_startup_info(settings: &Settings) {
    if cfg!(debug_assertions) {
        tracing::debug!(
            "Using {} with client config: {:#?}",
            settings.endpoint,
            settings.client
        );
    } else {
        tracing::debug!("Using {}", settings.endpoint);
    }
}
