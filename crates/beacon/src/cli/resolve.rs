use anyhow::Result;
use clap::Parser;
use console::style;

use beacon_core::config::BeaconConfig;
use beacon_core::service::Resolver;
use beacon_runtime::{CatalogResolver, ConsulClient};

/// Print the healthy instances of a service.
#[derive(Parser)]
pub struct ResolveCommand {
    /// Service name to look up.
    pub service: String,

    /// Configuration file path.
    #[arg(short, long, default_value = "beacon.toml")]
    pub config: String,
}

impl ResolveCommand {
    /// Execute the resolve command.
    pub async fn execute(self) -> Result<()> {
        dotenvy::dotenv().ok();

        let path = std::path::Path::new(&self.config);
        let config = if path.exists() {
            BeaconConfig::from_file(path)?
        } else {
            BeaconConfig::default()
        };
        super::init_tracing(&config.logging, false);

        let client = ConsulClient::new(&config.registry)?;
        let resolver = CatalogResolver::new(std::sync::Arc::new(client));
        let endpoints = resolver.resolve(&self.service).await?;

        if endpoints.is_empty() {
            println!("  No healthy instances of {}", style(&self.service).bold());
            return Ok(());
        }

        for endpoint in endpoints {
            println!(
                "  {}  {}",
                style(&endpoint.id).bold(),
                style(endpoint.base_url()).cyan()
            );
        }

        Ok(())
    }
}
