use std::path::Path;

use anyhow::Result;
use clap::Parser;
use console::style;
use tracing::info;

use beacon_core::config::BeaconConfig;
use beacon_core::service::NodeRole;
use beacon_runtime::ServiceNode;

/// Register with the registry and serve until stopped.
#[derive(Parser)]
pub struct RunCommand {
    /// Configuration file path. Defaults are used if it does not exist.
    #[arg(short, long, default_value = "beacon.toml")]
    pub config: String,

    /// Node role: `web` or `backend` (overrides config).
    #[arg(short, long)]
    pub role: Option<String>,

    /// Port to listen on (overrides config).
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Service name to register under (overrides config).
    #[arg(short, long)]
    pub name: Option<String>,

    /// Enable verbose logging.
    #[arg(long)]
    pub dev: bool,
}

impl RunCommand {
    /// Execute the run command.
    pub async fn execute(self) -> Result<()> {
        dotenvy::dotenv().ok();

        let config = self.load_config()?;
        super::init_tracing(&config.logging, self.dev);

        println!();
        println!(
            "  {} v{}  {}",
            style("BEACON").bold().cyan(),
            env!("CARGO_PKG_VERSION"),
            style(config.node.role).bold()
        );
        println!(
            "  Registry at {}",
            style(config.registry.base_url()).cyan()
        );
        println!();

        let node = ServiceNode::builder()
            .config(config)
            .start()
            .await
            .map_err(|e| anyhow::anyhow!("{}", e))?;

        info!(
            service_id = %node.identity().id(),
            port = node.identity().port(),
            "Node registered"
        );

        node.serve().await.map_err(|e| anyhow::anyhow!("{}", e))?;

        Ok(())
    }

    fn load_config(&self) -> Result<BeaconConfig> {
        let path = Path::new(&self.config);
        let mut config = if path.exists() {
            BeaconConfig::from_file(path)?
        } else {
            BeaconConfig::default()
        };
        self.apply_overrides(&mut config)?;
        Ok(config)
    }

    fn apply_overrides(&self, config: &mut BeaconConfig) -> Result<()> {
        if let Some(role) = &self.role {
            config.node.role = NodeRole::from_str(role)
                .ok_or_else(|| anyhow::anyhow!("Unknown role '{}': expected web or backend", role))?;
        }
        if let Some(port) = self.port {
            config.node.port = Some(port);
        }
        if let Some(name) = &self.name {
            config.node.name = Some(name.clone());
        }
        Ok(())
    }
}
