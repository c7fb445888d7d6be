mod config;
mod server;

use clap::{Parser, Subcommand};
use config::{GatewayConfig, NodeServerConfig};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "stowage")]
#[command(about = "Quorum-replicated object storage gateway")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway that replicates objects to the storage nodes
    Gateway {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.yaml")]
        config: String,
    },
    /// Start a storage node
    Node {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.yaml")]
        config: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stowage=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Gateway { config } => {
            tracing::info!("Starting Stowage gateway with config: {}", config);

            let cfg = match GatewayConfig::from_file(&config) {
                Ok(c) => c,
                Err(e) => {
                    tracing::error!("Failed to load config: {}", e);
                    std::process::exit(1);
                }
            };

            tracing::info!(
                "Bind: {}, Nodes: {}, Write quorum: {}",
                cfg.bind_addr,
                cfg.nodes.len(),
                cfg.replication.write_quorum
            );

            if let Err(e) = server::run_gateway(cfg).await {
                tracing::error!("Gateway error: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Node { config } => {
            tracing::info!("Starting Stowage node with config: {}", config);

            let cfg = match NodeServerConfig::from_file(&config) {
                Ok(c) => c,
                Err(e) => {
                    tracing::error!("Failed to load config: {}", e);
                    std::process::exit(1);
                }
            };

            if let Err(e) = server::run_node(cfg).await {
                tracing::error!("Node error: {}", e);
                std::process::exit(1);
            }
        }
    }
}
