//! Syndicate CLI entry point

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use syndicate::application::SyndicateRuntime;
use syndicate::infrastructure::{bus, config::ConfigLoader, http, llm, logging, market};

#[derive(Parser)]
#[command(name = "syndicate", version, about = "Agent swarm runtime")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Boot the runtime and serve the bridge until interrupted
    Run {
        /// Configuration file overriding the default discovery chain
        #[arg(long)]
        config: Option<PathBuf>,

        /// Bridge listen address, overriding configuration
        #[arg(long)]
        listen: Option<String>,
    },
    /// Load the effective configuration and print it
    CheckConfig {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, listen } => run(config, listen).await,
        Commands::CheckConfig { config } => {
            let (config, _) = load_config(config)?;
            println!("{}", serde_yaml::to_string(&config)?);
            Ok(())
        }
    }
}

fn load_config(
    path: Option<PathBuf>,
) -> Result<(
    syndicate::Config,
    syndicate::infrastructure::config::ConfigStore,
)> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
    .context("Failed to load configuration")
}

async fn run(config_path: Option<PathBuf>, listen: Option<String>) -> Result<()> {
    let (config, store) = load_config(config_path)?;
    let _log_guard = logging::init(&config.logging).context("Failed to initialize logging")?;

    let bus = bus::from_settings(&config.swarm);
    let llm = llm::from_config(&config.llm);
    // Extension keys outside the typed config come through the dotted store
    let feed_seed = match store.get_i64("market.seed", 0) {
        0 => rand::random(),
        seed => seed as u64,
    };
    let market: Arc<dyn syndicate::domain::ports::MarketDataSource> =
        Arc::new(market::SimulatedMarketFeed::new(feed_seed));

    let bridge_enabled = config.bridge.enabled;
    let listen = listen.unwrap_or_else(|| config.bridge.listen.clone());

    let runtime = SyndicateRuntime::bootstrap(config, bus, llm, market)
        .await
        .map_err(|e| anyhow::anyhow!("bootstrap failed: {e}"))?;
    runtime.start_monitor().await;
    info!("runtime booted");

    if bridge_enabled {
        let server_runtime = Arc::clone(&runtime);
        let server = tokio::spawn(async move { http::serve(server_runtime, &listen).await });

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received");
            }
            result = server => {
                match result {
                    Ok(Ok(())) => info!("bridge server exited"),
                    Ok(Err(e)) => {
                        error!(error = %e, "bridge server failed");
                        runtime.shutdown().await;
                        return Err(e);
                    }
                    Err(e) => {
                        error!(error = %e, "bridge server panicked");
                        runtime.shutdown().await;
                        return Err(e.into());
                    }
                }
            }
        }
    } else {
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for shutdown signal")?;
        info!("interrupt received");
    }

    runtime.shutdown().await;
    Ok(())
}
