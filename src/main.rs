use clap::Parser;
use colored::*;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use deposit_release_bot::{
    cli::Cli,
    error::{self, ReleaseError},
    ledger::{Keystore, LedgerClient, SubstrateClient},
    release::{ReleaseOrchestrator, RunSummary},
    utils, Config,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("deposit_release_bot=debug,info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match Config::load() {
        Ok(cfg) => cfg.with_overrides(cli.endpoint, cli.keystore, cli.password),
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    match run(&config).await {
        Ok(summary) => summary.print_summary(),
        Err(e) => {
            error!("{}", format!("Error: {}", e).red());
            std::process::exit(1);
        }
    }
}

async fn run(config: &Config) -> error::Result<RunSummary> {
    println!("\nConnecting to RPC node: {}\n", config.node.endpoint.cyan());

    let keystore = Keystore::load(&config.signer.keystore_path)?;
    let client = SubstrateClient::connect(&config.node.endpoint, &keystore, &config.signer.password).await?;

    let result = release(&client, config).await;

    // Always close the session, whatever the outcome
    client.disconnect().await;
    result
}

async fn release(client: &SubstrateClient, config: &Config) -> error::Result<RunSummary> {
    let node = client
        .node_info()
        .await
        .map_err(|e| ReleaseError::Setup(format!("Failed to query node info: {}", e)))?;
    utils::print_node_info(&node);

    info!(
        signer = %client.signer_account(),
        batch_size = config.release.batch_size,
        settle_secs = config.release.settle_secs,
        dry_run = config.release.dry_run,
        "Starting deposit release run"
    );

    ReleaseOrchestrator::new(client, config.release.clone()).run().await
}
