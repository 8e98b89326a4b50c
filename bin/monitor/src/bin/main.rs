//! Withdrawal claim scheduler.
//!
//! `monitor check` runs a single pass over the tracked withdrawals and
//! exits; `monitor start` keeps the ticker running until every withdrawal
//! is finalized or a shutdown signal arrives.

use alloy_provider::Provider;
use clap::{Parser, Subcommand};
use monitor::{
    config::{Settings, SignerSettings},
    metrics::{install_prometheus_exporter, Metrics},
    notify::Notifier,
    scheduler::Scheduler,
};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser)]
#[command(name = "monitor")]
#[command(about = "Mantle withdrawal claim scheduler")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a single check over all tracked withdrawals, then exit
    Check,
    /// Run the scheduler until all withdrawals are finalized
    Start,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;

    info!("Loaded settings:");
    info!("  L1 Portal: {}", settings.contracts.l1_portal);
    info!("  L2 Output Oracle: {}", settings.contracts.l2_output_oracle);
    info!(
        "  Tracked withdrawals: {}",
        settings.withdrawal_tx_hashes.len()
    );
    if settings.telegram.is_none() {
        info!("  Telegram notifications disabled (TELEGRAM_BOT_TOKEN or TELEGRAM_CHAT_ID not set)");
    }

    info!("Connecting to L1...");
    let l1_provider = client::create_provider(&settings.l1_rpc_url).await?;

    info!("Connecting to L2...");
    let l2_provider = client::create_provider(&settings.l2_rpc_url).await?;

    let chain_id = l1_provider.get_chain_id().await?;
    let signer = match &settings.signer {
        SignerSettings::Kms { key_id } => {
            info!("Using AWS KMS for signing");
            client::kms_signer(key_id, chain_id).await?
        }
        SignerSettings::LocalKey { private_key } => {
            info!("Using local private key for signing");
            client::local_signer(private_key, chain_id)?
        }
    };
    info!("Wallet address: {}", signer.address);

    let notifier = Notifier::from_settings(settings.telegram.as_ref());
    let metrics = Metrics::new();

    let mut scheduler = Scheduler::new(
        l1_provider,
        l2_provider,
        signer,
        settings.contracts.clone(),
        notifier,
        metrics,
        settings.withdrawal_tx_hashes.clone(),
    );

    match cli.command {
        Command::Check => {
            info!("Running single check...");
            if scheduler.check_all().await {
                info!("All tracked withdrawals are finalized");
            }
        }
        Command::Start => {
            install_prometheus_exporter(settings.metrics_port)?;

            let shutdown = CancellationToken::new();
            spawn_signal_listener(shutdown.clone());

            scheduler.run(shutdown).await?;
        }
    }

    Ok(())
}

fn spawn_signal_listener(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut sigint =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
                .expect("failed to install SIGINT handler");
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");

        tokio::select! {
            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down...");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down...");
            }
        }

        shutdown.cancel();
    });
}
