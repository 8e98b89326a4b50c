//! Operator CLI for a single withdrawal.
//!
//! `claim check <tx_hash>` prints the decoded message and its lifecycle
//! status; `claim prove <tx_hash>` submits the proof to L1;
//! `claim finalize <tx_hash>` finalizes once the challenge period has
//! elapsed.

use action::{
    finalize::{Finalize, FinalizeAction},
    prove::{Prove, ProveAction},
    Action,
};
use alloy_primitives::B256;
use alloy_provider::Provider;
use clap::{Parser, Subcommand};
use client::Signer;
use monitor::config::{Settings, SignerSettings};
use tracing::info;
use withdrawal::state::{verify_message, MessageStateProvider};

#[derive(Parser)]
#[command(name = "claim")]
#[command(about = "Operate on a single Mantle withdrawal")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the withdrawal's decoded message and lifecycle status
    #[command(alias = "status")]
    Check {
        /// L2 transaction hash of the withdrawal
        tx_hash: B256,
    },
    /// Prove the withdrawal on L1
    Prove {
        /// L2 transaction hash of the withdrawal
        tx_hash: B256,
    },
    /// Finalize a proven withdrawal on L1
    #[command(alias = "claim")]
    Finalize {
        /// L2 transaction hash of the withdrawal
        tx_hash: B256,
    },
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

    let l1_provider = client::create_provider(&settings.l1_rpc_url).await?;
    let l2_provider = client::create_provider(&settings.l2_rpc_url).await?;

    let state_provider = MessageStateProvider::new(
        l1_provider.clone(),
        l2_provider.clone(),
        settings.contracts.l1_portal,
        settings.contracts.l2_cross_domain_messenger,
        settings.contracts.l2_to_l1_message_passer,
    );

    match cli.command {
        Command::Check { tx_hash } => {
            let message = state_provider.get_message(tx_hash).await?;
            verify_message(&message)?;

            println!("Message details:");
            println!("  Transaction hash: {}", message.tx_hash);
            println!("  L2 block number:  {}", message.block_number);
            println!("  Log index:        {}", message.log_index);
            println!("  Direction:        {}", message.direction);
            println!("  Withdrawal hash:  {}", message.withdrawal_hash);
            println!("  Message nonce:    {}", message.msg_nonce);
            println!("  MNT value:        {}", message.mnt_value);
            println!("  ETH value:        {}", message.eth_value);
            println!(
                "  Status:           {} ({})",
                message.status.code(),
                message.status.describe()
            );
        }
        Command::Prove { tx_hash } => {
            let signer = build_signer(&settings, &l1_provider).await?;
            let message = state_provider.get_message(tx_hash).await?;
            verify_message(&message)?;

            let prove = Prove {
                portal_address: settings.contracts.l1_portal,
                oracle_address: settings.contracts.l2_output_oracle,
                message_passer_address: settings.contracts.l2_to_l1_message_passer,
                withdrawal: message.withdrawal_transaction(),
                withdrawal_hash: message.withdrawal_hash,
                l2_block: message.block_number,
                from: signer.address,
            };
            let mut action = ProveAction::new(l1_provider, l2_provider, signer.sign, prove);

            if action.is_completed().await? {
                info!("Withdrawal already proven, nothing to do");
                return Ok(());
            }

            let result = action.execute().await?;
            info!(tx_hash = %result.tx_hash, "Prove submitted and mined");
        }
        Command::Finalize { tx_hash } => {
            let signer = build_signer(&settings, &l1_provider).await?;
            let message = state_provider.get_message(tx_hash).await?;
            verify_message(&message)?;

            let finalize = Finalize {
                portal_address: settings.contracts.l1_portal,
                withdrawal: message.withdrawal_transaction(),
                withdrawal_hash: message.withdrawal_hash,
                from: signer.address,
            };
            let mut action = FinalizeAction::new(l1_provider, l2_provider, signer.sign, finalize);

            if action.is_completed().await? {
                info!("Withdrawal already finalized, nothing to do");
                return Ok(());
            }

            let result = action.execute().await?;
            info!(tx_hash = %result.tx_hash, "Finalize submitted and mined");
        }
    }

    Ok(())
}

async fn build_signer<P>(settings: &Settings, l1_provider: &P) -> eyre::Result<Signer>
where
    P: Provider + Clone,
{
    let chain_id = l1_provider.get_chain_id().await?;
    match &settings.signer {
        SignerSettings::Kms { key_id } => {
            info!("Using AWS KMS for signing");
            client::kms_signer(key_id, chain_id).await
        }
        SignerSettings::LocalKey { private_key } => {
            info!("Using local private key for signing");
            client::local_signer(private_key, chain_id)
        }
    }
}
