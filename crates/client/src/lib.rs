use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types_eth::TransactionRequest;
use thiserror::Error;

pub mod signer;

pub use signer::{kms_signer, local_signer, Signer, SignerFn};

#[derive(Error, Debug)]
pub enum ClientError {
    /// Error parsing or validating URLs
    #[error("Invalid RPC URL: {0}")]
    InvalidUrl(String),

    /// Error connecting to the RPC endpoint
    #[error("Connection error: {0}")]
    Connection(String),

    /// General error with context
    #[error("Client error: {0}")]
    Other(String),
}

/// Convenience function to create an ethereum rpc provider from a url.
pub async fn create_provider(rpc_url: &str) -> Result<impl Provider + Clone, ClientError> {
    let url = rpc_url
        .parse()
        .map_err(|e| ClientError::InvalidUrl(format!("{}", e)))?;
    let provider = ProviderBuilder::new().connect_http(url);

    Ok(provider)
}

/// Fill nonce, chain id, gas and EIP-1559 fees on a request before signing.
///
/// The request must carry its `from` address; everything else is filled
/// from the node when absent.
pub async fn fill_transaction<P>(
    mut tx: TransactionRequest,
    provider: &P,
) -> eyre::Result<TransactionRequest>
where
    P: Provider + Clone,
{
    let from = tx
        .from
        .ok_or_else(|| eyre::eyre!("transaction request is missing a sender"))?;

    if tx.nonce.is_none() {
        tx.nonce = Some(provider.get_transaction_count(from).await?);
    }
    if tx.chain_id.is_none() {
        tx.chain_id = Some(provider.get_chain_id().await?);
    }
    if tx.gas.is_none() {
        let estimated = provider.estimate_gas(tx.clone()).await?;
        // 20% headroom over the node's estimate
        tx.gas = Some(estimated.saturating_mul(120) / 100);
    }
    if tx.max_fee_per_gas.is_none() || tx.max_priority_fee_per_gas.is_none() {
        let fees = provider.estimate_eip1559_fees().await?;
        tx.max_fee_per_gas = Some(fees.max_fee_per_gas);
        tx.max_priority_fee_per_gas = Some(fees.max_priority_fee_per_gas);
    }

    Ok(tx)
}
