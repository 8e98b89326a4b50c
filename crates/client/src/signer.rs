//! Transaction signing for L1 submissions.
//!
//! Signing is a single capability: turn a filled [`TransactionRequest`]
//! into raw signed bytes ready for `eth_sendRawTransaction`. Two backends
//! provide it: a local private key, and an AWS KMS key whose material
//! never leaves KMS.

use alloy_eips::eip2718::Encodable2718;
use alloy_network::{EthereumWallet, TransactionBuilder};
use alloy_primitives::{Address, Bytes};
use alloy_rpc_types_eth::TransactionRequest;
use alloy_signer::Signer as _;
use alloy_signer_aws::AwsSigner;
use alloy_signer_local::PrivateKeySigner;
use eyre::{Context, Result};
use std::{future::Future, pin::Pin, sync::Arc};

/// Future returned by a [`SignerFn`].
pub type SignedTxFuture = Pin<Box<dyn Future<Output = Result<Bytes>> + Send>>;

/// Signing capability: filled transaction request in, raw signed bytes out.
pub type SignerFn = Arc<dyn Fn(TransactionRequest) -> SignedTxFuture + Send + Sync>;

/// A configured signing identity: the sender address plus the capability.
#[derive(Clone)]
pub struct Signer {
    /// Address the signed transactions originate from.
    pub address: Address,
    /// The signing capability itself.
    pub sign: SignerFn,
}

/// Build a [`Signer`] from a hex private key (with or without `0x`).
pub fn local_signer(private_key: &str, chain_id: u64) -> Result<Signer> {
    let key: PrivateKeySigner = private_key
        .trim()
        .trim_start_matches("0x")
        .parse()
        .wrap_err("invalid private key")?;
    let address = key.address();
    let wallet = EthereumWallet::new(key);

    Ok(Signer {
        address,
        sign: signer_fn(wallet, chain_id),
    })
}

/// Build a [`Signer`] backed by an AWS KMS key.
///
/// Credentials come from the ambient AWS configuration; the region from
/// `AWS_REGION`, falling back to `ap-northeast-1`.
pub async fn kms_signer(key_id: &str, chain_id: u64) -> Result<Signer> {
    let region = aws_config::meta::region::RegionProviderChain::default_provider()
        .or_else("ap-northeast-1");
    let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(region)
        .load()
        .await;
    let kms_client = aws_sdk_kms::Client::new(&aws_config);

    let signer = AwsSigner::new(kms_client, key_id.to_string(), Some(chain_id))
        .await
        .wrap_err("failed to initialize KMS signer")?;
    let address = signer.address();
    let wallet = EthereumWallet::new(signer);

    Ok(Signer {
        address,
        sign: signer_fn(wallet, chain_id),
    })
}

fn signer_fn(wallet: EthereumWallet, chain_id: u64) -> SignerFn {
    Arc::new(move |mut tx: TransactionRequest| {
        let wallet = wallet.clone();
        Box::pin(async move {
            if tx.chain_id.is_none() {
                tx.chain_id = Some(chain_id);
            }
            let envelope = tx
                .build(&wallet)
                .await
                .wrap_err("failed to sign transaction")?;
            Ok(Bytes::from(envelope.encoded_2718()))
        })
    })
}
