//! Environment-driven settings for the monitor binaries.
//!
//! Everything is read once at startup; the resulting record is immutable
//! for the lifetime of the process.

use ::config::ContractAddresses;
use alloy_primitives::B256;
use eyre::{eyre, Context, Result};

/// Signing configuration. Exactly one backend is active; KMS wins when
/// both are configured.
#[derive(Debug, Clone)]
pub enum SignerSettings {
    /// AWS KMS key id; key material never enters the process.
    Kms { key_id: String },
    /// Hex private key, with or without `0x`.
    LocalKey { private_key: String },
}

/// Telegram notification transport settings.
#[derive(Debug, Clone)]
pub struct TelegramSettings {
    pub bot_token: String,
    pub chat_id: i64,
    /// Topic (message thread) id for supergroups.
    pub topic_id: Option<i64>,
}

/// Complete runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub l1_rpc_url: String,
    pub l2_rpc_url: String,
    pub signer: SignerSettings,
    pub contracts: ContractAddresses,
    /// The fixed set of L2 withdrawal transactions to monitor.
    pub withdrawal_tx_hashes: Vec<B256>,
    /// Absent means notifications are silently dropped.
    pub telegram: Option<TelegramSettings>,
    pub metrics_port: u16,
}

impl Settings {
    /// Read settings from the environment. Missing RPC endpoints or a
    /// missing signer are fatal.
    pub fn from_env() -> Result<Self> {
        let l1_rpc_url = required_env("L1_RPC")?;
        let l2_rpc_url = required_env("L2_RPC")?;

        let signer = match optional_env("KMS_KEY_ID") {
            Some(key_id) => SignerSettings::Kms { key_id },
            None => match optional_env("PRIV_KEY") {
                Some(private_key) => SignerSettings::LocalKey { private_key },
                None => return Err(eyre!("either KMS_KEY_ID or PRIV_KEY must be set")),
            },
        };

        let contracts = ContractAddresses::from_env()?;

        let withdrawal_tx_hashes =
            parse_tx_hashes(&optional_env("WITHDRAWAL_TX_HASH").unwrap_or_default())?;

        let telegram = match (
            optional_env("TELEGRAM_BOT_TOKEN"),
            optional_env("TELEGRAM_CHAT_ID"),
        ) {
            (Some(bot_token), Some(chat_id)) => Some(TelegramSettings {
                bot_token,
                chat_id: chat_id.parse().wrap_err("invalid TELEGRAM_CHAT_ID")?,
                topic_id: optional_env("TELEGRAM_TOPIC_ID")
                    .map(|topic| topic.parse())
                    .transpose()
                    .wrap_err("invalid TELEGRAM_TOPIC_ID")?,
            }),
            _ => None,
        };

        let metrics_port = match optional_env("METRICS_PORT") {
            Some(port) => port.parse().wrap_err("invalid METRICS_PORT")?,
            None => 9090,
        };

        Ok(Self {
            l1_rpc_url,
            l2_rpc_url,
            signer,
            contracts,
            withdrawal_tx_hashes,
            telegram,
            metrics_port,
        })
    }
}

/// Split a comma-separated hash list, trimming whitespace and dropping
/// empty entries.
pub fn parse_tx_hashes(raw: &str) -> Result<Vec<B256>> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse()
                .wrap_err_with(|| format!("invalid withdrawal tx hash: {part}"))
        })
        .collect()
}

fn required_env(key: &str) -> Result<String> {
    optional_env(key).ok_or_else(|| eyre!("{key} environment variable is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}
