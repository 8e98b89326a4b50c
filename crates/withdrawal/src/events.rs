//! Decoding of the withdrawal events out of an L2 transaction receipt.
//!
//! A withdrawal receipt carries up to three interesting logs: `SentMessage`
//! and `SentMessageExtension1` from the cross-domain messenger, and
//! `MessagePassed` from the message passer. Only `MessagePassed` is
//! required; without it there is no withdrawal to drive.

use alloy_primitives::Address;
use alloy_rpc_types_eth::Log;
use alloy_sol_types::SolEvent;
use binding::mantle::{
    IL2CrossDomainMessenger::{SentMessage, SentMessageExtension1},
    IL2ToL1MessagePasser::MessagePassed,
};
use eyre::{eyre, Result};

/// The decoded withdrawal events of one L2 receipt.
#[derive(Debug, Clone)]
pub struct WithdrawalEvents {
    pub sent_message: Option<SentMessage>,
    pub sent_message_extension: Option<SentMessageExtension1>,
    pub message_passed: MessagePassed,
    /// Log index of the MessagePassed event within its block.
    pub log_index: u64,
}

/// Scan receipt logs for the withdrawal events.
///
/// Logs are matched by emitting contract address and event signature; the
/// first match of each event wins. A log that matches but fails to decode
/// is an error for the whole receipt, never a zero-valued event: a
/// half-decoded event would produce a withdrawal tuple whose hash
/// disagrees with what the portal has recorded.
pub fn decode_withdrawal_events(
    logs: &[Log],
    messenger: Address,
    message_passer: Address,
) -> Result<WithdrawalEvents> {
    let mut sent_message = None;
    let mut sent_message_extension = None;
    let mut message_passed: Option<(MessagePassed, u64)> = None;

    for log in logs {
        let Some(topic) = log.data().topics().first() else {
            continue;
        };

        if log.address() == messenger && *topic == SentMessage::SIGNATURE_HASH {
            if sent_message.is_none() {
                let event = SentMessage::decode_log(&log.inner)
                    .map_err(|e| eyre!("malformed SentMessage log: {e}"))?;
                sent_message = Some(event.data);
            }
        } else if log.address() == messenger && *topic == SentMessageExtension1::SIGNATURE_HASH {
            if sent_message_extension.is_none() {
                let event = SentMessageExtension1::decode_log(&log.inner)
                    .map_err(|e| eyre!("malformed SentMessageExtension1 log: {e}"))?;
                sent_message_extension = Some(event.data);
            }
        } else if log.address() == message_passer && *topic == MessagePassed::SIGNATURE_HASH {
            if message_passed.is_none() {
                let event = MessagePassed::decode_log(&log.inner)
                    .map_err(|e| eyre!("malformed MessagePassed log: {e}"))?;
                message_passed = Some((event.data, log.log_index.unwrap_or_default()));
            }
        }
    }

    let (message_passed, log_index) = message_passed
        .ok_or_else(|| eyre!("no MessagePassed event in receipt: not a withdrawal"))?;

    Ok(WithdrawalEvents {
        sent_message,
        sent_message_extension,
        message_passed,
        log_index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, Address, Bytes, LogData, B256, U256};

    const MESSENGER: Address = address!("4200000000000000000000000000000000000007");
    const MESSAGE_PASSER: Address = address!("4200000000000000000000000000000000000016");

    fn log_at(address: Address, data: LogData, log_index: u64) -> Log {
        Log {
            inner: alloy_primitives::Log { address, data },
            block_hash: None,
            block_number: None,
            block_timestamp: None,
            transaction_hash: None,
            transaction_index: None,
            log_index: Some(log_index),
            removed: false,
        }
    }

    fn message_passed_log(log_index: u64) -> Log {
        let event = MessagePassed {
            nonce: U256::from(7),
            sender: address!("1111111111111111111111111111111111111111"),
            target: address!("2222222222222222222222222222222222222222"),
            mntValue: U256::from(500),
            ethValue: U256::ZERO,
            gasLimit: U256::from(200_000),
            data: Bytes::from(vec![0xde, 0xad]),
            withdrawalHash: B256::from([0xab; 32]),
        };
        log_at(MESSAGE_PASSER, event.encode_log_data(), log_index)
    }

    fn extension_log() -> Log {
        let event = SentMessageExtension1 {
            sender: address!("1111111111111111111111111111111111111111"),
            mntValue: U256::from(500),
            ethValue: U256::from(9),
        };
        log_at(MESSENGER, event.encode_log_data(), 1)
    }

    #[test]
    fn test_decodes_full_receipt() {
        let sent = SentMessage {
            target: address!("2222222222222222222222222222222222222222"),
            sender: address!("1111111111111111111111111111111111111111"),
            message: Bytes::from(vec![0x01, 0x02]),
            messageNonce: U256::from(7),
            gasLimit: U256::from(200_000),
        };
        let logs = vec![
            log_at(MESSENGER, sent.encode_log_data(), 0),
            extension_log(),
            message_passed_log(2),
        ];

        let events = decode_withdrawal_events(&logs, MESSENGER, MESSAGE_PASSER).unwrap();
        assert!(events.sent_message.is_some());
        assert!(events.sent_message_extension.is_some());
        assert_eq!(events.log_index, 2);
        assert_eq!(events.message_passed.nonce, U256::from(7));
        assert_eq!(
            events.sent_message_extension.unwrap().ethValue,
            U256::from(9)
        );
    }

    #[test]
    fn test_missing_message_passed_is_an_error() {
        let logs = vec![extension_log()];
        assert!(decode_withdrawal_events(&logs, MESSENGER, MESSAGE_PASSER).is_err());
    }

    #[test]
    fn test_missing_extension_is_tolerated() {
        let logs = vec![message_passed_log(0)];
        let events = decode_withdrawal_events(&logs, MESSENGER, MESSAGE_PASSER).unwrap();
        assert!(events.sent_message.is_none());
        assert!(events.sent_message_extension.is_none());
    }

    #[test]
    fn test_wrong_emitter_is_skipped() {
        // MessagePassed emitted by a random contract must not count.
        let stranger = address!("3333333333333333333333333333333333333333");
        let mut log = message_passed_log(0);
        log.inner.address = stranger;

        assert!(decode_withdrawal_events(&[log], MESSENGER, MESSAGE_PASSER).is_err());
    }

    #[test]
    fn test_first_match_wins() {
        let logs = vec![message_passed_log(3), message_passed_log(9)];
        let events = decode_withdrawal_events(&logs, MESSENGER, MESSAGE_PASSER).unwrap();
        assert_eq!(events.log_index, 3);
    }
}
