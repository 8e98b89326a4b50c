use crate::{
    events::decode_withdrawal_events,
    hash::compute_withdrawal_hash,
    types::{Direction, Message, MessageStatus, WithdrawalHash},
};
use alloy_primitives::{Address, B256, U256};
use alloy_provider::Provider;
use binding::mantle::IMantlePortal;
use eyre::{eyre, Result};
use tracing::warn;

/// Reads authoritative withdrawal state from the L1 portal and
/// materializes [`Message`]s from L2 receipts.
pub struct MessageStateProvider<P1, P2> {
    l1_provider: P1,
    l2_provider: P2,
    portal_address: Address,
    messenger_address: Address,
    message_passer_address: Address,
}

impl<P1, P2> MessageStateProvider<P1, P2>
where
    P1: Provider + Clone,
    P2: Provider + Clone,
{
    pub const fn new(
        l1_provider: P1,
        l2_provider: P2,
        portal_address: Address,
        messenger_address: Address,
        message_passer_address: Address,
    ) -> Self {
        Self {
            l1_provider,
            l2_provider,
            portal_address,
            messenger_address,
            message_passer_address,
        }
    }

    /// Materialize the withdrawal message for an L2 transaction, with a
    /// freshly computed lifecycle status.
    pub async fn get_message(&self, tx_hash: B256) -> Result<Message> {
        let receipt = self
            .l2_provider
            .get_transaction_receipt(tx_hash)
            .await?
            .ok_or_else(|| eyre!("transaction receipt not found on L2: {tx_hash}"))?;
        let block_number = receipt
            .block_number
            .ok_or_else(|| eyre!("receipt for {tx_hash} has no block number"))?;

        let events = decode_withdrawal_events(
            receipt.logs(),
            self.messenger_address,
            self.message_passer_address,
        )?;

        let withdrawal_hash = events.message_passed.withdrawalHash;
        let (mnt_value, eth_value) = match &events.sent_message_extension {
            Some(extension) => (extension.mntValue, extension.ethValue),
            None => (U256::ZERO, U256::ZERO),
        };

        let status = self.query_status(withdrawal_hash).await?;

        Ok(Message {
            tx_hash,
            block_number,
            log_index: events.log_index,
            direction: Direction::L2ToL1,
            status,
            msg_nonce: events.message_passed.nonce,
            withdrawal_hash,
            mnt_value,
            eth_value,
            sent_message: events.sent_message,
            sent_message_extension: events.sent_message_extension,
            message_passed: events.message_passed,
        })
    }

    /// Compute the lifecycle status from portal reads. Finalized wins over
    /// everything; proven requires a non-zero prove timestamp.
    pub async fn query_status(&self, hash: WithdrawalHash) -> Result<MessageStatus> {
        if self.is_finalized(hash).await? {
            return Ok(MessageStatus::Finalized);
        }
        let proven_at = self.proven_at(hash).await?.unwrap_or(0);
        Ok(status_from_portal(false, proven_at))
    }

    pub async fn is_finalized(&self, hash: WithdrawalHash) -> Result<bool> {
        let portal = IMantlePortal::new(self.portal_address, &self.l1_provider);
        let finalized = portal.finalizedWithdrawals(hash).call().await?;
        Ok(finalized)
    }

    /// Prove timestamp for a withdrawal, `None` when not (yet) proven.
    ///
    /// The portal can momentarily hold a non-zero output root with a zero
    /// timestamp; that counts as not proven, since the challenge-period
    /// math would otherwise run from the epoch.
    pub async fn proven_at(&self, hash: WithdrawalHash) -> Result<Option<u64>> {
        let portal = IMantlePortal::new(self.portal_address, &self.l1_provider);
        let proven = portal.provenWithdrawals(hash).call().await?;

        if proven.timestamp == 0 {
            if proven.outputRoot != B256::ZERO {
                warn!(
                    withdrawal_hash = %hash,
                    "portal reports an output root with zero prove timestamp; treating as not proven"
                );
            }
            return Ok(None);
        }

        Ok(Some(u64::try_from(proven.timestamp).unwrap_or(u64::MAX)))
    }
}

/// Status from raw portal observations. Finalized wins; a zero prove
/// timestamp means not proven.
pub const fn status_from_portal(finalized: bool, proven_timestamp: u64) -> MessageStatus {
    if finalized {
        MessageStatus::Finalized
    } else if proven_timestamp > 0 {
        MessageStatus::Proven {
            timestamp: proven_timestamp,
        }
    } else {
        MessageStatus::ReadyToProve
    }
}

/// Check that a materialized message's withdrawal hash matches the hash of
/// its own tuple encoding.
///
/// A mismatch means the decoded events would produce a tuple the portal
/// has never seen; proving or finalizing with it can only revert.
pub fn verify_message(message: &Message) -> Result<()> {
    let computed = compute_withdrawal_hash(&message.withdrawal_transaction());
    if computed != message.withdrawal_hash {
        return Err(eyre!(
            "withdrawal hash mismatch: computed {computed}, event has {}",
            message.withdrawal_hash
        ));
    }
    Ok(())
}
