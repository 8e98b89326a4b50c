//! Finalize withdrawal action.
//!
//! Finalizes a proven withdrawal on L1 once the challenge period has
//! elapsed, releasing MNT/ETH to the recipient.

use crate::Action;
use alloy_primitives::{Address, U256};
use alloy_provider::Provider;
use binding::mantle::{IMantlePortal, WithdrawalTransaction};
use client::SignerFn;
use tracing::info;
use withdrawal::{challenge, state::MessageStateProvider, types::WithdrawalHash};

/// Input data for finalizing a withdrawal on L1.
#[derive(Clone, Debug)]
pub struct Finalize {
    /// MantlePortal contract address on L1
    pub portal_address: Address,
    /// The withdrawal transaction details
    pub withdrawal: WithdrawalTransaction,
    /// Hash of the withdrawal
    pub withdrawal_hash: WithdrawalHash,
    /// Address that will submit the finalize transaction
    pub from: Address,
}

/// Action to finalize a proven withdrawal on L1.
pub struct FinalizeAction<P1, P2> {
    l1_provider: P1,
    l2_provider: P2,
    signer: SignerFn,
    action: Finalize,
}

impl<P1, P2> FinalizeAction<P1, P2>
where
    P1: Provider + Clone,
    P2: Provider + Clone,
{
    pub fn new(l1_provider: P1, l2_provider: P2, signer: SignerFn, action: Finalize) -> Self {
        Self {
            l1_provider,
            l2_provider,
            signer,
            action,
        }
    }

    /// Get the withdrawal hash for this action.
    pub const fn withdrawal_hash(&self) -> WithdrawalHash {
        self.action.withdrawal_hash
    }

    fn state_provider(&self) -> MessageStateProvider<P1, P2> {
        MessageStateProvider::new(
            self.l1_provider.clone(),
            self.l2_provider.clone(),
            self.action.portal_address,
            Address::ZERO, // messenger not needed for portal reads
            Address::ZERO, // message passer not needed for portal reads
        )
    }

    async fn check_is_finalized(&self) -> eyre::Result<bool> {
        self.state_provider()
            .is_finalized(self.action.withdrawal_hash)
            .await
    }

    /// Prove timestamp from the portal, `None` when not proven.
    async fn check_proven_at(&self) -> eyre::Result<Option<u64>> {
        self.state_provider()
            .proven_at(self.action.withdrawal_hash)
            .await
    }

    /// Current L1 block timestamp.
    async fn get_current_timestamp(&self) -> eyre::Result<u64> {
        let block = self
            .l1_provider
            .get_block_by_number(alloy_rpc_types_eth::BlockNumberOrTag::Latest)
            .await?
            .ok_or_else(|| eyre::eyre!("Failed to get latest L1 block"))?;
        Ok(block.header.timestamp)
    }
}

impl<P1, P2> Action for FinalizeAction<P1, P2>
where
    P1: Provider + Clone,
    P2: Provider + Clone,
{
    async fn is_ready(&self) -> eyre::Result<bool> {
        // Not ready if already finalized
        if self.check_is_finalized().await? {
            return Ok(false);
        }

        let Some(proven_at) = self.check_proven_at().await? else {
            // Not proven yet
            return Ok(false);
        };

        let now = self.get_current_timestamp().await?;
        Ok(challenge::can_finalize(now, proven_at))
    }

    async fn is_completed(&self) -> eyre::Result<bool> {
        self.check_is_finalized().await
    }

    async fn execute(&mut self) -> eyre::Result<crate::Result> {
        if self.is_completed().await? {
            eyre::bail!("Withdrawal already finalized")
        }

        let Some(proven_at) = self.check_proven_at().await? else {
            eyre::bail!("Withdrawal not proven yet")
        };

        let now = self.get_current_timestamp().await?;
        if !challenge::can_finalize(now, proven_at) {
            let remaining = challenge::finalize_time(proven_at).saturating_sub(now);
            eyre::bail!(
                "Challenge period not elapsed. {} seconds remaining",
                remaining
            )
        }

        info!(
            withdrawal_hash = %self.action.withdrawal_hash,
            proven_at,
            "Finalizing withdrawal"
        );

        // Unlike prove, the portal only wants the withdrawal tuple here;
        // it re-derives the hash and looks up the proven record itself.
        let portal = IMantlePortal::new(self.action.portal_address, &self.l1_provider);
        let call = portal.finalizeWithdrawalTransaction(self.action.withdrawal.clone());

        let tx_request = call.into_transaction_request().from(self.action.from);
        let filled_tx = client::fill_transaction(tx_request, &self.l1_provider).await?;
        let signed_tx = (self.signer)(filled_tx).await?;

        let pending = self.l1_provider.send_raw_transaction(&signed_tx).await?;
        let receipt = pending.get_receipt().await?;

        if !receipt.status() {
            eyre::bail!(
                "finalize transaction {} reverted on L1",
                receipt.transaction_hash
            )
        }

        info!(
            tx_hash = %receipt.transaction_hash,
            block_number = receipt.block_number,
            gas_used = receipt.gas_used,
            withdrawal_hash = %self.action.withdrawal_hash,
            "Withdrawal finalized on L1"
        );

        Ok(crate::Result {
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
            gas_used: Some(U256::from(receipt.gas_used)),
        })
    }

    fn description(&self) -> String {
        format!(
            "Finalizing withdrawal {} on L1",
            self.action.withdrawal_hash
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{mock_signer, MockProvider};
    use alloy_primitives::{address, b256, Bytes};

    fn create_test_finalize_action() -> FinalizeAction<MockProvider, MockProvider> {
        // An ETH-leg withdrawal: MNT side zero, sender withdrawing to
        // itself on L1.
        let finalize = Finalize {
            portal_address: address!("c54cb22944F2bE476E02dECfCD7e3E7d3e15A8Fb"),
            withdrawal: WithdrawalTransaction {
                nonce: U256::from(917),
                sender: address!("8b5df4c31a2e6c9d07421b90f6ae83d9c4450d11"),
                target: address!("8b5df4c31a2e6c9d07421b90f6ae83d9c4450d11"),
                mntValue: U256::ZERO,
                ethValue: U256::from(750_000_000_000_000_000u64), // 0.75 ETH
                gasLimit: U256::from(200_000),
                data: Bytes::new(),
            },
            withdrawal_hash: b256!(
                "c2b40e7a95d8f6031ed7a5b2c4889f01d3a6e45c7b980f2e1a5d40c3b6e97f18"
            ),
            from: address!("8b5df4c31a2e6c9d07421b90f6ae83d9c4450d11"),
        };

        FinalizeAction::new(MockProvider, MockProvider, mock_signer(), finalize)
    }

    #[test]
    fn test_finalize_action_description() {
        let action = create_test_finalize_action();
        let desc = action.description();
        assert!(desc.contains("Finalizing withdrawal"));
        assert!(desc.contains("c2b40e7a95d8f6031ed7a5b2c4889f01d3a6e45c7b980f2e1a5d40c3b6e97f18"));
    }

    #[test]
    fn test_finalize_action_withdrawal_hash() {
        let action = create_test_finalize_action();
        assert_eq!(
            action.withdrawal_hash(),
            b256!("c2b40e7a95d8f6031ed7a5b2c4889f01d3a6e45c7b980f2e1a5d40c3b6e97f18")
        );
    }
}
