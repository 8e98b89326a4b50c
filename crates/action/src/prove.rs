//! Prove withdrawal action.
//!
//! Submits a proof to L1 that a withdrawal was registered on L2.

use crate::Action;
use alloy_primitives::{Address, U256};
use alloy_provider::Provider;
use binding::mantle::{IMantlePortal, WithdrawalTransaction};
use client::SignerFn;
use tracing::info;
use withdrawal::{proof::generate_proof, state::MessageStateProvider, types::WithdrawalHash};

/// Input data for proving a withdrawal on L1.
#[derive(Clone, Debug)]
pub struct Prove {
    /// MantlePortal contract address on L1
    pub portal_address: Address,
    /// L2OutputOracle contract address on L1
    pub oracle_address: Address,
    /// L2ToL1MessagePasser address on L2
    pub message_passer_address: Address,
    /// The withdrawal transaction details
    pub withdrawal: WithdrawalTransaction,
    /// Hash of the withdrawal
    pub withdrawal_hash: WithdrawalHash,
    /// L2 block number where the withdrawal was initiated
    pub l2_block: u64,
    /// Address that will submit the prove transaction
    pub from: Address,
}

/// Action to prove a withdrawal on L1.
pub struct ProveAction<P1, P2> {
    l1_provider: P1,
    l2_provider: P2,
    signer: SignerFn,
    action: Prove,
}

impl<P1, P2> ProveAction<P1, P2>
where
    P1: Provider + Clone,
    P2: Provider + Clone,
{
    pub fn new(l1_provider: P1, l2_provider: P2, signer: SignerFn, action: Prove) -> Self {
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
            self.action.message_passer_address,
        )
    }

    /// Check if the withdrawal has been proven on the portal.
    async fn check_is_proven(&self) -> eyre::Result<bool> {
        let proven_at = self
            .state_provider()
            .proven_at(self.action.withdrawal_hash)
            .await?;
        Ok(proven_at.is_some())
    }
}

impl<P1, P2> Action for ProveAction<P1, P2>
where
    P1: Provider + Clone,
    P2: Provider + Clone,
{
    async fn is_ready(&self) -> eyre::Result<bool> {
        // Ready if not already proven
        Ok(!self.check_is_proven().await?)
    }

    async fn is_completed(&self) -> eyre::Result<bool> {
        self.check_is_proven().await
    }

    async fn execute(&mut self) -> eyre::Result<crate::Result> {
        if self.is_completed().await? {
            eyre::bail!("Withdrawal already proven")
        }

        info!(
            withdrawal_hash = %self.action.withdrawal_hash,
            l2_block = self.action.l2_block,
            "Generating withdrawal proof"
        );

        let Some(proof_params) = generate_proof(
            &self.l1_provider,
            &self.l2_provider,
            self.action.oracle_address,
            self.action.message_passer_address,
            self.action.withdrawal_hash,
            self.action.withdrawal.clone(),
            self.action.l2_block,
        )
        .await?
        else {
            eyre::bail!(
                "no proposed L2 output covers block {} yet",
                self.action.l2_block
            )
        };

        info!(
            l2_output_index = %proof_params.l2_output_index,
            proof_nodes = proof_params.withdrawal_proof.len(),
            "Proof generated, submitting to L1"
        );

        let portal = IMantlePortal::new(self.action.portal_address, &self.l1_provider);
        let call = portal.proveWithdrawalTransaction(
            proof_params.withdrawal,
            proof_params.l2_output_index,
            proof_params.output_root_proof,
            proof_params.withdrawal_proof,
        );

        // The signing backend only ever sees a fully filled request.
        let tx_request = call.into_transaction_request().from(self.action.from);
        let filled_tx = client::fill_transaction(tx_request, &self.l1_provider).await?;
        let signed_tx = (self.signer)(filled_tx).await?;

        let pending = self.l1_provider.send_raw_transaction(&signed_tx).await?;
        let receipt = pending.get_receipt().await?;

        if !receipt.status() {
            eyre::bail!(
                "prove transaction {} reverted on L1",
                receipt.transaction_hash
            )
        }

        info!(
            tx_hash = %receipt.transaction_hash,
            block_number = receipt.block_number,
            gas_used = receipt.gas_used,
            withdrawal_hash = %self.action.withdrawal_hash,
            "Withdrawal proven on L1"
        );

        Ok(crate::Result {
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
            gas_used: Some(U256::from(receipt.gas_used)),
        })
    }

    fn description(&self) -> String {
        format!("Proving withdrawal {} on L1", self.action.withdrawal_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{mock_signer, MockProvider};
    use alloy_primitives::{address, b256, Bytes};

    fn sample_withdrawal() -> WithdrawalTransaction {
        WithdrawalTransaction {
            nonce: U256::from(4096),
            sender: address!("2e1b9b237ca8f891cc2b9035408abc6d55a7c0a5"),
            target: address!("d26e9b375c8a7a4c294cd4a9ecde4bb1ef6df4e2"),
            mntValue: U256::from(25_000_000_000_000_000_000u128), // 25 MNT
            ethValue: U256::ZERO,
            gasLimit: U256::from(300_000),
            data: Bytes::new(),
        }
    }

    fn create_test_prove_action() -> ProveAction<MockProvider, MockProvider> {
        let prove = Prove {
            portal_address: address!("c54cb22944F2bE476E02dECfCD7e3E7d3e15A8Fb"),
            oracle_address: address!("31d543e7BE1dA6eFDc2206Ef7822879045B9f481"),
            message_passer_address: address!("4200000000000000000000000000000000000016"),
            withdrawal: sample_withdrawal(),
            withdrawal_hash: b256!(
                "9f3a8d0c5b61e47d2a80f1c6de93b5a7440e8c129b7d6f30a5c4e2d8117b6afe"
            ),
            l2_block: 68_123_456,
            from: address!("2e1b9b237ca8f891cc2b9035408abc6d55a7c0a5"),
        };

        ProveAction::new(MockProvider, MockProvider, mock_signer(), prove)
    }

    #[test]
    fn test_prove_action_description() {
        let action = create_test_prove_action();
        let desc = action.description();
        assert!(desc.contains("Proving withdrawal"));
        assert!(desc.contains("9f3a8d0c5b61e47d2a80f1c6de93b5a7440e8c129b7d6f30a5c4e2d8117b6afe"));
    }

    #[test]
    fn test_prove_action_withdrawal_hash() {
        let action = create_test_prove_action();
        assert_eq!(
            action.withdrawal_hash(),
            b256!("9f3a8d0c5b61e47d2a80f1c6de93b5a7440e8c129b7d6f30a5c4e2d8117b6afe")
        );
    }

    #[test]
    fn test_withdrawal_hash_tracks_both_value_legs() {
        use withdrawal::hash::compute_withdrawal_hash;

        // Moving the same amount as ETH instead of MNT is a different
        // withdrawal as far as the portal is concerned.
        let mnt_leg = sample_withdrawal();
        let mut eth_leg = mnt_leg.clone();
        std::mem::swap(&mut eth_leg.mntValue, &mut eth_leg.ethValue);

        assert_ne!(
            compute_withdrawal_hash(&mnt_leg),
            compute_withdrawal_hash(&eth_leg)
        );
    }
}
