//! Proof generation for Mantle L2→L1 withdrawals.
//!
//! This module assembles everything `proveWithdrawalTransaction` needs:
//! the L2 output index covering the withdrawal, the output root proof, and
//! the normalized Merkle-Patricia storage proof showing the withdrawal was
//! registered in the message passer.

use crate::{trie::maybe_add_proof_node, types::WithdrawalHash};
use alloy_primitives::{keccak256, Address, BlockNumber, Bytes, B256, U256};
use alloy_provider::Provider;
use alloy_rpc_types_eth::BlockNumberOrTag;
use binding::mantle::{IL2OutputOracle, OutputRootProof, WithdrawalTransaction, OUTPUT_VERSION_V0};
use eyre::{eyre, Result};
use tracing::debug;

/// Parameters required to prove a withdrawal on L1.
#[derive(Debug, Clone)]
pub struct ProveWithdrawalParams {
    pub withdrawal: WithdrawalTransaction,
    pub l2_output_index: U256,
    pub output_root_proof: OutputRootProof,
    pub withdrawal_proof: Vec<Bytes>,
}

/// A proposed output covering a withdrawal's L2 block.
#[derive(Debug, Clone, Copy)]
pub struct EligibleOutput {
    pub index: U256,
    pub output_root: B256,
    pub timestamp: u64,
    pub l2_block: u64,
}

/// Find the first proposed output at or after `withdrawal_block`.
///
/// Returns `Ok(None)` when the proposal the oracle points at does not yet
/// cover the withdrawal block; the caller retries on a later tick.
pub async fn find_eligible_output<P>(
    l1_provider: &P,
    oracle_address: Address,
    withdrawal_block: BlockNumber,
) -> Result<Option<EligibleOutput>>
where
    P: Provider + Clone,
{
    let oracle = IL2OutputOracle::new(oracle_address, l1_provider);
    let index = oracle
        .getL2OutputIndexAfter(U256::from(withdrawal_block))
        .call()
        .await?;
    let output = oracle.getL2Output(index).call().await?;

    let proposed_block = u64::try_from(output.l2BlockNumber)
        .map_err(|_| eyre!("proposed L2 block number out of range"))?;
    if proposed_block < withdrawal_block {
        debug!(
            proposed_block,
            withdrawal_block, "no proposed output covers the withdrawal yet"
        );
        return Ok(None);
    }

    Ok(Some(EligibleOutput {
        index,
        output_root: output.outputRoot,
        timestamp: u64::try_from(output.timestamp).unwrap_or(u64::MAX),
        l2_block: proposed_block,
    }))
}

/// Generate the portal inputs proving a withdrawal was registered on L2.
///
/// Returns `Ok(None)` while no proposed output covers the withdrawal's
/// block. The output root recomputed from the assembled proof MUST match
/// the oracle's root; a mismatch aborts before anything is sent to L1,
/// since the portal would always revert on it.
pub async fn generate_proof<P1, P2>(
    l1_provider: &P1,
    l2_provider: &P2,
    oracle_address: Address,
    message_passer: Address,
    withdrawal_hash: WithdrawalHash,
    withdrawal: WithdrawalTransaction,
    withdrawal_block: BlockNumber,
) -> Result<Option<ProveWithdrawalParams>>
where
    P1: Provider + Clone,
    P2: Provider + Clone,
{
    let Some(output) = find_eligible_output(l1_provider, oracle_address, withdrawal_block).await?
    else {
        return Ok(None);
    };

    debug!(
        index = %output.index,
        proposed_block = output.l2_block,
        withdrawal_block,
        "found eligible L2 output"
    );

    // The proof must be generated at the proposed block, not the
    // withdrawal block: the portal checks against the proposed state.
    let block = l2_provider
        .get_block_by_number(BlockNumberOrTag::Number(output.l2_block))
        .await?
        .ok_or_else(|| eyre!("L2 block not found: {}", output.l2_block))?;

    let storage_slot = compute_storage_slot(withdrawal_hash);
    debug!(slot = %storage_slot, block = output.l2_block, "fetching storage proof");
    let proof_result = l2_provider
        .get_proof(message_passer, vec![storage_slot])
        .block_id(BlockNumberOrTag::Number(output.l2_block).into())
        .await?;

    let slot_proof = proof_result
        .storage_proof
        .first()
        .ok_or_else(|| eyre!("no storage proof returned"))?;
    if slot_proof.value != U256::from(1) {
        return Err(eyre!(
            "withdrawal {withdrawal_hash} is not registered in the message passer (storage value {})",
            slot_proof.value
        ));
    }

    let withdrawal_proof = maybe_add_proof_node(keccak256(storage_slot), slot_proof.proof.clone())?;
    debug!(
        proof_nodes = withdrawal_proof.len(),
        "storage proof normalized"
    );

    let output_root_proof = OutputRootProof {
        version: OUTPUT_VERSION_V0,
        stateRoot: block.header.state_root,
        messagePasserStorageRoot: proof_result.storage_hash,
        latestBlockhash: block.header.hash,
    };

    let computed = compute_output_root(&output_root_proof);
    if computed != output.output_root {
        return Err(eyre!(
            "output root mismatch: computed {computed}, oracle has {}",
            output.output_root
        ));
    }

    Ok(Some(ProveWithdrawalParams {
        withdrawal,
        l2_output_index: output.index,
        output_root_proof,
        withdrawal_proof,
    }))
}

/// Compute the storage slot of `sentMessages[withdrawalHash]` in the
/// message passer.
///
/// The mapping is declared at slot 0, so the slot is
/// keccak256(withdrawalHash || bytes32(0)).
pub fn compute_storage_slot(withdrawal_hash: B256) -> B256 {
    let mut data = [0u8; 64];
    data[0..32].copy_from_slice(withdrawal_hash.as_slice());
    // data[32..64] stays zero (mapping slot 0)
    keccak256(data)
}

/// Recompute the output root a proof commits to: keccak256 over the
/// 128-byte concatenation of version, state root, message-passer storage
/// root and block hash.
pub fn compute_output_root(proof: &OutputRootProof) -> B256 {
    let mut data = Vec::with_capacity(128);
    data.extend_from_slice(proof.version.as_slice());
    data.extend_from_slice(proof.stateRoot.as_slice());
    data.extend_from_slice(proof.messagePasserStorageRoot.as_slice());
    data.extend_from_slice(proof.latestBlockhash.as_slice());
    keccak256(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::b256;

    #[test]
    fn test_compute_storage_slot_known_vector() {
        let slot = compute_storage_slot(B256::from([0x11; 32]));
        assert_eq!(
            slot,
            b256!("5c75bb376affa44a4f06c8a768453c2f7945122a65eb322a0dd3cc2edcbd6f0a")
        );
    }

    #[test]
    fn test_compute_storage_slot_zero_hash() {
        // keccak256 of 64 zero bytes
        assert_eq!(
            compute_storage_slot(B256::ZERO),
            b256!("ad3228b676f7d3cd4284a5443f17f1962b36e491b30a40b2405849e597ba5fb5")
        );
    }

    #[test]
    fn test_compute_storage_slot_distinct() {
        let slot = compute_storage_slot(B256::from([1u8; 32]));
        let other = compute_storage_slot(B256::from([2u8; 32]));
        assert_ne!(slot, other);
        assert_ne!(slot, B256::ZERO);
    }

    #[test]
    fn test_compute_output_root_matches_manual_concat() {
        let proof = OutputRootProof {
            version: OUTPUT_VERSION_V0,
            stateRoot: B256::from([0x0a; 32]),
            messagePasserStorageRoot: B256::from([0x0b; 32]),
            latestBlockhash: B256::from([0x0c; 32]),
        };

        let mut manual = Vec::with_capacity(128);
        manual.extend_from_slice(&[0u8; 32]);
        manual.extend_from_slice(&[0x0a; 32]);
        manual.extend_from_slice(&[0x0b; 32]);
        manual.extend_from_slice(&[0x0c; 32]);

        assert_eq!(compute_output_root(&proof), keccak256(manual));
    }

    #[test]
    fn test_output_root_sensitive_to_each_field() {
        let base = OutputRootProof {
            version: OUTPUT_VERSION_V0,
            stateRoot: B256::from([0x0a; 32]),
            messagePasserStorageRoot: B256::from([0x0b; 32]),
            latestBlockhash: B256::from([0x0c; 32]),
        };
        let base_root = compute_output_root(&base);

        let mut changed = base.clone();
        changed.stateRoot = B256::from([0xaa; 32]);
        assert_ne!(compute_output_root(&changed), base_root);

        let mut changed = base.clone();
        changed.messagePasserStorageRoot = B256::from([0xbb; 32]);
        assert_ne!(compute_output_root(&changed), base_root);

        let mut changed = base;
        changed.latestBlockhash = B256::from([0xcc; 32]);
        assert_ne!(compute_output_root(&changed), base_root);
    }
}
