use crate::types::WithdrawalHash;
use alloy_primitives::keccak256;
use alloy_sol_types::SolValue;
use binding::mantle::WithdrawalTransaction;

/// Hash of the portal withdrawal tuple.
///
/// Mirrors Solidity's `Hashing.hashWithdrawal`:
/// keccak256(abi.encode(nonce, sender, target, mntValue, ethValue, gasLimit, data)).
/// The fields are encoded as a bare sequence, without a wrapping tuple
/// offset, which is what `abi.encode` of the individual members produces.
pub fn compute_withdrawal_hash(tx: &WithdrawalTransaction) -> WithdrawalHash {
    let encoded = (
        &tx.nonce,
        &tx.sender,
        &tx.target,
        &tx.mntValue,
        &tx.ethValue,
        &tx.gasLimit,
        &tx.data,
    )
        .abi_encode_sequence();

    keccak256(encoded)
}
