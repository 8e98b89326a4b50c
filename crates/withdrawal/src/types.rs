use alloy_primitives::{B256, U256};
use binding::mantle::{IL2CrossDomainMessenger, IL2ToL1MessagePasser, WithdrawalTransaction};
use std::fmt;

pub type WithdrawalHash = B256;

/// Lifecycle status of a withdrawal, computed fresh from portal reads on
/// every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStatus {
    ReadyToProve,
    Proven { timestamp: u64 },
    Finalized,
    Unknown,
}

impl MessageStatus {
    /// Numeric status code used by the operator CLI (0/1/2).
    pub const fn code(&self) -> u8 {
        match self {
            Self::ReadyToProve => 0,
            Self::Proven { .. } => 1,
            Self::Finalized => 2,
            Self::Unknown => u8::MAX,
        }
    }

    pub const fn describe(&self) -> &'static str {
        match self {
            Self::ReadyToProve => "READY_TO_PROVE",
            Self::Proven { .. } => "PROVEN",
            Self::Finalized => "FINALIZED",
            Self::Unknown => "UNKNOWN",
        }
    }
}

/// Message direction. Only L2→L1 withdrawals are handled here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    L2ToL1,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::L2ToL1 => f.write_str("L2_TO_L1"),
        }
    }
}

/// Materialized record of one L2→L1 withdrawal.
///
/// Built once per tick from the L2 transaction receipt and never mutated
/// within that tick.
#[derive(Debug, Clone)]
pub struct Message {
    /// L2 transaction that initiated the withdrawal
    pub tx_hash: B256,
    /// L2 block the withdrawal was included in
    pub block_number: u64,
    /// Log index of the MessagePassed event
    pub log_index: u64,
    pub direction: Direction,
    pub status: MessageStatus,
    pub msg_nonce: U256,
    pub withdrawal_hash: WithdrawalHash,
    /// MNT transferred; zero when SentMessageExtension1 is absent
    pub mnt_value: U256,
    /// ETH transferred; zero when SentMessageExtension1 is absent
    pub eth_value: U256,
    pub sent_message: Option<IL2CrossDomainMessenger::SentMessage>,
    pub sent_message_extension: Option<IL2CrossDomainMessenger::SentMessageExtension1>,
    pub message_passed: IL2ToL1MessagePasser::MessagePassed,
}

impl Message {
    /// The portal-facing withdrawal tuple.
    ///
    /// Equal by value across prove and finalize for the same withdrawal;
    /// its keccak encoding is the withdrawal hash.
    pub fn withdrawal_transaction(&self) -> WithdrawalTransaction {
        WithdrawalTransaction {
            nonce: self.msg_nonce,
            sender: self.message_passed.sender,
            target: self.message_passed.target,
            mntValue: self.mnt_value,
            ethValue: self.eth_value,
            gasLimit: self.message_passed.gasLimit,
            data: self.message_passed.data.clone(),
        }
    }
}
