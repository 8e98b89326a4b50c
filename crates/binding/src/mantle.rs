//! Mantle contract bindings.
//!
//! Includes the contracts touched by L2→L1 withdrawals:
//! - L2CrossDomainMessenger (L2 predeploy, SentMessage events)
//! - L2ToL1MessagePasser (L2 predeploy, MessagePassed event)
//! - MantlePortal (L1 contract, prove + finalize)
//! - L2OutputOracle (L1 contract, proposed output roots)

use alloy_primitives::{address, Address, B256};
use alloy_sol_types::sol;

/// L2ToL1MessagePasser predeploy address.
/// Address: 0x4200000000000000000000000000000000000016 (on all OP Stack derived chains)
pub const MESSAGE_PASSER_ADDRESS: Address = address!("4200000000000000000000000000000000000016");

/// L2CrossDomainMessenger predeploy address.
/// Address: 0x4200000000000000000000000000000000000007
pub const CROSS_DOMAIN_MESSENGER_ADDRESS: Address =
    address!("4200000000000000000000000000000000000007");

/// Output root version understood by the portal's proof verification (v0).
pub const OUTPUT_VERSION_V0: B256 = B256::ZERO;

sol! {
    /// L2CrossDomainMessenger - L2 predeploy emitting the high-level message events
    #[sol(rpc)]
    interface IL2CrossDomainMessenger {
        /// Emitted for every cross-domain message sent from L2
        #[derive(Debug)]
        event SentMessage(
            address indexed target,
            address sender,
            bytes message,
            uint256 messageNonce,
            uint256 gasLimit
        );

        /// Emitted alongside SentMessage, carrying the transferred values
        #[derive(Debug)]
        event SentMessageExtension1(
            address indexed sender,
            uint256 mntValue,
            uint256 ethValue
        );
    }

    /// L2ToL1MessagePasser - L2 predeploy that registers withdrawals in storage
    #[sol(rpc)]
    interface IL2ToL1MessagePasser {
        /// Emitted when a withdrawal is initiated on L2
        #[derive(Debug)]
        event MessagePassed(
            uint256 indexed nonce,
            address indexed sender,
            address indexed target,
            uint256 mntValue,
            uint256 ethValue,
            uint256 gasLimit,
            bytes data,
            bytes32 withdrawalHash
        );

        /// Check if a withdrawal message has been registered
        function sentMessages(bytes32) external view returns (bool);

        /// Get the current message nonce (with version encoded in the top 2 bytes)
        function messageNonce() external view returns (uint256);
    }

    /// MantlePortal - Main L1 contract for withdrawal proving and finalization
    #[sol(rpc)]
    interface IMantlePortal {
        /// Proven withdrawal record stored on L1
        #[derive(Debug)]
        struct ProvenWithdrawal {
            bytes32 outputRoot;
            uint256 l2OutputIndex;
            uint128 timestamp;
        }

        /// Emitted when a withdrawal is proven on L1
        #[derive(Debug)]
        event WithdrawalProven(
            bytes32 indexed withdrawalHash,
            address indexed from,
            address indexed to
        );

        /// Emitted when a withdrawal is finalized on L1
        #[derive(Debug)]
        event WithdrawalFinalized(
            bytes32 indexed withdrawalHash,
            bool success
        );

        /// Query the proven withdrawal record by hash; a zero timestamp
        /// means the withdrawal has not been proven
        function provenWithdrawals(bytes32 withdrawalHash)
            external view returns (ProvenWithdrawal memory);

        /// Query if a withdrawal has been finalized
        function finalizedWithdrawals(bytes32 withdrawalHash)
            external view returns (bool);

        /// Prove a withdrawal transaction against a proposed output root
        function proveWithdrawalTransaction(
            WithdrawalTransaction calldata _tx,
            uint256 _l2OutputIndex,
            OutputRootProof calldata _outputRootProof,
            bytes[] calldata _withdrawalProof
        ) external;

        /// Finalize a proven withdrawal after the challenge period
        function finalizeWithdrawalTransaction(
            WithdrawalTransaction calldata _tx
        ) external;
    }

    /// L2OutputOracle - L1 contract holding the ordered sequence of proposed output roots
    #[sol(rpc)]
    interface IL2OutputOracle {
        /// A proposed L2 output: root, proposal time, and the L2 block it commits to
        #[derive(Debug)]
        struct OutputProposal {
            bytes32 outputRoot;
            uint128 timestamp;
            uint128 l2BlockNumber;
        }

        /// Emitted when a new output root is proposed
        #[derive(Debug)]
        event OutputProposed(
            bytes32 indexed outputRoot,
            uint256 indexed l2OutputIndex,
            uint256 indexed l2BlockNumber,
            uint256 l1Timestamp
        );

        /// Index of the first output whose L2 block number is >= the argument
        function getL2OutputIndexAfter(uint256 _l2BlockNumber)
            external view returns (uint256);

        /// Output proposal at a given index
        function getL2Output(uint256 _l2OutputIndex)
            external view returns (OutputProposal memory);

        /// Highest L2 block number with a proposed output
        function latestBlockNumber() external view returns (uint256);

        /// Index of the most recently proposed output
        function latestOutputIndex() external view returns (uint256);
    }

    /// Output root proof structure (used in proving withdrawals)
    #[derive(Debug)]
    struct OutputRootProof {
        bytes32 version;
        bytes32 stateRoot;
        bytes32 messagePasserStorageRoot;
        bytes32 latestBlockhash;
    }

    /// Withdrawal transaction structure (shared across contracts)
    #[derive(Debug)]
    struct WithdrawalTransaction {
        uint256 nonce;
        address sender;
        address target;
        uint256 mntValue;
        uint256 ethValue;
        uint256 gasLimit;
        bytes data;
    }
}
