//! Contract addresses for the Mantle withdrawal flow.
//!
//! Defaults target Mantle mainnet. Every address can be overridden with an
//! environment variable at startup; the record is flat and immutable once
//! built.

use alloy_primitives::{address, Address};
use serde::{Deserialize, Serialize};

/// Complete set of contract addresses touched by the claim flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractAddresses {
    /// MantlePortal on L1 (prove + finalize)
    pub l1_portal: Address,
    /// L2OutputOracle on L1 (proposed output roots)
    pub l2_output_oracle: Address,
    /// L1CrossDomainMessenger
    pub l1_cross_domain_messenger: Address,
    /// L1StandardBridge
    pub l1_standard_bridge: Address,
    /// AddressManager on L1
    pub l1_address_manager: Address,
    /// L2CrossDomainMessenger predeploy
    pub l2_cross_domain_messenger: Address,
    /// L2StandardBridge predeploy
    pub l2_standard_bridge: Address,
    /// L2ToL1MessagePasser predeploy
    pub l2_to_l1_message_passer: Address,
}

impl ContractAddresses {
    /// Mantle mainnet deployment.
    pub const fn mantle_mainnet() -> Self {
        Self {
            // https://etherscan.io/address/0xc54cb22944F2bE476E02dECfCD7e3E7d3e15A8Fb
            l1_portal: address!("c54cb22944F2bE476E02dECfCD7e3E7d3e15A8Fb"),
            // https://etherscan.io/address/0x31d543e7BE1dA6eFDc2206Ef7822879045B9f481
            l2_output_oracle: address!("31d543e7BE1dA6eFDc2206Ef7822879045B9f481"),
            l1_cross_domain_messenger: address!("676A795fe6E43C17c668de16730c3F690FEB7120"),
            l1_standard_bridge: address!("95fC37A27a2f68e3A647CDc081F0A89bb47c3012"),
            l1_address_manager: address!("6968f3F16C3e64003F02E121cf0D5CCBf5625a42"),
            l2_cross_domain_messenger: address!("4200000000000000000000000000000000000007"),
            l2_standard_bridge: address!("4200000000000000000000000000000000000010"),
            l2_to_l1_message_passer: address!("4200000000000000000000000000000000000016"),
        }
    }

    /// Mainnet defaults with per-contract environment overrides applied.
    pub fn from_env() -> eyre::Result<Self> {
        let mut addresses = Self::mantle_mainnet();
        override_from_env(&mut addresses.l1_portal, "L1_OPTIMISM_PORTAL")?;
        override_from_env(&mut addresses.l2_output_oracle, "L2_OUTPUT_ORACLE")?;
        override_from_env(
            &mut addresses.l1_cross_domain_messenger,
            "L1_CROSS_DOMAIN_MESSENGER",
        )?;
        override_from_env(&mut addresses.l1_standard_bridge, "L1_STANDARD_BRIDGE")?;
        override_from_env(&mut addresses.l1_address_manager, "L1_ADDRESS_MANAGER")?;
        override_from_env(
            &mut addresses.l2_cross_domain_messenger,
            "L2_CROSS_DOMAIN_MESSENGER",
        )?;
        override_from_env(&mut addresses.l2_standard_bridge, "L2_STANDARD_BRIDGE")?;
        override_from_env(
            &mut addresses.l2_to_l1_message_passer,
            "L2_TO_L1_MESSAGE_PASSER",
        )?;
        Ok(addresses)
    }
}

/// Replace `slot` with the parsed value of `var` when the variable is set
/// and non-empty. An unparsable address is a startup error, never ignored.
fn override_from_env(slot: &mut Address, var: &str) -> eyre::Result<()> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => {
            *slot = value
                .trim()
                .parse()
                .map_err(|e| eyre::eyre!("invalid address in {var}: {e}"))?;
            Ok(())
        }
        Ok(_) | Err(std::env::VarError::NotPresent) => Ok(()),
        Err(e) => Err(eyre::eyre!("failed to read {var}: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mainnet_defaults() {
        let addresses = ContractAddresses::mantle_mainnet();
        assert_eq!(
            addresses.l1_portal,
            address!("c54cb22944F2bE476E02dECfCD7e3E7d3e15A8Fb")
        );
        assert_eq!(
            addresses.l2_to_l1_message_passer,
            address!("4200000000000000000000000000000000000016")
        );
        assert_eq!(
            addresses.l2_cross_domain_messenger,
            address!("4200000000000000000000000000000000000007")
        );
    }

    #[test]
    fn test_override_from_env_applies() {
        let var = "CLAIM_MONITOR_TEST_OVERRIDE_ADDR";
        std::env::set_var(var, "0x1111111111111111111111111111111111111111");
        let mut slot = Address::ZERO;
        override_from_env(&mut slot, var).unwrap();
        assert_eq!(slot, address!("1111111111111111111111111111111111111111"));
        std::env::remove_var(var);
    }

    #[test]
    fn test_override_from_env_rejects_garbage() {
        let var = "CLAIM_MONITOR_TEST_BAD_ADDR";
        std::env::set_var(var, "not-an-address");
        let mut slot = Address::ZERO;
        assert!(override_from_env(&mut slot, var).is_err());
        std::env::remove_var(var);
    }

    #[test]
    fn test_override_from_env_keeps_default_when_unset() {
        let mut slot = address!("2222222222222222222222222222222222222222");
        override_from_env(&mut slot, "CLAIM_MONITOR_TEST_UNSET_ADDR").unwrap();
        assert_eq!(slot, address!("2222222222222222222222222222222222222222"));
    }
}
