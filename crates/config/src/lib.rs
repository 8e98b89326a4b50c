//! Configuration types for the withdrawal claim monitor.
//!
//! This crate provides:
//! - Contract addresses for the Mantle withdrawal flow
//! - Per-contract environment overrides applied at startup

pub mod contracts;

pub use contracts::ContractAddresses;
