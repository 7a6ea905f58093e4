//! Chain-facing collaborator layer for the collateral monitor.
//!
//! This crate provides:
//! - On-chain data types (positions, liquidations, contract types)
//! - Collaborator traits: [`FinancialContractClient`] and [`PriceFeed`]
//! - Fixed-point conversion of raw on-chain integers into exact decimals
//! - Expiry / emergency shutdown detection
//! - A JSON state-file backend and in-memory mocks

mod contract;
pub mod expiry;
pub mod fixed_point;
pub mod mock;
pub mod oracle;
mod state_file;
mod types;

pub use contract::{ContractClientFactory, ContractDescriptor, FinancialContractClient};
pub use expiry::{is_expired_or_shutdown, ExpiryTimestamps};
pub use fixed_point::FixedPointError;
pub use oracle::{PriceFeed, PriceFeedBuildError, PriceFeedFactory, PriceHistory, PriceSample};
pub use state_file::{
    ContractState, StateDocument, StateFile, StateFileClient, StateFileFactory, StateFilePriceFeed,
    TokenDecimals,
};
pub use types::{ContractType, ContractVersion, Liquidation, LiquidationState, Position};
