//! Position risk evaluation engine.
//!
//! This crate provides the core monitoring logic for synthetic-debt contracts:
//! - Collateralization math with funding-rate adjusted debt
//! - Liquidation eligibility: under-collateralized positions at the current price
//! - Dispute eligibility: liquidations that were valid collateral at the
//!   buffered historical price, gated by lookback window and dispute delay
//! - Per-contract evaluation cycles with failure isolation
//! - Fleet coordination across all configured contracts
//!
//! Supports ExpiringMultiParty and Perpetual contract templates.

pub mod collateral;
pub mod config;
mod coordinator;
mod cycle;
pub mod dispute;
mod error;
mod finding;
pub mod init;
pub mod liquidation;

pub use config::{ClassifierMode, ContractConfig, ContractEntry, DisputeDefaults, MonitorConfig, TriggerConfig};
pub use coordinator::{Coordinator, FleetReport, Trigger};
pub use cycle::{ContractMonitor, ContractSession, Evaluation};
pub use dispute::{classify_disputable, PriceFeedState};
pub use error::EngineError;
pub use finding::Finding;
pub use init::{initialize_contracts, InitReport, SUPPORTED_CONTRACT_VERSIONS};
pub use liquidation::classify_liquidatable;
