//! Configuration for the collateral monitor.
//!
//! This module provides:
//! - Monitor runtime configuration (profiles, trigger timing, dispute defaults)
//! - Per-contract entries and the resolved risk parameters

mod contract;
mod monitor;

pub use contract::{ClassifierMode, ContractConfig, ContractEntry};
pub use monitor::{DisputeDefaults, MonitorConfig, TriggerConfig};
