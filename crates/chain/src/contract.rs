//! Financial contract client abstraction.

use alloy::primitives::Address;
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::types::{ContractType, ContractVersion, Liquidation, Position};

/// Identity of a monitored financial contract, as handed to collaborator factories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractDescriptor {
    /// Operator-chosen identifier used in logs and findings
    pub id: String,
    pub address: Address,
    pub contract_type: ContractType,
    pub contract_version: ContractVersion,
    /// Opaque price feed configuration, interpreted by the feed factory
    #[serde(default)]
    pub price_feed: serde_json::Value,
}

/// Read access to one financial contract's sponsor positions and liquidations.
///
/// `update` captures a snapshot; the getters answer from that snapshot only.
#[async_trait]
pub trait FinancialContractClient: Send + Sync + Debug {
    /// Refresh the position and liquidation snapshot.
    async fn update(&mut self) -> Result<()>;

    /// Open sponsor positions as of the last update.
    fn positions(&self) -> Vec<Position>;

    /// Liquidations that have not been disputed yet.
    fn undisputed_liquidations(&self) -> Vec<Liquidation>;

    /// Whether the contract is past expiry (EMP) or emergency shutdown (Perpetual).
    async fn is_expired_or_shutdown(&self) -> Result<bool>;

    /// Live cumulative funding-rate multiplier, for perpetuals that expose one.
    fn cumulative_funding_rate_multiplier(&self) -> Option<Decimal> {
        None
    }
}

/// Builds contract clients for configured contracts.
#[async_trait]
pub trait ContractClientFactory: Send + Sync {
    async fn create(&self, contract: &ContractDescriptor) -> Result<Box<dyn FinancialContractClient>>;
}
