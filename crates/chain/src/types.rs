//! On-chain data types read from financial contracts.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Financial contract template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContractType {
    /// Expiring synthetic with a fixed settlement date
    ExpiringMultiParty,
    /// Perpetual synthetic with a funding rate
    Perpetual,
}

impl ContractType {
    /// Parse from config string. Accepts the canonical name and a few aliases.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "expiringmultiparty" | "expiring-multi-party" | "emp" => Some(Self::ExpiringMultiParty),
            "perpetual" | "perp" => Some(Self::Perpetual),
            _ => None,
        }
    }
}

impl fmt::Display for ContractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExpiringMultiParty => write!(f, "ExpiringMultiParty"),
            Self::Perpetual => write!(f, "Perpetual"),
        }
    }
}

/// Deployed contract version (semver string as published, e.g. "2.0.1").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContractVersion(pub String);

impl ContractVersion {
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContractVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One sponsor's open debt position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    /// Sponsor account
    pub sponsor: String,
    /// Collateral deposited, net of finalized withdrawals
    pub collateral: Decimal,
    /// Raw synthetic debt before any funding-rate adjustment
    pub tokens_outstanding: Decimal,
    /// Requested but not yet passed withdrawal amount
    #[serde(default)]
    pub pending_withdrawal: Option<Decimal>,
}

impl Position {
    pub fn new(sponsor: impl Into<String>, collateral: Decimal, tokens_outstanding: Decimal) -> Self {
        Self {
            sponsor: sponsor.into(),
            collateral,
            tokens_outstanding,
            pending_withdrawal: None,
        }
    }
}

/// Lifecycle state of a submitted liquidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LiquidationState {
    Uninitialized,
    /// Submitted, dispute window open
    PreDispute,
    PendingDispute,
    DisputeSucceeded,
    DisputeFailed,
}

impl LiquidationState {
    /// Only liquidations still awaiting a dispute are candidates.
    pub fn is_disputable_state(&self) -> bool {
        matches!(self, Self::PreDispute)
    }
}

/// A liquidation already submitted against a position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Liquidation {
    /// Liquidation id, unique per sponsor within a contract
    pub id: u64,
    pub sponsor: String,
    /// Unix timestamp (seconds) of the liquidation
    pub liquidation_time: u64,
    /// Collateral frozen by the liquidation
    pub locked_collateral: Decimal,
    /// Synthetic debt liquidated
    pub tokens_liquidated: Decimal,
    pub state: LiquidationState,
}
