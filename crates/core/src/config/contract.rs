//! Per-contract configuration.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::EngineError;
use monitor_chain::ContractType;

/// Which classifiers run for a contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierMode {
    /// Flag under-collateralized positions only
    Liquidation,
    /// Flag invalid liquidations only
    Dispute,
    #[default]
    Both,
}

impl ClassifierMode {
    pub fn runs_liquidation(&self) -> bool {
        matches!(self, Self::Liquidation | Self::Both)
    }

    pub fn runs_dispute(&self) -> bool {
        matches!(self, Self::Dispute | Self::Both)
    }
}

/// Risk parameters of one financial contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractConfig {
    pub contract_type: ContractType,
    /// Minimum collateral multiple of debt value, e.g. 1.2 = 120%
    pub collateral_requirement: Decimal,
    /// Margin added to the historical price before judging a dispute
    pub dispute_buffer_ratio: Decimal,
    /// Minimum age of a liquidation before it can be flagged disputable
    pub dispute_delay: Duration,
    /// Perpetual only; multiplies raw debt into effective debt
    pub cumulative_funding_rate_multiplier: Option<Decimal>,
}

impl ContractConfig {
    /// Check the parameter invariants.
    pub fn validate(&self, contract: &str) -> Result<(), EngineError> {
        if self.collateral_requirement <= Decimal::ONE {
            return Err(EngineError::invalid_config(
                contract,
                format!("collateral requirement {} must exceed 1", self.collateral_requirement),
            ));
        }
        if self.dispute_buffer_ratio < Decimal::ZERO || self.dispute_buffer_ratio >= Decimal::ONE {
            return Err(EngineError::invalid_config(
                contract,
                format!("dispute buffer ratio {} must be in [0, 1)", self.dispute_buffer_ratio),
            ));
        }
        if let Some(multiplier) = self.cumulative_funding_rate_multiplier {
            if multiplier < Decimal::ZERO {
                return Err(EngineError::invalid_config(
                    contract,
                    format!("funding rate multiplier {} must be non-negative", multiplier),
                ));
            }
        }
        Ok(())
    }

    /// Override the funding multiplier with a live value, when one is reported.
    pub fn with_live_funding_rate(&self, live: Option<Decimal>) -> Self {
        let mut config = self.clone();
        if let (ContractType::Perpetual, Some(live)) = (self.contract_type, live) {
            config.cumulative_funding_rate_multiplier = Some(live);
        }
        config
    }

    /// Funding multiplier applied to raw debt. EMP debt is never adjusted;
    /// a perpetual without a reported multiplier is at its initial value of 1.
    pub fn funding_rate_multiplier(&self) -> Decimal {
        match self.contract_type {
            ContractType::ExpiringMultiParty => Decimal::ONE,
            ContractType::Perpetual => self
                .cumulative_funding_rate_multiplier
                .unwrap_or(Decimal::ONE),
        }
    }
}

/// One `[[contracts]]` entry of the config file.
///
/// Type and version stay as strings here; they are checked against the
/// supported set during initialization so one bad entry only excludes itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractEntry {
    /// Identifier used in logs and findings
    pub id: String,
    /// Contract address (supports ${VAR} expansion)
    pub address: String,
    pub contract_type: String,
    pub contract_version: String,
    pub collateral_requirement: Decimal,
    #[serde(default)]
    pub mode: ClassifierMode,
    /// Overrides `dispute.dispute_buffer_ratio`
    #[serde(default)]
    pub dispute_buffer_ratio: Option<Decimal>,
    /// Overrides `dispute.dispute_delay_secs`
    #[serde(default)]
    pub dispute_delay_secs: Option<u64>,
    #[serde(default)]
    pub cumulative_funding_rate_multiplier: Option<Decimal>,
    /// Overrides `dispute.lookback_secs` when the feed needs an explicit lookback
    #[serde(default)]
    pub lookback_secs: Option<u64>,
    /// Opaque price feed settings handed to the feed factory
    #[serde(default)]
    pub price_feed: Option<toml::Table>,
}
