//! JSON state file collaborators.
//!
//! Serves positions, liquidations and price history for every configured
//! contract from a single JSON document that is re-read on each update.
//! Useful for replaying captured chain state and for dry runs.
//!
//! ```json
//! {
//!   "contracts": {
//!     "eth-usd-emp": {
//!       "positions": [{ "sponsor": "0x..", "collateral": "125", "tokensOutstanding": "100" }],
//!       "liquidations": [],
//!       "expirationOrShutdownTimestamp": 0,
//!       "contractTime": 1700000000,
//!       "prices": [{ "timestamp": 1700000000, "price": "1.3" }]
//!     }
//!   }
//! }
//! ```

use anyhow::{Context, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::contract::{ContractClientFactory, ContractDescriptor, FinancialContractClient};
use crate::expiry::ExpiryTimestamps;
use crate::fixed_point::{from_fixed_point, from_wad, raw_integer, FixedPointError};
use crate::oracle::{PriceFeed, PriceFeedBuildError, PriceFeedFactory, PriceHistory, PriceSample};
use crate::types::{Liquidation, Position};

/// Whole state document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateDocument {
    #[serde(default)]
    pub contracts: HashMap<String, ContractState>,
}

/// State of one financial contract.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractState {
    #[serde(default)]
    pub positions: Vec<Position>,
    #[serde(default)]
    pub liquidations: Vec<Liquidation>,
    #[serde(default)]
    pub expiration_or_shutdown_timestamp: u64,
    #[serde(default)]
    pub contract_time: u64,
    #[serde(default)]
    pub cumulative_funding_rate_multiplier: Option<Decimal>,
    #[serde(default)]
    pub prices: Vec<PriceSample>,
    /// When set, amounts and prices above are raw on-chain integers
    #[serde(default)]
    pub decimals: Option<TokenDecimals>,
}

/// Decimal places of raw on-chain values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenDecimals {
    pub collateral: u8,
    pub synthetic: u8,
    pub price_feed: u8,
}

impl ContractState {
    /// Scale raw on-chain integers into token units. No-op for already scaled state.
    pub fn normalized(mut self) -> std::result::Result<Self, FixedPointError> {
        let Some(decimals) = self.decimals.take() else {
            return Ok(self);
        };
        for position in &mut self.positions {
            position.collateral = scale(position.collateral, decimals.collateral)?;
            position.tokens_outstanding = scale(position.tokens_outstanding, decimals.synthetic)?;
            if let Some(pending) = position.pending_withdrawal {
                position.pending_withdrawal = Some(scale(pending, decimals.collateral)?);
            }
        }
        for liquidation in &mut self.liquidations {
            liquidation.locked_collateral = scale(liquidation.locked_collateral, decimals.collateral)?;
            liquidation.tokens_liquidated = scale(liquidation.tokens_liquidated, decimals.synthetic)?;
        }
        for sample in &mut self.prices {
            sample.price = scale(sample.price, decimals.price_feed)?;
        }
        if let Some(multiplier) = self.cumulative_funding_rate_multiplier {
            self.cumulative_funding_rate_multiplier = Some(from_wad(raw_integer(multiplier)?)?);
        }
        Ok(self)
    }
}

fn scale(value: Decimal, decimals: u8) -> std::result::Result<Decimal, FixedPointError> {
    from_fixed_point(raw_integer(value)?, decimals)
}

/// Handle to a state file on disk.
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the whole document.
    pub async fn load(&self) -> Result<StateDocument> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("failed to read state file {}", self.path.display()))?;
        let document: StateDocument = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse state file {}", self.path.display()))?;
        Ok(document)
    }

    /// Read one contract's state, scaled into token units.
    pub async fn load_contract(&self, id: &str) -> Result<ContractState> {
        let mut document = self.load().await?;
        let state = document
            .contracts
            .remove(id)
            .with_context(|| format!("contract {} not present in state file", id))?;
        state
            .normalized()
            .with_context(|| format!("contract {} holds out-of-range raw values", id))
    }
}

/// Contract client backed by a state file.
#[derive(Debug)]
pub struct StateFileClient {
    file: StateFile,
    contract_id: String,
    snapshot: Option<ContractState>,
}

impl StateFileClient {
    pub fn new(file: StateFile, contract_id: impl Into<String>) -> Self {
        Self {
            file,
            contract_id: contract_id.into(),
            snapshot: None,
        }
    }
}

#[async_trait]
impl FinancialContractClient for StateFileClient {
    async fn update(&mut self) -> Result<()> {
        let state = self.file.load_contract(&self.contract_id).await?;
        debug!(
            contract = %self.contract_id,
            positions = state.positions.len(),
            liquidations = state.liquidations.len(),
            "Contract snapshot refreshed"
        );
        self.snapshot = Some(state);
        Ok(())
    }

    fn positions(&self) -> Vec<Position> {
        self.snapshot
            .as_ref()
            .map(|s| s.positions.clone())
            .unwrap_or_default()
    }

    fn undisputed_liquidations(&self) -> Vec<Liquidation> {
        self.snapshot
            .as_ref()
            .map(|s| {
                s.liquidations
                    .iter()
                    .filter(|l| l.state.is_disputable_state())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    async fn is_expired_or_shutdown(&self) -> Result<bool> {
        let state = self
            .snapshot
            .as_ref()
            .with_context(|| format!("contract {} has not been updated", self.contract_id))?;
        Ok(ExpiryTimestamps::new(state.expiration_or_shutdown_timestamp, state.contract_time)
            .is_expired_or_shutdown())
    }

    fn cumulative_funding_rate_multiplier(&self) -> Option<Decimal> {
        self.snapshot
            .as_ref()
            .and_then(|s| s.cumulative_funding_rate_multiplier)
    }
}

/// Price feed backed by a state file.
#[derive(Debug)]
pub struct StateFilePriceFeed {
    file: StateFile,
    contract_id: String,
    history: PriceHistory,
}

impl StateFilePriceFeed {
    pub fn new(file: StateFile, contract_id: impl Into<String>, lookback: Duration) -> Self {
        Self {
            file,
            contract_id: contract_id.into(),
            history: PriceHistory::new(lookback),
        }
    }
}

#[async_trait]
impl PriceFeed for StateFilePriceFeed {
    async fn update(&mut self) -> Result<()> {
        let state = self.file.load_contract(&self.contract_id).await?;
        self.history = PriceHistory::from_samples(state.prices, self.history.lookback());
        debug!(
            contract = %self.contract_id,
            samples = self.history.len(),
            last_update = ?self.history.last_update_time(),
            "Price history refreshed"
        );
        Ok(())
    }

    fn current_price(&self) -> Option<Decimal> {
        self.history.current_price()
    }

    async fn historical_price(&self, timestamp: u64) -> Result<Decimal> {
        self.history.price_at(timestamp)
    }

    fn lookback(&self) -> Duration {
        self.history.lookback()
    }

    fn last_update_time(&self) -> Option<u64> {
        self.history.last_update_time()
    }
}

/// Builds state-file clients and feeds for every configured contract.
///
/// The feed lookback comes from the contract's `price_feed.lookback` (seconds);
/// without one the factory asks for an explicit lookback.
#[derive(Debug, Clone)]
pub struct StateFileFactory {
    file: StateFile,
}

impl StateFileFactory {
    pub fn new(file: StateFile) -> Self {
        Self { file }
    }
}

#[async_trait]
impl ContractClientFactory for StateFileFactory {
    async fn create(&self, contract: &ContractDescriptor) -> Result<Box<dyn FinancialContractClient>> {
        Ok(Box::new(StateFileClient::new(self.file.clone(), contract.id.clone())))
    }
}

#[async_trait]
impl PriceFeedFactory for StateFileFactory {
    async fn create(
        &self,
        contract: &ContractDescriptor,
        lookback: Option<Duration>,
    ) -> std::result::Result<Box<dyn PriceFeed>, PriceFeedBuildError> {
        let configured = match contract.price_feed.get("lookback") {
            None => None,
            Some(value) => Some(value.as_u64().ok_or_else(|| {
                PriceFeedBuildError::InvalidConfig(format!("lookback must be seconds, got {}", value))
            })?),
        };

        let lookback = configured
            .map(Duration::from_secs)
            .or(lookback)
            .ok_or(PriceFeedBuildError::LookbackRequired)?;

        Ok(Box::new(StateFilePriceFeed::new(
            self.file.clone(),
            contract.id.clone(),
            lookback,
        )))
    }
}
