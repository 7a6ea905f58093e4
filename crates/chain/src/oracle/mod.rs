//! Price feed abstraction.
//!
//! A [`PriceFeed`] is one contract's reference price session: it is refreshed
//! once per evaluation cycle and then answers current and historical price
//! queries against the state captured by that refresh.
//!
//! Feeds are built by a [`PriceFeedFactory`]. Some feed configurations need an
//! explicit lookback window; the factory signals this with
//! [`PriceFeedBuildError::LookbackRequired`] so the caller can retry with one.

mod history;

pub use history::{PriceHistory, PriceSample};

use crate::contract::ContractDescriptor;
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::fmt::Debug;
use std::time::Duration;
use thiserror::Error;

/// Reference price session for one financial contract.
#[async_trait]
pub trait PriceFeed: Send + Sync + Debug {
    /// Refresh prices from the underlying source.
    async fn update(&mut self) -> Result<()>;

    /// Latest price, if the feed has one.
    fn current_price(&self) -> Option<Decimal>;

    /// Price in effect at `timestamp` (unix seconds).
    async fn historical_price(&self, timestamp: u64) -> Result<Decimal>;

    /// How far back historical queries are answered.
    fn lookback(&self) -> Duration;

    /// Time of the latest data seen by the feed.
    fn last_update_time(&self) -> Option<u64>;
}

/// Reasons a price feed could not be built.
#[derive(Debug, Error)]
pub enum PriceFeedBuildError {
    /// The feed configuration does not carry its own lookback
    #[error("price feed requires an explicit lookback window")]
    LookbackRequired,
    #[error("invalid price feed config: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Builds price feeds for configured contracts.
#[async_trait]
pub trait PriceFeedFactory: Send + Sync {
    async fn create(
        &self,
        contract: &ContractDescriptor,
        lookback: Option<Duration>,
    ) -> std::result::Result<Box<dyn PriceFeed>, PriceFeedBuildError>;
}
