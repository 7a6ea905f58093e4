//! Dispute eligibility classification.
//!
//! For each undisputed liquidation, in this order:
//! 1. skip it if the feed's history does not reach back to the liquidation time
//! 2. fetch the historical price at the liquidation time, skipping on failure
//! 3. buffer that price by the dispute buffer ratio
//! 4. flag it if the locked collateral meets the requirement at the buffered price
//! 5. ...and the dispute delay has elapsed relative to the feed's last update
//!
//! Time is always the feed's last update time, never the wall clock, so a
//! fixed feed state classifies deterministically.

use futures::future::join_all;
use rust_decimal::Decimal;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::collateral::is_disputable;
use crate::config::ContractConfig;
use crate::finding::Finding;
use monitor_chain::{Liquidation, PriceFeed};

/// Price feed session state captured after a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceFeedState {
    pub current_price: Option<Decimal>,
    pub last_update_time: u64,
    pub lookback: Duration,
}

impl PriceFeedState {
    /// Capture a feed's state. `None` until the feed has seen any data.
    pub fn capture(feed: &dyn PriceFeed) -> Option<Self> {
        Some(Self {
            current_price: feed.current_price(),
            last_update_time: feed.last_update_time()?,
            lookback: feed.lookback(),
        })
    }

    /// Oldest timestamp historical queries can answer.
    pub fn earliest_valid_time(&self) -> u64 {
        self.last_update_time.saturating_sub(self.lookback.as_secs())
    }

    pub fn covers(&self, timestamp: u64) -> bool {
        timestamp >= self.earliest_valid_time()
    }
}

/// `price * (1 + buffer_ratio)`
#[inline]
pub fn scaled_price(price: Decimal, buffer_ratio: Decimal) -> Decimal {
    price.saturating_mul(Decimal::ONE + buffer_ratio)
}

/// Whether `delay` has elapsed since `liquidation_time` as of `now`.
#[inline]
pub fn delay_elapsed(liquidation_time: u64, delay: Duration, now: u64) -> bool {
    now >= liquidation_time.saturating_add(delay.as_secs())
}

/// Flag every disputable liquidation.
///
/// `historical_price` is called at most once per liquidation; a failure only
/// skips that liquidation. Lookups run concurrently and results keep input order.
pub async fn classify_disputable<F, Fut>(
    contract_id: &str,
    liquidations: &[Liquidation],
    historical_price: F,
    feed: &PriceFeedState,
    config: &ContractConfig,
) -> Vec<Finding>
where
    F: Fn(u64) -> Fut,
    Fut: Future<Output = anyhow::Result<Decimal>>,
{
    let historical_price = &historical_price;
    let evaluations = liquidations.iter().map(|liquidation| async move {
        evaluate(contract_id, liquidation, historical_price, feed, config).await
    });

    join_all(evaluations).await.into_iter().flatten().collect()
}

async fn evaluate<F, Fut>(
    contract_id: &str,
    liquidation: &Liquidation,
    historical_price: &F,
    feed: &PriceFeedState,
    config: &ContractConfig,
) -> Option<Finding>
where
    F: Fn(u64) -> Fut,
    Fut: Future<Output = anyhow::Result<Decimal>>,
{
    if !liquidation.state.is_disputable_state() {
        return None;
    }

    let time = liquidation.liquidation_time;
    if !feed.covers(time) {
        debug!(
            contract = contract_id,
            sponsor = %liquidation.sponsor,
            liquidation_time = time,
            earliest = feed.earliest_valid_time(),
            "Liquidation precedes price history, skipping"
        );
        return None;
    }

    let price = match historical_price(time).await {
        Ok(price) => price,
        Err(e) => {
            debug!(
                contract = contract_id,
                sponsor = %liquidation.sponsor,
                liquidation_time = time,
                error = %e,
                "Historical price unavailable, skipping"
            );
            return None;
        }
    };

    let scaled = scaled_price(price, config.dispute_buffer_ratio);
    if !is_disputable(liquidation, scaled, config) {
        return None;
    }

    if !delay_elapsed(time, config.dispute_delay, feed.last_update_time) {
        debug!(
            contract = contract_id,
            sponsor = %liquidation.sponsor,
            liquidation_time = time,
            delay_secs = config.dispute_delay.as_secs(),
            "Disputable liquidation still inside dispute delay"
        );
        return None;
    }

    Some(Finding::DisputableLiquidation {
        contract_id: contract_id.to_string(),
        historical_price: price,
        scaled_price: scaled,
        liquidation: liquidation.clone(),
    })
}
