//! Time-indexed price history with a bounded lookback window.

use anyhow::{bail, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// One observed price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSample {
    pub timestamp: u64,
    pub price: Decimal,
}

/// Ordered price samples, answering "price at time t" queries.
///
/// A historical query is answered by the most recent sample at or before the
/// requested time. Queries outside `[last_update_time - lookback,
/// last_update_time]` or older than the first sample fail.
#[derive(Debug, Clone, Default)]
pub struct PriceHistory {
    samples: BTreeMap<u64, Decimal>,
    lookback: Duration,
}

impl PriceHistory {
    pub fn new(lookback: Duration) -> Self {
        Self {
            samples: BTreeMap::new(),
            lookback,
        }
    }

    pub fn from_samples(samples: impl IntoIterator<Item = PriceSample>, lookback: Duration) -> Self {
        let mut history = Self::new(lookback);
        for sample in samples {
            history.record(sample.timestamp, sample.price);
        }
        history
    }

    /// Record a sample. A later sample at the same timestamp replaces the earlier one.
    pub fn record(&mut self, timestamp: u64, price: Decimal) {
        self.samples.insert(timestamp, price);
    }

    pub fn lookback(&self) -> Duration {
        self.lookback
    }

    pub fn set_lookback(&mut self, lookback: Duration) {
        self.lookback = lookback;
    }

    /// Latest sample timestamp.
    pub fn last_update_time(&self) -> Option<u64> {
        self.samples.keys().next_back().copied()
    }

    /// Latest sample price.
    pub fn current_price(&self) -> Option<Decimal> {
        self.samples.values().next_back().copied()
    }

    /// Earliest timestamp still inside the lookback window.
    pub fn earliest_valid_time(&self) -> Option<u64> {
        self.last_update_time()
            .map(|last| last.saturating_sub(self.lookback.as_secs()))
    }

    /// Price in effect at `timestamp`.
    pub fn price_at(&self, timestamp: u64) -> Result<Decimal> {
        let (Some(earliest), Some(last)) = (self.earliest_valid_time(), self.last_update_time()) else {
            bail!("price history is empty");
        };
        if timestamp > last {
            bail!("timestamp {} is after the last update at {}", timestamp, last);
        }
        if timestamp < earliest {
            bail!("timestamp {} precedes lookback window starting at {}", timestamp, earliest);
        }
        match self.samples.range(..=timestamp).next_back() {
            Some((_, price)) => Ok(*price),
            None => bail!("no price sample at or before {}", timestamp),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn history() -> PriceHistory {
        PriceHistory::from_samples(
            [
                PriceSample { timestamp: 100, price: dec!(1.0) },
                PriceSample { timestamp: 110, price: dec!(1.1) },
                PriceSample { timestamp: 120, price: dec!(1.3) },
            ],
            Duration::from_secs(15),
        )
    }

    #[test]
    fn test_current_and_last_update() {
        let h = history();
        assert_eq!(h.current_price(), Some(dec!(1.3)));
        assert_eq!(h.last_update_time(), Some(120));
        assert_eq!(h.earliest_valid_time(), Some(105));
    }

    #[test]
    fn test_price_at_uses_most_recent_sample() {
        let h = history();
        assert_eq!(h.price_at(110).unwrap(), dec!(1.1));
        assert_eq!(h.price_at(115).unwrap(), dec!(1.1));
        assert_eq!(h.price_at(120).unwrap(), dec!(1.3));
    }

    #[test]
    fn test_price_after_last_update_fails() {
        let h = history();
        assert!(h.price_at(121).is_err());

        let single = PriceHistory::from_samples(
            [PriceSample { timestamp: 100, price: dec!(1.1) }],
            Duration::from_secs(60),
        );
        assert!(single.price_at(10_000).is_err());
        assert_eq!(single.price_at(100).unwrap(), dec!(1.1));
    }

    #[test]
    fn test_price_at_outside_lookback_fails() {
        let h = history();
        assert!(h.price_at(104).is_err());
    }

    #[test]
    fn test_price_before_first_sample_fails() {
        let mut h = history();
        h.set_lookback(Duration::from_secs(1000));
        assert!(h.price_at(50).is_err());
    }

    #[test]
    fn test_empty_history() {
        let h = PriceHistory::new(Duration::from_secs(60));
        assert!(h.is_empty());
        assert!(h.price_at(0).is_err());
        assert_eq!(h.current_price(), None);
    }
}
